//! Connection bootstrap for the manifest database.
//!
//! # Invariants
//! - Returned connections carry the latest manifest schema.

use super::migrations::apply_migrations;
use super::{DbError, DbResult};
use log::{error, info};
use rusqlite::Connection;
use std::path::Path;
use std::time::{Duration, Instant};

const MANIFEST_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Opens the manifest at `path`, creating it when missing, and upgrades its
/// schema.
///
/// # Side effects
/// - Emits `manifest_open` logging events with duration and status.
pub fn open_db(path: impl AsRef<Path>) -> DbResult<Connection> {
    let path = path.as_ref();
    open_with(&path.display().to_string(), || {
        Connection::open(path).map_err(|source| DbError::ManifestOpen {
            path: path.to_path_buf(),
            source,
        })
    })
}

/// Opens a throwaway in-memory manifest, mainly for tests and dry runs.
pub fn open_db_in_memory() -> DbResult<Connection> {
    open_with(":memory:", || Ok(Connection::open_in_memory()?))
}

fn open_with<F>(target: &str, open: F) -> DbResult<Connection>
where
    F: FnOnce() -> DbResult<Connection>,
{
    let started_at = Instant::now();
    info!("event=manifest_open module=db status=start target={target}");

    let result = open().and_then(|mut conn| {
        conn.busy_timeout(MANIFEST_BUSY_TIMEOUT)?;
        apply_migrations(&mut conn)?;
        Ok(conn)
    });

    match &result {
        Ok(_) => info!(
            "event=manifest_open module=db status=ok target={} duration_ms={}",
            target,
            started_at.elapsed().as_millis()
        ),
        Err(err) => error!(
            "event=manifest_open module=db status=error target={} duration_ms={} error={}",
            target,
            started_at.elapsed().as_millis(),
            err
        ),
    }
    result
}
