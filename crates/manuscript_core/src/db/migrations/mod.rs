//! Manifest schema steps.
//!
//! Each step is a named SQL batch. A manifest at version `n` has had every
//! step up to `n` applied; pending steps run together in one transaction.

use crate::db::{DbError, DbResult};
use log::{error, info};
use rusqlite::Connection;

#[derive(Debug, Clone, Copy)]
struct SchemaStep {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

const SCHEMA_STEPS: &[SchemaStep] = &[SchemaStep {
    version: 1,
    name: "project_items",
    sql: include_str!("0001_project_items.sql"),
}];

/// Newest manifest schema this build can read and write.
pub fn latest_version() -> u32 {
    SCHEMA_STEPS.last().map_or(0, |step| step.version)
}

/// Names of the steps a manifest at `version` still needs, oldest first.
pub fn pending_steps(version: u32) -> Vec<&'static str> {
    SCHEMA_STEPS
        .iter()
        .filter(|step| step.version > version)
        .map(|step| step.name)
        .collect()
}

/// Upgrades the manifest schema on `conn` to `latest_version()`.
///
/// # Errors
/// - `ManifestTooNew` when the stored version is ahead of this build.
/// - `MigrationFailed` naming the first step that failed; the transaction
///   is rolled back so the manifest keeps its previous version.
pub fn apply_migrations(conn: &mut Connection) -> DbResult<()> {
    let found = stored_version(conn)?;
    let supported = latest_version();
    if found > supported {
        error!(
            "event=manifest_migrate module=db status=error error_code=manifest_too_new found={} supported={}",
            found, supported
        );
        return Err(DbError::ManifestTooNew { found, supported });
    }
    if found == supported {
        return Ok(());
    }

    let tx = conn.transaction()?;
    for step in SCHEMA_STEPS.iter().filter(|step| step.version > found) {
        tx.execute_batch(step.sql)
            .and_then(|()| tx.pragma_update(None, "user_version", step.version))
            .map_err(|source| {
                error!(
                    "event=manifest_migrate module=db status=error error_code=step_failed version={} step={} error={}",
                    step.version, step.name, source
                );
                DbError::MigrationFailed {
                    version: step.version,
                    name: step.name,
                    source,
                }
            })?;
        info!(
            "event=manifest_migrate module=db status=step version={} step={}",
            step.version, step.name
        );
    }
    tx.commit()?;

    info!(
        "event=manifest_migrate module=db status=ok from_version={} to_version={}",
        found, supported
    );
    Ok(())
}

fn stored_version(conn: &Connection) -> DbResult<u32> {
    let version = conn.query_row("PRAGMA user_version;", [], |row| row.get::<_, u32>(0))?;
    Ok(version)
}
