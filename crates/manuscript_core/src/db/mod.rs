//! SQLite storage for the project manifest.
//!
//! # Responsibility
//! - Open and configure the connection holding the item snapshot.
//! - Bring the manifest schema up to date before anything touches it.
//!
//! # Invariants
//! - The manifest schema version lives in `PRAGMA user_version`.
//! - A manifest written by a newer build is never opened for writing.

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

pub mod migrations;
mod open;

pub use open::{open_db, open_db_in_memory};

pub type DbResult<T> = Result<T, DbError>;

/// Manifest database failure.
#[derive(Debug)]
pub enum DbError {
    /// Statement-level failure on an already open manifest.
    Sqlite(rusqlite::Error),
    /// The manifest file could not be opened or created.
    ManifestOpen {
        path: PathBuf,
        source: rusqlite::Error,
    },
    /// The manifest was written by a build with a newer schema.
    ManifestTooNew { found: u32, supported: u32 },
    /// One schema step failed; nothing from the batch was kept.
    MigrationFailed {
        version: u32,
        name: &'static str,
        source: rusqlite::Error,
    },
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "manifest query failed: {err}"),
            Self::ManifestOpen { path, source } => {
                write!(f, "cannot open manifest `{}`: {source}", path.display())
            }
            Self::ManifestTooNew { found, supported } => write!(
                f,
                "manifest schema v{found} comes from a newer release; this build reads up to v{supported}"
            ),
            Self::MigrationFailed {
                version,
                name,
                source,
            } => write!(f, "manifest migration v{version} ({name}) failed: {source}"),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::ManifestOpen { source, .. } | Self::MigrationFailed { source, .. } => {
                Some(source)
            }
            Self::ManifestTooNew { .. } => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}
