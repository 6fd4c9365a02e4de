//! Core domain logic for the manuscript project tree.
//! This crate is the single source of truth for item hierarchy invariants.

pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;
pub mod storage;
pub mod tree;

pub use logging::{default_log_level, init_logging, logging_status};
pub use model::handle::{Handle, HandleError};
pub use model::item::{Item, ItemClass, ItemLayout, ItemRecord, ItemType, RecordError};
pub use repo::manifest_repo::{
    ManifestRepoError, ManifestRepoResult, ManifestRepository, SqliteManifestRepository,
};
pub use service::project_service::{OpenReport, ProjectService, ProjectServiceError};
pub use storage::{DocumentMeta, FsStorage, ProjectPaths, ProjectStorage, StorageError};
pub use tree::{
    ConsistencyReport, ProjectTree, TocError, TreeError, TreeEvent, TreeObserver, TreeResult,
    DEFAULT_RECOVERY_PREFIX,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
