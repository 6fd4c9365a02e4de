//! Repository layer for project persistence.
//!
//! # Responsibility
//! - Define the data access contract for the manifest snapshot.
//! - Isolate SQLite query details from tree and service orchestration.
//!
//! # Invariants
//! - Repositories store records as given; structural repair belongs to the
//!   tree.

pub mod manifest_repo;
