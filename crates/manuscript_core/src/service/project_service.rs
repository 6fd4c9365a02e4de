//! Project open/save use-case service.
//!
//! # Responsibility
//! - Load the manifest snapshot into the tree and reconcile it with storage.
//! - Persist the tree back to the manifest and write the ToC.
//!
//! # Invariants
//! - The tree is only handed out as authoritative after `open` has run the
//!   consistency check.
//! - A successful `save` clears the tree's changed flag; a failed one keeps it.

use crate::repo::manifest_repo::{ManifestRepoError, ManifestRepository};
use crate::storage::ProjectStorage;
use crate::tree::{ProjectTree, TocError, TreeError};
use log::{error, info};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::time::Instant;

/// Errors from project service operations.
#[derive(Debug)]
pub enum ProjectServiceError {
    /// Manifest persistence failure.
    Repo(ManifestRepoError),
    /// Tree rejected the operation or detected a broken invariant.
    Tree(TreeError),
    /// ToC could not be written.
    Toc(TocError),
}

impl Display for ProjectServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Repo(err) => write!(f, "{err}"),
            Self::Tree(err) => write!(f, "{err}"),
            Self::Toc(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ProjectServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            Self::Tree(err) => Some(err),
            Self::Toc(err) => Some(err),
        }
    }
}

impl From<ManifestRepoError> for ProjectServiceError {
    fn from(value: ManifestRepoError) -> Self {
        Self::Repo(value)
    }
}

impl From<TreeError> for ProjectServiceError {
    fn from(value: TreeError) -> Self {
        Self::Tree(value)
    }
}

impl From<TocError> for ProjectServiceError {
    fn from(value: TocError) -> Self {
        Self::Toc(value)
    }
}

/// Counts reported by `ProjectService::open`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OpenReport {
    /// Manifest records admitted into the tree.
    pub admitted: usize,
    /// Manifest records skipped as malformed or duplicate.
    pub rejected: usize,
    /// Content units found without a valid item.
    pub orphans: usize,
    /// Orphans re-admitted into the tree.
    pub recovered: usize,
}

/// Project facade tying manifest, content storage and tree together.
pub struct ProjectService<R: ManifestRepository, S: ProjectStorage> {
    repo: R,
    storage: S,
    tree: ProjectTree,
}

impl<R: ManifestRepository, S: ProjectStorage> ProjectService<R, S> {
    /// Creates a service with an empty tree.
    pub fn new(repo: R, storage: S) -> Self {
        Self::with_tree(repo, storage, ProjectTree::new())
    }

    /// Creates a service around a caller-provided tree, e.g. one with
    /// observers already subscribed or a fixed handle generator.
    pub fn with_tree(repo: R, storage: S, tree: ProjectTree) -> Self {
        Self {
            repo,
            storage,
            tree,
        }
    }

    /// Loads the manifest, rebuilds the tree and reconciles it with storage.
    ///
    /// Orphaned content is re-admitted under `[<prefix>] <name>`.
    pub fn open(&mut self, prefix: &str) -> Result<OpenReport, ProjectServiceError> {
        let started_at = Instant::now();
        let records = self.repo.load_records()?;
        let unpacked = self.tree.unpack(&records);
        let checked = self
            .tree
            .check_consistency(&self.storage, prefix)
            .map_err(|err| {
                error!(
                    "event=project_open module=service status=error error={}",
                    err
                );
                err
            })?;

        let report = OpenReport {
            admitted: unpacked.admitted,
            rejected: unpacked.rejected,
            orphans: checked.orphans,
            recovered: checked.recovered,
        };
        info!(
            "event=project_open module=service status=ok items={} rejected={} orphans={} recovered={} duration_ms={}",
            self.tree.len(),
            report.rejected,
            report.orphans,
            report.recovered,
            started_at.elapsed().as_millis()
        );
        Ok(report)
    }

    /// Writes the packed tree to the manifest. Returns the record count.
    pub fn save(&mut self) -> Result<usize, ProjectServiceError> {
        let records = self.tree.pack();
        self.repo.save_records(&records)?;
        self.tree.clear_changed();
        info!(
            "event=project_save module=service status=ok count={}",
            records.len()
        );
        Ok(records.len())
    }

    /// Writes `ToC.txt` for the current tree.
    pub fn write_toc(&self) -> Result<PathBuf, ProjectServiceError> {
        Ok(self.tree.write_toc(&self.storage)?)
    }

    pub fn tree(&self) -> &ProjectTree {
        &self.tree
    }

    pub fn tree_mut(&mut self) -> &mut ProjectTree {
        &mut self.tree
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }
}
