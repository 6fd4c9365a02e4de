//! Content storage collaborator.
//!
//! # Responsibility
//! - Describe what the tree needs from the project's content storage.
//! - Provide the on-disk project layout shared by storage, ToC and manifest.
//!
//! # Invariants
//! - Storage only reports content units whose file stem is a valid handle.
//! - Metadata read from a content unit is advisory; every field is optional.

use crate::model::handle::Handle;
use crate::model::item::{ItemClass, ItemLayout};
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::io;
use std::path::{Path, PathBuf};

mod fs;

pub use fs::FsStorage;

/// Directory holding content units, relative to the project root.
pub const CONTENT_DIR: &str = "content";
/// File extension of one content unit.
pub const DOCUMENT_EXT: &str = "nwd";
/// Manifest database file name, relative to the project root.
pub const MANIFEST_FILE: &str = "manifest.sqlite";
/// Table of contents file name, relative to the runtime path.
pub const TOC_FILE: &str = "ToC.txt";

pub type StorageResult<T> = Result<T, StorageError>;

/// Errors from content storage access.
#[derive(Debug)]
pub enum StorageError {
    /// Content directory or unit could not be read.
    Io { path: PathBuf, source: io::Error },
    /// Requested content unit does not exist.
    DocumentNotFound(Handle),
}

impl Display for StorageError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "storage i/o failed at `{}`: {source}", path.display())
            }
            Self::DocumentNotFound(handle) => write!(f, "content unit not found: {handle}"),
        }
    }
}

impl Error for StorageError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::DocumentNotFound(_) => None,
        }
    }
}

/// Metadata a content unit declares about itself.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentMeta {
    pub name: Option<String>,
    pub parent: Option<Handle>,
    pub class: Option<ItemClass>,
    pub layout: Option<ItemLayout>,
}

/// Storage contract consumed by the project tree.
pub trait ProjectStorage {
    /// Lists every content unit physically present.
    fn scan_content(&self) -> StorageResult<BTreeSet<Handle>>;
    /// Reads the metadata header of one content unit.
    fn read_meta(&self, handle: &Handle) -> StorageResult<DocumentMeta>;
    /// Directory holding content units, if the project is open.
    fn content_path(&self) -> Option<&Path>;
    /// Directory receiving runtime files such as the ToC.
    fn runtime_path(&self) -> Option<&Path>;
}

/// Paths derived from one project root directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectPaths {
    pub root: PathBuf,
    pub content: PathBuf,
    pub manifest: PathBuf,
    pub toc: PathBuf,
}

impl ProjectPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            content: root.join(CONTENT_DIR),
            manifest: root.join(MANIFEST_FILE),
            toc: root.join(TOC_FILE),
            root,
        }
    }

    /// Path of the content unit for `handle`.
    pub fn document(&self, handle: &Handle) -> PathBuf {
        self.content.join(format!("{handle}.{DOCUMENT_EXT}"))
    }
}
