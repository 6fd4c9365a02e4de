//! File-system content storage.
//!
//! # Responsibility
//! - Scan the project's content directory for document files.
//! - Read the metadata header of orphaned documents.
//!
//! # Invariants
//! - Only `<handle>.nwd` files count as content units; anything else is skipped.
//! - Header parsing stops at the first line that is not a `%%~` header.

use super::{DocumentMeta, ProjectPaths, ProjectStorage, StorageError, StorageResult};
use super::DOCUMENT_EXT;
use crate::model::handle::Handle;
use crate::model::item::{ItemClass, ItemLayout};
use log::{debug, error, info};
use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, ErrorKind};
use std::path::Path;
use std::time::Instant;

const HEADER_PREFIX: &str = "%%~";

/// Content storage rooted at one project directory.
#[derive(Debug, Clone)]
pub struct FsStorage {
    paths: ProjectPaths,
}

impl FsStorage {
    /// Creates storage for an existing project directory layout.
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            paths: ProjectPaths::new(root.as_ref()),
        }
    }

    /// Creates storage and makes sure the content directory exists.
    pub fn open(root: impl AsRef<Path>) -> StorageResult<Self> {
        let storage = Self::new(root);
        fs::create_dir_all(&storage.paths.content).map_err(|source| StorageError::Io {
            path: storage.paths.content.clone(),
            source,
        })?;
        Ok(storage)
    }

    pub fn paths(&self) -> &ProjectPaths {
        &self.paths
    }
}

impl ProjectStorage for FsStorage {
    fn scan_content(&self) -> StorageResult<BTreeSet<Handle>> {
        let started_at = Instant::now();
        let entries = fs::read_dir(&self.paths.content).map_err(|source| {
            error!(
                "event=content_scan module=storage status=error path={} error={}",
                self.paths.content.display(),
                source
            );
            StorageError::Io {
                path: self.paths.content.clone(),
                source,
            }
        })?;

        let mut handles = BTreeSet::new();
        for entry in entries {
            let entry = entry.map_err(|source| StorageError::Io {
                path: self.paths.content.clone(),
                source,
            })?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            if path.extension().and_then(|ext| ext.to_str()) != Some(DOCUMENT_EXT) {
                continue;
            }
            match path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .map(Handle::parse)
            {
                Some(Ok(handle)) => {
                    handles.insert(handle);
                }
                _ => debug!(
                    "event=content_scan module=storage status=skip path={}",
                    path.display()
                ),
            }
        }

        info!(
            "event=content_scan module=storage status=ok count={} duration_ms={}",
            handles.len(),
            started_at.elapsed().as_millis()
        );
        Ok(handles)
    }

    fn read_meta(&self, handle: &Handle) -> StorageResult<DocumentMeta> {
        let path = self.paths.document(handle);
        let file = File::open(&path).map_err(|source| {
            if source.kind() == ErrorKind::NotFound {
                StorageError::DocumentNotFound(handle.clone())
            } else {
                StorageError::Io {
                    path: path.clone(),
                    source,
                }
            }
        })?;

        let mut meta = DocumentMeta::default();
        for line in BufReader::new(file).lines() {
            let line = line.map_err(|source| StorageError::Io {
                path: path.clone(),
                source,
            })?;
            let Some(header) = line.strip_prefix(HEADER_PREFIX) else {
                break;
            };
            let Some((key, value)) = header.split_once(':') else {
                continue;
            };
            apply_header(&mut meta, key.trim(), value.trim());
        }
        Ok(meta)
    }

    fn content_path(&self) -> Option<&Path> {
        Some(self.paths.content.as_path())
    }

    fn runtime_path(&self) -> Option<&Path> {
        Some(self.paths.root.as_path())
    }
}

fn apply_header(meta: &mut DocumentMeta, key: &str, value: &str) {
    match key {
        "name" if !value.is_empty() => meta.name = Some(value.to_string()),
        "path" => {
            // Stored as `<parent>/<handle>`.
            let parent = value.split('/').next().unwrap_or_default();
            meta.parent = Handle::parse(parent).ok();
        }
        "kind" => {
            let mut parts = value.split('/');
            meta.class = parts.next().and_then(ItemClass::parse);
            meta.layout = parts.next().and_then(ItemLayout::parse);
        }
        _ => {}
    }
}
