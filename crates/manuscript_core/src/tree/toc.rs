//! Plain-text table of contents for the project directory.

use super::ProjectTree;
use crate::storage::{ProjectStorage, CONTENT_DIR, DOCUMENT_EXT, TOC_FILE};
use log::{error, info};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

const TOC_MIN_RULE: usize = 62;

/// Errors from writing the table of contents.
#[derive(Debug)]
pub enum TocError {
    /// Storage has no content or runtime path.
    PathsUnavailable,
    /// File could not be written or moved into place.
    Io { path: PathBuf, source: io::Error },
}

impl Display for TocError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PathsUnavailable => write!(f, "project storage paths are not available"),
            Self::Io { path, source } => {
                write!(f, "failed to write ToC file `{}`: {source}", path.display())
            }
        }
    }
}

impl Error for TocError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::PathsUnavailable => None,
            Self::Io { source, .. } => Some(source),
        }
    }
}

impl ProjectTree {
    /// Writes `ToC.txt` into the runtime path, listing every item in tree
    /// order that has a content file. Returns the written path.
    ///
    /// The file is written to a temporary sibling and renamed into place, so
    /// a failed write never leaves a truncated ToC behind.
    pub fn write_toc<S>(&self, storage: &S) -> Result<PathBuf, TocError>
    where
        S: ProjectStorage + ?Sized,
    {
        let (Some(content_path), Some(runtime_path)) =
            (storage.content_path(), storage.runtime_path())
        else {
            error!("event=toc_write module=tree status=error error_code=paths_unavailable");
            return Err(TocError::PathsUnavailable);
        };

        let text = self.render_toc(content_path);
        let target = runtime_path.join(TOC_FILE);
        let staging = runtime_path.join(format!("{TOC_FILE}.tmp"));
        let result = fs::write(&staging, text)
            .map_err(|source| TocError::Io {
                path: staging.clone(),
                source,
            })
            .and_then(|()| {
                fs::rename(&staging, &target).map_err(|source| TocError::Io {
                    path: target.clone(),
                    source,
                })
            });

        match result {
            Ok(()) => {
                info!(
                    "event=toc_write module=tree status=ok path={}",
                    target.display()
                );
                Ok(target)
            }
            Err(err) => {
                let _ = fs::remove_file(&staging);
                error!("event=toc_write module=tree status=error error={}", err);
                Err(err)
            }
        }
    }

    fn render_toc(&self, content_path: &Path) -> String {
        let mut entries = Vec::new();
        let mut width = 0;
        for item in self.iter() {
            let file = format!("{}.{DOCUMENT_EXT}", item.handle);
            if !content_path.join(&file).is_file() {
                continue;
            }
            let line = format!(
                "{:<25}  {:<9}  {:<8}  {}",
                format!("{CONTENT_DIR}/{file}"),
                item.item_class.as_str(),
                item.item_layout.as_str(),
                item.name
            );
            width = width.max(line.chars().count());
            entries.push(line);
        }

        let mut text = String::from("\nTable of Contents\n=================\n\n");
        text.push_str(&format!(
            "{:<25}  {:<9}  {:<8}  {}\n",
            "File Name", "Class", "Layout", "Document Label"
        ));
        text.push_str(&"-".repeat(width.max(TOC_MIN_RULE)));
        text.push('\n');
        text.push_str(&entries.join("\n"));
        text.push('\n');
        text
    }
}
