//! Tree reconciliation against the content units in storage.
//!
//! # Responsibility
//! - Verify every tracked item reaches a root and refresh its cached root.
//! - Evict items with broken chains and re-admit untracked content as
//!   recovered items.
//!
//! # Invariants
//! - Content is never dropped: every content unit without a valid item is
//!   re-admitted under a marked name, or reported as not recovered.
//! - Recovered items always land under an existing or newly created root.

use super::{ProjectTree, TreeResult};
use crate::model::handle::Handle;
use crate::model::item::{Item, ItemClass, ItemLayout, ItemType};
use crate::storage::{DocumentMeta, ProjectStorage};
use log::{debug, error, info, warn};
use std::time::Instant;

/// Counts reported by one consistency check.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConsistencyReport {
    /// Content units with no valid tracked item.
    pub orphans: usize,
    /// Orphans re-admitted into the tree.
    pub recovered: usize,
}

impl ProjectTree {
    /// Reconciles the tree with the content units present in `storage`.
    ///
    /// Must run after a full load and before the tree is treated as
    /// authoritative. Recovered items are named `[<prefix>] <name>`.
    ///
    /// # Errors
    /// - `Storage` when the content scan fails; the tree is left untouched.
    /// - `CycleDetected` / `DepthExceeded` when a walk does not terminate.
    pub fn check_consistency<S>(&mut self, storage: &S, prefix: &str) -> TreeResult<ConsistencyReport>
    where
        S: ProjectStorage + ?Sized,
    {
        let started_at = Instant::now();
        let mut files = storage.scan_content()?;

        for handle in self.handles() {
            if self.update_item_data(&handle)? {
                debug!(
                    "event=consistency_check module=tree status=ok handle={}",
                    handle
                );
                files.remove(&handle);
            } else {
                error!(
                    "event=consistency_check module=tree status=error error_code=broken_chain handle={}",
                    handle
                );
                // Its content unit, if any, comes back as an orphan below.
                self.delete(&handle)?;
            }
        }

        let orphans = files.len();
        if orphans == 0 {
            info!(
                "event=consistency_check module=tree status=ok orphans=0 duration_ms={}",
                started_at.elapsed().as_millis()
            );
            return Ok(ConsistencyReport::default());
        }

        warn!(
            "event=consistency_check module=tree status=orphans_found count={}",
            orphans
        );
        let mut recovered = 0;
        for handle in &files {
            if self.recover_orphan(storage, handle, prefix)? {
                recovered += 1;
            }
        }

        info!(
            "event=consistency_check module=tree status=ok orphans={} recovered={} duration_ms={}",
            orphans,
            recovered,
            started_at.elapsed().as_millis()
        );
        Ok(ConsistencyReport { orphans, recovered })
    }

    fn recover_orphan<S>(&mut self, storage: &S, handle: &Handle, prefix: &str) -> TreeResult<bool>
    where
        S: ProjectStorage + ?Sized,
    {
        let meta = storage.read_meta(handle).unwrap_or_else(|err| {
            warn!(
                "event=orphan_recover module=tree status=no_meta handle={} error={}",
                handle, err
            );
            DocumentMeta::default()
        });

        let name = meta.name.unwrap_or_else(|| handle.to_string());
        let item_class = meta.class.unwrap_or(ItemClass::Novel);
        let item_layout = meta.layout.unwrap_or(ItemLayout::Note);
        let parent = match meta.parent.filter(|parent| self.nodes.contains(parent)) {
            Some(parent) => parent,
            None => self.home_for(item_class, prefix)?,
        };

        let mut item = Item::new(
            handle.clone(),
            format!("[{prefix}] {name}"),
            Some(parent.clone()),
            ItemType::File,
            item_class,
        );
        item.item_layout = item_layout;
        if let Err(err) = self.append(item) {
            error!(
                "event=orphan_recover module=tree status=error handle={} error={}",
                handle, err
            );
            return Ok(false);
        }
        self.update_item_data(handle)?;
        info!(
            "event=orphan_recover module=tree status=ok handle={} parent={}",
            handle, parent
        );
        Ok(true)
    }

    /// First root of `item_class`, else the first novel root, else a new
    /// novel root named after `prefix`.
    fn home_for(&mut self, item_class: ItemClass, prefix: &str) -> TreeResult<Handle> {
        let existing = self
            .find_root(item_class)
            .or_else(|| self.find_root(ItemClass::Novel))
            .cloned();
        match existing {
            Some(root) => Ok(root),
            None => {
                let root = self.create(prefix, None, ItemType::Root, ItemClass::Novel)?;
                info!(
                    "event=orphan_recover module=tree status=root_created handle={}",
                    root
                );
                Ok(root)
            }
        }
    }
}
