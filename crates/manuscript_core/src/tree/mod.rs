//! Project item tree.
//!
//! # Responsibility
//! - Own every project item by handle and keep the derived node layer in sync.
//! - Rebuild structure from a flat snapshot and repair it against storage.
//! - Answer ordered traversal and ancestry queries for exporters and UI.
//!
//! # Invariants
//! - At most one trash root exists, and it is a root-typed item.
//! - Upward walks are bounded by `MAX_DEPTH` and fail fast on a revisit.
//! - Mutations take `&mut self`; a rebuild can never interleave with a read of
//!   the node layer.
//! - `delete` does not cascade to descendant items.

mod builder;
mod consistency;
mod error;
mod events;
mod node;
mod toc;

pub use builder::{build_hierarchy, BuildOutcome, MAX_BUILD_PASSES};
pub use consistency::ConsistencyReport;
pub use error::{TreeError, TreeResult};
pub use events::{TreeEvent, TreeObserver};
pub use node::{NodeLayer, PreOrder, TreeNode};
pub use toc::TocError;

use crate::model::handle::Handle;
use crate::model::item::{Item, ItemClass, ItemLayout, ItemRecord, ItemType};
use log::{debug, error, info, warn};
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use std::collections::{BTreeSet, HashMap, HashSet};

/// Upper bound on upward walks.
pub const MAX_DEPTH: usize = 1000;
/// Upper bound on handle draws before giving up.
pub const MAX_HANDLE_ATTEMPTS: usize = 1000;
/// Name marker used for recovered content unless the caller picks another.
pub const DEFAULT_RECOVERY_PREFIX: &str = "Recovered";

/// Outcome of loading a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnpackSummary {
    pub admitted: usize,
    pub rejected: usize,
}

/// Outcome of rebuilding the node layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildSummary {
    pub attached: usize,
    pub detached: usize,
    pub passes: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WalkEnd {
    /// Reached a root-typed item.
    Root,
    /// Reached a parentless item that is not a root.
    Detached,
    /// Start item or some ancestor is not in the store.
    Missing,
}

/// Item store plus derived node layer for one project.
pub struct ProjectTree {
    items: HashMap<Handle, Item>,
    order: Vec<Handle>,
    nodes: NodeLayer,
    trash: Option<Handle>,
    changed: bool,
    rng: Box<dyn RngCore>,
    observers: Vec<Box<dyn TreeObserver>>,
}

impl Default for ProjectTree {
    fn default() -> Self {
        Self::new()
    }
}

impl ProjectTree {
    /// Creates an empty tree with an entropy-seeded handle generator.
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// Creates an empty tree drawing handles from `rng`.
    pub fn with_rng(rng: impl RngCore + 'static) -> Self {
        Self {
            items: HashMap::new(),
            order: Vec::new(),
            nodes: NodeLayer::new(),
            trash: None,
            changed: false,
            rng: Box::new(rng),
            observers: Vec::new(),
        }
    }

    /// Registers an observer for tree events.
    pub fn subscribe(&mut self, observer: impl TreeObserver + 'static) {
        self.observers.push(Box::new(observer));
    }

    pub fn trash_root(&self) -> Option<&Handle> {
        self.trash.as_ref()
    }

    pub fn nodes(&self) -> &NodeLayer {
        &self.nodes
    }

    /// Whether the tree changed since the last `clear_changed`.
    pub fn is_changed(&self) -> bool {
        self.changed
    }

    pub fn clear_changed(&mut self) {
        self.changed = false;
    }

    /// Drops all items and nodes. Observers stay subscribed.
    pub fn clear(&mut self) {
        self.items.clear();
        self.order.clear();
        self.nodes = NodeLayer::new();
        self.trash = None;
        self.changed = false;
    }

    /// All tracked handles in store order.
    pub fn handles(&self) -> Vec<Handle> {
        self.order.clone()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn contains(&self, handle: &Handle) -> bool {
        self.items.contains_key(handle)
    }

    pub fn get(&self, handle: &Handle) -> Option<&Item> {
        self.items.get(handle)
    }

    /// Items attached to the node layer, in tree order.
    pub fn iter(&self) -> impl Iterator<Item = &Item> + '_ {
        self.nodes
            .all_children()
            .filter_map(move |node| self.items.get(node.handle()))
    }

    /// Creates an item under `parent` and returns its new handle.
    ///
    /// Root-typed items ignore `parent`.
    ///
    /// # Errors
    /// - `ParentNotFound` when `parent` is given but not tracked.
    /// - `HandleSpaceExhausted` when no free handle could be drawn.
    /// - Any `append` rejection.
    pub fn create(
        &mut self,
        name: &str,
        parent: Option<&Handle>,
        item_type: ItemType,
        item_class: ItemClass,
    ) -> TreeResult<Handle> {
        let is_root = matches!(item_type, ItemType::Root | ItemType::Trash);
        let parent = if is_root { None } else { parent.cloned() };
        if let Some(parent) = parent.as_ref() {
            if !self.items.contains_key(parent) {
                warn!(
                    "event=item_create module=tree status=rejected error_code=parent_not_found parent={}",
                    parent
                );
                return Err(TreeError::ParentNotFound(parent.clone()));
            }
        }

        let handle = self.make_handle()?;
        let item = Item::new(handle.clone(), name, parent, item_type, item_class);
        self.append(item)?;
        self.update_item_data(&handle)?;
        Ok(handle)
    }

    /// Admits a pre-built item and attaches its node when the parent node
    /// exists.
    ///
    /// # Errors
    /// - `DuplicateHandle` when the handle is already tracked.
    /// - `SecondTrashRoot` when the item would be a second trash root.
    pub fn append(&mut self, item: Item) -> TreeResult<()> {
        let handle = item.handle.clone();
        let parent = item.parent.clone();
        let is_root = item.is_root_type();
        self.admit(item)?;

        let attached = if is_root {
            self.nodes.add_top(handle.clone())
        } else {
            parent
                .as_ref()
                .is_some_and(|parent| self.nodes.add_child(parent, handle.clone()))
        };
        if !attached {
            warn!(
                "event=item_append module=tree status=detached handle={} parent={}",
                handle,
                display_parent(parent.as_ref())
            );
        }

        debug!(
            "event=item_append module=tree status=ok handle={} parent={}",
            handle,
            display_parent(parent.as_ref())
        );
        self.emit(TreeEvent::ItemAdded(handle));
        self.mark_changed();
        Ok(())
    }

    /// Copies an item under a fresh handle and appends it as the last child of
    /// the source's parent.
    ///
    /// # Errors
    /// - `ItemNotFound` when `source` is not tracked.
    pub fn duplicate(&mut self, source: &Handle) -> TreeResult<Handle> {
        let original = self
            .items
            .get(source)
            .cloned()
            .ok_or_else(|| TreeError::ItemNotFound(source.clone()))?;
        let handle = self.make_handle()?;
        self.append(original.duplicate_as(handle.clone()))?;
        info!(
            "event=item_duplicate module=tree status=ok source={} handle={}",
            source, handle
        );
        Ok(handle)
    }

    /// Removes one item and its node.
    ///
    /// Descendant items are left in the store with a dangling parent; callers
    /// delete them first when a subtree should go. Their nodes leave the node
    /// layer because they are no longer reachable.
    ///
    /// # Errors
    /// - `ItemNotFound` when `handle` is not tracked.
    pub fn delete(&mut self, handle: &Handle) -> TreeResult<Item> {
        let Some(item) = self.items.remove(handle) else {
            warn!(
                "event=item_delete module=tree status=rejected error_code=item_not_found handle={}",
                handle
            );
            return Err(TreeError::ItemNotFound(handle.clone()));
        };
        self.order.retain(|current| current != handle);
        let removed = self.nodes.remove(handle);
        if removed.len() > 1 {
            warn!(
                "event=item_delete module=tree status=detached_descendants handle={} count={}",
                handle,
                removed.len() - 1
            );
        }
        if self.trash.as_ref() == Some(handle) {
            self.trash = None;
        }

        debug!("event=item_delete module=tree status=ok handle={}", handle);
        self.emit(TreeEvent::ItemRemoved(handle.clone()));
        self.mark_changed();
        Ok(item)
    }

    /// Renames one item.
    pub fn rename(&mut self, handle: &Handle, name: impl Into<String>) -> TreeResult<()> {
        let item = self
            .items
            .get_mut(handle)
            .ok_or_else(|| TreeError::ItemNotFound(handle.clone()))?;
        item.name = name.into();
        self.emit(TreeEvent::ItemUpdated(handle.clone()));
        self.mark_changed();
        Ok(())
    }

    /// Stores a new word count and refreshes propagated totals.
    pub fn set_word_count(&mut self, handle: &Handle, word_count: u64) -> TreeResult<()> {
        let item = self
            .items
            .get_mut(handle)
            .ok_or_else(|| TreeError::ItemNotFound(handle.clone()))?;
        item.word_count = word_count;
        self.refresh_items(std::slice::from_ref(handle));
        self.mark_changed();
        Ok(())
    }

    /// Packs every item into snapshot records, in store order.
    pub fn pack(&self) -> Vec<ItemRecord> {
        if self.nodes.len() != self.items.len() {
            warn!(
                "event=tree_pack module=tree status=inconsistent nodes={} items={}",
                self.nodes.len(),
                self.items.len()
            );
        }
        self.order
            .iter()
            .filter_map(|handle| self.items.get(handle))
            .map(Item::to_record)
            .collect()
    }

    /// Replaces the tree content with `records` and rebuilds the node layer.
    ///
    /// Malformed or duplicate handles and a second trash root are skipped.
    pub fn unpack(&mut self, records: &[ItemRecord]) -> UnpackSummary {
        self.clear();
        let mut summary = UnpackSummary {
            admitted: 0,
            rejected: 0,
        };
        for record in records {
            let admitted = Item::from_record(record)
                .map_err(|err| {
                    warn!(
                        "event=tree_unpack module=tree status=rejected error={}",
                        err
                    );
                })
                .and_then(|item| self.admit(item).map_err(|_| ()));
            match admitted {
                Ok(()) => summary.admitted += 1,
                Err(()) => summary.rejected += 1,
            }
        }

        let build = self.build_model();
        info!(
            "event=tree_unpack module=tree status=ok admitted={} rejected={} attached={} detached={}",
            summary.admitted, summary.rejected, build.attached, build.detached
        );
        summary
    }

    /// Rebuilds the node layer from the item store.
    ///
    /// Items that cannot be attached get their parent cleared.
    pub fn build_model(&mut self) -> BuildSummary {
        let outcome = build_hierarchy(&self.order, &self.items);
        let detached: Vec<Handle> = outcome.detached().cloned().collect();
        if !outcome.unresolved.is_empty() {
            error!(
                "event=tree_build module=tree status=error error_code=unresolved_items count={}",
                outcome.unresolved.len()
            );
        }
        for handle in &detached {
            if let Some(item) = self.items.get_mut(handle) {
                item.parent = None;
            }
        }

        self.nodes = outcome.layer;
        self.nodes.refresh(&self.items);
        let summary = BuildSummary {
            attached: self.nodes.len(),
            detached: detached.len(),
            passes: outcome.passes,
        };
        debug!(
            "event=tree_build module=tree status=ok attached={} detached={} passes={}",
            summary.attached, summary.detached, summary.passes
        );

        self.emit(TreeEvent::ModelRebuilt {
            attached: summary.attached,
            detached: summary.detached,
        });
        if summary.detached > 0 {
            self.mark_changed();
        }
        summary
    }

    /// Recomputes cached node state and notifies observers for `handles`.
    pub fn refresh_items(&mut self, handles: &[Handle]) {
        self.nodes.refresh(&self.items);
        for handle in handles {
            if self.nodes.contains(handle) {
                self.emit(TreeEvent::ItemUpdated(handle.clone()));
            }
        }
    }

    /// Caches the root handle and root class defaults on one item.
    ///
    /// Returns `Ok(false)` when the item is unknown or its chain does not end
    /// at a root item.
    ///
    /// # Errors
    /// - `CycleDetected` / `DepthExceeded` when the walk does not terminate.
    ///   These indicate a broken tree invariant.
    pub fn update_item_data(&mut self, handle: &Handle) -> TreeResult<bool> {
        let (root_handle, root_class) = {
            let (chain, end) = self.walk_up(handle)?;
            match (end, chain.last()) {
                (WalkEnd::Root, Some(root)) => (root.handle.clone(), root.item_class),
                _ => return Ok(false),
            }
        };
        if let Some(item) = self.items.get_mut(handle) {
            item.root = Some(root_handle);
            item.set_class_defaults(root_class);
        }
        Ok(true)
    }

    /// Whether `handle` exists and has `item_type`.
    pub fn check_type(&self, handle: &Handle, item_type: ItemType) -> bool {
        self.items
            .get(handle)
            .is_some_and(|item| item.item_type == item_type)
    }

    /// Handles from `handle` up to its root. Stops early, without failing,
    /// when an ancestor is missing.
    pub fn item_path(&self, handle: &Handle) -> TreeResult<Vec<Handle>> {
        let (chain, _) = self.walk_up(handle)?;
        Ok(chain.into_iter().map(|item| item.handle.clone()).collect())
    }

    /// Item names from `handle` up to its root.
    pub fn item_path_names(&self, handle: &Handle) -> TreeResult<Vec<String>> {
        let (chain, _) = self.walk_up(handle)?;
        Ok(chain.into_iter().map(|item| item.name.clone()).collect())
    }

    /// Classes of all top-level items.
    pub fn root_classes(&self) -> BTreeSet<ItemClass> {
        self.nodes
            .top_level()
            .iter()
            .filter_map(|handle| self.items.get(handle))
            .map(|item| item.item_class)
            .collect()
    }

    /// Root items in tree order, optionally restricted to one class.
    pub fn iter_roots(
        &self,
        item_class: Option<ItemClass>,
    ) -> impl Iterator<Item = (&Handle, &Item)> + '_ {
        self.nodes
            .top_level()
            .iter()
            .filter_map(move |handle| self.items.get(handle).map(|item| (handle, item)))
            .filter(move |(_, item)| {
                item.is_root_type() && item_class.map_or(true, |class| item.item_class == class)
            })
    }

    /// First root of `item_class` in tree order.
    pub fn find_root(&self, item_class: ItemClass) -> Option<&Handle> {
        self.iter_roots(Some(item_class)).map(|(handle, _)| handle).next()
    }

    /// Whether `handle` is the trash root, a direct child of it, or has it as
    /// cached root.
    pub fn is_trash(&self, handle: &Handle) -> bool {
        let (Some(trash), Some(item)) = (self.trash.as_ref(), self.items.get(handle)) else {
            return false;
        };
        handle == trash || item.parent.as_ref() == Some(trash) || item.root.as_ref() == Some(trash)
    }

    /// Word totals as `(novel, notes)`, split by layout. Totals saturate at
    /// `u64::MAX`.
    pub fn sum_words(&self) -> (u64, u64) {
        let mut novel_words: u64 = 0;
        let mut note_words: u64 = 0;
        for item in self.items.values() {
            match item.item_layout {
                ItemLayout::Document => novel_words = item.word_count.saturating_add(novel_words),
                ItemLayout::Note => note_words = item.word_count.saturating_add(note_words),
                ItemLayout::NoLayout => {}
            }
        }
        (novel_words, note_words)
    }

    fn admit(&mut self, mut item: Item) -> TreeResult<()> {
        let handle = item.handle.clone();
        if self.items.contains_key(&handle) {
            warn!(
                "event=item_admit module=tree status=rejected error_code=duplicate_handle handle={}",
                handle
            );
            return Err(TreeError::DuplicateHandle(handle));
        }
        if item.is_root_type() && item.parent.is_some() {
            warn!(
                "event=item_admit module=tree status=repaired error_code=root_with_parent handle={}",
                handle
            );
            item.parent = None;
        }
        if item.is_trash_root() {
            if let Some(existing) = self.trash.as_ref() {
                error!(
                    "event=item_admit module=tree status=rejected error_code=second_trash_root handle={} existing={}",
                    handle, existing
                );
                return Err(TreeError::SecondTrashRoot {
                    existing: existing.clone(),
                    rejected: handle,
                });
            }
            debug!(
                "event=item_admit module=tree status=ok trash_root={}",
                handle
            );
            self.trash = Some(handle.clone());
        }

        self.order.push(handle.clone());
        self.items.insert(handle, item);
        Ok(())
    }

    fn walk_up(&self, start: &Handle) -> TreeResult<(Vec<&Item>, WalkEnd)> {
        let mut chain = Vec::new();
        let Some(mut cursor) = self.items.get(start) else {
            debug!(
                "event=tree_walk module=tree status=missing handle={}",
                start
            );
            return Ok((chain, WalkEnd::Missing));
        };

        let mut visited = HashSet::new();
        for _ in 0..MAX_DEPTH {
            if !visited.insert(&cursor.handle) {
                error!(
                    "event=tree_walk module=tree status=error error_code=cycle_detected start={} at={}",
                    start, cursor.handle
                );
                return Err(TreeError::CycleDetected(cursor.handle.clone()));
            }
            chain.push(cursor);
            let Some(parent) = cursor.parent.as_ref() else {
                let end = if cursor.is_root_type() {
                    WalkEnd::Root
                } else {
                    WalkEnd::Detached
                };
                return Ok((chain, end));
            };
            match self.items.get(parent) {
                Some(next) => cursor = next,
                None => return Ok((chain, WalkEnd::Missing)),
            }
        }

        error!(
            "event=tree_walk module=tree status=error error_code=depth_exceeded start={} max_depth={}",
            start, MAX_DEPTH
        );
        Err(TreeError::DepthExceeded {
            handle: start.clone(),
            max_depth: MAX_DEPTH,
        })
    }

    fn make_handle(&mut self) -> TreeResult<Handle> {
        for attempt in 1..=MAX_HANDLE_ATTEMPTS {
            let handle = Handle::from_bits(self.rng.next_u64());
            if !self.items.contains_key(&handle) {
                return Ok(handle);
            }
            warn!(
                "event=handle_generate module=tree status=collision attempt={} handle={}",
                attempt, handle
            );
        }
        error!(
            "event=handle_generate module=tree status=error error_code=handle_space_exhausted attempts={}",
            MAX_HANDLE_ATTEMPTS
        );
        Err(TreeError::HandleSpaceExhausted {
            attempts: MAX_HANDLE_ATTEMPTS,
        })
    }

    fn mark_changed(&mut self) {
        self.changed = true;
        self.emit(TreeEvent::Changed);
    }

    fn emit(&self, event: TreeEvent) {
        for observer in &self.observers {
            observer.on_tree_event(&event);
        }
    }
}

fn display_parent(parent: Option<&Handle>) -> &str {
    parent.map_or("none", Handle::as_str)
}
