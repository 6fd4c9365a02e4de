//! Hierarchy builder.
//!
//! # Responsibility
//! - Turn the flat item store into a node layer.
//! - Report items whose ancestor chain cannot reach a root.
//!
//! # Invariants
//! - A node exists for every item whose chain terminates at a root item.
//! - Children appear in the order of the original flat list, regardless of
//!   the pass in which they were resolved.
//! - The builder never mutates items; the tree applies the outcome.

use crate::model::handle::Handle;
use crate::model::item::Item;
use crate::tree::node::NodeLayer;
use log::{debug, error, warn};
use std::collections::{HashMap, HashSet, VecDeque};

/// Upper bound on resolution passes.
pub const MAX_BUILD_PASSES: usize = 999;

/// Result of one hierarchy build.
#[derive(Debug, Default)]
pub struct BuildOutcome {
    pub layer: NodeLayer,
    /// Items whose parent is not in the store, or non-root items without a
    /// parent. Their parent reference must be cleared.
    pub orphaned: Vec<Handle>,
    /// Items still unresolved when the worklist stopped shrinking, e.g.
    /// members of a parent cycle. Their parent reference must be cleared.
    pub unresolved: Vec<Handle>,
    pub passes: usize,
}

impl BuildOutcome {
    /// Every handle the tree has to detach, orphans first.
    pub fn detached(&self) -> impl Iterator<Item = &Handle> {
        self.orphaned.iter().chain(self.unresolved.iter())
    }
}

/// Builds the node layer for `items`, visiting them in `order`.
pub fn build_hierarchy(order: &[Handle], items: &HashMap<Handle, Item>) -> BuildOutcome {
    let mut outcome = BuildOutcome::default();
    let mut attached: HashSet<&Handle> = HashSet::with_capacity(order.len());
    let mut queue: VecDeque<&Handle> = order
        .iter()
        .filter(|handle| items.contains_key(*handle))
        .collect();

    while !queue.is_empty() && outcome.passes < MAX_BUILD_PASSES {
        outcome.passes += 1;
        let before = queue.len();
        for _ in 0..before {
            let Some(handle) = queue.pop_front() else {
                break;
            };
            let Some(item) = items.get(handle) else {
                continue;
            };
            if item.is_root_type() {
                attached.insert(handle);
                continue;
            }
            match item.parent.as_ref() {
                Some(parent) if attached.contains(parent) => {
                    attached.insert(handle);
                }
                Some(parent) if items.contains_key(parent) => {
                    debug!(
                        "event=tree_build module=tree status=deferred handle={} parent={}",
                        handle, parent
                    );
                    queue.push_back(handle);
                }
                Some(parent) => {
                    warn!(
                        "event=tree_build module=tree status=orphaned handle={} parent={}",
                        handle, parent
                    );
                    outcome.orphaned.push(handle.clone());
                }
                None => {
                    warn!(
                        "event=tree_build module=tree status=orphaned handle={} parent=none",
                        handle
                    );
                    outcome.orphaned.push(handle.clone());
                }
            }
        }
        if queue.len() == before {
            break;
        }
    }

    for handle in queue {
        error!(
            "event=tree_build module=tree status=error error_code=unresolved_parent handle={}",
            handle
        );
        outcome.unresolved.push(handle.clone());
    }

    // Group children in list order first so sibling order never depends on
    // the pass in which an item was resolved.
    let mut children: HashMap<&Handle, Vec<&Handle>> = HashMap::new();
    let mut roots: Vec<&Handle> = Vec::new();
    for handle in order {
        if !attached.contains(handle) {
            continue;
        }
        let Some(item) = items.get(handle) else {
            continue;
        };
        match item.parent.as_ref() {
            Some(parent) if !item.is_root_type() => {
                children.entry(parent).or_default().push(handle);
            }
            _ => roots.push(handle),
        }
    }

    let mut layer = NodeLayer::new();
    let mut stack: Vec<&Handle> = Vec::new();
    for root in roots {
        layer.add_top(root.clone());
        stack.push(root);
        while let Some(parent) = stack.pop() {
            for child in children.get(parent).map(Vec::as_slice).unwrap_or_default() {
                layer.add_child(parent, (*child).clone());
                stack.push(*child);
            }
        }
    }

    outcome.layer = layer;
    outcome
}
