//! Tree change notifications.
//!
//! Presentation layers subscribe through `TreeObserver`; the tree never
//! depends on who listens.

use crate::model::handle::Handle;

/// One change emitted by the project tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeEvent {
    ItemAdded(Handle),
    ItemRemoved(Handle),
    /// Item data or its cached node state changed.
    ItemUpdated(Handle),
    /// The node layer was rebuilt from the item store.
    ModelRebuilt { attached: usize, detached: usize },
    /// The tree became dirty relative to the last save.
    Changed,
}

/// Receiver of tree events.
pub trait TreeObserver {
    fn on_tree_event(&self, event: &TreeEvent);
}

impl<F> TreeObserver for F
where
    F: Fn(&TreeEvent),
{
    fn on_tree_event(&self, event: &TreeEvent) {
        self(event)
    }
}
