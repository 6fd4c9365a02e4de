//! Derived navigable node layer.
//!
//! # Responsibility
//! - Hold ordered child lists and parent back-references for attached items.
//! - Provide the deterministic pre-order traversal used by pack, ToC and
//!   exporters.
//!
//! # Invariants
//! - Nodes are derived state; the item store is the source of truth.
//! - A node is only ever added under an existing node, so the layer is a
//!   forest and traversal always terminates.
//! - Parent references are handles, never ownership.

use crate::model::handle::Handle;
use crate::model::item::Item;
use std::collections::HashMap;

/// One attached item in the node layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeNode {
    handle: Handle,
    parent: Option<Handle>,
    children: Vec<Handle>,
    word_total: u64,
}

impl TreeNode {
    fn new(handle: Handle, parent: Option<Handle>) -> Self {
        Self {
            handle,
            parent,
            children: Vec::new(),
            word_total: 0,
        }
    }

    pub fn handle(&self) -> &Handle {
        &self.handle
    }

    /// Parent node handle. `None` for nodes under the synthetic root.
    pub fn parent(&self) -> Option<&Handle> {
        self.parent.as_ref()
    }

    pub fn children(&self) -> &[Handle] {
        &self.children
    }

    /// Word count of this item plus all descendants, as of the last refresh.
    pub fn word_total(&self) -> u64 {
        self.word_total
    }
}

/// Forest of nodes under one synthetic root.
#[derive(Debug, Clone, Default)]
pub struct NodeLayer {
    top: Vec<Handle>,
    nodes: HashMap<Handle, TreeNode>,
}

impl NodeLayer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, handle: &Handle) -> bool {
        self.nodes.contains_key(handle)
    }

    pub fn get(&self, handle: &Handle) -> Option<&TreeNode> {
        self.nodes.get(handle)
    }

    /// Children of the synthetic root, in order.
    pub fn top_level(&self) -> &[Handle] {
        &self.top
    }

    /// Children of `handle`, or an empty slice for unknown handles.
    pub fn children_of(&self, handle: &Handle) -> &[Handle] {
        self.nodes
            .get(handle)
            .map_or(&[][..], |node| node.children.as_slice())
    }

    /// Appends a node under the synthetic root.
    pub(crate) fn add_top(&mut self, handle: Handle) -> bool {
        if self.nodes.contains_key(&handle) {
            return false;
        }
        self.top.push(handle.clone());
        self.nodes.insert(handle.clone(), TreeNode::new(handle, None));
        true
    }

    /// Appends a node to the ordered children of `parent`.
    pub(crate) fn add_child(&mut self, parent: &Handle, handle: Handle) -> bool {
        if self.nodes.contains_key(&handle) {
            return false;
        }
        let Some(parent_node) = self.nodes.get_mut(parent) else {
            return false;
        };
        parent_node.children.push(handle.clone());
        self.nodes
            .insert(handle.clone(), TreeNode::new(handle, Some(parent.clone())));
        true
    }

    /// Removes a node and every node below it. Returns the removed handles in
    /// pre-order.
    pub(crate) fn remove(&mut self, handle: &Handle) -> Vec<Handle> {
        let Some(parent) = self.nodes.get(handle).map(|node| node.parent.clone()) else {
            return Vec::new();
        };
        match parent.and_then(|parent| self.nodes.get_mut(&parent)) {
            Some(parent_node) => parent_node.children.retain(|child| child != handle),
            None => self.top.retain(|top| top != handle),
        }

        let mut removed = Vec::new();
        let mut stack = vec![handle.clone()];
        while let Some(current) = stack.pop() {
            if let Some(node) = self.nodes.remove(&current) {
                stack.extend(node.children.into_iter().rev());
                removed.push(current);
            }
        }
        removed
    }

    /// Lazy pre-order traversal of the whole forest. Each call starts over.
    pub fn all_children(&self) -> PreOrder<'_> {
        PreOrder {
            layer: self,
            stack: self.top.iter().rev().collect(),
        }
    }

    /// Recomputes propagated word totals without touching structure.
    pub(crate) fn refresh(&mut self, items: &HashMap<Handle, Item>) {
        let order: Vec<Handle> = self
            .all_children()
            .map(|node| node.handle.clone())
            .collect();
        // Reverse pre-order visits children before their parent.
        for handle in order.iter().rev() {
            let own = items.get(handle).map_or(0, |item| item.word_count);
            let below: u64 = self
                .children_of(handle)
                .iter()
                .filter_map(|child| self.nodes.get(child))
                .map(|child| child.word_total)
                .fold(0, u64::saturating_add);
            if let Some(node) = self.nodes.get_mut(handle) {
                node.word_total = own.saturating_add(below);
            }
        }
    }
}

/// Pre-order iterator over a `NodeLayer`.
pub struct PreOrder<'a> {
    layer: &'a NodeLayer,
    stack: Vec<&'a Handle>,
}

impl<'a> Iterator for PreOrder<'a> {
    type Item = &'a TreeNode;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(handle) = self.stack.pop() {
            if let Some(node) = self.layer.nodes.get(handle) {
                self.stack.extend(node.children.iter().rev());
                return Some(node);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::NodeLayer;
    use crate::model::handle::Handle;

    fn h(bits: u64) -> Handle {
        Handle::from_bits(bits)
    }

    fn sample() -> NodeLayer {
        // 1 -> (2 -> 4), 3 ; 5
        let mut layer = NodeLayer::new();
        assert!(layer.add_top(h(1)));
        assert!(layer.add_child(&h(1), h(2)));
        assert!(layer.add_child(&h(1), h(3)));
        assert!(layer.add_child(&h(2), h(4)));
        assert!(layer.add_top(h(5)));
        layer
    }

    #[test]
    fn all_children_is_pre_order_and_restartable() {
        let layer = sample();
        let expected = vec![h(1), h(2), h(4), h(3), h(5)];
        let first: Vec<Handle> = layer.all_children().map(|n| n.handle().clone()).collect();
        let second: Vec<Handle> = layer.all_children().map(|n| n.handle().clone()).collect();
        assert_eq!(first, expected);
        assert_eq!(second, expected);
    }

    #[test]
    fn add_child_rejects_unknown_parent_and_duplicates() {
        let mut layer = sample();
        assert!(!layer.add_child(&h(99), h(6)));
        assert!(!layer.add_child(&h(1), h(4)));
        assert!(!layer.add_top(h(2)));
        assert_eq!(layer.len(), 5);
    }

    #[test]
    fn remove_drops_subtree_and_back_reference() {
        let mut layer = sample();
        let removed = layer.remove(&h(2));
        assert_eq!(removed, vec![h(2), h(4)]);
        assert_eq!(layer.children_of(&h(1)), &[h(3)]);
        assert!(!layer.contains(&h(4)));

        let removed_top = layer.remove(&h(5));
        assert_eq!(removed_top, vec![h(5)]);
        assert_eq!(layer.top_level(), &[h(1)]);
    }
}
