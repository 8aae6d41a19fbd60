//! Arena-backed ordered trees
//!
//! Nodes live in a flat arena and refer to each other by [`NodeId`]. Each
//! node owns the ordered list of its children ids and keeps a non-owning
//! `parent` id used only for upward traversal. Nodes can only be created
//! fresh, under a live parent, so a node can never become its own ancestor.
//!
//! A `Tree` may hold several roots (a forest); top-level roots are treated
//! as siblings by the navigator.
//!
//! # Example
//! ```
//! use catchtree_common::tree::Tree;
//!
//! let mut tree = Tree::new();
//! let root = tree.add_root("catch");
//! let a = tree.add_child(root, "A");
//! let a1 = tree.add_child(a, "A1");
//!
//! assert_eq!(tree.parent(a1), Some(a));
//! assert_eq!(tree.children(root), &[a]);
//! assert_eq!(tree.height(), 2);
//! ```

pub mod navigator;

use std::fmt;
use std::ops::Deref;

/// Handle to a node of a [`Tree`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone)]
struct Slot<T> {
    item: T,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// Ordered tree (or forest) stored in an arena
///
/// Removed nodes leave a vacant slot; ids are never reused, so a stale id
/// simply resolves to nothing.
#[derive(Debug, Clone)]
pub struct Tree<T> {
    slots: Vec<Option<Slot<T>>>,
    roots: Vec<NodeId>,
}

impl<T> Default for Tree<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Tree<T> {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            roots: Vec::new(),
        }
    }

    fn push(&mut self, item: T, parent: Option<NodeId>) -> NodeId {
        let id = NodeId(self.slots.len());
        self.slots.push(Some(Slot {
            item,
            parent,
            children: Vec::new(),
        }));
        id
    }

    fn slot(&self, id: NodeId) -> Option<&Slot<T>> {
        self.slots.get(id.0).and_then(Option::as_ref)
    }

    fn slot_mut(&mut self, id: NodeId) -> Option<&mut Slot<T>> {
        self.slots.get_mut(id.0).and_then(Option::as_mut)
    }

    /// Add a new top-level node
    pub fn add_root(&mut self, item: T) -> NodeId {
        let id = self.push(item, None);
        self.roots.push(id);
        id
    }

    /// Append a new node as last child of `parent`
    ///
    /// # Panics
    /// Panics if `parent` does not refer to a live node of this tree.
    pub fn add_child(&mut self, parent: NodeId, item: T) -> NodeId {
        assert!(self.contains(parent), "add_child: stale parent node {}", parent);
        let id = self.push(item, Some(parent));
        if let Some(slot) = self.slot_mut(parent) {
            slot.children.push(id);
        }
        id
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.slot(id).is_some()
    }

    pub fn get(&self, id: NodeId) -> Option<&T> {
        self.slot(id).map(|s| &s.item)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut T> {
        self.slot_mut(id).map(|s| &mut s.item)
    }

    /// Borrowed view of a node, with navigation helpers
    pub fn node(&self, id: NodeId) -> Option<NodeRef<'_, T>> {
        self.slot(id).map(|slot| NodeRef {
            tree: self,
            id,
            slot,
        })
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.slot(id).and_then(|s| s.parent)
    }

    /// Children ids in order (empty for leaves and stale ids)
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.slot(id).map(|s| s.children.as_slice()).unwrap_or(&[])
    }

    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    /// First top-level node
    pub fn root(&self) -> Option<NodeId> {
        self.roots.first().copied()
    }

    /// Siblings list `id` belongs to: its parent's children, or the roots
    pub fn siblings(&self, id: NodeId) -> &[NodeId] {
        match self.parent(id) {
            Some(parent) => self.children(parent),
            None => &self.roots,
        }
    }

    /// Number of live nodes
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Number of edges between `id` and its root
    pub fn depth(&self, id: NodeId) -> usize {
        let mut depth = 0;
        let mut current = self.parent(id);
        while let Some(parent) = current {
            depth += 1;
            current = self.parent(parent);
        }
        depth
    }

    /// Largest node depth in the tree (0 for a lone root or an empty tree)
    pub fn height(&self) -> usize {
        self.roots
            .iter()
            .flat_map(|&root| self.descendants(root))
            .map(|id| self.depth(id))
            .max()
            .unwrap_or(0)
    }

    /// `id` and all its descendants, in pre-order
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut result = Vec::new();
        if !self.contains(id) {
            return result;
        }
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            result.push(current);
            stack.extend(self.children(current).iter().rev());
        }
        result
    }

    /// Every live node of every root, in pre-order
    pub fn iter(&self) -> impl Iterator<Item = NodeRef<'_, T>> + '_ {
        self.roots
            .iter()
            .flat_map(move |&root| self.descendants(root))
            .filter_map(move |id| self.node(id))
    }

    /// Move the subtree rooted at `id` out into a tree of its own
    ///
    /// The detached subtree keeps its shape and order; its root becomes the
    /// single root of the returned tree. Returns `None` for a stale id.
    pub fn detach(&mut self, id: NodeId) -> Option<Tree<T>> {
        if !self.contains(id) {
            return None;
        }

        // Unlink from the owning list first
        match self.parent(id) {
            Some(parent) => {
                if let Some(slot) = self.slot_mut(parent) {
                    slot.children.retain(|&c| c != id);
                }
            }
            None => self.roots.retain(|&r| r != id),
        }

        let mut detached = Tree::new();
        self.move_into(id, None, &mut detached);
        Some(detached)
    }

    fn move_into(&mut self, id: NodeId, parent: Option<NodeId>, target: &mut Tree<T>) {
        let Some(slot) = self.slots.get_mut(id.0).and_then(Option::take) else {
            return;
        };
        let new_id = match parent {
            Some(p) => target.add_child(p, slot.item),
            None => target.add_root(slot.item),
        };
        for child in slot.children {
            self.move_into(child, Some(new_id), target);
        }
    }

    /// Consume the tree, yielding the items of every root subtree in pre-order
    pub fn into_items(mut self) -> Vec<T> {
        let order: Vec<NodeId> = self
            .roots
            .iter()
            .flat_map(|&root| self.descendants(root))
            .collect();
        order
            .into_iter()
            .filter_map(|id| self.slots.get_mut(id.0).and_then(Option::take))
            .map(|slot| slot.item)
            .collect()
    }
}

/// Borrowed view of one node of a [`Tree`]
///
/// Dereferences to the node item, and exposes the structural links.
pub struct NodeRef<'a, T> {
    tree: &'a Tree<T>,
    id: NodeId,
    slot: &'a Slot<T>,
}

impl<'a, T> Clone for NodeRef<'a, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<'a, T> Copy for NodeRef<'a, T> {}

impl<'a, T> NodeRef<'a, T> {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn item(&self) -> &'a T {
        &self.slot.item
    }

    pub fn parent(&self) -> Option<NodeRef<'a, T>> {
        self.slot.parent.and_then(|p| self.tree.node(p))
    }

    pub fn children(&self) -> impl Iterator<Item = NodeRef<'a, T>> + 'a {
        let tree = self.tree;
        let slot = self.slot;
        slot.children.iter().filter_map(move |&c| tree.node(c))
    }

    pub fn child_count(&self) -> usize {
        self.slot.children.len()
    }

    pub fn has_children(&self) -> bool {
        !self.slot.children.is_empty()
    }

    pub fn is_root(&self) -> bool {
        self.slot.parent.is_none()
    }

    pub fn depth(&self) -> usize {
        self.tree.depth(self.id)
    }
}

impl<'a, T> Deref for NodeRef<'a, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.slot.item
    }
}

impl<'a, T: fmt::Debug> fmt::Debug for NodeRef<'a, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeRef")
            .field("id", &self.id)
            .field("item", &self.slot.item)
            .finish()
    }
}
