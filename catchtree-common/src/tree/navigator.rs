//! Tree navigation: focusable-node search, filtered search and deletion
//!
//! Stateless functions over any [`Tree`]. Every function takes a node
//! predicate; pass [`any`] to accept every node.
//!
//! `first`/`last_leaf` dive to the deepest match first, which is what the
//! editing UI wants ("focus the first editable field"). `forward`/`backward`
//! step through matches in pre-order and wrap around at both ends, so
//! repeatedly calling `forward` cycles through every match, interior nodes
//! included, and `backward` undoes each step.
//!
//! Only [`delete_by_filter`] mutates the tree.

use super::{NodeId, NodeRef, Tree};
use tracing::error;

/// Maximum number of upward hops a single `forward`/`backward` call may take
///
/// Trees built through [`Tree`] cannot contain cycles, so tripping this limit
/// means the tree is far deeper than any batch model can be, and is treated
/// as structural corruption.
pub const MAX_TRAVERSAL_HOPS: usize = 100;

/// Predicate accepting every node
pub fn any<T>(_: NodeRef<'_, T>) -> bool {
    true
}

fn accepts<T, F>(tree: &Tree<T>, id: NodeId, filter: &F) -> bool
where
    F: Fn(NodeRef<'_, T>) -> bool,
{
    tree.node(id).map(filter).unwrap_or(false)
}

/// First match in the subtree of `id`, deepest first
///
/// Children subtrees are searched left to right, each one preferring its own
/// descendants; the node itself is the fallback. Returns `None` when nothing
/// in the subtree matches.
pub fn first<T, F>(tree: &Tree<T>, id: NodeId, filter: F) -> Option<NodeId>
where
    F: Fn(NodeRef<'_, T>) -> bool,
{
    first_in(tree, id, &filter)
}

fn first_in<T, F>(tree: &Tree<T>, id: NodeId, filter: &F) -> Option<NodeId>
where
    F: Fn(NodeRef<'_, T>) -> bool,
{
    tree.children(id)
        .iter()
        .find_map(|&child| first_in(tree, child, filter))
        .or_else(|| accepts(tree, id, filter).then_some(id))
}

/// First match in the subtree of `id`, in pre-order (the node itself first)
fn pre_order_first<T, F>(tree: &Tree<T>, id: NodeId, filter: &F) -> Option<NodeId>
where
    F: Fn(NodeRef<'_, T>) -> bool,
{
    if accepts(tree, id, filter) {
        return Some(id);
    }
    tree.children(id)
        .iter()
        .find_map(|&child| pre_order_first(tree, child, filter))
}

/// Mirror of [`first`]: children searched right to left, deepest match first
pub fn last_leaf<T, F>(tree: &Tree<T>, id: NodeId, filter: F) -> Option<NodeId>
where
    F: Fn(NodeRef<'_, T>) -> bool,
{
    last_in(tree, id, &filter)
}

fn last_in<T, F>(tree: &Tree<T>, id: NodeId, filter: &F) -> Option<NodeId>
where
    F: Fn(NodeRef<'_, T>) -> bool,
{
    tree.children(id)
        .iter()
        .rev()
        .find_map(|&child| last_in(tree, child, filter))
        .or_else(|| accepts(tree, id, filter).then_some(id))
}

/// Next match after `id`, in pre-order
///
/// Looks into the descendants of `id` first, then into the following
/// siblings (and their subtrees), then climbs to the parent and repeats with
/// the parent's following siblings. Past the last node the search wraps to
/// the first pre-order match of the whole tree, which may be a root. Returns `None` if nothing matches, or
/// if the walk exceeds [`MAX_TRAVERSAL_HOPS`].
pub fn forward<T, F>(tree: &Tree<T>, id: NodeId, filter: F) -> Option<NodeId>
where
    F: Fn(NodeRef<'_, T>) -> bool,
{
    if !tree.contains(id) {
        return None;
    }

    if let Some(found) = tree
        .children(id)
        .iter()
        .find_map(|&child| pre_order_first(tree, child, &filter))
    {
        return Some(found);
    }

    let mut current = id;
    for _ in 0..MAX_TRAVERSAL_HOPS {
        let siblings = tree.siblings(current);
        let position = position_in(siblings, current, id)?;

        if let Some(found) = siblings[position + 1..]
            .iter()
            .find_map(|&sibling| pre_order_first(tree, sibling, &filter))
        {
            return Some(found);
        }

        match tree.parent(current) {
            Some(parent) => current = parent,
            // End of the tree: wrap around to the first match
            None => {
                return tree
                    .roots()
                    .iter()
                    .find_map(|&root| pre_order_first(tree, root, &filter))
            }
        }
    }

    error!(
        "Tree navigation aborted after {} hops moving forward from node {}: tree is corrupted",
        MAX_TRAVERSAL_HOPS, id
    );
    None
}

/// Previous match before `id`, in pre-order
///
/// Looks into the preceding siblings (deepest match of the nearest one
/// first), then the parent itself, then climbs and repeats. Before the first
/// node the search wraps to the last match of the whole tree. Same
/// [`MAX_TRAVERSAL_HOPS`] guard as [`forward`].
pub fn backward<T, F>(tree: &Tree<T>, id: NodeId, filter: F) -> Option<NodeId>
where
    F: Fn(NodeRef<'_, T>) -> bool,
{
    if !tree.contains(id) {
        return None;
    }

    let mut current = id;
    for _ in 0..MAX_TRAVERSAL_HOPS {
        let siblings = tree.siblings(current);
        let position = position_in(siblings, current, id)?;

        if let Some(found) = siblings[..position]
            .iter()
            .rev()
            .find_map(|&sibling| last_in(tree, sibling, &filter))
        {
            return Some(found);
        }

        match tree.parent(current) {
            Some(parent) => {
                if accepts(tree, parent, &filter) {
                    return Some(parent);
                }
                current = parent;
            }
            // Start of the tree: wrap around to the last match
            None => {
                return tree
                    .roots()
                    .iter()
                    .rev()
                    .find_map(|&root| last_in(tree, root, &filter))
            }
        }
    }

    error!(
        "Tree navigation aborted after {} hops moving backward from node {}: tree is corrupted",
        MAX_TRAVERSAL_HOPS, id
    );
    None
}

fn position_in(siblings: &[NodeId], current: NodeId, start: NodeId) -> Option<usize> {
    let position = siblings.iter().position(|&s| s == current);
    if position.is_none() {
        error!(
            "Tree navigation from node {}: node {} is missing from its parent's children",
            start, current
        );
    }
    position
}

/// Every node of the subtree of `id` matching `filter`, in pre-order
pub fn find_by_filter<T, F>(tree: &Tree<T>, id: NodeId, filter: F) -> Vec<NodeId>
where
    F: Fn(NodeRef<'_, T>) -> bool,
{
    tree.descendants(id)
        .into_iter()
        .filter(|&n| accepts(tree, n, &filter))
        .collect()
}

/// Remove every matching descendant of `id`
///
/// Matching children are spliced out of their parent's list; surviving
/// children are searched recursively. The node `id` itself is never
/// removed. Each removed subtree is returned as its own detached tree, in
/// document order, so the caller can release whatever it holds.
pub fn delete_by_filter<T, F>(tree: &mut Tree<T>, id: NodeId, filter: F) -> Vec<Tree<T>>
where
    F: Fn(NodeRef<'_, T>) -> bool,
{
    let mut removed = Vec::new();
    delete_in(tree, id, &filter, &mut removed);
    removed
}

fn delete_in<T, F>(tree: &mut Tree<T>, id: NodeId, filter: &F, removed: &mut Vec<Tree<T>>)
where
    F: Fn(NodeRef<'_, T>) -> bool,
{
    let children = tree.children(id).to_vec();
    for child in children {
        if accepts(tree, child, filter) {
            if let Some(subtree) = tree.detach(child) {
                removed.push(subtree);
            }
        } else {
            delete_in(tree, child, filter, removed);
        }
    }
}
