//! Batch model compiler
//!
//! Turns a flat parameter schema into a bounded-depth tree of batches,
//! merged with the existing data tree if there is one.
//!
//! At each node the first branching-eligible qualitative parameter Q (see
//! [`first_branching_parameter`]) splits the node: the parameters before Q
//! stay on the node, and one child is built per value of Q, compiled
//! recursively with the parameters after Q. A node without such a parameter,
//! or already at `max_depth`, is terminal and hands its remaining parameters
//! down to its rows.
//!
//! Compilation never fails: a missing schema, missing data, and depth
//! exhaustion all produce a valid tree.

use super::{BatchModel, BatchModelTree};
use crate::batch::Batch;
use crate::config::CompilerConfig;
use crate::schema::{first_branching_parameter, Parameter};
use crate::tree::NodeId;
use crate::values::value_equals;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

/// Compile a batch model tree
///
/// # Arguments
/// * `source` - Existing catch data tree, or `None` to start a new catch
/// * `parameters` - Ordered schema of the sorting batches
/// * `config` - Depth bound, branching bounds and label conventions
///
/// The source tree is not modified. Existing batches are matched to branches
/// by their value for the branching parameter, so data (and any extra
/// fields) entered on them is kept.
pub fn compile(source: Option<&Batch>, parameters: &[Parameter], config: &CompilerConfig) -> BatchModelTree {
    let root = source
        .cloned()
        .unwrap_or_else(|| Batch::catch_batch(&config.catch_batch_label));

    let mut tree = BatchModelTree::new();
    compile_node(&mut tree, root, parameters, 0, None, String::new(), config);
    tree
}

fn compile_node(
    tree: &mut BatchModelTree,
    mut source: Batch,
    parameters: &[Parameter],
    depth: usize,
    parent: Option<NodeId>,
    path: String,
    config: &CompilerConfig,
) -> NodeId {
    let existing = std::mem::take(&mut source.children);
    let node = BatchModel {
        batch: source,
        path,
        ..BatchModel::default()
    };
    let id = match parent {
        Some(parent) => tree.add_child(parent, node),
        None => tree.add_root(node),
    };

    let (own_parameters, child_parameters, retained) = match first_branching_parameter(parameters, config) {
        // No branching parameter: leaf
        None => (Vec::new(), parameters.to_vec(), existing),

        Some(index) => {
            let qualitative = &parameters[index];
            let own = parameters[..index].to_vec();
            let remainder = &parameters[index + 1..];

            if depth < config.max_depth {
                branch(tree, id, qualitative, remainder, existing, depth, config);
                (own, Vec::new(), Vec::new())
            } else {
                // Depth exhausted: hand Q down unbranched
                let mut child = Vec::with_capacity(remainder.len() + 1);
                child.push(qualitative.clone());
                child.extend_from_slice(remainder);
                (own, child, existing)
            }
        }
    };

    if let Some(node) = tree.get_mut(id) {
        node.own_parameters = own_parameters;
        node.child_parameters = child_parameters;
        node.batch.children = retained;
    }
    refresh_flags(tree, id);
    id
}

/// Build one child per qualitative value of `qualitative` under `id`
fn branch(
    tree: &mut BatchModelTree,
    id: NodeId,
    qualitative: &Parameter,
    remainder: &[Parameter],
    mut existing: Vec<Batch>,
    depth: usize,
    config: &CompilerConfig,
) {
    let (label, path) = match tree.get(id) {
        Some(node) => (node.batch.label.clone(), node.path.clone()),
        None => return,
    };

    for (index, value) in qualitative.qualitative_values.iter().enumerate() {
        let expected = Value::from(value.id);

        // Find the existing batch holding this value, or start a new one
        let matched = existing.iter().position(|b| {
            b.measurement(qualitative.id)
                .is_some_and(|v| value_equals(v, &expected))
        });
        let mut child = match matched {
            Some(position) => existing.remove(position),
            None => {
                let mut batch = Batch::default();
                batch.measurement_values.insert(qualitative.id, expected);
                batch
            }
        };

        child.label = if depth == 0 {
            format!("{}{}", config.sorting_batch_prefix, value.label)
        } else {
            format!("{}.{}", label, value.label)
        };
        child.rank_order = Some(index as u32 + 1);

        let child_path = if path.is_empty() {
            format!("children.{}", index)
        } else {
            format!("{}.children.{}", path, index)
        };

        let child_id = compile_node(tree, child, remainder, depth + 1, Some(id), child_path, config);
        if let Some(node) = tree.get_mut(child_id) {
            node.own_parameters.insert(0, qualitative.for_value(value));
            node.name = Some(value.name.clone());
        }
    }

    for dropped in existing {
        warn!(
            "Batch {:?} under {:?} matches no value of parameter {} ({}): dropped from the model",
            dropped.label, label, qualitative.label, qualitative.id
        );
    }
}

/// Recompute `disabled` and `hidden` from the node's parameters
///
/// Only a root can be disabled: a branching root with no visible own
/// parameter, or a terminal root with no parameter at all. A disabled root
/// is also hidden.
fn refresh_flags(tree: &mut BatchModelTree, id: NodeId) {
    let Some(node) = tree.node(id) else {
        return;
    };
    let is_root = node.is_root();
    let disabled = is_root
        && if node.has_children() {
            !node.has_visible_parameters()
        } else {
            node.own_parameters.is_empty() && node.child_parameters.is_empty()
        };

    if let Some(node) = tree.get_mut(id) {
        node.disabled = disabled;
        node.hidden = disabled && is_root;
    }
}

/// Compile the full catch model
///
/// Like [`compile`], then adds the catch-level parameters in front of the
/// root's own parameters (first occurrence of each id wins) and names the
/// root.
pub fn create_model(
    data: Option<&Batch>,
    sorting_parameters: &[Parameter],
    catch_parameters: &[Parameter],
    config: &CompilerConfig,
) -> BatchModelTree {
    let mut tree = compile(data, sorting_parameters, config);
    let Some(root) = tree.root() else {
        return tree;
    };

    if let Some(node) = tree.get_mut(root) {
        let mut seen = HashSet::new();
        let merged: Vec<Parameter> = catch_parameters
            .iter()
            .chain(node.own_parameters.iter())
            .filter(|p| seen.insert(p.id))
            .cloned()
            .collect();
        node.own_parameters = merged;
        if node.name.is_none() {
            node.name = Some(config.catch_batch_name.clone());
        }
    }
    refresh_flags(&mut tree, root);
    tree
}

/// Flatten a model tree back into a plain data tree
///
/// Model-only fields are dropped. Terminal nodes re-emit the children they
/// retained from the source data.
pub fn to_batch(tree: &BatchModelTree) -> Option<Batch> {
    tree.root().map(|root| flatten(tree, root))
}

fn flatten(tree: &BatchModelTree, id: NodeId) -> Batch {
    let Some(node) = tree.node(id) else {
        return Batch::default();
    };
    let mut batch = node.batch.clone();
    if node.has_children() {
        batch.children = node.children().map(|c| flatten(tree, c.id())).collect();
    }
    batch
}

/// Rebuild a model after a schema change, keeping UI state
///
/// The previous tree is flattened and compiled again. Nodes of the new tree
/// whose label exists in the previous tree get its `selected`, `invalid`,
/// `error` and `state` values back.
pub fn recompile(
    previous: &BatchModelTree,
    sorting_parameters: &[Parameter],
    catch_parameters: &[Parameter],
    config: &CompilerConfig,
) -> BatchModelTree {
    let data = to_batch(previous);
    let mut tree = create_model(data.as_ref(), sorting_parameters, catch_parameters, config);

    let states: HashMap<&str, &BatchModel> = previous.iter().map(|n| (n.item().label(), n.item())).collect();
    let ids: Vec<NodeId> = tree.iter().map(|n| n.id()).collect();
    let mut restored = 0;
    for id in ids {
        let Some(node) = tree.get_mut(id) else {
            continue;
        };
        if let Some(old) = states.get(node.batch.label.as_str()) {
            node.selected = old.selected;
            node.invalid = old.invalid;
            node.error = old.error.clone();
            node.state = old.state.clone();
            restored += 1;
        }
    }
    debug!("Recompiled batch model: {} node(s), {} with restored state", tree.len(), restored);
    tree
}

/// Indented text dump of a model tree
///
/// One line per node: ` - {name}: {own parameter labels}`, indented by one
/// tab per level, suffixed with ` (hidden)` for hidden nodes.
pub fn render_tree(tree: &BatchModelTree) -> String {
    let mut out = String::new();
    for &root in tree.roots() {
        render_node(tree, root, 0, &mut out);
    }
    out
}

fn render_node(tree: &BatchModelTree, id: NodeId, depth: usize, out: &mut String) {
    let Some(node) = tree.node(id) else {
        return;
    };

    let mut line = node.display_name().to_string();
    let labels: Vec<&str> = node.own_parameters.iter().map(|p| p.label.as_str()).collect();
    if !labels.is_empty() {
        line.push_str(&format!(": {}", labels.join(", ")));
    }
    if node.hidden {
        line.push_str(" (hidden)");
    }
    out.push_str(&format!("{} - {}\n", "\t".repeat(depth), line));

    for child in node.children() {
        render_node(tree, child.id(), depth + 1, out);
    }
}

/// Log the rendered tree at debug level
pub fn log_tree(tree: &BatchModelTree) {
    debug!("Batch model:\n{}", render_tree(tree).trim_end());
}
