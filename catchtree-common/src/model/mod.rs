//! # Batch model tree
//!
//! The batch model is the editing-time view of a catch: one node per batch
//! the operator fills in, each carrying the parameters rendered directly on
//! it (`own_parameters`) and the parameters handed down to the rows below it
//! (`child_parameters`).
//!
//! Trees are built by [`compiler::compile`] (or [`compiler::create_model`],
//! which also merges the catch-level parameters into the root), mutated in
//! place while the operator edits, then flattened back with
//! [`compiler::to_batch`].
//!
//! # Example
//! ```
//! use catchtree_common::config::CompilerConfig;
//! use catchtree_common::model::compiler::compile;
//! use catchtree_common::schema::{Parameter, ParameterType, QualitativeValue};
//!
//! let schema = vec![
//!     Parameter::new(1, "WEIGHT", ParameterType::Double),
//!     Parameter::qualitative(2, "DISCARD_OR_LANDING", vec![
//!         QualitativeValue::new(190, "LAN", "Landing"),
//!         QualitativeValue::new(191, "DIS", "Discard"),
//!     ]),
//! ];
//! let tree = compile(None, &schema, &CompilerConfig::default());
//!
//! let root = tree.node(tree.root().unwrap()).unwrap();
//! let labels: Vec<&str> = root.children().map(|c| c.item().label()).collect();
//! assert_eq!(labels, vec!["SORTING_BATCH#LAN", "SORTING_BATCH#DIS"]);
//! ```

pub mod compiler;
pub mod filter;

pub use filter::BatchModelFilter;

use crate::batch::{Batch, MeasurementValues};
use crate::rules::{AccessorMap, Getter};
use crate::schema::{Parameter, ParameterId};
use crate::tree::{NodeId, NodeRef, Tree};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Tree of batch model nodes
pub type BatchModelTree = Tree<BatchModel>;

/// One node of the batch model tree
///
/// Structure (parent, children) lives in the [`Tree`]; this is the node
/// payload.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchModel {
    /// Scalar copy of the source batch
    ///
    /// `batch.children` is empty for branching nodes. On terminal nodes it
    /// holds the pre-existing children of the source batch, kept verbatim.
    pub batch: Batch,
    /// Display name (qualitative value name for branch nodes)
    pub name: Option<String>,
    /// Position in the data tree, e.g. `children.1.children.0`
    pub path: String,
    /// Parameters rendered directly on this node
    pub own_parameters: Vec<Parameter>,
    /// Parameters handed down to the rows below a terminal node
    pub child_parameters: Vec<Parameter>,
    pub disabled: bool,
    pub hidden: bool,
    pub selected: bool,
    pub invalid: bool,
    pub error: Option<String>,
    /// Opaque UI state, carried over by [`compiler::recompile`]
    pub state: BTreeMap<String, Value>,
}

impl BatchModel {
    pub fn label(&self) -> &str {
        &self.batch.label
    }

    pub fn measurement_values(&self) -> &MeasurementValues {
        &self.batch.measurement_values
    }

    /// Name shown to the operator: the display name, else the label
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.batch.label)
    }

    /// Whether any own parameter is visible
    pub fn has_visible_parameters(&self) -> bool {
        self.own_parameters.iter().any(|p| !p.hidden)
    }

    /// Same batch: same non-null id, or same path
    pub fn equals(&self, other: &BatchModel) -> bool {
        (self.batch.id.is_some() && self.batch.id == other.batch.id) || self.path == other.path
    }

    /// Attribute getters for rules controlling model nodes
    ///
    /// Scalar attributes use their camelCase names. Measurements are reached
    /// as `measurementValues.<parameter id>`.
    pub fn accessors() -> AccessorMap<BatchModel> {
        AccessorMap::new()
            .with("id", |m: &BatchModel| json!(m.batch.id))
            .with("label", |m: &BatchModel| json!(m.batch.label))
            .with("name", |m: &BatchModel| json!(m.name))
            .with("rankOrder", |m: &BatchModel| json!(m.batch.rank_order))
            .with("comments", |m: &BatchModel| json!(m.batch.comments))
            .with("hidden", |m: &BatchModel| json!(m.hidden))
            .with("disabled", |m: &BatchModel| json!(m.disabled))
            .with_resolver(|name| {
                let id = name.strip_prefix("measurementValues.")?.parse::<i32>().ok()?;
                let id = ParameterId(id);
                let getter: Getter<BatchModel> =
                    Arc::new(move |m: &BatchModel| m.batch.measurement(id).cloned().unwrap_or(Value::Null));
                Some(getter)
            })
    }
}

impl<'a> NodeRef<'a, BatchModel> {
    /// Leaf of the model tree (not necessarily of the data tree)
    pub fn is_leaf(&self) -> bool {
        !self.has_children() || !self.child_parameters.is_empty()
    }

    /// Ancestor names joined by ` > `, hidden ancestors skipped
    pub fn full_name(&self) -> String {
        match self.parent() {
            Some(parent) if !parent.hidden => format!("{} > {}", parent.full_name(), self.display_name()),
            _ => self.display_name().to_string(),
        }
    }
}

impl Tree<BatchModel> {
    pub fn is_leaf(&self, id: NodeId) -> bool {
        self.node(id).map(|n| n.is_leaf()).unwrap_or(false)
    }

    pub fn full_name(&self, id: NodeId) -> Option<String> {
        self.node(id).map(|n| n.full_name())
    }

    /// First node whose label is `label`
    pub fn find_by_label(&self, label: &str) -> Option<NodeId> {
        self.iter().find(|n| n.label() == label).map(|n| n.id())
    }
}

/// Editable node: a visible, enabled model leaf
///
/// Default predicate for keyboard navigation between rows.
pub fn is_editable(node: NodeRef<'_, BatchModel>) -> bool {
    node.is_leaf() && !node.hidden && !node.disabled
}
