//! Batch model filter
//!
//! Declarative node criteria, used to find or prune nodes of a model tree
//! (e.g. "every landing leaf", "every row with a weight").

use super::{BatchModel, BatchModelTree};
use crate::batch::MeasurementValues;
use crate::schema::ParameterId;
use crate::tree::navigator;
use crate::tree::{NodeId, NodeRef};
use crate::values::{is_empty_value, value_equals};
use serde::{Deserialize, Serialize};

/// Criteria on a model node; unset criteria match anything
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BatchModelFilter {
    /// Every listed measurement must be present and equal
    #[serde(skip_serializing_if = "MeasurementValues::is_empty")]
    pub measurement_values: MeasurementValues,
    /// Every listed measurement must be present and not empty
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub parameter_ids: Vec<ParameterId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hidden: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_leaf: Option<bool>,
    /// Applied to the parent; a root never matches a non-empty parent filter
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_filter: Option<Box<BatchModelFilter>>,
}

impl BatchModelFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_measurement(mut self, id: ParameterId, value: impl Into<serde_json::Value>) -> Self {
        self.measurement_values.insert(id, value.into());
        self
    }

    pub fn with_parameter(mut self, id: ParameterId) -> Self {
        self.parameter_ids.push(id);
        self
    }

    pub fn with_hidden(mut self, hidden: bool) -> Self {
        self.hidden = Some(hidden);
        self
    }

    pub fn with_leaf(mut self, is_leaf: bool) -> Self {
        self.is_leaf = Some(is_leaf);
        self
    }

    pub fn with_parent(mut self, parent: BatchModelFilter) -> Self {
        self.parent_filter = Some(Box::new(parent));
        self
    }

    /// True when no criterion is set
    pub fn is_empty(&self) -> bool {
        self.measurement_values.is_empty()
            && self.parameter_ids.is_empty()
            && self.hidden.is_none()
            && self.is_leaf.is_none()
            && self.parent_filter.as_ref().map_or(true, |p| p.is_empty())
    }

    pub fn matches(&self, node: NodeRef<'_, BatchModel>) -> bool {
        let values = node.measurement_values();

        let measurements_match = self.measurement_values.iter().all(|(id, expected)| {
            values
                .get(id)
                .is_some_and(|actual| !actual.is_null() && value_equals(actual, expected))
        });
        if !measurements_match {
            return false;
        }

        let parameters_filled = self
            .parameter_ids
            .iter()
            .all(|id| values.get(id).is_some_and(|v| !is_empty_value(v)));
        if !parameters_filled {
            return false;
        }

        if self.hidden.is_some_and(|hidden| node.hidden != hidden) {
            return false;
        }
        if self.is_leaf.is_some_and(|is_leaf| node.is_leaf() != is_leaf) {
            return false;
        }

        match &self.parent_filter {
            Some(parent_filter) if !parent_filter.is_empty() => {
                node.parent().is_some_and(|parent| parent_filter.matches(parent))
            }
            _ => true,
        }
    }
}

/// Every node of every root matching `filter`, in pre-order
pub fn find_by_filter_in_tree(tree: &BatchModelTree, filter: &BatchModelFilter) -> Vec<NodeId> {
    tree.roots()
        .iter()
        .flat_map(|&root| navigator::find_by_filter(tree, root, |n| filter.matches(n)))
        .collect()
}

/// Remove every non-root node matching `filter`
///
/// Returns the removed subtrees, each as its own tree.
pub fn delete_by_filter_in_tree(tree: &mut BatchModelTree, filter: &BatchModelFilter) -> Vec<BatchModelTree> {
    let roots = tree.roots().to_vec();
    roots
        .into_iter()
        .flat_map(|root| navigator::delete_by_filter(tree, root, |n| filter.matches(n)))
        .collect()
}
