//! Plain catch data tree, as exchanged with the persistence layer

use crate::schema::ParameterId;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Measurement values keyed by parameter id
pub type MeasurementValues = BTreeMap<ParameterId, Value>;

/// One batch of the catch hierarchy
///
/// Only the fields the compiler reads are typed; everything else the
/// persistence layer sends (weights, sampling ratios, ...) is kept verbatim
/// in `extra` and written back unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Batch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(default)]
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rank_order: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comments: Option<String>,
    #[serde(default)]
    pub measurement_values: MeasurementValues,
    #[serde(default)]
    pub children: Vec<Batch>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Batch {
    /// Synthesized root of a catch that has no data yet
    pub fn catch_batch(label: &str) -> Self {
        Self {
            label: label.to_string(),
            rank_order: Some(1),
            ..Self::default()
        }
    }

    pub fn with_label(label: &str) -> Self {
        Self {
            label: label.to_string(),
            ..Self::default()
        }
    }

    pub fn measurement(&self, id: ParameterId) -> Option<&Value> {
        self.measurement_values.get(&id)
    }

    /// Number of batches in this subtree, including self
    pub fn count(&self) -> usize {
        1 + self.children.iter().map(Batch::count).sum::<usize>()
    }
}
