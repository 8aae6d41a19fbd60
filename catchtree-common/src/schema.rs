//! Parameter (PMFM) definitions driving the batch tree layout
//!
//! A schema is an ordered `Vec<Parameter>`, already filtered to one
//! acquisition level / program / strategy by the referential service.
//! Qualitative parameters with a small value set double as structural
//! branching keys for the compiler.

use crate::config::CompilerConfig;
use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Referential id of a parameter
///
/// Serialized as a bare integer so it can key `measurementValues` maps.
/// Deserialization also accepts the string form, which is how map keys
/// arrive once they have been buffered by a `#[serde(flatten)]` struct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ParameterId(pub i32);

impl<'de> Deserialize<'de> for ParameterId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct IdVisitor;

        impl<'de> Visitor<'de> for IdVisitor {
            type Value = ParameterId;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a parameter id (integer or integer string)")
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<ParameterId, E> {
                i32::try_from(v)
                    .map(ParameterId)
                    .map_err(|_| E::custom(format!("parameter id out of range: {}", v)))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<ParameterId, E> {
                i32::try_from(v)
                    .map(ParameterId)
                    .map_err(|_| E::custom(format!("parameter id out of range: {}", v)))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<ParameterId, E> {
                v.trim()
                    .parse::<i32>()
                    .map(ParameterId)
                    .map_err(|_| E::custom(format!("invalid parameter id: {:?}", v)))
            }
        }

        deserializer.deserialize_any(IdVisitor)
    }
}

impl fmt::Display for ParameterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i32> for ParameterId {
    fn from(id: i32) -> Self {
        ParameterId(id)
    }
}

/// Parameter value type tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterType {
    /// Enumerated value set (see [`Parameter::qualitative_values`])
    #[serde(rename = "qualitative_value", alias = "qualitative")]
    Qualitative,
    Integer,
    #[serde(alias = "quantitative")]
    Double,
    String,
    Boolean,
    Date,
}

/// One allowed value of a qualitative parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualitativeValue {
    pub id: i64,
    pub label: String,
    #[serde(default)]
    pub name: String,
}

impl QualitativeValue {
    pub fn new(id: i64, label: &str, name: &str) -> Self {
        Self {
            id,
            label: label.to_string(),
            name: name.to_string(),
        }
    }
}

/// Parameter definition (a PMFM, in fisheries data terms)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Parameter {
    pub id: ParameterId,
    pub label: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub parameter_type: ParameterType,
    /// Ordered value set, only meaningful for qualitative parameters
    #[serde(default)]
    pub qualitative_values: Vec<QualitativeValue>,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Value>,
}

impl Parameter {
    /// Create a non-qualitative parameter
    pub fn new(id: i32, label: &str, parameter_type: ParameterType) -> Self {
        Self {
            id: ParameterId(id),
            label: label.to_string(),
            name: None,
            parameter_type,
            qualitative_values: Vec::new(),
            hidden: false,
            default_value: None,
        }
    }

    /// Create a qualitative parameter with the given value set
    pub fn qualitative(id: i32, label: &str, values: Vec<QualitativeValue>) -> Self {
        Self {
            qualitative_values: values,
            ..Self::new(id, label, ParameterType::Qualitative)
        }
    }

    pub fn with_hidden(mut self, hidden: bool) -> Self {
        self.hidden = hidden;
        self
    }

    pub fn is_qualitative(&self) -> bool {
        self.parameter_type == ParameterType::Qualitative
    }

    /// Hidden copy pinned to one qualitative value
    ///
    /// Prepended to the own parameters of the branch built for `value`, so the
    /// branching measurement is stored on the child without being edited.
    pub fn for_value(&self, value: &QualitativeValue) -> Parameter {
        Parameter {
            hidden: true,
            default_value: Some(Value::from(value.id)),
            ..self.clone()
        }
    }
}

/// Decode a schema from JSON
///
/// Rejects a schema listing the same parameter twice.
pub fn parse_parameters(json: &str) -> crate::Result<Vec<Parameter>> {
    let parameters: Vec<Parameter> = serde_json::from_str(json)?;
    let mut seen = std::collections::HashSet::new();
    if let Some(duplicate) = parameters.iter().find(|p| !seen.insert(p.id)) {
        return Err(crate::Error::InvalidInput(format!(
            "parameter {} ({}) is listed twice",
            duplicate.id, duplicate.label
        )));
    }
    Ok(parameters)
}

/// Find the first parameter allowed to split a node into branches
///
/// Eligible: qualitative, not hidden, not excluded by config, and with a
/// value count inside `[min_branching_values, max_branching_values]`.
/// Wider enumerations never branch, which bounds the fan-out.
pub fn first_branching_parameter(parameters: &[Parameter], config: &CompilerConfig) -> Option<usize> {
    parameters.iter().position(|p| {
        p.is_qualitative()
            && !p.hidden
            && !config.excluded_parameter_ids.contains(&p.id)
            && (config.min_branching_values..=config.max_branching_values)
                .contains(&p.qualitative_values.len())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn values(n: usize) -> Vec<QualitativeValue> {
        (0..n)
            .map(|i| QualitativeValue::new(i as i64 + 1, &format!("V{}", i), &format!("Value {}", i)))
            .collect()
    }

    #[test]
    fn test_first_branching_parameter_skips_ineligible() {
        let config = CompilerConfig::default();
        let schema = vec![
            Parameter::new(1, "WEIGHT", ParameterType::Double),
            Parameter::qualitative(2, "WIDE", values(5)),
            Parameter::qualitative(3, "SINGLE", values(1)),
            Parameter::qualitative(4, "HIDDEN", values(2)).with_hidden(true),
            Parameter::qualitative(5, "SORTING", values(3)),
        ];

        assert_eq!(first_branching_parameter(&schema, &config), Some(4));
    }

    #[test]
    fn test_first_branching_parameter_respects_exclusions() {
        let config = CompilerConfig {
            excluded_parameter_ids: vec![ParameterId(2)],
            ..CompilerConfig::default()
        };
        let schema = vec![
            Parameter::qualitative(2, "CHILD_GEAR", values(2)),
            Parameter::qualitative(3, "DISCARD_OR_LANDING", values(2)),
        ];

        assert_eq!(first_branching_parameter(&schema, &config), Some(1));
    }

    #[test]
    fn test_first_branching_parameter_none() {
        let config = CompilerConfig::default();
        assert_eq!(first_branching_parameter(&[], &config), None);
        let schema = vec![Parameter::new(1, "LENGTH", ParameterType::Integer)];
        assert_eq!(first_branching_parameter(&schema, &config), None);
    }

    #[test]
    fn test_for_value_is_hidden_and_pinned() {
        let p = Parameter::qualitative(7, "SEX", values(2));
        let pinned = p.for_value(&p.qualitative_values[1]);

        assert!(pinned.hidden);
        assert!(!p.hidden);
        assert_eq!(pinned.default_value, Some(json!(2)));
        assert_eq!(pinned.id, p.id);
    }

    #[test]
    fn test_parse_parameters_rejects_duplicates() {
        let ok = parse_parameters(r#"[{"id": 1, "label": "A", "type": "double"}]"#).unwrap();
        assert_eq!(ok.len(), 1);

        let result = parse_parameters(
            r#"[{"id": 1, "label": "A", "type": "double"}, {"id": 1, "label": "B", "type": "integer"}]"#,
        );
        assert!(matches!(result, Err(crate::Error::InvalidInput(_))));

        assert!(matches!(parse_parameters("[{"), Err(crate::Error::Json(_))));
    }

    #[test]
    fn test_parameter_deserialize() {
        let p: Parameter = serde_json::from_value(json!({
            "id": 42,
            "label": "DISCARD_OR_LANDING",
            "type": "qualitative_value",
            "qualitativeValues": [
                {"id": 190, "label": "LAN", "name": "Landing"},
                {"id": 191, "label": "DIS", "name": "Discard"}
            ]
        }))
        .unwrap();

        assert!(p.is_qualitative());
        assert_eq!(p.id, ParameterId(42));
        assert_eq!(p.qualitative_values.len(), 2);
        assert!(!p.hidden);

        let q: Parameter =
            serde_json::from_value(json!({"id": 1, "label": "W", "type": "quantitative"})).unwrap();
        assert_eq!(q.parameter_type, ParameterType::Double);
    }
}
