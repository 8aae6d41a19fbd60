//! Declarative business rules
//!
//! A rule forest (`RuleVO` entities from the referential service) is loaded
//! once into a [`RuleSet`], resolving every controlled attribute through an
//! [`AccessorMap`] for the entity type, then evaluated any number of times
//! against entities with [`RuleSet::control`].
//!
//! # Example
//! ```
//! use catchtree_common::rules::{AccessorMap, Operator, Rule, RuleSet};
//! use serde_json::json;
//!
//! let rules = vec![Rule::new("WEIGHT_REQUIRED", "weight", Operator::NotNull)
//!     .with_message("Weight is required")];
//! let set = RuleSet::load(rules, &AccessorMap::json_paths()).unwrap();
//!
//! assert!(set.valid(&json!({"weight": 1.5})).unwrap());
//! let errors = set.control(&json!({})).unwrap().unwrap();
//! assert_eq!(errors["weight"]["WEIGHT_REQUIRED"], "Weight is required");
//! ```

pub mod accessor;
pub mod engine;

pub use accessor::{AccessorMap, Getter};
pub use engine::{test_value, ErrorMap, RuleSet};

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Comparison operator of a rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Operator {
    #[default]
    #[serde(rename = "=")]
    Equal,
    #[serde(rename = "!=")]
    NotEqual,
    #[serde(rename = ">")]
    Greater,
    #[serde(rename = ">=")]
    GreaterOrEqual,
    #[serde(rename = "<")]
    Less,
    #[serde(rename = "<=")]
    LessOrEqual,
    #[serde(rename = "IN")]
    In,
    #[serde(rename = "NOT IN")]
    NotIn,
    #[serde(rename = "BETWEEN")]
    Between,
    #[serde(rename = "NULL")]
    Null,
    #[serde(rename = "NOT NULL")]
    NotNull,
}

impl Operator {
    pub const ALL: [Operator; 11] = [
        Operator::Equal,
        Operator::NotEqual,
        Operator::Greater,
        Operator::GreaterOrEqual,
        Operator::Less,
        Operator::LessOrEqual,
        Operator::In,
        Operator::NotIn,
        Operator::Between,
        Operator::Null,
        Operator::NotNull,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Equal => "=",
            Operator::NotEqual => "!=",
            Operator::Greater => ">",
            Operator::GreaterOrEqual => ">=",
            Operator::Less => "<",
            Operator::LessOrEqual => "<=",
            Operator::In => "IN",
            Operator::NotIn => "NOT IN",
            Operator::Between => "BETWEEN",
            Operator::Null => "NULL",
            Operator::NotNull => "NOT NULL",
        }
    }

    /// Whether [`test_value`] can evaluate this operator
    pub fn is_implemented(&self) -> bool {
        matches!(
            self,
            Operator::Equal | Operator::NotEqual | Operator::In | Operator::Null | Operator::NotNull
        )
    }

    /// Logical negation of the operator
    ///
    /// `BETWEEN` has no single-operator negation.
    pub fn inverse(&self) -> Result<Operator> {
        Ok(match self {
            Operator::Equal => Operator::NotEqual,
            Operator::NotEqual => Operator::Equal,
            Operator::Less => Operator::GreaterOrEqual,
            Operator::Greater => Operator::LessOrEqual,
            Operator::GreaterOrEqual => Operator::Less,
            Operator::LessOrEqual => Operator::Greater,
            Operator::In => Operator::NotIn,
            Operator::NotIn => Operator::In,
            Operator::Null => Operator::NotNull,
            Operator::NotNull => Operator::Null,
            Operator::Between => return Err(Error::OperatorNotImplemented(*self)),
        })
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operator {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        Operator::ALL
            .iter()
            .find(|op| op.as_str().eq_ignore_ascii_case(s))
            .copied()
            .ok_or_else(|| Error::InvalidRule(format!("unknown operator: {:?}", s)))
    }
}

/// Rule definition, as loaded from the referential service (`RuleVO`)
///
/// Rules nest: a precondition rule gates the evaluation of its children;
/// any other rule reports one error when its test fails.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(default)]
    pub label: String,
    /// Dotted attribute path on the controlled entity
    #[serde(default, alias = "name")]
    pub controlled_attribute: String,
    #[serde(default)]
    pub operator: Operator,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<Vec<Value>>,
    #[serde(default, alias = "errorMessage", skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default)]
    pub bidirectional: bool,
    #[serde(default)]
    pub precondition: bool,
    /// Severity hint for the form layer; the engine ignores it
    #[serde(default)]
    pub blocking: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Rule>,
}

impl Rule {
    pub fn new(label: &str, controlled_attribute: &str, operator: Operator) -> Self {
        Self {
            label: label.to_string(),
            controlled_attribute: controlled_attribute.to_string(),
            operator,
            ..Self::default()
        }
    }

    /// Precondition rule gating `children`
    pub fn precondition(label: &str, controlled_attribute: &str, operator: Operator, children: Vec<Rule>) -> Self {
        Self {
            precondition: true,
            children,
            ..Self::new(label, controlled_attribute, operator)
        }
    }

    pub fn with_value(mut self, value: impl Into<Value>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn with_values<V: Into<Value>>(mut self, values: impl IntoIterator<Item = V>) -> Self {
        self.values = Some(values.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_message(mut self, message: &str) -> Self {
        self.message = Some(message.to_string());
        self
    }

    /// Value the controlled attribute is compared with
    ///
    /// A non-blank `value` wins over `values`; a list is returned as an array.
    pub fn expected(&self) -> Option<Value> {
        match &self.value {
            Some(v) if !crate::values::is_empty_value(v) => Some(v.clone()),
            _ => self.values.clone().map(Value::Array),
        }
    }

    /// Key of this rule's entry in an error map
    pub fn error_key(&self) -> &str {
        if self.label.is_empty() {
            self.operator.as_str()
        } else {
            &self.label
        }
    }

    pub fn error_message(&self) -> &str {
        self.message.as_deref().unwrap_or("")
    }

    /// Structural checks done when loading a rule forest
    pub fn check(&self) -> Result<()> {
        if self.controlled_attribute.trim().is_empty() {
            return Err(Error::InvalidRule(format!(
                "rule '{}' has no controlled attribute",
                self.label
            )));
        }
        if self.precondition && self.children.is_empty() {
            return Err(Error::InvalidRule(format!(
                "precondition rule '{}' has no children rules",
                self.label
            )));
        }
        Ok(())
    }

    /// Copy of this rule (and its children) with every operator inverted
    pub fn not(&self) -> Result<Rule> {
        Ok(Rule {
            operator: self.operator.inverse()?,
            children: self.children.iter().map(Rule::not).collect::<Result<Vec<_>>>()?,
            ..self.clone()
        })
    }
}
