//! Rule forest evaluation
//!
//! Failed business rules are data: they come back as an [`ErrorMap`], never
//! as `Err`. The only evaluation error is a rule using an operator that is
//! declared but not implemented.

use super::accessor::{AccessorMap, Getter};
use super::{Operator, Rule};
use crate::tree::{NodeId, Tree};
use crate::values::value_equals;
use crate::{Error, Result};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use tracing::trace;

/// Errors by controlled attribute, then by rule label → message
pub type ErrorMap = BTreeMap<String, BTreeMap<String, String>>;

/// One loaded rule: its definition (children excluded) and resolved getter
pub struct CompiledRule<E> {
    pub rule: Rule,
    getter: Getter<E>,
}

impl<E> Clone for CompiledRule<E> {
    fn clone(&self) -> Self {
        Self {
            rule: self.rule.clone(),
            getter: self.getter.clone(),
        }
    }
}

impl<E> fmt::Debug for CompiledRule<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledRule").field("rule", &self.rule).finish()
    }
}

/// Loaded rule forest for entities of type `E`
///
/// Rules are stored in an arena: each rule owns its children and keeps a
/// back-reference to its parent. The forest is immutable once loaded.
#[derive(Debug, Clone)]
pub struct RuleSet<E> {
    tree: Tree<CompiledRule<E>>,
}

impl<E> RuleSet<E> {
    /// Load a rule forest, resolving every controlled attribute once
    ///
    /// Fails on a structurally invalid rule ([`Rule::check`]) or on an
    /// attribute `accessors` does not know.
    pub fn load(rules: Vec<Rule>, accessors: &AccessorMap<E>) -> Result<Self> {
        let mut tree = Tree::new();
        for rule in rules {
            insert_rule(&mut tree, None, rule, accessors)?;
        }
        Ok(Self { tree })
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    /// Number of rules, nested ones included
    pub fn len(&self) -> usize {
        self.tree.len()
    }

    /// Top-level rules
    pub fn roots(&self) -> &[NodeId] {
        self.tree.roots()
    }

    pub fn tree(&self) -> &Tree<CompiledRule<E>> {
        &self.tree
    }

    pub fn rule(&self, id: NodeId) -> Option<&Rule> {
        self.tree.get(id).map(|c| &c.rule)
    }

    /// Evaluate every top-level rule against `entity`
    ///
    /// Returns `Ok(None)` when no rule fails.
    pub fn control(&self, entity: &E) -> Result<Option<ErrorMap>> {
        control(entity, self, self.tree.roots())
    }

    /// True when [`RuleSet::control`] finds no error
    pub fn valid(&self, entity: &E) -> Result<bool> {
        Ok(self.control(entity)?.is_none())
    }

    /// Same forest with every operator inverted
    pub fn negate(&self) -> Result<Self> {
        let mut tree = self.tree.clone();
        let ids: Vec<NodeId> = tree.iter().map(|n| n.id()).collect();
        for id in ids {
            if let Some(compiled) = tree.get_mut(id) {
                compiled.rule = compiled.rule.not()?;
            }
        }
        Ok(Self { tree })
    }
}

fn insert_rule<E>(
    tree: &mut Tree<CompiledRule<E>>,
    parent: Option<NodeId>,
    mut rule: Rule,
    accessors: &AccessorMap<E>,
) -> Result<()> {
    rule.check()?;
    let getter = accessors
        .resolve(&rule.controlled_attribute)
        .ok_or_else(|| Error::UnknownAttribute(rule.controlled_attribute.clone()))?;

    let children = std::mem::take(&mut rule.children);
    let compiled = CompiledRule { rule, getter };
    let id = match parent {
        Some(p) => tree.add_child(p, compiled),
        None => tree.add_root(compiled),
    };
    for child in children {
        insert_rule(tree, Some(id), child, accessors)?;
    }
    Ok(())
}

/// Evaluate `rules` and merge their error maps
///
/// On a key collision the later rule's entry replaces the earlier one.
pub fn control<E>(entity: &E, set: &RuleSet<E>, rules: &[NodeId]) -> Result<Option<ErrorMap>> {
    let mut merged: Option<ErrorMap> = None;
    for &id in rules {
        if let Some(errors) = apply_rule(entity, set, id)? {
            merged.get_or_insert_with(ErrorMap::new).extend(errors);
        }
    }
    Ok(merged)
}

/// Evaluate one rule (and, for a precondition, its children)
///
/// A precondition whose own test fails skips its whole subtree silently; a
/// passing one evaluates its children. Any other rule reports
/// `{attribute: {label: message}}` when its test fails.
pub fn apply_rule<E>(entity: &E, set: &RuleSet<E>, id: NodeId) -> Result<Option<ErrorMap>> {
    let Some(rule) = set.rule(id) else {
        return Ok(None);
    };
    let depth = set.tree.depth(id);

    let passed = test_rule(entity, set, id)?;
    if rule.precondition {
        if !passed {
            trace!("{:indent$}[rule] [{}] precondition KO", "", rule.label, indent = depth * 2);
            return Ok(None);
        }
        trace!("{:indent$}[rule] [{}] precondition OK", "", rule.label, indent = depth * 2);
        return control(entity, set, set.tree.children(id));
    }

    if passed {
        trace!("{:indent$}[rule] [{}] OK", "", rule.label, indent = depth * 2);
        return Ok(None);
    }

    trace!(
        "{:indent$}[rule] [{}] KO - {}",
        "",
        rule.label,
        rule.error_message(),
        indent = depth * 2
    );
    let mut errors = ErrorMap::new();
    errors
        .entry(rule.controlled_attribute.clone())
        .or_default()
        .insert(rule.error_key().to_string(), rule.error_message().to_string());
    Ok(Some(errors))
}

/// Test one rule's own condition against `entity`
pub fn test_rule<E>(entity: &E, set: &RuleSet<E>, id: NodeId) -> Result<bool> {
    let Some(compiled) = set.tree.get(id) else {
        return Ok(true);
    };
    let actual = (compiled.getter)(entity);
    test_value(&actual, compiled.rule.operator, compiled.rule.expected().as_ref())
}

/// Compare an attribute value with a rule's expected value
///
/// - `=` / `!=`: equality, or membership when `expected` is a list
/// - `IN`: some element of `actual` (a scalar counts as a one-element list)
///   is in `expected` (a scalar counts as a one-element list)
/// - `NULL` / `NOT NULL`: `expected` is ignored
///
/// Declared but unimplemented operators return
/// [`Error::OperatorNotImplemented`].
pub fn test_value(actual: &Value, operator: Operator, expected: Option<&Value>) -> Result<bool> {
    let expected = expected.unwrap_or(&Value::Null);
    match operator {
        Operator::Equal => Ok(matches_expected(actual, expected)),
        Operator::NotEqual => Ok(!matches_expected(actual, expected)),
        Operator::In => {
            let candidates = as_list(actual);
            let allowed = as_list(expected);
            Ok(candidates
                .iter()
                .any(|c| allowed.iter().any(|a| value_equals(c, a))))
        }
        Operator::Null => Ok(actual.is_null()),
        Operator::NotNull => Ok(!actual.is_null()),
        Operator::Greater
        | Operator::GreaterOrEqual
        | Operator::Less
        | Operator::LessOrEqual
        | Operator::NotIn
        | Operator::Between => Err(Error::OperatorNotImplemented(operator)),
    }
}

fn matches_expected(actual: &Value, expected: &Value) -> bool {
    match expected {
        Value::Array(items) => items.iter().any(|item| value_equals(actual, item)),
        scalar => value_equals(actual, scalar),
    }
}

fn as_list(value: &Value) -> Vec<&Value> {
    match value {
        Value::Array(items) => items.iter().collect(),
        other => vec![other],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_equal_scalar_and_list() {
        assert!(test_value(&json!("COD"), Operator::Equal, Some(&json!("COD"))).unwrap());
        assert!(test_value(&json!(12), Operator::Equal, Some(&json!("12"))).unwrap());
        assert!(test_value(&json!("HAD"), Operator::Equal, Some(&json!(["COD", "HAD"]))).unwrap());
        assert!(!test_value(&json!("WHG"), Operator::Equal, Some(&json!(["COD", "HAD"]))).unwrap());
    }

    #[test]
    fn test_not_equal_scalar_and_list() {
        assert!(test_value(&json!("HAD"), Operator::NotEqual, Some(&json!("COD"))).unwrap());
        assert!(!test_value(&json!("COD"), Operator::NotEqual, Some(&json!("COD"))).unwrap());
        assert!(test_value(&json!("WHG"), Operator::NotEqual, Some(&json!(["COD", "HAD"]))).unwrap());
        assert!(!test_value(&json!("HAD"), Operator::NotEqual, Some(&json!(["COD", "HAD"]))).unwrap());
    }

    #[test]
    fn test_in_coerces_both_sides() {
        assert!(test_value(&json!("A"), Operator::In, Some(&json!(["A", "B"]))).unwrap());
        assert!(test_value(&json!(["X", "B"]), Operator::In, Some(&json!(["A", "B"]))).unwrap());
        assert!(test_value(&json!(["X", "A"]), Operator::In, Some(&json!("A"))).unwrap());
        assert!(!test_value(&json!(["X", "Y"]), Operator::In, Some(&json!(["A", "B"]))).unwrap());
        assert!(!test_value(&json!([]), Operator::In, Some(&json!(["A"]))).unwrap());
    }

    #[test]
    fn test_null_operators_ignore_expected() {
        assert!(test_value(&Value::Null, Operator::Null, Some(&json!("ignored"))).unwrap());
        assert!(!test_value(&json!(0), Operator::Null, None).unwrap());
        assert!(test_value(&json!(""), Operator::NotNull, None).unwrap());
        assert!(!test_value(&Value::Null, Operator::NotNull, None).unwrap());
    }

    #[test]
    fn test_unimplemented_operators_fail() {
        for op in [
            Operator::Greater,
            Operator::GreaterOrEqual,
            Operator::Less,
            Operator::LessOrEqual,
            Operator::Between,
            Operator::NotIn,
        ] {
            let result = test_value(&json!(1), op, Some(&json!(0)));
            assert!(matches!(result, Err(Error::OperatorNotImplemented(o)) if o == op));
            assert!(!op.is_implemented());
        }
    }

    #[test]
    fn test_load_builds_parent_links() {
        let rules = vec![Rule::precondition(
            "P",
            "species",
            Operator::Equal,
            vec![
                Rule::new("C1", "weight", Operator::NotNull),
                Rule::new("C2", "count", Operator::NotNull),
            ],
        )
        .with_value("COD")];
        let set = RuleSet::load(rules, &AccessorMap::json_paths()).unwrap();

        assert_eq!(set.len(), 3);
        let root = set.roots()[0];
        let children = set.tree().children(root);
        assert_eq!(children.len(), 2);
        assert_eq!(set.tree().parent(children[1]), Some(root));
        assert_eq!(set.rule(children[1]).unwrap().label, "C2");
        // Children live in the arena, not in the stored definition
        assert!(set.rule(root).unwrap().children.is_empty());
    }

    #[test]
    fn test_load_rejects_unknown_attribute() {
        let accessors = AccessorMap::<Value>::new().with("species", |e| e["species"].clone());
        let rules = vec![Rule::new("R", "speceis", Operator::NotNull)];

        let result = RuleSet::load(rules, &accessors);
        assert!(matches!(result, Err(Error::UnknownAttribute(name)) if name == "speceis"));
    }

    #[test]
    fn test_later_rule_wins_on_collision() {
        let rules = vec![
            Rule::new("FIRST", "x", Operator::NotNull).with_message("first"),
            Rule::new("SECOND", "x", Operator::Equal).with_value("A").with_message("second"),
        ];
        let set = RuleSet::load(rules, &AccessorMap::json_paths()).unwrap();

        let errors = set.control(&json!({})).unwrap().unwrap();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors["x"].len(), 1);
        assert_eq!(errors["x"]["SECOND"], "second");
    }

    #[test]
    fn test_negate() {
        let rules = vec![Rule::new("R", "x", Operator::NotNull)];
        let set = RuleSet::load(rules, &AccessorMap::json_paths()).unwrap();
        let negated = set.negate().unwrap();

        assert!(set.valid(&json!({"x": 1})).unwrap());
        assert!(!negated.valid(&json!({"x": 1})).unwrap());
        assert!(negated.valid(&json!({})).unwrap());
    }

    #[test]
    fn test_negate_keeps_structure_of_nested_rules() {
        let rules = vec![Rule::precondition(
            "COD",
            "species",
            Operator::Equal,
            vec![Rule::new("WEIGHT", "weight", Operator::NotNull)],
        )
        .with_value("COD")];
        let set = RuleSet::load(rules, &AccessorMap::json_paths()).unwrap();
        let negated = set.negate().unwrap();

        assert_eq!(negated.len(), 2);
        let root = negated.roots()[0];
        assert_eq!(negated.rule(root).unwrap().operator, Operator::NotEqual);
        assert!(negated.rule(root).unwrap().precondition);
        let child = negated.tree().children(root)[0];
        assert_eq!(negated.rule(child).unwrap().operator, Operator::Null);

        // Precondition now passes for anything but cod, then demands no weight
        assert!(negated.valid(&json!({"species": "COD", "weight": 1})).unwrap());
        assert!(!negated.valid(&json!({"species": "HAD", "weight": 1})).unwrap());
        assert!(negated.valid(&json!({"species": "HAD"})).unwrap());
    }
}
