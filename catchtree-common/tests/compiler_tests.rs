//! Integration tests for the batch model compiler
//!
//! Covers the tree shape produced from a schema, the merge with existing
//! data, the depth bound, and recompilation of an edited tree.

use catchtree_common::batch::Batch;
use catchtree_common::config::CompilerConfig;
use catchtree_common::model::compiler::{compile, create_model, recompile, to_batch};
use catchtree_common::schema::{Parameter, ParameterId, ParameterType, QualitativeValue};
use catchtree_common::tree::NodeId;
use catchtree_common::BatchModelTree;
use serde_json::{json, Value};

fn qualitative(id: i32, label: &str, value_labels: &[&str]) -> Parameter {
    let values = value_labels
        .iter()
        .enumerate()
        .map(|(i, l)| QualitativeValue::new(id as i64 * 100 + i as i64, l, &format!("{} {}", label, l)))
        .collect();
    Parameter::qualitative(id, label, values)
}

fn root(tree: &BatchModelTree) -> NodeId {
    tree.root().expect("compiled tree has a root")
}

/// (label, depth, own labels, child labels) for every node, in pre-order
fn shape(tree: &BatchModelTree) -> Vec<(String, usize, Vec<String>, Vec<String>)> {
    tree.iter()
        .map(|n| {
            (
                n.label().to_string(),
                n.depth(),
                n.own_parameters.iter().map(|p| p.label.clone()).collect(),
                n.child_parameters.iter().map(|p| p.label.clone()).collect(),
            )
        })
        .collect()
}

#[test]
fn test_single_branching_parameter() {
    let schema = vec![
        Parameter::new(1, "P1", ParameterType::Double),
        qualitative(2, "P2", &["A", "B"]),
    ];
    let tree = compile(None, &schema, &CompilerConfig::with_max_depth(3));

    let root = tree.node(root(&tree)).unwrap();
    assert_eq!(root.own_parameters, vec![schema[0].clone()]);
    assert!(root.child_parameters.is_empty());

    let children: Vec<_> = root.children().collect();
    assert_eq!(children.len(), 2);
    assert_eq!(children[0].label(), "SORTING_BATCH#A");
    assert_eq!(children[1].label(), "SORTING_BATCH#B");
    for child in children {
        assert_eq!(child.own_parameters.len(), 1);
        assert_eq!(child.own_parameters[0].id, ParameterId(2));
        assert!(child.own_parameters[0].hidden);
        assert!(child.child_parameters.is_empty());
        assert!(!child.has_children());
    }
}

#[test]
fn test_no_branching_parameter_gives_single_node() {
    let schema = vec![
        Parameter::new(1, "WEIGHT", ParameterType::Double),
        qualitative(2, "SPECIES", &["COD", "HAD", "WHG", "POK", "MAC"]),
        qualitative(3, "SINGLE", &["X"]),
    ];
    let tree = compile(None, &schema, &CompilerConfig::default());

    assert_eq!(tree.len(), 1);
    let root = tree.node(root(&tree)).unwrap();
    assert!(root.own_parameters.is_empty());
    assert_eq!(root.child_parameters, schema);
}

#[test]
fn test_empty_schema_gives_disabled_hidden_root() {
    let tree = compile(None, &[], &CompilerConfig::default());

    assert_eq!(tree.len(), 1);
    let root = tree.node(root(&tree)).unwrap();
    assert!(root.disabled);
    assert!(root.hidden);
    assert!(root.own_parameters.is_empty());
    assert!(root.child_parameters.is_empty());
}

#[test]
fn test_depth_exhaustion() {
    let schema = vec![
        qualitative(1, "Q1", &["A", "B"]),
        qualitative(2, "Q2", &["A", "B"]),
        qualitative(3, "Q3", &["A", "B"]),
        qualitative(4, "Q4", &["A", "B"]),
    ];
    let tree = compile(None, &schema, &CompilerConfig::with_max_depth(2));

    assert_eq!(tree.height(), 2);
    assert_eq!(tree.len(), 1 + 2 + 4);

    let deepest: Vec<_> = tree.iter().filter(|n| n.depth() == 2).collect();
    assert_eq!(deepest.len(), 4);
    for node in deepest {
        assert!(!node.has_children());
        let labels: Vec<&str> = node.child_parameters.iter().map(|p| p.label.as_str()).collect();
        assert_eq!(labels, vec!["Q3", "Q4"]);
        assert!(!node.child_parameters[0].hidden);
    }
}

#[test]
fn test_depth_bound_and_fan_out_hold_for_every_depth() {
    let schema = vec![
        Parameter::new(1, "WEIGHT", ParameterType::Double),
        qualitative(2, "Q1", &["A", "B", "C"]),
        qualitative(3, "Q2", &["A", "B"]),
        Parameter::new(4, "COUNT", ParameterType::Integer),
        qualitative(5, "Q3", &["A", "B"]),
        qualitative(6, "Q4", &["A", "B", "C"]),
    ];

    for max_depth in 0..=5 {
        let tree = compile(None, &schema, &CompilerConfig::with_max_depth(max_depth));
        assert!(tree.height() <= max_depth, "max_depth {}", max_depth);

        for node in tree.iter() {
            if node.has_children() {
                let branching = &node.children().next().unwrap().item().own_parameters[0];
                assert_eq!(node.child_count(), branching.qualitative_values.len());
                assert!(node.child_parameters.is_empty());
            } else {
                assert!(node.depth() <= max_depth);
            }
        }
    }
}

#[test]
fn test_excluded_parameter_never_branches() {
    let schema = vec![qualitative(1, "CHILD_GEAR", &["A", "B"]), qualitative(2, "SEX", &["M", "F"])];
    let config = CompilerConfig {
        excluded_parameter_ids: vec![ParameterId(1)],
        ..CompilerConfig::default()
    };
    let tree = compile(None, &schema, &config);

    let root = tree.node(root(&tree)).unwrap();
    assert_eq!(root.own_parameters, vec![schema[0].clone()]);
    let labels: Vec<&str> = root.children().map(|c| c.item().label()).collect();
    assert_eq!(labels, vec!["SORTING_BATCH#M", "SORTING_BATCH#F"]);
}

#[test]
fn test_existing_children_matched_by_value() {
    let schema = vec![
        qualitative(1, "DISCARD_OR_LANDING", &["LAN", "DIS"]),
        Parameter::new(2, "WEIGHT", ParameterType::Double),
    ];
    let data: Batch = serde_json::from_value(json!({
        "id": 1,
        "label": "CATCH_BATCH",
        "rankOrder": 1,
        "children": [
            // Stored in reverse order, value as a string
            {"id": 11, "label": "OLD#DIS", "measurementValues": {"1": "101", "2": 3.2}},
            {"id": 10, "label": "OLD#LAN", "measurementValues": {"1": 100, "2": 12.5}}
        ]
    }))
    .unwrap();

    let tree = compile(Some(&data), &schema, &CompilerConfig::default());

    let root = tree.node(root(&tree)).unwrap();
    assert_eq!(root.batch.id, Some(1));
    let children: Vec<_> = root.children().collect();
    assert_eq!(children[0].batch.id, Some(10));
    assert_eq!(children[0].label(), "SORTING_BATCH#LAN");
    assert_eq!(children[0].batch.rank_order, Some(1));
    assert_eq!(children[0].measurement_values()[&ParameterId(2)], json!(12.5));
    assert_eq!(children[1].batch.id, Some(11));
    assert_eq!(children[1].label(), "SORTING_BATCH#DIS");
    assert_eq!(children[1].batch.rank_order, Some(2));

    // Source data is untouched
    assert_eq!(data.children[0].label, "OLD#DIS");
}

#[test]
fn test_unmatched_existing_children_are_dropped() {
    let schema = vec![qualitative(1, "Q1", &["A", "B"])];
    let mut data = Batch::catch_batch("CATCH_BATCH");
    let mut stray = Batch::with_label("STRAY");
    stray.measurement_values.insert(ParameterId(1), json!(999));
    data.children.push(stray);

    let tree = compile(Some(&data), &schema, &CompilerConfig::default());

    assert_eq!(tree.len(), 3);
    assert!(tree.find_by_label("STRAY").is_none());
    let flattened = to_batch(&tree).unwrap();
    assert_eq!(flattened.count(), 3);
}

#[test]
fn test_terminal_nodes_keep_existing_children_verbatim() {
    let schema = vec![qualitative(1, "Q1", &["A", "B"]), qualitative(2, "Q2", &["A", "B"])];
    let data: Batch = serde_json::from_value(json!({
        "label": "CATCH_BATCH",
        "children": [{
            "label": "SORTING_BATCH#A",
            "measurementValues": {"1": 100},
            "children": [
                {"label": "SORTING_BATCH#A.A", "measurementValues": {"2": 200}, "individualCount": 7,
                 "children": [{"label": "SORTING_BATCH_INDIVIDUAL#1"}]}
            ]
        }]
    }))
    .unwrap();

    let tree = compile(Some(&data), &schema, &CompilerConfig::with_max_depth(1));

    assert_eq!(tree.height(), 1);
    let a = tree.find_by_label("SORTING_BATCH#A").unwrap();
    let node = tree.node(a).unwrap();
    assert!(!node.has_children());
    assert_eq!(node.child_parameters[0].label, "Q2");
    assert_eq!(node.batch.children.len(), 1);
    assert_eq!(node.batch.children[0].extra["individualCount"], json!(7));
    assert_eq!(node.batch.children[0].count(), 2);

    // Flattening re-emits the retained data
    let flattened = to_batch(&tree).unwrap();
    assert_eq!(flattened.children[0].children, data.children[0].children);
}

#[test]
fn test_recompiling_flattened_tree_is_idempotent() {
    let schema = vec![
        Parameter::new(1, "TOTAL_WEIGHT", ParameterType::Double),
        qualitative(2, "DISCARD_OR_LANDING", &["LAN", "DIS"]),
        qualitative(3, "SEX", &["M", "F", "U"]),
        Parameter::new(4, "WEIGHT", ParameterType::Double),
    ];
    let config = CompilerConfig::default();
    let mut first = compile(None, &schema, &config);

    let target = first.find_by_label("SORTING_BATCH#DIS.F").unwrap();
    first
        .get_mut(target)
        .unwrap()
        .batch
        .extra
        .insert("sentinel".to_string(), json!("kept"));

    let data = to_batch(&first).unwrap();
    let second = compile(Some(&data), &schema, &config);

    assert_eq!(shape(&first), shape(&second));
    let again = second.find_by_label("SORTING_BATCH#DIS.F").unwrap();
    assert_eq!(second.get(again).unwrap().batch.extra.get("sentinel"), Some(&json!("kept")));
    assert_eq!(second.get(again).unwrap().path, "children.1.children.1");
}

#[test]
fn test_recompile_keeps_ui_state() {
    let catch = vec![Parameter::new(1, "TOTAL_WEIGHT", ParameterType::Double)];
    let schema = vec![qualitative(2, "DISCARD_OR_LANDING", &["LAN", "DIS"])];
    let config = CompilerConfig::default();
    let mut previous = create_model(None, &schema, &catch, &config);

    let dis = previous.find_by_label("SORTING_BATCH#DIS").unwrap();
    {
        let node = previous.get_mut(dis).unwrap();
        node.selected = true;
        node.invalid = true;
        node.error = Some("Missing weight".to_string());
        node.state.insert("expanded".to_string(), Value::Bool(true));
    }

    let extended = vec![schema[0].clone(), Parameter::new(3, "WEIGHT", ParameterType::Double)];
    let tree = recompile(&previous, &extended, &catch, &config);

    let dis = tree.find_by_label("SORTING_BATCH#DIS").unwrap();
    let node = tree.get(dis).unwrap();
    assert!(node.selected);
    assert!(node.invalid);
    assert_eq!(node.error.as_deref(), Some("Missing weight"));
    assert_eq!(node.state.get("expanded"), Some(&Value::Bool(true)));
    assert_eq!(node.child_parameters.len(), 1);

    let lan = tree.find_by_label("SORTING_BATCH#LAN").unwrap();
    assert!(!tree.get(lan).unwrap().selected);
}

#[test]
fn test_create_model_root() {
    let catch = vec![Parameter::new(1, "TOTAL_WEIGHT", ParameterType::Double)];
    let tree = create_model(None, &[], &catch, &CompilerConfig::default());

    let root = tree.node(root(&tree)).unwrap();
    assert_eq!(root.name.as_deref(), Some("Catch"));
    assert_eq!(root.own_parameters, catch);
    assert!(!root.disabled);
    assert!(!root.hidden);
}
