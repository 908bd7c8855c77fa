//! Tests for `MachineDefinition` loading and validation.

use serde_json::json;

use super::{ArrowKind, EdgeCondition, MachineDefinition, MachineEdge, MachineNode};
use crate::error::EngineError;

#[test]
fn loads_normalized_json() {
  let def = MachineDefinition::from_json(
    r#"{
      "title": "Review",
      "attributes": {"maxSteps": 20},
      "nodes": [
        {"name": "start", "type": "init"},
        {"name": "review", "attributes": {"prompt": "Review {{ doc.path }}"}, "annotations": ["@retry(2)"]},
        {"name": "doc", "type": "context", "attributes": {"path": "a.md"}}
      ],
      "edges": [
        {"source": "start", "target": "review"},
        {"source": "doc", "target": "review", "arrowKind": "data-flow"},
        {"source": "review", "targets": ["start"], "condition": {"unless": "errorCount > 0"}}
      ]
    }"#,
  )
  .unwrap();
  assert_eq!(def.title, "Review");
  assert_eq!(def.attributes["maxSteps"], json!(20));
  assert_eq!(def.nodes[1].annotation_set().retry, Some(2));
  assert_eq!(def.edges[1].arrow_kind, ArrowKind::DataFlow);
  assert!(matches!(
    def.edges[2].condition,
    Some(EdgeCondition::Clause(ref c)) if c.unless.as_deref() == Some("errorCount > 0")
  ));
}

#[test]
fn text_condition_and_target_list() {
  let e: MachineEdge = serde_json::from_value(json!({
    "source": "a",
    "target": "b",
    "targets": ["c"],
    "condition": "when: x > 1"
  }))
  .unwrap();
  assert_eq!(e.targets, vec!["b", "c"]);
  assert_eq!(e.condition, Some(EdgeCondition::Text("when: x > 1".into())));
}

#[test]
fn malformed_json_is_parse_error() {
  let err = MachineDefinition::from_json("{ not json").unwrap_err();
  assert!(matches!(err, EngineError::ParseInput(_)));
}

#[test]
fn rejects_empty_title_and_nodes() {
  assert!(MachineDefinition::new("").with_node(MachineNode::new("a")).validate().is_err());
  assert!(MachineDefinition::new("t").validate().is_err());
}

#[test]
fn rejects_dangling_edges() {
  let def = MachineDefinition::new("t")
    .with_node(MachineNode::new("a"))
    .with_edge(MachineEdge::new("a", "ghost"));
  assert!(matches!(def.validate(), Err(EngineError::ParseInput(_))));
}

#[test]
fn rejects_duplicate_names_in_scope() {
  let def = MachineDefinition::new("t")
    .with_node(MachineNode::new("a"))
    .with_node(MachineNode::new("a"));
  assert!(def.validate().is_err());
}

#[test]
fn same_short_name_in_different_scopes_is_fine() {
  let def = MachineDefinition::new("t")
    .with_node(MachineNode::new("m1").with_type("state"))
    .with_node(MachineNode::new("m2").with_type("state"))
    .with_node(MachineNode::new("step").with_parent("m1"))
    .with_node(MachineNode::new("step").with_parent("m2"))
    .with_edge(MachineEdge::new("m1.step", "m2.step"));
  assert!(def.validate().is_ok());
}

#[test]
fn swap_request_requires_title_nodes_and_edges() {
  let missing = json!({"title": "t", "nodes": [{"name": "a"}]});
  assert!(MachineDefinition::from_value(missing).is_err());
  let ok = json!({"title": "t", "nodes": [{"name": "a"}], "edges": []});
  assert!(MachineDefinition::from_value(ok).is_ok());
}
