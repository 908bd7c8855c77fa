//! Tests for `ExecutionContext` and its scope view.

use proptest::prelude::*;
use serde_json::json;
use std::collections::BTreeMap;

use crate::context::ExecutionContext;
use crate::error::EngineError;
use crate::expression::{evaluate, evaluate_condition};
use crate::topology::Topology;
use crate::types::{MachineDefinition, MachineEdge, MachineNode};

fn machine() -> Topology {
  let def = MachineDefinition::new("ctx")
    .with_attr("region", json!("eu"))
    .with_node(MachineNode::new("config").with_type("context").with_attr("retries", json!(2)))
    .with_node(MachineNode::new("secrets").with_type("context").with_attr("key", json!("k")))
    .with_node(MachineNode::new("Outer").with_type("state"))
    .with_node(MachineNode::new("work").with_type("task").with_parent("Outer"))
    .with_node(MachineNode::new("loner").with_type("task"))
    .with_edge(MachineEdge::new("Outer", "config"));
  Topology::build(&def).unwrap()
}

#[test]
fn seeded_from_definition() {
  let t = machine();
  let ctx = ExecutionContext::from_topology(&t);
  assert_eq!(ctx.get("config", "retries"), Some(&json!(2)));
  assert_eq!(ctx.globals()["region"], json!("eu"));
  assert_eq!(ctx.error_count(), 0);
  assert_eq!(ctx.active_state(), None);
}

#[test]
fn access_checks() {
  let t = machine();
  let mut ctx = ExecutionContext::from_topology(&t);
  assert!(ctx.write_as(&t, "Outer", "config", "retries", json!(3)).is_ok());
  assert_eq!(ctx.read_as(&t, "Outer.work", "config", "retries").unwrap(), Some(&json!(3)));
  assert!(matches!(
    ctx.write_as(&t, "Outer.work", "config", "retries", json!(9)),
    Err(EngineError::AccessDenied { access: "write", .. })
  ));
  assert!(matches!(
    ctx.read_as(&t, "loner", "secrets", "key"),
    Err(EngineError::AccessDenied { access: "read", .. })
  ));
  assert!(matches!(
    ctx.read_as(&t, "loner", "ghost", "x"),
    Err(EngineError::UnknownNode(_))
  ));
}

#[test]
fn commit_skips_forbidden_writes() {
  let t = machine();
  let mut ctx = ExecutionContext::from_topology(&t);
  let mut updates = BTreeMap::new();
  updates.insert("config.retries".to_string(), json!(5));
  updates.insert("secrets.key".to_string(), json!("leaked"));
  updates.insert("note".to_string(), json!("own"));
  assert_eq!(ctx.commit_updates(&t, "Outer", &updates), 2);
  assert_eq!(ctx.get("config", "retries"), Some(&json!(5)));
  assert_eq!(ctx.get("secrets", "key"), Some(&json!("k")));
  assert_eq!(ctx.get("Outer", "note"), Some(&json!("own")));
}

#[test]
fn view_resolves_nodes_globals_and_builtins() {
  let t = machine();
  let mut ctx = ExecutionContext::from_topology(&t);
  ctx.set("Outer.work", "result", json!({"ok": true}));
  ctx.increment_errors();
  ctx.set_active_state("Outer.work");
  let view = ctx.view(&t, None);
  assert_eq!(evaluate("config.retries + 1", &view).unwrap(), json!(3));
  assert_eq!(evaluate("region", &view).unwrap(), json!("eu"));
  assert!(evaluate_condition("work.result.ok", &view));
  assert!(evaluate_condition("errorCount == 1 && errors == 1", &view));
  assert!(evaluate_condition("activeState == 'Outer.work'", &view));
}

#[test]
fn viewer_cannot_see_ungranted_data() {
  let t = machine();
  let ctx = ExecutionContext::from_topology(&t);
  let view = ctx.view(&t, Some("loner"));
  assert_eq!(evaluate("config.retries", &view).unwrap(), json!(null));
  let inner = ctx.view(&t, Some("Outer.work"));
  assert_eq!(evaluate("config.retries", &inner).unwrap(), json!(2));
  assert_eq!(evaluate("secrets.key", &inner).unwrap(), json!(null));
}

#[test]
fn visible_json_lists_readable_nodes() {
  let t = machine();
  let ctx = ExecutionContext::from_topology(&t);
  let v = ctx.visible_json(&t, "Outer.work");
  assert!(v["nodes"].get("config").is_some());
  assert!(v["nodes"].get("Outer.work").is_some());
  assert!(v["nodes"].get("secrets").is_none());
}

#[test]
fn visits_and_history() {
  let mut ctx = ExecutionContext::default();
  assert_eq!(ctx.visit("a"), 1);
  assert_eq!(ctx.visit("a"), 2);
  ctx.record_transition("a", "b", Some("next"));
  assert_eq!(ctx.visits()["a"], 2);
  assert_eq!(ctx.history()[0].to, "b");
  assert_eq!(ctx.history()[0].label.as_deref(), Some("next"));
}

fn nested_chain(depth: usize) -> Topology {
  let mut def = MachineDefinition::new("deep")
    .with_node(MachineNode::new("shared").with_type("context").with_attr("v", json!(1)))
    .with_node(MachineNode::new("m0").with_type("state"))
    .with_edge(MachineEdge::new("m0", "shared"));
  for i in 1..=depth {
    def = def.with_node(
      MachineNode::new(format!("m{}", i))
        .with_type("state")
        .with_parent(&format!("m{}", i - 1)),
    );
  }
  Topology::build(&def).unwrap()
}

proptest! {
  #[test]
  fn descendants_read_but_never_write_inherited_context(depth in 1usize..6) {
    let t = nested_chain(depth);
    let leaf = t.resolve(&format!("m{}", depth)).unwrap();
    prop_assert!(t.can_read(&leaf, "shared"));
    prop_assert!(!t.can_write(&leaf, "shared"));
    let mut ctx = ExecutionContext::from_topology(&t);
    prop_assert!(ctx.write_as(&t, &leaf, "shared", "v", json!(2)).is_err());
    prop_assert_eq!(ctx.get("shared", "v"), Some(&json!(1)));
  }
}
