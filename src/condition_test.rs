//! Tests for edge condition extraction.

use crate::condition::{condition_from_label, extract};
use crate::types::{ConditionClause, EdgeCondition, MachineEdge};

#[test]
fn no_condition_means_none() {
  assert_eq!(extract(&MachineEdge::new("a", "b")), None);
  assert_eq!(
    extract(&MachineEdge::new("a", "b").with_label("next")),
    None
  );
}

#[test]
fn structured_when_and_unless() {
  assert_eq!(
    extract(&MachineEdge::new("a", "b").when("status == 'ok'")),
    Some("status == 'ok'".to_string())
  );
  assert_eq!(
    extract(&MachineEdge::new("a", "b").unless("errorCount > 0")),
    Some("!(errorCount > 0)".to_string())
  );
}

#[test]
fn structured_if_clause() {
  let mut e = MachineEdge::new("a", "b");
  e.condition = Some(EdgeCondition::Clause(ConditionClause {
    if_: Some("ready".into()),
    ..Default::default()
  }));
  assert_eq!(extract(&e), Some("ready".to_string()));
}

#[test]
fn structured_condition_beats_label() {
  let e = MachineEdge::new("a", "b")
    .when("x > 1")
    .with_label("when: y > 2");
  assert_eq!(extract(&e), Some("x > 1".to_string()));
}

#[test]
fn legacy_label_prefixes() {
  assert_eq!(
    extract(&MachineEdge::new("a", "b").with_label("when: done")),
    Some("done".to_string())
  );
  assert_eq!(
    extract(&MachineEdge::new("a", "b").with_label("\"unless: busy\"")),
    Some("!(busy)".to_string())
  );
  assert_eq!(condition_from_label("IF : ready"), Some("ready".to_string()));
  assert_eq!(condition_from_label("whenever"), None);
}

#[test]
fn text_condition_strips_quotes() {
  let mut e = MachineEdge::new("a", "b");
  e.condition = Some(EdgeCondition::Text("'count > 3'".into()));
  assert_eq!(extract(&e), Some("count > 3".to_string()));
}

#[test]
fn empty_condition_is_none() {
  let mut e = MachineEdge::new("a", "b");
  e.condition = Some(EdgeCondition::Text("  ".into()));
  assert_eq!(extract(&e), None);
}
