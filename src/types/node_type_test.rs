//! Tests for `NodeType`.

use super::NodeType;

#[test]
fn parses_case_insensitively() {
  assert_eq!("Task".parse::<NodeType>(), Ok(NodeType::Task));
  assert_eq!(" CONTEXT ".parse::<NodeType>(), Ok(NodeType::Context));
  assert!("widget".parse::<NodeType>().is_err());
}

#[test]
fn display_roundtrips() {
  for t in [
    NodeType::Task,
    NodeType::State,
    NodeType::Context,
    NodeType::Tool,
    NodeType::Init,
    NodeType::Input,
    NodeType::Output,
    NodeType::Resource,
    NodeType::Process,
    NodeType::Note,
  ] {
    assert_eq!(t.to_string().parse::<NodeType>(), Ok(t));
  }
}

#[test]
fn executable_and_data_roles_are_disjoint() {
  assert!(NodeType::Task.is_executable());
  assert!(NodeType::Init.is_executable());
  assert!(!NodeType::Context.is_executable());
  assert!(NodeType::Context.is_data());
  assert!(NodeType::Output.is_data());
  assert!(!NodeType::Tool.is_executable() && !NodeType::Tool.is_data());
  assert!(!NodeType::Note.is_executable() && !NodeType::Note.is_data());
}
