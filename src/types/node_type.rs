//! Runtime role of a machine node.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Runtime role of a machine node, declared or inferred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeType {
  Task,
  State,
  Context,
  Tool,
  Init,
  Input,
  Output,
  Resource,
  Process,
  Note,
}

impl NodeType {
  /// Nodes a path can stand on and execute.
  pub fn is_executable(self) -> bool {
    matches!(
      self,
      NodeType::Task | NodeType::State | NodeType::Init | NodeType::Process
    )
  }

  /// Data-holding nodes whose attributes other nodes read and write.
  pub fn is_data(self) -> bool {
    matches!(
      self,
      NodeType::Context | NodeType::Input | NodeType::Output | NodeType::Resource
    )
  }
}

impl FromStr for NodeType {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    Ok(match s.trim().to_ascii_lowercase().as_str() {
      "task" => NodeType::Task,
      "state" => NodeType::State,
      "context" => NodeType::Context,
      "tool" => NodeType::Tool,
      "init" => NodeType::Init,
      "input" => NodeType::Input,
      "output" => NodeType::Output,
      "resource" => NodeType::Resource,
      "process" => NodeType::Process,
      "note" => NodeType::Note,
      other => return Err(format!("unknown node type: {}", other)),
    })
  }
}

impl fmt::Display for NodeType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let s = match self {
      NodeType::Task => "task",
      NodeType::State => "state",
      NodeType::Context => "context",
      NodeType::Tool => "tool",
      NodeType::Init => "init",
      NodeType::Input => "input",
      NodeType::Output => "output",
      NodeType::Resource => "resource",
      NodeType::Process => "process",
      NodeType::Note => "note",
    };
    f.write_str(s)
  }
}
