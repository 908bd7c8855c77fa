//! Normalized machine definition supplied by the external loader.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::instrument;

use super::{MachineEdge, MachineNode};
use crate::error::EngineError;
use crate::topology::Topology;

/// Normalized machine definition: title, global attributes, nodes and edges.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MachineDefinition {
  pub title: String,
  #[serde(default)]
  pub attributes: Map<String, Value>,
  pub nodes: Vec<MachineNode>,
  #[serde(default)]
  pub edges: Vec<MachineEdge>,
}

impl MachineDefinition {
  pub fn new(title: impl Into<String>) -> Self {
    Self {
      title: title.into(),
      attributes: Map::new(),
      nodes: vec![],
      edges: vec![],
    }
  }

  pub fn with_attr(mut self, key: &str, value: Value) -> Self {
    self.attributes.insert(key.to_string(), value);
    self
  }

  pub fn with_node(mut self, node: MachineNode) -> Self {
    self.nodes.push(node);
    self
  }

  pub fn with_edge(mut self, edge: MachineEdge) -> Self {
    self.edges.push(edge);
    self
  }

  /// Parses and validates a definition from JSON.
  #[instrument(level = "trace", skip(json))]
  pub fn from_json(json: &str) -> Result<Self, EngineError> {
    let def: MachineDefinition =
      serde_json::from_str(json).map_err(|e| EngineError::ParseInput(e.to_string()))?;
    def.validate()?;
    Ok(def)
  }

  /// Validates a definition from an untyped JSON value (used by definition-swap requests).
  pub fn from_value(value: Value) -> Result<Self, EngineError> {
    let obj = value
      .as_object()
      .ok_or_else(|| EngineError::ParseInput("definition must be an object".to_string()))?;
    for key in ["title", "nodes", "edges"] {
      if !obj.contains_key(key) {
        return Err(EngineError::ParseInput(format!(
          "definition is missing '{}'",
          key
        )));
      }
    }
    let def: MachineDefinition =
      serde_json::from_value(value).map_err(|e| EngineError::ParseInput(e.to_string()))?;
    def.validate()?;
    Ok(def)
  }

  /// Structural checks plus full name resolution.
  #[instrument(level = "trace", skip(self))]
  pub fn validate(&self) -> Result<(), EngineError> {
    if self.title.trim().is_empty() {
      return Err(EngineError::ParseInput("machine title is empty".to_string()));
    }
    if self.nodes.is_empty() {
      return Err(EngineError::ParseInput("machine has no nodes".to_string()));
    }
    for n in &self.nodes {
      if n.name.trim().is_empty() {
        return Err(EngineError::ParseInput("node with empty name".to_string()));
      }
    }
    for e in &self.edges {
      if e.targets.is_empty() || e.targets.iter().any(|t| t.trim().is_empty()) {
        return Err(EngineError::ParseInput(format!(
          "edge from {} has no target",
          e.source
        )));
      }
    }
    Topology::build(self).map(|_| ())
  }
}
