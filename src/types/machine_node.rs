//! A node of a machine definition.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{Annotation, AnnotationSet};

/// A node as supplied by the definition loader.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MachineNode {
  /// Name within its nesting scope (a fully qualified name is also accepted).
  pub name: String,
  /// Declared type, if any (matched case-insensitively).
  #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
  pub node_type: Option<String>,
  #[serde(default)]
  pub attributes: Map<String, Value>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub parent: Option<String>,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub annotations: Vec<Annotation>,
}

impl MachineNode {
  pub fn new(name: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      node_type: None,
      attributes: Map::new(),
      parent: None,
      annotations: vec![],
    }
  }

  pub fn with_type(mut self, node_type: &str) -> Self {
    self.node_type = Some(node_type.to_string());
    self
  }

  pub fn with_attr(mut self, key: &str, value: Value) -> Self {
    self.attributes.insert(key.to_string(), value);
    self
  }

  pub fn with_parent(mut self, parent: &str) -> Self {
    self.parent = Some(parent.to_string());
    self
  }

  pub fn with_annotation(mut self, text: &str) -> Self {
    if let Some(a) = Annotation::parse(text) {
      self.annotations.push(a);
    }
    self
  }

  pub fn annotation_set(&self) -> AnnotationSet {
    AnnotationSet::from_annotations(&self.annotations)
  }

  /// The last segment of the name.
  pub fn short_name(&self) -> &str {
    self.name.rsplit('.').next().unwrap_or(&self.name)
  }
}
