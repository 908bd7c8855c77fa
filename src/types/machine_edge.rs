//! An edge of a machine definition.

use serde::{Deserialize, Serialize};

use super::{Annotation, AnnotationSet};

/// Arrow kind; semantic only, traversal ignores it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArrowKind {
  #[default]
  #[serde(alias = "->", alias = "control")]
  ControlFlow,
  #[serde(alias = "-->", alias = "data")]
  DataFlow,
  #[serde(alias = "=>")]
  Transform,
}

/// Structured `{when|unless|if: expr}` clause.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionClause {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub when: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub unless: Option<String>,
  #[serde(rename = "if", default, skip_serializing_if = "Option::is_none")]
  pub if_: Option<String>,
}

/// Condition attached to an edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EdgeCondition {
  Clause(ConditionClause),
  Text(String),
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawEdge {
  source: String,
  #[serde(default)]
  target: Option<String>,
  #[serde(default)]
  targets: Vec<String>,
  #[serde(default)]
  arrow_kind: ArrowKind,
  #[serde(default)]
  condition: Option<EdgeCondition>,
  #[serde(default)]
  label: Option<String>,
  #[serde(default)]
  annotations: Vec<Annotation>,
}

impl From<RawEdge> for MachineEdge {
  fn from(raw: RawEdge) -> Self {
    let mut targets = raw.targets;
    if let Some(t) = raw.target {
      targets.insert(0, t);
    }
    MachineEdge {
      source: raw.source,
      targets,
      arrow_kind: raw.arrow_kind,
      condition: raw.condition,
      label: raw.label,
      annotations: raw.annotations,
    }
  }
}

/// An edge from one source to one or more targets (fan-out).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawEdge", rename_all = "camelCase")]
pub struct MachineEdge {
  pub source: String,
  pub targets: Vec<String>,
  pub arrow_kind: ArrowKind,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub condition: Option<EdgeCondition>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub label: Option<String>,
  #[serde(skip_serializing_if = "Vec::is_empty")]
  pub annotations: Vec<Annotation>,
}

impl MachineEdge {
  pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
    Self {
      source: source.into(),
      targets: vec![target.into()],
      arrow_kind: ArrowKind::ControlFlow,
      condition: None,
      label: None,
      annotations: vec![],
    }
  }

  pub fn fan_out(source: impl Into<String>, targets: &[&str]) -> Self {
    let mut e = Self::new(source, "");
    e.targets = targets.iter().map(|t| t.to_string()).collect();
    e
  }

  pub fn when(mut self, expr: &str) -> Self {
    self.condition = Some(EdgeCondition::Clause(ConditionClause {
      when: Some(expr.to_string()),
      ..Default::default()
    }));
    self
  }

  pub fn unless(mut self, expr: &str) -> Self {
    self.condition = Some(EdgeCondition::Clause(ConditionClause {
      unless: Some(expr.to_string()),
      ..Default::default()
    }));
    self
  }

  pub fn with_label(mut self, label: &str) -> Self {
    self.label = Some(label.to_string());
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
}
