//! `@name(value)` annotations on nodes and edges.

use serde::{Deserialize, Deserializer, Serialize};
use tracing::debug;

/// One raw annotation, e.g. `@retry(3)` or `@checkpoint`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Annotation {
  pub name: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub value: Option<String>,
}

impl Annotation {
  pub fn new(name: impl Into<String>, value: Option<&str>) -> Self {
    Self {
      name: name.into(),
      value: value.map(str::to_string),
    }
  }

  /// Parses the textual form `@name` or `@name(value)`.
  pub fn parse(text: &str) -> Option<Self> {
    let text = text.trim().trim_start_matches('@');
    if text.is_empty() {
      return None;
    }
    match text.find('(') {
      Some(open) => {
        let name = text[..open].trim();
        let inner = text[open + 1..].trim_end().strip_suffix(')')?;
        let value = crate::expression::strip_quotes(inner);
        Some(Self::new(name, (!value.is_empty()).then_some(value)))
      }
      None => Some(Self::new(text, None)),
    }
  }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawAnnotation {
  Text(String),
  Structured { name: String, value: Option<String> },
}

impl<'de> Deserialize<'de> for Annotation {
  fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    match RawAnnotation::deserialize(deserializer)? {
      RawAnnotation::Text(s) => Annotation::parse(&s)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid annotation: {}", s))),
      RawAnnotation::Structured { name, value } => Ok(Annotation {
        name: name.trim_start_matches('@').to_string(),
        value: value.map(|v| crate::expression::strip_quotes(&v).to_string()),
      }),
    }
  }
}

/// When a task node's delegated work starts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatchMode {
  /// Invoke on entry and await within the step.
  #[default]
  Eager,
  /// Spawn on entry; collect on the path's next step.
  Async,
  /// Invoke on first result access (the path's next step).
  Lazy,
}

/// Parsed, typed view of an annotation list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotationSet {
  pub retry: Option<u32>,
  pub timeout_ms: Option<u64>,
  pub checkpoint: bool,
  pub dispatch: DispatchMode,
  pub barrier: Option<String>,
  pub priority: Option<i64>,
  pub compensate: bool,
}

impl AnnotationSet {
  pub fn from_annotations(annotations: &[Annotation]) -> Self {
    let mut set = AnnotationSet::default();
    for a in annotations {
      let value = a.value.as_deref().map(str::trim);
      match a.name.to_ascii_lowercase().as_str() {
        "retry" => set.retry = value.and_then(|v| v.parse().ok()),
        "timeout" => set.timeout_ms = value.and_then(|v| v.parse().ok()),
        "checkpoint" => set.checkpoint = true,
        "async" => set.dispatch = DispatchMode::Async,
        "eager" => set.dispatch = DispatchMode::Eager,
        "lazy" => set.dispatch = DispatchMode::Lazy,
        "barrier" => {
          set.barrier = value
            .map(crate::expression::strip_quotes)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
        }
        "priority" => set.priority = value.and_then(|v| v.parse().ok()),
        "compensate" => set.compensate = true,
        other => debug!(annotation = %other, "ignoring unknown annotation"),
      }
    }
    set
  }
}
