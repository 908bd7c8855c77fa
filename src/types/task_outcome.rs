//! Result returned by the task delegate for one execution attempt.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeStatus {
  Success,
  Fail,
}

impl fmt::Display for OutcomeStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      OutcomeStatus::Success => write!(f, "success"),
      OutcomeStatus::Fail => write!(f, "fail"),
    }
  }
}

/// Result of executing a single task node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskOutcome {
  pub status: OutcomeStatus,
  #[serde(default)]
  pub output: Value,
  #[serde(default)]
  pub failure_reason: Option<String>,
  /// Writes keyed by `node.attribute`, committed atomically when the node completes.
  #[serde(default)]
  pub context_updates: BTreeMap<String, Value>,
}

impl TaskOutcome {
  pub fn success(output: impl Into<Value>) -> Self {
    Self {
      status: OutcomeStatus::Success,
      output: output.into(),
      failure_reason: None,
      context_updates: BTreeMap::new(),
    }
  }

  pub fn fail(reason: impl Into<String>) -> Self {
    Self {
      status: OutcomeStatus::Fail,
      output: Value::Null,
      failure_reason: Some(reason.into()),
      context_updates: BTreeMap::new(),
    }
  }

  pub fn with_update(mut self, key: &str, value: Value) -> Self {
    self.context_updates.insert(key.to_string(), value);
    self
  }

  pub fn is_success(&self) -> bool {
    self.status == OutcomeStatus::Success
  }
}
