//! One entry of the ordered transition history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionRecord {
  pub from: String,
  pub to: String,
  pub label: Option<String>,
  pub timestamp: DateTime<Utc>,
}

impl TransitionRecord {
  pub fn now(from: &str, to: &str, label: Option<&str>) -> Self {
    Self {
      from: from.to_string(),
      to: to.to_string(),
      label: label.map(str::to_string),
      timestamp: Utc::now(),
    }
  }
}
