//! Final report of a machine run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use uuid::Uuid;

use super::{PathCursor, TransitionRecord};
use crate::error::RunError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
  /// Every path reached a terminal node without unresolved errors.
  Completed,
  /// The run finished but some paths failed or were cancelled.
  CompletedWithErrors,
  /// The run was halted (fail-fast or a resource limit).
  Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
  pub run_id: Uuid,
  pub title: String,
  pub status: RunStatus,
  pub started_at: DateTime<Utc>,
  pub finished_at: DateTime<Utc>,
  pub steps: u64,
  /// Final attributes per node plus globals.
  pub context: Value,
  pub history: Vec<TransitionRecord>,
  pub visits: BTreeMap<String, u64>,
  pub errors: Vec<RunError>,
  pub paths: Vec<PathCursor>,
}

impl RunResult {
  pub fn is_success(&self) -> bool {
    self.status == RunStatus::Completed
  }
}
