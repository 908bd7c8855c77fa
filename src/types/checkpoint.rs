//! Immutable snapshot of a run for later restoration.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::PathCursor;
use crate::context::ExecutionContext;

/// Snapshot of the execution context and every path record at a step boundary.
///
/// Checkpoints are never mutated after creation; restoring one copies its state back into the
/// engine, leaving the checkpoint reusable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
  id: u64,
  label: Option<String>,
  created_at: DateTime<Utc>,
  steps: u64,
  context: ExecutionContext,
  paths: Vec<PathCursor>,
}

impl Checkpoint {
  pub(crate) fn new(
    id: u64,
    label: Option<String>,
    steps: u64,
    context: ExecutionContext,
    paths: Vec<PathCursor>,
  ) -> Self {
    Self {
      id,
      label,
      created_at: Utc::now(),
      steps,
      context,
      paths,
    }
  }

  pub fn id(&self) -> u64 {
    self.id
  }

  pub fn label(&self) -> Option<&str> {
    self.label.as_deref()
  }

  pub fn created_at(&self) -> DateTime<Utc> {
    self.created_at
  }

  /// Steps executed when the snapshot was taken.
  pub fn steps(&self) -> u64 {
    self.steps
  }

  pub fn context(&self) -> &ExecutionContext {
    &self.context
  }

  pub fn paths(&self) -> &[PathCursor] {
    &self.paths
  }
}
