//! Cursor of one concurrently-progressing path.

use serde::{Deserialize, Serialize};

pub type PathId = usize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PathStatus {
  /// Will execute `current` on its next step.
  Running,
  /// `current` was entered; its delegated work is pending (async or lazy dispatch).
  Parked,
  /// Suspended before traversing a barrier-tagged edge.
  Blocked { barrier: String },
  /// Spawned by fan-out beyond `maxConcurrentPaths`; waiting for a free slot.
  Queued,
  Completed,
  Failed,
  Cancelled,
}

/// An explicit, resumable path record advanced by the engine's driver loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathCursor {
  pub id: PathId,
  pub current: String,
  pub status: PathStatus,
  /// Nodes completed on this path, oldest first.
  pub completed: Vec<String>,
  /// Execution attempts spent on `current`.
  pub attempts: u32,
  /// Edge this path will traverse once its barrier releases.
  pub pending_edge: Option<usize>,
}

impl PathCursor {
  pub fn new(id: PathId, start: impl Into<String>) -> Self {
    Self {
      id,
      current: start.into(),
      status: PathStatus::Running,
      completed: vec![],
      attempts: 0,
      pending_edge: None,
    }
  }

  /// Counts against `maxConcurrentPaths` and participates in barriers.
  pub fn is_live(&self) -> bool {
    matches!(
      self.status,
      PathStatus::Running | PathStatus::Parked | PathStatus::Blocked { .. }
    )
  }

  pub fn is_terminal(&self) -> bool {
    matches!(
      self.status,
      PathStatus::Completed | PathStatus::Failed | PathStatus::Cancelled
    )
  }

  pub fn blocked_at(&self) -> Option<&str> {
    match &self.status {
      PathStatus::Blocked { barrier } => Some(barrier),
      _ => None,
    }
  }
}
