//! Bounded store of immutable checkpoints.

use std::collections::VecDeque;
use tracing::debug;

use crate::context::ExecutionContext;
use crate::error::EngineError;
use crate::types::{Checkpoint, PathCursor};

/// Checkpoints in creation order; ids increase monotonically and the oldest is evicted first.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
  capacity: usize,
  next_id: u64,
  entries: VecDeque<Checkpoint>,
}

impl CheckpointStore {
  pub fn new(capacity: usize) -> Self {
    Self {
      capacity: capacity.max(1),
      next_id: 1,
      entries: VecDeque::new(),
    }
  }

  pub fn create(
    &mut self,
    label: Option<String>,
    steps: u64,
    context: ExecutionContext,
    paths: Vec<PathCursor>,
  ) -> u64 {
    let id = self.next_id;
    self.next_id += 1;
    self.push(Checkpoint::new(id, label, steps, context, paths));
    id
  }

  /// Registers a checkpoint taken elsewhere (e.g. loaded from disk), keeping ids monotonic.
  pub fn import(&mut self, checkpoint: Checkpoint) -> u64 {
    let id = checkpoint.id();
    self.entries.retain(|c| c.id() != id);
    self.next_id = self.next_id.max(id + 1);
    self.push(checkpoint);
    id
  }

  fn push(&mut self, checkpoint: Checkpoint) {
    self.entries.push_back(checkpoint);
    while self.entries.len() > self.capacity {
      if let Some(evicted) = self.entries.pop_front() {
        debug!(checkpoint = evicted.id(), "evicted oldest checkpoint");
      }
    }
  }

  pub fn get(&self, id: u64) -> Result<&Checkpoint, EngineError> {
    self
      .entries
      .iter()
      .find(|c| c.id() == id)
      .ok_or(EngineError::CheckpointNotFound(id))
  }

  pub fn latest(&self) -> Option<&Checkpoint> {
    self.entries.back()
  }

  pub fn ids(&self) -> Vec<u64> {
    self.entries.iter().map(Checkpoint::id).collect()
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }
}
