//! Resource limits, circuit breakers and checkpoint storage for a run.

mod checkpoint_store;
mod circuit_breaker;

pub use checkpoint_store::CheckpointStore;
pub use circuit_breaker::{CircuitBreaker, CircuitState};

use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::config::{CircuitScope, EngineConfig};
use crate::error::EngineError;

const MACHINE_BREAKER: &str = "machine";

/// Why an attempt was refused by a breaker.
#[derive(Debug, Clone, PartialEq)]
pub struct ShortCircuit {
  pub error: EngineError,
  /// Time until the breaker admits its probe.
  pub retry_after: Duration,
}

#[derive(Debug, Clone)]
pub struct SafetyManager {
  max_steps: u64,
  max_concurrent_paths: usize,
  scope: CircuitScope,
  threshold: u32,
  cooldown: Duration,
  steps: u64,
  breakers: HashMap<String, CircuitBreaker>,
  checkpoints: CheckpointStore,
}

impl SafetyManager {
  pub fn new(config: &EngineConfig) -> Self {
    Self {
      max_steps: config.max_steps,
      max_concurrent_paths: config.max_concurrent_paths.max(1),
      scope: config.circuit_breaker_scope,
      threshold: config.circuit_breaker_threshold,
      cooldown: Duration::from_millis(config.circuit_breaker_timeout_ms),
      steps: 0,
      breakers: HashMap::new(),
      checkpoints: CheckpointStore::new(config.max_checkpoints),
    }
  }

  /// Claims one step of the global budget; fails once `maxSteps` steps have run.
  pub fn consume_step(&mut self) -> Result<u64, EngineError> {
    if self.steps >= self.max_steps {
      warn!(max_steps = self.max_steps, "step budget exhausted");
      return Err(EngineError::ResourceExceeded(format!(
        "maxSteps ({}) exceeded",
        self.max_steps
      )));
    }
    self.steps += 1;
    Ok(self.steps)
  }

  pub fn steps(&self) -> u64 {
    self.steps
  }

  pub(crate) fn set_steps(&mut self, steps: u64) {
    self.steps = steps;
  }

  pub fn max_concurrent_paths(&self) -> usize {
    self.max_concurrent_paths
  }

  /// True when another path may become live alongside `live` existing ones.
  pub fn has_path_slot(&self, live: usize) -> bool {
    live < self.max_concurrent_paths
  }

  fn breaker_key(&self, node: &str) -> String {
    match self.scope {
      CircuitScope::Node => node.to_string(),
      CircuitScope::Machine => MACHINE_BREAKER.to_string(),
    }
  }

  /// Consults the breaker guarding `node` before an attempt.
  pub fn before_attempt(&mut self, node: &str, now: Instant) -> Result<(), ShortCircuit> {
    let key = self.breaker_key(node);
    let (threshold, cooldown) = (self.threshold, self.cooldown);
    let breaker = self
      .breakers
      .entry(key.clone())
      .or_insert_with(|| CircuitBreaker::new(threshold, cooldown));
    breaker.try_acquire(now).map_err(|retry_after| {
      debug!(node = %node, breaker = %key, ?retry_after, "attempt short-circuited");
      ShortCircuit {
        error: EngineError::CircuitOpen { key },
        retry_after,
      }
    })
  }

  pub fn record_success(&mut self, node: &str) {
    let key = self.breaker_key(node);
    if let Some(b) = self.breakers.get_mut(&key) {
      b.record_success();
    }
  }

  pub fn record_failure(&mut self, node: &str, now: Instant) {
    let key = self.breaker_key(node);
    let (threshold, cooldown) = (self.threshold, self.cooldown);
    let breaker = self
      .breakers
      .entry(key.clone())
      .or_insert_with(|| CircuitBreaker::new(threshold, cooldown));
    breaker.record_failure(now);
    if breaker.is_open() {
      warn!(breaker = %key, "circuit breaker open");
    }
  }

  pub fn breaker(&self, node: &str) -> Option<&CircuitBreaker> {
    self.breakers.get(&self.breaker_key(node))
  }

  pub fn checkpoints(&self) -> &CheckpointStore {
    &self.checkpoints
  }

  pub fn checkpoints_mut(&mut self) -> &mut CheckpointStore {
    &mut self.checkpoints
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn config(max_steps: u64, scope: CircuitScope) -> EngineConfig {
    EngineConfig {
      max_steps,
      max_concurrent_paths: 2,
      circuit_breaker_threshold: 2,
      circuit_breaker_timeout_ms: 1000,
      circuit_breaker_scope: scope,
      ..Default::default()
    }
  }

  #[test]
  fn step_budget_is_exact() {
    let mut s = SafetyManager::new(&config(3, CircuitScope::Node));
    for expected in 1..=3 {
      assert_eq!(s.consume_step().unwrap(), expected);
    }
    assert!(matches!(
      s.consume_step(),
      Err(EngineError::ResourceExceeded(_))
    ));
    assert_eq!(s.steps(), 3);
  }

  #[test]
  fn path_slots() {
    let s = SafetyManager::new(&config(3, CircuitScope::Node));
    assert!(s.has_path_slot(1));
    assert!(!s.has_path_slot(2));
  }

  #[test]
  fn node_scope_isolates_breakers() {
    let now = Instant::now();
    let mut s = SafetyManager::new(&config(10, CircuitScope::Node));
    s.record_failure("a", now);
    s.record_failure("a", now);
    let refused = s.before_attempt("a", now).unwrap_err();
    assert_eq!(refused.error, EngineError::CircuitOpen { key: "a".into() });
    assert_eq!(refused.retry_after, Duration::from_millis(1000));
    assert!(s.before_attempt("b", now).is_ok());
  }

  #[test]
  fn machine_scope_shares_one_breaker() {
    let now = Instant::now();
    let mut s = SafetyManager::new(&config(10, CircuitScope::Machine));
    s.record_failure("a", now);
    s.record_failure("b", now);
    assert!(s.before_attempt("c", now).is_err());
  }
}
