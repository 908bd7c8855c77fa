//! Consecutive-failure circuit breaker.
//!
//! Closed counts consecutive failures; at the threshold it opens and short-circuits every attempt
//! until the cooldown elapses. The first attempt after that is the single half-open probe: success
//! closes the breaker, failure reopens it and restarts the cooldown.

use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CircuitState {
  Closed { consecutive_failures: u32 },
  Open { opened_at: Instant },
  /// The single probe is outstanding; further attempts are refused until it reports.
  HalfOpen,
}

#[derive(Debug, Clone)]
pub struct CircuitBreaker {
  state: CircuitState,
  threshold: u32,
  cooldown: Duration,
}

impl CircuitBreaker {
  pub fn new(threshold: u32, cooldown: Duration) -> Self {
    Self {
      state: CircuitState::Closed {
        consecutive_failures: 0,
      },
      threshold: threshold.max(1),
      cooldown,
    }
  }

  pub fn state(&self) -> &CircuitState {
    &self.state
  }

  pub fn is_open(&self) -> bool {
    matches!(self.state, CircuitState::Open { .. })
  }

  /// Admits an attempt at `now`, or returns how long until one could be admitted.
  pub fn try_acquire(&mut self, now: Instant) -> Result<(), Duration> {
    match self.state {
      CircuitState::Closed { .. } => Ok(()),
      CircuitState::Open { opened_at } => {
        let reopen = opened_at + self.cooldown;
        if now >= reopen {
          self.state = CircuitState::HalfOpen;
          Ok(())
        } else {
          Err(reopen - now)
        }
      }
      CircuitState::HalfOpen => Err(Duration::ZERO),
    }
  }

  /// Time left before the next probe; `None` unless open.
  pub fn remaining_cooldown(&self, now: Instant) -> Option<Duration> {
    match self.state {
      CircuitState::Open { opened_at } => {
        Some((opened_at + self.cooldown).saturating_duration_since(now))
      }
      _ => None,
    }
  }

  pub fn record_success(&mut self) {
    self.state = CircuitState::Closed {
      consecutive_failures: 0,
    };
  }

  pub fn record_failure(&mut self, now: Instant) {
    self.state = match self.state {
      CircuitState::Closed {
        consecutive_failures,
      } => {
        let count = consecutive_failures + 1;
        if count >= self.threshold {
          CircuitState::Open { opened_at: now }
        } else {
          CircuitState::Closed {
            consecutive_failures: count,
          }
        }
      }
      CircuitState::HalfOpen => CircuitState::Open { opened_at: now },
      CircuitState::Open { opened_at } => CircuitState::Open { opened_at },
    };
  }
}
