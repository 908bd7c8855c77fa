//! Engine configuration.
//!
//! Layered as defaults, then the machine's global attributes, then caller overrides (CLI flags and
//! environment variables in `run_machine`).

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use tracing::level_filters::LevelFilter;
use tracing::warn;

/// Machine-wide failure policy, engaged once a node's retries are exhausted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorPolicy {
  /// Halt every path.
  #[default]
  FailFast,
  /// Terminate only the failing path.
  Continue,
  /// Run compensating nodes for the failing path, then terminate it.
  Compensate,
}

impl FromStr for ErrorPolicy {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
      "fail-fast" | "failfast" => Ok(ErrorPolicy::FailFast),
      "continue" => Ok(ErrorPolicy::Continue),
      "compensate" => Ok(ErrorPolicy::Compensate),
      other => Err(format!("unknown error policy: {}", other)),
    }
  }
}

impl fmt::Display for ErrorPolicy {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(match self {
      ErrorPolicy::FailFast => "fail-fast",
      ErrorPolicy::Continue => "continue",
      ErrorPolicy::Compensate => "compensate",
    })
  }
}

/// What a circuit breaker counts failures for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CircuitScope {
  #[default]
  Node,
  Machine,
}

impl FromStr for CircuitScope {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_ascii_lowercase().as_str() {
      "node" => Ok(CircuitScope::Node),
      "machine" => Ok(CircuitScope::Machine),
      other => Err(format!("unknown circuit breaker scope: {}", other)),
    }
  }
}

/// Leveled log stream setting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
  Debug,
  #[default]
  Info,
  Warn,
  Error,
  None,
}

impl LogLevel {
  pub fn to_level_filter(self) -> LevelFilter {
    match self {
      LogLevel::Debug => LevelFilter::DEBUG,
      LogLevel::Info => LevelFilter::INFO,
      LogLevel::Warn => LevelFilter::WARN,
      LogLevel::Error => LevelFilter::ERROR,
      LogLevel::None => LevelFilter::OFF,
    }
  }
}

impl FromStr for LogLevel {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_ascii_lowercase().as_str() {
      "debug" | "trace" => Ok(LogLevel::Debug),
      "info" => Ok(LogLevel::Info),
      "warn" | "warning" => Ok(LogLevel::Warn),
      "error" => Ok(LogLevel::Error),
      "none" | "off" => Ok(LogLevel::None),
      other => Err(format!("unknown log level: {}", other)),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
  pub max_steps: u64,
  pub max_concurrent_paths: usize,
  pub circuit_breaker_threshold: u32,
  pub circuit_breaker_timeout_ms: u64,
  pub circuit_breaker_scope: CircuitScope,
  pub max_checkpoints: usize,
  pub error_policy: ErrorPolicy,
  /// Retries for nodes without `@retry`.
  pub default_retry: u32,
  /// Timeout for nodes without `@timeout`.
  pub default_timeout_ms: Option<u64>,
  pub log_level: LogLevel,
}

impl Default for EngineConfig {
  fn default() -> Self {
    Self {
      max_steps: 1000,
      max_concurrent_paths: 8,
      circuit_breaker_threshold: 5,
      circuit_breaker_timeout_ms: 30_000,
      circuit_breaker_scope: CircuitScope::Node,
      max_checkpoints: 10,
      error_policy: ErrorPolicy::FailFast,
      default_retry: 0,
      default_timeout_ms: None,
      log_level: LogLevel::Info,
    }
  }
}

impl EngineConfig {
  /// Defaults overlaid with a machine's global attributes.
  pub fn from_attributes(attrs: &Map<String, Value>) -> Self {
    Self::default().with_attributes(attrs)
  }

  /// Overlays recognised machine attributes; malformed values are logged and ignored.
  pub fn with_attributes(mut self, attrs: &Map<String, Value>) -> Self {
    for (key, value) in attrs {
      let applied = match key.as_str() {
        "maxSteps" => as_u64(value).map(|v| self.max_steps = v),
        "maxConcurrentPaths" => as_u64(value).map(|v| self.max_concurrent_paths = v.max(1) as usize),
        "circuitBreakerThreshold" => {
          as_u64(value).map(|v| self.circuit_breaker_threshold = v.max(1) as u32)
        }
        "circuitBreakerTimeout" => as_u64(value).map(|v| self.circuit_breaker_timeout_ms = v),
        "circuitBreakerScope" => parsed(value).map(|v| self.circuit_breaker_scope = v),
        "maxCheckpoints" => as_u64(value).map(|v| self.max_checkpoints = v.max(1) as usize),
        "errorPolicy" | "errorHandling" => parsed(value).map(|v| self.error_policy = v),
        "defaultRetry" => as_u64(value).map(|v| self.default_retry = v as u32),
        "defaultTimeout" => as_u64(value).map(|v| self.default_timeout_ms = Some(v)),
        "logLevel" => parsed(value).map(|v| self.log_level = v),
        _ => continue,
      };
      if applied.is_none() {
        warn!(attribute = %key, value = %value, "ignoring malformed machine setting");
      }
    }
    self
  }
}

fn as_u64(value: &Value) -> Option<u64> {
  match value {
    Value::Number(n) => n.as_u64(),
    Value::String(s) => crate::expression::strip_quotes(s).parse().ok(),
    _ => None,
  }
}

fn parsed<T: FromStr>(value: &Value) -> Option<T> {
  value
    .as_str()
    .and_then(|s| crate::expression::strip_quotes(s).parse().ok())
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn defaults() {
    let c = EngineConfig::default();
    assert_eq!(c.max_steps, 1000);
    assert_eq!(c.max_concurrent_paths, 8);
    assert_eq!(c.circuit_breaker_threshold, 5);
    assert_eq!(c.circuit_breaker_timeout_ms, 30_000);
    assert_eq!(c.error_policy, ErrorPolicy::FailFast);
    assert_eq!(c.log_level, LogLevel::Info);
  }

  #[test]
  fn machine_attributes_override_defaults() {
    let attrs = json!({
      "maxSteps": 5,
      "maxConcurrentPaths": "2",
      "errorHandling": "continue",
      "circuitBreakerScope": "machine",
      "defaultTimeout": 250,
      "logLevel": "none",
      "unrelated": true
    });
    let c = EngineConfig::from_attributes(attrs.as_object().unwrap());
    assert_eq!(c.max_steps, 5);
    assert_eq!(c.max_concurrent_paths, 2);
    assert_eq!(c.error_policy, ErrorPolicy::Continue);
    assert_eq!(c.circuit_breaker_scope, CircuitScope::Machine);
    assert_eq!(c.default_timeout_ms, Some(250));
    assert_eq!(c.log_level.to_level_filter(), LevelFilter::OFF);
  }

  #[test]
  fn malformed_values_keep_defaults() {
    let attrs = json!({"maxSteps": "lots", "errorPolicy": "panic"});
    let c = EngineConfig::from_attributes(attrs.as_object().unwrap());
    assert_eq!(c, EngineConfig::default());
  }

  #[test]
  fn policy_parsing() {
    assert_eq!("fail_fast".parse::<ErrorPolicy>(), Ok(ErrorPolicy::FailFast));
    assert_eq!("Compensate".parse::<ErrorPolicy>(), Ok(ErrorPolicy::Compensate));
    assert_eq!(ErrorPolicy::Continue.to_string(), "continue");
    let c: EngineConfig = serde_json::from_value(json!({"error_policy": "compensate"})).unwrap();
    assert_eq!(c.error_policy, ErrorPolicy::Compensate);
    assert_eq!(c.max_steps, 1000);
  }
}
