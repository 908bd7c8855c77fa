//! Error taxonomy for machine runs.
//!
//! Only [EngineError::ResourceExceeded] and an exhausted fail-fast failure end a whole run; every
//! other kind resolves locally (retry, compensation or path termination) and is reported through
//! [RunError] entries on the final result.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::expression::ExpressionError;

/// Errors raised while loading or executing a machine.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EngineError {
  #[error("invalid machine definition: {0}")]
  ParseInput(String),

  #[error("condition evaluation failed: {0}")]
  ConditionEvaluation(String),

  #[error("node {node} failed: {message}")]
  NodeExecution { node: String, message: String },

  #[error("node {node} exceeded its {timeout_ms}ms timeout")]
  Timeout { node: String, timeout_ms: u64 },

  #[error("resource limit exceeded: {0}")]
  ResourceExceeded(String),

  #[error("circuit open for {key}")]
  CircuitOpen { key: String },

  #[error("checkpoint {0} not found")]
  CheckpointNotFound(u64),

  #[error("{viewer} may not {access} context node {node}")]
  AccessDenied {
    viewer: String,
    node: String,
    access: &'static str,
  },

  #[error("unknown node: {0}")]
  UnknownNode(String),

  #[error("path {path} lost its current node {node} in a definition swap")]
  DefinitionConflict { path: usize, node: String },

  #[error("delegate error: {0}")]
  Delegate(String),
}

impl EngineError {
  pub fn kind(&self) -> ErrorKind {
    match self {
      EngineError::ParseInput(_) => ErrorKind::ParseInput,
      EngineError::ConditionEvaluation(_) => ErrorKind::ConditionEvaluation,
      EngineError::NodeExecution { .. } => ErrorKind::NodeExecution,
      EngineError::Timeout { .. } => ErrorKind::Timeout,
      EngineError::ResourceExceeded(_) => ErrorKind::ResourceExceeded,
      EngineError::CircuitOpen { .. } => ErrorKind::CircuitOpen,
      EngineError::CheckpointNotFound(_) => ErrorKind::CheckpointNotFound,
      EngineError::AccessDenied { .. } => ErrorKind::AccessDenied,
      EngineError::UnknownNode(_) => ErrorKind::UnknownNode,
      EngineError::DefinitionConflict { .. } => ErrorKind::DefinitionConflict,
      EngineError::Delegate(_) => ErrorKind::NodeExecution,
    }
  }

  /// True for errors that end the run regardless of the machine's error policy.
  pub fn is_fatal(&self) -> bool {
    matches!(self, EngineError::ResourceExceeded(_))
  }
}

impl From<ExpressionError> for EngineError {
  fn from(e: ExpressionError) -> Self {
    EngineError::ConditionEvaluation(e.to_string())
  }
}

/// Serializable tag for an [EngineError].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
  ParseInput,
  ConditionEvaluation,
  NodeExecution,
  Timeout,
  ResourceExceeded,
  CircuitOpen,
  CheckpointNotFound,
  AccessDenied,
  UnknownNode,
  DefinitionConflict,
}

impl fmt::Display for ErrorKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let s = match self {
      ErrorKind::ParseInput => "ParseInputError",
      ErrorKind::ConditionEvaluation => "ConditionEvaluationError",
      ErrorKind::NodeExecution => "NodeExecutionError",
      ErrorKind::Timeout => "TimeoutError",
      ErrorKind::ResourceExceeded => "ResourceExceededError",
      ErrorKind::CircuitOpen => "CircuitOpenError",
      ErrorKind::CheckpointNotFound => "CheckpointNotFoundError",
      ErrorKind::AccessDenied => "AccessDeniedError",
      ErrorKind::UnknownNode => "UnknownNodeError",
      ErrorKind::DefinitionConflict => "DefinitionConflictError",
    };
    f.write_str(s)
  }
}

/// One unresolved error on a run result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunError {
  pub node: Option<String>,
  pub kind: ErrorKind,
  pub message: String,
  pub timestamp: DateTime<Utc>,
}

impl RunError {
  pub fn new(node: Option<&str>, error: &EngineError) -> Self {
    Self {
      node: node.map(str::to_string),
      kind: error.kind(),
      message: error.to_string(),
      timestamp: Utc::now(),
    }
  }
}
