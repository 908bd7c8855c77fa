//! The external executor that performs a task node's work.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, instrument};

use crate::error::EngineError;
use crate::meta_tools::MetaTools;
use crate::types::{OutcomeStatus, TaskOutcome};

/// Everything a delegate receives for one execution attempt.
#[derive(Debug, Clone)]
pub struct TaskRequest {
  /// Qualified node name.
  pub node: String,
  /// Prompt with `{{ expr }}` placeholders resolved.
  pub prompt: String,
  /// Context visible to the node.
  pub context: Value,
  /// 1-based attempt number.
  pub attempt: u32,
  pub tools: MetaTools,
}

/// Performs a task node's work: an LLM call, generated code or a test stub.
#[async_trait]
pub trait TaskDelegate: Send + Sync {
  /// `Err` is reserved for failures talking to the executor; a task that ran and failed returns
  /// an outcome with [OutcomeStatus::Fail].
  async fn execute(&self, request: TaskRequest) -> Result<TaskOutcome, EngineError>;
}

/// Dry run: every task succeeds with its resolved prompt as output.
#[derive(Debug, Clone, Copy, Default)]
pub struct EchoDelegate;

#[async_trait]
impl TaskDelegate for EchoDelegate {
  async fn execute(&self, request: TaskRequest) -> Result<TaskOutcome, EngineError> {
    Ok(TaskOutcome::success(request.prompt))
  }
}

/// Runs a shell command per attempt with the prompt on stdin.
///
/// Exit status 0 is success. Stdout becomes the output; when it is a JSON object it may carry
/// `output`, `outcome` (`success`/`fail`) and `context_updates`.
#[derive(Debug, Clone)]
pub struct CommandDelegate {
  command: String,
}

impl CommandDelegate {
  pub fn new(command: impl Into<String>) -> Self {
    Self {
      command: command.into(),
    }
  }
}

#[async_trait]
impl TaskDelegate for CommandDelegate {
  #[instrument(level = "trace", skip(self, request), fields(node = %request.node))]
  async fn execute(&self, request: TaskRequest) -> Result<TaskOutcome, EngineError> {
    let parts: Vec<&str> = self.command.split_whitespace().collect();
    let (bin, args) = parts
      .split_first()
      .ok_or_else(|| EngineError::Delegate("agent command is empty".to_string()))?;
    let context = serde_json::to_string(&request.context)
      .map_err(|e| EngineError::Delegate(format!("context encode: {}", e)))?;

    let mut child = Command::new(bin)
      .args(args)
      .env("DYGRAM_NODE", &request.node)
      .env("DYGRAM_ATTEMPT", request.attempt.to_string())
      .env("DYGRAM_CONTEXT", context)
      .stdin(Stdio::piped())
      .stdout(Stdio::piped())
      .stderr(Stdio::inherit())
      .kill_on_drop(true)
      .spawn()
      .map_err(|e| EngineError::Delegate(format!("agent spawn: {}", e)))?;
    if let Some(mut stdin) = child.stdin.take() {
      // The command may exit without reading its input.
      let _ = stdin.write_all(request.prompt.as_bytes()).await;
      let _ = stdin.write_all(b"\n").await;
    }
    let out = child
      .wait_with_output()
      .await
      .map_err(|e| EngineError::Delegate(format!("agent wait: {}", e)))?;
    let stdout = String::from_utf8_lossy(&out.stdout).trim().to_string();
    debug!(node = %request.node, status = ?out.status.code(), "agent finished");
    if !out.status.success() {
      let msg = out
        .status
        .code()
        .map(|c| format!("agent exit {}", c))
        .unwrap_or_else(|| "agent signal".to_string());
      return Ok(TaskOutcome::fail(msg));
    }
    Ok(parse_stdout(&stdout))
  }
}

/// Interprets a successful command's stdout.
pub(crate) fn parse_stdout(stdout: &str) -> TaskOutcome {
  let Ok(Value::Object(obj)) = serde_json::from_str::<Value>(stdout) else {
    return TaskOutcome::success(stdout.to_string());
  };
  let failed = obj
    .get("outcome")
    .and_then(Value::as_str)
    .is_some_and(|s| matches!(s.trim().to_lowercase().as_str(), "fail" | "error"));
  let updates: BTreeMap<String, Value> = obj
    .get("context_updates")
    .and_then(Value::as_object)
    .map(|m| m.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
    .unwrap_or_default();
  let output = obj
    .get("output")
    .cloned()
    .unwrap_or_else(|| Value::Object(obj.clone()));
  TaskOutcome {
    status: if failed {
      OutcomeStatus::Fail
    } else {
      OutcomeStatus::Success
    },
    failure_reason: failed.then(|| "agent reported outcome=fail".to_string()),
    output,
    context_updates: updates,
  }
}
