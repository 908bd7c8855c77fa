//! Integration tests that run machines from tests/integration/*.json through the library and the
//! run_machine CLI: loading, scheduling, modules, barriers, budgets, reports and checkpoints.

use async_trait::async_trait;
use dygram_engine::checkpoint_io::{load_checkpoint, save_checkpoint};
use dygram_engine::{
  EchoDelegate, Engine, EngineConfig, EngineError, ErrorKind, MachineDefinition, RunStatus,
  TaskDelegate, TaskRequest,
};
use dygram_engine::types::TaskOutcome;
use serde_json::{Value, json};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;

fn fixture(name: &str) -> PathBuf {
  Path::new(env!("CARGO_MANIFEST_DIR"))
    .join("tests")
    .join("integration")
    .join(name)
}

fn load(name: &str) -> MachineDefinition {
  let json = std::fs::read_to_string(fixture(name)).expect("read fixture");
  MachineDefinition::from_json(&json).expect("parse fixture")
}

/// Runs the run_machine binary. Returns (stdout, stderr, success).
fn run_machine(args: &[&str], env: &[(&str, &str)]) -> (String, String, bool) {
  let mut cmd = Command::new(env!("CARGO_BIN_EXE_run_machine"));
  cmd
    .args(args)
    .env_remove("DYGRAM_AGENT_CMD")
    .env_remove("DYGRAM_MAX_STEPS")
    .current_dir(env!("CARGO_MANIFEST_DIR"));
  for (k, v) in env {
    cmd.env(k, v);
  }
  let out = cmd.output().expect("run run_machine");
  (
    String::from_utf8_lossy(&out.stdout).into_owned(),
    String::from_utf8_lossy(&out.stderr).into_owned(),
    out.status.success(),
  )
}

// ---- Library ----

#[tokio::test]
async fn review_machine_routes_through_module() {
  let mut engine = Engine::from_definition(load("review.json"), Arc::new(EchoDelegate)).unwrap();
  let r = engine.run().await;
  assert_eq!(r.status, RunStatus::Completed);
  let hops: Vec<_> = r.history.iter().map(|t| (t.from.as_str(), t.to.as_str())).collect();
  assert_eq!(
    hops,
    vec![
      ("start", "Drafting"),
      ("Drafting", "Drafting.outline"),
      ("Drafting.outline", "Drafting.write"),
      ("Drafting.write", "review"),
      ("review", "approved"),
    ]
  );
  assert_eq!(
    r.context["nodes"]["Drafting.outline"]["result"],
    json!("Outline with threshold 2")
  );
  assert_eq!(r.context["nodes"]["review"]["result"], json!("Review Write"));
  assert_eq!(r.steps, 6);
}

/// Fails every attempt of one node.
struct FailOn(&'static str);

#[async_trait]
impl TaskDelegate for FailOn {
  async fn execute(&self, request: TaskRequest) -> Result<TaskOutcome, EngineError> {
    if request.node.ends_with(self.0) {
      Ok(TaskOutcome::fail("rejected"))
    } else {
      Ok(TaskOutcome::success(request.prompt))
    }
  }
}

#[tokio::test]
async fn failing_module_child_terminates_its_path_under_continue() {
  let mut engine = Engine::from_definition(load("review.json"), Arc::new(FailOn("write"))).unwrap();
  let r = engine.run().await;
  assert_eq!(r.status, RunStatus::CompletedWithErrors);
  assert_eq!(r.errors.len(), 1);
  assert_eq!(r.errors[0].kind, ErrorKind::NodeExecution);
  assert_eq!(r.errors[0].node.as_deref(), Some("Drafting.write"));
  assert!(r.visits.get("review").is_none());
}

#[tokio::test]
async fn parallel_paths_meet_at_barrier() {
  let mut engine = Engine::from_definition(load("parallel.json"), Arc::new(EchoDelegate)).unwrap();
  let r = engine.run().await;
  assert_eq!(r.status, RunStatus::Completed);
  assert_eq!(r.paths.len(), 2);
  assert_eq!(r.visits["merge"], 2);
  // Both merge executions started in the same round, after parse_b.
  let merges: Vec<_> = r
    .history
    .iter()
    .enumerate()
    .filter(|(_, t)| t.to == "merge")
    .map(|(i, _)| i)
    .collect();
  let parse = r.history.iter().position(|t| t.to == "parse_b").unwrap();
  assert!(merges.iter().all(|&i| i > parse));
  // @checkpoint on merge snapshots before each execution.
  let cp = engine.checkpoint(1).unwrap();
  assert_eq!(cp.label(), Some("merge"));
}

#[tokio::test]
async fn budget_exhaustion_fails_the_run() {
  let mut engine = Engine::from_definition(load("budget.json"), Arc::new(EchoDelegate)).unwrap();
  let r = engine.run().await;
  assert_eq!(r.status, RunStatus::Failed);
  assert_eq!(r.steps, 4);
  assert_eq!(r.errors[0].kind, ErrorKind::ResourceExceeded);
}

#[test]
fn invalid_fixture_is_rejected() {
  let json = std::fs::read_to_string(fixture("invalid.json")).unwrap();
  assert!(matches!(
    MachineDefinition::from_json(&json),
    Err(EngineError::ParseInput(_))
  ));
}

// ---- CLI ----

#[test]
fn run_machine_prints_usage_without_args() {
  let (_, stderr, success) = run_machine(&[], &[]);
  assert!(!success);
  assert!(stderr.contains("Usage") || stderr.contains("usage"));
}

#[test]
fn run_machine_exits_1_for_missing_file() {
  let (_, stderr, success) = run_machine(&["/nonexistent/machine.json"], &[]);
  assert!(!success);
  assert!(stderr.contains("Error reading"), "stderr: {}", stderr);
}

#[test]
fn run_machine_rejects_invalid_machine() {
  let path = fixture("invalid.json");
  let (_, stderr, success) = run_machine(&[path.to_str().unwrap()], &[]);
  assert!(!success);
  assert!(stderr.contains("Error parsing machine"), "stderr: {}", stderr);
}

#[test]
fn run_machine_completes_review() {
  let path = fixture("review.json");
  let (stdout, stderr, success) = run_machine(&[path.to_str().unwrap()], &[]);
  assert!(success, "stderr: {}", stderr);
  assert!(stdout.contains("Machine run finished"));
  assert!(stdout.contains("Status: Completed"));
}

#[test]
fn run_machine_reports_exhausted_budget() {
  let path = fixture("budget.json");
  let (stdout, _, success) = run_machine(&[path.to_str().unwrap()], &[]);
  assert!(!success);
  assert!(stdout.contains("Status: Failed"));
  assert!(stdout.contains("ResourceExceededError"));
}

#[test]
fn env_step_budget_overrides_machine_attribute() {
  let path = fixture("review.json");
  let (stdout, _, success) = run_machine(&[path.to_str().unwrap()], &[("DYGRAM_MAX_STEPS", "2")]);
  assert!(!success);
  assert!(stdout.contains("Steps: 2"));
}

#[test]
fn run_machine_writes_report() {
  let dir = tempfile::tempdir().unwrap();
  let report = dir.path().join("report.json");
  let path = fixture("parallel.json");
  let (_, stderr, success) = run_machine(
    &["--report", report.to_str().unwrap(), path.to_str().unwrap()],
    &[],
  );
  assert!(success, "stderr: {}", stderr);
  let r: Value = serde_json::from_str(&std::fs::read_to_string(&report).unwrap()).unwrap();
  assert_eq!(r["status"], json!("completed"));
  assert_eq!(r["title"], json!("Parallel Fetch"));
  assert_eq!(r["visits"]["merge"], json!(2));
}

#[test]
fn agent_command_output_feeds_templates() {
  let dir = tempfile::tempdir().unwrap();
  let report = dir.path().join("report.json");
  let path = fixture("review.json");
  let (_, stderr, success) = run_machine(
    &["--report", report.to_str().unwrap(), path.to_str().unwrap()],
    &[("DYGRAM_AGENT_CMD", "cat")],
  );
  assert!(success, "stderr: {}", stderr);
  let r: Value = serde_json::from_str(&std::fs::read_to_string(&report).unwrap()).unwrap();
  assert_eq!(r["context"]["nodes"]["review"]["result"], json!("Review Write"));
}

#[test]
fn failing_agent_command_respects_policy_flag() {
  let path = fixture("review.json");
  let (stdout, _, success) = run_machine(&[path.to_str().unwrap()], &[("DYGRAM_AGENT_CMD", "false")]);
  assert!(!success);
  assert!(stdout.contains("Status: CompletedWithErrors"));

  let (stdout, _, success) = run_machine(
    &["--policy", "fail-fast", path.to_str().unwrap()],
    &[("DYGRAM_AGENT_CMD", "false")],
  );
  assert!(!success);
  assert!(stdout.contains("Status: Failed"));
}

#[test]
fn halted_run_resumes_from_checkpoint_dir() {
  let dir = tempfile::tempdir().unwrap();
  let path = fixture("review.json");
  let (stdout, _, success) = run_machine(
    &["--checkpoint-dir", dir.path().to_str().unwrap(), path.to_str().unwrap()],
    &[("DYGRAM_MAX_STEPS", "2")],
  );
  assert!(!success);
  assert!(stdout.contains("Status: Failed"));
  assert!(stdout.contains("Steps: 2"));
  let files: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
  assert_eq!(files.len(), 1);

  let (stdout, stderr, success) = run_machine(
    &["--resume", dir.path().to_str().unwrap(), path.to_str().unwrap()],
    &[],
  );
  assert!(success, "stderr: {}", stderr);
  assert!(stdout.contains("Status: Completed"), "stdout: {}", stdout);
  assert!(stdout.contains("Steps: 6"));
  assert!(stdout.contains("Transitions: 5"));
}

#[test]
fn finished_run_saves_its_final_state() {
  let dir = tempfile::tempdir().unwrap();
  let path = fixture("review.json");
  let (_, stderr, success) = run_machine(
    &["--checkpoint-dir", dir.path().to_str().unwrap(), path.to_str().unwrap()],
    &[],
  );
  assert!(success, "stderr: {}", stderr);
  let saved = dir.path().join("checkpoint-1.json");
  let cp: Value = serde_json::from_str(&std::fs::read_to_string(&saved).unwrap()).unwrap();
  assert_eq!(cp["label"], json!("final"));
  assert_eq!(cp["steps"], json!(6));
}

#[tokio::test]
async fn halt_snapshot_survives_disk_and_resumes() {
  let dir = tempfile::tempdir().unwrap();
  let definition = load("review.json");
  let tight = EngineConfig {
    max_steps: 3,
    ..EngineConfig::from_attributes(&definition.attributes)
  };
  let mut first = Engine::new(definition.clone(), tight, Arc::new(EchoDelegate)).unwrap();
  assert_eq!(first.run().await.status, RunStatus::Failed);
  let file = save_checkpoint(dir.path(), first.latest_checkpoint().unwrap()).unwrap();

  let mut second = Engine::from_definition(definition, Arc::new(EchoDelegate)).unwrap();
  let id = second.import_checkpoint(load_checkpoint(&file).unwrap());
  second.restore_checkpoint(id).unwrap();
  let r = second.run().await;
  assert_eq!(r.status, RunStatus::Completed);
  assert_eq!(r.steps, 6);
  assert_eq!(r.visits["Drafting.write"], 1);
  assert_eq!(r.context["nodes"]["review"]["result"], json!("Review Write"));
}
