//! CLI: Run a DyGram machine from a JSON definition.
//!
//! Loads the definition → validates → runs to completion (tasks go to DYGRAM_AGENT_CMD when set,
//! otherwise every task echoes its prompt).
//!
//! Usage: `run_machine [OPTIONS] <path-to-machine-json>`
//! Example: run_machine tests/integration/review.json
//!
//! Set RUST_LOG=dygram_engine=trace for TRACE-level span enter/exit and events.

use clap::Parser;
use std::env;
use std::fs;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use dygram_engine::checkpoint_io::{load_resume_point, save_checkpoint};
use dygram_engine::config::LogLevel;
use dygram_engine::{
  CommandDelegate, EchoDelegate, Engine, EngineConfig, ErrorPolicy, MachineDefinition, RunStatus,
  TaskDelegate,
};
use dygram_engine::types::Checkpoint;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt::format::FmtSpan};

/// Run a DyGram machine from a JSON definition.
#[derive(Parser, Debug)]
#[command(name = "run_machine")]
#[command(
  after_help = r#"Environment variables (override --agent-cmd and --max-steps when set):
  DYGRAM_AGENT_CMD   Shell command run once per task attempt, prompt on stdin. Stdout is the
                     result; a JSON object may carry output, outcome and context_updates.
  DYGRAM_MAX_STEPS   Global step budget.

Machine attributes (maxSteps, errorHandling, circuitBreakerThreshold, ...) apply first; flags
and environment variables override them.

Examples:
  run_machine tests/integration/review.json
  run_machine --policy continue --report out.json machine.json
  DYGRAM_MAX_STEPS=2 run_machine --checkpoint-dir runs/ machine.json
  run_machine --resume runs/ machine.json"#
)]
struct Args {
  /// Command for task nodes. Overridden by DYGRAM_AGENT_CMD if set.
  #[arg(long, value_name = "CMD")]
  agent_cmd: Option<String>,

  /// Global step budget. Overridden by DYGRAM_MAX_STEPS if set.
  #[arg(long, value_name = "N")]
  max_steps: Option<u64>,

  /// Failure policy: fail-fast, continue or compensate.
  #[arg(long, value_name = "POLICY")]
  policy: Option<ErrorPolicy>,

  /// Log level when RUST_LOG is unset: debug, info, warn, error or none.
  #[arg(long, value_name = "LEVEL")]
  log_level: Option<LogLevel>,

  /// Write the run result as JSON to this file.
  #[arg(long, value_name = "FILE")]
  report: Option<PathBuf>,

  /// Save a checkpoint into this directory after the run. A halted run saves the snapshot taken
  /// when it halted; a finished run saves its final state.
  #[arg(long, value_name = "DIR")]
  checkpoint_dir: Option<PathBuf>,

  /// Resume from a checkpoint file, or from the newest checkpoint in a directory written by
  /// --checkpoint-dir.
  #[arg(long, value_name = "PATH")]
  resume: Option<PathBuf>,

  /// Path to the machine definition (JSON)
  #[arg(value_name = "path-to-machine-json")]
  machine_path: PathBuf,
}

#[tokio::main]
async fn main() {
  let args = Args::parse();

  let path = &args.machine_path;
  let json = match fs::read_to_string(path) {
    Ok(s) => s,
    Err(e) => {
      eprintln!("Error reading {}: {}", path.display(), e);
      process::exit(1);
    }
  };
  let definition = match MachineDefinition::from_json(&json) {
    Ok(d) => d,
    Err(e) => {
      eprintln!("Error parsing machine: {}", e);
      process::exit(1);
    }
  };

  // Env vars override flags, flags override machine attributes.
  let mut config = EngineConfig::from_attributes(&definition.attributes);
  let max_steps = env::var("DYGRAM_MAX_STEPS")
    .ok()
    .and_then(|v| v.parse().ok())
    .or(args.max_steps);
  if let Some(n) = max_steps {
    config.max_steps = n;
  }
  if let Some(p) = args.policy {
    config.error_policy = p;
  }
  if let Some(l) = args.log_level {
    config.log_level = l;
  }
  let agent_cmd = env::var("DYGRAM_AGENT_CMD").ok().or_else(|| args.agent_cmd.clone());

  let default_filter = config.log_level.to_level_filter().to_string();
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
    )
    .with_span_events(FmtSpan::ENTER | FmtSpan::EXIT)
    .with_writer(std::io::stderr)
    .init();

  info!(
    machine = %path.display(),
    agent_cmd = ?agent_cmd,
    max_steps = config.max_steps,
    policy = %config.error_policy,
    "run_machine starting"
  );

  let delegate: Arc<dyn TaskDelegate> = match agent_cmd {
    Some(cmd) => Arc::new(CommandDelegate::new(cmd)),
    None => Arc::new(EchoDelegate),
  };
  let mut engine = match Engine::new(definition, config, delegate) {
    Ok(e) => e,
    Err(e) => {
      eprintln!("Invalid machine: {}", e);
      process::exit(1);
    }
  };

  if let Some(resume) = &args.resume {
    let restored = load_resume_point(resume)
      .map_err(|e| e.to_string())
      .and_then(|cp| {
        let id = engine.import_checkpoint(cp);
        engine.restore_checkpoint(id).map_err(|e| e.to_string())
      });
    if let Err(e) = restored {
      eprintln!("Error resuming from {}: {}", resume.display(), e);
      process::exit(1);
    }
  }

  let r = engine.run().await;

  if let Some(dir) = &args.checkpoint_dir {
    let id = match engine.latest_checkpoint().map(Checkpoint::id) {
      Some(id) if r.status == RunStatus::Failed => id,
      _ => engine.create_checkpoint(Some("final".to_string())),
    };
    let saved = engine
      .checkpoint(id)
      .map_err(|e| std::io::Error::other(e.to_string()))
      .and_then(|cp| save_checkpoint(dir, cp));
    match saved {
      Ok(file) => info!(checkpoint = id, path = %file.display(), "checkpoint written"),
      Err(e) => {
        eprintln!("Error writing checkpoint: {}", e);
        process::exit(1);
      }
    }
  }

  if let Some(report) = &args.report {
    let written = serde_json::to_string_pretty(&r)
      .map_err(|e| std::io::Error::other(e.to_string()))
      .and_then(|s| fs::write(report, s));
    if let Err(e) = written {
      eprintln!("Error writing report {}: {}", report.display(), e);
      process::exit(1);
    }
  }

  println!("Machine run finished.");
  println!("  Title: {}", r.title);
  println!("  Status: {:?}", r.status);
  println!("  Steps: {}", r.steps);
  println!("  Transitions: {}", r.history.len());
  for e in &r.errors {
    println!("  Error: [{}] {}", e.kind, e.message);
  }
  if r.status != RunStatus::Completed {
    process::exit(1);
  }
}
