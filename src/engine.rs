//! The driver loop.
//!
//! Paths are explicit cursor records advanced cooperatively: each [Engine::step] is one scheduling
//! round in which every runnable path, in path-id order, executes at most one node. The only
//! suspension point is the task delegate. Context writes commit when a node completes.

use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::context::ExecutionContext;
use crate::coordinator::{self, CompensationStep, Decision};
use crate::delegate::{TaskDelegate, TaskRequest};
use crate::error::{EngineError, RunError};
use crate::expression::resolve_template;
use crate::meta_tools::MetaTools;
use crate::safety::SafetyManager;
use crate::scheduler::{self, BarrierTable};
use crate::topology::{EdgeInfo, NodeInfo, Topology};
use crate::types::{
  Checkpoint, DispatchMode, MachineDefinition, NodeType, PathCursor, PathId, PathStatus,
  RunResult, RunStatus, TaskOutcome,
};

/// Label of the checkpoint taken when a run halts.
pub const HALTED_LABEL: &str = "halted";

/// What one scheduling round did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepReport {
  pub round: u64,
  /// Nodes executed this round, by path.
  pub executed: Vec<(PathId, String)>,
  /// No path can make further progress.
  pub finished: bool,
}

/// Delegated work a parked path is waiting on.
enum Pending {
  /// First attempt running on the runtime (`@async`).
  Spawned(JoinHandle<Result<TaskOutcome, EngineError>>),
  /// Not started yet (`@lazy`).
  Deferred,
}

pub struct Engine {
  run_id: Uuid,
  started_at: DateTime<Utc>,
  definition: MachineDefinition,
  topology: Arc<Topology>,
  config: EngineConfig,
  delegate: Arc<dyn TaskDelegate>,
  context: ExecutionContext,
  safety: SafetyManager,
  paths: Vec<PathCursor>,
  next_path_id: PathId,
  barriers: BarrierTable,
  pending: HashMap<PathId, Pending>,
  meta: MetaTools,
  errors: Vec<RunError>,
  halted: bool,
  round: u64,
}

impl Engine {
  /// Validates `definition` and places one path on every start node.
  pub fn new(
    definition: MachineDefinition,
    config: EngineConfig,
    delegate: Arc<dyn TaskDelegate>,
  ) -> Result<Self, EngineError> {
    definition.validate()?;
    let topology = Arc::new(Topology::build(&definition)?);
    let context = ExecutionContext::from_topology(&topology);
    let meta = MetaTools::new(definition.clone(), Arc::clone(&topology), context.clone());
    let mut engine = Self {
      run_id: Uuid::new_v4(),
      started_at: Utc::now(),
      definition,
      topology: Arc::clone(&topology),
      safety: SafetyManager::new(&config),
      config,
      delegate,
      context,
      paths: vec![],
      next_path_id: 0,
      barriers: BarrierTable::default(),
      pending: HashMap::new(),
      meta,
      errors: vec![],
      halted: false,
      round: 0,
    };
    for start in topology.start_nodes() {
      engine.spawn_path(start, vec![]);
    }
    info!(
      run_id = %engine.run_id,
      title = %engine.definition.title,
      paths = engine.paths.len(),
      "machine run created"
    );
    Ok(engine)
  }

  /// Like [Engine::new], configured from the machine's own attributes.
  pub fn from_definition(
    definition: MachineDefinition,
    delegate: Arc<dyn TaskDelegate>,
  ) -> Result<Self, EngineError> {
    let config = EngineConfig::from_attributes(&definition.attributes);
    Self::new(definition, config, delegate)
  }

  pub fn run_id(&self) -> Uuid {
    self.run_id
  }

  pub fn config(&self) -> &EngineConfig {
    &self.config
  }

  pub fn context(&self) -> &ExecutionContext {
    &self.context
  }

  pub fn topology(&self) -> &Topology {
    &self.topology
  }

  pub fn definition(&self) -> &MachineDefinition {
    &self.definition
  }

  pub fn paths(&self) -> &[PathCursor] {
    &self.paths
  }

  pub fn errors(&self) -> &[RunError] {
    &self.errors
  }

  pub fn steps(&self) -> u64 {
    self.safety.steps()
  }

  pub fn safety(&self) -> &SafetyManager {
    &self.safety
  }

  /// Handle for inspecting and modifying the run from outside a delegate.
  pub fn meta_tools(&self) -> MetaTools {
    self.meta.clone()
  }

  /// True once the run was halted or every path is terminal.
  pub fn is_finished(&self) -> bool {
    self.halted || self.paths.iter().all(PathCursor::is_terminal)
  }

  fn spawn_path(&mut self, start: String, completed: Vec<String>) -> PathId {
    let id = self.next_path_id;
    self.next_path_id += 1;
    let live = self.paths.iter().filter(|p| p.is_live()).count();
    let mut path = PathCursor::new(id, start);
    path.completed = completed;
    if !self.safety.has_path_slot(live) {
      path.status = PathStatus::Queued;
      info!(path = id, node_id = %path.current, "path queued: concurrency limit reached");
    } else {
      debug!(path = id, node_id = %path.current, "path started");
    }
    self.paths.push(path);
    id
  }

  fn path_index(&self, id: PathId) -> Option<usize> {
    self.paths.iter().position(|p| p.id == id)
  }

  /// Runs rounds until the run finishes.
  pub async fn run(&mut self) -> RunResult {
    info!(run_id = %self.run_id, title = %self.definition.title, "machine run starting");
    while !self.is_finished() {
      self.step().await;
    }
    let result = self.result();
    info!(
      run_id = %self.run_id,
      status = ?result.status,
      steps = result.steps,
      errors = result.errors.len(),
      "machine run finished"
    );
    result
  }

  /// One scheduling round.
  #[instrument(level = "trace", skip(self))]
  pub async fn step(&mut self) -> StepReport {
    self.round += 1;
    let mut report = StepReport {
      round: self.round,
      ..Default::default()
    };
    if self.is_finished() {
      report.finished = true;
      return report;
    }
    self.apply_meta_requests().await;
    scheduler::promote_queued(&mut self.paths, self.safety.max_concurrent_paths());

    let runnable: Vec<PathId> = self
      .paths
      .iter()
      .filter(|p| matches!(p.status, PathStatus::Running | PathStatus::Parked))
      .map(|p| p.id)
      .collect();
    for id in runnable {
      if self.halted {
        break;
      }
      let Some(idx) = self.path_index(id) else {
        continue;
      };
      match self.paths[idx].status {
        PathStatus::Running => {
          let node = self.paths[idx].current.clone();
          if self.advance(idx).await {
            report.executed.push((id, node));
          }
        }
        PathStatus::Parked => self.resume(idx).await,
        _ => {}
      }
    }

    if !self.halted {
      self.resolve_barriers();
      scheduler::promote_queued(&mut self.paths, self.safety.max_concurrent_paths());
    }
    self
      .meta
      .publish(&self.definition, &self.topology, &self.context)
      .await;
    report.finished = self.is_finished();
    report
  }

  /// Executes the path's current node. Returns false when the step budget refused it.
  async fn advance(&mut self, idx: usize) -> bool {
    let topology = Arc::clone(&self.topology);
    let id = self.paths[idx].id;
    let node = self.paths[idx].current.clone();
    let Some(info) = topology.node(&node) else {
      let err = EngineError::UnknownNode(node.clone());
      self.handle_failure(idx, err).await;
      return true;
    };
    let step = match self.safety.consume_step() {
      Ok(step) => step,
      Err(e) => {
        self.halt(Some(node.as_str()), e);
        return false;
      }
    };
    if info.annotations.checkpoint {
      // Recorded as of the previous step so a restore executes this node again.
      self.snapshot(Some(node.clone()), step - 1);
    }
    self.context.visit(&node);
    self.context.set_active_state(&node);
    info!(path = id, node_id = %node, step, node_type = %info.node_type, "executing node");

    if topology.is_module(&node) {
      self.enter_module(idx, &topology);
      return true;
    }
    if info.node_type != NodeType::Task {
      self.complete_node(idx);
      return true;
    }

    match info.annotations.dispatch {
      DispatchMode::Eager => {
        let result = self.run_attempts(idx, info, None).await;
        self.finish_task(idx, info, result).await;
      }
      DispatchMode::Async => match self.safety.before_attempt(&node, Instant::now()) {
        Ok(()) => {
          let request = self.build_request(info, 1);
          let delegate = Arc::clone(&self.delegate);
          let timeout = self.timeout_for(info);
          let handle = tokio::spawn(invoke(delegate, request, timeout));
          self.pending.insert(id, Pending::Spawned(handle));
          self.paths[idx].status = PathStatus::Parked;
          debug!(path = id, node_id = %node, "task dispatched asynchronously");
        }
        Err(_) => {
          let result = self.run_attempts(idx, info, None).await;
          self.finish_task(idx, info, result).await;
        }
      },
      DispatchMode::Lazy => {
        self.pending.insert(id, Pending::Deferred);
        self.paths[idx].status = PathStatus::Parked;
        debug!(path = id, node_id = %node, "task deferred until first result access");
      }
    }
    true
  }

  /// Collects or starts a parked path's delegated work and completes its node.
  async fn resume(&mut self, idx: usize) {
    let topology = Arc::clone(&self.topology);
    let id = self.paths[idx].id;
    self.paths[idx].status = PathStatus::Running;
    let Some(info) = topology.node(&self.paths[idx].current) else {
      let err = EngineError::UnknownNode(self.paths[idx].current.clone());
      self.handle_failure(idx, err).await;
      return;
    };
    let first = match self.pending.remove(&id) {
      Some(Pending::Spawned(handle)) => Some(
        handle
          .await
          .unwrap_or_else(|e| Err(EngineError::Delegate(format!("task join: {}", e)))),
      ),
      Some(Pending::Deferred) | None => None,
    };
    let result = self.run_attempts(idx, info, first).await;
    self.finish_task(idx, info, result).await;
  }

  fn timeout_for(&self, info: &NodeInfo) -> Option<u64> {
    info.annotations.timeout_ms.or(self.config.default_timeout_ms)
  }

  fn build_request(&self, info: &NodeInfo, attempt: u32) -> TaskRequest {
    let template = self
      .context
      .get(&info.name, "prompt")
      .and_then(Value::as_str)
      .or(info.prompt())
      .unwrap_or_default();
    let prompt = {
      let view = self.context.view(&self.topology, Some(info.name.as_str()));
      resolve_template(template, &view)
    };
    TaskRequest {
      node: info.name.clone(),
      prompt,
      context: self.context.visible_json(&self.topology, &info.name),
      attempt,
      tools: self.meta.for_caller(&info.name),
    }
  }

  /// Runs up to `1 + retry` attempts, consulting the circuit breaker before each. `first` is the
  /// result of an attempt already made (asynchronous dispatch).
  async fn run_attempts(
    &mut self,
    idx: usize,
    info: &NodeInfo,
    mut first: Option<Result<TaskOutcome, EngineError>>,
  ) -> Result<TaskOutcome, EngineError> {
    let max_attempts = 1 + info.annotations.retry.unwrap_or(self.config.default_retry);
    let timeout = self.timeout_for(info);
    let mut last_error = None;
    for attempt in 1..=max_attempts {
      self.paths[idx].attempts = attempt;
      let result = match first.take() {
        Some(r) => r,
        None => match self.safety.before_attempt(&info.name, Instant::now()) {
          Ok(()) => {
            let request = self.build_request(info, attempt);
            invoke(Arc::clone(&self.delegate), request, timeout).await
          }
          Err(refused) => {
            self.context.increment_errors();
            warn!(node_id = %info.name, attempt, error = %refused.error, "attempt short-circuited");
            last_error = Some(refused.error);
            if attempt < max_attempts && !refused.retry_after.is_zero() {
              tokio::time::sleep(refused.retry_after).await;
            }
            continue;
          }
        },
      };
      let failure = match result {
        Ok(outcome) if outcome.is_success() => {
          self.safety.record_success(&info.name);
          if attempt > 1 {
            info!(node_id = %info.name, attempt, "task recovered on retry");
          }
          return Ok(outcome);
        }
        Ok(outcome) => EngineError::NodeExecution {
          node: info.name.clone(),
          message: outcome
            .failure_reason
            .unwrap_or_else(|| "task reported failure".to_string()),
        },
        Err(e) => e,
      };
      self.context.increment_errors();
      self.safety.record_failure(&info.name, Instant::now());
      warn!(node_id = %info.name, attempt, max_attempts, error = %failure, "attempt failed");
      last_error = Some(failure);
    }
    Err(last_error.unwrap_or_else(|| EngineError::NodeExecution {
      node: info.name.clone(),
      message: "no attempt was made".to_string(),
    }))
  }

  async fn finish_task(
    &mut self,
    idx: usize,
    info: &NodeInfo,
    result: Result<TaskOutcome, EngineError>,
  ) {
    match result {
      Ok(outcome) => {
        self.context.set(&info.name, "result", outcome.output.clone());
        let applied = self
          .context
          .commit_updates(&self.topology, &info.name, &outcome.context_updates);
        debug!(node_id = %info.name, applied, "task outcome committed");
        self.complete_node(idx);
      }
      Err(e) => self.handle_failure(idx, e).await,
    }
  }

  fn enter_module(&mut self, idx: usize, topology: &Topology) {
    let module = self.paths[idx].current.clone();
    let Some(entry) = topology.module_entry(&module) else {
      self.complete_node(idx);
      return;
    };
    info!(path = self.paths[idx].id, module = %module, entry = %entry, "entering state module");
    self.context.record_transition(&module, &entry, Some("enter"));
    let path = &mut self.paths[idx];
    path.completed.push(module);
    path.current = entry;
    path.attempts = 0;
  }

  fn complete_node(&mut self, idx: usize) {
    let node = self.paths[idx].current.clone();
    self.paths[idx].completed.push(node);
    self.paths[idx].attempts = 0;
    self.choose_transition(idx);
  }

  /// Picks the path's next edge: completes the path, blocks it at a barrier or traverses.
  fn choose_transition(&mut self, idx: usize) {
    let topology = Arc::clone(&self.topology);
    let node = self.paths[idx].current.clone();
    let edge = {
      let view = self.context.view(&topology, None);
      scheduler::select_transition(&topology, &node, &view)
    };
    match edge {
      None => {
        self.paths[idx].status = PathStatus::Completed;
        info!(path = self.paths[idx].id, node_id = %node, "path completed");
      }
      Some(edge) => match edge.barrier() {
        Some(barrier) => {
          let path = &mut self.paths[idx];
          path.status = PathStatus::Blocked {
            barrier: barrier.to_string(),
          };
          path.pending_edge = Some(edge.index);
          self.barriers.arrive(barrier);
          info!(path = path.id, node_id = %node, barrier = %barrier, "path waiting at barrier");
        }
        None => self.traverse(idx, edge),
      },
    }
  }

  /// Moves the path along `edge`; extra targets fan out into new paths.
  fn traverse(&mut self, idx: usize, edge: &EdgeInfo) {
    let from = self.paths[idx].current.clone();
    let Some((first, rest)) = edge.control_targets.split_first() else {
      self.paths[idx].status = PathStatus::Completed;
      return;
    };
    if edge.source != from {
      info!(path = self.paths[idx].id, module = %edge.source, "leaving state module");
    }
    let label = edge.label.as_deref();
    self.context.record_transition(&from, first, label);
    info!(path = self.paths[idx].id, from = %from, to = %first, "transition");
    let completed = self.paths[idx].completed.clone();
    let path = &mut self.paths[idx];
    path.current = first.clone();
    path.status = PathStatus::Running;
    path.pending_edge = None;
    for target in rest {
      self.context.record_transition(&from, target, label);
      let id = self.spawn_path(target.clone(), completed.clone());
      info!(path = id, from = %from, to = %target, "fan-out path spawned");
    }
  }

  fn resolve_barriers(&mut self) {
    let topology = Arc::clone(&self.topology);
    let mut released = false;
    for barrier in self.barriers.pending() {
      if scheduler::barrier_ready(&topology, &self.paths, &barrier) {
        self.release_barrier(&barrier);
        released = true;
      }
    }
    if released {
      return;
    }
    let active = self
      .paths
      .iter()
      .any(|p| matches!(p.status, PathStatus::Running | PathStatus::Parked));
    if !active {
      if let Some(barrier) = self.barriers.pending().into_iter().next() {
        warn!(barrier = %barrier, "no path can reach the barrier; forcing release");
        self.release_barrier(&barrier);
      }
    }
  }

  fn release_barrier(&mut self, barrier: &str) {
    let topology = Arc::clone(&self.topology);
    self.barriers.release(barrier);
    info!(barrier = %barrier, "barrier released");
    for idx in 0..self.paths.len() {
      if self.paths[idx].blocked_at() != Some(barrier) {
        continue;
      }
      match self.paths[idx].pending_edge.and_then(|i| topology.edge(i)) {
        Some(edge) => self.traverse(idx, edge),
        None => {
          warn!(path = self.paths[idx].id, "released path has no pending edge");
          self.paths[idx].status = PathStatus::Completed;
        }
      }
    }
  }

  async fn handle_failure(&mut self, idx: usize, failure: EngineError) {
    let topology = Arc::clone(&self.topology);
    let node = self.paths[idx].current.clone();
    let decision = coordinator::decide(
      self.config.error_policy,
      &topology,
      &node,
      &self.paths[idx].completed,
      &failure,
    );
    self.errors.push(RunError::new(Some(node.as_str()), &failure));
    match decision {
      Decision::HaltAll => {
        self.halt_all();
        self.paths[idx].status = PathStatus::Failed;
      }
      Decision::TerminatePath => {
        self.paths[idx].status = PathStatus::Failed;
        info!(path = self.paths[idx].id, node_id = %node, "path terminated");
      }
      Decision::Compensate(plan) => {
        self.paths[idx].status = PathStatus::Failed;
        for step in plan {
          self.compensate(&topology, &step).await;
        }
      }
    }
  }

  /// Runs one compensating node once; its failure is recorded and the walk goes on.
  async fn compensate(&mut self, topology: &Topology, step: &CompensationStep) {
    let Some(info) = topology.node(&step.counterpart) else {
      return;
    };
    info!(node_id = %step.completed, compensation = %step.counterpart, "running compensation");
    self
      .context
      .record_transition(&step.completed, &step.counterpart, Some("compensate"));
    self.context.visit(&step.counterpart);
    if info.node_type != NodeType::Task {
      return;
    }
    let request = self.build_request(info, 1);
    let outcome = invoke(Arc::clone(&self.delegate), request, self.timeout_for(info)).await;
    let failure = match outcome {
      Ok(o) if o.is_success() => {
        self.context.set(&info.name, "result", o.output);
        self
          .context
          .commit_updates(topology, &info.name, &o.context_updates);
        return;
      }
      Ok(o) => EngineError::NodeExecution {
        node: info.name.clone(),
        message: o
          .failure_reason
          .unwrap_or_else(|| "compensation failed".to_string()),
      },
      Err(e) => e,
    };
    error!(node_id = %info.name, error = %failure, "compensation failed");
    self.context.increment_errors();
    self.errors.push(RunError::new(Some(info.name.as_str()), &failure));
  }

  /// Fatal stop: records `failure` and cancels every unfinished path.
  fn halt(&mut self, node: Option<&str>, failure: EngineError) {
    error!(error = %failure, "run halted");
    self.errors.push(RunError::new(node, &failure));
    self.halt_all();
  }

  /// Stops scheduling. In-flight asynchronous attempts are detached, not aborted.
  ///
  /// Live paths are snapshotted first under the label `halted`, so the run can be resumed from
  /// where it stopped.
  fn halt_all(&mut self) {
    self.create_checkpoint(Some(HALTED_LABEL.to_string()));
    for p in self.paths.iter_mut().filter(|p| !p.is_terminal()) {
      p.status = PathStatus::Cancelled;
    }
    self.pending.clear();
    self.halted = true;
  }

  async fn apply_meta_requests(&mut self) {
    let (writes, swap) = self.meta.drain().await;
    for w in writes {
      if self.topology.contains(&w.node) {
        debug!(node_id = %w.node, attr = %w.attr, "applying meta-tool write");
        self.context.set(&w.node, &w.attr, w.value);
      }
    }
    if let Some(definition) = swap {
      self.swap_definition(definition);
    }
  }

  /// Replaces the topology, keeping the live context. Paths whose current node disappeared are
  /// cancelled; blocked paths re-select their edge.
  fn swap_definition(&mut self, definition: MachineDefinition) {
    let topology = match Topology::build(&definition) {
      Ok(t) => Arc::new(t),
      Err(e) => {
        warn!(error = %e, "rejected definition swap");
        return;
      }
    };
    info!(title = %definition.title, "swapping machine definition");
    self.definition = definition;
    self.topology = Arc::clone(&topology);
    self.context.reconcile(&topology);
    for idx in 0..self.paths.len() {
      let path = &self.paths[idx];
      if path.is_terminal() {
        continue;
      }
      if !topology.contains(&path.current) {
        let err = EngineError::DefinitionConflict {
          path: path.id,
          node: path.current.clone(),
        };
        warn!(path = path.id, node_id = %path.current, "path lost its node in definition swap");
        self.errors.push(RunError::new(Some(path.current.as_str()), &err));
        let id = path.id;
        self.pending.remove(&id);
        self.paths[idx].status = PathStatus::Cancelled;
      } else if path.blocked_at().is_some() {
        self.paths[idx].pending_edge = None;
        self.choose_transition(idx);
      }
    }
    self.barriers = BarrierTable::rebuild(&self.paths);
  }

  /// Queues a validated definition swap for the next step boundary.
  pub async fn request_definition_swap(
    &self,
    definition: MachineDefinition,
  ) -> Result<(), EngineError> {
    self.meta.queue_swap(definition).await
  }

  /// Snapshots the context and every path; returns the checkpoint id.
  pub fn create_checkpoint(&mut self, label: Option<String>) -> u64 {
    let steps = self.safety.steps();
    self.snapshot(label, steps)
  }

  fn snapshot(&mut self, label: Option<String>, steps: u64) -> u64 {
    let id = self.safety.checkpoints_mut().create(
      label.clone(),
      steps,
      self.context.clone(),
      self.paths.clone(),
    );
    info!(checkpoint = id, label = ?label, steps, "checkpoint created");
    id
  }

  /// The newest checkpoint held in memory. After a halt this is the snapshot taken just before
  /// the remaining paths were cancelled.
  pub fn latest_checkpoint(&self) -> Option<&Checkpoint> {
    self.safety.checkpoints().latest()
  }

  pub fn checkpoint(&self, id: u64) -> Result<&Checkpoint, EngineError> {
    self.safety.checkpoints().get(id)
  }

  /// Registers a checkpoint loaded from disk so it can be restored.
  pub fn import_checkpoint(&mut self, checkpoint: Checkpoint) -> u64 {
    self.safety.checkpoints_mut().import(checkpoint)
  }

  /// Replaces live state with checkpoint `id`, discarding everything since. Delegated work
  /// pending at the time is started again.
  pub fn restore_checkpoint(&mut self, id: u64) -> Result<(), EngineError> {
    let checkpoint = self.safety.checkpoints().get(id)?.clone();
    self.context = checkpoint.context().clone();
    self.paths = checkpoint.paths().to_vec();
    for p in &mut self.paths {
      if p.status == PathStatus::Parked {
        p.status = PathStatus::Running;
      }
    }
    self.safety.set_steps(checkpoint.steps());
    self.pending.clear();
    self.next_path_id = self.paths.iter().map(|p| p.id + 1).max().unwrap_or(0);
    self.barriers = BarrierTable::rebuild(&self.paths);
    self.halted = false;
    info!(checkpoint = id, steps = checkpoint.steps(), "checkpoint restored");
    Ok(())
  }

  /// The run's report as of now.
  pub fn result(&self) -> RunResult {
    let status = if self.halted {
      RunStatus::Failed
    } else if self.errors.is_empty()
      && self.paths.iter().all(|p| p.status == PathStatus::Completed)
    {
      RunStatus::Completed
    } else {
      RunStatus::CompletedWithErrors
    };
    RunResult {
      run_id: self.run_id,
      title: self.definition.title.clone(),
      status,
      started_at: self.started_at,
      finished_at: Utc::now(),
      steps: self.safety.steps(),
      context: self.context.to_json(),
      history: self.context.history().to_vec(),
      visits: self.context.visits().clone(),
      errors: self.errors.clone(),
      paths: self.paths.clone(),
    }
  }
}

/// One delegate call, bounded by `timeout_ms` when set.
async fn invoke(
  delegate: Arc<dyn TaskDelegate>,
  request: TaskRequest,
  timeout_ms: Option<u64>,
) -> Result<TaskOutcome, EngineError> {
  let node = request.node.clone();
  match timeout_ms {
    Some(ms) => tokio::time::timeout(Duration::from_millis(ms), delegate.execute(request))
      .await
      .unwrap_or(Err(EngineError::Timeout {
        node,
        timeout_ms: ms,
      })),
    None => delegate.execute(request).await,
  }
}
