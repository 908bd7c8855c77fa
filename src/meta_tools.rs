//! Hooks through which task delegates inspect and modify a running machine.
//!
//! Reads see the state published at the last step boundary. Mutations are validated when
//! requested and queued; the engine applies them at the next step boundary, context writes
//! first, then the most recent definition swap.

use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::context::ExecutionContext;
use crate::error::EngineError;
use crate::topology::Topology;
use crate::types::MachineDefinition;

/// A validated context write waiting for the next step boundary.
#[derive(Debug, Clone, PartialEq)]
pub struct QueuedWrite {
  pub node: String,
  pub attr: String,
  pub value: Value,
}

#[derive(Debug)]
struct MetaState {
  definition: MachineDefinition,
  topology: Arc<Topology>,
  context: ExecutionContext,
  writes: Vec<QueuedWrite>,
  swap: Option<MachineDefinition>,
}

/// Cloneable handle shared between the engine and delegates; optionally bound to a caller node
/// whose access grants apply.
#[derive(Debug, Clone)]
pub struct MetaTools {
  state: Arc<Mutex<MetaState>>,
  caller: Option<String>,
}

impl MetaTools {
  pub(crate) fn new(
    definition: MachineDefinition,
    topology: Arc<Topology>,
    context: ExecutionContext,
  ) -> Self {
    Self {
      state: Arc::new(Mutex::new(MetaState {
        definition,
        topology,
        context,
        writes: vec![],
        swap: None,
      })),
      caller: None,
    }
  }

  /// The same handle, with access checks on behalf of `node`.
  pub fn for_caller(&self, node: &str) -> Self {
    Self {
      state: Arc::clone(&self.state),
      caller: Some(node.to_string()),
    }
  }

  pub fn caller(&self) -> Option<&str> {
    self.caller.as_deref()
  }

  pub async fn get_context_value(&self, node: &str, attr: &str) -> Result<Option<Value>, EngineError> {
    let state = self.state.lock().await;
    let node = resolve(&state.topology, node)?;
    match &self.caller {
      Some(caller) => state
        .context
        .read_as(&state.topology, caller, &node, attr)
        .map(|v| v.cloned()),
      None => Ok(state.context.get(&node, attr).cloned()),
    }
  }

  pub async fn set_context_value(&self, node: &str, attr: &str, value: Value) -> Result<(), EngineError> {
    let mut state = self.state.lock().await;
    let node = resolve(&state.topology, node)?;
    if let Some(caller) = &self.caller {
      if !state.topology.can_write(caller, &node) {
        return Err(EngineError::AccessDenied {
          viewer: caller.clone(),
          node,
          access: "write",
        });
      }
    }
    debug!(node = %node, attr = %attr, "queued context write");
    state.writes.push(QueuedWrite {
      node,
      attr: attr.to_string(),
      value,
    });
    Ok(())
  }

  /// Qualified names of every data-holding node.
  pub async fn list_context_nodes(&self) -> Vec<String> {
    let state = self.state.lock().await;
    state
      .topology
      .data_nodes()
      .into_iter()
      .map(|n| n.name.clone())
      .collect()
  }

  pub async fn get_machine_definition(&self) -> MachineDefinition {
    self.state.lock().await.definition.clone()
  }

  /// Validates `definition` (it must carry title, nodes and edges) and queues the swap.
  pub async fn update_definition(&self, definition: Value) -> Result<(), EngineError> {
    let parsed = MachineDefinition::from_value(definition)?;
    self.queue_swap(parsed).await
  }

  pub(crate) async fn queue_swap(&self, definition: MachineDefinition) -> Result<(), EngineError> {
    definition.validate()?;
    info!(title = %definition.title, "definition swap queued");
    self.state.lock().await.swap = Some(definition);
    Ok(())
  }

  /// Publishes the state as of the current step boundary.
  pub(crate) async fn publish(
    &self,
    definition: &MachineDefinition,
    topology: &Arc<Topology>,
    context: &ExecutionContext,
  ) {
    let mut state = self.state.lock().await;
    state.definition = definition.clone();
    state.topology = Arc::clone(topology);
    state.context = context.clone();
  }

  /// Takes every queued mutation.
  pub(crate) async fn drain(&self) -> (Vec<QueuedWrite>, Option<MachineDefinition>) {
    let mut state = self.state.lock().await;
    (std::mem::take(&mut state.writes), state.swap.take())
  }
}

fn resolve(topology: &Topology, node: &str) -> Result<String, EngineError> {
  topology
    .resolve(node)
    .ok_or_else(|| EngineError::UnknownNode(node.to_string()))
}
