//! Mutable execution context shared by every path of a run.
//!
//! Holds per-node attributes (keyed by qualified node name), machine-level globals and the
//! engine-tracked state that expressions see as built-ins: the error count, the active state,
//! visit counts and the transition history.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;
use tracing::{instrument, warn};

use crate::error::EngineError;
use crate::expression::Scope;
use crate::topology::Topology;
use crate::types::TransitionRecord;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionContext {
  attributes: BTreeMap<String, Map<String, Value>>,
  globals: Map<String, Value>,
  error_count: u64,
  active_state: Option<String>,
  visits: BTreeMap<String, u64>,
  history: Vec<TransitionRecord>,
}

impl ExecutionContext {
  /// Seeds node attributes and globals from the definition.
  pub fn from_topology(topology: &Topology) -> Self {
    let attributes = topology
      .nodes()
      .map(|n| (n.name.clone(), n.attributes.clone()))
      .collect();
    Self {
      attributes,
      globals: topology.attributes().clone(),
      ..Default::default()
    }
  }

  pub fn get(&self, node: &str, attr: &str) -> Option<&Value> {
    self.attributes.get(node).and_then(|m| m.get(attr))
  }

  pub fn set(&mut self, node: &str, attr: &str, value: Value) {
    self
      .attributes
      .entry(node.to_string())
      .or_default()
      .insert(attr.to_string(), value);
  }

  pub fn node_attributes(&self, node: &str) -> Option<&Map<String, Value>> {
    self.attributes.get(node)
  }

  pub fn globals(&self) -> &Map<String, Value> {
    &self.globals
  }

  pub fn set_global(&mut self, key: &str, value: Value) {
    self.globals.insert(key.to_string(), value);
  }

  /// Reads `node.attr` on behalf of `viewer`, enforcing read grants.
  pub fn read_as(
    &self,
    topology: &Topology,
    viewer: &str,
    node: &str,
    attr: &str,
  ) -> Result<Option<&Value>, EngineError> {
    if !topology.contains(node) {
      return Err(EngineError::UnknownNode(node.to_string()));
    }
    if !topology.can_read(viewer, node) {
      return Err(EngineError::AccessDenied {
        viewer: viewer.to_string(),
        node: node.to_string(),
        access: "read",
      });
    }
    Ok(self.get(node, attr))
  }

  /// Writes `node.attr` on behalf of `viewer`, enforcing write grants.
  pub fn write_as(
    &mut self,
    topology: &Topology,
    viewer: &str,
    node: &str,
    attr: &str,
    value: Value,
  ) -> Result<(), EngineError> {
    if !topology.contains(node) {
      return Err(EngineError::UnknownNode(node.to_string()));
    }
    if !topology.can_write(viewer, node) {
      return Err(EngineError::AccessDenied {
        viewer: viewer.to_string(),
        node: node.to_string(),
        access: "write",
      });
    }
    self.set(node, attr, value);
    Ok(())
  }

  /// Applies `node.attr` keyed updates produced by `viewer`. Keys without a dot address the
  /// viewer's own attributes. Rejected writes are logged and skipped; returns how many landed.
  #[instrument(level = "trace", skip(self, topology, updates))]
  pub fn commit_updates(
    &mut self,
    topology: &Topology,
    viewer: &str,
    updates: &BTreeMap<String, Value>,
  ) -> usize {
    let mut applied = 0;
    for (key, value) in updates {
      let (node, attr) = match key.rsplit_once('.') {
        Some((n, a)) => (topology.resolve(n).unwrap_or_else(|| n.to_string()), a),
        None => (viewer.to_string(), key.as_str()),
      };
      match self.write_as(topology, viewer, &node, attr, value.clone()) {
        Ok(()) => applied += 1,
        Err(e) => warn!(node = %viewer, key = %key, error = %e, "skipping context update"),
      }
    }
    applied
  }

  pub fn record_transition(&mut self, from: &str, to: &str, label: Option<&str>) {
    self.history.push(TransitionRecord::now(from, to, label));
  }

  pub fn history(&self) -> &[TransitionRecord] {
    &self.history
  }

  /// Counts an entry into `node`; returns the new count.
  pub fn visit(&mut self, node: &str) -> u64 {
    let count = self.visits.entry(node.to_string()).or_insert(0);
    *count += 1;
    *count
  }

  pub fn visits(&self) -> &BTreeMap<String, u64> {
    &self.visits
  }

  pub fn error_count(&self) -> u64 {
    self.error_count
  }

  pub fn increment_errors(&mut self) -> u64 {
    self.error_count += 1;
    self.error_count
  }

  pub fn active_state(&self) -> Option<&str> {
    self.active_state.as_deref()
  }

  pub fn set_active_state(&mut self, node: &str) {
    self.active_state = Some(node.to_string());
  }

  /// Drops attributes of nodes no longer in `topology` and seeds newly added ones.
  pub(crate) fn reconcile(&mut self, topology: &Topology) {
    self.attributes.retain(|name, _| topology.contains(name));
    for n in topology.nodes() {
      self
        .attributes
        .entry(n.name.clone())
        .or_insert_with(|| n.attributes.clone());
    }
    for (k, v) in topology.attributes() {
      self.globals.entry(k.clone()).or_insert_with(|| v.clone());
    }
  }

  /// A scope for expression evaluation. With a viewer, data nodes outside its read grants are
  /// invisible.
  pub fn view<'a>(&'a self, topology: &'a Topology, viewer: Option<&'a str>) -> ContextView<'a> {
    ContextView {
      context: self,
      topology,
      viewer,
    }
  }

  /// Full snapshot for reports.
  pub fn to_json(&self) -> Value {
    json!({
      "nodes": self.attributes,
      "globals": self.globals,
      "errorCount": self.error_count,
      "activeState": self.active_state,
    })
  }

  /// What a task delegate sees: its own attributes plus every data node it may read.
  pub fn visible_json(&self, topology: &Topology, viewer: &str) -> Value {
    let mut nodes = Map::new();
    let readable = topology.readable_context(viewer);
    for name in std::iter::once(viewer.to_string()).chain(readable) {
      if let Some(attrs) = self.attributes.get(&name) {
        nodes.insert(name, Value::Object(attrs.clone()));
      }
    }
    json!({
      "nodes": nodes,
      "globals": self.globals,
      "errorCount": self.error_count,
      "activeState": self.active_state,
    })
  }
}

/// Read-only [Scope] over an [ExecutionContext].
///
/// Names resolve to a node's attribute object (qualified or unambiguous short name), then to a
/// machine-level global.
pub struct ContextView<'a> {
  context: &'a ExecutionContext,
  topology: &'a Topology,
  viewer: Option<&'a str>,
}

impl ContextView<'_> {
  fn visible(&self, node: &str) -> bool {
    match (self.viewer, self.topology.node_type(node)) {
      (Some(viewer), Some(t)) if t.is_data() => self.topology.can_read(viewer, node),
      _ => true,
    }
  }
}

impl Scope for ContextView<'_> {
  fn reserved(&self, name: &str) -> Option<Value> {
    match name {
      "errorCount" => Some(Value::from(self.context.error_count)),
      "activeState" => Some(
        self
          .context
          .active_state
          .clone()
          .map(Value::String)
          .unwrap_or(Value::Null),
      ),
      _ => None,
    }
  }

  fn lookup(&self, name: &str) -> Option<Value> {
    if let Some(node) = self.topology.resolve(name) {
      if !self.visible(&node) {
        return None;
      }
      return Some(Value::Object(
        self.context.attributes.get(&node).cloned().unwrap_or_default(),
      ));
    }
    self.context.globals.get(name).cloned()
  }
}
