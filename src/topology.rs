//! Resolved, queryable view of a machine definition.
//!
//! Built once per definition: qualifies nested names, resolves every node's type, normalizes edge
//! endpoints and precomputes the context access grants. All queries take qualified names.

use serde_json::{Map, Value};
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use tracing::{debug, instrument};

use crate::condition;
use crate::error::EngineError;
use crate::type_resolver::get_node_type;
use crate::types::{AnnotationSet, MachineDefinition, MachineEdge, MachineNode, NodeType};

/// A node with its qualified name and resolved type.
#[derive(Debug, Clone)]
pub struct NodeInfo {
  pub name: String,
  pub node_type: NodeType,
  /// The type was declared (and recognised) rather than inferred.
  pub declared: bool,
  pub attributes: Map<String, Value>,
  pub annotations: AnnotationSet,
  pub parent: Option<String>,
  pub children: Vec<String>,
}

impl NodeInfo {
  pub fn short_name(&self) -> &str {
    self.name.rsplit('.').next().unwrap_or(&self.name)
  }

  pub fn prompt(&self) -> Option<&str> {
    self.attributes.get("prompt").and_then(Value::as_str)
  }
}

/// An edge with qualified endpoints and its extracted condition.
#[derive(Debug, Clone)]
pub struct EdgeInfo {
  /// Position in the definition's edge list.
  pub index: usize,
  pub source: String,
  pub targets: Vec<String>,
  /// Targets a path can move to (executable nodes not reserved for compensation).
  pub control_targets: Vec<String>,
  /// Targets run only when compensating for the source.
  pub compensation_targets: Vec<String>,
  pub label: Option<String>,
  pub condition: Option<String>,
  pub annotations: AnnotationSet,
}

impl EdgeInfo {
  /// Traversed by paths: leads to an executable node and is not a compensation link.
  pub fn is_control(&self) -> bool {
    !self.control_targets.is_empty()
  }

  pub fn barrier(&self) -> Option<&str> {
    self.annotations.barrier.as_deref()
  }
}

#[derive(Debug, Clone)]
pub struct Topology {
  title: String,
  attributes: Map<String, Value>,
  nodes: Vec<NodeInfo>,
  index: HashMap<String, usize>,
  edges: Vec<EdgeInfo>,
  outgoing: HashMap<String, Vec<usize>>,
  reads: HashMap<String, BTreeSet<String>>,
  writes: HashMap<String, BTreeSet<String>>,
}

impl Topology {
  /// Resolves names and types; fails on unknown or ambiguous references and duplicates.
  #[instrument(level = "trace", skip(def), fields(title = %def.title))]
  pub fn build(def: &MachineDefinition) -> Result<Self, EngineError> {
    let qualified = qualify_names(&def.nodes)?;
    let mut index = HashMap::new();
    for (i, q) in qualified.iter().enumerate() {
      if index.insert(q.clone(), i).is_some() {
        return Err(EngineError::ParseInput(format!("duplicate node name: {}", q)));
      }
    }

    let resolve = |name: &str| -> Result<String, EngineError> {
      resolve_against(&qualified, name)
        .ok_or_else(|| EngineError::ParseInput(format!("unknown or ambiguous node: {}", name)))
    };
    let mut normalized = Vec::with_capacity(def.edges.len());
    for e in &def.edges {
      let mut edge = e.clone();
      edge.source = resolve(e.source.as_str())?;
      edge.targets = e
        .targets
        .iter()
        .map(|t| resolve(t.as_str()))
        .collect::<Result<_, _>>()?;
      normalized.push(edge);
    }

    let mut nodes: Vec<NodeInfo> = def
      .nodes
      .iter()
      .zip(&qualified)
      .map(|(n, q)| {
        let mut named = n.clone();
        named.name = q.clone();
        let declared = n
          .node_type
          .as_deref()
          .is_some_and(|t| t.parse::<NodeType>().is_ok());
        NodeInfo {
          name: q.clone(),
          node_type: get_node_type(&named, Some(&normalized)),
          declared,
          attributes: n.attributes.clone(),
          annotations: n.annotation_set(),
          parent: None,
          children: vec![],
        }
      })
      .collect();
    for (i, n) in def.nodes.iter().enumerate() {
      if n.parent.is_some() {
        let q = &qualified[i];
        let parent = q.rsplit_once('.').map(|(p, _)| p.to_string());
        if let Some(p) = parent {
          if let Some(&pi) = index.get(&p) {
            nodes[pi].children.push(q.clone());
            nodes[i].parent = Some(p);
          }
        }
      }
    }

    let mut topology = Topology {
      title: def.title.clone(),
      attributes: def.attributes.clone(),
      nodes,
      index,
      edges: vec![],
      outgoing: HashMap::new(),
      reads: HashMap::new(),
      writes: HashMap::new(),
    };
    topology.edges = normalized
      .iter()
      .enumerate()
      .map(|(i, e)| topology.edge_info(i, e))
      .collect();
    for e in &topology.edges {
      topology
        .outgoing
        .entry(e.source.clone())
        .or_default()
        .push(e.index);
    }
    topology.compute_grants();
    debug!(
      nodes = topology.nodes.len(),
      edges = topology.edges.len(),
      "machine topology built"
    );
    Ok(topology)
  }

  fn edge_info(&self, index: usize, e: &MachineEdge) -> EdgeInfo {
    let annotations = e.annotation_set();
    let (compensation_targets, control_targets): (Vec<String>, Vec<String>) = e
      .targets
      .iter()
      .filter(|t| self.node_type(t).is_some_and(NodeType::is_executable))
      .cloned()
      .partition(|t| {
        annotations.compensate || self.node(t).is_some_and(|n| n.annotations.compensate)
      });
    EdgeInfo {
      index,
      source: e.source.clone(),
      targets: e.targets.clone(),
      control_targets,
      compensation_targets,
      label: e.label.clone(),
      condition: condition::extract(e),
      annotations,
    }
  }

  fn compute_grants(&mut self) {
    let mut reads: HashMap<String, BTreeSet<String>> = HashMap::new();
    let mut writes: HashMap<String, BTreeSet<String>> = HashMap::new();
    for e in &self.edges {
      if e.annotations.compensate {
        continue;
      }
      for t in &e.targets {
        if self.is_data(t) {
          // `viewer -> data` grants read and write.
          reads.entry(e.source.clone()).or_default().insert(t.clone());
          writes.entry(e.source.clone()).or_default().insert(t.clone());
        }
        if self.is_data(&e.source) {
          reads.entry(t.clone()).or_default().insert(e.source.clone());
        }
      }
    }
    // A node sees its own data children.
    for n in &self.nodes {
      for c in &n.children {
        if self.is_data(c) {
          reads.entry(n.name.clone()).or_default().insert(c.clone());
        }
      }
    }
    self.reads = reads;
    self.writes = writes;
  }

  fn is_data(&self, name: &str) -> bool {
    self.node_type(name).is_some_and(NodeType::is_data)
  }

  pub fn title(&self) -> &str {
    &self.title
  }

  pub fn attributes(&self) -> &Map<String, Value> {
    &self.attributes
  }

  pub fn node(&self, name: &str) -> Option<&NodeInfo> {
    self.index.get(name).map(|&i| &self.nodes[i])
  }

  /// Nodes in declaration order.
  pub fn nodes(&self) -> impl Iterator<Item = &NodeInfo> {
    self.nodes.iter()
  }

  pub fn contains(&self, name: &str) -> bool {
    self.index.contains_key(name)
  }

  /// Qualified name for an exact or unambiguous short reference.
  pub fn resolve(&self, name: &str) -> Option<String> {
    if self.index.contains_key(name) {
      return Some(name.to_string());
    }
    let names: Vec<String> = self.nodes.iter().map(|n| n.name.clone()).collect();
    resolve_against(&names, name)
  }

  pub fn node_type(&self, name: &str) -> Option<NodeType> {
    self.node(name).map(|n| n.node_type)
  }

  pub fn edges(&self) -> &[EdgeInfo] {
    &self.edges
  }

  pub fn edge(&self, index: usize) -> Option<&EdgeInfo> {
    self.edges.get(index)
  }

  pub fn outgoing(&self, name: &str) -> Vec<&EdgeInfo> {
    self
      .outgoing
      .get(name)
      .map(|ids| ids.iter().map(|&i| &self.edges[i]).collect())
      .unwrap_or_default()
  }

  pub fn children(&self, name: &str) -> &[String] {
    self.node(name).map(|n| n.children.as_slice()).unwrap_or(&[])
  }

  /// Enclosing nodes, nearest first.
  pub fn ancestors(&self, name: &str) -> Vec<String> {
    let mut out = vec![];
    let mut cur = self.node(name).and_then(|n| n.parent.clone());
    while let Some(p) = cur {
      cur = self.node(&p).and_then(|n| n.parent.clone());
      out.push(p);
    }
    out
  }

  /// A state node with at least one executable child.
  pub fn is_module(&self, name: &str) -> bool {
    self.node_type(name) == Some(NodeType::State) && self.module_entry(name).is_some()
  }

  /// The child a path enters first: task before state before any other executable child,
  /// declaration order breaking ties.
  pub fn module_entry(&self, name: &str) -> Option<String> {
    let rank = |t: NodeType| match t {
      NodeType::Task => 0,
      NodeType::State => 1,
      _ => 2,
    };
    self
      .children(name)
      .iter()
      .filter_map(|c| self.node(c))
      .filter(|c| c.node_type.is_executable())
      .enumerate()
      .min_by_key(|(i, c)| (rank(c.node_type), *i))
      .map(|(_, c)| c.name.clone())
  }

  /// Control edges leaving `name` itself.
  pub fn control_edges(&self, name: &str) -> Vec<&EdgeInfo> {
    self
      .outgoing(name)
      .into_iter()
      .filter(|e| e.is_control())
      .collect()
  }

  /// Edges a path at `name` may take: its own control edges or, for a terminal child, the
  /// enclosing module's (recursively).
  pub fn transition_edges(&self, name: &str) -> Vec<&EdgeInfo> {
    let own = self.control_edges(name);
    if !own.is_empty() {
      return own;
    }
    match self.node(name).and_then(|n| n.parent.as_deref()) {
      Some(parent) if self.is_module(parent) => self.transition_edges(parent),
      _ => vec![],
    }
  }

  /// Compensating counterparts: targets of `@compensate` edges and directly linked
  /// `@compensate` nodes.
  pub fn compensation_targets(&self, name: &str) -> Vec<String> {
    self
      .outgoing(name)
      .into_iter()
      .flat_map(|e| e.compensation_targets.iter().cloned())
      .collect()
  }

  /// Data nodes `viewer` may read: explicit grants plus everything visible to its ancestors.
  pub fn readable_context(&self, viewer: &str) -> BTreeSet<String> {
    let mut out = BTreeSet::new();
    let mut chain = vec![viewer.to_string()];
    chain.extend(self.ancestors(viewer));
    for n in chain {
      if let Some(r) = self.reads.get(&n) {
        out.extend(r.iter().cloned());
      }
      if let Some(w) = self.writes.get(&n) {
        out.extend(w.iter().cloned());
      }
    }
    out
  }

  /// Data nodes `viewer` may write: explicit grants only.
  pub fn writable_context(&self, viewer: &str) -> BTreeSet<String> {
    self.writes.get(viewer).cloned().unwrap_or_default()
  }

  pub fn can_read(&self, viewer: &str, node: &str) -> bool {
    viewer == node || self.readable_context(viewer).contains(node)
  }

  pub fn can_write(&self, viewer: &str, node: &str) -> bool {
    viewer == node
      || self
        .writes
        .get(viewer)
        .is_some_and(|w| w.contains(node))
  }

  /// Data-holding nodes in declaration order.
  pub fn data_nodes(&self) -> Vec<&NodeInfo> {
    self
      .nodes
      .iter()
      .filter(|n| n.node_type.is_data())
      .collect()
  }

  /// Where paths begin: declared init nodes, else `start`/`start_*`, else top-level executables
  /// without incoming edges from executables, else the first executable node.
  pub fn start_nodes(&self) -> Vec<String> {
    let top: Vec<&NodeInfo> = self
      .nodes
      .iter()
      .filter(|n| n.parent.is_none() && n.node_type.is_executable())
      .collect();

    let init: Vec<String> = top
      .iter()
      .filter(|n| n.declared && n.node_type == NodeType::Init)
      .map(|n| n.name.clone())
      .collect();
    if !init.is_empty() {
      return init;
    }

    let named: Vec<String> = top
      .iter()
      .filter(|n| {
        let s = n.short_name().to_ascii_lowercase();
        s == "start" || s.starts_with("start_")
      })
      .map(|n| n.name.clone())
      .collect();
    if !named.is_empty() {
      return named;
    }

    let mut fed: HashSet<&str> = HashSet::new();
    for e in &self.edges {
      if !self.node_type(&e.source).is_some_and(NodeType::is_executable) {
        continue;
      }
      fed.extend(e.targets.iter().map(String::as_str));
    }
    let roots: Vec<String> = top
      .iter()
      .filter(|n| !fed.contains(n.name.as_str()))
      .map(|n| n.name.clone())
      .collect();
    if !roots.is_empty() {
      return roots;
    }

    self
      .nodes
      .iter()
      .find(|n| n.node_type.is_executable())
      .or_else(|| self.nodes.first())
      .map(|n| vec![n.name.clone()])
      .unwrap_or_default()
  }

  /// True when a path at `from` can still reach an edge tagged `@barrier(barrier)`.
  pub fn can_reach_barrier(&self, from: &str, barrier: &str) -> bool {
    let mut seen = HashSet::new();
    let mut queue = VecDeque::from([from.to_string()]);
    while let Some(n) = queue.pop_front() {
      if !seen.insert(n.clone()) {
        continue;
      }
      if let Some(entry) = self.module_entry(&n) {
        queue.push_back(entry);
      }
      for e in self.transition_edges(&n) {
        if e.barrier() == Some(barrier) {
          return true;
        }
        queue.extend(e.control_targets.iter().cloned());
      }
    }
    false
  }
}

/// Qualifies every node name with its ancestors' names (`parent.child`).
fn qualify_names(nodes: &[MachineNode]) -> Result<Vec<String>, EngineError> {
  let mut qualified: Vec<Option<String>> = nodes
    .iter()
    .map(|n| n.parent.is_none().then(|| n.name.clone()))
    .collect();
  loop {
    let mut progress = false;
    for (i, n) in nodes.iter().enumerate() {
      let (None, Some(parent_ref)) = (&qualified[i], n.parent.as_deref()) else {
        continue;
      };
      let parent = match find_parent(nodes, &qualified, i, parent_ref)? {
        Some(p) => p,
        None => continue,
      };
      let prefix = format!("{}.", parent);
      qualified[i] = Some(if n.name.starts_with(&prefix) {
        n.name.clone()
      } else {
        format!("{}{}", prefix, n.name)
      });
      progress = true;
    }
    if !progress {
      break;
    }
  }
  qualified
    .into_iter()
    .zip(nodes)
    .map(|(q, n)| {
      q.ok_or_else(|| {
        EngineError::ParseInput(format!(
          "node {} has an unknown or cyclic parent {}",
          n.name,
          n.parent.as_deref().unwrap_or_default()
        ))
      })
    })
    .collect()
}

/// Qualified name of `parent_ref`, `None` while it is still unresolved.
fn find_parent(
  nodes: &[MachineNode],
  qualified: &[Option<String>],
  child: usize,
  parent_ref: &str,
) -> Result<Option<String>, EngineError> {
  if let Some(q) = qualified
    .iter()
    .enumerate()
    .filter(|(j, _)| *j != child)
    .find_map(|(_, q)| q.as_deref().filter(|q| *q == parent_ref))
  {
    return Ok(Some(q.to_string()));
  }
  let candidates: Vec<usize> = nodes
    .iter()
    .enumerate()
    .filter(|(j, n)| *j != child && (n.name == parent_ref || n.short_name() == parent_ref))
    .map(|(j, _)| j)
    .collect();
  match candidates.as_slice() {
    [j] => Ok(qualified[*j].clone()),
    [] => Ok(None),
    _ => Err(EngineError::ParseInput(format!(
      "ambiguous parent reference: {}",
      parent_ref
    ))),
  }
}

/// Exact match first, then a unique dotted-suffix match.
fn resolve_against(qualified: &[String], name: &str) -> Option<String> {
  if qualified.iter().any(|q| q == name) {
    return Some(name.to_string());
  }
  let suffix = format!(".{}", name);
  let mut matches = qualified.iter().filter(|q| q.ends_with(&suffix));
  match (matches.next(), matches.next()) {
    (Some(only), None) => Some(only.clone()),
    _ => None,
  }
}
