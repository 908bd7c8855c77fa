//! Pure scheduling decisions: edge eligibility and ordering, barrier rendezvous bookkeeping and
//! queued fan-out promotion. The engine's driver loop applies them to its path records.

use std::collections::BTreeMap;
use tracing::{debug, instrument};

use crate::expression::{Scope, evaluate_condition};
use crate::topology::{EdgeInfo, Topology};
use crate::types::{PathCursor, PathId, PathStatus};

/// Eligible transition edges from `node`, best first.
#[instrument(level = "trace", skip(topology, scope))]
pub fn eligible_edges<'a>(topology: &'a Topology, node: &str, scope: &dyn Scope) -> Vec<&'a EdgeInfo> {
  let mut eligible: Vec<&EdgeInfo> = topology
    .transition_edges(node)
    .into_iter()
    .filter(|e| match &e.condition {
      None => true,
      Some(c) => {
        let active = evaluate_condition(c, scope);
        debug!(node = %node, condition = %c, active, "edge condition evaluated");
        active
      }
    })
    .collect();
  order_by_priority(&mut eligible);
  eligible
}

/// Stable sort by `@priority(n)` ascending; unannotated edges go last.
pub fn order_by_priority(edges: &mut [&EdgeInfo]) {
  edges.sort_by_key(|e| match e.annotations.priority {
    Some(p) => (0, p),
    None => (1, 0),
  });
}

/// The edge a path at `node` takes, if any.
pub fn select_transition<'a>(
  topology: &'a Topology,
  node: &str,
  scope: &dyn Scope,
) -> Option<&'a EdgeInfo> {
  eligible_edges(topology, node, scope).into_iter().next()
}

/// Live paths taking part in `barrier`: blocked at it, or able to reach a `barrier`-tagged edge.
pub fn barrier_participants(topology: &Topology, paths: &[PathCursor], barrier: &str) -> Vec<PathId> {
  paths
    .iter()
    .filter(|p| p.is_live())
    .filter(|p| match &p.status {
      PathStatus::Blocked { barrier: b } if b == barrier => true,
      PathStatus::Blocked { .. } => p
        .pending_edge
        .and_then(|i| topology.edge(i))
        .is_some_and(|e| {
          e.control_targets
            .iter()
            .any(|t| topology.can_reach_barrier(t, barrier))
        }),
      _ => topology.can_reach_barrier(&p.current, barrier),
    })
    .map(|p| p.id)
    .collect()
}

/// True when every participant of `barrier` has arrived.
pub fn barrier_ready(topology: &Topology, paths: &[PathCursor], barrier: &str) -> bool {
  let participants = barrier_participants(topology, paths, barrier);
  !participants.is_empty()
    && participants.iter().all(|id| {
      paths
        .iter()
        .any(|p| p.id == *id && p.blocked_at() == Some(barrier))
    })
}

/// Arrival order per barrier, used to pick which barrier to force open on a deadlock.
#[derive(Debug, Clone, Default)]
pub struct BarrierTable {
  seq: u64,
  first_arrival: BTreeMap<String, u64>,
}

impl BarrierTable {
  pub fn arrive(&mut self, barrier: &str) {
    self.seq += 1;
    let seq = self.seq;
    self.first_arrival.entry(barrier.to_string()).or_insert(seq);
  }

  pub fn release(&mut self, barrier: &str) {
    self.first_arrival.remove(barrier);
  }

  /// Barriers with waiting paths, earliest first arrival first.
  pub fn pending(&self) -> Vec<String> {
    let mut v: Vec<(&String, &u64)> = self.first_arrival.iter().collect();
    v.sort_by_key(|(_, seq)| **seq);
    v.into_iter().map(|(b, _)| b.clone()).collect()
  }

  /// Rebuilds arrival order from path records (path-id order).
  pub fn rebuild(paths: &[PathCursor]) -> Self {
    let mut table = Self::default();
    let mut blocked: Vec<&PathCursor> = paths.iter().filter(|p| p.blocked_at().is_some()).collect();
    blocked.sort_by_key(|p| p.id);
    for p in blocked {
      if let Some(b) = p.blocked_at() {
        table.arrive(b);
      }
    }
    table
  }
}

/// Moves queued paths into free slots, lowest id first. Returns the promoted ids.
pub fn promote_queued(paths: &mut [PathCursor], max_live: usize) -> Vec<PathId> {
  let mut live = paths.iter().filter(|p| p.is_live()).count();
  let mut queued: Vec<usize> = paths
    .iter()
    .enumerate()
    .filter(|(_, p)| p.status == PathStatus::Queued)
    .map(|(i, _)| i)
    .collect();
  queued.sort_by_key(|&i| paths[i].id);
  let mut promoted = vec![];
  for i in queued {
    if live >= max_live {
      break;
    }
    paths[i].status = PathStatus::Running;
    promoted.push(paths[i].id);
    live += 1;
  }
  promoted
}
