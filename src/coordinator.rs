//! Machine-wide failure policy.
//!
//! Consulted only after a node's retries are exhausted. Fatal errors end the run whatever the
//! policy says.

use tracing::{error, instrument};

use crate::config::ErrorPolicy;
use crate::error::EngineError;
use crate::topology::Topology;

/// One compensating node to run, and the completed node it compensates for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompensationStep {
  pub completed: String,
  pub counterpart: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
  /// Stop scheduling every path; the run fails.
  HaltAll,
  /// Only the failing path ends.
  TerminatePath,
  /// Run these compensations (most recent first), then end the failing path.
  Compensate(Vec<CompensationStep>),
}

/// Decides how an exhausted failure of `node` on a path with `completed` history is handled.
#[instrument(level = "trace", skip(topology, completed))]
pub fn decide(
  policy: ErrorPolicy,
  topology: &Topology,
  node: &str,
  completed: &[String],
  failure: &EngineError,
) -> Decision {
  error!(node = %node, error = %failure, policy = %policy, "node failed after retries");
  if failure.is_fatal() {
    return Decision::HaltAll;
  }
  match policy {
    ErrorPolicy::FailFast => Decision::HaltAll,
    ErrorPolicy::Continue => Decision::TerminatePath,
    ErrorPolicy::Compensate => Decision::Compensate(compensation_plan(topology, completed)),
  }
}

/// Walks `completed` in reverse, collecting each node's compensating counterparts. A counterpart
/// runs at most once.
pub fn compensation_plan(topology: &Topology, completed: &[String]) -> Vec<CompensationStep> {
  let mut plan: Vec<CompensationStep> = vec![];
  for node in completed.iter().rev() {
    for counterpart in topology.compensation_targets(node) {
      if plan.iter().any(|s| s.counterpart == counterpart) {
        continue;
      }
      plan.push(CompensationStep {
        completed: node.clone(),
        counterpart,
      });
    }
  }
  plan
}
