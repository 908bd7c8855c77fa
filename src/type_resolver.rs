//! Resolves the runtime role of a node.
//!
//! An explicit, recognised `type` always wins. Otherwise the first matching rule of an ordered
//! predicate table decides; [NodeType::State] is the fallback.

use serde_json::{Map, Value};
use tracing::{debug, instrument};

use crate::types::{MachineEdge, MachineNode, NodeType};

/// Attribute keys that mark a tool definition.
const TOOL_KEYS: &[&str] = &["input", "output", "parameters", "schema", "returns"];

/// Name fragments that mark a data-holding node.
const CONTEXT_NAME_HINTS: &[&str] = &["context", "data", "input", "output", "result", "config"];

/// Attribute keys that disqualify a node from being treated as plain data.
const BEHAVIOUR_KEYS: &[&str] = &["prompt", "meta", "condition"];

/// What the inference rules look at.
#[derive(Debug, Clone, Copy)]
pub(crate) struct InferenceInput<'a> {
  pub name: &'a str,
  pub attributes: &'a Map<String, Value>,
  /// `None` when no edge list was supplied.
  pub incoming: Option<usize>,
  pub outgoing: Option<usize>,
}

pub(crate) struct Rule {
  pub name: &'static str,
  pub matches: fn(&InferenceInput<'_>) -> bool,
  pub yields: NodeType,
}

/// Inference rules, checked in order.
pub(crate) const RULES: &[Rule] = &[
  Rule {
    name: "has-prompt",
    matches: has_prompt,
    yields: NodeType::Task,
  },
  Rule {
    name: "tool-shape",
    matches: has_tool_shape,
    yields: NodeType::Tool,
  },
  Rule {
    name: "data-holder",
    matches: looks_like_data,
    yields: NodeType::Context,
  },
  Rule {
    name: "entry-point",
    matches: is_entry_point,
    yields: NodeType::Init,
  },
];

fn has_prompt(input: &InferenceInput<'_>) -> bool {
  input.attributes.contains_key("prompt")
}

fn has_tool_shape(input: &InferenceInput<'_>) -> bool {
  TOOL_KEYS.iter().any(|k| input.attributes.contains_key(*k))
}

fn looks_like_data(input: &InferenceInput<'_>) -> bool {
  let short = input.name.rsplit('.').next().unwrap_or(input.name);
  let lower = short.to_ascii_lowercase();
  // "state" on its own names a state node, not a data holder.
  let named_like_data = CONTEXT_NAME_HINTS.iter().any(|h| lower.contains(h))
    || (lower.contains("state") && lower != "state");
  let plain_attributes = !input.attributes.is_empty()
    && !BEHAVIOUR_KEYS
      .iter()
      .any(|k| input.attributes.contains_key(*k));
  named_like_data || plain_attributes
}

fn is_entry_point(input: &InferenceInput<'_>) -> bool {
  matches!((input.incoming, input.outgoing), (Some(0), Some(out)) if out > 0)
}

/// Returns the node's declared type when recognised, otherwise its inferred type.
///
/// Edge endpoints are matched against `node.name`, so callers pass qualified names on both.
#[instrument(level = "trace", skip(node, edges), fields(node = %node.name))]
pub fn get_node_type(node: &MachineNode, edges: Option<&[MachineEdge]>) -> NodeType {
  if let Some(declared) = node.node_type.as_deref() {
    match declared.parse::<NodeType>() {
      Ok(t) => return t,
      Err(e) => debug!(node = %node.name, error = %e, "falling back to type inference"),
    }
  }
  infer_type(node, edges)
}

/// Infers a node's type from its attributes, name and edge degree.
pub fn infer_type(node: &MachineNode, edges: Option<&[MachineEdge]>) -> NodeType {
  let (incoming, outgoing) = match edges {
    Some(edges) => {
      let incoming = edges
        .iter()
        .filter(|e| e.targets.iter().any(|t| *t == node.name))
        .count();
      let outgoing = edges.iter().filter(|e| e.source == node.name).count();
      (Some(incoming), Some(outgoing))
    }
    None => (None, None),
  };
  let input = InferenceInput {
    name: &node.name,
    attributes: &node.attributes,
    incoming,
    outgoing,
  };
  infer_from(&input)
}

pub(crate) fn infer_from(input: &InferenceInput<'_>) -> NodeType {
  RULES
    .iter()
    .find(|rule| (rule.matches)(input))
    .map(|rule| {
      debug!(node = %input.name, rule = rule.name, node_type = %rule.yields, "inferred node type");
      rule.yields
    })
    .unwrap_or(NodeType::State)
}
