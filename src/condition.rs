//! Extracts the boolean condition attached to an edge.
//!
//! A structured `{when|unless|if: expr}` clause (or an explicit condition string) wins over a
//! legacy free-text label prefixed with `when:`, `unless:` or `if:`. `unless: E` becomes `!(E)`.
//! An edge without a condition is always eligible.

use tracing::instrument;

use crate::expression::normalize_condition;
use crate::types::{EdgeCondition, MachineEdge};

const LABEL_PREFIXES: &[&str] = &["when", "unless", "if"];

/// Returns the edge's condition as a single boolean expression, if it has one.
#[instrument(level = "trace", skip(edge), fields(source = %edge.source))]
pub fn extract(edge: &MachineEdge) -> Option<String> {
  let from_condition = match &edge.condition {
    Some(EdgeCondition::Clause(clause)) => clause
      .when
      .as_deref()
      .or(clause.if_.as_deref())
      .map(normalize_condition)
      .or_else(|| {
        clause
          .unless
          .as_deref()
          .map(|e| normalize_condition(&format!("unless: {}", e)))
      }),
    Some(EdgeCondition::Text(text)) => Some(normalize_condition(text)),
    None => None,
  };
  from_condition
    .or_else(|| edge.label.as_deref().and_then(condition_from_label))
    .filter(|c| !c.trim().is_empty())
}

/// Reads a condition out of a legacy label; plain labels carry none.
pub(crate) fn condition_from_label(label: &str) -> Option<String> {
  let trimmed = crate::expression::strip_quotes(label);
  let lower = trimmed.to_ascii_lowercase();
  let prefixed = LABEL_PREFIXES.iter().any(|p| {
    lower
      .strip_prefix(p)
      .is_some_and(|rest| rest.trim_start().starts_with(':'))
  });
  prefixed.then(|| normalize_condition(trimmed))
}
