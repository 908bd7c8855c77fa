//! Embedded expression language for edge conditions and `{{ expr }}` prompt templates.
//!
//! Supports `== != < <= > >=`, `&& || !`, `+ - * /` (with string concatenation), the ternary
//! `?:`, dotted property access and literals. Evaluation never fails on missing data: an absent
//! path resolves to `null`. Only syntactically invalid expressions return an error.
//!
//! Identifiers resolve through two tiers: the reserved built-ins (`errorCount`, its alias
//! `errors`, and `activeState`) always come from [Scope::reserved]; everything else goes through
//! [Scope::lookup].

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde_json::{Map, Value};
use tracing::{debug, instrument};

mod evaluator;
#[cfg(test)]
mod evaluator_test;
mod lexer;
#[cfg(test)]
mod lexer_test;
mod parser;

pub use evaluator::{RESERVED_NAMES, render, truthy};

/// Errors from parsing an expression.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExpressionError {
  #[error("syntax error at {position}: {message}")]
  Syntax { position: usize, message: String },
}

/// Name resolution for expression evaluation.
pub trait Scope {
  /// Value of a reserved built-in (`errorCount`, `activeState`).
  fn reserved(&self, name: &str) -> Option<Value>;
  /// Value bound to a (possibly dotted) name in the generic attribute map.
  fn lookup(&self, name: &str) -> Option<Value>;
}

/// A [Scope] over plain JSON maps.
#[derive(Debug, Clone, Default)]
pub struct MapScope {
  builtins: Map<String, Value>,
  values: Map<String, Value>,
}

impl MapScope {
  pub fn new(values: Map<String, Value>) -> Self {
    Self {
      builtins: Map::new(),
      values,
    }
  }

  /// Builds a scope from a JSON object; reserved names found at the top level become built-ins.
  pub fn from_json(value: Value) -> Self {
    let mut scope = Self::default();
    if let Value::Object(map) = value {
      for (k, v) in map {
        if RESERVED_NAMES.contains(&k.as_str()) {
          scope.builtins.insert(k, v);
        } else {
          scope.values.insert(k, v);
        }
      }
    }
    scope
  }

  pub fn with_builtin(mut self, name: &str, value: Value) -> Self {
    self.builtins.insert(name.to_string(), value);
    self
  }

  pub fn with_value(mut self, name: &str, value: Value) -> Self {
    self.values.insert(name.to_string(), value);
    self
  }
}

impl Scope for MapScope {
  fn reserved(&self, name: &str) -> Option<Value> {
    self.builtins.get(name).cloned()
  }

  fn lookup(&self, name: &str) -> Option<Value> {
    self.values.get(name).cloned()
  }
}

/// Evaluates `expr` to a JSON value.
#[instrument(level = "trace", skip(scope))]
pub fn evaluate(expr: &str, scope: &dyn Scope) -> Result<Value, ExpressionError> {
  let ast = parser::parse(expr)?;
  Ok(evaluator::eval(&ast, scope))
}

/// Evaluates a condition to a boolean. Accepts an optional `when:`/`unless:`/`if:` prefix.
///
/// Never fails: any error is logged and treated as `false`.
#[instrument(level = "trace", skip(scope))]
pub fn evaluate_condition(expr: &str, scope: &dyn Scope) -> bool {
  let normalized = normalize_condition(expr);
  match evaluate(&normalized, scope) {
    Ok(v) => truthy(&v),
    Err(e) => {
      debug!(condition = %expr, error = %e, "condition failed to evaluate, treating as false");
      false
    }
  }
}

/// Strips a `when:`/`if:` prefix, rewrites `unless: E` to `!(E)` and strips wrapping quotes.
pub fn normalize_condition(text: &str) -> String {
  let text = strip_quotes(text.trim());
  for prefix in ["when", "if"] {
    if let Some(rest) = strip_keyword(text, prefix) {
      return strip_quotes(rest).to_string();
    }
  }
  if let Some(rest) = strip_keyword(text, "unless") {
    return format!("!({})", strip_quotes(rest));
  }
  text.to_string()
}

fn strip_keyword<'a>(text: &'a str, keyword: &str) -> Option<&'a str> {
  let head = text.get(..keyword.len())?;
  if !head.eq_ignore_ascii_case(keyword) {
    return None;
  }
  text[keyword.len()..]
    .trim_start()
    .strip_prefix(':')
    .map(str::trim)
}

/// Removes one layer of matching wrapping quotes, if present.
pub(crate) fn strip_quotes(s: &str) -> &str {
  let s = s.trim();
  for q in ['"', '\''] {
    if s.len() >= 2 && s.starts_with(q) && s.ends_with(q) {
      let inner = &s[1..s.len() - 1];
      // `"a" == "b"` is an expression, not a quoted one.
      if !inner.contains(q) {
        return inner.trim();
      }
    }
  }
  s
}

static TEMPLATE_RE: Lazy<Regex> =
  Lazy::new(|| Regex::new(r"\{\{\s*(.*?)\s*\}\}").expect("static template regex"));

/// Replaces every `{{ expr }}` placeholder with its rendered value.
///
/// A placeholder that fails to evaluate is left in place verbatim.
#[instrument(level = "trace", skip(scope))]
pub fn resolve_template(template: &str, scope: &dyn Scope) -> String {
  TEMPLATE_RE
    .replace_all(template, |caps: &Captures| {
      let inner = caps.get(1).map(|m| m.as_str()).unwrap_or("");
      match evaluate(inner, scope) {
        Ok(v) => render(&v),
        Err(e) => {
          debug!(placeholder = %inner, error = %e, "template placeholder left unresolved");
          caps[0].to_string()
        }
      }
    })
    .into_owned()
}
