//! Tree-walking evaluation of parsed expressions against a [Scope].

use serde_json::Value;
use std::cmp::Ordering;

use super::Scope;
use super::parser::{BinaryOp, Expr, UnaryOp};

/// Names that always resolve from engine-tracked state, never from user attributes.
pub const RESERVED_NAMES: &[&str] = &["errorCount", "errors", "activeState"];

/// Maps a reserved name (or alias) to its canonical built-in name.
pub(crate) fn canonical_builtin(name: &str) -> Option<&'static str> {
  match name {
    "errorCount" | "errors" => Some("errorCount"),
    "activeState" => Some("activeState"),
    _ => None,
  }
}

pub(crate) fn eval(expr: &Expr, scope: &dyn Scope) -> Value {
  match expr {
    Expr::Literal(v) => v.clone(),
    Expr::Path(segments) => resolve_path(segments, scope),
    Expr::Unary(UnaryOp::Not, inner) => Value::Bool(!truthy(&eval(inner, scope))),
    Expr::Unary(UnaryOp::Neg, inner) => to_number(&eval(inner, scope))
      .map(|n| number_value(-n))
      .unwrap_or(Value::Null),
    Expr::Binary(BinaryOp::And, l, r) => {
      Value::Bool(truthy(&eval(l, scope)) && truthy(&eval(r, scope)))
    }
    Expr::Binary(BinaryOp::Or, l, r) => {
      Value::Bool(truthy(&eval(l, scope)) || truthy(&eval(r, scope)))
    }
    Expr::Binary(op, l, r) => binary(*op, &eval(l, scope), &eval(r, scope)),
    Expr::Ternary(c, t, f) => {
      if truthy(&eval(c, scope)) {
        eval(t, scope)
      } else {
        eval(f, scope)
      }
    }
  }
}

/// Two-tier lookup: the reserved table first, then the longest matching name in the scope.
fn resolve_path(segments: &[String], scope: &dyn Scope) -> Value {
  if let Some(builtin) = canonical_builtin(&segments[0]) {
    let root = scope.reserved(builtin).unwrap_or(Value::Null);
    return walk(root, &segments[1..]);
  }
  for split in (1..=segments.len()).rev() {
    let name = segments[..split].join(".");
    if let Some(root) = scope.lookup(&name) {
      return walk(root, &segments[split..]);
    }
  }
  Value::Null
}

fn walk(mut value: Value, rest: &[String]) -> Value {
  for seg in rest {
    value = match value {
      Value::Object(map) => map.get(seg.as_str()).cloned().unwrap_or(Value::Null),
      Value::Array(items) if seg == "length" => Value::from(items.len()),
      Value::Array(mut items) => match seg.parse::<usize>() {
        Ok(i) if i < items.len() => items.swap_remove(i),
        _ => Value::Null,
      },
      Value::String(s) if seg == "length" => Value::from(s.chars().count()),
      _ => Value::Null,
    };
  }
  value
}

fn binary(op: BinaryOp, l: &Value, r: &Value) -> Value {
  match op {
    BinaryOp::Eq => Value::Bool(loose_eq(l, r)),
    BinaryOp::NotEq => Value::Bool(!loose_eq(l, r)),
    BinaryOp::Lt => Value::Bool(compare(l, r) == Some(Ordering::Less)),
    BinaryOp::Le => Value::Bool(matches!(
      compare(l, r),
      Some(Ordering::Less | Ordering::Equal)
    )),
    BinaryOp::Gt => Value::Bool(compare(l, r) == Some(Ordering::Greater)),
    BinaryOp::Ge => Value::Bool(matches!(
      compare(l, r),
      Some(Ordering::Greater | Ordering::Equal)
    )),
    BinaryOp::Add if l.is_string() || r.is_string() => {
      Value::String(format!("{}{}", render(l), render(r)))
    }
    BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div => arithmetic(op, l, r),
    BinaryOp::And => Value::Bool(truthy(l) && truthy(r)),
    BinaryOp::Or => Value::Bool(truthy(l) || truthy(r)),
  }
}

fn arithmetic(op: BinaryOp, l: &Value, r: &Value) -> Value {
  if let (Some(a), Some(b)) = (l.as_i64(), r.as_i64()) {
    let exact = match op {
      BinaryOp::Add => a.checked_add(b),
      BinaryOp::Sub => a.checked_sub(b),
      BinaryOp::Mul => a.checked_mul(b),
      _ => None,
    };
    if let Some(n) = exact {
      return Value::from(n);
    }
  }
  let (Some(a), Some(b)) = (to_number(l), to_number(r)) else {
    return Value::Null;
  };
  match op {
    BinaryOp::Add => number_value(a + b),
    BinaryOp::Sub => number_value(a - b),
    BinaryOp::Mul => number_value(a * b),
    BinaryOp::Div if b == 0.0 => Value::Null,
    BinaryOp::Div => number_value(a / b),
    _ => Value::Null,
  }
}

/// Equality with light coercion: numbers compare numerically, numeric strings and
/// `"true"`/`"false"` strings compare against numbers and booleans.
pub(crate) fn loose_eq(l: &Value, r: &Value) -> bool {
  match (l, r) {
    (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
    (Value::Number(n), Value::String(s)) | (Value::String(s), Value::Number(n)) => s
      .trim()
      .parse::<f64>()
      .ok()
      .is_some_and(|x| Some(x) == n.as_f64()),
    (Value::Bool(b), Value::String(s)) | (Value::String(s), Value::Bool(b)) => {
      s.trim() == if *b { "true" } else { "false" }
    }
    _ => l == r,
  }
}

fn compare(l: &Value, r: &Value) -> Option<Ordering> {
  match (l, r) {
    (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
    _ => {
      let a = to_number(l)?;
      let b = to_number(r)?;
      a.partial_cmp(&b)
    }
  }
}

fn to_number(v: &Value) -> Option<f64> {
  match v {
    Value::Number(n) => n.as_f64(),
    Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
    Value::Null => Some(0.0),
    Value::String(s) => s.trim().parse().ok(),
    _ => None,
  }
}

fn number_value(f: f64) -> Value {
  if f.is_finite() && f.fract() == 0.0 && f.abs() < 9.0e15 {
    Value::from(f as i64)
  } else {
    serde_json::Number::from_f64(f)
      .map(Value::Number)
      .unwrap_or(Value::Null)
  }
}

/// JavaScript-like truthiness.
pub fn truthy(value: &Value) -> bool {
  match value {
    Value::Bool(b) => *b,
    Value::Null => false,
    Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
    Value::String(s) => !s.is_empty(),
    Value::Array(_) | Value::Object(_) => true,
  }
}

/// Renders a value for template output: scalars as-is, null as empty, structures as compact JSON.
pub fn render(value: &Value) -> String {
  match value {
    Value::Null => String::new(),
    Value::String(s) => s.clone(),
    Value::Bool(b) => b.to_string(),
    Value::Number(n) => n.to_string(),
    Value::Array(_) | Value::Object(_) => serde_json::to_string(value).unwrap_or_default(),
  }
}
