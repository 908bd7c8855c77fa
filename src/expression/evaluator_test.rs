//! Tests for expression evaluation, conditions and templates.

use proptest::prelude::*;
use serde_json::{Value, json};

use super::{MapScope, evaluate, evaluate_condition, normalize_condition, resolve_template};

fn scope(v: Value) -> MapScope {
  MapScope::from_json(v)
}

#[test]
fn status_condition_matches_context() {
  assert!(evaluate_condition(
    r#"when: status == "valid""#,
    &scope(json!({"status": "valid"}))
  ));
  assert!(!evaluate_condition(
    r#"when: status == "valid""#,
    &scope(json!({"status": "invalid"}))
  ));
}

#[test]
fn unless_error_count() {
  assert!(!evaluate_condition(
    "unless: errorCount > 0",
    &scope(json!({"errorCount": 3}))
  ));
  assert!(evaluate_condition(
    "unless: errorCount > 0",
    &scope(json!({"errorCount": 0}))
  ));
}

#[test]
fn builtin_wins_over_same_named_node() {
  let s = MapScope::default()
    .with_builtin("errorCount", json!(5))
    .with_value("errorCount", json!({"value": 1}));
  assert!(evaluate_condition("errorCount == 5", &s));
  assert!(evaluate_condition("errors == 5", &s));
}

#[test]
fn reserved_name_never_falls_back_to_attributes() {
  let s = MapScope::default().with_value("activeState", json!("spoofed"));
  assert_eq!(evaluate("activeState", &s).unwrap(), Value::Null);
}

#[test]
fn missing_nested_path_is_null() {
  let s = scope(json!({"config": {"retry": 2}}));
  assert_eq!(evaluate("config.missing.deeper", &s).unwrap(), Value::Null);
  assert_eq!(evaluate("nothing.here", &s).unwrap(), Value::Null);
  assert_eq!(evaluate("config.retry", &s).unwrap(), json!(2));
}

#[test]
fn longest_dotted_name_wins() {
  let s = MapScope::default()
    .with_value("pipeline", json!({"stage": "outer"}))
    .with_value("pipeline.stage", json!({"status": "inner"}));
  assert_eq!(
    evaluate("pipeline.stage.status", &s).unwrap(),
    json!("inner")
  );
}

#[test]
fn arithmetic_and_concatenation() {
  let s = scope(json!({"n": 4, "name": "bob"}));
  assert_eq!(evaluate("n * 2 + 1", &s).unwrap(), json!(9));
  assert_eq!(evaluate("n / 8", &s).unwrap(), json!(0.5));
  assert_eq!(evaluate("n / 0", &s).unwrap(), Value::Null);
  assert_eq!(evaluate("'hi ' + name", &s).unwrap(), json!("hi bob"));
  assert_eq!(evaluate("name + n", &s).unwrap(), json!("bob4"));
  assert_eq!(evaluate("-n", &s).unwrap(), json!(-4));
}

#[test]
fn ternary_and_logic() {
  let s = scope(json!({"score": 80, "flag": false}));
  assert_eq!(
    evaluate("score >= 75 ? 'pass' : 'fail'", &s).unwrap(),
    json!("pass")
  );
  assert_eq!(evaluate("flag || score > 10", &s).unwrap(), json!(true));
  assert_eq!(evaluate("!flag && score < 10", &s).unwrap(), json!(false));
}

#[test]
fn loose_equality_coerces_strings() {
  let s = scope(json!({"count": "3", "done": "true"}));
  assert!(evaluate_condition("count == 3", &s));
  assert!(evaluate_condition("done == true", &s));
  assert!(evaluate_condition("count > 2", &s));
}

#[test]
fn array_length_and_index() {
  let s = scope(json!({"items": ["a", "b"]}));
  assert_eq!(evaluate("items.length", &s).unwrap(), json!(2));
  assert_eq!(evaluate("items.1", &s).unwrap(), json!("b"));
  assert_eq!(evaluate("items.9", &s).unwrap(), Value::Null);
}

#[test]
fn invalid_condition_is_false() {
  let s = scope(json!({}));
  assert!(!evaluate_condition("status ==", &s));
  assert!(!evaluate_condition("unless: (", &s));
  assert!(evaluate("status ==", &s).is_err());
}

#[test]
fn normalize_handles_prefixes_and_quotes() {
  assert_eq!(normalize_condition("when: a > 1"), "a > 1");
  assert_eq!(normalize_condition("IF: a"), "a");
  assert_eq!(normalize_condition("unless: a > 1"), "!(a > 1)");
  assert_eq!(normalize_condition("\"a > 1\""), "a > 1");
  assert_eq!(normalize_condition("when: 'x == \"y\"'"), "x == \"y\"");
  assert_eq!(normalize_condition("\"a\" == \"b\""), "\"a\" == \"b\"");
}

#[test]
fn template_renders_values() {
  let s = scope(json!({"user": {"name": "Ada"}, "n": 2, "obj": {"k": 1}, "none": null}));
  assert_eq!(
    resolve_template("Hello {{ user.name }}, n={{n + 1}}", &s),
    "Hello Ada, n=3"
  );
  assert_eq!(resolve_template("{{ obj }}", &s), r#"{"k":1}"#);
  assert_eq!(resolve_template("[{{ none }}]", &s), "[]");
}

#[test]
fn non_ascii_literals_compare_by_value() {
  let s = scope(json!({"name": "日本"}));
  assert!(evaluate_condition(r#"when: name == "日本""#, &s));
  assert!(!evaluate_condition(r#"unless: name == "日本""#, &s));
  assert!(!evaluate_condition("when: name == 'é'", &s));
  assert_eq!(evaluate("'é' + 1", &s).unwrap(), json!("é1"));
}

#[test]
fn stray_non_ascii_condition_is_false() {
  let s = scope(json!({"name": "日本"}));
  assert!(!evaluate_condition("when: name == 日本", &s));
  assert!(!evaluate_condition("unless: name == 日本", &s));
}

#[test]
fn templates_with_non_ascii_text() {
  let s = scope(json!({"city": "Zürich"}));
  assert_eq!(resolve_template("hi {{ \"é\" }}", &s), "hi é");
  assert_eq!(resolve_template("Grüße aus {{ city }}", &s), "Grüße aus Zürich");
  assert_eq!(resolve_template("{{ city == ü }}", &s), "{{ city == ü }}");
}

#[test]
fn template_keeps_broken_placeholders() {
  let s = scope(json!({"a": 1}));
  assert_eq!(
    resolve_template("x {{ a + }} y {{ a }}", &s),
    "x {{ a + }} y 1"
  );
}

fn well_formed_expr() -> impl Strategy<Value = String> {
  let leaf = prop_oneof![
    (0i64..20).prop_map(|n| n.to_string()),
    Just("errorCount".to_string()),
    Just("status".to_string()),
    Just("'ok'".to_string()),
    "[a-zé日本ü ]{0,4}".prop_map(|t| format!("'{}'", t)),
    Just("flag".to_string()),
    Just("missing.path".to_string()),
  ];
  leaf.prop_recursive(3, 16, 2, |inner| {
    (
      inner.clone(),
      prop_oneof![
        Just("=="),
        Just("!="),
        Just("<"),
        Just(">="),
        Just("&&"),
        Just("||"),
        Just("+")
      ],
      inner,
    )
      .prop_map(|(l, op, r)| format!("({} {} {})", l, op, r))
  })
}

fn context() -> impl Strategy<Value = MapScope> {
  let status = prop_oneof![Just("ok".to_string()), "[a-zé日本ü]{0,4}"];
  (0i64..5, status, any::<bool>()).prop_map(|(e, s, f)| {
    MapScope::default()
      .with_builtin("errorCount", json!(e))
      .with_value("status", json!(s))
      .with_value("flag", json!(f))
  })
}

proptest! {
  #[test]
  fn unless_is_dual_of_when(expr in well_formed_expr(), ctx in context()) {
    let when = evaluate_condition(&format!("when: {}", expr), &ctx);
    let unless = evaluate_condition(&format!("unless: {}", expr), &ctx);
    prop_assert_eq!(unless, !when);
  }

  #[test]
  fn evaluation_is_deterministic(expr in well_formed_expr(), ctx in context()) {
    prop_assert_eq!(evaluate(&expr, &ctx).ok(), evaluate(&expr, &ctx).ok());
  }
}
