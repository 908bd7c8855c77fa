//! Tests for the expression lexer.

use super::lexer::{Token, tokenize};

fn kinds(src: &str) -> Vec<Token> {
  tokenize(src).unwrap().into_iter().map(|(t, _)| t).collect()
}

#[test]
fn lexes_comparison_and_logic() {
  assert_eq!(
    kinds("a >= 1 && !b"),
    vec![
      Token::Ident("a".into()),
      Token::Ge,
      Token::Int(1),
      Token::AndAnd,
      Token::Bang,
      Token::Ident("b".into()),
      Token::Eof,
    ]
  );
}

#[test]
fn triple_equals_is_equality() {
  assert_eq!(kinds("a === b")[1], Token::EqEq);
  assert_eq!(kinds("a !== b")[1], Token::NotEq);
}

#[test]
fn lexes_strings_with_escapes() {
  assert_eq!(kinds(r#""a\"b""#)[0], Token::Str("a\"b".into()));
  assert_eq!(kinds("'it\\'s'")[0], Token::Str("it's".into()));
}

#[test]
fn lexes_floats_and_dotted_paths() {
  assert_eq!(kinds("1.5")[0], Token::Float(1.5));
  assert_eq!(
    kinds("items.0"),
    vec![
      Token::Ident("items".into()),
      Token::Dot,
      Token::Int(0),
      Token::Eof
    ]
  );
}

#[test]
fn keywords() {
  assert_eq!(
    kinds("true false null undefined"),
    vec![
      Token::True,
      Token::False,
      Token::Null,
      Token::Null,
      Token::Eof
    ]
  );
}

#[test]
fn unterminated_string_is_error() {
  assert!(tokenize("'abc").is_err());
}

#[test]
fn unexpected_character_reports_position() {
  let err = tokenize("a # b").unwrap_err();
  assert!(err.to_string().contains("at 2"));
}

#[test]
fn lexes_multibyte_string_literals() {
  assert_eq!(
    kinds(r#"name == "日本""#),
    vec![
      Token::Ident("name".into()),
      Token::EqEq,
      Token::Str("日本".into()),
      Token::Eof,
    ]
  );
  assert_eq!(kinds("'é'")[0], Token::Str("é".into()));
  assert_eq!(kinds("\"é\" != 'ü'")[1], Token::NotEq);
}

#[test]
fn stray_non_ascii_character_is_syntax_error() {
  let err = tokenize("a == é").unwrap_err();
  assert!(err.to_string().contains("at 5"), "{}", err);
  assert!(err.to_string().contains("'é'"), "{}", err);
  assert!(tokenize("日").is_err());
}
