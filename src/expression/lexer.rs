//! Tokenizer for the condition/template expression language.

use super::ExpressionError;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token {
  Int(i64),
  Float(f64),
  Str(String),
  Ident(String),
  True,
  False,
  Null,
  EqEq,
  NotEq,
  Lt,
  Le,
  Gt,
  Ge,
  AndAnd,
  OrOr,
  Bang,
  Plus,
  Minus,
  Star,
  Slash,
  Question,
  Colon,
  Dot,
  LParen,
  RParen,
  Eof,
}

/// A token and the byte offset it starts at.
pub(crate) type Spanned = (Token, usize);

pub(crate) fn tokenize(src: &str) -> Result<Vec<Spanned>, ExpressionError> {
  let bytes = src.as_bytes();
  let mut out = Vec::new();
  let mut i = 0;
  while i < bytes.len() {
    let c = bytes[i];
    if c.is_ascii_whitespace() {
      i += 1;
      continue;
    }
    let start = i;
    let two = bytes.get(i..i + 2).unwrap_or_default();
    let three = bytes.get(i..i + 3).unwrap_or_default();
    // `===` and `!==` are accepted as plain equality.
    if matches!(three, b"===" | b"!==") {
      out.push((if c == b'=' { Token::EqEq } else { Token::NotEq }, start));
      i += 3;
      continue;
    }
    let op = match two {
      b"==" => Some(Token::EqEq),
      b"!=" => Some(Token::NotEq),
      b"<=" => Some(Token::Le),
      b">=" => Some(Token::Ge),
      b"&&" => Some(Token::AndAnd),
      b"||" => Some(Token::OrOr),
      _ => None,
    };
    if let Some(tok) = op {
      out.push((tok, start));
      i += 2;
      continue;
    }
    let single = match c {
      b'<' => Some(Token::Lt),
      b'>' => Some(Token::Gt),
      b'!' => Some(Token::Bang),
      b'+' => Some(Token::Plus),
      b'-' => Some(Token::Minus),
      b'*' => Some(Token::Star),
      b'/' => Some(Token::Slash),
      b'?' => Some(Token::Question),
      b':' => Some(Token::Colon),
      b'.' => Some(Token::Dot),
      b'(' => Some(Token::LParen),
      b')' => Some(Token::RParen),
      _ => None,
    };
    if let Some(tok) = single {
      out.push((tok, start));
      i += 1;
      continue;
    }
    if c == b'"' || c == b'\'' {
      let (s, next) = lex_string(src, i)?;
      out.push((Token::Str(s), start));
      i = next;
      continue;
    }
    if c.is_ascii_digit() {
      let (tok, next) = lex_number(src, i)?;
      out.push((tok, start));
      i = next;
      continue;
    }
    if c.is_ascii_alphabetic() || c == b'_' || c == b'$' {
      let mut end = i;
      while end < bytes.len()
        && (bytes[end].is_ascii_alphanumeric() || bytes[end] == b'_' || bytes[end] == b'$')
      {
        end += 1;
      }
      let word = &src[i..end];
      let tok = match word {
        "true" => Token::True,
        "false" => Token::False,
        "null" | "undefined" => Token::Null,
        _ => Token::Ident(word.to_string()),
      };
      out.push((tok, start));
      i = end;
      continue;
    }
    let ch = src[i..].chars().next().unwrap_or('?');
    return Err(ExpressionError::Syntax {
      position: i,
      message: format!("unexpected character '{}'", ch),
    });
  }
  out.push((Token::Eof, src.len()));
  Ok(out)
}

fn lex_string(src: &str, start: usize) -> Result<(String, usize), ExpressionError> {
  let quote = src.as_bytes()[start] as char;
  let mut out = String::new();
  let mut chars = src[start + 1..].char_indices();
  while let Some((off, c)) = chars.next() {
    if c == quote {
      return Ok((out, start + 1 + off + c.len_utf8()));
    }
    if c == '\\' {
      match chars.next() {
        Some((_, 'n')) => out.push('\n'),
        Some((_, 't')) => out.push('\t'),
        Some((_, other)) => out.push(other),
        None => break,
      }
      continue;
    }
    out.push(c);
  }
  Err(ExpressionError::Syntax {
    position: start,
    message: "unterminated string literal".to_string(),
  })
}

fn lex_number(src: &str, start: usize) -> Result<(Token, usize), ExpressionError> {
  let bytes = src.as_bytes();
  let mut end = start;
  while end < bytes.len() && bytes[end].is_ascii_digit() {
    end += 1;
  }
  let mut is_float = false;
  if end + 1 < bytes.len() && bytes[end] == b'.' && bytes[end + 1].is_ascii_digit() {
    is_float = true;
    end += 1;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
      end += 1;
    }
  }
  let text = &src[start..end];
  let bad = || ExpressionError::Syntax {
    position: start,
    message: format!("invalid number '{}'", text),
  };
  let tok = if is_float {
    Token::Float(text.parse().map_err(|_| bad())?)
  } else {
    match text.parse::<i64>() {
      Ok(n) => Token::Int(n),
      Err(_) => Token::Float(text.parse().map_err(|_| bad())?),
    }
  };
  Ok((tok, end))
}
