//! Recursive-descent parser producing an [Expr] tree.
//!
//! Precedence, loosest first: ternary, `||`, `&&`, equality, comparison, additive,
//! multiplicative, unary, primary.

use serde_json::Value;

use super::ExpressionError;
use super::lexer::{Spanned, Token, tokenize};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BinaryOp {
  Eq,
  NotEq,
  Lt,
  Le,
  Gt,
  Ge,
  And,
  Or,
  Add,
  Sub,
  Mul,
  Div,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum UnaryOp {
  Not,
  Neg,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Expr {
  Literal(Value),
  /// Dotted property access, e.g. `config.retries.max`.
  Path(Vec<String>),
  Unary(UnaryOp, Box<Expr>),
  Binary(BinaryOp, Box<Expr>, Box<Expr>),
  Ternary(Box<Expr>, Box<Expr>, Box<Expr>),
}

pub(crate) fn parse(src: &str) -> Result<Expr, ExpressionError> {
  let tokens = tokenize(src)?;
  let mut p = Parser { tokens, pos: 0 };
  let expr = p.ternary()?;
  match p.peek() {
    Token::Eof => Ok(expr),
    other => Err(p.error(format!("unexpected trailing token {:?}", other))),
  }
}

struct Parser {
  tokens: Vec<Spanned>,
  pos: usize,
}

impl Parser {
  fn peek(&self) -> &Token {
    self
      .tokens
      .get(self.pos)
      .map(|(t, _)| t)
      .unwrap_or(&Token::Eof)
  }

  fn position(&self) -> usize {
    self.tokens.get(self.pos).map(|(_, p)| *p).unwrap_or(0)
  }

  fn advance(&mut self) -> Token {
    let tok = self.peek().clone();
    if self.pos < self.tokens.len() {
      self.pos += 1;
    }
    tok
  }

  fn eat(&mut self, tok: &Token) -> bool {
    if self.peek() == tok {
      self.pos += 1;
      true
    } else {
      false
    }
  }

  fn error(&self, message: String) -> ExpressionError {
    ExpressionError::Syntax {
      position: self.position(),
      message,
    }
  }

  fn ternary(&mut self) -> Result<Expr, ExpressionError> {
    let cond = self.or()?;
    if !self.eat(&Token::Question) {
      return Ok(cond);
    }
    let then = self.ternary()?;
    if !self.eat(&Token::Colon) {
      return Err(self.error("expected ':' in ternary".to_string()));
    }
    let otherwise = self.ternary()?;
    Ok(Expr::Ternary(
      Box::new(cond),
      Box::new(then),
      Box::new(otherwise),
    ))
  }

  fn or(&mut self) -> Result<Expr, ExpressionError> {
    let mut lhs = self.and()?;
    while self.eat(&Token::OrOr) {
      let rhs = self.and()?;
      lhs = Expr::Binary(BinaryOp::Or, Box::new(lhs), Box::new(rhs));
    }
    Ok(lhs)
  }

  fn and(&mut self) -> Result<Expr, ExpressionError> {
    let mut lhs = self.equality()?;
    while self.eat(&Token::AndAnd) {
      let rhs = self.equality()?;
      lhs = Expr::Binary(BinaryOp::And, Box::new(lhs), Box::new(rhs));
    }
    Ok(lhs)
  }

  fn equality(&mut self) -> Result<Expr, ExpressionError> {
    let mut lhs = self.comparison()?;
    loop {
      let op = match self.peek() {
        Token::EqEq => BinaryOp::Eq,
        Token::NotEq => BinaryOp::NotEq,
        _ => return Ok(lhs),
      };
      self.advance();
      let rhs = self.comparison()?;
      lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
    }
  }

  fn comparison(&mut self) -> Result<Expr, ExpressionError> {
    let mut lhs = self.additive()?;
    loop {
      let op = match self.peek() {
        Token::Lt => BinaryOp::Lt,
        Token::Le => BinaryOp::Le,
        Token::Gt => BinaryOp::Gt,
        Token::Ge => BinaryOp::Ge,
        _ => return Ok(lhs),
      };
      self.advance();
      let rhs = self.additive()?;
      lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
    }
  }

  fn additive(&mut self) -> Result<Expr, ExpressionError> {
    let mut lhs = self.multiplicative()?;
    loop {
      let op = match self.peek() {
        Token::Plus => BinaryOp::Add,
        Token::Minus => BinaryOp::Sub,
        _ => return Ok(lhs),
      };
      self.advance();
      let rhs = self.multiplicative()?;
      lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
    }
  }

  fn multiplicative(&mut self) -> Result<Expr, ExpressionError> {
    let mut lhs = self.unary()?;
    loop {
      let op = match self.peek() {
        Token::Star => BinaryOp::Mul,
        Token::Slash => BinaryOp::Div,
        _ => return Ok(lhs),
      };
      self.advance();
      let rhs = self.unary()?;
      lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
    }
  }

  fn unary(&mut self) -> Result<Expr, ExpressionError> {
    if self.eat(&Token::Bang) {
      return Ok(Expr::Unary(UnaryOp::Not, Box::new(self.unary()?)));
    }
    if self.eat(&Token::Minus) {
      return Ok(Expr::Unary(UnaryOp::Neg, Box::new(self.unary()?)));
    }
    self.primary()
  }

  fn primary(&mut self) -> Result<Expr, ExpressionError> {
    let position = self.position();
    match self.advance() {
      Token::Int(n) => Ok(Expr::Literal(Value::from(n))),
      Token::Float(f) => Ok(Expr::Literal(
        serde_json::Number::from_f64(f)
          .map(Value::Number)
          .unwrap_or(Value::Null),
      )),
      Token::Str(s) => Ok(Expr::Literal(Value::String(s))),
      Token::True => Ok(Expr::Literal(Value::Bool(true))),
      Token::False => Ok(Expr::Literal(Value::Bool(false))),
      Token::Null => Ok(Expr::Literal(Value::Null)),
      Token::Ident(first) => self.path(first),
      Token::LParen => {
        let inner = self.ternary()?;
        if !self.eat(&Token::RParen) {
          return Err(self.error("expected ')'".to_string()));
        }
        Ok(inner)
      }
      Token::Eof => Err(ExpressionError::Syntax {
        position,
        message: "unexpected end of expression".to_string(),
      }),
      other => Err(ExpressionError::Syntax {
        position,
        message: format!("unexpected token {:?}", other),
      }),
    }
  }

  fn path(&mut self, first: String) -> Result<Expr, ExpressionError> {
    let mut segments = vec![first];
    while self.eat(&Token::Dot) {
      match self.advance() {
        Token::Ident(s) => segments.push(s),
        Token::Int(n) => segments.push(n.to_string()),
        // Keywords are valid property names after a dot.
        Token::True => segments.push("true".to_string()),
        Token::False => segments.push("false".to_string()),
        Token::Null => segments.push("null".to_string()),
        _ => return Err(self.error("expected property name after '.'".to_string())),
      }
    }
    Ok(Expr::Path(segments))
  }
}
