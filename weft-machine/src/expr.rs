//! Guard expression parsing and evaluation.
//!
//! Expressions are evaluated against the event variable pool. The language
//! supports:
//!
//! - `name` / `name.nested` - variable lookup (missing paths resolve to null)
//! - `== !=` - equality over strings, numbers, booleans, and null
//! - `> >= < <=` - numeric ordering
//! - `+ - * / %` - numeric arithmetic
//! - `!expr` - logical NOT, `-expr` - numeric negation
//! - `expr && expr` - logical AND (higher precedence than OR)
//! - `expr || expr` - logical OR
//! - `(expr)` - grouping
//! - `"text"`, `42`, `1.5`, `true`, `false`, `null` - literals
//!
//! Logical operators require boolean operands; ordering and arithmetic
//! require numbers. Violations are evaluation errors, not false.

use serde_json::{Map, Number, Value};
use thiserror::Error;

/// Errors from parsing or evaluating an expression.
#[derive(Debug, Clone, Error)]
pub enum ExprError {
    #[error("parse error: {reason}")]
    Parse { reason: String },

    #[error("type error: {reason}")]
    Type { reason: String },
}

impl ExprError {
    fn parse(reason: impl Into<String>) -> Self {
        Self::Parse {
            reason: reason.into(),
        }
    }

    fn typed(reason: impl Into<String>) -> Self {
        Self::Type {
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Or,
    And,
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

/// A parsed expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    Var(String),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
}

impl Expr {
    /// Parses an expression from a string.
    pub fn parse(input: &str) -> Result<Self, ExprError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(ExprError::parse("empty expression"));
        }
        let mut parser = Parser::new(trimmed);
        let expr = parser.parse_or()?;
        parser.skip_whitespace();
        if parser.pos < parser.input.len() {
            return Err(ExprError::parse(format!(
                "unexpected trailing input: '{}'",
                &parser.input[parser.pos..]
            )));
        }
        Ok(expr)
    }

    /// Evaluates the expression against the variable pool.
    pub fn eval(&self, vars: &Map<String, Value>) -> Result<Value, ExprError> {
        match self {
            Expr::Literal(value) => Ok(value.clone()),
            Expr::Var(path) => Ok(lookup(vars, path)),
            Expr::Unary(UnaryOp::Not, inner) => {
                let value = as_bool(inner.eval(vars)?)?;
                Ok(Value::Bool(!value))
            }
            Expr::Unary(UnaryOp::Neg, inner) => {
                let value = as_f64(inner.eval(vars)?)?;
                number(-value)
            }
            Expr::Binary(BinaryOp::Or, left, right) => {
                if as_bool(left.eval(vars)?)? {
                    return Ok(Value::Bool(true));
                }
                Ok(Value::Bool(as_bool(right.eval(vars)?)?))
            }
            Expr::Binary(BinaryOp::And, left, right) => {
                if !as_bool(left.eval(vars)?)? {
                    return Ok(Value::Bool(false));
                }
                Ok(Value::Bool(as_bool(right.eval(vars)?)?))
            }
            Expr::Binary(BinaryOp::Eq, left, right) => Ok(Value::Bool(values_equal(
                &left.eval(vars)?,
                &right.eval(vars)?,
            ))),
            Expr::Binary(BinaryOp::Ne, left, right) => Ok(Value::Bool(!values_equal(
                &left.eval(vars)?,
                &right.eval(vars)?,
            ))),
            Expr::Binary(op @ (BinaryOp::Gt | BinaryOp::Ge | BinaryOp::Lt | BinaryOp::Le), left, right) => {
                let l = as_f64(left.eval(vars)?)?;
                let r = as_f64(right.eval(vars)?)?;
                let result = match op {
                    BinaryOp::Gt => l > r,
                    BinaryOp::Ge => l >= r,
                    BinaryOp::Lt => l < r,
                    _ => l <= r,
                };
                Ok(Value::Bool(result))
            }
            Expr::Binary(op, left, right) => {
                let l = as_f64(left.eval(vars)?)?;
                let r = as_f64(right.eval(vars)?)?;
                let result = match op {
                    BinaryOp::Add => l + r,
                    BinaryOp::Sub => l - r,
                    BinaryOp::Mul => l * r,
                    BinaryOp::Div => l / r,
                    _ => l % r,
                };
                number(result)
            }
        }
    }
}

fn lookup(vars: &Map<String, Value>, path: &str) -> Value {
    let mut parts = path.split('.');
    let first = parts.next().expect("split yields at least one part");
    let mut current = match vars.get(first) {
        Some(value) => value,
        None => return Value::Null,
    };
    for part in parts {
        match current {
            Value::Object(map) => {
                current = map.get(part).unwrap_or(&Value::Null);
            }
            _ => return Value::Null,
        }
    }
    current.clone()
}

fn as_bool(value: Value) -> Result<bool, ExprError> {
    match value {
        Value::Bool(b) => Ok(b),
        other => Err(ExprError::typed(format!("expected a boolean, got {other}"))),
    }
}

fn as_f64(value: Value) -> Result<f64, ExprError> {
    match value {
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| ExprError::typed("number is not representable as f64")),
        other => Err(ExprError::typed(format!("expected a number, got {other}"))),
    }
}

fn number(value: f64) -> Result<Value, ExprError> {
    Number::from_f64(value)
        .map(Value::Number)
        .ok_or_else(|| ExprError::typed("non-finite arithmetic result"))
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::Number(a), Value::Number(b)) => a
            .as_f64()
            .zip(b.as_f64())
            .map(|(a, b)| (a - b).abs() < f64::EPSILON)
            .unwrap_or(false),
        (Value::String(a), Value::String(b)) => a == b,
        _ => false,
    }
}

/// Recursive descent parser.
struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn parse_or(&mut self) -> Result<Expr, ExprError> {
        let mut left = self.parse_and()?;
        self.skip_whitespace();
        while self.peek_str("||") {
            self.pos += 2;
            let right = self.parse_and()?;
            left = Expr::Binary(BinaryOp::Or, Box::new(left), Box::new(right));
            self.skip_whitespace();
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, ExprError> {
        let mut left = self.parse_not()?;
        self.skip_whitespace();
        while self.peek_str("&&") {
            self.pos += 2;
            let right = self.parse_not()?;
            left = Expr::Binary(BinaryOp::And, Box::new(left), Box::new(right));
            self.skip_whitespace();
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> Result<Expr, ExprError> {
        self.skip_whitespace();
        if self.peek_char() == Some('!') && !self.peek_str("!=") {
            self.pos += 1;
            let inner = self.parse_not()?;
            return Ok(Expr::Unary(UnaryOp::Not, Box::new(inner)));
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Expr, ExprError> {
        let left = self.parse_additive()?;
        self.skip_whitespace();
        let op = if self.peek_str("==") {
            Some((BinaryOp::Eq, 2))
        } else if self.peek_str("!=") {
            Some((BinaryOp::Ne, 2))
        } else if self.peek_str(">=") {
            Some((BinaryOp::Ge, 2))
        } else if self.peek_str("<=") {
            Some((BinaryOp::Le, 2))
        } else if self.peek_char() == Some('>') {
            Some((BinaryOp::Gt, 1))
        } else if self.peek_char() == Some('<') {
            Some((BinaryOp::Lt, 1))
        } else {
            None
        };
        match op {
            Some((op, width)) => {
                self.pos += width;
                let right = self.parse_additive()?;
                Ok(Expr::Binary(op, Box::new(left), Box::new(right)))
            }
            None => Ok(left),
        }
    }

    fn parse_additive(&mut self) -> Result<Expr, ExprError> {
        let mut left = self.parse_multiplicative()?;
        self.skip_whitespace();
        while let Some(c) = self.peek_char() {
            let op = match c {
                '+' => BinaryOp::Add,
                '-' => BinaryOp::Sub,
                _ => break,
            };
            self.pos += 1;
            let right = self.parse_multiplicative()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
            self.skip_whitespace();
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, ExprError> {
        let mut left = self.parse_unary()?;
        self.skip_whitespace();
        while let Some(c) = self.peek_char() {
            let op = match c {
                '*' => BinaryOp::Mul,
                '/' => BinaryOp::Div,
                '%' => BinaryOp::Rem,
                _ => break,
            };
            self.pos += 1;
            let right = self.parse_unary()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
            self.skip_whitespace();
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, ExprError> {
        self.skip_whitespace();
        if self.peek_char() == Some('-') {
            self.pos += 1;
            let inner = self.parse_unary()?;
            return Ok(Expr::Unary(UnaryOp::Neg, Box::new(inner)));
        }
        self.parse_atom()
    }

    fn parse_atom(&mut self) -> Result<Expr, ExprError> {
        self.skip_whitespace();
        match self.peek_char() {
            Some('(') => {
                self.pos += 1;
                let expr = self.parse_or()?;
                self.skip_whitespace();
                if self.peek_char() != Some(')') {
                    return Err(ExprError::parse("expected ')'"));
                }
                self.pos += 1;
                Ok(expr)
            }
            Some('"') => self.parse_string(),
            Some(c) if c.is_ascii_digit() => self.parse_number(),
            Some(c) if c.is_alphabetic() || c == '_' => self.parse_identifier(),
            Some(c) => Err(ExprError::parse(format!("unexpected character '{c}'"))),
            None => Err(ExprError::parse("unexpected end of expression")),
        }
    }

    fn parse_string(&mut self) -> Result<Expr, ExprError> {
        self.pos += 1;
        let mut out = String::new();
        while let Some(c) = self.peek_char() {
            self.pos += c.len_utf8();
            match c {
                '"' => return Ok(Expr::Literal(Value::String(out))),
                '\\' => {
                    let Some(escaped) = self.peek_char() else {
                        break;
                    };
                    self.pos += escaped.len_utf8();
                    out.push(escaped);
                }
                _ => out.push(c),
            }
        }
        Err(ExprError::parse("unterminated string"))
    }

    fn parse_number(&mut self) -> Result<Expr, ExprError> {
        let start = self.pos;
        while let Some(c) = self.peek_char() {
            if c.is_ascii_digit() {
                self.pos += 1;
            } else {
                break;
            }
        }
        if self.peek_char() == Some('.') {
            self.pos += 1;
            while let Some(c) = self.peek_char() {
                if c.is_ascii_digit() {
                    self.pos += 1;
                } else {
                    break;
                }
            }
        }
        let text = &self.input[start..self.pos];
        let value: f64 = text
            .parse()
            .map_err(|_| ExprError::parse(format!("invalid number: '{text}'")))?;
        Ok(Expr::Literal(
            Number::from_f64(value)
                .map(Value::Number)
                .ok_or_else(|| ExprError::parse(format!("invalid number: '{text}'")))?,
        ))
    }

    fn parse_identifier(&mut self) -> Result<Expr, ExprError> {
        let start = self.pos;
        while let Some(c) = self.peek_char() {
            if c.is_alphanumeric() || c == '_' || c == '.' {
                self.pos += c.len_utf8();
            } else {
                break;
            }
        }
        let name = &self.input[start..self.pos];
        match name {
            "true" => Ok(Expr::Literal(Value::Bool(true))),
            "false" => Ok(Expr::Literal(Value::Bool(false))),
            "null" => Ok(Expr::Literal(Value::Null)),
            _ => Ok(Expr::Var(name.to_string())),
        }
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek_char() {
            if c.is_whitespace() {
                self.pos += c.len_utf8();
            } else {
                break;
            }
        }
    }

    fn peek_char(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn peek_str(&self, s: &str) -> bool {
        self.input[self.pos..].starts_with(s)
    }
}
