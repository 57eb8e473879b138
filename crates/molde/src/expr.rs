// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! The guard expression language.
//!
//! Every script node may carry an `if` attribute holding a small boolean
//! expression. The grammar:
//!
//! ```text
//! expr    := or
//! or      := and ( '||' and )*
//! and     := equality ( '&&' equality )*
//! equality:= unary ( ('==' | '!=' | 'contains') unary )*
//! unary   := '!' unary | primary
//! primary := literal | variable | '(' expr ')'
//! literal := 'true' | 'false' | integer | '"…"' | '\'…\'' | '[ … ]'
//! variable:= dotted path
//! ```
//!
//! Evaluation resolves variables through a caller-supplied lookup and
//! preserves `||`/`&&` short-circuit semantics. An unresolved variable is
//! a fatal evaluation error, never a silent `false`.

use crate::error::{MoldeError, Result};
use crate::value::Value;
use serde::{Deserialize, Serialize};

/// A parsed guard expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expression {
    /// A literal value. Integer literals are carried as their decimal
    /// text and compared canonically.
    Literal(Value),
    /// A dotted context path resolved at evaluation time.
    Variable(String),
    /// Logical negation.
    Not(Box<Expression>),
    /// A binary operation.
    Binary {
        /// The operator.
        op: BinaryOp,
        /// Left operand.
        lhs: Box<Expression>,
        /// Right operand.
        rhs: Box<Expression>,
    },
}

/// Binary operators of the guard language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    /// Canonical equality.
    Eq,
    /// Canonical inequality.
    NotEq,
    /// Logical and (short-circuit).
    And,
    /// Logical or (short-circuit).
    Or,
    /// Substring test on strings; case-insensitive membership on lists.
    Contains,
}

impl Default for Expression {
    fn default() -> Self {
        Self::Literal(Value::Bool(true))
    }
}

impl Expression {
    /// The constant `true` guard carried by nodes without an `if` attribute.
    pub fn literal_true() -> Self {
        Self::default()
    }

    /// True when this expression is the literal `true`; the walker skips
    /// evaluation entirely for such guards.
    pub fn is_true_literal(&self) -> bool {
        matches!(self, Self::Literal(Value::Bool(true)))
    }

    /// Parses an expression from its textual form.
    pub fn parse(text: &str) -> Result<Self> {
        let tokens = tokenize(text)?;
        let mut parser = Parser {
            text,
            tokens,
            pos: 0,
        };
        let expr = parser.expression()?;
        match parser.peek() {
            None => Ok(expr),
            Some(token) => Err(parser.error_at(token.offset, "unexpected trailing input")),
        }
    }

    /// Evaluates the expression against a variable lookup.
    ///
    /// The lookup must fail (not return [`Value::Empty`]) for unknown
    /// variables; the error propagates as the evaluation result.
    pub fn evaluate<F>(&self, lookup: &F) -> Result<Value>
    where
        F: Fn(&str) -> Result<Value>,
    {
        match self {
            Self::Literal(value) => Ok(value.clone()),
            Self::Variable(path) => lookup(path),
            Self::Not(inner) => {
                let value = inner.evaluate(lookup)?;
                let b = value
                    .get_boolean()
                    .map_err(|e| MoldeError::ExpressionEval(format!("operand of '!': {e}")))?;
                Ok(Value::Bool(!b))
            }
            Self::Binary { op, lhs, rhs } => match op {
                BinaryOp::And => {
                    if !self.truthy(lhs, lookup)? {
                        return Ok(Value::Bool(false));
                    }
                    Ok(Value::Bool(self.truthy(rhs, lookup)?))
                }
                BinaryOp::Or => {
                    if self.truthy(lhs, lookup)? {
                        return Ok(Value::Bool(true));
                    }
                    Ok(Value::Bool(self.truthy(rhs, lookup)?))
                }
                BinaryOp::Eq => {
                    let (a, b) = (lhs.evaluate(lookup)?, rhs.evaluate(lookup)?);
                    Ok(Value::Bool(a.canonical_eq(&b)))
                }
                BinaryOp::NotEq => {
                    let (a, b) = (lhs.evaluate(lookup)?, rhs.evaluate(lookup)?);
                    Ok(Value::Bool(!a.canonical_eq(&b)))
                }
                BinaryOp::Contains => {
                    let (a, b) = (lhs.evaluate(lookup)?, rhs.evaluate(lookup)?);
                    let needle = b.as_string();
                    let contained = match &a {
                        Value::List(items) => {
                            items.iter().any(|i| i.eq_ignore_ascii_case(&needle))
                        }
                        other => other.as_string().contains(&needle),
                    };
                    Ok(Value::Bool(contained))
                }
            },
        }
    }

    /// Evaluates the expression to a boolean, as guard checks do.
    pub fn evaluate_boolean<F>(&self, lookup: &F) -> Result<bool>
    where
        F: Fn(&str) -> Result<Value>,
    {
        if self.is_true_literal() {
            return Ok(true);
        }
        let value = self.evaluate(lookup)?;
        value
            .get_boolean()
            .map_err(|e| MoldeError::ExpressionEval(format!("guard is not a boolean: {e}")))
    }

    fn truthy<F>(&self, operand: &Expression, lookup: &F) -> Result<bool>
    where
        F: Fn(&str) -> Result<Value>,
    {
        operand
            .evaluate(lookup)?
            .get_boolean()
            .map_err(|e| MoldeError::ExpressionEval(format!("operand is not a boolean: {e}")))
    }
}

#[derive(Debug, Clone, PartialEq)]
enum TokenKind {
    Ident(String),
    Str(String),
    Int(i64),
    List(Vec<String>),
    Not,
    AndAnd,
    OrOr,
    EqEq,
    NotEq,
    LParen,
    RParen,
}

#[derive(Debug, Clone, PartialEq)]
struct Token {
    kind: TokenKind,
    offset: usize,
}

fn tokenize(text: &str) -> Result<Vec<Token>> {
    let bytes = text.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;

    let err = |offset: usize, message: &str| MoldeError::ExpressionParse {
        message: message.to_string(),
        position: offset,
        expression: text.to_string(),
    };

    while i < bytes.len() {
        let c = bytes[i] as char;
        match c {
            ' ' | '\t' | '\r' | '\n' => i += 1,
            '(' => {
                tokens.push(Token {
                    kind: TokenKind::LParen,
                    offset: i,
                });
                i += 1;
            }
            ')' => {
                tokens.push(Token {
                    kind: TokenKind::RParen,
                    offset: i,
                });
                i += 1;
            }
            '!' => {
                if bytes.get(i + 1) == Some(&b'=') {
                    tokens.push(Token {
                        kind: TokenKind::NotEq,
                        offset: i,
                    });
                    i += 2;
                } else {
                    tokens.push(Token {
                        kind: TokenKind::Not,
                        offset: i,
                    });
                    i += 1;
                }
            }
            '=' => {
                if bytes.get(i + 1) == Some(&b'=') {
                    tokens.push(Token {
                        kind: TokenKind::EqEq,
                        offset: i,
                    });
                    i += 2;
                } else {
                    return Err(err(i, "expected '=='"));
                }
            }
            '&' => {
                if bytes.get(i + 1) == Some(&b'&') {
                    tokens.push(Token {
                        kind: TokenKind::AndAnd,
                        offset: i,
                    });
                    i += 2;
                } else {
                    return Err(err(i, "expected '&&'"));
                }
            }
            '|' => {
                if bytes.get(i + 1) == Some(&b'|') {
                    tokens.push(Token {
                        kind: TokenKind::OrOr,
                        offset: i,
                    });
                    i += 2;
                } else {
                    return Err(err(i, "expected '||'"));
                }
            }
            '"' | '\'' => {
                let (s, next) = scan_string(text, i, c).ok_or_else(|| {
                    err(i, "unterminated string literal")
                })?;
                tokens.push(Token {
                    kind: TokenKind::Str(s),
                    offset: i,
                });
                i = next;
            }
            '[' => {
                let start = i;
                i += 1;
                let mut items = Vec::new();
                loop {
                    while i < bytes.len() && (bytes[i] as char).is_whitespace() {
                        i += 1;
                    }
                    match bytes.get(i).map(|b| *b as char) {
                        Some(']') => {
                            i += 1;
                            break;
                        }
                        Some(q @ ('"' | '\'')) => {
                            let (s, next) = scan_string(text, i, q).ok_or_else(|| {
                                err(i, "unterminated string literal in list")
                            })?;
                            items.push(s);
                            i = next;
                            while i < bytes.len() && (bytes[i] as char).is_whitespace() {
                                i += 1;
                            }
                            match bytes.get(i).map(|b| *b as char) {
                                Some(',') => i += 1,
                                Some(']') => {}
                                _ => return Err(err(i, "expected ',' or ']' in list")),
                            }
                        }
                        _ => return Err(err(start, "unterminated list literal")),
                    }
                }
                tokens.push(Token {
                    kind: TokenKind::List(items),
                    offset: start,
                });
            }
            '0'..='9' | '-' => {
                let start = i;
                if c == '-' {
                    i += 1;
                }
                while i < bytes.len() && (bytes[i] as char).is_ascii_digit() {
                    i += 1;
                }
                let digits = &text[start..i];
                let n: i64 = digits
                    .parse()
                    .map_err(|_| err(start, "invalid integer literal"))?;
                tokens.push(Token {
                    kind: TokenKind::Int(n),
                    offset: start,
                });
            }
            c if c.is_ascii_alphabetic() => {
                let start = i;
                while i < bytes.len() {
                    let c = bytes[i] as char;
                    if c.is_ascii_alphanumeric() || c == '-' || c == '.' || c == '_' {
                        i += 1;
                    } else {
                        break;
                    }
                }
                tokens.push(Token {
                    kind: TokenKind::Ident(text[start..i].to_string()),
                    offset: start,
                });
            }
            _ => return Err(err(i, "unexpected character")),
        }
    }
    Ok(tokens)
}

fn scan_string(text: &str, start: usize, quote: char) -> Option<(String, usize)> {
    let bytes = text.as_bytes();
    let mut i = start + 1;
    let mut out = String::new();
    while i < bytes.len() {
        let c = bytes[i] as char;
        if c == quote {
            return Some((out, i + 1));
        }
        if c == '\\' && i + 1 < bytes.len() {
            out.push(bytes[i + 1] as char);
            i += 2;
            continue;
        }
        out.push(c);
        i += 1;
    }
    None
}

struct Parser<'a> {
    text: &'a str,
    tokens: Vec<Token>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn error_at(&self, offset: usize, message: &str) -> MoldeError {
        MoldeError::ExpressionParse {
            message: message.to_string(),
            position: offset,
            expression: self.text.to_string(),
        }
    }

    fn error_eof(&self, message: &str) -> MoldeError {
        self.error_at(self.text.len(), message)
    }

    fn expression(&mut self) -> Result<Expression> {
        self.or_expr()
    }

    fn or_expr(&mut self) -> Result<Expression> {
        let mut lhs = self.and_expr()?;
        while matches!(self.peek().map(|t| &t.kind), Some(TokenKind::OrOr)) {
            self.advance();
            let rhs = self.and_expr()?;
            lhs = Expression::Binary {
                op: BinaryOp::Or,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn and_expr(&mut self) -> Result<Expression> {
        let mut lhs = self.equality()?;
        while matches!(self.peek().map(|t| &t.kind), Some(TokenKind::AndAnd)) {
            self.advance();
            let rhs = self.equality()?;
            lhs = Expression::Binary {
                op: BinaryOp::And,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn equality(&mut self) -> Result<Expression> {
        let mut lhs = self.unary()?;
        loop {
            let op = match self.peek().map(|t| &t.kind) {
                Some(TokenKind::EqEq) => BinaryOp::Eq,
                Some(TokenKind::NotEq) => BinaryOp::NotEq,
                Some(TokenKind::Ident(word)) if word == "contains" => BinaryOp::Contains,
                _ => break,
            };
            self.advance();
            let rhs = self.unary()?;
            lhs = Expression::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> Result<Expression> {
        if matches!(self.peek().map(|t| &t.kind), Some(TokenKind::Not)) {
            self.advance();
            let inner = self.unary()?;
            return Ok(Expression::Not(Box::new(inner)));
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<Expression> {
        let token = self
            .advance()
            .ok_or_else(|| self.error_eof("unexpected end of expression"))?;
        match token.kind {
            TokenKind::LParen => {
                let inner = self.expression()?;
                match self.advance() {
                    Some(Token {
                        kind: TokenKind::RParen,
                        ..
                    }) => Ok(inner),
                    Some(t) => Err(self.error_at(t.offset, "expected ')'")),
                    None => Err(self.error_eof("expected ')'")),
                }
            }
            TokenKind::Str(s) => Ok(Expression::Literal(Value::String(s))),
            TokenKind::Int(n) => Ok(Expression::Literal(Value::String(n.to_string()))),
            TokenKind::List(items) => Ok(Expression::Literal(Value::List(items))),
            TokenKind::Ident(word) => match word.as_str() {
                "true" => Ok(Expression::Literal(Value::Bool(true))),
                "false" => Ok(Expression::Literal(Value::Bool(false))),
                "contains" => Err(self.error_at(token.offset, "'contains' is an operator")),
                _ => Ok(Expression::Variable(word)),
            },
            _ => Err(self.error_at(token.offset, "expected a literal, variable, or '('")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, Value)]) -> impl Fn(&str) -> Result<Value> {
        let map: HashMap<String, Value> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        move |path: &str| {
            map.get(path)
                .cloned()
                .ok_or_else(|| MoldeError::ExpressionEval(format!("unresolved variable '{path}'")))
        }
    }

    #[test]
    fn parses_precedence() {
        let e = Expression::parse("a == \"x\" || b == \"y\" && !c").unwrap();
        // || at the top, && binds tighter
        match e {
            Expression::Binary { op: BinaryOp::Or, .. } => {}
            other => panic!("expected top-level ||, got {other:?}"),
        }
    }

    #[test]
    fn evaluates_equality_and_negation() {
        let lookup = lookup_from(&[("colors", Value::string("dark"))]);
        let e = Expression::parse("colors == \"dark\"").unwrap();
        assert!(e.evaluate_boolean(&lookup).unwrap());
        let e = Expression::parse("!(colors == \"light\")").unwrap();
        assert!(e.evaluate_boolean(&lookup).unwrap());
    }

    #[test]
    fn short_circuits() {
        // `missing` is not defined; && must not evaluate it when lhs is false
        let lookup = lookup_from(&[("flag", Value::Bool(false))]);
        let e = Expression::parse("flag && missing == \"x\"").unwrap();
        assert!(!e.evaluate_boolean(&lookup).unwrap());
        let lookup = lookup_from(&[("flag", Value::Bool(true))]);
        let e = Expression::parse("flag || missing == \"x\"").unwrap();
        assert!(e.evaluate_boolean(&lookup).unwrap());
    }

    #[test]
    fn unresolved_variable_is_fatal() {
        let lookup = lookup_from(&[]);
        let e = Expression::parse("missing == \"x\"").unwrap();
        assert!(matches!(
            e.evaluate_boolean(&lookup),
            Err(MoldeError::ExpressionEval(_))
        ));
    }

    #[test]
    fn contains_on_lists_ignores_case() {
        let lookup = lookup_from(&[("features", Value::list(["Docker", "K8s"]))]);
        let e = Expression::parse("features contains \"docker\"").unwrap();
        assert!(e.evaluate_boolean(&lookup).unwrap());
        let e = Expression::parse("features contains \"helm\"").unwrap();
        assert!(!e.evaluate_boolean(&lookup).unwrap());
    }

    #[test]
    fn contains_on_strings_is_substring() {
        let lookup = lookup_from(&[("name", Value::string("my-project"))]);
        let e = Expression::parse("name contains \"-pro\"").unwrap();
        assert!(e.evaluate_boolean(&lookup).unwrap());
    }

    #[test]
    fn list_literals() {
        let lookup = lookup_from(&[]);
        let e = Expression::parse("[\"a\", \"b\"] contains \"B\"").unwrap();
        assert!(e.evaluate_boolean(&lookup).unwrap());
    }

    #[test]
    fn integer_literals_compare_canonically() {
        let lookup = lookup_from(&[("order", Value::string("100"))]);
        let e = Expression::parse("order == 100").unwrap();
        assert!(e.evaluate_boolean(&lookup).unwrap());
    }

    #[test]
    fn parse_errors_carry_position() {
        match Expression::parse("a = b") {
            Err(MoldeError::ExpressionParse { position, .. }) => assert_eq!(position, 2),
            other => panic!("expected parse error, got {other:?}"),
        }
        assert!(Expression::parse("a && ").is_err());
        assert!(Expression::parse("(a").is_err());
        assert!(Expression::parse("a b").is_err());
    }

    #[test]
    fn true_literal_is_recognized() {
        assert!(Expression::parse("true").unwrap().is_true_literal());
        assert!(!Expression::parse("false").unwrap().is_true_literal());
        assert!(Expression::literal_true().is_true_literal());
    }
}
