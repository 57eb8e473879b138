// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! The tagged value union used throughout the engine.
//!
//! Attributes, element text, context entries, and expression results all
//! share one representation: [`Value`]. Conversion is always explicit.
//! The lenient `as_*` accessors coerce with a defined fallback; the strict
//! `get_*` accessors fail when the value is [`Value::Empty`] or does not
//! project to the requested canonical type.
//!
//! # Boolean literals
//!
//! `y`, `yes`, `true` parse to `true`; `n`, `no`, `false` parse to
//! `false` (case-insensitive). Any other text is an error in strict mode
//! and `false` in lenient mode.

use crate::error::{MoldeError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A dynamically typed script value.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Value {
    /// No value. Strict accessors fail on it.
    #[default]
    Empty,
    /// A boolean.
    Bool(bool),
    /// A text value; parsed lazily on conversion.
    String(String),
    /// A list of strings.
    List(Vec<String>),
}

/// Parses a boolean literal.
///
/// Accepted: `y|yes|true` and `n|no|false`, case-insensitive. In strict
/// mode any other text is an error; in lenient mode it yields `false`.
pub fn parse_boolean(text: &str, strict: bool) -> Result<bool> {
    match text.trim().to_ascii_lowercase().as_str() {
        "y" | "yes" | "true" => Ok(true),
        "n" | "no" | "false" => Ok(false),
        other => {
            if strict {
                Err(MoldeError::Value(format!("'{other}' is not a boolean")))
            } else {
                Ok(false)
            }
        }
    }
}

impl Value {
    /// Creates a string value.
    pub fn string(s: impl Into<String>) -> Self {
        Self::String(s.into())
    }

    /// Creates a list value.
    pub fn list<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::List(items.into_iter().map(Into::into).collect())
    }

    /// True when this value is [`Value::Empty`].
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    /// Lenient boolean projection: empty and unparseable text are `false`.
    pub fn as_boolean(&self) -> bool {
        match self {
            Self::Empty => false,
            Self::Bool(b) => *b,
            Self::String(s) => parse_boolean(s, false).unwrap_or(false),
            Self::List(items) => !items.is_empty(),
        }
    }

    /// Lenient string projection.
    ///
    /// Booleans print as `true`/`false`; lists join with `,`; empty is `""`.
    pub fn as_string(&self) -> String {
        match self {
            Self::Empty => String::new(),
            Self::Bool(b) => b.to_string(),
            Self::String(s) => s.clone(),
            Self::List(items) => items.join(","),
        }
    }

    /// Lenient list projection.
    ///
    /// A string splits on commas and surrounding whitespace; an empty
    /// string is the empty list; a boolean is a one-element list.
    pub fn as_list(&self) -> Vec<String> {
        match self {
            Self::Empty => Vec::new(),
            Self::Bool(b) => vec![b.to_string()],
            Self::String(s) => split_list(s),
            Self::List(items) => items.clone(),
        }
    }

    /// Lenient integer projection; `None` when the text does not parse.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Strict boolean accessor.
    pub fn get_boolean(&self) -> Result<bool> {
        match self {
            Self::Empty => Err(MoldeError::Value("value is empty".into())),
            Self::Bool(b) => Ok(*b),
            Self::String(s) => parse_boolean(s, true),
            Self::List(_) => Err(MoldeError::Value("list is not a boolean".into())),
        }
    }

    /// Strict string accessor.
    pub fn get_string(&self) -> Result<String> {
        match self {
            Self::Empty => Err(MoldeError::Value("value is empty".into())),
            Self::String(s) => Ok(s.clone()),
            Self::Bool(b) => Ok(b.to_string()),
            Self::List(_) => Err(MoldeError::Value("list is not a string".into())),
        }
    }

    /// Strict list accessor.
    pub fn get_list(&self) -> Result<Vec<String>> {
        match self {
            Self::Empty => Err(MoldeError::Value("value is empty".into())),
            Self::List(items) => Ok(items.clone()),
            Self::String(s) => Ok(split_list(s)),
            Self::Bool(_) => Err(MoldeError::Value("boolean is not a list".into())),
        }
    }

    /// Strict integer accessor.
    pub fn get_int(&self) -> Result<i64> {
        match self {
            Self::Empty => Err(MoldeError::Value("value is empty".into())),
            Self::String(s) => s
                .trim()
                .parse()
                .map_err(|_| MoldeError::Value(format!("'{s}' is not an integer"))),
            other => Err(MoldeError::Value(format!(
                "{other} is not an integer"
            ))),
        }
    }

    /// Canonical equality: two values are equal only when they project to
    /// the same canonical type and agree under that projection.
    ///
    /// The projection order is boolean, then integer, then string; lists
    /// compare elementwise against the other side's list projection.
    pub fn canonical_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Self::Empty, Self::Empty) => true,
            (Self::Empty, _) | (_, Self::Empty) => false,
            (Self::List(_), _) | (_, Self::List(_)) => self.as_list() == other.as_list(),
            _ => {
                if let (Ok(a), Ok(b)) = (self.get_boolean(), other.get_boolean()) {
                    return a == b;
                }
                if let (Some(a), Some(b)) = (self.as_int(), other.as_int()) {
                    return a == b;
                }
                self.as_string() == other.as_string()
            }
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_string())
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

fn split_list(text: &str) -> Vec<String> {
    text.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boolean_literals() {
        for yes in ["y", "Y", "yes", "YES", "true", "True"] {
            assert!(parse_boolean(yes, true).unwrap(), "{yes}");
        }
        for no in ["n", "N", "no", "NO", "false", "False"] {
            assert!(!parse_boolean(no, true).unwrap(), "{no}");
        }
        assert!(parse_boolean("maybe", true).is_err());
        assert!(!parse_boolean("maybe", false).unwrap());
    }

    #[test]
    fn strict_accessors_reject_empty() {
        assert!(Value::Empty.get_boolean().is_err());
        assert!(Value::Empty.get_string().is_err());
        assert!(Value::Empty.get_list().is_err());
        assert!(Value::Empty.get_int().is_err());
    }

    #[test]
    fn string_splits_to_list() {
        let v = Value::string("a, b , c");
        assert_eq!(v.as_list(), vec!["a", "b", "c"]);
        assert_eq!(Value::string("").as_list(), Vec::<String>::new());
    }

    #[test]
    fn canonical_equality_projects_types() {
        assert!(Value::Bool(true).canonical_eq(&Value::string("yes")));
        assert!(Value::string("42").canonical_eq(&Value::string("042")));
        assert!(!Value::string("light").canonical_eq(&Value::string("dark")));
        assert!(Value::list(["a", "b"]).canonical_eq(&Value::string("a,b")));
        assert!(!Value::Empty.canonical_eq(&Value::string("")));
    }

    #[test]
    fn int_accessor_parses_strings() {
        assert_eq!(Value::string("200").get_int().unwrap(), 200);
        assert!(Value::string("abc").get_int().is_err());
        assert_eq!(Value::string(" 7 ").as_int(), Some(7));
    }
}
