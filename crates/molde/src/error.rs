// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Error types for the molde archetype engine.
//!
//! This module defines [`MoldeError`], the main error enum, and the
//! [`Frame`] type used to synthesize archetype stack traces.
//!
//! # Error Categories
//!
//! - **Script errors**: Malformed XML, invalid root element, bad attributes
//! - **Path errors**: Malformed context paths
//! - **Expression errors**: Guard parse failures, unresolved variables
//! - **Input errors**: Unresolved, invalid, or validation-failing inputs
//! - **Scope errors**: Visibility conflicts, read-only overwrites
//! - **Invocation errors**: Any failure during traversal, wrapped with the
//!   archetype call stack (file:line per frame)
//!
//! # Stack Traces
//!
//! Errors thrown while walking a script tree are wrapped in
//! [`MoldeError::Invocation`], which carries one [`Frame`] per invocation
//! site plus the current node. The original cause is preserved as the
//! error source.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// A position inside a script document.
///
/// Line and column are 1-indexed; a zeroed location means "unknown".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub struct Location {
    /// Line number (1-indexed).
    pub line: u32,
    /// Column number (1-indexed).
    pub column: u32,
}

impl Location {
    /// Creates a location from a line and column pair.
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// One synthesized archetype stack frame: the script file and the line of
/// the invocation site (or current node).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Path of the script the frame points into.
    pub path: PathBuf,
    /// Location of the invocation site within that script.
    pub location: Location,
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.path.display(), self.location.line)
    }
}

/// Helper for rendering a frame list one per line, innermost first.
pub struct FrameList<'a>(pub &'a [Frame]);

impl<'a> fmt::Display for FrameList<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for frame in self.0.iter().rev() {
            writeln!(f, "\tat {}", frame)?;
        }
        Ok(())
    }
}

/// The main error type for molde operations.
///
/// All fallible molde functions return `Result<T, MoldeError>`.
#[derive(Error, Debug)]
pub enum MoldeError {
    /// The script document could not be parsed.
    #[error("Script error in {path}: {message} at {location}")]
    ScriptParse {
        /// Description of the problem.
        message: String,
        /// The script file.
        path: PathBuf,
        /// Position of the offending construct.
        location: Location,
    },

    /// A context path string violates the path grammar.
    #[error("Invalid context path '{path}': {message}")]
    InvalidPath {
        /// The rejected path text.
        path: String,
        /// What the parser objected to.
        message: String,
    },

    /// A guard expression could not be parsed.
    #[error("Expression error: {message} at offset {position} in '{expression}'")]
    ExpressionParse {
        /// Description of the parse failure.
        message: String,
        /// Byte offset of the failure within the expression text.
        position: usize,
        /// The full expression text.
        expression: String,
    },

    /// A guard expression failed to evaluate.
    #[error("Expression evaluation failed: {0}")]
    ExpressionEval(String),

    /// Batch resolution could not produce a value for a required input.
    #[error("Unresolved input: {0}")]
    InputUnresolved(String),

    /// An enum or list value is not among the input's effective options.
    #[error("Invalid value for input '{path}': {message}")]
    InvalidInput {
        /// Effective path of the input.
        path: String,
        /// What was wrong with the value.
        message: String,
    },

    /// A text input violated at least one validation pattern.
    #[error("Validation failed for input '{path}': {}", failures.join(", "))]
    InputValidation {
        /// Effective path of the input.
        path: String,
        /// Every pattern the value failed to match.
        failures: Vec<String>,
    },

    /// A visibility mismatch or read-only overwrite in the context.
    #[error("Scope conflict: {0}")]
    ScopeConflict(String),

    /// A value could not be converted to the requested canonical type.
    #[error("Value error: {0}")]
    Value(String),

    /// Template rendering failed.
    #[error("Render error in engine '{engine}': {message}")]
    Render {
        /// Name of the template engine.
        engine: String,
        /// Description of the failure.
        message: String,
    },

    /// Any error thrown during traversal, wrapped with archetype frames.
    #[error("Invocation failed\n{}{cause}", FrameList(frames))]
    Invocation {
        /// Synthesized stack: one frame per invocation site plus the
        /// current node, innermost last.
        frames: Vec<Frame>,
        /// The original failure.
        #[source]
        cause: Box<MoldeError>,
    },

    /// File I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl MoldeError {
    /// Wraps this error with archetype stack frames, unless it already is
    /// an invocation error (frames are attached once, at the outermost
    /// walk that observed the failure).
    pub fn with_frames(self, frames: Vec<Frame>) -> Self {
        match self {
            Self::Invocation { .. } => self,
            cause => Self::Invocation {
                frames,
                cause: Box::new(cause),
            },
        }
    }

    /// Returns the underlying cause if this is an invocation wrapper,
    /// otherwise the error itself.
    pub fn root_cause(&self) -> &MoldeError {
        match self {
            Self::Invocation { cause, .. } => cause.root_cause(),
            other => other,
        }
    }
}

/// Convenience type alias for Results with [`MoldeError`].
pub type Result<T> = std::result::Result<T, MoldeError>;
