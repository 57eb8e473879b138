// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

// Warn on missing documentation for public items
#![warn(missing_docs)]

//! # MOLDE
//!
//! Declarative project-archetype engine for Rust.
//!
//! MOLDE interprets trees of XML "script" documents describing
//! interactive inputs, conditional branches, preset values, a
//! hierarchical model, and output directives, and generates a project
//! directory from them. One archetype can compose many scripts
//! (`<source>`, `<exec>`, `<call>`) and branch on user responses.
//!
//! ## Features
//!
//! - Uniform tagged AST over `archetype-script` XML
//! - Guard expressions (`if="theme == \"dark\""`) on every node
//! - Hierarchical, visibility-aware context with `${…}` interpolation
//! - Batch and interactive input resolution behind one protocol
//! - Ordered merged model for template rendering
//! - Pluggable template engines (built-in minimal mustache)
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use molde::ArchetypeEngine;
//! use std::path::PathBuf;
//!
//! let mut engine = ArchetypeEngine::new("archetype/main.xml")
//!     .with_presets([("theme".to_string(), "dark".to_string())]);
//! let project = engine.generate(|name| PathBuf::from(name))?;
//! ```

/// The tagged value union.
pub mod value;
/// Script AST: kinds, nodes, arenas.
pub mod ast;
/// XML script reading and writing.
pub mod reader;
/// Script loading and caching.
pub mod loader;
/// Guard expression parsing and evaluation.
pub mod expr;
/// Hierarchical context: scopes, paths, interpolation.
pub mod context;
/// Depth-first traversal and visitor dispatch.
pub mod walker;
/// Input resolution (batch and interactive).
pub mod input;
/// Merged model accumulation.
pub mod model;
/// Template engine contract and registry.
pub mod template;
/// Output generation (copies, scans, rendering).
pub mod output;
/// The archetype engine facade.
pub mod engine;
/// Error types and archetype stack frames.
pub mod error;

pub use ast::{Kind, Node, NodeId, Script};
pub use context::{Context, ContextPath, ContextValue, ScopeId, ValueKind, Visibility};
pub use engine::ArchetypeEngine;
pub use error::{Frame, Location, MoldeError, Result};
pub use expr::{BinaryOp, Expression};
pub use input::{ContextGate, InputResolver, Prompt, PromptKind, PromptOption, Prompter, ScriptedPrompter};
pub use loader::{FileSystemLoader, MemoryLoader, ScriptLoader};
pub use model::{MergedModel, ModelNode, ModelResolver};
pub use output::OutputGenerator;
pub use reader::{read_script, write_script};
pub use template::{EngineRegistry, MustacheEngine, TemplateEngine};
pub use value::Value;
pub use walker::{NodeRef, NodeVisitor, VisitResult, WalkState, Walker};
