// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Depth-first script traversal.
//!
//! The [`Walker`] visits nodes in document order, evaluates each node's
//! guard before entering its subtree, and dispatches to one or more
//! [`NodeVisitor`]s. It maintains three stacks:
//!
//! - the **call stack** of invocation sites (`<source>`, `<exec>`,
//!   `<call>`), used to synthesize archetype stack traces on failure
//! - the **cwd stack**, pushed when `<exec>` enters a script in a new
//!   working directory
//! - the **scope stack**, pushed when entering an input and popped after
//!   its subtree
//!
//! A `<methods>` subtree is never traversed directly; its bodies are only
//! reachable through `<call>`, which resolves the name against the
//! current script first and then down the call stack (later bindings
//! shadow earlier ones).

use crate::ast::{Kind, NodeId, Script};
use crate::context::{Context, ContextPath, ScopeId, Visibility};
use crate::error::{Frame, MoldeError, Result};
use crate::loader::ScriptLoader;
use crate::value::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Outcome of visiting one node, from least to most restrictive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum VisitResult {
    /// Enter the node's subtree.
    Continue,
    /// Skip this node's descendants.
    SkipSubtree,
    /// Skip this node's descendants and its later siblings.
    SkipSiblings,
    /// Stop the walk entirely, unwinding cleanly.
    Terminate,
}

impl VisitResult {
    /// Combines results from multiple visitors; the most restrictive
    /// one wins.
    pub fn combine(self, other: Self) -> Self {
        self.max(other)
    }
}

/// A node reference handed to visitors: the owning script plus the id.
#[derive(Clone, Copy)]
pub struct NodeRef<'a> {
    /// The script owning the node.
    pub script: &'a Script,
    /// The node id within the script's arena.
    pub id: NodeId,
}

impl<'a> NodeRef<'a> {
    /// Borrows the node data.
    pub fn node(&self) -> &'a crate::ast::Node {
        self.script.node(self.id)
    }

    /// The node's kind.
    pub fn kind(&self) -> Kind {
        self.node().kind
    }
}

/// Mutable traversal state shared with visitors.
pub struct WalkState {
    /// The invocation's context. Owned here for the duration of a walk.
    pub context: Context,
    scope_stack: Vec<ScopeId>,
    cwd_stack: Vec<PathBuf>,
}

impl WalkState {
    /// Creates walk state over a context.
    pub fn new(context: Context) -> Self {
        let root = context.root();
        Self {
            context,
            scope_stack: vec![root],
            cwd_stack: Vec::new(),
        }
    }

    /// Releases the context after a walk.
    pub fn into_context(self) -> Context {
        self.context
    }

    /// The current scope (top of the scope stack).
    pub fn scope(&self) -> ScopeId {
        *self.scope_stack.last().expect("scope stack is never empty")
    }

    /// The current working directory.
    ///
    /// # Panics
    ///
    /// Panics outside a walk; the walker pushes the entry script's
    /// directory before any visit.
    pub fn cwd(&self) -> &Path {
        self.cwd_stack.last().expect("cwd stack is empty outside a walk")
    }

    /// Resolves a variable against the current scope; unknown variables
    /// are an evaluation error, never a silent miss.
    pub fn lookup(&self, path: &str) -> Result<Value> {
        self.context.get_value(self.scope(), path)?.ok_or_else(|| {
            MoldeError::ExpressionEval(format!("unresolved variable '{path}'"))
        })
    }

    /// Interpolates `${…}` placeholders against the current scope.
    pub fn interpolate(&self, template: &str) -> Result<String> {
        self.context.interpolate(self.scope(), template)
    }
}

/// A traversal callback.
///
/// Specialized visitors (input resolution, model building, output
/// generation) examine `node.kind()` instead of implementing per-kind
/// methods.
pub trait NodeVisitor {
    /// Called before a node's subtree is entered.
    fn visit(&mut self, node: NodeRef<'_>, state: &mut WalkState) -> Result<VisitResult>;

    /// Called after a node's subtree completed (also when it was
    /// skipped by this or another visitor).
    fn post_visit(&mut self, node: NodeRef<'_>, state: &mut WalkState) -> Result<()> {
        let _ = (node, state);
        Ok(())
    }
}

/// The depth-first tree walker.
pub struct Walker<'v> {
    loader: Box<dyn ScriptLoader>,
    visitors: Vec<&'v mut dyn NodeVisitor>,
    script_stack: Vec<Arc<Script>>,
    frames: Vec<Frame>,
}

impl<'v> Walker<'v> {
    /// Creates a walker resolving invocations through `loader`.
    pub fn new(loader: Box<dyn ScriptLoader>) -> Self {
        Self {
            loader,
            visitors: Vec::new(),
            script_stack: Vec::new(),
            frames: Vec::new(),
        }
    }

    /// Registers a visitor; dispatch order is registration order.
    pub fn add_visitor(&mut self, visitor: &'v mut dyn NodeVisitor) -> &mut Self {
        self.visitors.push(visitor);
        self
    }

    /// Walks a script from its root.
    ///
    /// Returns [`VisitResult::Terminate`] when a visitor requested
    /// termination, [`VisitResult::Continue`] otherwise.
    pub fn walk(&mut self, script: Arc<Script>, state: &mut WalkState) -> Result<VisitResult> {
        state.cwd_stack.push(script.directory().to_path_buf());
        self.script_stack.push(script.clone());
        let result = self.walk_node(&script, script.root(), state);
        self.script_stack.pop();
        state.cwd_stack.pop();
        result
    }

    fn walk_node(
        &mut self,
        script: &Arc<Script>,
        id: NodeId,
        state: &mut WalkState,
    ) -> Result<VisitResult> {
        self.walk_node_inner(script, id, state).map_err(|e| {
            let mut frames = self.frames.clone();
            frames.push(Frame {
                path: script.path().to_path_buf(),
                location: script.node(id).location,
            });
            e.with_frames(frames)
        })
    }

    fn walk_node_inner(
        &mut self,
        script: &Arc<Script>,
        id: NodeId,
        state: &mut WalkState,
    ) -> Result<VisitResult> {
        let node = script.node(id);

        // Method bodies are only reachable through <call>
        if node.kind == Kind::Methods {
            return Ok(VisitResult::Continue);
        }

        // Guard check before the subtree is entered
        if !node.guard.is_true_literal() {
            let shared = &*state;
            let pass = node
                .guard
                .evaluate_boolean(&|path| shared.lookup(path))?;
            if !pass {
                tracing::debug!(
                    "guard skipped {:?} at {}:{}",
                    node.kind,
                    script.path().display(),
                    node.location
                );
                return Ok(VisitResult::Continue);
            }
        }

        // Entering an input pushes its scope
        let pushed_scope = if node.kind.is_input() {
            let input_id = node.attr_string("id").ok_or_else(|| {
                MoldeError::ScriptParse {
                    message: "input without 'id'".to_string(),
                    path: script.path().to_path_buf(),
                    location: node.location,
                }
            })?;
            let path = ContextPath::parse(&input_id)?;
            let visibility = if node.attr_boolean("global", false) {
                Visibility::Global
            } else {
                Visibility::Local
            };
            let scope = state
                .context
                .get_or_create(state.scope(), &path, visibility)?;
            state.scope_stack.push(scope);
            true
        } else {
            false
        };

        let node_ref = NodeRef { script, id };
        let mut outcome = VisitResult::Continue;
        for visitor in &mut self.visitors {
            outcome = outcome.combine(visitor.visit(node_ref, state)?);
            if outcome == VisitResult::Terminate {
                break;
            }
        }

        if outcome == VisitResult::Continue {
            outcome = match node.kind {
                Kind::Source => self.invoke_script(script, id, state, false)?,
                Kind::Exec => self.invoke_script(script, id, state, true)?,
                Kind::Call => self.invoke_method(script, id, state)?,
                _ => self.walk_children(script, id, state)?,
            };
        }

        for visitor in &mut self.visitors {
            visitor.post_visit(node_ref, state)?;
        }

        if pushed_scope {
            state.scope_stack.pop();
        }

        match outcome {
            VisitResult::Terminate => Ok(VisitResult::Terminate),
            VisitResult::SkipSiblings => Ok(VisitResult::SkipSiblings),
            _ => Ok(VisitResult::Continue),
        }
    }

    fn walk_children(
        &mut self,
        script: &Arc<Script>,
        id: NodeId,
        state: &mut WalkState,
    ) -> Result<VisitResult> {
        let children = script.node(id).children.clone();
        for child in children {
            match self.walk_node(script, child, state)? {
                VisitResult::Terminate => return Ok(VisitResult::Terminate),
                VisitResult::SkipSiblings => break,
                _ => {}
            }
        }
        Ok(VisitResult::Continue)
    }

    fn invoke_script(
        &mut self,
        script: &Arc<Script>,
        id: NodeId,
        state: &mut WalkState,
        new_cwd: bool,
    ) -> Result<VisitResult> {
        let node = script.node(id);
        let src = node
            .attr_string("src")
            .or_else(|| node.attr_string("url"))
            .ok_or_else(|| MoldeError::ScriptParse {
                message: "invocation without 'src'".to_string(),
                path: script.path().to_path_buf(),
                location: node.location,
            })?;
        let src = state.interpolate(&src)?;
        let target_path = state.cwd().join(&src);
        tracing::debug!("invoking script {}", target_path.display());
        let target = self.loader.load(&target_path)?;

        self.frames.push(Frame {
            path: script.path().to_path_buf(),
            location: node.location,
        });
        self.script_stack.push(target.clone());
        if new_cwd {
            state.cwd_stack.push(target.directory().to_path_buf());
        }

        let result = self.walk_children(&target, target.root(), state);

        if new_cwd {
            state.cwd_stack.pop();
        }
        self.script_stack.pop();
        self.frames.pop();
        result
    }

    fn invoke_method(
        &mut self,
        script: &Arc<Script>,
        id: NodeId,
        state: &mut WalkState,
    ) -> Result<VisitResult> {
        let node = script.node(id);
        let name = node.attr_string("method").ok_or_else(|| {
            MoldeError::ScriptParse {
                message: "call without 'method'".to_string(),
                path: script.path().to_path_buf(),
                location: node.location,
            }
        })?;

        // Current script first, then down the call stack: the most
        // recently entered script shadows earlier bindings.
        let owner = self
            .script_stack
            .iter()
            .rev()
            .find_map(|s| s.method(&name).map(|m| (s.clone(), m)))
            .ok_or_else(|| MoldeError::ScriptParse {
                message: format!("unknown method '{name}'"),
                path: script.path().to_path_buf(),
                location: node.location,
            })?;

        self.frames.push(Frame {
            path: script.path().to_path_buf(),
            location: node.location,
        });
        self.script_stack.push(owner.0.clone());
        let result = self.walk_children(&owner.0, owner.1, state);
        self.script_stack.pop();
        self.frames.pop();
        result
    }
}
