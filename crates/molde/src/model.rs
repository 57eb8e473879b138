// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! The merged template model.
//!
//! A second traversal over the resolved tree accumulates every `<model>`
//! subtree into one ordered tree under a virtual root map. The merged
//! model is what template engines render against.
//!
//! # Merge rules
//!
//! - map over map at the same key: deep-merge child by child
//! - list over list at the same key: append
//! - value over value at the same key: the higher `order` wins; an equal
//!   order keeps the incumbent unless the newcomer carries
//!   `override="true"`
//! - after accumulation, list children sort stably by `order` descending
//!
//! # Value content
//!
//! A `<value>` takes its content from a `file` attribute (read relative
//! to the current working directory) or from its element text. Without a
//! `template` attribute the content interpolates eagerly against the
//! context; with one, interpolation is deferred to render time through
//! the named engine.

use crate::ast::Kind;
use crate::error::{MoldeError, Result};
use crate::value::Value;
use crate::walker::{NodeRef, NodeVisitor, VisitResult, WalkState};
use serde::ser::{Serialize, Serializer};
use std::collections::BTreeMap;

/// Default merge order for model nodes without an `order` attribute.
pub const DEFAULT_ORDER: i64 = 100;

/// One node of the merged model tree.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelNode {
    /// A scalar value.
    Value {
        /// The content (raw when `template` is set).
        content: String,
        /// Merge tiebreaker.
        order: i64,
        /// Engine name for deferred interpolation.
        template: Option<String>,
        /// Wins equal-order conflicts when true.
        overriding: bool,
    },
    /// An ordered list.
    List {
        /// Merge tiebreaker.
        order: i64,
        /// The items, sorted by order descending after accumulation.
        items: Vec<ModelNode>,
    },
    /// A keyed map.
    Map {
        /// Merge tiebreaker.
        order: i64,
        /// The entries.
        entries: BTreeMap<String, ModelNode>,
    },
}

impl Serialize for ModelNode {
    /// Values serialize as plain strings, lists as arrays, maps as
    /// objects; merge metadata stays internal.
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Self::Value { content, .. } => serializer.serialize_str(content),
            Self::List { items, .. } => serializer.collect_seq(items),
            Self::Map { entries, .. } => serializer.collect_map(entries.iter()),
        }
    }
}

impl ModelNode {
    /// An empty map node.
    pub fn empty_map() -> Self {
        Self::Map {
            order: DEFAULT_ORDER,
            entries: BTreeMap::new(),
        }
    }

    /// The node's merge order.
    pub fn order(&self) -> i64 {
        match self {
            Self::Value { order, .. } | Self::List { order, .. } | Self::Map { order, .. } => {
                *order
            }
        }
    }

    fn overriding(&self) -> bool {
        matches!(self, Self::Value { overriding: true, .. })
    }

    /// Merges `incoming` into this node under the standard rules.
    pub fn merge(&mut self, incoming: ModelNode) {
        match (&mut *self, incoming) {
            (
                Self::Map { entries, .. },
                Self::Map {
                    entries: new_entries,
                    ..
                },
            ) => {
                for (key, value) in new_entries {
                    match entries.get_mut(&key) {
                        Some(existing) => existing.merge(value),
                        None => {
                            entries.insert(key, value);
                        }
                    }
                }
            }
            (
                Self::List { items, .. },
                Self::List {
                    items: new_items, ..
                },
            ) => {
                items.extend(new_items);
            }
            (current, incoming) => {
                let replace = incoming.order() > current.order()
                    || (incoming.order() == current.order() && incoming.overriding());
                if replace {
                    *current = incoming;
                }
            }
        }
    }

    /// Stable-sorts every list in the tree by order descending.
    pub fn sort_lists(&mut self) {
        match self {
            Self::List { items, .. } => {
                items.sort_by_key(|item| std::cmp::Reverse(item.order()));
                for item in items {
                    item.sort_lists();
                }
            }
            Self::Map { entries, .. } => {
                for value in entries.values_mut() {
                    value.sort_lists();
                }
            }
            Self::Value { .. } => {}
        }
    }

    /// Looks up a dotted key path within maps.
    pub fn lookup(&self, path: &str) -> Option<&ModelNode> {
        let mut cursor = self;
        for segment in path.split('.') {
            match cursor {
                Self::Map { entries, .. } => cursor = entries.get(segment)?,
                _ => return None,
            }
        }
        Some(cursor)
    }
}

/// The accumulated model handed to template engines.
#[derive(Debug, Clone, PartialEq)]
pub struct MergedModel {
    root: ModelNode,
}

impl MergedModel {
    /// An empty model.
    pub fn empty() -> Self {
        Self {
            root: ModelNode::empty_map(),
        }
    }

    /// The virtual root map.
    pub fn root(&self) -> &ModelNode {
        &self.root
    }

    /// Mutable access to the virtual root, for deferred-value
    /// finalization.
    pub fn root_mut(&mut self) -> &mut ModelNode {
        &mut self.root
    }

    /// Looks up a dotted key path.
    pub fn lookup(&self, path: &str) -> Option<&ModelNode> {
        self.root.lookup(path)
    }

    /// The scalar content at a dotted key path, if any.
    pub fn value_of(&self, path: &str) -> Option<&str> {
        match self.lookup(path)? {
            ModelNode::Value { content, .. } => Some(content),
            _ => None,
        }
    }

    /// Projects the model to JSON for serialization-based engines.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(&self.root).unwrap_or(serde_json::Value::Null)
    }
}

/// The model-building visitor for the output phase.
///
/// Collects every `<model>` subtree it encounters; compose it behind a
/// gate visitor so unselected input branches stay invisible.
pub struct ModelResolver {
    root: ModelNode,
}

impl Default for ModelResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelResolver {
    /// Creates a resolver with an empty virtual root.
    pub fn new() -> Self {
        Self {
            root: ModelNode::empty_map(),
        }
    }

    /// Finishes accumulation, sorting lists.
    pub fn into_model(mut self) -> MergedModel {
        self.root.sort_lists();
        MergedModel { root: self.root }
    }

    /// Builds the model of a single `<model>` element (used for the
    /// extra scope of `<template>` directives).
    pub fn build_model(node: NodeRef<'_>, state: &WalkState) -> Result<MergedModel> {
        let mut root = ModelNode::empty_map();
        merge_entries(node, state, &mut root)?;
        root.sort_lists();
        Ok(MergedModel { root })
    }
}

impl NodeVisitor for ModelResolver {
    fn visit(&mut self, node: NodeRef<'_>, state: &mut WalkState) -> Result<VisitResult> {
        if node.kind() == Kind::Model {
            merge_entries(node, state, &mut self.root)?;
            return Ok(VisitResult::SkipSubtree);
        }
        Ok(VisitResult::Continue)
    }
}

/// Merges the keyed children of a map-like element into `target`.
fn merge_entries(node: NodeRef<'_>, state: &WalkState, target: &mut ModelNode) -> Result<()> {
    for child_id in &node.node().children {
        let child = NodeRef {
            script: node.script,
            id: *child_id,
        };
        if !guard_passes(child, state)? {
            continue;
        }
        let key = child.node().attr_string("key").ok_or_else(|| {
            MoldeError::ScriptParse {
                message: "model map entries need a 'key'".to_string(),
                path: node.script.path().to_path_buf(),
                location: child.node().location,
            }
        })?;
        let built = build_node(child, state)?;
        let ModelNode::Map { entries, .. } = target else {
            unreachable!("merge targets are always maps");
        };
        match entries.get_mut(&key) {
            Some(existing) => existing.merge(built),
            None => {
                entries.insert(key, built);
            }
        }
    }
    Ok(())
}

fn guard_passes(node: NodeRef<'_>, state: &WalkState) -> Result<bool> {
    if node.node().guard.is_true_literal() {
        return Ok(true);
    }
    node.node()
        .guard
        .evaluate_boolean(&|path| state.lookup(path))
}

fn build_node(node: NodeRef<'_>, state: &WalkState) -> Result<ModelNode> {
    let n = node.node();
    let order = n.attr_int("order", DEFAULT_ORDER);
    match n.kind {
        Kind::ModelValue => {
            let template = n.attr_string("template");
            let content = value_content(node, state)?;
            let content = if template.is_none() {
                state.interpolate(&content)?
            } else {
                content
            };
            Ok(ModelNode::Value {
                content,
                order,
                template,
                overriding: n.attr_boolean("override", false),
            })
        }
        Kind::ModelList => {
            let mut items = Vec::new();
            for child_id in &n.children {
                let child = NodeRef {
                    script: node.script,
                    id: *child_id,
                };
                if !guard_passes(child, state)? {
                    continue;
                }
                items.push(build_node(child, state)?);
            }
            Ok(ModelNode::List { order, items })
        }
        Kind::ModelMap => {
            let mut map = ModelNode::Map {
                order,
                entries: BTreeMap::new(),
            };
            merge_entries(node, state, &mut map)?;
            Ok(map)
        }
        other => Err(MoldeError::ScriptParse {
            message: format!("unexpected {other:?} inside a model"),
            path: node.script.path().to_path_buf(),
            location: n.location,
        }),
    }
}

fn value_content(node: NodeRef<'_>, state: &WalkState) -> Result<String> {
    let n = node.node();
    if let Some(file) = n.attr_string("file") {
        let file = state.interpolate(&file)?;
        let path = state.cwd().join(file);
        tracing::debug!("model value from file {}", path.display());
        return Ok(std::fs::read_to_string(path)?);
    }
    Ok(match &n.value {
        Value::Empty => String::new(),
        other => other.as_string(),
    })
}
