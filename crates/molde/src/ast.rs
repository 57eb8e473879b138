// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! The script AST: a uniform tagged tree parsed from archetype XML.
//!
//! Nodes live in an arena owned by their [`Script`] and reference each
//! other by [`NodeId`]. A node carries a closed [`Kind`], a source
//! [`Location`], an ordered child list, an attribute map, a single
//! [`Value`] (the element text), and a guard [`Expression`] defaulting to
//! the literal `true`.
//!
//! Scripts are immutable once parsed; the loader caches them by path and
//! hands out shared references.

use crate::error::Location;
use crate::expr::Expression;
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};

/// Index of a node within its script's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    /// The arena index.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The closed set of node kinds an archetype script can contain.
///
/// Element names map to kinds contextually: `<boolean>` under `<inputs>`
/// is [`Kind::InputBoolean`], under `<presets>` it is
/// [`Kind::PresetBoolean`], and so on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Kind {
    /// Root element `archetype-script`.
    Script,
    /// `<methods>` container; only reachable through `<call>`.
    Methods,
    /// A named `<method>` subtree.
    Method,
    /// A `<step>` grouping element.
    Step,
    /// `<inputs>` container.
    Inputs,
    /// `<boolean>` input.
    InputBoolean,
    /// `<text>` input.
    InputText,
    /// `<enum>` input.
    InputEnum,
    /// `<list>` input.
    InputList,
    /// `<option>` under an enum or list input.
    InputOption,
    /// `<presets>` container.
    Presets,
    /// `<boolean>` preset.
    PresetBoolean,
    /// `<text>` preset.
    PresetText,
    /// `<enum>` preset.
    PresetEnum,
    /// `<list>` preset.
    PresetList,
    /// `<variables>` container.
    Variables,
    /// `<boolean>` variable.
    VariableBoolean,
    /// `<text>` variable.
    VariableText,
    /// `<enum>` variable.
    VariableEnum,
    /// `<list>` variable.
    VariableList,
    /// `<output>` container.
    Output,
    /// `<file>` copy directive.
    OutputFile,
    /// `<files>` scan-and-copy directive.
    OutputFiles,
    /// `<template>` render directive.
    OutputTemplate,
    /// `<templates>` scan-and-render directive.
    OutputTemplates,
    /// `<transformation>` declaration.
    Transformation,
    /// `<replace>` rule inside a transformation.
    Replace,
    /// `<includes>` filter container.
    Includes,
    /// `<include>` glob pattern.
    Include,
    /// `<excludes>` filter container.
    Excludes,
    /// `<exclude>` glob pattern.
    Exclude,
    /// `<model>` container.
    Model,
    /// `<map>` model node.
    ModelMap,
    /// `<list>` model node.
    ModelList,
    /// `<value>` model node.
    ModelValue,
    /// `<validations>` container.
    Validations,
    /// A named `<validation>`.
    Validation,
    /// `<regex>` pattern inside a validation.
    Regex,
    /// `<exec>`: invoke another script with its directory as cwd.
    Exec,
    /// `<source>`: invoke another script in place.
    Source,
    /// `<call>`: invoke a named method.
    Call,
}

impl Kind {
    /// True for the five input kinds (options excluded).
    pub fn is_input(self) -> bool {
        matches!(
            self,
            Self::InputBoolean | Self::InputText | Self::InputEnum | Self::InputList
        )
    }

    /// True for preset value kinds.
    pub fn is_preset(self) -> bool {
        matches!(
            self,
            Self::PresetBoolean | Self::PresetText | Self::PresetEnum | Self::PresetList
        )
    }

    /// True for variable value kinds.
    pub fn is_variable(self) -> bool {
        matches!(
            self,
            Self::VariableBoolean | Self::VariableText | Self::VariableEnum | Self::VariableList
        )
    }

    /// True for model content kinds.
    pub fn is_model_node(self) -> bool {
        matches!(self, Self::ModelMap | Self::ModelList | Self::ModelValue)
    }

    /// True for the three invocation kinds.
    pub fn is_invocation(self) -> bool {
        matches!(self, Self::Exec | Self::Source | Self::Call)
    }
}

/// A single node of the script tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    /// The node kind.
    pub kind: Kind,
    /// Position of the element in its source document.
    pub location: Location,
    /// Back-reference to the parent; `None` for the root.
    pub parent: Option<NodeId>,
    /// Children in document order.
    pub children: Vec<NodeId>,
    /// Attribute name to value, excluding `if` (lifted into `guard`).
    pub attributes: BTreeMap<String, Value>,
    /// The element's text content, or [`Value::Empty`].
    pub value: Value,
    /// The guard expression; literal `true` when no `if` attribute exists.
    pub guard: Expression,
    /// The raw `if` attribute text, kept for round-trip writing.
    pub guard_source: Option<String>,
}

impl Node {
    /// Looks up an attribute value.
    pub fn attr(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    /// Looks up an attribute as a string.
    pub fn attr_string(&self, name: &str) -> Option<String> {
        self.attributes.get(name).map(Value::as_string)
    }

    /// Looks up an attribute as a lenient boolean, with a default when
    /// the attribute is absent.
    pub fn attr_boolean(&self, name: &str, default: bool) -> bool {
        self.attributes
            .get(name)
            .map(Value::as_boolean)
            .unwrap_or(default)
    }

    /// Looks up an attribute as an integer, with a default when absent
    /// or unparseable.
    pub fn attr_int(&self, name: &str, default: i64) -> i64 {
        self.attributes
            .get(name)
            .and_then(Value::as_int)
            .unwrap_or(default)
    }
}

/// An immutable parsed script document.
///
/// Owns the node arena and the mapping of named methods declared under
/// `<methods>`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Script {
    path: PathBuf,
    nodes: Vec<Node>,
    root: NodeId,
    methods: HashMap<String, NodeId>,
}

impl Script {
    /// Creates a script from reader output.
    pub(crate) fn new(
        path: PathBuf,
        nodes: Vec<Node>,
        root: NodeId,
        methods: HashMap<String, NodeId>,
    ) -> Self {
        Self {
            path,
            nodes,
            root,
            methods,
        }
    }

    /// The absolute path this script was loaded from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The directory containing this script; invocation sources resolve
    /// against it.
    pub fn directory(&self) -> &Path {
        self.path.parent().unwrap_or_else(|| Path::new("."))
    }

    /// The root node id.
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Borrows a node by id.
    ///
    /// # Panics
    ///
    /// Panics when `id` did not come from this script's arena.
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    /// Resolves a method declared in this script.
    pub fn method(&self, name: &str) -> Option<NodeId> {
        self.methods.get(name).copied()
    }

    /// All method names declared in this script.
    pub fn method_names(&self) -> impl Iterator<Item = &str> {
        self.methods.keys().map(String::as_str)
    }

    /// Number of nodes in the arena.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True when the arena is empty (never the case for parsed scripts).
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Iterates node ids in arena order (document order for siblings).
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> {
        (0..self.nodes.len() as u32).map(NodeId)
    }
}
