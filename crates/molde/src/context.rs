// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! The hierarchical context: scopes, paths, visibility, interpolation.
//!
//! The context is a tree of [`ContextScope`]s addressed by dotted
//! [`ContextPath`]s. A path like `a.b.c` names the value stored under key
//! `c` in scope `a.b`. Scopes carry a [`Visibility`]: values inside
//! GLOBAL scopes are reachable without naming the global ancestor, so the
//! *effective* path of a value elides GLOBAL segments while the internal
//! path keeps them.
//!
//! Scopes live in an arena owned by [`Context`] and reference each other
//! by [`ScopeId`]; traversal state carries ids by value, never shared
//! mutable references.
//!
//! # Path grammar
//!
//! A segment is lowercase letters and digits with single internal `-`
//! separators (`--` is rejected). The reference operators `ROOT` and
//! `PARENT` may prefix a path; a path starting with a segment is already
//! absolute.

use crate::error::{MoldeError, Result};
use crate::value::Value;
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::BTreeMap;
use std::collections::VecDeque;
use std::fmt;

lazy_static! {
    static ref SEGMENT: Regex = Regex::new("^[a-z0-9]+(?:-[a-z0-9]+)*$").unwrap();
    static ref PLACEHOLDER: Regex = Regex::new(r"\$\{([^}]+)\}").unwrap();
}

/// One token of a context path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathToken {
    /// `ROOT`: reset resolution to the root scope.
    Root,
    /// `PARENT`: climb one scope.
    Parent,
    /// A validated path segment.
    Segment(String),
}

/// A parsed dot-separated context path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextPath {
    tokens: Vec<PathToken>,
}

impl ContextPath {
    /// Parses a path, rejecting any text outside the grammar.
    pub fn parse(text: &str) -> Result<Self> {
        let reject = |message: &str| MoldeError::InvalidPath {
            path: text.to_string(),
            message: message.to_string(),
        };
        if text.is_empty() {
            return Err(reject("empty path"));
        }
        let mut tokens = Vec::new();
        let mut seen_segment = false;
        for (index, part) in text.split('.').enumerate() {
            match part {
                "ROOT" => {
                    if index != 0 {
                        return Err(reject("ROOT is only valid as the first token"));
                    }
                    tokens.push(PathToken::Root);
                }
                "PARENT" => {
                    if seen_segment {
                        return Err(reject("PARENT cannot follow a segment"));
                    }
                    tokens.push(PathToken::Parent);
                }
                segment => {
                    if !SEGMENT.is_match(segment) {
                        return Err(reject("invalid segment"));
                    }
                    seen_segment = true;
                    tokens.push(PathToken::Segment(segment.to_string()));
                }
            }
        }
        Ok(Self { tokens })
    }

    /// The path tokens in order.
    pub fn tokens(&self) -> &[PathToken] {
        &self.tokens
    }

    /// True when resolution starts at the root scope: the path begins
    /// with `ROOT` or directly with a segment.
    pub fn is_absolute(&self) -> bool {
        !matches!(self.tokens.first(), Some(PathToken::Parent))
    }

    /// The trailing segments (the navigation steps plus the value key).
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.tokens.iter().filter_map(|t| match t {
            PathToken::Segment(s) => Some(s.as_str()),
            _ => None,
        })
    }
}

impl fmt::Display for ContextPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, token) in self.tokens.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            match token {
                PathToken::Root => f.write_str("ROOT")?,
                PathToken::Parent => f.write_str("PARENT")?,
                PathToken::Segment(s) => f.write_str(s)?,
            }
        }
        Ok(())
    }
}

/// Scope visibility.
///
/// The transition UNSET → GLOBAL/LOCAL happens exactly once; flipping
/// between GLOBAL and LOCAL is a [`MoldeError::ScopeConflict`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Visibility {
    /// Values beneath this scope are visible without naming it.
    Global,
    /// Values are addressed through the full path.
    Local,
    /// Not decided yet; set on first `get_or_create` with a concrete
    /// visibility.
    #[default]
    Unset,
}

/// Provenance of a context value; EXTERNAL and PRESET values are
/// read-only for subsequent writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    /// Computed default, may later be promoted to USER.
    Default,
    /// Answered by the user.
    User,
    /// Supplied by the embedding host (engine presets).
    External,
    /// Declared by a `<presets>` directive.
    Preset,
    /// Declared by a `<variables>` directive.
    LocalVar,
}

impl ValueKind {
    /// True for host-supplied values.
    pub fn is_external(self) -> bool {
        matches!(self, Self::External)
    }

    /// True when later writes must match canonically instead of
    /// overwriting.
    pub fn is_read_only(self) -> bool {
        matches!(self, Self::External | Self::Preset)
    }
}

/// A stored value plus its provenance.
#[derive(Debug, Clone, PartialEq)]
pub struct ContextValue {
    /// The value.
    pub value: Value,
    /// Where it came from.
    pub kind: ValueKind,
}

/// Index of a scope within the context arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(usize);

/// One node of the scope tree.
#[derive(Debug, Clone)]
pub struct ContextScope {
    /// The scope's path segment; `None` for the root.
    id: Option<String>,
    parent: Option<ScopeId>,
    children: BTreeMap<String, ScopeId>,
    values: BTreeMap<String, ContextValue>,
    visibility: Visibility,
}

impl ContextScope {
    /// The scope's visibility.
    pub fn visibility(&self) -> Visibility {
        self.visibility
    }

    /// The scope's own segment, `None` for the root.
    pub fn segment(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// The values stored directly in this scope.
    pub fn values(&self) -> &BTreeMap<String, ContextValue> {
        &self.values
    }
}

/// The scope arena. Owned exclusively by one invocation.
#[derive(Debug)]
pub struct Context {
    scopes: Vec<ContextScope>,
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl Context {
    /// Creates a context holding only the root scope.
    pub fn new() -> Self {
        Self {
            scopes: vec![ContextScope {
                id: None,
                parent: None,
                children: BTreeMap::new(),
                values: BTreeMap::new(),
                visibility: Visibility::Unset,
            }],
        }
    }

    /// The root scope id.
    pub fn root(&self) -> ScopeId {
        ScopeId(0)
    }

    /// Borrows a scope.
    pub fn scope(&self, id: ScopeId) -> &ContextScope {
        &self.scopes[id.0]
    }

    /// The parent of a scope, `None` for the root.
    pub fn parent_of(&self, id: ScopeId) -> Option<ScopeId> {
        self.scopes[id.0].parent
    }

    /// Idempotently creates the scope named by `path`, resolved against
    /// `current`. Intermediate scopes materialize as UNSET; the final
    /// scope receives `visibility`. An existing final scope with a
    /// different concrete visibility is a conflict.
    pub fn get_or_create(
        &mut self,
        current: ScopeId,
        path: &ContextPath,
        visibility: Visibility,
    ) -> Result<ScopeId> {
        let mut cursor = self.apply_references(current, path)?;
        let segments: Vec<&str> = path.segments().collect();
        for (i, segment) in segments.iter().enumerate() {
            let is_last = i + 1 == segments.len();
            cursor = self.child_or_create(cursor, segment);
            if is_last {
                self.set_visibility(cursor, visibility, path)?;
            }
        }
        Ok(cursor)
    }

    fn child_or_create(&mut self, parent: ScopeId, segment: &str) -> ScopeId {
        if let Some(existing) = self.scopes[parent.0].children.get(segment) {
            return *existing;
        }
        let id = ScopeId(self.scopes.len());
        self.scopes.push(ContextScope {
            id: Some(segment.to_string()),
            parent: Some(parent),
            children: BTreeMap::new(),
            values: BTreeMap::new(),
            visibility: Visibility::Unset,
        });
        self.scopes[parent.0].children.insert(segment.to_string(), id);
        id
    }

    fn set_visibility(
        &mut self,
        scope: ScopeId,
        visibility: Visibility,
        path: &ContextPath,
    ) -> Result<()> {
        if visibility == Visibility::Unset {
            return Ok(());
        }
        let current = self.scopes[scope.0].visibility;
        match current {
            Visibility::Unset => {
                self.scopes[scope.0].visibility = visibility;
                Ok(())
            }
            same if same == visibility => Ok(()),
            _ => Err(MoldeError::ScopeConflict(format!(
                "scope '{path}' is already {current:?}, cannot become {visibility:?}"
            ))),
        }
    }

    /// Stores a value in a scope.
    ///
    /// The key must be a bare segment (no dots). An existing read-only
    /// value only accepts a rewrite whose canonical projection is equal.
    pub fn put_value(
        &mut self,
        scope: ScopeId,
        key: &str,
        value: Value,
        kind: ValueKind,
    ) -> Result<()> {
        if key.contains('.') {
            return Err(MoldeError::InvalidPath {
                path: key.to_string(),
                message: "value keys must not contain '.'".to_string(),
            });
        }
        if let Some(existing) = self.scopes[scope.0].values.get(key) {
            if existing.kind.is_read_only() && !existing.value.canonical_eq(&value) {
                return Err(MoldeError::ScopeConflict(format!(
                    "read-only value '{}' at '{}' cannot change from '{}' to '{}'",
                    key,
                    self.scope_path(scope, true),
                    existing.value,
                    value
                )));
            }
        }
        self.scopes[scope.0]
            .values
            .insert(key.to_string(), ContextValue { value, kind });
        Ok(())
    }

    /// Parses `path`, creates intermediate scopes, and stores the value
    /// under the final segment. Used by preset/variable directives and
    /// engine seeds.
    pub fn put_at_path(
        &mut self,
        current: ScopeId,
        path: &str,
        value: Value,
        kind: ValueKind,
    ) -> Result<()> {
        let parsed = ContextPath::parse(path)?;
        let segments: Vec<&str> = parsed.segments().collect();
        let Some((key, scope_segments)) = segments.split_last() else {
            return Err(MoldeError::InvalidPath {
                path: path.to_string(),
                message: "path names no value key".to_string(),
            });
        };
        let mut cursor = self.apply_references(current, &parsed)?;
        for segment in scope_segments {
            cursor = self.child_or_create(cursor, segment);
        }
        self.put_value(cursor, key, value, kind)
    }

    /// Resolves a path and returns the stored value, or `None`.
    pub fn get_value(&self, current: ScopeId, path: &str) -> Result<Option<Value>> {
        Ok(self
            .get_context_value(current, path)?
            .map(|cv| cv.value.clone()))
    }

    /// Resolves a path and returns the stored value with its kind.
    pub fn get_context_value(
        &self,
        current: ScopeId,
        path: &str,
    ) -> Result<Option<&ContextValue>> {
        let parsed = ContextPath::parse(path)?;
        let segments: Vec<&str> = parsed.segments().collect();
        let Some((key, scope_segments)) = segments.split_last() else {
            return Err(MoldeError::InvalidPath {
                path: path.to_string(),
                message: "path names no value key".to_string(),
            });
        };

        let mut cursor = self.apply_references(current, &parsed)?;
        for segment in scope_segments {
            match self.find_child(cursor, segment) {
                Some(child) => cursor = child,
                None => return Ok(None),
            }
        }

        if let Some(found) = self.scopes[cursor.0].values.get(*key) {
            return Ok(Some(found));
        }
        // Probe globally visible descendants: the effective path of a
        // value elides GLOBAL ancestors.
        let mut queue: VecDeque<ScopeId> = self.global_children(cursor).collect();
        while let Some(scope) = queue.pop_front() {
            if let Some(found) = self.scopes[scope.0].values.get(*key) {
                return Ok(Some(found));
            }
            queue.extend(self.global_children(scope));
        }
        Ok(None)
    }

    fn apply_references(&self, current: ScopeId, path: &ContextPath) -> Result<ScopeId> {
        let mut cursor = if path.is_absolute() {
            self.root()
        } else {
            current
        };
        for token in path.tokens() {
            match token {
                PathToken::Root => cursor = self.root(),
                PathToken::Parent => {
                    cursor = self.scopes[cursor.0].parent.ok_or_else(|| {
                        MoldeError::InvalidPath {
                            path: path.to_string(),
                            message: "PARENT underflows the root scope".to_string(),
                        }
                    })?;
                }
                PathToken::Segment(_) => break,
            }
        }
        Ok(cursor)
    }

    /// Finds a child scope by segment: direct children first, then a
    /// breadth-first descent through GLOBAL-visibility children.
    fn find_child(&self, scope: ScopeId, segment: &str) -> Option<ScopeId> {
        if let Some(direct) = self.scopes[scope.0].children.get(segment) {
            return Some(*direct);
        }
        let mut queue: VecDeque<ScopeId> = self.global_children(scope).collect();
        while let Some(candidate) = queue.pop_front() {
            if let Some(child) = self.scopes[candidate.0].children.get(segment) {
                return Some(*child);
            }
            queue.extend(self.global_children(candidate));
        }
        None
    }

    fn global_children(&self, scope: ScopeId) -> impl Iterator<Item = ScopeId> + '_ {
        self.scopes[scope.0]
            .children
            .values()
            .copied()
            .filter(|id| self.scopes[id.0].visibility == Visibility::Global)
    }

    /// Computes a scope's path string. The visible form elides GLOBAL
    /// scopes; the internal form keeps every segment.
    pub fn scope_path(&self, scope: ScopeId, internal: bool) -> String {
        let mut segments = Vec::new();
        let mut cursor = Some(scope);
        while let Some(id) = cursor {
            let data = &self.scopes[id.0];
            if let Some(segment) = &data.id {
                if internal || data.visibility != Visibility::Global {
                    segments.push(segment.clone());
                }
            }
            cursor = data.parent;
        }
        segments.reverse();
        segments.join(".")
    }

    /// The effective path of a value stored under `key` in `scope`.
    pub fn value_path(&self, scope: ScopeId, key: &str) -> String {
        let prefix = self.scope_path(scope, false);
        if prefix.is_empty() {
            key.to_string()
        } else {
            format!("{prefix}.{key}")
        }
    }

    /// Repeatedly substitutes `${path}` placeholders until a fixed point.
    ///
    /// Unresolved variables fail; a substitution chain longer than 256
    /// steps is treated as a cycle.
    pub fn interpolate(&self, scope: ScopeId, template: &str) -> Result<String> {
        let mut text = template.to_string();
        for _ in 0..256 {
            if !PLACEHOLDER.is_match(&text) {
                return Ok(text);
            }
            let mut next = String::with_capacity(text.len());
            let mut last = 0;
            for captures in PLACEHOLDER.captures_iter(&text) {
                let whole = captures.get(0).expect("match");
                let path = &captures[1];
                let value = self.get_value(scope, path)?.ok_or_else(|| {
                    MoldeError::ExpressionEval(format!("unresolved variable '{path}'"))
                })?;
                next.push_str(&text[last..whole.start()]);
                next.push_str(&value.as_string());
                last = whole.end();
            }
            next.push_str(&text[last..]);
            if next == text {
                return Ok(text);
            }
            text = next;
        }
        Err(MoldeError::ExpressionEval(format!(
            "interpolation did not reach a fixed point: '{template}'"
        )))
    }

    /// Interpolates string content inside a value; lists interpolate
    /// element-wise, other kinds pass through.
    pub fn interpolate_value(&self, scope: ScopeId, value: &Value) -> Result<Value> {
        match value {
            Value::String(s) => Ok(Value::String(self.interpolate(scope, s)?)),
            Value::List(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(self.interpolate(scope, item)?);
                }
                Ok(Value::List(out))
            }
            other => Ok(other.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(s: &str) -> ContextPath {
        ContextPath::parse(s).unwrap()
    }

    #[test]
    fn path_parse_round_trips() {
        for text in ["a", "a.b-c.d", "ROOT.a.b", "PARENT.PARENT.x", "a1.2b"] {
            assert_eq!(path(text).to_string(), text);
        }
    }

    #[test]
    fn path_parse_rejects_illegal_input() {
        for text in ["", "a..b", "a--b", "Theme", "a.B", "a_b", "a b", "ROOT.ROOT", "a.PARENT"] {
            assert!(
                ContextPath::parse(text).is_err(),
                "'{text}' should be rejected"
            );
        }
    }

    #[test]
    fn bare_segment_and_root_are_both_absolute() {
        assert!(path("a.b").is_absolute());
        assert!(path("ROOT.a").is_absolute());
        assert!(!path("PARENT.a").is_absolute());
    }

    #[test]
    fn get_or_create_is_idempotent() {
        let mut ctx = Context::new();
        let a = ctx
            .get_or_create(ctx.root(), &path("a.b"), Visibility::Local)
            .unwrap();
        let b = ctx
            .get_or_create(ctx.root(), &path("a.b"), Visibility::Local)
            .unwrap();
        assert_eq!(a, b);
        // Intermediate scope stays UNSET
        let a_scope = ctx.scope(ctx.scopes[a.0].parent.unwrap());
        assert_eq!(a_scope.visibility(), Visibility::Unset);
    }

    #[test]
    fn visibility_flip_is_a_conflict() {
        let mut ctx = Context::new();
        ctx.get_or_create(ctx.root(), &path("a"), Visibility::Global)
            .unwrap();
        let err = ctx
            .get_or_create(ctx.root(), &path("a"), Visibility::Local)
            .unwrap_err();
        assert!(matches!(err, MoldeError::ScopeConflict(_)));
        // Same visibility stays fine
        ctx.get_or_create(ctx.root(), &path("a"), Visibility::Global)
            .unwrap();
    }

    #[test]
    fn put_get_and_overwrite() {
        let mut ctx = Context::new();
        let root = ctx.root();
        ctx.put_value(root, "theme", Value::string("dark"), ValueKind::Default)
            .unwrap();
        ctx.put_value(root, "theme", Value::string("light"), ValueKind::User)
            .unwrap();
        assert_eq!(
            ctx.get_value(root, "theme").unwrap().unwrap().as_string(),
            "light"
        );
    }

    #[test]
    fn read_only_requires_canonical_equality() {
        let mut ctx = Context::new();
        let root = ctx.root();
        ctx.put_value(root, "theme", Value::string("light"), ValueKind::External)
            .unwrap();
        // Same canonical projection: accepted
        ctx.put_value(root, "theme", Value::string("light"), ValueKind::Preset)
            .unwrap();
        // Different: conflict
        let err = ctx
            .put_value(root, "theme", Value::string("dark"), ValueKind::Preset)
            .unwrap_err();
        assert!(matches!(err, MoldeError::ScopeConflict(_)));
    }

    #[test]
    fn dotted_keys_are_rejected() {
        let mut ctx = Context::new();
        let root = ctx.root();
        assert!(matches!(
            ctx.put_value(root, "a.b", Value::string("x"), ValueKind::User),
            Err(MoldeError::InvalidPath { .. })
        ));
    }

    #[test]
    fn parent_climbs_and_underflows() {
        let mut ctx = Context::new();
        let root = ctx.root();
        ctx.put_value(root, "x", Value::string("top"), ValueKind::User)
            .unwrap();
        let inner = ctx
            .get_or_create(root, &path("a.b"), Visibility::Local)
            .unwrap();
        let found = ctx.get_value(inner, "PARENT.PARENT.x").unwrap().unwrap();
        assert_eq!(found.as_string(), "top");
        let err = ctx.get_value(root, "PARENT.x").unwrap_err();
        assert!(matches!(err, MoldeError::InvalidPath { .. }));
    }

    #[test]
    fn global_scope_values_resolve_without_their_prefix() {
        let mut ctx = Context::new();
        let root = ctx.root();
        let theme = ctx
            .get_or_create(root, &path("theme"), Visibility::Global)
            .unwrap();
        ctx.put_value(theme, "license", Value::string("mit"), ValueKind::User)
            .unwrap();

        // Effective path elides the GLOBAL scope
        assert_eq!(ctx.value_path(theme, "license"), "license");
        assert_eq!(
            ctx.get_value(root, "license").unwrap().unwrap().as_string(),
            "mit"
        );
        // The internal path still resolves
        assert_eq!(
            ctx.get_value(root, "theme.license")
                .unwrap()
                .unwrap()
                .as_string(),
            "mit"
        );
    }

    #[test]
    fn local_scope_values_need_their_prefix() {
        let mut ctx = Context::new();
        let root = ctx.root();
        let scope = ctx
            .get_or_create(root, &path("app"), Visibility::Local)
            .unwrap();
        ctx.put_value(scope, "name", Value::string("demo"), ValueKind::User)
            .unwrap();
        assert_eq!(ctx.get_value(root, "name").unwrap(), None);
        assert_eq!(
            ctx.get_value(root, "app.name").unwrap().unwrap().as_string(),
            "demo"
        );
        assert_eq!(ctx.value_path(scope, "name"), "app.name");
    }

    #[test]
    fn interpolation_reaches_fixed_point() {
        let mut ctx = Context::new();
        let root = ctx.root();
        ctx.put_value(root, "a", Value::string("${b}"), ValueKind::Preset)
            .unwrap();
        ctx.put_value(root, "b", Value::string("${c}"), ValueKind::Preset)
            .unwrap();
        ctx.put_value(root, "c", Value::string("42"), ValueKind::Preset)
            .unwrap();
        assert_eq!(ctx.interpolate(root, "${a}").unwrap(), "42");
        // Idempotent once stable
        assert_eq!(ctx.interpolate(root, "42").unwrap(), "42");
    }

    #[test]
    fn interpolation_cycle_fails() {
        let mut ctx = Context::new();
        let root = ctx.root();
        ctx.put_value(root, "a", Value::string("${b}"), ValueKind::Preset)
            .unwrap();
        ctx.put_value(root, "b", Value::string("${a}"), ValueKind::Preset)
            .unwrap();
        assert!(ctx.interpolate(root, "${a}").is_err());
    }

    #[test]
    fn interpolation_unresolved_fails() {
        let ctx = Context::new();
        assert!(ctx.interpolate(ctx.root(), "${missing}").is_err());
    }

    #[test]
    fn put_at_path_creates_intermediates() {
        let mut ctx = Context::new();
        let root = ctx.root();
        ctx.put_at_path(root, "project.name", Value::string("demo"), ValueKind::External)
            .unwrap();
        assert_eq!(
            ctx.get_value(root, "project.name")
                .unwrap()
                .unwrap()
                .as_string(),
            "demo"
        );
    }
}
