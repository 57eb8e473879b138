// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Input resolution.
//!
//! The [`InputResolver`] is the input-phase visitor. For every declared
//! input it decides where the value comes from: an existing context value
//! (host preset or script preset), a computed default, a prompt, or a
//! failure. It also lands `<presets>`/`<variables>` writes in the
//! context, registers `<validations>`, and gates `<option>` subtrees
//! against the resolved value.
//!
//! # Modes
//!
//! - [`InputResolver::batch`]: never prompts. Optional inputs accept
//!   their default (or the typed zero for booleans and lists); required
//!   inputs without a value fail with
//!   [`MoldeError::InputUnresolved`].
//! - [`InputResolver::interactive`]: asks the supplied [`Prompter`] and
//!   re-prompts until the response parses and validates.
//!
//! # Auto-resolution
//!
//! A list input whose effective options (after guard filtering) are
//! empty resolves to `[]` without prompting. An enum input with exactly
//! one effective option equal to its default resolves to that default.

use crate::ast::Kind;
use crate::context::ValueKind;
use crate::error::{MoldeError, Result};
use crate::value::{parse_boolean, Value};
use crate::walker::{NodeRef, NodeVisitor, VisitResult, WalkState};
use regex::Regex;
use std::collections::{HashMap, VecDeque};

/// The four prompting shapes of declared inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptKind {
    /// Yes/no question.
    Boolean,
    /// Free text.
    Text,
    /// Single choice among options.
    Enum,
    /// Multiple choices among options.
    List,
}

/// One selectable option offered by an enum or list input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptOption {
    /// The option value, matched case-insensitively.
    pub value: String,
    /// Display label; falls back to the value when absent.
    pub label: Option<String>,
}

/// Everything a prompter needs to ask one question.
#[derive(Debug, Clone)]
pub struct Prompt {
    /// Effective context path of the input.
    pub path: String,
    /// Display name.
    pub name: Option<String>,
    /// The question text.
    pub text: Option<String>,
    /// Additional help text.
    pub help: Option<String>,
    /// The default, already interpolated.
    pub default: Option<String>,
    /// The input shape.
    pub kind: PromptKind,
    /// Effective options (guard-filtered), for enum and list inputs.
    pub options: Vec<PromptOption>,
}

/// The terminal-side collaborator of the interactive resolver.
///
/// Returns the raw response line; the resolver parses it per input kind
/// and re-prompts on invalid responses.
pub trait Prompter {
    /// Asks one question and returns the raw response.
    fn prompt(&mut self, prompt: &Prompt) -> Result<String>;
}

/// Queue-backed prompter for deterministic tests.
#[derive(Debug, Default)]
pub struct ScriptedPrompter {
    responses: VecDeque<String>,
    asked: Vec<Prompt>,
}

impl ScriptedPrompter {
    /// Creates a prompter answering from a fixed response queue.
    pub fn new<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            responses: responses.into_iter().map(Into::into).collect(),
            asked: Vec::new(),
        }
    }

    /// The prompts asked so far.
    pub fn asked(&self) -> &[Prompt] {
        &self.asked
    }
}

impl Prompter for ScriptedPrompter {
    fn prompt(&mut self, prompt: &Prompt) -> Result<String> {
        self.asked.push(prompt.clone());
        self.responses.pop_front().ok_or_else(|| {
            MoldeError::InputUnresolved(format!(
                "no scripted response left for '{}'",
                prompt.path
            ))
        })
    }
}

enum Mode {
    Batch,
    Interactive(Box<dyn Prompter>),
}

struct ActiveInput {
    kind: PromptKind,
    value: Value,
}

/// The input-phase visitor.
pub struct InputResolver {
    mode: Mode,
    defaults: HashMap<String, String>,
    skip_optional: bool,
    fail_on_unresolved: bool,
    validations: HashMap<String, Vec<String>>,
    input_stack: Vec<ActiveInput>,
}

impl InputResolver {
    /// Creates a batch resolver: no prompting, defaults or failure.
    pub fn batch() -> Self {
        Self::with_mode(Mode::Batch)
    }

    /// Creates an interactive resolver asking `prompter`.
    pub fn interactive(prompter: Box<dyn Prompter>) -> Self {
        Self::with_mode(Mode::Interactive(prompter))
    }

    fn with_mode(mode: Mode) -> Self {
        Self {
            mode,
            defaults: HashMap::new(),
            skip_optional: false,
            fail_on_unresolved: true,
            validations: HashMap::new(),
            input_stack: Vec::new(),
        }
    }

    /// Supplies host defaults, keyed by effective input path.
    pub fn with_defaults(mut self, defaults: HashMap<String, String>) -> Self {
        self.defaults = defaults;
        self
    }

    /// Accept defaults for optional inputs without prompting.
    pub fn skip_optional(mut self, skip: bool) -> Self {
        self.skip_optional = skip;
        self
    }

    /// When false, an unresolvable required input skips its subtree with
    /// a warning instead of failing the walk.
    pub fn fail_on_unresolved(mut self, fail: bool) -> Self {
        self.fail_on_unresolved = fail;
        self
    }

    fn prompt_kind(kind: Kind) -> Option<PromptKind> {
        match kind {
            Kind::InputBoolean => Some(PromptKind::Boolean),
            Kind::InputText => Some(PromptKind::Text),
            Kind::InputEnum => Some(PromptKind::Enum),
            Kind::InputList => Some(PromptKind::List),
            _ => None,
        }
    }

    /// Guard-filtered options of an enum/list input.
    fn effective_options(&self, node: NodeRef<'_>, state: &WalkState) -> Result<Vec<PromptOption>> {
        let mut options = Vec::new();
        for child_id in &node.node().children {
            let child = node.script.node(*child_id);
            if child.kind != Kind::InputOption {
                continue;
            }
            if !child.guard.is_true_literal() {
                let pass = child.guard.evaluate_boolean(&|path| state.lookup(path))?;
                if !pass {
                    continue;
                }
            }
            let value = child.attr_string("value").ok_or_else(|| {
                MoldeError::ScriptParse {
                    message: "option without 'value'".to_string(),
                    path: node.script.path().to_path_buf(),
                    location: child.location,
                }
            })?;
            let label = child
                .attr_string("name")
                .or_else(|| match &child.value {
                    Value::Empty => None,
                    other => Some(other.as_string()),
                });
            options.push(PromptOption { value, label });
        }
        Ok(options)
    }

    /// Validation patterns referenced by an input's `validations`
    /// attribute.
    fn patterns_for(&self, node: NodeRef<'_>) -> Result<Vec<String>> {
        let Some(refs) = node.node().attr_string("validations") else {
            return Ok(Vec::new());
        };
        let mut patterns = Vec::new();
        for id in refs.split([' ', ',']).filter(|s| !s.is_empty()) {
            let declared = self.validations.get(id).ok_or_else(|| {
                MoldeError::ScriptParse {
                    message: format!("unknown validation '{id}'"),
                    path: node.script.path().to_path_buf(),
                    location: node.node().location,
                }
            })?;
            patterns.extend(declared.iter().cloned());
        }
        Ok(patterns)
    }

    fn validate(
        kind: PromptKind,
        value: &Value,
        patterns: &[String],
        options: &[PromptOption],
        path: &str,
    ) -> Result<()> {
        match kind {
            PromptKind::Text => {
                let text = value.as_string();
                let mut failures = Vec::new();
                for pattern in patterns {
                    let regex = Regex::new(pattern).map_err(|e| {
                        MoldeError::InvalidInput {
                            path: path.to_string(),
                            message: format!("bad validation pattern '{pattern}': {e}"),
                        }
                    })?;
                    if !regex.is_match(&text) {
                        failures.push(pattern.clone());
                    }
                }
                if !failures.is_empty() {
                    return Err(MoldeError::InputValidation {
                        path: path.to_string(),
                        failures,
                    });
                }
                Ok(())
            }
            PromptKind::Enum | PromptKind::List => {
                let chosen = match kind {
                    PromptKind::Enum => vec![value.as_string()],
                    _ => value.as_list(),
                };
                for item in chosen {
                    let known = options
                        .iter()
                        .any(|o| o.value.eq_ignore_ascii_case(&item));
                    if !known {
                        return Err(MoldeError::InvalidInput {
                            path: path.to_string(),
                            message: format!("'{item}' is not one of the offered options"),
                        });
                    }
                }
                Ok(())
            }
            PromptKind::Boolean => Ok(()),
        }
    }

    fn traversal(kind: PromptKind, value: &Value) -> VisitResult {
        let enter = match kind {
            PromptKind::Boolean => value.as_boolean(),
            PromptKind::List => !value.as_list().is_empty(),
            PromptKind::Text | PromptKind::Enum => true,
        };
        if enter {
            VisitResult::Continue
        } else {
            VisitResult::SkipSubtree
        }
    }

    fn parse_response(
        kind: PromptKind,
        response: &str,
        default: Option<&str>,
        options: &[PromptOption],
    ) -> Option<Value> {
        let response = response.trim();
        match kind {
            PromptKind::Boolean => {
                if response.is_empty() {
                    let d = default.map(|d| parse_boolean(d, false).unwrap_or(false));
                    return Some(Value::Bool(d.unwrap_or(false)));
                }
                parse_boolean(response, true).ok().map(Value::Bool)
            }
            PromptKind::Text => {
                if response.is_empty() {
                    return Some(Value::string(default.unwrap_or("")));
                }
                Some(Value::string(response))
            }
            PromptKind::Enum => {
                if response.is_empty() {
                    return default.map(Value::string);
                }
                let n: usize = response.parse().ok()?;
                let option = options.get(n.checked_sub(1)?)?;
                Some(Value::string(option.value.to_lowercase()))
            }
            PromptKind::List => {
                if response.eq_ignore_ascii_case("none") {
                    return Some(Value::List(Vec::new()));
                }
                if response.is_empty() {
                    return default.map(|d| Value::List(Value::string(d).as_list()));
                }
                let mut chosen = Vec::new();
                for token in response.split_whitespace() {
                    let n: usize = token.parse().ok()?;
                    let option = options.get(n.checked_sub(1)?)?;
                    chosen.push(option.value.to_lowercase());
                }
                Some(Value::List(chosen))
            }
        }
    }

    fn resolve_input(&mut self, node: NodeRef<'_>, state: &mut WalkState) -> Result<VisitResult> {
        let kind = Self::prompt_kind(node.kind()).expect("caller checked the kind");
        let scope = state.scope();
        let parent = state
            .context
            .parent_of(scope)
            .expect("input scopes always have a parent");
        let key = node
            .node()
            .attr_string("id")
            .expect("walker rejects inputs without an id");
        let path = state.context.value_path(parent, &key);
        let optional = node.node().attr_boolean("optional", false);
        let options = self.effective_options(node, state)?;
        let patterns = self.patterns_for(node)?;

        // 1. Existing value from the host or an earlier directive
        let existing = state
            .context
            .get_context_value(state.context.root(), &path)?
            .filter(|cv| {
                matches!(
                    cv.kind,
                    ValueKind::External | ValueKind::Preset | ValueKind::User
                )
            })
            .map(|cv| cv.value.clone());
        if let Some(value) = existing {
            let value = state.context.interpolate_value(scope, &value)?;
            Self::validate(kind, &value, &patterns, &options, &path)?;
            tracing::debug!("input '{path}' already resolved to '{value}'");
            let result = Self::traversal(kind, &value);
            self.input_stack.push(ActiveInput { kind, value });
            return Ok(result);
        }

        // 2. Default: host default, then the declared one
        let default = match self.defaults.get(&path) {
            Some(host) => Some(state.interpolate(host)?),
            None => match node.node().attr_string("default") {
                Some(declared) => Some(state.interpolate(&declared)?),
                None => None,
            },
        };

        // 3. Auto-resolution
        let auto = match kind {
            PromptKind::List if options.is_empty() => Some(Value::List(Vec::new())),
            PromptKind::Enum if options.len() == 1 => default
                .as_deref()
                .filter(|d| options[0].value.eq_ignore_ascii_case(d))
                .map(Value::string),
            _ => None,
        };

        let (value, value_kind) = if let Some(value) = auto {
            (value, ValueKind::Default)
        } else {
            let batch_like = matches!(self.mode, Mode::Batch)
                || (self.skip_optional && optional);
            if batch_like {
                let fallback = match kind {
                    _ if default.is_some() && optional => {
                        Some(Self::typed(kind, default.as_deref().unwrap()))
                    }
                    PromptKind::Boolean if optional => Some(Value::Bool(false)),
                    PromptKind::List if optional => Some(Value::List(Vec::new())),
                    _ => None,
                };
                match fallback {
                    Some(value) => (value, ValueKind::Default),
                    None if self.fail_on_unresolved => {
                        return Err(MoldeError::InputUnresolved(path))
                    }
                    None => {
                        tracing::warn!("input '{path}' left unresolved, skipping its subtree");
                        self.input_stack.push(ActiveInput {
                            kind,
                            value: Value::Empty,
                        });
                        return Ok(VisitResult::SkipSubtree);
                    }
                }
            } else {
                let value = self.prompt_loop(node, state, kind, &path, default.as_deref(), &options, &patterns)?;
                let is_default = default
                    .as_deref()
                    .map(|d| value.canonical_eq(&Self::typed(kind, d)))
                    .unwrap_or(false);
                let vk = if is_default {
                    ValueKind::Default
                } else {
                    ValueKind::User
                };
                (value, vk)
            }
        };

        Self::validate(kind, &value, &patterns, &options, &path)?;
        state
            .context
            .put_value(parent, &key, value.clone(), value_kind)?;
        tracing::debug!("input '{path}' resolved to '{value}' ({value_kind:?})");
        let result = Self::traversal(kind, &value);
        self.input_stack.push(ActiveInput { kind, value });
        Ok(result)
    }

    fn typed(kind: PromptKind, text: &str) -> Value {
        match kind {
            PromptKind::Boolean => Value::Bool(parse_boolean(text, false).unwrap_or(false)),
            PromptKind::List => Value::List(Value::string(text).as_list()),
            PromptKind::Text | PromptKind::Enum => Value::string(text),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn prompt_loop(
        &mut self,
        node: NodeRef<'_>,
        state: &WalkState,
        kind: PromptKind,
        path: &str,
        default: Option<&str>,
        options: &[PromptOption],
        patterns: &[String],
    ) -> Result<Value> {
        let Mode::Interactive(prompter) = &mut self.mode else {
            unreachable!("prompt_loop is only reached in interactive mode");
        };
        let text = match node.node().attr_string("prompt") {
            Some(t) => Some(state.interpolate(&t)?),
            None => None,
        };
        let help = match node.node().attr_string("help") {
            Some(t) => Some(state.interpolate(&t)?),
            None => None,
        };
        let prompt = Prompt {
            path: path.to_string(),
            name: node.node().attr_string("name"),
            text,
            help,
            default: default.map(str::to_string),
            kind,
            options: options.to_vec(),
        };

        loop {
            let response = prompter.prompt(&prompt)?;
            let Some(value) = Self::parse_response(kind, &response, default, options) else {
                tracing::debug!("input '{path}': unparseable response '{response}'");
                continue;
            };
            match Self::validate(kind, &value, patterns, options, path) {
                Ok(()) => return Ok(value),
                Err(MoldeError::InputValidation { .. } | MoldeError::InvalidInput { .. }) => {
                    continue;
                }
                Err(other) => return Err(other),
            }
        }
    }

    fn visit_preset(&self, node: NodeRef<'_>, state: &mut WalkState, kind: ValueKind) -> Result<()> {
        let n = node.node();
        let path = n.attr_string("path").ok_or_else(|| MoldeError::ScriptParse {
            message: "preset or variable without 'path'".to_string(),
            path: node.script.path().to_path_buf(),
            location: n.location,
        })?;
        let raw = n
            .attr("value")
            .cloned()
            .unwrap_or_else(|| n.value.clone());
        // Text stays uninterpolated: `${…}` chains resolve lazily at
        // reference time, so forward references are fine.
        let value = match n.kind {
            Kind::PresetBoolean | Kind::VariableBoolean => {
                Value::Bool(parse_boolean(&raw.as_string(), true)?)
            }
            Kind::PresetList | Kind::VariableList => Value::List(raw.as_list()),
            _ => Value::String(raw.as_string()),
        };
        state
            .context
            .put_at_path(state.scope(), &path, value, kind)?;
        Ok(())
    }

    fn visit_validation(&mut self, node: NodeRef<'_>) -> Result<()> {
        let n = node.node();
        let id = n.attr_string("id").ok_or_else(|| MoldeError::ScriptParse {
            message: "validation without 'id'".to_string(),
            path: node.script.path().to_path_buf(),
            location: n.location,
        })?;
        let mut patterns = Vec::new();
        for child_id in &n.children {
            let child = node.script.node(*child_id);
            if child.kind == Kind::Regex {
                if let Value::String(pattern) = &child.value {
                    Regex::new(pattern).map_err(|e| MoldeError::ScriptParse {
                        message: format!("invalid regex '{pattern}': {e}"),
                        path: node.script.path().to_path_buf(),
                        location: child.location,
                    })?;
                    patterns.push(pattern.clone());
                }
            }
        }
        self.validations.insert(id, patterns);
        Ok(())
    }

    fn gate_option(&self, node: NodeRef<'_>) -> VisitResult {
        let Some(active) = self.input_stack.last() else {
            return VisitResult::Continue;
        };
        let Some(value) = node.node().attr_string("value") else {
            return VisitResult::SkipSubtree;
        };
        let selected = match active.kind {
            PromptKind::Enum => active.value.as_string().eq_ignore_ascii_case(&value),
            PromptKind::List => active
                .value
                .as_list()
                .iter()
                .any(|item| item.eq_ignore_ascii_case(&value)),
            _ => false,
        };
        if selected {
            VisitResult::Continue
        } else {
            VisitResult::SkipSubtree
        }
    }
}

impl NodeVisitor for InputResolver {
    fn visit(&mut self, node: NodeRef<'_>, state: &mut WalkState) -> Result<VisitResult> {
        match node.kind() {
            kind if kind.is_input() => self.resolve_input(node, state),
            Kind::InputOption => Ok(self.gate_option(node)),
            kind if kind.is_preset() => {
                self.visit_preset(node, state, ValueKind::Preset)?;
                Ok(VisitResult::SkipSubtree)
            }
            kind if kind.is_variable() => {
                self.visit_preset(node, state, ValueKind::LocalVar)?;
                Ok(VisitResult::SkipSubtree)
            }
            Kind::Validation => {
                self.visit_validation(node)?;
                Ok(VisitResult::SkipSubtree)
            }
            // Output subtrees belong to the second phase
            Kind::Output => Ok(VisitResult::SkipSubtree),
            _ => Ok(VisitResult::Continue),
        }
    }

    fn post_visit(&mut self, node: NodeRef<'_>, _state: &mut WalkState) -> Result<()> {
        if node.kind().is_input() {
            self.input_stack.pop();
        }
        Ok(())
    }
}

/// Output-phase gate over the resolved context.
///
/// Re-traversals (model building, output generation) compose this
/// visitor first: it skips input subtrees whose resolved value does not
/// enter them and option subtrees the value does not select, using the
/// same rules the resolver applied during the input phase.
#[derive(Default)]
pub struct ContextGate {
    input_stack: Vec<ActiveInput>,
}

impl ContextGate {
    /// Creates a gate over the resolved context.
    pub fn new() -> Self {
        Self::default()
    }
}

impl NodeVisitor for ContextGate {
    fn visit(&mut self, node: NodeRef<'_>, state: &mut WalkState) -> Result<VisitResult> {
        match node.kind() {
            kind if kind.is_input() => {
                let kind = InputResolver::prompt_kind(kind).expect("checked above");
                let scope = state.scope();
                let parent = state
                    .context
                    .parent_of(scope)
                    .expect("input scopes always have a parent");
                let key = node
                    .node()
                    .attr_string("id")
                    .expect("walker rejects inputs without an id");
                let path = state.context.value_path(parent, &key);
                let Some(value) = state.context.get_value(state.context.root(), &path)? else {
                    tracing::debug!("gate: no resolved value for '{path}', skipping");
                    self.input_stack.push(ActiveInput {
                        kind,
                        value: Value::Empty,
                    });
                    return Ok(VisitResult::SkipSubtree);
                };
                let result = InputResolver::traversal(kind, &value);
                self.input_stack.push(ActiveInput { kind, value });
                Ok(result)
            }
            Kind::InputOption => {
                let Some(active) = self.input_stack.last() else {
                    return Ok(VisitResult::Continue);
                };
                let Some(value) = node.node().attr_string("value") else {
                    return Ok(VisitResult::SkipSubtree);
                };
                let selected = match active.kind {
                    PromptKind::Enum => active.value.as_string().eq_ignore_ascii_case(&value),
                    PromptKind::List => active
                        .value
                        .as_list()
                        .iter()
                        .any(|item| item.eq_ignore_ascii_case(&value)),
                    _ => false,
                };
                Ok(if selected {
                    VisitResult::Continue
                } else {
                    VisitResult::SkipSubtree
                })
            }
            // Already consumed during the input phase
            kind if kind.is_preset() || kind.is_variable() => Ok(VisitResult::SkipSubtree),
            Kind::Validations => Ok(VisitResult::SkipSubtree),
            _ => Ok(VisitResult::Continue),
        }
    }

    fn post_visit(&mut self, node: NodeRef<'_>, _state: &mut WalkState) -> Result<()> {
        if node.kind().is_input() {
            self.input_stack.pop();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context;
    use crate::loader::{MemoryLoader, ScriptLoader};
    use crate::walker::Walker;
    use std::path::Path;

    fn run(
        source: &str,
        resolver: &mut InputResolver,
        presets: &[(&str, &str)],
    ) -> Result<Context> {
        let mut loader = MemoryLoader::new();
        loader.add_script("/a/main.xml", source)?;
        let script = loader.load(Path::new("/a/main.xml"))?;
        let mut context = Context::new();
        let root = context.root();
        for (path, value) in presets {
            context.put_at_path(root, path, Value::string(*value), ValueKind::External)?;
        }
        let mut walker = Walker::new(Box::new(loader));
        walker.add_visitor(resolver);
        let mut state = WalkState::new(context);
        walker.walk(script, &mut state)?;
        Ok(state.into_context())
    }

    const ENUM_SCRIPT: &str = r#"<archetype-script>
        <inputs>
            <enum id="theme" name="Theme" prompt="Pick a theme">
                <option value="dark"><presets><text path="accent">violet</text></presets></option>
                <option value="light"><presets><text path="accent">amber</text></presets></option>
            </enum>
        </inputs>
    </archetype-script>"#;

    #[test]
    fn external_preset_selects_option_subtree() {
        let mut resolver = InputResolver::batch();
        let ctx = run(ENUM_SCRIPT, &mut resolver, &[("theme", "light")]).unwrap();
        let root = ctx.root();
        assert_eq!(
            ctx.get_value(root, "theme").unwrap().unwrap().as_string(),
            "light"
        );
        // Only the selected option's subtree ran its presets
        assert_eq!(
            ctx.get_value(root, "accent").unwrap().unwrap().as_string(),
            "amber"
        );
    }

    #[test]
    fn optional_boolean_defaults_without_prompting() {
        let source = r#"<archetype-script><inputs>
            <boolean id="kotlin" default="false" optional="true"><step/></boolean>
        </inputs></archetype-script>"#;
        let mut resolver = InputResolver::batch();
        let ctx = run(source, &mut resolver, &[]).unwrap();
        let cv = ctx
            .get_context_value(ctx.root(), "kotlin")
            .unwrap()
            .unwrap()
            .clone();
        assert_eq!(cv.value, Value::Bool(false));
        assert_eq!(cv.kind, ValueKind::Default);
    }

    #[test]
    fn required_input_without_value_is_unresolved() {
        let source = r#"<archetype-script><inputs>
            <boolean id="kotlin" default="false" optional="false"/>
        </inputs></archetype-script>"#;
        let mut resolver = InputResolver::batch();
        let err = run(source, &mut resolver, &[]).unwrap_err();
        match err.root_cause() {
            MoldeError::InputUnresolved(path) => assert_eq!(path, "kotlin"),
            other => panic!("expected unresolved, got {other:?}"),
        }
    }

    #[test]
    fn empty_option_list_auto_resolves() {
        let source = r#"<archetype-script><inputs>
            <list id="features" optional="false"/>
        </inputs></archetype-script>"#;
        let mut resolver = InputResolver::batch();
        let ctx = run(source, &mut resolver, &[]).unwrap();
        assert_eq!(
            ctx.get_value(ctx.root(), "features").unwrap().unwrap(),
            Value::List(Vec::new())
        );
    }

    #[test]
    fn single_option_enum_equal_to_default_auto_resolves() {
        let source = r#"<archetype-script><inputs>
            <enum id="build" default="maven" optional="false">
                <option value="maven"/>
                <option value="gradle" if="false"/>
            </enum>
        </inputs></archetype-script>"#;
        // Interactive resolver with no scripted responses: a prompt would fail
        let mut resolver =
            InputResolver::interactive(Box::new(ScriptedPrompter::new(Vec::<String>::new())));
        let ctx = run(source, &mut resolver, &[]).unwrap();
        assert_eq!(
            ctx.get_value(ctx.root(), "build").unwrap().unwrap().as_string(),
            "maven"
        );
    }

    #[test]
    fn interactive_prompts_and_parses_indices() {
        let mut resolver = InputResolver::interactive(Box::new(ScriptedPrompter::new(["2"])));
        let ctx = run(ENUM_SCRIPT, &mut resolver, &[]).unwrap();
        assert_eq!(
            ctx.get_value(ctx.root(), "theme").unwrap().unwrap().as_string(),
            "light"
        );
    }

    #[test]
    fn interactive_reprompts_on_invalid_index() {
        let mut resolver =
            InputResolver::interactive(Box::new(ScriptedPrompter::new(["7", "oops", "1"])));
        let ctx = run(ENUM_SCRIPT, &mut resolver, &[]).unwrap();
        assert_eq!(
            ctx.get_value(ctx.root(), "theme").unwrap().unwrap().as_string(),
            "dark"
        );
    }

    #[test]
    fn list_input_parses_indices_and_none() {
        let source = r#"<archetype-script><inputs>
            <list id="features">
                <option value="docker"/>
                <option value="helm"/>
            </list>
            <list id="extras">
                <option value="ci"/>
            </list>
        </inputs></archetype-script>"#;
        let mut resolver =
            InputResolver::interactive(Box::new(ScriptedPrompter::new(["1 2", "none"])));
        let ctx = run(source, &mut resolver, &[]).unwrap();
        assert_eq!(
            ctx.get_value(ctx.root(), "features").unwrap().unwrap(),
            Value::list(["docker", "helm"])
        );
        assert_eq!(
            ctx.get_value(ctx.root(), "extras").unwrap().unwrap(),
            Value::List(Vec::new())
        );
    }

    #[test]
    fn text_validation_failures_list_every_pattern() {
        let source = r#"<archetype-script>
            <validations>
                <validation id="ident">
                    <regex>^[a-z]+$</regex>
                    <regex>^.{3,}$</regex>
                </validation>
            </validations>
            <inputs>
                <text id="name" validations="ident"/>
            </inputs>
        </archetype-script>"#;
        let mut resolver = InputResolver::batch();
        let err = run(source, &mut resolver, &[("name", "X1")]).unwrap_err();
        match err.root_cause() {
            MoldeError::InputValidation { failures, .. } => assert_eq!(failures.len(), 2),
            other => panic!("expected validation failure, got {other:?}"),
        }
    }

    #[test]
    fn enum_preset_outside_options_is_invalid() {
        let mut resolver = InputResolver::batch();
        let err = run(ENUM_SCRIPT, &mut resolver, &[("theme", "sepia")]).unwrap_err();
        assert!(matches!(
            err.root_cause(),
            MoldeError::InvalidInput { .. }
        ));
    }

    #[test]
    fn variables_overwrite_presets_do_not() {
        let source = r#"<archetype-script>
            <variables><text path="greeting">hello</text></variables>
            <variables><text path="greeting">hola</text></variables>
            <presets><text path="fixed">one</text></presets>
            <presets><text path="fixed">two</text></presets>
        </archetype-script>"#;
        let mut resolver = InputResolver::batch();
        let err = run(source, &mut resolver, &[]).unwrap_err();
        assert!(matches!(err.root_cause(), MoldeError::ScopeConflict(_)));

        let source_ok = r#"<archetype-script>
            <variables><text path="greeting">hello</text></variables>
            <variables><text path="greeting">hola</text></variables>
        </archetype-script>"#;
        let mut resolver = InputResolver::batch();
        let ctx = run(source_ok, &mut resolver, &[]).unwrap();
        assert_eq!(
            ctx.get_value(ctx.root(), "greeting").unwrap().unwrap().as_string(),
            "hola"
        );
    }

    #[test]
    fn boolean_input_gates_subtree() {
        let source = r#"<archetype-script><inputs>
            <boolean id="docs" optional="true" default="false">
                <presets><text path="docs.format">asciidoc</text></presets>
            </boolean>
        </inputs></archetype-script>"#;
        let mut resolver = InputResolver::batch();
        let ctx = run(source, &mut resolver, &[]).unwrap();
        // Subtree skipped: the nested preset never ran
        assert_eq!(ctx.get_value(ctx.root(), "docs.format").unwrap(), None);

        let mut resolver = InputResolver::batch();
        let ctx = run(source, &mut resolver, &[("docs", "yes")]).unwrap();
        assert_eq!(
            ctx.get_value(ctx.root(), "docs.format")
                .unwrap()
                .unwrap()
                .as_string(),
            "asciidoc"
        );
    }

    #[test]
    fn global_input_values_visible_at_root() {
        let source = r#"<archetype-script><inputs>
            <enum id="flavor" global="true" default="se">
                <option value="se"><inputs>
                    <text id="pkg" default="com.example"/>
                </inputs></option>
            </enum>
        </inputs></archetype-script>"#;
        let mut resolver = InputResolver::batch()
            .skip_optional(true);
        let ctx = run(source, &mut resolver, &[("flavor", "se"), ("pkg", "io.demo")]).unwrap();
        // pkg lives inside the global flavor scope but resolves bare
        assert_eq!(
            ctx.get_value(ctx.root(), "pkg").unwrap().unwrap().as_string(),
            "io.demo"
        );
    }
}
