// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Template engines.
//!
//! The output generator renders `<template>`/`<templates>` directives
//! through an engine looked up by name in the [`EngineRegistry`]. The
//! contract is [`TemplateEngine::render_str`]: template text in, merged
//! model (plus an optional extra scope) as data, rendered text out.
//! [`TemplateEngine::render`] adapts the contract to readers and writers
//! for file-to-file rendering.
//!
//! The built-in `mustache` engine supports variables (`{{path}}`,
//! `{{.}}`), sections (`{{#key}}…{{/key}}`) over lists and truthy
//! values, and inverted sections (`{{^key}}…{{/key}}`). External engines
//! register through [`EngineRegistry::register`].

use crate::error::{MoldeError, Result};
use crate::model::{MergedModel, ModelNode};
use std::collections::HashMap;
use std::io::{Read, Write};

/// A named template engine.
pub trait TemplateEngine: Send + Sync {
    /// The registry name of this engine.
    fn name(&self) -> &str;

    /// Renders template text against the merged model. The extra scope,
    /// when present, shadows the main scope.
    fn render_str(
        &self,
        template: &str,
        scope: &MergedModel,
        extra: Option<&MergedModel>,
    ) -> Result<String>;

    /// Streams a rendered template: reads all input (UTF-8), renders,
    /// writes the result.
    fn render(
        &self,
        input: &mut dyn Read,
        name: &str,
        output: &mut dyn Write,
        scope: &MergedModel,
        extra: Option<&MergedModel>,
    ) -> Result<()> {
        let mut template = String::new();
        input.read_to_string(&mut template)?;
        let rendered = self.render_str(&template, scope, extra).map_err(|e| {
            match e {
                MoldeError::Render { engine, message } => MoldeError::Render {
                    engine,
                    message: format!("{name}: {message}"),
                },
                other => other,
            }
        })?;
        output.write_all(rendered.as_bytes())?;
        Ok(())
    }

    /// Creates a boxed clone (for use in closures).
    fn clone_box(&self) -> Box<dyn TemplateEngine>;
}

impl Clone for Box<dyn TemplateEngine> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// Engines discoverable by name.
pub struct EngineRegistry {
    engines: HashMap<String, Box<dyn TemplateEngine>>,
}

impl Default for EngineRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl EngineRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self {
            engines: HashMap::new(),
        }
    }

    /// A registry holding the built-in `mustache` engine.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(MustacheEngine));
        registry
    }

    /// Registers an engine under its own name.
    pub fn register(&mut self, engine: Box<dyn TemplateEngine>) {
        self.engines.insert(engine.name().to_string(), engine);
    }

    /// Looks up an engine; unknown names are a render error.
    pub fn get(&self, name: &str) -> Result<&dyn TemplateEngine> {
        self.engines
            .get(name)
            .map(|e| e.as_ref())
            .ok_or_else(|| MoldeError::Render {
                engine: name.to_string(),
                message: "unknown template engine".to_string(),
            })
    }

    /// Resolves deferred model values: every value carrying a `template`
    /// attribute renders through its named engine, with the whole model
    /// as scope.
    pub fn finalize_model(&self, model: &MergedModel) -> Result<MergedModel> {
        let mut finalized = model.clone();
        self.finalize_node(finalized.root_mut(), model)?;
        Ok(finalized)
    }

    fn finalize_node(&self, node: &mut ModelNode, scope: &MergedModel) -> Result<()> {
        match node {
            ModelNode::Value {
                content, template, ..
            } => {
                if let Some(engine) = template.take() {
                    *content = self.get(&engine)?.render_str(content, scope, None)?;
                }
                Ok(())
            }
            ModelNode::List { items, .. } => {
                for item in items {
                    self.finalize_node(item, scope)?;
                }
                Ok(())
            }
            ModelNode::Map { entries, .. } => {
                for value in entries.values_mut() {
                    self.finalize_node(value, scope)?;
                }
                Ok(())
            }
        }
    }
}

/// The built-in minimal mustache renderer.
#[derive(Debug, Clone, Default)]
pub struct MustacheEngine;

impl TemplateEngine for MustacheEngine {
    fn name(&self) -> &str {
        "mustache"
    }

    fn render_str(
        &self,
        template: &str,
        scope: &MergedModel,
        extra: Option<&MergedModel>,
    ) -> Result<String> {
        let mut scopes = vec![scope.to_json()];
        if let Some(extra) = extra {
            scopes.push(extra.to_json());
        }
        render_section(template, &scopes).map_err(|message| MoldeError::Render {
            engine: "mustache".to_string(),
            message,
        })
    }

    fn clone_box(&self) -> Box<dyn TemplateEngine> {
        Box::new(self.clone())
    }
}

type RenderResult<T> = std::result::Result<T, String>;

fn render_section(template: &str, scopes: &[serde_json::Value]) -> RenderResult<String> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find("{{") {
        out.push_str(&rest[..open]);
        let after = &rest[open + 2..];
        let close = after
            .find("}}")
            .ok_or_else(|| "unterminated '{{' tag".to_string())?;
        let tag = after[..close].trim();
        rest = &after[close + 2..];

        if tag.starts_with('#') || tag.starts_with('^') {
            let inverted = tag.starts_with('^');
            let name = tag[1..].trim();
            let (body, remainder) = section_body(rest, name)?;
            let value = lookup(name, scopes);
            let truthy = is_truthy(value.as_ref());
            match (inverted, truthy) {
                (false, true) => match value {
                    Some(serde_json::Value::Array(items)) => {
                        for item in items {
                            let mut inner = scopes.to_vec();
                            inner.push(item);
                            out.push_str(&render_section(body, &inner)?);
                        }
                    }
                    Some(other) => {
                        let mut inner = scopes.to_vec();
                        inner.push(other);
                        out.push_str(&render_section(body, &inner)?);
                    }
                    None => {}
                },
                (true, false) => out.push_str(&render_section(body, scopes)?),
                _ => {}
            }
            rest = remainder;
        } else if tag.starts_with('/') {
            return Err(format!("unexpected closing tag '{{{{{tag}}}}}'"));
        } else if let Some(value) = lookup(tag, scopes) {
            out.push_str(&scalar_text(&value));
        }
    }
    out.push_str(rest);
    Ok(out)
}

/// Splits `rest` at the closing tag of `name`, honoring nested sections
/// of the same name.
fn section_body<'a>(rest: &'a str, name: &str) -> RenderResult<(&'a str, &'a str)> {
    let open_a = format!("{{{{#{name}}}}}");
    let open_b = format!("{{{{^{name}}}}}");
    let close = format!("{{{{/{name}}}}}");
    let mut depth = 1usize;
    let mut offset = 0usize;
    while depth > 0 {
        let next_close = rest[offset..]
            .find(&close)
            .ok_or_else(|| format!("missing closing tag for section '{name}'"))?;
        let segment = &rest[offset..offset + next_close];
        depth += segment.matches(&open_a).count() + segment.matches(&open_b).count();
        depth -= 1;
        offset += next_close + close.len();
    }
    Ok((&rest[..offset - close.len()], &rest[offset..]))
}

fn lookup(path: &str, scopes: &[serde_json::Value]) -> Option<serde_json::Value> {
    if path == "." {
        return scopes.last().cloned();
    }
    for scope in scopes.iter().rev() {
        let mut cursor = scope;
        let mut found = true;
        for segment in path.split('.') {
            match cursor.get(segment) {
                Some(next) => cursor = next,
                None => {
                    found = false;
                    break;
                }
            }
        }
        if found {
            return Some(cursor.clone());
        }
    }
    None
}

fn is_truthy(value: Option<&serde_json::Value>) -> bool {
    match value {
        None | Some(serde_json::Value::Null) => false,
        Some(serde_json::Value::Bool(b)) => *b,
        Some(serde_json::Value::String(s)) => !s.is_empty() && s != "false",
        Some(serde_json::Value::Array(items)) => !items.is_empty(),
        Some(_) => true,
    }
}

fn scalar_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context;
    use crate::loader::{MemoryLoader, ScriptLoader};
    use crate::model::ModelResolver;
    use crate::walker::{WalkState, Walker};
    use std::path::Path;

    fn model_from(source: &str) -> MergedModel {
        let mut loader = MemoryLoader::new();
        loader.add_script("/a/main.xml", source).unwrap();
        let script = loader.load(Path::new("/a/main.xml")).unwrap();
        let mut resolver = ModelResolver::new();
        let mut walker = Walker::new(Box::new(loader));
        walker.add_visitor(&mut resolver);
        let mut state = WalkState::new(Context::new());
        walker.walk(script, &mut state).unwrap();
        resolver.into_model()
    }

    #[test]
    fn variables_and_dotted_paths() {
        let model = model_from(
            r#"<archetype-script><output><model>
                <map key="project"><value key="name">demo</value></map>
            </model></output></archetype-script>"#,
        );
        let engine = MustacheEngine;
        let out = engine
            .render_str("name: {{project.name}}!", &model, None)
            .unwrap();
        assert_eq!(out, "name: demo!");
        // Unknown variables render empty
        let out = engine.render_str("[{{missing}}]", &model, None).unwrap();
        assert_eq!(out, "[]");
    }

    #[test]
    fn sections_iterate_lists() {
        let model = model_from(
            r#"<archetype-script><output><model>
                <list key="deps"><value>serde</value><value>regex</value></list>
            </model></output></archetype-script>"#,
        );
        let engine = MustacheEngine;
        let out = engine
            .render_str("{{#deps}}- {{.}}\n{{/deps}}", &model, None)
            .unwrap();
        assert_eq!(out, "- serde\n- regex\n");
    }

    #[test]
    fn inverted_sections_render_when_absent() {
        let model = MergedModel::empty();
        let engine = MustacheEngine;
        let out = engine
            .render_str("{{^deps}}none{{/deps}}", &model, None)
            .unwrap();
        assert_eq!(out, "none");
    }

    #[test]
    fn extra_scope_shadows_main() {
        let main = model_from(
            r#"<archetype-script><output><model>
                <value key="name">main</value>
            </model></output></archetype-script>"#,
        );
        let extra = model_from(
            r#"<archetype-script><output><model>
                <value key="name">extra</value>
            </model></output></archetype-script>"#,
        );
        let engine = MustacheEngine;
        let out = engine.render_str("{{name}}", &main, Some(&extra)).unwrap();
        assert_eq!(out, "extra");
    }

    #[test]
    fn unterminated_tags_error() {
        let engine = MustacheEngine;
        assert!(engine
            .render_str("{{oops", &MergedModel::empty(), None)
            .is_err());
        assert!(engine
            .render_str("{{#s}}no close", &MergedModel::empty(), None)
            .is_err());
    }

    #[test]
    fn registry_finalizes_deferred_values() {
        let model = model_from(
            r#"<archetype-script><output><model>
                <value key="name">demo</value>
                <value key="banner" template="mustache">hello {{name}}</value>
            </model></output></archetype-script>"#,
        );
        let registry = EngineRegistry::with_defaults();
        let finalized = registry.finalize_model(&model).unwrap();
        assert_eq!(finalized.value_of("banner").unwrap(), "hello demo");
        // Unknown engines surface as render errors
        assert!(matches!(
            registry.get("handlebars"),
            Err(MoldeError::Render { .. })
        ));
    }
}
