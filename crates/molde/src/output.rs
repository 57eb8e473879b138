// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Output generation.
//!
//! The [`OutputGenerator`] walks `<output>` subtrees after input
//! resolution and materializes the project directory:
//!
//! - `<file>` copies one file, creating parent directories and replacing
//!   existing targets
//! - `<files>` scans a directory through include/exclude glob sets and
//!   copies every match, rewriting relative paths through the listed
//!   transformations
//! - `<template>`/`<templates>` do the same but render through a named
//!   engine against the merged model
//! - `<transformation>` registers regex/replacement pipelines by id;
//!   replacements interpolate against the context at apply time

use crate::ast::Kind;
use crate::error::{MoldeError, Result};
use crate::model::{MergedModel, ModelResolver};
use crate::template::EngineRegistry;
use crate::value::Value;
use crate::walker::{NodeRef, NodeVisitor, VisitResult, WalkState};
use globset::{Glob, GlobSet, GlobSetBuilder};
use regex::Regex;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Default engine for render directives without an `engine` attribute.
const DEFAULT_ENGINE: &str = "mustache";

struct ReplaceRule {
    regex: Regex,
    replacement: String,
}

/// The output-phase visitor that writes the generated project.
pub struct OutputGenerator<'r> {
    output_dir: PathBuf,
    model: MergedModel,
    registry: &'r EngineRegistry,
    transformations: HashMap<String, Vec<ReplaceRule>>,
}

impl<'r> OutputGenerator<'r> {
    /// Creates a generator writing into `output_dir`.
    pub fn new(output_dir: PathBuf, model: MergedModel, registry: &'r EngineRegistry) -> Self {
        Self {
            output_dir,
            model,
            registry,
            transformations: HashMap::new(),
        }
    }

    fn register_transformation(&mut self, node: NodeRef<'_>) -> Result<()> {
        let n = node.node();
        let id = n.attr_string("id").ok_or_else(|| MoldeError::ScriptParse {
            message: "transformation without 'id'".to_string(),
            path: node.script.path().to_path_buf(),
            location: n.location,
        })?;
        let mut rules = Vec::new();
        for child_id in &n.children {
            let child = node.script.node(*child_id);
            if child.kind != Kind::Replace {
                continue;
            }
            let pattern = child.attr_string("regex").ok_or_else(|| {
                MoldeError::ScriptParse {
                    message: "replace without 'regex'".to_string(),
                    path: node.script.path().to_path_buf(),
                    location: child.location,
                }
            })?;
            let regex = Regex::new(&pattern).map_err(|e| MoldeError::ScriptParse {
                message: format!("invalid replace regex '{pattern}': {e}"),
                path: node.script.path().to_path_buf(),
                location: child.location,
            })?;
            let replacement = child.attr_string("replacement").unwrap_or_default();
            rules.push(ReplaceRule { regex, replacement });
        }
        tracing::debug!("registered transformation '{id}' ({} rules)", rules.len());
        self.transformations.insert(id, rules);
        Ok(())
    }

    /// Applies the listed transformations to a relative path, in
    /// declaration order; replacements interpolate against the context.
    fn transform(&self, relative: &str, ids: &str, state: &WalkState) -> Result<String> {
        let mut path = relative.to_string();
        for id in ids.split([' ', ',']).filter(|s| !s.is_empty()) {
            let rules = self.transformations.get(id).ok_or_else(|| {
                MoldeError::InvalidInput {
                    path: id.to_string(),
                    message: "unknown transformation".to_string(),
                }
            })?;
            for rule in rules {
                let replacement = state.interpolate(&rule.replacement)?;
                path = rule.regex.replace_all(&path, replacement.as_str()).into_owned();
            }
        }
        Ok(path)
    }

    fn copy_file(&self, node: NodeRef<'_>, state: &WalkState) -> Result<()> {
        let source = self.required_attr(node, "source")?;
        let target = self.required_attr(node, "target")?;
        let source = state.cwd().join(state.interpolate(&source)?);
        let target = self.output_dir.join(state.interpolate(&target)?);
        tracing::debug!("copy {} -> {}", source.display(), target.display());
        copy_creating_dirs(&source, &target)
    }

    fn render_template(&self, node: NodeRef<'_>, state: &WalkState) -> Result<()> {
        let source = self.required_attr(node, "source")?;
        let target = self.required_attr(node, "target")?;
        let engine_name = node
            .node()
            .attr_string("engine")
            .unwrap_or_else(|| DEFAULT_ENGINE.to_string());
        let extra = self.extra_scope(node, state)?;
        let source = state.cwd().join(state.interpolate(&source)?);
        let target = self.output_dir.join(state.interpolate(&target)?);
        self.render_file(&source, &target, &engine_name, extra.as_ref())
    }

    /// The extra scope of a render directive: its nested `<model>`.
    fn extra_scope(&self, node: NodeRef<'_>, state: &WalkState) -> Result<Option<MergedModel>> {
        for child_id in &node.node().children {
            let child = NodeRef {
                script: node.script,
                id: *child_id,
            };
            if child.kind() == Kind::Model {
                return ModelResolver::build_model(child, state).map(Some);
            }
        }
        Ok(None)
    }

    fn render_file(
        &self,
        source: &Path,
        target: &Path,
        engine_name: &str,
        extra: Option<&MergedModel>,
    ) -> Result<()> {
        let engine = self.registry.get(engine_name)?;
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        let name = source
            .file_name()
            .map(|f| f.to_string_lossy().into_owned())
            .unwrap_or_default();
        tracing::debug!("render {} -> {}", source.display(), target.display());
        let mut input = fs::File::open(source)?;
        let mut output = fs::File::create(target)?;
        engine.render(&mut input, &name, &mut output, &self.model, extra)
    }

    fn scan_directory(
        &self,
        node: NodeRef<'_>,
        state: &WalkState,
        render: bool,
    ) -> Result<()> {
        let n = node.node();
        let directory = self.required_attr(node, "directory")?;
        let directory = state.cwd().join(state.interpolate(&directory)?);
        let target_prefix = match n.attr_string("target") {
            Some(t) => PathBuf::from(state.interpolate(&t)?),
            None => PathBuf::new(),
        };
        let transformations = n.attr_string("transformations").unwrap_or_default();
        let engine_name = n
            .attr_string("engine")
            .unwrap_or_else(|| DEFAULT_ENGINE.to_string());

        let includes = self.glob_set(node, state, Kind::Includes, Kind::Include)?;
        let excludes = self.glob_set(node, state, Kind::Excludes, Kind::Exclude)?;

        for entry in WalkDir::new(&directory).sort_by_file_name() {
            let entry = entry.map_err(|e| {
                MoldeError::Io(io::Error::other(format!(
                    "scanning {}: {e}",
                    directory.display()
                )))
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let relative = entry
                .path()
                .strip_prefix(&directory)
                .expect("walkdir stays under its root");
            let relative_str = relative.to_string_lossy().replace('\\', "/");
            if let Some(includes) = &includes {
                if !includes.is_match(&relative_str) {
                    continue;
                }
            }
            if let Some(excludes) = &excludes {
                if excludes.is_match(&relative_str) {
                    continue;
                }
            }
            let mapped = self.transform(&relative_str, &transformations, state)?;
            let target = self.output_dir.join(target_prefix.join(mapped));
            if render {
                self.render_file(entry.path(), &target, &engine_name, None)?;
            } else {
                copy_creating_dirs(entry.path(), &target)?;
            }
        }
        Ok(())
    }

    /// Collects glob patterns from an `<includes>`/`<excludes>` child.
    fn glob_set(
        &self,
        node: NodeRef<'_>,
        state: &WalkState,
        container: Kind,
        item: Kind,
    ) -> Result<Option<GlobSet>> {
        let mut builder = GlobSetBuilder::new();
        let mut any = false;
        for child_id in &node.node().children {
            let child = node.script.node(*child_id);
            if child.kind != container {
                continue;
            }
            for pattern_id in &child.children {
                let pattern_node = node.script.node(*pattern_id);
                if pattern_node.kind != item {
                    continue;
                }
                let pattern = match &pattern_node.value {
                    Value::Empty => continue,
                    other => state.interpolate(&other.as_string())?,
                };
                let glob = Glob::new(&pattern).map_err(|e| MoldeError::ScriptParse {
                    message: format!("invalid glob '{pattern}': {e}"),
                    path: node.script.path().to_path_buf(),
                    location: pattern_node.location,
                })?;
                builder.add(glob);
                any = true;
            }
        }
        if !any {
            return Ok(None);
        }
        let set = builder.build().map_err(|e| MoldeError::ScriptParse {
            message: format!("invalid glob set: {e}"),
            path: node.script.path().to_path_buf(),
            location: node.node().location,
        })?;
        Ok(Some(set))
    }

    fn required_attr(&self, node: NodeRef<'_>, name: &str) -> Result<String> {
        node.node()
            .attr_string(name)
            .ok_or_else(|| MoldeError::ScriptParse {
                message: format!("'{}' without '{name}'", element(node.kind())),
                path: node.script.path().to_path_buf(),
                location: node.node().location,
            })
    }
}

fn element(kind: Kind) -> &'static str {
    match kind {
        Kind::OutputFile => "file",
        Kind::OutputFiles => "files",
        Kind::OutputTemplate => "template",
        Kind::OutputTemplates => "templates",
        _ => "output directive",
    }
}

fn copy_creating_dirs(source: &Path, target: &Path) -> Result<()> {
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::copy(source, target)?;
    Ok(())
}

impl<'r> NodeVisitor for OutputGenerator<'r> {
    fn visit(&mut self, node: NodeRef<'_>, state: &mut WalkState) -> Result<VisitResult> {
        match node.kind() {
            Kind::Transformation => {
                self.register_transformation(node)?;
                Ok(VisitResult::SkipSubtree)
            }
            Kind::OutputFile => {
                self.copy_file(node, state)?;
                Ok(VisitResult::SkipSubtree)
            }
            Kind::OutputFiles => {
                self.scan_directory(node, state, false)?;
                Ok(VisitResult::SkipSubtree)
            }
            Kind::OutputTemplate => {
                self.render_template(node, state)?;
                Ok(VisitResult::SkipSubtree)
            }
            Kind::OutputTemplates => {
                self.scan_directory(node, state, true)?;
                Ok(VisitResult::SkipSubtree)
            }
            // Models were accumulated by the model pass
            Kind::Model => Ok(VisitResult::SkipSubtree),
            _ => Ok(VisitResult::Continue),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context;
    use crate::loader::{FileSystemLoader, ScriptLoader};
    use crate::walker::{WalkState, Walker};
    use tempfile::TempDir;

    fn generate(script_dir: &TempDir, script: &str, model: MergedModel) -> TempDir {
        let script_path = script_dir.path().join("main.xml");
        fs::write(&script_path, script).unwrap();
        let output = TempDir::new().unwrap();

        let loader = FileSystemLoader::default();
        let parsed = loader.load(&script_path).unwrap();
        let registry = EngineRegistry::with_defaults();
        let mut generator = OutputGenerator::new(output.path().to_path_buf(), model, &registry);
        let mut walker = Walker::new(Box::new(loader));
        walker.add_visitor(&mut generator);
        let mut state = WalkState::new(Context::new());
        walker.walk(parsed, &mut state).unwrap();
        output
    }

    #[test]
    fn file_copies_and_replaces() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("dark.css"), "body { background: #000 }").unwrap();
        let output = generate(
            &dir,
            r#"<archetype-script><output>
                <file source="dark.css" target="styles/dark.css"/>
            </output></archetype-script>"#,
            MergedModel::empty(),
        );
        let copied = output.path().join("styles/dark.css");
        assert_eq!(
            fs::read_to_string(copied).unwrap(),
            "body { background: #000 }"
        );
    }

    #[test]
    fn files_scans_with_globs_and_transformations() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("skeleton");
        fs::create_dir_all(src.join("src")).unwrap();
        fs::write(src.join("src/Main.java"), "class Main {}").unwrap();
        fs::write(src.join("src/Ignore.txt"), "nope").unwrap();
        fs::write(src.join("README.md"), "# readme").unwrap();

        let output = generate(
            &dir,
            r#"<archetype-script><output>
                <transformation id="packaged">
                    <replace regex="^src/" replacement="src/main/java/"/>
                </transformation>
                <files directory="skeleton" transformations="packaged">
                    <includes>
                        <include>**/*.java</include>
                        <include>*.md</include>
                    </includes>
                    <excludes>
                        <exclude>**/*.txt</exclude>
                    </excludes>
                </files>
            </output></archetype-script>"#,
            MergedModel::empty(),
        );
        assert!(output.path().join("src/main/java/Main.java").exists());
        assert!(output.path().join("README.md").exists());
        assert!(!output.path().join("src/Ignore.txt").exists());
        assert!(!output.path().join("src/main/java/Ignore.txt").exists());
    }

    #[test]
    fn template_renders_against_model() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("pom.xml.mustache"), "<groupId>{{groupId}}</groupId>").unwrap();

        let mut loader = crate::loader::MemoryLoader::new();
        loader
            .add_script(
                "/virtual/model.xml",
                r#"<archetype-script><output><model>
                    <value key="groupId">com.example</value>
                </model></output></archetype-script>"#,
            )
            .unwrap();
        let model_script = loader.load(Path::new("/virtual/model.xml")).unwrap();
        let mut resolver = ModelResolver::new();
        let mut walker = Walker::new(Box::new(loader));
        walker.add_visitor(&mut resolver);
        let mut state = WalkState::new(Context::new());
        walker.walk(model_script, &mut state).unwrap();
        let model = resolver.into_model();

        let output = generate(
            &dir,
            r#"<archetype-script><output>
                <template engine="mustache" source="pom.xml.mustache" target="pom.xml"/>
            </output></archetype-script>"#,
            model,
        );
        assert_eq!(
            fs::read_to_string(output.path().join("pom.xml")).unwrap(),
            "<groupId>com.example</groupId>"
        );
    }

    #[test]
    fn templates_render_every_match() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("tpl");
        fs::create_dir_all(&src).unwrap();
        fs::write(src.join("a.txt"), "A={{x}}").unwrap();
        fs::write(src.join("b.txt"), "B={{x}}").unwrap();

        let mut model = ModelResolver::new();
        let merged = {
            let mut loader = crate::loader::MemoryLoader::new();
            loader
                .add_script(
                    "/v/m.xml",
                    r#"<archetype-script><output><model><value key="x">1</value></model></output></archetype-script>"#,
                )
                .unwrap();
            let s = loader.load(Path::new("/v/m.xml")).unwrap();
            let mut walker = Walker::new(Box::new(loader));
            walker.add_visitor(&mut model);
            let mut state = WalkState::new(Context::new());
            walker.walk(s, &mut state).unwrap();
            model.into_model()
        };

        let output = generate(
            &dir,
            r#"<archetype-script><output>
                <templates directory="tpl" engine="mustache"/>
            </output></archetype-script>"#,
            merged,
        );
        assert_eq!(fs::read_to_string(output.path().join("a.txt")).unwrap(), "A=1");
        assert_eq!(fs::read_to_string(output.path().join("b.txt")).unwrap(), "B=1");
    }

    #[test]
    fn replacement_interpolates_against_context() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("skeleton");
        fs::create_dir_all(&src).unwrap();
        fs::write(src.join("app.txt"), "x").unwrap();

        let script_path = dir.path().join("main.xml");
        fs::write(
            &script_path,
            r#"<archetype-script><output>
                <transformation id="named">
                    <replace regex="app" replacement="${project.name}"/>
                </transformation>
                <files directory="skeleton" transformations="named"/>
            </output></archetype-script>"#,
        )
        .unwrap();
        let output = TempDir::new().unwrap();

        let loader = FileSystemLoader::default();
        let parsed = loader.load(&script_path).unwrap();
        let registry = EngineRegistry::with_defaults();
        let mut generator =
            OutputGenerator::new(output.path().to_path_buf(), MergedModel::empty(), &registry);
        let mut context = Context::new();
        let root = context.root();
        context
            .put_at_path(
                root,
                "project.name",
                Value::string("demo"),
                crate::context::ValueKind::External,
            )
            .unwrap();
        let mut walker = Walker::new(Box::new(loader));
        walker.add_visitor(&mut generator);
        let mut state = WalkState::new(context);
        walker.walk(parsed, &mut state).unwrap();

        assert!(output.path().join("demo.txt").exists());
    }
}
