// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! The archetype engine facade.
//!
//! [`ArchetypeEngine`] drives a complete generation in two phases over
//! one context:
//!
//! 1. **Input phase**: walk the entry script with the
//!    [`InputResolver`](crate::input::InputResolver), landing preset and
//!    variable writes and resolving every declared input. `current.date`
//!    is seeded before this walk; `project.directory` is seeded as soon
//!    as `project.name` lands in the context.
//! 2. **Output phase**: re-walk the resolved tree behind a
//!    [`ContextGate`](crate::input::ContextGate) to accumulate the
//!    merged model, then once more to run the
//!    [`OutputGenerator`](crate::output::OutputGenerator) into the
//!    project directory.
//!
//! # Example
//!
//! ```rust,ignore
//! use molde::{ArchetypeEngine, FileSystemLoader};
//!
//! let mut engine = ArchetypeEngine::new("archetype/main.xml")
//!     .with_presets([("theme".to_string(), "dark".to_string())])
//!     .skip_optional(true);
//! let project = engine.generate(|name| std::path::PathBuf::from(name))?;
//! ```

use crate::context::{Context, ValueKind};
use crate::error::Result;
use crate::input::{ContextGate, InputResolver, Prompter};
use crate::loader::{FileSystemLoader, ScriptLoader};
use crate::model::ModelResolver;
use crate::output::OutputGenerator;
use crate::template::{EngineRegistry, TemplateEngine};
use crate::value::Value;
use crate::walker::{NodeVisitor, WalkState, Walker};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Context path of the generation timestamp seed.
pub const CURRENT_DATE: &str = "current.date";
/// Context path of the resolved project name.
pub const PROJECT_NAME: &str = "project.name";
/// Context path of the generated project directory.
pub const PROJECT_DIRECTORY: &str = "project.directory";

/// Drives archetype generation end to end.
pub struct ArchetypeEngine {
    script_path: PathBuf,
    loader: Box<dyn ScriptLoader>,
    presets: HashMap<String, String>,
    defaults: HashMap<String, String>,
    skip_optional: bool,
    fail_on_unresolved: bool,
    prompter: Option<Box<dyn Prompter>>,
    additional_visitors: Vec<Box<dyn NodeVisitor>>,
    registry: EngineRegistry,
}

impl ArchetypeEngine {
    /// Creates an engine for the script at `script_path`, loading
    /// scripts from the filesystem.
    pub fn new(script_path: impl AsRef<Path>) -> Self {
        Self::with_loader(script_path, Box::new(FileSystemLoader::default()))
    }

    /// Creates an engine with a custom script loader.
    pub fn with_loader(script_path: impl AsRef<Path>, loader: Box<dyn ScriptLoader>) -> Self {
        Self {
            script_path: script_path.as_ref().to_path_buf(),
            loader,
            presets: HashMap::new(),
            defaults: HashMap::new(),
            skip_optional: false,
            fail_on_unresolved: true,
            prompter: None,
            additional_visitors: Vec::new(),
            registry: EngineRegistry::with_defaults(),
        }
    }

    /// Supplies external values, keyed by effective context path. They
    /// land as read-only EXTERNAL entries before the input phase.
    pub fn with_presets<I>(mut self, presets: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        self.presets.extend(presets);
        self
    }

    /// Supplies external defaults, keyed by effective input path.
    pub fn with_defaults<I>(mut self, defaults: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        self.defaults.extend(defaults);
        self
    }

    /// Resolve optional inputs from their defaults without prompting.
    pub fn skip_optional(mut self, skip: bool) -> Self {
        self.skip_optional = skip;
        self
    }

    /// When false, unresolvable required inputs skip their subtree
    /// instead of failing the generation.
    pub fn fail_on_unresolved(mut self, fail: bool) -> Self {
        self.fail_on_unresolved = fail;
        self
    }

    /// Enables interactive resolution through `prompter`. Without one,
    /// the engine resolves in batch mode.
    pub fn with_prompter(mut self, prompter: Box<dyn Prompter>) -> Self {
        self.prompter = Some(prompter);
        self
    }

    /// Registers an extra visitor for the input phase.
    pub fn with_visitor(mut self, visitor: Box<dyn NodeVisitor>) -> Self {
        self.additional_visitors.push(visitor);
        self
    }

    /// Registers an additional template engine.
    pub fn with_engine(mut self, engine: Box<dyn TemplateEngine>) -> Self {
        self.registry.register(engine);
        self
    }

    /// Runs both phases and returns the generated project directory.
    ///
    /// `project_dir` maps the resolved project name to the directory to
    /// generate into; it is consulted as soon as `project.name` is
    /// known (with an empty name if the archetype never resolves one).
    pub fn generate<F>(&mut self, project_dir: F) -> Result<PathBuf>
    where
        F: Fn(&str) -> PathBuf,
    {
        let script = self.loader.load(&self.script_path)?;

        let mut context = Context::new();
        let root = context.root();
        let stamp = chrono::Local::now()
            .format("%a %b %d %H:%M:%S %Z %Y")
            .to_string();
        context.put_at_path(root, CURRENT_DATE, Value::string(stamp), ValueKind::External)?;
        for (path, value) in &self.presets {
            context.put_at_path(root, path, Value::string(value.clone()), ValueKind::External)?;
        }

        // Input phase
        let mut resolver = match self.prompter.take() {
            Some(prompter) => InputResolver::interactive(prompter),
            None => InputResolver::batch(),
        }
        .with_defaults(self.defaults.clone())
        .skip_optional(self.skip_optional)
        .fail_on_unresolved(self.fail_on_unresolved);
        let mut seeder = ProjectDirSeeder {
            project_dir: &project_dir,
            seeded: false,
        };
        let mut state = WalkState::new(context);
        {
            let mut walker = Walker::new(self.loader.clone_box());
            walker.add_visitor(&mut resolver);
            walker.add_visitor(&mut seeder);
            for visitor in &mut self.additional_visitors {
                walker.add_visitor(visitor.as_mut());
            }
            walker.walk(script.clone(), &mut state)?;
        }
        let mut context = state.into_context();

        // The seed falls back to an empty name when the archetype never
        // resolved one; the host mapping decides what that means.
        if context.get_value(context.root(), PROJECT_DIRECTORY)?.is_none() {
            let name = match context.get_value(context.root(), PROJECT_NAME)? {
                Some(v) => context.interpolate(context.root(), &v.as_string())?,
                None => String::new(),
            };
            let dir = project_dir(&name);
            let root = context.root();
            context.put_at_path(
                root,
                PROJECT_DIRECTORY,
                Value::string(dir.to_string_lossy()),
                ValueKind::External,
            )?;
        }
        let output_dir = PathBuf::from(
            context
                .get_value(context.root(), PROJECT_DIRECTORY)?
                .expect("seeded above")
                .as_string(),
        );

        // Output phase: accumulate the model behind the gate
        let mut gate = ContextGate::new();
        let mut models = ModelResolver::new();
        let mut state = WalkState::new(context);
        {
            let mut walker = Walker::new(self.loader.clone_box());
            walker.add_visitor(&mut gate);
            walker.add_visitor(&mut models);
            walker.walk(script.clone(), &mut state)?;
        }
        let context = state.into_context();
        let model = self.registry.finalize_model(&models.into_model())?;
        tracing::debug!("merged model ready: {}", model.to_json());

        // Output phase: generate files
        std::fs::create_dir_all(&output_dir)?;
        let mut gate = ContextGate::new();
        let mut generator =
            OutputGenerator::new(output_dir.clone(), model, &self.registry);
        let mut state = WalkState::new(context);
        {
            let mut walker = Walker::new(self.loader.clone_box());
            walker.add_visitor(&mut gate);
            walker.add_visitor(&mut generator);
            walker.walk(script, &mut state)?;
        }

        Ok(output_dir)
    }
}

/// Seeds `project.directory` the moment `project.name` is resolved, so
/// later interpolations in the same walk can already reference it.
struct ProjectDirSeeder<'f> {
    project_dir: &'f dyn Fn(&str) -> PathBuf,
    seeded: bool,
}

impl<'f> NodeVisitor for ProjectDirSeeder<'f> {
    fn visit(
        &mut self,
        _node: crate::walker::NodeRef<'_>,
        _state: &mut WalkState,
    ) -> Result<crate::walker::VisitResult> {
        Ok(crate::walker::VisitResult::Continue)
    }

    fn post_visit(
        &mut self,
        _node: crate::walker::NodeRef<'_>,
        state: &mut WalkState,
    ) -> Result<()> {
        if self.seeded {
            return Ok(());
        }
        let root = state.context.root();
        let Some(name) = state.context.get_value(root, PROJECT_NAME)? else {
            return Ok(());
        };
        let name = state.context.interpolate(root, &name.as_string())?;
        let dir = (self.project_dir)(&name);
        state.context.put_at_path(
            root,
            PROJECT_DIRECTORY,
            Value::string(dir.to_string_lossy()),
            ValueKind::External,
        )?;
        self.seeded = true;
        tracing::debug!("seeded {PROJECT_DIRECTORY} = {}", dir.display());
        Ok(())
    }
}
