// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! The `generate` command.

use crate::commands::parse_pairs;
use crate::prompter::TerminalPrompter;
use console::style;
use molde::ArchetypeEngine;
use std::path::PathBuf;

/// Runs a full generation.
pub fn run(
    script: &str,
    output: Option<String>,
    presets: Vec<String>,
    defaults: Vec<String>,
    batch: bool,
    skip_optional: bool,
) -> anyhow::Result<()> {
    let script_path = PathBuf::from(script);
    if !script_path.exists() {
        anyhow::bail!("script '{}' does not exist", script_path.display());
    }

    let mut engine = ArchetypeEngine::new(&script_path)
        .with_presets(parse_pairs(&presets)?)
        .with_defaults(parse_pairs(&defaults)?)
        .skip_optional(skip_optional);
    if !batch {
        engine = engine.with_prompter(Box::new(TerminalPrompter::new()));
    }

    let base = std::env::current_dir()?;
    tracing::info!("generating from {}", script_path.display());
    let project = engine.generate(move |name| {
        if let Some(output) = &output {
            return PathBuf::from(output);
        }
        let name = if name.is_empty() { "project" } else { name };
        base.join(name)
    })?;

    println!(
        "{} generated {}",
        style("✓").green().bold(),
        style(project.display()).bold()
    );
    Ok(())
}
