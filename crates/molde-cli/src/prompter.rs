// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Terminal prompter.
//!
//! Renders one question per input on the terminal and reads a raw
//! response line; the engine's resolver parses and re-prompts on
//! invalid responses.

use console::{style, Term};
use molde::{MoldeError, Prompt, PromptKind, Prompter, Result};

/// Interactive prompter over the user's terminal.
pub struct TerminalPrompter {
    term: Term,
}

impl Default for TerminalPrompter {
    fn default() -> Self {
        Self::new()
    }
}

impl TerminalPrompter {
    /// Creates a prompter on stdout/stdin.
    pub fn new() -> Self {
        Self {
            term: Term::stdout(),
        }
    }

    fn render_question(&self, prompt: &Prompt) -> Result<()> {
        let title = prompt
            .text
            .as_deref()
            .or(prompt.name.as_deref())
            .unwrap_or(&prompt.path);
        self.term
            .write_line(&format!("{}", style(title).bold()))
            .map_err(MoldeError::Io)?;
        if let Some(help) = &prompt.help {
            self.term
                .write_line(&format!("  {}", style(help).dim()))
                .map_err(MoldeError::Io)?;
        }
        for (index, option) in prompt.options.iter().enumerate() {
            let label = option.label.as_deref().unwrap_or(&option.value);
            self.term
                .write_line(&format!("  ({}) {label}", index + 1))
                .map_err(MoldeError::Io)?;
        }
        Ok(())
    }

    fn hint(prompt: &Prompt) -> String {
        let mut hint = match prompt.kind {
            PromptKind::Boolean => "yes/no".to_string(),
            PromptKind::Text => String::new(),
            PromptKind::Enum => format!("1-{}", prompt.options.len()),
            PromptKind::List => format!("1-{} or 'none'", prompt.options.len()),
        };
        if let Some(default) = &prompt.default {
            if hint.is_empty() {
                hint = format!("default: {default}");
            } else {
                hint = format!("{hint}, default: {default}");
            }
        }
        hint
    }
}

impl Prompter for TerminalPrompter {
    fn prompt(&mut self, prompt: &Prompt) -> Result<String> {
        self.render_question(prompt)?;
        let hint = Self::hint(prompt);
        let line = if hint.is_empty() {
            format!("{} ", style(">").cyan())
        } else {
            format!("{} ({hint}) ", style(">").cyan())
        };
        self.term.write_str(&line).map_err(MoldeError::Io)?;
        self.term.read_line().map_err(MoldeError::Io)
    }
}
