// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! The `inspect` command: dump a parsed script tree.

use console::style;
use molde::{FileSystemLoader, NodeId, Script, ScriptLoader, Value};
use std::path::Path;

/// Prints the parsed tree of a script, one node per line.
pub fn run(script: &str) -> anyhow::Result<()> {
    let loader = FileSystemLoader::default();
    let script = loader.load(Path::new(script))?;
    println!(
        "{} {}",
        style("script").bold(),
        script.path().display()
    );
    let methods: Vec<&str> = script.method_names().collect();
    if !methods.is_empty() {
        println!("{} {}", style("methods").bold(), methods.join(", "));
    }
    print_node(&script, script.root(), 0);
    Ok(())
}

fn print_node(script: &Script, id: NodeId, depth: usize) {
    let node = script.node(id);
    let indent = "  ".repeat(depth);
    let mut line = format!("{indent}{:?}", node.kind);
    for (name, value) in &node.attributes {
        line.push_str(&format!(" {name}={}", value.as_string()));
    }
    if let Some(guard) = &node.guard_source {
        line.push_str(&format!(" {}", style(format!("if[{guard}]")).yellow()));
    }
    if let Value::String(text) = &node.value {
        line.push_str(&format!(" {}", style(format!("{text:?}")).dim()));
    }
    println!("{line}");
    for child in &node.children {
        print_node(script, *child, depth + 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn inspect_runs_on_a_valid_script() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("main.xml");
        fs::write(
            &path,
            r#"<archetype-script><step if="true"><inputs><text id="name"/></inputs></step></archetype-script>"#,
        )
        .unwrap();
        run(path.to_str().unwrap()).unwrap();
    }

    #[test]
    fn inspect_fails_on_missing_script() {
        assert!(run("/definitely/not/here.xml").is_err());
    }
}
