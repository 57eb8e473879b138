// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! XML script reading and writing.
//!
//! [`read_script`] parses an `archetype-script` document into the arena
//! AST. Element names map to [`Kind`]s contextually: `<list>` under
//! `<inputs>` is an input, under `<presets>` a preset, under `<model>` a
//! model node. Unknown elements, a wrong root, or a malformed `if`
//! attribute are [`MoldeError::ScriptParse`] errors annotated with the
//! document position.
//!
//! [`write_script`] serializes a script back to XML. The output is
//! structurally equivalent to the input: element order, attributes, text
//! content, and `if` guards survive a read/write/read cycle.

use crate::ast::{Kind, Node, NodeId, Script};
use crate::error::{Location, MoldeError, Result};
use crate::expr::Expression;
use crate::value::Value;
use std::collections::{BTreeMap, HashMap};
use std::fmt::Write as _;
use std::path::Path;

/// The required root element name.
pub const ROOT_ELEMENT: &str = "archetype-script";

/// Parses an archetype script document.
///
/// `path` is recorded in the resulting [`Script`] and in error locations;
/// the source is supplied by the loader.
pub fn read_script(path: &Path, source: &str) -> Result<Script> {
    let doc = roxmltree::Document::parse(source).map_err(|e| {
        let pos = e.pos();
        MoldeError::ScriptParse {
            message: e.to_string(),
            path: path.to_path_buf(),
            location: Location::new(pos.row, pos.col),
        }
    })?;

    let root = doc.root_element();
    if root.tag_name().name() != ROOT_ELEMENT {
        let pos = doc.text_pos_at(root.range().start);
        return Err(MoldeError::ScriptParse {
            message: format!(
                "invalid root element '{}', expected '{}'",
                root.tag_name().name(),
                ROOT_ELEMENT
            ),
            path: path.to_path_buf(),
            location: Location::new(pos.row, pos.col),
        });
    }

    let mut reader = Reader {
        doc: &doc,
        path,
        nodes: Vec::new(),
        methods: HashMap::new(),
    };
    let root_id = reader.read_element(root, None, Kind::Script)?;
    Ok(Script::new(
        path.to_path_buf(),
        reader.nodes,
        root_id,
        reader.methods,
    ))
}

struct Reader<'a, 'input> {
    doc: &'a roxmltree::Document<'input>,
    path: &'a Path,
    nodes: Vec<Node>,
    methods: HashMap<String, NodeId>,
}

impl<'a, 'input> Reader<'a, 'input> {
    fn location_of(&self, node: roxmltree::Node) -> Location {
        let pos = self.doc.text_pos_at(node.range().start);
        Location::new(pos.row, pos.col)
    }

    fn parse_error(&self, node: roxmltree::Node, message: String) -> MoldeError {
        MoldeError::ScriptParse {
            message,
            path: self.path.to_path_buf(),
            location: self.location_of(node),
        }
    }

    fn read_element(
        &mut self,
        element: roxmltree::Node,
        parent: Option<NodeId>,
        kind: Kind,
    ) -> Result<NodeId> {
        let location = self.location_of(element);

        let mut attributes = BTreeMap::new();
        let mut guard = Expression::literal_true();
        let mut guard_source = None;
        for attr in element.attributes() {
            if attr.name() == "if" {
                guard = Expression::parse(attr.value()).map_err(|e| {
                    self.parse_error(element, format!("invalid 'if' attribute: {e}"))
                })?;
                guard_source = Some(attr.value().to_string());
            } else {
                attributes.insert(attr.name().to_string(), Value::string(attr.value()));
            }
        }

        let text = element
            .children()
            .filter(|c| c.is_text())
            .filter_map(|c| c.text())
            .collect::<String>();
        let text = text.trim();
        let value = if text.is_empty() {
            Value::Empty
        } else {
            Value::string(text)
        };

        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node {
            kind,
            location,
            parent,
            children: Vec::new(),
            attributes,
            value,
            guard,
            guard_source,
        });

        if kind == Kind::Method {
            let name = self.nodes[id.index()]
                .attr_string("name")
                .ok_or_else(|| self.parse_error(element, "method without 'name'".into()))?;
            self.methods.insert(name, id);
        }

        for child in element.children().filter(|c| c.is_element()) {
            let child_name = child.tag_name().name();
            let child_kind = child_kind(kind, child_name).ok_or_else(|| {
                self.parse_error(
                    child,
                    format!("unexpected element '{child_name}' under '{}'", element_name(kind)),
                )
            })?;
            let child_id = self.read_element(child, Some(id), child_kind)?;
            self.nodes[id.index()].children.push(child_id);
        }

        Ok(id)
    }
}

/// Elements that may appear in any flow position (under the root, a step,
/// a method body, or an input/option subtree).
fn flow_kind(name: &str) -> Option<Kind> {
    match name {
        "step" => Some(Kind::Step),
        "inputs" => Some(Kind::Inputs),
        "presets" => Some(Kind::Presets),
        "variables" => Some(Kind::Variables),
        "output" => Some(Kind::Output),
        "validations" => Some(Kind::Validations),
        "exec" => Some(Kind::Exec),
        "source" => Some(Kind::Source),
        "call" => Some(Kind::Call),
        _ => None,
    }
}

fn child_kind(parent: Kind, name: &str) -> Option<Kind> {
    use Kind::*;
    match parent {
        Script => match name {
            "methods" => Some(Methods),
            other => flow_kind(other),
        },
        Methods => (name == "method").then_some(Method),
        Method | Step | InputBoolean | InputText | InputOption => flow_kind(name),
        InputEnum | InputList => match name {
            "option" => Some(InputOption),
            other => flow_kind(other),
        },
        Inputs => match name {
            "boolean" => Some(InputBoolean),
            "text" => Some(InputText),
            "enum" => Some(InputEnum),
            "list" => Some(InputList),
            _ => None,
        },
        Presets => match name {
            "boolean" => Some(PresetBoolean),
            "text" => Some(PresetText),
            "enum" => Some(PresetEnum),
            "list" => Some(PresetList),
            _ => None,
        },
        Variables => match name {
            "boolean" => Some(VariableBoolean),
            "text" => Some(VariableText),
            "enum" => Some(VariableEnum),
            "list" => Some(VariableList),
            _ => None,
        },
        Output => match name {
            "file" => Some(OutputFile),
            "files" => Some(OutputFiles),
            "template" => Some(OutputTemplate),
            "templates" => Some(OutputTemplates),
            "transformation" => Some(Transformation),
            "model" => Some(Model),
            _ => None,
        },
        OutputFiles | OutputTemplates => match name {
            "includes" => Some(Includes),
            "excludes" => Some(Excludes),
            _ => None,
        },
        OutputTemplate => (name == "model").then_some(Model),
        Includes => (name == "include").then_some(Include),
        Excludes => (name == "exclude").then_some(Exclude),
        Transformation => (name == "replace").then_some(Replace),
        Model | ModelMap | ModelList => match name {
            "map" => Some(ModelMap),
            "list" => Some(ModelList),
            "value" => Some(ModelValue),
            _ => None,
        },
        Validations => (name == "validation").then_some(Validation),
        Validation => (name == "regex").then_some(Regex),
        PresetBoolean | PresetText | PresetEnum | PresetList | VariableBoolean | VariableText
        | VariableEnum | VariableList | ModelValue | Regex | Include | Exclude | Replace
        | OutputFile | Exec | Source | Call => None,
    }
}

fn element_name(kind: Kind) -> &'static str {
    use Kind::*;
    match kind {
        Script => ROOT_ELEMENT,
        Methods => "methods",
        Method => "method",
        Step => "step",
        Inputs => "inputs",
        InputBoolean | PresetBoolean | VariableBoolean => "boolean",
        InputText | PresetText | VariableText => "text",
        InputEnum | PresetEnum | VariableEnum => "enum",
        InputList | PresetList | VariableList | ModelList => "list",
        InputOption => "option",
        Presets => "presets",
        Variables => "variables",
        Output => "output",
        OutputFile => "file",
        OutputFiles => "files",
        OutputTemplate => "template",
        OutputTemplates => "templates",
        Transformation => "transformation",
        Replace => "replace",
        Includes => "includes",
        Include => "include",
        Excludes => "excludes",
        Exclude => "exclude",
        Model => "model",
        ModelMap => "map",
        ModelValue => "value",
        Validations => "validations",
        Validation => "validation",
        Regex => "regex",
        Exec => "exec",
        Source => "source",
        Call => "call",
    }
}

/// Serializes a script back to XML.
///
/// Attribute order is alphabetical; element order, text content, and `if`
/// guards are preserved, so re-reading the output yields a structurally
/// equivalent tree.
pub fn write_script(script: &Script) -> String {
    let mut out = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    write_node(script, script.root(), 0, &mut out);
    out
}

fn write_node(script: &Script, id: NodeId, depth: usize, out: &mut String) {
    let node = script.node(id);
    let indent = "    ".repeat(depth);
    let name = element_name(node.kind);

    let _ = write!(out, "{indent}<{name}");
    for (attr, value) in &node.attributes {
        let _ = write!(out, " {attr}=\"{}\"", escape_attr(&value.as_string()));
    }
    if let Some(guard) = &node.guard_source {
        let _ = write!(out, " if=\"{}\"", escape_attr(guard));
    }

    let text = match &node.value {
        Value::Empty => None,
        other => Some(other.as_string()),
    };

    if node.children.is_empty() && text.is_none() {
        out.push_str("/>\n");
        return;
    }

    out.push('>');
    if let Some(text) = &text {
        out.push_str(&escape_text(text));
    }
    if node.children.is_empty() {
        let _ = writeln!(out, "</{name}>");
        return;
    }

    out.push('\n');
    for child in &node.children {
        write_node(script, *child, depth + 1, out);
    }
    let _ = writeln!(out, "{indent}</{name}>");
}

fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn escape_attr(text: &str) -> String {
    escape_text(text).replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCRIPT: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<archetype-script>
    <methods>
        <method name="flavor">
            <presets>
                <text path="flavor.note">spicy</text>
            </presets>
        </method>
    </methods>
    <step if="colors == &quot;dark&quot;">
        <inputs>
            <enum id="theme" name="Theme" prompt="Pick a theme" default="dark">
                <option value="dark"/>
                <option value="light"/>
            </enum>
        </inputs>
    </step>
    <output>
        <model>
            <value key="groupId" order="200">com.example</value>
        </model>
        <file source="dark.css" target="styles/dark.css"/>
    </output>
</archetype-script>
"#;

    #[test]
    fn reads_kinds_contextually() {
        let script = read_script(Path::new("/tmp/script.xml"), SCRIPT).unwrap();
        let root = script.node(script.root());
        assert_eq!(root.kind, Kind::Script);

        let kinds: Vec<Kind> = root
            .children
            .iter()
            .map(|id| script.node(*id).kind)
            .collect();
        assert_eq!(kinds, vec![Kind::Methods, Kind::Step, Kind::Output]);

        // The enum input and its options
        let step = script.node(root.children[1]);
        let inputs = script.node(step.children[0]);
        let theme = script.node(inputs.children[0]);
        assert_eq!(theme.kind, Kind::InputEnum);
        assert_eq!(theme.attr_string("id").unwrap(), "theme");
        assert_eq!(theme.children.len(), 2);
        assert_eq!(script.node(theme.children[0]).kind, Kind::InputOption);

        // <text> under <presets> maps to a preset, not an input
        let method = script.method("flavor").unwrap();
        let presets = script.node(script.node(method).children[0]);
        assert_eq!(presets.kind, Kind::Presets);
        let preset = script.node(presets.children[0]);
        assert_eq!(preset.kind, Kind::PresetText);
        assert_eq!(preset.value.as_string(), "spicy");
    }

    #[test]
    fn guards_are_parsed_and_kept() {
        let script = read_script(Path::new("/tmp/script.xml"), SCRIPT).unwrap();
        let step = script.node(script.node(script.root()).children[1]);
        assert!(!step.guard.is_true_literal());
        assert_eq!(step.guard_source.as_deref(), Some("colors == \"dark\""));
    }

    #[test]
    fn rejects_wrong_root() {
        let err = read_script(Path::new("/s.xml"), "<wrong/>").unwrap_err();
        assert!(matches!(err, MoldeError::ScriptParse { .. }));
        assert!(err.to_string().contains("invalid root element"));
    }

    #[test]
    fn rejects_unknown_element_with_location() {
        let source = "<archetype-script>\n    <bogus/>\n</archetype-script>";
        match read_script(Path::new("/s.xml"), source) {
            Err(MoldeError::ScriptParse { location, message, .. }) => {
                assert_eq!(location.line, 2);
                assert!(message.contains("bogus"));
            }
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn rejects_malformed_guard() {
        let source = "<archetype-script><step if=\"a = b\"/></archetype-script>";
        let err = read_script(Path::new("/s.xml"), source).unwrap_err();
        assert!(err.to_string().contains("invalid 'if' attribute"));
    }

    #[test]
    fn round_trip_is_structurally_equivalent() {
        let first = read_script(Path::new("/s.xml"), SCRIPT).unwrap();
        let written = write_script(&first);
        let second = read_script(Path::new("/s.xml"), &written).unwrap();
        assert_structurally_equal(&first, first.root(), &second, second.root());
    }

    fn assert_structurally_equal(a: &Script, ai: NodeId, b: &Script, bi: NodeId) {
        let (na, nb) = (a.node(ai), b.node(bi));
        assert_eq!(na.kind, nb.kind);
        assert_eq!(na.attributes, nb.attributes);
        assert_eq!(na.value, nb.value);
        assert_eq!(na.guard, nb.guard);
        assert_eq!(na.children.len(), nb.children.len());
        for (ca, cb) in na.children.iter().zip(nb.children.iter()) {
            assert_structurally_equal(a, *ca, b, *cb);
        }
    }
}
