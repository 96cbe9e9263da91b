//! Encode documents back to VMF text.
//!
//! Output is canonical: tab indentation, block names on their own line,
//! every scalar key and value quoted. Derived sections are not written.
//! Parsing the output yields a document equal to the input.

use crate::document::Document;
use crate::parser::{BlockMode, Comment};
use crate::value::{Block, Value};

/// Write `doc` as VMF text.
pub fn serialize(doc: &Document) -> String {
    let mut out = String::new();
    for Comment { text, .. } in &doc.comments {
        out.push_str("//");
        out.push_str(text);
        out.push('\n');
    }

    let mut writer = Writer::new(&mut out);
    for (name, block) in doc.block_sections() {
        if name == "world" || !block.is_empty() {
            writer.section(name, block);
        }
        if name == "world" {
            for entity in &doc.entities {
                writer.section("entity", entity);
            }
        }
    }
    for (name, value) in doc.unknown_sections.iter() {
        writer.run(vec![Work::Entry {
            key: name,
            value,
            container: None,
            indent: 0,
        }]);
    }
    out
}

enum Work<'a> {
    Entry {
        key: &'a str,
        value: &'a Value,
        /// Mode of the enclosing block; `None` at top level.
        container: Option<BlockMode>,
        indent: usize,
    },
    Close {
        indent: usize,
    },
}

struct Writer<'o> {
    out: &'o mut String,
}

impl<'o> Writer<'o> {
    fn new(out: &'o mut String) -> Self {
        Self { out }
    }

    fn section(&mut self, name: &str, block: &Block) {
        let mut stack = Vec::new();
        self.open_block(&mut stack, name, block, BlockMode::for_section(name), 0);
        self.run(stack);
    }

    /// Drain the work stack. Uses no recursion, so depth is unbounded.
    fn run<'a>(&mut self, mut stack: Vec<Work<'a>>) {
        while let Some(work) = stack.pop() {
            match work {
                Work::Close { indent } => {
                    self.indent(indent);
                    self.out.push_str("}\n");
                }
                Work::Entry {
                    key,
                    value,
                    container,
                    indent,
                } => self.entry(&mut stack, key, value, container, indent),
            }
        }
    }

    fn entry<'a>(
        &mut self,
        stack: &mut Vec<Work<'a>>,
        key: &'a str,
        value: &'a Value,
        container: Option<BlockMode>,
        indent: usize,
    ) {
        let mode = container.unwrap_or(BlockMode::Generic);
        match value {
            Value::Block(block) => {
                let inner = match container {
                    Some(m) => m.child(key),
                    None => BlockMode::for_section(key),
                };
                self.open_block(stack, key, block, inner, indent);
            }
            Value::List(sets) if key == "vertices_plus" && mode.allows_sub_grammars() => {
                for set in sets {
                    self.vertex_set(set, indent);
                }
            }
            Value::List(row) if mode == BlockMode::DispRows && is_number_row(row) => {
                let joined: Vec<String> = row.iter().map(Value::to_string).collect();
                self.scalar(key, &joined.join(" "), indent);
            }
            Value::List(items) => {
                for item in items.iter().rev() {
                    stack.push(Work::Entry {
                        key,
                        value: item,
                        container,
                        indent,
                    });
                }
            }
            scalar => {
                let text = scalar_text(mode, key, scalar);
                self.scalar(key, &text, indent);
            }
        }
    }

    fn open_block<'a>(
        &mut self,
        stack: &mut Vec<Work<'a>>,
        name: &str,
        block: &'a Block,
        mode: BlockMode,
        indent: usize,
    ) {
        self.indent(indent);
        self.out.push_str(&block_name(name));
        self.out.push('\n');
        self.indent(indent);
        self.out.push_str("{\n");
        stack.push(Work::Close { indent });
        let children: Vec<_> = block.iter().collect();
        for (key, value) in children.into_iter().rev() {
            stack.push(Work::Entry {
                key,
                value,
                container: Some(mode),
                indent: indent + 1,
            });
        }
    }

    fn vertex_set(&mut self, set: &Value, indent: usize) {
        self.indent(indent);
        self.out.push_str("vertices_plus\n");
        self.indent(indent);
        self.out.push_str("{\n");
        for v in set.as_list().unwrap_or(&[]) {
            self.scalar("v", &v.to_string(), indent + 1);
        }
        self.indent(indent);
        self.out.push_str("}\n");
    }

    fn scalar(&mut self, key: &str, text: &str, indent: usize) {
        self.indent(indent);
        self.out.push_str(&quote(key));
        self.out.push(' ');
        self.out.push_str(&quote(text));
        self.out.push('\n');
    }

    fn indent(&mut self, depth: usize) {
        for _ in 0..depth {
            self.out.push('\t');
        }
    }
}

fn scalar_text(mode: BlockMode, key: &str, value: &Value) -> String {
    match (mode, value) {
        (BlockMode::Cameras, Value::Vector3(v)) if key == "position" || key == "look" => {
            format!("[{}]", v)
        }
        (BlockMode::Dispinfo, Value::Vector3(v)) if key == "startposition" => format!("[{}]", v),
        // Bare triples inside displacement rows would read back as number rows.
        (BlockMode::DispRows, Value::Vector3(v)) => format!("({})", v),
        (_, Value::Vector3(v)) if key == "mins" || key == "maxs" => format!("({})", v),
        (_, other) => other.to_string(),
    }
}

fn is_number_row(row: &[Value]) -> bool {
    row.len() > 1
        && row
            .iter()
            .all(|v| matches!(v, Value::Integer(_) | Value::Float(_)))
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn block_name(name: &str) -> String {
    if is_identifier(name) {
        name.to_string()
    } else {
        quote(name)
    }
}

fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}
