//! HCL writer

use std::collections::BTreeSet;

use super::config::{FormatConfig, RequiredProvider};
use super::escape_template;
use crate::resource::{Attributes, ExportedResource, Value};

/// Writes resource blocks as HCL native syntax
pub(super) struct HclWriter<'a> {
    config: &'a FormatConfig,
    output: String,
    current_indent: usize,
}

impl<'a> HclWriter<'a> {
    pub(super) fn new(config: &'a FormatConfig) -> Self {
        Self {
            config,
            output: String::new(),
            current_indent: 0,
        }
    }

    pub(super) fn finish(self) -> String {
        let trimmed = self.output.trim_end();
        if trimmed.is_empty() {
            String::new()
        } else {
            format!("{}\n", trimmed)
        }
    }

    fn write(&mut self, s: &str) {
        self.output.push_str(s);
    }

    fn write_indent(&mut self) {
        let indent = self.config.indent_string().repeat(self.current_indent);
        self.output.push_str(&indent);
    }

    fn write_newline(&mut self) {
        self.output.push('\n');
    }

    fn write_newlines(&mut self, count: usize) {
        for _ in 0..count {
            self.write_newline();
        }
    }

    fn open_block(&mut self, header: &str) {
        self.write_indent();
        self.write(header);
        self.write(" {");
        self.write_newline();
        self.current_indent += 1;
    }

    fn close_block(&mut self) {
        self.current_indent = self.current_indent.saturating_sub(1);
        self.write_indent();
        self.write("}");
        self.write_newline();
    }

    pub(super) fn write_terraform_block(&mut self, providers: &[RequiredProvider]) {
        if providers.is_empty() {
            return;
        }
        self.open_block("terraform");
        self.open_block("required_providers");
        for provider in providers {
            let mut settings = Attributes::new();
            settings.insert("source".to_string(), Value::from(provider.source.as_str()));
            if let Some(version) = &provider.version {
                settings.insert("version".to_string(), Value::from(version.as_str()));
            }
            self.write_attribute(&provider.name, &Value::Map(settings), 0);
        }
        self.close_block();
        self.close_block();
        self.write_newlines(self.config.blank_lines_between_blocks);
    }

    pub(super) fn write_resource(&mut self, resource: &ExportedResource, depends_on: bool) {
        self.open_block(&format!(
            "resource {} {}",
            quote(&resource.address.resource_type),
            quote(&resource.address.label)
        ));
        self.write_body(&resource.attributes, &resource.json_encoded);

        let dependencies: Vec<String> = resource
            .depends_on
            .iter()
            .filter(|dep| **dep != resource.address)
            .map(|dep| dep.to_string())
            .collect();
        if depends_on && !dependencies.is_empty() {
            self.write_indent();
            self.write("depends_on = [");
            self.write(&dependencies.join(", "));
            self.write("]");
            self.write_newline();
        }

        self.close_block();
        self.write_newlines(self.config.blank_lines_between_blocks);
    }

    /// Attributes first, then nested blocks
    fn write_body(&mut self, attributes: &Attributes, json_encoded: &BTreeSet<String>) {
        let (blocks, plain): (Vec<_>, Vec<_>) = attributes
            .iter()
            .partition(|(_, value)| is_block_list(value));

        let width = if self.config.align_attributes {
            plain.iter().map(|(key, _)| key_len(key)).max().unwrap_or(0)
        } else {
            0
        };
        for (key, value) in plain {
            match value {
                Value::String(text) if json_encoded.contains(key) => {
                    self.write_json_encoded(key, text, width)
                }
                _ => self.write_attribute(key, value, width),
            }
        }

        for (name, value) in blocks {
            if let Value::List(items) = value {
                for item in items {
                    if let Value::Map(body) = item {
                        self.open_block(name);
                        self.write_body(body, &BTreeSet::new());
                        self.close_block();
                    }
                }
            }
        }
    }

    fn write_key(&mut self, key: &str, width: usize) {
        let key = format_key(key);
        self.write_indent();
        self.write(&key);
        let padding = width.saturating_sub(key.chars().count());
        self.write(&" ".repeat(padding));
        self.write(" = ");
    }

    fn write_attribute(&mut self, key: &str, value: &Value, width: usize) {
        self.write_key(key, width);
        self.write_value(value);
        self.write_newline();
    }

    /// JSON text as a `jsonencode` call over the equivalent HCL value.
    /// Text that does not parse is written as a plain string.
    fn write_json_encoded(&mut self, key: &str, text: &str, width: usize) {
        let Ok(document) = serde_json::from_str::<serde_json::Value>(text) else {
            self.write_attribute(key, &Value::from(text), width);
            return;
        };
        self.write_key(key, width);
        self.write("jsonencode(");
        self.write_value(&Value::from_json(document));
        self.write(")");
        self.write_newline();
    }

    fn write_value(&mut self, value: &Value) {
        match value {
            Value::Null => self.write("null"),
            Value::Bool(b) => self.write(&b.to_string()),
            Value::Int(n) => self.write(&n.to_string()),
            Value::Float(f) => self.write(&f.to_string()),
            Value::String(s) => self.write(&quote(&escape_template(s))),
            Value::ResourceRef(address) => self.write(&address.id_traversal()),
            Value::List(items) => {
                self.write("[");
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        self.write(", ");
                    }
                    self.write_value(item);
                }
                self.write("]");
            }
            Value::Map(map) if map.is_empty() => self.write("{}"),
            Value::Map(map) => {
                self.write("{");
                self.write_newline();
                self.current_indent += 1;
                let width = if self.config.align_attributes {
                    map.keys().map(|k| key_len(k)).max().unwrap_or(0)
                } else {
                    0
                };
                for (key, value) in map {
                    self.write_attribute(key, value, width);
                }
                self.current_indent -= 1;
                self.write_indent();
                self.write("}");
            }
        }
    }
}

/// A non-empty list of maps is written as repeated nested blocks
fn is_block_list(value: &Value) -> bool {
    match value {
        Value::List(items) => !items.is_empty() && items.iter().all(|i| matches!(i, Value::Map(_))),
        _ => false,
    }
}

fn is_identifier(key: &str) -> bool {
    let mut chars = key.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

fn format_key(key: &str) -> String {
    if is_identifier(key) {
        key.to_string()
    } else {
        quote(key)
    }
}

fn key_len(key: &str) -> usize {
    format_key(key).chars().count()
}

/// Quote a string literal
fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}
