//! Emitter configuration

use serde::{Deserialize, Serialize};

/// Formatting options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormatConfig {
    /// Number of spaces for indentation (default: 2, as `terraform fmt`)
    pub indent_size: usize,

    /// Use tabs instead of spaces for indentation
    pub use_tabs: bool,

    /// Number of blank lines between top-level blocks (default: 1)
    pub blank_lines_between_blocks: usize,

    /// Align attribute values in a block
    pub align_attributes: bool,
}

impl Default for FormatConfig {
    fn default() -> Self {
        Self {
            indent_size: 2,
            use_tabs: false,
            blank_lines_between_blocks: 1,
            align_attributes: true,
        }
    }
}

impl FormatConfig {
    /// Get the string to use for a single level of indentation
    pub fn indent_string(&self) -> String {
        if self.use_tabs {
            "\t".to_string()
        } else {
            " ".repeat(self.indent_size)
        }
    }
}

/// Entry of the `required_providers` block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequiredProvider {
    /// Local name (e.g., "genesyscloud")
    pub name: String,
    /// Registry source address
    pub source: String,
    /// Version constraint
    pub version: Option<String>,
}

impl RequiredProvider {
    pub fn new(name: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
            version: None,
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }
}
