//! Loader for microassembly descriptions.
//!
//! A description is a relaxed JSON dialect (comments, unquoted keys, trailing
//! commas, hexadecimal literals). Loading produces a [`Document`]: an ordered
//! mapping of top-level sections, of which `platform` and `states` are the
//! ones the ROM compiler consumes.

pub mod error;
pub mod lexer;
pub mod parser;

use std::path::Path;

use serde_json::{Map, Value};

pub use error::{DocumentError, Result};
pub use parser::parse_value;

/// Name of the architecture description section.
pub const PLATFORM_SECTION: &str = "platform";
/// Name of the state table section.
pub const STATES_SECTION: &str = "states";

/// A loaded description: ordered top-level sections.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    sections: Map<String, Value>,
}

impl Document {
    /// Wrap an already-parsed value. The root must be a mapping.
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(sections) => Ok(Self { sections }),
            _ => Err(DocumentError::RootNotMapping),
        }
    }

    /// Look up a top-level section by name.
    pub fn section(&self, name: &str) -> Option<&Value> {
        self.sections.get(name)
    }

    /// The `platform` section, if present.
    pub fn platform(&self) -> Option<&Value> {
        self.section(PLATFORM_SECTION)
    }

    /// The `states` section, if present.
    pub fn states(&self) -> Option<&Value> {
        self.section(STATES_SECTION)
    }

    /// Section names in source order.
    pub fn section_names(&self) -> impl Iterator<Item = &str> {
        self.sections.keys().map(String::as_str)
    }
}

/// Parse a description from source text.
pub fn parse_document(source: &str) -> Result<Document> {
    let value = parse_value(source)?;
    Document::from_value(value)
}

/// Load a description from a file.
pub fn load_document(path: &Path) -> Result<Document> {
    if !path.exists() {
        return Err(DocumentError::NotFound {
            path: path.to_path_buf(),
        });
    }
    let content = std::fs::read_to_string(path)?;
    let document = parse_document(&content)?;
    tracing::debug!(
        path = %path.display(),
        sections = document.sections.len(),
        "description loaded"
    );
    Ok(document)
}
