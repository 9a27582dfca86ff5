//! Error types for description loading.

use std::path::PathBuf;

/// Errors that can occur while loading a microassembly description.
#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    /// I/O error reading the description file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Description file not found.
    #[error("description file not found: {}", path.display())]
    NotFound {
        /// The path that was not found.
        path: PathBuf,
    },

    /// Input that does not form any token.
    #[error("line {line}, column {column}: unexpected character(s) '{slice}'")]
    Lex {
        line: usize,
        column: usize,
        slice: String,
    },

    /// Tokens in an order the grammar does not allow.
    #[error("line {line}, column {column}: {message}")]
    Syntax {
        line: usize,
        column: usize,
        message: String,
    },

    /// The same key appears twice in one mapping.
    #[error("line {line}: duplicate key '{key}'")]
    DuplicateKey { line: usize, key: String },

    /// A numeric literal that does not fit a 64-bit value.
    #[error("line {line}: invalid number '{literal}'")]
    InvalidNumber { line: usize, literal: String },

    /// The document root is not a mapping.
    #[error("document root must be a mapping of sections")]
    RootNotMapping,
}

/// Result type for document operations.
pub type Result<T> = std::result::Result<T, DocumentError>;
