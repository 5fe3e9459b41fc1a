//! Error types for audit log loading and analysis.

use std::path::PathBuf;

/// Result type alias for audit operations.
pub type Result<T> = std::result::Result<T, AuditError>;

/// Errors raised while reading or aggregating an audit log.
#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    /// IO error reading an input file.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The header row lacks a required column.
    #[error("Missing column '{}' in {}", column, path.display())]
    MissingColumn { column: String, path: PathBuf },

    /// A question row carries a value that cannot be used.
    #[error("Malformed row at line {}: column '{}' has invalid value '{}'", line, column, value)]
    MalformedRow {
        line: usize,
        column: String,
        value: String,
    },

    /// Nothing to average over.
    #[error("Empty input: {0}")]
    EmptyInput(String),
}
