//! Error types for export operations

use thiserror::Error;

/// Errors that abort an export.
///
/// Problems caused by note content (missing notes, missing headers, duplicate
/// names) are not errors: they are reported through
/// [`Diagnostics`](crate::diagnostics::Diagnostics) and replaced by a warning
/// node in the output.
#[derive(Error, Debug)]
pub enum ExportError {
    /// A pattern matched in a shape the grammar rules out.
    #[error("internal invariant violated in {construct}: {detail}")]
    InvariantViolation {
        construct: &'static str,
        detail: String,
    },

    #[error("note not found: {0}")]
    NotFound(String),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("unsupported storage backend: {0}")]
    UnsupportedBackend(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl ExportError {
    pub(crate) fn invariant(construct: &'static str, detail: impl Into<String>) -> Self {
        Self::InvariantViolation {
            construct,
            detail: detail.into(),
        }
    }

    pub(crate) fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, ExportError>;
