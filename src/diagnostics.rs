//! Content diagnostics reported while unrolling notes
//!
//! Diagnostics describe problems in user content. They never abort an export;
//! the engine reports them to a sink and keeps going.

use std::fmt;
use std::sync::Mutex;

/// A non-fatal problem found in note content
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// An embed or link points at a note that does not exist
    MissingNote { address: String },
    /// A header anchor did not match any header of the target note
    MissingHeader { address: String, header: String },
    /// Several files share a name; `chosen` was used
    DuplicateName {
        address: String,
        chosen: String,
        candidates: usize,
    },
    /// An embed re-enters a note section that is already being expanded
    EmbedCycle { label: String },
    /// Embeds are nested deeper than the configured limit
    DepthExceeded { address: String, depth: usize },
    /// Front matter could not be parsed as YAML
    InvalidFrontMatter { note: String, message: String },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::MissingNote { address } => write!(f, "note not found: {}", address),
            Diagnostic::MissingHeader { address, header } => {
                write!(f, "header '{}' not found in note '{}'", header, address)
            }
            Diagnostic::DuplicateName {
                address,
                chosen,
                candidates,
            } => write!(
                f,
                "{} files match '{}', using {}",
                candidates, address, chosen
            ),
            Diagnostic::EmbedCycle { label } => write!(f, "embed cycle through {}", label),
            Diagnostic::DepthExceeded { address, depth } => {
                write!(f, "embed of '{}' exceeds depth {}", address, depth)
            }
            Diagnostic::InvalidFrontMatter { note, message } => {
                write!(f, "invalid front matter in {}: {}", note, message)
            }
        }
    }
}

/// Sink for content diagnostics
pub trait Diagnostics: Send + Sync {
    fn report(&self, diagnostic: Diagnostic);
}

/// Logs every diagnostic as a warning
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingDiagnostics;

impl Diagnostics for TracingDiagnostics {
    fn report(&self, diagnostic: Diagnostic) {
        tracing::warn!("{}", diagnostic);
    }
}

/// Logs and keeps every diagnostic for later inspection
#[derive(Debug, Default)]
pub struct CollectingDiagnostics {
    collected: Mutex<Vec<Diagnostic>>,
}

impl CollectingDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything reported so far
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.collected
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.collected
            .lock()
            .map(|guard| guard.is_empty())
            .unwrap_or(true)
    }
}

impl Diagnostics for CollectingDiagnostics {
    fn report(&self, diagnostic: Diagnostic) {
        tracing::warn!("{}", diagnostic);
        if let Ok(mut guard) = self.collected.lock() {
            guard.push(diagnostic);
        }
    }
}
