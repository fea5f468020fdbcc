//! # longtex
//!
//! Export a network of linked markdown notes into one LaTeX document.
//!
//! A note is YAML front matter followed by a markdown dialect with math,
//! citations, embeds (`![[Note#Section]]`) and theorem-like environments
//! (`lemma:: ... ::lemma`). Exporting a note:
//!
//! 1. parses it into a [`Node`] tree ([`parser`]),
//! 2. unrolls embeds and links across notes while assigning labels
//!    ([`unroll`]),
//! 3. renders the tree to LaTeX and assembles the document ([`export`]).
//!
//! Notes are read through the [`Storage`] capability; content problems are
//! reported to a [`Diagnostics`] sink instead of failing the export.
//!
//! ```no_run
//! use longtex::{export_note, CollectingDiagnostics, ExportConfig, ExportRequest, VaultStorage};
//!
//! # async fn run() -> longtex::Result<()> {
//! let storage = VaultStorage::open(std::path::Path::new("vault"))?;
//! let diagnostics = CollectingDiagnostics::new();
//! let request = ExportRequest {
//!     address: "Paper".to_string(),
//!     ..ExportRequest::default()
//! };
//! let export = export_note(&storage, &diagnostics, &ExportConfig::default(), &request).await?;
//! println!("{}", export.latex);
//! # Ok(())
//! # }
//! ```

pub mod core;
pub mod diagnostics;
pub mod error;
pub mod export;
pub mod labels;
pub mod node;
pub mod parser;
pub mod unroll;

pub use crate::core::{Document, ExportConfig, MemoryStorage, NoteId, Storage, VaultStorage};
pub use diagnostics::{CollectingDiagnostics, Diagnostic, Diagnostics, TracingDiagnostics};
pub use error::{ExportError, Result};
pub use export::{export_note, write_export, Export, ExportRequest};
pub use node::Node;
pub use parser::parse_markdown;
