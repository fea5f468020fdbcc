//! Core functionality: configuration, parsed notes and storage backends

pub mod config;
pub mod document;
pub mod file_system;
pub mod storage;

pub use config::ExportConfig;
pub use document::Document;
pub use file_system::VaultStorage;
pub use storage::{MemoryStorage, NoteId, Storage};
