//! Storage capability through which notes are located, read and written
//!
//! The export core never touches the file system directly. It asks a
//! [`Storage`] to resolve link addresses to [`NoteId`]s and to read their
//! content; backends decide where the bytes live.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::error::{ExportError, Result};
use crate::labels::note_address;

/// File extensions that make an address refer to an image instead of a note
pub const IMAGE_EXTENSIONS: [&str; 7] = ["png", "jpg", "jpeg", "gif", "svg", "pdf", "webp"];

/// Identity of a stored file: its path relative to the storage root, with `/`
/// separators
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NoteId(String);

impl NoteId {
    pub fn new(path: impl Into<String>) -> Self {
        let path: String = path.into();
        Self(path.replace('\\', "/").trim_start_matches('/').to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Last path segment
    pub fn file_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }

    /// File name without its extension
    pub fn stem(&self) -> &str {
        let name = self.file_name();
        match name.rfind('.') {
            Some(dot) if dot > 0 => &name[..dot],
            _ => name,
        }
    }

    pub fn extension(&self) -> Option<&str> {
        let name = self.file_name();
        name.rfind('.')
            .filter(|dot| *dot > 0)
            .map(|dot| &name[dot + 1..])
    }

    pub fn is_markdown(&self) -> bool {
        self.extension()
            .map(|ext| ext.eq_ignore_ascii_case("md") || ext.eq_ignore_ascii_case("markdown"))
            .unwrap_or(false)
    }

    /// Folders leading to the file, outermost first
    fn folders(&self) -> Vec<&str> {
        let mut segments: Vec<&str> = self.0.split('/').collect();
        segments.pop();
        segments
    }
}

impl fmt::Display for NoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Whether an address names an image file
pub fn is_image_address(address: &str) -> bool {
    address
        .trim()
        .rsplit_once('.')
        .map(|(_, ext)| IMAGE_EXTENSIONS.iter().any(|e| ext.eq_ignore_ascii_case(e)))
        .unwrap_or(false)
}

/// Storage backend for notes and media
#[async_trait]
pub trait Storage: Send + Sync {
    /// Resolve a link address to a stored file.
    ///
    /// Matching is case-insensitive. Reports [`Diagnostic::DuplicateName`]
    /// when several files match and the first in path order is returned.
    fn find(&self, address: &str, diagnostics: &dyn Diagnostics) -> Option<NoteId>;

    /// Read a file as text; fails with [`ExportError::NotFound`] for an
    /// unknown id
    async fn read(&self, id: &NoteId) -> Result<String>;

    /// Create or replace a file
    async fn write(&self, id: &NoteId, content: &str) -> Result<()>;
}

/// Lookup shared by every backend.
///
/// Notes are matched by file stem, images by full file name. Folders given in
/// the address must be the trailing folders of the candidate's path.
pub fn find_in<'a, I>(address: &str, candidates: I, diagnostics: &dyn Diagnostics) -> Option<NoteId>
where
    I: IntoIterator<Item = &'a NoteId>,
{
    let address = address.trim().trim_start_matches('/');
    let (folders, name) = match address.rsplit_once('/') {
        Some((folders, name)) => (folders.split('/').collect::<Vec<_>>(), name),
        None => (Vec::new(), address),
    };
    let image = is_image_address(name);
    let wanted = if image {
        name.to_lowercase()
    } else {
        note_address(name).to_lowercase()
    };
    if wanted.is_empty() {
        return None;
    }

    let mut matches: Vec<&NoteId> = candidates
        .into_iter()
        .filter(|id| {
            let name_matches = if image {
                id.file_name().to_lowercase() == wanted
            } else {
                id.is_markdown() && id.stem().to_lowercase() == wanted
            };
            name_matches && folders_match(&folders, &id.folders())
        })
        .collect();
    matches.sort();

    let chosen = matches.first().map(|id| (*id).clone())?;
    if matches.len() > 1 {
        diagnostics.report(Diagnostic::DuplicateName {
            address: address.to_string(),
            chosen: chosen.to_string(),
            candidates: matches.len(),
        });
    }
    Some(chosen)
}

fn folders_match(wanted: &[&str], actual: &[&str]) -> bool {
    wanted.len() <= actual.len()
        && wanted
            .iter()
            .rev()
            .zip(actual.iter().rev())
            .all(|(w, a)| w.eq_ignore_ascii_case(a))
}

/// In-memory storage, keyed by path
#[derive(Debug, Default)]
pub struct MemoryStorage {
    files: RwLock<BTreeMap<NoteId, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with_note(self, path: &str, content: &str) -> Self {
        self.insert(path, content);
        self
    }

    pub fn insert(&self, path: &str, content: &str) {
        if let Ok(mut files) = self.files.write() {
            files.insert(NoteId::new(path), content.to_string());
        }
    }

    /// Current content of a file
    pub fn get(&self, path: &str) -> Option<String> {
        self.files
            .read()
            .ok()
            .and_then(|files| files.get(&NoteId::new(path)).cloned())
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    fn find(&self, address: &str, diagnostics: &dyn Diagnostics) -> Option<NoteId> {
        let files = self.files.read().ok()?;
        find_in(address, files.keys(), diagnostics)
    }

    async fn read(&self, id: &NoteId) -> Result<String> {
        self.files
            .read()
            .ok()
            .and_then(|files| files.get(id).cloned())
            .ok_or_else(|| ExportError::NotFound(id.to_string()))
    }

    async fn write(&self, id: &NoteId, content: &str) -> Result<()> {
        let mut files = self
            .files
            .write()
            .map_err(|_| ExportError::UnsupportedBackend("memory storage lock poisoned".into()))?;
        files.insert(id.clone(), content.to_string());
        Ok(())
    }
}
