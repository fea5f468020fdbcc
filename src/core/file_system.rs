//! On-disk vault storage

use std::path::{Path, PathBuf};
use std::sync::RwLock;

use async_trait::async_trait;
use walkdir::WalkDir;

use super::storage::{find_in, NoteId, Storage};
use crate::diagnostics::Diagnostics;
use crate::error::{ExportError, Result};

/// A vault directory; notes and media are addressed relative to its root
#[derive(Debug)]
pub struct VaultStorage {
    root: PathBuf,
    /// Every visible file in the vault, refreshed on open and on write
    index: RwLock<Vec<NoteId>>,
}

impl VaultStorage {
    /// Open a vault directory and index its files
    pub fn open(root: &Path) -> Result<Self> {
        if !root.is_dir() {
            return Err(ExportError::UnsupportedBackend(format!(
                "{} is not a directory",
                root.display()
            )));
        }
        let storage = Self {
            root: root.to_path_buf(),
            index: RwLock::new(Vec::new()),
        };
        storage.refresh();
        Ok(storage)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute path of a stored file
    pub fn path_of(&self, id: &NoteId) -> PathBuf {
        id.as_str()
            .split('/')
            .fold(self.root.clone(), |path, segment| path.join(segment))
    }

    /// Re-scan the vault
    pub fn refresh(&self) {
        let files = scan_files(&self.root);
        tracing::debug!("Indexed {} files in {}", files.len(), self.root.display());
        if let Ok(mut index) = self.index.write() {
            *index = files;
        }
    }

    /// Copy a stored file to an arbitrary location outside the vault
    pub async fn copy_out(&self, id: &NoteId, target: &Path) -> Result<()> {
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ExportError::io(parent.display().to_string(), e))?;
        }
        tokio::fs::copy(self.path_of(id), target)
            .await
            .map_err(|e| ExportError::io(id.to_string(), e))?;
        Ok(())
    }
}

fn is_hidden(name: &str) -> bool {
    name.starts_with('.') || name == "node_modules" || name == "target"
}

/// All visible files under `root`, as vault-relative ids
fn scan_files(root: &Path) -> Vec<NoteId> {
    WalkDir::new(root)
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_hidden(&e.file_name().to_string_lossy()))
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| {
            let relative = e.path().strip_prefix(root).ok()?;
            let segments: Vec<String> = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy().to_string())
                .collect();
            Some(NoteId::new(segments.join("/")))
        })
        .collect()
}

#[async_trait]
impl Storage for VaultStorage {
    fn find(&self, address: &str, diagnostics: &dyn Diagnostics) -> Option<NoteId> {
        let index = self.index.read().ok()?;
        find_in(address, index.iter(), diagnostics)
    }

    async fn read(&self, id: &NoteId) -> Result<String> {
        let path = self.path_of(id);
        tracing::debug!("Reading {}", path.display());
        tokio::fs::read_to_string(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ExportError::NotFound(id.to_string())
            } else {
                ExportError::io(path.display().to_string(), e)
            }
        })
    }

    async fn write(&self, id: &NoteId, content: &str) -> Result<()> {
        let path = self.path_of(id);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ExportError::io(parent.display().to_string(), e))?;
        }
        tokio::fs::write(&path, content)
            .await
            .map_err(|e| ExportError::io(path.display().to_string(), e))?;
        tracing::info!("Wrote {}", path.display());

        if let Ok(mut index) = self.index.write() {
            if !index.contains(id) {
                index.push(id.clone());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::CollectingDiagnostics;

    #[tokio::test]
    async fn test_vault_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("notes")).unwrap();
        std::fs::create_dir_all(dir.path().join(".obsidian")).unwrap();
        std::fs::write(dir.path().join("notes/Lemma.md"), "content").unwrap();
        std::fs::write(dir.path().join(".obsidian/Lemma.md"), "hidden").unwrap();

        let vault = VaultStorage::open(dir.path()).unwrap();
        let sink = CollectingDiagnostics::new();
        let id = vault.find("lemma", &sink).unwrap();
        assert_eq!(id, NoteId::new("notes/Lemma.md"));
        assert!(sink.is_empty());
        assert_eq!(vault.read(&id).await.unwrap(), "content");

        let out = NoteId::new("output/Lemma.tex");
        vault.write(&out, "\\section{x}").await.unwrap();
        assert_eq!(
            std::fs::read_to_string(dir.path().join("output/Lemma.tex")).unwrap(),
            "\\section{x}"
        );
    }

    #[test]
    fn test_open_rejects_files() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("note.md");
        std::fs::write(&file, "").unwrap();
        assert!(matches!(
            VaultStorage::open(&file),
            Err(ExportError::UnsupportedBackend(_))
        ));
    }

    #[tokio::test]
    async fn test_read_missing() {
        let dir = tempfile::tempdir().unwrap();
        let vault = VaultStorage::open(dir.path()).unwrap();
        assert!(matches!(
            vault.read(&NoteId::new("gone.md")).await,
            Err(ExportError::NotFound(_))
        ));
    }
}
