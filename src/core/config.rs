//! Export configuration management

use std::path::PathBuf;

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

/// Maximum number of remembered vaults
const RECENT_VAULTS: usize = 10;

/// Export configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Folder, relative to the vault, that receives the `.tex` file
    pub output_folder: String,
    /// Argument of `\documentclass`
    pub document_class: String,
    /// Extra preamble, emitted as `\input{...}`
    pub preamble_file: Option<String>,
    /// Bibliography database used when the root note names none
    pub bibliography_file: Option<String>,
    /// Template with `$key$` placeholders; replaces the default boilerplate
    pub template_file: Option<PathBuf>,
    /// Folder prefix for embedded images
    pub media_folder: String,
    /// Deepest allowed chain of nested embeds
    pub max_embed_depth: usize,
    /// Recently exported vaults, most recent first
    pub recent_vaults: Vec<PathBuf>,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            output_folder: "output".to_string(),
            document_class: "article".to_string(),
            preamble_file: None,
            bibliography_file: None,
            template_file: None,
            media_folder: "Files".to_string(),
            max_embed_depth: 20,
            recent_vaults: Vec::new(),
        }
    }
}

impl ExportConfig {
    /// Get the config file path
    fn config_path() -> Option<PathBuf> {
        ProjectDirs::from("com", "longtex", "Longtex")
            .map(|dirs| dirs.config_dir().join("config.json"))
    }

    /// Load configuration from disk, falling back to defaults
    pub fn load() -> Result<Self> {
        let path = Self::config_path()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;

        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        Self::from_json(&content).with_context(|| format!("Invalid config: {}", path.display()))
    }

    fn from_json(content: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(content)?;
        if config.max_embed_depth == 0 {
            anyhow::bail!(crate::error::ExportError::InvalidConfig(
                "max_embed_depth must be at least 1".to_string()
            ));
        }
        Ok(config)
    }

    /// Save configuration to disk
    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, content)
            .with_context(|| format!("Failed to write config: {}", path.display()))?;

        tracing::info!("Saved config to: {}", path.display());
        Ok(())
    }

    /// Add a vault to recent vaults
    pub fn add_recent_vault(&mut self, path: PathBuf) {
        self.recent_vaults.retain(|p| p != &path);
        self.recent_vaults.insert(0, path);
        self.recent_vaults.truncate(RECENT_VAULTS);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = ExportConfig::from_json(r#"{"document_class": "amsart"}"#).unwrap();
        assert_eq!(config.document_class, "amsart");
        assert_eq!(config.media_folder, "Files");
        assert_eq!(config.max_embed_depth, 20);
    }

    #[test]
    fn test_zero_depth_is_rejected() {
        assert!(ExportConfig::from_json(r#"{"max_embed_depth": 0}"#).is_err());
    }

    #[test]
    fn test_recent_vaults() {
        let mut config = ExportConfig::default();
        for i in 0..12 {
            config.add_recent_vault(PathBuf::from(format!("vault{}", i)));
        }
        config.add_recent_vault(PathBuf::from("vault5"));
        assert_eq!(config.recent_vaults.len(), 10);
        assert_eq!(config.recent_vaults[0], PathBuf::from("vault5"));
        assert_eq!(config.recent_vaults[1], PathBuf::from("vault11"));
    }
}
