//! Configuration handling for zettel-forest
//!
//! Configuration is stored in `.zettel/config.toml` (vault) and
//! `~/.config/zettel-forest/config.toml` (global).

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::DEFAULT_CAPACITY;

/// Name of the directory marking a vault root
pub const VAULT_DIR: &str = ".zettel";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Failed to parse configuration: {0}")]
    Parse(String),
}

/// Vault-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VaultConfig {
    /// Subfolder holding the notes, relative to the vault root
    pub folder: Option<PathBuf>,

    /// File extensions treated as notes
    pub extensions: Vec<String>,

    /// Number of moves kept for undo
    pub history_capacity: usize,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            folder: None,
            extensions: vec!["md".to_string()],
            history_capacity: DEFAULT_CAPACITY,
        }
    }
}

impl VaultConfig {
    /// Rejects settings the rest of the tool cannot work with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.history_capacity == 0 {
            return Err(ConfigError::Invalid(
                "history_capacity must be at least 1".to_string(),
            ));
        }
        if self.extensions.is_empty() {
            return Err(ConfigError::Invalid(
                "extensions must name at least one file extension".to_string(),
            ));
        }
        if let Some(folder) = &self.folder {
            if folder.is_absolute() {
                return Err(ConfigError::Invalid(format!(
                    "folder must be relative to the vault root: {}",
                    folder.display()
                )));
            }
        }
        Ok(())
    }
}

/// Global user configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct GlobalConfig {
    /// Default output format (text or json)
    pub default_format: OutputFormat,
}

/// Output format for commands
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Combined configuration (global + vault)
#[derive(Debug, Clone)]
pub struct Config {
    pub vault: VaultConfig,
    pub global: GlobalConfig,
    pub vault_root: Option<PathBuf>,
}

impl Config {
    /// Loads configuration for a specific vault
    pub fn for_vault(vault_root: &Path) -> Result<Self> {
        let global = Self::load_global()?;
        let vault = Self::load_vault_config(vault_root)?;

        Ok(Self {
            vault,
            global,
            vault_root: Some(vault_root.to_path_buf()),
        })
    }

    /// Returns the global config directory
    pub fn global_config_dir() -> Option<PathBuf> {
        ProjectDirs::from("dev", "zettel-forest", "zettel-forest")
            .map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Loads global configuration
    pub fn load_global() -> Result<GlobalConfig> {
        let config_dir = match Self::global_config_dir() {
            Some(dir) => dir,
            None => return Ok(GlobalConfig::default()),
        };

        let config_path = config_dir.join("config.toml");
        if !config_path.exists() {
            return Ok(GlobalConfig::default());
        }

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read global config: {}", config_path.display()))?;

        toml::from_str(&content)
            .map_err(|e| ConfigError::Parse(e.to_string()))
            .context("Failed to parse global config")
    }

    /// Loads vault configuration from a specific root
    fn load_vault_config(vault_root: &Path) -> Result<VaultConfig> {
        let config_path = vault_root.join(VAULT_DIR).join("config.toml");

        if !config_path.exists() {
            return Ok(VaultConfig::default());
        }

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read vault config: {}", config_path.display()))?;

        let config: VaultConfig = toml::from_str(&content)
            .map_err(|e| ConfigError::Parse(e.to_string()))
            .context("Failed to parse vault config")?;
        config
            .validate()
            .with_context(|| format!("Invalid vault config: {}", config_path.display()))?;

        Ok(config)
    }

    /// Finds the vault root by looking for a `.zettel/` directory
    pub fn find_vault_root() -> Option<PathBuf> {
        let current = std::env::current_dir().ok()?;
        Self::find_vault_root_from(&current)
    }

    /// Walks up from `start` looking for a `.zettel/` directory
    pub fn find_vault_root_from(start: &Path) -> Option<PathBuf> {
        let mut current = start.to_path_buf();

        loop {
            if current.join(VAULT_DIR).is_dir() {
                return Some(current);
            }

            if !current.pop() {
                return None;
            }
        }
    }
}
