//! Vault management
//!
//! A vault is a directory tree marked by `.zettel/`. It owns the
//! configuration, the note lister and the persisted move history.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use thiserror::Error;

use super::config::VAULT_DIR;
use super::{Config, FsPersistence, HistoryStore, NoteDir};
use crate::domain::{BuildReport, ZettelGraph};

#[derive(Debug, Error)]
pub enum VaultError {
    #[error("Not in a zettel vault. Run 'zettel init' first.")]
    NotInVault,

    #[error("Notes folder does not exist: {0}")]
    MissingFolder(PathBuf),
}

const DEFAULT_CONFIG: &str = r#"# zettel-forest vault configuration

# Subfolder holding the notes, relative to the vault root
# folder = "notes"

# File extensions treated as notes
extensions = ["md"]

# Number of moves kept for undo
history_capacity = 50
"#;

const GITIGNORE: &str = r#"# Move history is local to each checkout
history.json
history.json.tmp
"#;

/// A zettel vault
pub struct Vault {
    root: PathBuf,
    config: Config,
}

impl Vault {
    /// Opens an existing vault at the given path
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();

        if !root.join(VAULT_DIR).is_dir() {
            return Err(VaultError::NotInVault.into());
        }

        let config = Config::for_vault(&root)?;

        Ok(Self { root, config })
    }

    /// Opens the vault at the current directory or a parent
    pub fn open_current() -> Result<Self> {
        let root = Config::find_vault_root().ok_or(VaultError::NotInVault)?;

        Self::open(root)
    }

    /// Initializes a new vault at the given path
    ///
    /// Existing configuration is left alone, so running it twice is harmless.
    pub fn init(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let vault_dir = root.join(VAULT_DIR);

        fs::create_dir_all(&vault_dir).with_context(|| {
            format!("Failed to create {} directory: {}", VAULT_DIR, vault_dir.display())
        })?;

        let config_path = vault_dir.join("config.toml");
        if !config_path.exists() {
            fs::write(&config_path, DEFAULT_CONFIG)
                .with_context(|| format!("Failed to write config: {}", config_path.display()))?;
        }

        let gitignore_path = vault_dir.join(".gitignore");
        if !gitignore_path.exists() {
            fs::write(&gitignore_path, GITIGNORE).with_context(|| {
                format!("Failed to write .gitignore: {}", gitignore_path.display())
            })?;
        }

        tracing::debug!(root = %root.display(), "initialized vault");
        Self::open(root)
    }

    /// Returns the vault root path
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the .zettel directory path
    pub fn vault_dir(&self) -> PathBuf {
        self.root.join(VAULT_DIR)
    }

    /// Returns the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Directory scanned for notes
    pub fn notes_dir(&self) -> PathBuf {
        match &self.config.vault.folder {
            Some(folder) => self.root.join(folder),
            None => self.root.clone(),
        }
    }

    /// Returns the note lister
    pub fn note_dir(&self) -> NoteDir {
        NoteDir::new(self.notes_dir(), self.config.vault.extensions.clone())
    }

    /// Returns the filesystem persistence for note renames
    pub fn persistence(&self) -> FsPersistence {
        FsPersistence::new()
    }

    /// Returns the history store
    pub fn history_store(&self) -> HistoryStore {
        HistoryStore::for_vault(&self.root)
    }

    /// Lists the notes and builds the forest
    pub fn load_graph(&self) -> Result<BuildReport> {
        let notes_dir = self.notes_dir();
        if !notes_dir.is_dir() {
            return Err(VaultError::MissingFolder(notes_dir).into());
        }

        let files = self.note_dir().list()?;
        let report = ZettelGraph::build(files);
        tracing::debug!(
            nodes = report.graph.len(),
            skipped = report.skipped.len(),
            "loaded vault graph"
        );
        Ok(report)
    }

    /// Returns a path relative to the vault root
    pub fn relative_path(&self, path: &Path) -> Option<PathBuf> {
        path.strip_prefix(&self.root).ok().map(|p| p.to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn init_creates_structure() {
        let dir = TempDir::new().unwrap();
        let vault = Vault::init(dir.path()).unwrap();

        assert!(vault.vault_dir().is_dir());
        assert!(vault.vault_dir().join("config.toml").is_file());
        assert!(vault.vault_dir().join(".gitignore").is_file());
    }

    #[test]
    fn default_config_file_parses() {
        let dir = TempDir::new().unwrap();
        let vault = Vault::init(dir.path()).unwrap();

        assert_eq!(vault.config().vault.history_capacity, 50);
        assert_eq!(vault.config().vault.extensions, vec!["md"]);
    }

    #[test]
    fn init_is_idempotent() {
        let dir = TempDir::new().unwrap();

        Vault::init(dir.path()).unwrap();
        fs::write(
            dir.path().join(VAULT_DIR).join("config.toml"),
            "history_capacity = 5\n",
        )
        .unwrap();
        let vault = Vault::init(dir.path()).unwrap();

        assert_eq!(vault.config().vault.history_capacity, 5);
    }

    #[test]
    fn open_non_vault_fails() {
        let dir = TempDir::new().unwrap();
        assert!(Vault::open(dir.path()).is_err());
    }

    #[test]
    fn notes_dir_follows_folder_setting() {
        let dir = TempDir::new().unwrap();
        Vault::init(dir.path()).unwrap();
        fs::write(
            dir.path().join(VAULT_DIR).join("config.toml"),
            "folder = \"zk\"\n",
        )
        .unwrap();

        let vault = Vault::open(dir.path()).unwrap();
        assert_eq!(vault.notes_dir(), dir.path().join("zk"));
        assert!(vault.load_graph().is_err());

        fs::create_dir_all(dir.path().join("zk")).unwrap();
        fs::write(dir.path().join("zk").join("1 - Start.md"), "").unwrap();
        fs::write(dir.path().join("2 - Outside.md"), "").unwrap();

        let report = vault.load_graph().unwrap();
        assert_eq!(report.graph.len(), 1);
    }

    #[test]
    fn load_graph_builds_forest() {
        let dir = TempDir::new().unwrap();
        let vault = Vault::init(dir.path()).unwrap();
        for name in ["21 - Root.md", "21.1 - Child.md", "readme.md"] {
            fs::write(dir.path().join(name), "").unwrap();
        }

        let report = vault.load_graph().unwrap();
        assert_eq!(report.graph.len(), 2);
        assert_eq!(report.skipped.len(), 1);
        report.graph.check().unwrap();
    }

    #[test]
    fn relative_path() {
        let dir = TempDir::new().unwrap();
        let vault = Vault::init(dir.path()).unwrap();

        let abs_path = dir.path().join("sub").join("1.md");
        assert_eq!(vault.relative_path(&abs_path), Some(PathBuf::from("sub/1.md")));
    }
}
