//! JSON storage for the move history
//!
//! The history lives in `.zettel/history.json`. Writes go through a temp file
//! and an atomic rename; file locks keep concurrent invocations apart.

use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use fs2::FileExt;

use super::config::VAULT_DIR;
use crate::domain::CommandHistory;

/// Store for the persisted command history
pub struct HistoryStore {
    path: PathBuf,
}

impl HistoryStore {
    /// Creates a new history store at the given path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Creates the default store for a vault
    pub fn for_vault(vault_root: &Path) -> Self {
        Self::new(vault_root.join(VAULT_DIR).join("history.json"))
    }

    /// Returns the path to the store file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the history, or an empty one with `capacity` if none was saved
    ///
    /// The configured capacity wins over the saved one; older entries beyond
    /// it are dropped.
    pub fn load(&self, capacity: usize) -> Result<CommandHistory> {
        if !self.path.exists() {
            return Ok(CommandHistory::new(capacity));
        }

        let file = File::open(&self.path)
            .with_context(|| format!("Failed to open history: {}", self.path.display()))?;

        file.lock_shared()
            .context("Failed to acquire read lock on history")?;

        let mut history: CommandHistory = serde_json::from_reader(BufReader::new(&file))
            .with_context(|| format!("Failed to parse history: {}", self.path.display()))?;

        history.set_capacity(capacity);
        tracing::debug!(entries = history.len(), cursor = ?history.cursor(), "loaded history");
        Ok(history)
    }

    /// Writes the history (full rewrite)
    pub fn save(&self, history: &CommandHistory) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        let temp_path = self.path.with_extension("json.tmp");

        {
            let file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(&temp_path)
                .with_context(|| format!("Failed to create temp file: {}", temp_path.display()))?;

            file.lock_exclusive()
                .context("Failed to acquire write lock on history")?;

            let mut writer = BufWriter::new(&file);
            serde_json::to_writer_pretty(&mut writer, history)
                .context("Failed to serialize history")?;
            writeln!(writer).context("Failed to write history")?;
            writer.flush().context("Failed to flush history")?;
        }

        fs::rename(&temp_path, &self.path).with_context(|| {
            format!(
                "Failed to rename {} to {}",
                temp_path.display(),
                self.path.display()
            )
        })?;

        Ok(())
    }
}
