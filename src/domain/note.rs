//! Note file handles and the persistence seam
//!
//! The core never opens note files. It holds a [`NoteFile`] handle per node
//! and asks a [`NotePersistence`] implementation to rename or delete files
//! when identifiers change. Requests are best-effort: a failed rename is
//! reported but never rolls back the in-memory graph.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::identifier::Identifier;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("Failed to rename {from} to {to}: {reason}")]
    Rename {
        from: PathBuf,
        to: PathBuf,
        reason: String,
    },

    #[error("Refusing to overwrite existing note: {0}")]
    TargetExists(PathBuf),

    #[error("Failed to delete {path}: {reason}")]
    Delete { path: PathBuf, reason: String },
}

/// Handle to a note file on disk
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NoteFile {
    path: PathBuf,
}

impl NoteFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File name without directory and extension
    pub fn basename(&self) -> String {
        self.path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Computes the path this note takes when `old` is renumbered to `new`
    ///
    /// The first occurrence of `old` in the basename is replaced, the rest of
    /// the name, the extension and the directory are kept. Returns None if
    /// the basename does not carry `old`.
    pub fn renumbered(&self, old: &Identifier, new: &Identifier) -> Option<NoteFile> {
        let basename = self.basename();
        let found = Identifier::matches(&basename)
            .into_iter()
            .find(|m| &m.identifier == old)?;

        let mut renamed = String::with_capacity(basename.len() + 4);
        renamed.push_str(&basename[..found.range.start]);
        renamed.push_str(&new.to_string());
        renamed.push_str(&basename[found.range.end..]);

        if let Some(ext) = self.path.extension() {
            renamed.push('.');
            renamed.push_str(&ext.to_string_lossy());
        }

        Some(NoteFile::new(self.path.with_file_name(renamed)))
    }
}

/// A request to move a note file after its identifier changed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenameRequest {
    pub node_id: String,
    pub from: NoteFile,
    pub to: NoteFile,
}

/// Filesystem side of note mutations
pub trait NotePersistence {
    /// Renames a note file
    fn rename(&mut self, request: &RenameRequest) -> Result<(), PersistenceError>;

    /// Deletes a note file
    fn delete(&mut self, note: &NoteFile) -> Result<(), PersistenceError>;
}

/// Persistence that accepts every request without touching anything
///
/// Used for dry runs and pure in-memory work.
#[derive(Debug, Default, Clone, Copy)]
pub struct Detached;

impl NotePersistence for Detached {
    fn rename(&mut self, _request: &RenameRequest) -> Result<(), PersistenceError> {
        Ok(())
    }

    fn delete(&mut self, _note: &NoteFile) -> Result<(), PersistenceError> {
        Ok(())
    }
}
