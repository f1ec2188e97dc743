//! Note files on disk
//!
//! [`NoteDir`] lists note files below a directory. [`FsPersistence`] carries
//! out the rename and delete requests issued by the move engine.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::domain::{NoteFile, NotePersistence, PersistenceError, RenameRequest};

/// Lister for note files below a directory
pub struct NoteDir {
    dir: PathBuf,
    extensions: Vec<String>,
}

impl NoteDir {
    /// Creates a lister for `dir`, accepting the given extensions
    pub fn new(dir: impl Into<PathBuf>, extensions: Vec<String>) -> Self {
        let extensions = extensions
            .into_iter()
            .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
            .collect();
        Self {
            dir: dir.into(),
            extensions,
        }
    }

    /// Lists note files recursively, sorted by path
    ///
    /// Hidden entries are skipped, which also keeps `.zettel` out.
    pub fn list(&self) -> Result<Vec<NoteFile>> {
        let mut files = Vec::new();
        if self.dir.exists() {
            self.walk(&self.dir, &mut files)?;
        }
        files.sort();
        Ok(files.into_iter().map(NoteFile::new).collect())
    }

    fn walk(&self, dir: &Path, files: &mut Vec<PathBuf>) -> Result<()> {
        for entry in fs::read_dir(dir)
            .with_context(|| format!("Failed to read directory: {}", dir.display()))?
        {
            let entry = entry.context("Failed to read directory entry")?;
            let path = entry.path();
            let name = entry.file_name();
            let name = name.to_string_lossy();

            if name.starts_with('.') {
                continue;
            }

            let file_type = entry
                .file_type()
                .with_context(|| format!("Failed to inspect: {}", path.display()))?;

            if file_type.is_dir() {
                self.walk(&path, files)?;
            } else if self.accepts(&path) {
                files.push(path);
            }
        }
        Ok(())
    }

    fn accepts(&self, path: &Path) -> bool {
        path.extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
            .is_some_and(|e| self.extensions.contains(&e))
    }
}

/// Note persistence backed by the real filesystem
///
/// Renames never overwrite an existing file.
#[derive(Debug, Default)]
pub struct FsPersistence;

impl FsPersistence {
    pub fn new() -> Self {
        Self
    }
}

impl NotePersistence for FsPersistence {
    fn rename(&mut self, request: &RenameRequest) -> Result<(), PersistenceError> {
        let from = request.from.path();
        let to = request.to.path();

        if from == to {
            return Ok(());
        }
        if to.exists() {
            return Err(PersistenceError::TargetExists(to.to_path_buf()));
        }

        fs::rename(from, to).map_err(|e| PersistenceError::Rename {
            from: from.to_path_buf(),
            to: to.to_path_buf(),
            reason: e.to_string(),
        })?;

        tracing::debug!(from = %from.display(), to = %to.display(), "renamed note");
        Ok(())
    }

    fn delete(&mut self, note: &NoteFile) -> Result<(), PersistenceError> {
        fs::remove_file(note.path()).map_err(|e| PersistenceError::Delete {
            path: note.path().to_path_buf(),
            reason: e.to_string(),
        })?;

        tracing::debug!(path = %note.path().display(), "deleted note");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(path: &Path) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, "").unwrap();
    }

    fn md() -> Vec<String> {
        vec!["md".to_string()]
    }

    #[test]
    fn list_missing_dir_is_empty() {
        let dir = TempDir::new().unwrap();
        let notes = NoteDir::new(dir.path().join("nope"), md());
        assert!(notes.list().unwrap().is_empty());
    }

    #[test]
    fn list_recurses_and_sorts() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("b/2 - Two.md"));
        touch(&dir.path().join("1 - One.md"));
        touch(&dir.path().join("a/1.1 - Sub.md"));

        let listed: Vec<_> = NoteDir::new(dir.path(), md())
            .list()
            .unwrap()
            .into_iter()
            .map(|n| n.basename())
            .collect();

        assert_eq!(listed, vec!["1 - One", "1.1 - Sub", "2 - Two"]);
    }

    #[test]
    fn list_skips_hidden_and_vault_dir() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join(".zettel/3.md"));
        touch(&dir.path().join(".obsidian/4.md"));
        touch(&dir.path().join(".5.md"));
        touch(&dir.path().join("6.md"));

        let listed = NoteDir::new(dir.path(), md()).list().unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].basename(), "6");
    }

    #[test]
    fn list_filters_extensions() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("1.md"));
        touch(&dir.path().join("2.TXT"));
        touch(&dir.path().join("3.png"));
        touch(&dir.path().join("4"));

        let listed = NoteDir::new(dir.path(), vec!["md".to_string(), ".txt".to_string()])
            .list()
            .unwrap();
        assert_eq!(listed.len(), 2);
    }

    #[test]
    fn rename_moves_file() {
        let dir = TempDir::new().unwrap();
        let from = dir.path().join("22 - Beta.md");
        let to = dir.path().join("21.1 - Beta.md");
        fs::write(&from, "body").unwrap();

        let request = RenameRequest {
            node_id: "22-22 - Beta".to_string(),
            from: NoteFile::new(&from),
            to: NoteFile::new(&to),
        };
        FsPersistence::new().rename(&request).unwrap();

        assert!(!from.exists());
        assert_eq!(fs::read_to_string(&to).unwrap(), "body");
    }

    #[test]
    fn rename_refuses_to_overwrite() {
        let dir = TempDir::new().unwrap();
        let from = dir.path().join("22.md");
        let to = dir.path().join("21.1.md");
        fs::write(&from, "new").unwrap();
        fs::write(&to, "old").unwrap();

        let request = RenameRequest {
            node_id: "22-22".to_string(),
            from: NoteFile::new(&from),
            to: NoteFile::new(&to),
        };
        let result = FsPersistence::new().rename(&request);

        assert!(matches!(result, Err(PersistenceError::TargetExists(_))));
        assert_eq!(fs::read_to_string(&to).unwrap(), "old");
        assert!(from.exists());
    }

    #[test]
    fn rename_missing_source_fails() {
        let dir = TempDir::new().unwrap();
        let request = RenameRequest {
            node_id: "9-9".to_string(),
            from: NoteFile::new(dir.path().join("9.md")),
            to: NoteFile::new(dir.path().join("1.1.md")),
        };
        let result = FsPersistence::new().rename(&request);
        assert!(matches!(result, Err(PersistenceError::Rename { .. })));
    }

    #[test]
    fn delete_removes_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("5.md");
        fs::write(&path, "").unwrap();

        let mut fs_persistence = FsPersistence::new();
        fs_persistence.delete(&NoteFile::new(&path)).unwrap();
        assert!(!path.exists());

        let again = fs_persistence.delete(&NoteFile::new(&path));
        assert!(matches!(again, Err(PersistenceError::Delete { .. })));
    }
}
