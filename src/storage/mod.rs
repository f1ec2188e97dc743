//! # Storage Layer
//!
//! Filesystem side of zettel-forest.
//!
//! ## Storage Formats
//!
//! | Data | Format | Location |
//! |------|--------|----------|
//! | Notes | Any file whose name carries an identifier | vault root or `folder` |
//! | History | JSON | `.zettel/history.json` |
//! | Config | TOML | `.zettel/config.toml` |
//!
//! ## Concurrency Safety
//!
//! - [`HistoryStore`] uses file locking (`fs2`) for concurrent access
//! - History writes are atomic (temp file + rename)
//! - [`FsPersistence`] never overwrites an existing note
//!
//! ## Vault Structure
//!
//! ```text
//! .zettel/
//! ├── config.toml           # Vault configuration
//! ├── history.json          # Undo/redo log (ignored by git)
//! └── .gitignore
//! ```

mod config;
mod history_store;
mod notes;
mod vault;

pub use config::{Config, ConfigError, GlobalConfig, OutputFormat, VaultConfig, VAULT_DIR};
pub use history_store::HistoryStore;
pub use notes::{FsPersistence, NoteDir};
pub use vault::{Vault, VaultError};
