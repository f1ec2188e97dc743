//! # Command-Line Interface
//!
//! User-facing CLI commands and output formatting.
//!
//! ## Command Groups
//!
//! | Group | Purpose | Examples |
//! |-------|---------|----------|
//! | Core | Vault setup | `init` |
//! | Query | Read the forest | `tree`, `list`, `show`, `next`, `check` |
//! | Edit | Restructure notes | `move`, `undo`, `redo`, `history`, `rm` |
//!
//! ## Output Formats
//!
//! All commands support `--format` flag:
//! - `text` (default) - Human-readable output
//! - `json` - Machine-parseable JSON
//!
//! ## Verbose Mode
//!
//! Use `--verbose` (or `-v`) for debug logs on stderr:
//! ```bash
//! zettel --verbose move 22 21
//! ```
//!
//! ## Entry Point
//!
//! Call [`run()`] to parse arguments and execute the appropriate command.

mod app;
mod edit;
mod output;
mod query;

pub use app::{run, Cli, Commands};
pub use output::{Output, OutputFormat};
