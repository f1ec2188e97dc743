//! Main CLI application structure

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::Level;

use super::output::{Output, OutputFormat};
use super::{edit, query};
use crate::storage::{Config, Vault};

#[derive(Parser)]
#[command(name = "zettel")]
#[command(author, version, about = "Folgezettel trees from note file names")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output format (defaults to the global config, then text)
    #[arg(long, short = 'f', global = true)]
    pub format: Option<OutputFormat>,

    /// Enable debug logging on stderr
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new vault
    Init {
        /// Path to initialize (defaults to current directory)
        #[arg(default_value = ".")]
        path: String,
    },

    /// Show the note forest
    Tree,

    /// List all notes
    List,

    /// Show a note with its parent, children and siblings
    Show {
        /// Node id or identifier
        node: String,
    },

    /// Move a note under another note, renumbering its subtree
    Move {
        /// Node id or identifier of the note to move
        node: String,

        /// Node id or identifier of the new parent
        parent: String,

        /// Preview the renumbering without renaming anything
        #[arg(long)]
        dry_run: bool,
    },

    /// Undo the last move
    Undo,

    /// Redo the last undone move
    Redo,

    /// Show the move history
    History {
        /// Forget all recorded moves
        #[arg(long)]
        clear: bool,
    },

    /// Suggest the next free identifier after a note
    Next {
        /// Node id or identifier
        node: String,

        /// Suggest a branch (`21a`) instead of a sequence successor (`22`)
        #[arg(long)]
        branch: bool,
    },

    /// Verify the forest and report duplicate identifiers
    Check,

    /// Delete a note file
    Rm {
        /// Node id or identifier
        node: String,
    },
}

/// Installs the stderr log subscriber
fn init_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::WARN };
    // A subscriber may already be set when embedded; keep that one
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(level)
        .with_target(false)
        .try_init();
}

/// Main entry point for the CLI
pub fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let format = match cli.format {
        Some(format) => format,
        None => Config::load_global()?.default_format.into(),
    };
    let output = Output::new(format);

    match cli.command {
        Commands::Init { path } => {
            let vault = Vault::init(&path)?;
            tracing::debug!(dir = %vault.vault_dir().display(), "created vault directory");
            if output.is_json() {
                output.data(&serde_json::json!({
                    "root": vault.root(),
                    "config": vault.vault_dir().join("config.toml"),
                }));
            } else {
                output.success(&format!("Initialized zettel vault at {}", vault.root().display()));
            }
        }

        Commands::Tree => query::tree(&output)?,
        Commands::List => query::list(&output)?,
        Commands::Show { node } => query::show(&output, &node)?,
        Commands::Next { node, branch } => query::next(&output, &node, branch)?,
        Commands::Check => query::check(&output)?,

        Commands::Move {
            node,
            parent,
            dry_run,
        } => edit::move_node(&output, &node, &parent, dry_run)?,
        Commands::Undo => edit::undo(&output)?,
        Commands::Redo => edit::redo(&output)?,
        Commands::History { clear } => edit::history(&output, clear)?,
        Commands::Rm { node } => edit::remove(&output, &node)?,
    }

    tracing::debug!("command completed");
    Ok(())
}
