//! Domain models for zettel-forest
//!
//! Identifier grammar, the note forest, moves and their history. Nothing in
//! here touches the filesystem; renames go through [`NotePersistence`].

mod graph;
mod history;
mod identifier;
mod mutation;
mod note;

pub use graph::{BuildReport, GraphError, ParseCollision, ZettelGraph, ZettelNode};
pub use history::{CommandHistory, HistoryError, Replay, DEFAULT_CAPACITY};
pub use identifier::{compare_siblings, Identifier, IdentifierError, IdentifierMatch, NodeKind};
pub use mutation::{
    apply_move, relocate, request_move, Applied, ChangeEvent, CommandKind, ManipulationCommand,
    MoveError, MoveOutcome, MovePlan, PersistenceFailure, Placement, Rewrite,
};
pub use note::{Detached, NoteFile, NotePersistence, PersistenceError, RenameRequest};
