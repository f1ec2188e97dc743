//! zettel-forest - Folgezettel trees from note file names
//!
//! Notes are named after Luhmann-style identifiers (`21`, `21.1`, `21.1a`).
//! The crate parses those names into a forest, moves notes between parents
//! while renumbering whole subtrees, and keeps an undoable command history.

pub mod cli;
pub mod domain;
pub mod storage;

pub use domain::{CommandHistory, Identifier, NodeKind, ZettelGraph, ZettelNode};
