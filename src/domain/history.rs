//! Linear undo/redo history of move commands
//!
//! The log keeps at most `capacity` commands. Recording after an undo drops
//! the undone tail, so redo never branches. Replaying a command relocates
//! its node and recomputes the subtree rewrite from the current graph.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

use super::graph::ZettelGraph;
use super::mutation::{relocate, Applied, ManipulationCommand, MoveError};
use super::note::NotePersistence;

/// Default number of commands kept in the log
pub const DEFAULT_CAPACITY: usize = 50;

#[derive(Debug, Error, PartialEq)]
pub enum HistoryError {
    #[error("Nothing to undo")]
    NothingToUndo,

    #[error("Nothing to redo")]
    NothingToRedo,

    #[error("Failed to replay command: {0}")]
    Replay(#[from] MoveError),
}

/// A command replayed by undo or redo, with what it changed
#[derive(Debug, Clone, PartialEq)]
pub struct Replay {
    pub command: ManipulationCommand,
    pub applied: Applied,
}

/// Bounded command log with a cursor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandHistory {
    entries: Vec<ManipulationCommand>,
    /// Number of entries currently in effect; the cursor is `applied - 1`
    applied: usize,
    capacity: usize,
}

impl Default for CommandHistory {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl CommandHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Vec::new(),
            applied: 0,
            capacity: capacity.max(1),
        }
    }

    /// Appends a command, discarding any undone commands after the cursor
    pub fn record(&mut self, command: ManipulationCommand) {
        self.entries.truncate(self.applied);
        self.entries.push(command);
        self.applied += 1;

        if self.entries.len() > self.capacity {
            let overflow = self.entries.len() - self.capacity;
            self.entries.drain(..overflow);
            self.applied -= overflow;
        }
    }

    /// Reverts the command at the cursor and moves the cursor back
    ///
    /// If the replay fails the cursor stays where it was.
    pub fn undo(
        &mut self,
        graph: &mut ZettelGraph,
        persistence: &mut dyn NotePersistence,
    ) -> Result<Replay, HistoryError> {
        if !self.can_undo() {
            return Err(HistoryError::NothingToUndo);
        }
        let command = self.entries[self.applied - 1].clone();
        let applied = relocate(graph, &command.node_id, &command.before, persistence)?;
        self.applied -= 1;

        tracing::debug!(node = %command.node_id, to = %command.before.identifier, "undid move");
        Ok(Replay { command, applied })
    }

    /// Moves the cursor forward and re-applies that command
    pub fn redo(
        &mut self,
        graph: &mut ZettelGraph,
        persistence: &mut dyn NotePersistence,
    ) -> Result<Replay, HistoryError> {
        if !self.can_redo() {
            return Err(HistoryError::NothingToRedo);
        }
        let command = self.entries[self.applied].clone();
        let applied = relocate(graph, &command.node_id, &command.after, persistence)?;
        self.applied += 1;

        tracing::debug!(node = %command.node_id, to = %command.after.identifier, "redid move");
        Ok(Replay { command, applied })
    }

    pub fn can_undo(&self) -> bool {
        self.applied > 0
    }

    pub fn can_redo(&self) -> bool {
        self.applied < self.entries.len()
    }

    /// Index of the last applied command, or None when nothing can be undone
    pub fn cursor(&self) -> Option<usize> {
        self.applied.checked_sub(1)
    }

    pub fn entries(&self) -> &[ManipulationCommand] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Changes the capacity, dropping the oldest commands if needed
    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity.max(1);
        self.applied = self.applied.min(self.entries.len());
        if self.entries.len() > self.capacity {
            let overflow = self.entries.len() - self.capacity;
            self.entries.drain(..overflow);
            self.applied = self.applied.saturating_sub(overflow);
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.applied = 0;
    }

    /// Rewrites node ids referenced by the log
    ///
    /// Node ids derive from file names, so after files are renamed the next
    /// rebuilt graph knows the nodes under new ids.
    pub fn remap_node_ids(&mut self, changes: &HashMap<String, String>) {
        if changes.is_empty() {
            return;
        }
        let remap = |id: &mut String| {
            if let Some(new_id) = changes.get(id.as_str()) {
                *id = new_id.clone();
            }
        };
        for command in &mut self.entries {
            remap(&mut command.node_id);
            if let Some(parent) = command.before.parent_id.as_mut() {
                remap(parent);
            }
            if let Some(parent) = command.after.parent_id.as_mut() {
                remap(parent);
            }
        }
    }
}
