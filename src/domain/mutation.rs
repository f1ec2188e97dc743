//! Hierarchy mutation engine
//!
//! Moving a node makes it the first child (`{parent}.1`) of another node and
//! rewrites the identifier prefix of everything in its identifier subtree.
//! [`request_move`] validates and plans without touching the graph;
//! [`apply_move`] executes a plan and emits one [`ManipulationCommand`].
//!
//! The command only stores the moved node's own before/after placement. The
//! subtree rewrite is recomputed from the live graph whenever a command is
//! replayed (see [`relocate`]), with the same rule used to plan the move.
//! For that replay to be exact, a move is refused while unrelated notes
//! already sit in the target's identifier subtree.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

use super::graph::{ZettelGraph, ZettelNode};
use super::identifier::Identifier;
use super::note::{NoteFile, NotePersistence, RenameRequest};

#[derive(Debug, Error, PartialEq)]
pub enum MoveError {
    #[error("Cannot move a node under itself: {0}")]
    SelfMove(String),

    #[error("Node not found: {0}")]
    NotFound(String),

    #[error("Cannot move {node} under {parent}: one is a descendant of the other")]
    CyclicMove { node: String, parent: String },

    /// The first child of a branch would be `21a.1`, which the identifier
    /// grammar cannot express, so the move is refused instead
    #[error("Branch notes cannot take children: {0}")]
    BranchParent(String),

    /// Notes already sit below the target identifier without hanging under a
    /// note that carries it; undo could not tell them from the moved subtree
    #[error("Cannot move under {parent}: {target} already has notes below it ({})", .notes.join(", "))]
    TargetOccupied {
        parent: String,
        target: String,
        notes: Vec<String>,
    },

    #[error("Move plan for {0} no longer matches the graph")]
    StalePlan(String),
}

/// One identifier change inside a move
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Rewrite {
    pub node_id: String,
    pub from: Identifier,
    pub to: Identifier,
}

/// Validated move, ready to apply
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MovePlan {
    pub node_id: String,
    pub parent_id: String,
    pub old_identifier: Identifier,
    pub new_identifier: Identifier,
    pub old_parent_id: Option<String>,
    /// The moved node first, then its identifier subtree
    pub rewrites: Vec<Rewrite>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandKind {
    Move,
}

/// Position of a node: its identifier and parent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placement {
    pub identifier: Identifier,
    pub parent_id: Option<String>,
}

/// Reversible record of a move
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManipulationCommand {
    pub kind: CommandKind,
    pub node_id: String,
    pub before: Placement,
    pub after: Placement,
    pub timestamp: DateTime<Utc>,
}

/// Graph change reported to the caller
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ChangeEvent {
    Reparented {
        node_id: String,
        from: Option<String>,
        to: Option<String>,
    },
    Renumbered {
        node_id: String,
        from: Identifier,
        to: Identifier,
    },
    /// A rewritten identifier is now carried by more than one node
    Collision {
        identifier: Identifier,
        node_ids: Vec<String>,
    },
}

/// A rename request the persistence layer rejected
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PersistenceFailure {
    pub node_id: String,
    pub reason: String,
}

/// Everything a mutation changed
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Applied {
    pub events: Vec<ChangeEvent>,
    pub renamed: Vec<RenameRequest>,
    pub failures: Vec<PersistenceFailure>,
    /// Node ids as they will be derived after the next rebuild, for nodes
    /// whose file was renamed
    pub id_changes: HashMap<String, String>,
}

impl Applied {
    pub fn renumbered(&self) -> impl Iterator<Item = (&str, &Identifier, &Identifier)> {
        self.events.iter().filter_map(|e| match e {
            ChangeEvent::Renumbered { node_id, from, to } => Some((node_id.as_str(), from, to)),
            _ => None,
        })
    }

    pub fn collisions(&self) -> impl Iterator<Item = (&Identifier, &[String])> {
        self.events.iter().filter_map(|e| match e {
            ChangeEvent::Collision {
                identifier,
                node_ids,
            } => Some((identifier, node_ids.as_slice())),
            _ => None,
        })
    }
}

/// Result of applying a move
#[derive(Debug, Clone, PartialEq)]
pub struct MoveOutcome {
    pub command: ManipulationCommand,
    pub applied: Applied,
}

/// Validates moving `node_id` under `parent_id` and plans the rewrite
///
/// Side-effect free; safe to call repeatedly (e.g. while hovering).
pub fn request_move(
    graph: &ZettelGraph,
    node_id: &str,
    parent_id: &str,
) -> Result<MovePlan, MoveError> {
    if node_id == parent_id {
        return Err(MoveError::SelfMove(node_id.to_string()));
    }

    let node = graph
        .get(node_id)
        .ok_or_else(|| MoveError::NotFound(node_id.to_string()))?;
    let parent = graph
        .get(parent_id)
        .ok_or_else(|| MoveError::NotFound(parent_id.to_string()))?;

    let related = node.identifier.is_descendant_or_equal(&parent.identifier)
        || parent.identifier.is_descendant_or_equal(&node.identifier);
    if related || is_linked_below(graph, parent_id, node_id) {
        return Err(MoveError::CyclicMove {
            node: node.identifier.to_string(),
            parent: parent.identifier.to_string(),
        });
    }

    let new_identifier = parent
        .identifier
        .child(1)
        .ok_or_else(|| MoveError::BranchParent(parent.identifier.to_string()))?;

    let rewrites = subtree_rewrites(graph, node, &new_identifier);
    let notes = occupants(graph, &new_identifier, &rewrites);
    if !notes.is_empty() {
        return Err(MoveError::TargetOccupied {
            parent: parent.identifier.to_string(),
            target: new_identifier.to_string(),
            notes,
        });
    }

    Ok(MovePlan {
        node_id: node_id.to_string(),
        parent_id: parent_id.to_string(),
        old_identifier: node.identifier.clone(),
        new_identifier,
        old_parent_id: node.parent_id.clone(),
        rewrites,
    })
}

/// Executes a plan produced by [`request_move`]
///
/// The plan is re-validated first; if the graph changed since it was made,
/// nothing is touched. Rename requests go out once per rewritten node and
/// their failures are reported without undoing the in-memory move.
pub fn apply_move(
    graph: &mut ZettelGraph,
    plan: &MovePlan,
    persistence: &mut dyn NotePersistence,
) -> Result<MoveOutcome, MoveError> {
    let fresh = request_move(graph, &plan.node_id, &plan.parent_id)?;
    if &fresh != plan {
        return Err(MoveError::StalePlan(plan.node_id.clone()));
    }

    let command = ManipulationCommand {
        kind: CommandKind::Move,
        node_id: plan.node_id.clone(),
        before: Placement {
            identifier: plan.old_identifier.clone(),
            parent_id: plan.old_parent_id.clone(),
        },
        after: Placement {
            identifier: plan.new_identifier.clone(),
            parent_id: Some(plan.parent_id.clone()),
        },
        timestamp: Utc::now(),
    };

    let applied = execute(
        graph,
        &plan.node_id,
        Some(&plan.parent_id),
        &plan.rewrites,
        persistence,
    );

    tracing::debug!(
        node = %plan.node_id,
        from = %plan.old_identifier,
        to = %plan.new_identifier,
        rewrites = plan.rewrites.len(),
        "applied move"
    );

    Ok(MoveOutcome { command, applied })
}

/// Puts a node at `placement`, recomputing its subtree rewrite from the
/// current graph
///
/// This is how history replays commands: undo relocates to the command's
/// `before` placement, redo to its `after` placement.
pub fn relocate(
    graph: &mut ZettelGraph,
    node_id: &str,
    placement: &Placement,
    persistence: &mut dyn NotePersistence,
) -> Result<Applied, MoveError> {
    let node = graph
        .get(node_id)
        .ok_or_else(|| MoveError::NotFound(node_id.to_string()))?;

    if let Some(parent_id) = &placement.parent_id {
        if parent_id == node_id {
            return Err(MoveError::SelfMove(node_id.to_string()));
        }
        if !graph.contains(parent_id) {
            return Err(MoveError::NotFound(parent_id.clone()));
        }
        if is_linked_below(graph, parent_id, node_id) {
            return Err(MoveError::CyclicMove {
                node: node.identifier.to_string(),
                parent: parent_id.clone(),
            });
        }
    }

    let rewrites = subtree_rewrites(graph, node, &placement.identifier);
    Ok(execute(
        graph,
        node_id,
        placement.parent_id.as_deref(),
        &rewrites,
        persistence,
    ))
}

/// True if `candidate` sits somewhere below `ancestor` via parent links
fn is_linked_below(graph: &ZettelGraph, candidate: &str, ancestor: &str) -> bool {
    let mut seen = HashSet::new();
    let mut current = graph.get(candidate).and_then(|n| n.parent_id.as_deref());
    while let Some(id) = current {
        if id == ancestor {
            return true;
        }
        if !seen.insert(id) {
            return false;
        }
        current = graph.get(id).and_then(|n| n.parent_id.as_deref());
    }
    false
}

/// Rewrites for moving `node` to `new_identifier`
///
/// Covers the node itself and every node in its identifier subtree. Other
/// nodes carrying the same identifier are left alone, as is anything linked
/// below them.
fn subtree_rewrites(
    graph: &ZettelGraph,
    node: &ZettelNode,
    new_identifier: &Identifier,
) -> Vec<Rewrite> {
    let old = &node.identifier;
    let mut rewrites = Vec::new();
    if old != new_identifier {
        rewrites.push(Rewrite {
            node_id: node.id.clone(),
            from: old.clone(),
            to: new_identifier.clone(),
        });
    }

    let foreign = held_by_others(graph, old, &node.id);

    for other in graph.nodes() {
        if other.id == node.id
            || foreign.contains(other.id.as_str())
            || !other.identifier.in_subtree_of(old)
        {
            continue;
        }
        match other.identifier.rebase(old, new_identifier) {
            Some(to) if to != other.identifier => rewrites.push(Rewrite {
                node_id: other.id.clone(),
                from: other.identifier.clone(),
                to,
            }),
            Some(_) => {}
            None => tracing::warn!(
                node = %other.id,
                identifier = %other.identifier,
                under = %new_identifier,
                "identifier cannot follow its parent under a branch; left unchanged"
            ),
        }
    }

    rewrites
}

/// Nodes carrying `identifier` other than `except`, plus everything linked
/// below them
fn held_by_others<'a>(
    graph: &'a ZettelGraph,
    identifier: &Identifier,
    except: &str,
) -> HashSet<&'a str> {
    let mut held = HashSet::new();
    for holder in graph.find_by_identifier(identifier) {
        if holder.id == except {
            continue;
        }
        held.insert(holder.id.as_str());
        held.extend(graph.descendants(&holder.id).into_iter().map(|n| n.id.as_str()));
    }
    held
}

/// Identifiers of nodes that a replay of this move would wrongly pull along
///
/// These sit in the identifier subtree of `target` before the move, outside
/// the planned rewrites and not linked below an existing holder of `target`.
fn occupants(graph: &ZettelGraph, target: &Identifier, rewrites: &[Rewrite]) -> Vec<String> {
    let held = held_by_others(graph, target, "");
    let moving: HashSet<&str> = rewrites.iter().map(|r| r.node_id.as_str()).collect();

    let mut found: Vec<&Identifier> = graph
        .nodes()
        .filter(|n| n.identifier.in_subtree_of(target))
        .filter(|n| !held.contains(n.id.as_str()) && !moving.contains(n.id.as_str()))
        .map(|n| &n.identifier)
        .collect();
    found.sort();
    found.dedup();
    found.into_iter().map(ToString::to_string).collect()
}

fn execute(
    graph: &mut ZettelGraph,
    node_id: &str,
    new_parent: Option<&str>,
    rewrites: &[Rewrite],
    persistence: &mut dyn NotePersistence,
) -> Applied {
    let mut applied = Applied::default();

    let old_parent = graph.detach(node_id);

    for rewrite in rewrites {
        if let Some(node) = graph.get_mut(&rewrite.node_id) {
            node.set_identifier(rewrite.to.clone());
            applied.events.push(ChangeEvent::Renumbered {
                node_id: rewrite.node_id.clone(),
                from: rewrite.from.clone(),
                to: rewrite.to.clone(),
            });
        }
    }

    graph.attach(node_id, new_parent);
    let new_parent = graph.get(node_id).and_then(|n| n.parent_id.clone());
    if old_parent != new_parent {
        applied.events.push(ChangeEvent::Reparented {
            node_id: node_id.to_string(),
            from: old_parent,
            to: new_parent,
        });
    }

    let mut reported = HashSet::new();
    for rewrite in rewrites {
        if !reported.insert(&rewrite.to) {
            continue;
        }
        let carriers = graph.find_by_identifier(&rewrite.to);
        if carriers.len() > 1 {
            let node_ids: Vec<_> = carriers.iter().map(|n| n.id.clone()).collect();
            tracing::warn!(identifier = %rewrite.to, nodes = ?node_ids, "move produced a duplicate identifier");
            applied.events.push(ChangeEvent::Collision {
                identifier: rewrite.to.clone(),
                node_ids,
            });
        }
    }

    request_renames(graph, rewrites, persistence, &mut applied);
    applied
}

fn request_renames(
    graph: &mut ZettelGraph,
    rewrites: &[Rewrite],
    persistence: &mut dyn NotePersistence,
    applied: &mut Applied,
) {
    let mut touched: Vec<String> = Vec::new();

    for rewrite in rewrites {
        let Some(file) = graph.get(&rewrite.node_id).map(|n| n.file.clone()) else {
            continue;
        };
        // The file may already carry the target, e.g. after a failed rename
        let Some(target) = file.renumbered(&rewrite.from, &rewrite.to) else {
            tracing::debug!(node = %rewrite.node_id, path = %file.path().display(), "file name does not carry the old identifier; no rename");
            continue;
        };

        let request = RenameRequest {
            node_id: rewrite.node_id.clone(),
            from: file.clone(),
            to: target.clone(),
        };

        match persistence.rename(&request) {
            Ok(()) => {
                touched.extend(repoint_file(graph, &file, &target));
                applied.renamed.push(request);
            }
            Err(e) => {
                tracing::warn!(node = %rewrite.node_id, error = %e, "rename failed; in-memory move kept");
                applied.failures.push(PersistenceFailure {
                    node_id: rewrite.node_id.clone(),
                    reason: e.to_string(),
                });
            }
        }
    }

    for id in touched {
        if let Some(node) = graph.get(&id) {
            let derived = ZettelNode::derive_id(&node.identifier, &node.file.basename());
            if derived != id {
                applied.id_changes.insert(id, derived);
            }
        }
    }
}

/// Points every node backed by `from` at `to`, returning their ids
fn repoint_file(graph: &mut ZettelGraph, from: &NoteFile, to: &NoteFile) -> Vec<String> {
    let ids: Vec<String> = graph
        .nodes()
        .filter(|n| &n.file == from)
        .map(|n| n.id.clone())
        .collect();
    for id in &ids {
        if let Some(node) = graph.get_mut(id) {
            node.file = to.clone();
        }
    }
    ids
}
