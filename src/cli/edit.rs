//! Edit commands (move, undo, redo, history, rm)
//!
//! Every command that changes identifiers renames the note files, records
//! the move and saves the history before returning.

use anyhow::Result;
use serde_json::Value;

use super::output::Output;
use crate::domain::{
    apply_move, request_move, Applied, CommandHistory, ManipulationCommand, MovePlan,
    NotePersistence, ZettelGraph,
};
use crate::storage::{HistoryStore, Vault};

/// A vault with its forest and history loaded
struct Session {
    vault: Vault,
    graph: ZettelGraph,
    history: CommandHistory,
    store: HistoryStore,
}

impl Session {
    fn open() -> Result<Self> {
        let vault = Vault::open_current()?;
        let graph = vault.load_graph()?.graph;
        let store = vault.history_store();
        let history = store.load(vault.config().vault.history_capacity)?;

        Ok(Self {
            vault,
            graph,
            history,
            store,
        })
    }

    /// Saves the history, following any node ids changed by renames
    fn save(&mut self, applied: &Applied) -> Result<()> {
        self.history.remap_node_ids(&applied.id_changes);
        self.store.save(&self.history)
    }
}

/// Move a note under another note
pub fn move_node(output: &Output, node_ref: &str, parent_ref: &str, dry_run: bool) -> Result<()> {
    let mut session = Session::open()?;
    let node_id = session.graph.resolve(node_ref)?.id.clone();
    let parent_id = session.graph.resolve(parent_ref)?.id.clone();

    let plan = request_move(&session.graph, &node_id, &parent_id)?;

    if dry_run {
        print_plan(output, &session.graph, &plan);
        return Ok(());
    }

    let mut persistence = session.vault.persistence();
    let outcome = apply_move(&mut session.graph, &plan, &mut persistence)?;
    session.history.record(outcome.command.clone());
    session.save(&outcome.applied)?;

    let parent_label = session
        .graph
        .get(&parent_id)
        .map(|p| format!("{} {}", p.identifier, p.title))
        .unwrap_or_else(|| parent_id.clone());

    if output.is_json() {
        output.data(&command_json(&outcome.command, &outcome.applied));
    } else {
        output.success(&format!(
            "Moved {} -> {} under {}",
            plan.old_identifier, plan.new_identifier, parent_label
        ));
        print_applied(output, &outcome.applied);
    }

    Ok(())
}

fn print_plan(output: &Output, graph: &ZettelGraph, plan: &MovePlan) {
    if output.is_json() {
        output.data(&serde_json::json!({
            "dry_run": true,
            "plan": plan,
        }));
        return;
    }

    println!(
        "Would move {} -> {} ({} note(s) renumbered)",
        plan.old_identifier,
        plan.new_identifier,
        plan.rewrites.len()
    );
    for rewrite in &plan.rewrites {
        let target = graph
            .get(&rewrite.node_id)
            .and_then(|n| n.file.renumbered(&rewrite.from, &rewrite.to));
        match target {
            Some(file) => println!(
                "  {} -> {}  ({})",
                rewrite.from,
                rewrite.to,
                file.path().display()
            ),
            None => println!("  {} -> {}  (file name kept)", rewrite.from, rewrite.to),
        }
    }
}

fn print_applied(output: &Output, applied: &Applied) {
    for (_, from, to) in applied.renumbered() {
        println!("  {} -> {}", from, to);
    }
    if !applied.renamed.is_empty() {
        println!("Renamed {} file(s)", applied.renamed.len());
    }
    for failure in &applied.failures {
        output.warning(&format!("{}: {}", failure.node_id, failure.reason));
    }
    for (identifier, node_ids) in applied.collisions() {
        output.warning(&format!(
            "identifier {} is now used by {} notes: {}",
            identifier,
            node_ids.len(),
            node_ids.join(", ")
        ));
    }
}

fn command_json(command: &ManipulationCommand, applied: &Applied) -> Value {
    let renamed: Vec<_> = applied
        .renamed
        .iter()
        .map(|r| {
            serde_json::json!({
                "node_id": r.node_id,
                "from": r.from.path(),
                "to": r.to.path(),
            })
        })
        .collect();

    serde_json::json!({
        "command": command,
        "events": applied.events,
        "renamed": renamed,
        "failures": applied.failures,
        "id_changes": applied.id_changes,
    })
}

/// Undo the last move
pub fn undo(output: &Output) -> Result<()> {
    let mut session = Session::open()?;
    let mut persistence = session.vault.persistence();

    let replay = session.history.undo(&mut session.graph, &mut persistence)?;
    session.save(&replay.applied)?;

    if output.is_json() {
        output.data(&command_json(&replay.command, &replay.applied));
    } else {
        output.success(&format!(
            "Undid move of {}: {} -> {}",
            replay.command.node_id, replay.command.after.identifier, replay.command.before.identifier
        ));
        print_applied(output, &replay.applied);
    }

    Ok(())
}

/// Redo the last undone move
pub fn redo(output: &Output) -> Result<()> {
    let mut session = Session::open()?;
    let mut persistence = session.vault.persistence();

    let replay = session.history.redo(&mut session.graph, &mut persistence)?;
    session.save(&replay.applied)?;

    if output.is_json() {
        output.data(&command_json(&replay.command, &replay.applied));
    } else {
        output.success(&format!(
            "Redid move of {}: {} -> {}",
            replay.command.node_id, replay.command.before.identifier, replay.command.after.identifier
        ));
        print_applied(output, &replay.applied);
    }

    Ok(())
}

/// Show or clear the move history
pub fn history(output: &Output, clear: bool) -> Result<()> {
    let vault = Vault::open_current()?;
    let store = vault.history_store();
    let mut history = store.load(vault.config().vault.history_capacity)?;

    if clear {
        let count = history.len();
        history.clear();
        store.save(&history)?;
        output.success(&format!("Cleared {} move(s) from history", count));
        return Ok(());
    }

    if output.is_json() {
        output.data(&serde_json::json!({
            "cursor": history.cursor(),
            "capacity": history.capacity(),
            "can_undo": history.can_undo(),
            "can_redo": history.can_redo(),
            "entries": history.entries(),
        }));
    } else if history.is_empty() {
        println!("No moves recorded.");
    } else {
        println!("{:<4} {:<20} {:<24} CHANGE", "#", "WHEN", "NODE");
        println!("{}", "-".repeat(70));
        for (index, entry) in history.entries().iter().enumerate() {
            let marker = match history.cursor() {
                Some(cursor) if index == cursor => ">",
                Some(cursor) if index < cursor => " ",
                _ => "~",
            };
            println!(
                "{}{:<3} {:<20} {:<24} {} -> {}",
                marker,
                index + 1,
                entry.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
                entry.node_id,
                entry.before.identifier,
                entry.after.identifier
            );
        }
        if history.can_redo() {
            println!();
            println!("Entries marked ~ are undone and can be redone.");
        }
    }

    Ok(())
}

/// Delete a note file
pub fn remove(output: &Output, reference: &str) -> Result<()> {
    let vault = Vault::open_current()?;
    let graph = vault.load_graph()?.graph;
    let node = graph.resolve(reference)?;

    let orphans = graph.children(&node.id).len();
    let sharing: Vec<_> = graph
        .nodes()
        .filter(|n| n.file == node.file && n.id != node.id)
        .map(|n| n.id.clone())
        .collect();

    let mut persistence = vault.persistence();
    persistence.delete(&node.file)?;

    if output.is_json() {
        output.data(&serde_json::json!({
            "deleted": node.id,
            "path": node.file.path(),
            "orphaned_children": orphans,
            "also_removed": sharing,
        }));
    } else {
        output.success(&format!("Deleted {} {}", node.identifier, node.title));
        if orphans > 0 {
            output.warning(&format!("{} child note(s) become roots", orphans));
        }
        if !sharing.is_empty() {
            output.warning(&format!(
                "the file also carried {}",
                sharing.join(", ")
            ));
        }
    }

    Ok(())
}
