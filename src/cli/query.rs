//! Query commands (tree, list, show, next, check)
//!
//! These commands rebuild the forest from the note files and never write.

use std::collections::HashSet;

use anyhow::{Context, Result};
use serde_json::Value;

use super::output::Output;
use crate::domain::{Identifier, ZettelGraph, ZettelNode};
use crate::storage::Vault;

/// Show the forest, siblings in identifier order
pub fn tree(output: &Output) -> Result<()> {
    let vault = Vault::open_current()?;
    let graph = vault.load_graph()?.graph;

    if output.is_json() {
        let roots: Vec<_> = graph
            .sorted_roots()
            .into_iter()
            .map(|root| tree_json(&graph, root))
            .collect();
        output.data(&roots);
    } else if graph.is_empty() {
        println!("No notes found in {}", vault.notes_dir().display());
    } else {
        for root in graph.sorted_roots() {
            println!("{}", node_label(root));
            print_children(&graph, &root.id, "");
        }
    }

    Ok(())
}

fn tree_json(graph: &ZettelGraph, node: &ZettelNode) -> Value {
    let children: Vec<_> = graph
        .sorted_children(&node.id)
        .into_iter()
        .map(|child| tree_json(graph, child))
        .collect();

    serde_json::json!({
        "id": node.id,
        "identifier": node.identifier,
        "title": node.title,
        "kind": node.kind,
        "children": children,
    })
}

fn print_children(graph: &ZettelGraph, id: &str, prefix: &str) {
    let children = graph.sorted_children(id);
    let last = children.len().saturating_sub(1);

    for (i, child) in children.into_iter().enumerate() {
        let (branch, indent) = if i == last {
            ("└── ", "    ")
        } else {
            ("├── ", "│   ")
        };
        println!("{}{}{}", prefix, branch, node_label(child));
        print_children(graph, &child.id, &format!("{}{}", prefix, indent));
    }
}

fn node_label(node: &ZettelNode) -> String {
    format!("{} {}", node.identifier, node.title)
}

/// List all notes as a flat table
pub fn list(output: &Output) -> Result<()> {
    let vault = Vault::open_current()?;
    let graph = vault.load_graph()?.graph;

    let mut nodes: Vec<_> = graph.nodes().collect();
    nodes.sort_by(|a, b| a.identifier.cmp(&b.identifier).then_with(|| a.id.cmp(&b.id)));

    if output.is_json() {
        output.data(&nodes);
    } else if nodes.is_empty() {
        println!("No notes found in {}", vault.notes_dir().display());
    } else {
        println!(
            "{:<12} {:<8} {:<5} {:<12} {:<30} ID",
            "IDENTIFIER", "KIND", "LEVEL", "PARENT", "TITLE"
        );
        println!("{}", "-".repeat(90));
        for node in &nodes {
            let parent = graph
                .parent(&node.id)
                .map(|p| p.identifier.to_string())
                .unwrap_or_else(|| "-".to_string());
            println!(
                "{:<12} {:<8} {:<5} {:<12} {:<30} {}",
                node.identifier.to_string(),
                node.kind.as_str(),
                node.level,
                parent,
                truncate(&node.title, 30),
                node.id
            );
        }
        println!();
        println!("{} note(s), {} root(s)", nodes.len(), graph.roots().len());
    }

    Ok(())
}

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(width.saturating_sub(3)).collect();
    cut.push_str("...");
    cut
}

/// Show one note with its neighbourhood
pub fn show(output: &Output, reference: &str) -> Result<()> {
    let vault = Vault::open_current()?;
    let graph = vault.load_graph()?.graph;
    let node = graph.resolve(reference)?;

    let parent = graph.parent(&node.id);
    let children = graph.sorted_children(&node.id);
    let siblings = graph.siblings_of(&node.id);

    if output.is_json() {
        let summary = |n: &ZettelNode| {
            serde_json::json!({
                "id": n.id,
                "identifier": n.identifier,
                "title": n.title,
            })
        };
        output.data(&serde_json::json!({
            "id": node.id,
            "identifier": node.identifier,
            "title": node.title,
            "kind": node.kind,
            "level": node.level,
            "path": node.file.path(),
            "parent": parent.map(summary),
            "children": children.iter().copied().map(summary).collect::<Vec<_>>(),
            "siblings": siblings.iter().copied().map(summary).collect::<Vec<_>>(),
        }));
        return Ok(());
    }

    println!("{} {}", node.identifier, node.title);
    println!("  ID:     {}", node.id);
    println!("  Kind:   {}", node.kind);
    println!("  Level:  {}", node.level);
    let path = vault
        .relative_path(node.file.path())
        .unwrap_or_else(|| node.file.path().to_path_buf());
    println!("  File:   {}", path.display());
    match parent {
        Some(p) => println!("  Parent: {}", node_label(p)),
        None => println!("  Parent: (root)"),
    }

    if !children.is_empty() {
        println!();
        println!("Children:");
        for child in &children {
            println!("  {}", node_label(child));
        }
    }

    if !siblings.is_empty() {
        println!();
        println!("Siblings:");
        for sibling in &siblings {
            println!("  {}", node_label(sibling));
        }
    }

    Ok(())
}

/// Suggest the next free identifier after a note
pub fn next(output: &Output, reference: &str, branch: bool) -> Result<()> {
    let vault = Vault::open_current()?;
    let graph = vault.load_graph()?.graph;
    let node = graph.resolve(reference)?;

    let existing: HashSet<Identifier> = graph.nodes().map(|n| n.identifier.clone()).collect();
    let suggested = if branch {
        node.identifier.next_branch(&existing)
    } else {
        node.identifier
            .next_sequential(&existing)
            .with_context(|| format!("No free identifier follows {}", node.identifier))?
    };

    if output.is_json() {
        output.data(&serde_json::json!({
            "after": node.identifier,
            "next": suggested,
            "kind": suggested.kind(),
        }));
    } else {
        println!("{}", suggested);
    }

    Ok(())
}

/// Verify the forest and report duplicate identifiers
pub fn check(output: &Output) -> Result<()> {
    let vault = Vault::open_current()?;
    let report = vault.load_graph()?;
    let graph = &report.graph;

    let verdict = graph.check();

    if output.is_json() {
        let skipped: Vec<_> = report.skipped.iter().map(|f| f.path()).collect();
        output.data(&serde_json::json!({
            "ok": verdict.is_ok(),
            "error": verdict.as_ref().err().map(|e| e.to_string()),
            "nodes": graph.len(),
            "roots": graph.roots().len(),
            "collisions": report.collisions,
            "skipped": skipped,
        }));
    } else {
        println!("{} note(s), {} root(s)", graph.len(), graph.roots().len());
        if !report.skipped.is_empty() {
            println!("{} file(s) without an identifier skipped", report.skipped.len());
        }
        for collision in &report.collisions {
            output.warning(&format!(
                "identifier {} is used by {} notes: {}",
                collision.identifier,
                collision.node_ids.len(),
                collision.node_ids.join(", ")
            ));
        }
        if verdict.is_ok() {
            println!("Forest is consistent");
        }
    }

    verdict.context("Forest check failed")
}
