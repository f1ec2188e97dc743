//! Zettel forest
//!
//! Nodes live in an arena keyed by node id. Each node has a single
//! authoritative `parent_id`; the `children` lists and the root list are
//! cached indexes kept in step with it. [`ZettelGraph::check`] verifies that
//! the caches agree with the parent links and that no cycle exists.

use petgraph::algo::is_cyclic_directed;
use petgraph::graph::{DiGraph, NodeIndex};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use thiserror::Error;

use super::identifier::{compare_siblings, Identifier, NodeKind};
use super::note::NoteFile;

#[derive(Debug, Error, PartialEq)]
pub enum GraphError {
    #[error("Node not found: {0}")]
    NodeNotFound(String),

    #[error("Node {node} points at missing parent {parent}")]
    DanglingParent { node: String, parent: String },

    #[error("Node {child} is missing from the children of its parent {parent}")]
    MissingChildLink { parent: String, child: String },

    #[error("Node {parent} lists {child} as a child, but {child} does not point back")]
    StrayChildLink { parent: String, child: String },

    #[error("Root list is out of sync for node {0}")]
    RootMismatch(String),

    #[error("Parent links form a cycle")]
    CycleDetected,

    #[error("Identifier '{identifier}' matches {count} nodes; use a node id")]
    Ambiguous { identifier: String, count: usize },
}

/// A note in the forest
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ZettelNode {
    pub id: String,
    pub title: String,
    pub identifier: Identifier,
    pub kind: NodeKind,
    pub level: usize,
    pub parent_id: Option<String>,
    pub children: Vec<String>,
    pub file: NoteFile,
}

impl ZettelNode {
    /// Derives the node id for an identifier found in a file
    pub fn derive_id(identifier: &Identifier, basename: &str) -> String {
        format!("{}-{}", identifier, basename)
    }

    fn new(id: String, identifier: Identifier, file: NoteFile) -> Self {
        let basename = file.basename();
        Self {
            id,
            title: extract_title(&basename, &identifier),
            kind: identifier.kind(),
            level: identifier.level(),
            identifier,
            parent_id: None,
            children: Vec::new(),
            file,
        }
    }

    /// Replaces the identifier, keeping kind and level in step
    pub(crate) fn set_identifier(&mut self, identifier: Identifier) {
        self.kind = identifier.kind();
        self.level = identifier.level();
        self.identifier = identifier;
    }

    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}

/// Strips the leading identifier and a `-`/`:` separator from a basename
fn extract_title(basename: &str, identifier: &Identifier) -> String {
    let leading = Identifier::matches(basename)
        .into_iter()
        .next()
        .filter(|m| m.range.start == 0 && &m.identifier == identifier);

    let Some(found) = leading else {
        return basename.to_string();
    };

    let rest = basename[found.range.end..].trim_start();
    let rest = rest
        .strip_prefix('-')
        .or_else(|| rest.strip_prefix(':'))
        .unwrap_or(rest)
        .trim_start();

    if rest.is_empty() {
        basename.to_string()
    } else {
        rest.to_string()
    }
}

/// Two or more nodes carry the same identifier
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParseCollision {
    pub identifier: Identifier,
    pub node_ids: Vec<String>,
}

/// Result of building a graph from a file list
#[derive(Debug)]
pub struct BuildReport {
    pub graph: ZettelGraph,
    pub collisions: Vec<ParseCollision>,
    /// Files whose names carry no identifier
    pub skipped: Vec<NoteFile>,
}

/// Forest of zettel nodes
#[derive(Debug, Default, Clone)]
pub struct ZettelGraph {
    nodes: HashMap<String, ZettelNode>,
    /// Node ids in creation order
    order: Vec<String>,
    roots: Vec<String>,
}

impl ZettelGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the forest from a list of note files
    ///
    /// One node is created per distinct identifier in each filename. Each
    /// node is linked to the node carrying its structural parent identifier;
    /// nodes without one become roots.
    pub fn build(files: impl IntoIterator<Item = NoteFile>) -> BuildReport {
        let mut graph = Self::new();
        let mut skipped = Vec::new();

        // First pass: create nodes
        for file in files {
            let basename = file.basename();
            let mut seen = HashSet::new();
            let identifiers: Vec<_> = Identifier::parse_all(&basename)
                .into_iter()
                .filter(|i| seen.insert(i.clone()))
                .collect();

            if identifiers.is_empty() {
                tracing::debug!(path = %file.path().display(), "no identifier in filename, skipping");
                skipped.push(file);
                continue;
            }

            for identifier in identifiers {
                let mut id = ZettelNode::derive_id(&identifier, &basename);
                if graph.nodes.contains_key(&id) {
                    id = format!("{}-{}", identifier, file.path().display());
                }
                let node = ZettelNode::new(id.clone(), identifier, file.clone());
                graph.order.push(id.clone());
                graph.nodes.insert(id, node);
            }
        }

        // Index identifiers once; the first node wins for duplicates
        let mut index: HashMap<Identifier, String> = HashMap::new();
        let mut carriers: HashMap<Identifier, Vec<String>> = HashMap::new();
        for id in &graph.order {
            let identifier = graph.nodes[id].identifier.clone();
            index.entry(identifier.clone()).or_insert_with(|| id.clone());
            carriers.entry(identifier).or_default().push(id.clone());
        }

        // Second pass: link parents
        for id in graph.order.clone() {
            let parent_id = graph.nodes[&id]
                .identifier
                .parent()
                .and_then(|p| index.get(&p).cloned());
            graph.attach(&id, parent_id.as_deref());
        }

        let mut collisions: Vec<_> = carriers
            .into_iter()
            .filter(|(_, ids)| ids.len() > 1)
            .map(|(identifier, node_ids)| ParseCollision {
                identifier,
                node_ids,
            })
            .collect();
        collisions.sort_by(|a, b| compare_siblings(&a.identifier, &b.identifier));

        for collision in &collisions {
            tracing::warn!(
                identifier = %collision.identifier,
                nodes = ?collision.node_ids,
                "duplicate identifier across files"
            );
        }

        tracing::debug!(
            nodes = graph.len(),
            roots = graph.roots.len(),
            skipped = skipped.len(),
            "built zettel graph"
        );

        BuildReport {
            graph,
            collisions,
            skipped,
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&ZettelNode> {
        self.nodes.get(id)
    }

    pub(crate) fn get_mut(&mut self, id: &str) -> Option<&mut ZettelNode> {
        self.nodes.get_mut(id)
    }

    /// Returns all nodes in creation order
    pub fn nodes(&self) -> impl Iterator<Item = &ZettelNode> {
        self.order.iter().filter_map(|id| self.nodes.get(id))
    }

    /// Returns root ids in creation and attachment order
    pub fn roots(&self) -> &[String] {
        &self.roots
    }

    /// Returns the root nodes ordered by identifier
    pub fn sorted_roots(&self) -> Vec<&ZettelNode> {
        let mut roots: Vec<_> = self.roots.iter().filter_map(|id| self.nodes.get(id)).collect();
        roots.sort_by(|a, b| compare_siblings(&a.identifier, &b.identifier));
        roots
    }

    /// Returns the child ids of a node
    pub fn children(&self, id: &str) -> &[String] {
        self.nodes
            .get(id)
            .map(|n| n.children.as_slice())
            .unwrap_or(&[])
    }

    /// Returns the children of a node ordered by identifier
    pub fn sorted_children(&self, id: &str) -> Vec<&ZettelNode> {
        let mut children: Vec<_> = self
            .children(id)
            .iter()
            .filter_map(|c| self.nodes.get(c))
            .collect();
        children.sort_by(|a, b| compare_siblings(&a.identifier, &b.identifier));
        children
    }

    pub fn parent(&self, id: &str) -> Option<&ZettelNode> {
        self.nodes
            .get(id)
            .and_then(|n| n.parent_id.as_deref())
            .and_then(|p| self.nodes.get(p))
    }

    pub fn is_root(&self, id: &str) -> bool {
        self.nodes.get(id).is_some_and(|n| n.is_root())
    }

    /// Returns the other nodes under the same parent (or the other roots),
    /// ordered by identifier
    pub fn siblings_of(&self, id: &str) -> Vec<&ZettelNode> {
        let Some(node) = self.nodes.get(id) else {
            return vec![];
        };
        let pool = match &node.parent_id {
            Some(parent) => self.children(parent),
            None => self.roots.as_slice(),
        };
        let mut siblings: Vec<_> = pool
            .iter()
            .filter(|s| s.as_str() != id)
            .filter_map(|s| self.nodes.get(s))
            .collect();
        siblings.sort_by(|a, b| compare_siblings(&a.identifier, &b.identifier));
        siblings
    }

    /// Returns all nodes below `id` in the forest, depth first
    pub fn descendants(&self, id: &str) -> Vec<&ZettelNode> {
        let mut out = Vec::new();
        let mut stack: Vec<&str> = self.children(id).iter().rev().map(String::as_str).collect();
        while let Some(next) = stack.pop() {
            if let Some(node) = self.nodes.get(next) {
                out.push(node);
                stack.extend(node.children.iter().rev().map(String::as_str));
            }
        }
        out
    }

    /// Returns the nodes carrying an identifier, in creation order
    pub fn find_by_identifier(&self, identifier: &Identifier) -> Vec<&ZettelNode> {
        self.nodes()
            .filter(|n| &n.identifier == identifier)
            .collect()
    }

    /// Resolves user input to a node: an exact node id, or an identifier
    /// carried by exactly one node
    pub fn resolve(&self, reference: &str) -> Result<&ZettelNode, GraphError> {
        if let Some(node) = self.nodes.get(reference) {
            return Ok(node);
        }

        let identifier: Identifier = reference
            .parse()
            .map_err(|_| GraphError::NodeNotFound(reference.to_string()))?;
        let mut found = self.find_by_identifier(&identifier);
        match found.len() {
            0 => Err(GraphError::NodeNotFound(reference.to_string())),
            1 => Ok(found.remove(0)),
            count => Err(GraphError::Ambiguous {
                identifier: identifier.to_string(),
                count,
            }),
        }
    }

    /// Removes a node from its parent's children, or from the roots
    pub(crate) fn detach(&mut self, id: &str) -> Option<String> {
        let parent_id = self.nodes.get_mut(id)?.parent_id.take();
        match &parent_id {
            Some(parent) => {
                if let Some(p) = self.nodes.get_mut(parent) {
                    p.children.retain(|c| c != id);
                }
            }
            None => self.roots.retain(|r| r != id),
        }
        parent_id
    }

    /// Links a detached node under `parent`, or makes it a root
    pub(crate) fn attach(&mut self, id: &str, parent: Option<&str>) {
        let parent = parent.filter(|p| self.nodes.contains_key(*p));
        let Some(node) = self.nodes.get_mut(id) else {
            return;
        };
        node.parent_id = parent.map(str::to_string);

        match parent {
            Some(p) => {
                if let Some(parent_node) = self.nodes.get_mut(p) {
                    parent_node.children.push(id.to_string());
                }
            }
            None => self.roots.push(id.to_string()),
        }
    }

    /// Verifies the forest invariant
    ///
    /// Every parent link must point at an existing node that lists the child,
    /// every child entry must point back, the root list must hold exactly the
    /// parentless nodes, and the parent links must be acyclic.
    pub fn check(&self) -> Result<(), GraphError> {
        let roots: HashSet<&str> = self.roots.iter().map(String::as_str).collect();

        for node in self.nodes() {
            match &node.parent_id {
                Some(parent) => {
                    let parent_node =
                        self.nodes
                            .get(parent)
                            .ok_or_else(|| GraphError::DanglingParent {
                                node: node.id.clone(),
                                parent: parent.clone(),
                            })?;
                    if !parent_node.children.contains(&node.id) {
                        return Err(GraphError::MissingChildLink {
                            parent: parent.clone(),
                            child: node.id.clone(),
                        });
                    }
                    if roots.contains(node.id.as_str()) {
                        return Err(GraphError::RootMismatch(node.id.clone()));
                    }
                }
                None => {
                    if !roots.contains(node.id.as_str()) {
                        return Err(GraphError::RootMismatch(node.id.clone()));
                    }
                }
            }

            for child in &node.children {
                let points_back = self
                    .nodes
                    .get(child)
                    .is_some_and(|c| c.parent_id.as_deref() == Some(node.id.as_str()));
                if !points_back {
                    return Err(GraphError::StrayChildLink {
                        parent: node.id.clone(),
                        child: child.clone(),
                    });
                }
            }
        }

        if roots.len() != self.roots.len() {
            let mut seen = HashSet::new();
            let duplicate = self.roots.iter().find(|r| !seen.insert(r.as_str()));
            return Err(GraphError::RootMismatch(
                duplicate.cloned().unwrap_or_default(),
            ));
        }
        if let Some(stray) = self.roots.iter().find(|r| !self.nodes.contains_key(*r)) {
            return Err(GraphError::NodeNotFound(stray.clone()));
        }

        let mut links: DiGraph<&str, ()> = DiGraph::new();
        let mut index: HashMap<&str, NodeIndex> = HashMap::new();
        for id in &self.order {
            index.insert(id.as_str(), links.add_node(id.as_str()));
        }
        for node in self.nodes() {
            if let Some(parent) = &node.parent_id {
                links.add_edge(index[parent.as_str()], index[node.id.as_str()], ());
            }
        }
        if is_cyclic_directed(&links) {
            return Err(GraphError::CycleDetected);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn files(names: &[&str]) -> Vec<NoteFile> {
        names.iter().map(|n| NoteFile::new(format!("{}.md", n))).collect()
    }

    fn id(s: &str) -> Identifier {
        s.parse().unwrap()
    }

    fn node_for<'a>(graph: &'a ZettelGraph, identifier: &str) -> &'a ZettelNode {
        graph.resolve(identifier).unwrap()
    }

    #[test]
    fn empty_graph() {
        let report = ZettelGraph::build(Vec::new());
        assert!(report.graph.is_empty());
        assert!(report.graph.roots().is_empty());
        assert!(report.graph.check().is_ok());
    }

    #[test]
    fn end_to_end_example() {
        let report = ZettelGraph::build(files(&["21 - Intro", "21.1 - Detail", "21a - Aside"]));
        let graph = &report.graph;

        assert_eq!(graph.len(), 3);
        assert_eq!(graph.roots().len(), 1);

        let root = graph.get(&graph.roots()[0]).unwrap();
        assert_eq!(root.file.basename(), "21 - Intro");
        assert_eq!(root.title, "Intro");

        let detail = node_for(graph, "21.1");
        let aside = node_for(graph, "21a");
        assert_eq!(detail.parent_id.as_deref(), Some(root.id.as_str()));
        assert_eq!(aside.parent_id.as_deref(), Some(root.id.as_str()));
        assert_eq!(aside.kind, NodeKind::Branch);
        assert_eq!(detail.kind, NodeKind::Sequence);
        assert_eq!(aside.level, 1);
        assert_eq!(detail.level, 2);

        assert!(graph.check().is_ok());
    }

    #[test]
    fn node_id_combines_identifier_and_basename() {
        let report = ZettelGraph::build(files(&["21 - Intro"]));
        assert!(report.graph.contains("21-21 - Intro"));
    }

    #[test]
    fn files_without_identifiers_are_skipped() {
        let report = ZettelGraph::build(files(&["Inbox", "21 - Intro", "README"]));
        assert_eq!(report.graph.len(), 1);
        assert_eq!(report.skipped.len(), 2);
    }

    #[test]
    fn one_node_per_distinct_identifier_in_a_filename() {
        let report = ZettelGraph::build(files(&["21 and 22 and 21"]));
        let identifiers: Vec<_> = report.graph.nodes().map(|n| n.identifier.to_string()).collect();
        assert_eq!(identifiers, vec!["21", "22"]);
    }

    #[test]
    fn title_extraction() {
        assert_eq!(extract_title("21 - Intro", &id("21")), "Intro");
        assert_eq!(extract_title("21.1: Detail", &id("21.1")), "Detail");
        assert_eq!(extract_title("21a Aside", &id("21a")), "Aside");
        assert_eq!(extract_title("21", &id("21")), "21");
        assert_eq!(extract_title("21 -", &id("21")), "21 -");
        assert_eq!(extract_title("See 21", &id("21")), "See 21");
        assert_eq!(extract_title("21 22 - Pair", &id("22")), "21 22 - Pair");
    }

    #[test]
    fn missing_parent_makes_a_root() {
        let report = ZettelGraph::build(files(&["21.3 - Orphan", "22 - Top"]));
        let graph = &report.graph;
        assert!(graph.is_root(&node_for(graph, "21.3").id));
        assert!(graph.is_root(&node_for(graph, "22").id));
    }

    #[test]
    fn root_iff_parent_identifier_absent() {
        let report = ZettelGraph::build(files(&[
            "1 - A", "1.1 - B", "1.1.1 - C", "1.2.1 - D", "1b - E", "2.1a - F", "3 - G",
        ]));
        let graph = &report.graph;
        let present: HashSet<_> = graph.nodes().map(|n| n.identifier.clone()).collect();

        for node in graph.nodes() {
            let expect_root = match node.identifier.parent() {
                Some(parent) => !present.contains(&parent),
                None => true,
            };
            assert_eq!(graph.is_root(&node.id), expect_root, "node {}", node.id);
        }
    }

    #[test]
    fn forest_invariant_holds_after_build() {
        let report = ZettelGraph::build(files(&[
            "3.1.1 - Deep", "3 - Top", "3.1 - Mid", "3.1a - Branch", "4", "3.2 - Next",
        ]));
        let graph = &report.graph;
        graph.check().unwrap();

        for node in graph.nodes() {
            if let Some(parent) = &node.parent_id {
                assert!(graph.children(parent).contains(&node.id));
            }
        }
    }

    #[test]
    fn duplicate_identifiers_are_kept_and_reported() {
        let report = ZettelGraph::build(files(&["21 - First", "21 - Second", "21.1 - Child"]));
        let graph = &report.graph;

        assert_eq!(graph.len(), 3);
        assert_eq!(report.collisions.len(), 1);
        assert_eq!(report.collisions[0].identifier, id("21"));
        assert_eq!(report.collisions[0].node_ids.len(), 2);

        // the first carrier wins the children
        let child = graph.find_by_identifier(&id("21.1"))[0];
        assert_eq!(child.parent_id.as_deref(), Some("21-21 - First"));
        assert!(matches!(graph.resolve("21"), Err(GraphError::Ambiguous { count: 2, .. })));
    }

    #[test]
    fn same_basename_in_two_folders_gets_distinct_ids() {
        let report = ZettelGraph::build(vec![
            NoteFile::new("a/21 - Intro.md"),
            NoteFile::new("b/21 - Intro.md"),
        ]);
        assert_eq!(report.graph.len(), 2);
        assert!(report.graph.check().is_ok());
    }

    #[test]
    fn siblings_are_ordered_by_identifier() {
        let report = ZettelGraph::build(files(&[
            "21 - Top", "21.10 - J", "21.2 - B", "21b - Y", "21.1 - A", "21a - X",
        ]));
        let graph = &report.graph;
        let of = node_for(graph, "21.2");
        let siblings: Vec<_> = graph
            .siblings_of(&of.id)
            .iter()
            .map(|n| n.identifier.to_string())
            .collect();
        assert_eq!(siblings, vec!["21a", "21b", "21.1", "21.10"]);
    }

    #[test]
    fn descendants_walk_the_subtree() {
        let report = ZettelGraph::build(files(&["1", "1.1", "1.1.1", "1.2", "2"]));
        let graph = &report.graph;
        let top = node_for(graph, "1");
        let below: Vec<_> = graph
            .descendants(&top.id)
            .iter()
            .map(|n| n.identifier.to_string())
            .collect();
        assert_eq!(below.len(), 3);
        assert!(below.contains(&"1.1.1".to_string()));
        assert!(!below.contains(&"2".to_string()));
    }

    #[test]
    fn check_detects_broken_links() {
        let mut graph = ZettelGraph::build(files(&["1", "1.1"])).graph;
        let child = node_for(&graph, "1.1").id.clone();
        let parent = node_for(&graph, "1").id.clone();

        graph.get_mut(&parent).unwrap().children.clear();
        assert_eq!(
            graph.check(),
            Err(GraphError::MissingChildLink {
                parent: parent.clone(),
                child: child.clone()
            })
        );
    }

    #[test]
    fn check_detects_cycles() {
        let mut graph = ZettelGraph::build(files(&["1", "2"])).graph;
        let a = node_for(&graph, "1").id.clone();
        let b = node_for(&graph, "2").id.clone();

        graph.detach(&a);
        graph.detach(&b);
        graph.attach(&a, Some(&b));
        graph.attach(&b, Some(&a));

        assert_eq!(graph.check(), Err(GraphError::CycleDetected));
    }

    #[test]
    fn resolve_accepts_node_ids_and_identifiers() {
        let graph = ZettelGraph::build(files(&["21 - Intro"])).graph;
        assert_eq!(graph.resolve("21-21 - Intro").unwrap().title, "Intro");
        assert_eq!(graph.resolve("21").unwrap().title, "Intro");
        assert!(matches!(graph.resolve("22"), Err(GraphError::NodeNotFound(_))));
        assert!(matches!(graph.resolve("nope"), Err(GraphError::NodeNotFound(_))));
    }
}
