//! The resolved dependency tree and the public result of a resolution.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use trellis_core::{DependencyDescriptor, ModuleDescriptor, ModuleId, ModuleRevisionId};

use crate::conflict::ConflictReport;
use crate::error::ResolveError;

/// One included configuration of one module revision.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct ResolvedDependency {
    pub module: ModuleRevisionId,
    pub configuration: String,
}

impl ResolvedDependency {
    /// `organization:name` identifier (without revision).
    pub fn key(&self) -> String {
        self.module.module.to_string()
    }
}

impl fmt::Display for ResolvedDependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.module, self.configuration)
    }
}

/// Identity of a resolved artifact. Two artifacts with the same id are the
/// same file, however many paths reach them.
#[derive(Debug, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct ArtifactId {
    pub module: ModuleRevisionId,
    pub name: String,
    pub kind: String,
    pub extension: String,
    pub classifier: Option<String>,
}

impl fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}!{}", self.module, self.name)?;
        if let Some(classifier) = &self.classifier {
            write!(f, "-{classifier}")?;
        }
        write!(f, ".{}", self.extension)
    }
}

/// An artifact surfaced by the resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedArtifact {
    pub id: ArtifactId,
    /// Configuration through which the artifact was first reached.
    pub configuration: String,
    /// Location reported by the artifact locator, if it found one.
    pub file: Option<PathBuf>,
}

impl ResolvedArtifact {
    pub fn module(&self) -> &ModuleRevisionId {
        &self.id.module
    }

    pub fn file(&self) -> Option<&Path> {
        self.file.as_deref()
    }
}

/// Parent-to-child link: the artifacts of the child this parent pulls in.
#[derive(Debug, Clone, Default)]
pub struct DependencyLink {
    pub artifacts: IndexSet<ArtifactId>,
}

/// The resolved dependency graph backed by petgraph. Nodes are included
/// configurations; the root is the configuration that was resolved.
#[derive(Debug, Default)]
pub struct DependencyTree {
    graph: DiGraph<ResolvedDependency, DependencyLink>,
    index: HashMap<ResolvedDependency, NodeIndex>,
    root: Option<NodeIndex>,
}

impl DependencyTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or retrieve a node.
    pub fn add_node(&mut self, node: ResolvedDependency) -> NodeIndex {
        if let Some(&idx) = self.index.get(&node) {
            return idx;
        }
        let idx = self.graph.add_node(node.clone());
        self.index.insert(node, idx);
        idx
    }

    pub fn set_root(&mut self, idx: NodeIndex) {
        self.root = Some(idx);
    }

    pub fn root(&self) -> Option<NodeIndex> {
        self.root
    }

    /// Link `parent` to `child`, merging artifacts into an existing link.
    pub fn link(&mut self, parent: NodeIndex, child: NodeIndex, artifacts: IndexSet<ArtifactId>) {
        match self.graph.find_edge(parent, child) {
            Some(edge) => self.graph[edge].artifacts.extend(artifacts),
            None => {
                self.graph.add_edge(parent, child, DependencyLink { artifacts });
            }
        }
    }

    pub fn node(&self, idx: NodeIndex) -> &ResolvedDependency {
        &self.graph[idx]
    }

    /// All nodes except the root.
    pub fn nodes(&self) -> Vec<&ResolvedDependency> {
        self.graph
            .node_indices()
            .filter(|&idx| Some(idx) != self.root)
            .map(|idx| &self.graph[idx])
            .collect()
    }

    /// Every node for a module coordinate (one per included configuration).
    pub fn find(&self, module: &ModuleId) -> Vec<NodeIndex> {
        self.graph
            .node_indices()
            .filter(|&idx| &self.graph[idx].module.module == module)
            .collect()
    }

    pub fn children(&self, idx: NodeIndex) -> Vec<(NodeIndex, &DependencyLink)> {
        let mut children: Vec<_> = self
            .graph
            .edges_directed(idx, Direction::Outgoing)
            .map(|e| (e.target(), e.weight()))
            .collect();
        // petgraph yields most recent edges first.
        children.reverse();
        children
    }

    pub fn parents(&self, idx: NodeIndex) -> Vec<(NodeIndex, &DependencyLink)> {
        let mut parents: Vec<_> = self
            .graph
            .edges_directed(idx, Direction::Incoming)
            .map(|e| (e.source(), e.weight()))
            .collect();
        parents.reverse();
        parents
    }

    /// Artifacts of `child` pulled in specifically by `parent`.
    pub fn artifacts_from(&self, parent: NodeIndex, child: NodeIndex) -> Option<&IndexSet<ArtifactId>> {
        self.graph
            .find_edge(parent, child)
            .map(|edge| &self.graph[edge].artifacts)
    }

    /// Render the tree, stopping below `max_depth` if given.
    pub fn print_tree(&self, max_depth: Option<usize>) -> String {
        let mut output = String::new();
        let Some(root) = self.root else {
            return output;
        };
        output.push_str(&format!("{}\n", self.graph[root]));

        let mut visited = HashSet::new();
        visited.insert(root);
        let children = self.children(root);
        let count = children.len();
        for (i, (child, _)) in children.iter().enumerate() {
            self.print_subtree(&mut output, *child, "", i == count - 1, 1, max_depth, &mut visited);
        }
        output
    }

    #[allow(clippy::too_many_arguments)]
    fn print_subtree(
        &self,
        output: &mut String,
        idx: NodeIndex,
        prefix: &str,
        is_last: bool,
        depth: usize,
        max_depth: Option<usize>,
        visited: &mut HashSet<NodeIndex>,
    ) {
        let connector = if is_last { "└── " } else { "├── " };
        output.push_str(&format!("{prefix}{connector}{}\n", self.graph[idx]));

        if max_depth.is_some_and(|max| depth >= max) {
            return;
        }
        if !visited.insert(idx) {
            return;
        }

        let child_prefix = format!("{prefix}{}", if is_last { "    " } else { "│   " });
        let children = self.children(idx);
        let count = children.len();
        for (i, (child, _)) in children.iter().enumerate() {
            self.print_subtree(
                output,
                *child,
                &child_prefix,
                i == count - 1,
                depth + 1,
                max_depth,
                visited,
            );
        }

        visited.remove(&idx);
    }

    /// Path from the root to the first node of a module.
    ///
    /// Accepts either `organization:name` or just `name`.
    pub fn find_path(&self, key: &str) -> Option<Vec<&ResolvedDependency>> {
        let root = self.root?;
        let target = self.resolve_key(key)?;
        let mut path = Vec::new();
        let mut visited = HashSet::new();
        if self.dfs_path(root, target, &mut path, &mut visited) {
            Some(path.iter().map(|&idx| &self.graph[idx]).collect())
        } else {
            None
        }
    }

    fn resolve_key(&self, key: &str) -> Option<NodeIndex> {
        let mut nodes = self.graph.node_indices();
        match ModuleId::parse(key) {
            Some(module) => nodes.find(|&idx| self.graph[idx].module.module == module),
            None => nodes.find(|&idx| self.graph[idx].module.name() == key),
        }
    }

    fn dfs_path(
        &self,
        current: NodeIndex,
        target: NodeIndex,
        path: &mut Vec<NodeIndex>,
        visited: &mut HashSet<NodeIndex>,
    ) -> bool {
        path.push(current);
        if current == target {
            return true;
        }
        if !visited.insert(current) {
            path.pop();
            return false;
        }
        for (child, _) in self.children(current) {
            if self.dfs_path(child, target, path, visited) {
                return true;
            }
        }
        path.pop();
        false
    }

    /// Number of nodes (excluding root).
    pub fn len(&self) -> usize {
        let total = self.graph.node_count();
        if self.root.is_some() {
            total.saturating_sub(1)
        } else {
            total
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A dependency that could not be resolved, with the reason.
#[derive(Debug, Clone)]
pub struct UnresolvedDependency {
    pub requested: ModuleRevisionId,
    pub cause: ResolveError,
}

/// Result of resolving one configuration.
#[derive(Debug)]
pub struct ResolvedConfiguration {
    pub(crate) configuration: String,
    pub(crate) root_descriptor: Arc<ModuleDescriptor>,
    pub(crate) tree: DependencyTree,
    /// Root declaration index to the nodes it resolved to.
    pub(crate) first_level: IndexMap<usize, IndexSet<NodeIndex>>,
    pub(crate) artifacts: IndexMap<ArtifactId, ResolvedArtifact>,
    pub(crate) unresolved: Vec<UnresolvedDependency>,
    pub(crate) conflicts: ConflictReport,
}

impl ResolvedConfiguration {
    pub fn configuration(&self) -> &str {
        &self.configuration
    }

    pub fn has_error(&self) -> bool {
        !self.unresolved.is_empty()
    }

    /// Fail with every unresolved dependency's cause, or do nothing.
    pub fn rethrow_failure(&self) -> Result<(), ResolveError> {
        if self.unresolved.is_empty() {
            return Ok(());
        }
        Err(ResolveError::Unresolved {
            configuration: self.configuration.clone(),
            failures: self.unresolved.iter().map(|u| u.cause.clone()).collect(),
        })
    }

    pub fn resolved_artifacts(&self) -> impl Iterator<Item = &ResolvedArtifact> {
        self.artifacts.values()
    }

    pub fn artifact(&self, id: &ArtifactId) -> Option<&ResolvedArtifact> {
        self.artifacts.get(id)
    }

    pub fn unresolved_dependencies(&self) -> &[UnresolvedDependency] {
        &self.unresolved
    }

    /// Nodes reached directly from root declarations accepted by `predicate`.
    pub fn first_level_dependencies<F>(&self, predicate: F) -> Vec<&ResolvedDependency>
    where
        F: Fn(&DependencyDescriptor) -> bool,
    {
        let mut nodes = IndexSet::new();
        for (&dependency, targets) in &self.first_level {
            if predicate(&self.root_descriptor.dependencies[dependency]) {
                nodes.extend(targets.iter().copied());
            }
        }
        nodes.into_iter().map(|idx| self.tree.node(idx)).collect()
    }

    pub fn root(&self) -> Option<&ResolvedDependency> {
        self.tree.root().map(|idx| self.tree.node(idx))
    }

    pub fn tree(&self) -> &DependencyTree {
        &self.tree
    }

    pub fn conflicts(&self) -> &ConflictReport {
        &self.conflicts
    }

    /// Every included revision in the tree, root excluded.
    pub fn modules(&self) -> IndexSet<&ModuleRevisionId> {
        self.tree.nodes().into_iter().map(|n| &n.module).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(name: &str, rev: &str) -> ResolvedDependency {
        ResolvedDependency {
            module: ModuleRevisionId::new("org", name, rev),
            configuration: "default".to_string(),
        }
    }

    fn artifact(name: &str) -> ArtifactId {
        ArtifactId {
            module: ModuleRevisionId::new("org", name, "1.0"),
            name: name.to_string(),
            kind: "jar".to_string(),
            extension: "jar".to_string(),
            classifier: None,
        }
    }

    #[test]
    fn same_configuration_maps_to_one_node() {
        let mut tree = DependencyTree::new();
        let a = tree.add_node(node("lib", "1.0"));
        let b = tree.add_node(node("lib", "1.0"));
        assert_eq!(a, b);
    }

    #[test]
    fn links_merge_artifacts() {
        let mut tree = DependencyTree::new();
        let root = tree.add_node(node("app", "1.0"));
        let lib = tree.add_node(node("lib", "1.0"));
        tree.link(root, lib, [artifact("lib")].into_iter().collect());
        tree.link(root, lib, [artifact("extra")].into_iter().collect());
        assert_eq!(tree.children(root).len(), 1);
        assert_eq!(tree.artifacts_from(root, lib).unwrap().len(), 2);
        assert_eq!(tree.parents(lib)[0].0, root);
    }

    #[test]
    fn renders_nested_children() {
        let mut tree = DependencyTree::new();
        let root = tree.add_node(node("app", "1.0"));
        tree.set_root(root);
        let a = tree.add_node(node("a", "1.0"));
        let b = tree.add_node(node("b", "2.0"));
        let c = tree.add_node(node("c", "3.0"));
        tree.link(root, a, IndexSet::new());
        tree.link(root, b, IndexSet::new());
        tree.link(a, c, IndexSet::new());

        let printed = tree.print_tree(None);
        assert_eq!(
            printed,
            "org:app:1.0(default)\n\
             ├── org:a:1.0(default)\n\
             │   └── org:c:3.0(default)\n\
             └── org:b:2.0(default)\n"
        );

        let shallow = tree.print_tree(Some(1));
        assert!(!shallow.contains("org:c:3.0"));
    }

    #[test]
    fn cycles_print_once() {
        let mut tree = DependencyTree::new();
        let root = tree.add_node(node("app", "1.0"));
        tree.set_root(root);
        let a = tree.add_node(node("a", "1.0"));
        let b = tree.add_node(node("b", "1.0"));
        tree.link(root, a, IndexSet::new());
        tree.link(a, b, IndexSet::new());
        tree.link(b, a, IndexSet::new());
        let printed = tree.print_tree(None);
        assert_eq!(printed.matches("org:b:1.0").count(), 1);
    }

    #[test]
    fn find_path_by_full_and_short_key() {
        let mut tree = DependencyTree::new();
        let root = tree.add_node(node("app", "1.0"));
        tree.set_root(root);
        let a = tree.add_node(node("a", "1.0"));
        let b = tree.add_node(node("b", "1.0"));
        tree.link(root, a, IndexSet::new());
        tree.link(a, b, IndexSet::new());

        let path = tree.find_path("org:b").unwrap();
        assert_eq!(path.len(), 3);
        assert_eq!(path[1].module.name(), "a");
        assert_eq!(tree.find_path("b").unwrap().len(), 3);
        assert!(tree.find_path("org:missing").is_none());
    }

    #[test]
    fn len_excludes_root() {
        let mut tree = DependencyTree::new();
        assert!(tree.is_empty());
        let root = tree.add_node(node("app", "1.0"));
        tree.set_root(root);
        tree.add_node(node("a", "1.0"));
        assert_eq!(tree.len(), 1);
    }
}
