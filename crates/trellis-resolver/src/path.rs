//! Resolution paths and dependency edges.
//!
//! A path records how the traversal reached a configuration: either the root,
//! or an edge extending a predecessor path. Edges are stored in one arena and
//! link backwards by index, so a path is just an [`EdgeIdx`] and walking it
//! never recurses.

use std::collections::VecDeque;
use std::iter;
use std::sync::Arc;

use indexmap::IndexSet;
use trellis_core::{DependencyDescriptor, ModuleDescriptor, ModuleId, ModuleRevisionId};

use crate::error::ResolveError;
use crate::observer::{ResolutionEvent, ResolutionObserver};
use crate::registry::{ConfigIdx, Registry, RevisionIdx, Status};
use crate::traits::MetadataResolver;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EdgeIdx(pub(crate) usize);

/// How a configuration was reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PathRef {
    /// The configuration being resolved. Excludes nothing and reaches nothing.
    Root,
    Edge(EdgeIdx),
}

impl PathRef {
    fn edge(self) -> Option<EdgeIdx> {
        match self {
            PathRef::Root => None,
            PathRef::Edge(e) => Some(e),
        }
    }
}

/// One dependency declaration followed from one source configuration.
#[derive(Debug)]
pub struct EdgeState {
    pub parent: PathRef,
    pub from: ConfigIdx,
    /// Index of the declaration in the source module's dependency list.
    pub dependency: usize,
    /// Target configuration names, before `*` and fallback expansion.
    pub target_configurations: IndexSet<String>,
    /// Resolved target. Set on first resolution and rewritten by restarts.
    pub target: Option<RevisionIdx>,
}

/// Mutable state of one resolution run: the registry plus the edge arena.
#[derive(Debug)]
pub struct ResolveState {
    pub registry: Registry,
    pub edges: Vec<EdgeState>,
    pub root: RevisionIdx,
    pub root_configuration: ConfigIdx,
}

impl ResolveState {
    /// Intern `root` and its requested configuration.
    pub fn new(root: Arc<ModuleDescriptor>, configuration: &str) -> Result<Self, ResolveError> {
        let mut registry = Registry::new();
        let root = registry.intern(root);
        let root_configuration = registry.get_configuration(root, configuration)?;
        Ok(Self {
            registry,
            edges: Vec::new(),
            root,
            root_configuration,
        })
    }

    pub fn edge(&self, idx: EdgeIdx) -> &EdgeState {
        &self.edges[idx.0]
    }

    /// The declaration an edge follows.
    pub fn declaration(&self, idx: EdgeIdx) -> &DependencyDescriptor {
        let edge = &self.edges[idx.0];
        let source = self.registry.configuration(edge.from).revision;
        &self.registry.revision(source).descriptor.dependencies[edge.dependency]
    }

    /// Id of the module revision an edge starts from.
    pub fn source_id(&self, idx: EdgeIdx) -> &ModuleRevisionId {
        let source = self.registry.configuration(self.edges[idx.0].from).revision;
        self.registry.revision(source).id()
    }

    /// `idx` followed by every predecessor edge, nearest first.
    fn walk(&self, path: PathRef) -> impl Iterator<Item = EdgeIdx> + '_ {
        iter::successors(path.edge(), move |e| self.edges[e.0].parent.edge())
    }

    /// Whether any declaration along `path` excludes `module`, each rule
    /// evaluated against its own source configuration's hierarchy.
    pub fn excludes(&self, path: PathRef, module: &ModuleId) -> bool {
        self.walk(path).any(|e| {
            let hierarchy = &self.registry.configuration(self.edges[e.0].from).hierarchy;
            self.declaration(e).excludes_module(module, hierarchy)
        })
    }

    /// Whether `config` is already the source of an edge on `path`.
    pub fn can_reach(&self, path: PathRef, config: ConfigIdx) -> bool {
        self.walk(path).any(|e| self.edges[e.0].from == config)
    }

    /// An edge is live while no revision it passes through has been evicted.
    pub fn is_live(&self, idx: EdgeIdx) -> bool {
        self.walk(PathRef::Edge(idx))
            .all(|e| self.registry.status_of(self.edges[e.0].from) != Status::Evict)
    }

    /// Modules on the path to `idx`, root first, each listed once.
    pub fn trail(&self, idx: EdgeIdx) -> Vec<ModuleRevisionId> {
        let mut modules: Vec<ModuleRevisionId> =
            self.walk(PathRef::Edge(idx)).map(|e| self.source_id(e).clone()).collect();
        modules.reverse();
        let unique: IndexSet<ModuleRevisionId> = modules.into_iter().collect();
        unique.into_iter().collect()
    }

    /// Resolve an edge's target, asking `metadata` only on first use of the
    /// declaration within its source revision.
    pub fn resolve_edge(
        &mut self,
        idx: EdgeIdx,
        metadata: &dyn MetadataResolver,
    ) -> Result<RevisionIdx, ResolveError> {
        if let Some(target) = self.edges[idx.0].target {
            return Ok(target);
        }

        let dependency = self.edges[idx.0].dependency;
        let source = self.registry.configuration(self.edges[idx.0].from).revision;
        if let Some(target) = self.registry.revision(source).dependency_targets[dependency] {
            self.edges[idx.0].target = Some(target);
            return Ok(target);
        }

        let descriptor = match metadata.resolve(self.declaration(idx)) {
            Ok(descriptor) => descriptor,
            Err(cause) => {
                return Err(ResolveError::Unresolvable {
                    requested: self.declaration(idx).requested.clone(),
                    required_by: self.trail(idx),
                    cause,
                })
            }
        };
        let target = self.registry.intern(descriptor);
        self.registry.revision_mut(source).dependency_targets[dependency] = Some(target);
        self.edges[idx.0].target = Some(target);
        Ok(target)
    }

    /// Queue one edge per applicable declaration of `config`, reached via
    /// `path`. Skipped if `path` already passes through `config`.
    pub fn push_outgoing(
        &mut self,
        path: PathRef,
        config: ConfigIdx,
        queue: &mut VecDeque<EdgeIdx>,
        observer: &dyn ResolutionObserver,
    ) {
        if self.can_reach(path, config) {
            let state = self.registry.configuration(config);
            observer.notify(&ResolutionEvent::CycleSkipped {
                module: self.registry.revision(state.revision).id().clone(),
                configuration: state.name.clone(),
            });
            return;
        }

        let state = self.registry.configuration(config);
        let descriptor = Arc::clone(&self.registry.revision(state.revision).descriptor);
        for (dependency, declaration) in descriptor.dependencies.iter().enumerate() {
            let targets = declaration.target_configurations(&state.hierarchy);
            if targets.is_empty() {
                continue;
            }
            let idx = EdgeIdx(self.edges.len());
            self.edges.push(EdgeState {
                parent: path,
                from: config,
                dependency,
                target_configurations: targets,
                target: None,
            });
            queue.push_back(idx);
        }
    }

    /// Register a resolved edge with its target and queue the target
    /// configurations' own dependencies if the declaration is transitive.
    ///
    /// Every target configuration is attempted; the first one that cannot be
    /// built is reported after the rest were expanded.
    pub fn expand_edge(
        &mut self,
        idx: EdgeIdx,
        queue: &mut VecDeque<EdgeIdx>,
        observer: &dyn ResolutionObserver,
    ) -> Result<(), ResolveError> {
        let Some(target) = self.edges[idx.0].target else {
            return Ok(());
        };
        let descriptor = Arc::clone(&self.registry.revision(target).descriptor);

        if self.excludes(PathRef::Edge(idx), &descriptor.id.module) {
            observer.notify(&ResolutionEvent::EdgeExcluded {
                from: self.source_id(idx).clone(),
                excluded: descriptor.id.clone(),
            });
            return Ok(());
        }
        self.registry.revision_mut(target).incoming.insert(idx);

        let names: IndexSet<String> = self.edges[idx.0]
            .target_configurations
            .iter()
            .flat_map(|name| descriptor.real_configurations(name))
            .collect();
        let transitive = self.declaration(idx).transitive;

        let mut failure = None;
        for name in names {
            let config = match self.registry.get_configuration(target, &name) {
                Ok(config) => config,
                Err(err) => {
                    failure.get_or_insert(err);
                    continue;
                }
            };
            self.registry.configuration_mut(config).incoming.insert(idx);
            if transitive {
                self.push_outgoing(PathRef::Edge(idx), config, queue, observer);
            }
        }
        failure.map_or(Ok(()), Err)
    }

    /// Point a previously resolved edge at `revision` and queue it again.
    pub fn restart(&mut self, idx: EdgeIdx, revision: RevisionIdx, queue: &mut VecDeque<EdgeIdx>) {
        debug_assert!(self.edges[idx.0].target.is_some());
        self.edges[idx.0].target = Some(revision);
        queue.push_back(idx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::NullObserver;
    use trellis_core::{ConfigurationMapping, ExcludeRule};

    fn rev(name: &str) -> ModuleRevisionId {
        ModuleRevisionId::new("org", name, "1.0")
    }

    fn state_with(root: ModuleDescriptor) -> (ResolveState, VecDeque<EdgeIdx>) {
        let mut state = ResolveState::new(Arc::new(root), "default").unwrap();
        let mut queue = VecDeque::new();
        let root_config = state.root_configuration;
        state.push_outgoing(PathRef::Root, root_config, &mut queue, &NullObserver);
        (state, queue)
    }

    #[test]
    fn root_path_reaches_and_excludes_nothing() {
        let (state, _) = state_with(ModuleDescriptor::new(rev("app")));
        assert!(!state.excludes(PathRef::Root, &ModuleId::new("org", "x")));
        assert!(!state.can_reach(PathRef::Root, state.root_configuration));
    }

    #[test]
    fn one_edge_per_matching_declaration() {
        let root = ModuleDescriptor::new(rev("app"))
            .with_dependency(DependencyDescriptor::new(rev("a")))
            .with_dependency(
                DependencyDescriptor::new(rev("b"))
                    .with_configurations(ConfigurationMapping::parse("test->default").unwrap()),
            );
        let (state, queue) = state_with(root);
        assert_eq!(queue.len(), 1);
        assert_eq!(state.declaration(queue[0]).requested, rev("a"));
        assert!(state.can_reach(PathRef::Edge(queue[0]), state.root_configuration));
    }

    #[test]
    fn exclusions_apply_down_the_path() {
        let root = ModuleDescriptor::new(rev("app")).with_dependency(
            DependencyDescriptor::new(rev("a")).exclude(ExcludeRule::module(&ModuleId::new("org", "c"))),
        );
        let (state, queue) = state_with(root);
        let edge = PathRef::Edge(queue[0]);
        assert!(state.excludes(edge, &ModuleId::new("org", "c")));
        assert!(!state.excludes(edge, &ModuleId::new("org", "d")));
    }

    #[test]
    fn trail_starts_at_root() {
        let root = ModuleDescriptor::new(rev("app"))
            .with_dependency(DependencyDescriptor::new(rev("a")));
        let (state, queue) = state_with(root);
        assert_eq!(state.trail(queue[0]), vec![rev("app")]);
    }
}
