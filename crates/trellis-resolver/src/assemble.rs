//! Post-pass turning the settled registry into a tree and an artifact set.

use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};
use petgraph::graph::NodeIndex;
use trellis_core::ArtifactDescriptor;

use crate::conflict::ConflictReport;
use crate::error::ResolveError;
use crate::observer::{ResolutionEvent, ResolutionObserver};
use crate::path::{EdgeIdx, ResolveState};
use crate::registry::{ConfigIdx, Status};
use crate::result::{
    ArtifactId, DependencyTree, ResolvedArtifact, ResolvedConfiguration, ResolvedDependency,
    UnresolvedDependency,
};
use crate::traits::ArtifactLocator;

pub(crate) struct Assembler<'a> {
    state: &'a ResolveState,
    locator: &'a dyn ArtifactLocator,
    observer: &'a dyn ResolutionObserver,
    tree: DependencyTree,
    nodes: Vec<Option<NodeIndex>>,
    configuration_artifacts: Vec<Option<IndexSet<ArtifactId>>>,
    artifacts: IndexMap<ArtifactId, ResolvedArtifact>,
    first_level: IndexMap<usize, IndexSet<NodeIndex>>,
}

impl<'a> Assembler<'a> {
    pub fn new(
        state: &'a ResolveState,
        locator: &'a dyn ArtifactLocator,
        observer: &'a dyn ResolutionObserver,
    ) -> Self {
        let count = state.registry.configuration_count();
        Self {
            state,
            locator,
            observer,
            tree: DependencyTree::new(),
            nodes: vec![None; count],
            configuration_artifacts: vec![None; count],
            artifacts: IndexMap::new(),
            first_level: IndexMap::new(),
        }
    }

    /// Attach every included configuration to the parents of its live
    /// incoming edges. Fails if any revision is still undecided.
    pub fn assemble(
        mut self,
        configuration: &str,
        unresolved: Vec<UnresolvedDependency>,
        conflicts: ConflictReport,
    ) -> Result<ResolvedConfiguration, ResolveError> {
        let state = self.state;
        if let Some((_, revision)) = state
            .registry
            .revisions()
            .find(|(_, r)| r.status == Status::Conflict)
        {
            return Err(ResolveError::UnsettledConflict {
                module: revision.id().module.clone(),
            });
        }

        let root = self.node(state.root_configuration);
        self.tree.set_root(root);

        for (config, config_state) in state.registry.configurations() {
            if state.registry.status_of(config) == Status::Evict {
                continue;
            }
            for &edge in &config_state.incoming {
                if state.edge(edge).target == Some(config_state.revision) && state.is_live(edge) {
                    self.attach(edge, config);
                }
            }
        }

        Ok(ResolvedConfiguration {
            configuration: configuration.to_string(),
            root_descriptor: Arc::clone(&state.registry.revision(state.root).descriptor),
            tree: self.tree,
            first_level: self.first_level,
            artifacts: self.artifacts,
            unresolved,
            conflicts,
        })
    }

    fn node(&mut self, config: ConfigIdx) -> NodeIndex {
        if let Some(idx) = self.nodes[config.0] {
            return idx;
        }
        let state = self.state.registry.configuration(config);
        let idx = self.tree.add_node(ResolvedDependency {
            module: self.state.registry.revision(state.revision).id().clone(),
            configuration: state.name.clone(),
        });
        self.nodes[config.0] = Some(idx);
        idx
    }

    /// Link the source of `edge` to `child` and collect the artifacts the
    /// edge pulls in: the declaration's explicit artifacts, otherwise the
    /// child's own, or both when defaults are requested alongside.
    fn attach(&mut self, edge: EdgeIdx, child: ConfigIdx) {
        let state = self.state;
        let from = state.edge(edge).from;
        let parent_node = self.node(from);
        let child_node = self.node(child);

        let declaration = state.declaration(edge);
        let hierarchy = &state.registry.configuration(from).hierarchy;
        let explicit: Vec<&ArtifactDescriptor> =
            declaration.dependency_artifacts(hierarchy).collect();

        let mut artifacts = IndexSet::new();
        for descriptor in &explicit {
            artifacts.insert(self.resolve_artifact(child, descriptor));
        }
        if explicit.is_empty() || declaration.include_default_artifacts {
            artifacts.extend(self.configuration_artifacts(child));
        }

        self.tree.link(parent_node, child_node, artifacts);

        if from == state.root_configuration {
            self.first_level
                .entry(state.edge(edge).dependency)
                .or_default()
                .insert(child_node);
        }
    }

    /// Artifacts a configuration publishes across its whole hierarchy.
    fn configuration_artifacts(&mut self, config: ConfigIdx) -> IndexSet<ArtifactId> {
        if let Some(artifacts) = &self.configuration_artifacts[config.0] {
            return artifacts.clone();
        }
        let state = self.state;
        let config_state = state.registry.configuration(config);
        let descriptor = &state.registry.revision(config_state.revision).descriptor;

        let mut artifacts = IndexSet::new();
        for name in &config_state.hierarchy {
            for artifact in descriptor.artifacts_for(name) {
                artifacts.insert(self.resolve_artifact(config, &artifact));
            }
        }
        self.configuration_artifacts[config.0] = Some(artifacts.clone());
        artifacts
    }

    /// Locate an artifact of `config`'s module once and record it in the
    /// flat artifact set.
    fn resolve_artifact(&mut self, config: ConfigIdx, descriptor: &ArtifactDescriptor) -> ArtifactId {
        let state = self.state;
        let config_state = state.registry.configuration(config);
        let module = state.registry.revision(config_state.revision).id();
        let id = ArtifactId {
            module: module.clone(),
            name: descriptor.name.clone(),
            kind: descriptor.kind.clone(),
            extension: descriptor.extension.clone(),
            classifier: descriptor.classifier.clone(),
        };
        if self.artifacts.contains_key(&id) {
            return id;
        }

        let file = self.locator.locate(module, descriptor);
        if file.is_none() {
            self.observer.notify(&ResolutionEvent::ArtifactMissing {
                module: module.clone(),
                artifact: descriptor.file_name(&module.revision),
            });
        }
        self.artifacts.insert(
            id.clone(),
            ResolvedArtifact {
                id: id.clone(),
                configuration: config_state.name.clone(),
                file,
            },
        );
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::NullObserver;
    use crate::traits::NoArtifacts;
    use trellis_core::{DependencyDescriptor, ModuleDescriptor, ModuleId, ModuleRevisionId};

    fn descriptor(name: &str, rev: &str) -> Arc<ModuleDescriptor> {
        Arc::new(ModuleDescriptor::new(ModuleRevisionId::new("org", name, rev)))
    }

    #[test]
    fn undecided_revision_is_fatal() {
        let root = ModuleDescriptor::new(ModuleRevisionId::new("org", "app", "1.0"));
        let mut state = ResolveState::new(Arc::new(root), "default").unwrap();
        let first = state.registry.intern(descriptor("lib", "1.0"));
        let second = state.registry.intern(descriptor("lib", "2.0"));
        assert_eq!(state.registry.revision(first).status, Status::Conflict);
        assert_eq!(state.registry.revision(second).status, Status::Conflict);

        let err = Assembler::new(&state, &NoArtifacts, &NullObserver)
            .assemble("default", Vec::new(), ConflictReport::new())
            .unwrap_err();
        match err {
            ResolveError::UnsettledConflict { module } => {
                assert_eq!(module, ModuleId::new("org", "lib"));
            }
            other => panic!("expected unsettled conflict, got {other:?}"),
        }
    }

    #[test]
    fn settled_state_assembles_root_only() {
        let root = ModuleDescriptor::new(ModuleRevisionId::new("org", "app", "1.0"))
            .with_dependency(DependencyDescriptor::new(ModuleRevisionId::new("org", "lib", "1.0")));
        let state = ResolveState::new(Arc::new(root), "default").unwrap();

        let result = Assembler::new(&state, &NoArtifacts, &NullObserver)
            .assemble("default", Vec::new(), ConflictReport::new())
            .unwrap();
        assert!(result.tree().is_empty());
        assert_eq!(result.root().unwrap().module.name(), "app");
    }
}
