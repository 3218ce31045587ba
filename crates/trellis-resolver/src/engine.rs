//! Resolution driver: breadth-first edge queue plus deferred conflicts.
//!
//! The loop runs until both the queue and the conflict table are empty:
//!
//! 1. While edges are queued, pop the oldest one, resolve its target and
//!    either expand it or park it behind its module's conflict.
//! 2. Once the queue drains, settle the oldest pending conflict and queue
//!    every edge the decision restarted.
//!
//! Failures to resolve an edge are recorded and never stop the loop.

use std::collections::VecDeque;
use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};
use trellis_core::config::{ConflictStrategyKind, ResolverConfig};
use trellis_core::{ModuleDescriptor, ModuleId, ModuleRevisionId};

use crate::assemble::Assembler;
use crate::conflict::{
    settle, ConflictReport, ConflictStrategy, LatestLexicographic, LatestRevision, VersionConflict,
};
use crate::error::ResolveError;
use crate::observer::{ResolutionEvent, ResolutionObserver, TracingObserver};
use crate::path::{EdgeIdx, PathRef, ResolveState};
use crate::registry::Status;
use crate::result::{ResolvedConfiguration, UnresolvedDependency};
use crate::traits::{ArtifactLocator, MetadataResolver};

static LATEST_REVISION: LatestRevision = LatestRevision;
static LATEST_LEXICOGRAPHIC: LatestLexicographic = LatestLexicographic;
static TRACING: TracingObserver = TracingObserver;

/// Resolves configurations of a root module against a metadata source.
pub struct Resolver<'a> {
    metadata: &'a dyn MetadataResolver,
    artifacts: &'a dyn ArtifactLocator,
    strategy: &'a dyn ConflictStrategy,
    observer: &'a dyn ResolutionObserver,
    strict: bool,
}

impl<'a> Resolver<'a> {
    pub fn new(metadata: &'a dyn MetadataResolver, artifacts: &'a dyn ArtifactLocator) -> Self {
        Self {
            metadata,
            artifacts,
            strategy: &LATEST_REVISION,
            observer: &TRACING,
            strict: false,
        }
    }

    /// Build a resolver honouring the `[resolution]` section of `config`.
    pub fn from_config(
        config: &ResolverConfig,
        metadata: &'a dyn MetadataResolver,
        artifacts: &'a dyn ArtifactLocator,
    ) -> Self {
        let strategy: &'a dyn ConflictStrategy = match config.resolution.conflict_strategy {
            ConflictStrategyKind::Latest => &LATEST_REVISION,
            ConflictStrategyKind::LatestLexico => &LATEST_LEXICOGRAPHIC,
        };
        Self::new(metadata, artifacts)
            .with_strategy(strategy)
            .strict(config.resolution.strict)
    }

    pub fn with_strategy(mut self, strategy: &'a dyn ConflictStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_observer(mut self, observer: &'a dyn ResolutionObserver) -> Self {
        self.observer = observer;
        self
    }

    /// In strict mode any unresolved dependency fails the whole call.
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Resolve `configuration` of `root` into a conflict-free tree.
    ///
    /// Fails immediately if the root does not declare `configuration` or its
    /// extends-chain is cyclic. Unresolvable dependencies are collected in
    /// the result unless the resolver is strict.
    pub fn resolve(
        &self,
        root: &ModuleDescriptor,
        configuration: &str,
    ) -> Result<ResolvedConfiguration, ResolveError> {
        tracing::debug!("Resolving {}({configuration})", root.id);
        let mut state = ResolveState::new(Arc::new(root.clone()), configuration)?;
        let mut queue: VecDeque<EdgeIdx> = VecDeque::new();
        let mut conflicts: IndexMap<ModuleId, IndexSet<EdgeIdx>> = IndexMap::new();
        let mut unresolved = Unresolved::default();
        let mut report = ConflictReport::new();

        let root_configuration = state.root_configuration;
        state.push_outgoing(PathRef::Root, root_configuration, &mut queue, self.observer);

        loop {
            if let Some(edge) = queue.pop_front() {
                self.step(&mut state, edge, &mut queue, &mut conflicts, &mut unresolved);
                continue;
            }
            let Some((module, blocked)) = conflicts.shift_remove_index(0) else {
                break;
            };
            let conflict = self.settle(&mut state, &module, blocked, &mut queue)?;
            report.add(conflict);
        }

        let unresolved = unresolved.into_vec();
        let result = Assembler::new(&state, self.artifacts, self.observer).assemble(
            configuration,
            unresolved,
            report,
        )?;
        self.observer.notify(&ResolutionEvent::Finished {
            revisions: result.modules().len(),
            artifacts: result.artifacts.len(),
            unresolved: result.unresolved.len(),
        });

        if self.strict {
            result.rethrow_failure()?;
        }
        Ok(result)
    }

    /// Process one queued edge.
    fn step(
        &self,
        state: &mut ResolveState,
        edge: EdgeIdx,
        queue: &mut VecDeque<EdgeIdx>,
        conflicts: &mut IndexMap<ModuleId, IndexSet<EdgeIdx>>,
        unresolved: &mut Unresolved,
    ) {
        if !state.is_live(edge) {
            self.observer.notify(&ResolutionEvent::StaleEdgeDiscarded {
                from: state.source_id(edge).clone(),
                requested: state.declaration(edge).requested.clone(),
            });
            return;
        }

        let mut target = match state.resolve_edge(edge, self.metadata) {
            Ok(target) => target,
            Err(err) => {
                let requested = state.declaration(edge).requested.clone();
                self.observer.notify(&ResolutionEvent::EdgeFailed {
                    requested: requested.clone(),
                    message: err.to_string(),
                });
                unresolved.record(requested, err);
                return;
            }
        };

        let revision = state.registry.revision(target);
        match revision.status {
            Status::Conflict => {
                let module = revision.id().module.clone();
                self.observer.notify(&ResolutionEvent::ConflictDeferred {
                    module: module.clone(),
                    revision: revision.id().clone(),
                });
                conflicts.entry(module).or_default().insert(edge);
                return;
            }
            Status::Evict => {
                // Found after its module was decided: follow the winner.
                let selected = state
                    .registry
                    .module(&revision.id().module)
                    .and_then(|m| m.selected);
                if let Some(selected) = selected {
                    state.edges[edge.0].target = Some(selected);
                    target = selected;
                }
            }
            Status::Include => {}
        }

        self.observer.notify(&ResolutionEvent::EdgeResolved {
            from: state.source_id(edge).clone(),
            requested: state.declaration(edge).requested.clone(),
            resolved: state.registry.revision(target).id().clone(),
        });
        if let Err(err) = state.expand_edge(edge, queue, self.observer) {
            let requested = state.declaration(edge).requested.clone();
            self.observer.notify(&ResolutionEvent::EdgeFailed {
                requested: requested.clone(),
                message: err.to_string(),
            });
            unresolved.record(requested, err);
        }
    }

    fn settle(
        &self,
        state: &mut ResolveState,
        module: &ModuleId,
        blocked: IndexSet<EdgeIdx>,
        queue: &mut VecDeque<EdgeIdx>,
    ) -> Result<VersionConflict, ResolveError> {
        let settlement = settle(state, module, blocked, self.strategy, queue)?;

        let selected = state.registry.revision(settlement.winner).id().clone();
        let evicted: Vec<ModuleRevisionId> = settlement
            .evicted
            .iter()
            .map(|r| state.registry.revision(*r).id().clone())
            .collect();
        self.observer.notify(&ResolutionEvent::ConflictSettled {
            module: module.clone(),
            selected: selected.clone(),
            evicted: evicted.clone(),
            restarted: settlement.restarted,
        });

        let reason = if settlement.winner == state.root {
            "root module".to_string()
        } else {
            self.strategy.name().to_string()
        };
        let mut candidates: Vec<String> = evicted.into_iter().map(|r| r.revision).collect();
        candidates.push(selected.revision.clone());
        candidates.sort_by_key(|r| {
            state
                .registry
                .find(&module.at(r.as_str()))
                .map_or(usize::MAX, |idx| idx.0)
        });
        Ok(VersionConflict {
            module: module.clone(),
            candidates,
            selected: selected.revision,
            reason,
        })
    }
}

/// Unresolved dependencies in discovery order, one entry per requested id.
#[derive(Default)]
struct Unresolved {
    entries: IndexMap<ModuleRevisionId, ResolveError>,
}

impl Unresolved {
    fn record(&mut self, requested: ModuleRevisionId, cause: ResolveError) {
        self.entries.entry(requested).or_insert(cause);
    }

    fn into_vec(self) -> Vec<UnresolvedDependency> {
        self.entries
            .into_iter()
            .map(|(requested, cause)| UnresolvedDependency { requested, cause })
            .collect()
    }
}
