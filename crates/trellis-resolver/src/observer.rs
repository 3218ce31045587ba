//! Structured progress reporting for the resolution loop.
//!
//! The engine emits a [`ResolutionEvent`] at every decision point. Nothing in
//! the algorithm reads them back; they exist for logs and for tests that want
//! to check which branch was taken.

use parking_lot::Mutex;
use trellis_core::{ModuleId, ModuleRevisionId};

/// One step taken by the resolver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolutionEvent {
    EdgeResolved {
        from: ModuleRevisionId,
        requested: ModuleRevisionId,
        resolved: ModuleRevisionId,
    },
    EdgeFailed {
        requested: ModuleRevisionId,
        message: String,
    },
    EdgeExcluded {
        from: ModuleRevisionId,
        excluded: ModuleRevisionId,
    },
    /// A configuration already on the current path was not expanded again.
    CycleSkipped {
        module: ModuleRevisionId,
        configuration: String,
    },
    ConflictDeferred {
        module: ModuleId,
        revision: ModuleRevisionId,
    },
    ConflictSettled {
        module: ModuleId,
        selected: ModuleRevisionId,
        evicted: Vec<ModuleRevisionId>,
        restarted: usize,
    },
    /// A queued edge whose path runs through an evicted revision was dropped.
    StaleEdgeDiscarded {
        from: ModuleRevisionId,
        requested: ModuleRevisionId,
    },
    ArtifactMissing {
        module: ModuleRevisionId,
        artifact: String,
    },
    Finished {
        revisions: usize,
        artifacts: usize,
        unresolved: usize,
    },
}

pub trait ResolutionObserver {
    fn notify(&self, event: &ResolutionEvent);
}

/// Forwards events to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl ResolutionObserver for TracingObserver {
    fn notify(&self, event: &ResolutionEvent) {
        match event {
            ResolutionEvent::EdgeResolved {
                from,
                requested,
                resolved,
            } => tracing::debug!("{from}: {requested} resolved to {resolved}"),
            ResolutionEvent::EdgeFailed { requested, message } => {
                tracing::warn!("Failed to resolve {requested}: {message}")
            }
            ResolutionEvent::EdgeExcluded { from, excluded } => {
                tracing::debug!("{excluded} excluded below {from}")
            }
            ResolutionEvent::CycleSkipped {
                module,
                configuration,
            } => tracing::debug!("Skipping {module}({configuration}), already on this path"),
            ResolutionEvent::ConflictDeferred { module, revision } => {
                tracing::debug!("Deferring {revision} until {module} conflict is settled")
            }
            ResolutionEvent::ConflictSettled {
                module,
                selected,
                evicted,
                restarted,
            } => {
                let evicted: Vec<&str> = evicted.iter().map(|r| r.revision.as_str()).collect();
                tracing::info!(
                    "Conflict on {module}: selected {} over {} ({restarted} edges restarted)",
                    selected.revision,
                    evicted.join(", ")
                )
            }
            ResolutionEvent::StaleEdgeDiscarded { from, requested } => {
                tracing::debug!("Dropping {from} -> {requested}, path runs through an evicted revision")
            }
            ResolutionEvent::ArtifactMissing { module, artifact } => {
                tracing::warn!("Artifact {artifact} of {module} not found")
            }
            ResolutionEvent::Finished {
                revisions,
                artifacts,
                unresolved,
            } => tracing::info!(
                "Resolved {revisions} revisions, {artifacts} artifacts, {unresolved} unresolved"
            ),
        }
    }
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullObserver;

impl ResolutionObserver for NullObserver {
    fn notify(&self, _event: &ResolutionEvent) {}
}

/// Keeps every event in memory.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<ResolutionEvent>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ResolutionEvent> {
        self.events.lock().clone()
    }

    pub fn count(&self, pred: impl Fn(&ResolutionEvent) -> bool) -> usize {
        self.events.lock().iter().filter(|e| pred(e)).count()
    }
}

impl ResolutionObserver for RecordingObserver {
    fn notify(&self, event: &ResolutionEvent) {
        self.events.lock().push(event.clone());
    }
}
