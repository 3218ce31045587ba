//! Version conflict settlement and reporting.

use std::cmp::Ordering;
use std::collections::VecDeque;
use std::fmt;

use indexmap::IndexSet;
use trellis_core::{ModuleId, ModuleRevisionId};

use crate::error::ResolveError;
use crate::path::{EdgeIdx, ResolveState};
use crate::registry::{RevisionIdx, Status};
use crate::version::Version;

/// Total order over competing revisions of one module. The greatest wins.
pub trait ConflictStrategy {
    fn name(&self) -> &str;

    fn compare(&self, a: &ModuleRevisionId, b: &ModuleRevisionId) -> Ordering;
}

/// Highest revision by Maven version ordering.
#[derive(Debug, Default, Clone, Copy)]
pub struct LatestRevision;

impl ConflictStrategy for LatestRevision {
    fn name(&self) -> &str {
        "latest-revision"
    }

    fn compare(&self, a: &ModuleRevisionId, b: &ModuleRevisionId) -> Ordering {
        Version::parse(&a.revision).cmp(&Version::parse(&b.revision))
    }
}

/// Highest revision by plain string comparison.
#[derive(Debug, Default, Clone, Copy)]
pub struct LatestLexicographic;

impl ConflictStrategy for LatestLexicographic {
    fn name(&self) -> &str {
        "latest-lexico"
    }

    fn compare(&self, a: &ModuleRevisionId, b: &ModuleRevisionId) -> Ordering {
        a.revision.cmp(&b.revision)
    }
}

/// Pick the greatest of `candidates`. On a tie the earlier candidate stays.
pub fn select_winner<'a>(
    strategy: &dyn ConflictStrategy,
    candidates: impl IntoIterator<Item = &'a ModuleRevisionId>,
) -> Option<&'a ModuleRevisionId> {
    candidates.into_iter().fold(None, |best, candidate| match best {
        Some(best) if strategy.compare(candidate, best) != Ordering::Greater => Some(best),
        _ => Some(candidate),
    })
}

/// Outcome of settling one module.
#[derive(Debug)]
pub(crate) struct Settlement {
    pub winner: RevisionIdx,
    pub evicted: Vec<RevisionIdx>,
    pub restarted: usize,
}

/// Decide the conflict on `module`: include one revision, evict the others,
/// and restart every edge that pointed at a loser plus every edge that was
/// waiting on the decision.
///
/// The root revision always wins on its own module. Otherwise the greatest
/// undecided revision under `strategy` wins, however it was reached.
pub(crate) fn settle(
    state: &mut ResolveState,
    module: &ModuleId,
    blocked: IndexSet<EdgeIdx>,
    strategy: &dyn ConflictStrategy,
    queue: &mut VecDeque<EdgeIdx>,
) -> Result<Settlement, ResolveError> {
    let Some(module_state) = state.registry.module(module) else {
        return Err(ResolveError::UnsettledConflict {
            module: module.clone(),
        });
    };
    let candidates: Vec<RevisionIdx> = module_state
        .revisions
        .iter()
        .copied()
        .filter(|r| state.registry.revision(*r).status == Status::Conflict)
        .collect();

    let winner = if candidates.is_empty() {
        // Decided earlier; anything still waiting simply follows the winner.
        module_state.selected
    } else if candidates.contains(&state.root) {
        Some(state.root)
    } else {
        let ids = candidates.iter().map(|r| state.registry.revision(*r).id());
        select_winner(strategy, ids).and_then(|id| state.registry.find(id))
    };
    let winner = winner.ok_or_else(|| ResolveError::UnsettledConflict {
        module: module.clone(),
    })?;

    let evicted: Vec<RevisionIdx> = candidates.into_iter().filter(|r| *r != winner).collect();
    state.registry.revision_mut(winner).status = Status::Include;
    for loser in &evicted {
        state.registry.revision_mut(*loser).status = Status::Evict;
    }
    if let Some(module_state) = state.registry.module_mut(module) {
        module_state.selected = Some(winner);
    }

    let mut restart: IndexSet<EdgeIdx> = IndexSet::new();
    for loser in &evicted {
        restart.extend(
            state
                .registry
                .revision(*loser)
                .incoming
                .iter()
                .copied()
                .filter(|e| state.edge(*e).target == Some(*loser)),
        );
    }
    restart.extend(blocked);
    for edge in &restart {
        state.restart(*edge, winner, queue);
    }

    Ok(Settlement {
        winner,
        evicted,
        restarted: restart.len(),
    })
}

/// Every conflict settled during one resolution.
#[derive(Debug, Default, Clone)]
pub struct ConflictReport {
    pub conflicts: Vec<VersionConflict>,
}

/// Several revisions of one module were reachable; one was kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionConflict {
    pub module: ModuleId,
    pub candidates: Vec<String>,
    pub selected: String,
    pub reason: String,
}

impl ConflictReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, conflict: VersionConflict) {
        self.conflicts.push(conflict);
    }

    pub fn is_empty(&self) -> bool {
        self.conflicts.is_empty()
    }

    pub fn len(&self) -> usize {
        self.conflicts.len()
    }

    pub fn get(&self, module: &ModuleId) -> Option<&VersionConflict> {
        self.conflicts.iter().find(|c| &c.module == module)
    }
}

impl fmt::Display for ConflictReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.conflicts.is_empty() {
            return write!(f, "No version conflicts.");
        }
        writeln!(f, "Version conflicts ({}):", self.conflicts.len())?;
        for c in &self.conflicts {
            writeln!(f, "  {c}")?;
        }
        Ok(())
    }
}

impl fmt::Display for VersionConflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} -> {} ({})",
            self.module,
            self.candidates.join(", "),
            self.selected,
            self.reason
        )
    }
}
