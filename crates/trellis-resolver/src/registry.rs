//! Interned module revisions and configurations for one resolution run.
//!
//! Everything the traversal touches lives here and is addressed by index, so
//! a status change made by the conflict resolver is seen by every edge that
//! points at the revision.

use std::collections::HashMap;
use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};
use trellis_core::{ModuleDescriptor, ModuleId, ModuleRevisionId};

use crate::error::ResolveError;
use crate::path::EdgeIdx;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RevisionIdx(pub(crate) usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConfigIdx(pub(crate) usize);

/// Conflict status of a module revision.
///
/// Moves `Include -> Conflict -> Include | Evict` and never re-enters
/// `Conflict` once its module has been decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Include,
    Conflict,
    Evict,
}

#[derive(Debug)]
pub struct RevisionState {
    pub descriptor: Arc<ModuleDescriptor>,
    pub status: Status,
    /// Edges that were expanded into this revision.
    pub incoming: IndexSet<EdgeIdx>,
    /// Memoized resolution of each declared dependency, by declaration index.
    pub(crate) dependency_targets: Vec<Option<RevisionIdx>>,
    configurations: IndexMap<String, ConfigIdx>,
}

impl RevisionState {
    pub fn id(&self) -> &ModuleRevisionId {
        &self.descriptor.id
    }
}

#[derive(Debug)]
pub struct ConfigurationState {
    pub revision: RevisionIdx,
    pub name: String,
    /// This configuration plus everything it transitively extends.
    pub hierarchy: IndexSet<String>,
    pub incoming: IndexSet<EdgeIdx>,
}

/// Every revision seen for one module coordinate.
#[derive(Debug, Default)]
pub struct ModuleState {
    pub revisions: Vec<RevisionIdx>,
    /// Winner of the settled conflict, once there has been one.
    pub selected: Option<RevisionIdx>,
}

#[derive(Debug, Default)]
pub struct Registry {
    revisions: Vec<RevisionState>,
    by_id: HashMap<ModuleRevisionId, RevisionIdx>,
    modules: IndexMap<ModuleId, ModuleState>,
    configurations: Vec<ConfigurationState>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the single revision state for `descriptor`'s id, creating it on
    /// first sight.
    ///
    /// A second revision of an undecided module puts every revision of that
    /// module into `Conflict`. A revision that shows up after its module was
    /// decided is evicted straight away.
    pub fn intern(&mut self, descriptor: Arc<ModuleDescriptor>) -> RevisionIdx {
        if let Some(&idx) = self.by_id.get(&descriptor.id) {
            return idx;
        }

        let idx = RevisionIdx(self.revisions.len());
        let module = descriptor.id.module.clone();
        self.by_id.insert(descriptor.id.clone(), idx);
        self.revisions.push(RevisionState {
            dependency_targets: vec![None; descriptor.dependencies.len()],
            descriptor,
            status: Status::Include,
            incoming: IndexSet::new(),
            configurations: IndexMap::new(),
        });

        let state = self.modules.entry(module).or_default();
        state.revisions.push(idx);
        if state.selected.is_some() {
            self.revisions[idx.0].status = Status::Evict;
        } else if state.revisions.len() > 1 {
            for r in &state.revisions {
                self.revisions[r.0].status = Status::Conflict;
            }
        }
        idx
    }

    pub fn revision(&self, idx: RevisionIdx) -> &RevisionState {
        &self.revisions[idx.0]
    }

    pub fn revision_mut(&mut self, idx: RevisionIdx) -> &mut RevisionState {
        &mut self.revisions[idx.0]
    }

    pub fn revisions(&self) -> impl Iterator<Item = (RevisionIdx, &RevisionState)> {
        self.revisions
            .iter()
            .enumerate()
            .map(|(i, r)| (RevisionIdx(i), r))
    }

    pub fn find(&self, id: &ModuleRevisionId) -> Option<RevisionIdx> {
        self.by_id.get(id).copied()
    }

    pub fn module(&self, id: &ModuleId) -> Option<&ModuleState> {
        self.modules.get(id)
    }

    pub fn module_mut(&mut self, id: &ModuleId) -> Option<&mut ModuleState> {
        self.modules.get_mut(id)
    }

    pub fn configuration(&self, idx: ConfigIdx) -> &ConfigurationState {
        &self.configurations[idx.0]
    }

    pub fn configuration_mut(&mut self, idx: ConfigIdx) -> &mut ConfigurationState {
        &mut self.configurations[idx.0]
    }

    pub fn configurations(&self) -> impl Iterator<Item = (ConfigIdx, &ConfigurationState)> {
        self.configurations
            .iter()
            .enumerate()
            .map(|(i, c)| (ConfigIdx(i), c))
    }

    pub fn configuration_count(&self) -> usize {
        self.configurations.len()
    }

    /// Status of the revision owning a configuration.
    pub fn status_of(&self, config: ConfigIdx) -> Status {
        self.revision(self.configuration(config).revision).status
    }

    /// Return the single configuration state for `name` within `revision`,
    /// computing its extends-hierarchy on first use.
    ///
    /// Fails if the module does not declare `name`, or if the extends-chain
    /// starting at `name` loops back on itself.
    pub fn get_configuration(
        &mut self,
        revision: RevisionIdx,
        name: &str,
    ) -> Result<ConfigIdx, ResolveError> {
        let mut visiting = Vec::new();
        self.configuration_in(revision, name, &mut visiting)
    }

    fn configuration_in(
        &mut self,
        revision: RevisionIdx,
        name: &str,
        visiting: &mut Vec<String>,
    ) -> Result<ConfigIdx, ResolveError> {
        if let Some(&idx) = self.revisions[revision.0].configurations.get(name) {
            return Ok(idx);
        }
        let descriptor = Arc::clone(&self.revisions[revision.0].descriptor);

        if let Some(start) = visiting.iter().position(|v| v == name) {
            let mut chain = visiting[start..].to_vec();
            chain.push(name.to_string());
            return Err(ResolveError::ConfigurationCycle {
                module: descriptor.id.clone(),
                chain,
            });
        }
        let extends = descriptor.extends_of(name).ok_or_else(|| {
            ResolveError::ConfigurationNotFound {
                module: descriptor.id.clone(),
                configuration: name.to_string(),
            }
        })?;

        visiting.push(name.to_string());
        let mut hierarchy = IndexSet::new();
        hierarchy.insert(name.to_string());
        for parent in extends {
            let parent = self.configuration_in(revision, parent, visiting)?;
            hierarchy.extend(self.configurations[parent.0].hierarchy.iter().cloned());
        }
        visiting.pop();

        let idx = ConfigIdx(self.configurations.len());
        self.configurations.push(ConfigurationState {
            revision,
            name: name.to_string(),
            hierarchy,
            incoming: IndexSet::new(),
        });
        self.revisions[revision.0]
            .configurations
            .insert(name.to_string(), idx);
        Ok(idx)
    }
}
