//! Collaborators the resolution engine consumes.

use std::path::PathBuf;
use std::sync::Arc;

use trellis_core::{ArtifactDescriptor, DependencyDescriptor, ModuleDescriptor, ModuleRevisionId};

use crate::error::MetadataError;

/// Turns a dependency declaration into concrete module metadata.
///
/// Dynamic revisions (`1.+`, `[1.0,2.0)`, `latest.release`) must be resolved
/// to one concrete revision; the returned descriptor's id is what the
/// registry interns.
pub trait MetadataResolver {
    /// Stable identity of this resolver, used to key cached dynamic lookups.
    fn id(&self) -> &str;

    fn resolve(&self, dependency: &DependencyDescriptor)
        -> Result<Arc<ModuleDescriptor>, MetadataError>;
}

/// Finds the file backing a published artifact.
pub trait ArtifactLocator {
    fn locate(&self, module: &ModuleRevisionId, artifact: &ArtifactDescriptor) -> Option<PathBuf>;
}

impl<T: MetadataResolver + ?Sized> MetadataResolver for &T {
    fn id(&self) -> &str {
        (**self).id()
    }

    fn resolve(
        &self,
        dependency: &DependencyDescriptor,
    ) -> Result<Arc<ModuleDescriptor>, MetadataError> {
        (**self).resolve(dependency)
    }
}

/// Locator that never finds anything; artifacts are reported without files.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoArtifacts;

impl ArtifactLocator for NoArtifacts {
    fn locate(&self, _module: &ModuleRevisionId, _artifact: &ArtifactDescriptor) -> Option<PathBuf> {
        None
    }
}
