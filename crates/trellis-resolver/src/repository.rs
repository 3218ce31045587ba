//! Reference collaborators: an in-memory module repository and a
//! filesystem artifact locator using the Maven directory layout.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use indexmap::IndexMap;
use trellis_core::{ArtifactDescriptor, DependencyDescriptor, ModuleDescriptor, ModuleId, ModuleRevisionId};
use trellis_util::errors::TrellisError;

use crate::error::MetadataError;
use crate::traits::{ArtifactLocator, MetadataResolver};
use crate::version::DynamicRevision;

/// Module descriptors held in memory, keyed by coordinate and revision.
///
/// Dynamic requests resolve to the highest registered revision they match.
#[derive(Debug)]
pub struct InMemoryRepository {
    id: String,
    modules: IndexMap<ModuleId, IndexMap<String, Arc<ModuleDescriptor>>>,
    lookups: AtomicUsize,
}

impl InMemoryRepository {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            modules: IndexMap::new(),
            lookups: AtomicUsize::new(0),
        }
    }

    pub fn add(&mut self, descriptor: ModuleDescriptor) {
        self.modules
            .entry(descriptor.id.module.clone())
            .or_default()
            .insert(descriptor.id.revision.clone(), Arc::new(descriptor));
    }

    pub fn with(mut self, descriptor: ModuleDescriptor) -> Self {
        self.add(descriptor);
        self
    }

    /// Load every `*.toml` module descriptor in `dir`.
    pub fn load_dir(id: impl Into<String>, dir: &Path) -> miette::Result<Self> {
        let mut repository = Self::new(id);
        let read_failed = |e: std::io::Error| TrellisError::Config {
            message: format!("Failed to read {}: {e}", dir.display()),
        };
        let entries = std::fs::read_dir(dir).map_err(read_failed)?;
        let mut paths = Vec::new();
        for entry in entries {
            let path = entry.map_err(read_failed)?.path();
            if path.extension().is_some_and(|ext| ext == "toml") {
                paths.push(path);
            }
        }
        paths.sort();
        for path in paths {
            repository.add(ModuleDescriptor::from_path(&path)?);
        }
        Ok(repository)
    }

    /// Registered revisions of a module, in registration order.
    pub fn revisions(&self, module: &ModuleId) -> Vec<&str> {
        self.modules
            .get(module)
            .map(|revs| revs.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Number of `resolve` calls served so far.
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::Relaxed)
    }
}

impl MetadataResolver for InMemoryRepository {
    fn id(&self) -> &str {
        &self.id
    }

    fn resolve(
        &self,
        dependency: &DependencyDescriptor,
    ) -> Result<Arc<ModuleDescriptor>, MetadataError> {
        self.lookups.fetch_add(1, Ordering::Relaxed);
        let requested = &dependency.requested;
        let not_found = || MetadataError::NotFound {
            module: requested.clone(),
        };
        let revisions = self.modules.get(&requested.module).ok_or_else(not_found)?;

        let revision = match DynamicRevision::parse(&requested.revision) {
            Some(dynamic) => dynamic
                .select(revisions.keys().map(String::as_str))
                .ok_or_else(not_found)?,
            None => requested.revision.as_str(),
        };
        revisions.get(revision).cloned().ok_or_else(not_found)
    }
}

/// Finds artifacts under a Maven-style directory tree:
/// `<root>/<org as path>/<name>/<rev>/<name>-<rev>[-<classifier>].<ext>`.
#[derive(Debug, Clone)]
pub struct FileSystemArtifactLocator {
    root: PathBuf,
}

impl FileSystemArtifactLocator {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding every artifact of one module revision.
    pub fn artifact_dir(&self, module: &ModuleRevisionId) -> PathBuf {
        self.root
            .join(module.organization().replace('.', "/"))
            .join(module.name())
            .join(&module.revision)
    }

    pub fn artifact_path(&self, module: &ModuleRevisionId, artifact: &ArtifactDescriptor) -> PathBuf {
        self.artifact_dir(module)
            .join(artifact.file_name(&module.revision))
    }

    /// Store an artifact file at its layout location.
    pub fn put(
        &self,
        module: &ModuleRevisionId,
        artifact: &ArtifactDescriptor,
        data: &[u8],
    ) -> Result<PathBuf, TrellisError> {
        let path = self.artifact_path(module, artifact);
        trellis_util::fs::write_atomic(&path, data)?;
        Ok(path)
    }
}

impl ArtifactLocator for FileSystemArtifactLocator {
    fn locate(&self, module: &ModuleRevisionId, artifact: &ArtifactDescriptor) -> Option<PathBuf> {
        let path = self.artifact_path(module, artifact);
        path.is_file().then_some(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lib(rev: &str) -> ModuleDescriptor {
        ModuleDescriptor::new(ModuleRevisionId::new("org", "lib", rev))
    }

    fn request(rev: &str) -> DependencyDescriptor {
        DependencyDescriptor::new(ModuleRevisionId::new("org", "lib", rev))
    }

    #[test]
    fn static_and_dynamic_lookups() {
        let repo = InMemoryRepository::new("memory")
            .with(lib("1.0"))
            .with(lib("1.5"))
            .with(lib("2.0"));

        assert_eq!(repo.resolve(&request("1.5")).unwrap().id.revision, "1.5");
        assert_eq!(repo.resolve(&request("1.+")).unwrap().id.revision, "1.5");
        assert_eq!(repo.resolve(&request("[1.0,2.0]")).unwrap().id.revision, "2.0");
        assert_eq!(repo.lookups(), 3);
    }

    #[test]
    fn missing_module_or_revision() {
        let repo = InMemoryRepository::new("memory").with(lib("1.0"));
        assert_eq!(
            repo.resolve(&request("3.0")).unwrap_err(),
            MetadataError::NotFound {
                module: ModuleRevisionId::new("org", "lib", "3.0")
            }
        );
        assert!(repo.resolve(&request("[2.0,)")).is_err());
        let other = DependencyDescriptor::new(ModuleRevisionId::new("org", "other", "1.0"));
        assert!(repo.resolve(&other).is_err());
    }

    #[test]
    fn load_dir_reads_toml_descriptors() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("lib-1.0.toml"), "module = \"org:lib:1.0\"\n").unwrap();
        std::fs::write(
            tmp.path().join("lib-2.0.toml"),
            "module = \"org:lib:2.0\"\n\n[[dependencies]]\nmodule = \"org:dep:1.+\"\n",
        )
        .unwrap();
        std::fs::write(tmp.path().join("README.md"), "ignored").unwrap();

        let repo = InMemoryRepository::load_dir("local", tmp.path()).unwrap();
        assert_eq!(repo.id(), "local");
        assert_eq!(repo.revisions(&ModuleId::new("org", "lib")), ["1.0", "2.0"]);
        let latest = repo.resolve(&request("latest.integration")).unwrap();
        assert_eq!(latest.dependencies.len(), 1);
    }

    #[test]
    fn load_dir_reports_unreadable_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let missing = tmp.path().join("absent");
        let err = InMemoryRepository::load_dir("local", &missing).unwrap_err();
        assert!(err.to_string().contains("Failed to read"));

        let file = tmp.path().join("plain.toml");
        std::fs::write(&file, "module = \"org:lib:1.0\"\n").unwrap();
        assert!(InMemoryRepository::load_dir("local", &file).is_err());
    }

    #[test]
    fn load_dir_rejects_broken_descriptor() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("broken.toml"), "module = \"not-a-coordinate\"\n").unwrap();
        assert!(InMemoryRepository::load_dir("local", tmp.path()).is_err());
    }

    #[test]
    fn locator_layout_mirrors_maven() {
        let tmp = tempfile::tempdir().unwrap();
        let locator = FileSystemArtifactLocator::new(tmp.path());
        let module = ModuleRevisionId::new("org.example.core", "lib", "1.0");
        let jar = ArtifactDescriptor::new("lib");
        let sources = ArtifactDescriptor::new("lib").with_classifier("sources");

        assert!(locator.locate(&module, &jar).is_none());
        locator.put(&module, &jar, b"jar").unwrap();

        let expected = tmp.path().join("org/example/core/lib/1.0/lib-1.0.jar");
        assert_eq!(locator.locate(&module, &jar), Some(expected));
        assert!(locator.locate(&module, &sources).is_none());
    }
}
