//! Memoization of dynamic revision lookups across resolutions.
//!
//! A dynamic request (`1.+`, `[1.0,2.0)`, `latest.release`) is answered by
//! the metadata resolver with one concrete revision. Remembering that answer
//! per resolver lets later resolutions skip the scan while the entry is
//! fresh.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use trellis_core::config::RevisionCacheConfig;
use trellis_core::{DependencyDescriptor, ModuleDescriptor, ModuleRevisionId};
use trellis_util::errors::TrellisError;
use trellis_util::lock::FileLock;

use crate::error::MetadataError;
use crate::traits::MetadataResolver;
use crate::version::is_dynamic;

/// A remembered answer to a dynamic request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedRevision {
    pub revision: String,
    pub resolved_at: DateTime<Utc>,
}

impl CachedRevision {
    pub fn new(revision: impl Into<String>) -> Self {
        Self {
            revision: revision.into(),
            resolved_at: Utc::now(),
        }
    }

    /// Whether the entry is younger than `ttl`.
    pub fn is_fresh(&self, ttl: Duration) -> bool {
        (Utc::now() - self.resolved_at)
            .to_std()
            .is_ok_and(|age| age < ttl)
    }
}

pub trait RevisionCache {
    fn get(
        &self,
        resolver_id: &str,
        requested: &ModuleRevisionId,
    ) -> Result<Option<CachedRevision>, TrellisError>;

    fn put(
        &self,
        resolver_id: &str,
        requested: &ModuleRevisionId,
        resolved: &str,
    ) -> Result<(), TrellisError>;
}

impl<T: RevisionCache + ?Sized> RevisionCache for &T {
    fn get(
        &self,
        resolver_id: &str,
        requested: &ModuleRevisionId,
    ) -> Result<Option<CachedRevision>, TrellisError> {
        (**self).get(resolver_id, requested)
    }

    fn put(
        &self,
        resolver_id: &str,
        requested: &ModuleRevisionId,
        resolved: &str,
    ) -> Result<(), TrellisError> {
        (**self).put(resolver_id, requested, resolved)
    }
}

fn cache_key(resolver_id: &str, requested: &ModuleRevisionId) -> String {
    format!("{}#{resolver_id}{}", resolver_id.len(), requested.encode())
}

/// Process-local cache.
#[derive(Debug, Default)]
pub struct InMemoryRevisionCache {
    entries: Mutex<BTreeMap<String, CachedRevision>>,
}

impl InMemoryRevisionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an entry with an explicit timestamp.
    pub fn insert(&self, resolver_id: &str, requested: &ModuleRevisionId, entry: CachedRevision) {
        self.entries
            .lock()
            .insert(cache_key(resolver_id, requested), entry);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl RevisionCache for InMemoryRevisionCache {
    fn get(
        &self,
        resolver_id: &str,
        requested: &ModuleRevisionId,
    ) -> Result<Option<CachedRevision>, TrellisError> {
        Ok(self
            .entries
            .lock()
            .get(&cache_key(resolver_id, requested))
            .cloned())
    }

    fn put(
        &self,
        resolver_id: &str,
        requested: &ModuleRevisionId,
        resolved: &str,
    ) -> Result<(), TrellisError> {
        self.insert(resolver_id, requested, CachedRevision::new(resolved));
        Ok(())
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CacheFile {
    #[serde(default)]
    entries: BTreeMap<String, CachedRevision>,
}

/// JSON file shared between processes.
///
/// Every `put` holds an exclusive lock on `<file>.lock` across the whole
/// read-modify-write, so concurrent writers never drop each other's entries.
/// Reads take no lock; the file is always replaced atomically.
#[derive(Debug, Clone)]
pub struct FileRevisionCache {
    path: PathBuf,
    lock_timeout: Duration,
}

impl FileRevisionCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock_timeout: trellis_util::lock::DEFAULT_LOCK_TIMEOUT,
        }
    }

    pub fn from_config(config: &RevisionCacheConfig) -> Self {
        Self::new(config.file_path()).with_lock_timeout(config.lock_timeout())
    }

    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<CacheFile, TrellisError> {
        if !self.path.is_file() {
            return Ok(CacheFile::default());
        }
        let content = std::fs::read_to_string(&self.path)?;
        serde_json::from_str(&content).map_err(|e| TrellisError::Cache {
            message: format!("Failed to parse {}: {e}", self.path.display()),
        })
    }
}

impl RevisionCache for FileRevisionCache {
    fn get(
        &self,
        resolver_id: &str,
        requested: &ModuleRevisionId,
    ) -> Result<Option<CachedRevision>, TrellisError> {
        let mut file = self.read()?;
        Ok(file.entries.remove(&cache_key(resolver_id, requested)))
    }

    fn put(
        &self,
        resolver_id: &str,
        requested: &ModuleRevisionId,
        resolved: &str,
    ) -> Result<(), TrellisError> {
        let _lock = FileLock::acquire(&self.path, self.lock_timeout)?;
        let mut file = self.read().unwrap_or_else(|e| {
            tracing::warn!("Discarding unreadable revision cache: {e}");
            CacheFile::default()
        });
        file.entries.insert(
            cache_key(resolver_id, requested),
            CachedRevision::new(resolved),
        );
        let data = serde_json::to_vec_pretty(&file).map_err(|e| TrellisError::Cache {
            message: format!("Failed to serialize revision cache: {e}"),
        })?;
        trellis_util::fs::write_atomic(&self.path, &data)?;
        Ok(())
    }
}

/// Metadata resolver that answers dynamic requests from a [`RevisionCache`]
/// while the cached answer is fresh, and records new answers otherwise.
///
/// Cache errors are logged and never fail a lookup.
pub struct CachingMetadataResolver<R, C> {
    inner: R,
    cache: C,
    ttl: Duration,
    enabled: bool,
}

impl<R: MetadataResolver, C: RevisionCache> CachingMetadataResolver<R, C> {
    pub fn new(inner: R, cache: C, ttl: Duration) -> Self {
        Self {
            inner,
            cache,
            ttl,
            enabled: true,
        }
    }

    /// A disabled cache passes every request straight through.
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn inner(&self) -> &R {
        &self.inner
    }

    pub fn cache(&self) -> &C {
        &self.cache
    }

    fn cached(&self, requested: &ModuleRevisionId) -> Option<CachedRevision> {
        match self.cache.get(self.inner.id(), requested) {
            Ok(entry) => entry.filter(|e| e.is_fresh(self.ttl)),
            Err(e) => {
                tracing::warn!("Revision cache lookup for {requested} failed: {e}");
                None
            }
        }
    }
}

impl<R: MetadataResolver> CachingMetadataResolver<R, FileRevisionCache> {
    /// Wrap `inner` with the file cache described by `[cache]`.
    pub fn from_config(inner: R, config: &RevisionCacheConfig) -> Self {
        Self::new(inner, FileRevisionCache::from_config(config), config.ttl())
            .enabled(config.enabled)
    }
}

impl<R: MetadataResolver, C: RevisionCache> MetadataResolver for CachingMetadataResolver<R, C> {
    fn id(&self) -> &str {
        self.inner.id()
    }

    fn resolve(
        &self,
        dependency: &DependencyDescriptor,
    ) -> Result<Arc<ModuleDescriptor>, MetadataError> {
        let requested = &dependency.requested;
        if !self.enabled || !is_dynamic(&requested.revision) {
            return self.inner.resolve(dependency);
        }

        if let Some(entry) = self.cached(requested) {
            let mut pinned = dependency.clone();
            pinned.requested = requested.with_revision(entry.revision.as_str());
            match self.inner.resolve(&pinned) {
                Ok(descriptor) => {
                    tracing::debug!("{requested} served from cache as {}", entry.revision);
                    return Ok(descriptor);
                }
                Err(e) => tracing::debug!("Cached {} no longer available: {e}", entry.revision),
            }
        }

        let descriptor = self.inner.resolve(dependency)?;
        if let Err(e) = self
            .cache
            .put(self.inner.id(), requested, &descriptor.id.revision)
        {
            tracing::warn!("Failed to record {requested} in revision cache: {e}");
        }
        Ok(descriptor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn requested() -> ModuleRevisionId {
        ModuleRevisionId::new("org", "lib", "1.+")
    }

    #[test]
    fn freshness_window() {
        let fresh = CachedRevision::new("1.2");
        assert!(fresh.is_fresh(Duration::from_secs(60)));

        let old = CachedRevision {
            revision: "1.2".to_string(),
            resolved_at: Utc::now() - chrono::Duration::hours(2),
        };
        assert!(!old.is_fresh(Duration::from_secs(3600)));
    }

    #[test]
    fn keys_are_scoped_by_resolver() {
        let cache = InMemoryRevisionCache::new();
        cache.put("central", &requested(), "1.2").unwrap();
        assert_eq!(
            cache.get("central", &requested()).unwrap().unwrap().revision,
            "1.2"
        );
        assert!(cache.get("other", &requested()).unwrap().is_none());
    }

    #[test]
    fn file_cache_survives_reopen() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("cache").join("revisions.json");

        FileRevisionCache::new(&path)
            .put("central", &requested(), "1.4")
            .unwrap();
        FileRevisionCache::new(&path)
            .put("central", &ModuleRevisionId::new("org", "b", "latest.release"), "3.0")
            .unwrap();

        let reopened = FileRevisionCache::new(&path);
        let entry = reopened.get("central", &requested()).unwrap().unwrap();
        assert_eq!(entry.revision, "1.4");
        assert!(reopened
            .get("central", &ModuleRevisionId::new("org", "b", "latest.release"))
            .unwrap()
            .is_some());
        assert!(FileLock::try_acquire(&path).unwrap().is_some());
    }

    #[test]
    fn corrupt_file_is_reported_then_replaced() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("revisions.json");
        std::fs::write(&path, "not json").unwrap();

        let cache = FileRevisionCache::new(&path);
        assert!(cache.get("central", &requested()).is_err());
        cache.put("central", &requested(), "1.0").unwrap();
        assert!(cache.get("central", &requested()).unwrap().is_some());
    }
}
