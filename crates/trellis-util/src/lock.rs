//! Exclusive cross-process file locks.
//!
//! A [`FileLock`] guards a shared on-disk resource (for example the dynamic
//! revision cache) against concurrent writers in other processes. The lock is
//! an OS-level exclusive lock on a dedicated `.lock` file next to the resource
//! and is released when the guard is dropped.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use fs2::FileExt;

use crate::errors::TrellisError;

/// Default timeout for lock acquisition.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(10);

/// Polling interval while waiting for another holder to release the lock.
const LOCK_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// An exclusive lock held on a lock file. Released on drop.
#[derive(Debug)]
pub struct FileLock {
    path: PathBuf,
    file: Option<File>,
}

impl FileLock {
    /// The lock file used to guard `resource`: the same path with `.lock` appended.
    pub fn lock_path_for(resource: &Path) -> PathBuf {
        let mut name = resource
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".lock");
        resource.with_file_name(name)
    }

    /// Acquire the lock guarding `resource`, polling until `timeout` expires.
    pub fn acquire(resource: &Path, timeout: Duration) -> Result<Self, TrellisError> {
        let path = Self::lock_path_for(resource);
        let deadline = Instant::now() + timeout;

        if let Some(parent) = path.parent() {
            crate::fs::ensure_dir(parent).map_err(|e| TrellisError::Lock {
                message: format!("cannot create {}: {e}", parent.display()),
            })?;
        }

        loop {
            if let Some(lock) = Self::try_acquire_at(&path)? {
                return Ok(lock);
            }
            if Instant::now() >= deadline {
                return Err(TrellisError::Lock {
                    message: format!(
                        "timed out after {:?} waiting for {}",
                        timeout,
                        path.display()
                    ),
                });
            }
            thread::sleep(LOCK_POLL_INTERVAL);
        }
    }

    /// Try to acquire the lock guarding `resource` without blocking.
    ///
    /// Returns `Ok(None)` if another holder has it.
    pub fn try_acquire(resource: &Path) -> Result<Option<Self>, TrellisError> {
        let path = Self::lock_path_for(resource);
        if let Some(parent) = path.parent() {
            crate::fs::ensure_dir(parent).map_err(|e| TrellisError::Lock {
                message: format!("cannot create {}: {e}", parent.display()),
            })?;
        }
        Self::try_acquire_at(&path)
    }

    fn try_acquire_at(path: &Path) -> Result<Option<Self>, TrellisError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .map_err(|e| TrellisError::Lock {
                message: format!("cannot open {}: {e}", path.display()),
            })?;

        match file.try_lock_exclusive() {
            Ok(()) => {
                tracing::trace!("acquired lock {}", path.display());
                Ok(Some(Self {
                    path: path.to_path_buf(),
                    file: Some(file),
                }))
            }
            Err(e) if e.kind() == fs2::lock_contended_error().kind() => Ok(None),
            Err(e) => Err(TrellisError::Lock {
                message: format!("lock failed on {}: {e}", path.display()),
            }),
        }
    }

    /// Check if the lock is currently held.
    pub fn is_held(&self) -> bool {
        self.file.is_some()
    }

    /// Path to the lock file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Release the lock explicitly. Also happens on drop.
    pub fn release(&mut self) {
        if let Some(file) = self.file.take() {
            if let Err(e) = FileExt::unlock(&file) {
                tracing::warn!("Failed to release lock {}: {e}", self.path.display());
            }
        }
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        self.release();
    }
}
