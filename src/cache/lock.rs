//! Cross-process named mutex for shared cache directories.
//!
//! A [`CacheLock`] serializes every mutation of one shared resource: a remote's
//! bare repository and its worktrees, or one URL address's cache root. The lock is
//! an exclusive OS file lock (`fs4`) on `<cache>/.locks/<hash>.lock`, where
//! `<hash>` is a stable hash of the resource identity, so it excludes other
//! threads in this process and other `docrestore` processes on the same machine.
//!
//! The lock is released when the guard is dropped. Lock files are never deleted;
//! removing one while another process holds it would let a third process lock a
//! fresh inode and break exclusion.

use crate::utils::identity_hash;
use anyhow::{Context, Result};
use fs4::fs_std::FileExt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Directory under the cache root that holds lock files.
pub const LOCKS_DIR: &str = ".locks";

/// Guard holding an exclusive lock on one cache-root identity.
#[derive(Debug)]
pub struct CacheLock {
    file: File,
    path: PathBuf,
}

impl CacheLock {
    /// Path of the lock file used for `identity` under `cache_dir`.
    #[must_use]
    pub fn lock_path(cache_dir: &Path, identity: &str) -> PathBuf {
        cache_dir.join(LOCKS_DIR).join(format!("{}.lock", identity_hash(identity)))
    }

    /// Acquires the exclusive lock for `identity`, waiting as long as needed.
    ///
    /// The blocking `flock`/`LockFileEx` call runs on the blocking thread pool so
    /// waiting never stalls the async runtime.
    ///
    /// # Errors
    ///
    /// Fails if the locks directory cannot be created or the lock file cannot be
    /// opened or locked.
    pub async fn acquire(cache_dir: &Path, identity: &str) -> Result<Self> {
        let locks_dir = cache_dir.join(LOCKS_DIR);
        tokio::fs::create_dir_all(&locks_dir).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::PermissionDenied {
                anyhow::anyhow!(
                    "Permission denied: cannot create locks directory at {}",
                    locks_dir.display()
                )
            } else {
                anyhow::anyhow!("Failed to create directory {}: {}", locks_dir.display(), e)
            }
        })?;

        let lock_path = Self::lock_path(cache_dir, identity);
        let lock_path_clone = lock_path.clone();
        let identity_owned = identity.to_string();
        let start = Instant::now();

        let file = tokio::task::spawn_blocking(move || -> Result<File> {
            let file = OpenOptions::new()
                .create(true)
                .truncate(false)
                .write(true)
                .open(&lock_path_clone)
                .with_context(|| {
                    format!("Failed to open lock file: {}", lock_path_clone.display())
                })?;

            file.lock_exclusive()
                .with_context(|| format!("Failed to acquire lock for: {identity_owned}"))?;

            Ok(file)
        })
        .await
        .context("Failed to spawn blocking task for lock acquisition")??;

        tracing::debug!(
            target: "docrestore::lock",
            "Acquired lock for {} after {:.2?} ({})",
            identity,
            start.elapsed(),
            lock_path.display()
        );

        Ok(Self {
            file,
            path: lock_path,
        })
    }

    /// Path of the held lock file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for CacheLock {
    fn drop(&mut self) {
        #[allow(unstable_name_collisions)]
        if let Err(e) = FileExt::unlock(&self.file) {
            tracing::warn!(
                target: "docrestore::lock",
                "Failed to unlock {}: {}",
                self.path.display(),
                e
            );
        }
    }
}
