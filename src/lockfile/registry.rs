//! Machine-wide registry of persisted lock models.
//!
//! Every successful top-level restore registers its lock under
//! `<cache>/restore-locks/<hash(docset root)>.json`. The URL cache GC reads the
//! whole registry to learn which cached versions any build on this machine may
//! still need, including builds that are not running right now.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::cache::Cache;
use crate::utils::identity_hash;

use super::DependencyLockModel;

/// Directory of registered lock models.
#[derive(Debug, Clone)]
pub struct LockRegistry {
    root: PathBuf,
}

impl LockRegistry {
    /// Registry stored at `root`.
    #[must_use]
    pub const fn new(root: PathBuf) -> Self {
        Self {
            root,
        }
    }

    /// Registry inside a cache directory.
    #[must_use]
    pub fn for_cache(cache: &Cache) -> Self {
        Self::new(cache.restore_locks_dir())
    }

    /// Registry directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Registry file for a docset root.
    ///
    /// The root is canonicalized when it exists so `./docs` and its absolute
    /// path share one entry.
    #[must_use]
    pub fn path_for(&self, docset_root: &Path) -> PathBuf {
        let canonical = docset_root.canonicalize().unwrap_or_else(|_| docset_root.to_path_buf());
        self.root.join(format!("{}.json", identity_hash(&canonical.to_string_lossy())))
    }

    /// Registers (or replaces) the lock of a docset root.
    pub fn save(&self, docset_root: &Path, lock: &DependencyLockModel) -> Result<()> {
        let path = self.path_for(docset_root);
        lock.save(&path)
            .with_context(|| format!("Failed to register lock for {}", docset_root.display()))
    }

    /// Registered lock of a docset root, if any.
    pub fn load(&self, docset_root: &Path) -> Result<Option<DependencyLockModel>> {
        let path = self.path_for(docset_root);
        if !path.exists() {
            return Ok(None);
        }
        DependencyLockModel::load(&path).map(Some)
    }

    /// Every registered lock on this machine.
    ///
    /// Unreadable or corrupt entries are skipped with a warning.
    pub fn load_all(&self) -> Result<Vec<DependencyLockModel>> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }

        let entries = std::fs::read_dir(&self.root)
            .with_context(|| format!("Failed to read lock registry {}", self.root.display()))?;

        let mut locks = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match DependencyLockModel::load(&path) {
                Ok(lock) => locks.push(lock),
                Err(e) => tracing::warn!(
                    target: "docrestore::gc",
                    "Skipping unreadable lock {}: {:#}",
                    path.display(),
                    e
                ),
            }
        }

        Ok(locks)
    }
}
