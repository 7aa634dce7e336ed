//! Cache directory layout and named locking.
//!
//! Everything docrestore stores on disk lives under one cache directory shared by
//! all builds on the machine. [`Cache`] owns the path scheme; the restorers never
//! build cache paths by hand.
//!
//! # Cache Directory Structure
//!
//! ```text
//! ~/.docrestore/cache/
//! ├── git/
//! │   └── github.com_org_docs-1a2b3c4d/         # one directory per remote
//! │       ├── .git/                             # bare object store
//! │       ├── main-8a7b6c5d-0123abcd…/          # worktree, tip of main
//! │       └── live-ffee0011-locked-4567ef…/     # worktree pinned by a lock
//! ├── downloads/
//! │   └── example.com_schema.json-9f8e7d6c/     # one root per address
//! │       ├── 3b5d…                             # content-addressed versions
//! │       └── .tmp-<uuid>                       # in-flight download
//! ├── restore-locks/
//! │   └── <hash(docset root)>.json              # every persisted lock (GC input)
//! └── .locks/
//!     └── <hash(identity)>.lock                 # cross-process mutexes
//! ```
//!
//! # Platform-Specific Cache Locations
//!
//! - **Linux/macOS**: `~/.docrestore/cache/`
//! - **Windows**: `%LOCALAPPDATA%\docrestore\cache\`
//! - **Environment Override**: `DOCRESTORE_CACHE_DIR`

pub mod lock;

pub use lock::CacheLock;

use crate::core::{FileOperation, FileResultExt};
use crate::utils::short_name;
use anyhow::Result;
use std::path::{Path, PathBuf};

/// Subdirectory holding one directory per git remote.
pub const GIT_DIR: &str = "git";
/// Subdirectory holding one cache root per URL address.
pub const DOWNLOADS_DIR: &str = "downloads";
/// Subdirectory holding every persisted lock model.
pub const RESTORE_LOCKS_DIR: &str = "restore-locks";

/// Path scheme and locking for the shared cache directory.
///
/// `Cache` is cheap to clone and holds no in-memory state about cache contents;
/// the filesystem is the source of truth so that independent processes agree.
#[derive(Debug, Clone)]
pub struct Cache {
    dir: PathBuf,
}

impl Cache {
    /// Creates a cache rooted at the configured location.
    ///
    /// # Errors
    ///
    /// Fails if no home or local data directory can be determined and
    /// `DOCRESTORE_CACHE_DIR` is unset.
    pub fn new() -> Result<Self> {
        Ok(Self {
            dir: crate::config::get_cache_dir()?,
        })
    }

    /// Creates a cache rooted at `dir`.
    #[must_use]
    pub const fn with_dir(dir: PathBuf) -> Self {
        Self {
            dir,
        }
    }

    /// Root cache directory.
    #[must_use]
    pub fn cache_dir(&self) -> &Path {
        &self.dir
    }

    /// Ensures the cache directory exists, creating it if necessary.
    pub async fn ensure_cache_dir(&self) -> Result<()> {
        if !self.dir.exists() {
            tokio::fs::create_dir_all(&self.dir).await.with_file_context(
                FileOperation::CreateDir,
                &self.dir,
                "creating cache directory",
                "cache::ensure_cache_dir",
            )?;
        }
        Ok(())
    }

    /// Directory that holds one subdirectory per remote.
    #[must_use]
    pub fn git_root(&self) -> PathBuf {
        self.dir.join(GIT_DIR)
    }

    /// Directory for `remote`: parent of its bare repository and its worktrees.
    #[must_use]
    pub fn repo_dir(&self, remote: &str) -> PathBuf {
        self.git_root().join(short_name(remote))
    }

    /// Bare object store for `remote`, at `<repo_dir>/.git`.
    #[must_use]
    pub fn bare_repo_path(&self, remote: &str) -> PathBuf {
        self.repo_dir(remote).join(".git")
    }

    /// Directory that holds one cache root per address.
    #[must_use]
    pub fn downloads_root(&self) -> PathBuf {
        self.dir.join(DOWNLOADS_DIR)
    }

    /// Cache root for a URL address.
    ///
    /// Two addresses map to the same root only if they are the same string.
    #[must_use]
    pub fn download_root(&self, address: &str) -> PathBuf {
        self.downloads_root().join(short_name(address))
    }

    /// Directory where lock models are registered for GC.
    #[must_use]
    pub fn restore_locks_dir(&self) -> PathBuf {
        self.dir.join(RESTORE_LOCKS_DIR)
    }

    /// Acquires the cross-process mutex for a shared resource.
    ///
    /// Git remotes are locked by their bare repository path, URL addresses by
    /// their cache root, so the identity is always the directory being mutated.
    pub async fn lock(&self, resource: &Path) -> Result<CacheLock> {
        CacheLock::acquire(&self.dir, &resource.to_string_lossy()).await
    }
}
