//! Dependency restore engine.
//!
//! A restore pass turns a flat list of dependency requests into local copies
//! and a fresh [`DependencyLockModel`]:
//!
//! - [`git::GitRestorer`] groups requests per remote, fetches each remote's
//!   branches in one locked batch, and materializes one worktree per branch and
//!   commit through [`worktree::WorktreeManager`].
//! - [`url::UrlRestorer`] downloads URL dependencies into a content-addressed
//!   cache and prunes unreferenced versions.
//! - [`Restorer`] runs both for one request and merges the results.
//!
//! Each restored checkout is handed to a [`RestoreChildCallback`], which
//! discovers and restores that checkout's own dependencies. The engine never
//! recurses into itself directly, so it can be tested with a stub callback.
//!
//! Failures are per unit (one remote or one address). A failing unit never
//! cancels its siblings; every failure of a pass is returned together in
//! [`RestoreFailures`].

pub mod git;
pub mod lookup;
mod restorer;
pub mod url;
pub mod worktree;

pub use git::{ContributionBranch, GitRestorer};
pub use lookup::{LocalHit, LocalRestoreLookup, RestoreKey, WorktreeLookup};
pub use restorer::{RestoreRequest, Restorer};
pub use url::UrlRestorer;
pub use worktree::WorktreeManager;

use futures::future::BoxFuture;
use std::ops::BitOr;
use std::path::{Path, PathBuf};

use crate::core::RestoreFailures;
use crate::lockfile::DependencyLockModel;

/// Per-branch restore flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct DependencyFlags {
    /// Fetch into the object store only; never check out.
    pub no_checkout: bool,
    /// Request a depth-one fetch.
    pub depth_one: bool,
}

impl DependencyFlags {
    /// No flags set.
    pub const NONE: Self = Self {
        no_checkout: false,
        depth_one: false,
    };

    /// Only `no_checkout` set.
    pub const NO_CHECKOUT: Self = Self {
        no_checkout: true,
        depth_one: false,
    };

    /// Only `depth_one` set.
    pub const DEPTH_ONE: Self = Self {
        no_checkout: false,
        depth_one: true,
    };
}

impl BitOr for DependencyFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self {
            no_checkout: self.no_checkout || rhs.no_checkout,
            depth_one: self.depth_one || rhs.depth_one,
        }
    }
}

/// One requested git dependency: a branch of a normalized remote.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DependencySpec {
    /// Normalized repository address.
    pub remote: String,
    /// Branch name.
    pub branch: String,
    /// Restore flags for this request.
    pub flags: DependencyFlags,
}

impl DependencySpec {
    /// Creates a spec.
    pub fn new(remote: impl Into<String>, branch: impl Into<String>, flags: DependencyFlags) -> Self {
        Self {
            remote: remote.into(),
            branch: branch.into(),
            flags,
        }
    }
}

/// A restored checkout awaiting recursive restore of its own dependencies.
///
/// Construction asserts that every field is non-empty: an empty remote, branch,
/// path, or commit means resolution went wrong upstream, and continuing would
/// write a corrupt lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoreChild {
    remote: String,
    branch: String,
    path: PathBuf,
    commit: String,
    nested_lock: Option<DependencyLockModel>,
}

impl RestoreChild {
    /// Creates a child.
    ///
    /// # Panics
    ///
    /// Panics if `remote`, `branch`, `path`, or `commit` is empty.
    #[must_use]
    pub fn new(
        remote: impl Into<String>,
        branch: impl Into<String>,
        path: impl Into<PathBuf>,
        commit: impl Into<String>,
        nested_lock: Option<DependencyLockModel>,
    ) -> Self {
        let child = Self {
            remote: remote.into(),
            branch: branch.into(),
            path: path.into(),
            commit: commit.into(),
            nested_lock,
        };
        assert!(!child.remote.is_empty(), "restore child with empty remote");
        assert!(!child.branch.is_empty(), "restore child with empty branch for {}", child.remote);
        assert!(
            !child.path.as_os_str().is_empty(),
            "restore child with empty path for {}#{}",
            child.remote,
            child.branch
        );
        assert!(
            !child.commit.is_empty(),
            "restore child with empty commit for {}#{}",
            child.remote,
            child.branch
        );
        child
    }

    /// Remote the checkout came from.
    #[must_use]
    pub fn remote(&self) -> &str {
        &self.remote
    }

    /// Branch that was restored.
    #[must_use]
    pub fn branch(&self) -> &str {
        &self.branch
    }

    /// Worktree directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Commit checked out at [`Self::path`].
    #[must_use]
    pub fn commit(&self) -> &str {
        &self.commit
    }

    /// Lock previously recorded for this checkout's own dependencies.
    #[must_use]
    pub const fn nested_lock(&self) -> Option<&DependencyLockModel> {
        self.nested_lock.as_ref()
    }

    /// `"remote#branch"`
    #[must_use]
    pub fn lock_key(&self) -> String {
        crate::lockfile::lock_key(&self.remote, &self.branch)
    }
}

/// Restores the dependencies declared inside a restored checkout.
///
/// Called once per [`RestoreChild`], possibly concurrently for independent
/// children. Returns the lock of everything it restored.
pub trait RestoreChildCallback: Send + Sync {
    /// Restores the dependencies of the checkout at `path`, pinned by
    /// `nested_lock` when one was recorded.
    fn restore_child<'a>(
        &'a self,
        path: &'a Path,
        nested_lock: Option<&'a DependencyLockModel>,
    ) -> BoxFuture<'a, Result<DependencyLockModel, RestoreFailures>>;
}

/// Callback for checkouts that never declare dependencies of their own.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoNestedRestore;

impl RestoreChildCallback for NoNestedRestore {
    fn restore_child<'a>(
        &'a self,
        _path: &'a Path,
        _nested_lock: Option<&'a DependencyLockModel>,
    ) -> BoxFuture<'a, Result<DependencyLockModel, RestoreFailures>> {
        Box::pin(async { Ok(DependencyLockModel::default()) })
    }
}

/// Knobs for one restore pass.
#[derive(Debug, Clone)]
pub struct RestoreOptions {
    /// Satisfy branches from existing local checkouts before touching the network.
    pub implicit: bool,
    /// Upper bound on concurrently restored remotes and addresses.
    pub max_parallel: usize,
    /// Side branch fetched after first-level restore for authorship metadata.
    pub contribution: Option<ContributionBranch>,
}

impl Default for RestoreOptions {
    fn default() -> Self {
        Self {
            implicit: false,
            max_parallel: crate::constants::default_max_parallel(),
            contribution: None,
        }
    }
}
