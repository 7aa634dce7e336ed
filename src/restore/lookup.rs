//! Phase one of git restore: satisfy branches from local checkouts.
//!
//! Before any network access, each requested branch is offered to a
//! [`LocalRestoreLookup`]. A hit removes the branch from the fetch set; a miss
//! falls through to the batched fetch in [`super::git::GitRestorer`].
//!
//! [`WorktreeLookup`] answers from the cache layout alone and never runs git:
//!
//! - a commit pinned by the lock is satisfied by an existing worktree at that
//!   commit (locked or not)
//! - in implicit mode, an unpinned branch is satisfied by its most recently
//!   used worktree
//! - in implicit mode, a no-checkout branch is satisfied once the bare
//!   repository exists

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::cache::Cache;
use crate::git::is_bare_repo;

use super::worktree::{parse_worktree_name, worktree_path};

/// What phase one is asked to find.
#[derive(Debug, Clone, Copy)]
pub struct RestoreKey<'a> {
    /// Remote address.
    pub remote: &'a str,
    /// Branch name.
    pub branch: &'a str,
    /// Commit pinned by the existing lock.
    pub pinned_commit: Option<&'a str>,
    /// Branch wants objects only.
    pub no_checkout: bool,
    /// Implicit mode is on for this pass.
    pub implicit: bool,
}

/// A branch satisfied without fetching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocalHit {
    /// An existing worktree at a known commit.
    Worktree {
        /// Worktree directory
        path: PathBuf,
        /// Commit checked out there
        commit: String,
    },
    /// A no-checkout branch whose object store is already present.
    ObjectsOnly,
}

/// Phase-one strategy.
pub trait LocalRestoreLookup: Send + Sync {
    /// Returns a hit if `key` can be satisfied from disk.
    fn find(&self, key: &RestoreKey<'_>) -> Option<LocalHit>;
}

/// [`LocalRestoreLookup`] over the cache directory layout.
#[derive(Debug, Clone)]
pub struct WorktreeLookup {
    cache: Cache,
}

impl WorktreeLookup {
    /// Lookup over `cache`.
    #[must_use]
    pub const fn new(cache: Cache) -> Self {
        Self {
            cache,
        }
    }

    fn most_recent_worktree(&self, remote: &str, branch: &str) -> Option<LocalHit> {
        let repo_dir = self.cache.repo_dir(remote);
        let entries = std::fs::read_dir(&repo_dir).ok()?;

        let mut best: Option<(SystemTime, PathBuf, String)> = None;
        for entry in entries.flatten() {
            let name = entry.file_name();
            let Some((commit, _locked)) = name.to_str().and_then(|n| parse_worktree_name(n, branch))
            else {
                continue;
            };
            let Ok(metadata) = entry.metadata() else {
                continue;
            };
            if !metadata.is_dir() || !is_worktree(&entry.path()) {
                continue;
            }
            let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
            if best.as_ref().is_none_or(|(time, _, _)| modified > *time) {
                best = Some((modified, entry.path(), commit));
            }
        }

        best.map(|(_, path, commit)| LocalHit::Worktree {
            path,
            commit,
        })
    }
}

/// A checked-out worktree carries a `.git` file pointing back at the bare
/// repository; a directory without one is a leftover of an interrupted add.
fn is_worktree(path: &Path) -> bool {
    path.join(".git").is_file()
}

impl LocalRestoreLookup for WorktreeLookup {
    fn find(&self, key: &RestoreKey<'_>) -> Option<LocalHit> {
        if key.no_checkout {
            let bare = self.cache.bare_repo_path(key.remote);
            return (key.implicit && is_bare_repo(&bare)).then_some(LocalHit::ObjectsOnly);
        }

        let repo_dir = self.cache.repo_dir(key.remote);
        if let Some(commit) = key.pinned_commit {
            return [true, false]
                .into_iter()
                .map(|locked| worktree_path(&repo_dir, key.branch, commit, locked))
                .find(|path| is_worktree(path))
                .map(|path| LocalHit::Worktree {
                    path,
                    commit: commit.to_string(),
                });
        }

        if key.implicit { self.most_recent_worktree(key.remote, key.branch) } else { None }
    }
}
