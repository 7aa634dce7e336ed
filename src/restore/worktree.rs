//! Worktree materialization for one remote.
//!
//! A worktree's directory name is a pure function of branch, commit, and
//! whether the commit was pinned by a lock:
//!
//! ```text
//! <repo_dir>/<safe-branch>-<hash8(branch)>-[locked-]<commit>
//! ```
//!
//! The hash keeps `feature/a` and `feature_a` apart after sanitizing. Worktrees
//! are never deleted here; a path that exists is reused as-is.

use anyhow::Result;
use dashmap::{DashMap, DashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::OnceCell;

use crate::constants::LOCKED_MARKER;
use crate::git::GitToolchain;
use crate::utils::{sanitize_name, short_hash};

/// Paths of worktrees created or confirmed by this process.
///
/// Shared by every [`WorktreeManager`] of a restorer so that two tasks asking
/// for the same path wait on one worktree add instead of racing.
pub type WorktreeRegistry = Arc<DashMap<PathBuf, Arc<OnceCell<()>>>>;

/// Name prefix shared by every worktree of `branch`.
#[must_use]
pub fn worktree_prefix(branch: &str) -> String {
    format!("{}-{}-", sanitize_name(branch), short_hash(branch))
}

/// Deterministic worktree path for a branch at a commit.
#[must_use]
pub fn worktree_path(repo_dir: &Path, branch: &str, commit: &str, locked: bool) -> PathBuf {
    let marker = if locked { LOCKED_MARKER } else { "" };
    repo_dir.join(format!("{}{marker}{commit}", worktree_prefix(branch)))
}

/// Splits a worktree directory name back into `(commit, locked)` for `branch`.
#[must_use]
pub fn parse_worktree_name(name: &str, branch: &str) -> Option<(String, bool)> {
    let rest = name.strip_prefix(&worktree_prefix(branch))?;
    let (commit, locked) = match rest.strip_prefix(LOCKED_MARKER) {
        Some(commit) => (commit, true),
        None => (rest, false),
    };
    if commit.is_empty() || !commit.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    Some((commit.to_string(), locked))
}

fn normalize(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

/// Ensures worktrees exist for one bare repository during one restore pass.
///
/// [`WorktreeManager::prepare`] lists the registered worktrees once; every
/// [`WorktreeManager::ensure_worktree`] call after that consults the listing
/// instead of asking git again. Callers hold the remote's
/// [`crate::cache::CacheLock`] for the manager's lifetime.
pub struct WorktreeManager<'a> {
    git: &'a dyn GitToolchain,
    bare_repo: PathBuf,
    repo_dir: PathBuf,
    known: DashSet<PathBuf>,
    in_flight: WorktreeRegistry,
}

impl<'a> WorktreeManager<'a> {
    /// Lists registered worktrees of `bare_repo` and returns a ready manager.
    ///
    /// `repo_dir` is the parent directory worktrees are created in.
    pub async fn prepare(
        git: &'a dyn GitToolchain,
        bare_repo: &Path,
        repo_dir: &Path,
        in_flight: WorktreeRegistry,
    ) -> Result<Self> {
        let listed = git.list_worktrees(bare_repo).await?;
        let known = DashSet::new();
        for path in listed {
            known.insert(normalize(&path));
        }
        tracing::debug!(
            target: "docrestore::restore",
            "{} worktrees registered for {}",
            known.len(),
            bare_repo.display()
        );

        Ok(Self {
            git,
            bare_repo: bare_repo.to_path_buf(),
            repo_dir: repo_dir.to_path_buf(),
            known,
            in_flight,
        })
    }

    fn is_registered(&self, path: &Path) -> bool {
        path.exists() && self.known.contains(&normalize(path))
    }

    async fn add(&self, path: &Path, branch: &str, commit: &str) -> Result<()> {
        if self.is_registered(path) {
            return Ok(());
        }
        if path.exists() {
            // Left behind by an interrupted add, or the repository was recreated
            tracing::warn!(
                target: "docrestore::restore",
                "Replacing unregistered directory {}",
                path.display()
            );
            tokio::fs::remove_dir_all(path).await?;
        }
        self.git.add_worktree(&self.bare_repo, commit, path).await?;
        self.known.insert(normalize(path));
        tracing::info!(
            target: "docrestore::restore",
            "Checked out {} at {} into {}",
            branch,
            commit,
            path.display()
        );
        Ok(())
    }

    /// Returns the worktree path for `branch` at `commit`, adding it if needed.
    ///
    /// Concurrent calls for the same path share one worktree add; later callers
    /// observe the first caller's result.
    pub async fn ensure_worktree(&self, branch: &str, commit: &str, locked: bool) -> Result<PathBuf> {
        let path = worktree_path(&self.repo_dir, branch, commit, locked);

        if self.is_registered(&path) {
            tracing::debug!(target: "docrestore::restore", "Reusing worktree {}", path.display());
            return Ok(path);
        }

        let cell = self
            .in_flight
            .entry(path.clone())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone();
        let result = cell.get_or_try_init(|| self.add(&path, branch, commit)).await.map(|_| ());
        // Later passes re-check the filesystem instead of trusting a stale cell
        self.in_flight.remove_if(&path, |_, existing| Arc::ptr_eq(existing, &cell));
        result?;

        Ok(path)
    }
}
