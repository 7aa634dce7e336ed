//! Git toolchain adapter.
//!
//! docrestore never implements git internals; it drives the system `git` binary
//! through [`GitCommand`]. The operations the restore engine needs are expressed
//! by the [`GitToolchain`] trait so the engine can be exercised against a fake
//! toolchain in tests. [`GitCli`] is the production implementation.
//!
//! Every path argument named `repo` is the **bare** repository directory
//! (`<repo_dir>/.git`). Failures are returned as-is; the restore engine wraps
//! them into domain errors with remote and branch context.
//!
//! # Example
//!
//! ```rust,no_run
//! use docrestore::git::{GitCli, GitToolchain};
//! use std::path::Path;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let git = GitCli::new();
//! let repo = Path::new("/tmp/cache/git/docs/.git");
//! git.clone_or_update_bare(repo, "https://github.com/org/docs", &["main".to_string()], true)
//!     .await?;
//! let tip = git.rev_parse(repo, "refs/heads/main").await?;
//! # Ok(())
//! # }
//! ```

pub mod command_builder;

pub use command_builder::{FetchDepth, GitCommand, GitCommandOutput, branch_ref};

use anyhow::{Context, Result};
use futures::future::BoxFuture;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::constants::DEFAULT_GIT_TIMEOUT;

/// Operations the restore engine performs against git.
///
/// Implementations must be safe to call concurrently for different
/// repositories. Mutating calls for the same repository are serialized by the
/// caller through [`crate::cache::CacheLock`].
pub trait GitToolchain: Send + Sync {
    /// Creates the bare repository if missing, then fetches `branches` from
    /// `remote` in one batched operation. `shallow` requests depth one; a
    /// non-shallow fetch into a repository left shallow earlier restores full
    /// history.
    fn clone_or_update_bare<'a>(
        &'a self,
        repo: &'a Path,
        remote: &'a str,
        branches: &'a [String],
        shallow: bool,
    ) -> BoxFuture<'a, Result<()>>;

    /// Paths of the worktrees registered with `repo`, excluding the bare entry.
    fn list_worktrees<'a>(&'a self, repo: &'a Path) -> BoxFuture<'a, Result<Vec<PathBuf>>>;

    /// Adds a detached worktree at `dest` checked out at `commit`.
    fn add_worktree<'a>(
        &'a self,
        repo: &'a Path,
        commit: &'a str,
        dest: &'a Path,
    ) -> BoxFuture<'a, Result<()>>;

    /// Resolves `reference` to a commit id; `None` if it does not resolve.
    fn rev_parse<'a>(
        &'a self,
        repo: &'a Path,
        reference: &'a str,
    ) -> BoxFuture<'a, Result<Option<String>>>;

    /// Fetches a single `reference` from `remote` into `repo`.
    fn fetch<'a>(
        &'a self,
        repo: &'a Path,
        remote: &'a str,
        reference: &'a str,
    ) -> BoxFuture<'a, Result<()>>;
}

/// [`GitToolchain`] backed by the system `git` executable.
#[derive(Debug, Clone)]
pub struct GitCli {
    timeout: Option<Duration>,
}

impl Default for GitCli {
    fn default() -> Self {
        Self {
            timeout: Some(DEFAULT_GIT_TIMEOUT),
        }
    }
}

impl GitCli {
    /// Toolchain with the default per-command timeout.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Toolchain with a custom per-command timeout; `None` disables it.
    #[must_use]
    pub const fn with_timeout(timeout: Option<Duration>) -> Self {
        Self {
            timeout,
        }
    }

    fn in_repo(&self, cmd: GitCommand, repo: &Path) -> GitCommand {
        cmd.with_timeout(self.timeout).current_dir(repo)
    }
}

impl GitToolchain for GitCli {
    fn clone_or_update_bare<'a>(
        &'a self,
        repo: &'a Path,
        remote: &'a str,
        branches: &'a [String],
        shallow: bool,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            if !is_bare_repo(repo) {
                tokio::fs::create_dir_all(repo).await.with_context(|| {
                    format!("Failed to create repository directory {}", repo.display())
                })?;
                GitCommand::init_bare(repo)
                    .with_timeout(self.timeout)
                    .with_context(remote)
                    .execute_success()
                    .await?;
            }

            let depth = if shallow {
                FetchDepth::Shallow
            } else if repo.join("shallow").is_file() {
                FetchDepth::Unshallow
            } else {
                FetchDepth::Full
            };
            self.in_repo(GitCommand::fetch_branches(remote, branches, depth), repo)
                .with_context(remote)
                .execute_success()
                .await
        })
    }

    fn list_worktrees<'a>(&'a self, repo: &'a Path) -> BoxFuture<'a, Result<Vec<PathBuf>>> {
        Box::pin(async move {
            let output = self.in_repo(GitCommand::worktree_list(), repo).execute_stdout().await?;
            Ok(parse_worktree_list(&output))
        })
    }

    fn add_worktree<'a>(
        &'a self,
        repo: &'a Path,
        commit: &'a str,
        dest: &'a Path,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            self.in_repo(GitCommand::worktree_add(dest, commit), repo).execute_success().await
        })
    }

    fn rev_parse<'a>(
        &'a self,
        repo: &'a Path,
        reference: &'a str,
    ) -> BoxFuture<'a, Result<Option<String>>> {
        Box::pin(async move {
            let commit = self
                .in_repo(GitCommand::rev_parse_commit(reference), repo)
                .execute_optional()
                .await?;
            Ok(commit.filter(|c| !c.is_empty()))
        })
    }

    fn fetch<'a>(
        &'a self,
        repo: &'a Path,
        remote: &'a str,
        reference: &'a str,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            self.in_repo(GitCommand::fetch_ref(remote, reference), repo)
                .with_context(remote)
                .execute_success()
                .await
        })
    }
}

/// True if `path` looks like an initialized bare repository.
#[must_use]
pub fn is_bare_repo(path: &Path) -> bool {
    path.join("HEAD").is_file() && path.join("objects").is_dir()
}

/// Parses `git worktree list --porcelain` output into worktree paths.
///
/// Records are separated by blank lines; the bare repository's own record is
/// skipped.
#[must_use]
pub fn parse_worktree_list(output: &str) -> Vec<PathBuf> {
    let mut worktrees = Vec::new();
    let mut current: Option<PathBuf> = None;

    for line in output.lines() {
        if let Some(path) = line.strip_prefix("worktree ") {
            if let Some(previous) = current.take() {
                worktrees.push(previous);
            }
            current = Some(PathBuf::from(path));
        } else if line == "bare" {
            current = None;
        } else if line.is_empty() {
            if let Some(path) = current.take() {
                worktrees.push(path);
            }
        }
    }

    if let Some(path) = current {
        worktrees.push(path);
    }

    worktrees
}
