//! Git dependency restore.
//!
//! One pass over a flat list of [`DependencySpec`]s:
//!
//! 1. Specs are grouped per remote; each remote keeps its distinct branches
//!    with the union of their flags.
//! 2. Every branch is offered to the [`LocalRestoreLookup`] first. Hits never
//!    touch the network.
//! 3. The remaining branches of a remote are fetched in one batch while the
//!    remote's [`crate::cache::CacheLock`] is held, then rev-parsed and
//!    checked out through the [`WorktreeManager`].
//! 4. Each checkout becomes a [`RestoreChild`] and is handed to the
//!    [`RestoreChildCallback`]; the returned locks are merged into one map.
//!
//! Remotes are restored concurrently up to `max_parallel`. A failing remote or
//! branch is recorded and its siblings carry on.

use anyhow::Result;
use futures::future::join_all;
use futures::stream::{self, StreamExt};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use crate::cache::Cache;
use crate::core::{RestoreError, RestoreFailures};
use crate::git::{GitToolchain, branch_ref};
use crate::lockfile::{DependencyLockModel, GitLockEntry, merge_git_entries};
use crate::utils::touch;

use super::lookup::{LocalHit, LocalRestoreLookup, RestoreKey, WorktreeLookup};
use super::worktree::{WorktreeManager, WorktreeRegistry};
use super::{DependencyFlags, DependencySpec, RestoreChild, RestoreChildCallback, RestoreOptions};

/// A side branch of the root repository fetched after the first level.
///
/// Documentation builds read authorship metadata from it; a failed fetch only
/// degrades that metadata, so it is best-effort.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContributionBranch {
    /// Local repository to fetch into.
    pub repo_path: PathBuf,
    /// Remote to fetch from.
    pub remote: String,
    /// Branch or ref to fetch.
    pub branch: String,
}

/// Branches requested for one remote.
#[derive(Debug)]
struct RemoteGroup<'a> {
    remote: &'a str,
    branches: Vec<(&'a str, DependencyFlags)>,
}

impl RemoteGroup<'_> {
    /// Depth one only pays off when nothing can ask for an older commit.
    fn should_fetch_shallow(&self, existing_lock: Option<&DependencyLockModel>) -> bool {
        self.branches.iter().all(|(_, flags)| flags.depth_one)
            && !existing_lock.is_some_and(|lock| lock.pins_remote(self.remote))
    }
}

fn group_specs(specs: &[DependencySpec]) -> Vec<RemoteGroup<'_>> {
    let mut grouped: BTreeMap<&str, BTreeMap<&str, DependencyFlags>> = BTreeMap::new();
    for spec in specs {
        let flags = grouped.entry(&spec.remote).or_default().entry(&spec.branch).or_default();
        *flags = *flags | spec.flags;
    }
    grouped
        .into_iter()
        .map(|(remote, branches)| RemoteGroup {
            remote,
            branches: branches.into_iter().collect(),
        })
        .collect()
}

fn fetch_failed(remote: &str, branches: &[&str], error: &anyhow::Error) -> RestoreError {
    RestoreError::GitFetchFailed {
        remote: remote.to_string(),
        branches: branches.iter().map(ToString::to_string).collect(),
        reason: format!("{error:#}"),
    }
}

/// A branch that missed the local lookup.
struct PendingBranch<'a> {
    branch: &'a str,
    flags: DependencyFlags,
    pinned: Option<&'a str>,
}

/// Restores git dependencies into the shared cache.
pub struct GitRestorer {
    cache: Cache,
    git: Arc<dyn GitToolchain>,
    lookup: Arc<dyn LocalRestoreLookup>,
    worktrees: WorktreeRegistry,
}

impl GitRestorer {
    /// Restorer over `cache` using `git`, with the cache-layout lookup.
    #[must_use]
    pub fn new(cache: Cache, git: Arc<dyn GitToolchain>) -> Self {
        let lookup = Arc::new(WorktreeLookup::new(cache.clone()));
        Self {
            cache,
            git,
            lookup,
            worktrees: WorktreeRegistry::default(),
        }
    }

    /// Replaces the phase-one lookup.
    #[must_use]
    pub fn with_lookup(mut self, lookup: Arc<dyn LocalRestoreLookup>) -> Self {
        self.lookup = lookup;
        self
    }

    /// Restores `specs` and returns their lock entries keyed `"remote#branch"`.
    ///
    /// `existing_lock` pins commits; `callback` restores each checkout's own
    /// dependencies. Every failure of the pass is returned together.
    pub async fn restore(
        &self,
        specs: &[DependencySpec],
        existing_lock: Option<&DependencyLockModel>,
        options: &RestoreOptions,
        callback: &dyn RestoreChildCallback,
    ) -> Result<BTreeMap<String, GitLockEntry>, RestoreFailures> {
        let groups = group_specs(specs);
        if groups.is_empty() {
            return Ok(BTreeMap::new());
        }

        tracing::info!(
            target: "docrestore::restore",
            "Restoring {} git dependencies from {} remotes",
            specs.len(),
            groups.len()
        );

        let units: Vec<_> = groups
            .into_iter()
            .map(|group| self.restore_remote(group, existing_lock, options.implicit))
            .collect();
        let outcomes: Vec<(Vec<RestoreChild>, RestoreFailures)> = stream::iter(units)
            .buffer_unordered(options.max_parallel.max(1))
            .collect()
            .await;

        let mut failures = RestoreFailures::new();
        let mut children = Vec::new();
        for (restored, errors) in outcomes {
            children.extend(restored);
            failures.extend(errors);
        }
        children.sort_by_key(RestoreChild::lock_key);

        for child in &children {
            if let Err(e) = touch(child.path()) {
                tracing::warn!(
                    target: "docrestore::restore",
                    "Failed to update mtime of {}: {}",
                    child.path().display(),
                    e
                );
            }
        }

        if let Some(contribution) = &options.contribution {
            self.fetch_contribution_branch(contribution).await;
        }

        let nested = join_all(
            children.iter().map(|child| callback.restore_child(child.path(), child.nested_lock())),
        )
        .await;

        let mut entries = Vec::with_capacity(children.len());
        for (child, result) in children.iter().zip(nested) {
            match result {
                Ok(lock) => entries
                    .push((child.lock_key(), GitLockEntry::with_nested(child.commit(), lock))),
                Err(errors) => failures.extend(errors),
            }
        }

        failures.into_result(merge_git_entries(entries))
    }

    fn child_for(
        remote: &str,
        branch: &str,
        path: PathBuf,
        commit: String,
        existing_lock: Option<&DependencyLockModel>,
    ) -> RestoreChild {
        let nested = existing_lock
            .and_then(|lock| lock.git_entry(remote, branch))
            .map(|entry| entry.nested.clone());
        RestoreChild::new(remote, branch, path, commit, nested)
    }

    async fn restore_remote(
        &self,
        group: RemoteGroup<'_>,
        existing_lock: Option<&DependencyLockModel>,
        implicit: bool,
    ) -> (Vec<RestoreChild>, RestoreFailures) {
        let remote = group.remote;
        let mut children = Vec::new();
        let mut failures = RestoreFailures::new();

        let mut pending = Vec::new();
        for &(branch, flags) in &group.branches {
            let pinned = existing_lock.and_then(|lock| lock.pinned_commit(remote, branch));
            let key = RestoreKey {
                remote,
                branch,
                pinned_commit: pinned,
                no_checkout: flags.no_checkout,
                implicit,
            };
            match self.lookup.find(&key) {
                Some(LocalHit::Worktree {
                    path,
                    commit,
                }) => {
                    tracing::debug!(
                        target: "docrestore::restore",
                        "{}#{} satisfied locally at {}",
                        remote,
                        branch,
                        path.display()
                    );
                    children.push(Self::child_for(remote, branch, path, commit, existing_lock));
                }
                Some(LocalHit::ObjectsOnly) => {
                    tracing::debug!(
                        target: "docrestore::restore",
                        "{}#{} objects already present",
                        remote,
                        branch
                    );
                }
                None => pending.push(PendingBranch {
                    branch,
                    flags,
                    pinned,
                }),
            }
        }

        if pending.is_empty() {
            return (children, failures);
        }

        let shallow = group.should_fetch_shallow(existing_lock);
        let branch_names: Vec<&str> = pending.iter().map(|p| p.branch).collect();
        let bare = self.cache.bare_repo_path(remote);
        let repo_dir = self.cache.repo_dir(remote);

        let _lock = match self.cache.lock(&bare).await {
            Ok(lock) => lock,
            Err(e) => {
                failures.push(fetch_failed(remote, &branch_names, &e));
                return (children, failures);
            }
        };

        let owned: Vec<String> = branch_names.iter().map(ToString::to_string).collect();
        tracing::info!(
            target: "docrestore::restore",
            "Fetching {} from {}{}",
            owned.join(", "),
            remote,
            if shallow { " (depth 1)" } else { "" }
        );
        if let Err(e) = self.git.clone_or_update_bare(&bare, remote, &owned, shallow).await {
            failures.push(fetch_failed(remote, &branch_names, &e));
            return (children, failures);
        }

        let checkout: Vec<&PendingBranch<'_>> =
            pending.iter().filter(|p| !p.flags.no_checkout).collect();
        if checkout.is_empty() {
            return (children, failures);
        }

        let manager =
            match WorktreeManager::prepare(self.git.as_ref(), &bare, &repo_dir, self.worktrees.clone())
                .await
            {
                Ok(manager) => manager,
                Err(e) => {
                    let names: Vec<&str> = checkout.iter().map(|p| p.branch).collect();
                    failures.push(fetch_failed(remote, &names, &e));
                    return (children, failures);
                }
            };

        let results = join_all(
            checkout.iter().map(|p| self.checkout_branch(&manager, remote, p.branch, p.pinned)),
        )
        .await;

        for (pending, result) in checkout.iter().zip(results) {
            match result {
                Ok((path, commit)) => children.push(Self::child_for(
                    remote,
                    pending.branch,
                    path,
                    commit,
                    existing_lock,
                )),
                Err(e) => failures.push(e),
            }
        }

        (children, failures)
    }

    async fn checkout_branch(
        &self,
        manager: &WorktreeManager<'_>,
        remote: &str,
        branch: &str,
        pinned: Option<&str>,
    ) -> Result<(PathBuf, String), RestoreError> {
        let bare = self.cache.bare_repo_path(remote);
        let tip = self
            .git
            .rev_parse(&bare, &branch_ref(branch))
            .await
            .map_err(|e| fetch_failed(remote, &[branch], &e))?
            .ok_or_else(|| RestoreError::CommittishNotFound {
                remote: remote.to_string(),
                branch: branch.to_string(),
            })?;

        let commit = pinned.map_or(tip, ToString::to_string);
        let path = manager
            .ensure_worktree(branch, &commit, pinned.is_some())
            .await
            .map_err(|e| fetch_failed(remote, &[branch], &e))?;
        Ok((path, commit))
    }

    async fn fetch_contribution_branch(&self, contribution: &ContributionBranch) {
        let result = self
            .git
            .fetch(&contribution.repo_path, &contribution.remote, &contribution.branch)
            .await;
        match result {
            Ok(()) => tracing::debug!(
                target: "docrestore::restore",
                "Fetched contribution branch {}",
                contribution.branch
            ),
            Err(e) => tracing::warn!(
                target: "docrestore::restore",
                "Failed to fetch contribution branch {} from {}: {:#}",
                contribution.branch,
                contribution.remote,
                e
            ),
        }
    }
}
