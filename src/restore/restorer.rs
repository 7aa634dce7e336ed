//! Restore coordinator: one request in, one lock model out.

use futures::stream::{self, StreamExt};
use std::collections::BTreeMap;

use crate::core::RestoreFailures;
use crate::lockfile::{DependencyLockModel, LockRegistry};

use super::git::GitRestorer;
use super::url::UrlRestorer;
use super::{DependencySpec, RestoreChildCallback, RestoreOptions};

/// Dependencies declared at one level of the tree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestoreRequest {
    /// Git branches to restore.
    pub git: Vec<DependencySpec>,
    /// URL addresses to download.
    pub downloads: Vec<String>,
}

impl RestoreRequest {
    /// True if nothing is requested.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.git.is_empty() && self.downloads.is_empty()
    }
}

/// Runs the git and URL restorers for one request and merges their results.
pub struct Restorer {
    git: GitRestorer,
    url: UrlRestorer,
    options: RestoreOptions,
}

impl Restorer {
    /// Coordinator over the two restorers.
    #[must_use]
    pub const fn new(git: GitRestorer, url: UrlRestorer, options: RestoreOptions) -> Self {
        Self {
            git,
            url,
            options,
        }
    }

    /// Options applied to top-level passes.
    #[must_use]
    pub const fn options(&self) -> &RestoreOptions {
        &self.options
    }

    /// The URL restorer, for GC.
    #[must_use]
    pub const fn url_restorer(&self) -> &UrlRestorer {
        &self.url
    }

    /// Restores a top-level request.
    pub async fn restore(
        &self,
        request: &RestoreRequest,
        existing_lock: Option<&DependencyLockModel>,
        callback: &dyn RestoreChildCallback,
    ) -> Result<DependencyLockModel, RestoreFailures> {
        self.restore_with(request, existing_lock, &self.options, callback).await
    }

    /// Restores a request with explicit options.
    ///
    /// Nested levels use this without the contribution branch, which only
    /// belongs to the root repository.
    pub async fn restore_with(
        &self,
        request: &RestoreRequest,
        existing_lock: Option<&DependencyLockModel>,
        options: &RestoreOptions,
        callback: &dyn RestoreChildCallback,
    ) -> Result<DependencyLockModel, RestoreFailures> {
        let git = self.git.restore(&request.git, existing_lock, options, callback);
        let downloads =
            self.restore_downloads(&request.downloads, existing_lock, options.max_parallel);
        let (git, downloads) = futures::join!(git, downloads);

        let mut failures = RestoreFailures::new();
        let git = git.unwrap_or_else(|errors| {
            failures.extend(errors);
            BTreeMap::new()
        });
        let downloads = downloads.unwrap_or_else(|errors| {
            failures.extend(errors);
            BTreeMap::new()
        });

        failures.into_result(DependencyLockModel::new(git, downloads))
    }

    async fn restore_downloads(
        &self,
        addresses: &[String],
        existing_lock: Option<&DependencyLockModel>,
        max_parallel: usize,
    ) -> Result<BTreeMap<String, String>, RestoreFailures> {
        let mut unique: Vec<&str> = addresses.iter().map(String::as_str).collect();
        unique.sort_unstable();
        unique.dedup();

        let units: Vec<_> = unique
            .into_iter()
            .map(|address| {
                let pinned = existing_lock.and_then(|lock| lock.download_version(address));
                async move { (address, self.url.restore_pinned(address, pinned).await) }
            })
            .collect();
        let results: Vec<(&str, anyhow::Result<String>)> =
            stream::iter(units).buffer_unordered(max_parallel.max(1)).collect().await;

        let mut failures = RestoreFailures::new();
        let mut versions = BTreeMap::new();
        for (address, result) in results {
            match result {
                Ok(version) => {
                    versions.insert(address.to_string(), version);
                }
                Err(e) => failures.push(e),
            }
        }
        failures.into_result(versions)
    }

    /// Runs GC for every URL address in `lock`, nested ones included.
    ///
    /// GC problems never fail a restore; they are logged and skipped.
    pub async fn gc(&self, lock: &DependencyLockModel, registry: &LockRegistry) -> usize {
        let mut addresses: Vec<&str> = lock.all_downloads().into_iter().map(|(a, _)| a).collect();
        addresses.sort_unstable();
        addresses.dedup();

        let mut deleted = 0;
        for address in addresses {
            match self.url.gc(address, registry).await {
                Ok(count) => deleted += count,
                Err(e) => tracing::warn!(
                    target: "docrestore::gc",
                    "Failed to collect cache of {}: {:#}",
                    address,
                    e
                ),
            }
        }
        deleted
    }
}
