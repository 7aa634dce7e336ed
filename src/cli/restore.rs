//! `docrestore restore`

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;
use std::sync::Arc;

use crate::cache::Cache;
use crate::config::RestoreConfig;
use crate::download::HttpDownloader;
use crate::git::GitCli;
use crate::lockfile::{DependencyLockModel, LockRegistry};
use crate::manifest::{DependencyManifest, LOCK_FILE, MANIFEST_FILE, ManifestRestoreChild};
use crate::restore::{ContributionBranch, GitRestorer, RestoreOptions, Restorer, UrlRestorer};

/// Restore the dependencies declared in `<PATH>/docrestore.toml`.
#[derive(Args, Debug)]
pub struct RestoreCommand {
    /// Docset root containing `docrestore.toml`.
    #[arg(default_value = ".")]
    pub(super) path: PathBuf,

    /// Reuse existing local checkouts instead of fetching when possible.
    #[arg(long)]
    pub(super) implicit: bool,

    /// Lock file whose commits and versions are restored exactly.
    #[arg(long, value_name = "FILE")]
    pub(super) locked: Option<PathBuf>,

    /// Maximum remotes and addresses restored at once.
    #[arg(long, value_name = "N")]
    pub(super) max_parallel: Option<usize>,

    /// Remote of the docset's own repository, for the contribution branch.
    #[arg(long, value_name = "URL", requires = "contribution_branch")]
    pub(super) contribution_remote: Option<String>,

    /// Branch holding authorship metadata, fetched into the docset repository.
    #[arg(long, value_name = "BRANCH", requires = "contribution_remote")]
    pub(super) contribution_branch: Option<String>,
}

impl RestoreCommand {
    fn options(&self, config: &RestoreConfig) -> RestoreOptions {
        let contribution = self.contribution_remote.as_ref().zip(self.contribution_branch.as_ref()).map(
            |(remote, branch)| ContributionBranch {
                repo_path: self.path.clone(),
                remote: remote.clone(),
                branch: branch.clone(),
            },
        );
        RestoreOptions {
            implicit: self.implicit,
            max_parallel: self.max_parallel.filter(|n| *n > 0).unwrap_or_else(|| config.max_parallel()),
            contribution,
        }
    }

    pub(super) async fn execute(self, config: &RestoreConfig) -> Result<()> {
        let manifest_path = self.path.join(MANIFEST_FILE);
        let manifest = DependencyManifest::load(&manifest_path)
            .await
            .with_context(|| format!("No usable {MANIFEST_FILE} in {}", self.path.display()))?;

        let existing = match &self.locked {
            Some(path) => Some(DependencyLockModel::load(path)?),
            None => None,
        };

        let cache = Cache::new()?;
        cache.ensure_cache_dir().await?;
        let git = Arc::new(GitCli::with_timeout(config.git_timeout()));
        let http = reqwest::Client::builder()
            .user_agent(concat!("docrestore/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;
        let client = Arc::new(HttpDownloader::with_client(http));
        let restorer = Restorer::new(
            GitRestorer::new(cache.clone(), git),
            UrlRestorer::new(cache.clone(), client, config.http.clone()),
            self.options(config),
        );

        let callback = ManifestRestoreChild::new(&restorer);
        let lock = restorer.restore(&manifest.to_request(), existing.as_ref(), &callback).await?;

        let lock_path = self.path.join(LOCK_FILE);
        lock.save(&lock_path)?;
        let registry = LockRegistry::for_cache(&cache);
        registry.save(&self.path, &lock)?;
        let collected = restorer.gc(&lock, &registry).await;

        println!(
            "{} Restored {} git and {} URL dependencies",
            "✓".green(),
            lock.git().len(),
            lock.downloads().len()
        );
        println!("  Lock written to {}", lock_path.display());
        if collected > 0 {
            println!("  Removed {collected} unreferenced cached downloads");
        }
        Ok(())
    }
}
