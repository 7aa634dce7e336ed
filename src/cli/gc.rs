//! `docrestore gc`

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use std::sync::Arc;

use crate::cache::Cache;
use crate::config::RestoreConfig;
use crate::download::HttpDownloader;
use crate::lockfile::LockRegistry;
use crate::restore::UrlRestorer;

/// Prune cached versions no registered lock references.
///
/// Addresses keeping five or fewer versions are left alone.
#[derive(Args, Debug)]
pub struct GcCommand {
    /// URL dependency addresses to collect.
    #[arg(required = true, value_name = "ADDRESS")]
    pub(super) addresses: Vec<String>,
}

impl GcCommand {
    pub(super) async fn execute(self, config: &RestoreConfig) -> Result<()> {
        let cache = Cache::new()?;
        let registry = LockRegistry::for_cache(&cache);
        let url = UrlRestorer::new(cache, Arc::new(HttpDownloader::new()), config.http.clone());

        let mut total = 0;
        for address in &self.addresses {
            let deleted = url.gc(address, &registry).await?;
            if deleted > 0 {
                println!("  {} {address}: removed {deleted}", "-".yellow());
            }
            total += deleted;
        }
        println!("{} Removed {total} unreferenced cached downloads", "✓".green());
        Ok(())
    }
}
