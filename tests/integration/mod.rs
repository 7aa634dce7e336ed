//! Integration test suite for docrestore
//!
//! End-to-end restores against real git repositories on the local filesystem
//! and `file://` downloads; no network access is needed.
//!
//! ```bash
//! cargo test --test integration
//! ```
//!
//! - **git_restore**: restore, pinning, idempotence, concurrent restorers
//! - **nested**: recursive restore of nested `docrestore.toml` files
//! - **url_cache**: content addressing and GC across registered locks
//! - **cli**: the `docrestore` binary

use std::path::Path;
use std::sync::Arc;

use docrestore::cache::Cache;
use docrestore::config::HttpConfig;
use docrestore::download::HttpDownloader;
use docrestore::git::GitCli;
use docrestore::restore::{GitRestorer, RestoreOptions, Restorer, UrlRestorer};

mod cli;
mod git_restore;
mod nested;
mod url_cache;

/// Production engine over a cache rooted at `cache_dir`.
pub fn engine(cache_dir: &Path, options: RestoreOptions) -> Restorer {
    docrestore::test_utils::init_test_logging(None);
    let cache = Cache::with_dir(cache_dir.to_path_buf());
    Restorer::new(
        GitRestorer::new(cache.clone(), Arc::new(GitCli::new())),
        UrlRestorer::new(cache, Arc::new(HttpDownloader::new()), HttpConfig::default()),
        options,
    )
}

/// `file://` address of a local file.
pub fn file_url(path: &Path) -> String {
    format!("file://{}", path.display())
}
