//! URL dependency restore and cache garbage collection.
//!
//! Each address owns a cache root holding one file per distinct content:
//!
//! ```text
//! downloads/<short-name(address)>/
//! ├── 3b5d…            # version = sha256 of the bytes
//! ├── 9f8e…
//! └── .tmp-<uuid>      # download in progress
//! ```
//!
//! Downloads land in a dot-prefixed temp file first and are renamed into place
//! under the root's [`crate::cache::CacheLock`], so a version file is always
//! complete. Dot-prefixed files are never counted or deleted by GC.

use anyhow::{Context, Result};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

use crate::cache::Cache;
use crate::config::HttpConfig;
use crate::constants::{TEMP_FILE_PREFIX, URL_CACHE_RETENTION};
use crate::core::RestoreError;
use crate::core::file_error::{FileOperation, FileResultExt};
use crate::download::DownloadClient;
use crate::lockfile::LockRegistry;
use crate::utils::file_content_hash;

/// Restores URL dependencies into the content-addressed download cache.
pub struct UrlRestorer {
    cache: Cache,
    client: Arc<dyn DownloadClient>,
    http: HttpConfig,
}

async fn discard_temp(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!(
                target: "docrestore::url",
                "Failed to remove temp file {}: {}",
                path.display(),
                e
            );
        }
    }
}

impl UrlRestorer {
    /// Restorer over `cache`; `http` supplies per-address request headers.
    #[must_use]
    pub fn new(cache: Cache, client: Arc<dyn DownloadClient>, http: HttpConfig) -> Self {
        Self {
            cache,
            client,
            http,
        }
    }

    /// Stored file for a restored version.
    #[must_use]
    pub fn version_path(&self, address: &str, version: &str) -> PathBuf {
        self.cache.download_root(address).join(version)
    }

    /// Downloads `address` and returns its version (lowercase hex SHA-256).
    ///
    /// Identical bytes collapse into one stored file. Transport failures and
    /// non-2xx responses are [`RestoreError::DownloadFailed`].
    pub async fn restore(&self, address: &str) -> Result<String> {
        let root = self.cache.download_root(address);
        tokio::fs::create_dir_all(&root).await.with_file_context(
            FileOperation::CreateDir,
            &root,
            "creating download cache root",
            "restore::url",
        )?;

        let temp = root.join(format!("{TEMP_FILE_PREFIX}{}", Uuid::new_v4()));
        let version = match self.download_and_hash(address, &temp).await {
            Ok(version) => version,
            Err(e) => {
                discard_temp(&temp).await;
                return Err(e);
            }
        };

        let _lock = match self.cache.lock(&root).await {
            Ok(lock) => lock,
            Err(e) => {
                discard_temp(&temp).await;
                return Err(e);
            }
        };

        let target = root.join(&version);
        if tokio::fs::try_exists(&target).await.unwrap_or(false) {
            discard_temp(&temp).await;
            tracing::debug!(target: "docrestore::url", "{} unchanged at {}", address, version);
        } else {
            store_version(&temp, &target).await?;
            tracing::info!(target: "docrestore::url", "Stored {} as {}", address, version);
        }

        Ok(version)
    }

    /// Like [`Self::restore`], but a `pinned` version already in the cache is
    /// returned without contacting the address.
    pub async fn restore_pinned(&self, address: &str, pinned: Option<&str>) -> Result<String> {
        if let Some(version) = pinned {
            let stored = self.version_path(address, version);
            if tokio::fs::try_exists(&stored).await.unwrap_or(false) {
                tracing::debug!(
                    target: "docrestore::url",
                    "{} pinned at {}, already cached",
                    address,
                    version
                );
                return Ok(version.to_string());
            }
            tracing::debug!(
                target: "docrestore::url",
                "{} pinned at {} but not cached, downloading",
                address,
                version
            );
        }
        self.restore(address).await
    }

    async fn download_and_hash(&self, address: &str, temp: &Path) -> Result<String> {
        let headers = self.http.headers_for(address);
        let status = self.client.download(address, &headers, temp).await.map_err(|e| {
            RestoreError::DownloadFailed {
                address: address.to_string(),
                reason: format!("{e:#}"),
            }
        })?;
        if !status.is_success() {
            return Err(RestoreError::DownloadFailed {
                address: address.to_string(),
                reason: format!("server responded with status {}", status.code),
            }
            .into());
        }

        let path = temp.to_path_buf();
        tokio::task::spawn_blocking(move || file_content_hash(&path))
            .await
            .context("Hashing task failed")?
    }

    /// Prunes stored versions of `address` that no registered lock references.
    ///
    /// Does nothing while the root holds at most [`URL_CACHE_RETENTION`]
    /// versions. Returns the number of files deleted.
    pub async fn gc(&self, address: &str, registry: &LockRegistry) -> Result<usize> {
        let root = self.cache.download_root(address);
        if !tokio::fs::try_exists(&root).await.unwrap_or(false) {
            return Ok(0);
        }

        let _lock = self.cache.lock(&root).await?;
        let stored = list_versions(&root).await?;
        if stored.len() <= URL_CACHE_RETENTION {
            tracing::debug!(
                target: "docrestore::gc",
                "{} holds {} versions, nothing to collect",
                address,
                stored.len()
            );
            return Ok(0);
        }

        let registry = registry.clone();
        let locks = tokio::task::spawn_blocking(move || registry.load_all())
            .await
            .context("Lock registry task failed")??;

        let in_use: HashSet<&str> = locks
            .iter()
            .flat_map(|lock| lock.all_downloads())
            .filter(|(other, _)| self.cache.download_root(other) == root)
            .map(|(_, version)| version)
            .collect();

        let mut deleted = 0;
        for (version, path) in &stored {
            if in_use.contains(version.as_str()) {
                continue;
            }
            match tokio::fs::remove_file(path).await {
                Ok(()) => deleted += 1,
                Err(e) => tracing::warn!(
                    target: "docrestore::gc",
                    "Failed to delete {}: {}",
                    path.display(),
                    e
                ),
            }
        }

        tracing::info!(
            target: "docrestore::gc",
            "Collected {} of {} versions of {}",
            deleted,
            stored.len(),
            address
        );
        Ok(deleted)
    }
}

/// Renames a finished download into place; the temp file never outlives a failure.
async fn store_version(temp: &Path, target: &Path) -> Result<()> {
    let renamed = tokio::fs::rename(temp, target).await.with_file_context(
        FileOperation::Rename,
        target,
        "storing downloaded version",
        "restore::url",
    );
    if renamed.is_err() {
        discard_temp(temp).await;
    }
    Ok(renamed?)
}

/// Stored version files of a cache root, skipping dot-prefixed entries.
async fn list_versions(root: &Path) -> Result<Vec<(String, PathBuf)>> {
    let mut entries = tokio::fs::read_dir(root).await.with_file_context(
        FileOperation::ReadDir,
        root,
        "listing stored versions",
        "restore::url",
    )?;

    let mut versions = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with('.') || !entry.file_type().await?.is_file() {
            continue;
        }
        versions.push((name, entry.path()));
    }
    versions.sort();
    Ok(versions)
}
