//! Download client for URL dependencies.
//!
//! [`DownloadClient`] performs one GET and streams the body into a destination
//! file. It reports the response status and leaves judging it to the caller,
//! which turns anything outside 2xx into
//! [`crate::core::RestoreError::DownloadFailed`].
//!
//! [`HttpDownloader`] is the production client (`reqwest`). It also serves
//! `file://` addresses so docsets can depend on local artifacts.

use anyhow::{Context, Result};
use futures::future::BoxFuture;
use std::path::Path;
use tokio::io::AsyncWriteExt;

/// Outcome of a completed request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownloadStatus {
    /// HTTP status code (`200` for successful `file://` reads).
    pub code: u16,
}

impl DownloadStatus {
    /// True for 2xx codes.
    #[must_use]
    pub const fn is_success(self) -> bool {
        self.code >= 200 && self.code < 300
    }
}

/// Authenticated GET of an address into a file.
pub trait DownloadClient: Send + Sync {
    /// Fetches `address` with `headers`, writing the response body to `dest`.
    ///
    /// Connection-level failures are errors; a completed response with any
    /// status is `Ok`.
    fn download<'a>(
        &'a self,
        address: &'a str,
        headers: &'a [(String, String)],
        dest: &'a Path,
    ) -> BoxFuture<'a, Result<DownloadStatus>>;
}

/// [`DownloadClient`] over `reqwest`, plus `file://` support.
#[derive(Debug, Clone, Default)]
pub struct HttpDownloader {
    client: reqwest::Client,
}

impl HttpDownloader {
    /// Client with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Client wrapping a preconfigured `reqwest::Client`.
    #[must_use]
    pub const fn with_client(client: reqwest::Client) -> Self {
        Self {
            client,
        }
    }

    async fn download_file_url(address: &str, dest: &Path) -> Result<DownloadStatus> {
        let source = address.strip_prefix("file://").unwrap_or(address);
        match tokio::fs::copy(source, dest).await {
            Ok(_) => Ok(DownloadStatus {
                code: 200,
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(DownloadStatus {
                code: 404,
            }),
            Err(e) => Err(e).with_context(|| format!("Failed to read {source}")),
        }
    }

    async fn download_http(
        &self,
        address: &str,
        headers: &[(String, String)],
        dest: &Path,
    ) -> Result<DownloadStatus> {
        let mut request = self.client.get(address);
        for (name, value) in headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let mut response =
            request.send().await.with_context(|| format!("Failed to fetch {address}"))?;
        let status = DownloadStatus {
            code: response.status().as_u16(),
        };
        if !status.is_success() {
            tracing::debug!(target: "docrestore::url", "GET {} returned {}", address, status.code);
            return Ok(status);
        }

        let mut file = tokio::fs::File::create(dest)
            .await
            .with_context(|| format!("Failed to create {}", dest.display()))?;
        let mut total = 0usize;
        while let Some(chunk) =
            response.chunk().await.with_context(|| format!("Failed to read body of {address}"))?
        {
            total += chunk.len();
            file.write_all(&chunk)
                .await
                .with_context(|| format!("Failed to write {}", dest.display()))?;
        }
        file.sync_all().await.with_context(|| "Failed to sync download to disk")?;

        tracing::debug!(target: "docrestore::url", "Downloaded {} bytes from {}", total, address);
        Ok(status)
    }
}

impl DownloadClient for HttpDownloader {
    fn download<'a>(
        &'a self,
        address: &'a str,
        headers: &'a [(String, String)],
        dest: &'a Path,
    ) -> BoxFuture<'a, Result<DownloadStatus>> {
        Box::pin(async move {
            if address.starts_with("file://") {
                Self::download_file_url(address, dest).await
            } else {
                self.download_http(address, headers, dest).await
            }
        })
    }
}
