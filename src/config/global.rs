//! User-level configuration (`~/.docrestore/config.toml`).
//!
//! ```toml
//! max_parallel = 16
//! git_timeout_secs = 900
//!
//! [http.headers."https://api.github.com/"]
//! Authorization = "token ghp_…"
//! ```
//!
//! Header values are credentials, so [`RestoreConfig::save_to`] writes the file
//! with owner-only permissions on Unix.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;

use crate::constants::{DEFAULT_GIT_TIMEOUT, default_max_parallel};

/// Environment variable overriding the config file location.
pub const CONFIG_PATH_ENV: &str = "DOCRESTORE_CONFIG_PATH";

/// Settings that shape a restore pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestoreConfig {
    /// Upper bound on concurrently restored remotes and addresses.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_parallel: Option<usize>,

    /// Per-command git timeout in seconds; `0` disables the timeout.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_timeout_secs: Option<u64>,

    /// Request headers for authenticated downloads.
    #[serde(default, skip_serializing_if = "HttpConfig::is_empty")]
    pub http: HttpConfig,
}

/// Request headers keyed by URL prefix.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpConfig {
    /// `prefix -> (header name -> value)`
    #[serde(default)]
    pub headers: BTreeMap<String, BTreeMap<String, String>>,
}

impl HttpConfig {
    /// True if no headers are configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    /// Headers to send when fetching `address`.
    ///
    /// Every prefix that matches contributes; when two prefixes set the same
    /// header, the longer (more specific) prefix wins.
    #[must_use]
    pub fn headers_for(&self, address: &str) -> Vec<(String, String)> {
        let mut matching: Vec<(&String, &BTreeMap<String, String>)> =
            self.headers.iter().filter(|(prefix, _)| address.starts_with(prefix.as_str())).collect();
        matching.sort_by_key(|(prefix, _)| prefix.len());

        let mut merged: BTreeMap<String, String> = BTreeMap::new();
        for (_, headers) in matching {
            for (name, value) in headers {
                merged.insert(name.to_ascii_lowercase(), value.clone());
            }
        }
        merged.into_iter().collect()
    }
}

impl RestoreConfig {
    /// Loads the config from the default location; missing file means defaults.
    pub async fn load() -> Result<Self> {
        let path = Self::default_path()?;
        if path.exists() { Self::load_from(&path).await } else { Ok(Self::default()) }
    }

    /// Loads the config from `path`.
    pub async fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        toml::from_str(&content).map_err(|e| {
            crate::core::RestoreError::ConfigError {
                message: format!("Failed to parse {}: {}", path.display(), e),
            }
            .into()
        })
    }

    /// Writes the config to `path` with owner-only permissions on Unix.
    pub async fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, content)
            .await
            .with_context(|| format!("Failed to write config to {}", path.display()))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;

            let mut perms = fs::metadata(path)
                .await
                .with_context(|| format!("Failed to read permissions for {}", path.display()))?
                .permissions();
            perms.set_mode(0o600);
            fs::set_permissions(path, perms).await.with_context(|| {
                format!("Failed to set secure permissions on {}", path.display())
            })?;
        }

        Ok(())
    }

    /// `DOCRESTORE_CONFIG_PATH`, else `~/.docrestore/config.toml`
    /// (`%LOCALAPPDATA%\docrestore\config.toml` on Windows).
    pub fn default_path() -> Result<PathBuf> {
        if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
            return Ok(PathBuf::from(path));
        }

        let config_dir = if cfg!(target_os = "windows") {
            dirs::data_local_dir()
                .ok_or_else(|| anyhow::anyhow!("Unable to determine local data directory"))?
                .join("docrestore")
        } else {
            dirs::home_dir()
                .ok_or_else(|| anyhow::anyhow!("Unable to determine home directory"))?
                .join(".docrestore")
        };

        Ok(config_dir.join("config.toml"))
    }

    /// Configured parallelism, or the CPU-derived default.
    #[must_use]
    pub fn max_parallel(&self) -> usize {
        self.max_parallel.filter(|n| *n > 0).unwrap_or_else(default_max_parallel)
    }

    /// Configured git timeout; `None` when disabled.
    #[must_use]
    pub fn git_timeout(&self) -> Option<Duration> {
        match self.git_timeout_secs {
            Some(0) => None,
            Some(secs) => Some(Duration::from_secs(secs)),
            None => Some(DEFAULT_GIT_TIMEOUT),
        }
    }
}
