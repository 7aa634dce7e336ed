//! Dependency manifest (`docrestore.toml`).
//!
//! A docset declares what it needs at its root; every restored git checkout
//! may carry its own manifest, which [`ManifestRestoreChild`] restores in turn.
//!
//! ```toml
//! downloads = ["https://example.com/schema.json"]
//!
//! [[git]]
//! remote = "https://github.com/org/shared-docs"
//! branch = "live"
//! depth_one = true
//!
//! [[git]]
//! remote = "https://github.com/org/site"
//! branch = "gh-pages"
//! no_checkout = true
//! ```
//!
//! Top-level keys must precede the `[[git]]` tables, as usual in TOML.
//! Credentials never belong here; download headers live in the user config.

mod restore_child;

pub use restore_child::ManifestRestoreChild;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::core::RestoreError;
use crate::core::file_error::{FileOperation, FileResultExt};
use crate::restore::{DependencyFlags, DependencySpec, RestoreRequest};

/// Manifest file name looked up in docset roots and restored checkouts.
pub const MANIFEST_FILE: &str = "docrestore.toml";

/// Lock file name written next to the manifest.
pub const LOCK_FILE: &str = "docrestore.lock.json";

fn default_branch() -> String {
    "main".to_string()
}

/// One `[[git]]` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitDependency {
    /// Repository address
    pub remote: String,
    /// Branch to restore (`main` when omitted)
    #[serde(default = "default_branch")]
    pub branch: String,
    /// Fetch objects only
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub no_checkout: bool,
    /// Request a depth-one fetch
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub depth_one: bool,
}

impl GitDependency {
    fn flags(&self) -> DependencyFlags {
        DependencyFlags {
            no_checkout: self.no_checkout,
            depth_one: self.depth_one,
        }
    }
}

/// Parsed `docrestore.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyManifest {
    /// URL dependencies
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub downloads: Vec<String>,
    /// Git dependencies
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub git: Vec<GitDependency>,
}

/// Trims whitespace and trailing slashes so equivalent spellings share a cache entry.
#[must_use]
pub fn normalize_remote(remote: &str) -> String {
    remote.trim().trim_end_matches('/').to_string()
}

impl DependencyManifest {
    /// Parses manifest text; `origin` names the file in errors.
    pub fn from_toml(content: &str, origin: &Path) -> Result<Self> {
        let manifest: Self = toml::from_str(content).map_err(|e| RestoreError::ManifestParseError {
            file: origin.display().to_string(),
            reason: e.to_string(),
        })?;
        manifest.validate(origin)?;
        Ok(manifest)
    }

    /// Reads and parses `path`.
    pub async fn load(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path).await.with_file_context(
            FileOperation::Read,
            path,
            "reading dependency manifest",
            "manifest::load",
        )?;
        Self::from_toml(&content, path)
    }

    /// Loads `<dir>/docrestore.toml` if present.
    pub async fn load_from_dir(dir: &Path) -> Result<Option<Self>> {
        let path = dir.join(MANIFEST_FILE);
        if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return Ok(None);
        }
        Self::load(&path).await.map(Some)
    }

    fn validate(&self, origin: &Path) -> Result<()> {
        let invalid = |reason: String| RestoreError::ManifestParseError {
            file: origin.display().to_string(),
            reason,
        };

        for (index, dep) in self.git.iter().enumerate() {
            if dep.remote.trim().is_empty() {
                return Err(invalid(format!("git dependency #{} has an empty remote", index + 1)).into());
            }
            if dep.branch.trim().is_empty() {
                return Err(invalid(format!("git dependency {} has an empty branch", dep.remote)).into());
            }
        }
        if self.downloads.iter().any(|a| a.trim().is_empty()) {
            return Err(invalid("downloads contains an empty address".to_string()).into());
        }
        Ok(())
    }

    /// Flattens the manifest into a restore request.
    #[must_use]
    pub fn to_request(&self) -> RestoreRequest {
        RestoreRequest {
            git: self
                .git
                .iter()
                .map(|dep| {
                    DependencySpec::new(normalize_remote(&dep.remote), dep.branch.trim(), dep.flags())
                })
                .collect(),
            downloads: self.downloads.iter().map(|a| a.trim().to_string()).collect(),
        }
    }
}
