//! Loading and saving lock files.

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

use crate::core::RestoreError;
use crate::utils::atomic_write;

use super::DependencyLockModel;

impl DependencyLockModel {
    /// Loads a lock file; a missing or empty file yields an empty model.
    ///
    /// # Errors
    ///
    /// Returns [`RestoreError::LockfileParseError`] if the file is not valid
    /// lock JSON, or an I/O error if it cannot be read.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).with_context(|| {
            format!(
                "Cannot read lock file: {}\n\n\
                    Possible causes:\n\
                    - Permission denied (check file ownership)\n\
                    - File is locked by another process",
                path.display()
            )
        })?;

        Self::from_json(&content, path)
    }

    /// Parses lock JSON; `origin` names the source in errors.
    pub fn from_json(content: &str, origin: &Path) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        serde_json::from_str(content).map_err(|e| {
            RestoreError::LockfileParseError {
                file: origin.display().to_string(),
                reason: e.to_string(),
            }
            .into()
        })
    }

    /// Pretty JSON with a trailing newline. Byte-stable for equal models.
    pub fn to_json(&self) -> Result<String> {
        let mut json = serde_json::to_string_pretty(self).context("Failed to serialize lock")?;
        json.push('\n');
        Ok(json)
    }

    /// Writes the lock file atomically.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = self.to_json()?;
        atomic_write(path, content.as_bytes()).with_context(|| {
            format!(
                "Cannot write lock file: {}\n\n\
                    Possible causes:\n\
                    - Permission denied\n\
                    - Disk is full or read-only",
                path.display()
            )
        })
    }
}
