//! Recursive restore of nested manifests.

use futures::future::BoxFuture;
use std::path::Path;

use crate::constants::MAX_RESTORE_DEPTH;
use crate::core::{RestoreError, RestoreFailures};
use crate::lockfile::DependencyLockModel;
use crate::restore::{RestoreChildCallback, RestoreOptions, Restorer};

use super::DependencyManifest;

/// Restore-child callback that restores a checkout's own `docrestore.toml`.
///
/// Each level hands a deeper instance of itself to the next, so a cycle
/// between docsets stops at [`MAX_RESTORE_DEPTH`] with
/// [`RestoreError::RestoreDepthExceeded`].
pub struct ManifestRestoreChild<'r> {
    restorer: &'r Restorer,
    depth: usize,
}

impl<'r> ManifestRestoreChild<'r> {
    /// Callback for the children of a top-level restore.
    #[must_use]
    pub const fn new(restorer: &'r Restorer) -> Self {
        Self::at_depth(restorer, 1)
    }

    /// Callback for children at `depth` levels below the docset root.
    #[must_use]
    pub const fn at_depth(restorer: &'r Restorer, depth: usize) -> Self {
        Self {
            restorer,
            depth,
        }
    }

    async fn restore(
        &self,
        path: &Path,
        nested_lock: Option<&DependencyLockModel>,
    ) -> Result<DependencyLockModel, RestoreFailures> {
        let Some(manifest) = DependencyManifest::load_from_dir(path).await? else {
            return Ok(DependencyLockModel::default());
        };
        if self.depth > MAX_RESTORE_DEPTH {
            return Err(RestoreError::RestoreDepthExceeded {
                depth: self.depth,
                path: path.display().to_string(),
            }
            .into());
        }

        let request = manifest.to_request();
        if request.is_empty() {
            return Ok(DependencyLockModel::default());
        }
        tracing::debug!(
            target: "docrestore::restore",
            "Restoring nested dependencies of {} (depth {})",
            path.display(),
            self.depth
        );

        let options = RestoreOptions {
            contribution: None,
            ..self.restorer.options().clone()
        };
        let next = Self::at_depth(self.restorer, self.depth + 1);
        self.restorer.restore_with(&request, nested_lock, &options, &next).await
    }
}

impl RestoreChildCallback for ManifestRestoreChild<'_> {
    fn restore_child<'a>(
        &'a self,
        path: &'a Path,
        nested_lock: Option<&'a DependencyLockModel>,
    ) -> BoxFuture<'a, Result<DependencyLockModel, RestoreFailures>> {
        Box::pin(self.restore(path, nested_lock))
    }
}
