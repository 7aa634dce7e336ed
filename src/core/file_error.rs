//! Structured file system errors for cache operations.
//!
//! Cache paths are derived from hashes, so a bare `io::Error` ("No such file or
//! directory") says very little. [`FileResultExt::with_file_context`] captures
//! the operation, the path, and what the path was for at the call site.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Types of file operations performed on the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOperation {
    /// Reading a file completely
    Read,
    /// Creating a directory
    CreateDir,
    /// Renaming a file into place
    Rename,
    /// Listing directory entries
    ReadDir,
}

impl std::fmt::Display for FileOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Read => "reading",
            Self::CreateDir => "creating directory",
            Self::Rename => "renaming",
            Self::ReadDir => "listing",
        };
        f.write_str(name)
    }
}

/// File operation error with the context it happened in.
#[derive(Error, Debug)]
#[error("Failed {operation} '{}' for {purpose} ({caller})", file_path.display())]
pub struct FileOperationError {
    /// The type of operation that failed
    pub operation: FileOperation,
    /// The file path that was being accessed
    pub file_path: PathBuf,
    /// Why the file was being accessed
    pub purpose: String,
    /// What code initiated the operation
    pub caller: String,
    /// The underlying IO error
    #[source]
    pub source: std::io::Error,
}

impl FileOperationError {
    /// True if the underlying error is `NotFound`.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.source.kind() == std::io::ErrorKind::NotFound
    }
}

/// Extension trait attaching file context to `io::Result`.
pub trait FileResultExt<T> {
    /// Wrap the error with operation, path, purpose, and caller.
    fn with_file_context(
        self,
        operation: FileOperation,
        path: impl AsRef<Path>,
        purpose: impl Into<String>,
        caller: impl Into<String>,
    ) -> Result<T, FileOperationError>;
}

impl<T> FileResultExt<T> for std::io::Result<T> {
    fn with_file_context(
        self,
        operation: FileOperation,
        path: impl AsRef<Path>,
        purpose: impl Into<String>,
        caller: impl Into<String>,
    ) -> Result<T, FileOperationError> {
        self.map_err(|source| FileOperationError {
            operation,
            file_path: path.as_ref().to_path_buf(),
            purpose: purpose.into(),
            caller: caller.into(),
            source,
        })
    }
}
