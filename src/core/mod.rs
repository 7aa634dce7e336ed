//! Core types shared across docrestore: domain errors and file-operation context.
//!
//! - [`RestoreError`]: strongly-typed failures of a restore unit
//! - [`RestoreFailures`]: every failure collected during one pass
//! - [`ErrorContext`] / [`user_friendly_error`]: colored CLI rendering
//! - [`FileResultExt`]: attaches path context to cache I/O errors

pub mod error;
pub mod file_error;

pub use error::{ErrorContext, RestoreError, RestoreFailures, user_friendly_error};
pub use file_error::{FileOperation, FileOperationError, FileResultExt};
