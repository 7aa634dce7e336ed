//! Error handling for docrestore
//!
//! The error system follows two principles:
//! 1. **Strongly-typed errors** ([`RestoreError`]) for the failure modes callers
//!    branch on: fetch failures, unresolvable refs, failed downloads.
//! 2. **User-friendly messages** ([`ErrorContext`]) with suggestions for the CLI.
//!
//! A restore pass never stops at the first failing dependency. Each remote or
//! address is an independent unit, and the failures of one pass are collected
//! into [`RestoreFailures`] so they can be reported together.
//!
//! # Examples
//!
//! ```rust,no_run
//! use docrestore::core::{RestoreError, user_friendly_error};
//!
//! let error = RestoreError::CommittishNotFound {
//!     remote: "https://github.com/org/docs".to_string(),
//!     branch: "live".to_string(),
//! };
//! let ctx = user_friendly_error(anyhow::Error::from(error));
//! ctx.display();
//! ```

use colored::Colorize;
use std::fmt;
use thiserror::Error;

/// The main error type for restore operations.
///
/// The first three variants are the domain errors of a restore pass. Each one is
/// fatal for the dependency unit that raised it and for nothing else.
#[derive(Error, Debug)]
pub enum RestoreError {
    /// Cloning or fetching a remote failed, or a worktree could not be added.
    ///
    /// Worktree-add failures inside the locked fetch step are reported here too.
    #[error("git fetch failed for '{remote}' (branches: {})", branches.join(", "))]
    GitFetchFailed {
        /// Remote being fetched
        remote: String,
        /// Branches requested in the batched fetch
        branches: Vec<String>,
        /// Underlying toolchain message
        reason: String,
    },

    /// A fetched branch could not be resolved to a commit.
    #[error("committish '{branch}' not found in '{remote}'")]
    CommittishNotFound {
        /// Remote that was fetched
        remote: String,
        /// Branch that did not resolve
        branch: String,
    },

    /// Downloading a URL dependency failed at the transport layer.
    #[error("download failed for '{address}': {reason}")]
    DownloadFailed {
        /// Address being downloaded
        address: String,
        /// Transport message (status line or connection error)
        reason: String,
    },

    /// Git executable not found in PATH.
    #[error("Git is not installed or not found in PATH")]
    GitNotFound,

    /// A git command exited unsuccessfully outside of the fetch step.
    #[error("Git operation failed: {operation}")]
    GitCommandError {
        /// The git operation that failed (e.g. "rev-parse", "worktree add")
        operation: String,
        /// The error output from the git command
        stderr: String,
    },

    /// A lock file exists but is not valid JSON for the lock model.
    #[error("Invalid lock file syntax in {file}")]
    LockfileParseError {
        /// Path of the lock file
        file: String,
        /// Parser message
        reason: String,
    },

    /// A dependency manifest exists but cannot be parsed.
    #[error("Invalid dependency manifest in {file}")]
    ManifestParseError {
        /// Path of the manifest
        file: String,
        /// Parser message
        reason: String,
    },

    /// Configuration file issues.
    #[error("Configuration error: {message}")]
    ConfigError {
        /// Description of the configuration error
        message: String,
    },

    /// Recursive child restore went deeper than the configured limit.
    #[error("Nested restore exceeded depth {depth} at {path}")]
    RestoreDepthExceeded {
        /// Depth that was reached
        depth: usize,
        /// Child path at which the limit tripped
        path: String,
    },

    /// Standard I/O error.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Catch-all with a pre-formatted message.
    #[error("{message}")]
    Other {
        /// Generic error message
        message: String,
    },
}

impl RestoreError {
    /// Returns true for the three per-unit domain failures.
    #[must_use]
    pub const fn is_unit_failure(&self) -> bool {
        matches!(
            self,
            Self::GitFetchFailed { .. }
                | Self::CommittishNotFound { .. }
                | Self::DownloadFailed { .. }
        )
    }
}

impl Clone for RestoreError {
    fn clone(&self) -> Self {
        match self {
            Self::GitFetchFailed {
                remote,
                branches,
                reason,
            } => Self::GitFetchFailed {
                remote: remote.clone(),
                branches: branches.clone(),
                reason: reason.clone(),
            },
            Self::CommittishNotFound {
                remote,
                branch,
            } => Self::CommittishNotFound {
                remote: remote.clone(),
                branch: branch.clone(),
            },
            Self::DownloadFailed {
                address,
                reason,
            } => Self::DownloadFailed {
                address: address.clone(),
                reason: reason.clone(),
            },
            Self::GitNotFound => Self::GitNotFound,
            Self::GitCommandError {
                operation,
                stderr,
            } => Self::GitCommandError {
                operation: operation.clone(),
                stderr: stderr.clone(),
            },
            Self::LockfileParseError {
                file,
                reason,
            } => Self::LockfileParseError {
                file: file.clone(),
                reason: reason.clone(),
            },
            Self::ManifestParseError {
                file,
                reason,
            } => Self::ManifestParseError {
                file: file.clone(),
                reason: reason.clone(),
            },
            Self::ConfigError {
                message,
            } => Self::ConfigError {
                message: message.clone(),
            },
            Self::RestoreDepthExceeded {
                depth,
                path,
            } => Self::RestoreDepthExceeded {
                depth: *depth,
                path: path.clone(),
            },
            // io::Error is not Clone
            Self::IoError(e) => Self::Other {
                message: format!("IO error: {e}"),
            },
            Self::Other {
                message,
            } => Self::Other {
                message: message.clone(),
            },
        }
    }
}

/// Every unit failure collected during one restore pass.
///
/// Each entry is an [`anyhow::Error`] so that failures raised by the external
/// restore-child callback keep their own context chain; domain failures can be
/// recovered with `downcast_ref::<RestoreError>()`.
#[derive(Debug, Default)]
pub struct RestoreFailures {
    errors: Vec<anyhow::Error>,
}

impl RestoreFailures {
    /// Create an empty collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one failure.
    pub fn push(&mut self, error: impl Into<anyhow::Error>) {
        self.errors.push(error.into());
    }

    /// Absorb every failure from another pass.
    pub fn extend(&mut self, other: Self) {
        self.errors.extend(other.errors);
    }

    /// True when nothing failed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Number of failed units.
    #[must_use]
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Iterate over the collected failures.
    pub fn iter(&self) -> impl Iterator<Item = &anyhow::Error> {
        self.errors.iter()
    }

    /// Iterate over the failures that are typed [`RestoreError`]s.
    pub fn restore_errors(&self) -> impl Iterator<Item = &RestoreError> {
        self.iter().filter_map(|e| e.downcast_ref::<RestoreError>())
    }

    /// `Ok(value)` if nothing failed, otherwise `Err(self)`.
    pub fn into_result<T>(self, value: T) -> Result<T, Self> {
        if self.is_empty() { Ok(value) } else { Err(self) }
    }
}

impl From<anyhow::Error> for RestoreFailures {
    fn from(error: anyhow::Error) -> Self {
        Self {
            errors: vec![error],
        }
    }
}

impl From<RestoreError> for RestoreFailures {
    fn from(error: RestoreError) -> Self {
        Self {
            errors: vec![error.into()],
        }
    }
}

impl fmt::Display for RestoreFailures {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Failed to restore {} dependencies:", self.errors.len())?;
        for error in &self.errors {
            write!(f, "\n  {error:#}")?;
        }
        Ok(())
    }
}

impl std::error::Error for RestoreFailures {}

/// Error context wrapper that provides user-friendly error information.
#[derive(Debug)]
pub struct ErrorContext {
    /// The underlying error
    pub error: RestoreError,
    /// Optional suggestion for resolving the error
    pub suggestion: Option<String>,
    /// Optional additional details about the error
    pub details: Option<String>,
}

impl ErrorContext {
    /// Create a new error context with no suggestion or details.
    #[must_use]
    pub const fn new(error: RestoreError) -> Self {
        Self {
            error,
            suggestion: None,
            details: None,
        }
    }

    /// Add a suggestion for resolving the error.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Add details explaining the error.
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Print the error to stderr: error in red, details in yellow, suggestion in green.
    pub fn display(&self) {
        eprintln!("{}: {}", "error".red().bold(), self.error);

        if let Some(details) = &self.details {
            eprintln!("{}: {}", "details".yellow(), details);
        }

        if let Some(suggestion) = &self.suggestion {
            eprintln!("{}: {}", "suggestion".green(), suggestion);
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;

        if let Some(details) = &self.details {
            write!(f, "\nDetails: {details}")?;
        }

        if let Some(suggestion) = &self.suggestion {
            write!(f, "\nSuggestion: {suggestion}")?;
        }

        Ok(())
    }
}

impl std::error::Error for ErrorContext {}

/// Convert any error to a user-friendly [`ErrorContext`] with suggestions.
///
/// Recognizes [`RestoreError`], [`RestoreFailures`] and [`std::io::Error`];
/// anything else is rendered with its full cause chain.
#[must_use]
pub fn user_friendly_error(error: anyhow::Error) -> ErrorContext {
    if let Some(restore_error) = error.downcast_ref::<RestoreError>() {
        return create_error_context(restore_error.clone());
    }

    if let Some(failures) = error.downcast_ref::<RestoreFailures>() {
        let suggestion = if failures.restore_errors().any(|e| {
            matches!(e, RestoreError::GitFetchFailed { .. } | RestoreError::DownloadFailed { .. })
        }) {
            "Completed work is cached; re-run the restore once the failing remotes are reachable"
        } else {
            "Fix the failing dependencies listed above and re-run the restore"
        };
        return ErrorContext::new(RestoreError::Other {
            message: failures.to_string(),
        })
        .with_suggestion(suggestion);
    }

    if let Some(io_error) = error.downcast_ref::<std::io::Error>() {
        if io_error.kind() == std::io::ErrorKind::PermissionDenied {
            return ErrorContext::new(RestoreError::Other {
                message: format!("Permission denied: {io_error}"),
            })
            .with_suggestion("Check ownership of the cache directory or set DOCRESTORE_CACHE_DIR")
            .with_details(
                "docrestore needs write access to its cache to store repositories and downloads",
            );
        }
    }

    let mut message = error.to_string();
    let chain: Vec<String> = error.chain().skip(1).map(ToString::to_string).collect();
    if !chain.is_empty() {
        message.push_str("\n\nCaused by:");
        for (i, cause) in chain.iter().enumerate() {
            message.push_str(&format!("\n  {}: {}", i + 1, cause));
        }
    }

    ErrorContext::new(RestoreError::Other {
        message,
    })
}

fn create_error_context(error: RestoreError) -> ErrorContext {
    match &error {
        RestoreError::GitFetchFailed { remote, reason, .. } => {
            let details = reason.lines().next().unwrap_or_default().to_string();
            ErrorContext::new(error.clone())
                .with_suggestion(format!(
                    "Check that {remote} is reachable and that the branches exist. Credentials come from your git configuration"
                ))
                .with_details(details)
        }
        RestoreError::CommittishNotFound { branch, .. } => ErrorContext::new(error.clone())
            .with_suggestion(format!(
                "Verify that '{branch}' exists on the remote, or fix the branch name in the dependency list"
            ))
            .with_details("The fetch succeeded but the requested ref did not resolve to a commit"),
        RestoreError::DownloadFailed { .. } => ErrorContext::new(error.clone())
            .with_suggestion("Check the URL and any http headers configured for it in config.toml")
            .with_details("Only 2xx responses are accepted for URL dependencies"),
        RestoreError::GitNotFound => ErrorContext::new(error.clone())
            .with_suggestion("Install git from https://git-scm.com/ or your package manager")
            .with_details("docrestore drives the system git binary for all repository operations"),
        RestoreError::LockfileParseError { file, .. } => ErrorContext::new(error.clone())
            .with_suggestion(format!("Delete {file} to restore without pinning, or fix its JSON")),
        RestoreError::RestoreDepthExceeded { .. } => ErrorContext::new(error.clone())
            .with_suggestion("Look for a dependency cycle between the nested docsets")
            .with_details("Nested restores are not deduplicated across siblings"),
        _ => ErrorContext::new(error),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_failed_display_lists_branches() {
        let error = RestoreError::GitFetchFailed {
            remote: "https://example.com/docs".to_string(),
            branches: vec!["main".to_string(), "live".to_string()],
            reason: "fatal: unable to access".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "git fetch failed for 'https://example.com/docs' (branches: main, live)"
        );
        assert!(error.is_unit_failure());
    }

    #[test]
    fn test_error_clone_converts_io() {
        let error = RestoreError::IoError(std::io::Error::other("disk"));
        match error.clone() {
            RestoreError::Other {
                message,
            } => assert!(message.contains("disk")),
            other => panic!("unexpected clone: {other:?}"),
        }
    }

    #[test]
    fn test_failures_collect_and_downcast() {
        let mut failures = RestoreFailures::new();
        assert!(failures.is_empty());

        failures.push(RestoreError::DownloadFailed {
            address: "https://example.com/a.json".to_string(),
            reason: "HTTP 404".to_string(),
        });
        failures.push(anyhow::anyhow!("child config invalid"));

        assert_eq!(failures.len(), 2);
        assert_eq!(failures.restore_errors().count(), 1);
        let rendered = failures.to_string();
        assert!(rendered.starts_with("Failed to restore 2 dependencies:"));
        assert!(rendered.contains("HTTP 404"));
        assert!(rendered.contains("child config invalid"));
        assert!(failures.into_result(()).is_err());
    }

    #[test]
    fn test_user_friendly_error_committish() {
        let ctx = user_friendly_error(
            RestoreError::CommittishNotFound {
                remote: "r".to_string(),
                branch: "b".to_string(),
            }
            .into(),
        );
        assert!(ctx.suggestion.unwrap().contains("'b'"));
    }

    #[test]
    fn test_user_friendly_error_generic_chain() {
        let error = anyhow::anyhow!("root").context("outer");
        let ctx = user_friendly_error(error);
        let text = ctx.to_string();
        assert!(text.contains("outer"));
        assert!(text.contains("Caused by"));
        assert!(text.contains("root"));
    }

    #[test]
    fn test_error_context_display() {
        let ctx = ErrorContext::new(RestoreError::GitNotFound)
            .with_details("d")
            .with_suggestion("s");
        assert_eq!(
            ctx.to_string(),
            "Git is not installed or not found in PATH\nDetails: d\nSuggestion: s"
        );
    }
}
