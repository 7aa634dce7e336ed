//! Test utilities for docrestore.
//!
//! - [`FakeGitToolchain`], [`FakeDownloadClient`]: in-memory stand-ins for the
//!   two external seams, recording every call
//! - [`RecordingRestoreChild`]: stub restore-child callback
//! - [`TestGit`]: builds real source repositories for end-to-end tests
//!
//! Available to the crate's own tests and, through the `test-utils` feature,
//! to the integration suite.

pub mod fakes;
pub mod git_helper;

pub use fakes::{FakeDownloadClient, FakeFetch, FakeGitToolchain, RecordingRestoreChild};
pub use git_helper::TestGit;

use std::sync::Once;
use tracing::Level;
use tracing_subscriber::EnvFilter;

static INIT_LOGGING: Once = Once::new();

/// Initializes tracing for tests once per process.
///
/// With `Some(level)` logs at that level; with `None` only when `RUST_LOG` is
/// set.
///
/// ```rust,no_run
/// docrestore::test_utils::init_test_logging(Some(tracing::Level::DEBUG));
/// ```
pub fn init_test_logging(level: Option<Level>) {
    INIT_LOGGING.call_once(|| {
        let filter = if let Some(level) = level {
            EnvFilter::new(level.to_string())
        } else if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            return;
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .with_thread_ids(false)
            .try_init();
    });
}
