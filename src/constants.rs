//! Global constants used throughout the docrestore codebase.
//!
//! Timeouts, retention thresholds, and parallelism defaults live here so the
//! numbers that shape restore behavior are discoverable in one place.

use std::time::Duration;

/// Number of stored versions a URL cache root may hold before GC scans locks.
///
/// At or below this count GC returns without loading any lock file.
pub const URL_CACHE_RETENTION: usize = 5;

/// Default timeout for a single git invocation (10 minutes).
pub const DEFAULT_GIT_TIMEOUT: Duration = Duration::from_secs(600);

/// Maximum nesting depth for recursive child restores.
///
/// Transitive levels are not deduplicated across siblings; this bounds cycles.
pub const MAX_RESTORE_DEPTH: usize = 16;

/// Length of the short hex hash used in worktree and cache directory names.
pub const SHORT_HASH_LEN: usize = 8;

/// Length of the hex hash used for lock file and registry names.
pub const IDENTITY_HASH_LEN: usize = 16;

/// Prefix for in-flight download temp files inside a URL cache root.
pub const TEMP_FILE_PREFIX: &str = ".tmp-";

/// Marker inserted into worktree names when the commit was pinned by a lock.
pub const LOCKED_MARKER: &str = "locked-";

/// Minimum number of parallel operations regardless of CPU count.
pub const MIN_PARALLELISM: usize = 10;

/// Multiplier applied to CPU core count for default parallelism.
pub const PARALLELISM_CORE_MULTIPLIER: usize = 2;

/// Default CPU core count when detection fails.
pub const FALLBACK_CORE_COUNT: usize = 4;

/// Default number of concurrent restore units (remotes or addresses).
#[must_use]
pub fn default_max_parallel() -> usize {
    let cores = std::thread::available_parallelism()
        .map(std::num::NonZeroUsize::get)
        .unwrap_or(FALLBACK_CORE_COUNT);
    (cores * PARALLELISM_CORE_MULTIPLIER).max(MIN_PARALLELISM)
}
