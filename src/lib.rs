//! docrestore - dependency restore engine for documentation builds
//!
//! A docset declares git branches and URL artifacts it depends on. docrestore
//! brings them into a shared machine-wide cache and records exactly what was
//! restored, so the next build gets the same bytes:
//!
//! - git dependencies are fetched into one bare repository per remote and
//!   checked out as worktrees, one per branch and commit
//! - URL dependencies are downloaded into a content-addressed store keyed by
//!   the SHA-256 of their bytes
//! - a lock file pins every branch to a commit and every address to a version,
//!   nested checkouts included
//!
//! Restores are safe to run concurrently from several processes: every
//! mutation of a shared cache directory happens under a cross-process file
//! lock, and re-running a restore with its own lock touches nothing.
//!
//! # Modules
//!
//! ## Engine
//! - [`restore`] - git and URL restorers, worktree manager, coordinator
//! - [`lockfile`] - lock model, JSON persistence, machine-wide registry
//!
//! ## Infrastructure
//! - [`cache`] - cache directory layout and cross-process locks
//! - [`git`] - `git` command builder and the [`git::GitToolchain`] seam
//! - [`download`] - HTTP client behind the [`download::DownloadClient`] seam
//!
//! ## Surface
//! - [`manifest`] - `docrestore.toml` and recursive restore of nested docsets
//! - [`cli`] - `restore` and `gc` commands
//! - [`config`] - cache location and user settings
//! - [`core`] - error types and user-facing error rendering
//! - [`utils`] - hashing and filesystem helpers
//!
//! # Cache Layout
//!
//! ```text
//! ~/.docrestore/cache/
//! ├── git/<remote>/.git                  # bare repository
//! ├── git/<remote>/<branch>-<h>-<commit> # worktree
//! ├── downloads/<address>/<sha256>       # downloaded version
//! ├── restore-locks/<docset>.json        # registered locks, read by GC
//! └── .locks/<hash>.lock                 # cross-process mutexes
//! ```

pub mod cache;
pub mod cli;
pub mod config;
pub mod constants;
pub mod core;
pub mod download;
pub mod git;
pub mod lockfile;
pub mod manifest;
pub mod restore;
pub mod utils;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
