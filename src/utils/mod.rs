//! Filesystem and hashing helpers shared by the cache, lock, and restore modules.

pub mod fs;
pub mod hash;

pub use fs::{atomic_write, ensure_dir, touch};
pub use hash::{content_hash, file_content_hash, identity_hash, sanitize_name, short_hash, short_name};
