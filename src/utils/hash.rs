//! Stable hashes and filesystem-safe names.
//!
//! Every on-disk name in the cache is derived from these functions, so their
//! output must never change between releases: a different hash for the same
//! remote would orphan its bare repository and worktrees.

use crate::constants::{IDENTITY_HASH_LEN, SHORT_HASH_LEN};
use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::path::Path;

/// Longest sanitized prefix kept in a directory name.
const MAX_NAME_PREFIX: usize = 48;

/// Lowercase hex SHA-256 of `bytes`.
#[must_use]
pub fn content_hash(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Lowercase hex SHA-256 of a file's contents, read in chunks.
pub fn file_content_hash(path: &Path) -> Result<String> {
    let mut file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open file for hashing: {}", path.display()))?;
    let mut hasher = Sha256::new();
    std::io::copy(&mut file, &mut hasher)
        .with_context(|| format!("Failed to read file for hashing: {}", path.display()))?;
    Ok(hex::encode(hasher.finalize()))
}

/// First [`SHORT_HASH_LEN`] hex chars of the SHA-256 of `value`.
#[must_use]
pub fn short_hash(value: &str) -> String {
    let mut hash = content_hash(value.as_bytes());
    hash.truncate(SHORT_HASH_LEN);
    hash
}

/// First [`IDENTITY_HASH_LEN`] hex chars of the SHA-256 of `value`.
///
/// Used for lock files and registry entries, where collisions between unrelated
/// identities would serialize or overwrite unrelated work.
#[must_use]
pub fn identity_hash(value: &str) -> String {
    let mut hash = content_hash(value.as_bytes());
    hash.truncate(IDENTITY_HASH_LEN);
    hash
}

/// Replaces every character outside `[A-Za-z0-9._-]` with `_`.
///
/// Leading dots are stripped so the result is never mistaken for a temp file,
/// and the result is capped at a readable length. Never empty.
#[must_use]
pub fn sanitize_name(value: &str) -> String {
    let sanitized: String = value
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') { c } else { '_' })
        .collect();
    let trimmed = sanitized.trim_start_matches('.');
    let mut name: String = trimmed.chars().take(MAX_NAME_PREFIX).collect();
    if name.is_empty() {
        name.push('_');
    }
    name
}

/// Readable, collision-resistant directory name for a remote or URL address.
///
/// The scheme, credentials, and a trailing `.git` are dropped from the readable
/// part; the hash suffix covers the full original string.
#[must_use]
pub fn short_name(address: &str) -> String {
    let without_scheme = address.split_once("://").map_or(address, |(_, rest)| rest);
    let without_auth = without_scheme.rsplit_once('@').map_or(without_scheme, |(_, rest)| rest);
    let trimmed = without_auth.trim_end_matches('/');
    let trimmed = trimmed.strip_suffix(".git").unwrap_or(trimmed);
    format!("{}-{}", sanitize_name(trimmed), short_hash(address))
}
