//! Dependency lock model: the reproducibility record of a restore pass.
//!
//! A [`DependencyLockModel`] pins every git dependency to the exact commit it
//! was restored at and every URL dependency to the content hash of the bytes
//! that were downloaded. Git entries carry the lock of their own nested
//! dependencies, so a single file describes the whole transitive tree.
//!
//! # JSON Format
//!
//! ```json
//! {
//!   "git": {
//!     "https://github.com/org/docs#main": {
//!       "commit": "abc123…",
//!       "git": {
//!         "https://github.com/org/shared#live": { "commit": "def456…" }
//!       },
//!       "downloads": { "https://example.com/schema.json": "9f8e…" }
//!     }
//!   },
//!   "downloads": { "https://example.com/toc.yml": "3b5d…" }
//! }
//! ```
//!
//! `url` is accepted as an alias of `downloads` when reading. Maps are ordered,
//! so saving the same model always produces the same bytes.
//!
//! Lock models are values: restore passes read one and build a fresh one; no
//! operation mutates a model that is already in use.

mod io;
pub mod registry;

pub use registry::LockRegistry;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Separator between remote and branch in git lock keys.
pub const KEY_SEPARATOR: char = '#';

/// Lock key for a remote/branch pair: `"remote#branch"`.
#[must_use]
pub fn lock_key(remote: &str, branch: &str) -> String {
    format!("{remote}{KEY_SEPARATOR}{branch}")
}

/// Resolved git and URL dependencies.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyLockModel {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    git: BTreeMap<String, GitLockEntry>,

    #[serde(default, alias = "url", skip_serializing_if = "BTreeMap::is_empty")]
    downloads: BTreeMap<String, String>,
}

/// One git dependency resolved to a commit, with its nested lock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitLockEntry {
    /// Commit the branch was restored at.
    pub commit: String,

    /// Lock of the dependencies declared inside this checkout.
    #[serde(flatten)]
    pub nested: DependencyLockModel,
}

impl GitLockEntry {
    /// Entry with no nested dependencies.
    #[must_use]
    pub fn new(commit: impl Into<String>) -> Self {
        Self {
            commit: commit.into(),
            nested: DependencyLockModel::default(),
        }
    }

    /// Entry carrying a nested lock.
    #[must_use]
    pub fn with_nested(commit: impl Into<String>, nested: DependencyLockModel) -> Self {
        Self {
            commit: commit.into(),
            nested,
        }
    }
}

impl DependencyLockModel {
    /// Builds a model from already-keyed maps.
    #[must_use]
    pub const fn new(
        git: BTreeMap<String, GitLockEntry>,
        downloads: BTreeMap<String, String>,
    ) -> Self {
        Self {
            git,
            downloads,
        }
    }

    /// Git entries keyed by `"remote#branch"`.
    #[must_use]
    pub const fn git(&self) -> &BTreeMap<String, GitLockEntry> {
        &self.git
    }

    /// URL entries keyed by address.
    #[must_use]
    pub const fn downloads(&self) -> &BTreeMap<String, String> {
        &self.downloads
    }

    /// True if nothing is pinned.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.git.is_empty() && self.downloads.is_empty()
    }

    /// Lock entry for a remote/branch pair.
    #[must_use]
    pub fn git_entry(&self, remote: &str, branch: &str) -> Option<&GitLockEntry> {
        self.git.get(&lock_key(remote, branch))
    }

    /// Commit pinned for a remote/branch pair.
    #[must_use]
    pub fn pinned_commit(&self, remote: &str, branch: &str) -> Option<&str> {
        self.git_entry(remote, branch).map(|e| e.commit.as_str()).filter(|c| !c.is_empty())
    }

    /// True if any branch of `remote` is pinned at this level.
    #[must_use]
    pub fn pins_remote(&self, remote: &str) -> bool {
        let prefix = format!("{remote}{KEY_SEPARATOR}");
        self.git.iter().any(|(key, entry)| {
            key.strip_prefix(&prefix).is_some_and(|branch| !branch.is_empty())
                && !entry.commit.is_empty()
        })
    }

    /// Version pinned for a URL address at this level.
    #[must_use]
    pub fn download_version(&self, address: &str) -> Option<&str> {
        self.downloads.get(address).map(String::as_str)
    }

    /// Every `(address, version)` pair in this model and all nested git entries.
    #[must_use]
    pub fn all_downloads(&self) -> Vec<(&str, &str)> {
        let mut out = Vec::new();
        self.collect_downloads(&mut out);
        out
    }

    fn collect_downloads<'a>(&'a self, out: &mut Vec<(&'a str, &'a str)>) {
        out.extend(self.downloads.iter().map(|(a, v)| (a.as_str(), v.as_str())));
        for entry in self.git.values() {
            entry.nested.collect_downloads(out);
        }
    }
}

/// Merges restored git results into one flat map keyed by `"remote#branch"`.
///
/// Input order is significant: when the same remote/branch is restored more than
/// once (a transitive dependency shared by siblings) the last entry wins.
pub fn merge_git_entries<I>(entries: I) -> BTreeMap<String, GitLockEntry>
where
    I: IntoIterator<Item = (String, GitLockEntry)>,
{
    let mut merged = BTreeMap::new();
    for (key, entry) in entries {
        if let Some(previous) = merged.insert(key, entry) {
            tracing::debug!(
                target: "docrestore::restore",
                "Lock entry at commit {} replaced by a later restore",
                previous.commit
            );
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nested_lock() -> DependencyLockModel {
        let mut git = BTreeMap::new();
        git.insert(lock_key("https://example.com/shared", "live"), GitLockEntry::new("def456"));
        let mut downloads = BTreeMap::new();
        downloads.insert("https://example.com/schema.json".to_string(), "v-nested".to_string());
        DependencyLockModel::new(git, downloads)
    }

    #[test]
    fn test_json_shape_and_roundtrip() {
        let mut git = BTreeMap::new();
        git.insert(
            lock_key("https://example.com/docs", "main"),
            GitLockEntry::with_nested("abc123", nested_lock()),
        );
        let mut downloads = BTreeMap::new();
        downloads.insert("https://example.com/toc.yml".to_string(), "v-top".to_string());
        let lock = DependencyLockModel::new(git, downloads);

        let json: serde_json::Value = serde_json::to_value(&lock).unwrap();
        let entry = &json["git"]["https://example.com/docs#main"];
        assert_eq!(entry["commit"], "abc123");
        assert_eq!(entry["git"]["https://example.com/shared#live"]["commit"], "def456");
        assert_eq!(entry["downloads"]["https://example.com/schema.json"], "v-nested");
        assert_eq!(json["downloads"]["https://example.com/toc.yml"], "v-top");

        // Leaf entries carry only the commit
        let leaf = &entry["git"]["https://example.com/shared#live"];
        assert_eq!(leaf.as_object().unwrap().len(), 1);

        let back: DependencyLockModel = serde_json::from_value(json).unwrap();
        assert_eq!(back, lock);
    }

    #[test]
    fn test_url_alias_accepted() {
        let lock: DependencyLockModel =
            serde_json::from_str(r#"{"url": {"https://example.com/a": "v1"}}"#).unwrap();
        assert_eq!(lock.download_version("https://example.com/a"), Some("v1"));
    }

    #[test]
    fn test_pins_remote_requires_commit() {
        let mut git = BTreeMap::new();
        git.insert(lock_key("https://example.com/docs", "main"), GitLockEntry::new("abc"));
        git.insert(lock_key("https://example.com/other", "main"), GitLockEntry::new(""));
        let lock = DependencyLockModel::new(git, BTreeMap::new());

        assert!(lock.pins_remote("https://example.com/docs"));
        assert!(!lock.pins_remote("https://example.com/other"));
        assert!(!lock.pins_remote("https://example.com/doc"));
        assert_eq!(lock.pinned_commit("https://example.com/docs", "main"), Some("abc"));
        assert_eq!(lock.pinned_commit("https://example.com/other", "main"), None);
    }

    #[test]
    fn test_all_downloads_includes_nested() {
        let mut git = BTreeMap::new();
        git.insert(lock_key("r", "b"), GitLockEntry::with_nested("c", nested_lock()));
        let mut downloads = BTreeMap::new();
        downloads.insert("https://example.com/top".to_string(), "v-top".to_string());
        let lock = DependencyLockModel::new(git, downloads);

        let all = lock.all_downloads();
        assert_eq!(all.len(), 2);
        assert!(all.contains(&("https://example.com/top", "v-top")));
        assert!(all.contains(&("https://example.com/schema.json", "v-nested")));
    }

    #[test]
    fn test_merge_last_wins() {
        let merged = merge_git_entries(vec![
            (lock_key("r", "b"), GitLockEntry::new("first")),
            (lock_key("r", "c"), GitLockEntry::new("other")),
            (lock_key("r", "b"), GitLockEntry::new("second")),
        ]);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[&lock_key("r", "b")].commit, "second");
    }
}
