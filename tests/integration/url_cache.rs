use docrestore::cache::Cache;
use docrestore::lockfile::{DependencyLockModel, LockRegistry};
use docrestore::restore::{NoNestedRestore, RestoreOptions, RestoreRequest};
use docrestore::utils::content_hash;
use std::collections::BTreeMap;
use tempfile::TempDir;

use super::{engine, file_url};

fn downloads(addresses: &[&str]) -> RestoreRequest {
    RestoreRequest {
        git: Vec::new(),
        downloads: addresses.iter().map(ToString::to_string).collect(),
    }
}

#[tokio::test]
async fn test_download_is_content_addressed() {
    let temp = TempDir::new().unwrap();
    let artifact = temp.path().join("schema.json");
    std::fs::write(&artifact, b"{\"v\":1}").unwrap();
    let address = file_url(&artifact);

    let restorer = engine(&temp.path().join("cache"), RestoreOptions::default());
    let lock = restorer.restore(&downloads(&[&address]), None, &NoNestedRestore).await.unwrap();

    let version = lock.download_version(&address).unwrap().to_string();
    assert_eq!(version, content_hash(b"{\"v\":1}"));
    let stored = restorer.url_restorer().version_path(&address, &version);
    assert_eq!(std::fs::read(stored).unwrap(), b"{\"v\":1}");

    // Same bytes again: same version, one file
    let again = restorer.restore(&downloads(&[&address]), None, &NoNestedRestore).await.unwrap();
    assert_eq!(again, lock);
    let root = Cache::with_dir(temp.path().join("cache")).download_root(&address);
    assert_eq!(std::fs::read_dir(root).unwrap().count(), 1);
}

#[tokio::test]
async fn test_missing_artifact_fails_only_its_address() {
    let temp = TempDir::new().unwrap();
    let present = temp.path().join("present.txt");
    std::fs::write(&present, "here").unwrap();
    let missing = file_url(&temp.path().join("missing.txt"));

    let restorer = engine(&temp.path().join("cache"), RestoreOptions::default());
    let failures = restorer
        .restore(&downloads(&[&file_url(&present), &missing]), None, &NoNestedRestore)
        .await
        .unwrap_err();

    assert_eq!(failures.len(), 1);
    let message = failures.to_string();
    assert!(message.contains(&missing));
    assert!(message.contains("404"));
}

#[tokio::test]
async fn test_gc_keeps_versions_referenced_by_registered_locks() {
    let temp = TempDir::new().unwrap();
    let cache_dir = temp.path().join("cache");
    let artifact = temp.path().join("feed.xml");
    let address = file_url(&artifact);
    let restorer = engine(&cache_dir, RestoreOptions::default());

    let mut versions = Vec::new();
    for n in 0..7 {
        std::fs::write(&artifact, format!("<feed rev=\"{n}\"/>")).unwrap();
        let lock = restorer.restore(&downloads(&[&address]), None, &NoNestedRestore).await.unwrap();
        versions.push(lock.download_version(&address).unwrap().to_string());
    }

    let registry = LockRegistry::for_cache(&Cache::with_dir(cache_dir.clone()));
    for (docset, version) in [("site-a", &versions[1]), ("site-b", &versions[6])] {
        let pinned = DependencyLockModel::new(
            BTreeMap::new(),
            BTreeMap::from([(address.clone(), version.clone())]),
        );
        registry.save(&temp.path().join(docset), &pinned).unwrap();
    }

    let current = DependencyLockModel::new(
        BTreeMap::new(),
        BTreeMap::from([(address.clone(), versions[6].clone())]),
    );
    assert_eq!(restorer.gc(&current, &registry).await, 5);

    let url = restorer.url_restorer();
    for (n, version) in versions.iter().enumerate() {
        let kept = url.version_path(&address, version).exists();
        assert_eq!(kept, n == 1 || n == 6, "version {n}");
    }

    // Below the retention threshold nothing more is collected
    assert_eq!(restorer.gc(&current, &registry).await, 0);
}

#[tokio::test]
async fn test_identical_bytes_at_two_addresses_stay_separate() {
    let temp = TempDir::new().unwrap();
    let mirror_a = temp.path().join("a.json");
    let mirror_b = temp.path().join("b.json");
    std::fs::write(&mirror_a, b"[1,2,3]").unwrap();
    std::fs::write(&mirror_b, b"[1,2,3]").unwrap();
    let (a, b) = (file_url(&mirror_a), file_url(&mirror_b));

    let cache_dir = temp.path().join("cache");
    let restorer = engine(&cache_dir, RestoreOptions::default());
    let lock = restorer.restore(&downloads(&[&a, &b]), None, &NoNestedRestore).await.unwrap();

    assert_eq!(lock.downloads().len(), 2);
    let version = lock.download_version(&a).unwrap();
    assert_eq!(lock.download_version(&b), Some(version));

    let cache = Cache::with_dir(cache_dir);
    for address in [&a, &b] {
        let names: Vec<_> = std::fs::read_dir(cache.download_root(address))
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from(version)]);
    }
}
