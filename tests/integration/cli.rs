use assert_cmd::Command;
use docrestore::lockfile::{DependencyLockModel, lock_key};
use docrestore::test_utils::TestGit;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

use super::file_url;

fn docrestore(temp: &Path) -> Command {
    let mut cmd = Command::cargo_bin("docrestore").unwrap();
    cmd.env("DOCRESTORE_CACHE_DIR", temp.join("cache"))
        .env("DOCRESTORE_CONFIG_PATH", temp.join("no-config.toml"))
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_restore_writes_lock_file() {
    let temp = TempDir::new().unwrap();
    let source = TestGit::init_at(temp.path().join("shared")).unwrap();
    let head = source.commit_files(&[("index.md", "# Shared\n")], "Shared").unwrap();
    let artifact = temp.path().join("schema.json");
    fs::write(&artifact, "{}").unwrap();

    let docset = temp.path().join("docset");
    fs::create_dir(&docset).unwrap();
    fs::write(
        docset.join("docrestore.toml"),
        format!(
            "downloads = [\"{}\"]\n\n[[git]]\nremote = \"{}\"\n",
            file_url(&artifact),
            source.remote()
        ),
    )
    .unwrap();

    docrestore(temp.path())
        .arg("restore")
        .arg(&docset)
        .assert()
        .success()
        .stdout(predicate::str::contains("Restored 1 git and 1 URL dependencies"));

    let lock = DependencyLockModel::load(&docset.join("docrestore.lock.json")).unwrap();
    assert_eq!(lock.git()[&lock_key(&source.remote(), "main")].commit, head);
    assert!(lock.download_version(&file_url(&artifact)).is_some());
}

#[test]
fn test_restore_locked_reproduces_commit() {
    let temp = TempDir::new().unwrap();
    let source = TestGit::init_at(temp.path().join("shared")).unwrap();
    let first = source.commit_files(&[("index.md", "v1\n")], "v1").unwrap();

    let docset = temp.path().join("docset");
    fs::create_dir(&docset).unwrap();
    fs::write(docset.join("docrestore.toml"), format!("[[git]]\nremote = \"{}\"\n", source.remote()))
        .unwrap();

    docrestore(temp.path()).arg("restore").arg(&docset).assert().success();
    let pinned = docset.join("pinned.lock.json");
    fs::copy(docset.join("docrestore.lock.json"), &pinned).unwrap();

    source.commit_files(&[("index.md", "v2\n")], "v2").unwrap();

    docrestore(temp.path())
        .arg("restore")
        .arg(&docset)
        .arg("--locked")
        .arg(&pinned)
        .assert()
        .success();
    let lock = DependencyLockModel::load(&docset.join("docrestore.lock.json")).unwrap();
    assert_eq!(lock.git()[&lock_key(&source.remote(), "main")].commit, first);
}

#[test]
fn test_restore_missing_branch_fails() {
    let temp = TempDir::new().unwrap();
    let source = TestGit::init_at(temp.path().join("shared")).unwrap();
    source.commit_files(&[("index.md", "x\n")], "x").unwrap();

    let docset = temp.path().join("docset");
    fs::create_dir(&docset).unwrap();
    fs::write(
        docset.join("docrestore.toml"),
        format!("[[git]]\nremote = \"{}\"\nbranch = \"nope\"\n", source.remote()),
    )
    .unwrap();

    docrestore(temp.path())
        .arg("restore")
        .arg(&docset)
        .assert()
        .failure()
        .stderr(predicate::str::contains("git fetch failed"));
    assert!(!docset.join("docrestore.lock.json").exists());
}

#[test]
fn test_restore_without_manifest_fails() {
    let temp = TempDir::new().unwrap();
    docrestore(temp.path())
        .arg("restore")
        .arg(temp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("docrestore.toml"));
}

#[test]
fn test_gc_command_reports_total() {
    let temp = TempDir::new().unwrap();
    docrestore(temp.path())
        .args(["gc", "https://example.com/never-downloaded.json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Removed 0 unreferenced cached downloads"));
}

#[test]
fn test_gc_requires_address() {
    let temp = TempDir::new().unwrap();
    docrestore(temp.path()).arg("gc").assert().failure();
}
