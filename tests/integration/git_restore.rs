use docrestore::lockfile::{DependencyLockModel, lock_key};
use docrestore::restore::{
    DependencyFlags, DependencySpec, NoNestedRestore, RestoreOptions, RestoreRequest,
};
use docrestore::test_utils::TestGit;
use tempfile::TempDir;

use super::engine;

fn request(remote: &str, branches: &[(&str, DependencyFlags)]) -> RestoreRequest {
    RestoreRequest {
        git: branches.iter().map(|(b, f)| DependencySpec::new(remote, *b, *f)).collect(),
        downloads: Vec::new(),
    }
}

fn worktrees_of(cache: &std::path::Path) -> Vec<std::path::PathBuf> {
    let git_root = cache.join("git");
    let mut found = Vec::new();
    for repo in std::fs::read_dir(git_root).unwrap() {
        for entry in std::fs::read_dir(repo.unwrap().path()).unwrap() {
            let path = entry.unwrap().path();
            if path.file_name().unwrap() != ".git" {
                found.push(path);
            }
        }
    }
    found.sort();
    found
}

#[tokio::test]
async fn test_restore_checks_out_each_branch() {
    let temp = TempDir::new().unwrap();
    let source = TestGit::init_at(temp.path().join("docs")).unwrap();
    let main = source.commit_files(&[("index.md", "main\n")], "Main").unwrap();
    source.checkout_branch("live").unwrap();
    let live = source.commit_files(&[("index.md", "live\n")], "Live").unwrap();

    let cache = temp.path().join("cache");
    let restorer = engine(&cache, RestoreOptions::default());
    let req = request(
        &source.remote(),
        &[("main", DependencyFlags::NONE), ("live", DependencyFlags::NONE)],
    );
    let lock = restorer.restore(&req, None, &NoNestedRestore).await.unwrap();

    assert_eq!(lock.git()[&lock_key(&source.remote(), "main")].commit, main);
    assert_eq!(lock.git()[&lock_key(&source.remote(), "live")].commit, live);

    let worktrees = worktrees_of(&cache);
    assert_eq!(worktrees.len(), 2);
    let contents: Vec<String> = worktrees
        .iter()
        .map(|w| std::fs::read_to_string(w.join("index.md")).unwrap())
        .collect();
    assert!(contents.contains(&"main\n".to_string()));
    assert!(contents.contains(&"live\n".to_string()));
}

#[tokio::test]
async fn test_lock_pins_commit_across_upstream_changes() {
    let temp = TempDir::new().unwrap();
    let source = TestGit::init_at(temp.path().join("docs")).unwrap();
    let first = source.commit_files(&[("index.md", "v1\n")], "v1").unwrap();

    let cache = temp.path().join("cache");
    let restorer = engine(&cache, RestoreOptions::default());
    let req = request(&source.remote(), &[("main", DependencyFlags::NONE)]);
    let lock = restorer.restore(&req, None, &NoNestedRestore).await.unwrap();

    let second = source.commit_files(&[("index.md", "v2\n")], "v2").unwrap();

    // Same lock, same result, no new worktree
    let pinned = restorer.restore(&req, Some(&lock), &NoNestedRestore).await.unwrap();
    assert_eq!(pinned, lock);
    assert_eq!(worktrees_of(&cache).len(), 1);

    // Without the lock the new tip is checked out next to the old one
    let fresh = restorer.restore(&req, None, &NoNestedRestore).await.unwrap();
    assert_eq!(fresh.git()[&lock_key(&source.remote(), "main")].commit, second);
    assert_ne!(first, second);
    assert_eq!(worktrees_of(&cache).len(), 2);
}

#[tokio::test]
async fn test_pinned_older_commit_gets_locked_worktree() {
    let temp = TempDir::new().unwrap();
    let source = TestGit::init_at(temp.path().join("docs")).unwrap();
    let old = source.commit_files(&[("index.md", "old\n")], "Old").unwrap();
    source.commit_files(&[("index.md", "new\n")], "New").unwrap();

    let pins = serde_json::json!({
        "git": { lock_key(&source.remote(), "main"): { "commit": old } }
    });
    let lock: DependencyLockModel = serde_json::from_value(pins).unwrap();

    let cache = temp.path().join("cache");
    let restorer = engine(&cache, RestoreOptions::default());
    let req = request(&source.remote(), &[("main", DependencyFlags::DEPTH_ONE)]);
    let result = restorer.restore(&req, Some(&lock), &NoNestedRestore).await.unwrap();

    assert_eq!(result, lock);
    let worktrees = worktrees_of(&cache);
    assert_eq!(worktrees.len(), 1);
    assert!(worktrees[0].to_string_lossy().ends_with(&format!("-locked-{old}")));
    assert_eq!(std::fs::read_to_string(worktrees[0].join("index.md")).unwrap(), "old\n");
}

#[tokio::test]
async fn test_no_checkout_branch_has_objects_only() {
    let temp = TempDir::new().unwrap();
    let source = TestGit::init_at(temp.path().join("site")).unwrap();
    source.commit_files(&[("index.html", "<p/>")], "Site").unwrap();

    let cache = temp.path().join("cache");
    let restorer = engine(&cache, RestoreOptions::default());
    let req = request(&source.remote(), &[("main", DependencyFlags::NO_CHECKOUT)]);
    let lock = restorer.restore(&req, None, &NoNestedRestore).await.unwrap();

    assert!(lock.is_empty());
    assert!(worktrees_of(&cache).is_empty());
}

#[tokio::test]
async fn test_missing_branch_reports_and_siblings_survive() {
    let temp = TempDir::new().unwrap();
    let docs = TestGit::init_at(temp.path().join("docs")).unwrap();
    docs.commit_files(&[("index.md", "docs\n")], "Docs").unwrap();
    let shared = TestGit::init_at(temp.path().join("shared")).unwrap();
    let shared_head = shared.commit_files(&[("a.md", "a\n")], "Shared").unwrap();

    let cache = temp.path().join("cache");
    let restorer = engine(&cache, RestoreOptions::default());
    let req = RestoreRequest {
        git: vec![
            DependencySpec::new(docs.remote(), "nope", DependencyFlags::NONE),
            DependencySpec::new(shared.remote(), "main", DependencyFlags::NONE),
        ],
        downloads: Vec::new(),
    };
    let failures = restorer.restore(&req, None, &NoNestedRestore).await.unwrap_err();
    assert_eq!(failures.len(), 1);
    assert!(failures.to_string().contains(&docs.remote()));

    // The healthy remote was restored before the pass reported failure
    let retry = RestoreRequest {
        git: vec![DependencySpec::new(shared.remote(), "main", DependencyFlags::NONE)],
        downloads: Vec::new(),
    };
    let lock = restorer.restore(&retry, None, &NoNestedRestore).await.unwrap();
    assert_eq!(lock.git()[&lock_key(&shared.remote(), "main")].commit, shared_head);
}

#[tokio::test]
async fn test_concurrent_restorers_share_the_cache() {
    let temp = TempDir::new().unwrap();
    let source = TestGit::init_at(temp.path().join("docs")).unwrap();
    let head = source.commit_files(&[("index.md", "x\n")], "x").unwrap();

    let cache = temp.path().join("cache");
    // Separate restorers behave like separate processes: only the file locks are shared
    let a = engine(&cache, RestoreOptions::default());
    let b = engine(&cache, RestoreOptions::default());
    let req = request(&source.remote(), &[("main", DependencyFlags::NONE)]);

    let (left, right) = tokio::join!(
        a.restore(&req, None, &NoNestedRestore),
        b.restore(&req, None, &NoNestedRestore)
    );
    let left = left.unwrap();
    let right = right.unwrap();

    assert_eq!(left, right);
    assert_eq!(left.git()[&lock_key(&source.remote(), "main")].commit, head);
    assert_eq!(worktrees_of(&cache).len(), 1);
}

#[tokio::test]
async fn test_implicit_mode_skips_fetch() {
    let temp = TempDir::new().unwrap();
    let source = TestGit::init_at(temp.path().join("docs")).unwrap();
    let first = source.commit_files(&[("index.md", "v1\n")], "v1").unwrap();

    let cache = temp.path().join("cache");
    let req = request(&source.remote(), &[("main", DependencyFlags::NONE)]);
    engine(&cache, RestoreOptions::default()).restore(&req, None, &NoNestedRestore).await.unwrap();

    source.commit_files(&[("index.md", "v2\n")], "v2").unwrap();
    let implicit = RestoreOptions {
        implicit: true,
        ..RestoreOptions::default()
    };
    let lock = engine(&cache, implicit).restore(&req, None, &NoNestedRestore).await.unwrap();

    // The local checkout wins over the newer upstream tip
    assert_eq!(lock.git()[&lock_key(&source.remote(), "main")].commit, first);
}

#[tokio::test]
async fn test_pin_after_shallow_restore_fetches_history() {
    let temp = TempDir::new().unwrap();
    let source = TestGit::init_at(temp.path().join("docs")).unwrap();
    let first = source.commit_files(&[("index.md", "v1\n")], "v1").unwrap();
    source.commit_files(&[("index.md", "v2\n")], "v2").unwrap();
    source.commit_files(&[("index.md", "v3\n")], "v3").unwrap();
    let remote = format!("file://{}", source.repo_path().display());

    let cache = temp.path().join("cache");
    let restorer = engine(&cache, RestoreOptions::default());
    let req = request(&remote, &[("main", DependencyFlags::DEPTH_ONE)]);
    restorer.restore(&req, None, &NoNestedRestore).await.unwrap();

    let pins = serde_json::json!({
        "git": { lock_key(&remote, "main"): { "commit": first } }
    });
    let lock: DependencyLockModel = serde_json::from_value(pins).unwrap();
    let pinned = restorer.restore(&req, Some(&lock), &NoNestedRestore).await.unwrap();

    assert_eq!(pinned, lock);
    let locked = worktrees_of(&cache)
        .into_iter()
        .find(|w| w.to_string_lossy().ends_with(&format!("-locked-{first}")))
        .unwrap();
    assert_eq!(std::fs::read_to_string(locked.join("index.md")).unwrap(), "v1\n");
}
