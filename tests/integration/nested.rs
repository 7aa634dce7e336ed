use docrestore::lockfile::lock_key;
use docrestore::manifest::{DependencyManifest, ManifestRestoreChild};
use docrestore::restore::RestoreOptions;
use docrestore::test_utils::TestGit;
use tempfile::TempDir;

use super::engine;

#[tokio::test]
async fn test_nested_manifest_is_restored_into_parent_entry() {
    let temp = TempDir::new().unwrap();
    let leaf = TestGit::init_at(temp.path().join("glossary")).unwrap();
    let leaf_head = leaf.commit_files(&[("terms.md", "# Terms\n")], "Terms").unwrap();

    let parent = TestGit::init_at(temp.path().join("shared")).unwrap();
    let manifest = format!("[[git]]\nremote = \"{}\"\nbranch = \"main\"\n", leaf.remote());
    let parent_head = parent
        .commit_files(&[("docrestore.toml", manifest.as_str()), ("intro.md", "# Intro\n")], "Shared")
        .unwrap();

    let docset = temp.path().join("docset");
    std::fs::create_dir(&docset).unwrap();
    let top = format!("[[git]]\nremote = \"{}\"\n", parent.remote());
    std::fs::write(docset.join("docrestore.toml"), top).unwrap();

    let manifest = DependencyManifest::load_from_dir(&docset).await.unwrap().unwrap();
    let restorer = engine(&temp.path().join("cache"), RestoreOptions::default());
    let lock = restorer
        .restore(&manifest.to_request(), None, &ManifestRestoreChild::new(&restorer))
        .await
        .unwrap();

    let entry = &lock.git()[&lock_key(&parent.remote(), "main")];
    assert_eq!(entry.commit, parent_head);
    assert_eq!(entry.nested.git()[&lock_key(&leaf.remote(), "main")].commit, leaf_head);
    // Nested entries stay under their parent
    assert_eq!(lock.git().len(), 1);

    // Serialized form flattens the nested lock next to the commit
    let json: serde_json::Value = serde_json::to_value(&lock).unwrap();
    let nested = &json["git"][lock_key(&parent.remote(), "main")]["git"];
    assert_eq!(nested[lock_key(&leaf.remote(), "main")]["commit"], leaf_head.as_str());
}

#[tokio::test]
async fn test_nested_lock_pins_grandchild() {
    let temp = TempDir::new().unwrap();
    let leaf = TestGit::init_at(temp.path().join("glossary")).unwrap();
    let pinned = leaf.commit_files(&[("terms.md", "v1\n")], "v1").unwrap();

    let parent = TestGit::init_at(temp.path().join("shared")).unwrap();
    let manifest = format!("[[git]]\nremote = \"{}\"\n", leaf.remote());
    parent.commit_files(&[("docrestore.toml", manifest.as_str())], "Shared").unwrap();

    let docset = temp.path().join("docset");
    std::fs::create_dir(&docset).unwrap();
    std::fs::write(docset.join("docrestore.toml"), format!("[[git]]\nremote = \"{}\"\n", parent.remote()))
        .unwrap();
    let request = DependencyManifest::load_from_dir(&docset).await.unwrap().unwrap().to_request();

    let restorer = engine(&temp.path().join("cache"), RestoreOptions::default());
    let child = ManifestRestoreChild::new(&restorer);
    let first = restorer.restore(&request, None, &child).await.unwrap();

    leaf.commit_files(&[("terms.md", "v2\n")], "v2").unwrap();

    let again = restorer.restore(&request, Some(&first), &child).await.unwrap();
    assert_eq!(again, first);
    let entry = &again.git()[&lock_key(&parent.remote(), "main")];
    assert_eq!(entry.nested.git()[&lock_key(&leaf.remote(), "main")].commit, pinned);
}
