//! In-memory fakes for the restore engine's external seams.

use anyhow::{Result, anyhow, bail};
use futures::future::BoxFuture;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::core::RestoreFailures;
use crate::download::{DownloadClient, DownloadStatus};
use crate::git::GitToolchain;
use crate::lockfile::DependencyLockModel;
use crate::restore::RestoreChildCallback;

/// One recorded `clone_or_update_bare` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FakeFetch {
    /// Remote fetched from
    pub remote: String,
    /// Branches in the batch, in request order
    pub branches: Vec<String>,
    /// Depth-one requested
    pub shallow: bool,
}

#[derive(Default)]
struct FakeGitState {
    tips: HashMap<(String, String), String>,
    repos: HashMap<PathBuf, String>,
    worktrees: HashMap<PathBuf, Vec<PathBuf>>,
    calls: Vec<&'static str>,
    fetches: Vec<FakeFetch>,
    failing_remotes: HashSet<String>,
    fail_worktree_adds: bool,
}

/// [`GitToolchain`] that keeps branch tips in memory.
///
/// Bare repositories and worktrees are real directories so the restore
/// engine's filesystem checks behave as they would against git.
#[derive(Default)]
pub struct FakeGitToolchain {
    state: Mutex<FakeGitState>,
}

impl FakeGitToolchain {
    /// Empty toolchain: no remote has any branch.
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, FakeGitState> {
        self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Sets the tip `remote` reports for `branch`.
    pub fn set_tip(&self, remote: &str, branch: &str, commit: &str) {
        self.state().tips.insert((remote.to_string(), branch.to_string()), commit.to_string());
    }

    /// Makes every fetch from `remote` fail.
    pub fn fail_fetch(&self, remote: &str) {
        self.state().failing_remotes.insert(remote.to_string());
    }

    /// Makes every worktree add fail.
    pub fn fail_worktree_adds(&self) {
        self.state().fail_worktree_adds = true;
    }

    /// Number of calls to the named trait method.
    pub fn count_calls(&self, operation: &str) -> usize {
        self.state().calls.iter().filter(|op| **op == operation).count()
    }

    /// Number of calls to any trait method.
    pub fn total_calls(&self) -> usize {
        self.state().calls.len()
    }

    /// Every batched fetch so far.
    pub fn fetches(&self) -> Vec<FakeFetch> {
        self.state().fetches.clone()
    }

    fn clone_or_update_bare_sync(
        &self,
        repo: &Path,
        remote: &str,
        branches: &[String],
        shallow: bool,
    ) -> Result<()> {
        let mut state = self.state();
        state.calls.push("clone_or_update_bare");
        if state.failing_remotes.contains(remote) {
            bail!("fatal: could not read from remote repository '{remote}'");
        }
        std::fs::create_dir_all(repo.join("objects"))?;
        std::fs::write(repo.join("HEAD"), "ref: refs/heads/main\n")?;
        state.repos.insert(repo.to_path_buf(), remote.to_string());
        state.fetches.push(FakeFetch {
            remote: remote.to_string(),
            branches: branches.to_vec(),
            shallow,
        });
        Ok(())
    }

    fn add_worktree_sync(&self, repo: &Path, commit: &str, dest: &Path) -> Result<()> {
        let mut state = self.state();
        state.calls.push("add_worktree");
        if state.fail_worktree_adds {
            bail!("fatal: invalid reference: {commit}");
        }
        std::fs::create_dir_all(dest)?;
        std::fs::write(dest.join(".git"), format!("gitdir: {}\n", repo.display()))?;
        state.worktrees.entry(repo.to_path_buf()).or_default().push(dest.to_path_buf());
        Ok(())
    }

    fn rev_parse_sync(&self, repo: &Path, reference: &str) -> Result<Option<String>> {
        let mut state = self.state();
        state.calls.push("rev_parse");
        let remote = state
            .repos
            .get(repo)
            .cloned()
            .ok_or_else(|| anyhow!("fatal: not a git repository: {}", repo.display()))?;
        let branch = reference.strip_prefix("refs/heads/").unwrap_or(reference);
        Ok(state.tips.get(&(remote, branch.to_string())).cloned())
    }
}

impl GitToolchain for FakeGitToolchain {
    fn clone_or_update_bare<'a>(
        &'a self,
        repo: &'a Path,
        remote: &'a str,
        branches: &'a [String],
        shallow: bool,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move { self.clone_or_update_bare_sync(repo, remote, branches, shallow) })
    }

    fn list_worktrees<'a>(&'a self, repo: &'a Path) -> BoxFuture<'a, Result<Vec<PathBuf>>> {
        Box::pin(async move {
            let mut state = self.state();
            state.calls.push("list_worktrees");
            Ok(state.worktrees.get(repo).cloned().unwrap_or_default())
        })
    }

    fn add_worktree<'a>(
        &'a self,
        repo: &'a Path,
        commit: &'a str,
        dest: &'a Path,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move { self.add_worktree_sync(repo, commit, dest) })
    }

    fn rev_parse<'a>(
        &'a self,
        repo: &'a Path,
        reference: &'a str,
    ) -> BoxFuture<'a, Result<Option<String>>> {
        Box::pin(async move { self.rev_parse_sync(repo, reference) })
    }

    fn fetch<'a>(
        &'a self,
        _repo: &'a Path,
        remote: &'a str,
        reference: &'a str,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let mut state = self.state();
            state.calls.push("fetch");
            if state.failing_remotes.contains(remote) {
                bail!("fatal: couldn't find remote ref {reference}");
            }
            Ok(())
        })
    }
}

#[derive(Debug, Clone)]
enum FakeResponse {
    Body(Vec<u8>),
    Status(u16),
    Unreachable,
}

/// [`DownloadClient`] serving canned responses per address.
///
/// Addresses without a response get a 404.
#[derive(Default)]
pub struct FakeDownloadClient {
    responses: Mutex<HashMap<String, FakeResponse>>,
    calls: Mutex<Vec<(String, Vec<(String, String)>)>>,
}

impl FakeDownloadClient {
    /// Client with no responses.
    pub fn new() -> Self {
        Self::default()
    }

    fn respond(&self, address: &str, response: FakeResponse) {
        self.responses
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(address.to_string(), response);
    }

    /// Serves `body` with status 200.
    pub fn set_body(&self, address: &str, body: impl Into<Vec<u8>>) {
        self.respond(address, FakeResponse::Body(body.into()));
    }

    /// Serves an empty response with `code`.
    pub fn set_status(&self, address: &str, code: u16) {
        self.respond(address, FakeResponse::Status(code));
    }

    /// Fails the request before any response.
    pub fn set_unreachable(&self, address: &str) {
        self.respond(address, FakeResponse::Unreachable);
    }

    /// Headers sent with each request to `address`.
    pub fn requests_to(&self, address: &str) -> Vec<Vec<(String, String)>> {
        self.calls
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .iter()
            .filter(|(a, _)| a == address)
            .map(|(_, headers)| headers.clone())
            .collect()
    }

    fn download_sync(
        &self,
        address: &str,
        headers: &[(String, String)],
        dest: &Path,
    ) -> Result<DownloadStatus> {
        self.calls
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push((address.to_string(), headers.to_vec()));
        let response = self
            .responses
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(address)
            .cloned();
        match response {
            Some(FakeResponse::Body(body)) => {
                std::fs::write(dest, body)?;
                Ok(DownloadStatus {
                    code: 200,
                })
            }
            Some(FakeResponse::Status(code)) => Ok(DownloadStatus {
                code,
            }),
            Some(FakeResponse::Unreachable) => bail!("error trying to connect: connection refused"),
            None => Ok(DownloadStatus {
                code: 404,
            }),
        }
    }
}

impl DownloadClient for FakeDownloadClient {
    fn download<'a>(
        &'a self,
        address: &'a str,
        headers: &'a [(String, String)],
        dest: &'a Path,
    ) -> BoxFuture<'a, Result<DownloadStatus>> {
        Box::pin(async move { self.download_sync(address, headers, dest) })
    }
}

type ChildHandler =
    Box<dyn Fn(&Path) -> Result<DependencyLockModel, RestoreFailures> + Send + Sync>;

/// Restore-child callback that records its calls and answers from a handler.
pub struct RecordingRestoreChild {
    handler: ChildHandler,
    calls: Mutex<Vec<(PathBuf, Option<DependencyLockModel>)>>,
}

impl RecordingRestoreChild {
    fn with_handler(handler: ChildHandler) -> Self {
        Self {
            handler,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Returns an empty lock for every child.
    pub fn new() -> Self {
        Self::with_handler(Box::new(|_: &Path| Ok(DependencyLockModel::default())))
    }

    /// Returns `lock` for every child.
    pub fn with_lock(lock: DependencyLockModel) -> Self {
        Self::with_handler(Box::new(move |_: &Path| Ok(lock.clone())))
    }

    /// Fails for children whose path matches `predicate`.
    pub fn failing_when(predicate: impl Fn(&Path) -> bool + Send + Sync + 'static) -> Self {
        Self::with_handler(Box::new(move |path: &Path| -> Result<DependencyLockModel, RestoreFailures> {
            if predicate(path) {
                Err(anyhow!("nested restore failed for {}", path.display()).into())
            } else {
                Ok(DependencyLockModel::default())
            }
        }))
    }

    /// Paths the callback was invoked with, in call order.
    pub fn paths(&self) -> Vec<PathBuf> {
        self.calls
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .iter()
            .map(|(path, _)| path.clone())
            .collect()
    }

    /// Nested locks the callback was invoked with, in call order.
    pub fn nested_locks(&self) -> Vec<Option<DependencyLockModel>> {
        self.calls
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .iter()
            .map(|(_, lock)| lock.clone())
            .collect()
    }
}

impl Default for RecordingRestoreChild {
    fn default() -> Self {
        Self::new()
    }
}

impl RestoreChildCallback for RecordingRestoreChild {
    fn restore_child<'a>(
        &'a self,
        path: &'a Path,
        nested_lock: Option<&'a DependencyLockModel>,
    ) -> BoxFuture<'a, Result<DependencyLockModel, RestoreFailures>> {
        Box::pin(async move {
            self.calls
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .push((path.to_path_buf(), nested_lock.cloned()));
            (self.handler)(path)
        })
    }
}
