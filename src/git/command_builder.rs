//! Builder for `git` invocations with uniform logging, timeouts, and errors.
//!
//! Every git process docrestore spawns goes through [`GitCommand`]. Commands run
//! with `-C <dir>` instead of changing the process working directory, are logged
//! on the `git` target, and report slow operations on `git::perf`.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tokio::time::timeout;

use crate::constants::DEFAULT_GIT_TIMEOUT;
use crate::core::RestoreError;

const GIT_BINARY: &str = "git";

/// A git invocation under construction.
#[derive(Debug, Clone)]
pub struct GitCommand {
    args: Vec<String>,
    current_dir: Option<PathBuf>,
    env_vars: Vec<(String, String)>,
    timeout_duration: Option<Duration>,
    context: Option<String>,
}

impl Default for GitCommand {
    fn default() -> Self {
        Self {
            args: Vec::new(),
            current_dir: None,
            // Never let git block on an interactive credential prompt
            env_vars: vec![("GIT_TERMINAL_PROMPT".to_string(), "0".to_string())],
            timeout_duration: Some(DEFAULT_GIT_TIMEOUT),
            context: None,
        }
    }
}

/// History depth requested by [`GitCommand::fetch_branches`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchDepth {
    /// `--depth 1`
    Shallow,
    /// Whatever history the repository already tracks, plus new commits.
    Full,
    /// Full history for a repository that an earlier fetch left shallow.
    Unshallow,
}

/// Captured output of a successful git command.
#[derive(Debug, Clone)]
pub struct GitCommandOutput {
    /// Standard output as UTF-8 (lossy)
    pub stdout: String,
    /// Standard error as UTF-8 (lossy)
    pub stderr: String,
}

impl GitCommand {
    /// Empty command with the default timeout.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Run git against `dir` (passed as `-C dir`).
    #[must_use]
    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.current_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Append one argument.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set an environment variable for the child process.
    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env_vars.push((key.into(), value.into()));
        self
    }

    /// Override the timeout; `None` waits forever.
    #[must_use]
    pub const fn with_timeout(mut self, duration: Option<Duration>) -> Self {
        self.timeout_duration = duration;
        self
    }

    /// Label included in every log line for this command.
    #[must_use]
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Arguments as they will be passed, without `-C`.
    #[must_use]
    pub fn get_args(&self) -> &[String] {
        &self.args
    }

    fn full_args(&self) -> Vec<String> {
        let mut full_args = Vec::with_capacity(self.args.len() + 2);
        if let Some(dir) = &self.current_dir {
            full_args.push("-C".to_string());
            full_args.push(dir.display().to_string());
        }
        full_args.extend(self.args.iter().cloned());
        full_args
    }

    fn operation(&self) -> String {
        match self.args.first().map(String::as_str) {
            Some("worktree") => {
                format!("worktree {}", self.args.get(1).map_or("", String::as_str))
            }
            Some(op) => op.to_string(),
            None => "unknown".to_string(),
        }
    }

    fn ctx_prefix(&self) -> String {
        self.context.as_ref().map(|c| format!("({c}) ")).unwrap_or_default()
    }

    /// Spawns git and waits for it, returning raw output regardless of status.
    async fn run(&self) -> Result<std::process::Output> {
        let full_args = self.full_args();
        let mut cmd = Command::new(GIT_BINARY);
        cmd.args(&full_args).stdin(Stdio::null()).stdout(Stdio::piped()).stderr(Stdio::piped());
        cmd.kill_on_drop(true);
        for (key, value) in &self.env_vars {
            tracing::trace!(target: "git", "Setting env var: {}={}", key, value);
            cmd.env(key, value);
        }

        tracing::debug!(
            target: "git",
            "{}Executing command: {} {}",
            self.ctx_prefix(),
            GIT_BINARY,
            full_args.join(" ")
        );

        let output_future = cmd.output();
        let result = match self.timeout_duration {
            Some(duration) => match timeout(duration, output_future).await {
                Ok(result) => result,
                Err(_) => {
                    tracing::warn!(
                        target: "git",
                        "{}Command timed out after {} seconds: git {}",
                        self.ctx_prefix(),
                        duration.as_secs(),
                        full_args.join(" ")
                    );
                    return Err(RestoreError::GitCommandError {
                        operation: self.operation(),
                        stderr: format!(
                            "Git command timed out after {} seconds. Check network connectivity or raise git_timeout_secs.\n\
                            Try running the command manually: git {}",
                            duration.as_secs(),
                            full_args.join(" ")
                        ),
                    }
                    .into());
                }
            },
            None => output_future.await,
        };

        match result {
            Ok(output) => Ok(output),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(RestoreError::GitNotFound.into()),
            Err(e) => Err(e).context(format!("Failed to execute git {}", full_args.join(" "))),
        }
    }

    fn log_perf(&self, start: Instant) {
        let elapsed = start.elapsed();
        if elapsed.as_secs() > 1 {
            tracing::info!(
                target: "git::perf",
                "{}Git {} took {:.2}s",
                self.ctx_prefix(),
                self.operation(),
                elapsed.as_secs_f64()
            );
        } else if elapsed.as_millis() > 100 {
            tracing::debug!(
                target: "git::perf",
                "{}Git {} took {}ms",
                self.ctx_prefix(),
                self.operation(),
                elapsed.as_millis()
            );
        }
    }

    /// Runs the command; a non-zero exit becomes [`RestoreError::GitCommandError`].
    pub async fn execute(self) -> Result<GitCommandOutput> {
        let start = Instant::now();
        let output = self.run().await?;
        self.log_perf(start);

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        if !output.status.success() {
            tracing::debug!(
                target: "git",
                "{}Command failed with exit code: {:?}",
                self.ctx_prefix(),
                output.status.code()
            );
            if !stderr.is_empty() {
                tracing::debug!(target: "git", "{}Error: {}", self.ctx_prefix(), stderr.trim());
            }
            return Err(RestoreError::GitCommandError {
                operation: self.operation(),
                stderr: if stderr.trim().is_empty() { stdout } else { stderr },
            }
            .into());
        }

        if !stdout.is_empty() {
            tracing::trace!(target: "git", "{}{}", self.ctx_prefix(), stdout.trim());
        }
        if !stderr.is_empty() {
            tracing::debug!(target: "git", "{}{}", self.ctx_prefix(), stderr.trim());
        }

        Ok(GitCommandOutput {
            stdout,
            stderr,
        })
    }

    /// Runs the command and returns trimmed stdout.
    pub async fn execute_stdout(self) -> Result<String> {
        let output = self.execute().await?;
        Ok(output.stdout.trim().to_string())
    }

    /// Runs the command, discarding output.
    pub async fn execute_success(self) -> Result<()> {
        self.execute().await?;
        Ok(())
    }

    /// Runs a query whose non-zero exit means "no answer" rather than failure.
    ///
    /// Returns trimmed stdout on success and `None` on a non-zero exit. Spawn
    /// failures and timeouts are still errors.
    pub async fn execute_optional(self) -> Result<Option<String>> {
        let start = Instant::now();
        let output = self.run().await?;
        self.log_perf(start);

        if output.status.success() {
            Ok(Some(String::from_utf8_lossy(&output.stdout).trim().to_string()))
        } else {
            tracing::trace!(
                target: "git",
                "{}Query returned exit code {:?}",
                self.ctx_prefix(),
                output.status.code()
            );
            Ok(None)
        }
    }
}

// Convenience builders for the operations the restore engine needs

impl GitCommand {
    /// `git init --bare <path>`
    #[must_use]
    pub fn init_bare(path: impl AsRef<Path>) -> Self {
        Self::new().args(["init", "--bare", "--quiet"]).arg(path.as_ref().display().to_string())
    }

    /// Batched fetch of `branches` from `remote` into same-named local refs.
    ///
    /// Refspecs are forced (`+`) so rewritten remote branches update cleanly.
    #[must_use]
    pub fn fetch_branches(remote: &str, branches: &[String], depth: FetchDepth) -> Self {
        let mut cmd = Self::new().args(["fetch", "--no-tags", "--force"]);
        match depth {
            FetchDepth::Shallow => cmd = cmd.args(["--depth", "1"]),
            FetchDepth::Unshallow => cmd = cmd.arg("--unshallow"),
            FetchDepth::Full => {}
        }
        cmd.arg(remote).args(branches.iter().map(|b| branch_refspec(b)))
    }

    /// Single-ref fetch used for best-effort side fetches.
    #[must_use]
    pub fn fetch_ref(remote: &str, reference: &str) -> Self {
        Self::new().args(["fetch", "--no-tags", "--force"]).arg(remote).arg(branch_refspec(reference))
    }

    /// `rev-parse` that resolves `reference` to a commit or fails quietly.
    #[must_use]
    pub fn rev_parse_commit(reference: &str) -> Self {
        Self::new().args(["rev-parse", "--verify", "--quiet"]).arg(format!("{reference}^{{commit}}"))
    }

    /// Adds a detached worktree at `dest` checked out at `commit`.
    ///
    /// `--force` lets git reuse a destination that is registered but missing,
    /// which happens after the directory was deleted externally.
    #[must_use]
    pub fn worktree_add(dest: impl AsRef<Path>, commit: &str) -> Self {
        Self::new()
            .args(["worktree", "add", "--force", "--detach"])
            .arg(dest.as_ref().display().to_string())
            .arg(commit)
    }

    /// `git worktree list --porcelain`
    #[must_use]
    pub fn worktree_list() -> Self {
        Self::new().args(["worktree", "list", "--porcelain"])
    }
}

/// `+refs/heads/<b>:refs/heads/<b>`, or the ref unchanged if already qualified.
#[must_use]
pub fn branch_refspec(branch: &str) -> String {
    let reference = branch_ref(branch);
    format!("+{reference}:{reference}")
}

/// Fully qualified ref for a branch name; names under `refs/` pass through.
#[must_use]
pub fn branch_ref(branch: &str) -> String {
    if branch.starts_with("refs/") { branch.to_string() } else { format!("refs/heads/{branch}") }
}
