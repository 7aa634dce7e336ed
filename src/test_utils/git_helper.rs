//! Real-git fixture repositories for tests.
//!
//! Source repositories built here stand in for remotes: docrestore fetches
//! from their filesystem path exactly as it would from a hosted URL.

use anyhow::{Context, Result, bail};
use std::path::{Path, PathBuf};
use std::process::Command;

/// Wrapper around `git` for building fixture repositories.
pub struct TestGit {
    repo_path: PathBuf,
}

impl TestGit {
    fn run(&self, args: &[&str], action: &str) -> Result<std::process::Output> {
        let output = Command::new("git")
            .args(args)
            .current_dir(&self.repo_path)
            .env("GIT_TERMINAL_PROMPT", "0")
            .output()
            .with_context(|| action.to_string())?;

        if !output.status.success() {
            bail!("{} failed: {}", action, String::from_utf8_lossy(&output.stderr));
        }

        Ok(output)
    }

    /// Wraps an existing directory.
    pub fn new(repo_path: impl Into<PathBuf>) -> Self {
        Self {
            repo_path: repo_path.into(),
        }
    }

    /// Creates `path`, initializes a repository on branch `main`, and sets a
    /// committer identity.
    pub fn init_at(path: impl Into<PathBuf>) -> Result<Self> {
        let git = Self::new(path);
        std::fs::create_dir_all(&git.repo_path)
            .with_context(|| format!("Failed to create {}", git.repo_path.display()))?;
        git.run(&["init", "--quiet"], "Failed to initialize git repository")?;
        git.run(&["symbolic-ref", "HEAD", "refs/heads/main"], "Failed to set HEAD to main")?;
        git.run(&["config", "user.email", "test@docrestore.example"], "Failed to set user email")?;
        git.run(&["config", "user.name", "Test User"], "Failed to set user name")?;
        git.run(&["config", "commit.gpgsign", "false"], "Failed to disable signing")?;
        Ok(git)
    }

    /// Repository directory.
    pub fn repo_path(&self) -> &Path {
        &self.repo_path
    }

    /// Address docrestore should use as the remote.
    pub fn remote(&self) -> String {
        self.repo_path.display().to_string()
    }

    /// Writes `files` (relative path, content), commits them, and returns the
    /// new commit id.
    pub fn commit_files(&self, files: &[(&str, &str)], message: &str) -> Result<String> {
        for (relative, content) in files {
            let path = self.repo_path.join(relative);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&path, content)
                .with_context(|| format!("Failed to write {}", path.display()))?;
        }
        self.run(&["add", "--all"], "Failed to stage files")?;
        self.run(&["commit", "--quiet", "-m", message], "Failed to commit")?;
        self.rev_parse_head()
    }

    /// Checks out `branch`, creating it from HEAD if it does not exist.
    pub fn checkout_branch(&self, branch: &str) -> Result<()> {
        if self.run(&["checkout", "--quiet", branch], "checkout").is_ok() {
            return Ok(());
        }
        self.run(
            &["checkout", "--quiet", "-b", branch],
            &format!("Failed to create branch: {branch}"),
        )?;
        Ok(())
    }

    /// Commit HEAD points at.
    pub fn rev_parse_head(&self) -> Result<String> {
        let output = self.run(&["rev-parse", "HEAD"], "Failed to resolve HEAD")?;
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}
