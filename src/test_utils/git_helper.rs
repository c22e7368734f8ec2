//! Local git repositories standing in for documentation remotes.

use anyhow::{Context, Result, bail};
use std::path::{Path, PathBuf};
use std::process::Command;

/// A throwaway repository with a `main` branch, usable as a remote via its
/// path or `file://` URL.
pub struct TestRepo {
    repo_path: PathBuf,
}

impl TestRepo {
    fn run_git_command(&self, args: &[&str], action: &str) -> Result<std::process::Output> {
        let output = Command::new("git")
            .args(args)
            .current_dir(&self.repo_path)
            .output()
            .with_context(|| action.to_string())?;

        if !output.status.success() {
            bail!("{} failed: {}", action, String::from_utf8_lossy(&output.stderr));
        }

        Ok(output)
    }

    /// Initialize a repository at `repo_path` on branch `main`.
    pub fn init(repo_path: impl Into<PathBuf>) -> Result<Self> {
        let repo = Self {
            repo_path: repo_path.into(),
        };
        std::fs::create_dir_all(&repo.repo_path)?;
        repo.run_git_command(&["init", "--quiet"], "Failed to initialize git repository")?;
        repo.run_git_command(
            &["symbolic-ref", "HEAD", "refs/heads/main"],
            "Failed to set HEAD to main",
        )?;
        repo.run_git_command(
            &["config", "user.email", "test@docdeps.example"],
            "Failed to configure git user email",
        )?;
        repo.run_git_command(&["config", "user.name", "Test User"], "Failed to configure git user name")?;
        repo.run_git_command(&["config", "commit.gpgsign", "false"], "Failed to disable signing")?;
        Ok(repo)
    }

    /// Write `content` to `relative` and commit it; returns the new commit id.
    pub fn commit_file(&self, relative: &str, content: &str, message: &str) -> Result<String> {
        let path = self.repo_path.join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, content)?;
        self.run_git_command(&["add", "--all"], "Failed to add files to git")?;
        self.run_git_command(&["commit", "--quiet", "-m", message], "Failed to create git commit")?;
        self.head()
    }

    /// Create `branch` at the current HEAD and switch to it.
    pub fn create_branch(&self, branch: &str) -> Result<()> {
        self.run_git_command(
            &["checkout", "--quiet", "-b", branch],
            &format!("Failed to create branch: {branch}"),
        )?;
        Ok(())
    }

    /// Switch to an existing branch.
    pub fn checkout(&self, branch: &str) -> Result<()> {
        self.run_git_command(
            &["checkout", "--quiet", branch],
            &format!("Failed to checkout: {branch}"),
        )?;
        Ok(())
    }

    /// Current commit id.
    pub fn head(&self) -> Result<String> {
        let output = self.run_git_command(&["rev-parse", "HEAD"], "Failed to get commit hash")?;
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    pub fn path(&self) -> &Path {
        &self.repo_path
    }

    /// Remote URL of this repository.
    pub fn url(&self) -> String {
        format!("file://{}", self.repo_path.display())
    }
}

/// Whether the system git is available; git-backed tests skip without it.
pub fn git_available() -> bool {
    crate::utils::command_exists("git")
}
