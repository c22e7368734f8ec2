//! Builder for running the system `git` with timeouts and typed errors.
//!
//! docdeps shells out to `git` like the rest of the ecosystem's package
//! tools do, which keeps credential helpers, SSH config and proxies working
//! exactly as they do for the user.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;

use crate::core::DocdepsError;
use crate::git::strip_auth_from_url;
use crate::utils::platform::get_git_command;

/// A git invocation under construction.
///
/// # Examples
///
/// ```rust,no_run
/// use docdeps::git::GitCommand;
///
/// # async fn example() -> anyhow::Result<()> {
/// let output = GitCommand::new()
///     .args(["rev-parse", "HEAD"])
///     .current_dir("/tmp/slot")
///     .execute_stdout()
///     .await?;
/// # Ok(())
/// # }
/// ```
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
            // Prompting for credentials would hang a non-interactive restore
            env_vars: vec![("GIT_TERMINAL_PROMPT".to_string(), "0".to_string())],
            timeout_duration: Some(Duration::from_secs(300)),
            context: None,
        }
    }
}

/// Captured output of a successful git command.
#[derive(Debug, Clone)]
pub struct GitCommandOutput {
    /// Standard output
    pub stdout: String,
    /// Standard error
    pub stderr: String,
}

impl GitCommand {
    /// Start a new git command.
    pub fn new() -> Self {
        Self::default()
    }

    /// Run git in `dir` (passed as `-C dir`).
    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.current_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Append one argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Override the timeout; `None` waits indefinitely.
    pub const fn with_timeout(mut self, duration: Option<Duration>) -> Self {
        self.timeout_duration = duration;
        self
    }

    /// Label used in log lines, e.g. the remote name.
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Run the command and return its output.
    ///
    /// # Errors
    ///
    /// - [`DocdepsError::GitNotFound`] if git cannot be spawned
    /// - [`DocdepsError::GitCommandError`] on a non-zero exit or timeout
    /// - [`DocdepsError::GitCheckoutFailed`] when a `checkout` fails
    pub async fn execute(self) -> Result<GitCommandOutput> {
        let git_command = get_git_command();
        let mut cmd = Command::new(git_command);

        let mut full_args = Vec::new();
        if let Some(ref dir) = self.current_dir {
            full_args.push("-C".to_string());
            full_args.push(dir.display().to_string());
        }
        full_args.extend(self.args.iter().cloned());
        cmd.args(&full_args);
        let shown_args = redact_args(&full_args);

        match self.context {
            Some(ref ctx) => tracing::debug!(
                target: "git",
                "({}) Executing command: {} {}",
                ctx,
                git_command,
                shown_args
            ),
            None => tracing::debug!(
                target: "git",
                "Executing command: {} {}",
                git_command,
                shown_args
            ),
        }

        for (key, value) in &self.env_vars {
            cmd.env(key, value);
        }
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);

        let operation = self.args.first().cloned().unwrap_or_else(|| "unknown".to_string());
        let output_future = cmd.output();

        let output = match self.timeout_duration {
            Some(duration) => match timeout(duration, output_future).await {
                Ok(result) => result,
                Err(_) => {
                    tracing::warn!(
                        target: "git",
                        "Command timed out after {} seconds: git {}",
                        duration.as_secs(),
                        shown_args
                    );
                    return Err(DocdepsError::GitCommandError {
                        operation,
                        stderr: format!(
                            "Git command timed out after {} seconds. Check network connectivity \
                            and whether git is waiting for credentials.",
                            duration.as_secs()
                        ),
                    }
                    .into());
                }
            },
            None => output_future.await,
        };

        let output = match output {
            Ok(output) => output,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(DocdepsError::GitNotFound.into());
            }
            Err(e) => {
                return Err(e)
                    .context(format!("Failed to execute git {shown_args}"));
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        if !output.status.success() {
            tracing::debug!(
                target: "git",
                "Command failed with exit code: {:?}",
                output.status.code()
            );
            if !stderr.is_empty() {
                tracing::debug!(target: "git", "Error: {}", stderr.trim());
            }

            let error = if operation == "checkout" {
                DocdepsError::GitCheckoutFailed {
                    reference: self.args.last().cloned().unwrap_or_default(),
                    reason: stderr,
                }
            } else {
                DocdepsError::GitCommandError {
                    operation,
                    stderr: if stderr.is_empty() { stdout } else { stderr },
                }
            };
            return Err(error.into());
        }

        if !stderr.is_empty() {
            tracing::trace!(target: "git", "{}", stderr.trim());
        }

        Ok(GitCommandOutput {
            stdout,
            stderr,
        })
    }

    /// Run the command and return its trimmed stdout.
    pub async fn execute_stdout(self) -> Result<String> {
        Ok(self.execute().await?.stdout.trim().to_string())
    }

    /// Run the command, discarding its output.
    pub async fn execute_success(self) -> Result<()> {
        self.execute().await.map(|_| ())
    }
}

/// Join arguments for logging with credentials removed from any URL.
fn redact_args(args: &[String]) -> String {
    args.iter()
        .map(|arg| strip_auth_from_url(arg).unwrap_or_else(|_| arg.clone()))
        .collect::<Vec<_>>()
        .join(" ")
}
