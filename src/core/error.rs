//! Error handling for docdeps
//!
//! The error system follows two principles:
//! 1. **Strongly-typed errors** so callers can branch on what went wrong
//! 2. **User-friendly messages** with actionable suggestions for CLI users
//!
//! # Architecture
//!
//! - [`DocdepsError`] - application-level failures (git, configuration, I/O)
//! - [`crate::cache::LeaseError`] - slot pool outcomes (busy, needs restore)
//! - [`ErrorContext`] - wraps an error with details and a suggestion
//!
//! Use [`user_friendly_error`] to turn any `anyhow::Error` into an
//! [`ErrorContext`] for display.
//!
//! # Examples
//!
//! ```rust,no_run
//! use docdeps::core::{DocdepsError, ErrorContext};
//!
//! let context = ErrorContext::new(DocdepsError::GitNotFound)
//!     .with_suggestion("Install git and make sure it is on PATH");
//! context.display();
//! ```

use crate::cache::LeaseError;
use colored::Colorize;
use std::fmt;
use thiserror::Error;

/// The main error type for docdeps operations outside the lease protocol.
#[derive(Error, Debug)]
pub enum DocdepsError {
    /// Git executable not found in PATH
    #[error("Git is not installed or not found in PATH")]
    GitNotFound,

    /// Git command failed
    #[error("Git operation failed: {operation}")]
    GitCommandError {
        /// The git subcommand that failed
        operation: String,
        /// Error output from git
        stderr: String,
    },

    /// Checking out a commit into a slot failed
    #[error("Failed to checkout '{reference}' into slot")]
    GitCheckoutFailed {
        /// Commit or ref that could not be checked out
        reference: String,
        /// Error output from git
        reason: String,
    },

    /// A branch could not be resolved on the remote
    #[error("Branch '{branch}' not found on {url}")]
    BranchNotFound {
        /// Remote URL (credentials stripped)
        url: String,
        /// Requested branch
        branch: String,
    },

    /// Configuration file could not be read or is invalid
    #[error("Configuration error: {message}")]
    ConfigError {
        /// Description of the problem
        message: String,
    },

    /// Remote URL is empty or otherwise unusable as a remote identity
    #[error("Invalid remote URL: {url}")]
    InvalidRemoteUrl {
        /// The offending URL
        url: String,
    },

    /// The administrative index mutex could not be taken in time
    #[error("Timed out after {seconds}s waiting for lock '{key}'")]
    LockTimeout {
        /// Lock key
        key: String,
        /// Timeout that elapsed
        seconds: u64,
    },

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Other error
    #[error("{message}")]
    Other {
        /// Generic error message
        message: String,
    },
}

impl Clone for DocdepsError {
    fn clone(&self) -> Self {
        match self {
            Self::GitNotFound => Self::GitNotFound,
            Self::GitCommandError {
                operation,
                stderr,
            } => Self::GitCommandError {
                operation: operation.clone(),
                stderr: stderr.clone(),
            },
            Self::GitCheckoutFailed {
                reference,
                reason,
            } => Self::GitCheckoutFailed {
                reference: reference.clone(),
                reason: reason.clone(),
            },
            Self::BranchNotFound {
                url,
                branch,
            } => Self::BranchNotFound {
                url: url.clone(),
                branch: branch.clone(),
            },
            Self::ConfigError {
                message,
            } => Self::ConfigError {
                message: message.clone(),
            },
            Self::InvalidRemoteUrl {
                url,
            } => Self::InvalidRemoteUrl {
                url: url.clone(),
            },
            Self::LockTimeout {
                key,
                seconds,
            } => Self::LockTimeout {
                key: key.clone(),
                seconds: *seconds,
            },
            // io::Error is not Clone
            Self::IoError(e) => Self::Other {
                message: format!("IO error: {e}"),
            },
            Self::Other {
                message,
            } => Self::Other {
                message: message.clone(),
            },
        }
    }
}

/// Error wrapper carrying optional details and a suggestion for the user.
#[derive(Debug)]
pub struct ErrorContext {
    /// The underlying error
    pub error: DocdepsError,
    /// What the user can do about it
    pub suggestion: Option<String>,
    /// Additional explanation
    pub details: Option<String>,
}

impl ErrorContext {
    /// Create a context with no suggestion or details.
    #[must_use]
    pub const fn new(error: DocdepsError) -> Self {
        Self {
            error,
            suggestion: None,
            details: None,
        }
    }

    /// Attach a suggestion.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Attach details.
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Print the error to stderr with colors.
    pub fn display(&self) {
        eprintln!("{}: {}", "error".red().bold(), self.error);

        if let Some(details) = &self.details {
            eprintln!("{}: {}", "details".yellow(), details);
        }

        if let Some(suggestion) = &self.suggestion {
            eprintln!("{}: {}", "suggestion".green(), suggestion);
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;

        if let Some(details) = &self.details {
            write!(f, "\nDetails: {details}")?;
        }

        if let Some(suggestion) = &self.suggestion {
            write!(f, "\nSuggestion: {suggestion}")?;
        }

        Ok(())
    }
}

impl std::error::Error for ErrorContext {}

/// Convert any error into an [`ErrorContext`] with a suggestion where one is known.
///
/// Lease outcomes are checked first since they are the errors users hit most
/// often: a busy pool is worth retrying, a missing restore needs a
/// `docdeps restore` run.
pub fn user_friendly_error(error: anyhow::Error) -> ErrorContext {
    if let Some(lease_error) = error.downcast_ref::<LeaseError>() {
        return match lease_error {
            LeaseError::PoolBusy {
                remote,
            } => ErrorContext::new(DocdepsError::Other {
                message: lease_error.to_string(),
            })
            .with_details(format!("Every slot of '{remote}' is locked by another process"))
            .with_suggestion("Retry once the other restore finishes"),
            LeaseError::NeedsRestore {
                version,
                ..
            } => ErrorContext::new(DocdepsError::Other {
                message: lease_error.to_string(),
            })
            .with_details(format!("No restored slot matches {version}"))
            .with_suggestion("Run `docdeps restore` for this remote and branch first"),
            LeaseError::Storage(inner) => match inner.downcast_ref::<DocdepsError>() {
                Some(docdeps_error) => create_error_context(docdeps_error.clone()),
                None => ErrorContext::new(DocdepsError::Other {
                    message: format!("{inner:#}"),
                }),
            },
        };
    }

    if let Some(docdeps_error) = error.downcast_ref::<DocdepsError>() {
        return create_error_context(docdeps_error.clone());
    }

    if let Some(io_error) = error.downcast_ref::<std::io::Error>()
        && io_error.kind() == std::io::ErrorKind::PermissionDenied
    {
        return ErrorContext::new(DocdepsError::Other {
            message: format!("{error:#}"),
        })
        .with_suggestion("Check ownership and permissions of the storage directory");
    }

    if let Some(toml_error) = error.downcast_ref::<toml::de::Error>() {
        return ErrorContext::new(DocdepsError::ConfigError {
            message: toml_error.to_string(),
        })
        .with_suggestion("Check the TOML syntax of your docdeps config file");
    }

    ErrorContext::new(DocdepsError::Other {
        message: format!("{error:#}"),
    })
}

fn create_error_context(error: DocdepsError) -> ErrorContext {
    match &error {
        DocdepsError::GitNotFound => ErrorContext::new(error)
            .with_suggestion("Install git from https://git-scm.com/ and make sure it is on PATH"),
        DocdepsError::GitCommandError {
            stderr,
            ..
        }
        | DocdepsError::GitCheckoutFailed {
            reason: stderr,
            ..
        } => {
            let details = stderr.trim().to_string();
            ErrorContext::new(error)
                .with_details(details)
                .with_suggestion("Check the remote URL, your network connection and credentials")
        }
        DocdepsError::BranchNotFound {
            ..
        } => ErrorContext::new(error)
            .with_suggestion("Check the branch name with `git ls-remote --heads <url>`"),
        DocdepsError::ConfigError {
            ..
        } => ErrorContext::new(error)
            .with_suggestion("Fix or remove the docdeps config file (default ~/.docdeps/config.toml)"),
        DocdepsError::LockTimeout {
            ..
        } => ErrorContext::new(error)
            .with_details("Another docdeps process is holding the registry lock")
            .with_suggestion("Wait for the other process to finish, then retry"),
        _ => ErrorContext::new(error),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_context_display_includes_details_and_suggestion() {
        let ctx = ErrorContext::new(DocdepsError::GitNotFound)
            .with_details("searched PATH")
            .with_suggestion("install git");
        let rendered = ctx.to_string();
        assert!(rendered.contains("Git is not installed"));
        assert!(rendered.contains("Details: searched PATH"));
        assert!(rendered.contains("Suggestion: install git"));
    }

    #[test]
    fn test_user_friendly_needs_restore() {
        let err = anyhow::Error::new(LeaseError::NeedsRestore {
            remote: "owner_repo_12345678".to_string(),
            version: "main@abc123".to_string(),
        });
        let ctx = user_friendly_error(err);
        assert!(ctx.suggestion.unwrap().contains("docdeps restore"));
        assert!(ctx.details.unwrap().contains("main@abc123"));
    }

    #[test]
    fn test_user_friendly_pool_busy() {
        let err = anyhow::Error::new(LeaseError::PoolBusy {
            remote: "owner_repo_12345678".to_string(),
        });
        let ctx = user_friendly_error(err);
        assert!(ctx.suggestion.unwrap().contains("Retry"));
    }

    #[test]
    fn test_user_friendly_docdeps_error() {
        let ctx = user_friendly_error(anyhow::Error::new(DocdepsError::LockTimeout {
            key: "remote/index".to_string(),
            seconds: 30,
        }));
        assert!(matches!(ctx.error, DocdepsError::LockTimeout { .. }));
        assert!(ctx.suggestion.is_some());
    }

    #[test]
    fn test_user_friendly_storage_error_unwraps_lock_timeout() {
        let inner = anyhow::Error::new(DocdepsError::LockTimeout {
            key: "remote/index".to_string(),
            seconds: 30,
        });
        let ctx = user_friendly_error(anyhow::Error::new(LeaseError::Storage(inner)));
        assert!(matches!(ctx.error, DocdepsError::LockTimeout { .. }));
    }

    #[test]
    fn test_user_friendly_plain_error_keeps_chain() {
        let err = anyhow::anyhow!("inner").context("outer");
        let ctx = user_friendly_error(err);
        assert_eq!(ctx.error.to_string(), "outer: inner");
    }

    #[test]
    fn test_clone_converts_io_error() {
        let err = DocdepsError::IoError(std::io::Error::other("boom"));
        assert!(matches!(err.clone(), DocdepsError::Other { .. }));
    }
}
