//! Platform-specific helpers: home directory, git executable, path expansion.

use anyhow::{Context, Result};
use std::path::PathBuf;

/// Returns true when compiled for Windows.
#[must_use]
pub const fn is_windows() -> bool {
    cfg!(windows)
}

/// Returns the name of the git executable for this platform.
#[must_use]
pub const fn get_git_command() -> &'static str {
    if is_windows() {
        "git.exe"
    } else {
        "git"
    }
}

/// Returns true when `cmd` can be found on PATH.
#[must_use]
pub fn command_exists(cmd: &str) -> bool {
    which::which(cmd).is_ok()
}

/// Returns the current user's home directory.
///
/// # Errors
///
/// Returns an error if the home directory cannot be determined.
pub fn get_home_dir() -> Result<PathBuf> {
    dirs::home_dir().ok_or_else(|| {
        anyhow::anyhow!(
            "Could not determine home directory.\n\n\
            Set the HOME environment variable (or USERPROFILE on Windows)"
        )
    })
}

/// Resolves a path with `~/` expansion and environment variable substitution.
///
/// - `~/docs` expands to the home directory
/// - `$VAR/path` and `${VAR}/path` expand environment variables
///
/// # Errors
///
/// Returns an error for `~user` forms or undefined environment variables.
///
/// # Examples
///
/// ```rust,no_run
/// use docdeps::utils::platform::resolve_path;
///
/// # fn example() -> anyhow::Result<()> {
/// let storage = resolve_path("~/.docdeps/cache")?;
/// # Ok(())
/// # }
/// ```
pub fn resolve_path(path: &str) -> Result<PathBuf> {
    let expanded = if let Some(stripped) = path.strip_prefix("~/") {
        get_home_dir()?.join(stripped)
    } else if path == "~" {
        get_home_dir()?
    } else if path.starts_with('~') {
        return Err(anyhow::anyhow!(
            "Invalid path: {path}\n\n\
            Tilde expansion only supports '~/' for the home directory"
        ));
    } else {
        PathBuf::from(path)
    };

    let path_str = expanded.to_string_lossy();
    let expanded_str = shellexpand::env(&path_str)
        .with_context(|| {
            format!(
                "Failed to expand environment variables in path: {path_str}\n\n\
                Check for undefined variables (use $VAR or ${{VAR}})"
            )
        })?
        .into_owned();

    Ok(PathBuf::from(expanded_str))
}
