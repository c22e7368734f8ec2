//! Configuration management for docdeps
//!
//! docdeps reads a single optional, user-wide TOML file with pool settings.
//! There is no project-level configuration: the remote, branch and commit
//! of a checkout are always passed by the caller.
//!
//! # Configuration File
//!
//! **Location:**
//! - Unix/macOS: `~/.docdeps/config.toml`
//! - Windows: `%LOCALAPPDATA%\docdeps\config.toml`
//! - Any path via `docdeps --config <path>`
//!
//! ```toml
//! # Where slots and registries live (default ~/.docdeps/cache)
//! storage_dir = "~/work/docdeps-cache"
//!
//! # Idle seconds before a slot may be taken over by another restore
//! lockdown_window_secs = 600
//!
//! # Seconds to wait for another process's registry update
//! index_lock_timeout_secs = 30
//!
//! # Seconds `docdeps restore` keeps retrying while every slot is busy
//! restore_retry_timeout_secs = 120
//! ```
//!
//! # Priority
//!
//! 1. `DOCDEPS_CACHE_DIR` environment variable (storage root only)
//! 2. Config file
//! 3. Defaults

mod global;

pub use global::PoolConfig;

use crate::constants::CACHE_DIR_ENV;
use anyhow::Result;
use std::path::PathBuf;

/// Default storage root: `DOCDEPS_CACHE_DIR` if set, else `~/.docdeps/cache`
/// (`%LOCALAPPDATA%\docdeps\cache` on Windows).
///
/// The directory is not created here; the pool creates what it needs.
pub fn get_cache_dir() -> Result<PathBuf> {
    if let Some(dir) = std::env::var_os(CACHE_DIR_ENV) {
        return Ok(PathBuf::from(dir));
    }

    let cache_dir = if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .ok_or_else(|| anyhow::anyhow!("Unable to determine local data directory"))?
            .join("docdeps")
            .join("cache")
    } else {
        dirs::home_dir()
            .ok_or_else(|| anyhow::anyhow!("Unable to determine home directory"))?
            .join(".docdeps")
            .join("cache")
    };

    Ok(cache_dir)
}
