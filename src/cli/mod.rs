//! Command-line interface for docdeps.
//!
//! # Available Commands
//!
//! - `restore` - Check out a commit of a remote into a pooled slot
//! - `exec` - Run a command inside a restored slot
//! - `path` - Print the directory of a restored slot
//! - `list` - Show the slot registry of a remote
//!
//! # Basic Workflow
//!
//! ```bash
//! # Restore the head of main (or a pinned commit with --commit)
//! docdeps restore https://github.com/dotnet/docs --branch main
//!
//! # Build against it; the slot stays read-locked while the command runs
//! docdeps exec https://github.com/dotnet/docs --branch main -- make html
//!
//! # Inspect the pool
//! docdeps list https://github.com/dotnet/docs
//! ```
//!
//! # Global Options
//!
//! - `--verbose` - Debug logging
//! - `--quiet` - Errors only
//! - `--config` - Path to a config file instead of `~/.docdeps/config.toml`

mod common;
mod exec;
mod list;
mod path;
mod restore;

use crate::cache::GitSlotPool;
use crate::config::PoolConfig;
use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

pub use common::RemoteArgs;
pub use exec::ExecCommand;
pub use list::{ListCommand, OutputFormat};
pub use path::PathCommand;
pub use restore::RestoreCommand;

/// Runtime settings derived from the global flags.
///
/// Kept apart from [`Cli`] so tests can build one without parsing
/// arguments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CliConfig {
    /// Log filter to install; `None` defers to `RUST_LOG`, then `info`.
    pub log_level: Option<String>,

    /// Config file to load instead of the default location.
    pub config_path: Option<PathBuf>,
}

impl CliConfig {
    /// Install the global `tracing` subscriber, writing to stderr.
    ///
    /// Does nothing if a subscriber is already installed.
    pub fn init_logging(&self) {
        let filter = match &self.log_level {
            Some(level) => EnvFilter::new(level),
            None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .try_init();
    }

    /// Load the pool configuration and open the pool it describes.
    pub async fn open_pool(&self) -> Result<GitSlotPool> {
        let config = PoolConfig::load_with_optional(self.config_path.clone()).await?;
        let pool = GitSlotPool::from_config(&config)?;
        tracing::debug!(
            storage = %pool.pool().root().display(),
            lockdown_window_secs = config.lockdown_window_secs,
            "Opened slot pool"
        );
        Ok(pool)
    }
}

/// Pooled checkouts of documentation dependencies.
#[derive(Parser, Debug)]
#[command(name = "docdeps", version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug logging (same as RUST_LOG=debug)
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Path to the config file (default ~/.docdeps/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Check out a commit of a remote into a pooled slot
    Restore(RestoreCommand),

    /// Run a command inside a restored slot
    Exec(ExecCommand),

    /// Print the directory of a restored slot
    Path(PathCommand),

    /// Show the slots recorded for a remote
    List(ListCommand),
}

impl Cli {
    /// Run the selected command and return the process exit code.
    pub async fn execute(self) -> Result<i32> {
        let config = self.build_config();
        config.init_logging();
        self.execute_with_config(config).await
    }

    /// Settings implied by the global flags.
    #[must_use]
    pub fn build_config(&self) -> CliConfig {
        let log_level = if self.verbose {
            Some("debug".to_string())
        } else if self.quiet {
            Some("error".to_string())
        } else {
            None
        };

        CliConfig {
            log_level,
            config_path: self.config.clone(),
        }
    }

    /// Run the selected command with explicit settings.
    pub async fn execute_with_config(self, config: CliConfig) -> Result<i32> {
        let pool = config.open_pool().await?;

        match self.command {
            Commands::Restore(cmd) => cmd.execute(&pool).await.map(|()| 0),
            Commands::Exec(cmd) => cmd.execute(&pool).await,
            Commands::Path(cmd) => cmd.execute(&pool).await.map(|()| 0),
            Commands::List(cmd) => cmd.execute(&pool).await.map(|()| 0),
        }
    }
}
