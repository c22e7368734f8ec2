//! `docdeps exec`: run a command against a restored slot.

use crate::cache::GitSlotPool;
use crate::cli::common::RemoteArgs;
use crate::constants::SLOT_DIR_ENV;
use anyhow::{Context, Result};
use clap::Args;
use tokio::process::Command;
use tracing::debug;

/// Run a command inside a restored slot.
///
/// The slot is read-locked for the duration of the command, so no restore
/// can reuse it underneath. The command runs with the slot as its working
/// directory and `DOCDEPS_SLOT_DIR` set to it.
#[derive(Args, Debug)]
pub struct ExecCommand {
    #[command(flatten)]
    pub remote: RemoteArgs,

    /// Command and arguments, after `--`
    #[arg(last = true, required = true, value_name = "COMMAND")]
    pub command: Vec<String>,
}

impl ExecCommand {
    /// Returns the exit code of the command.
    pub async fn execute(self, pool: &GitSlotPool) -> Result<i32> {
        let (program, args) =
            self.command.split_first().ok_or_else(|| anyhow::anyhow!("No command given"))?;

        let lease = pool
            .acquire_for_build(&self.remote.url, &self.remote.branch, self.remote.commit.as_deref())
            .await?;
        debug!(
            "Running {program} in slot {} ({})",
            lease.slot_id(),
            lease.version()
        );

        let status = Command::new(program)
            .args(args)
            .current_dir(lease.path())
            .env(SLOT_DIR_ENV, lease.path())
            .status()
            .await;
        pool.release(lease, true).await?;

        let status = status.with_context(|| format!("Failed to run '{program}'"))?;
        Ok(status.code().unwrap_or(1))
    }
}
