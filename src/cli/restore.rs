//! `docdeps restore`: populate a slot with a commit of a remote.

use crate::cache::{GitSlotPool, LeaseError};
use crate::cli::common::{RemoteArgs, short_commit};
use crate::git::{checkout_into, resolve_branch_head};
use anyhow::Result;
use clap::Args;
use colored::Colorize;
use std::time::Duration;
use tracing::{info, warn};

/// Check out a commit of a remote into a pooled slot.
///
/// Without `--commit` the current head of the branch is restored.
#[derive(Args, Debug)]
pub struct RestoreCommand {
    #[command(flatten)]
    pub remote: RemoteArgs,

    /// Seconds to keep retrying while every slot is busy
    #[arg(long, value_name = "SECS")]
    pub retry_timeout: Option<u64>,
}

impl RestoreCommand {
    pub async fn execute(self, pool: &GitSlotPool) -> Result<()> {
        let RemoteArgs {
            url,
            branch,
            commit,
        } = self.remote;

        let commit = match commit {
            Some(commit) => commit,
            None => {
                let head = resolve_branch_head(&url, &branch).await?;
                info!("Resolved {branch} to {}", short_commit(&head));
                head
            }
        };

        let timeout =
            self.retry_timeout.map_or_else(|| pool.restore_retry_timeout(), Duration::from_secs);
        let lease = pool.acquire_for_restore_with_retry(&url, &branch, &commit, timeout).await?;
        if let Some(previous) = lease.previous_version() {
            info!("Reusing slot {} (was {previous})", lease.slot_id());
        } else {
            info!("Using new slot {}", lease.slot_id());
        }

        let slot_dir = lease.path().to_path_buf();
        let outcome = checkout_into(&slot_dir, &url, &branch, &commit).await;
        if let Err(e) = &outcome {
            warn!("Restore into slot {} failed: {e:#}", lease.slot_id());
        }
        let released = pool.release(lease, outcome.is_ok()).await;
        restore_result(outcome, released)?;

        println!(
            "{} {}@{} {}",
            "Restored".green().bold(),
            branch,
            short_commit(&commit),
            slot_dir.display()
        );
        Ok(())
    }
}

/// Combine the checkout outcome with the release result.
///
/// A checkout failure is reported over a release failure, which is only logged.
fn restore_result(outcome: Result<()>, released: Result<(), LeaseError>) -> Result<()> {
    match (outcome, released) {
        (Err(e), Err(release_error)) => {
            warn!("Releasing the slot also failed: {release_error:#}");
            Err(e)
        }
        (Err(e), Ok(())) => Err(e),
        (Ok(()), released) => Ok(released?),
    }
}
