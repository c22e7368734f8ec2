//! `docdeps path`: print the directory of a restored slot.

use crate::cache::GitSlotPool;
use crate::cli::common::RemoteArgs;
use anyhow::Result;
use clap::Args;

/// Print the directory of a restored slot.
///
/// The lease is released before printing, so the directory may be reused by
/// a later restore; use `docdeps exec` to keep it locked while reading.
#[derive(Args, Debug)]
pub struct PathCommand {
    #[command(flatten)]
    pub remote: RemoteArgs,
}

impl PathCommand {
    pub async fn execute(self, pool: &GitSlotPool) -> Result<()> {
        let lease = pool
            .acquire_for_build(&self.remote.url, &self.remote.branch, self.remote.commit.as_deref())
            .await?;
        let dir = lease.path().to_path_buf();
        pool.release(lease, true).await?;

        println!("{}", dir.display());
        Ok(())
    }
}
