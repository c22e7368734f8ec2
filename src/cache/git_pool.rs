//! Slot pool specialized for git checkouts.
//!
//! Slots are stamped with the branch and commit they hold. A restore always
//! produces a caller-known commit; a build asks either for an exact commit or
//! for the freshest restored checkout of a branch.

use crate::cache::identity::RemoteIdentity;
use crate::cache::pool::{LeaseError, SlotLease, SlotPool};
use crate::cache::registry::SlotRecord;
use crate::config::PoolConfig;
use crate::constants::DEFAULT_RESTORE_RETRY_TIMEOUT;
use crate::utils::retry_delays;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant};
use tracing::debug;

/// Branch and commit held by a git slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GitVersion {
    pub branch: String,
    pub commit: String,
}

impl GitVersion {
    pub fn new(branch: impl Into<String>, commit: impl Into<String>) -> Self {
        Self {
            branch: branch.into(),
            commit: commit.into(),
        }
    }
}

impl fmt::Display for GitVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.branch, self.commit)
    }
}

/// Lease on a git slot.
pub type GitLease = SlotLease<GitVersion>;

/// Git checkouts pooled per remote URL.
///
/// # Examples
///
/// ```rust,no_run
/// use docdeps::cache::GitSlotPool;
///
/// # async fn example() -> anyhow::Result<()> {
/// let pool = GitSlotPool::new("/tmp/docdeps-cache");
/// let url = "https://github.com/org/docs";
///
/// let lease = pool.acquire_for_restore(url, "main", "abc123").await?;
/// // fetch and check out abc123 into lease.path()...
/// pool.release(lease, true).await?;
///
/// let lease = pool.acquire_for_build(url, "main", Some("abc123")).await?;
/// println!("building from {}", lease.path().display());
/// pool.release(lease, true).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct GitSlotPool {
    pool: SlotPool<GitVersion>,
    restore_retry_timeout: Duration,
}

impl GitSlotPool {
    /// Pool with default settings rooted at `root`.
    pub fn new(root: impl Into<std::path::PathBuf>) -> Self {
        Self::with_pool(SlotPool::new(root))
    }

    /// Wrap an already configured generic pool.
    pub fn with_pool(pool: SlotPool<GitVersion>) -> Self {
        Self {
            pool,
            restore_retry_timeout: DEFAULT_RESTORE_RETRY_TIMEOUT,
        }
    }

    /// Pool built from the storage root and timings in `config`.
    pub fn from_config(config: &PoolConfig) -> Result<Self> {
        let pool = SlotPool::new(config.storage_root()?)
            .with_lockdown_window(config.lockdown_window())
            .with_index_lock_timeout(config.index_lock_timeout());
        Ok(Self {
            pool,
            restore_retry_timeout: config.restore_retry_timeout(),
        })
    }

    /// Generic pool underneath.
    #[must_use]
    pub const fn pool(&self) -> &SlotPool<GitVersion> {
        &self.pool
    }

    /// Default timeout for [`acquire_for_restore_with_retry`](Self::acquire_for_restore_with_retry).
    #[must_use]
    pub const fn restore_retry_timeout(&self) -> Duration {
        self.restore_retry_timeout
    }

    /// Exclusive lease for checking out `commit` of `branch`.
    ///
    /// The slot is stamped with the requested version right away and stays
    /// unrestored until released with `success = true`.
    /// [`GitLease::previous_version`] tells what the slot held before.
    ///
    /// # Errors
    ///
    /// [`LeaseError::PoolBusy`] if no slot can be locked right now.
    pub async fn acquire_for_restore(
        &self,
        url: &str,
        branch: &str,
        commit: &str,
    ) -> Result<GitLease, LeaseError> {
        let remote = RemoteIdentity::from_url(url)?;
        let version = GitVersion::new(branch, commit);
        self.pool.acquire_exclusive(&remote, move |_| version).await
    }

    /// Like [`acquire_for_restore`](Self::acquire_for_restore) but retries
    /// while the pool is busy, backing off from 10ms up to 500ms between
    /// attempts, until `timeout` has passed.
    pub async fn acquire_for_restore_with_retry(
        &self,
        url: &str,
        branch: &str,
        commit: &str,
        timeout: Duration,
    ) -> Result<GitLease, LeaseError> {
        let start = Instant::now();
        let mut delays = retry_delays();

        loop {
            match self.acquire_for_restore(url, branch, commit).await {
                Err(err) if err.is_transient() => {
                    let remaining = timeout.saturating_sub(start.elapsed());
                    let Some(delay) = delays.next() else {
                        return Err(err);
                    };
                    if remaining.is_zero() {
                        return Err(err);
                    }
                    debug!(url, branch, delay_ms = delay.as_millis(), "Pool busy, retrying restore");
                    tokio::time::sleep(delay.min(remaining)).await;
                }
                result => return result,
            }
        }
    }

    /// Shared lease on a restored checkout of `branch`.
    ///
    /// With a commit, only a slot holding exactly that commit qualifies.
    /// Without one, the most recently used restored slot of the branch is
    /// chosen.
    ///
    /// # Errors
    ///
    /// [`LeaseError::NeedsRestore`] when no restored slot matches.
    pub async fn acquire_for_build(
        &self,
        url: &str,
        branch: &str,
        commit: Option<&str>,
    ) -> Result<GitLease, LeaseError> {
        let remote = RemoteIdentity::from_url(url)?;
        let branch = branch.to_string();

        match commit {
            Some(commit) => {
                let wanted = GitVersion::new(branch, commit);
                self.pool
                    .acquire_shared(&remote, wanted.to_string(), move |v| *v == wanted)
                    .await
            }
            None => {
                let wanted = branch.clone();
                self.pool.acquire_shared(&remote, wanted, move |v| v.branch == branch).await
            }
        }
    }

    /// Return a lease; see [`SlotPool::release`].
    pub async fn release(&self, lease: GitLease, success: bool) -> Result<(), LeaseError> {
        self.pool.release(lease, success).await
    }

    /// Slots recorded for `url`.
    pub async fn slots(&self, url: &str) -> Result<Vec<SlotRecord<GitVersion>>> {
        let remote = RemoteIdentity::from_url(url)?;
        self.pool.slots(&remote).await
    }
}
