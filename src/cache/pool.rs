//! Pool of reusable slot directories per remote.
//!
//! A slot is a numbered directory (`{root}/{remote}/{id}/`) plus its record
//! in the remote's registry. Restores populate a slot under an exclusive
//! lease; builds read a restored slot under a shared lease.
//!
//! # Protocol
//!
//! Every acquisition and release runs inside
//! [`RegistryStore::with_registry`], so the slot's OS lock and its registry
//! record change together under the remote's administrative lock:
//!
//! - **Exclusive**: take the oldest slot idle for longer than the lockdown
//!   window whose lock is free, else create slot `max(id) + 1`. The record is
//!   reset to unrestored and stamped with the new version before the lease is
//!   returned.
//! - **Shared**: take the freshest restored slot whose version matches and
//!   whose lock is not held exclusively.
//! - **Release**: publish (`restored = success`) and free the OS lock in the
//!   same registry update, so no reader sees a published slot that is still
//!   being written.
//!
//! A lease dropped without [`SlotPool::release`] frees only its OS lock. The
//! slot stays unrestored, exactly as if the process had crashed, and becomes
//! reclaimable once the lockdown window passes.

use crate::cache::identity::RemoteIdentity;
use crate::cache::lock::{HolderToken, LockMode, LockTable};
use crate::cache::registry::{RegistryStore, SlotRecord, SlotRegistry, SlotVersion};
use crate::constants::{DEFAULT_INDEX_LOCK_TIMEOUT, DEFAULT_LOCKDOWN_WINDOW};
use crate::utils::ensure_dir;
use anyhow::Result;
use chrono::{DateTime, Utc};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Why a slot could not be leased.
#[derive(Error, Debug)]
pub enum LeaseError {
    /// Every reclaimable slot is locked and a new slot could not be locked
    /// either. Retrying later is expected to succeed.
    #[error("All slots for '{remote}' are busy")]
    PoolBusy {
        /// Remote name
        remote: String,
    },

    /// No restored slot holds the requested version.
    #[error("No restored content for '{remote}' at {version}")]
    NeedsRestore {
        /// Remote name
        remote: String,
        /// Requested version, as displayed to the user
        version: String,
    },

    /// Registry or lock I/O failed.
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

impl LeaseError {
    /// Contention that a retry may resolve.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::PoolBusy { .. })
    }

    /// The caller has to run a restore first.
    #[must_use]
    pub const fn needs_restore(&self) -> bool {
        matches!(self, Self::NeedsRestore { .. })
    }
}

/// Whether a slot has been idle long enough to be taken over.
///
/// Only filters candidates: the slot's lock must still be free for the
/// takeover to succeed. Timestamps in the future are never reclaimable.
#[must_use]
pub fn is_reclaimable<V>(record: &SlotRecord<V>, now: DateTime<Utc>, window: Duration) -> bool {
    (now - record.last_access_date).to_std().is_ok_and(|idle| idle >= window)
}

/// An exclusive or shared grant on one slot.
///
/// Pass it back to [`SlotPool::release`] when done.
#[derive(Debug)]
pub struct SlotLease<V> {
    slot_id: u32,
    mode: LockMode,
    path: PathBuf,
    token: HolderToken,
    remote: RemoteIdentity,
    record: SlotRecord<V>,
    previous_version: Option<V>,
    locks: Arc<LockTable>,
    released: bool,
}

impl<V> SlotLease<V> {
    #[must_use]
    pub const fn slot_id(&self) -> u32 {
        self.slot_id
    }

    #[must_use]
    pub const fn mode(&self) -> LockMode {
        self.mode
    }

    /// Slot directory. Shared holders must treat it as read-only.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub const fn token(&self) -> &HolderToken {
        &self.token
    }

    #[must_use]
    pub const fn remote(&self) -> &RemoteIdentity {
        &self.remote
    }

    /// Slot record as of acquisition.
    #[must_use]
    pub const fn record(&self) -> &SlotRecord<V> {
        &self.record
    }

    /// Version stamped on the slot for this lease.
    #[must_use]
    pub const fn version(&self) -> &V {
        &self.record.version
    }

    /// For an exclusive lease on a reused slot, the version it held before.
    #[must_use]
    pub const fn previous_version(&self) -> Option<&V> {
        self.previous_version.as_ref()
    }

    fn release_lock(&mut self) -> Result<()> {
        if self.released {
            return Ok(());
        }
        self.released = true;
        let key = self.remote.slot_lock_key(self.slot_id);
        match self.mode {
            LockMode::Exclusive => self.locks.release_exclusive(&key, &self.token)?,
            LockMode::Shared => self.locks.release_shared(&key, &self.token)?,
        };
        Ok(())
    }
}

impl<V> Drop for SlotLease<V> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        warn!(
            remote = %self.remote,
            slot = self.slot_id,
            mode = %self.mode,
            "Lease dropped without release; slot lock freed, slot not published"
        );
        if let Err(e) = self.release_lock() {
            warn!(remote = %self.remote, slot = self.slot_id, error = %e, "Failed to free slot lock");
        }
    }
}

/// Slot pool over one storage root, generic over the slot version.
///
/// # Examples
///
/// ```rust,no_run
/// use docdeps::cache::{GitVersion, RemoteIdentity, SlotPool};
///
/// # async fn example() -> anyhow::Result<()> {
/// let pool = SlotPool::<GitVersion>::new("/tmp/docdeps-cache");
/// let remote = RemoteIdentity::from_url("https://github.com/org/docs")?;
/// let wanted = GitVersion::new("main", "abc123");
///
/// let stamp = wanted.clone();
/// let lease = pool.acquire_exclusive(&remote, move |_| stamp).await?;
/// // populate lease.path()...
/// pool.release(lease, true).await?;
///
/// let lease = pool.acquire_shared(&remote, "main@abc123", move |v| *v == wanted).await?;
/// pool.release(lease, true).await?;
/// # Ok(())
/// # }
/// ```
pub struct SlotPool<V> {
    root: PathBuf,
    locks: Arc<LockTable>,
    store: RegistryStore,
    lockdown_window: Duration,
    _version: PhantomData<fn() -> V>,
}

impl<V> Clone for SlotPool<V> {
    fn clone(&self) -> Self {
        Self {
            root: self.root.clone(),
            locks: Arc::clone(&self.locks),
            store: self.store.clone(),
            lockdown_window: self.lockdown_window,
            _version: PhantomData,
        }
    }
}

impl<V> std::fmt::Debug for SlotPool<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlotPool")
            .field("root", &self.root)
            .field("lockdown_window", &self.lockdown_window)
            .finish_non_exhaustive()
    }
}

impl<V: SlotVersion> SlotPool<V> {
    /// Pool rooted at `root` with the default lockdown window and index lock timeout.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let locks = Arc::new(LockTable::new(&root));
        let store = RegistryStore::new(&root, Arc::clone(&locks), DEFAULT_INDEX_LOCK_TIMEOUT);
        Self {
            root,
            locks,
            store,
            lockdown_window: DEFAULT_LOCKDOWN_WINDOW,
            _version: PhantomData,
        }
    }

    /// Idle time after which a slot may be taken over by a restore.
    #[must_use]
    pub const fn with_lockdown_window(mut self, window: Duration) -> Self {
        self.lockdown_window = window;
        self
    }

    /// How long to wait for another process's registry update.
    #[must_use]
    pub fn with_index_lock_timeout(mut self, timeout: Duration) -> Self {
        self.store = RegistryStore::new(&self.root, Arc::clone(&self.locks), timeout);
        self
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub const fn lockdown_window(&self) -> Duration {
        self.lockdown_window
    }

    /// Directory of slot `id` of `remote`.
    #[must_use]
    pub fn slot_dir(&self, remote: &RemoteIdentity, id: u32) -> PathBuf {
        slot_dir(&self.root, remote, id)
    }

    /// Lease a slot exclusively to populate it.
    ///
    /// `updater` receives the slot's previous version (`None` for a new slot)
    /// and returns the version to stamp. The slot is unrestored until
    /// released with `success = true`.
    ///
    /// # Errors
    ///
    /// - [`LeaseError::PoolBusy`] when no slot can be locked
    /// - [`LeaseError::Storage`] on registry or lock failures
    pub async fn acquire_exclusive<F>(
        &self,
        remote: &RemoteIdentity,
        updater: F,
    ) -> Result<SlotLease<V>, LeaseError>
    where
        F: FnOnce(Option<&V>) -> V + Send + 'static,
    {
        let root = self.root.clone();
        let locks = Arc::clone(&self.locks);
        let window = self.lockdown_window;
        let owned_remote = remote.clone();

        let lease = self
            .store
            .with_registry(remote, move |registry: &mut SlotRegistry<V>| {
                claim_exclusive(registry, &root, &locks, &owned_remote, window, updater)
            })
            .await?;

        let lease = lease.ok_or_else(|| LeaseError::PoolBusy {
            remote: remote.name().to_string(),
        })?;
        debug!(
            remote = %remote,
            slot = lease.slot_id,
            holder = %lease.token,
            "Exclusive slot lease acquired"
        );
        Ok(lease)
    }

    /// Lease a restored slot whose version satisfies `matcher` for reading.
    ///
    /// `wanted` describes the requested version in the error when nothing
    /// matches. Among matching slots the most recently accessed wins.
    ///
    /// # Errors
    ///
    /// - [`LeaseError::NeedsRestore`] when no restored, matching slot can be locked
    /// - [`LeaseError::Storage`] on registry or lock failures
    pub async fn acquire_shared<M>(
        &self,
        remote: &RemoteIdentity,
        wanted: impl Into<String>,
        matcher: M,
    ) -> Result<SlotLease<V>, LeaseError>
    where
        M: Fn(&V) -> bool + Send + 'static,
    {
        let wanted = wanted.into();
        let root = self.root.clone();
        let locks = Arc::clone(&self.locks);
        let owned_remote = remote.clone();

        let lease = self
            .store
            .with_registry(remote, move |registry: &mut SlotRegistry<V>| {
                claim_shared(registry, &root, &locks, &owned_remote, &matcher)
            })
            .await?;

        let lease = lease.ok_or_else(|| LeaseError::NeedsRestore {
            remote: remote.name().to_string(),
            version: wanted,
        })?;
        debug!(
            remote = %remote,
            slot = lease.slot_id,
            holder = %lease.token,
            "Shared slot lease acquired"
        );
        Ok(lease)
    }

    /// Return a lease to the pool.
    ///
    /// For an exclusive lease, `success` publishes the slot (`restored =
    /// true`); `false` leaves it unrestored and never served to readers. For
    /// a shared lease `success` is ignored.
    ///
    /// # Errors
    ///
    /// Returns [`LeaseError::Storage`] if the registry cannot be updated. The
    /// slot lock is freed regardless.
    pub async fn release(&self, lease: SlotLease<V>, success: bool) -> Result<(), LeaseError> {
        let remote = lease.remote.clone();
        let slot = lease.slot_id;
        let mode = lease.mode;

        self.store
            .with_registry(&remote, move |registry: &mut SlotRegistry<V>| {
                record_release(registry, lease, success)
            })
            .await?;

        debug!(remote = %remote, slot, %mode, success, "Slot lease released");
        Ok(())
    }

    /// Current registry of `remote`.
    pub async fn slots(&self, remote: &RemoteIdentity) -> Result<Vec<SlotRecord<V>>> {
        self.store
            .with_registry(remote, |registry: &mut SlotRegistry<V>| Ok(registry.slots().to_vec()))
            .await
    }
}

fn slot_dir(root: &Path, remote: &RemoteIdentity, id: u32) -> PathBuf {
    root.join(remote.name()).join(id.to_string())
}

fn claim_exclusive<V, F>(
    registry: &mut SlotRegistry<V>,
    root: &Path,
    locks: &Arc<LockTable>,
    remote: &RemoteIdentity,
    window: Duration,
    updater: F,
) -> Result<Option<SlotLease<V>>>
where
    V: SlotVersion,
    F: FnOnce(Option<&V>) -> V,
{
    let now = Utc::now();

    let mut candidates: Vec<(DateTime<Utc>, u32)> = registry
        .slots()
        .iter()
        .filter(|slot| is_reclaimable(slot, now, window))
        .map(|slot| (slot.last_access_date, slot.id))
        .collect();
    candidates.sort_unstable();

    let mut claimed = None;
    for (_, id) in candidates {
        if let Some(token) = locks.acquire_exclusive(&remote.slot_lock_key(id))? {
            claimed = Some((id, token));
            break;
        }
        debug!(remote = %remote, slot = id, "Reclaimable slot is still locked");
    }

    let (id, token) = match claimed {
        Some(claim) => claim,
        None => {
            let Some(id) = registry.next_id() else {
                warn!(remote = %remote, "No free slot id left");
                return Ok(None);
            };
            match locks.acquire_exclusive(&remote.slot_lock_key(id))? {
                Some(token) => (id, token),
                None => return Ok(None),
            }
        }
    };

    let previous_version = registry.get(id).map(|slot| slot.version.clone());
    let version = updater(previous_version.as_ref());
    let record = match registry.get_mut(id) {
        Some(record) => {
            record.touch(now);
            record.version = version;
            record.restored = false;
            record.restored_date = None;
            record.acquirer = Some(token.as_str().to_string());
            record.clone()
        }
        None => {
            let mut record = SlotRecord::new(id, remote.url(), version, now);
            record.acquirer = Some(token.as_str().to_string());
            registry.upsert(record.clone());
            record
        }
    };

    // From here on the lease frees the lock if anything fails.
    let lease = SlotLease {
        slot_id: id,
        mode: LockMode::Exclusive,
        path: slot_dir(root, remote, id),
        token,
        remote: remote.clone(),
        record,
        previous_version,
        locks: Arc::clone(locks),
        released: false,
    };
    ensure_dir(&lease.path)?;
    Ok(Some(lease))
}

fn claim_shared<V, M>(
    registry: &mut SlotRegistry<V>,
    root: &Path,
    locks: &Arc<LockTable>,
    remote: &RemoteIdentity,
    matcher: &M,
) -> Result<Option<SlotLease<V>>>
where
    V: SlotVersion,
    M: Fn(&V) -> bool,
{
    let mut candidates: Vec<(DateTime<Utc>, u32)> = registry
        .slots()
        .iter()
        .filter(|slot| slot.restored && matcher(&slot.version))
        .map(|slot| (slot.last_access_date, slot.id))
        .collect();
    candidates.sort_unstable_by(|a, b| b.cmp(a));

    for (_, id) in candidates {
        let Some(record) = registry.get_mut(id) else {
            continue;
        };
        let Some(token) = locks.acquire_shared(&remote.slot_lock_key(id))? else {
            debug!(remote = %remote, slot = id, "Matching slot is locked exclusively");
            continue;
        };

        record.touch(Utc::now());
        return Ok(Some(SlotLease {
            slot_id: id,
            mode: LockMode::Shared,
            path: slot_dir(root, remote, id),
            token,
            remote: remote.clone(),
            record: record.clone(),
            previous_version: None,
            locks: Arc::clone(locks),
            released: false,
        }));
    }

    Ok(None)
}

fn record_release<V: SlotVersion>(
    registry: &mut SlotRegistry<V>,
    mut lease: SlotLease<V>,
    success: bool,
) -> Result<()> {
    let now = Utc::now();

    match (lease.mode, registry.get_mut(lease.slot_id)) {
        (LockMode::Exclusive, Some(record)) if record.is_held_by(&lease.token) => {
            record.touch(now);
            record.restored = success;
            record.restored_date = success.then_some(now);
            record.acquirer = None;
        }
        (LockMode::Exclusive, Some(record)) => {
            record.touch(now);
            warn!(
                remote = %lease.remote,
                slot = lease.slot_id,
                holder = %lease.token,
                recorded = ?record.acquirer,
                "Slot was taken over by another holder; not publishing"
            );
        }
        (LockMode::Exclusive, None) => {
            warn!(
                remote = %lease.remote,
                slot = lease.slot_id,
                "Slot missing from registry; re-recording it"
            );
            let mut record = lease.record.clone();
            record.touch(now);
            record.restored = success;
            record.restored_date = success.then_some(now);
            record.acquirer = None;
            registry.upsert(record);
        }
        (LockMode::Shared, Some(record)) => record.touch(now),
        (LockMode::Shared, None) => {}
    }

    lease.release_lock()
}
