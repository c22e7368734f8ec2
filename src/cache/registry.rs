//! Slot registry records and the mutex-guarded store that persists them.
//!
//! Each remote has one `index.json` holding a JSON array of [`SlotRecord`]s.
//! [`RegistryStore::with_registry`] is the only code path that reads or
//! writes it: the read-modify-write runs while the remote's administrative
//! lock (`{remote}/index`) is held, and the file is replaced atomically.
//!
//! A missing or unparsable index is treated as an empty registry. A corrupt
//! index therefore heals itself on the next write, at the cost of forgetting
//! the slots it listed; their directories are reused as ids are handed out
//! again.

use crate::cache::identity::RemoteIdentity;
use crate::cache::lock::{HolderToken, LockTable};
use crate::constants::INDEX_FILE_NAME;
use crate::core::DocdepsError;
use crate::utils::{atomic_write, retry_delays};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt::Debug;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Version attached to a slot by a pool specialization.
///
/// The version's fields are flattened into the slot's JSON record, so a
/// specialization's fields sit next to `id` and `lastAccessDate`.
pub trait SlotVersion:
    Serialize + DeserializeOwned + Clone + Debug + PartialEq + Send + Sync + 'static
{
}

impl<T> SlotVersion for T where
    T: Serialize + DeserializeOwned + Clone + Debug + PartialEq + Send + Sync + 'static
{
}

/// One slot of a remote's pool as persisted in `index.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotRecord<V> {
    /// Slot id, unique within the remote; also the slot's directory name.
    pub id: u32,

    /// Remote URL with credentials stripped.
    pub url: String,

    /// Version the slot was last stamped with.
    #[serde(flatten)]
    pub version: V,

    /// Last successful acquisition or release. Never moves backwards.
    pub last_access_date: DateTime<Utc>,

    /// Content is complete and safe for shared readers.
    #[serde(default)]
    pub restored: bool,

    /// When the current content was published.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restored_date: Option<DateTime<Utc>>,

    /// Holder token of the exclusive lease currently populating the slot.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acquirer: Option<String>,
}

impl<V> SlotRecord<V> {
    /// A fresh, unrestored slot.
    pub fn new(id: u32, url: impl Into<String>, version: V, now: DateTime<Utc>) -> Self {
        Self {
            id,
            url: url.into(),
            version,
            last_access_date: now,
            restored: false,
            restored_date: None,
            acquirer: None,
        }
    }

    /// Advance `last_access_date` to `now` unless it is already later.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        if now > self.last_access_date {
            self.last_access_date = now;
        }
    }

    /// Whether `token` is the recorded exclusive holder.
    #[must_use]
    pub fn is_held_by(&self, token: &HolderToken) -> bool {
        self.acquirer.as_deref() == Some(token.as_str())
    }
}

/// Ordered list of slots for one remote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SlotRegistry<V> {
    slots: Vec<SlotRecord<V>>,
}

impl<V> Default for SlotRegistry<V> {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
        }
    }
}

impl<V> SlotRegistry<V> {
    /// All slots in registry order.
    #[must_use]
    pub fn slots(&self) -> &[SlotRecord<V>] {
        &self.slots
    }

    /// Consume the registry into its records.
    #[must_use]
    pub fn into_slots(self) -> Vec<SlotRecord<V>> {
        self.slots
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[must_use]
    pub fn get(&self, id: u32) -> Option<&SlotRecord<V>> {
        self.slots.iter().find(|slot| slot.id == id)
    }

    pub fn get_mut(&mut self, id: u32) -> Option<&mut SlotRecord<V>> {
        self.slots.iter_mut().find(|slot| slot.id == id)
    }

    /// Id for a new slot: one past the highest id in use, the first slot is 1.
    ///
    /// When the highest id is `u32::MAX` the smallest unused positive id is
    /// returned instead. `None` only when every id is taken.
    #[must_use]
    pub fn next_id(&self) -> Option<u32> {
        let Some(max) = self.slots.iter().map(|slot| slot.id).max() else {
            return Some(1);
        };
        max.checked_add(1).or_else(|| {
            let used: BTreeSet<u32> = self.slots.iter().map(|slot| slot.id).collect();
            (1..=u32::MAX).find(|id| !used.contains(id))
        })
    }

    /// Replace the record with the same id, or append it.
    pub fn upsert(&mut self, record: SlotRecord<V>) {
        match self.get_mut(record.id) {
            Some(existing) => *existing = record,
            None => self.slots.push(record),
        }
    }
}

impl<V> FromIterator<SlotRecord<V>> for SlotRegistry<V> {
    fn from_iter<I: IntoIterator<Item = SlotRecord<V>>>(iter: I) -> Self {
        Self {
            slots: iter.into_iter().collect(),
        }
    }
}

/// Reads and rewrites slot registries under each remote's administrative lock.
#[derive(Debug, Clone)]
pub struct RegistryStore {
    root: PathBuf,
    locks: Arc<LockTable>,
    lock_timeout: Duration,
}

/// Holds a remote's administrative lock; releases it on drop.
struct IndexGuard {
    locks: Arc<LockTable>,
    key: String,
    token: HolderToken,
}

impl Drop for IndexGuard {
    fn drop(&mut self) {
        if let Err(e) = self.locks.release_exclusive(&self.key, &self.token) {
            warn!(lock_key = %self.key, error = %e, "Failed to release index lock");
        }
    }
}

impl RegistryStore {
    /// Create a store for registries under `root`.
    ///
    /// `lock_timeout` bounds how long [`with_registry`](Self::with_registry)
    /// waits for another process to finish its registry update.
    pub fn new(root: impl Into<PathBuf>, locks: Arc<LockTable>, lock_timeout: Duration) -> Self {
        Self {
            root: root.into(),
            locks,
            lock_timeout,
        }
    }

    /// Path of `remote`'s `index.json`.
    #[must_use]
    pub fn index_path(&self, remote: &RemoteIdentity) -> PathBuf {
        self.root.join(remote.name()).join(INDEX_FILE_NAME)
    }

    /// Run `f` on `remote`'s registry while holding its administrative lock.
    ///
    /// The registry is loaded (missing or corrupt ⇒ empty), passed to `f`,
    /// and written back atomically if `f` succeeds and changed it. When `f`
    /// fails nothing is written. The lock is released on every path.
    ///
    /// # Errors
    ///
    /// - [`DocdepsError::LockTimeout`] if the lock is not free within the timeout
    /// - the error returned by `f`
    /// - I/O errors writing the index
    pub async fn with_registry<V, T, F>(&self, remote: &RemoteIdentity, f: F) -> Result<T>
    where
        V: SlotVersion,
        T: Send + 'static,
        F: FnOnce(&mut SlotRegistry<V>) -> Result<T> + Send + 'static,
    {
        let guard = self.lock_index(remote).await?;
        let path = self.index_path(remote);

        tokio::task::spawn_blocking(move || -> Result<T> {
            let _guard = guard;
            let (mut registry, original) = load_registry::<V>(&path);
            let value = f(&mut registry)?;

            let updated = serde_json::to_vec_pretty(&registry)
                .context("Failed to serialize slot registry")?;
            let changed = match &original {
                Some(bytes) => *bytes != updated,
                None => !registry.is_empty(),
            };
            if changed {
                atomic_write(&path, &updated)?;
                debug!(index = %path.display(), slots = registry.len(), "Slot registry written");
            }
            Ok(value)
        })
        .await
        .context("Slot registry task panicked")?
    }

    async fn lock_index(&self, remote: &RemoteIdentity) -> Result<IndexGuard> {
        let key = remote.index_lock_key();
        let start = Instant::now();

        for delay in retry_delays() {
            let locks = Arc::clone(&self.locks);
            let attempt_key = key.clone();
            let attempt = tokio::task::spawn_blocking(move || locks.acquire_exclusive(&attempt_key))
                .await
                .context("spawn_blocking panicked")??;

            if let Some(token) = attempt {
                debug!(lock_key = %key, wait_ms = start.elapsed().as_millis(), "Index lock acquired");
                return Ok(IndexGuard {
                    locks: Arc::clone(&self.locks),
                    key,
                    token,
                });
            }

            let remaining = self.lock_timeout.saturating_sub(start.elapsed());
            if remaining.is_zero() {
                break;
            }
            tokio::time::sleep(delay.min(remaining)).await;
        }

        Err(DocdepsError::LockTimeout {
            key,
            seconds: self.lock_timeout.as_secs(),
        }
        .into())
    }
}

/// Load a registry, returning it with the raw bytes it was parsed from.
fn load_registry<V: SlotVersion>(path: &Path) -> (SlotRegistry<V>, Option<Vec<u8>>) {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return (SlotRegistry::default(), None);
        }
        Err(err) => {
            warn!("Failed to read slot registry {}: {}", path.display(), err);
            return (SlotRegistry::default(), None);
        }
    };

    match serde_json::from_slice(&bytes) {
        Ok(registry) => (registry, Some(bytes)),
        Err(err) => {
            warn!("Slot registry {} is corrupted, starting empty: {}", path.display(), err);
            (SlotRegistry::default(), Some(bytes))
        }
    }
}
