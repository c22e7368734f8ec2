//! Named OS-backed advisory locks with holder tokens.
//!
//! Every lock is an `fs4` advisory lock on a file under
//! `{storage_root}/.locks/`. A lock is held for as long as the open file
//! handle lives, so the OS frees it when the owning process exits, which is
//! what lets the slot pool recover from crashed restores.
//!
//! Acquisition never blocks: a contended lock reports `None` immediately.
//! Each successful acquisition returns a fresh [`HolderToken`], and release
//! requires the same token, key and mode.
//!
//! # Lock File Location
//!
//! ```text
//! {storage_root}/.locks/{key}.lock
//! ```
//!
//! Keys are `/`-separated, e.g. `owner_repo_1a2b3c4d/index` or
//! `owner_repo_1a2b3c4d/3`. Lock files are never deleted; removing a lock
//! file while another process has it open would let two holders lock
//! different inodes under the same name.

use crate::constants::LOCKS_DIR_NAME;
use anyhow::{Context, Result};
use dashmap::DashMap;
use fs4::fs_std::FileExt;
use std::fmt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Lock mode of an acquisition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockMode {
    /// Single holder; used to populate a slot.
    Exclusive,
    /// Many holders; used to read a restored slot.
    Shared,
}

impl fmt::Display for LockMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exclusive => write!(f, "exclusive"),
            Self::Shared => write!(f, "shared"),
        }
    }
}

/// Opaque identifier of one successful lock acquisition.
///
/// Formatted as `{pid}-{uuid}` so tokens written to the slot registry also
/// show which process held a slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HolderToken(String);

impl HolderToken {
    fn generate() -> Self {
        Self(format!("{}-{}", std::process::id(), uuid::Uuid::new_v4().simple()))
    }

    /// The token as persisted in the slot registry.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HolderToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug)]
struct HeldLock {
    key: String,
    mode: LockMode,
    file: File,
}

/// Table of the locks held by this process, keyed by holder token.
///
/// The table owns the file handles; dropping the table (or the process
/// exiting) releases every lock it holds.
///
/// # Examples
///
/// ```rust,no_run
/// use docdeps::cache::lock::LockTable;
///
/// # fn example() -> anyhow::Result<()> {
/// let locks = LockTable::new("/tmp/docdeps-cache");
/// if let Some(token) = locks.acquire_exclusive("owner_repo_1a2b3c4d/1")? {
///     // populate the slot...
///     locks.release_exclusive("owner_repo_1a2b3c4d/1", &token)?;
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct LockTable {
    locks_dir: PathBuf,
    held: DashMap<HolderToken, HeldLock>,
}

impl LockTable {
    /// Create a lock table rooted at `storage_root`.
    pub fn new(storage_root: impl AsRef<Path>) -> Self {
        Self {
            locks_dir: storage_root.as_ref().join(LOCKS_DIR_NAME),
            held: DashMap::new(),
        }
    }

    /// Try to take an exclusive lock on `key` without waiting.
    ///
    /// Returns `Ok(None)` if any other holder, shared or exclusive, has the key.
    pub fn acquire_exclusive(&self, key: &str) -> Result<Option<HolderToken>> {
        self.try_acquire(key, LockMode::Exclusive)
    }

    /// Try to take a shared lock on `key` without waiting.
    ///
    /// Returns `Ok(None)` only while an exclusive holder has the key.
    pub fn acquire_shared(&self, key: &str) -> Result<Option<HolderToken>> {
        self.try_acquire(key, LockMode::Shared)
    }

    /// Release an exclusive lock. Returns `false` if `token` does not hold `key` exclusively.
    pub fn release_exclusive(&self, key: &str, token: &HolderToken) -> Result<bool> {
        self.release(key, token, LockMode::Exclusive)
    }

    /// Release a shared lock. Returns `false` if `token` does not hold `key` shared.
    pub fn release_shared(&self, key: &str, token: &HolderToken) -> Result<bool> {
        self.release(key, token, LockMode::Shared)
    }

    /// Whether any holder, in any process, has `key` exclusively.
    ///
    /// Probes with a shared lock on a fresh handle and drops it immediately.
    pub fn is_exclusively_held(&self, key: &str) -> Result<bool> {
        let path = self.lock_path(key)?;
        let file = match OpenOptions::new().read(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to open lock file: {}", path.display()));
            }
        };

        let acquired = FileExt::try_lock_shared(&file)
            .with_context(|| format!("Failed to probe lock: {}", path.display()))?;
        if acquired {
            FileExt::unlock(&file)
                .with_context(|| format!("Failed to unlock probe: {}", path.display()))?;
        }
        Ok(!acquired)
    }

    /// Number of locks this table currently holds.
    #[must_use]
    pub fn held_count(&self) -> usize {
        self.held.len()
    }

    fn try_acquire(&self, key: &str, mode: LockMode) -> Result<Option<HolderToken>> {
        let path = self.lock_path(key)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create locks directory: {}", parent.display())
            })?;
        }

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&path)
            .with_context(|| format!("Failed to open lock file: {}", path.display()))?;

        // Fully qualified: std's inherent File locking methods shadow the fs4 trait.
        let acquired = match mode {
            LockMode::Exclusive => FileExt::try_lock_exclusive(&file),
            LockMode::Shared => FileExt::try_lock_shared(&file),
        }
        .with_context(|| format!("Failed to lock {}: {key}", mode))?;

        if !acquired {
            debug!(lock_key = %key, %mode, "Lock is held elsewhere");
            return Ok(None);
        }

        let token = HolderToken::generate();
        debug!(lock_key = %key, %mode, holder = %token, "Lock acquired");
        self.held.insert(
            token.clone(),
            HeldLock {
                key: key.to_string(),
                mode,
                file,
            },
        );
        Ok(Some(token))
    }

    fn release(&self, key: &str, token: &HolderToken, mode: LockMode) -> Result<bool> {
        let Some((_, held)) =
            self.held.remove_if(token, |_, held| held.key == key && held.mode == mode)
        else {
            warn!(lock_key = %key, %mode, holder = %token, "Release by a non-holder ignored");
            return Ok(false);
        };

        FileExt::unlock(&held.file).with_context(|| format!("Failed to unlock: {key}"))?;
        debug!(lock_key = %key, %mode, holder = %token, "Lock released");
        Ok(true)
    }

    fn lock_path(&self, key: &str) -> Result<PathBuf> {
        validate_key(key)?;
        Ok(self.locks_dir.join(format!("{key}.lock")))
    }
}

fn validate_key(key: &str) -> Result<()> {
    let valid = !key.is_empty()
        && key.split('/').all(|segment| {
            !segment.is_empty()
                && segment != "."
                && segment != ".."
                && !segment.contains('\\')
                && !segment.contains(':')
        });
    if valid {
        Ok(())
    } else {
        Err(anyhow::anyhow!("Invalid lock key: '{key}'"))
    }
}
