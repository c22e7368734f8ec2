//! Pool of reusable on-disk checkouts shared between processes.
//!
//! Restoring documentation dependencies means cloning and checking out remote
//! repositories; building means reading those checkouts. Several restores and
//! builds may run at once on the same machine, in separate processes, against
//! the same remotes. This module lets them share a bounded set of checkout
//! directories ("slots") per remote without ever letting a build read a
//! half-written checkout.
//!
//! # Architecture Overview
//!
//! - [`LockTable`]: named, non-blocking OS advisory locks with explicit
//!   [`HolderToken`]s
//! - [`RegistryStore`]: the per-remote `index.json`, read and rewritten only
//!   under the remote's administrative lock
//! - [`SlotPool`]: the exclusive/shared acquisition protocol, generic over the
//!   version stamped on a slot
//! - [`GitSlotPool`]: the pool specialized to `(branch, commit)` versions
//!
//! Stale exclusive leases are not tracked by any background process. A slot
//! whose `lastAccessDate` is older than the lockdown window becomes a
//! candidate for the next restore, which takes it over only if the OS lock
//! is free, i.e. the previous holder has exited.
//!
//! # Storage Layout
//!
//! ```text
//! ~/.docdeps/cache/
//! ├── .locks/
//! │   └── dotnet_docs_1a2b3c4d/
//! │       ├── index.lock          # administrative mutex
//! │       ├── 1.lock              # slot locks
//! │       └── 2.lock
//! └── dotnet_docs_1a2b3c4d/
//!     ├── index.json              # slot registry
//!     ├── 1/                      # slot directories
//!     └── 2/
//! ```
//!
//! The storage root defaults to `~/.docdeps/cache` and can be moved with the
//! `DOCDEPS_CACHE_DIR` environment variable or the `storage_dir` config key.
//!
//! # Registry Format
//!
//! ```json
//! [
//!   {
//!     "id": 1,
//!     "url": "https://github.com/dotnet/docs",
//!     "branch": "main",
//!     "commit": "4f1c2e0d...",
//!     "lastAccessDate": "2024-05-01T12:00:00Z",
//!     "restored": true,
//!     "restoredDate": "2024-05-01T12:00:00Z"
//!   }
//! ]
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use docdeps::cache::GitSlotPool;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let pool = GitSlotPool::new("/tmp/docdeps-cache");
//! let url = "https://github.com/dotnet/docs";
//!
//! // Restore: exclusive lease, populate, publish
//! let lease = pool.acquire_for_restore(url, "main", "abc123").await?;
//! docdeps::git::checkout_into(lease.path(), url, "main", "abc123").await?;
//! pool.release(lease, true).await?;
//!
//! // Build: shared lease on the restored checkout
//! let lease = pool.acquire_for_build(url, "main", Some("abc123")).await?;
//! let docs_root = lease.path().to_path_buf();
//! # let _ = docs_root;
//! pool.release(lease, true).await?;
//! # Ok(())
//! # }
//! ```

pub mod git_pool;
pub mod identity;
pub mod lock;
pub mod pool;
pub mod registry;

pub use git_pool::{GitLease, GitSlotPool, GitVersion};
pub use identity::RemoteIdentity;
pub use lock::{HolderToken, LockMode, LockTable};
pub use pool::{LeaseError, SlotLease, SlotPool, is_reclaimable};
pub use registry::{RegistryStore, SlotRecord, SlotRegistry, SlotVersion};
