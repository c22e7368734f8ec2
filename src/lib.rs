//! docdeps - pooled checkouts of documentation dependencies
//!
//! Documentation builds pull content from other git repositories. Restoring
//! that content is slow, and on a build machine several restores and builds
//! run concurrently in separate processes. docdeps keeps a pool of reusable
//! checkout directories ("slots") per remote and coordinates access to them
//! with OS file locks and a small JSON registry, so that:
//!
//! - a restore gets a slot of its own to populate (exclusive lease)
//! - any number of builds can read a finished checkout (shared lease)
//! - a build never sees a checkout that is still being written
//! - a crashed restore never wedges the pool
//!
//! # Core Modules
//!
//! - [`cache`] - slot pool, registry store and lock table
//! - [`git`] - system `git` wrapper used to populate slots
//! - [`config`] - user config file (`~/.docdeps/config.toml`)
//! - [`cli`] - `restore`, `exec`, `path` and `list` commands
//! - [`core`] - error types and user-facing error rendering
//! - [`utils`] - atomic writes, backoff and platform helpers
//!
//! # Example
//!
//! ```rust,no_run
//! use docdeps::cache::{GitSlotPool, LeaseError};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let pool = GitSlotPool::new("/tmp/docdeps-cache");
//! let url = "https://github.com/dotnet/docs";
//!
//! match pool.acquire_for_build(url, "main", Some("abc123")).await {
//!     Ok(lease) => {
//!         println!("content at {}", lease.path().display());
//!         pool.release(lease, true).await?;
//!     }
//!     Err(e) if e.needs_restore() => println!("run `docdeps restore` first"),
//!     Err(e) => return Err(e.into()),
//! }
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod cli;
pub mod config;
pub mod constants;
pub mod core;
pub mod git;
pub mod utils;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
