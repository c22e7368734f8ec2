//! Global constants used throughout the docdeps codebase.
//!
//! Timeouts, retry parameters and on-disk names shared by the slot pool,
//! the git integration and the CLI live here so that magic numbers stay
//! discoverable.

use std::time::Duration;

/// Default lockdown window (10 minutes).
///
/// A slot whose last access is older than this becomes a candidate for
/// reclamation by the next exclusive request. Reclamation still requires the
/// slot's OS lock to be free.
pub const DEFAULT_LOCKDOWN_WINDOW: Duration = Duration::from_secs(600);

/// Default timeout for acquiring the per-remote index mutex (30 seconds).
pub const DEFAULT_INDEX_LOCK_TIMEOUT: Duration = Duration::from_secs(30);

/// Default time a restore keeps retrying while the pool is busy (120 seconds).
pub const DEFAULT_RESTORE_RETRY_TIMEOUT: Duration = Duration::from_secs(120);

/// Maximum backoff delay for exponential backoff (500ms).
pub const MAX_BACKOFF_DELAY_MS: u64 = 500;

/// Starting delay for exponential backoff (10ms).
///
/// Doubles on each retry attempt until [`MAX_BACKOFF_DELAY_MS`].
pub const STARTING_BACKOFF_DELAY_MS: u64 = 10;

/// Timeout for Git fetch operations (5 minutes).
///
/// Documentation repositories can be large; the first fetch into an empty
/// slot downloads the full branch history.
pub const GIT_FETCH_TIMEOUT: Duration = Duration::from_secs(300);

/// Timeout for short Git commands such as `ls-remote` and `rev-parse` (60 seconds).
pub const GIT_QUERY_TIMEOUT: Duration = Duration::from_secs(60);

/// File name of the slot registry inside a remote's storage directory.
pub const INDEX_FILE_NAME: &str = "index.json";

/// Directory under the storage root that holds all lock files.
pub const LOCKS_DIR_NAME: &str = ".locks";

/// Environment variable overriding the storage directory.
pub const CACHE_DIR_ENV: &str = "DOCDEPS_CACHE_DIR";

/// Environment variable exposing the leased slot directory to `docdeps exec` children.
pub const SLOT_DIR_ENV: &str = "DOCDEPS_SLOT_DIR";
