//! Cross-platform utilities
//!
//! - [`backoff`] - retry delays for lock loops
//! - [`fs`] - atomic writes and directory creation
//! - [`platform`] - home directory, git executable and path expansion

pub mod backoff;
pub mod fs;
pub mod platform;

pub use backoff::retry_delays;
pub use fs::{atomic_write, ensure_dir};
pub use platform::{command_exists, get_git_command, get_home_dir, is_windows, resolve_path};
