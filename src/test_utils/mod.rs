//! Test utilities for docdeps
//!
//! Available to unit tests and, through the `test-utils` feature, to the
//! integration tests.
//!
//! - [`init_test_logging`] - route `tracing` output to the test writer
//! - [`TestRepo`] - local git repository used as a remote

pub mod git_helper;

pub use git_helper::{TestRepo, git_available};

use std::sync::Once;
use tracing::Level;
use tracing_subscriber::EnvFilter;

static INIT_LOGGING: Once = Once::new();

/// Initialize logging for tests, once per process.
///
/// Uses `level` if given, else `RUST_LOG`; with neither, logging stays off.
///
/// ```bash
/// RUST_LOG=docdeps=debug cargo test
/// ```
pub fn init_test_logging(level: Option<Level>) {
    INIT_LOGGING.call_once(|| {
        let filter = if let Some(level) = level {
            EnvFilter::new(level.to_string())
        } else if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            return;
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .with_thread_ids(false)
            .try_init();
    });
}
