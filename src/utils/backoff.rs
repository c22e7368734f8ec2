//! Exponential backoff for lock retry loops.

use crate::constants::{MAX_BACKOFF_DELAY_MS, STARTING_BACKOFF_DELAY_MS};
use std::time::Duration;
use tokio_retry::strategy::ExponentialBackoff;

/// Infinite sequence of retry delays: 10ms, 20ms, 40ms... capped at 500ms.
///
/// Callers bound the loop with their own deadline.
pub fn retry_delays() -> ExponentialBackoff {
    ExponentialBackoff::from_millis(2)
        .factor(STARTING_BACKOFF_DELAY_MS / 2)
        .max_delay(Duration::from_millis(MAX_BACKOFF_DELAY_MS))
}
