//! Bounded retry with exponential backoff for gateway calls.

use std::time::Duration;

use crate::error::{Result, StashError};

/// Run `op`, retrying while it fails with a transient error.
///
/// Sleeps `base_delay * 2^n` between attempts. Non-transient errors
/// (authentication, parse, disk) are returned immediately.
pub fn with_backoff<T>(
    attempts: u32,
    base_delay: Duration,
    mut op: impl FnMut() -> Result<T>,
) -> Result<T> {
    debug_assert!(attempts > 0);
    let mut delay = base_delay;
    let mut last = None;

    for attempt in 1..=attempts {
        match op() {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && attempt < attempts => {
                tracing::warn!(
                    attempt,
                    attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Transient gateway error, retrying"
                );
                std::thread::sleep(delay);
                delay *= 2;
                last = Some(e);
            }
            Err(e) => return Err(e),
        }
    }

    // Unreachable while attempts > 0; kept for totality.
    Err(last.unwrap_or_else(|| StashError::Connection("retry exhausted".into())))
}
