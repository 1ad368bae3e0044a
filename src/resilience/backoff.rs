//! Backoff between funding retries.

use rand::Rng;
use std::time::Duration;

use crate::resilience::RetryPolicy;

/// Delay before retry number `attempt` (1-based) under `policy`.
///
/// Doubles from `base_delay_ms` up to `max_delay_ms`, then adds up to 10%
/// jitter.
pub fn backoff_delay(policy: &RetryPolicy, attempt: u32) -> Duration {
    if attempt == 0 {
        return Duration::ZERO;
    }

    let factor = 1u64.checked_shl(attempt - 1).unwrap_or(u64::MAX);
    let capped = policy
        .base_delay_ms
        .saturating_mul(factor)
        .min(policy.max_delay_ms);

    let jitter = match capped / 10 {
        0 => 0,
        range => rand::thread_rng().gen_range(0..range),
    };
    Duration::from_millis(capped + jitter)
}
