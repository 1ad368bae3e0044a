//! Retry logic.
//!
//! # Responsibilities
//! - Re-run a fallible async operation with exponential backoff + jitter
//! - Let the caller decide which errors are worth retrying
//!
//! # Design Decisions
//! - Attempts are bounded; the last error is returned unchanged
//! - Non-retryable errors return immediately

use std::future::Future;

use crate::config::FundingRetryConfig;
use crate::resilience::backoff::backoff_delay;

/// Bounded retry policy.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl RetryPolicy {
    /// A policy that runs the operation exactly once.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            base_delay_ms: 0,
            max_delay_ms: 0,
        }
    }
}

impl From<&FundingRetryConfig> for RetryPolicy {
    fn from(config: &FundingRetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay_ms: config.base_delay_ms,
            max_delay_ms: config.max_delay_ms,
        }
    }
}

/// Run `op` until it succeeds, fails with a non-retryable error, or
/// `policy.max_attempts` is exhausted.
pub async fn retry_with_backoff<T, E, F, Fut, R>(
    policy: RetryPolicy,
    label: &str,
    is_retryable: R,
    mut op: F,
) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    R: Fn(&E) -> bool,
    E: std::fmt::Display,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < policy.max_attempts && is_retryable(&e) => {
                let delay = backoff_delay(&policy, attempt);
                tracing::info!(op = label, attempt, delay = ?delay, error = %e, "Retrying");
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}
