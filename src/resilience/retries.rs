//! Retry logic.
//!
//! # Responsibilities
//! - Re-run a fallible async operation up to a bounded number of attempts
//! - Sleep according to a backoff schedule between attempts
//! - Stop immediately on errors the caller classifies as permanent
//!
//! # Design Decisions
//! - The caller owns classification; this module knows nothing about RPC or brokers
//! - The last error is always returned so the reason survives into dead-letter entries

use std::fmt::Display;
use std::future::Future;

use crate::resilience::backoff::Backoff;

/// Attempt budget plus the delay schedule between attempts.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Backoff,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Backoff) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }
}

/// Outcome of an exhausted or aborted retry loop.
#[derive(Debug)]
pub struct RetryError<E> {
    /// Attempts actually made.
    pub attempts: u32,
    /// Error from the final attempt.
    pub last_error: E,
    /// False when the loop stopped early on a permanent error.
    pub exhausted: bool,
}

/// Run `op` until it succeeds, fails permanently, or the budget runs out.
///
/// `op` receives the 1-based attempt number.
pub async fn retry_async<T, E, Op, Fut, R>(
    policy: RetryPolicy,
    operation: &str,
    mut op: Op,
    is_retryable: R,
) -> Result<T, RetryError<E>>
where
    Op: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    R: Fn(&E) -> bool,
    E: Display,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        match op(attempt).await {
            Ok(value) => {
                if attempt > 1 {
                    tracing::info!(operation, attempt, "Succeeded after retry");
                }
                return Ok(value);
            }
            Err(e) => {
                if !is_retryable(&e) {
                    tracing::warn!(operation, attempt, error = %e, "Permanent failure, not retrying");
                    return Err(RetryError { attempts: attempt, last_error: e, exhausted: false });
                }
                if attempt >= policy.max_attempts {
                    tracing::error!(operation, attempts = attempt, error = %e, "Retry budget exhausted");
                    return Err(RetryError { attempts: attempt, last_error: e, exhausted: true });
                }

                let delay = policy.backoff.delay(attempt);
                tracing::warn!(operation, attempt, delay = ?delay, error = %e, "Attempt failed, retrying");
                tokio::time::sleep(delay).await;
            }
        }
    }
}
