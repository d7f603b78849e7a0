//! Backoff schedules.

use std::time::Duration;

/// Delay before retry number `attempt` (1-based).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// Same delay between every attempt.
    Fixed(Duration),
    /// `base × attempt`: 1×, 2×, 3×, ...
    Linear(Duration),
}

impl Backoff {
    pub fn fixed_ms(ms: u64) -> Self {
        Backoff::Fixed(Duration::from_millis(ms))
    }

    pub fn linear_ms(base_ms: u64) -> Self {
        Backoff::Linear(Duration::from_millis(base_ms))
    }

    /// Delay to wait after the given failed attempt.
    pub fn delay(&self, attempt: u32) -> Duration {
        match *self {
            Backoff::Fixed(delay) => delay,
            Backoff::Linear(base) => calculate_linear_backoff(attempt, base),
        }
    }
}

/// Calculate a linearly increasing backoff delay.
pub fn calculate_linear_backoff(attempt: u32, base: Duration) -> Duration {
    if attempt == 0 {
        return Duration::ZERO;
    }
    base.saturating_mul(attempt)
}
