//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Call to RPC endpoint or broker:
//!     → timeouts.rs (every external call has a deadline)
//!     → On failure: retries.rs (caller classifies retryable vs permanent)
//!     → backoff.rs (linear for chain writes, fixed for event publishing)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every external call has a deadline
//! - Retry budgets are small and local; message-level retries live in the consumer
//! - No jitter; there is a single sequential worker

pub mod backoff;
pub mod retries;
pub mod timeouts;

pub use backoff::Backoff;
pub use retries::{retry_async, RetryError, RetryPolicy};
pub use timeouts::{with_timeout, Elapsed};
