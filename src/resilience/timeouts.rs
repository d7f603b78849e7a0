//! Timeout enforcement.
//!
//! Every external call (RPC, broker) gets a deadline; timeouts are reported as a
//! distinct error so callers can classify them as transient.

use std::future::IntoFuture;
use std::time::Duration;

/// The wrapped operation did not finish in time.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{operation} timed out after {after:?}")]
pub struct Elapsed {
    pub operation: String,
    pub after: Duration,
}

/// Run `fut` with a deadline.
///
/// Accepts lazy request builders (anything `IntoFuture`) as well as plain futures.
pub async fn with_timeout<F, T>(duration: Duration, operation: &str, fut: F) -> Result<T, Elapsed>
where
    F: IntoFuture<Output = T>,
{
    tokio::time::timeout(duration, fut.into_future()).await.map_err(|_| Elapsed {
        operation: operation.to_string(),
        after: duration,
    })
}
