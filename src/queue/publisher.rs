//! Outbound event publishing with bounded retry.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use crate::queue::broker::{Broker, QueueError};
use crate::resilience::{retry_async, Backoff, RetryPolicy};

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("failed to publish to {queue} after {attempts} attempts: {last_error}")]
    Exhausted {
        queue: String,
        attempts: u32,
        last_error: QueueError,
    },

    #[error("failed to serialize event: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Pushes serialized events onto one outbound queue.
#[derive(Clone)]
pub struct EventPublisher {
    broker: Arc<dyn Broker>,
    queue: String,
}

impl EventPublisher {
    pub fn new(broker: Arc<dyn Broker>, queue: impl Into<String>) -> Self {
        Self {
            broker,
            queue: queue.into(),
        }
    }

    pub fn queue(&self) -> &str {
        &self.queue
    }

    /// Serialize `event` once and push it, retrying broker failures with a fixed delay.
    pub async fn publish_with_retry<T: Serialize>(
        &self,
        event: &T,
        max_attempts: u32,
        backoff: Duration,
    ) -> Result<(), PublishError> {
        let payload = serde_json::to_string(event)?;
        let policy = RetryPolicy::new(max_attempts, Backoff::Fixed(backoff));

        retry_async(
            policy,
            "publish_event",
            |_| self.broker.enqueue(&self.queue, &payload),
            |_| true,
        )
        .await
        .map_err(|e| PublishError::Exhausted {
            queue: self.queue.clone(),
            attempts: e.attempts,
            last_error: e.last_error,
        })?;

        tracing::info!(queue = %self.queue, bytes = payload.len(), "Event published");
        Ok(())
    }
}

impl std::fmt::Debug for EventPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventPublisher").field("queue", &self.queue).finish()
    }
}
