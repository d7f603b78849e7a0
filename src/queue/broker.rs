//! Broker abstraction over list-backed queues.
//!
//! # List orientation
//! ```text
//!   enqueue ──▶ [newest ... oldest] ──▶ dequeue_into / pop_oldest
//!                                  ◀── requeue_front
//! ```
//! Producers append at the newest end; the consumer takes from the oldest end.
//! `requeue_front` puts an entry where it will be taken next.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::QueueNames;
use crate::resilience::Elapsed;

/// Errors from broker operations.
#[derive(Debug, Error)]
pub enum QueueError {
    /// Broker unreachable or refused the command.
    #[error("broker error: {0}")]
    Broker(String),

    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("broker call timed out: {0}")]
    Timeout(#[from] Elapsed),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for queue operations.
pub type QueueResult<T> = Result<T, QueueError>;

/// A list-like message broker.
#[async_trait]
pub trait Broker: Send + Sync {
    /// Round-trip check of the connection.
    async fn ping(&self) -> QueueResult<()>;

    /// Atomically move the oldest entry of `source` onto `destination`,
    /// waiting up to `timeout` for one to appear.
    ///
    /// The entry is never visible in neither or both lists.
    async fn dequeue_into(
        &self,
        source: &str,
        destination: &str,
        timeout: Duration,
    ) -> QueueResult<Option<String>>;

    /// Non-blocking variant of `dequeue_into`.
    async fn move_next(&self, source: &str, destination: &str) -> QueueResult<Option<String>>;

    /// Append at the newest end.
    async fn enqueue(&self, queue: &str, payload: &str) -> QueueResult<()>;

    /// Insert at the oldest end so the entry is taken next.
    async fn requeue_front(&self, queue: &str, payload: &str) -> QueueResult<()>;

    /// Remove one entry equal to `payload`. Returns the number removed (0 or 1).
    async fn remove(&self, queue: &str, payload: &str) -> QueueResult<u64>;

    async fn depth(&self, queue: &str) -> QueueResult<u64>;

    /// Up to `limit` entries, newest first, without removing them.
    async fn peek(&self, queue: &str, limit: usize) -> QueueResult<Vec<String>>;

    /// Remove and return the oldest entry.
    async fn pop_oldest(&self, queue: &str) -> QueueResult<Option<String>>;
}

/// Point-in-time depth of every pipeline queue. Reporting only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueDepthSnapshot {
    pub inbound: u64,
    pub processing: u64,
    pub dead_letter: u64,
    pub outbound: u64,
    pub taken_at: DateTime<Utc>,
}

impl QueueDepthSnapshot {
    /// Depths paired with metric labels.
    pub fn labelled(&self) -> [(&'static str, u64); 4] {
        [
            ("inbound", self.inbound),
            ("processing", self.processing),
            ("dead_letter", self.dead_letter),
            ("outbound", self.outbound),
        ]
    }
}

/// Read the depth of all four queues.
pub async fn snapshot_depths(broker: &dyn Broker, queues: &QueueNames) -> QueueResult<QueueDepthSnapshot> {
    Ok(QueueDepthSnapshot {
        inbound: broker.depth(&queues.inbound).await?,
        processing: broker.depth(&queues.processing).await?,
        dead_letter: broker.depth(&queues.dead_letter).await?,
        outbound: broker.depth(&queues.outbound).await?,
        taken_at: Utc::now(),
    })
}
