//! Redis-backed broker.
//!
//! Lists are pushed on the left (newest) and popped on the right (oldest).
//! `BRPOPLPUSH` gives the atomic inbound → processing hand-off.
//! Blocking pops run on a connection of their own; all other commands share a
//! second one.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};

use crate::queue::broker::{Broker, QueueResult};
use crate::resilience::with_timeout;

/// Extra time granted on top of a blocking command's own server-side timeout.
const BLOCKING_GRACE: Duration = Duration::from_secs(2);

/// Broker over two long-lived Redis connections: one for blocking pops, one for
/// everything else.
#[derive(Clone)]
pub struct RedisBroker {
    conn: ConnectionManager,
    blocking_conn: ConnectionManager,
    command_timeout: Duration,
}

impl RedisBroker {
    /// Connect to Redis and verify the connection with a PING.
    pub async fn connect(url: &str, command_timeout: Duration) -> QueueResult<Self> {
        let client = Client::open(url)?;
        let conn = with_timeout(command_timeout, "redis connect", ConnectionManager::new(client.clone())).await??;
        let blocking_conn =
            with_timeout(command_timeout, "redis connect", ConnectionManager::new(client)).await??;

        let broker = Self {
            conn,
            blocking_conn,
            command_timeout,
        };
        broker.ping().await?;

        tracing::info!("Connected to Redis broker");
        Ok(broker)
    }

    fn conn(&self) -> ConnectionManager {
        self.conn.clone()
    }
}

impl std::fmt::Debug for RedisBroker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisBroker")
            .field("command_timeout", &self.command_timeout)
            .finish()
    }
}

#[async_trait]
impl Broker for RedisBroker {
    async fn ping(&self) -> QueueResult<()> {
        let mut conn = self.conn();
        let _pong: String = with_timeout(
            self.command_timeout,
            "redis ping",
            redis::cmd("PING").query_async(&mut conn),
        )
        .await??;
        Ok(())
    }

    async fn dequeue_into(
        &self,
        source: &str,
        destination: &str,
        timeout: Duration,
    ) -> QueueResult<Option<String>> {
        let mut conn = self.blocking_conn.clone();
        let moved: Option<String> = with_timeout(
            timeout + BLOCKING_GRACE,
            "redis brpoplpush",
            redis::cmd("BRPOPLPUSH")
                .arg(source)
                .arg(destination)
                .arg(timeout.as_secs().max(1))
                .query_async(&mut conn),
        )
        .await??;
        Ok(moved)
    }

    async fn move_next(&self, source: &str, destination: &str) -> QueueResult<Option<String>> {
        let mut conn = self.conn();
        let moved: Option<String> = with_timeout(
            self.command_timeout,
            "redis rpoplpush",
            redis::cmd("RPOPLPUSH").arg(source).arg(destination).query_async(&mut conn),
        )
        .await??;
        Ok(moved)
    }

    async fn enqueue(&self, queue: &str, payload: &str) -> QueueResult<()> {
        let mut conn = self.conn();
        let _len: u64 = with_timeout(self.command_timeout, "redis lpush", conn.lpush(queue, payload)).await??;
        Ok(())
    }

    async fn requeue_front(&self, queue: &str, payload: &str) -> QueueResult<()> {
        let mut conn = self.conn();
        let _len: u64 = with_timeout(self.command_timeout, "redis rpush", conn.rpush(queue, payload)).await??;
        Ok(())
    }

    async fn remove(&self, queue: &str, payload: &str) -> QueueResult<u64> {
        let mut conn = self.conn();
        let removed: u64 =
            with_timeout(self.command_timeout, "redis lrem", conn.lrem(queue, 1, payload)).await??;
        Ok(removed)
    }

    async fn depth(&self, queue: &str) -> QueueResult<u64> {
        let mut conn = self.conn();
        let len: u64 = with_timeout(self.command_timeout, "redis llen", conn.llen(queue)).await??;
        Ok(len)
    }

    async fn peek(&self, queue: &str, limit: usize) -> QueueResult<Vec<String>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let mut conn = self.conn();
        let stop = isize::try_from(limit - 1).unwrap_or(isize::MAX);
        let entries: Vec<String> =
            with_timeout(self.command_timeout, "redis lrange", conn.lrange(queue, 0, stop)).await??;
        Ok(entries)
    }

    async fn pop_oldest(&self, queue: &str) -> QueueResult<Option<String>> {
        let mut conn = self.conn();
        let entry: Option<String> =
            with_timeout(self.command_timeout, "redis rpop", conn.rpop(queue, None)).await??;
        Ok(entry)
    }
}
