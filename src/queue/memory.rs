//! In-process broker with the same list semantics as Redis.
//!
//! Used by tests and by `--memory-broker` local runs. Supports failure injection
//! so callers can exercise broker outages and flaky pushes.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::queue::broker::{Broker, QueueError, QueueResult};

/// Lists keyed by queue name. Front = newest, back = oldest.
#[derive(Default)]
pub struct InMemoryBroker {
    lists: Mutex<HashMap<String, VecDeque<String>>>,
    pushed: Notify,
    unavailable: AtomicBool,
    failing_enqueues: AtomicU32,
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate a broker outage: every operation fails while set.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Make the next `count` enqueue calls fail.
    pub fn fail_next_enqueues(&self, count: u32) {
        self.failing_enqueues.store(count, Ordering::SeqCst);
    }

    /// Snapshot of a list, newest first.
    pub fn contents(&self, queue: &str) -> Vec<String> {
        self.lists()
            .get(queue)
            .map(|list| list.iter().cloned().collect())
            .unwrap_or_default()
    }

    fn lists(&self) -> MutexGuard<'_, HashMap<String, VecDeque<String>>> {
        self.lists.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn check_available(&self) -> QueueResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(QueueError::Broker("connection refused".to_string()));
        }
        Ok(())
    }

    fn try_move(&self, source: &str, destination: &str) -> Option<String> {
        let mut lists = self.lists();
        let entry = lists.get_mut(source)?.pop_back()?;
        lists
            .entry(destination.to_string())
            .or_default()
            .push_front(entry.clone());
        Some(entry)
    }
}

impl std::fmt::Debug for InMemoryBroker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryBroker")
            .field("queues", &self.lists().len())
            .finish()
    }
}

#[async_trait]
impl Broker for InMemoryBroker {
    async fn ping(&self) -> QueueResult<()> {
        self.check_available()
    }

    async fn dequeue_into(
        &self,
        source: &str,
        destination: &str,
        timeout: Duration,
    ) -> QueueResult<Option<String>> {
        self.check_available()?;
        let deadline = tokio::time::Instant::now() + timeout;

        loop {
            let notified = self.pushed.notified();
            if let Some(entry) = self.try_move(source, destination) {
                return Ok(Some(entry));
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return Ok(None);
            }
            self.check_available()?;
        }
    }

    async fn move_next(&self, source: &str, destination: &str) -> QueueResult<Option<String>> {
        self.check_available()?;
        Ok(self.try_move(source, destination))
    }

    async fn enqueue(&self, queue: &str, payload: &str) -> QueueResult<()> {
        self.check_available()?;
        let injected = self
            .failing_enqueues
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            return Err(QueueError::Broker("injected enqueue failure".to_string()));
        }

        self.lists()
            .entry(queue.to_string())
            .or_default()
            .push_front(payload.to_string());
        self.pushed.notify_waiters();
        Ok(())
    }

    async fn requeue_front(&self, queue: &str, payload: &str) -> QueueResult<()> {
        self.check_available()?;
        self.lists()
            .entry(queue.to_string())
            .or_default()
            .push_back(payload.to_string());
        self.pushed.notify_waiters();
        Ok(())
    }

    async fn remove(&self, queue: &str, payload: &str) -> QueueResult<u64> {
        self.check_available()?;
        let mut lists = self.lists();
        let Some(list) = lists.get_mut(queue) else {
            return Ok(0);
        };
        match list.iter().position(|entry| entry == payload) {
            Some(index) => {
                list.remove(index);
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn depth(&self, queue: &str) -> QueueResult<u64> {
        self.check_available()?;
        Ok(self.lists().get(queue).map_or(0, |list| list.len() as u64))
    }

    async fn peek(&self, queue: &str, limit: usize) -> QueueResult<Vec<String>> {
        self.check_available()?;
        Ok(self
            .lists()
            .get(queue)
            .map(|list| list.iter().take(limit).cloned().collect())
            .unwrap_or_default())
    }

    async fn pop_oldest(&self, queue: &str) -> QueueResult<Option<String>> {
        self.check_available()?;
        Ok(self.lists().get_mut(queue).and_then(|list| list.pop_back()))
    }
}
