//! Owned pipeline metrics.
//!
//! One `PipelineMetrics` is created at startup and shared (via `Arc`) with every
//! component that reports into it. It lives for the whole process; there is no
//! live reset. Every update is mirrored to the Prometheus facade.

use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;

use crate::observability::metrics;
use crate::queue::QueueDepthSnapshot;

/// Failures older than this are dropped from the rolling window regardless of config.
const MAX_FAILURE_HISTORY: usize = 1024;

#[derive(Debug, Clone)]
struct FailureRecord {
    at: Instant,
    reason: String,
}

/// Running counters plus rolling windows used for alerting.
pub struct PipelineMetrics {
    messages_received: AtomicU64,
    messages_completed: AtomicU64,
    messages_requeued: AtomicU64,
    messages_dead_lettered: AtomicU64,
    tokens_deployed: AtomicU64,
    deployments_skipped: AtomicU64,
    total_gas_used: AtomicU64,
    deployment_ms_total: AtomicU64,
    last_deployment_ms: AtomicU64,
    consecutive_failures: AtomicU64,
    failures_by_reason: DashMap<String, u64>,
    recent_failures: Mutex<VecDeque<FailureRecord>>,
    depth_samples: Mutex<VecDeque<QueueDepthSnapshot>>,
    sample_capacity: usize,
    last_success_at: Mutex<Option<DateTime<Utc>>>,
    started_at: DateTime<Utc>,
}

/// Serializable view of the counters.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MetricsSnapshot {
    pub messages_received: u64,
    pub messages_completed: u64,
    pub messages_requeued: u64,
    pub messages_dead_lettered: u64,
    pub tokens_deployed: u64,
    pub deployments_skipped: u64,
    pub total_gas_used: u64,
    pub average_deployment_ms: Option<u64>,
    pub last_deployment_ms: Option<u64>,
    pub consecutive_failures: u64,
    pub failures_by_reason: BTreeMap<String, u64>,
    pub last_success_at: Option<DateTime<Utc>>,
    pub started_at: DateTime<Utc>,
    pub latest_depths: Option<QueueDepthSnapshot>,
}

impl PipelineMetrics {
    /// Create the aggregator keeping up to `sample_capacity` depth samples.
    pub fn new(sample_capacity: usize) -> Self {
        Self {
            messages_received: AtomicU64::new(0),
            messages_completed: AtomicU64::new(0),
            messages_requeued: AtomicU64::new(0),
            messages_dead_lettered: AtomicU64::new(0),
            tokens_deployed: AtomicU64::new(0),
            deployments_skipped: AtomicU64::new(0),
            total_gas_used: AtomicU64::new(0),
            deployment_ms_total: AtomicU64::new(0),
            last_deployment_ms: AtomicU64::new(0),
            consecutive_failures: AtomicU64::new(0),
            failures_by_reason: DashMap::new(),
            recent_failures: Mutex::new(VecDeque::new()),
            depth_samples: Mutex::new(VecDeque::new()),
            sample_capacity: sample_capacity.max(1),
            last_success_at: Mutex::new(None),
            started_at: Utc::now(),
        }
    }

    pub fn record_received(&self) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
        metrics::record_message("received");
    }

    /// Message fully handled and removed from the processing queue.
    pub fn record_completed(&self) {
        self.messages_completed.fetch_add(1, Ordering::Relaxed);
        self.consecutive_failures.store(0, Ordering::Relaxed);
        *lock(&self.last_success_at) = Some(Utc::now());
        metrics::record_message("completed");
    }

    pub fn record_requeued(&self) {
        self.messages_requeued.fetch_add(1, Ordering::Relaxed);
        metrics::record_message("requeued");
    }

    pub fn record_dead_lettered(&self) {
        self.messages_dead_lettered.fetch_add(1, Ordering::Relaxed);
        metrics::record_message("dead_lettered");
    }

    /// A token contract was deployed.
    pub fn record_deployment(&self, gas_used: u64, duration: Duration) {
        let ms = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
        self.tokens_deployed.fetch_add(1, Ordering::Relaxed);
        self.total_gas_used.fetch_add(gas_used, Ordering::Relaxed);
        self.deployment_ms_total.fetch_add(ms, Ordering::Relaxed);
        self.last_deployment_ms.store(ms, Ordering::Relaxed);
        metrics::record_deployment(gas_used, duration);
    }

    /// Deployment skipped because the model is already registered.
    pub fn record_skipped(&self) {
        self.deployments_skipped.fetch_add(1, Ordering::Relaxed);
        metrics::record_deployment_skipped();
    }

    /// A failure with a short machine-friendly reason (e.g. "deployment", "invalid_payload").
    pub fn record_failure(&self, reason: &str) {
        self.consecutive_failures.fetch_add(1, Ordering::Relaxed);
        *self.failures_by_reason.entry(reason.to_string()).or_insert(0) += 1;

        let mut recent = lock(&self.recent_failures);
        recent.push_back(FailureRecord {
            at: Instant::now(),
            reason: reason.to_string(),
        });
        while recent.len() > MAX_FAILURE_HISTORY {
            recent.pop_front();
        }
        drop(recent);

        metrics::record_failure(reason);
    }

    /// Failures recorded within the last `window`.
    pub fn failures_within(&self, window: Duration) -> usize {
        let now = Instant::now();
        lock(&self.recent_failures)
            .iter()
            .filter(|f| now.duration_since(f.at) <= window)
            .count()
    }

    /// Reasons of failures recorded within the last `window`, oldest first.
    pub fn recent_failure_reasons(&self, window: Duration) -> Vec<String> {
        let now = Instant::now();
        lock(&self.recent_failures)
            .iter()
            .filter(|f| now.duration_since(f.at) <= window)
            .map(|f| f.reason.clone())
            .collect()
    }

    pub fn consecutive_failures(&self) -> u64 {
        self.consecutive_failures.load(Ordering::Relaxed)
    }

    /// Add a queue depth sample to the rolling window.
    pub fn record_depths(&self, snapshot: QueueDepthSnapshot) {
        for (queue, depth) in snapshot.labelled() {
            metrics::record_queue_depth(queue, depth);
        }

        let mut samples = lock(&self.depth_samples);
        samples.push_back(snapshot);
        while samples.len() > self.sample_capacity {
            samples.pop_front();
        }
    }

    pub fn latest_depths(&self) -> Option<QueueDepthSnapshot> {
        lock(&self.depth_samples).back().copied()
    }

    /// Depth samples in the window, oldest first.
    pub fn depth_samples(&self) -> Vec<QueueDepthSnapshot> {
        lock(&self.depth_samples).iter().copied().collect()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let deployed = self.tokens_deployed.load(Ordering::Relaxed);
        let total_ms = self.deployment_ms_total.load(Ordering::Relaxed);

        MetricsSnapshot {
            messages_received: self.messages_received.load(Ordering::Relaxed),
            messages_completed: self.messages_completed.load(Ordering::Relaxed),
            messages_requeued: self.messages_requeued.load(Ordering::Relaxed),
            messages_dead_lettered: self.messages_dead_lettered.load(Ordering::Relaxed),
            tokens_deployed: deployed,
            deployments_skipped: self.deployments_skipped.load(Ordering::Relaxed),
            total_gas_used: self.total_gas_used.load(Ordering::Relaxed),
            average_deployment_ms: (deployed > 0).then(|| total_ms / deployed),
            last_deployment_ms: (deployed > 0).then(|| self.last_deployment_ms.load(Ordering::Relaxed)),
            consecutive_failures: self.consecutive_failures(),
            failures_by_reason: self
                .failures_by_reason
                .iter()
                .map(|r| (r.key().clone(), *r.value()))
                .collect(),
            last_success_at: *lock(&self.last_success_at),
            started_at: self.started_at,
            latest_depths: self.latest_depths(),
        }
    }
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self::new(60)
    }
}

impl std::fmt::Debug for PipelineMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineMetrics")
            .field("tokens_deployed", &self.tokens_deployed.load(Ordering::Relaxed))
            .field("consecutive_failures", &self.consecutive_failures())
            .finish()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
