//! Reliable single-worker queue consumer.
//!
//! # Message lifecycle
//! ```text
//! inbound ──BRPOPLPUSH──▶ processing ──handler ok──────────────▶ (removed)
//!                              │
//!                              ├─ not JSON / schema invalid ───▶ dead letter
//!                              ├─ handler err, r+1 < max ──────▶ inbound (taken next, r+1)
//!                              └─ handler err, r+1 >= max ─────▶ dead letter
//! ```
//!
//! # Design Decisions
//! - Strictly sequential: a delivery (handler included) finishes before the next dequeue
//! - The consumer is the only writer of the retry counter
//! - Every move out of the processing queue pushes first and removes second, so a
//!   crash in between duplicates a message instead of losing it
//! - Stop requests are observed between deliveries, never inside one

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use serde_json::Value;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::config::{ConsumerConfig, QueueNames};
use crate::health::PipelineMetrics;
use crate::lifecycle::InFlight;
use crate::observability::tracing::{delivery_span, record_model_id};
use crate::queue::broker::{snapshot_depths, Broker, QueueDepthSnapshot, QueueResult};
use crate::queue::dead_letter::DeadLetterEntry;
use crate::queue::handler::{HandlerError, MessageHandler};
use crate::queue::message::{parse_payload, with_retry_count, ModelReadyMessage};

/// What happened to one `process_one` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// No message arrived before the dequeue timeout.
    Idle,
    /// Handler succeeded; message removed from the processing queue.
    Completed { model_id: String },
    /// Handler failed; message is back on inbound with its counter bumped.
    Requeued { model_id: String, retry_count: u32 },
    /// Message parked in the dead-letter queue.
    DeadLettered { reason: String },
}

/// Broker connectivity and queue depths as seen by the consumer.
#[derive(Debug, Clone, Serialize)]
pub struct QueueHealth {
    pub healthy: bool,
    pub latency_ms: u64,
    pub depths: Option<QueueDepthSnapshot>,
    pub error: Option<String>,
}

/// Pulls one message at a time from inbound and hands it to a handler.
pub struct QueueConsumer {
    broker: Arc<dyn Broker>,
    queues: QueueNames,
    config: ConsumerConfig,
    block_timeout: Duration,
    metrics: Arc<PipelineMetrics>,
    in_flight: InFlight,
}

impl QueueConsumer {
    pub fn new(
        broker: Arc<dyn Broker>,
        queues: QueueNames,
        config: ConsumerConfig,
        block_timeout: Duration,
        metrics: Arc<PipelineMetrics>,
    ) -> Self {
        Self {
            broker,
            queues,
            config,
            block_timeout,
            metrics,
            in_flight: InFlight::new(),
        }
    }

    /// Tracker of deliveries currently inside `process_one`.
    pub fn in_flight(&self) -> InFlight {
        self.in_flight.clone()
    }

    pub fn queues(&self) -> &QueueNames {
        &self.queues
    }

    /// Take the next message (waiting up to the block timeout) and process it.
    pub async fn process_one<H>(&self, handler: &H) -> QueueResult<ProcessOutcome>
    where
        H: MessageHandler + ?Sized,
    {
        let raw = match self
            .broker
            .dequeue_into(&self.queues.inbound, &self.queues.processing, self.block_timeout)
            .await?
        {
            Some(raw) => raw,
            None => return Ok(ProcessOutcome::Idle),
        };

        let _guard = self.in_flight.enter();
        self.metrics.record_received();

        self.deliver(raw, handler)
            .instrument(delivery_span(&self.queues.inbound))
            .await
    }

    async fn deliver<H>(&self, raw: String, handler: &H) -> QueueResult<ProcessOutcome>
    where
        H: MessageHandler + ?Sized,
    {
        let payload = match parse_payload(&raw) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!(error = %e, "Unparseable payload, dead-lettering without retry");
                self.metrics.record_failure("invalid_payload");
                let entry = DeadLetterEntry::for_raw(&raw, e.to_string(), &self.queues.inbound);
                return self.dead_letter(&raw, entry).await;
            }
        };

        let message = match ModelReadyMessage::from_value(payload.clone()) {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!(error = %e, "Schema-invalid message, dead-lettering without retry");
                self.metrics.record_failure("invalid_message");
                let entry = DeadLetterEntry::new(payload, e.to_string(), &self.queues.inbound);
                return self.dead_letter(&raw, entry).await;
            }
        };

        record_model_id(&tracing::Span::current(), &message.model_id);
        tracing::info!(retry_count = message.retry_count, "Processing message");

        match handler.handle(&message).await {
            Ok(()) => {
                let removed = self.broker.remove(&self.queues.processing, &raw).await?;
                if removed == 0 {
                    tracing::warn!("Processing entry was already gone on completion");
                }
                self.metrics.record_completed();
                tracing::info!("Message completed");
                Ok(ProcessOutcome::Completed {
                    model_id: message.model_id,
                })
            }
            Err(e) => self.retry_or_dead_letter(&raw, &payload, &message, e).await,
        }
    }

    async fn retry_or_dead_letter(
        &self,
        raw: &str,
        payload: &Value,
        message: &ModelReadyMessage,
        error: HandlerError,
    ) -> QueueResult<ProcessOutcome> {
        self.metrics.record_failure(&error.reason);

        let retry_count = message.retry_count.saturating_add(1);
        let updated = with_retry_count(payload, retry_count);

        if retry_count < self.config.max_retries {
            let serialized = serde_json::to_string(&updated)?;
            self.broker.requeue_front(&self.queues.inbound, &serialized).await?;
            self.broker.remove(&self.queues.processing, raw).await?;
            self.metrics.record_requeued();

            tracing::warn!(
                retry_count,
                max_retries = self.config.max_retries,
                error = %error,
                "Handler failed, message requeued"
            );
            return Ok(ProcessOutcome::Requeued {
                model_id: message.model_id.clone(),
                retry_count,
            });
        }

        tracing::error!(
            retry_count,
            error = %error,
            "Handler failed and retries are exhausted, dead-lettering"
        );
        let entry = DeadLetterEntry::new(updated, error.message, &self.queues.inbound);
        self.dead_letter(raw, entry).await
    }

    async fn dead_letter(&self, raw: &str, entry: DeadLetterEntry) -> QueueResult<ProcessOutcome> {
        let serialized = serde_json::to_string(&entry)?;
        self.broker.enqueue(&self.queues.dead_letter, &serialized).await?;
        self.broker.remove(&self.queues.processing, raw).await?;
        self.metrics.record_dead_lettered();

        tracing::warn!(queue = %self.queues.dead_letter, reason = %entry.error, "Message dead-lettered");
        Ok(ProcessOutcome::DeadLettered { reason: entry.error })
    }

    /// Move entries stranded in the processing queue (by a crash) back to inbound.
    ///
    /// Returns the number of recovered messages.
    pub async fn recover_processing(&self) -> QueueResult<u64> {
        let stranded = self.broker.depth(&self.queues.processing).await?;
        let mut recovered = 0;

        for _ in 0..stranded {
            match self
                .broker
                .move_next(&self.queues.processing, &self.queues.inbound)
                .await?
            {
                Some(_) => recovered += 1,
                None => break,
            }
        }

        if recovered > 0 {
            tracing::warn!(recovered, "Recovered messages stranded in the processing queue");
        }
        Ok(recovered)
    }

    /// Ping the broker and read queue depths. Never fails; problems are reported.
    pub async fn check_health(&self) -> QueueHealth {
        let start = Instant::now();
        let ping = self.broker.ping().await;
        let latency_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);

        if let Err(e) = ping {
            tracing::warn!(error = %e, "Broker health check failed");
            return QueueHealth {
                healthy: false,
                latency_ms,
                depths: None,
                error: Some(e.to_string()),
            };
        }

        match snapshot_depths(self.broker.as_ref(), &self.queues).await {
            Ok(depths) => QueueHealth {
                healthy: true,
                latency_ms,
                depths: Some(depths),
                error: None,
            },
            Err(e) => QueueHealth {
                healthy: false,
                latency_ms,
                depths: None,
                error: Some(e.to_string()),
            },
        }
    }

    /// Consume until `token` is cancelled.
    pub async fn run(&self, handler: Arc<dyn MessageHandler>, token: CancellationToken) {
        tracing::info!(
            inbound = %self.queues.inbound,
            processing = %self.queues.processing,
            max_retries = self.config.max_retries,
            "Consumer started"
        );

        let error_backoff = Duration::from_millis(self.config.error_backoff_ms);

        while !token.is_cancelled() {
            match self.process_one(handler.as_ref()).await {
                Ok(ProcessOutcome::Idle) => tracing::trace!("No message within block timeout"),
                Ok(outcome) => tracing::debug!(?outcome, "Delivery finished"),
                Err(e) => {
                    tracing::error!(error = %e, "Broker error while processing");
                    self.metrics.record_failure("broker");
                    tokio::select! {
                        _ = tokio::time::sleep(error_backoff) => {}
                        _ = token.cancelled() => {}
                    }
                }
            }
        }

        tracing::info!("Consumer stopped");
    }
}

/// The consumer running on its own task.
pub struct ConsumerWorker {
    token: CancellationToken,
    in_flight: InFlight,
    handle: JoinHandle<()>,
}

impl ConsumerWorker {
    /// Spawn `consumer.run` on a dedicated task.
    pub fn spawn(
        consumer: Arc<QueueConsumer>,
        handler: Arc<dyn MessageHandler>,
        token: CancellationToken,
    ) -> Self {
        let in_flight = consumer.in_flight();
        let task_token = token.clone();
        let handle = tokio::spawn(async move { consumer.run(handler, task_token).await });

        Self {
            token,
            in_flight,
            handle,
        }
    }

    /// Ask the loop to exit after the current delivery.
    pub fn stop(&self) {
        self.token.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Stop, wait for the in-flight delivery, then join the task.
    ///
    /// Returns true on a clean exit. On timeout the task is aborted; its message
    /// stays in the processing queue and is recovered on the next start.
    pub async fn shutdown(mut self, drain_timeout: Duration) -> bool {
        self.stop();
        let deadline = tokio::time::Instant::now() + drain_timeout;

        if self.in_flight.drain(drain_timeout).await {
            tracing::info!("In-flight delivery drained");
        }

        match tokio::time::timeout_at(deadline, &mut self.handle).await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                tracing::error!(error = %e, "Consumer task failed");
                false
            }
            Err(_) => {
                self.handle.abort();
                tracing::warn!("Consumer did not stop in time; aborted");
                false
            }
        }
    }
}
