//! Queue subsystem.
//!
//! # Data Flow
//! ```text
//! producer → inbound ─┬─▶ processing ──▶ handler ──▶ publisher → outbound
//!                     │        │
//!                     │        └──▶ dead letter (malformed or retries exhausted)
//!                     └─◀── requeue (handler failed, budget left)
//! ```
//!
//! # Responsibilities
//! - `broker`: list primitives behind one trait (Redis in production, memory in tests)
//! - `message`: parse and validate inbound payloads
//! - `consumer`: reliable dequeue, retry counter, dead-lettering, crash recovery
//! - `publisher`: outbound events with bounded retry
//!
//! # Design Decisions
//! - Delivery is at-least-once; handlers must be idempotent
//! - The processing queue is the only record of in-flight work

pub mod broker;
pub mod consumer;
pub mod dead_letter;
pub mod handler;
pub mod memory;
pub mod message;
pub mod publisher;
pub mod redis_broker;

pub use broker::{snapshot_depths, Broker, QueueDepthSnapshot, QueueError, QueueResult};
pub use consumer::{ConsumerWorker, ProcessOutcome, QueueConsumer, QueueHealth};
pub use dead_letter::DeadLetterEntry;
pub use handler::{HandlerError, MessageHandler};
pub use memory::InMemoryBroker;
pub use message::{MessageError, ModelReadyMessage};
pub use publisher::{EventPublisher, PublishError};
pub use redis_broker::RedisBroker;
