//! The seam between the consumer and whatever processes a message.

use async_trait::async_trait;
use thiserror::Error;

use crate::queue::message::ModelReadyMessage;

/// A handler failure as seen by the consumer's retry machinery.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct HandlerError {
    /// Short label for metrics (e.g. "deployment", "publish").
    pub reason: String,
    /// Full error text; becomes the dead-letter reason on exhaustion.
    pub message: String,
}

impl HandlerError {
    pub fn new(reason: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            message: message.into(),
        }
    }
}

/// Processes one validated message. An `Err` triggers message-level retry.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, message: &ModelReadyMessage) -> Result<(), HandlerError>;
}
