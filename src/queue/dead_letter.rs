//! Dead-letter entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// An unprocessable or permanently failed message with the reason it was parked.
///
/// Written once, never updated.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DeadLetterEntry {
    /// Parsed payload, or the raw string when it was not valid JSON.
    pub original_message: Value,
    pub error: String,
    pub timestamp: DateTime<Utc>,
    /// Queue the message was consumed from.
    pub queue: String,
}

impl DeadLetterEntry {
    pub fn new(original_message: Value, error: impl Into<String>, queue: impl Into<String>) -> Self {
        Self {
            original_message,
            error: error.into(),
            timestamp: Utc::now(),
            queue: queue.into(),
        }
    }

    /// Entry for a payload that could not be parsed at all.
    pub fn for_raw(raw: &str, error: impl Into<String>, queue: impl Into<String>) -> Self {
        Self::new(Value::String(raw.to_string()), error, queue)
    }
}
