//! Inbound "model ready" message: parsing and schema validation.
//!
//! Parsing happens in two stages so the consumer can tell a payload that is not
//! JSON at all apart from a JSON document that breaks the schema. Neither kind is
//! ever retried.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Message versions this consumer understands.
pub const SUPPORTED_MESSAGE_VERSIONS: &[&str] = &["1.0"];

/// Key of the consumer-owned retry counter inside the payload.
pub const RETRY_COUNT_FIELD: &str = "_retryCount";

const MAX_MODEL_ID_LEN: usize = 256;

static TOKEN_SYMBOL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z][A-Z0-9]{1,10}$").expect("static regex"));

static ADDRESS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^0x[0-9a-fA-F]{40}$").expect("static regex"));

/// Why a raw payload could not become a `ModelReadyMessage`.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum MessageError {
    /// Not a JSON object.
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    /// JSON object that violates the message schema.
    #[error("validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),
}

/// A model has finished training and improved on its baseline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelReadyMessage {
    pub model_id: String,
    pub token_symbol: String,
    pub metric_name: String,
    pub baseline_value: f64,
    pub current_value: f64,
    pub model_name: String,
    pub model_version: String,
    pub mlflow_run_id: String,
    pub improvement_percentage: f64,
    pub timestamp: String,
    pub message_version: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contributor_address: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub experiment_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<BTreeMap<String, String>>,

    /// Handler attempts that already failed. Only the consumer writes this.
    #[serde(rename = "_retryCount", default)]
    pub retry_count: u32,
}

impl ModelReadyMessage {
    /// Deserialize and validate a parsed payload.
    pub fn from_value(value: Value) -> Result<Self, MessageError> {
        let message: ModelReadyMessage = serde_json::from_value(value)
            .map_err(|e| MessageError::Validation(vec![e.to_string()]))?;
        message.validate()?;
        Ok(message)
    }

    /// Check every schema rule and report all violations.
    pub fn validate(&self) -> Result<(), MessageError> {
        let mut problems = Vec::new();

        for (field, value) in [
            ("model_id", &self.model_id),
            ("metric_name", &self.metric_name),
            ("model_name", &self.model_name),
            ("model_version", &self.model_version),
            ("mlflow_run_id", &self.mlflow_run_id),
        ] {
            if value.trim().is_empty() {
                problems.push(format!("{} must not be empty", field));
            }
        }
        if self.model_id.len() > MAX_MODEL_ID_LEN {
            problems.push(format!("model_id exceeds {} characters", MAX_MODEL_ID_LEN));
        }

        if !TOKEN_SYMBOL_RE.is_match(&self.token_symbol) {
            problems.push(format!(
                "token_symbol '{}' must be 2-11 uppercase letters or digits starting with a letter",
                self.token_symbol
            ));
        }

        if let Some(address) = &self.contributor_address {
            if !ADDRESS_RE.is_match(address) {
                problems.push(format!("contributor_address '{}' is not a 20-byte hex address", address));
            }
        }

        if !self.improvement_percentage.is_finite() || self.improvement_percentage <= 0.0 {
            problems.push("improvement_percentage must be a positive number".to_string());
        }
        if !self.baseline_value.is_finite() || !self.current_value.is_finite() {
            problems.push("baseline_value and current_value must be finite".to_string());
        }

        if chrono::DateTime::parse_from_rfc3339(&self.timestamp).is_err() {
            problems.push(format!("timestamp '{}' is not RFC 3339", self.timestamp));
        }

        if !SUPPORTED_MESSAGE_VERSIONS.contains(&self.message_version.as_str()) {
            problems.push(format!("unsupported message_version '{}'", self.message_version));
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(MessageError::Validation(problems))
        }
    }
}

/// Parse a raw queue entry into a JSON object.
pub fn parse_payload(raw: &str) -> Result<Value, MessageError> {
    let value: Value =
        serde_json::from_str(raw).map_err(|e| MessageError::InvalidPayload(e.to_string()))?;
    if !value.is_object() {
        return Err(MessageError::InvalidPayload("expected a JSON object".to_string()));
    }
    Ok(value)
}

/// Copy of `payload` with the retry counter set, leaving every other field untouched.
pub fn with_retry_count(payload: &Value, retry_count: u32) -> Value {
    let mut updated = payload.clone();
    if let Some(object) = updated.as_object_mut() {
        object.insert(RETRY_COUNT_FIELD.to_string(), Value::from(retry_count));
    }
    updated
}

/// True if `value` is a 0x-prefixed 20-byte hex address.
pub fn is_hex_address(value: &str) -> bool {
    ADDRESS_RE.is_match(value)
}
