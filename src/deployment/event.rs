//! The outbound `token_deployed` event.

use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::blockchain::{DeploymentResult, RegistrationResult};
use crate::queue::ModelReadyMessage;

pub const TOKEN_DEPLOYED_EVENT: &str = "token_deployed";
pub const EVENT_MESSAGE_VERSION: &str = "1.0";

/// Published once per completed pipeline run. Never mutated after construction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TokenDeployedEvent {
    pub event_type: String,
    pub model_id: String,
    pub token_address: String,
    pub token_symbol: String,
    pub token_name: String,
    pub transaction_hash: String,
    pub registry_transaction_hash: String,
    pub block_number: u64,
    pub gas_used: u64,
    /// Effective gas price in wei, as a decimal string.
    pub gas_price: String,
    pub chain_id: u64,
    pub contributor_address: Option<String>,
    pub metric_name: String,
    pub baseline_value: f64,
    pub current_value: f64,
    pub improvement_percentage: f64,
    pub model_name: String,
    pub model_version: String,
    pub mlflow_run_id: String,
    pub experiment_name: Option<String>,
    pub tags: Option<BTreeMap<String, String>>,
    /// When the model-ready message was produced, as the producer sent it.
    pub model_ready_timestamp: String,
    pub deployment_timestamp: String,
    pub message_version: String,
}

/// Human-readable token name: `"<prefix> <model name>"`.
pub fn token_name(prefix: &str, model_name: &str) -> String {
    let prefix = prefix.trim();
    if prefix.is_empty() {
        model_name.trim().to_string()
    } else {
        format!("{} {}", prefix, model_name.trim())
    }
}

impl TokenDeployedEvent {
    pub fn new(
        message: &ModelReadyMessage,
        token_name: String,
        deployment: &DeploymentResult,
        registration: &RegistrationResult,
        chain_id: u64,
        deployed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            event_type: TOKEN_DEPLOYED_EVENT.to_string(),
            model_id: message.model_id.clone(),
            token_address: deployment.contract_address.to_string(),
            token_symbol: message.token_symbol.clone(),
            token_name,
            transaction_hash: deployment.transaction_hash.to_string(),
            registry_transaction_hash: registration.transaction_hash.to_string(),
            block_number: deployment.block_number,
            gas_used: deployment.gas_used,
            gas_price: deployment.effective_gas_price.to_string(),
            chain_id,
            contributor_address: message.contributor_address.clone(),
            metric_name: message.metric_name.clone(),
            baseline_value: message.baseline_value,
            current_value: message.current_value,
            improvement_percentage: message.improvement_percentage,
            model_name: message.model_name.clone(),
            model_version: message.model_version.clone(),
            mlflow_run_id: message.mlflow_run_id.clone(),
            experiment_name: message.experiment_name.clone(),
            tags: message.tags.clone(),
            model_ready_timestamp: message.timestamp.clone(),
            deployment_timestamp: deployed_at.to_rfc3339_opts(SecondsFormat::Millis, true),
            message_version: EVENT_MESSAGE_VERSION.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::message::tests::valid_payload;
    use alloy::primitives::{Address, TxHash};
    use chrono::TimeZone;

    #[test]
    fn test_token_name() {
        assert_eq!(token_name("Hokusai", "Sentiment Classifier"), "Hokusai Sentiment Classifier");
        assert_eq!(token_name("", " Bare "), "Bare");
    }

    #[test]
    fn test_event_combines_message_and_results() {
        let message = ModelReadyMessage::from_value(valid_payload()).unwrap();
        let deployment = DeploymentResult {
            contract_address: Address::repeat_byte(0xaa),
            transaction_hash: TxHash::repeat_byte(0x01),
            block_number: 42,
            gas_used: 1_234_567,
            effective_gas_price: 2_000_000_000,
        };
        let registration = RegistrationResult {
            transaction_hash: TxHash::repeat_byte(0x02),
        };
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap();

        let event = TokenDeployedEvent::new(
            &message,
            token_name("Hokusai", &message.model_name),
            &deployment,
            &registration,
            84532,
            at,
        );

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event_type"], "token_deployed");
        assert_eq!(json["model_id"], "m1");
        assert_eq!(json["token_address"].as_str().unwrap().to_lowercase(), format!("0x{}", "aa".repeat(20)));
        assert_eq!(json["token_name"], "Hokusai Sentiment Classifier");
        assert_eq!(json["gas_price"], "2000000000");
        assert_eq!(json["block_number"], 42);
        assert_eq!(json["chain_id"], 84532);
        assert_eq!(json["improvement_percentage"], 3.5);
        assert_eq!(json["deployment_timestamp"], "2024-05-01T12:30:00.000Z");
        assert_eq!(json["message_version"], "1.0");
        assert_ne!(json["transaction_hash"], json["registry_transaction_hash"]);
        assert_eq!(json["model_ready_timestamp"], "2024-05-01T12:00:00Z");
        assert!(json["tags"].is_null());
    }

    #[test]
    fn test_event_carries_producer_tags() {
        let mut payload = valid_payload();
        payload["tags"] = serde_json::json!({"team": "nlp", "dataset": "reviews-v2"});
        let message = ModelReadyMessage::from_value(payload).unwrap();
        let deployment = DeploymentResult {
            contract_address: Address::repeat_byte(0xaa),
            transaction_hash: TxHash::repeat_byte(0x01),
            block_number: 1,
            gas_used: 1,
            effective_gas_price: 1,
        };
        let registration = RegistrationResult {
            transaction_hash: TxHash::repeat_byte(0x02),
        };

        let event = TokenDeployedEvent::new(&message, "T".to_string(), &deployment, &registration, 1, Utc::now());

        let tags = event.tags.as_ref().unwrap();
        assert_eq!(tags["team"], "nlp");
        assert_eq!(tags["dataset"], "reviews-v2");
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["tags"]["team"], "nlp");
    }
}
