//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, multipliers >= 1.0)
//! - Check address and URL formats before any connection is attempted
//! - Detect queue name collisions
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: DeployerConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::fmt;

use alloy::primitives::Address;

use crate::config::schema::DeployerConfig;

/// A single semantic problem with the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a loaded configuration.
pub fn validate_config(config: &DeployerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    validate_redis(config, &mut errors);
    validate_blockchain(config, &mut errors);
    validate_contracts(config, &mut errors);

    if config.consumer.max_retries == 0 {
        errors.push(ValidationError::new("consumer.max_retries", "must be at least 1"));
    }
    if config.publisher.max_attempts == 0 {
        errors.push(ValidationError::new("publisher.max_attempts", "must be at least 1"));
    }
    if config.health.failure_threshold == 0 {
        errors.push(ValidationError::new("health.failure_threshold", "must be at least 1"));
    }
    if config.health.sample_window == 0 {
        errors.push(ValidationError::new("health.sample_window", "must be at least 1"));
    }
    if config.admin.enabled && config.admin.api_key.trim().is_empty() {
        errors.push(ValidationError::new("admin.api_key", "required when admin is enabled"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_redis(config: &DeployerConfig, errors: &mut Vec<ValidationError>) {
    if !config.redis.url.starts_with("redis://") && !config.redis.url.starts_with("rediss://") {
        errors.push(ValidationError::new("redis.url", "must use the redis:// or rediss:// scheme"));
    }
    if config.redis.block_timeout_secs == 0 {
        // BRPOPLPUSH treats 0 as "block forever", which would hide stop requests.
        errors.push(ValidationError::new("redis.block_timeout_secs", "must be greater than 0"));
    }
    if config.redis.command_timeout_secs == 0 {
        errors.push(ValidationError::new("redis.command_timeout_secs", "must be greater than 0"));
    }

    let mut seen = HashSet::new();
    for (label, name) in config.redis.queues.labelled() {
        if name.trim().is_empty() {
            errors.push(ValidationError::new(&format!("redis.queues.{}", label), "must not be empty"));
        } else if !seen.insert(name) {
            errors.push(ValidationError::new(
                &format!("redis.queues.{}", label),
                format!("queue name '{}' is used more than once", name),
            ));
        }
    }
}

fn validate_blockchain(config: &DeployerConfig, errors: &mut Vec<ValidationError>) {
    let chain = &config.blockchain;

    if chain.rpc_urls.is_empty() {
        errors.push(ValidationError::new("blockchain.rpc_urls", "at least one endpoint is required"));
    }
    for url in &chain.rpc_urls {
        if url.parse::<url::Url>().is_err() {
            errors.push(ValidationError::new(
                "blockchain.rpc_urls",
                format!("invalid URL '{}'", url),
            ));
        }
    }
    if chain.rpc_timeout_secs == 0 {
        errors.push(ValidationError::new("blockchain.rpc_timeout_secs", "must be greater than 0"));
    }
    if chain.probe_timeout_secs == 0 {
        errors.push(ValidationError::new("blockchain.probe_timeout_secs", "must be greater than 0"));
    }
    if chain.confirmation_timeout_secs == 0 {
        errors.push(ValidationError::new(
            "blockchain.confirmation_timeout_secs",
            "must be greater than 0",
        ));
    }
    if chain.receipt_poll_interval_ms == 0 {
        errors.push(ValidationError::new(
            "blockchain.receipt_poll_interval_ms",
            "must be greater than 0",
        ));
    }
    if !(chain.gas_limit_multiplier >= 1.0) {
        errors.push(ValidationError::new("blockchain.gas_limit_multiplier", "must be >= 1.0"));
    }
    if !(chain.gas_price_multiplier >= 1.0) {
        errors.push(ValidationError::new("blockchain.gas_price_multiplier", "must be >= 1.0"));
    }
    if chain.max_gas_price_gwei == 0 {
        errors.push(ValidationError::new("blockchain.max_gas_price_gwei", "must be greater than 0"));
    }
    if chain.max_attempts == 0 {
        errors.push(ValidationError::new("blockchain.max_attempts", "must be at least 1"));
    }
    if chain.private_key_env.trim().is_empty() {
        errors.push(ValidationError::new("blockchain.private_key_env", "must name an environment variable"));
    }
}

fn validate_contracts(config: &DeployerConfig, errors: &mut Vec<ValidationError>) {
    let contracts = &config.contracts;

    for (field, value) in [
        ("contracts.model_registry_address", &contracts.model_registry_address),
        ("contracts.token_manager_address", &contracts.token_manager_address),
    ] {
        match value.parse::<Address>() {
            Ok(address) if address == Address::ZERO => {
                errors.push(ValidationError::new(field, "must not be the zero address"));
            }
            Ok(_) => {}
            Err(_) => {
                errors.push(ValidationError::new(field, format!("invalid address '{}'", value)));
            }
        }
    }
    if contracts.token_bytecode_path.trim().is_empty() {
        errors.push(ValidationError::new("contracts.token_bytecode_path", "must not be empty"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REGISTRY: &str = "0x5FbDB2315678afecb367f032d93F642f64180aa3";
    const MANAGER: &str = "0xe7f1725E7734CE288F8367e1Bb143E90bb3F0512";

    fn valid_config() -> DeployerConfig {
        let mut config = DeployerConfig::default();
        config.contracts.model_registry_address = REGISTRY.to_string();
        config.contracts.token_manager_address = MANAGER.to_string();
        config
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(validate_config(&valid_config()).is_ok());
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = valid_config();
        config.consumer.max_retries = 0;
        config.blockchain.rpc_urls.clear();
        config.blockchain.gas_limit_multiplier = 0.5;

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
        assert!(fields.contains(&"consumer.max_retries"));
        assert!(fields.contains(&"blockchain.rpc_urls"));
        assert!(fields.contains(&"blockchain.gas_limit_multiplier"));
    }

    #[test]
    fn test_rejects_missing_contract_addresses() {
        let errors = validate_config(&DeployerConfig::default()).unwrap_err();
        assert!(errors.iter().any(|e| e.field == "contracts.model_registry_address"));
        assert!(errors.iter().any(|e| e.field == "contracts.token_manager_address"));
    }

    #[test]
    fn test_rejects_duplicate_queue_names() {
        let mut config = valid_config();
        config.redis.queues.outbound = config.redis.queues.inbound.clone();

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "redis.queues.outbound");
    }

    #[test]
    fn test_rejects_non_redis_scheme() {
        let mut config = valid_config();
        config.redis.url = "http://localhost:6379".to_string();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_rejects_zero_block_timeout() {
        let mut config = valid_config();
        config.redis.block_timeout_secs = 0;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors[0].to_string(), "redis.block_timeout_secs: must be greater than 0");
    }
}
