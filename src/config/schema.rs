//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the deployer.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the deployment pipeline.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct DeployerConfig {
    /// Broker connection and queue names.
    pub redis: RedisConfig,

    /// Consumer retry and shutdown settings.
    pub consumer: ConsumerConfig,

    /// Chain connectivity, gas policy and transaction retries.
    pub blockchain: BlockchainConfig,

    /// On-chain contract addresses and the token artifact.
    pub contracts: ContractsConfig,

    /// Outbound event publishing.
    pub publisher: PublisherConfig,

    /// Health endpoints and alert thresholds.
    pub health: HealthConfig,

    #[serde(default)]
    pub admin: AdminConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Broker configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RedisConfig {
    /// Connection URL (e.g., "redis://127.0.0.1:6379").
    pub url: String,

    /// Queue names used by the pipeline.
    pub queues: QueueNames,

    /// How long a single blocking dequeue waits for a message, in seconds.
    pub block_timeout_secs: u64,

    /// Timeout for non-blocking broker commands, in seconds.
    pub command_timeout_secs: u64,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".to_string(),
            queues: QueueNames::default(),
            block_timeout_secs: 5,
            command_timeout_secs: 5,
        }
    }
}

/// Names of the four list-backed queues.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct QueueNames {
    /// Producer-fed queue of model-ready messages.
    pub inbound: String,
    /// Holding queue for the message currently being processed.
    pub processing: String,
    /// Unprocessable or exhausted messages.
    pub dead_letter: String,
    /// Completion events for downstream consumers.
    pub outbound: String,
}

impl Default for QueueNames {
    fn default() -> Self {
        Self {
            inbound: "hokusai:model_ready_queue".to_string(),
            processing: "hokusai:processing_queue".to_string(),
            dead_letter: "hokusai:dlq".to_string(),
            outbound: "hokusai:token_deployed_queue".to_string(),
        }
    }
}

impl QueueNames {
    /// All queue names paired with a short label for metrics and health output.
    pub fn labelled(&self) -> [(&'static str, &str); 4] {
        [
            ("inbound", self.inbound.as_str()),
            ("processing", self.processing.as_str()),
            ("dead_letter", self.dead_letter.as_str()),
            ("outbound", self.outbound.as_str()),
        ]
    }
}

/// Consumer configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ConsumerConfig {
    /// Maximum handler attempts per message before it is dead-lettered.
    pub max_retries: u32,

    /// Pause after a broker error before polling again, in milliseconds.
    pub error_backoff_ms: u64,

    /// Maximum time to wait for an in-flight message at shutdown, in seconds.
    pub drain_timeout_secs: u64,

    /// Move messages stranded in the processing queue back to inbound on startup.
    pub recover_processing_on_start: bool,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            error_backoff_ms: 1000,
            drain_timeout_secs: 60,
            recover_processing_on_start: true,
        }
    }
}

/// Blockchain integration configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BlockchainConfig {
    /// JSON-RPC endpoint candidates, in priority order.
    pub rpc_urls: Vec<String>,

    /// Chain ID (e.g., 8453 for Base, 31337 for local Anvil).
    pub chain_id: u64,

    /// RPC request timeout in seconds.
    pub rpc_timeout_secs: u64,

    /// Liveness probe timeout used during endpoint resolution, in seconds.
    pub probe_timeout_secs: u64,

    /// Number of block confirmations required for finality.
    pub confirmation_blocks: u64,

    /// Upper bound on waiting for confirmations, in seconds.
    pub confirmation_timeout_secs: u64,

    /// Interval between receipt lookups while a transaction confirms, in milliseconds.
    pub receipt_poll_interval_ms: u64,

    /// Gas limit multiplier applied to the estimate (1.2 = 20% buffer).
    pub gas_limit_multiplier: f64,

    /// Gas price multiplier applied to the network's suggestion.
    pub gas_price_multiplier: f64,

    /// Maximum gas price in gwei (protection against spikes).
    pub max_gas_price_gwei: u64,

    /// Attempts per chain write before giving up.
    pub max_attempts: u32,

    /// Base delay of the linear retry schedule, in milliseconds.
    pub retry_base_delay_ms: u64,

    /// Environment variable holding the deployer's private key.
    pub private_key_env: String,
}

impl Default for BlockchainConfig {
    fn default() -> Self {
        Self {
            rpc_urls: vec!["http://localhost:8545".to_string()],
            chain_id: 31337,
            rpc_timeout_secs: 10,
            probe_timeout_secs: 5,
            confirmation_blocks: 2,
            confirmation_timeout_secs: 180,
            receipt_poll_interval_ms: 2000,
            gas_limit_multiplier: 1.2,
            gas_price_multiplier: 1.1,
            max_gas_price_gwei: 50,
            max_attempts: 3,
            retry_base_delay_ms: 2000,
            private_key_env: "DEPLOYER_PRIVATE_KEY".to_string(),
        }
    }
}

/// Addresses and artifacts of the contracts the pipeline talks to.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ContractsConfig {
    /// Model registry address (source of truth for idempotency).
    pub model_registry_address: String,

    /// Token manager address; set as each token's controller.
    pub token_manager_address: String,

    /// Path to the token's creation bytecode, hex encoded.
    pub token_bytecode_path: String,

    /// Prefix for synthesized token names ("<prefix> <model name>").
    pub token_name_prefix: String,
}

impl Default for ContractsConfig {
    fn default() -> Self {
        Self {
            model_registry_address: String::new(),
            token_manager_address: String::new(),
            token_bytecode_path: "artifacts/HokusaiToken.bin".to_string(),
            token_name_prefix: "Hokusai".to_string(),
        }
    }
}

/// Outbound event publishing configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PublisherConfig {
    /// Push attempts before the publish is treated as a pipeline failure.
    pub max_attempts: u32,

    /// Fixed delay between push attempts, in milliseconds.
    pub backoff_ms: u64,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_ms: 1000,
        }
    }
}

/// Health endpoint and alerting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthConfig {
    /// Bind address of the health/admin HTTP server.
    pub bind_address: String,

    /// Failures within the window that raise an alert.
    pub failure_threshold: usize,

    /// Sliding window for failure alerting, in seconds.
    pub failure_window_secs: u64,

    /// Inbound depth above which the pipeline is considered backlogged.
    pub max_inbound_depth: u64,

    /// Processing depth above which a stuck worker is suspected.
    pub max_processing_depth: u64,

    /// Dead-letter depth above which operators are alerted.
    pub max_dead_letter_depth: u64,

    /// Deployer balance (in ether) below which a warning is raised.
    pub min_deployer_balance_eth: f64,

    /// Queue depth sampling interval, in seconds.
    pub sample_interval_secs: u64,

    /// Number of queue depth samples kept in the rolling window.
    pub sample_window: usize,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8002".to_string(),
            failure_threshold: 5,
            failure_window_secs: 300,
            max_inbound_depth: 100,
            max_processing_depth: 1,
            max_dead_letter_depth: 10,
            min_deployer_balance_eth: 0.01,
            sample_interval_secs: 30,
            sample_window: 60,
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable admin routes.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            // WARNING: This is a placeholder! Change this in production.
            api_key: "CHANGE_ME_IN_PRODUCTION".to_string(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Pretty output for development, JSON for production.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
