//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → loader.rs (environment overrides for URLs and the admin key)
//!     → validation.rs (semantic checks)
//!     → DeployerConfig (validated, immutable)
//!     → sections cloned into each subsystem at startup
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - The signing key never lives in the file, only in the environment

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    AdminConfig, BlockchainConfig, ConsumerConfig, ContractsConfig, DeployerConfig, HealthConfig,
    LogFormat, ObservabilityConfig, PublisherConfig, QueueNames, RedisConfig,
};
