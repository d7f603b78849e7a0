//! Configuration loading from disk and the environment.

use std::fs;
use std::path::Path;

use crate::config::schema::DeployerConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Overrides the broker URL.
pub const ENV_REDIS_URL: &str = "DEPLOYER_REDIS_URL";
/// Overrides the RPC candidates (comma separated, priority order).
pub const ENV_RPC_URLS: &str = "DEPLOYER_RPC_URLS";
/// Overrides the admin API key.
pub const ENV_ADMIN_API_KEY: &str = "DEPLOYER_ADMIN_API_KEY";

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Validation(Vec<ValidationError>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 { write!(f, ", ")?; }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Load, override and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<DeployerConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
    let mut config: DeployerConfig = toml::from_str(&content).map_err(ConfigError::Parse)?;

    apply_env_overrides(&mut config, |key| std::env::var(key).ok());

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Apply environment overrides using the given lookup.
///
/// The lookup is injected so tests don't have to mutate the process environment.
pub fn apply_env_overrides<F>(config: &mut DeployerConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(url) = lookup(ENV_REDIS_URL).filter(|v| !v.trim().is_empty()) {
        tracing::debug!("Broker URL overridden from environment");
        config.redis.url = url;
    }

    if let Some(urls) = lookup(ENV_RPC_URLS) {
        let urls: Vec<String> = urls
            .split(',')
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .map(String::from)
            .collect();
        if !urls.is_empty() {
            tracing::debug!(count = urls.len(), "RPC endpoints overridden from environment");
            config.blockchain.rpc_urls = urls;
        }
    }

    if let Some(key) = lookup(ENV_ADMIN_API_KEY).filter(|v| !v.trim().is_empty()) {
        config.admin.api_key = key;
    }
}
