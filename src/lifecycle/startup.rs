//! Startup orchestration.
//!
//! # Responsibilities
//! - Load and validate configuration
//! - Initialize all subsystems in dependency order
//! - Start background tasks (consumer, depth sampler, HTTP server)
//! - Drain and stop them when the shutdown signal arrives
//!
//! # Design Decisions
//! - Fail fast: an unreachable broker or chain at startup is fatal
//! - Subsystems initialize in order, not concurrently
//! - Crash recovery runs before the consumer takes its first message
//! - The HTTP listener binds before consumption so probes see the process early

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use thiserror::Error;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::admin::{setup_admin_router, AdminState};
use crate::blockchain::{
    load_bytecode, parse_address, BlockchainError, ChainClient, DeploymentChain, Wallet,
};
use crate::config::loader::apply_env_overrides;
use crate::config::validation::validate_config;
use crate::config::{load_config, ConfigError, DeployerConfig, RedisConfig};
use crate::deployment::{DeploymentOrchestrator, DeploymentSettings};
use crate::health::{health_router, AlertMonitor, HealthService, PipelineMetrics, RequiredContracts};
use crate::lifecycle::shutdown::Shutdown;
use crate::lifecycle::signals::wait_for_signal;
use crate::observability::{logging, metrics};
use crate::queue::{
    Broker, ConsumerWorker, EventPublisher, InMemoryBroker, MessageHandler, QueueConsumer,
    QueueError, RedisBroker,
};

const HTTP_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Infrastructure failures that abort the process.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to initialize logging: {0}")]
    Logging(#[from] tracing_subscriber::util::TryInitError),

    #[error("broker unavailable: {0}")]
    Broker(#[from] QueueError),

    #[error("blockchain setup failed: {0}")]
    Chain(#[from] BlockchainError),

    #[error("invalid {field} '{value}'")]
    InvalidAddress { field: &'static str, value: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Command-line choices that shape startup.
#[derive(Debug, Clone, Default)]
pub struct StartupOptions {
    /// TOML config file; defaults plus environment overrides when absent.
    pub config_path: Option<PathBuf>,
    /// Use the in-process broker instead of Redis.
    pub memory_broker: bool,
}

/// Load the config file, or fall back to defaults with environment overrides.
pub fn load_startup_config(path: Option<&Path>) -> Result<DeployerConfig, ConfigError> {
    match path {
        Some(path) => load_config(path),
        None => {
            let mut config = DeployerConfig::default();
            apply_env_overrides(&mut config, |key| std::env::var(key).ok());
            validate_config(&config).map_err(ConfigError::Validation)?;
            Ok(config)
        }
    }
}

/// Health routes, plus admin routes when `admin` is given.
#[allow(deprecated)]
pub fn build_http_router(health: Arc<HealthService>, admin: Option<AdminState>) -> Router {
    let mut router = health_router(health);
    if let Some(admin) = admin {
        router = router.merge(setup_admin_router(admin));
    }
    router.layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(TimeoutLayer::new(HTTP_REQUEST_TIMEOUT)),
    )
}

async fn connect_broker(config: &RedisConfig, in_memory: bool) -> Result<Arc<dyn Broker>, QueueError> {
    if in_memory {
        tracing::warn!("Using in-memory broker; queued messages do not survive a restart");
        return Ok(Arc::new(InMemoryBroker::new()));
    }
    let broker = RedisBroker::connect(&config.url, Duration::from_secs(config.command_timeout_secs)).await?;
    Ok(Arc::new(broker))
}

/// Return messages stranded by a previous crash to the inbound queue.
///
/// `recover_processing` does the logging.
async fn recover_on_start(consumer: &QueueConsumer, enabled: bool) -> Result<u64, QueueError> {
    if !enabled {
        return Ok(0);
    }
    consumer.recover_processing().await
}

fn parse_socket_addr(field: &'static str, value: &str) -> Result<SocketAddr, StartupError> {
    value.parse().map_err(|_| StartupError::InvalidAddress {
        field,
        value: value.to_string(),
    })
}

/// Start every subsystem and run until SIGINT/SIGTERM.
pub async fn run(options: StartupOptions) -> Result<(), StartupError> {
    let config = load_startup_config(options.config_path.as_deref())?;
    logging::init_logging(&config.observability.log_level, config.observability.log_format)?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        chain_id = config.blockchain.chain_id,
        inbound = %config.redis.queues.inbound,
        "model-token-deployer starting"
    );

    if config.observability.metrics_enabled {
        let addr = parse_socket_addr("observability.metrics_address", &config.observability.metrics_address)?;
        metrics::init_metrics(addr);
    }

    let shutdown = Shutdown::new();

    let broker = connect_broker(&config.redis, options.memory_broker).await?;

    let wallet = Wallet::from_env(&config.blockchain.private_key_env)?;
    let registry = parse_address("contracts.model_registry_address", &config.contracts.model_registry_address)?;
    let token_manager = parse_address("contracts.token_manager_address", &config.contracts.token_manager_address)?;

    let chain: Arc<dyn DeploymentChain> =
        Arc::new(ChainClient::connect(&config.blockchain, registry, &wallet).await?);
    let token_bytecode = load_bytecode(Path::new(&config.contracts.token_bytecode_path))?;

    let pipeline_metrics = Arc::new(PipelineMetrics::new(config.health.sample_window));

    let consumer = Arc::new(QueueConsumer::new(
        broker.clone(),
        config.redis.queues.clone(),
        config.consumer.clone(),
        Duration::from_secs(config.redis.block_timeout_secs),
        pipeline_metrics.clone(),
    ));

    recover_on_start(&consumer, config.consumer.recover_processing_on_start).await?;

    let publisher = EventPublisher::new(broker.clone(), config.redis.queues.outbound.clone());
    let orchestrator: Arc<dyn MessageHandler> = Arc::new(DeploymentOrchestrator::new(
        chain.clone(),
        publisher,
        pipeline_metrics.clone(),
        token_bytecode,
        DeploymentSettings {
            controller: token_manager,
            token_name_prefix: config.contracts.token_name_prefix.clone(),
            publish_max_attempts: config.publisher.max_attempts,
            publish_backoff: Duration::from_millis(config.publisher.backoff_ms),
        },
    ));

    let health = Arc::new(HealthService::new(
        consumer.clone(),
        chain,
        RequiredContracts {
            model_registry: registry,
            token_manager,
        },
        pipeline_metrics.clone(),
        AlertMonitor::new(&config.health),
    ));

    let admin = config.admin.enabled.then(|| AdminState {
        broker: broker.clone(),
        queues: config.redis.queues.clone(),
        metrics: pipeline_metrics.clone(),
        api_key: config.admin.api_key.clone(),
    });

    let listener = TcpListener::bind(&config.health.bind_address).await?;
    tracing::info!(
        address = %listener.local_addr()?,
        admin_enabled = config.admin.enabled,
        "HTTP server listening"
    );

    let app = build_http_router(health.clone(), admin);
    let server_token = shutdown.subscribe();
    let server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move { server_token.cancelled().await })
            .await
    });

    let sampler_token = shutdown.subscribe();
    let sample_interval = Duration::from_secs(config.health.sample_interval_secs.max(1));
    let sampler_health = health.clone();
    let sampler = tokio::spawn(async move { sampler_health.run_sampler(sample_interval, sampler_token).await });

    let worker = ConsumerWorker::spawn(consumer, orchestrator, shutdown.subscribe());
    tracing::info!("Consumer started");

    wait_for_signal(shutdown.clone()).await;

    let drain_timeout = Duration::from_secs(config.consumer.drain_timeout_secs);
    if !worker.shutdown(drain_timeout).await {
        tracing::warn!("Consumer stopped uncleanly; its message will be recovered on restart");
    }

    if let Err(e) = sampler.await {
        tracing::error!(error = %e, "Sampler task failed");
    }
    match server.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::error!(error = %e, "HTTP server error"),
        Err(e) => tracing::error!(error = %e, "HTTP server task failed"),
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
