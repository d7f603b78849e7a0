//! Health views over the broker, the chain and the pipeline metrics.
//!
//! # Views
//! - liveness: the process is running
//! - readiness: bytecode present at both the registry and the token manager
//! - basic: aggregate grade of all components
//! - detailed: per-component grades with latencies, queue depths, balance and alerts
//!
//! Every check reports problems instead of failing.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use alloy::primitives::Address;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;

use crate::blockchain::DeploymentChain;
use crate::health::aggregator::{MetricsSnapshot, PipelineMetrics};
use crate::health::alerts::{log_alerts, wei_to_eth, Alert, AlertMonitor};
use crate::health::status::{ComponentHealth, HealthStatus};
use crate::observability::metrics;
use crate::queue::{QueueConsumer, QueueDepthSnapshot};

#[derive(Debug, Clone, Serialize)]
pub struct Liveness {
    pub status: &'static str,
    pub uptime_secs: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Readiness {
    pub ready: bool,
    pub model_registry_deployed: bool,
    pub token_manager_deployed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BasicHealth {
    pub status: HealthStatus,
    pub components: BTreeMap<&'static str, HealthStatus>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DetailedHealth {
    pub status: HealthStatus,
    pub components: BTreeMap<&'static str, ComponentHealth>,
    pub alerts: Vec<Alert>,
    pub metrics: MetricsSnapshot,
    pub timestamp: DateTime<Utc>,
}

/// Addresses whose bytecode must exist before the service accepts work.
#[derive(Debug, Clone, Copy)]
pub struct RequiredContracts {
    pub model_registry: Address,
    pub token_manager: Address,
}

pub struct HealthService {
    consumer: Arc<QueueConsumer>,
    chain: Arc<dyn DeploymentChain>,
    contracts: RequiredContracts,
    metrics: Arc<PipelineMetrics>,
    alerts: AlertMonitor,
    started: Instant,
}

impl HealthService {
    pub fn new(
        consumer: Arc<QueueConsumer>,
        chain: Arc<dyn DeploymentChain>,
        contracts: RequiredContracts,
        metrics: Arc<PipelineMetrics>,
        alerts: AlertMonitor,
    ) -> Self {
        Self {
            consumer,
            chain,
            contracts,
            metrics,
            alerts,
            started: Instant::now(),
        }
    }

    pub fn metrics(&self) -> &Arc<PipelineMetrics> {
        &self.metrics
    }

    pub fn liveness(&self) -> Liveness {
        Liveness {
            status: "alive",
            uptime_secs: self.started.elapsed().as_secs(),
        }
    }

    pub async fn readiness(&self) -> Readiness {
        let registry = self.chain.has_contract_code(self.contracts.model_registry).await;
        let manager = self.chain.has_contract_code(self.contracts.token_manager).await;

        match (registry, manager) {
            (Ok(registry), Ok(manager)) => Readiness {
                ready: registry && manager,
                model_registry_deployed: registry,
                token_manager_deployed: manager,
                error: None,
            },
            (Err(e), _) | (_, Err(e)) => Readiness {
                ready: false,
                model_registry_deployed: false,
                token_manager_deployed: false,
                error: Some(e.to_string()),
            },
        }
    }

    pub async fn basic(&self) -> BasicHealth {
        let detailed = self.detailed().await;
        BasicHealth {
            status: detailed.status,
            components: detailed
                .components
                .iter()
                .map(|(name, component)| (*name, component.status))
                .collect(),
            timestamp: detailed.timestamp,
        }
    }

    pub async fn detailed(&self) -> DetailedHealth {
        let (broker, depths) = self.check_broker().await;
        let (chain, balance_alert) = self.check_chain().await;
        let contracts = self.check_contracts().await;

        let mut alerts = self.alerts.evaluate(&self.metrics, depths.as_ref());
        alerts.extend(balance_alert);

        let pipeline = if alerts.is_empty() {
            ComponentHealth::healthy()
        } else {
            ComponentHealth::degraded(format!("{} active alert(s)", alerts.len()))
        };

        let mut components = BTreeMap::new();
        components.insert("broker", broker);
        components.insert("chain", chain);
        components.insert("contracts", contracts);
        components.insert("pipeline", pipeline);

        for (name, component) in &components {
            metrics::record_component_health(*name, component.status.score());
        }

        DetailedHealth {
            status: HealthStatus::worst(components.values().map(|c| c.status)),
            components,
            alerts,
            metrics: self.metrics.snapshot(),
            timestamp: Utc::now(),
        }
    }

    async fn check_broker(&self) -> (ComponentHealth, Option<QueueDepthSnapshot>) {
        let health = self.consumer.check_health().await;
        if !health.healthy {
            let message = health.error.unwrap_or_else(|| "broker unreachable".to_string());
            return (ComponentHealth::unhealthy(message).with_latency(health.latency_ms), None);
        }

        let depths = health.depths;
        let backlog = depths
            .as_ref()
            .map(|d| self.alerts.evaluate_depths(d))
            .unwrap_or_default();
        let component = if backlog.is_empty() {
            ComponentHealth::healthy()
        } else {
            ComponentHealth::degraded(
                backlog
                    .iter()
                    .map(|a| a.message.as_str())
                    .collect::<Vec<_>>()
                    .join("; "),
            )
        };

        (
            component
                .with_latency(health.latency_ms)
                .with_details(json!({ "queue_depths": depths })),
            depths,
        )
    }

    async fn check_chain(&self) -> (ComponentHealth, Option<Alert>) {
        let start = Instant::now();
        let block_number = match self.chain.block_number().await {
            Ok(block_number) => block_number,
            Err(e) => {
                return (ComponentHealth::unhealthy(e.to_string()).with_latency(elapsed_ms(start)), None);
            }
        };
        let latency_ms = elapsed_ms(start);

        let details = |balance: Option<f64>| {
            json!({
                "block_number": block_number,
                "chain_id": self.chain.chain_id(),
                "deployer": self.chain.deployer_address().to_string(),
                "balance_eth": balance,
            })
        };

        match self.chain.deployer_balance().await {
            Ok(balance) => {
                let alert = self.alerts.evaluate_balance(balance);
                let component = match &alert {
                    Some(alert) => ComponentHealth::degraded(alert.message.clone()),
                    None => ComponentHealth::healthy(),
                };
                (
                    component
                        .with_latency(latency_ms)
                        .with_details(details(Some(wei_to_eth(balance)))),
                    alert,
                )
            }
            Err(e) => (
                ComponentHealth::degraded(format!("balance unavailable: {}", e))
                    .with_latency(latency_ms)
                    .with_details(details(None)),
                None,
            ),
        }
    }

    async fn check_contracts(&self) -> ComponentHealth {
        let readiness = self.readiness().await;
        let details = json!({
            "model_registry": self.contracts.model_registry.to_string(),
            "model_registry_deployed": readiness.model_registry_deployed,
            "token_manager": self.contracts.token_manager.to_string(),
            "token_manager_deployed": readiness.token_manager_deployed,
        });

        let component = match readiness.error {
            Some(error) => ComponentHealth::unhealthy(error),
            None if readiness.ready => ComponentHealth::healthy(),
            None => ComponentHealth::unhealthy("required contract bytecode missing"),
        };
        component.with_details(details)
    }

    /// Take one queue depth sample and log any alerts it raises.
    pub async fn sample(&self) -> Vec<Alert> {
        let health = self.consumer.check_health().await;
        let depths = health.depths;
        if let Some(depths) = depths {
            self.metrics.record_depths(depths);
        } else if let Some(error) = &health.error {
            tracing::warn!(%error, "Queue depth sample failed");
        }

        let alerts = self.alerts.evaluate(&self.metrics, depths.as_ref());
        log_alerts(&alerts);
        alerts
    }

    /// Sample on `interval` until `token` is cancelled.
    pub async fn run_sampler(&self, interval: Duration, token: tokio_util::sync::CancellationToken) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        tracing::info!(interval_secs = interval.as_secs(), "Queue depth sampler starting");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.sample().await;
                }
                _ = token.cancelled() => {
                    tracing::info!("Queue depth sampler stopped");
                    break;
                }
            }
        }
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}
