//! Metrics collection and exposition.
//!
//! # Metrics
//! - `deployer_messages_total` (counter): messages by outcome
//! - `deployer_tokens_deployed_total` (counter): successful token deployments
//! - `deployer_deployments_skipped_total` (counter): idempotent no-ops
//! - `deployer_gas_used_total` (counter): gas consumed by deployments
//! - `deployer_deployment_duration_seconds` (histogram): end-to-end deploy latency
//! - `deployer_failures_total` (counter): failures by reason
//! - `deployer_queue_depth` (gauge): depth per queue
//! - `deployer_component_health` (gauge): 2=healthy, 1=degraded, 0=unhealthy
//! - `deployer_chain_retries_total` (counter): retried chain writes by operation
//!
//! # Design Decisions
//! - These helpers only mirror state into the exporter; health decisions read
//!   the owned `PipelineMetrics` aggregator, never the global recorder
//! - Exporter is optional; without it the macros are no-ops

use std::net::SocketAddr;
use std::time::Duration;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter with an HTTP listener on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_message(outcome: &'static str) {
    metrics::counter!("deployer_messages_total", "outcome" => outcome).increment(1);
}

pub fn record_deployment(gas_used: u64, duration: Duration) {
    metrics::counter!("deployer_tokens_deployed_total").increment(1);
    metrics::counter!("deployer_gas_used_total").increment(gas_used);
    metrics::histogram!("deployer_deployment_duration_seconds").record(duration.as_secs_f64());
}

pub fn record_deployment_skipped() {
    metrics::counter!("deployer_deployments_skipped_total").increment(1);
}

pub fn record_failure(reason: &str) {
    metrics::counter!("deployer_failures_total", "reason" => reason.to_string()).increment(1);
}

pub fn record_queue_depth(queue: &'static str, depth: u64) {
    metrics::gauge!("deployer_queue_depth", "queue" => queue).set(depth as f64);
}

pub fn record_component_health(component: &'static str, score: u8) {
    metrics::gauge!("deployer_component_health", "component" => component).set(f64::from(score));
}

pub fn record_chain_retry(operation: &'static str) {
    metrics::counter!("deployer_chain_retries_total", "operation" => operation).increment(1);
}
