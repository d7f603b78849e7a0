//! Threshold alerting.
//!
//! # Checks
//! - Failure rate: at least `failure_threshold` failures within `failure_window_secs`
//! - Backlog: inbound or processing depth above its ceiling
//! - Dead letters: dead-letter depth above its ceiling
//! - Funds: deployer balance below `min_deployer_balance_eth`
//!
//! Alerts are derived on demand from the aggregator; nothing here holds state.

use std::time::Duration;

use alloy::primitives::U256;
use serde::Serialize;

use crate::config::HealthConfig;
use crate::health::aggregator::PipelineMetrics;
use crate::queue::QueueDepthSnapshot;

const WEI_PER_ETH: f64 = 1e18;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    FailureRate,
    InboundBacklog,
    ProcessingStuck,
    DeadLetterBacklog,
    LowBalance,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Warning,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Alert {
    pub kind: AlertKind,
    pub severity: AlertSeverity,
    pub message: String,
}

impl Alert {
    fn new(kind: AlertKind, severity: AlertSeverity, message: String) -> Self {
        Self { kind, severity, message }
    }
}

/// Evaluates the configured thresholds.
#[derive(Debug, Clone)]
pub struct AlertMonitor {
    failure_threshold: usize,
    failure_window: Duration,
    max_inbound_depth: u64,
    max_processing_depth: u64,
    max_dead_letter_depth: u64,
    min_balance_wei: U256,
}

impl AlertMonitor {
    pub fn new(config: &HealthConfig) -> Self {
        Self {
            failure_threshold: config.failure_threshold,
            failure_window: Duration::from_secs(config.failure_window_secs),
            max_inbound_depth: config.max_inbound_depth,
            max_processing_depth: config.max_processing_depth,
            max_dead_letter_depth: config.max_dead_letter_depth,
            min_balance_wei: eth_to_wei(config.min_deployer_balance_eth),
        }
    }

    pub fn min_balance_wei(&self) -> U256 {
        self.min_balance_wei
    }

    /// Failure-rate and queue-depth alerts.
    pub fn evaluate(&self, metrics: &PipelineMetrics, depths: Option<&QueueDepthSnapshot>) -> Vec<Alert> {
        let mut alerts = Vec::new();

        let failures = metrics.failures_within(self.failure_window);
        if failures >= self.failure_threshold {
            alerts.push(Alert::new(
                AlertKind::FailureRate,
                AlertSeverity::Critical,
                format!(
                    "{} failures in the last {}s (threshold {})",
                    failures,
                    self.failure_window.as_secs(),
                    self.failure_threshold
                ),
            ));
        }

        if let Some(depths) = depths {
            alerts.extend(self.evaluate_depths(depths));
        }
        alerts
    }

    /// Queue ceiling alerts for one snapshot.
    pub fn evaluate_depths(&self, depths: &QueueDepthSnapshot) -> Vec<Alert> {
        let mut alerts = Vec::new();

        if depths.inbound > self.max_inbound_depth {
            alerts.push(Alert::new(
                AlertKind::InboundBacklog,
                AlertSeverity::Warning,
                format!("inbound queue depth {} exceeds {}", depths.inbound, self.max_inbound_depth),
            ));
        }
        if depths.processing > self.max_processing_depth {
            alerts.push(Alert::new(
                AlertKind::ProcessingStuck,
                AlertSeverity::Warning,
                format!(
                    "processing queue depth {} exceeds {}; the worker may be stuck",
                    depths.processing, self.max_processing_depth
                ),
            ));
        }
        if depths.dead_letter > self.max_dead_letter_depth {
            alerts.push(Alert::new(
                AlertKind::DeadLetterBacklog,
                AlertSeverity::Critical,
                format!(
                    "dead-letter queue depth {} exceeds {}",
                    depths.dead_letter, self.max_dead_letter_depth
                ),
            ));
        }
        alerts
    }

    /// Low-balance alert; critical when the deployer cannot pay for anything.
    pub fn evaluate_balance(&self, balance_wei: U256) -> Option<Alert> {
        if balance_wei >= self.min_balance_wei {
            return None;
        }
        let severity = if balance_wei.is_zero() {
            AlertSeverity::Critical
        } else {
            AlertSeverity::Warning
        };
        Some(Alert::new(
            AlertKind::LowBalance,
            severity,
            format!(
                "deployer balance {:.6} ETH is below {:.6} ETH",
                wei_to_eth(balance_wei),
                wei_to_eth(self.min_balance_wei)
            ),
        ))
    }
}

/// Emit alerts to the log at a level matching their severity.
pub fn log_alerts(alerts: &[Alert]) {
    for alert in alerts {
        match alert.severity {
            AlertSeverity::Critical => tracing::error!(kind = ?alert.kind, "{}", alert.message),
            AlertSeverity::Warning => tracing::warn!(kind = ?alert.kind, "{}", alert.message),
        }
    }
}

pub fn eth_to_wei(eth: f64) -> U256 {
    if !eth.is_finite() || eth <= 0.0 {
        return U256::ZERO;
    }
    U256::from((eth * WEI_PER_ETH) as u128)
}

pub fn wei_to_eth(wei: U256) -> f64 {
    let wei: u128 = wei.try_into().unwrap_or(u128::MAX);
    wei as f64 / WEI_PER_ETH
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn monitor() -> AlertMonitor {
        AlertMonitor::new(&HealthConfig {
            failure_threshold: 3,
            max_inbound_depth: 10,
            max_processing_depth: 1,
            max_dead_letter_depth: 0,
            min_deployer_balance_eth: 0.5,
            ..HealthConfig::default()
        })
    }

    fn depths(inbound: u64, processing: u64, dead_letter: u64) -> QueueDepthSnapshot {
        QueueDepthSnapshot {
            inbound,
            processing,
            dead_letter,
            outbound: 0,
            taken_at: Utc::now(),
        }
    }

    #[test]
    fn test_failure_rate_threshold() {
        let monitor = monitor();
        let metrics = PipelineMetrics::default();
        metrics.record_failure("deployment");
        metrics.record_failure("deployment");
        assert!(monitor.evaluate(&metrics, None).is_empty());

        metrics.record_failure("publish");
        let alerts = monitor.evaluate(&metrics, None);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].kind, AlertKind::FailureRate);
        assert_eq!(alerts[0].severity, AlertSeverity::Critical);
    }

    #[test]
    fn test_depth_ceilings() {
        let monitor = monitor();
        assert!(monitor.evaluate_depths(&depths(10, 1, 0)).is_empty());

        let kinds: Vec<AlertKind> = monitor
            .evaluate_depths(&depths(11, 2, 1))
            .into_iter()
            .map(|a| a.kind)
            .collect();
        assert_eq!(
            kinds,
            vec![AlertKind::InboundBacklog, AlertKind::ProcessingStuck, AlertKind::DeadLetterBacklog]
        );
    }

    #[test]
    fn test_low_balance() {
        let monitor = monitor();
        assert!(monitor.evaluate_balance(eth_to_wei(1.0)).is_none());

        let alert = monitor.evaluate_balance(eth_to_wei(0.1)).unwrap();
        assert_eq!(alert.severity, AlertSeverity::Warning);
        assert!(alert.message.contains("0.100000 ETH"));

        let alert = monitor.evaluate_balance(U256::ZERO).unwrap();
        assert_eq!(alert.severity, AlertSeverity::Critical);
    }

    #[test]
    fn test_unit_conversion() {
        assert_eq!(eth_to_wei(1.0), U256::from(1_000_000_000_000_000_000u128));
        assert_eq!(eth_to_wei(-1.0), U256::ZERO);
        assert!((wei_to_eth(U256::from(500_000_000_000_000_000u128)) - 0.5).abs() < 1e-12);
    }
}
