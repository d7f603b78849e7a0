//! Health grades and per-component reports.
//!
//! # Grading
//! ```text
//! Healthy   (2): fully operational
//! Degraded  (1): working, but a threshold is crossed (backlog, low balance)
//! Unhealthy (0): cannot do its job (broker down, RPC down, contract missing)
//! ```
//! The aggregate grade is the worst component grade.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Unhealthy,
    Degraded,
    Healthy,
}

impl HealthStatus {
    /// Gauge value exported per component.
    pub fn score(self) -> u8 {
        match self {
            HealthStatus::Healthy => 2,
            HealthStatus::Degraded => 1,
            HealthStatus::Unhealthy => 0,
        }
    }

    /// Worst of the given grades; healthy when empty.
    pub fn worst(statuses: impl IntoIterator<Item = HealthStatus>) -> HealthStatus {
        statuses.into_iter().min().unwrap_or(HealthStatus::Healthy)
    }

    /// Only a hard failure takes the service out of rotation.
    pub fn is_serving(self) -> bool {
        self != HealthStatus::Unhealthy
    }
}

/// One component's grade with what the check observed.
#[derive(Debug, Clone, Serialize)]
pub struct ComponentHealth {
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "serde_json::Value::is_null")]
    pub details: serde_json::Value,
}

impl ComponentHealth {
    pub fn healthy() -> Self {
        Self {
            status: HealthStatus::Healthy,
            latency_ms: None,
            message: None,
            details: serde_json::Value::Null,
        }
    }

    pub fn degraded(message: impl Into<String>) -> Self {
        Self {
            status: HealthStatus::Degraded,
            message: Some(message.into()),
            ..Self::healthy()
        }
    }

    pub fn unhealthy(message: impl Into<String>) -> Self {
        Self {
            status: HealthStatus::Unhealthy,
            message: Some(message.into()),
            ..Self::healthy()
        }
    }

    pub fn with_latency(mut self, latency_ms: u64) -> Self {
        self.latency_ms = Some(latency_ms);
        self
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = details;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worst_grade_wins() {
        use HealthStatus::*;
        assert_eq!(HealthStatus::worst([Healthy, Degraded, Healthy]), Degraded);
        assert_eq!(HealthStatus::worst([Degraded, Unhealthy]), Unhealthy);
        assert_eq!(HealthStatus::worst([]), Healthy);
    }

    #[test]
    fn test_serialization() {
        assert_eq!(serde_json::to_value(HealthStatus::Degraded).unwrap(), "degraded");

        let component = ComponentHealth::unhealthy("connection refused").with_latency(12);
        let json = serde_json::to_value(&component).unwrap();
        assert_eq!(json["status"], "unhealthy");
        assert_eq!(json["latency_ms"], 12);
        assert!(json.get("details").is_none());
    }

    #[test]
    fn test_serving_and_scores() {
        assert!(HealthStatus::Degraded.is_serving());
        assert!(!HealthStatus::Unhealthy.is_serving());
        assert_eq!(HealthStatus::Healthy.score(), 2);
    }
}
