//! Health and metrics subsystem.
//!
//! # Data Flow
//! ```text
//! Consumer / orchestrator events
//!     → aggregator.rs (owned counters, rolling failure and depth windows)
//!
//! Periodic sampler (service.rs):
//!     → queue depths into the aggregator
//!     → alerts.rs thresholds → log
//!
//! HTTP (routes.rs):
//!     → service.rs probes broker, chain, contracts
//!     → status.rs grades each component; aggregate = worst
//! ```
//!
//! # Design Decisions
//! - One `PipelineMetrics` per process, injected everywhere; no global counters
//! - Queue depths inform health only, never control flow
//! - Degraded still serves traffic; only unhealthy returns 503

pub mod aggregator;
pub mod alerts;
pub mod routes;
pub mod service;
pub mod status;

pub use aggregator::{MetricsSnapshot, PipelineMetrics};
pub use alerts::{Alert, AlertKind, AlertMonitor, AlertSeverity};
pub use routes::health_router;
pub use service::{HealthService, RequiredContracts};
pub use status::{ComponentHealth, HealthStatus};
