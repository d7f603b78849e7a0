//! Model token deployment pipeline.

// Pipeline
pub mod blockchain;
pub mod deployment;
pub mod queue;

// Operator surfaces
pub mod admin;
pub mod health;

// Cross-cutting concerns
pub mod config;
pub mod lifecycle;
pub mod observability;
pub mod resilience;

pub use config::schema::DeployerConfig;
pub use deployment::DeploymentOrchestrator;
pub use lifecycle::Shutdown;
