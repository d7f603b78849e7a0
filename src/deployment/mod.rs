//! Token deployment pipeline.
//!
//! `orchestrator` is the `MessageHandler` the consumer drives; `event` builds the
//! record published once a model's token is deployed and registered.

pub mod event;
pub mod orchestrator;

pub use event::{token_name, TokenDeployedEvent};
pub use orchestrator::{DeploymentOrchestrator, DeploymentOutcome, DeploymentSettings, PipelineError};
