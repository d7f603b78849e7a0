//! Deployment orchestrator: the message handler behind the consumer.
//!
//! # Data Flow
//! ```text
//! ModelReadyMessage
//!     → check_model_exists ── registered ──▶ Ok (no-op)
//!     → deploy_contract (token bytecode + constructor args)
//!     → register_model (model_id → token address)
//!     → TokenDeployedEvent
//!     → publish_with_retry
//! ```
//!
//! # Design Decisions
//! - The registry is the source of truth for idempotency; nothing is cached locally
//! - Errors are returned as-is; retry and dead-lettering belong to the consumer
//! - A contract deployed but never registered is an accepted orphan, recovered by hand

use std::sync::Arc;
use std::time::{Duration, Instant};

use alloy::primitives::{Address, Bytes};
use async_trait::async_trait;
use chrono::Utc;
use thiserror::Error;

use crate::blockchain::{encode_token_constructor, BlockchainError, DeploymentChain, RegistrationMetadata};
use crate::deployment::event::{token_name, TokenDeployedEvent};
use crate::health::PipelineMetrics;
use crate::queue::{EventPublisher, HandlerError, MessageHandler, ModelReadyMessage, PublishError};

/// Why one pipeline run failed. Each variant escalates to message-level retry.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("idempotency check failed: {0}")]
    ExistenceCheck(BlockchainError),

    #[error("{0}")]
    Deployment(BlockchainError),

    #[error("registration failed: {0}")]
    Registration(BlockchainError),

    #[error("{0}")]
    Publish(#[from] PublishError),
}

impl PipelineError {
    /// Short label used for failure metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            PipelineError::ExistenceCheck(_) => "existence_check",
            PipelineError::Deployment(_) => "deployment",
            PipelineError::Registration(_) => "registration",
            PipelineError::Publish(_) => "publish",
        }
    }
}

impl From<PipelineError> for HandlerError {
    fn from(error: PipelineError) -> Self {
        HandlerError::new(error.reason(), error.to_string())
    }
}

/// What a successful run did.
#[derive(Debug, Clone, PartialEq)]
pub enum DeploymentOutcome {
    /// Model already registered; nothing was sent to the chain.
    AlreadyRegistered,
    Deployed(Box<TokenDeployedEvent>),
}

/// Static inputs of every deployment.
#[derive(Debug, Clone)]
pub struct DeploymentSettings {
    /// Token manager address, passed as each token's controller.
    pub controller: Address,
    pub token_name_prefix: String,
    pub publish_max_attempts: u32,
    pub publish_backoff: Duration,
}

pub struct DeploymentOrchestrator {
    chain: Arc<dyn DeploymentChain>,
    publisher: EventPublisher,
    metrics: Arc<PipelineMetrics>,
    token_bytecode: Bytes,
    settings: DeploymentSettings,
}

impl DeploymentOrchestrator {
    pub fn new(
        chain: Arc<dyn DeploymentChain>,
        publisher: EventPublisher,
        metrics: Arc<PipelineMetrics>,
        token_bytecode: Bytes,
        settings: DeploymentSettings,
    ) -> Self {
        Self {
            chain,
            publisher,
            metrics,
            token_bytecode,
            settings,
        }
    }

    /// Run the pipeline for one validated message.
    pub async fn run(&self, message: &ModelReadyMessage) -> Result<DeploymentOutcome, PipelineError> {
        let model_id = message.model_id.as_str();

        if self
            .chain
            .check_model_exists(model_id)
            .await
            .map_err(PipelineError::ExistenceCheck)?
        {
            tracing::info!(model_id, "Model already registered, skipping deployment");
            self.metrics.record_skipped();
            return Ok(DeploymentOutcome::AlreadyRegistered);
        }

        let name = token_name(&self.settings.token_name_prefix, &message.model_name);
        let constructor_args = encode_token_constructor(&name, &message.token_symbol, self.settings.controller);

        tracing::info!(model_id, token_symbol = %message.token_symbol, token_name = %name, "Deploying token");
        let started = Instant::now();
        let deployment = self
            .chain
            .deploy_contract(self.token_bytecode.clone(), constructor_args)
            .await
            .map_err(PipelineError::Deployment)?;
        self.metrics.record_deployment(deployment.gas_used, started.elapsed());

        let metadata = RegistrationMetadata {
            metric_name: message.metric_name.clone(),
            mlflow_run_id: message.mlflow_run_id.clone(),
        };
        let registration = self
            .chain
            .register_model(model_id, deployment.contract_address, &metadata)
            .await
            .map_err(|e| {
                tracing::error!(
                    model_id,
                    token_address = %deployment.contract_address,
                    error = %e,
                    "Token deployed but registration failed; contract is orphaned until registered"
                );
                PipelineError::Registration(e)
            })?;
        tracing::info!(
            model_id,
            token_address = %deployment.contract_address,
            tx_hash = %registration.transaction_hash,
            "Model registered"
        );

        let event = TokenDeployedEvent::new(
            message,
            name,
            &deployment,
            &registration,
            self.chain.chain_id(),
            Utc::now(),
        );
        self.publisher
            .publish_with_retry(&event, self.settings.publish_max_attempts, self.settings.publish_backoff)
            .await
            .map_err(|e| {
                // Redelivery will see the model registered and skip, so this event is lost.
                tracing::error!(
                    model_id,
                    token_address = %event.token_address,
                    error = %e,
                    "Token registered but completion event was not published"
                );
                PipelineError::Publish(e)
            })?;

        Ok(DeploymentOutcome::Deployed(Box::new(event)))
    }
}

#[async_trait]
impl MessageHandler for DeploymentOrchestrator {
    async fn handle(&self, message: &ModelReadyMessage) -> Result<(), HandlerError> {
        self.run(message).await.map(|_| ()).map_err(HandlerError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::{BlockchainResult, DeploymentResult, RegistrationResult};
    use crate::queue::message::tests::valid_payload;
    use crate::queue::{Broker, InMemoryBroker};
    use alloy::primitives::{TxHash, U256};
    use std::sync::Mutex;

    #[derive(Default)]
    struct ScriptedChain {
        registered: Mutex<Vec<(String, Address)>>,
        deploys: Mutex<Vec<Bytes>>,
        fail_deploy: bool,
        fail_register: bool,
    }

    #[async_trait]
    impl DeploymentChain for ScriptedChain {
        async fn check_model_exists(&self, model_id: &str) -> BlockchainResult<bool> {
            Ok(self.registered.lock().unwrap().iter().any(|(id, _)| id == model_id))
        }

        async fn deploy_contract(&self, _bytecode: Bytes, constructor_args: Bytes) -> BlockchainResult<DeploymentResult> {
            if self.fail_deploy {
                return Err(BlockchainError::DeploymentFailed {
                    attempts: 3,
                    last_error: "RPC error: nonce too low".to_string(),
                });
            }
            self.deploys.lock().unwrap().push(constructor_args);
            Ok(DeploymentResult {
                contract_address: Address::repeat_byte(0xaa),
                transaction_hash: TxHash::repeat_byte(0x01),
                block_number: 7,
                gas_used: 1_500_000,
                effective_gas_price: 1_000_000_000,
            })
        }

        async fn register_model(
            &self,
            model_id: &str,
            token_address: Address,
            _metadata: &RegistrationMetadata,
        ) -> BlockchainResult<RegistrationResult> {
            if self.fail_register {
                return Err(BlockchainError::RegistrationRejected("execution reverted: already registered".to_string()));
            }
            self.registered.lock().unwrap().push((model_id.to_string(), token_address));
            Ok(RegistrationResult {
                transaction_hash: TxHash::repeat_byte(0x02),
            })
        }

        async fn has_contract_code(&self, _address: Address) -> BlockchainResult<bool> {
            Ok(true)
        }

        async fn deployer_balance(&self) -> BlockchainResult<U256> {
            Ok(U256::ZERO)
        }

        async fn block_number(&self) -> BlockchainResult<u64> {
            Ok(7)
        }

        fn deployer_address(&self) -> Address {
            Address::repeat_byte(0x01)
        }

        fn chain_id(&self) -> u64 {
            31337
        }
    }

    fn orchestrator(chain: Arc<ScriptedChain>, broker: Arc<InMemoryBroker>) -> DeploymentOrchestrator {
        DeploymentOrchestrator::new(
            chain,
            EventPublisher::new(broker, "out"),
            Arc::new(PipelineMetrics::default()),
            Bytes::from_static(&[0x60, 0x80]),
            DeploymentSettings {
                controller: Address::repeat_byte(0x33),
                token_name_prefix: "Hokusai".to_string(),
                publish_max_attempts: 2,
                publish_backoff: Duration::from_millis(10),
            },
        )
    }

    fn message() -> ModelReadyMessage {
        ModelReadyMessage::from_value(valid_payload()).unwrap()
    }

    #[tokio::test]
    async fn test_full_run_publishes_one_event() {
        let chain = Arc::new(ScriptedChain::default());
        let broker = Arc::new(InMemoryBroker::new());
        let orchestrator = orchestrator(chain.clone(), broker.clone());

        let outcome = orchestrator.run(&message()).await.unwrap();

        let DeploymentOutcome::Deployed(event) = outcome else {
            panic!("expected a deployment");
        };
        assert_eq!(event.model_id, "m1");
        assert_eq!(event.token_name, "Hokusai Sentiment Classifier");
        assert_eq!(chain.registered.lock().unwrap().as_slice(), &[("m1".to_string(), Address::repeat_byte(0xaa))]);
        assert_eq!(broker.contents("out").len(), 1);
    }

    #[tokio::test]
    async fn test_registered_model_is_skipped() {
        let chain = Arc::new(ScriptedChain::default());
        chain.registered.lock().unwrap().push(("m1".to_string(), Address::repeat_byte(0xaa)));
        let broker = Arc::new(InMemoryBroker::new());
        let orchestrator = orchestrator(chain.clone(), broker.clone());

        let outcome = orchestrator.run(&message()).await.unwrap();

        assert_eq!(outcome, DeploymentOutcome::AlreadyRegistered);
        assert!(chain.deploys.lock().unwrap().is_empty());
        assert!(broker.contents("out").is_empty());
    }

    #[tokio::test]
    async fn test_deploy_failure_propagates_unchanged() {
        let chain = Arc::new(ScriptedChain {
            fail_deploy: true,
            ..ScriptedChain::default()
        });
        let broker = Arc::new(InMemoryBroker::new());
        let handler_error = orchestrator(chain, broker.clone())
            .handle(&message())
            .await
            .unwrap_err();

        assert_eq!(handler_error.reason, "deployment");
        assert_eq!(
            handler_error.message,
            "Deployment failed after 3 attempts: RPC error: nonce too low"
        );
        assert!(broker.contents("out").is_empty());
    }

    #[tokio::test]
    async fn test_registration_rejection_is_not_swallowed() {
        let chain = Arc::new(ScriptedChain {
            fail_register: true,
            ..ScriptedChain::default()
        });
        let broker = Arc::new(InMemoryBroker::new());
        let err = orchestrator(chain.clone(), broker.clone()).run(&message()).await.unwrap_err();

        assert_eq!(err.reason(), "registration");
        assert_eq!(chain.deploys.lock().unwrap().len(), 1);
        assert!(broker.contents("out").is_empty());
    }

    #[tokio::test]
    async fn test_publish_exhaustion_fails_the_run() {
        let chain = Arc::new(ScriptedChain::default());
        let broker = Arc::new(InMemoryBroker::new());
        broker.fail_next_enqueues(2);

        let err = orchestrator(chain, broker.clone()).run(&message()).await.unwrap_err();
        assert_eq!(err.reason(), "publish");
        assert!(err.to_string().contains("after 2 attempts"));
        assert_eq!(broker.depth("out").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_constructor_args_carry_name_symbol_controller() {
        use alloy::sol_types::SolValue;

        let chain = Arc::new(ScriptedChain::default());
        let broker = Arc::new(InMemoryBroker::new());
        orchestrator(chain.clone(), broker).run(&message()).await.unwrap();

        let args = chain.deploys.lock().unwrap()[0].clone();
        let (name, symbol, controller) = <(String, String, Address)>::abi_decode_params(&args).unwrap();
        assert_eq!(name, "Hokusai Sentiment Classifier");
        assert_eq!(symbol, "HK1");
        assert_eq!(controller, Address::repeat_byte(0x33));
    }
}
