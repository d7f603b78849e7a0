//! Shared fixtures for integration tests: an in-memory pipeline and a fake chain.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use alloy::primitives::{address, Address, Bytes, B256, U256};
use async_trait::async_trait;
use serde_json::{json, Value};

use model_token_deployer::blockchain::{
    BlockchainError, BlockchainResult, DeploymentChain, DeploymentResult, RegistrationMetadata,
    RegistrationResult,
};
use model_token_deployer::config::{ConsumerConfig, HealthConfig, QueueNames};
use model_token_deployer::deployment::{DeploymentOrchestrator, DeploymentSettings};
use model_token_deployer::health::{AlertMonitor, HealthService, PipelineMetrics, RequiredContracts};
use model_token_deployer::queue::{Broker, InMemoryBroker, ProcessOutcome, QueueConsumer};

pub const TOKEN_ADDRESS: Address = address!("AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA");
pub const REGISTRY_ADDRESS: Address = address!("1111111111111111111111111111111111111111");
pub const MANAGER_ADDRESS: Address = address!("2222222222222222222222222222222222222222");
pub const DEPLOYER_ADDRESS: Address = address!("f39Fd6e51aad88F6F4ce6aB8827279cffFb92266");
pub const CHAIN_ID: u64 = 31337;

/// A chain that records calls and keeps the registry in memory.
pub struct FakeChain {
    registry: Mutex<HashMap<String, Address>>,
    code: Mutex<HashSet<Address>>,
    deploy_error: Mutex<Option<String>>,
    balance: Mutex<U256>,
    pub existence_checks: AtomicU32,
    pub deploys: AtomicU32,
    pub registrations: AtomicU32,
}

impl FakeChain {
    pub fn new() -> Self {
        Self {
            registry: Mutex::new(HashMap::new()),
            code: Mutex::new([REGISTRY_ADDRESS, MANAGER_ADDRESS].into_iter().collect()),
            deploy_error: Mutex::new(None),
            balance: Mutex::new(U256::from(10u128.pow(18))),
            existence_checks: AtomicU32::new(0),
            deploys: AtomicU32::new(0),
            registrations: AtomicU32::new(0),
        }
    }

    /// Make every deploy fail as if the client's own retries were exhausted.
    pub fn fail_deploys(&self, last_error: &str) {
        *self.deploy_error.lock().unwrap() = Some(last_error.to_string());
    }

    pub fn remove_code(&self, address: Address) {
        self.code.lock().unwrap().remove(&address);
    }

    pub fn set_balance(&self, wei: U256) {
        *self.balance.lock().unwrap() = wei;
    }

    pub fn registered(&self, model_id: &str) -> Option<Address> {
        self.registry.lock().unwrap().get(model_id).copied()
    }

    pub fn deploy_count(&self) -> u32 {
        self.deploys.load(Ordering::SeqCst)
    }

    pub fn registration_count(&self) -> u32 {
        self.registrations.load(Ordering::SeqCst)
    }

    pub fn existence_check_count(&self) -> u32 {
        self.existence_checks.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DeploymentChain for FakeChain {
    async fn check_model_exists(&self, model_id: &str) -> BlockchainResult<bool> {
        self.existence_checks.fetch_add(1, Ordering::SeqCst);
        Ok(self.registry.lock().unwrap().contains_key(model_id))
    }

    async fn deploy_contract(&self, _bytecode: Bytes, _constructor_args: Bytes) -> BlockchainResult<DeploymentResult> {
        self.deploys.fetch_add(1, Ordering::SeqCst);
        if let Some(last_error) = self.deploy_error.lock().unwrap().clone() {
            return Err(BlockchainError::DeploymentFailed { attempts: 3, last_error });
        }
        Ok(DeploymentResult {
            contract_address: TOKEN_ADDRESS,
            transaction_hash: B256::repeat_byte(0x11),
            block_number: 100,
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
        self.registrations.fetch_add(1, Ordering::SeqCst);
        self.registry.lock().unwrap().insert(model_id.to_string(), token_address);
        Ok(RegistrationResult {
            transaction_hash: B256::repeat_byte(0x22),
        })
    }

    async fn has_contract_code(&self, address: Address) -> BlockchainResult<bool> {
        Ok(self.code.lock().unwrap().contains(&address))
    }

    async fn deployer_balance(&self) -> BlockchainResult<U256> {
        Ok(*self.balance.lock().unwrap())
    }

    async fn block_number(&self) -> BlockchainResult<u64> {
        Ok(100)
    }

    fn deployer_address(&self) -> Address {
        DEPLOYER_ADDRESS
    }

    fn chain_id(&self) -> u64 {
        CHAIN_ID
    }
}

/// A complete pipeline over the in-memory broker and the fake chain.
pub struct Pipeline {
    pub broker: Arc<InMemoryBroker>,
    pub chain: Arc<FakeChain>,
    pub metrics: Arc<PipelineMetrics>,
    pub consumer: Arc<QueueConsumer>,
    pub orchestrator: Arc<DeploymentOrchestrator>,
    pub queues: QueueNames,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::with_max_retries(3)
    }

    pub fn with_max_retries(max_retries: u32) -> Self {
        let broker = Arc::new(InMemoryBroker::new());
        let chain = Arc::new(FakeChain::new());
        let metrics = Arc::new(PipelineMetrics::new(16));
        let queues = QueueNames::default();

        let consumer = Arc::new(QueueConsumer::new(
            broker.clone(),
            queues.clone(),
            ConsumerConfig {
                max_retries,
                error_backoff_ms: 10,
                ..ConsumerConfig::default()
            },
            Duration::from_millis(20),
            metrics.clone(),
        ));

        let publisher = model_token_deployer::queue::EventPublisher::new(broker.clone(), queues.outbound.clone());
        let orchestrator = Arc::new(DeploymentOrchestrator::new(
            chain.clone(),
            publisher,
            metrics.clone(),
            Bytes::from_static(&[0x60, 0x80, 0x60, 0x40]),
            DeploymentSettings {
                controller: MANAGER_ADDRESS,
                token_name_prefix: "Hokusai".to_string(),
                publish_max_attempts: 3,
                publish_backoff: Duration::from_millis(1),
            },
        ));

        Self {
            broker,
            chain,
            metrics,
            consumer,
            orchestrator,
            queues,
        }
    }

    pub async fn submit(&self, payload: &Value) {
        self.submit_raw(&payload.to_string()).await;
    }

    pub async fn submit_raw(&self, raw: &str) {
        self.broker.enqueue(&self.queues.inbound, raw).await.unwrap();
    }

    /// Process exactly one delivery.
    pub async fn step(&self) -> ProcessOutcome {
        self.consumer.process_one(self.orchestrator.as_ref()).await.unwrap()
    }

    pub fn health_service(&self, config: &HealthConfig) -> Arc<HealthService> {
        Arc::new(HealthService::new(
            self.consumer.clone(),
            self.chain.clone(),
            RequiredContracts {
                model_registry: REGISTRY_ADDRESS,
                token_manager: MANAGER_ADDRESS,
            },
            self.metrics.clone(),
            AlertMonitor::new(config),
        ))
    }

    pub fn inbound(&self) -> Vec<Value> {
        self.parsed(&self.queues.inbound)
    }

    pub fn processing(&self) -> Vec<String> {
        self.broker.contents(&self.queues.processing)
    }

    pub fn dead_letters(&self) -> Vec<Value> {
        self.parsed(&self.queues.dead_letter)
    }

    pub fn outbound(&self) -> Vec<Value> {
        self.parsed(&self.queues.outbound)
    }

    fn parsed(&self, queue: &str) -> Vec<Value> {
        self.broker
            .contents(queue)
            .iter()
            .map(|raw| serde_json::from_str(raw).unwrap())
            .collect()
    }
}

/// A valid model-ready payload for `model_id`.
pub fn model_ready(model_id: &str, token_symbol: &str) -> Value {
    json!({
        "model_id": model_id,
        "token_symbol": token_symbol,
        "metric_name": "accuracy",
        "baseline_value": 0.82,
        "current_value": 0.85,
        "model_name": "Sentiment Classifier",
        "model_version": "3",
        "mlflow_run_id": "run-abc123",
        "improvement_percentage": 3.5,
        "timestamp": "2024-05-01T12:00:00Z",
        "message_version": "1.0",
        "contributor_address": "0x742d35Cc6634C0532925a3b844Bc9e7595f2bD3e"
    })
}
