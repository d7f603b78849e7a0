//! The chain operations the deployment pipeline depends on.

use alloy::primitives::{Address, Bytes, U256};
use async_trait::async_trait;

use crate::blockchain::types::{BlockchainResult, DeploymentResult, RegistrationMetadata, RegistrationResult};

/// Chain-side capabilities used by the orchestrator and health checks.
///
/// `ChainClient` is the production implementation; tests substitute fakes.
#[async_trait]
pub trait DeploymentChain: Send + Sync {
    /// Read-only idempotency probe against the model registry.
    async fn check_model_exists(&self, model_id: &str) -> BlockchainResult<bool>;

    /// Deploy a contract and wait for confirmation, retrying transient failures.
    async fn deploy_contract(&self, bytecode: Bytes, constructor_args: Bytes) -> BlockchainResult<DeploymentResult>;

    /// Record `model_id → token_address` in the registry.
    async fn register_model(
        &self,
        model_id: &str,
        token_address: Address,
        metadata: &RegistrationMetadata,
    ) -> BlockchainResult<RegistrationResult>;

    /// True if runtime bytecode exists at `address`.
    async fn has_contract_code(&self, address: Address) -> BlockchainResult<bool>;

    /// Deployer balance in wei.
    async fn deployer_balance(&self) -> BlockchainResult<U256>;

    async fn block_number(&self) -> BlockchainResult<u64>;

    fn deployer_address(&self) -> Address;

    fn chain_id(&self) -> u64;
}
