//! Blockchain RPC client: endpoint resolution, deployment and registry writes.
//!
//! # Responsibilities
//! - Pick the first configured RPC endpoint that answers a liveness probe
//! - Deploy contracts with estimated, scaled and capped gas
//! - Retry transient failures before broadcast with linear backoff
//! - After broadcast, only poll for the receipt of the broadcast hash
//! - Query chain state (code presence, balance, block number) under timeouts

use std::fmt::Display;
use std::future::{Future, IntoFuture};
use std::time::Duration;

use alloy::network::TransactionBuilder;
use alloy::primitives::{Address, Bytes, TxHash, U256};
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::rpc::types::{TransactionReceipt, TransactionRequest};
use async_trait::async_trait;
use tokio::sync::OnceCell;
use tokio::time::Instant;
use url::Url;

use crate::blockchain::chain::DeploymentChain;
use crate::blockchain::contracts::IModelRegistry;
use crate::blockchain::transaction::{confirmations_reached, deployment_request, GasPolicy};
use crate::blockchain::types::{
    BlockchainError, BlockchainResult, DeploymentResult, RegistrationMetadata, RegistrationResult,
};
use crate::blockchain::wallet::Wallet;
use crate::config::BlockchainConfig;
use crate::observability::metrics;
use crate::resilience::{retry_async, with_timeout, Backoff, RetryPolicy};

/// Try `candidates` in order and return the first that answers `eth_blockNumber`.
pub async fn resolve_endpoint(candidates: &[String], probe_timeout: Duration) -> BlockchainResult<Url> {
    resolve_with(candidates, |url| async move {
        let provider = ProviderBuilder::new().connect_http(url);
        with_timeout(probe_timeout, "eth_blockNumber", provider.get_block_number())
            .await
            .map_err(BlockchainError::from)
            .and_then(|result| result.map_err(BlockchainError::rpc))
    })
    .await
}

async fn resolve_with<P, Fut>(candidates: &[String], mut probe: P) -> BlockchainResult<Url>
where
    P: FnMut(Url) -> Fut,
    Fut: Future<Output = BlockchainResult<u64>>,
{
    for (index, candidate) in candidates.iter().enumerate() {
        let url: Url = match candidate.parse() {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!(index, error = %e, "Ignoring invalid RPC URL");
                continue;
            }
        };
        let host = url.host_str().unwrap_or_default().to_string();

        match probe(url.clone()).await {
            Ok(block_number) => {
                tracing::info!(index, %host, block_number, "RPC endpoint selected");
                return Ok(url);
            }
            Err(e) => tracing::warn!(index, %host, error = %e, "RPC endpoint failed liveness probe"),
        }
    }

    Err(BlockchainError::NoReachableEndpoint {
        tried: candidates.len(),
    })
}

/// Signing client bound to one resolved endpoint and the model registry.
///
/// Every write is split into a retryable submission phase (nonce, estimate,
/// price, broadcast) and a confirmation phase that only polls for the receipt
/// of the broadcast hash. Nothing after a broadcast can trigger a resend.
#[derive(Clone)]
pub struct ChainClient {
    provider: DynProvider,
    endpoint: Url,
    chain_id: u64,
    deployer: Address,
    registry: Address,
    gas: GasPolicy,
    retry: RetryPolicy,
    rpc_timeout: Duration,
    confirmations: u64,
    confirmation_timeout: Duration,
    receipt_poll_interval: Duration,
}

impl ChainClient {
    /// Resolve an endpoint, attach the signer and verify the chain ID.
    ///
    /// Fails when no endpoint is reachable or the chain ID does not match.
    pub async fn connect(config: &BlockchainConfig, registry: Address, wallet: &Wallet) -> BlockchainResult<Self> {
        let endpoint = resolve_endpoint(&config.rpc_urls, Duration::from_secs(config.probe_timeout_secs)).await?;

        // Nonce, chain ID and gas are set explicitly on every request.
        let provider = ProviderBuilder::new()
            .disable_recommended_fillers()
            .wallet(wallet.ethereum_wallet())
            .connect_http(endpoint.clone())
            .erased();

        let client = Self::from_parts(provider, endpoint, config.chain_id, wallet.address(), registry, config);

        let chain_id = client.call("eth_chainId", client.provider.get_chain_id()).await?;
        if chain_id != config.chain_id {
            return Err(BlockchainError::ChainMismatch {
                expected: config.chain_id,
                actual: chain_id,
            });
        }

        tracing::info!(
            host = client.endpoint.host_str().unwrap_or_default(),
            chain_id,
            deployer = %client.deployer,
            registry = %registry,
            "Blockchain client initialized"
        );
        Ok(client)
    }

    fn from_parts(
        provider: DynProvider,
        endpoint: Url,
        chain_id: u64,
        deployer: Address,
        registry: Address,
        config: &BlockchainConfig,
    ) -> Self {
        Self {
            provider,
            endpoint,
            chain_id,
            deployer,
            registry,
            gas: GasPolicy::from_config(config),
            retry: RetryPolicy::new(config.max_attempts, Backoff::linear_ms(config.retry_base_delay_ms)),
            rpc_timeout: Duration::from_secs(config.rpc_timeout_secs),
            confirmations: config.confirmation_blocks,
            confirmation_timeout: Duration::from_secs(config.confirmation_timeout_secs),
            receipt_poll_interval: Duration::from_millis(config.receipt_poll_interval_ms),
        }
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    fn registry_contract(&self) -> IModelRegistry::IModelRegistryInstance<DynProvider> {
        IModelRegistry::new(self.registry, self.provider.clone())
    }

    async fn call<F, T, E>(&self, operation: &str, request: F) -> BlockchainResult<T>
    where
        F: IntoFuture<Output = Result<T, E>>,
        E: Display,
    {
        with_timeout(self.rpc_timeout, operation, request)
            .await?
            .map_err(BlockchainError::rpc)
    }

    /// The pending nonce, fetched once per write and reused by every attempt.
    ///
    /// A broadcast whose response was lost still holds this nonce, so a later
    /// attempt can replace or collide with it but never land a second copy.
    async fn reserved_nonce(&self, slot: &OnceCell<u64>) -> BlockchainResult<u64> {
        slot.get_or_try_init(|| {
            self.call(
                "eth_getTransactionCount",
                self.provider.get_transaction_count(self.deployer).pending(),
            )
        })
        .await
        .copied()
    }

    /// Estimate and price `request`, then pin it to `nonce` and the chain ID.
    async fn prepare(&self, request: TransactionRequest, nonce: u64) -> BlockchainResult<TransactionRequest> {
        let estimate = self
            .call("eth_estimateGas", self.provider.estimate_gas(request.clone()))
            .await?;
        let network_price = self.call("eth_gasPrice", self.provider.get_gas_price()).await?;

        Ok(request
            .with_nonce(nonce)
            .with_chain_id(self.chain_id)
            .with_gas_limit(self.gas.gas_limit(estimate))
            .with_gas_price(self.gas.gas_price(network_price)))
    }

    async fn submit(&self, request: TransactionRequest) -> BlockchainResult<TxHash> {
        let pending = self
            .call("eth_sendRawTransaction", self.provider.send_transaction(request))
            .await?;
        Ok(*pending.tx_hash())
    }

    /// Poll for the receipt of `tx_hash` until it has the configured depth.
    ///
    /// Transient lookup failures are polled through. Any other failure, or the
    /// deadline passing, is reported with the hash and is never transient.
    async fn await_receipt(&self, tx_hash: TxHash) -> BlockchainResult<TransactionReceipt> {
        tracing::debug!(%tx_hash, confirmations = self.confirmations, "Waiting for confirmations");
        let deadline = Instant::now() + self.confirmation_timeout;

        loop {
            match self.confirmed_receipt(tx_hash).await {
                Ok(Some(receipt)) => {
                    if !receipt.status() {
                        return Err(BlockchainError::Reverted(tx_hash.to_string()));
                    }
                    tracing::info!(
                        %tx_hash,
                        block_number = receipt.block_number.unwrap_or_default(),
                        gas_used = receipt.gas_used,
                        "Transaction confirmed"
                    );
                    return Ok(receipt);
                }
                Ok(None) => {}
                Err(e) if e.is_transient() => {
                    tracing::warn!(%tx_hash, error = %e, "Receipt lookup failed, polling again");
                }
                Err(e) => {
                    return Err(BlockchainError::ConfirmationFailed {
                        tx_hash,
                        reason: e.to_string(),
                    })
                }
            }

            if Instant::now() + self.receipt_poll_interval > deadline {
                return Err(BlockchainError::ConfirmationTimeout {
                    tx_hash,
                    after_secs: self.confirmation_timeout.as_secs(),
                });
            }
            tokio::time::sleep(self.receipt_poll_interval).await;
        }
    }

    /// The receipt, once mined and buried deep enough.
    async fn confirmed_receipt(&self, tx_hash: TxHash) -> BlockchainResult<Option<TransactionReceipt>> {
        let receipt = self
            .call("eth_getTransactionReceipt", self.provider.get_transaction_receipt(tx_hash))
            .await?;
        let Some(receipt) = receipt else {
            return Ok(None);
        };

        if self.confirmations > 1 {
            let Some(mined_at) = receipt.block_number else {
                return Ok(None);
            };
            let head = self.call("eth_blockNumber", self.provider.get_block_number()).await?;
            if !confirmations_reached(mined_at, head, self.confirmations) {
                return Ok(None);
            }
        }
        Ok(Some(receipt))
    }

    async fn deploy_once(
        &self,
        bytecode: &Bytes,
        constructor_args: &Bytes,
        nonce: &OnceCell<u64>,
    ) -> BlockchainResult<DeploymentResult> {
        let nonce = self.reserved_nonce(nonce).await?;
        let request = self
            .prepare(deployment_request(self.deployer, bytecode, constructor_args), nonce)
            .await?;
        let (gas_limit, gas_price) = (request.gas, request.gas_price);

        let tx_hash = self.submit(request).await?;
        tracing::info!(%tx_hash, nonce, ?gas_limit, ?gas_price, "Deployment transaction submitted");

        let receipt = self.await_receipt(tx_hash).await?;
        let contract_address = receipt
            .contract_address
            .ok_or(BlockchainError::MissingContractAddress(receipt.transaction_hash))?;

        Ok(DeploymentResult {
            contract_address,
            transaction_hash: receipt.transaction_hash,
            block_number: receipt.block_number.unwrap_or_default(),
            gas_used: receipt.gas_used,
            effective_gas_price: receipt.effective_gas_price,
        })
    }

    async fn register_once(
        &self,
        model_id: &str,
        token_address: Address,
        metadata: &RegistrationMetadata,
        nonce: &OnceCell<u64>,
    ) -> BlockchainResult<RegistrationResult> {
        let request = self
            .registry_contract()
            .registerModel(
                model_id.to_string(),
                token_address,
                metadata.metric_name.clone(),
                metadata.mlflow_run_id.clone(),
            )
            .from(self.deployer)
            .into_transaction_request();

        let nonce = self.reserved_nonce(nonce).await?;
        let request = self.prepare(request, nonce).await.map_err(reject_reverts)?;
        let tx_hash = self.submit(request).await.map_err(reject_reverts)?;
        tracing::info!(%tx_hash, nonce, model_id, "Registration transaction submitted");

        let receipt = self.await_receipt(tx_hash).await.map_err(|e| match e {
            BlockchainError::Reverted(tx) => {
                BlockchainError::RegistrationRejected(format!("transaction {} reverted", tx))
            }
            other => other,
        })?;

        Ok(RegistrationResult {
            transaction_hash: receipt.transaction_hash,
        })
    }
}

/// Registry reverts (duplicate model, unauthorized caller) are rejections, not RPC noise.
fn reject_reverts(error: BlockchainError) -> BlockchainError {
    match error {
        BlockchainError::Rpc(message) if message.to_lowercase().contains("revert") => {
            BlockchainError::RegistrationRejected(message)
        }
        other => other,
    }
}

#[async_trait]
impl DeploymentChain for ChainClient {
    async fn check_model_exists(&self, model_id: &str) -> BlockchainResult<bool> {
        let registry = self.registry_contract();
        let exists = self
            .call("isModelRegistered", registry.isModelRegistered(model_id.to_string()).call())
            .await?;
        Ok(exists)
    }

    async fn deploy_contract(&self, bytecode: Bytes, constructor_args: Bytes) -> BlockchainResult<DeploymentResult> {
        let nonce = OnceCell::new();
        let result = retry_async(
            self.retry,
            "deploy_contract",
            |attempt| {
                if attempt > 1 {
                    metrics::record_chain_retry("deploy");
                }
                self.deploy_once(&bytecode, &constructor_args, &nonce)
            },
            BlockchainError::is_transient,
        )
        .await;

        match result {
            Ok(deployment) => {
                tracing::info!(
                    contract_address = %deployment.contract_address,
                    tx_hash = %deployment.transaction_hash,
                    block_number = deployment.block_number,
                    gas_used = deployment.gas_used,
                    "Contract deployed"
                );
                Ok(deployment)
            }
            Err(e) => Err(BlockchainError::DeploymentFailed {
                attempts: e.attempts,
                last_error: e.last_error.to_string(),
            }),
        }
    }

    async fn register_model(
        &self,
        model_id: &str,
        token_address: Address,
        metadata: &RegistrationMetadata,
    ) -> BlockchainResult<RegistrationResult> {
        let nonce = OnceCell::new();
        retry_async(
            self.retry,
            "register_model",
            |attempt| {
                if attempt > 1 {
                    metrics::record_chain_retry("register");
                }
                self.register_once(model_id, token_address, metadata, &nonce)
            },
            BlockchainError::is_transient,
        )
        .await
        .map_err(|e| e.last_error)
    }

    async fn has_contract_code(&self, address: Address) -> BlockchainResult<bool> {
        let code = self.call("eth_getCode", self.provider.get_code_at(address)).await?;
        Ok(!code.is_empty())
    }

    async fn deployer_balance(&self) -> BlockchainResult<U256> {
        self.call("eth_getBalance", self.provider.get_balance(self.deployer)).await
    }

    async fn block_number(&self) -> BlockchainResult<u64> {
        self.call("eth_blockNumber", self.provider.get_block_number()).await
    }

    fn deployer_address(&self) -> Address {
        self.deployer
    }

    fn chain_id(&self) -> u64 {
        self.chain_id
    }
}

impl std::fmt::Debug for ChainClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainClient")
            .field("host", &self.endpoint.host_str())
            .field("chain_id", &self.chain_id)
            .field("deployer", &self.deployer)
            .field("registry", &self.registry)
            .finish()
    }
}
