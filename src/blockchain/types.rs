//! Chain-side result types and error definitions.

use alloy::primitives::{Address, TxHash};
use serde::Serialize;
use thiserror::Error;

use crate::resilience::Elapsed;

/// RPC error fragments that indicate a retry may succeed.
const TRANSIENT_PATTERNS: &[&str] = &[
    "timeout",
    "timed out",
    "underpriced",
    "nonce too low",
    "nonce too high",
    "replacement transaction",
    "already known",
    "connection",
    "rate limit",
    "429",
    "502",
    "503",
];

/// Errors that can occur during blockchain operations.
#[derive(Debug, Error)]
pub enum BlockchainError {
    /// RPC connection or request failed.
    #[error("RPC error: {0}")]
    Rpc(String),

    /// RPC request timed out.
    #[error("RPC timeout: {0}")]
    Timeout(#[from] Elapsed),

    /// Transaction was not confirmed within expected time.
    #[error("Transaction {tx_hash} not confirmed within {after_secs}s")]
    ConfirmationTimeout { tx_hash: TxHash, after_secs: u64 },

    /// The transaction was broadcast but its receipt could not be obtained.
    ///
    /// Never transient: resubmitting could land a second copy on-chain.
    #[error("Transaction {tx_hash} was submitted but its outcome is unknown: {reason}")]
    ConfirmationFailed { tx_hash: TxHash, reason: String },

    /// Transaction was reverted on-chain.
    #[error("Transaction reverted: {0}")]
    Reverted(String),

    /// Invalid private key format or derivation error.
    #[error("Wallet error: {0}")]
    Wallet(String),

    /// Chain configuration mismatch.
    #[error("Chain ID mismatch: expected {expected}, got {actual}")]
    ChainMismatch { expected: u64, actual: u64 },

    /// None of the configured RPC endpoints answered the liveness probe.
    #[error("No reachable RPC endpoint among {tried} candidates")]
    NoReachableEndpoint { tried: usize },

    /// Deployment gave up after its retry budget.
    #[error("Deployment failed after {attempts} attempts: {last_error}")]
    DeploymentFailed { attempts: u32, last_error: String },

    /// The registry refused the write (duplicate model or unauthorized caller).
    #[error("Registration rejected: {0}")]
    RegistrationRejected(String),

    /// A creation receipt carried no contract address.
    #[error("Receipt for {0} has no contract address")]
    MissingContractAddress(TxHash),

    /// Configured address or artifact is unusable.
    #[error("Invalid contract configuration: {0}")]
    InvalidContract(String),
}

impl BlockchainError {
    /// Whether retrying the same call may succeed (RPC timeout, fee underpricing,
    /// nonce races, dropped connections).
    pub fn is_transient(&self) -> bool {
        match self {
            BlockchainError::Timeout(_) => true,
            BlockchainError::Rpc(message) => {
                let message = message.to_lowercase();
                TRANSIENT_PATTERNS.iter().any(|pattern| message.contains(pattern))
            }
            _ => false,
        }
    }

    /// Wrap any displayable RPC failure.
    pub fn rpc(error: impl std::fmt::Display) -> Self {
        BlockchainError::Rpc(error.to_string())
    }
}

/// Result type for blockchain operations.
pub type BlockchainResult<T> = Result<T, BlockchainError>;

/// Outcome of a confirmed contract-creation transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeploymentResult {
    pub contract_address: Address,
    pub transaction_hash: TxHash,
    pub block_number: u64,
    pub gas_used: u64,
    /// Effective gas price in wei.
    pub effective_gas_price: u128,
}

/// Outcome of a confirmed registry write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegistrationResult {
    pub transaction_hash: TxHash,
}

/// Extra fields recorded next to the model → token mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationMetadata {
    pub metric_name: String,
    pub mlflow_run_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_transient_classification() {
        let transient = [
            "replacement transaction underpriced",
            "nonce too low",
            "error sending request: connection refused",
            "request timed out",
            "HTTP 429 Too Many Requests",
        ];
        for message in transient {
            assert!(BlockchainError::Rpc(message.to_string()).is_transient(), "{message}");
        }

        let elapsed = Elapsed {
            operation: "eth_estimateGas".to_string(),
            after: Duration::from_secs(10),
        };
        assert!(BlockchainError::Timeout(elapsed).is_transient());
    }

    #[test]
    fn test_permanent_classification() {
        assert!(!BlockchainError::Rpc("execution reverted: Ownable".to_string()).is_transient());
        assert!(!BlockchainError::Reverted("0xabc".to_string()).is_transient());
        assert!(!BlockchainError::RegistrationRejected("duplicate".to_string()).is_transient());
        assert!(!BlockchainError::ConfirmationTimeout {
            tx_hash: TxHash::ZERO,
            after_secs: 180
        }
        .is_transient());
    }

    #[test]
    fn test_submitted_transaction_failures_are_never_transient() {
        let err = BlockchainError::ConfirmationFailed {
            tx_hash: TxHash::ZERO,
            reason: "RPC error: error sending request: connection reset".to_string(),
        };
        assert!(!err.is_transient());
        assert!(err.to_string().contains("outcome is unknown"));
    }

    #[test]
    fn test_error_display() {
        let err = BlockchainError::DeploymentFailed {
            attempts: 3,
            last_error: "RPC error: nonce too low".to_string(),
        };
        assert_eq!(err.to_string(), "Deployment failed after 3 attempts: RPC error: nonce too low");

        let err = BlockchainError::NoReachableEndpoint { tried: 2 };
        assert!(err.to_string().contains("2 candidates"));
    }
}
