//! Blockchain integration subsystem.
//!
//! # Data Flow
//! ```text
//! Environment variable (private key) + rpc_urls
//!     → wallet.rs (key loading)
//!     → client.rs (endpoint resolution, chain ID check)
//!     → transaction.rs (gas policy, submit, confirm)
//!     → contracts.rs (registry binding, token constructor encoding)
//! ```
//!
//! # Security Constraints
//! - Private keys ONLY from environment variables
//! - Never log private keys or full RPC URLs (they may embed API keys)
//! - All RPC calls have configurable timeouts
//! - No endpoint reachable at startup is fatal

pub mod chain;
pub mod client;
pub mod contracts;
pub mod transaction;
pub mod types;
pub mod wallet;

pub use chain::DeploymentChain;
pub use client::{resolve_endpoint, ChainClient};
pub use contracts::{encode_token_constructor, load_bytecode, parse_address};
pub use transaction::GasPolicy;
pub use types::{
    BlockchainError, BlockchainResult, DeploymentResult, RegistrationMetadata, RegistrationResult,
};
pub use wallet::Wallet;
