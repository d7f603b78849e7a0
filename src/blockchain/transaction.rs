//! Transaction building, gas policy and confirmation.
//!
//! # Responsibilities
//! - Scale gas estimates by the configured safety multiplier
//! - Offer a gas price derived from the network's, never above the configured cap
//! - Decide when a mined transaction has reached the configured confirmation depth

use alloy::network::TransactionBuilder;
use alloy::primitives::{Address, Bytes};
use alloy::rpc::types::TransactionRequest;

use crate::config::BlockchainConfig;

const WEI_PER_GWEI: u128 = 1_000_000_000;

/// Gas limit and price policy applied to every chain write.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GasPolicy {
    pub gas_limit_multiplier: f64,
    pub gas_price_multiplier: f64,
    pub max_gas_price_wei: u128,
}

impl GasPolicy {
    pub fn from_config(config: &BlockchainConfig) -> Self {
        Self {
            gas_limit_multiplier: config.gas_limit_multiplier,
            gas_price_multiplier: config.gas_price_multiplier,
            max_gas_price_wei: u128::from(config.max_gas_price_gwei) * WEI_PER_GWEI,
        }
    }

    /// Estimate scaled by the safety multiplier, rounded up.
    pub fn gas_limit(&self, estimate: u64) -> u64 {
        let scaled = (estimate as f64 * self.gas_limit_multiplier).ceil();
        if scaled >= u64::MAX as f64 {
            u64::MAX
        } else {
            (scaled as u64).max(estimate)
        }
    }

    /// Network price scaled by the multiplier and capped at the maximum.
    pub fn gas_price(&self, network_price: u128) -> u128 {
        let scaled = (network_price as f64 * self.gas_price_multiplier) as u128;
        let capped = scaled.min(self.max_gas_price_wei);
        if capped < scaled {
            tracing::warn!(
                network_gwei = network_price / WEI_PER_GWEI,
                cap_gwei = self.max_gas_price_wei / WEI_PER_GWEI,
                "Network gas price above cap, offering the cap"
            );
        }
        capped
    }
}

/// Contract-creation request: creation code followed by ABI-encoded constructor args.
pub fn deployment_request(from: Address, bytecode: &Bytes, constructor_args: &Bytes) -> TransactionRequest {
    let mut code = Vec::with_capacity(bytecode.len() + constructor_args.len());
    code.extend_from_slice(bytecode);
    code.extend_from_slice(constructor_args);

    TransactionRequest::default()
        .with_from(from)
        .with_deploy_code(Bytes::from(code))
}

/// Whether a transaction mined at `mined_at` has `required` confirmations at `head`.
///
/// The inclusion block counts as the first confirmation.
pub fn confirmations_reached(mined_at: u64, head: u64, required: u64) -> bool {
    head >= mined_at && head - mined_at + 1 >= required
}
