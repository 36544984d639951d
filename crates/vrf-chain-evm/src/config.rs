//! Configuration for the client chain (EVM) connection.

use alloy_primitives::{Address, B256};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use vrf_types::{LiteralOrEnv, RpcConfig};

/// A validated EVM private key (32 bytes), deserialized either as a literal hex
/// string or via `$ENV`/`${ENV}` resolution.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct EvmPrivateKey(B256);

impl EvmPrivateKey {
    pub fn as_bytes(&self) -> &[u8; 32] {
        self.0.as_ref()
    }
}

impl FromStr for EvmPrivateKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        B256::from_str(s)
            .map(Self)
            .map_err(|e| format!("invalid EVM private key: {e}"))
    }
}

pub type EvmSignersConfig = Vec<LiteralOrEnv<EvmPrivateKey>>;

/// Everything the EVM client needs to talk to the client chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct EvmChainConfig {
    /// RPC endpoints, tried in order with automatic fallback (`spec.md` §6).
    pub rpc: Vec<RpcConfig>,

    /// Signer(s) used to submit `relayProof` transactions.
    pub signers: EvmSignersConfig,

    /// `VRFProvider` contract address.
    pub vrf_provider: Address,

    /// `VRFLens` contract address.
    pub vrf_lens: Address,

    /// `Bridge` contract address.
    pub bridge: Address,

    /// Whether the chain supports EIP-1559 gas pricing.
    #[serde(default = "evm_chain_config::default_eip1559")]
    pub eip1559: bool,

    /// Receipt-fetch timeout, seconds.
    #[serde(default = "evm_chain_config::default_receipt_timeout_secs")]
    pub receipt_timeout_secs: u64,

    /// Block confirmations to require before treating a submission as final.
    #[serde(default = "evm_chain_config::default_confirmations")]
    pub confirmations: u64,

    /// Caller addresses the poller is authorized to serve (`spec.md` §4.4, §8
    /// "Whitelist gating").
    #[serde(default)]
    pub whitelisted_callers: Vec<Address>,

    /// Lower bound for the poller's starting nonce, overridden upward by
    /// `current_task_nonce - startup_nonce_check` at boot (`spec.md` §4.4).
    #[serde(default)]
    pub start_nonce: u64,
}

mod evm_chain_config {
    pub fn default_eip1559() -> bool {
        true
    }

    pub fn default_receipt_timeout_secs() -> u64 {
        30
    }

    pub fn default_confirmations() -> u64 {
        1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn private_key_parses_hex() {
        let key: EvmPrivateKey =
            "0xcafe000000000000000000000000000000000000000000000000000000000001"
                .parse()
                .unwrap();
        assert_eq!(key.as_bytes().len(), 32);
    }

    #[test]
    fn private_key_rejects_short_hex() {
        let result: Result<EvmPrivateKey, _> = "0xcafe".parse();
        assert!(result.is_err());
    }
}
