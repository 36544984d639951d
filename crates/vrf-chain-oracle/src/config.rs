//! Configuration for the oracle-chain (BandChain-style) connection.

use serde::{Deserialize, Serialize};
use vrf_types::LiteralOrEnv;

/// Everything the oracle client needs to submit `MsgRequestData` transactions
/// and poll for resolution (`spec.md` §6, `band_chain_config`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct BandChainConfig {
    pub grpc_endpoint: String,

    /// BIP-39 mnemonic for the worker's oracle-chain signing key.
    pub mnemonic: LiteralOrEnv<String>,

    #[serde(default = "band_chain_config::default_min_count")]
    pub min_count: u64,

    #[serde(default = "band_chain_config::default_ask_count")]
    pub ask_count: u64,

    #[serde(default = "band_chain_config::default_prepare_gas")]
    pub prepare_gas: u64,

    #[serde(default = "band_chain_config::default_execute_gas")]
    pub execute_gas: u64,

    #[serde(default = "band_chain_config::default_ds_fee_limit")]
    pub ds_fee_limit: u64,

    #[serde(default = "band_chain_config::default_gas_limit")]
    pub gas_limit: u64,

    #[serde(default = "band_chain_config::default_gas_price")]
    pub gas_price: f64,
}

mod band_chain_config {
    pub fn default_min_count() -> u64 {
        2
    }

    pub fn default_ask_count() -> u64 {
        3
    }

    pub fn default_prepare_gas() -> u64 {
        100_000
    }

    pub fn default_execute_gas() -> u64 {
        400_000
    }

    pub fn default_ds_fee_limit() -> u64 {
        48
    }

    pub fn default_gas_limit() -> u64 {
        800_000
    }

    pub fn default_gas_price() -> f64 {
        0.0025
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let json = r#"{"grpc_endpoint":"http://localhost:9090","mnemonic":"word ".repeat(24)}"#
            .replace("\"word \".repeat(24)", "\"word word word\"");
        let cfg: BandChainConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(cfg.min_count, 2);
        assert_eq!(cfg.ask_count, 3);
        assert_eq!(cfg.prepare_gas, 100_000);
        assert_eq!(cfg.execute_gas, 400_000);
        assert_eq!(cfg.ds_fee_limit, 48);
        assert_eq!(cfg.gas_limit, 800_000);
        assert_eq!(cfg.gas_price, 0.0025);
    }
}
