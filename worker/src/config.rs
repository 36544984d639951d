//! Configuration loading for the VRF relay worker binary (`spec.md` §6).
//!
//! CLI arg parsing via `clap`, YAML config file via `serde_yaml` into the
//! same `serde`-derived structs the chain-client crates use for their own
//! sub-configs — matching the teacher's CLI-flag -> file -> hardcoded-default
//! fallback (`facilitator/src/config.rs`'s `config_defaults` pattern).

use clap::Parser;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use vrf_chain_evm::EvmChainConfig;
use vrf_chain_oracle::BandChainConfig;
use vrf_types::EngineConfig;

#[derive(Parser, Debug)]
#[command(name = "vrf-worker")]
#[command(about = "Off-chain VRF relay worker: oracle-chain VRF requests relayed to a client chain VRFProvider")]
pub struct CliArgs {
    /// Path to the YAML configuration file.
    #[arg(long, short, env = "VRF_WORKER_CONFIG", default_value = "config.yaml")]
    pub config: PathBuf,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file at {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

/// Top-level worker configuration, matching `spec.md` §6's three config
/// groups: `band_chain_config`, `evm_chain_config`, and the bare engine
/// fields (`poll_rate`, `startup_nonce_check`, `max_retries`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    pub band_chain: BandChainConfig,
    pub evm_chain: EvmChainConfig,
    #[serde(default)]
    pub engine: EngineConfig,
}

impl Config {
    pub fn load(path: &PathBuf) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        serde_yaml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.clone(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn sample_yaml() -> &'static str {
        r#"
band_chain:
  grpc_endpoint: "http://localhost:9090"
  mnemonic: "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about"
evm_chain:
  rpc:
    - http: "http://localhost:8545"
  signers:
    - "0xcafe000000000000000000000000000000000000000000000000000000000001"
  vrf_provider: "0x1111111111111111111111111111111111111111"
  vrf_lens: "0x2222222222222222222222222222222222222222"
  bridge: "0x3333333333333333333333333333333333333333"
  whitelisted_callers:
    - "0x4444444444444444444444444444444444444444"
"#
    }

    #[test]
    fn loads_a_minimal_config_with_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(sample_yaml().as_bytes()).unwrap();

        let config = Config::load(&file.path().to_path_buf()).unwrap();
        assert_eq!(config.band_chain.min_count, 2);
        assert_eq!(config.evm_chain.whitelisted_callers.len(), 1);
        assert_eq!(config.engine.max_retries, 3);
        assert!(config.evm_chain.eip1559);
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let result = Config::load(&PathBuf::from("/nonexistent/config.yaml"));
        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }
}
