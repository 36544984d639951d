//! Config primitives shared by both chain clients and the binary's top-level config.

use serde::{Deserialize, Serialize};
use std::ops::{Deref, DerefMut};
use std::str::FromStr;
use std::time::Duration;
use url::Url;

/// A single RPC endpoint plus an optional client-side rate limit, shared by the
/// EVM and oracle chain configs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RpcConfig {
    pub http: Url,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_limit: Option<u32>,
}

/// A transparent wrapper that resolves environment variables during deserialization.
///
/// Supports both literal values (`"http://localhost:8545"`) and environment
/// variable references (`"$RPC_URL"` or `"${RPC_URL}"`), so secrets such as
/// private keys can live in the environment while the rest of the config is
/// checked into a deployment repo. Deref's through to the inner value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiteralOrEnv<T>(T);

impl<T> LiteralOrEnv<T> {
    pub fn from_literal(value: T) -> Self {
        Self(value)
    }

    pub fn inner(&self) -> &T {
        &self.0
    }

    pub fn into_inner(self) -> T {
        self.0
    }

    fn parse_env_var_syntax(s: &str) -> Option<String> {
        if let Some(braced) = s.strip_prefix("${").and_then(|s| s.strip_suffix('}')) {
            Some(braced.to_string())
        } else if let Some(bare) = s.strip_prefix('$') {
            if !bare.is_empty() && bare.chars().all(|c| c.is_alphanumeric() || c == '_') {
                Some(bare.to_string())
            } else {
                None
            }
        } else {
            None
        }
    }
}

impl<T> Deref for LiteralOrEnv<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<T> DerefMut for LiteralOrEnv<T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl<'de, T> Deserialize<'de> for LiteralOrEnv<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let value = if let Some(var_name) = Self::parse_env_var_syntax(&s) {
            std::env::var(&var_name).map_err(|_| {
                serde::de::Error::custom(format!(
                    "environment variable '{var_name}' not found (referenced as '{s}')"
                ))
            })?
        } else {
            s
        };
        let parsed = value
            .parse::<T>()
            .map_err(|e| serde::de::Error::custom(format!("failed to parse value: {e}")))?;
        Ok(LiteralOrEnv(parsed))
    }
}

impl<T> Serialize for LiteralOrEnv<T>
where
    T: Serialize,
{
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.0.serialize(serializer)
    }
}

/// Engine-wide knobs that are not specific to either chain client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct EngineConfig {
    #[serde(default = "config_defaults::default_poll_rate_secs")]
    pub poll_rate_secs: u64,

    #[serde(default = "config_defaults::default_startup_nonce_check")]
    pub startup_nonce_check: u64,

    #[serde(default = "config_defaults::default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "config_defaults::default_block_difference")]
    pub block_difference: u64,

    #[serde(default = "config_defaults::default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

impl EngineConfig {
    pub fn poll_rate(&self) -> Duration {
        Duration::from_secs(self.poll_rate_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            poll_rate_secs: config_defaults::default_poll_rate_secs(),
            startup_nonce_check: config_defaults::default_startup_nonce_check(),
            max_retries: config_defaults::default_max_retries(),
            block_difference: config_defaults::default_block_difference(),
            sweep_interval_secs: config_defaults::default_sweep_interval_secs(),
        }
    }
}

/// Default-value functions for `#[serde(default = "...")]`, matching the
/// teacher's `config_defaults` module.
pub mod config_defaults {
    pub fn default_poll_rate_secs() -> u64 {
        5
    }

    pub fn default_startup_nonce_check() -> u64 {
        100
    }

    pub fn default_max_retries() -> u32 {
        3
    }

    pub fn default_block_difference() -> u64 {
        10
    }

    pub fn default_sweep_interval_secs() -> u64 {
        60
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_deserializes_without_environment() {
        let value: LiteralOrEnv<String> = serde_json::from_str("\"https://rpc.example\"").unwrap();
        assert_eq!(value.into_inner(), "https://rpc.example");
    }

    #[test]
    fn braced_env_var_resolves_from_process_environment() {
        // SAFETY: test-local, no concurrent readers of this key in this process.
        unsafe {
            std::env::set_var("VRF_TEST_ENV_RESOLUTION", "resolved-value");
        }
        let value: LiteralOrEnv<String> =
            serde_json::from_str("\"${VRF_TEST_ENV_RESOLUTION}\"").unwrap();
        assert_eq!(value.into_inner(), "resolved-value");
        unsafe {
            std::env::remove_var("VRF_TEST_ENV_RESOLUTION");
        }
    }

    #[test]
    fn env_missing_is_an_error() {
        let result: Result<LiteralOrEnv<String>, _> =
            serde_json::from_str("\"$VRF_TEST_ENV_DOES_NOT_EXIST\"");
        assert!(result.is_err());
    }

    #[test]
    fn engine_config_default_matches_documented_defaults() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.poll_rate_secs, 5);
        assert_eq!(cfg.startup_nonce_check, 100);
        assert_eq!(cfg.max_retries, 3);
        assert_eq!(cfg.block_difference, 10);
    }
}
