//! Client-chain (EVM) access: contract bindings, the transaction-submitting
//! client, and the proof trimmer.

pub mod client;
pub mod config;
pub mod contracts;
pub mod trim;

pub use client::{EvmClient, EvmClientError};
pub use config::{EvmChainConfig, EvmPrivateKey, EvmSignersConfig};
pub use trim::{trim, TrimError};
