//! Off-chain VRF relay worker binary: wires the oracle/EVM clients and the
//! pipeline engine (`vrf-core`) behind a CLI and YAML config file
//! (`spec.md` §6).

mod config;
mod util;

use crate::config::{CliArgs, Config};
use crate::util::SigDown;
use clap::Parser;
use std::collections::HashSet;
use std::process;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};
use vrf_chain_evm::EvmClient;
use vrf_chain_oracle::{OracleClient, Wallet};
use vrf_core::VrfWorker;
use vrf_types::InMemoryTaskStore;

#[tokio::main]
async fn main() {
    init_tracing();

    if let Err(err) = run().await {
        tracing::error!(error = %err, "vrf-worker exited with an error");
        eprintln!("{err}");
        process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();
    let config = Config::load(&args.config)?;

    info!(config = ?args.config, "loaded configuration");

    let evm = Arc::new(EvmClient::from_config(&config.evm_chain).await?);
    let worker_evm_address = evm.worker_address();

    let wallet = Wallet::from_mnemonic(config.band_chain.mnemonic.inner())?;
    let oracle = OracleClient::connect(config.band_chain.clone()).await?;

    let whitelist: HashSet<_> = config.evm_chain.whitelisted_callers.iter().copied().collect();

    // The core is specified as an in-memory pipeline (`spec.md` §1); a
    // durable store is an optional plug-in behind the same `TaskStore` seam.
    let store = Some(Arc::new(InMemoryTaskStore::new()) as Arc<dyn vrf_types::TaskStore>);

    let worker = VrfWorker::new(
        evm,
        oracle,
        wallet,
        worker_evm_address,
        whitelist,
        config.engine,
        config.evm_chain.start_nonce,
        store,
    );

    let sig_down = SigDown::try_new()?;
    worker.start(sig_down.cancellation_token()).await?;

    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(true)
        .init();
}
