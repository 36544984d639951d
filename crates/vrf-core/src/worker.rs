//! Wires the poller, pipeline engine, and optional fork sweep into one
//! cancellable worker (`spec.md` §2 "Data flow", §5 "Scheduling model").

use crate::metrics::TerminalCounters;
use crate::{engine::PipelineEngine, poller, sweep};
use alloy_primitives::Address;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::info;
use vrf_chain_evm::{EvmClient, EvmClientError};
use vrf_chain_oracle::{OracleClient, Wallet};
use vrf_types::{EngineConfig, QueueItem, TaskStore};

/// Bounded task-queue capacity (`spec.md` §5, "reference capacity 10,000").
const QUEUE_CAPACITY: usize = 10_000;

#[derive(Debug, thiserror::Error)]
pub enum WorkerStartError {
    #[error(transparent)]
    Evm(#[from] EvmClientError),
}

/// Everything needed to run the worker's poller + engine + sweep fibers.
pub struct VrfWorker {
    evm: Arc<EvmClient>,
    oracle: OracleClient,
    wallet: Wallet,
    worker_evm_address: Address,
    whitelist: HashSet<Address>,
    engine_config: EngineConfig,
    configured_start_nonce: u64,
    store: Option<Arc<dyn TaskStore>>,
    metrics: Arc<TerminalCounters>,
}

impl VrfWorker {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        evm: Arc<EvmClient>,
        oracle: OracleClient,
        wallet: Wallet,
        worker_evm_address: Address,
        whitelist: HashSet<Address>,
        engine_config: EngineConfig,
        configured_start_nonce: u64,
        store: Option<Arc<dyn TaskStore>>,
    ) -> Self {
        Self {
            evm,
            oracle,
            wallet,
            worker_evm_address,
            whitelist,
            engine_config,
            configured_start_nonce,
            store,
            metrics: Arc::new(TerminalCounters::new()),
        }
    }

    pub fn metrics(&self) -> Arc<TerminalCounters> {
        self.metrics.clone()
    }

    /// Starts the poller, pipeline engine, and (if a store is attached) the
    /// fork sweep, and waits for all of them to finish — which only happens
    /// once `cancellation` is triggered and every fiber has reached a
    /// retryable boundary (`spec.md` §5, "cooperative shutdown").
    pub async fn start(self, cancellation: CancellationToken) -> Result<(), WorkerStartError> {
        info!("starting VRF relay worker");

        let encoded_band_chain_id = self.evm.encoded_band_chain_id().await?;
        let oracle_script_id = self.evm.oracle_script_id().await?;
        let start_nonce = poller::resolve_start_nonce(
            &self.evm,
            &self.engine_config,
            self.configured_start_nonce,
            self.store.as_deref(),
        )
        .await?;

        info!(start_nonce, oracle_script_id, "worker initialized, beginning poll loop");

        let (tx, rx) = mpsc::channel::<QueueItem>(QUEUE_CAPACITY);
        let tracker = TaskTracker::new();

        tracker.spawn(poller::run(
            self.evm.clone(),
            start_nonce,
            self.whitelist,
            self.engine_config.clone(),
            tx.clone(),
            cancellation.clone(),
            self.metrics.clone(),
            self.store.clone(),
        ));

        let engine = PipelineEngine::new(
            self.evm.clone(),
            self.oracle,
            self.wallet,
            self.worker_evm_address,
            oracle_script_id,
            encoded_band_chain_id,
            self.engine_config.max_retries,
            self.store.clone(),
            self.metrics.clone(),
        );
        tracker.spawn(engine.run(rx, tx, cancellation.clone()));

        if let Some(store) = self.store.clone() {
            tracker.spawn(sweep::run(
                self.evm.clone(),
                store,
                self.engine_config.block_difference,
                self.engine_config.sweep_interval(),
                cancellation.clone(),
            ));
        }

        tracker.close();
        tracker.wait().await;

        let snapshot = self.metrics.snapshot();
        info!(?snapshot, "worker stopped");
        Ok(())
    }
}
