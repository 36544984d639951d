//! The pipeline engine: drives each queued task through the request -> wait
//! -> minimize -> relay state machine (`spec.md` §4.5).

use crate::metrics::TerminalCounters;
use alloy_primitives::{Address, Bytes};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{Receiver, Sender};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use vrf_chain_evm::{trim, EvmClient, EvmClientError, TrimError};
use vrf_chain_oracle::{find_request_id, OracleClient, OracleError, Wallet};
use vrf_types::{QueueItem, Task, TaskStore};

/// `evm_proof`'s default polling ceiling (`spec.md` §5).
pub const EVM_PROOF_TIMEOUT: Duration = Duration::from_secs(60);

/// `get_transaction`'s default polling ceiling (`spec.md` §5).
pub const GET_TRANSACTION_TIMEOUT: Duration = Duration::from_secs(30);

/// Everything the pipeline engine needs to drive a task from `NEW` to a
/// terminal state, dequeuing one task at a time (`spec.md` §4.5, §5 —
/// "the simplest correct implementation dequeues one task at a time").
pub struct PipelineEngine {
    evm: Arc<EvmClient>,
    oracle: OracleClient,
    wallet: Wallet,
    /// The worker's client-chain (EVM) address, carried in the oracle request
    /// so the oracle script can bind its output to this worker.
    worker_evm_address: Address,
    oracle_script_id: u64,
    encoded_band_chain_id: Bytes,
    max_retries: u32,
    store: Option<Arc<dyn TaskStore>>,
    metrics: Arc<TerminalCounters>,
}

impl PipelineEngine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        evm: Arc<EvmClient>,
        oracle: OracleClient,
        wallet: Wallet,
        worker_evm_address: Address,
        oracle_script_id: u64,
        encoded_band_chain_id: Bytes,
        max_retries: u32,
        store: Option<Arc<dyn TaskStore>>,
        metrics: Arc<TerminalCounters>,
    ) -> Self {
        Self {
            evm,
            oracle,
            wallet,
            worker_evm_address,
            oracle_script_id,
            encoded_band_chain_id,
            max_retries,
            store,
            metrics,
        }
    }

    /// Drains `queue` until cancelled, re-enqueuing recoverable failures onto
    /// the same channel via `requeue`.
    pub async fn run(
        mut self,
        mut queue: Receiver<QueueItem>,
        requeue: Sender<QueueItem>,
        cancellation: CancellationToken,
    ) {
        loop {
            let item = tokio::select! {
                _ = cancellation.cancelled() => {
                    info!("pipeline engine shutting down");
                    return;
                }
                item = queue.recv() => match item {
                    Some(item) => item,
                    None => {
                        info!("task queue closed, pipeline engine exiting");
                        return;
                    }
                },
            };

            if item.retry_count >= self.max_retries {
                warn!(
                    nonce = item.nonce,
                    retry = item.retry_count,
                    "max retries reached, dropping task"
                );
                self.metrics.record_retries_exhausted();
                continue;
            }

            self.process(item, &requeue).await;
        }
    }

    async fn process(&mut self, item: QueueItem, requeue: &Sender<QueueItem>) {
        let nonce = item.nonce;
        let task = item.task.clone();

        // NEW -> REQUESTED. Not idempotent: every call costs gas and opens a
        // new oracle request. The idempotence boundary sits after the next
        // step, per spec.md §4.5 ("Idempotence").
        let broadcast = match self
            .oracle
            .request_vrf(
                self.oracle_script_id,
                self.worker_evm_address.as_slice(),
                task.seed.as_slice(),
                task.time,
                &self.wallet,
            )
            .await
        {
            Ok(resp) => resp,
            Err(err) => {
                warn!(nonce, error = %err, "request_vrf failed, retrying");
                self.requeue(item, requeue).await;
                return;
            }
        };

        // REQUESTED -> TX_INDEXED.
        let tx_response = match self
            .oracle
            .get_transaction(&broadcast.txhash, GET_TRANSACTION_TIMEOUT)
            .await
        {
            Ok(resp) => resp,
            Err(err) => {
                warn!(nonce, error = %err, "get_transaction failed, retrying (may re-request)");
                self.requeue(item, requeue).await;
                return;
            }
        };

        // TX_INDEXED -> AWAITING_PROOF.
        let request_id = match find_request_id(&tx_response).ok_or(OracleError::RequestIdMissing) {
            Ok(id) => id,
            Err(err) => {
                warn!(nonce, code = tx_response.code, error = %err, "retrying");
                self.requeue(item, requeue).await;
                return;
            }
        };

        // AWAITING_PROOF -> PROVEN.
        let (evm_proof_bytes, block_hash) =
            match self.oracle.evm_proof(request_id, EVM_PROOF_TIMEOUT).await {
                Ok(proof) => proof,
                Err(OracleError::OracleRejected { status, .. }) => {
                    info!(nonce, ?status, "oracle rejected request, dropping task permanently");
                    self.metrics.record_oracle_rejected();
                    return;
                }
                Err(err) => {
                    warn!(nonce, error = %err, "evm_proof polling failed, retrying");
                    self.requeue(item, requeue).await;
                    return;
                }
            };

        // PROVEN -> MINIMIZED.
        let validator_powers = match self.evm.validator_powers().await {
            Ok(powers) => powers,
            Err(err) => {
                warn!(nonce, error = %err, "failed to read validator powers, retrying");
                self.requeue(item, requeue).await;
                return;
            }
        };

        let trimmed = match trim(
            &evm_proof_bytes,
            block_hash,
            &self.encoded_band_chain_id,
            &validator_powers,
        ) {
            Ok(trimmed) => trimmed,
            Err(TrimError::InsufficientPower) => {
                info!(nonce, "insufficient validator power in proof, retrying at a later head");
                self.metrics.record_insufficient_power();
                self.requeue(item, requeue).await;
                return;
            }
            Err(err) => {
                warn!(nonce, error = %err, "failed to trim proof, retrying");
                self.requeue(item, requeue).await;
                return;
            }
        };

        // MINIMIZED -> SUBMITTED.
        let tx_hash = match self.evm.relay_proof(trimmed, nonce, false).await {
            Ok(tx_hash) => tx_hash,
            Err(EvmClientError::OnChainRevert(reason)) => {
                self.handle_revert(nonce, &task, &reason, item, requeue).await;
                return;
            }
            Err(err) => {
                warn!(nonce, error = %err, "relay_proof transport error, retrying");
                self.requeue(item, requeue).await;
                return;
            }
        };

        // SUBMITTED -> RESOLVED | REVERTED.
        match self.evm.receipt_status(tx_hash).await {
            Ok(1) => {
                info!(nonce, "relay succeeded");
                self.metrics.record_resolved();
                self.mark_resolved_in_store(nonce).await;
            }
            Ok(_) => {
                let reason = format!("relayProof receipt status 0 for tx {tx_hash}");
                self.handle_revert(nonce, &task, &reason, item, requeue).await;
            }
            Err(err) => {
                warn!(nonce, error = %err, "receipt_status failed, retrying");
                self.requeue(item, requeue).await;
            }
        }
    }

    /// The idempotence / reorg probe (`spec.md` §4.5): re-reads the task and
    /// branches into already-resolved / true-revert / reorg.
    async fn handle_revert(
        &mut self,
        nonce: u64,
        snapshot: &Task,
        reason: &str,
        item: QueueItem,
        requeue: &Sender<QueueItem>,
    ) {
        let onchain = match self.evm.tasks(&[nonce]).await {
            Ok(mut tasks) => tasks.pop(),
            Err(err) => {
                warn!(nonce, error = %err, "failed to re-read task after revert, retrying");
                self.requeue(item, requeue).await;
                return;
            }
        };

        match onchain {
            Some(onchain_task) if onchain_task.is_resolved => {
                info!(nonce, "task already resolved on-chain, treating relay as idempotent success");
                self.metrics.record_resolved();
                self.mark_resolved_in_store(nonce).await;
            }
            Some(onchain_task) if !onchain_task.seed_changed_from(snapshot) => {
                warn!(nonce, reason, "true on-chain revert, escalating retry");
                self.requeue(item, requeue).await;
            }
            _ => {
                info!(nonce, "task absent or seed changed on-chain: client-chain reorg, dropping");
                self.metrics.record_reorg_dropped();
                if let Some(store) = &self.store {
                    if let Err(err) = store.delete_from(nonce).await {
                        warn!(nonce, error = %err, "failed to delete reorg-suspect store records");
                    }
                }
            }
        }
    }

    async fn mark_resolved_in_store(&self, nonce: u64) {
        let Some(store) = &self.store else { return };
        match self.evm.current_block_number().await {
            Ok(height) => {
                if let Err(err) = store.resolve(nonce, height).await {
                    warn!(nonce, error = %err, "failed to record resolution in task store");
                }
            }
            Err(err) => {
                warn!(nonce, error = %err, "failed to read block height for store resolution");
            }
        }
    }

    async fn requeue(&self, item: QueueItem, requeue: &Sender<QueueItem>) {
        let nonce = item.nonce;
        let retried = item.retried();
        if requeue.send(retried).await.is_err() {
            warn!(nonce, "task queue closed, dropping retried task");
        }
    }
}
