//! The background fork/reorg sweep, active only when a [`TaskStore`] is
//! attached (`spec.md` §4.6). Complements the reactive detection the engine
//! performs on every relay revert.

use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use vrf_chain_evm::{EvmClient, EvmClientError};
use vrf_types::{StoreError, TaskStore};

#[derive(Debug, thiserror::Error)]
pub enum SweepError {
    #[error(transparent)]
    Evm(#[from] EvmClientError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Runs the sweep on `interval`, checking resolved-but-unchecked records
/// that are more than `block_diff` blocks behind the current head.
pub async fn run(
    evm: Arc<EvmClient>,
    store: Arc<dyn TaskStore>,
    block_diff: u64,
    interval: Duration,
    cancellation: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancellation.cancelled() => {
                info!("fork sweep shutting down");
                return;
            }
            _ = tokio::time::sleep(interval) => {}
        }

        if let Err(err) = sweep_once(&evm, store.as_ref(), block_diff).await {
            warn!(error = %err, "fork sweep tick failed, will retry next interval");
        }
    }
}

async fn sweep_once(
    evm: &EvmClient,
    store: &dyn TaskStore,
    block_diff: u64,
) -> Result<(), SweepError> {
    let head = evm.current_block_number().await?;

    let mut candidates = store.to_fork_check().await?;
    candidates.sort_by_key(|r| r.task.nonce);

    for record in candidates {
        let Some(resolved_height) = record.resolved_block_height else {
            continue;
        };
        if head.saturating_sub(resolved_height) < block_diff {
            continue;
        }

        let onchain = evm.tasks(&[record.task.nonce]).await?;
        let Some(onchain_task) = onchain.into_iter().next() else {
            info!(nonce = record.task.nonce, "sweep found task absent on-chain: reorg boundary");
            if let Err(err) = store.delete_from(record.task.nonce).await {
                warn!(nonce = record.task.nonce, error = %err, "failed to delete reorg-suspect store records");
            }
            return Ok(());
        };

        if onchain_task.seed != record.task.seed {
            info!(
                nonce = record.task.nonce,
                "sweep found changed seed on-chain: reorg boundary located"
            );
            if let Err(err) = store.delete_from(record.task.nonce).await {
                warn!(nonce = record.task.nonce, error = %err, "failed to delete reorg-suspect store records");
            }
            return Ok(());
        }

        if !onchain_task.is_resolved {
            info!(nonce = record.task.nonce, "sweep found relay rolled back, marking unresolved");
            if let Err(err) = store.mark_unresolved(record.task.nonce).await {
                warn!(nonce = record.task.nonce, error = %err, "failed to mark task unresolved in store");
            }
            continue;
        }

        if let Err(err) = store.mark_fork_checked(record.task.nonce).await {
            warn!(nonce = record.task.nonce, error = %err, "failed to mark task fork-checked in store");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{Address, B256, Bytes, U256};
    use vrf_types::{InMemoryTaskStore, Task};

    fn task(nonce: u64, seed: u8, is_resolved: bool) -> Task {
        Task {
            nonce,
            is_resolved,
            time: 1_700_000_000,
            caller: Address::ZERO,
            task_fee: U256::ZERO,
            seed: B256::repeat_byte(seed),
            client_seed: Bytes::new(),
            result: B256::ZERO,
        }
    }

    #[tokio::test]
    async fn to_fork_check_only_returns_resolved_unchecked_records() {
        let store = InMemoryTaskStore::new();
        store.upsert(task(1, 0xaa, false)).await.unwrap();
        store.upsert(task(2, 0xbb, false)).await.unwrap();
        store.resolve(2, 100).await.unwrap();

        let candidates = store.to_fork_check().await.unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].task.nonce, 2);
    }
}
