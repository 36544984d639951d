//! The task poller: discovers newly created tasks and enqueues them
//! (`spec.md` §4.4).

use crate::metrics::TerminalCounters;
use alloy_primitives::Address;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::mpsc::Sender;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use vrf_chain_evm::EvmClient;
use vrf_types::{EngineConfig, QueueItem, TaskStore};

/// Resolves the nonce the poller should start sweeping from at boot.
///
/// `max(current_task_nonce - startup_nonce_check, configured_start_nonce)`,
/// overridden by the store's `latest_nonce` when a durable store is attached
/// and already has a watermark (`spec.md` §4.4, SPEC_FULL.md "Task Poller").
pub async fn resolve_start_nonce(
    evm: &EvmClient,
    engine_config: &EngineConfig,
    configured_start_nonce: u64,
    store: Option<&dyn TaskStore>,
) -> Result<u64, vrf_chain_evm::EvmClientError> {
    if let Some(store) = store {
        if let Ok(Some(latest)) = store.latest_nonce().await {
            return Ok(latest);
        }
    }
    let current = evm.current_task_nonce().await?;
    Ok(current
        .saturating_sub(engine_config.startup_nonce_check)
        .max(configured_start_nonce))
}

/// Sweeps `[current, current_task_nonce)` on every tick, enqueueing
/// unresolved tasks from whitelisted callers in ascending nonce order.
#[allow(clippy::too_many_arguments)]
pub async fn run(
    evm: Arc<EvmClient>,
    mut current: u64,
    whitelist: HashSet<Address>,
    engine_config: EngineConfig,
    queue: Sender<QueueItem>,
    cancellation: CancellationToken,
    metrics: Arc<TerminalCounters>,
    store: Option<Arc<dyn TaskStore>>,
) {
    loop {
        tokio::select! {
            _ = cancellation.cancelled() => {
                info!("poller shutting down");
                return;
            }
            _ = tokio::time::sleep(engine_config.poll_rate()) => {}
        }

        let latest = match evm.current_task_nonce().await {
            Ok(latest) => latest,
            Err(err) => {
                warn!(error = %err, "transient error reading current task nonce, will retry next tick");
                continue;
            }
        };

        if latest <= current {
            continue;
        }

        let nonces: Vec<u64> = (current..latest).collect();
        let tasks = match evm.tasks(&nonces).await {
            Ok(tasks) => tasks,
            Err(err) => {
                warn!(error = %err, "transient error bulk-reading tasks, will retry next tick");
                continue;
            }
        };

        for (nonce, task) in nonces.into_iter().zip(tasks) {
            if task.is_resolved {
                continue;
            }
            if !whitelist.contains(&task.caller) {
                metrics.record_whitelist_rejected();
                continue;
            }
            if let Some(store) = &store {
                if let Err(err) = store.upsert(task.clone()).await {
                    warn!(nonce, error = %err, "failed to persist newly discovered task to store");
                }
            }
            if queue.send(QueueItem::new(nonce, task)).await.is_err() {
                warn!(nonce, "task queue receiver dropped, poller exiting");
                return;
            }
        }

        current = latest;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{B256, Bytes, U256};
    use vrf_types::Task;

    fn task(nonce: u64, caller: Address, is_resolved: bool) -> Task {
        Task {
            nonce,
            is_resolved,
            time: 1_700_000_000,
            caller,
            task_fee: U256::ZERO,
            seed: B256::ZERO,
            client_seed: Bytes::new(),
            result: B256::ZERO,
        }
    }

    #[test]
    fn whitelist_and_resolution_gating_matches_spec() {
        let whitelisted = Address::repeat_byte(0x01);
        let not_whitelisted = Address::repeat_byte(0x02);
        let whitelist: HashSet<Address> = [whitelisted].into_iter().collect();

        let candidates = [
            task(1, whitelisted, false),
            task(2, not_whitelisted, false),
            task(3, whitelisted, true),
        ];

        let enqueued: Vec<u64> = candidates
            .iter()
            .filter(|t| !t.is_resolved && whitelist.contains(&t.caller))
            .map(|t| t.nonce)
            .collect();

        assert_eq!(enqueued, vec![1]);
    }
}
