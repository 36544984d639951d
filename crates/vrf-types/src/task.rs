//! The [`Task`] entity and the retry-aware queue item that wraps it.

use alloy_primitives::{Address, B256, Bytes, U256};
use serde::{Deserialize, Serialize};

/// A single VRF request as published through the client chain's `VRFProvider` contract.
///
/// Identified by `nonce`, which is dense and monotonically increasing. `seed` is fixed
/// for the lifetime of a non-forked task; `result` is only meaningful once
/// `is_resolved` is `true`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub nonce: u64,
    pub is_resolved: bool,
    pub time: u64,
    pub caller: Address,
    pub task_fee: U256,
    pub seed: B256,
    pub client_seed: Bytes,
    pub result: B256,
}

impl Task {
    /// Whether this task's `seed` differs from a previously observed snapshot.
    ///
    /// A changed seed at the same nonce is the signature of a client-chain reorg
    /// (`spec.md` §4.5, case 3).
    pub fn seed_changed_from(&self, previous: &Task) -> bool {
        self.seed != previous.seed
    }
}

/// One entry in the bounded task queue: a task snapshot plus how many times it has
/// already been retried.
///
/// Produced by the poller with `retry_count == 0`; re-enqueued by the pipeline engine
/// with `retry_count + 1` after a recoverable failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueItem {
    pub nonce: u64,
    pub task: Task,
    pub retry_count: u32,
}

impl QueueItem {
    pub fn new(nonce: u64, task: Task) -> Self {
        Self {
            nonce,
            task,
            retry_count: 0,
        }
    }

    /// Returns a copy of this item with the retry counter incremented, for
    /// re-enqueueing after a transient failure.
    pub fn retried(&self) -> Self {
        Self {
            nonce: self.nonce,
            task: self.task.clone(),
            retry_count: self.retry_count + 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(nonce: u64, seed: u8) -> Task {
        Task {
            nonce,
            is_resolved: false,
            time: 1_700_000_000,
            caller: Address::ZERO,
            task_fee: U256::ZERO,
            seed: B256::repeat_byte(seed),
            client_seed: Bytes::new(),
            result: B256::ZERO,
        }
    }

    #[test]
    fn seed_changed_detects_divergence() {
        let a = task(42, 0xbe);
        let b = task(42, 0xde);
        assert!(b.seed_changed_from(&a));
        assert!(!a.seed_changed_from(&a.clone()));
    }

    #[test]
    fn retried_increments_counter_and_preserves_task() {
        let item = QueueItem::new(7, task(7, 1));
        let retried = item.retried();
        assert_eq!(retried.retry_count, 1);
        assert_eq!(retried.nonce, item.nonce);
        assert_eq!(retried.task, item.task);
        let twice = retried.retried();
        assert_eq!(twice.retry_count, 2);
    }
}
