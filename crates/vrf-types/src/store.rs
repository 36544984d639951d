//! The optional durable task store seam, and an in-memory implementation of it.

use crate::task::Task;
use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::Mutex;
use tracing::debug;

/// A stored task snapshot plus the bookkeeping the reorg sweep needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreRecord {
    pub task: Task,
    pub resolved_block_height: Option<u64>,
    pub fork_checked: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("task store backend error: {0}")]
    Backend(String),
}

/// The persistence seam the pipeline engine and fork sweep use when a durable
/// store is attached. Optional: the engine and poller run against an in-memory
/// default when no store is configured.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Insert or overwrite the record for `task.nonce`.
    async fn upsert(&self, task: Task) -> Result<(), StoreError>;

    /// The highest nonce the store has a record for, if any.
    async fn latest_nonce(&self) -> Result<Option<u64>, StoreError>;

    /// All stored tasks not yet marked resolved, ascending by nonce.
    async fn unresolved(&self) -> Result<Vec<StoreRecord>, StoreError>;

    /// Mark a nonce resolved at the given client-chain block height.
    async fn resolve(&self, nonce: u64, block_height: u64) -> Result<(), StoreError>;

    /// Clear a nonce's resolved state, used when the sweep detects a reorg past
    /// a previously resolved task.
    async fn mark_unresolved(&self, nonce: u64) -> Result<(), StoreError>;

    /// Record that the sweep has checked this nonce against the current chain head.
    async fn mark_fork_checked(&self, nonce: u64) -> Result<(), StoreError>;

    /// Resolved records not yet checked by the sweep, ascending by nonce.
    async fn to_fork_check(&self) -> Result<Vec<StoreRecord>, StoreError>;

    /// Remove a single nonce's record entirely.
    async fn delete(&self, nonce: u64) -> Result<(), StoreError>;

    /// Remove every record at or above `nonce`, used when a reorg invalidates a
    /// contiguous tail of recent tasks.
    async fn delete_from(&self, nonce: u64) -> Result<(), StoreError>;

    /// Current consecutive-error counter, used by the metrics side-channel.
    async fn error_count(&self) -> Result<u32, StoreError>;

    /// Overwrite the consecutive-error counter.
    async fn set_error_count(&self, count: u32) -> Result<(), StoreError>;
}

/// An in-memory [`TaskStore`] backed by a mutex-guarded ordered map.
///
/// Sufficient to exercise the reorg sweep and idempotence behavior without a
/// database dependency; not durable across process restarts.
#[derive(Debug, Default)]
pub struct InMemoryTaskStore {
    records: Mutex<BTreeMap<u64, StoreRecord>>,
    error_count: Mutex<u32>,
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn upsert(&self, task: Task) -> Result<(), StoreError> {
        let mut records = self.records.lock().await;
        let nonce = task.nonce;
        records
            .entry(nonce)
            .and_modify(|r| r.task = task.clone())
            .or_insert(StoreRecord {
                task,
                resolved_block_height: None,
                fork_checked: false,
            });
        Ok(())
    }

    async fn latest_nonce(&self) -> Result<Option<u64>, StoreError> {
        let records = self.records.lock().await;
        Ok(records.keys().next_back().copied())
    }

    async fn unresolved(&self) -> Result<Vec<StoreRecord>, StoreError> {
        let records = self.records.lock().await;
        Ok(records
            .values()
            .filter(|r| !r.task.is_resolved)
            .cloned()
            .collect())
    }

    async fn resolve(&self, nonce: u64, block_height: u64) -> Result<(), StoreError> {
        let mut records = self.records.lock().await;
        if let Some(record) = records.get_mut(&nonce) {
            record.task.is_resolved = true;
            record.resolved_block_height = Some(block_height);
            debug!(nonce, block_height, "task store: marked resolved");
        }
        Ok(())
    }

    async fn mark_unresolved(&self, nonce: u64) -> Result<(), StoreError> {
        let mut records = self.records.lock().await;
        if let Some(record) = records.get_mut(&nonce) {
            record.task.is_resolved = false;
            record.resolved_block_height = None;
            record.fork_checked = false;
        }
        Ok(())
    }

    async fn mark_fork_checked(&self, nonce: u64) -> Result<(), StoreError> {
        let mut records = self.records.lock().await;
        if let Some(record) = records.get_mut(&nonce) {
            record.fork_checked = true;
        }
        Ok(())
    }

    async fn to_fork_check(&self) -> Result<Vec<StoreRecord>, StoreError> {
        let records = self.records.lock().await;
        Ok(records
            .values()
            .filter(|r| r.task.is_resolved && !r.fork_checked)
            .cloned()
            .collect())
    }

    async fn delete(&self, nonce: u64) -> Result<(), StoreError> {
        let mut records = self.records.lock().await;
        records.remove(&nonce);
        Ok(())
    }

    async fn delete_from(&self, nonce: u64) -> Result<(), StoreError> {
        let mut records = self.records.lock().await;
        let before = records.len();
        records.retain(|&n, _| n < nonce);
        debug!(nonce, removed = before - records.len(), "task store: deleted tail");
        Ok(())
    }

    async fn error_count(&self) -> Result<u32, StoreError> {
        Ok(*self.error_count.lock().await)
    }

    async fn set_error_count(&self, count: u32) -> Result<(), StoreError> {
        *self.error_count.lock().await = count;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{Address, B256, Bytes, U256};

    fn task(nonce: u64) -> Task {
        Task {
            nonce,
            is_resolved: false,
            time: 1_700_000_000,
            caller: Address::ZERO,
            task_fee: U256::ZERO,
            seed: B256::ZERO,
            client_seed: Bytes::new(),
            result: B256::ZERO,
        }
    }

    #[tokio::test]
    async fn upsert_then_latest_nonce_tracks_max() {
        let store = InMemoryTaskStore::new();
        store.upsert(task(3)).await.unwrap();
        store.upsert(task(1)).await.unwrap();
        store.upsert(task(7)).await.unwrap();
        assert_eq!(store.latest_nonce().await.unwrap(), Some(7));
    }

    #[tokio::test]
    async fn resolve_then_mark_unresolved_round_trips() {
        let store = InMemoryTaskStore::new();
        store.upsert(task(5)).await.unwrap();
        store.resolve(5, 100).await.unwrap();
        assert!(store.unresolved().await.unwrap().is_empty());

        store.mark_unresolved(5).await.unwrap();
        let unresolved = store.unresolved().await.unwrap();
        assert_eq!(unresolved.len(), 1);
        assert_eq!(unresolved[0].resolved_block_height, None);
        assert!(!unresolved[0].fork_checked);
    }

    #[tokio::test]
    async fn to_fork_check_only_surfaces_unchecked_resolved_records() {
        let store = InMemoryTaskStore::new();
        store.upsert(task(1)).await.unwrap();
        store.upsert(task(2)).await.unwrap();
        store.resolve(1, 10).await.unwrap();
        store.resolve(2, 20).await.unwrap();
        store.mark_fork_checked(1).await.unwrap();

        let pending = store.to_fork_check().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].task.nonce, 2);
    }

    #[tokio::test]
    async fn delete_from_removes_contiguous_tail() {
        let store = InMemoryTaskStore::new();
        for n in 1..=5 {
            store.upsert(task(n)).await.unwrap();
        }
        store.delete_from(3).await.unwrap();
        assert_eq!(store.latest_nonce().await.unwrap(), Some(2));
    }
}
