//! Monotonic terminal-classification counters (`spec.md` §7, §9).
//!
//! The engine increments these as it reaches terminal outcomes; nothing in
//! this crate reads them back out to a notification transport — that wiring
//! is the outer binary's concern, kept separate per §9 ("keep as an
//! observability side-channel, do not entangle with the pipeline").

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for every terminal classification a task can reach.
#[derive(Debug, Default)]
pub struct TerminalCounters {
    resolved: AtomicU64,
    oracle_rejected: AtomicU64,
    retries_exhausted: AtomicU64,
    reorg_dropped: AtomicU64,
    insufficient_power: AtomicU64,
    whitelist_rejected: AtomicU64,
}

impl TerminalCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_resolved(&self) {
        self.resolved.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_oracle_rejected(&self) {
        self.oracle_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_retries_exhausted(&self) {
        self.retries_exhausted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_reorg_dropped(&self) {
        self.reorg_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_insufficient_power(&self) {
        self.insufficient_power.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_whitelist_rejected(&self) {
        self.whitelist_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> TerminalCountersSnapshot {
        TerminalCountersSnapshot {
            resolved: self.resolved.load(Ordering::Relaxed),
            oracle_rejected: self.oracle_rejected.load(Ordering::Relaxed),
            retries_exhausted: self.retries_exhausted.load(Ordering::Relaxed),
            reorg_dropped: self.reorg_dropped.load(Ordering::Relaxed),
            insufficient_power: self.insufficient_power.load(Ordering::Relaxed),
            whitelist_rejected: self.whitelist_rejected.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time read of [`TerminalCounters`], for logging or an exporter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TerminalCountersSnapshot {
    pub resolved: u64,
    pub oracle_rejected: u64,
    pub retries_exhausted: u64,
    pub reorg_dropped: u64,
    pub insufficient_power: u64,
    pub whitelist_rejected: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_start_at_zero_and_increment_independently() {
        let counters = TerminalCounters::new();
        counters.record_resolved();
        counters.record_resolved();
        counters.record_reorg_dropped();

        let snapshot = counters.snapshot();
        assert_eq!(snapshot.resolved, 2);
        assert_eq!(snapshot.reorg_dropped, 1);
        assert_eq!(snapshot.oracle_rejected, 0);
    }
}
