//! Hub counters.
//!
//! Plain relaxed atomics bumped on the hot path; [`HubStats::snapshot`]
//! copies them into a serialisable [`StatsSnapshot`] for logging or the demo's
//! `--json` output.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Running totals for one hub.
#[derive(Debug, Default)]
pub struct HubStats {
    /// Payloads accepted by `enqueue`.
    pub enqueued: AtomicU64,
    /// Payloads that went through a dispatch pass (queued or immediate).
    pub dispatched: AtomicU64,
    /// Callback invocations that returned normally.
    pub delivered: AtomicU64,
    /// Deliveries skipped because a filter rejected the payload.
    pub filtered: AtomicU64,
    /// Panics caught in callbacks, filters or until-predicates.
    pub faults: AtomicU64,
    /// Completed `flush_all` calls.
    pub flushes: AtomicU64,
    /// Subscriptions removed by one-shot or until completion.
    pub completed: AtomicU64,
}

/// Point-in-time copy of [`HubStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub enqueued: u64,
    pub dispatched: u64,
    pub delivered: u64,
    pub filtered: u64,
    pub faults: u64,
    pub flushes: u64,
    pub completed: u64,
}

impl HubStats {
    pub(crate) fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add(counter: &AtomicU64, n: u64) {
        if n > 0 {
            counter.fetch_add(n, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            enqueued: self.enqueued.load(Ordering::Relaxed),
            dispatched: self.dispatched.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            filtered: self.filtered.load(Ordering::Relaxed),
            faults: self.faults.load(Ordering::Relaxed),
            flushes: self.flushes.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_reflects_counters() {
        let stats = HubStats::default();
        HubStats::bump(&stats.enqueued);
        HubStats::bump(&stats.enqueued);
        HubStats::add(&stats.delivered, 5);
        HubStats::add(&stats.faults, 0);

        let snap = stats.snapshot();
        assert_eq!(snap.enqueued, 2);
        assert_eq!(snap.delivered, 5);
        assert_eq!(snap.faults, 0);
    }

    #[test]
    fn test_snapshot_serializes() {
        let snap = StatsSnapshot {
            flushes: 3,
            ..Default::default()
        };
        let json = serde_json::to_value(snap).expect("serialize stats");
        assert_eq!(json["flushes"], 3);
        assert_eq!(json["enqueued"], 0);
    }
}
