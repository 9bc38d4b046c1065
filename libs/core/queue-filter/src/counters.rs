//! Shared run counters.
//!
//! The processed count doubles as the `max_messages` budget: a worker must
//! claim a slot *before* it disposes of a fetched message, and the claim is a
//! compare-exchange loop so two workers can never both take the last slot.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Atomically updated counters shared by every worker.
#[derive(Debug)]
pub struct RunCounters {
    limit: Option<u64>,
    processed: AtomicU64,
    matched: AtomicU64,
    republished: AtomicU64,
    requeued: AtomicU64,
}

impl RunCounters {
    /// Create counters, optionally bounded by a processing limit.
    pub fn new(limit: Option<u64>) -> Self {
        Self {
            limit,
            processed: AtomicU64::new(0),
            matched: AtomicU64::new(0),
            republished: AtomicU64::new(0),
            requeued: AtomicU64::new(0),
        }
    }

    /// Claim one processing slot. Returns `false` once the limit is
    /// exhausted, in which case the caller must not dispose of its message.
    pub fn try_claim(&self) -> bool {
        let Some(limit) = self.limit else {
            self.processed.fetch_add(1, Ordering::SeqCst);
            return true;
        };
        loop {
            let current = self.processed.load(Ordering::SeqCst);
            if current >= limit {
                return false;
            }
            if self
                .processed
                .compare_exchange(current, current + 1, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
            {
                return true;
            }
        }
    }

    /// Record a message that matched the rules.
    pub fn record_matched(&self) {
        self.matched.fetch_add(1, Ordering::SeqCst);
    }

    /// Record a confirmed republish.
    pub fn record_republished(&self) {
        self.republished.fetch_add(1, Ordering::SeqCst);
    }

    /// Record a message given back to the broker after a republish failure.
    pub fn record_requeued(&self) {
        self.requeued.fetch_add(1, Ordering::SeqCst);
    }

    /// Snapshot for the end-of-run summary.
    pub fn snapshot(&self) -> RunSummary {
        let processed = self.processed.load(Ordering::SeqCst);
        let matched = self.matched.load(Ordering::SeqCst);
        let republished = self.republished.load(Ordering::SeqCst);
        let requeued = self.requeued.load(Ordering::SeqCst);
        RunSummary {
            processed,
            matched,
            republished,
            // Everything processed that was neither put back nor given back
            // was acknowledged away.
            dropped: processed - republished - requeued,
            requeued,
        }
    }
}

/// End-of-run counts, emitted at STOPPED regardless of how the run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub processed: u64,
    pub matched: u64,
    pub republished: u64,
    pub dropped: u64,
    pub requeued: u64,
}
