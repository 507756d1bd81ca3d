//! Shared progress counters.
//!
//! `items_processed` counts every item that completes the final stage,
//! whether or not its output write succeeded: it measures throughput.
//! `items_succeeded` is the stricter counter and only moves when the sink
//! reports success. `items_processed - items_succeeded` is the number of
//! sink write failures.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Lock-free counters shared by the source, the stages and the monitor.
#[derive(Debug, Default)]
pub struct Counters {
    /// Items admitted to the pipeline by the scan. Set once before processing.
    items_total: AtomicU64,
    /// Items that reached the end of the final stage.
    items_processed: AtomicU64,
    /// Items the final stage wrote successfully.
    items_succeeded: AtomicU64,
    /// Items dropped by a read or transform failure before the sink.
    items_dropped: AtomicU64,
    /// Inputs rejected by the scan before entering the pipeline.
    items_skipped: AtomicU64,
}

impl Counters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the number of items the scan admitted.
    pub fn set_items_total(&self, total: u64) {
        self.items_total.store(total, Ordering::Relaxed);
    }

    /// Record inputs that the scan rejected.
    pub fn add_skipped(&self, count: u64) {
        self.items_skipped.fetch_add(count, Ordering::Relaxed);
    }

    /// Record an item that finished the final stage.
    pub fn add_processed(&self, succeeded: bool) {
        if succeeded {
            self.items_succeeded.fetch_add(1, Ordering::Relaxed);
        }
        self.items_processed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an item dropped mid-pipeline.
    pub fn add_dropped(&self) {
        self.items_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn items_total(&self) -> u64 {
        self.items_total.load(Ordering::Relaxed)
    }

    pub fn items_processed(&self) -> u64 {
        self.items_processed.load(Ordering::Relaxed)
    }

    pub fn items_succeeded(&self) -> u64 {
        self.items_succeeded.load(Ordering::Relaxed)
    }

    pub fn items_dropped(&self) -> u64 {
        self.items_dropped.load(Ordering::Relaxed)
    }

    pub fn items_skipped(&self) -> u64 {
        self.items_skipped.load(Ordering::Relaxed)
    }

    /// Get a snapshot of current counter values.
    pub fn snapshot(&self) -> CountersSnapshot {
        CountersSnapshot {
            items_total: self.items_total(),
            items_processed: self.items_processed(),
            items_succeeded: self.items_succeeded(),
            items_dropped: self.items_dropped(),
            items_skipped: self.items_skipped(),
        }
    }
}

/// Point-in-time copy of [`Counters`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CountersSnapshot {
    pub items_total: u64,
    pub items_processed: u64,
    pub items_succeeded: u64,
    pub items_dropped: u64,
    pub items_skipped: u64,
}

impl CountersSnapshot {
    /// Items that reached the sink but failed to write.
    pub fn sink_failures(&self) -> u64 {
        self.items_processed.saturating_sub(self.items_succeeded)
    }

    /// Completion percentage based on processed vs total.
    pub fn percent_complete(&self) -> f64 {
        if self.items_total == 0 {
            100.0
        } else {
            (self.items_processed as f64 / self.items_total as f64) * 100.0
        }
    }
}
