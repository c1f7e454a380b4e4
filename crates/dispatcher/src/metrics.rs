//! Per-sink counters

use std::sync::atomic::{AtomicU64, Ordering};

/// Metrics for a single sink, shared between handle and worker
#[derive(Debug, Default)]
pub struct SinkMetrics {
    render_count: AtomicU64,
    failure_count: AtomicU64,
    /// Frames replaced by a newer one before the worker got to them
    coalesced_count: AtomicU64,
    /// Revision of the last frame rendered successfully
    last_revision: AtomicU64,
}

impl SinkMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn render_count(&self) -> u64 {
        self.render_count.load(Ordering::Relaxed)
    }

    /// Count a successful render of `revision`
    pub fn record_render(&self, revision: u64) {
        self.render_count.fetch_add(1, Ordering::Relaxed);
        self.last_revision.store(revision, Ordering::Relaxed);
    }

    pub fn failure_count(&self) -> u64 {
        self.failure_count.load(Ordering::Relaxed)
    }

    pub fn inc_failure_count(&self) {
        self.failure_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn coalesced_count(&self) -> u64 {
        self.coalesced_count.load(Ordering::Relaxed)
    }

    pub fn inc_coalesced_count(&self) {
        self.coalesced_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn last_revision(&self) -> u64 {
        self.last_revision.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            render_count: self.render_count(),
            failure_count: self.failure_count(),
            coalesced_count: self.coalesced_count(),
            last_revision: self.last_revision(),
        }
    }
}

/// Snapshot of sink metrics (for reporting)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub render_count: u64,
    pub failure_count: u64,
    pub coalesced_count: u64,
    pub last_revision: u64,
}
