//! Source-side counters

use std::sync::atomic::{AtomicU64, Ordering};

/// Ingestion metrics, shared between a source and whoever reports on it
#[derive(Debug, Default)]
pub struct IngestionMetrics {
    /// Events handed to the producer
    pub events_emitted: AtomicU64,

    /// Lines that failed to decode
    pub malformed: AtomicU64,

    /// Completed passes over a recording
    pub passes: AtomicU64,
}

impl IngestionMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_emitted(&self) {
        self.events_emitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_malformed(&self) {
        self.malformed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_pass(&self) {
        self.passes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            events_emitted: self.events_emitted.load(Ordering::Relaxed),
            malformed: self.malformed.load(Ordering::Relaxed),
            passes: self.passes.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`IngestionMetrics`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub events_emitted: u64,
    pub malformed: u64,
    pub passes: u64,
}
