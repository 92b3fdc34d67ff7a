//! Live phase engine: one rolling estimate per accepted event.

use contracts::{
    BufferConfig, ContractError, DifferencerConfig, MetricSample, TagReadEvent, TagSnapshot,
};
use tracing::{instrument, trace, warn};

use crate::buffer::{Rejection, RollingStore, SharedStore};
use crate::differencer::WindowedDifferencer;

/// Counters for the producer summary
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineStats {
    pub events_seen: u64,
    pub events_accepted: u64,
    /// Reads for tags outside the pair
    pub events_foreign: u64,
    /// Pair reads dropped for non-finite fields or negative timestamps
    pub events_malformed: u64,
    pub samples_emitted: u64,
    /// Accepted events whose window had no usable common channel
    pub windows_skipped: u64,
    pub alignment_errors: u64,
}

/// Rolling store plus differencer.
///
/// Unlike the offline sweep, every accepted event triggers a single-window
/// recompute over the most recent N buffered reads (N from
/// [`BufferConfig::live_len`]).
#[derive(Debug)]
pub struct PhaseEngine {
    store: SharedStore,
    differencer: WindowedDifferencer,
    stats: EngineStats,
}

impl PhaseEngine {
    /// # Errors
    /// Invalid differencer window geometry, or a windowed view larger than
    /// `BufferConfig::MAX_LIVE_LEN`.
    pub fn new(config: DifferencerConfig, buffer: &BufferConfig) -> Result<Self, ContractError> {
        let store = RollingStore::new(config.tag_pair.clone(), buffer)?;
        let differencer = WindowedDifferencer::new(config)?;
        Ok(Self {
            store: SharedStore::new(store),
            differencer,
            stats: EngineStats::default(),
        })
    }

    /// Push one event.
    ///
    /// Returns `Some(sample)` when the event was accepted and the windowed
    /// view has at least one usable common channel. The sample carries the
    /// event timestamp; the producer restamps it when receive time is used.
    #[instrument(
        level = "trace",
        name = "phase_engine_push",
        skip(self, event),
        fields(tag_id = %event.tag_id, timestamp_ms = event.timestamp_ms)
    )]
    pub fn push(&mut self, event: &TagReadEvent) -> Option<MetricSample> {
        self.stats.events_seen += 1;

        let [first, second] = match self.store.accept_and_window(event) {
            Ok(window) => window,
            Err(Rejection::Foreign) => {
                self.stats.events_foreign += 1;
                observability::metrics::record_event_rejected();
                return None;
            }
            Err(Rejection::Malformed) => {
                self.stats.events_malformed += 1;
                observability::metrics::record_event_malformed();
                return None;
            }
        };
        self.stats.events_accepted += 1;
        observability::metrics::record_event_accepted(event.tag_id.as_str());

        match self.differencer.window_value(&first, &second) {
            Ok(Some(value)) => {
                self.stats.samples_emitted += 1;
                observability::metrics::record_window_emitted(value);
                trace!(value, "live estimate");
                Some(MetricSample::new(value, event.timestamp_ms as f64 / 1000.0))
            }
            Ok(None) => {
                self.stats.windows_skipped += 1;
                observability::metrics::record_window_skipped();
                None
            }
            Err(e) => {
                self.stats.alignment_errors += 1;
                warn!(error = %e, "live window dropped");
                None
            }
        }
    }

    /// Handle for snapshots from outside the producer
    pub fn store(&self) -> SharedStore {
        self.store.clone()
    }

    pub fn snapshot(&self, windowed: bool) -> TagSnapshot {
        self.store.snapshot(windowed)
    }

    /// Empty the rolling store between runs
    pub fn clear(&mut self) {
        self.store.clear();
    }

    pub fn differencer(&self) -> &WindowedDifferencer {
        &self.differencer
    }

    pub fn stats(&self) -> EngineStats {
        self.stats
    }
}
