//! Filtered rolling store of tag reads.
//!
//! Uses index-based separation:
//! - an append-only arena (`Vec<TagRecord>`) holds the full history
//! - a HeapRb holds the sequence numbers of the most recent N records
//!
//! Records are small `Copy` values tagged with their slot in the pair, so
//! per-tag and per-channel views are index scans over a single source of
//! truth rather than separately maintained containers.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use contracts::{
    BufferConfig, ContractError, PhaseUnit, TagPair, TagReadEvent, TagSeries, TagSlot, TagSnapshot,
};
use ringbuf::{traits::*, HeapRb};
use tracing::warn;

use crate::wrap::normalize_degrees;

/// Stored form of an accepted read
#[derive(Debug, Clone, Copy)]
struct TagRecord {
    slot: TagSlot,
    timestamp_ms: i64,
    channel: f64,
    /// Degrees in `[0, 360)`
    phase: f64,
    rssi: f64,
    read_count: u32,
}

/// Why a read was not stored
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// Tag outside the pair
    Foreign,
    /// Non-finite field or negative timestamp
    Malformed,
}

/// Counters exposed for logging and summaries
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub accepted: u64,
    /// Reads for tags outside the pair
    pub rejected: u64,
    /// Reads with non-finite fields or negative timestamps
    pub malformed: u64,
    /// Records currently held in full history
    pub history_len: usize,
    /// Records currently in the windowed view
    pub live_len: usize,
    /// Records trimmed by `history_limit`
    pub trimmed: u64,
}

/// Rolling store for one tag pair
pub struct RollingStore {
    pair: TagPair,
    unit: PhaseUnit,
    /// Full history in arrival order; `records[0]` has sequence number `base`
    records: Vec<TagRecord>,
    /// Sequence numbers of the most recent `capacity` records
    live: HeapRb<u64>,
    capacity: usize,
    base: u64,
    history_limit: Option<usize>,
    stats: StoreStats,
}

impl fmt::Debug for RollingStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RollingStore")
            .field("pair", &self.pair)
            .field("history", &self.records.len())
            .field("live", &self.live.occupied_len())
            .field("capacity", &self.capacity)
            .finish()
    }
}

impl RollingStore {
    /// Create a store whose windowed view holds `config.live_len()` records
    ///
    /// # Errors
    /// The windowed view would exceed `BufferConfig::MAX_LIVE_LEN`.
    pub fn new(pair: TagPair, config: &BufferConfig) -> Result<Self, ContractError> {
        let capacity = config.checked_live_len()?;
        Ok(Self {
            pair,
            unit: config.phase_unit,
            records: Vec::with_capacity(capacity),
            live: HeapRb::new(capacity),
            capacity,
            base: 0,
            // History never shrinks below the windowed view
            history_limit: config.history_limit.map(|limit| limit.max(capacity)),
            stats: StoreStats::default(),
        })
    }

    /// Load a recording into a store that keeps its full history
    pub fn from_events<'a>(
        pair: TagPair,
        config: &BufferConfig,
        events: impl IntoIterator<Item = &'a TagReadEvent>,
    ) -> Result<Self, ContractError> {
        let unbounded = BufferConfig {
            history_limit: None,
            ..config.clone()
        };
        let mut store = Self::new(pair, &unbounded)?;
        for event in events {
            store.accept(event);
        }
        Ok(store)
    }

    pub fn pair(&self) -> &TagPair {
        &self.pair
    }

    /// Windowed view length N
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Filter, convert and append one read.
    ///
    /// Returns `false` for tags outside the pair and for malformed reads,
    /// which are logged and dropped.
    pub fn accept(&mut self, event: &TagReadEvent) -> bool {
        self.admit(event).is_ok()
    }

    /// Like [`accept`](Self::accept), reporting why a read was dropped
    pub fn admit(&mut self, event: &TagReadEvent) -> Result<(), Rejection> {
        let Some(slot) = self.pair.slot_of(&event.tag_id) else {
            self.stats.rejected += 1;
            return Err(Rejection::Foreign);
        };

        if !event.phase.is_finite()
            || !event.rssi.is_finite()
            || !event.channel.is_finite()
            || event.timestamp_ms < 0
        {
            self.stats.malformed += 1;
            warn!(
                tag_id = %event.tag_id,
                timestamp_ms = event.timestamp_ms,
                phase = event.phase,
                rssi = event.rssi,
                channel = event.channel,
                "dropping malformed tag read"
            );
            return Err(Rejection::Malformed);
        }

        let record = TagRecord {
            slot,
            timestamp_ms: event.timestamp_ms,
            channel: event.channel,
            phase: normalize_degrees(self.unit.to_degrees(event.phase)),
            rssi: event.rssi,
            read_count: event.read_count,
        };

        let seq = self.base + self.records.len() as u64;
        self.records.push(record);
        self.live.push_overwrite(seq);
        self.stats.accepted += 1;
        self.trim_history();
        Ok(())
    }

    fn trim_history(&mut self) {
        let Some(limit) = self.history_limit else {
            return;
        };
        // Trim in chunks so the drain cost is amortized
        if self.records.len() >= limit + limit / 4 + 1 {
            let excess = self.records.len() - limit;
            self.records.drain(..excess);
            self.base += excess as u64;
            self.stats.trimmed += excess as u64;
        }
    }

    /// Parallel arrays per slot, `[first, second]`.
    ///
    /// `windowed` restricts the view to the most recent N records.
    pub fn series(&self, windowed: bool) -> [TagSeries; 2] {
        let mut out = [TagSeries::default(), TagSeries::default()];
        let mut push = |r: &TagRecord| {
            out[r.slot.index()].push(r.timestamp_ms, r.channel, r.phase, r.rssi, r.read_count);
        };

        if windowed {
            for seq in self.live.iter() {
                if let Some(r) = self.record(*seq) {
                    push(r);
                }
            }
        } else {
            self.records.iter().for_each(push);
        }
        out
    }

    /// Export view: one entry per tag of the pair
    pub fn snapshot(&self, windowed: bool) -> TagSnapshot {
        let [first, second] = self.series(windowed);
        let mut snapshot = TagSnapshot::default();
        snapshot.tags.insert(self.pair.first().clone(), first);
        snapshot.tags.insert(self.pair.second().clone(), second);
        snapshot
    }

    /// Drop every buffered record; counters survive
    pub fn clear(&mut self) {
        self.base += self.records.len() as u64;
        self.records.clear();
        self.live.clear();
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn stats(&self) -> StoreStats {
        StoreStats {
            history_len: self.records.len(),
            live_len: self.live.occupied_len(),
            ..self.stats
        }
    }

    fn record(&self, seq: u64) -> Option<&TagRecord> {
        let idx = seq.checked_sub(self.base)?;
        self.records.get(idx as usize)
    }
}

/// Synchronized handle to a [`RollingStore`].
///
/// The producer mutates through it; anyone else takes copies.
#[derive(Debug, Clone)]
pub struct SharedStore {
    inner: Arc<Mutex<RollingStore>>,
}

impl SharedStore {
    pub fn new(store: RollingStore) -> Self {
        Self {
            inner: Arc::new(Mutex::new(store)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, RollingStore> {
        // A panic while holding the lock cannot leave a record half-written
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn accept(&self, event: &TagReadEvent) -> bool {
        self.lock().accept(event)
    }

    /// Accept and, on success, copy out the windowed series in one lock
    pub fn accept_and_window(&self, event: &TagReadEvent) -> Result<[TagSeries; 2], Rejection> {
        let mut store = self.lock();
        store.admit(event)?;
        Ok(store.series(true))
    }

    pub fn snapshot(&self, windowed: bool) -> TagSnapshot {
        self.lock().snapshot(windowed)
    }

    pub fn clear(&self) {
        self.lock().clear()
    }

    pub fn stats(&self) -> StoreStats {
        self.lock().stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_store(read_rate_hz: f64, window_s: f64) -> RollingStore {
        let config = BufferConfig {
            read_rate_hz,
            window_s,
            ..Default::default()
        };
        RollingStore::new(TagPair::new("A", "B").unwrap(), &config).unwrap()
    }

    fn make_event(tag: &str, t: i64, phase: f64) -> TagReadEvent {
        TagReadEvent::new(tag, t, 5.0, phase, -55.0, 1)
    }

    #[test]
    fn test_rejects_foreign_tags() {
        let mut store = make_store(10.0, 1.0);
        assert!(store.accept(&make_event("A", 0, 10.0)));
        assert!(!store.accept(&make_event("C", 1, 10.0)));
        assert_eq!(store.len(), 1);
        assert_eq!(store.stats().rejected, 1);
    }

    #[test]
    fn test_malformed_is_dropped_not_raised() {
        let mut store = make_store(10.0, 1.0);
        assert!(!store.accept(&make_event("A", 0, f64::NAN)));
        assert!(!store.accept(&make_event("A", -5, 10.0)));
        assert!(store.is_empty());
        assert_eq!(store.stats().malformed, 2);
    }

    #[test]
    fn test_phase_normalized_on_ingest() {
        let mut store = make_store(10.0, 1.0);
        store.accept(&make_event("A", 0, -30.0));
        store.accept(&make_event("B", 1, 400.0));
        let [a, b] = store.series(false);
        assert_eq!(a.phases, vec![330.0]);
        assert_eq!(b.phases, vec![40.0]);
    }

    #[test]
    fn test_radians_converted() {
        let config = BufferConfig {
            phase_unit: PhaseUnit::Radians,
            ..Default::default()
        };
        let mut store = RollingStore::new(TagPair::new("A", "B").unwrap(), &config).unwrap();
        store.accept(&make_event("A", 0, std::f64::consts::FRAC_PI_2));
        let [a, _] = store.series(false);
        assert!((a.phases[0] - 90.0).abs() < 1e-9);
    }

    #[test]
    fn test_windowed_view_keeps_last_n() {
        let mut store = make_store(4.0, 1.0);
        for t in 0..10 {
            let tag = if t % 2 == 0 { "A" } else { "B" };
            store.accept(&make_event(tag, t, t as f64));
        }
        assert_eq!(store.capacity(), 4);
        let [a, b] = store.series(true);
        assert_eq!(a.timestamps, vec![6, 8]);
        assert_eq!(b.timestamps, vec![7, 9]);
        let [full_a, _] = store.series(false);
        assert_eq!(full_a.len(), 5);
    }

    #[test]
    fn test_history_limit_trims_but_keeps_window() {
        let config = BufferConfig {
            read_rate_hz: 2.0,
            window_s: 1.0,
            history_limit: Some(4),
            ..Default::default()
        };
        let mut store = RollingStore::new(TagPair::new("A", "B").unwrap(), &config).unwrap();
        for t in 0..20 {
            store.accept(&make_event("A", t, 1.0));
        }
        assert!(store.len() <= 5);
        let [a, _] = store.series(true);
        assert_eq!(a.timestamps, vec![18, 19]);
        assert!(store.stats().trimmed > 0);
    }

    #[test]
    fn test_clear_between_runs() {
        let mut store = make_store(4.0, 1.0);
        store.accept(&make_event("A", 0, 1.0));
        store.accept(&make_event("B", 1, 1.0));
        store.clear();
        assert!(store.is_empty());
        assert!(store.series(true)[0].is_empty());
        store.accept(&make_event("A", 2, 1.0));
        assert_eq!(store.series(true)[0].timestamps, vec![2]);
        assert_eq!(store.stats().accepted, 3);
    }

    #[test]
    fn test_snapshot_has_both_tags() {
        let mut store = make_store(4.0, 1.0);
        store.accept(&make_event("A", 0, 1.0));
        let snapshot = store.snapshot(false);
        assert_eq!(snapshot.tags.len(), 2);
        assert!(snapshot.get("B").is_some_and(TagSeries::is_empty));
    }

    #[test]
    fn test_oversized_live_window_is_an_error() {
        let config = BufferConfig {
            read_rate_hz: 1e300,
            ..Default::default()
        };
        let err = RollingStore::new(TagPair::new("A", "B").unwrap(), &config).unwrap_err();
        assert!(matches!(err, ContractError::ConfigValidation { .. }));
    }

    #[test]
    fn test_from_events_keeps_full_history() {
        let config = BufferConfig {
            read_rate_hz: 2.0,
            window_s: 1.0,
            history_limit: Some(2),
            ..Default::default()
        };
        let events: Vec<_> = (0..10)
            .map(|t| make_event(if t % 2 == 0 { "A" } else { "B" }, t, 1.0))
            .collect();
        let store =
            RollingStore::from_events(TagPair::new("A", "B").unwrap(), &config, &events).unwrap();
        assert_eq!(store.len(), 10);
        assert_eq!(store.stats().trimmed, 0);
        assert_eq!(store.snapshot(false).total_records(), 10);
    }

    #[test]
    fn test_shared_store_copies() {
        let shared = SharedStore::new(make_store(4.0, 1.0));
        let window = shared.accept_and_window(&make_event("A", 0, 1.0)).unwrap();
        assert_eq!(window[0].len(), 1);
        assert_eq!(
            shared.accept_and_window(&make_event("Z", 1, 1.0)).unwrap_err(),
            Rejection::Foreign
        );
        assert_eq!(
            shared.accept_and_window(&make_event("A", 2, f64::NAN)).unwrap_err(),
            Rejection::Malformed
        );
        let other = shared.clone();
        assert_eq!(other.snapshot(false).total_records(), 1);
        other.clear();
        assert_eq!(shared.stats().history_len, 0);
    }
}
