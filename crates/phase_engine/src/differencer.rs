//! Sliding-window phase differencer.
//!
//! A sweep walks `window_start` from the later of the two first timestamps
//! in steps of `stride` while `window_start + duration` fits before the
//! earlier of the two last timestamps. Each window yields at most one sample,
//! stamped with the window end.

use std::sync::Arc;

use contracts::{
    AlignedPair, ContractError, DifferencerConfig, MetricSample, SignalKind, TagSeries,
    TagSnapshot,
};
use tracing::{debug, error, instrument};

use crate::aligner::{build_aligner, Aligner, SeriesView};
use crate::wrap::fold_to_minimal;

/// Differencer bound to one configuration
#[derive(Clone)]
pub struct WindowedDifferencer {
    config: DifferencerConfig,
    aligner: Arc<dyn Aligner>,
}

impl std::fmt::Debug for WindowedDifferencer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WindowedDifferencer")
            .field("config", &self.config)
            .field("aligner", &self.aligner.name())
            .finish()
    }
}

impl WindowedDifferencer {
    /// Validate the window geometry and pick the aligner.
    ///
    /// # Errors
    /// Non-positive or non-finite duration or stride.
    pub fn new(config: DifferencerConfig) -> Result<Self, ContractError> {
        check_positive("window_duration_s", config.window_duration_s)?;
        check_positive("window_stride_s", config.window_stride_s)?;
        let aligner = build_aligner(&config);
        Ok(Self { config, aligner })
    }

    /// Use a custom aligner instead of the configured mode
    pub fn with_aligner(mut self, aligner: Arc<dyn Aligner>) -> Self {
        self.aligner = aligner;
        self
    }

    pub fn config(&self) -> &DifferencerConfig {
        &self.config
    }

    pub fn aligner(&self) -> &dyn Aligner {
        self.aligner.as_ref()
    }

    /// Lazy sweep over `snapshot`.
    ///
    /// # Errors
    /// Either configured tag has no records in `snapshot`.
    #[instrument(
        level = "debug",
        name = "differencer_sweep",
        skip(self, snapshot),
        fields(mode = self.aligner.name(), records = snapshot.total_records())
    )]
    pub fn sweep<'a>(&'a self, snapshot: &'a TagSnapshot) -> Result<WindowSweep<'a>, ContractError> {
        let first = present_series(snapshot, self.config.tag_pair.first().as_str())?;
        let second = present_series(snapshot, self.config.tag_pair.second().as_str())?;

        let (first_min, first_max) = time_bounds(first);
        let (second_min, second_max) = time_bounds(second);
        let origin_ms = first_min.max(second_min) as f64;
        let end_ms = first_max.min(second_max) as f64;

        debug!(
            origin_ms,
            end_ms,
            duration_ms = self.config.duration_ms(),
            stride_ms = self.config.stride_ms(),
            "starting window sweep"
        );

        Ok(WindowSweep {
            differencer: self,
            first: SortedSeries::new(first),
            second: SortedSeries::new(second),
            origin_ms,
            end_ms,
            index: 0,
            failed: false,
        })
    }

    /// Convenience: run the whole sweep and collect the samples
    pub fn sweep_all(&self, snapshot: &TagSnapshot) -> Result<Vec<MetricSample>, ContractError> {
        self.sweep(snapshot)?.collect()
    }

    /// Aggregate difference of two window slices.
    ///
    /// `Ok(None)` when no common channel has enough reads on both sides.
    /// Channels whose mean is not finite are left out of the average.
    pub fn window_value(
        &self,
        first: &TagSeries,
        second: &TagSeries,
    ) -> Result<Option<f64>, ContractError> {
        if first.is_empty() || second.is_empty() {
            return Ok(None);
        }

        let min_points = self.aligner.min_points();
        let second_channels = second.by_channel();
        let mut channel_means = Vec::new();

        for a in first.by_channel() {
            let Some(b) = second_channels.iter().find(|b| b.channel == a.channel) else {
                continue;
            };
            if a.len() < min_points || b.len() < min_points {
                continue;
            }

            let (va, vb) = match self.config.signal {
                SignalKind::Phase => (&a.phases, &b.phases),
                SignalKind::Rssi => (&a.rssis, &b.rssis),
            };
            let Some(pair) = self.aligner.align(
                SeriesView::new(&a.timestamps, va),
                SeriesView::new(&b.timestamps, vb),
            ) else {
                debug_assert!(false, "aligner rejected inputs that met min_points");
                error!(channel = a.channel, aligner = self.aligner.name(), "alignment failed");
                return Err(ContractError::alignment(
                    a.channel,
                    format!("{} aligner produced no pairing", self.aligner.name()),
                ));
            };

            if let Some(mean) = self.channel_mean(&pair) {
                channel_means.push(mean);
            }
        }

        if channel_means.is_empty() {
            return Ok(None);
        }

        let overall = channel_means.iter().sum::<f64>() / channel_means.len() as f64;
        Ok(Some(match self.config.signal {
            SignalKind::Phase => fold_to_minimal(overall),
            SignalKind::Rssi => overall,
        }))
    }

    fn channel_mean(&self, pair: &AlignedPair) -> Option<f64> {
        if pair.is_empty() {
            return None;
        }
        let sum: f64 = match self.config.signal {
            SignalKind::Phase => pair.differences().map(|d| fold_to_minimal(d.abs())).sum(),
            SignalKind::Rssi => pair.differences().sum(),
        };
        let mean = sum / pair.len() as f64;
        mean.is_finite().then_some(mean)
    }
}

fn check_positive(field: &str, value: f64) -> Result<(), ContractError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ContractError::config_validation(
            field,
            format!("must be a positive number, got {value}"),
        ))
    }
}

fn present_series<'a>(snapshot: &'a TagSnapshot, tag_id: &str) -> Result<&'a TagSeries, ContractError> {
    snapshot
        .get(tag_id)
        .filter(|series| !series.is_empty())
        .ok_or_else(|| ContractError::MissingTag {
            tag_id: tag_id.to_string(),
        })
}

fn time_bounds(series: &TagSeries) -> (i64, i64) {
    let min = series.timestamps.iter().copied().min().unwrap_or_default();
    let max = series.timestamps.iter().copied().max().unwrap_or_default();
    (min, max)
}

/// Series plus a flag allowing binary-searched window slicing
#[derive(Clone, Copy)]
struct SortedSeries<'a> {
    series: &'a TagSeries,
    sorted: bool,
}

impl<'a> SortedSeries<'a> {
    fn new(series: &'a TagSeries) -> Self {
        let sorted = series.timestamps.windows(2).all(|w| w[0] <= w[1]);
        Self { series, sorted }
    }

    /// Reads with `start_ms <= t < end_ms`
    fn window(&self, start_ms: f64, end_ms: f64) -> TagSeries {
        if !self.sorted {
            return self.series.window(start_ms, end_ms);
        }
        let ts = &self.series.timestamps;
        let lo = ts.partition_point(|&t| (t as f64) < start_ms);
        let hi = ts.partition_point(|&t| (t as f64) < end_ms);
        TagSeries {
            timestamps: ts[lo..hi].to_vec(),
            channels: self.series.channels[lo..hi].to_vec(),
            phases: self.series.phases[lo..hi].to_vec(),
            rssis: self.series.rssis[lo..hi].to_vec(),
            read_counts: self.series.read_counts[lo..hi].to_vec(),
        }
    }
}

/// Lazy iterator over the windows of one snapshot.
///
/// Clone it, or call [`WindowSweep::restart`], to replay from the first
/// window. After an alignment error the sweep yields the error once and
/// then ends.
#[derive(Clone)]
pub struct WindowSweep<'a> {
    differencer: &'a WindowedDifferencer,
    first: SortedSeries<'a>,
    second: SortedSeries<'a>,
    origin_ms: f64,
    end_ms: f64,
    index: u64,
    failed: bool,
}

impl WindowSweep<'_> {
    /// Fresh sweep from the first window
    pub fn restart(&self) -> Self {
        Self {
            index: 0,
            failed: false,
            ..self.clone()
        }
    }

    /// Windows that fit in the overlap, emitted or not
    pub fn window_count(&self) -> u64 {
        let duration = self.differencer.config.duration_ms();
        let stride = self.differencer.config.stride_ms();
        let span = self.end_ms - self.origin_ms - duration;
        if span < 0.0 {
            0
        } else {
            (span / stride).floor() as u64 + 1
        }
    }
}

impl Iterator for WindowSweep<'_> {
    type Item = Result<MetricSample, ContractError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let duration = self.differencer.config.duration_ms();
        let stride = self.differencer.config.stride_ms();

        loop {
            // Start derived from the index so stride error never accumulates
            let start = self.origin_ms + self.index as f64 * stride;
            let end = start + duration;
            if end > self.end_ms {
                return None;
            }
            self.index += 1;

            let a = self.first.window(start, end);
            let b = self.second.window(start, end);
            match self.differencer.window_value(&a, &b) {
                Ok(Some(value)) => {
                    observability::metrics::record_window_emitted(value);
                    return Some(Ok(MetricSample::new(value, end / 1000.0)));
                }
                Ok(None) => {
                    observability::metrics::record_window_skipped();
                }
                Err(e) => {
                    self.failed = true;
                    return Some(Err(e));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{AlignmentMode, TagPair};

    fn make_config(mode: AlignmentMode, duration_s: f64, stride_s: f64) -> DifferencerConfig {
        DifferencerConfig::new(TagPair::new("A", "B").unwrap())
            .with_mode(mode)
            .with_window(duration_s, stride_s)
    }

    fn make_series(points: &[(i64, f64, f64)]) -> TagSeries {
        let mut s = TagSeries::default();
        for &(t, channel, phase) in points {
            s.push(t, channel, phase, -50.0, 1);
        }
        s
    }

    fn make_snapshot(a: TagSeries, b: TagSeries) -> TagSnapshot {
        let mut snapshot = TagSnapshot::default();
        snapshot.tags.insert("A".into(), a);
        snapshot.tags.insert("B".into(), b);
        snapshot
    }

    /// Both tags read every 10ms on channel 5, B leads A by `offset` degrees
    fn make_steady(offset: f64, until_ms: i64) -> TagSnapshot {
        let a: Vec<_> = (0..until_ms / 10).map(|i| (i * 10, 5.0, 100.0)).collect();
        let b: Vec<_> = (0..until_ms / 10)
            .map(|i| (i * 10 + 3, 5.0, (100.0 + offset) % 360.0))
            .collect();
        make_snapshot(make_series(&a), make_series(&b))
    }

    #[test]
    fn test_rejects_degenerate_geometry() {
        assert!(WindowedDifferencer::new(make_config(AlignmentMode::Elastic, 0.0, 0.1)).is_err());
        assert!(WindowedDifferencer::new(make_config(AlignmentMode::Elastic, 0.1, -1.0)).is_err());
        assert!(
            WindowedDifferencer::new(make_config(AlignmentMode::Elastic, f64::INFINITY, 0.1))
                .is_err()
        );
    }

    #[test]
    fn test_non_finite_channel_left_out_of_average() {
        let mut config = make_config(AlignmentMode::Sequential, 1.0, 0.1);
        config.signal = SignalKind::Rssi;
        let diff = WindowedDifferencer::new(config).unwrap();

        // Channel 5 overflows to +inf, channel 6 differs by 3 dB
        let mut a = TagSeries::default();
        let mut b = TagSeries::default();
        for t in 0..2 {
            a.push(t * 10, 5.0, 0.0, 1e308, 1);
            b.push(t * 10 + 1, 5.0, 0.0, -1e308, 1);
            a.push(t * 10 + 2, 6.0, 0.0, -50.0, 1);
            b.push(t * 10 + 3, 6.0, 0.0, -53.0, 1);
        }
        assert_eq!(diff.window_value(&a, &b).unwrap(), Some(3.0));

        // With only the overflowing channel nothing is published, not 0
        let mut a = TagSeries::default();
        let mut b = TagSeries::default();
        a.push(0, 5.0, 0.0, 1e308, 1);
        b.push(1, 5.0, 0.0, -1e308, 1);
        assert_eq!(diff.window_value(&a, &b).unwrap(), None);
    }

    #[test]
    fn test_missing_tag_rejected_eagerly() {
        let diff = WindowedDifferencer::new(make_config(AlignmentMode::Elastic, 0.1, 0.1)).unwrap();
        let snapshot = make_snapshot(make_series(&[(0, 5.0, 1.0)]), TagSeries::default());
        let err = diff.sweep(&snapshot).err().unwrap();
        assert!(matches!(err, ContractError::MissingTag { ref tag_id } if tag_id == "B"), "got: {err}");
    }

    #[test]
    fn test_insufficient_overlap_yields_nothing() {
        let diff =
            WindowedDifferencer::new(make_config(AlignmentMode::Interpolation, 0.25, 0.25)).unwrap();
        let snapshot = make_snapshot(
            make_series(&[(0, 5.0, 10.0), (100, 5.0, 10.0), (200, 5.0, 10.0)]),
            make_series(&[(10, 5.0, 30.0), (110, 5.0, 30.0), (210, 5.0, 30.0)]),
        );
        let sweep = diff.sweep(&snapshot).unwrap();
        assert_eq!(sweep.window_count(), 0);
        assert_eq!(sweep.count(), 0);
    }

    #[test]
    fn test_non_overlapping_streams_yield_nothing() {
        let diff = WindowedDifferencer::new(make_config(AlignmentMode::Elastic, 0.05, 0.05)).unwrap();
        let snapshot = make_snapshot(
            make_series(&[(0, 5.0, 10.0), (100, 5.0, 10.0)]),
            make_series(&[(500, 5.0, 30.0), (900, 5.0, 30.0)]),
        );
        assert!(diff.sweep_all(&snapshot).unwrap().is_empty());
    }

    #[test]
    fn test_constant_offset_recovered_in_every_mode() {
        let snapshot = make_steady(20.0, 2000);
        for mode in [
            AlignmentMode::Elastic,
            AlignmentMode::Interpolation,
            AlignmentMode::Sequential,
        ] {
            let diff = WindowedDifferencer::new(make_config(mode, 0.5, 0.25)).unwrap();
            let samples = diff.sweep_all(&snapshot).unwrap();
            assert!(!samples.is_empty(), "{mode:?}");
            for s in &samples {
                assert!((s.value - 20.0).abs() < 1e-9, "{mode:?}: {}", s.value);
            }
        }
    }

    #[test]
    fn test_aliases_fold_to_same_value() {
        let diff = WindowedDifferencer::new(make_config(AlignmentMode::Sequential, 0.5, 0.5)).unwrap();
        let near = diff.sweep_all(&make_steady(20.0, 1000)).unwrap();
        let far = diff.sweep_all(&make_steady(160.0, 1000)).unwrap();
        assert_eq!(near.len(), far.len());
        for (a, b) in near.iter().zip(&far) {
            assert!((a.value - b.value).abs() < 1e-9);
        }
    }

    #[test]
    fn test_timestamps_strictly_increasing_and_at_window_end() {
        let snapshot = make_steady(10.0, 3000);
        let diff =
            WindowedDifferencer::new(make_config(AlignmentMode::Interpolation, 1.0, 0.05)).unwrap();
        let samples = diff.sweep_all(&snapshot).unwrap();
        // Overlap runs from 3ms to 2990ms
        assert_eq!(samples[0].timestamp_s, 1.003);
        for w in samples.windows(2) {
            assert!(w[1].timestamp_s > w[0].timestamp_s);
        }
        let last = samples.last().unwrap();
        assert!(last.timestamp_ms() <= 2990.0 + 1e-6);
    }

    #[test]
    fn test_window_without_common_channel_is_skipped() {
        let diff = WindowedDifferencer::new(make_config(AlignmentMode::Elastic, 0.1, 0.1)).unwrap();
        let snapshot = make_snapshot(
            make_series(&[(0, 1.0, 10.0), (50, 1.0, 10.0), (150, 5.0, 10.0), (250, 5.0, 10.0)]),
            make_series(&[(10, 2.0, 30.0), (60, 2.0, 30.0), (160, 5.0, 30.0), (260, 5.0, 40.0)]),
        );
        let samples = diff.sweep_all(&snapshot).unwrap();
        // Window [10, 110) has channels {1} vs {2}; [110, 210) shares channel 5
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].timestamp_s, 0.21);
        assert!((samples[0].value - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_interpolation_requires_two_reads_per_channel() {
        let diff =
            WindowedDifferencer::new(make_config(AlignmentMode::Interpolation, 0.1, 0.1)).unwrap();
        let a = make_series(&[(0, 5.0, 10.0), (20, 5.0, 10.0)]);
        let b = make_series(&[(10, 5.0, 30.0)]);
        assert_eq!(diff.window_value(&a, &b).unwrap(), None);

        let elastic = WindowedDifferencer::new(make_config(AlignmentMode::Elastic, 0.1, 0.1)).unwrap();
        assert_eq!(elastic.window_value(&a, &b).unwrap(), Some(20.0));
    }

    #[test]
    fn test_channel_means_are_averaged_then_folded() {
        let diff = WindowedDifferencer::new(make_config(AlignmentMode::Sequential, 1.0, 1.0)).unwrap();
        let a = make_series(&[(0, 1.0, 0.0), (1, 2.0, 0.0)]);
        let b = make_series(&[(0, 1.0, 10.0), (1, 2.0, 50.0)]);
        assert_eq!(diff.window_value(&a, &b).unwrap(), Some(30.0));
    }

    #[test]
    fn test_rssi_signal_is_signed_and_unfolded() {
        let mut cfg = make_config(AlignmentMode::Sequential, 1.0, 1.0);
        cfg.signal = SignalKind::Rssi;
        let diff = WindowedDifferencer::new(cfg).unwrap();
        let mut a = TagSeries::default();
        a.push(0, 5.0, 0.0, -60.0, 1);
        let mut b = TagSeries::default();
        b.push(0, 5.0, 0.0, -45.0, 1);
        assert_eq!(diff.window_value(&a, &b).unwrap(), Some(-15.0));
    }

    #[test]
    fn test_sweep_is_restartable() {
        let snapshot = make_steady(15.0, 1500);
        let diff = WindowedDifferencer::new(make_config(AlignmentMode::Elastic, 0.5, 0.1)).unwrap();
        let mut sweep = diff.sweep(&snapshot).unwrap();
        let first = sweep.next().unwrap().unwrap();
        let rest: Vec<_> = sweep.by_ref().collect::<Result<_, _>>().unwrap();
        let replay: Vec<_> = sweep.restart().collect::<Result<_, _>>().unwrap();
        assert_eq!(replay[0], first);
        assert_eq!(replay.len(), rest.len() + 1);
    }

    #[test]
    fn test_unsorted_input_matches_sorted() {
        let sorted = make_steady(25.0, 1000);
        let mut shuffled = sorted.clone();
        let a = shuffled.tags.get_mut("A").unwrap();
        a.timestamps.swap(3, 4);
        a.phases.swap(3, 4);
        let diff = WindowedDifferencer::new(make_config(AlignmentMode::Elastic, 0.2, 0.2)).unwrap();
        assert_eq!(
            diff.sweep_all(&sorted).unwrap().len(),
            diff.sweep_all(&shuffled).unwrap().len()
        );
    }
}
