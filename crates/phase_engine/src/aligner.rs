//! Pairing strategies for two per-channel sequences.

use std::sync::Arc;

use contracts::{AlignedPair, AlignmentMode, DifferencerConfig, SignalKind};

use crate::dtw::dtw;
use crate::interp::interpolate_onto;
use crate::wrap::unwrap;

/// Borrowed `(timestamps, values)` of one tag on one channel
#[derive(Debug, Clone, Copy)]
pub struct SeriesView<'a> {
    pub timestamps: &'a [i64],
    pub values: &'a [f64],
}

impl<'a> SeriesView<'a> {
    pub fn new(timestamps: &'a [i64], values: &'a [f64]) -> Self {
        debug_assert_eq!(timestamps.len(), values.len());
        Self { timestamps, values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Produces index-aligned sequences from two per-channel series.
///
/// `align` returns `None` only when the inputs have fewer than
/// [`Aligner::min_points`] samples.
pub trait Aligner: Send + Sync {
    fn name(&self) -> &'static str;

    /// Minimum samples per side
    fn min_points(&self) -> usize;

    fn align(&self, first: SeriesView<'_>, second: SeriesView<'_>) -> Option<AlignedPair>;
}

/// Dynamic time warping over arrival order
#[derive(Debug, Clone, Copy, Default)]
pub struct ElasticAligner {
    /// Sakoe-Chiba radius; `None` is exact
    pub band: Option<usize>,
}

impl Aligner for ElasticAligner {
    fn name(&self) -> &'static str {
        "elastic"
    }

    fn min_points(&self) -> usize {
        1
    }

    fn align(&self, first: SeriesView<'_>, second: SeriesView<'_>) -> Option<AlignedPair> {
        let alignment = dtw(first.values, second.values, self.band)?;
        observability::metrics::record_alignment_cost(alignment.cost);
        let (a, b) = alignment.apply(first.values, second.values);
        AlignedPair::new(a, b)
    }
}

/// Resamples the second series onto the first series' timestamps.
///
/// Phase series are unwrapped first so interpolation never crosses a
/// 0/360 discontinuity.
#[derive(Debug, Clone, Copy)]
pub struct InterpolationAligner {
    pub unwrap_phase: bool,
}

impl Default for InterpolationAligner {
    fn default() -> Self {
        Self { unwrap_phase: true }
    }
}

impl Aligner for InterpolationAligner {
    fn name(&self) -> &'static str {
        "interpolation"
    }

    fn min_points(&self) -> usize {
        2
    }

    fn align(&self, first: SeriesView<'_>, second: SeriesView<'_>) -> Option<AlignedPair> {
        if first.len() < 2 || second.len() < 2 {
            return None;
        }

        let (first_values, second_values) = if self.unwrap_phase {
            (unwrap(first.values), unwrap(second.values))
        } else {
            (first.values.to_vec(), second.values.to_vec())
        };

        let (xs, ys) = sorted_by_time(second.timestamps, &second_values);
        let targets: Vec<f64> = first.timestamps.iter().map(|&t| t as f64).collect();
        let resampled = interpolate_onto(&xs, &ys, &targets);

        AlignedPair::new(first_values, resampled)
    }
}

/// Index pairing truncated to the shorter side
#[derive(Debug, Clone, Copy, Default)]
pub struct SequentialAligner;

impl Aligner for SequentialAligner {
    fn name(&self) -> &'static str {
        "sequential"
    }

    fn min_points(&self) -> usize {
        1
    }

    fn align(&self, first: SeriesView<'_>, second: SeriesView<'_>) -> Option<AlignedPair> {
        let n = first.len().min(second.len());
        if n == 0 {
            return None;
        }
        AlignedPair::new(first.values[..n].to_vec(), second.values[..n].to_vec())
    }
}

/// Arrival order is usually time order; a stable sort covers the rest
fn sorted_by_time(timestamps: &[i64], values: &[f64]) -> (Vec<f64>, Vec<f64>) {
    if timestamps.windows(2).all(|w| w[0] <= w[1]) {
        return (timestamps.iter().map(|&t| t as f64).collect(), values.to_vec());
    }
    let mut pairs: Vec<(i64, f64)> = timestamps.iter().copied().zip(values.iter().copied()).collect();
    pairs.sort_by_key(|&(t, _)| t);
    pairs.into_iter().map(|(t, v)| (t as f64, v)).unzip()
}

/// Aligner for the configured mode and signal
pub fn build_aligner(config: &DifferencerConfig) -> Arc<dyn Aligner> {
    match config.alignment_mode {
        AlignmentMode::Elastic => Arc::new(ElasticAligner {
            band: config.dtw_band,
        }),
        AlignmentMode::Interpolation => Arc::new(InterpolationAligner {
            unwrap_phase: config.signal == SignalKind::Phase,
        }),
        AlignmentMode::Sequential => Arc::new(SequentialAligner),
    }
}
