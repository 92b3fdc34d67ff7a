//! Differencer output types

use serde::{Deserialize, Serialize};

/// One published phase-difference value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    /// Folded difference in degrees, `[0, 90]` for phase signals
    pub value: f64,
    pub timestamp_s: f64,
}

impl MetricSample {
    pub fn new(value: f64, timestamp_s: f64) -> Self {
        Self { value, timestamp_s }
    }

    #[inline]
    pub fn timestamp_ms(&self) -> f64 {
        self.timestamp_s * 1000.0
    }
}

/// Batch handed from the producer to the consumer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricBatch {
    /// Position of this batch in the run, starting at 0
    pub seq: u64,
    pub samples: Vec<MetricSample>,
}

impl MetricBatch {
    pub fn new(seq: u64, samples: Vec<MetricSample>) -> Self {
        Self { seq, samples }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn last(&self) -> Option<&MetricSample> {
        self.samples.last()
    }

    /// `(value, timestamp_ms)` pairs as consumed by plotting frontends
    pub fn points(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.samples.iter().map(|s| (s.value, s.timestamp_ms()))
    }
}

/// Two index-aligned sequences produced by an aligner.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AlignedPair {
    first: Vec<f64>,
    second: Vec<f64>,
}

impl AlignedPair {
    /// Returns `None` when the sequences differ in length.
    pub fn new(first: Vec<f64>, second: Vec<f64>) -> Option<Self> {
        (first.len() == second.len()).then_some(Self { first, second })
    }

    pub fn first(&self) -> &[f64] {
        &self.first
    }

    pub fn second(&self) -> &[f64] {
        &self.second
    }

    pub fn len(&self) -> usize {
        self.first.len()
    }

    pub fn is_empty(&self) -> bool {
        self.first.is_empty()
    }

    /// Signed `first[i] - second[i]`
    pub fn differences(&self) -> impl Iterator<Item = f64> + '_ {
        self.first.iter().zip(&self.second).map(|(a, b)| a - b)
    }
}
