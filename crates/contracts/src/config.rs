//! Processing configuration contracts shared across crates.

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::{ContractError, TagPair};

/// How two per-channel sequences are paired before differencing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlignmentMode {
    /// Dynamic time warping over arrival order
    Elastic,
    /// Linear interpolation of the second tag onto the first tag's timestamps
    #[default]
    Interpolation,
    /// Index pairing, truncated to the shorter sequence
    Sequential,
}

impl AlignmentMode {
    /// Minimum reads per tag per channel for the mode to produce a pairing
    pub fn min_points(self) -> usize {
        match self {
            AlignmentMode::Interpolation => 2,
            AlignmentMode::Elastic | AlignmentMode::Sequential => 1,
        }
    }
}

/// Which measurement is differenced
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    /// Absolute phase difference, folded to `[0, 90]`
    #[default]
    Phase,
    /// Signed RSSI difference in dB, no wrap handling
    Rssi,
}

/// Windowed differencer configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct DifferencerConfig {
    pub tag_pair: TagPair,

    #[serde(default = "default_window_duration")]
    #[validate(range(exclusive_min = 0.0))]
    pub window_duration_s: f64,

    #[serde(default = "default_window_stride")]
    #[validate(range(exclusive_min = 0.0))]
    pub window_stride_s: f64,

    #[serde(default)]
    pub alignment_mode: AlignmentMode,

    #[serde(default)]
    pub signal: SignalKind,

    /// Sakoe-Chiba band radius for elastic alignment; `None` runs exact DTW
    #[serde(default)]
    pub dtw_band: Option<usize>,
}

fn default_window_duration() -> f64 {
    1.0
}

fn default_window_stride() -> f64 {
    0.05
}

impl DifferencerConfig {
    pub fn new(tag_pair: TagPair) -> Self {
        Self {
            tag_pair,
            window_duration_s: default_window_duration(),
            window_stride_s: default_window_stride(),
            alignment_mode: AlignmentMode::default(),
            signal: SignalKind::default(),
            dtw_band: None,
        }
    }

    pub fn with_window(mut self, duration_s: f64, stride_s: f64) -> Self {
        self.window_duration_s = duration_s;
        self.window_stride_s = stride_s;
        self
    }

    pub fn with_mode(mut self, mode: AlignmentMode) -> Self {
        self.alignment_mode = mode;
        self
    }

    pub fn duration_ms(&self) -> f64 {
        self.window_duration_s * 1000.0
    }

    pub fn stride_ms(&self) -> f64 {
        self.window_stride_s * 1000.0
    }
}

/// Rolling buffer configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct BufferConfig {
    /// Expected reads per second across both tags
    #[validate(range(exclusive_min = 0.0))]
    pub read_rate_hz: f64,

    /// Seconds of history used for the live estimate
    #[validate(range(exclusive_min = 0.0))]
    pub window_s: f64,

    /// Cap on retained full history; `None` keeps everything until `clear()`
    #[validate(range(min = 1))]
    pub history_limit: Option<usize>,

    /// Unit of the upstream phase field
    pub phase_unit: crate::PhaseUnit,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            read_rate_hz: 100.0,
            window_s: 1.0,
            history_limit: None,
            phase_unit: crate::PhaseUnit::Degrees,
        }
    }
}

impl BufferConfig {
    /// Largest windowed view a store will allocate
    pub const MAX_LIVE_LEN: usize = 1_000_000;

    /// Records in the windowed view, `ceil(read_rate_hz * window_s)`
    pub fn live_len(&self) -> usize {
        (self.read_rate_hz * self.window_s).ceil().max(1.0) as usize
    }

    /// `live_len()`, rejecting products that are not finite or exceed
    /// [`Self::MAX_LIVE_LEN`]
    pub fn checked_live_len(&self) -> Result<usize, ContractError> {
        let raw = (self.read_rate_hz * self.window_s).ceil();
        if !raw.is_finite() || raw > Self::MAX_LIVE_LEN as f64 {
            return Err(ContractError::config_validation(
                "buffer.read_rate_hz / buffer.window_s",
                format!(
                    "live window of {raw} records exceeds the maximum of {}",
                    Self::MAX_LIVE_LEN
                ),
            ));
        }
        Ok(self.live_len())
    }
}

/// Timestamp attached to live samples
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimestampSource {
    /// Wall clock at the moment the sample was computed
    #[default]
    Receive,
    /// Timestamp of the event that triggered the recompute (replay, tests)
    Event,
}

/// Producer/consumer hand-off configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct StreamConfig {
    #[validate(range(min = 1))]
    pub batch_size: usize,

    /// Bounded channel capacity, in batches
    #[validate(range(min = 1))]
    pub channel_capacity: usize,

    /// Wait per send attempt before re-checking cancellation
    #[validate(range(min = 1))]
    pub send_wait_ms: u64,

    pub timestamp_source: TimestampSource,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            batch_size: 50,
            channel_capacity: 16,
            send_wait_ms: 100,
            timestamp_source: TimestampSource::Receive,
        }
    }
}

/// Physical sensor the tag pair is attached to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorProfile {
    /// Plain folded degrees
    #[default]
    Degrees,
    /// Soil moisture percentage
    Soil,
    /// Applied force percentage
    Force,
    /// Binary pressure sticker
    ForceSticker,
    /// Light level percentage
    Photo,
}
