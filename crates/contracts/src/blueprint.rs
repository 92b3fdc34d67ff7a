//! ExperimentBlueprint - Config Loader output
//!
//! Describes one sensing run: the tag pair and differencer, the rolling
//! buffer, the producer/consumer hand-off, where events come from and where
//! metrics go.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use validator::Validate;

use crate::{BufferConfig, ContractError, DifferencerConfig, SensorProfile, StreamConfig};

/// Config version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// Complete experiment configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ExperimentBlueprint {
    #[serde(default)]
    pub version: ConfigVersion,

    /// Free-form experiment label, used in logs and summaries
    #[serde(default)]
    pub name: Option<String>,

    /// Readout applied to published values
    #[serde(default)]
    pub sensor: SensorProfile,

    #[validate(nested)]
    pub differencer: DifferencerConfig,

    #[serde(default)]
    #[validate(nested)]
    pub buffer: BufferConfig,

    #[serde(default)]
    #[validate(nested)]
    pub stream: StreamConfig,

    pub source: SourceConfig,

    #[serde(default)]
    pub sinks: Vec<SinkConfig>,
}

/// Where tag reads come from
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub kind: SourceKind,

    /// Recording to replay (replay sources only)
    #[serde(default)]
    pub path: Option<PathBuf>,

    /// Playback speed multiplier; `0` replays as fast as possible
    #[serde(default)]
    pub speed: f64,

    /// Restart the recording when it ends
    #[serde(default)]
    pub loop_playback: bool,

    /// Synthetic generator settings (mock sources only)
    #[serde(default)]
    pub mock: MockSourceConfig,
}

/// Source kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Synthetic generator
    Mock,
    /// Recorded CSV or JSON Lines file
    Replay,
}

/// Synthetic tag pair generator settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MockSourceConfig {
    pub seed: u64,
    /// Channels the simulated reader hops across
    pub channels: Vec<f64>,
    /// Mean interval between reads of one tag
    pub mean_interval_ms: f64,
    /// Uniform jitter added to each interval, +/-
    pub jitter_ms: f64,
    /// True phase offset of the second tag relative to the first
    pub phase_offset_deg: f64,
    /// Slow phase drift shared by both tags, degrees per second
    pub drift_deg_per_s: f64,
    /// Gaussian-ish phase noise amplitude
    pub noise_deg: f64,
    /// Fraction of reads coming from tags outside the pair
    pub foreign_ratio: f64,
    /// Stop after this many events; `None` runs until cancelled
    pub max_events: Option<u64>,
    /// Sleep between events to emulate a live reader
    pub realtime: bool,
}

impl Default for MockSourceConfig {
    fn default() -> Self {
        Self {
            seed: 7,
            channels: vec![902.75, 903.25, 903.75, 904.25],
            mean_interval_ms: 20.0,
            jitter_ms: 8.0,
            phase_offset_deg: 30.0,
            drift_deg_per_s: 45.0,
            noise_deg: 2.0,
            foreign_ratio: 0.0,
            max_events: None,
            realtime: false,
        }
    }
}

impl MockSourceConfig {
    /// Upper bound on the read interval and its jitter
    pub const MAX_INTERVAL_MS: f64 = 60_000.0;
    /// Upper bound on the phase noise standard deviation
    pub const MAX_NOISE_DEG: f64 = 360.0;
    /// Upper bound on the shared drift magnitude
    pub const MAX_DRIFT_DEG_PER_S: f64 = 36_000.0;

    /// Numeric ranges the generator can sample from without overflowing.
    ///
    /// Field names in the error are relative to `source.mock`.
    pub fn check_ranges(&self) -> Result<(), ContractError> {
        if self.channels.is_empty() {
            return Err(ContractError::config_validation(
                "channels",
                "mock source needs at least one channel",
            ));
        }
        if let Some(bad) = self.channels.iter().find(|c| !c.is_finite()) {
            return Err(ContractError::config_validation(
                "channels",
                format!("channel frequency must be finite, got {bad}"),
            ));
        }

        let bounded = [
            ("mean_interval_ms", self.mean_interval_ms, f64::MIN_POSITIVE, Self::MAX_INTERVAL_MS),
            ("jitter_ms", self.jitter_ms, 0.0, Self::MAX_INTERVAL_MS),
            ("noise_deg", self.noise_deg, 0.0, Self::MAX_NOISE_DEG),
            (
                "drift_deg_per_s",
                self.drift_deg_per_s,
                -Self::MAX_DRIFT_DEG_PER_S,
                Self::MAX_DRIFT_DEG_PER_S,
            ),
        ];
        for (field, value, min, max) in bounded {
            if !(min..=max).contains(&value) {
                return Err(ContractError::config_validation(
                    field,
                    format!("must be in [{min}, {max}], got {value}"),
                ));
            }
        }

        if !self.phase_offset_deg.is_finite() {
            return Err(ContractError::config_validation(
                "phase_offset_deg",
                format!("must be a finite number, got {}", self.phase_offset_deg),
            ));
        }
        if !(0.0..1.0).contains(&self.foreign_ratio) {
            return Err(ContractError::config_validation(
                "foreign_ratio",
                format!("must be in [0, 1), got {}", self.foreign_ratio),
            ));
        }
        Ok(())
    }
}

/// Sink output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SinkConfig {
    /// Sink name
    pub name: String,

    /// Sink type
    pub sink_type: SinkType,

    /// Per-sink queue capacity, in batches
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Type-specific parameters
    #[serde(default)]
    pub params: HashMap<String, String>,
}

fn default_queue_capacity() -> usize {
    8
}

/// Sink type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkType {
    /// Log output
    Log,
    /// In-process collector
    Memory,
    /// JSON Lines file (`params.path`)
    Jsonl,
}

impl ExperimentBlueprint {
    /// Display label for logs
    pub fn label(&self) -> String {
        self.name.clone().unwrap_or_else(|| {
            format!(
                "{}/{}",
                self.differencer.tag_pair.first(),
                self.differencer.tag_pair.second()
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TagPair;

    fn sample_blueprint() -> ExperimentBlueprint {
        ExperimentBlueprint {
            version: ConfigVersion::V1,
            name: None,
            differencer: DifferencerConfig::new(TagPair::new("A", "B").unwrap()),
            buffer: BufferConfig::default(),
            stream: StreamConfig::default(),
            source: SourceConfig {
                kind: SourceKind::Mock,
                path: None,
                speed: 0.0,
                loop_playback: false,
                mock: MockSourceConfig::default(),
            },
            sensor: SensorProfile::Degrees,
            sinks: vec![],
        }
    }

    #[test]
    fn label_falls_back_to_tag_pair() {
        let mut bp = sample_blueprint();
        assert_eq!(bp.label(), "A/B");
        bp.name = Some("soil-run".into());
        assert_eq!(bp.label(), "soil-run");
    }

    #[test]
    fn mock_ranges_reject_unsampleable_values() {
        assert!(MockSourceConfig::default().check_ranges().is_ok());

        let cases: [fn(&mut MockSourceConfig); 6] = [
            |m| m.jitter_ms = 1e308,
            |m| m.jitter_ms = f64::INFINITY,
            |m| m.noise_deg = f64::NAN,
            |m| m.drift_deg_per_s = -1e300,
            |m| m.phase_offset_deg = f64::INFINITY,
            |m| m.mean_interval_ms = f64::INFINITY,
        ];
        for mutate in cases {
            let mut mock = MockSourceConfig::default();
            mutate(&mut mock);
            let err = mock.check_ranges().unwrap_err();
            assert!(err.is_config(), "got: {err}");
        }
    }

    #[test]
    fn nested_validation_reaches_stream() {
        let mut bp = sample_blueprint();
        assert!(bp.validate().is_ok());
        bp.stream.channel_capacity = 0;
        assert!(bp.validate().is_err());
    }
}
