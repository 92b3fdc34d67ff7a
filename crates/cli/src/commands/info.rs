//! `info` command implementation.

use serde::Serialize;

use contracts::{AlignmentMode, SensorProfile, SignalKind, SinkType, SourceKind};

use super::load_blueprint;
use crate::cli::InfoArgs;
use crate::error::{CliError, Result};

const ALIGNMENT_MODES: [AlignmentMode; 3] = [
    AlignmentMode::Interpolation,
    AlignmentMode::Elastic,
    AlignmentMode::Sequential,
];
const SIGNALS: [SignalKind; 2] = [SignalKind::Phase, SignalKind::Rssi];
const SENSOR_PROFILES: [SensorProfile; 5] = [
    SensorProfile::Degrees,
    SensorProfile::Soil,
    SensorProfile::Force,
    SensorProfile::ForceSticker,
    SensorProfile::Photo,
];
const SOURCES: [SourceKind; 2] = [SourceKind::Replay, SourceKind::Mock];
const SINKS: [SinkType; 3] = [SinkType::Log, SinkType::Memory, SinkType::Jsonl];

#[derive(Serialize)]
struct BuildInfo {
    version: &'static str,
    alignment_modes: Vec<String>,
    signals: Vec<String>,
    sensor_profiles: Vec<String>,
    sources: Vec<String>,
    sinks: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    config: Option<ConfigInfo>,
}

#[derive(Serialize)]
struct ConfigInfo {
    path: String,
    experiment: String,
    sensor: String,
    tag_pair: [String; 2],
    window_duration_s: f64,
    window_stride_s: f64,
    live_window_reads: usize,
    batch_size: usize,
    channel_capacity: usize,
    sinks: Vec<String>,
}

fn names<T: std::fmt::Debug>(items: &[T]) -> Vec<String> {
    items.iter().map(|i| format!("{i:?}")).collect()
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    let config = args.config.as_deref().map(load_blueprint).transpose()?.map(|bp| {
        ConfigInfo {
            path: args
                .config
                .as_deref()
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
            experiment: bp.label(),
            sensor: format!("{:?}", bp.sensor),
            tag_pair: [
                bp.differencer.tag_pair.first().to_string(),
                bp.differencer.tag_pair.second().to_string(),
            ],
            window_duration_s: bp.differencer.window_duration_s,
            window_stride_s: bp.differencer.window_stride_s,
            live_window_reads: bp.buffer.live_len(),
            batch_size: bp.stream.batch_size,
            channel_capacity: bp.stream.channel_capacity,
            sinks: bp
                .sinks
                .iter()
                .map(|s| format!("{} ({:?})", s.name, s.sink_type))
                .collect(),
        }
    });

    let info = BuildInfo {
        version: env!("CARGO_PKG_VERSION"),
        alignment_modes: names(&ALIGNMENT_MODES),
        signals: names(&SIGNALS),
        sensor_profiles: names(&SENSOR_PROFILES),
        sources: names(&SOURCES),
        sinks: names(&SINKS),
        config,
    };

    if args.json {
        let json = serde_json::to_string_pretty(&info).map_err(|e| CliError::Other(e.into()))?;
        println!("{json}");
    } else {
        print_info(&info);
    }
    Ok(())
}

fn print_info(info: &BuildInfo) {
    println!("diffz {}\n", info.version);
    println!("Alignment modes: {}", info.alignment_modes.join(", "));
    println!("Signals:         {}", info.signals.join(", "));
    println!("Sensor profiles: {}", info.sensor_profiles.join(", "));
    println!("Sources:         {}", info.sources.join(", "));
    println!("Sinks:           {}", info.sinks.join(", "));

    if let Some(ref config) = info.config {
        println!("\nConfiguration {}", config.path);
        println!("   ├─ Experiment: {}", config.experiment);
        println!("   ├─ Sensor: {}", config.sensor);
        println!(
            "   ├─ Tag pair: {} / {}",
            config.tag_pair[0], config.tag_pair[1]
        );
        println!(
            "   ├─ Window: {}s every {}s ({} live reads)",
            config.window_duration_s, config.window_stride_s, config.live_window_reads
        );
        println!(
            "   ├─ Stream: batch {} / capacity {}",
            config.batch_size, config.channel_capacity
        );
        if config.sinks.is_empty() {
            println!("   └─ Sinks: none");
        } else {
            println!("   └─ Sinks: {}", config.sinks.join(", "));
        }
    }
    println!();
}
