//! `sweep` command implementation.
//!
//! Loads a whole recording into an unbounded store and walks the sliding
//! windows over it, the way an offline analysis would.

use std::path::{Path, PathBuf};

use contracts::{ExperimentBlueprint, MetricSample};
use ingestion::ReplaySource;
use observability::{median, Accuracy, RunningStats};
use phase_engine::{Readout, RollingStore, SensorReadout, WindowedDifferencer};
use serde::Serialize;
use tracing::info;

use super::load_blueprint;
use crate::cli::SweepArgs;
use crate::error::{CliError, Result};

#[derive(Debug, Serialize)]
struct SweepReport {
    input: String,
    tag_pair: [String; 2],
    events: usize,
    windows: u64,
    stats: Option<SweepStats>,
    samples: Vec<SweepRow>,
}

#[derive(Debug, Serialize)]
struct SweepStats {
    count: u64,
    min: f64,
    max: f64,
    mean: f64,
    std_dev: f64,
    median: f64,
    accuracy: Option<SweepAccuracy>,
}

#[derive(Debug, Serialize)]
struct SweepAccuracy {
    expected: f64,
    rmse: f64,
    r_squared: f64,
}

impl From<Accuracy> for SweepAccuracy {
    fn from(acc: Accuracy) -> Self {
        Self {
            expected: acc.expected,
            rmse: acc.rmse,
            r_squared: acc.r_squared,
        }
    }
}

impl SweepStats {
    fn from_values(values: &[f64], expected: Option<f64>) -> Option<Self> {
        let median = median(values.iter().copied())?;
        let mut running = RunningStats::default();
        for &v in values {
            running.push(v);
        }
        Some(Self {
            count: running.count(),
            min: running.min().unwrap_or_default(),
            max: running.max().unwrap_or_default(),
            mean: running.mean(),
            std_dev: running.std_dev(),
            median,
            accuracy: expected
                .and_then(|e| Accuracy::against(values.iter().copied(), e))
                .map(SweepAccuracy::from),
        })
    }
}

#[derive(Debug, Serialize)]
struct SweepRow {
    timestamp_s: f64,
    value_deg: f64,
    readout: Readout,
}

/// Execute the `sweep` command
pub fn run_sweep(args: &SweepArgs) -> Result<()> {
    let blueprint = load_blueprint(&args.config)?;
    let input = resolve_input(args, &blueprint)?;
    if args.expected.is_some_and(|e| !e.is_finite()) {
        return Err(CliError::usage("--expected must be a finite number of degrees"));
    }
    let report = sweep_file(&blueprint, &input, args.expected)?;

    info!(
        input = %report.input,
        events = report.events,
        windows = report.windows,
        samples = report.samples.len(),
        "Sweep complete"
    );

    if let Some(ref output) = args.output {
        let file = std::fs::File::create(output)?;
        serde_json::to_writer_pretty(std::io::BufWriter::new(file), &report)
            .map_err(|e| CliError::Other(e.into()))?;
        println!(
            "Wrote {} samples to {}",
            report.samples.len(),
            output.display()
        );
    } else if args.json {
        let json =
            serde_json::to_string_pretty(&report).map_err(|e| CliError::Other(e.into()))?;
        println!("{json}");
    } else {
        print_table(&report);
    }
    Ok(())
}

fn resolve_input(args: &SweepArgs, blueprint: &ExperimentBlueprint) -> Result<PathBuf> {
    args.input
        .clone()
        .or_else(|| blueprint.source.path.clone())
        .ok_or_else(|| CliError::usage("sweep needs --input or source.path in the configuration"))
}

fn sweep_file(
    blueprint: &ExperimentBlueprint,
    input: &Path,
    expected: Option<f64>,
) -> Result<SweepReport> {
    let events = ReplaySource::open(input)?.read_all()?;
    let pair = blueprint.differencer.tag_pair.clone();
    let store = RollingStore::from_events(pair.clone(), &blueprint.buffer, &events)?;
    let snapshot = store.snapshot(false);

    let differencer = WindowedDifferencer::new(blueprint.differencer.clone())?;
    let sweep = differencer.sweep(&snapshot)?;
    let windows = sweep.window_count();
    let samples = sweep.collect::<std::result::Result<Vec<MetricSample>, _>>()?;

    let values: Vec<f64> = samples.iter().map(|s| s.value).collect();
    let stats = SweepStats::from_values(&values, expected);

    let mut readout = SensorReadout::new(blueprint.sensor);
    let samples = samples
        .into_iter()
        .map(|s| SweepRow {
            timestamp_s: s.timestamp_s,
            value_deg: s.value,
            readout: readout.apply(s.value),
        })
        .collect();

    Ok(SweepReport {
        input: input.display().to_string(),
        tag_pair: [pair.first().to_string(), pair.second().to_string()],
        events: events.len(),
        windows,
        stats,
        samples,
    })
}

fn print_table(report: &SweepReport) {
    println!(
        "\n{} / {} from {} ({} reads, {} windows)\n",
        report.tag_pair[0],
        report.tag_pair[1],
        report.input,
        report.events,
        report.windows
    );
    if report.samples.is_empty() {
        println!("No window had enough reads on both tags.");
        return;
    }
    println!("{:>12}  {:>10}  {:>8}", "time (s)", "diff (°)", "readout");
    for row in &report.samples {
        println!(
            "{:>12.3}  {:>10.2}  {:>8}",
            row.timestamp_s,
            row.value_deg,
            row.readout.to_string()
        );
    }
    if let Some(ref stats) = report.stats {
        println!(
            "\nStd: {:.3}  Min/Max: {:.2}/{:.2}  Mean: {:.3}  Median: {:.3}",
            stats.std_dev, stats.min, stats.max, stats.mean, stats.median
        );
        if let Some(ref acc) = stats.accuracy {
            println!(
                "RMSE (expected {}): {:.2}  R^2: {:.4}",
                acc.expected, acc.rmse, acc.r_squared
            );
        }
    }
    println!();
}
