//! `run` command implementation.

use std::time::Duration;

use contracts::{ExperimentBlueprint, SourceKind};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::load_blueprint;
use crate::cli::RunArgs;
use crate::error::Result;
use crate::pipeline::{Pipeline, PipelineConfig};

/// Execute the `run` command
pub async fn run_pipeline(args: &RunArgs) -> Result<()> {
    let mut blueprint = load_blueprint(&args.config)?;
    apply_overrides(&mut blueprint, args);
    // Overrides may break what the file alone satisfied
    config_loader::ConfigLoader::validate(&blueprint)?;

    info!(
        experiment = %blueprint.label(),
        source = ?blueprint.source.kind,
        mode = ?blueprint.differencer.alignment_mode,
        sinks = blueprint.sinks.len(),
        "Configuration loaded"
    );

    if args.dry_run {
        info!("Dry run mode - configuration is valid, exiting");
        print_config_summary(&blueprint);
        return Ok(());
    }

    let pipeline = Pipeline::new(PipelineConfig {
        blueprint,
        duration: (args.duration > 0).then(|| Duration::from_secs(args.duration)),
        metrics_port: (args.metrics_port > 0).then_some(args.metrics_port),
    });

    let cancel = CancellationToken::new();
    let signal_task = tokio::spawn({
        let cancel = cancel.clone();
        async move {
            tokio::select! {
                _ = shutdown_signal() => {
                    warn!("Received shutdown signal, stopping pipeline...");
                    cancel.cancel();
                }
                _ = cancel.cancelled() => {}
            }
        }
    });

    info!("Starting pipeline...");
    let result = pipeline.run(cancel.clone()).await;
    cancel.cancel();
    signal_task.abort();

    let stats = result?;
    info!(
        samples = stats.dispatch.summary.samples,
        batches = stats.dispatch.summary.batches,
        exit = ?stats.producer.exit,
        duration_secs = stats.duration.as_secs_f64(),
        "Pipeline finished"
    );
    stats.print_summary();
    Ok(())
}

fn apply_overrides(blueprint: &mut ExperimentBlueprint, args: &RunArgs) {
    if let Some(ref path) = args.replay {
        info!(path = %path.display(), "Replaying recording from CLI");
        blueprint.source.kind = SourceKind::Replay;
        blueprint.source.path = Some(path.clone());
    }
    if let Some(speed) = args.replay_speed {
        blueprint.source.speed = speed;
    }
    if args.replay_loop {
        blueprint.source.loop_playback = true;
    }
    if let Some(max) = args.max_events {
        blueprint.source.mock.max_events = Some(max);
    }
}

/// Resolves on Ctrl+C or SIGTERM. A handler that cannot be installed never
/// resolves, leaving the other one in charge.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Print configuration summary for dry-run mode
fn print_config_summary(blueprint: &ExperimentBlueprint) {
    let differencer = &blueprint.differencer;
    println!("\n=== Configuration Summary ===\n");
    println!("Experiment: {}", blueprint.label());
    println!(
        "Tag pair: {} / {}",
        differencer.tag_pair.first(),
        differencer.tag_pair.second()
    );
    println!(
        "Window: {}s every {}s ({:?}, {:?})",
        differencer.window_duration_s,
        differencer.window_stride_s,
        differencer.alignment_mode,
        differencer.signal
    );
    println!(
        "Buffer: {} reads live, history {}",
        blueprint.buffer.live_len(),
        blueprint
            .buffer
            .history_limit
            .map_or_else(|| "unbounded".to_string(), |n| n.to_string())
    );
    println!(
        "Stream: batch {} / capacity {} / timestamps {:?}",
        blueprint.stream.batch_size,
        blueprint.stream.channel_capacity,
        blueprint.stream.timestamp_source
    );

    let source = &blueprint.source;
    match source.kind {
        SourceKind::Replay => println!(
            "Source: replay {} (speed {}, loop {})",
            source
                .path
                .as_deref()
                .map_or_else(|| "<none>".to_string(), |p| p.display().to_string()),
            source.speed,
            source.loop_playback
        ),
        SourceKind::Mock => println!(
            "Source: mock (seed {}, max events {:?})",
            source.mock.seed, source.mock.max_events
        ),
    }

    if !blueprint.sinks.is_empty() {
        println!("\nSinks ({}):", blueprint.sinks.len());
        for sink in &blueprint.sinks {
            println!("  - {} ({:?})", sink.name, sink.sink_type);
        }
    }

    println!();
}
