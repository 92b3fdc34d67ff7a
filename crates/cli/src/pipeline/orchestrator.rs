//! Pipeline orchestrator - wires source, engine, producer and dispatcher.

use std::time::{Duration, Instant};

use contracts::ExperimentBlueprint;
use dispatcher::{create_dispatcher, StreamingPipeline};
use phase_engine::PhaseEngine;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::PipelineStats;
use crate::error::{CliError, Result};

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// The experiment blueprint
    pub blueprint: ExperimentBlueprint,

    /// Cancel the run after this long (None = until the source ends)
    pub duration: Option<Duration>,

    /// Metrics server port (None = disabled)
    pub metrics_port: Option<u16>,
}

/// Main pipeline orchestrator
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Run until the source ends or `cancel` fires, then drain the sinks.
    pub async fn run(self, cancel: CancellationToken) -> Result<PipelineStats> {
        let start_time = Instant::now();
        let blueprint = self.config.blueprint;

        if let Some(port) = self.config.metrics_port {
            observability::init_metrics_only(port)?;
            info!("Metrics endpoint available on port {}", port);
        }

        let source = ingestion::build_source(&blueprint.source, &blueprint.differencer.tag_pair)?;
        let source_name = source.name().to_string();
        let engine = PhaseEngine::new(blueprint.differencer.clone(), &blueprint.buffer)?;

        if blueprint.sinks.is_empty() {
            warn!("No sinks configured - batches are only summarized");
        }

        let (producer, batch_rx) =
            StreamingPipeline::spawn(source, engine, blueprint.stream.clone(), cancel.clone())?;

        let dispatcher = match create_dispatcher(blueprint.sinks.clone(), blueprint.sensor, batch_rx)
            .await
        {
            Ok(dispatcher) => dispatcher,
            Err(e) => {
                // The receiver is gone; stop the producer before reporting
                cancel.cancel();
                if let Err(join_err) = producer.wait().await {
                    warn!(error = %join_err, "Producer did not stop cleanly");
                }
                return Err(e.into());
            }
        };
        let dispatcher_task = dispatcher.spawn();

        info!(
            source = %source_name,
            sinks = blueprint.sinks.len(),
            duration = ?self.config.duration,
            "Pipeline running"
        );

        if let Some(duration) = self.config.duration {
            let timer_cancel = cancel.clone();
            tokio::spawn(async move {
                tokio::select! {
                    _ = tokio::time::sleep(duration) => {
                        info!(secs = duration.as_secs_f64(), "Run duration reached");
                        timer_cancel.cancel();
                    }
                    _ = timer_cancel.cancelled() => {}
                }
            });
        }

        let producer_report = producer.wait().await?;
        // Producer dropped its sender; the dispatcher drains and closes the sinks
        let dispatch_report = dispatcher_task
            .await
            .map_err(|e| CliError::Other(anyhow::anyhow!("dispatcher task failed: {e}")))?;
        cancel.cancel();

        let stats = PipelineStats {
            experiment: blueprint.label(),
            source: source_name,
            sensor: blueprint.sensor,
            producer: producer_report,
            dispatch: dispatch_report,
            duration: start_time.elapsed(),
        };

        info!(
            duration_secs = stats.duration.as_secs_f64(),
            samples_per_sec = format!("{:.2}", stats.samples_per_sec()),
            "Pipeline shutdown complete"
        );

        Ok(stats)
    }
}
