//! Dispatcher - consumer loop forwarding batches to sinks

use std::collections::HashMap;
use std::sync::Arc;

use observability::{MetricAggregator, MetricsSummary};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use contracts::{MetricBatch, SensorProfile, SinkConfig, SinkType};

use crate::error::DispatcherError;
use crate::handle::SinkHandle;
use crate::metrics::MetricsSnapshot;
use crate::sinks::{JsonlSink, LogSink, MemoryCollector, MemorySink};

/// Dispatcher configuration
#[derive(Debug, Clone, Default)]
pub struct DispatcherConfig {
    pub sinks: Vec<SinkConfig>,
    /// Readout used by log sinks
    pub sensor: SensorProfile,
}

/// Builder for creating a Dispatcher
pub struct DispatcherBuilder {
    config: DispatcherConfig,
    input_rx: mpsc::Receiver<MetricBatch>,
}

impl DispatcherBuilder {
    pub fn new(config: DispatcherConfig, input_rx: mpsc::Receiver<MetricBatch>) -> Self {
        Self { config, input_rx }
    }

    /// Build the sinks and their workers
    #[instrument(
        name = "dispatcher_builder_build",
        skip(self),
        fields(sink_count = self.config.sinks.len())
    )]
    pub async fn build(self) -> Result<Dispatcher, DispatcherError> {
        let mut handles = Vec::with_capacity(self.config.sinks.len());
        let mut collectors = HashMap::new();
        for sink_config in &self.config.sinks {
            let handle =
                create_sink_handle(sink_config, self.config.sensor, &mut collectors).await?;
            handles.push(handle);
        }

        Ok(Dispatcher {
            handles,
            collectors,
            input_rx: self.input_rx,
            aggregator: MetricAggregator::new(),
        })
    }
}

/// Create a SinkHandle from configuration
#[instrument(
    name = "dispatcher_create_sink_handle",
    skip(config, collectors),
    fields(sink = %config.name, sink_type = ?config.sink_type)
)]
async fn create_sink_handle(
    config: &SinkConfig,
    sensor: SensorProfile,
    collectors: &mut HashMap<String, MemoryCollector>,
) -> Result<SinkHandle, DispatcherError> {
    match config.sink_type {
        SinkType::Log => {
            let sink = LogSink::with_profile(&config.name, sensor);
            Ok(SinkHandle::spawn(sink, config.queue_capacity))
        }
        SinkType::Memory => {
            let sink = MemorySink::new(&config.name);
            collectors.insert(config.name.clone(), sink.collector());
            Ok(SinkHandle::spawn(sink, config.queue_capacity))
        }
        SinkType::Jsonl => {
            let sink = JsonlSink::from_params(&config.name, &config.params)
                .await
                .map_err(|e| DispatcherError::sink_creation(&config.name, e.to_string()))?;
            Ok(SinkHandle::spawn(sink, config.queue_capacity))
        }
    }
}

/// What the consumer saw, returned when the input channel closes
#[derive(Debug, Clone, Default)]
pub struct DispatchReport {
    pub summary: MetricsSummary,
    /// Batches whose sequence number was not the expected next one
    pub sequence_gaps: u64,
    pub sinks: Vec<(String, MetricsSnapshot)>,
}

/// Consumer that forwards every batch to every sink, in order
pub struct Dispatcher {
    handles: Vec<SinkHandle>,
    collectors: HashMap<String, MemoryCollector>,
    input_rx: mpsc::Receiver<MetricBatch>,
    aggregator: MetricAggregator,
}

impl Dispatcher {
    /// Create a dispatcher with custom sink handles (for testing)
    pub fn with_handles(handles: Vec<SinkHandle>, input_rx: mpsc::Receiver<MetricBatch>) -> Self {
        Self {
            handles,
            collectors: HashMap::new(),
            input_rx,
            aggregator: MetricAggregator::new(),
        }
    }

    /// Collector of a configured memory sink
    pub fn collector(&self, sink_name: &str) -> Option<MemoryCollector> {
        self.collectors.get(sink_name).cloned()
    }

    /// Get metrics for all sinks
    pub fn metrics(&self) -> Vec<(String, MetricsSnapshot)> {
        self.handles
            .iter()
            .map(|h| (h.name().to_string(), h.metrics().snapshot()))
            .collect()
    }

    /// Run the consumer loop.
    ///
    /// Sends to sinks are awaited, so a slow sink slows the consumer and the
    /// bounded input channel pushes back on the producer. Returns when the
    /// input channel is closed and every sink has been flushed and closed.
    #[instrument(name = "dispatcher_run", skip(self), fields(sinks = self.handles.len()))]
    pub async fn run(mut self) -> DispatchReport {
        info!(sinks = self.handles.len(), "Dispatcher started");

        let mut expected_seq = 0u64;
        let mut sequence_gaps = 0u64;

        while let Some(batch) = self.input_rx.recv().await {
            if batch.seq != expected_seq {
                sequence_gaps += 1;
                warn!(expected = expected_seq, got = batch.seq, "batch sequence gap");
            }
            expected_seq = batch.seq + 1;

            self.aggregator.update(&batch);
            self.dispatch_batch(batch).await;

            if self.aggregator.batches.is_multiple_of(100) {
                debug!(batches = self.aggregator.batches, "Dispatcher progress");
            }
        }

        info!(
            batches = self.aggregator.batches,
            samples = self.aggregator.samples,
            "Dispatcher input closed, shutting down"
        );

        let counters: Vec<_> = self
            .handles
            .iter()
            .map(|h| (h.name().to_string(), Arc::clone(h.metrics())))
            .collect();
        for handle in self.handles {
            handle.shutdown().await;
        }
        // Snapshot after the workers drained their queues
        let sinks = counters
            .into_iter()
            .map(|(name, metrics)| (name, metrics.snapshot()))
            .collect();
        let summary = self.aggregator.summary();

        info!("Dispatcher shutdown complete");
        DispatchReport {
            summary,
            sequence_gaps,
            sinks,
        }
    }

    /// Spawn the dispatcher as a background task
    pub fn spawn(self) -> JoinHandle<DispatchReport> {
        tokio::spawn(self.run())
    }

    async fn dispatch_batch(&self, batch: MetricBatch) {
        let Some((last, rest)) = self.handles.split_last() else {
            return;
        };
        for handle in rest {
            handle.send(batch.clone()).await;
        }
        last.send(batch).await;
    }
}

/// Convenience function to create a dispatcher from sink configs
#[instrument(name = "dispatcher_create", skip(sink_configs, input_rx))]
pub async fn create_dispatcher(
    sink_configs: Vec<SinkConfig>,
    sensor: SensorProfile,
    input_rx: mpsc::Receiver<MetricBatch>,
) -> Result<Dispatcher, DispatcherError> {
    let config = DispatcherConfig {
        sinks: sink_configs,
        sensor,
    };
    DispatcherBuilder::new(config, input_rx).build().await
}
