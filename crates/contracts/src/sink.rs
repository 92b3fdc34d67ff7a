//! MetricSink trait - downstream consumer interface
//!
//! Defines the abstract interface for sinks fed by the dispatcher.

use crate::{ContractError, MetricBatch};

/// Metric output trait
///
/// All sink implementations must implement this trait. `write` is awaited
/// by the consumer, so a slow sink slows the consumer and, through the
/// bounded channel, the producer.
#[trait_variant::make(MetricSink: Send)]
pub trait LocalMetricSink {
    /// Sink name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Write one batch
    ///
    /// # Errors
    /// Returns write error (should include context)
    async fn write(&mut self, batch: &MetricBatch) -> Result<(), ContractError>;

    /// Flush buffer (if any)
    async fn flush(&mut self) -> Result<(), ContractError>;

    /// Close sink
    async fn close(&mut self) -> Result<(), ContractError>;
}
