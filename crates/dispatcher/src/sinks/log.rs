//! LogSink - logs batch summaries via tracing

use contracts::{ContractError, MetricBatch, MetricSink, SensorProfile};
use phase_engine::SensorReadout;
use tracing::{info, instrument};

/// Sink that logs one line per batch with the latest sensor reading
pub struct LogSink {
    name: String,
    readout: SensorReadout,
    batches: u64,
}

impl LogSink {
    /// Create a new LogSink reporting plain degrees
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_profile(name, SensorProfile::Degrees)
    }

    pub fn with_profile(name: impl Into<String>, profile: SensorProfile) -> Self {
        Self {
            name: name.into(),
            readout: SensorReadout::new(profile),
            batches: 0,
        }
    }

    fn log_batch_summary(&mut self, batch: &MetricBatch) {
        let Some(last) = batch.last() else {
            return;
        };
        let mean = batch.samples.iter().map(|s| s.value).sum::<f64>() / batch.len() as f64;
        let reading = self.readout.apply(last.value);

        info!(
            sink = %self.name,
            seq = batch.seq,
            samples = batch.len(),
            mean_deg = mean,
            last_deg = last.value,
            t = last.timestamp_s,
            reading = %reading,
            "MetricBatch received"
        );
    }
}

impl MetricSink for LogSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "log_sink_write",
        skip(self, batch),
        fields(sink = %self.name, seq = batch.seq)
    )]
    async fn write(&mut self, batch: &MetricBatch) -> Result<(), ContractError> {
        self.batches += 1;
        self.log_batch_summary(batch);
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), ContractError> {
        Ok(())
    }

    #[instrument(name = "log_sink_close", skip(self))]
    async fn close(&mut self) -> Result<(), ContractError> {
        info!(sink = %self.name, batches = self.batches, "LogSink closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::MetricSample;

    #[tokio::test]
    async fn test_log_sink_write() {
        let mut sink = LogSink::with_profile("test_log", SensorProfile::Soil);
        let batch = MetricBatch::new(0, vec![MetricSample::new(42.5, 1.0)]);

        assert!(sink.write(&batch).await.is_ok());
        assert!(sink.write(&MetricBatch::new(1, vec![])).await.is_ok());
        assert_eq!(sink.batches, 2);
    }

    #[test]
    fn test_log_sink_name() {
        let sink = LogSink::new("my_logger");
        assert_eq!(sink.name(), "my_logger");
    }
}
