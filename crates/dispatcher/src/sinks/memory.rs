//! MemorySink - collects batches in process

use std::sync::{Arc, Mutex, PoisonError};

use contracts::{ContractError, MetricBatch, MetricSample, MetricSink};

/// Shared view of what a [`MemorySink`] has received
#[derive(Debug, Clone, Default)]
pub struct MemoryCollector {
    batches: Arc<Mutex<Vec<MetricBatch>>>,
}

impl MemoryCollector {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<MetricBatch>> {
        self.batches.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Copy of every batch received so far, in arrival order
    pub fn batches(&self) -> Vec<MetricBatch> {
        self.lock().clone()
    }

    /// All samples, flattened in arrival order
    pub fn samples(&self) -> Vec<MetricSample> {
        self.lock()
            .iter()
            .flat_map(|b| b.samples.iter().copied())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn push(&self, batch: MetricBatch) {
        self.lock().push(batch);
    }
}

/// Sink that keeps every batch in a [`MemoryCollector`]
pub struct MemorySink {
    name: String,
    collector: MemoryCollector,
}

impl MemorySink {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_collector(name, MemoryCollector::new())
    }

    pub fn with_collector(name: impl Into<String>, collector: MemoryCollector) -> Self {
        Self {
            name: name.into(),
            collector,
        }
    }

    pub fn collector(&self) -> MemoryCollector {
        self.collector.clone()
    }
}

impl MetricSink for MemorySink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn write(&mut self, batch: &MetricBatch) -> Result<(), ContractError> {
        self.collector.push(batch.clone());
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), ContractError> {
        Ok(())
    }

    async fn close(&mut self) -> Result<(), ContractError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_collector_sees_writes() {
        let mut sink = MemorySink::new("mem");
        let collector = sink.collector();
        sink.write(&MetricBatch::new(0, vec![MetricSample::new(1.0, 0.1)]))
            .await
            .unwrap();
        sink.write(&MetricBatch::new(1, vec![MetricSample::new(2.0, 0.2)]))
            .await
            .unwrap();

        assert_eq!(collector.len(), 2);
        let values: Vec<f64> = collector.samples().iter().map(|s| s.value).collect();
        assert_eq!(values, vec![1.0, 2.0]);
    }
}
