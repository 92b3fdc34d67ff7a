//! StreamingPipeline - producer side of the producer/consumer hand-off
//!
//! A named OS thread pulls events from the source, pushes them through the
//! [`PhaseEngine`] and hands batches of samples to the consumer over a
//! bounded channel. A full channel makes the producer wait; it never drops a
//! batch while the consumer is alive.

use std::thread::JoinHandle;
use std::time::Duration;

use contracts::{
    EventSource, MetricBatch, MetricSample, SourceEvent, StreamConfig, TimestampSource,
};
use phase_engine::{EngineStats, PhaseEngine, SharedStore};
use tokio::runtime::Runtime;
use tokio::sync::mpsc::{self, error::SendTimeoutError, error::TrySendError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::error::PipelineError;

const PRODUCER_THREAD_NAME: &str = "diffz-producer";

/// Why the producer stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProducerExit {
    /// Source reported end of stream; the partial batch was flushed
    #[default]
    EndOfStream,
    /// Cancellation was observed; the partial batch was discarded
    Cancelled,
    /// Receiver dropped
    ConsumerClosed,
    /// Source failed; treated as end of stream
    SourceError,
}

/// Producer summary returned by [`PipelineHandle::join`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProducerReport {
    pub events_read: u64,
    pub events_accepted: u64,
    pub samples: u64,
    pub batches_sent: u64,
    /// Samples in the partial batch dropped on cancellation
    pub partial_discarded: usize,
    /// Send attempts that found the channel full
    pub send_waits: u64,
    pub exit: ProducerExit,
    pub engine: EngineStats,
}

/// Handle to a running producer
pub struct PipelineHandle {
    thread: JoinHandle<ProducerReport>,
    store: SharedStore,
    cancel: CancellationToken,
}

impl PipelineHandle {
    /// Snapshot accessor for the engine's rolling store
    pub fn store(&self) -> SharedStore {
        self.store.clone()
    }

    /// Request cancellation; the producer stops at its next check
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Wait for the producer thread (blocking)
    pub fn join(self) -> Result<ProducerReport, PipelineError> {
        self.thread.join().map_err(|panic| {
            let message = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            PipelineError::ProducerPanicked(message)
        })
    }

    /// [`join`](Self::join) without blocking an async worker
    pub async fn wait(self) -> Result<ProducerReport, PipelineError> {
        tokio::task::spawn_blocking(move || self.join())
            .await
            .map_err(|e| PipelineError::ProducerPanicked(e.to_string()))?
    }
}

/// Entry point of the streaming pipeline
pub struct StreamingPipeline;

impl StreamingPipeline {
    /// Start the producer thread.
    ///
    /// Returns the handle and the receiving end of the bounded batch channel
    /// (`config.channel_capacity` batches of up to `config.batch_size`
    /// samples).
    #[instrument(
        name = "streaming_pipeline_spawn",
        skip(source, engine, cancel),
        fields(source = source.name(), batch_size = config.batch_size, capacity = config.channel_capacity)
    )]
    pub fn spawn<S>(
        source: S,
        engine: PhaseEngine,
        config: StreamConfig,
        cancel: CancellationToken,
    ) -> Result<(PipelineHandle, mpsc::Receiver<MetricBatch>), PipelineError>
    where
        S: EventSource + 'static,
    {
        let (tx, rx) = mpsc::channel(config.channel_capacity.max(1));
        // Private runtime: lets the producer wait on the channel and the
        // cancellation token together without touching the caller's runtime.
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .map_err(PipelineError::Runtime)?;

        let store = engine.store();
        let producer = Producer {
            source,
            engine,
            tx,
            cancel: cancel.clone(),
            runtime,
            batch_size: config.batch_size.max(1),
            send_wait: Duration::from_millis(config.send_wait_ms.max(1)),
            timestamp_source: config.timestamp_source,
            last_receive_s: f64::NEG_INFINITY,
            report: ProducerReport::default(),
        };

        let thread = std::thread::Builder::new()
            .name(PRODUCER_THREAD_NAME.to_string())
            .spawn(move || producer.run())
            .map_err(PipelineError::Spawn)?;

        info!("producer started");
        Ok((
            PipelineHandle {
                thread,
                store,
                cancel,
            },
            rx,
        ))
    }
}

enum HandOff {
    Sent,
    Cancelled,
    Closed,
}

struct Producer<S> {
    source: S,
    engine: PhaseEngine,
    tx: mpsc::Sender<MetricBatch>,
    cancel: CancellationToken,
    runtime: Runtime,
    batch_size: usize,
    send_wait: Duration,
    timestamp_source: TimestampSource,
    last_receive_s: f64,
    report: ProducerReport,
}

impl<S: EventSource> Producer<S> {
    fn run(mut self) -> ProducerReport {
        let mut batch: Vec<MetricSample> = Vec::with_capacity(self.batch_size);

        let exit = loop {
            if self.cancel.is_cancelled() {
                break ProducerExit::Cancelled;
            }

            let event = match self.source.next_event() {
                Ok(SourceEvent::Event(event)) => event,
                Ok(SourceEvent::EndOfStream) => break ProducerExit::EndOfStream,
                Err(e) => {
                    error!(source = self.source.name(), error = %e, "source failed, ending stream");
                    break ProducerExit::SourceError;
                }
            };
            self.report.events_read += 1;

            let Some(mut sample) = self.engine.push(&event) else {
                continue;
            };
            if self.timestamp_source == TimestampSource::Receive {
                sample.timestamp_s = self.receive_timestamp();
            }
            batch.push(sample);
            self.report.samples += 1;

            if batch.len() >= self.batch_size {
                let full = std::mem::replace(&mut batch, Vec::with_capacity(self.batch_size));
                match self.hand_off(full) {
                    HandOff::Sent => {}
                    HandOff::Cancelled => break ProducerExit::Cancelled,
                    HandOff::Closed => break ProducerExit::ConsumerClosed,
                }
            }
        };

        let exit = match exit {
            ProducerExit::EndOfStream | ProducerExit::SourceError if !batch.is_empty() => {
                match self.hand_off(std::mem::take(&mut batch)) {
                    HandOff::Sent => exit,
                    HandOff::Cancelled => ProducerExit::Cancelled,
                    HandOff::Closed => ProducerExit::ConsumerClosed,
                }
            }
            ProducerExit::Cancelled => {
                self.report.partial_discarded += batch.len();
                exit
            }
            _ => exit,
        };

        let engine = self.engine.stats();
        self.report.events_accepted = engine.events_accepted;
        self.report.engine = engine;
        self.report.exit = exit;

        info!(
            exit = ?exit,
            events = self.report.events_read,
            samples = self.report.samples,
            batches = self.report.batches_sent,
            send_waits = self.report.send_waits,
            discarded = self.report.partial_discarded,
            "producer stopped"
        );
        self.report
    }

    /// Wall clock in seconds, never earlier than the previous sample
    fn receive_timestamp(&mut self) -> f64 {
        let now = chrono::Utc::now().timestamp_millis() as f64 / 1000.0;
        self.last_receive_s = self.last_receive_s.max(now);
        self.last_receive_s
    }

    /// Deliver one batch, waiting while the channel is full.
    ///
    /// Each wait is bounded by `send_wait`; cancellation ends the wait early
    /// and discards the batch.
    fn hand_off(&mut self, samples: Vec<MetricSample>) -> HandOff {
        let len = samples.len();
        let mut batch = MetricBatch::new(self.report.batches_sent, samples);

        match self.tx.try_send(batch) {
            Ok(()) => return self.sent(len),
            Err(TrySendError::Closed(_)) => return HandOff::Closed,
            Err(TrySendError::Full(returned)) => batch = returned,
        }

        loop {
            self.report.send_waits += 1;
            observability::metrics::record_send_wait();

            let (tx, cancel, wait) = (&self.tx, &self.cancel, self.send_wait);
            let outcome = self.runtime.block_on(async {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => None,
                    result = tx.send_timeout(batch, wait) => Some(result),
                }
            });

            match outcome {
                None => {
                    self.report.partial_discarded += len;
                    warn!(samples = len, "cancelled while waiting for consumer, batch discarded");
                    return HandOff::Cancelled;
                }
                Some(Ok(())) => return self.sent(len),
                Some(Err(SendTimeoutError::Closed(_))) => return HandOff::Closed,
                Some(Err(SendTimeoutError::Timeout(returned))) => {
                    debug!(waits = self.report.send_waits, "consumer slow, still waiting");
                    batch = returned;
                }
            }
        }
    }

    fn sent(&mut self, len: usize) -> HandOff {
        self.report.batches_sent += 1;
        observability::metrics::record_batch_sent(len);
        debug!(seq = self.report.batches_sent - 1, samples = len, "batch handed off");
        HandOff::Sent
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{BufferConfig, ContractError, DifferencerConfig, TagPair, TagReadEvent};
    use std::collections::VecDeque;

    struct VecSource {
        events: VecDeque<TagReadEvent>,
        fail_at_end: bool,
    }

    impl VecSource {
        fn alternating(n: usize) -> Self {
            let events = (0..n)
                .map(|i| {
                    let (tag, phase) = if i % 2 == 0 { ("A", 10.0) } else { ("B", 40.0) };
                    TagReadEvent::new(tag, i as i64 * 10, 903.25, phase, -50.0, 1)
                })
                .collect();
            Self {
                events,
                fail_at_end: false,
            }
        }
    }

    impl EventSource for VecSource {
        fn name(&self) -> &str {
            "vec"
        }

        fn next_event(&mut self) -> Result<SourceEvent, ContractError> {
            match self.events.pop_front() {
                Some(event) => Ok(SourceEvent::Event(event)),
                None if self.fail_at_end => Err(ContractError::Other("reader disconnected".into())),
                None => Ok(SourceEvent::EndOfStream),
            }
        }
    }

    fn engine() -> PhaseEngine {
        let config = DifferencerConfig::new(TagPair::new("A", "B").unwrap())
            .with_mode(contracts::AlignmentMode::Elastic);
        PhaseEngine::new(config, &BufferConfig::default()).unwrap()
    }

    fn stream(batch_size: usize, channel_capacity: usize) -> StreamConfig {
        StreamConfig {
            batch_size,
            channel_capacity,
            send_wait_ms: 5,
            timestamp_source: TimestampSource::Event,
        }
    }

    #[tokio::test]
    async fn test_end_of_stream_flushes_partial_batch() {
        // 7 events -> 6 samples (first event has no partner yet) -> 4 + 2
        let (handle, mut rx) = StreamingPipeline::spawn(
            VecSource::alternating(7),
            engine(),
            stream(4, 8),
            CancellationToken::new(),
        )
        .unwrap();

        let mut sizes = Vec::new();
        while let Some(batch) = rx.recv().await {
            sizes.push(batch.len());
        }
        let report = handle.wait().await.unwrap();

        assert_eq!(sizes, vec![4, 2]);
        assert_eq!(report.exit, ProducerExit::EndOfStream);
        assert_eq!(report.events_read, 7);
        assert_eq!(report.samples, 6);
        assert_eq!(report.batches_sent, 2);
        assert_eq!(report.partial_discarded, 0);
    }

    #[tokio::test]
    async fn test_source_error_is_end_of_stream() {
        let mut source = VecSource::alternating(3);
        source.fail_at_end = true;
        let (handle, mut rx) =
            StreamingPipeline::spawn(source, engine(), stream(10, 2), CancellationToken::new())
                .unwrap();

        let batch = rx.recv().await.unwrap();
        assert_eq!(batch.len(), 2);
        assert!(rx.recv().await.is_none());
        assert_eq!(handle.wait().await.unwrap().exit, ProducerExit::SourceError);
    }

    #[tokio::test]
    async fn test_full_channel_waits_instead_of_dropping() {
        let (handle, mut rx) = StreamingPipeline::spawn(
            VecSource::alternating(41),
            engine(),
            stream(2, 1),
            CancellationToken::new(),
        )
        .unwrap();

        // Let the producer fill the channel and start waiting
        tokio::time::sleep(Duration::from_millis(50)).await;

        let mut seqs = Vec::new();
        while let Some(batch) = rx.recv().await {
            seqs.push(batch.seq);
        }
        let report = handle.wait().await.unwrap();

        assert_eq!(seqs, (0..20).collect::<Vec<u64>>());
        assert!(report.send_waits > 0);
        assert_eq!(report.samples, 40);
    }

    #[tokio::test]
    async fn test_cancel_discards_partial_batch() {
        let cancel = CancellationToken::new();
        let (handle, mut rx) = StreamingPipeline::spawn(
            VecSource::alternating(41),
            engine(),
            stream(3, 1),
            cancel.clone(),
        )
        .unwrap();

        // First batch fits in the channel, the second one blocks
        let first = rx.recv().await.unwrap();
        assert_eq!(first.seq, 0);
        tokio::time::sleep(Duration::from_millis(30)).await;
        cancel.cancel();

        let report = handle.wait().await.unwrap();
        assert_eq!(report.exit, ProducerExit::Cancelled);
        assert!(report.partial_discarded > 0);
        assert!(report.batches_sent < 14);
    }

    #[tokio::test]
    async fn test_default_stream_stamps_wall_clock() {
        let (handle, mut rx) = StreamingPipeline::spawn(
            VecSource::alternating(4),
            engine(),
            StreamConfig::default(),
            CancellationToken::new(),
        )
        .unwrap();

        let batch = rx.recv().await.unwrap();
        handle.wait().await.unwrap();
        let now_s = chrono::Utc::now().timestamp_millis() as f64 / 1000.0;
        assert_eq!(batch.len(), 3);
        // Events are stamped 0..30 ms; the samples carry receive time instead
        assert!(batch.samples.iter().all(|s| (now_s - s.timestamp_s).abs() < 60.0));
        assert!(batch.samples.windows(2).all(|w| w[0].timestamp_s <= w[1].timestamp_s));
    }

    #[test]
    fn test_store_snapshot_from_handle() {
        let (handle, rx) = StreamingPipeline::spawn(
            VecSource::alternating(4),
            engine(),
            stream(10, 4),
            CancellationToken::new(),
        )
        .unwrap();
        let store = handle.store();
        let report = handle.join().unwrap();
        drop(rx);

        assert_eq!(report.events_accepted, 4);
        assert_eq!(store.snapshot(false).total_records(), 4);
    }
}
