//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 负责：
//! - 配置合约测试 (示例配置可加载)
//! - 离线滑动窗口端到端场景
//! - 生产者/消费者背压与取消
//! - 数据源 -> 引擎 -> 分发器 -> sink 的完整链路

#[cfg(test)]
mod support {
    use std::collections::VecDeque;

    use contracts::{ContractError, EventSource, SourceEvent, TagReadEvent};

    /// Source replaying a fixed list of reads
    pub struct ScriptedSource {
        events: VecDeque<TagReadEvent>,
    }

    impl ScriptedSource {
        pub fn new(events: Vec<TagReadEvent>) -> Self {
            Self {
                events: events.into(),
            }
        }

        /// `n` reads alternating A/B on one channel, 10 ms apart
        pub fn alternating(n: usize) -> Self {
            Self::new(
                (0..n)
                    .map(|i| {
                        let (tag, phase) = if i % 2 == 0 { ("A", 10.0) } else { ("B", 40.0) };
                        read(tag, i as i64 * 10, 5.0, phase)
                    })
                    .collect(),
            )
        }
    }

    impl EventSource for ScriptedSource {
        fn name(&self) -> &str {
            "scripted"
        }

        fn next_event(&mut self) -> Result<SourceEvent, ContractError> {
            Ok(self
                .events
                .pop_front()
                .map_or(SourceEvent::EndOfStream, SourceEvent::Event))
        }
    }

    pub fn read(tag: &str, t_ms: i64, channel: f64, phase: f64) -> TagReadEvent {
        TagReadEvent::new(tag, t_ms, channel, phase, -55.0, 1)
    }
}

#[cfg(test)]
mod contract_tests {
    use std::path::PathBuf;

    use config_loader::ConfigLoader;
    use contracts::{SensorProfile, SinkType, SourceKind};

    fn sample_config() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../configs/diffz.toml")
    }

    #[test]
    fn test_sample_config_loads() {
        let blueprint = ConfigLoader::load_from_path(&sample_config()).unwrap();
        assert_eq!(blueprint.label(), "soil-bench");
        assert_eq!(blueprint.sensor, SensorProfile::Soil);
        assert_eq!(blueprint.source.kind, SourceKind::Mock);
        assert_eq!(blueprint.buffer.live_len(), 40);
        assert_eq!(blueprint.sinks.len(), 2);
        assert_eq!(blueprint.sinks[1].sink_type, SinkType::Jsonl);
    }
}

#[cfg(test)]
mod sweep_tests {
    use contracts::{AlignmentMode, BufferConfig, DifferencerConfig, TagPair};
    use phase_engine::{RollingStore, WindowedDifferencer};

    use crate::support::read;

    fn differencer(duration_s: f64, stride_s: f64) -> WindowedDifferencer {
        let config = DifferencerConfig::new(TagPair::new("A", "B").unwrap())
            .with_window(duration_s, stride_s)
            .with_mode(AlignmentMode::Interpolation);
        WindowedDifferencer::new(config).unwrap()
    }

    /// A at 0/100/200 ms, B at 10/110/210 ms: 190 ms of overlap cannot hold
    /// a 250 ms window.
    #[test]
    fn test_insufficient_overlap_yields_no_windows() {
        let events = vec![
            read("A", 0, 5.0, 10.0),
            read("B", 10, 5.0, 30.0),
            read("A", 100, 5.0, 10.0),
            read("B", 110, 5.0, 30.0),
            read("A", 200, 5.0, 10.0),
            read("B", 210, 5.0, 30.0),
        ];
        let store = RollingStore::from_events(
            TagPair::new("A", "B").unwrap(),
            &BufferConfig::default(),
            &events,
        )
        .unwrap();
        let snapshot = store.snapshot(false);

        let differencer = differencer(0.25, 0.25);
        let sweep = differencer.sweep(&snapshot).unwrap();
        assert_eq!(sweep.window_count(), 0);
        assert!(differencer.sweep_all(&snapshot).unwrap().is_empty());
    }

    #[test]
    fn test_long_recording_folds_offset_and_orders_samples() {
        // 10° vs 130°: the raw 120° difference folds to 60°
        let events: Vec<_> = (0..40)
            .flat_map(|i| {
                let t = i * 50;
                [read("A", t, 5.0, 10.0), read("B", t + 10, 5.0, 130.0)]
            })
            .collect();
        let store = RollingStore::from_events(
            TagPair::new("A", "B").unwrap(),
            &BufferConfig::default(),
            &events,
        )
        .unwrap();
        let samples = differencer(0.5, 0.1)
            .sweep_all(&store.snapshot(false))
            .unwrap();

        assert!(!samples.is_empty());
        for pair in samples.windows(2) {
            assert!(pair[1].timestamp_s > pair[0].timestamp_s);
        }
        for sample in &samples {
            assert!((sample.value - 60.0).abs() < 1e-9, "got {}", sample.value);
        }
    }

    #[test]
    fn test_disjoint_streams_emit_nothing() {
        let mut events: Vec<_> = (0..10).map(|i| read("A", i * 50, 5.0, 10.0)).collect();
        events.extend((0..10).map(|i| read("B", 1000 + i * 50, 5.0, 30.0)));
        let store = RollingStore::from_events(
            TagPair::new("A", "B").unwrap(),
            &BufferConfig::default(),
            &events,
        )
        .unwrap();
        let samples = differencer(0.2, 0.05)
            .sweep_all(&store.snapshot(false))
            .unwrap();
        assert!(samples.is_empty());
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::collections::HashMap;
    use std::io::Write;
    use std::time::Duration;

    use contracts::{
        AlignmentMode, BufferConfig, DifferencerConfig, MockSourceConfig, SensorProfile,
        SinkConfig, SinkType, StreamConfig, TagPair, TimestampSource,
    };
    use dispatcher::{create_dispatcher, ProducerExit, StreamingPipeline};
    use ingestion::{MockTagSource, ReplaySource};
    use phase_engine::PhaseEngine;
    use tokio::time::timeout;
    use tokio_util::sync::CancellationToken;

    use crate::support::ScriptedSource;

    const GUARD: Duration = Duration::from_secs(10);

    fn engine(mode: AlignmentMode, read_rate_hz: f64) -> PhaseEngine {
        let config = DifferencerConfig::new(TagPair::new("A", "B").unwrap()).with_mode(mode);
        let buffer = BufferConfig {
            read_rate_hz,
            window_s: 1.0,
            ..Default::default()
        };
        PhaseEngine::new(config, &buffer).unwrap()
    }

    fn stream(batch_size: usize, channel_capacity: usize) -> StreamConfig {
        StreamConfig {
            batch_size,
            channel_capacity,
            send_wait_ms: 5,
            timestamp_source: TimestampSource::Event,
        }
    }

    fn memory_sink(name: &str) -> SinkConfig {
        SinkConfig {
            name: name.to_string(),
            sink_type: SinkType::Memory,
            queue_capacity: 4,
            params: HashMap::new(),
        }
    }

    /// Ten samples through a one-slot channel with a slow consumer: nothing
    /// is dropped and the five batches arrive in order. The leading read
    /// only primes the window, so eleven reads yield ten samples.
    #[tokio::test]
    async fn test_backpressure_delivers_every_batch_in_order() {
        let (handle, mut rx) = StreamingPipeline::spawn(
            ScriptedSource::alternating(11),
            engine(AlignmentMode::Elastic, 100.0),
            stream(2, 1),
            CancellationToken::new(),
        )
        .unwrap();

        let received = timeout(GUARD, async {
            let mut batches = Vec::new();
            while let Some(batch) = rx.recv().await {
                tokio::time::sleep(Duration::from_millis(15)).await;
                batches.push(batch);
            }
            batches
        })
        .await
        .unwrap();
        let report = timeout(GUARD, handle.wait()).await.unwrap().unwrap();

        let seqs: Vec<u64> = received.iter().map(|b| b.seq).collect();
        assert_eq!(seqs, vec![0, 1, 2, 3, 4]);
        assert!(received.iter().all(|b| b.len() == 2));
        assert_eq!(report.samples, 10);
        assert_eq!(report.batches_sent, 5);
        assert_eq!(report.exit, ProducerExit::EndOfStream);
    }

    #[tokio::test]
    async fn test_mock_pipeline_through_dispatcher() {
        let mock = MockSourceConfig {
            seed: 3,
            noise_deg: 0.0,
            drift_deg_per_s: 0.0,
            phase_offset_deg: 30.0,
            foreign_ratio: 0.1,
            max_events: Some(600),
            ..Default::default()
        };
        let source = MockTagSource::new(TagPair::new("A", "B").unwrap(), mock).unwrap();
        let (handle, rx) = StreamingPipeline::spawn(
            source,
            engine(AlignmentMode::Interpolation, 50.0),
            stream(16, 2),
            CancellationToken::new(),
        )
        .unwrap();

        let dispatcher = create_dispatcher(vec![memory_sink("mem")], SensorProfile::Degrees, rx)
            .await
            .unwrap();
        let collector = dispatcher.collector("mem").unwrap();
        let dispatch = timeout(GUARD, dispatcher.spawn()).await.unwrap().unwrap();
        let report = timeout(GUARD, handle.wait()).await.unwrap().unwrap();

        assert_eq!(report.events_read, 600);
        assert!(report.events_accepted < report.events_read);
        assert!(report.samples > 0);
        assert_eq!(dispatch.summary.samples, report.samples);
        assert_eq!(dispatch.sequence_gaps, 0);
        assert_eq!(dispatch.summary.ordering_violations, 0);

        let samples = collector.samples();
        assert_eq!(samples.len() as u64, report.samples);
        for sample in &samples {
            assert!((sample.value - 30.0).abs() < 1e-6, "got {}", sample.value);
        }
    }

    #[tokio::test]
    async fn test_replay_file_to_jsonl_sink() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("reads.csv");
        {
            let mut file = std::fs::File::create(&input).unwrap();
            writeln!(file, "epc,timestamp,channel,phase,rssi,readCount").unwrap();
            for i in 0..30 {
                writeln!(file, "A,{},5,20,-50,1", i * 20).unwrap();
                writeln!(file, "B,{},5,65,-51,1", i * 20 + 7).unwrap();
            }
            writeln!(file, "this line is not a record").unwrap();
        }
        let output = dir.path().join("out.jsonl");

        let source = ReplaySource::open(&input).unwrap();
        let metrics = source.metrics();
        let (handle, rx) = StreamingPipeline::spawn(
            source,
            engine(AlignmentMode::Elastic, 40.0),
            stream(8, 4),
            CancellationToken::new(),
        )
        .unwrap();

        let mut sink = SinkConfig {
            name: "file".into(),
            sink_type: SinkType::Jsonl,
            queue_capacity: 4,
            params: HashMap::new(),
        };
        sink.params
            .insert("path".into(), output.display().to_string());
        let dispatcher = create_dispatcher(vec![sink], SensorProfile::Degrees, rx)
            .await
            .unwrap();
        let dispatch = timeout(GUARD, dispatcher.spawn()).await.unwrap().unwrap();
        let report = timeout(GUARD, handle.wait()).await.unwrap().unwrap();

        assert_eq!(report.events_read, 60);
        assert_eq!(report.samples, 59);
        assert_eq!(metrics.snapshot().malformed, 1);
        assert_eq!(dispatch.sinks[0].1.failure_count, 0);

        let content = std::fs::read_to_string(&output).unwrap();
        let lines: Vec<serde_json::Value> = content
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 59);
        assert!(lines
            .iter()
            .all(|l| (l["value"].as_f64().unwrap() - 45.0).abs() < 1e-9));
    }

    #[tokio::test]
    async fn test_cancel_stops_unbounded_source() {
        let source = MockTagSource::new(
            TagPair::new("A", "B").unwrap(),
            MockSourceConfig {
                max_events: None,
                ..Default::default()
            },
        )
        .unwrap();
        let cancel = CancellationToken::new();
        let (handle, rx) = StreamingPipeline::spawn(
            source,
            engine(AlignmentMode::Interpolation, 40.0),
            stream(10, 2),
            cancel.clone(),
        )
        .unwrap();

        let dispatcher = create_dispatcher(vec![memory_sink("mem")], SensorProfile::Degrees, rx)
            .await
            .unwrap();
        let dispatch_task = dispatcher.spawn();

        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();

        let report = timeout(GUARD, handle.wait()).await.unwrap().unwrap();
        let dispatch = timeout(GUARD, dispatch_task).await.unwrap().unwrap();

        assert_eq!(report.exit, ProducerExit::Cancelled);
        assert_eq!(dispatch.summary.batches, report.batches_sent);
        assert_eq!(dispatch.sequence_gaps, 0);
        assert!(dispatch.summary.samples as usize % 10 == 0);
    }
}
