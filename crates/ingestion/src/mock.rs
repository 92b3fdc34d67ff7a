//! Mock 标签数据源
//!
//! 生成一对标签的合成读数，用于无读写器环境的测试。两个标签共享
//! 信道相关的相位偏置和缓慢漂移，第二个标签额外带有固定的相位差。

use std::sync::Arc;
use std::time::{Duration, Instant};

use contracts::{
    ContractError, EventSource, MockSourceConfig, SourceEvent, TagPair, TagReadEvent, TagSlot,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use tracing::{debug, trace};

use crate::error::{IngestionError, Result};
use crate::metrics::IngestionMetrics;

/// 读写器在一个信道上的驻留时间
const HOP_DWELL_MS: f64 = 200.0;
const BASE_RSSI_DBM: f64 = -52.0;
const RSSI_SPREAD_DBM: f64 = 3.0;

/// 合成标签对数据源
///
/// 每个标签按 `mean_interval_ms ± jitter_ms` 的间隔被读取，两路读数按时间
/// 交错输出。相同 seed 产生相同序列。
pub struct MockTagSource {
    name: String,
    pair: TagPair,
    config: MockSourceConfig,
    rng: StdRng,
    noise: Normal<f64>,
    /// 每个信道的相位偏置
    channel_bias: Vec<f64>,
    next_read_ms: [f64; 2],
    last_ms: f64,
    emitted: u64,
    started: Option<Instant>,
    metrics: Arc<IngestionMetrics>,
}

impl MockTagSource {
    /// 创建新的 Mock 数据源
    pub fn new(pair: TagPair, config: MockSourceConfig) -> Result<Self> {
        config
            .check_ranges()
            .map_err(|e| IngestionError::invalid_config(e.to_string()))?;
        let noise = Normal::new(0.0, config.noise_deg)
            .map_err(|e| IngestionError::invalid_config(format!("noise_deg: {e}")))?;

        let mut rng = StdRng::seed_from_u64(config.seed);
        let channel_bias = config
            .channels
            .iter()
            .map(|_| rng.random_range(0.0..360.0))
            .collect();
        // 第二个标签错开半个周期开始
        let next_read_ms = [0.0, config.mean_interval_ms / 2.0];

        Ok(Self {
            name: format!("mock:{}/{}", pair.first(), pair.second()),
            pair,
            config,
            rng,
            noise,
            channel_bias,
            next_read_ms,
            last_ms: 0.0,
            emitted: 0,
            started: None,
            metrics: Arc::new(IngestionMetrics::new()),
        })
    }

    pub fn metrics(&self) -> Arc<IngestionMetrics> {
        self.metrics.clone()
    }

    /// 当前时刻读写器所在信道
    fn channel_at(&self, t_ms: f64) -> usize {
        ((t_ms / HOP_DWELL_MS) as usize) % self.config.channels.len()
    }

    fn interval(&mut self) -> f64 {
        let jitter = self.config.jitter_ms.abs();
        let delta = if jitter > 0.0 {
            self.rng.random_range(-jitter..=jitter)
        } else {
            0.0
        };
        (self.config.mean_interval_ms + delta).max(1.0)
    }

    fn paired_read(&mut self, slot: TagSlot, t_ms: f64) -> TagReadEvent {
        let index = self.channel_at(t_ms);
        let offset = match slot {
            TagSlot::First => 0.0,
            TagSlot::Second => self.config.phase_offset_deg,
        };
        let phase = self.channel_bias[index]
            + self.config.drift_deg_per_s * t_ms / 1000.0
            + offset
            + self.noise.sample(&mut self.rng);
        let rssi = BASE_RSSI_DBM + self.rng.random_range(-RSSI_SPREAD_DBM..=RSSI_SPREAD_DBM);

        TagReadEvent::new(
            self.pair.get(slot).clone(),
            t_ms.round() as i64,
            self.config.channels[index],
            phase.rem_euclid(360.0),
            rssi,
            1,
        )
    }

    fn foreign_read(&mut self, t_ms: f64) -> TagReadEvent {
        let index = self.channel_at(t_ms);
        let tag = format!("FOREIGN{:04}", self.rng.random_range(0..16u32));
        TagReadEvent::new(
            tag,
            t_ms.round() as i64,
            self.config.channels[index],
            self.rng.random_range(0.0..360.0),
            BASE_RSSI_DBM - 10.0,
            1,
        )
    }

    fn pace(&mut self, t_ms: f64) {
        if !self.config.realtime {
            return;
        }
        let started = *self.started.get_or_insert_with(Instant::now);
        let due = Duration::from_secs_f64(t_ms.max(0.0) / 1000.0);
        let elapsed = started.elapsed();
        if due > elapsed {
            std::thread::sleep(due - elapsed);
        }
    }
}

impl EventSource for MockTagSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn next_event(&mut self) -> std::result::Result<SourceEvent, ContractError> {
        if self
            .config
            .max_events
            .is_some_and(|limit| self.emitted >= limit)
        {
            debug!(source = %self.name, emitted = self.emitted, "mock source exhausted");
            return Ok(SourceEvent::EndOfStream);
        }

        let event = if self.config.foreign_ratio > 0.0 && self.rng.random_bool(self.config.foreign_ratio) {
            self.foreign_read(self.last_ms)
        } else {
            let slot = if self.next_read_ms[0] <= self.next_read_ms[1] {
                TagSlot::First
            } else {
                TagSlot::Second
            };
            let t_ms = self.next_read_ms[slot.index()];
            self.next_read_ms[slot.index()] = t_ms + self.interval();
            self.last_ms = t_ms;
            self.paired_read(slot, t_ms)
        };

        self.pace(event.timestamp_ms as f64);
        self.emitted += 1;
        self.metrics.record_emitted();
        trace!(tag_id = %event.tag_id, timestamp_ms = event.timestamp_ms, "mock read");
        Ok(SourceEvent::Event(event))
    }
}
