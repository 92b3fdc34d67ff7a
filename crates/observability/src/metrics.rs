//! 差分相位指标收集模块
//!
//! `record_*` 函数写入全局 `metrics` recorder (未安装 recorder 时为 no-op)；
//! `MetricAggregator` 在内存中聚合输出值，用于运行结束时的摘要。

use std::collections::VecDeque;

use contracts::MetricBatch;
use metrics::{counter, gauge, histogram};

/// 中位数只在最近这么多个输出值上计算
pub const MEDIAN_WINDOW: usize = 100_000;

/// 记录被接收的标签读数
pub fn record_event_accepted(tag_id: &str) {
    counter!("diffz_events_accepted_total", "tag_id" => tag_id.to_string()).increment(1);
}

/// 记录非配对标签的读数
pub fn record_event_rejected() {
    counter!("diffz_events_rejected_total").increment(1);
}

/// 记录字段非法的配对标签读数 (NaN / inf / 负时间戳)
pub fn record_event_malformed() {
    counter!("diffz_events_malformed_total").increment(1);
}

/// 记录上游格式错误的记录
pub fn record_malformed_record(source: &str) {
    counter!("diffz_records_malformed_total", "source" => source.to_string()).increment(1);
}

/// 记录一个输出窗口及其值
pub fn record_window_emitted(value: f64) {
    counter!("diffz_windows_total", "status" => "emitted").increment(1);
    gauge!("diffz_phase_difference_deg").set(value);
    histogram!("diffz_phase_difference_deg_hist").record(value);
}

/// 记录因数据不足而跳过的窗口
pub fn record_window_skipped() {
    counter!("diffz_windows_total", "status" => "skipped").increment(1);
}

/// 记录 DTW 对齐代价
pub fn record_alignment_cost(cost: f64) {
    histogram!("diffz_dtw_cost").record(cost);
}

/// 记录批次交付
pub fn record_batch_sent(samples: usize) {
    counter!("diffz_batches_sent_total").increment(1);
    histogram!("diffz_batch_size").record(samples as f64);
}

/// 记录通道满时的等待 (背压)
pub fn record_send_wait() {
    counter!("diffz_backpressure_waits_total").increment(1);
}

/// 记录批次分发到 sink
pub fn record_batch_dispatched(sink_name: &str, success: bool) {
    let status = if success { "success" } else { "failure" };
    counter!(
        "diffz_batches_dispatched_total",
        "sink" => sink_name.to_string(),
        "status" => status
    )
    .increment(1);
}

/// 输出指标聚合器
#[derive(Debug, Clone, Default)]
pub struct MetricAggregator {
    pub batches: u64,
    pub samples: u64,
    /// 非递增时间戳的次数 (应始终为 0)
    pub ordering_violations: u64,
    pub values: RunningStats,
    pub batch_sizes: RunningStats,
    last_timestamp_s: Option<f64>,
    latest: Option<f64>,
    recent: VecDeque<f64>,
}

impl MetricAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// 更新聚合统计
    pub fn update(&mut self, batch: &MetricBatch) {
        self.batches += 1;
        self.batch_sizes.push(batch.len() as f64);
        for sample in &batch.samples {
            self.samples += 1;
            self.values.push(sample.value);
            if sample.value.is_finite() {
                if self.recent.len() == MEDIAN_WINDOW {
                    self.recent.pop_front();
                }
                self.recent.push_back(sample.value);
            }
            if let Some(prev) = self.last_timestamp_s {
                if sample.timestamp_s < prev {
                    self.ordering_violations += 1;
                }
            }
            self.last_timestamp_s = Some(sample.timestamp_s);
            self.latest = Some(sample.value);
        }
    }

    /// 生成摘要报告
    pub fn summary(&self) -> MetricsSummary {
        MetricsSummary {
            batches: self.batches,
            samples: self.samples,
            ordering_violations: self.ordering_violations,
            latest: self.latest,
            value_deg: StatsSummary::from(&self.values),
            median_deg: median(self.recent.iter().copied()),
            batch_size: StatsSummary::from(&self.batch_sizes),
        }
    }

    /// 最近输出值相对期望值的精度
    pub fn accuracy(&self, expected: f64) -> Option<Accuracy> {
        Accuracy::against(self.recent.iter().copied(), expected)
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// 指标摘要
#[derive(Debug, Clone, Default)]
pub struct MetricsSummary {
    pub batches: u64,
    pub samples: u64,
    pub ordering_violations: u64,
    pub latest: Option<f64>,
    pub value_deg: StatsSummary,
    /// Over the last [`MEDIAN_WINDOW`] values
    pub median_deg: Option<f64>,
    pub batch_size: StatsSummary,
}

impl std::fmt::Display for MetricsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Phase Difference Summary ===")?;
        writeln!(f, "Batches: {}", self.batches)?;
        writeln!(f, "Samples: {}", self.samples)?;
        match self.latest {
            Some(v) => writeln!(f, "Latest value: {v:.2}°")?,
            None => writeln!(f, "Latest value: N/A")?,
        }
        writeln!(f, "Value (deg): {}", self.value_deg)?;
        if let Some(median) = self.median_deg {
            writeln!(f, "Median (deg): {median:.3}")?;
        }
        writeln!(f, "Batch size: {}", self.batch_size)?;
        if self.ordering_violations > 0 {
            writeln!(f, "Ordering violations: {}", self.ordering_violations)?;
        }
        Ok(())
    }
}

/// 统计摘要
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count(),
            min: stats.min().unwrap_or_default(),
            max: stats.max().unwrap_or_default(),
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// 有限值的中位数, 偶数个时取中间两个的平均
pub fn median(values: impl IntoIterator<Item = f64>) -> Option<f64> {
    let mut sorted: Vec<f64> = values.into_iter().filter(|v| v.is_finite()).collect();
    if sorted.is_empty() {
        return None;
    }
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    Some(if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    })
}

/// 输出值相对已知期望值的误差
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Accuracy {
    pub expected: f64,
    pub rmse: f64,
    /// `1 - SS_res / SS_tot`; 0 when the values have no spread
    pub r_squared: f64,
}

impl Accuracy {
    /// `None` when there is no finite value
    pub fn against(values: impl IntoIterator<Item = f64>, expected: f64) -> Option<Self> {
        let values: Vec<f64> = values.into_iter().filter(|v| v.is_finite()).collect();
        if values.is_empty() || !expected.is_finite() {
            return None;
        }
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let ss_res: f64 = values.iter().map(|v| (v - expected).powi(2)).sum();
        let ss_tot: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
        let r_squared = if ss_tot != 0.0 { 1.0 - ss_res / ss_tot } else { 0.0 };
        Some(Self {
            expected,
            rmse: (ss_res / n).sqrt(),
            r_squared,
        })
    }
}

impl std::fmt::Display for Accuracy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "RMSE={:.2}, R^2={:.4} (expected {})",
            self.rmse, self.r_squared, self.expected
        )
    }
}

/// 在线统计 (Welford), 忽略非有限值
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    bounds: Option<(f64, f64)>,
}

impl RunningStats {
    pub fn push(&mut self, value: f64) {
        if !value.is_finite() {
            return;
        }
        self.count += 1;
        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (value - self.mean);
        self.bounds = Some(match self.bounds {
            Some((lo, hi)) => (lo.min(value), hi.max(value)),
            None => (value, value),
        });
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        self.mean
    }

    /// 样本方差 (n-1)
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> Option<f64> {
        self.bounds.map(|(lo, _)| lo)
    }

    pub fn max(&self) -> Option<f64> {
        self.bounds.map(|(_, hi)| hi)
    }
}
