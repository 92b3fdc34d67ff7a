//! # Dispatcher
//!
//! 生产者/消费者流水线。
//!
//! 负责：
//! - 生产者线程：拉取事件、推入 `PhaseEngine`、批量发送 `MetricBatch`
//! - 有界通道背压：通道满时等待，不丢弃批次
//! - 消费者：按顺序把批次分发到所有 sinks

pub mod dispatcher;
pub mod error;
pub mod handle;
pub mod metrics;
pub mod pipeline;
pub mod sinks;

pub use contracts::{MetricBatch, MetricSink};
pub use dispatcher::{
    create_dispatcher, DispatchReport, Dispatcher, DispatcherBuilder, DispatcherConfig,
};
pub use error::{DispatcherError, PipelineError};
pub use handle::SinkHandle;
pub use metrics::{MetricsSnapshot, SinkMetrics};
pub use pipeline::{PipelineHandle, ProducerExit, ProducerReport, StreamingPipeline};
pub use sinks::{JsonlSink, LogSink, MemoryCollector, MemorySink};
pub use tokio_util::sync::CancellationToken;
