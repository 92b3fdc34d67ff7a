//! # Phase Engine
//!
//! Differential phase estimation for a pair of RFID tags.
//!
//! 负责：
//! - 过滤并缓存标签读数 (rolling store)
//! - 相位折叠 / 展开
//! - DTW 弹性对齐与线性插值对齐
//! - 滑动时间窗口差分 (offline sweep)
//! - 逐事件的实时差分 (live engine)
//!
//! ## 使用示例
//!
//! ```ignore
//! use phase_engine::{PhaseEngine, DifferencerConfig, BufferConfig};
//!
//! let mut engine = PhaseEngine::new(differencer_config, &BufferConfig::default())?;
//!
//! // Push events as they arrive
//! if let Some(sample) = engine.push(&event) {
//!     // Hand the sample to the batcher
//! }
//! ```

mod aligner;
mod buffer;
mod differencer;
mod dtw;
mod engine;
mod interp;
mod readout;
mod wrap;

pub use aligner::{build_aligner, Aligner, ElasticAligner, InterpolationAligner, SequentialAligner, SeriesView};
pub use buffer::{Rejection, RollingStore, SharedStore, StoreStats};
pub use differencer::{WindowSweep, WindowedDifferencer};
pub use dtw::{dtw, DtwAlignment};
pub use engine::{EngineStats, PhaseEngine};
pub use interp::{interp_clamped, interpolate_onto};
pub use readout::{Readout, SensorReadout};
pub use wrap::{fold_to_minimal, normalize_degrees, unwrap};

// Re-export contracts types
pub use contracts::{
    AlignedPair, AlignmentMode, BufferConfig, DifferencerConfig, MetricSample, SignalKind,
    TagPair, TagReadEvent, TagSnapshot,
};
