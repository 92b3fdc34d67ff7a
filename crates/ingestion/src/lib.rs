//! # Ingestion
//!
//! Tag read sources for the streaming pipeline.
//!
//! Responsibilities:
//! - Decode upstream reader records (`epc,timestamp,channel,phase,rssi,readCount`)
//! - Replay recorded CSV / JSON Lines files, optionally paced in wall time
//! - Generate synthetic tag pair reads for tests and demos
//!
//! Every source implements [`contracts::EventSource`]; the producer thread
//! pulls from it one event at a time.
//!
//! ## Usage Example
//!
//! ```ignore
//! use ingestion::build_source;
//!
//! let mut source = build_source(&blueprint.source, &blueprint.differencer.tag_pair)?;
//! while let SourceEvent::Event(event) = source.next_event()? {
//!     // push into the engine
//! }
//! ```

mod error;
mod metrics;
mod mock;
mod record;
mod replay;

use contracts::{EventSource, SourceConfig, SourceKind, TagPair};
use tracing::info;

// Re-exports
pub use contracts::{SourceEvent, TagReadEvent};
pub use error::{IngestionError, Result};
pub use metrics::{IngestionMetrics, MetricsSnapshot};
pub use mock::MockTagSource;
pub use record::{parse_line, parse_line_at, parse_record, RecordFormat};
pub use replay::ReplaySource;

/// Build the source described by a blueprint's `source` section
pub fn build_source(config: &SourceConfig, pair: &TagPair) -> Result<Box<dyn EventSource>> {
    let source: Box<dyn EventSource> = match config.kind {
        SourceKind::Mock => Box::new(MockTagSource::new(pair.clone(), config.mock.clone())?),
        SourceKind::Replay => Box::new(ReplaySource::from_config(config)?),
    };
    info!(source = source.name(), kind = ?config.kind, "event source ready");
    Ok(source)
}
