//! Sink implementations
//!
//! Contains LogSink, MemorySink and JsonlSink.

mod jsonl;
mod log;
mod memory;

pub use self::jsonl::JsonlSink;
pub use self::log::LogSink;
pub use self::memory::{MemoryCollector, MemorySink};
