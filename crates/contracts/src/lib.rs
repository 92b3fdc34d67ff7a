//! # Contracts
//!
//! Shared data model and interface contracts for the diffz workspace.
//! Every other crate depends on this one; it depends on none of them.
//!
//! ## Time Model
//! - Events carry producer-assigned timestamps in integer milliseconds
//! - Emitted metric samples carry timestamps in seconds (f64)
//! - Phase values are stored in degrees, normalized to `[0, 360)`

mod blueprint;
mod config;
mod error;
mod event;
mod metric;
mod sink;
mod snapshot;
mod source;
mod tag_id;

pub use blueprint::*;
pub use config::*;
pub use error::*;
pub use event::*;
pub use metric::*;
pub use sink::*;
pub use snapshot::*;
pub use source::{EventSource, SourceEvent};
pub use tag_id::TagId;
