//! EventSource trait - pull interface over the reader collaborator
//!
//! The reader connection, its vendor protocol and any recording format stay
//! behind this trait. The streaming producer only ever asks for the next
//! event.

use crate::{ContractError, TagReadEvent};

/// Result of one pull from an [`EventSource`]
#[derive(Debug, Clone, PartialEq)]
pub enum SourceEvent {
    Event(TagReadEvent),
    /// Normal terminal condition, including upstream timeouts
    EndOfStream,
}

/// Blocking source of tag reads.
///
/// Called from the dedicated producer thread, so implementations may block
/// on I/O. Malformed upstream records should be logged and skipped inside
/// the source; an `Err` is treated by the caller as a disconnection.
pub trait EventSource: Send {
    /// Source name (used for logging)
    fn name(&self) -> &str;

    fn next_event(&mut self) -> Result<SourceEvent, ContractError>;
}

impl<S: EventSource + ?Sized> EventSource for Box<S> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn next_event(&mut self) -> Result<SourceEvent, ContractError> {
        (**self).next_event()
    }
}
