//! Raw tag reads and the tag pair they are filtered against.

use serde::{Deserialize, Serialize};

use crate::{ContractError, TagId};

/// One detection reported by the reader.
///
/// `phase` is in the upstream unit (see [`PhaseUnit`]); the rolling buffer
/// converts and normalizes it to degrees in `[0, 360)` on ingestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagReadEvent {
    pub tag_id: TagId,
    /// Producer-assigned timestamp, milliseconds
    pub timestamp_ms: i64,
    /// Channel frequency identifier (MHz or channel index)
    pub channel: f64,
    pub phase: f64,
    pub rssi: f64,
    #[serde(default = "default_read_count")]
    pub read_count: u32,
}

fn default_read_count() -> u32 {
    1
}

impl TagReadEvent {
    pub fn new(
        tag_id: impl Into<TagId>,
        timestamp_ms: i64,
        channel: f64,
        phase: f64,
        rssi: f64,
        read_count: u32,
    ) -> Self {
        Self {
            tag_id: tag_id.into(),
            timestamp_ms,
            channel,
            phase,
            rssi,
            read_count,
        }
    }
}

/// Unit of the `phase` field delivered by the upstream reader
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseUnit {
    #[default]
    Degrees,
    Radians,
}

impl PhaseUnit {
    #[inline]
    pub fn to_degrees(self, value: f64) -> f64 {
        match self {
            PhaseUnit::Degrees => value,
            PhaseUnit::Radians => value.to_degrees(),
        }
    }
}

/// Position of a tag inside its [`TagPair`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TagSlot {
    First,
    Second,
}

impl TagSlot {
    #[inline]
    pub fn index(self) -> usize {
        match self {
            TagSlot::First => 0,
            TagSlot::Second => 1,
        }
    }
}

/// The two tags whose phase difference is tracked.
///
/// Construction guarantees two distinct, non-empty ids. In configuration
/// files it is written as a two-element array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "[String; 2]", into = "[String; 2]")]
pub struct TagPair {
    first: TagId,
    second: TagId,
}

impl TagPair {
    pub fn new(first: impl Into<TagId>, second: impl Into<TagId>) -> Result<Self, ContractError> {
        let first = first.into();
        let second = second.into();
        if first.trim().is_empty() || second.trim().is_empty() {
            return Err(ContractError::invalid_tag_pair("tag ids must not be empty"));
        }
        if first == second {
            return Err(ContractError::invalid_tag_pair(format!(
                "tag ids must differ, both are '{first}'"
            )));
        }
        Ok(Self { first, second })
    }

    pub fn first(&self) -> &TagId {
        &self.first
    }

    pub fn second(&self) -> &TagId {
        &self.second
    }

    pub fn get(&self, slot: TagSlot) -> &TagId {
        match slot {
            TagSlot::First => &self.first,
            TagSlot::Second => &self.second,
        }
    }

    /// Slot of `tag_id`, or `None` for tags outside the pair
    pub fn slot_of(&self, tag_id: &str) -> Option<TagSlot> {
        if self.first == tag_id {
            Some(TagSlot::First)
        } else if self.second == tag_id {
            Some(TagSlot::Second)
        } else {
            None
        }
    }
}

impl TryFrom<[String; 2]> for TagPair {
    type Error = ContractError;

    fn try_from([first, second]: [String; 2]) -> Result<Self, Self::Error> {
        TagPair::new(first, second)
    }
}

impl From<TagPair> for [String; 2] {
    fn from(pair: TagPair) -> Self {
        [pair.first.to_string(), pair.second.to_string()]
    }
}
