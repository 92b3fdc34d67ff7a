//! Read-only views of buffered tag reads.
//!
//! `TagSnapshot` is the export shape handed to persistence collaborators:
//! `{tag_id -> {timestamps, channels, phases, rssis, readCounts}}`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::TagId;

/// Parallel arrays of every buffered read for one tag, in arrival order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TagSeries {
    pub timestamps: Vec<i64>,
    pub channels: Vec<f64>,
    /// Degrees in `[0, 360)`
    pub phases: Vec<f64>,
    pub rssis: Vec<f64>,
    #[serde(rename = "readCounts")]
    pub read_counts: Vec<u32>,
}

impl TagSeries {
    pub fn push(&mut self, timestamp_ms: i64, channel: f64, phase: f64, rssi: f64, read_count: u32) {
        self.timestamps.push(timestamp_ms);
        self.channels.push(channel);
        self.phases.push(phase);
        self.rssis.push(rssi);
        self.read_counts.push(read_count);
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn first_timestamp(&self) -> Option<i64> {
        self.timestamps.first().copied()
    }

    pub fn last_timestamp(&self) -> Option<i64> {
        self.timestamps.last().copied()
    }

    /// Records with `start_ms <= t < end_ms`, order preserved
    pub fn window(&self, start_ms: f64, end_ms: f64) -> TagSeries {
        let mut out = TagSeries::default();
        for i in 0..self.len() {
            let t = self.timestamps[i] as f64;
            if t >= start_ms && t < end_ms {
                out.push(
                    self.timestamps[i],
                    self.channels[i],
                    self.phases[i],
                    self.rssis[i],
                    self.read_counts[i],
                );
            }
        }
        out
    }

    /// Groups reads by channel.
    ///
    /// Channels come back in ascending order; reads inside a channel keep
    /// their arrival order.
    pub fn by_channel(&self) -> Vec<ChannelSeries> {
        let mut groups: Vec<ChannelSeries> = Vec::new();
        for i in 0..self.len() {
            let channel = self.channels[i];
            let pos = match groups.iter().position(|g| g.channel == channel) {
                Some(pos) => pos,
                None => {
                    groups.push(ChannelSeries::new(channel));
                    groups.len() - 1
                }
            };
            let group = &mut groups[pos];
            group.timestamps.push(self.timestamps[i]);
            group.phases.push(self.phases[i]);
            group.rssis.push(self.rssis[i]);
        }
        groups.sort_by(|a, b| a.channel.total_cmp(&b.channel));
        groups
    }
}

/// Reads of one tag on one channel.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChannelSeries {
    pub channel: f64,
    pub timestamps: Vec<i64>,
    pub phases: Vec<f64>,
    pub rssis: Vec<f64>,
}

impl ChannelSeries {
    pub fn new(channel: f64) -> Self {
        Self {
            channel,
            ..Default::default()
        }
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }
}

/// Snapshot of the rolling store, one entry per tag of the pair that has data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TagSnapshot {
    pub tags: BTreeMap<TagId, TagSeries>,
}

impl TagSnapshot {
    pub fn get(&self, tag_id: &str) -> Option<&TagSeries> {
        self.tags.get(tag_id)
    }

    pub fn total_records(&self) -> usize {
        self.tags.values().map(TagSeries::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total_records() == 0
    }

    /// Subset of every tag restricted to `start_ms <= t < end_ms`.
    ///
    /// Tags left without records are dropped from the result.
    pub fn between(&self, start_ms: i64, end_ms: i64) -> TagSnapshot {
        let tags = self
            .tags
            .iter()
            .map(|(id, series)| (id.clone(), series.window(start_ms as f64, end_ms as f64)))
            .filter(|(_, series)| !series.is_empty())
            .collect();
        TagSnapshot { tags }
    }
}
