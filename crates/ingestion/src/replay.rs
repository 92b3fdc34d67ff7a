//! Recorded-file replay source

use std::fs::File;
use std::io::{BufRead, BufReader, Seek};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use contracts::{ContractError, EventSource, SourceConfig, SourceEvent, TagReadEvent};
use tracing::{debug, info, warn};

use crate::error::{IngestionError, Result};
use crate::metrics::IngestionMetrics;
use crate::record::{parse_record, RecordFormat};

/// Replays a CSV or JSON Lines recording through the [`EventSource`]
/// interface.
///
/// With `speed > 0` the gaps between event timestamps are reproduced in wall
/// time, scaled by `speed`. With looping enabled, every pass is shifted past
/// the previous one so timestamps keep increasing.
pub struct ReplaySource {
    name: String,
    path: PathBuf,
    format: RecordFormat,
    reader: BufReader<File>,
    line: String,
    line_no: usize,
    speed: f64,
    loop_playback: bool,
    pass_span: Option<(i64, i64)>,
    offset_ms: i64,
    clock: Option<(Instant, i64)>,
    metrics: Arc<IngestionMetrics>,
}

impl ReplaySource {
    /// Open a recording; the format follows the file extension
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let format = RecordFormat::from_path(path);
        Self::open_with_format(path, format)
    }

    pub fn open_with_format(path: impl AsRef<Path>, format: RecordFormat) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path).map_err(|source| IngestionError::Open {
            path: path.clone(),
            source,
        })?;
        let name = format!(
            "replay:{}",
            path.file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string())
        );

        Ok(Self {
            name,
            path,
            format,
            reader: BufReader::new(file),
            line: String::new(),
            line_no: 0,
            speed: 0.0,
            loop_playback: false,
            pass_span: None,
            offset_ms: 0,
            clock: None,
            metrics: Arc::new(IngestionMetrics::new()),
        })
    }

    /// Build from the `source` section of a blueprint
    pub fn from_config(config: &SourceConfig) -> Result<Self> {
        let path = config
            .path
            .as_ref()
            .ok_or_else(|| IngestionError::invalid_config("replay source requires a path"))?;
        if !config.speed.is_finite() || config.speed < 0.0 {
            return Err(IngestionError::invalid_config(format!(
                "replay speed must be >= 0, got {}",
                config.speed
            )));
        }
        Ok(Self::open(path)?
            .with_speed(config.speed)
            .with_loop(config.loop_playback))
    }

    /// Playback speed multiplier; `0` disables pacing
    pub fn with_speed(mut self, speed: f64) -> Self {
        self.speed = speed.max(0.0);
        self
    }

    pub fn with_loop(mut self, loop_playback: bool) -> Self {
        self.loop_playback = loop_playback;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<IngestionMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn metrics(&self) -> Arc<IngestionMetrics> {
        self.metrics.clone()
    }

    /// Read every remaining event, skipping malformed lines.
    ///
    /// Looping is ignored here; one pass is read.
    pub fn read_all(mut self) -> std::result::Result<Vec<TagReadEvent>, ContractError> {
        self.loop_playback = false;
        self.speed = 0.0;
        let mut events = Vec::new();
        while let SourceEvent::Event(event) = self.next_event()? {
            events.push(event);
        }
        Ok(events)
    }

    /// Start the next pass, or report that playback is over
    fn rewind(&mut self) -> Result<bool> {
        self.metrics.record_pass();
        let Some((first, last)) = self.pass_span.take() else {
            return Ok(false);
        };
        if !self.loop_playback {
            return Ok(false);
        }

        self.reader.rewind().map_err(|source| IngestionError::Read {
            path: self.path.clone(),
            source,
        })?;
        self.line_no = 0;
        self.offset_ms += last - first + 1;
        debug!(source = %self.name, offset_ms = self.offset_ms, "replay restarted");
        Ok(true)
    }

    fn pace(&mut self, timestamp_ms: i64) {
        if self.speed <= 0.0 {
            return;
        }
        match self.clock {
            None => self.clock = Some((Instant::now(), timestamp_ms)),
            Some((start, origin_ms)) => {
                let offset_s = (timestamp_ms - origin_ms).max(0) as f64 / 1000.0;
                let due = Duration::from_secs_f64(offset_s / self.speed);
                let elapsed = start.elapsed();
                if due > elapsed {
                    std::thread::sleep(due - elapsed);
                }
            }
        }
    }

    fn is_header(&self) -> bool {
        self.line_no == 1
            && self.format == RecordFormat::Csv
            && self.line.trim_start().to_ascii_lowercase().starts_with("epc")
    }
}

impl EventSource for ReplaySource {
    fn name(&self) -> &str {
        &self.name
    }

    fn next_event(&mut self) -> std::result::Result<SourceEvent, ContractError> {
        loop {
            self.line.clear();
            let read = self
                .reader
                .read_line(&mut self.line)
                .map_err(|source| IngestionError::Read {
                    path: self.path.clone(),
                    source,
                })?;

            if read == 0 {
                if self.rewind()? {
                    continue;
                }
                info!(
                    source = %self.name,
                    events = self.metrics.snapshot().events_emitted,
                    "replay finished"
                );
                return Ok(SourceEvent::EndOfStream);
            }

            self.line_no += 1;
            let trimmed = self.line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') || self.is_header() {
                continue;
            }

            let location = format!("{}:{}", self.path.display(), self.line_no);
            let mut event = match parse_record(trimmed, self.format, &location) {
                Ok(event) => event,
                Err(e) => {
                    warn!(source = %self.name, error = %e, "skipping malformed record");
                    self.metrics.record_malformed();
                    observability::metrics::record_malformed_record(&self.name);
                    continue;
                }
            };

            let raw = event.timestamp_ms;
            self.pass_span = Some(match self.pass_span {
                Some((first, last)) => (first.min(raw), last.max(raw)),
                None => (raw, raw),
            });
            event.timestamp_ms += self.offset_ms;

            self.pace(event.timestamp_ms);
            self.metrics.record_emitted();
            return Ok(SourceEvent::Event(event));
        }
    }
}
