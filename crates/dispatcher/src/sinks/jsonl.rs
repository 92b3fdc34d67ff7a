//! JsonlSink - appends samples to a JSON Lines file

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use contracts::{ContractError, MetricBatch, MetricSink};
use serde::Serialize;
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, instrument};

#[derive(Serialize)]
struct SampleLine {
    seq: u64,
    value: f64,
    timestamp_s: f64,
}

/// Sink that writes one JSON object per sample.
///
/// Params: `path` (required), `append` (`true` by default; `false` truncates).
pub struct JsonlSink {
    name: String,
    path: PathBuf,
    writer: BufWriter<File>,
    line: Vec<u8>,
}

impl JsonlSink {
    pub async fn create(
        name: impl Into<String>,
        path: impl AsRef<Path>,
        append: bool,
    ) -> std::io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .append(append)
            .truncate(!append)
            .open(&path)
            .await?;

        Ok(Self {
            name: name.into(),
            path,
            writer: BufWriter::new(file),
            line: Vec::with_capacity(96),
        })
    }

    /// Create from params map (for factory)
    pub async fn from_params(
        name: impl Into<String>,
        params: &HashMap<String, String>,
    ) -> std::io::Result<Self> {
        let path = params.get("path").ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "jsonl sink requires params.path")
        })?;
        let append = params
            .get("append")
            .map(|v| !v.eq_ignore_ascii_case("false"))
            .unwrap_or(true);
        Self::create(name, path, append).await
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, e: impl std::fmt::Display) -> ContractError {
        ContractError::sink_write(&self.name, format!("{}: {e}", self.path.display()))
    }
}

impl MetricSink for JsonlSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "jsonl_sink_write",
        skip(self, batch),
        fields(sink = %self.name, seq = batch.seq, samples = batch.len())
    )]
    async fn write(&mut self, batch: &MetricBatch) -> Result<(), ContractError> {
        for sample in &batch.samples {
            self.line.clear();
            let record = SampleLine {
                seq: batch.seq,
                value: sample.value,
                timestamp_s: sample.timestamp_s,
            };
            serde_json::to_writer(&mut self.line, &record).map_err(|e| self.io_error(e))?;
            self.line.push(b'\n');
            if let Err(e) = self.writer.write_all(&self.line).await {
                return Err(self.io_error(e));
            }
        }
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), ContractError> {
        if let Err(e) = self.writer.flush().await {
            return Err(self.io_error(e));
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<(), ContractError> {
        self.flush().await?;
        debug!(sink = %self.name, path = %self.path.display(), "JsonlSink closed");
        Ok(())
    }
}
