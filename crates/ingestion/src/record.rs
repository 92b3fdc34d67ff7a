//! Upstream record decoding
//!
//! The reader bridge writes one tag report per line:
//! `epc,timestamp,channel,phase,rssi,readCount`. Recordings may also be
//! JSON Lines of [`TagReadEvent`].

use std::path::Path;

use contracts::{ContractError, TagReadEvent};

const FIELD_COUNT: usize = 6;

/// Line format of a recording
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordFormat {
    Csv,
    Jsonl,
}

impl RecordFormat {
    /// `.jsonl`/`.ndjson`/`.json` are JSON Lines, anything else is CSV
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .as_deref()
        {
            Some("jsonl" | "ndjson" | "json") => Self::Jsonl,
            _ => Self::Csv,
        }
    }
}

/// Decode one upstream text record.
///
/// Spaces inside the EPC are removed (the reader groups hex digits).
/// Timestamps are milliseconds; fractional values are rounded.
///
/// # Errors
/// Wrong field count, empty EPC or unparsable numbers yield
/// [`ContractError::MalformedRecord`].
pub fn parse_line(line: &str) -> Result<TagReadEvent, ContractError> {
    parse_line_at(line, "input")
}

/// [`parse_line`] with a location (file and line number) for the error
pub fn parse_line_at(line: &str, location: &str) -> Result<TagReadEvent, ContractError> {
    let fields: Vec<&str> = line.trim().split(',').map(str::trim).collect();
    if fields.len() != FIELD_COUNT {
        return Err(ContractError::malformed(
            location,
            format!("expected {FIELD_COUNT} fields, found {}", fields.len()),
        ));
    }

    let epc: String = fields[0].split_whitespace().collect();
    if epc.is_empty() {
        return Err(ContractError::malformed(location, "empty epc"));
    }

    let number = |index: usize, name: &str| -> Result<f64, ContractError> {
        fields[index]
            .parse::<f64>()
            .map_err(|e| ContractError::malformed(location, format!("{name} '{}': {e}", fields[index])))
    };

    let timestamp = number(1, "timestamp")?;
    if !timestamp.is_finite() {
        return Err(ContractError::malformed(location, "timestamp is not finite"));
    }
    let channel = number(2, "channel")?;
    let phase = number(3, "phase")?;
    let rssi = number(4, "rssi")?;
    let read_count = fields[5]
        .parse::<u32>()
        .map_err(|e| ContractError::malformed(location, format!("readCount '{}': {e}", fields[5])))?;

    Ok(TagReadEvent::new(
        epc,
        timestamp.round() as i64,
        channel,
        phase,
        rssi,
        read_count,
    ))
}

/// Decode one line of a recording in the given format
pub fn parse_record(
    line: &str,
    format: RecordFormat,
    location: &str,
) -> Result<TagReadEvent, ContractError> {
    match format {
        RecordFormat::Csv => parse_line_at(line, location),
        RecordFormat::Jsonl => serde_json::from_str(line.trim())
            .map_err(|e| ContractError::malformed(location, e.to_string())),
    }
}
