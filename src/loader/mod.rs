//! Series loading from per-source CSV files.
//!
//! Maps a raw record set onto a canonical `(timestamp, value)` [`Series`]
//! using the column names and timestamp format of a [`Dialect`].

use crate::core::{Dialect, Series, SeriesBuilder, ValueType};
use crate::error::{AnomalyError, Result};
use chrono::NaiveDateTime;
use std::fs;
use std::path::Path;
use tracing::debug;

/// Timestamp layout accepted for every dialect in addition to its own.
const ISO_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Loads one series per CSV file.
#[derive(Debug, Clone, Copy)]
pub struct SeriesLoader {
    dialect: Dialect,
    value_type: ValueType,
}

impl SeriesLoader {
    pub fn new(dialect: Dialect, value_type: ValueType) -> Self {
        Self {
            dialect,
            value_type,
        }
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn value_type(&self) -> ValueType {
        self.value_type
    }

    /// Load a file; the series id is the file stem.
    pub fn load_path(&self, path: &Path) -> Result<Series> {
        let content = fs::read_to_string(path)?;
        let id = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.load_str(&id, &content)
    }

    /// Parse CSV text into a series sorted by timestamp.
    pub fn load_str(&self, id: &str, content: &str) -> Result<Series> {
        let delimiter = sniff_delimiter(content, self.dialect.delimiter());
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(content.as_bytes());

        let headers = reader.headers()?.clone();
        let ts_idx = self.column_index(&headers, self.dialect.timestamp_column())?;
        let value_idx = self.column_index(&headers, self.dialect.value_column(self.value_type))?;

        let mut builder = SeriesBuilder::new(id);
        let mut skipped = 0usize;

        for (row, record) in reader.records().enumerate() {
            let record = record?;
            // Header is line 1.
            let line = row + 2;

            let raw_ts = record.get(ts_idx).unwrap_or("");
            let timestamp = parse_timestamp(raw_ts, self.dialect.timestamp_format()).ok_or_else(
                || {
                    AnomalyError::Parse(format!(
                        "line {}: timestamp '{}' does not match {}",
                        line,
                        raw_ts,
                        self.dialect.timestamp_format()
                    ))
                },
            )?;

            let raw_value = record.get(value_idx).unwrap_or("");
            match parse_value(raw_value) {
                Ok(Some(value)) => builder.push(timestamp, value),
                Ok(None) => skipped += 1,
                Err(()) => {
                    return Err(AnomalyError::Parse(format!(
                        "line {}: value '{}' is not a number",
                        line, raw_value
                    )))
                }
            }
        }

        if skipped > 0 {
            debug!(series = id, skipped, "dropped rows with missing readings");
        }

        Ok(builder.build())
    }

    fn column_index(&self, headers: &csv::StringRecord, column: &str) -> Result<usize> {
        headers
            .iter()
            .position(|h| h.trim_start_matches('\u{feff}') == column)
            .ok_or_else(|| AnomalyError::Schema {
                column: column.to_string(),
                dialect: self.dialect.to_string(),
            })
    }
}

/// Pick the dialect delimiter unless the header line clearly uses the other one.
fn sniff_delimiter(content: &str, preferred: u8) -> u8 {
    let header = content.lines().next().unwrap_or("");
    let preferred_char = preferred as char;
    if header.contains(preferred_char) {
        return preferred;
    }
    match preferred {
        b';' if header.contains(',') => b',',
        b',' if header.contains(';') => b';',
        _ => preferred,
    }
}

fn parse_timestamp(raw: &str, format: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw, format)
        .or_else(|_| NaiveDateTime::parse_from_str(raw, ISO_FORMAT))
        .ok()
}

/// `Ok(None)` marks a missing reading.
fn parse_value(raw: &str) -> std::result::Result<Option<f64>, ()> {
    if raw.is_empty() {
        return Ok(None);
    }
    match raw.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(Some(v)),
        Ok(_) => Ok(None),
        Err(_) => Err(()),
    }
}
