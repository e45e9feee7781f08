// src/export.rs
//
// CSV output for logged measurements.
// Two shapes share one wire format: a full-table export with the operator
// columns (GUI-style), and a streaming appender without the location
// column for the headless batch logger. Column order is fixed — downstream
// analysis notebooks index by position.

use std::fs::{File, OpenOptions};
use std::path::Path;

use crate::error::LinkError;
use crate::store::LogRow;

/// Column order for full-table export.
pub const EXPORT_COLUMNS: [&str; 10] = [
    "pc_time_iso",
    "location",
    "notes",
    "arduino_ms",
    "dur_ms",
    "mean_rssi_dbm",
    "std_rssi_db",
    "n_samples",
    "min_rssi_dbm",
    "max_rssi_dbm",
];

/// Column order for the batch logger (notes trail the numeric columns,
/// no location column).
pub const BATCH_COLUMNS: [&str; 9] = [
    "pc_time_iso",
    "arduino_ms",
    "dur_ms",
    "mean_rssi_dbm",
    "std_rssi_db",
    "n_samples",
    "min_rssi_dbm",
    "max_rssi_dbm",
    "notes",
];

fn int_cell(value: Option<i64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn float_cell(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

/// Write the full table to `path`: a header plus one record per row,
/// absent numeric fields as empty cells. Truncates any existing file.
/// A mid-write failure is reported as a single export failure; the
/// previous file contents are not preserved.
pub fn export_rows(path: &Path, rows: &[LogRow]) -> Result<(), LinkError> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(EXPORT_COLUMNS)?;
    for row in rows {
        writer.write_record([
            row.pc_time.clone(),
            row.location.clone(),
            row.notes.clone(),
            int_cell(row.record.arduino_ms),
            int_cell(row.record.dur_ms),
            float_cell(row.record.mean),
            float_cell(row.record.std),
            int_cell(row.record.n),
            int_cell(row.record.min),
            int_cell(row.record.max),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

/// Append-mode CSV writer for the batch logger.
/// Writes the header only when the target file is missing or empty, then
/// appends one record per accepted line, flushing after each so a crash
/// loses at most the in-flight row.
pub struct CsvAppender {
    writer: csv::Writer<File>,
}

impl CsvAppender {
    pub fn open(path: &Path) -> Result<Self, LinkError> {
        let need_header = std::fs::metadata(path).map(|m| m.len() == 0).unwrap_or(true);
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        if need_header {
            writer.write_record(BATCH_COLUMNS)?;
            writer.flush()?;
        }
        Ok(Self { writer })
    }

    pub fn append(&mut self, row: &LogRow) -> Result<(), LinkError> {
        self.writer.write_record([
            row.pc_time.clone(),
            int_cell(row.record.arduino_ms),
            int_cell(row.record.dur_ms),
            float_cell(row.record.mean),
            float_cell(row.record.std),
            int_cell(row.record.n),
            int_cell(row.record.min),
            int_cell(row.record.max),
            row.notes.clone(),
        ])?;
        self.writer.flush()?;
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
