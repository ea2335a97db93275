// bimbatch: Parallel DGN/DWG to iModel Batch Conversion Driver
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Run artifacts written to the output directory.
//!
//! ```text
//! Output_report.csv    ReportWriter   one row per dispatched task
//! log_file_2.txt       Journal        one line per state transition
//! Output_summary.json  RunSummary     written once, atomically
//! ```
//!
//! Both writers hold their file behind a `tokio::sync::Mutex` and flush
//! after every line, so a crashed run still leaves complete rows behind.

pub mod journal;

#[cfg(test)]
mod tests;

use serde::Serialize;
use std::borrow::Cow;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use time::OffsetDateTime;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use super::{ConversionResult, RunCounters};
use crate::error::ReportError;

pub use journal::Journal;

/// CSV header of the report.
pub const REPORT_HEADER: &str = "Date,Name,Result,Notes,bim_size";

const TIMESTAMP_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");

/// Current local time, or UTC when the local offset cannot be determined.
#[must_use]
pub fn now() -> OffsetDateTime {
    OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc())
}

/// Formats a timestamp as `YYYY-MM-DD HH:MM:SS`.
#[must_use]
pub fn format_timestamp(timestamp: OffsetDateTime) -> String {
    timestamp.format(TIMESTAMP_FORMAT).unwrap_or_default()
}

/// Quotes a CSV field if it contains a delimiter, quote or line break.
#[must_use]
pub fn quote_field(field: &str) -> Cow<'_, str> {
    if field.contains([',', '"', '\n', '\r']) {
        Cow::Owned(format!("\"{}\"", field.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(field)
    }
}

/// Splits one CSV record, honouring double-quoted fields.
#[must_use]
pub fn split_record(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match (c, in_quotes) {
            ('"', true) if chars.peek() == Some(&'"') => {
                field.push('"');
                chars.next();
            }
            ('"', _) => in_quotes = !in_quotes,
            (',', false) => fields.push(std::mem::take(&mut field)),
            _ => field.push(c),
        }
    }
    fields.push(field);
    fields
}

/// Renders one result as a report row, without line terminator.
#[must_use]
pub fn format_row(result: &ConversionResult) -> String {
    let date = format_timestamp(result.timestamp);
    [
        quote_field(&date),
        quote_field(&result.file_name),
        Cow::Borrowed(result.status.as_str()),
        quote_field(&result.notes),
        Cow::Owned(result.output_size.to_string()),
    ]
    .join(",")
}

/// Append-only CSV report.
#[derive(Debug)]
pub struct ReportWriter {
    path: PathBuf,
    file: Mutex<File>,
}

impl ReportWriter {
    /// Creates (truncating) the report and writes the header.
    ///
    /// # Errors
    ///
    /// Returns `ReportError::CreateFailed` if the file cannot be created.
    pub async fn create(path: &Path) -> Result<Self, ReportError> {
        let create_failed = |source| ReportError::CreateFailed {
            path: path.display().to_string(),
            source,
        };

        let mut file = File::create(path).await.map_err(create_failed)?;
        file.write_all(format!("{REPORT_HEADER}\n").as_bytes())
            .await
            .map_err(create_failed)?;
        file.flush().await.map_err(create_failed)?;

        Ok(Self {
            path: path.to_path_buf(),
            file: Mutex::new(file),
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends one row and flushes it.
    ///
    /// # Errors
    ///
    /// Returns `ReportError::WriteFailed` on any write error.
    pub async fn append(&self, result: &ConversionResult) -> Result<(), ReportError> {
        let line = format!("{}\n", format_row(result));
        let mut file = self.file.lock().await;
        let write_failed = |source| ReportError::WriteFailed {
            path: self.path.display().to_string(),
            source,
        };
        file.write_all(line.as_bytes()).await.map_err(write_failed)?;
        file.flush().await.map_err(write_failed)
    }
}

/// End-of-run summary, written as `Output_summary.json`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub converter: String,
    pub profile: String,
    pub input: PathBuf,
    pub output: PathBuf,
    pub discovered: usize,
    pub excluded: usize,
    pub dispatched: usize,
    #[serde(flatten)]
    pub counters: RunCounters,
    /// Tasks never admitted because the run was interrupted.
    pub skipped: usize,
    /// Filter names that matched no discovered file.
    pub not_found: Vec<String>,
    pub worker_budget: usize,
    pub peak_concurrency: usize,
    pub interrupted: bool,
    pub elapsed_secs: f64,
}

impl RunSummary {
    /// Writes the summary as pretty JSON, replacing `path` atomically.
    ///
    /// # Errors
    ///
    /// Returns `ReportError::WriteFailed` if the file cannot be written.
    pub fn write(&self, path: &Path) -> Result<(), ReportError> {
        let write_failed = |source| ReportError::WriteFailed {
            path: path.display().to_string(),
            source,
        };
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));

        let mut temp = tempfile::NamedTempFile::new_in(dir).map_err(write_failed)?;
        serde_json::to_writer_pretty(&mut temp, self)
            .map_err(|e| write_failed(std::io::Error::other(e)))?;
        temp.write_all(b"\n").map_err(write_failed)?;
        temp.persist(path).map_err(|e| write_failed(e.error))?;
        Ok(())
    }
}
