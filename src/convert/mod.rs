// bimbatch: Parallel DGN/DWG to iModel Batch Conversion Driver
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Batch conversion pipeline.
//!
//! # Architecture
//!
//! ```text
//!  input root
//!      |
//!      v
//!  discovery  .dgn/.dwg, case-insensitive, sorted
//!      |
//!      v
//!  filter     names from a prior Output_report.csv
//!      |
//!      v
//!  profile    ConversionTask --> converter argv
//!      |
//!      v
//!  supervisor Semaphore(worker budget), timeout, cancel
//!      |         |
//!      |         +--> journal (log_file_2.txt)
//!      v
//!  classify   exit code + issues sidecar --> Pass/Fail
//!      |
//!      v
//!  report     Output_report.csv, one row per dispatched task
//! ```
//!
//! # Key Types
//!
//! | Type | Purpose |
//! |------|---------|
//! | [`ConversionTask`] | One input file and where its output goes |
//! | [`ConversionResult`] | Classified outcome, becomes one report row |
//! | [`RunCounters`] | succeeded / failed / crashed tallies |

pub mod classify;
pub mod discovery;
pub mod filter;
pub mod profile;
pub mod report;
pub mod supervisor;


use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use time::OffsetDateTime;

use profile::ConverterArgs;

/// Extension of the converter's output container.
pub const BIM_EXTENSION: &str = "bim";

/// Extension of the compressed output container.
pub const IBIM_EXTENSION: &str = "ibim";

/// Suffix the converter appends to the output file name for its issues log.
pub const ISSUES_SUFFIX: &str = "-issues";

/// One file to convert. Immutable once handed to the supervisor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionTask {
    input: PathBuf,
    output_dir: PathBuf,
    output_path: PathBuf,
    overrides: ConverterArgs,
}

impl ConversionTask {
    /// Creates a task for `input`, mirroring its position below `input_root`
    /// under `output_root`.
    #[must_use]
    pub fn new(input: &Path, input_root: &Path, output_root: &Path, overrides: ConverterArgs) -> Self {
        let relative_dir = input
            .parent()
            .and_then(|p| p.strip_prefix(input_root).ok())
            .unwrap_or_else(|| Path::new(""));
        let output_dir = output_root.join(relative_dir);
        let stem = input
            .file_stem()
            .map_or_else(|| "output".into(), |s| s.to_string_lossy().into_owned());
        let output_path = output_dir.join(format!("{stem}.{BIM_EXTENSION}"));

        Self {
            input: input.to_path_buf(),
            output_dir,
            output_path,
            overrides,
        }
    }

    #[must_use]
    pub fn input(&self) -> &Path {
        &self.input
    }

    #[must_use]
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    #[must_use]
    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    /// Per-file flags that override the global ones.
    #[must_use]
    pub const fn overrides(&self) -> &ConverterArgs {
        &self.overrides
    }

    /// Base name of the input, as written to the report.
    #[must_use]
    pub fn file_name(&self) -> String {
        self.input
            .file_name()
            .map_or_else(String::new, |n| n.to_string_lossy().into_owned())
    }

    /// Candidate issues sidecars, most likely first.
    #[must_use]
    pub fn issues_paths(&self) -> [PathBuf; 2] {
        [
            append_to_file_name(&self.output_path, ISSUES_SUFFIX),
            append_to_file_name(&self.output_path.with_extension(IBIM_EXTENSION), ISSUES_SUFFIX),
        ]
    }
}

fn append_to_file_name(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(suffix);
    path.with_file_name(name)
}

/// Overall verdict for one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Status {
    Pass,
    Fail,
}

impl Status {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pass => "Pass",
            Self::Fail => "Fail",
        }
    }
}

/// Why a file failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FailureCategory {
    /// The converter could not read or transform an EC schema.
    SchemaImportFailure,
    /// The converter died, was killed, or timed out.
    Crash,
    /// Any other non-zero exit.
    GeneralError,
    /// Not a failure.
    None,
}

impl FailureCategory {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::SchemaImportFailure => "SchemaImportFailure",
            Self::Crash => "Crash",
            Self::GeneralError => "GeneralError",
            Self::None => "None",
        }
    }
}

/// Classified outcome of one dispatched task.
#[derive(Debug, Clone)]
pub struct ConversionResult {
    pub timestamp: OffsetDateTime,
    pub file_name: String,
    pub status: Status,
    pub category: FailureCategory,
    /// Report notes: error excerpt or crash reason.
    pub notes: String,
    /// Size of the `.ibim`/`.bim` artifact, `-1` when missing.
    pub output_size: i64,
    pub elapsed: Duration,
}

/// Tallies for one run.
///
/// Every result lands in exactly one of `succeeded`/`failed`; crashes are
/// also counted in `crashed`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunCounters {
    pub succeeded: usize,
    pub failed: usize,
    pub crashed: usize,
}

impl RunCounters {
    /// Adds one result.
    pub const fn record(&mut self, result: &ConversionResult) {
        match result.status {
            Status::Pass => self.succeeded += 1,
            Status::Fail => {
                self.failed += 1;
                if matches!(result.category, FailureCategory::Crash) {
                    self.crashed += 1;
                }
            }
        }
    }

    /// Number of results recorded.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.succeeded + self.failed
    }
}
