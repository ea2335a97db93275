// bimbatch: Parallel DGN/DWG to iModel Batch Conversion Driver
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Configuration types for bimbatch.
//!
//! # Config Structure
//!
//! ```text
//! Config: RunConfig, ConverterConfig, ReportConfig, LogSettings
//! ProfileSetting: auto (default) | importer | dgnv8
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

use crate::error::ConfigError;
use crate::logging::{LogFormat, LogLevel};

/// Two hours, the wall-clock limit for a single conversion.
pub const DEFAULT_TIMEOUT_SECS: u64 = 2 * 60 * 60;

/// Which command-line dialect the converter speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProfileSetting {
    /// Guess from the executable name.
    #[default]
    Auto,
    /// The iModel importer (`--name value` flags, optional compression).
    Importer,
    /// The straight DgnV8 to iModel converter (`--name=value` flags).
    Dgnv8,
}

impl std::fmt::Display for ProfileSetting {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Auto => write!(f, "auto"),
            Self::Importer => write!(f, "importer"),
            Self::Dgnv8 => write!(f, "dgnv8"),
        }
    }
}

impl std::str::FromStr for ProfileSetting {
    type Err = ConfigError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "importer" => Ok(Self::Importer),
            "dgnv8" => Ok(Self::Dgnv8),
            _ => Err(ConfigError::InvalidValue {
                section: "converter".to_string(),
                key: "profile".to_string(),
                message: format!("expected 'auto', 'importer', or 'dgnv8', got '{s}'"),
            }),
        }
    }
}

/// Scheduling and timeout settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    /// Per-conversion wall-clock timeout in seconds.
    pub timeout_secs: u64,
    /// Fixed worker budget; computed from the CPU count when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_workers: Option<usize>,
    /// CPUs left free for the rest of the machine.
    pub reserved_cpus: usize,
    /// Above this many workers, only half of the extra CPUs are used.
    pub worker_threshold: usize,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_workers: None,
            reserved_cpus: 2,
            worker_threshold: 16,
        }
    }
}

impl RunConfig {
    /// Returns the timeout as a `Duration`.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Worker budget for a machine with `cpus` logical CPUs.
    ///
    /// ```text
    /// budget = max(1, cpus - reserved)
    /// budget > threshold  =>  threshold + (budget - threshold) / 2
    /// ```
    #[must_use]
    pub fn worker_budget(&self, cpus: usize) -> usize {
        if let Some(fixed) = self.max_workers {
            return fixed.max(1);
        }
        let budget = cpus.saturating_sub(self.reserved_cpus).max(1);
        if budget > self.worker_threshold {
            self.worker_threshold + (budget - self.worker_threshold) / 2
        } else {
            budget
        }
    }

    /// Worker budget for the current machine.
    #[must_use]
    pub fn host_worker_budget(&self) -> usize {
        let cpus = std::thread::available_parallelism()
            .map(std::num::NonZeroUsize::get)
            .unwrap_or(4);
        self.worker_budget(cpus)
    }
}

/// Converter selection and global flags.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConverterConfig {
    /// Command-line dialect.
    pub profile: ProfileSetting,
    /// Flags passed to every conversion; an empty value is a bare flag.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub args: BTreeMap<String, String>,
}

/// Output file names, relative to the output directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReportConfig {
    pub report_file: String,
    pub summary_file: String,
    pub diagnostic_log: String,
    pub journal_file: String,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            report_file: "Output_report.csv".to_string(),
            summary_file: "Output_summary.json".to_string(),
            diagnostic_log: "log_file_1.txt".to_string(),
            journal_file: "log_file_2.txt".to_string(),
        }
    }
}

/// Logging settings; CLI flags take precedence.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LogSettings {
    /// Console verbosity (0-6).
    pub console_level: LogLevel,
    /// Diagnostic log file verbosity (0-6).
    pub file_level: LogLevel,
    /// Diagnostic log line format: "text" or "json".
    pub format: LogFormat,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            console_level: LogLevel::INFO,
            file_level: LogLevel::DEBUG,
            format: LogFormat::Text,
        }
    }
}
