// bimbatch: Parallel DGN/DWG to iModel Batch Conversion Driver
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Configuration management for bimbatch.
//!
//! # Configuration Hierarchy
//!
//! ```text
//! Priority (low → high)
//! 1. defaults
//! 2. bimbatch.toml (cwd, optional)
//! 3. --config FILE (repeatable)
//! 4. BIMBATCH_* env vars
//! 5. CLI overrides (--jobs, --timeout, ...)
//! ```
//!
//! # Environment Variable Mapping
//!
//! ```text
//! BIMBATCH_RUN__TIMEOUT_SECS=600      → run.timeout_secs = 600
//! BIMBATCH_RUN__MAX_WORKERS=4         → run.max_workers = 4
//! BIMBATCH_CONVERTER__PROFILE=dgnv8   → converter.profile = "dgnv8"
//! ```
//!
//! The per-run custom file (`--custom`) is separate, see [`custom`].

pub mod custom;
pub mod loader;
pub mod types;

#[cfg(test)]
mod tests;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{ConfigError, Result};

use loader::ConfigLoader;
use types::{ConverterConfig, LogSettings, ReportConfig, RunConfig};

/// Complete application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Scheduling and timeouts.
    pub run: RunConfig,
    /// Converter dialect and global flags.
    pub converter: ConverterConfig,
    /// Output file names.
    pub report: ReportConfig,
    /// Logging verbosity.
    pub log: LogSettings,
}

impl Config {
    /// An empty loader.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use bimbatch::config::Config;
    ///
    /// let config = Config::builder()
    ///     .with_file("site.toml")
    ///     .with_overrides(&[("run.max_workers", "4")])?
    ///     .build()?;
    /// # Ok::<(), anyhow::Error>(())
    /// ```
    #[must_use]
    pub fn builder() -> ConfigLoader {
        ConfigLoader::new()
    }

    /// Loads configuration from a TOML string over the defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the content is not valid TOML, does not match
    /// `Config` or fails validation.
    pub fn parse(content: &str) -> Result<Self> {
        Self::builder().with_toml_str(content).build()
    }

    /// Check values that deserialize fine but make no sense.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` for a zero timeout, a zero worker
    /// budget or an empty output file name.
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.run.timeout_secs == 0 {
            return Err(invalid("run", "timeout_secs", "must be greater than zero"));
        }
        if self.run.max_workers == Some(0) {
            return Err(invalid("run", "max_workers", "must be greater than zero"));
        }
        for (key, value) in [
            ("report_file", &self.report.report_file),
            ("summary_file", &self.report.summary_file),
            ("diagnostic_log", &self.report.diagnostic_log),
            ("journal_file", &self.report.journal_file),
        ] {
            if value.trim().is_empty() {
                return Err(invalid("report", key, "must not be empty"));
            }
        }
        if let Some(name) = self.converter.args.keys().find(|k| k.trim().is_empty()) {
            return Err(invalid(
                "converter",
                "args",
                &format!("flag name {name:?} is empty"),
            ));
        }
        Ok(())
    }

    /// Format configuration options for display.
    ///
    /// Output is deterministically ordered using `BTreeMap`.
    #[must_use]
    pub fn format_options(&self) -> Vec<String> {
        let mut options = BTreeMap::new();

        options.insert("run.timeout_secs".to_string(), self.run.timeout_secs.to_string());
        options.insert(
            "run.max_workers".to_string(),
            self.run
                .max_workers
                .map_or_else(|| "auto".to_string(), |n| n.to_string()),
        );
        options.insert("run.reserved_cpus".to_string(), self.run.reserved_cpus.to_string());
        options.insert(
            "run.worker_threshold".to_string(),
            self.run.worker_threshold.to_string(),
        );
        options.insert(
            "run.worker_budget".to_string(),
            self.run.host_worker_budget().to_string(),
        );

        options.insert(
            "converter.profile".to_string(),
            self.converter.profile.to_string(),
        );
        for (name, value) in &self.converter.args {
            options.insert(format!("converter.args.{name}"), value.clone());
        }

        options.insert("report.report_file".to_string(), self.report.report_file.clone());
        options.insert("report.summary_file".to_string(), self.report.summary_file.clone());
        options.insert(
            "report.diagnostic_log".to_string(),
            self.report.diagnostic_log.clone(),
        );
        options.insert("report.journal_file".to_string(), self.report.journal_file.clone());

        options.insert(
            "log.console_level".to_string(),
            self.log.console_level.as_u8().to_string(),
        );
        options.insert(
            "log.file_level".to_string(),
            self.log.file_level.as_u8().to_string(),
        );
        options.insert("log.format".to_string(), self.log.format.as_str().to_string());

        let max_key_len = options.keys().map(String::len).max().unwrap_or(0);

        options
            .into_iter()
            .map(|(key, value)| format!("{key:<max_key_len$} = {value}"))
            .collect()
    }
}

fn invalid(section: &str, key: &str, message: &str) -> ConfigError {
    ConfigError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        message: message.to_string(),
    }
}
