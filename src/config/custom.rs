// bimbatch: Parallel DGN/DWG to iModel Batch Conversion Driver
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Per-run custom file (`--custom`).
//!
//! ```toml
//! filter_csv = "previous/Output_report.csv"
//! exclude = ["**/backup/**"]
//!
//! [args]
//! "no-assert-dialogs" = ""
//!
//! [files."big.dgn"]
//! "memory-limit" = "8192"
//! ```
//!
//! Parsed with `toml` directly so file-name keys keep their case.
//! Relative `filter_csv` paths are resolved against the custom file's directory.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::{ConfigError, Result};

/// Flags for the converter, keyed by flag name; empty value = bare flag.
pub type FlagTable = BTreeMap<String, String>;

/// File filter plus extra converter arguments for one run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CustomFile {
    /// Report of a prior run whose `Name` column selects the files to convert.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter_csv: Option<PathBuf>,
    /// Glob patterns (relative to the input root) to leave out.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub exclude: Vec<String>,
    /// Flags added to every conversion, on top of `[converter.args]`.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub args: FlagTable,
    /// Per-file flags keyed by input base name.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub files: BTreeMap<String, FlagTable>,
}

impl CustomFile {
    /// Loads a custom file.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::NotFound` if the file is missing and
    /// `ConfigError::ParseError` if it is not valid TOML for this layout.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(ConfigError::NotFound(path.display().to_string()).into());
        }

        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadError {
            path: path.display().to_string(),
            source,
        })?;
        let parsed: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

        let base = path.parent().unwrap_or_else(|| Path::new("."));
        Ok(parsed.resolved_against(base))
    }

    /// Parses a custom file from a TOML string, resolving paths against `base`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ParseError` if the content does not match.
    pub fn parse(content: &str, base: &Path) -> Result<Self> {
        let parsed: Self = toml::from_str(content).map_err(|e| ConfigError::ParseError {
            path: "<string>".to_string(),
            message: e.to_string(),
        })?;
        Ok(parsed.resolved_against(base))
    }

    fn resolved_against(mut self, base: &Path) -> Self {
        if let Some(csv) = &self.filter_csv
            && csv.is_relative()
        {
            self.filter_csv = Some(base.join(csv));
        }
        self
    }

    /// Flags for one input file, if any were configured.
    #[must_use]
    pub fn flags_for(&self, file_name: &str) -> Option<&FlagTable> {
        self.files.get(file_name)
    }
}
