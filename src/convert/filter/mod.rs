// bimbatch: Parallel DGN/DWG to iModel Batch Conversion Driver
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Re-run filter built from a prior run's report.
//!
//! ```text
//! Output_report.csv  --from_csv()-->  names
//! discovered files   --retain()---->  files whose base name is listed
//!                                     (matched names leave the list)
//! remaining()        ------------->   names that matched nothing
//! ```

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::report::split_record;
use crate::error::{FsError, Result};
use crate::utility::encoding::read_text_file;

/// Column holding file names in a report.
pub const NAME_COLUMN: &str = "Name";

/// Names selected for a re-run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunFilter {
    names: BTreeSet<String>,
}

impl RunFilter {
    /// Builds a filter from explicit names.
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names
                .into_iter()
                .map(Into::into)
                .filter(|n: &String| !n.is_empty())
                .collect(),
        }
    }

    /// Reads names from a CSV file: the `Name` column when the header has
    /// one, otherwise the first column of every line.
    ///
    /// # Errors
    ///
    /// Returns `FsError::NotFound` if the file is missing, or
    /// `FsError::IoError` if it cannot be read.
    pub fn from_csv(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(FsError::NotFound(path.display().to_string()).into());
        }
        let content = read_text_file(path).map_err(|source| FsError::IoError {
            path: path.display().to_string(),
            source,
        })?;
        let filter = Self::parse_csv(&content);
        debug!(path = %path.display(), names = filter.len(), "loaded run filter");
        Ok(filter)
    }

    /// Parses CSV content; see [`RunFilter::from_csv`].
    #[must_use]
    pub fn parse_csv(content: &str) -> Self {
        let mut lines = content.lines().filter(|l| !l.trim().is_empty()).peekable();

        let header_column = lines.peek().and_then(|header| {
            split_record(header)
                .iter()
                .position(|field| field.trim() == NAME_COLUMN)
        });
        let column = match header_column {
            Some(column) => {
                lines.next();
                column
            }
            None => 0,
        };

        Self::from_names(lines.filter_map(|line| {
            split_record(line)
                .into_iter()
                .nth(column)
                .map(|field| field.trim().to_string())
        }))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Keeps only files whose base name is listed. Every matched name is
    /// removed from the filter.
    pub fn retain(&mut self, files: Vec<PathBuf>) -> Vec<PathBuf> {
        let mut matched = BTreeSet::new();
        let kept: Vec<PathBuf> = files
            .into_iter()
            .filter(|path| {
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                if self.names.contains(&name) {
                    matched.insert(name);
                    true
                } else {
                    false
                }
            })
            .collect();

        self.names.retain(|name| !matched.contains(name));
        for name in &self.names {
            warn!(file = %name, "listed in filter but not found");
        }
        kept
    }

    /// Names that matched no file, in name order.
    #[must_use]
    pub fn remaining(&self) -> Vec<String> {
        self.names.iter().cloned().collect()
    }
}
