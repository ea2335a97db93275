// bimbatch: Parallel DGN/DWG to iModel Batch Conversion Driver
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Transition journal (`log_file_2.txt`).
//!
//! ```text
//! 2026-10-17 09:14:02 pending     site/a.dgn
//! 2026-10-17 09:14:02 running     site/a.dgn pid=4121 cmd=DgnV8Converter --input=...
//! 2026-10-17 09:15:40 completed   site/a.dgn exit=0 elapsed=98.2s
//! ```

use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use super::{format_timestamp, now};
use crate::convert::supervisor::TaskState;
use crate::error::ReportError;

/// Append-only, line-per-transition log shared by all workers.
#[derive(Debug)]
pub struct Journal {
    path: PathBuf,
    file: Mutex<File>,
}

/// Renders one journal line, without line terminator.
#[must_use]
pub fn format_line(timestamp: &str, state: TaskState, name: &str, detail: &str) -> String {
    let mut line = format!("{timestamp} {:<11} {name}", state.as_str());
    if !detail.is_empty() {
        line.push(' ');
        line.push_str(detail);
    }
    line
}

impl Journal {
    /// Creates (truncating) the journal.
    ///
    /// # Errors
    ///
    /// Returns `ReportError::CreateFailed` if the file cannot be created.
    pub async fn create(path: &Path) -> Result<Self, ReportError> {
        let file = File::create(path)
            .await
            .map_err(|source| ReportError::CreateFailed {
                path: path.display().to_string(),
                source,
            })?;
        Ok(Self {
            path: path.to_path_buf(),
            file: Mutex::new(file),
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends one transition and flushes it.
    ///
    /// # Errors
    ///
    /// Returns `ReportError::WriteFailed` on any write error.
    pub async fn record(
        &self,
        name: &str,
        state: TaskState,
        detail: &str,
    ) -> Result<(), ReportError> {
        let line = format_line(&format_timestamp(now()), state, name, detail);
        let mut file = self.file.lock().await;
        let write_failed = |source| ReportError::WriteFailed {
            path: self.path.display().to_string(),
            source,
        };
        file.write_all(format!("{line}\n").as_bytes())
            .await
            .map_err(write_failed)?;
        file.flush().await.map_err(write_failed)
    }
}
