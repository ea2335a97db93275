// bimbatch: Parallel DGN/DWG to iModel Batch Conversion Driver
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Result classification.
//!
//! ```text
//! ProcessOutput + issues sidecar
//!     |
//!     1. timed out / interrupted / signal exit code   --> Fail, Crash
//!     2. schema marker in issues (any exit code)      --> Fail, SchemaImportFailure
//!     3. exit code 0                                  --> Pass
//!     4. anything else                                --> Fail, GeneralError
//! ```
//!
//! GeneralError notes come from the last `Error`/`Fatal` in the issues file
//! (to the end of that line), then the last stderr line, then the exit code.

use std::path::Path;
use tracing::debug;

use super::{ConversionTask, FailureCategory, IBIM_EXTENSION, Status};
use crate::core::process::builder::{ProcessOutput, Termination};
use crate::utility::encoding::read_text_file;

/// Issues-file phrases that mark a schema import failure.
pub const SCHEMA_MARKERS: [&str; 3] = [
    "Failed to deserialize",
    "Failed to import ECSchema",
    "Failed to transform",
];

/// Longest excerpt copied into the report, in characters.
pub const MAX_EXCERPT_CHARS: usize = 512;

/// Verdict for one finished conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub status: Status,
    pub category: FailureCategory,
    /// Text for the report's `Notes` column.
    pub notes: String,
}

impl Classification {
    const fn pass() -> Self {
        Self {
            status: Status::Pass,
            category: FailureCategory::None,
            notes: String::new(),
        }
    }

    const fn fail(category: FailureCategory, notes: String) -> Self {
        Self {
            status: Status::Fail,
            category,
            notes,
        }
    }

    /// Verdict for a converter that could not be started at all.
    #[must_use]
    pub fn spawn_failed(error: &dyn std::error::Error) -> Self {
        Self::fail(
            FailureCategory::GeneralError,
            cap_excerpt(&format!("failed to start converter: {error}")),
        )
    }

    /// Verdict for a converter whose exit status could not be collected.
    #[must_use]
    pub fn wait_failed(error: &std::io::Error) -> Self {
        Self::fail(
            FailureCategory::Crash,
            cap_excerpt(&format!("Crash: lost track of converter: {error}")),
        )
    }
}

/// Exit codes that mean the converter died instead of reporting an error.
///
/// Negative codes are signal deaths reported by this process; 129..=254
/// follows the shell's "128 + signal" convention; 255 is an abort.
#[must_use]
pub const fn is_crash_exit_code(code: i32) -> bool {
    code < 0 || matches!(code, 129..=255)
}

/// Classifies one finished conversion.
#[must_use]
pub fn classify(output: &ProcessOutput, issues: Option<&str>) -> Classification {
    match output.termination() {
        Termination::TimedOut => {
            return Classification::fail(
                FailureCategory::Crash,
                format!("Crash: timed out after {}s", output.elapsed().as_secs()),
            );
        }
        Termination::Interrupted => {
            return Classification::fail(FailureCategory::Crash, "Crash: interrupted".into());
        }
        Termination::Exited => {}
    }

    let code = output.exit_code();
    if is_crash_exit_code(code) {
        return Classification::fail(FailureCategory::Crash, "Crash".into());
    }

    if let Some(line) = issues.and_then(schema_failure_line) {
        return Classification::fail(
            FailureCategory::SchemaImportFailure,
            format!("Schema import failure: {}", cap_excerpt(line)),
        );
    }

    if code == 0 {
        return Classification::pass();
    }

    let excerpt = issues
        .and_then(last_error_excerpt)
        .or_else(|| last_nonempty_line(output.stderr()))
        .map_or_else(|| format!("exit code {code}"), cap_excerpt);
    Classification::fail(FailureCategory::GeneralError, excerpt)
}

/// First issues line that names a schema import failure.
#[must_use]
pub fn schema_failure_line(issues: &str) -> Option<&str> {
    issues
        .lines()
        .find(|line| SCHEMA_MARKERS.iter().any(|marker| line.contains(marker)))
}

/// Text from the last `Error` or `Fatal` to the end of its line.
#[must_use]
pub fn last_error_excerpt(issues: &str) -> Option<&str> {
    let start = issues.rfind("Error").max(issues.rfind("Fatal"))?;
    let rest = &issues[start..];
    let end = rest.find(['\r', '\n']).unwrap_or(rest.len());
    Some(&rest[..end])
}

fn last_nonempty_line(text: &str) -> Option<&str> {
    text.lines().rev().map(str::trim).find(|line| !line.is_empty())
}

/// Trims and caps an excerpt at [`MAX_EXCERPT_CHARS`].
#[must_use]
pub fn cap_excerpt(text: &str) -> String {
    let trimmed = text.trim();
    match trimmed.char_indices().nth(MAX_EXCERPT_CHARS) {
        Some((cut, _)) => trimmed[..cut].to_string(),
        None => trimmed.to_string(),
    }
}

/// Reads the first issues sidecar that exists for `task`.
#[must_use]
pub fn read_issues(task: &ConversionTask) -> Option<String> {
    task.issues_paths().iter().find(|p| p.is_file()).and_then(|path| {
        read_text_file(path)
            .inspect_err(|e| debug!(path = %path.display(), error = %e, "unreadable issues file"))
            .ok()
    })
}

/// Size of the `.ibim` artifact next to `output_path`, else of the `.bim`,
/// else `-1`.
#[must_use]
pub fn artifact_size(output_path: &Path) -> i64 {
    [output_path.with_extension(IBIM_EXTENSION), output_path.to_path_buf()]
        .iter()
        .find_map(|path| std::fs::metadata(path).ok().filter(std::fs::Metadata::is_file))
        .map_or(-1, |meta| i64::try_from(meta.len()).unwrap_or(i64::MAX))
}
