// bimbatch: Parallel DGN/DWG to iModel Batch Conversion Driver
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Convert and scan command arguments.
//!
//! ```text
//! convert  --converter EXE  --input DIR  --output DIR
//!          [--custom FILE] [--ibim-flag yes|no] [--profile P]
//!          [--jobs N] [--timeout SECS] [--fail-on-error] [--no-progress]
//! scan     --input DIR [--custom FILE] [--converter EXE] [--output DIR]
//! ```

use clap::{Args, ValueEnum};
use std::path::PathBuf;

use crate::config::Config;
use crate::config::types::ProfileSetting;

/// Answer for `--ibim-flag`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum YesNo {
    Yes,
    No,
}

impl YesNo {
    #[must_use]
    pub const fn is_yes(self) -> bool {
        matches!(self, Self::Yes)
    }
}

/// Arguments for the `convert` command.
#[derive(Debug, Clone, Args)]
pub struct ConvertArgs {
    /// Converter executable (path, or name looked up in PATH).
    #[arg(long, value_name = "EXE")]
    pub converter: PathBuf,

    /// Directory searched recursively for .dgn/.dwg files.
    #[arg(short = 'i', long, value_name = "DIR")]
    pub input: PathBuf,

    /// Directory receiving outputs, the report and the logs.
    #[arg(short = 'o', long, value_name = "DIR")]
    pub output: PathBuf,

    /// Custom file with a re-run filter, excludes and extra converter flags.
    #[arg(long, value_name = "FILE")]
    pub custom: Option<PathBuf>,

    /// Importer only: also produce a compressed .ibim file.
    #[arg(long = "ibim-flag", alias = "ibimFlag", value_enum, value_name = "YES|NO")]
    pub ibim_flag: Option<YesNo>,

    /// Converter dialect, overrides converter.profile.
    #[arg(long, value_name = "PROFILE")]
    pub profile: Option<ProfileSetting>,

    /// Number of converters run at once, overrides the computed budget.
    #[arg(short = 'j', long, value_name = "N", value_parser = clap::value_parser!(u16).range(1..))]
    pub jobs: Option<u16>,

    /// Per-file timeout in seconds, overrides run.timeout_secs.
    #[arg(short = 't', long, value_name = "SECS", value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout: Option<u64>,

    /// Exit with a failure code when any file fails to convert.
    #[arg(long)]
    pub fail_on_error: bool,

    /// Don't draw a progress bar.
    #[arg(long)]
    pub no_progress: bool,
}

impl ConvertArgs {
    /// Applies command-line overrides on top of the loaded configuration.
    pub fn apply_to(&self, config: &mut Config) {
        if let Some(jobs) = self.jobs {
            config.run.max_workers = Some(usize::from(jobs));
        }
        if let Some(timeout) = self.timeout {
            config.run.timeout_secs = timeout;
        }
        if let Some(profile) = self.profile {
            config.converter.profile = profile;
        }
    }
}

/// Arguments for the `scan` command.
#[derive(Debug, Clone, Args)]
pub struct ScanArgs {
    /// Directory searched recursively for .dgn/.dwg files.
    #[arg(short = 'i', long, value_name = "DIR")]
    pub input: PathBuf,

    /// Custom file with a re-run filter, excludes and extra converter flags.
    #[arg(long, value_name = "FILE")]
    pub custom: Option<PathBuf>,

    /// Converter executable; when given, command lines are printed too.
    #[arg(long, value_name = "EXE")]
    pub converter: Option<PathBuf>,

    /// Output directory used to render command lines.
    #[arg(short = 'o', long, value_name = "DIR", default_value = "output")]
    pub output: PathBuf,

    /// Converter dialect, overrides converter.profile.
    #[arg(long, value_name = "PROFILE")]
    pub profile: Option<ProfileSetting>,
}
