// bimbatch: Parallel DGN/DWG to iModel Batch Conversion Driver
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Converter profiles and command construction.
//!
//! ```text
//! ConverterProfile::Importer  --input=IN --output=OUT [--compress] --name value
//! ConverterProfile::DgnV8     --input=IN --output=OUT --name=value
//!
//! global [converter.args] + custom [args]  <  per-file [files."x.dgn"]
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::custom::FlagTable;
use crate::config::types::ProfileSetting;
use crate::core::process::builder::ProcessBuilder;

use super::ConversionTask;

/// Flag passed to the importer to produce compressed `.ibim` output.
pub const COMPRESS_FLAG: &str = "compress";

/// Named converter flags; `None` is a bare flag.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConverterArgs(BTreeMap<String, Option<String>>);

impl ConverterArgs {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds flags from a config table; empty values become bare flags.
    #[must_use]
    pub fn from_table(table: &FlagTable) -> Self {
        let mut args = Self::new();
        args.extend_from_table(table);
        args
    }

    /// Adds or replaces flags from a config table.
    pub fn extend_from_table(&mut self, table: &FlagTable) {
        for (name, value) in table {
            let value = (!value.is_empty()).then(|| value.clone());
            self.set(name, value);
        }
    }

    /// Sets one flag, stripping any leading dashes from its name.
    pub fn set(&mut self, name: &str, value: Option<String>) {
        self.0.insert(name.trim_start_matches('-').to_string(), value);
    }

    /// Returns `self` with `overrides` applied on top.
    #[must_use]
    pub fn merged_with(&self, overrides: &Self) -> Self {
        let mut merged = self.clone();
        for (name, value) in &overrides.0 {
            merged.0.insert(name.clone(), value.clone());
        }
        merged
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Flags in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_deref()))
    }
}

/// Command-line dialect of a converter executable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConverterProfile {
    /// `--name value`, may also write compressed `.ibim` output.
    Importer,
    /// `--name=value`.
    DgnV8,
}

impl ConverterProfile {
    /// Picks the profile from configuration, guessing from the executable
    /// name when set to `auto`.
    #[must_use]
    pub fn resolve(setting: ProfileSetting, program: &Path) -> Self {
        match setting {
            ProfileSetting::Importer => Self::Importer,
            ProfileSetting::Dgnv8 => Self::DgnV8,
            ProfileSetting::Auto => {
                let stem = program
                    .file_stem()
                    .map(|s| s.to_string_lossy().to_lowercase())
                    .unwrap_or_default();
                if stem.contains("importer") {
                    Self::Importer
                } else {
                    Self::DgnV8
                }
            }
        }
    }

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Importer => "importer",
            Self::DgnV8 => "dgnv8",
        }
    }

    /// Appends one flag in this profile's syntax.
    fn push_flag(self, argv: &mut Vec<String>, name: &str, value: Option<&str>) {
        match (self, value) {
            (_, None) => argv.push(format!("--{name}")),
            (Self::DgnV8, Some(value)) => argv.push(format!("--{name}={value}")),
            (Self::Importer, Some(value)) => {
                argv.push(format!("--{name}"));
                argv.push(value.to_string());
            }
        }
    }
}

/// Everything needed to turn a task into a converter invocation.
#[derive(Debug, Clone)]
pub struct CommandTemplate {
    program: PathBuf,
    profile: ConverterProfile,
    global_args: ConverterArgs,
    timeout: Duration,
}

impl CommandTemplate {
    /// Creates a template. With `compress` set on an importer profile the
    /// compression flag is added to the global flags.
    #[must_use]
    pub fn new(
        program: PathBuf,
        profile: ConverterProfile,
        mut global_args: ConverterArgs,
        compress: bool,
        timeout: Duration,
    ) -> Self {
        if compress && profile == ConverterProfile::Importer {
            global_args.set(COMPRESS_FLAG, None);
        }
        Self {
            program,
            profile,
            global_args,
            timeout,
        }
    }

    /// Converter arguments for one task.
    #[must_use]
    pub fn argv(&self, task: &ConversionTask) -> Vec<String> {
        let mut argv = vec![
            format!("--input={}", task.input().display()),
            format!("--output={}", task.output_path().display()),
        ];
        let flags = self.global_args.merged_with(task.overrides());
        for (name, value) in flags.iter() {
            self.profile.push_flag(&mut argv, name, value);
        }
        argv
    }

    /// A ready-to-spawn process for one task.
    #[must_use]
    pub fn process(&self, task: &ConversionTask) -> ProcessBuilder {
        ProcessBuilder::new(&self.program)
            .args(self.argv(task))
            .cwd(task.output_dir())
            .name(task.file_name())
            .timeout(self.timeout)
            .capture_output()
    }
}
