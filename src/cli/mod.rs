// bimbatch: Parallel DGN/DWG to iModel Batch Conversion Driver
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! CLI module for bimbatch using clap derive.
//!
//! # Command Structure
//!
//! ```text
//! bimbatch [global options] <command>
//! convert --converter EXE --input DIR --output DIR [--custom FILE] ...
//! scan    --input DIR [--custom FILE] [--converter EXE]
//! options
//! configs
//! version
//! ```

pub mod convert;
pub mod global;


use crate::cli::convert::{ConvertArgs, ScanArgs};
use crate::cli::global::GlobalOptions;
use clap::{Parser, Subcommand};

/// Parallel DGN/DWG to iModel batch conversion driver
///
/// Converts every design file below an input directory with an external
/// converter, several at a time, and reports the outcome of each.
#[derive(Debug, Parser)]
#[command(
    name = "bimbatch",
    author,
    version,
    about = "Parallel DGN/DWG to iModel batch conversion driver",
    long_about = "bimbatch Copyright (C) 2026 Romeo Ahmed\n\
                  This program comes with ABSOLUTELY NO WARRANTY\n\
                  This is free software, and you are welcome to redistribute it\n\
                  under certain conditions; see LICENSE for details.\n\n\
                  Runs a DGN/DWG to iModel converter over every .dgn and .dwg file\n\
                  below an input directory, with bounded parallelism and a per-file\n\
                  timeout, and writes Output_report.csv to the output directory.\n\
                  See `bimbatch <command> --help` for more information about a command.",
    after_help = "CONFIG FILES:\n\n\
                  bimbatch reads `bimbatch.toml` from the current directory when present,\n\
                  then every file given with --config, in order. BIMBATCH_* environment\n\
                  variables override both (BIMBATCH_RUN__TIMEOUT_SECS=600), and command\n\
                  line flags override everything. Use --no-default-config to skip\n\
                  `bimbatch.toml`."
)]
pub struct Cli {
    /// Global options shared by all commands
    #[command(flatten)]
    pub global: GlobalOptions,

    /// Command to execute
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Shows the version.
    #[command(visible_alias = "-v")]
    Version,

    /// Lists all options and their values from the config files.
    Options,

    /// Lists the config files used by bimbatch.
    Configs,

    /// Converts every DGN/DWG file below the input directory.
    Convert(ConvertArgs),

    /// Lists the files that would be converted, and how (dry run).
    Scan(ScanArgs),
}

/// Parses command-line arguments.
#[must_use]
pub fn parse() -> Cli {
    Cli::parse()
}

/// Parses command-line arguments from an iterator.
pub fn parse_from<I, T>(iter: I) -> Cli
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    Cli::parse_from(iter)
}

/// Tries to parse command-line arguments, returning an error on failure.
///
/// # Errors
///
/// Returns a `clap::Error` if the arguments are invalid or if help/version information
/// was requested.
pub fn try_parse() -> Result<Cli, clap::Error> {
    Cli::try_parse()
}
