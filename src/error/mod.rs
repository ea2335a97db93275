// bimbatch: Parallel DGN/DWG to iModel Batch Conversion Driver
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Error handling module.
//!
//! ```text
//!            BatchError (~24 bytes)
//!                    |
//!   +------+------+--+---+-------+------+
//!   |      |      |      |       |      |
//!   v      v      v      v       v      v
//! Bail   Cfg   Proc     Fs    Report  Io/Other
//!        Box   Box     Box     Box    Box<str>
//!
//! Sub-errors (unboxed internally):
//!   Config  ReadError, ParseError, InvalidValue, NotFound
//!   Process ExecutableNotFound, NotExecutable, SpawnFailed
//!   Fs      NotFound, NotADirectory, IoError
//!   Report  CreateFailed, WriteFailed
//! ```
//!
//! Per-file conversion failures are never errors: they are classified
//! results written to the report. Only systemic failures travel through
//! these types.

use thiserror::Error;

/// Convenience alias for `anyhow::Result`.
pub type Result<T> = anyhow::Result<T>;

/// Result type using [`BatchError`].
pub type BatchResult<T> = std::result::Result<T, BatchError>;

/// Top-level application error type.
///
/// All sub-errors are boxed to keep this enum at ~24 bytes on the stack.
#[derive(Debug, Error)]
pub enum BatchError {
    /// Fatal error that should terminate the run.
    #[error("fatal error: {0}")]
    Bailed(Box<str>),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(#[from] Box<ConfigError>),

    /// Process execution error.
    #[error("process error: {0}")]
    Process(#[from] Box<ProcessError>),

    /// Filesystem error.
    #[error("filesystem error: {0}")]
    Fs(#[from] Box<FsError>),

    /// Report or journal write error.
    #[error("report error: {0}")]
    Report(#[from] Box<ReportError>),

    /// I/O error.
    #[error("io error: {0}")]
    Io(Box<std::io::Error>),

    /// Generic error with message.
    #[error("{0}")]
    Other(Box<str>),
}

/// Create a fatal [`BatchError::Bailed`] that terminates the run.
pub fn bail_out(message: impl Into<String>) -> BatchError {
    BatchError::Bailed(message.into().into_boxed_str())
}

// --- From implementations for boxing ---

/// Macro to generate `From` implementations that box the source error.
macro_rules! impl_from_boxed {
    ($($error:ty => $variant:ident),+ $(,)?) => {
        $(
            impl From<$error> for BatchError {
                fn from(err: $error) -> Self {
                    BatchError::$variant(Box::new(err))
                }
            }
        )+
    };
}

impl_from_boxed! {
    ConfigError => Config,
    ProcessError => Process,
    FsError => Fs,
    ReportError => Report,
    std::io::Error => Io,
}

// --- Config Errors ---

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file '{path}': {source}")]
    ReadError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse configuration file.
    #[error("failed to parse config file '{path}': {message}")]
    ParseError { path: String, message: String },

    /// Invalid configuration value.
    #[error("invalid value for '{key}' in section '[{section}]': {message}")]
    InvalidValue {
        section: String,
        key: String,
        message: String,
    },

    /// Configuration file not found.
    #[error("config file not found: {0}")]
    NotFound(String),
}

// --- Process Errors ---

/// Process execution errors.
#[derive(Debug, Error)]
pub enum ProcessError {
    /// Executable not found in PATH.
    #[error("executable not found: '{name}' (not in PATH)")]
    ExecutableNotFound { name: String },

    /// Path exists but is not a runnable file.
    #[error("not an executable file: '{path}'")]
    NotExecutable { path: String },

    /// Failed to spawn process.
    #[error("failed to spawn process '{command}': {source}")]
    SpawnFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },
}

// --- Filesystem Errors ---

/// Filesystem operation errors.
#[derive(Debug, Error)]
pub enum FsError {
    /// Path not found.
    #[error("path not found: {0}")]
    NotFound(String),

    /// Path exists but is not a directory.
    #[error("not a directory: {0}")]
    NotADirectory(String),

    /// General I/O error.
    #[error("I/O error on '{path}': {source}")]
    IoError {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

// --- Report Errors ---

/// Errors writing the CSV report or the transition journal.
#[derive(Debug, Error)]
pub enum ReportError {
    /// Failed to create the output file.
    #[error("failed to create '{path}': {source}")]
    CreateFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to append a row.
    #[error("failed to write to '{path}': {source}")]
    WriteFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
