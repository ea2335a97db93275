// bimbatch: Parallel DGN/DWG to iModel Batch Conversion Driver
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Diagnostic logging.
//!
//! ```text
//! init_logging(&LogConfig)
//!   stderr layer       console_level, compact, no targets
//!   diagnostic layer   file_level, <output>/log_file_1.txt, text or JSON
//!        |
//!        v
//!   LogGuard           drains the non-blocking writer on drop
//! ```
//!
//! Verbosity is a number so it fits `-l 4` and `console_level = 4` alike.
//! From 3 to 5 only this crate gets louder; dependencies stay at `warn` until 6.

use anyhow::Context;
use bon::Builder;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::error::Result;

/// Verbosity from 0 (off) to 6 (everything, dependencies included).
///
/// Level 5 adds every line a converter prints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct LogLevel(u8);

impl LogLevel {
    pub const SILENT: Self = Self(0);
    pub const ERROR: Self = Self(1);
    pub const WARN: Self = Self(2);
    pub const INFO: Self = Self(3);
    pub const DEBUG: Self = Self(4);
    pub const TRACE: Self = Self(5);
    pub const DUMP: Self = Self(6);

    const MAX: u8 = 6;

    /// `None` above 6.
    #[must_use]
    pub const fn from_u8(level: u8) -> Option<Self> {
        if level <= Self::MAX { Some(Self(level)) } else { None }
    }

    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self.0
    }

    /// `EnvFilter` directives for this level.
    #[must_use]
    pub const fn directives(self) -> &'static str {
        match self.0 {
            0 => "off",
            1 => "error",
            2 => "warn",
            3 => "warn,bimbatch=info",
            4 => "warn,bimbatch=debug",
            5 => "warn,bimbatch=trace",
            _ => "trace",
        }
    }

    fn filter(self) -> EnvFilter {
        EnvFilter::new(self.directives())
    }
}

impl Serialize for LogLevel {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.0)
    }
}

impl<'de> Deserialize<'de> for LogLevel {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let level = u8::deserialize(deserializer)?;
        Self::from_u8(level).ok_or_else(|| {
            serde::de::Error::custom(format!("log level must be 0-{}, got {level}", Self::MAX))
        })
    }
}

/// Line format of the diagnostic log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    /// One JSON object per event.
    Json,
}

impl LogFormat {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Json => "json",
        }
    }
}

/// Where and how much to log for one invocation.
#[derive(Debug, Clone, Builder)]
pub struct LogConfig {
    #[builder(setters(name = with_console_level), default = LogLevel::INFO)]
    pub console_level: LogLevel,
    #[builder(setters(name = with_file_level), default = LogLevel::DEBUG)]
    pub file_level: LogLevel,
    /// Diagnostic log; console only when unset.
    #[builder(setters(name = with_log_file))]
    pub log_file: Option<PathBuf>,
    #[builder(setters(name = with_format), default)]
    pub format: LogFormat,
}

/// Keeps the diagnostic writer alive; dropping it flushes pending lines.
pub struct LogGuard {
    _file_guard: Option<WorkerGuard>,
}

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

fn console_layer(level: LogLevel) -> BoxedLayer {
    fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .with_filter(level.filter())
        .boxed()
}

/// Truncates `path` and returns a non-blocking layer writing to it.
fn diagnostic_layer(path: &Path, config: &LogConfig) -> Result<(BoxedLayer, WorkerGuard)> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create log directory {}", dir.display()))?;
    }
    let file = File::create(path)
        .with_context(|| format!("failed to create diagnostic log {}", path.display()))?;
    let (writer, guard) = tracing_appender::non_blocking(file);

    let base = fmt::layer().with_writer(writer).with_ansi(false);
    let layer = match config.format {
        LogFormat::Text => base.with_filter(config.file_level.filter()).boxed(),
        LogFormat::Json => base.json().with_filter(config.file_level.filter()).boxed(),
    };
    Ok((layer, guard))
}

/// Installs the global subscriber.
///
/// # Errors
///
/// Returns an error if the diagnostic log cannot be created or a
/// subscriber is already installed.
///
/// # Example
///
/// ```no_run
/// use bimbatch::logging::{LogConfig, LogLevel, init_logging};
///
/// let config = LogConfig::builder()
///     .with_console_level(LogLevel::WARN)
///     .with_log_file("out/log_file_1.txt".into())
///     .build();
/// let _guard = init_logging(&config)?;
/// # Ok::<(), anyhow::Error>(())
/// ```
pub fn init_logging(config: &LogConfig) -> Result<LogGuard> {
    let mut layers = vec![console_layer(config.console_level)];
    let mut file_guard = None;
    if let Some(path) = &config.log_file {
        let (layer, guard) = diagnostic_layer(path, config)?;
        layers.push(layer);
        file_guard = Some(guard);
    }

    tracing_subscriber::registry()
        .with(layers)
        .try_init()
        .context("failed to install the tracing subscriber")?;

    Ok(LogGuard {
        _file_guard: file_guard,
    })
}
