// bimbatch: Parallel DGN/DWG to iModel Batch Conversion Driver
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Layered configuration loading.
//!
//! ```text
//! ConfigLoader::standard(--config files, use bimbatch.toml?)
//!   ./bimbatch.toml          optional, skipped by --no-default-config
//!   --config FILE ...        required, in order
//!   BIMBATCH_RUN__TIMEOUT_SECS=600 ...
//!   .with_overrides(--set run.max_workers=4 ...)   always wins
//!        |
//!        v
//!   build() --> Config (validated)
//! ```

use config::builder::DefaultState;
use config::{ConfigBuilder, Environment, File, FileFormat};
use std::fmt;
use std::path::{Path, PathBuf};

use super::Config;
use crate::error::{ConfigError, Result};

/// Config file picked up from the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "bimbatch.toml";

/// Prefix of configuration environment variables.
pub const ENV_PREFIX: &str = "BIMBATCH";

/// One layer that contributed to the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// `bimbatch.toml` in the working directory.
    WorkingDir(PathBuf),
    /// A file named with `--config`.
    File(PathBuf),
    /// `BIMBATCH_*` variables, with how many were set.
    Environment(usize),
    /// TOML given as a string.
    Inline,
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WorkingDir(path) => write!(f, "{} (working directory)", path.display()),
            Self::File(path) => write!(f, "{}", path.display()),
            Self::Environment(count) => write!(f, "{ENV_PREFIX}_* environment ({count} set)"),
            Self::Inline => write!(f, "<string>"),
        }
    }
}

/// Collects configuration layers and builds a [`Config`].
pub struct ConfigLoader {
    builder: ConfigBuilder<DefaultState>,
    sources: Vec<ConfigSource>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// A loader with no layers; `build()` yields the defaults.
    #[must_use]
    pub fn new() -> Self {
        Self {
            builder: config::Config::builder(),
            sources: Vec::new(),
        }
    }

    /// The layering used by the command line.
    #[must_use]
    pub fn standard<P: AsRef<Path>>(files: &[P], use_default_file: bool) -> Self {
        let mut loader = Self::new();
        if use_default_file {
            loader = loader.with_default_file(DEFAULT_CONFIG_FILE);
        }
        for file in files {
            loader = loader.with_file(file);
        }
        loader.with_environment()
    }

    /// Adds a file that is read only if it exists.
    #[must_use]
    pub fn with_default_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        let path = path.as_ref();
        self.builder = self
            .builder
            .add_source(File::from(path).format(FileFormat::Toml).required(false));
        if path.is_file() {
            self.sources.push(ConfigSource::WorkingDir(path.to_path_buf()));
        }
        self
    }

    /// Adds a file that must exist; `build()` fails otherwise.
    #[must_use]
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        let path = path.as_ref();
        self.builder = self
            .builder
            .add_source(File::from(path).format(FileFormat::Toml).required(true));
        self.sources.push(ConfigSource::File(path.to_path_buf()));
        self
    }

    #[must_use]
    pub(crate) fn with_toml_str(mut self, content: &str) -> Self {
        self.builder = self
            .builder
            .add_source(File::from_str(content, FileFormat::Toml));
        self.sources.push(ConfigSource::Inline);
        self
    }

    /// Reads `BIMBATCH_SECTION__KEY` variables.
    #[must_use]
    pub fn with_environment(mut self) -> Self {
        let prefix = format!("{ENV_PREFIX}_");
        let count = std::env::vars_os()
            .filter(|(key, _)| key.to_string_lossy().starts_with(&prefix))
            .count();
        self.builder = self.builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );
        if count > 0 {
            self.sources.push(ConfigSource::Environment(count));
        }
        self
    }

    /// Applies `key=value` overrides on top of every other layer.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if a key is not a valid path.
    pub fn with_overrides<K, V>(mut self, overrides: &[(K, V)]) -> Result<Self>
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        for (key, value) in overrides {
            let key = key.as_ref();
            self.builder = self
                .builder
                .set_override(key, value.as_ref())
                .map_err(|e| ConfigError::InvalidValue {
                    section: "cli".to_string(),
                    key: key.to_string(),
                    message: e.to_string(),
                })?;
        }
        Ok(self)
    }

    /// Merges the layers, deserializes and validates.
    ///
    /// # Errors
    ///
    /// Returns an error for a missing required file, invalid TOML, unknown
    /// keys, wrongly typed values or a failed [`Config::validate`].
    pub fn build(self) -> Result<Config> {
        let config: Config = self.builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Layers that contributed, in load order.
    #[must_use]
    pub fn sources(&self) -> &[ConfigSource] {
        &self.sources
    }

    /// Numbered lines for `bimbatch configs`.
    #[must_use]
    pub fn describe_sources(&self) -> Vec<String> {
        self.sources
            .iter()
            .enumerate()
            .map(|(i, source)| format!("{}. {source}", i + 1))
            .collect()
    }
}
