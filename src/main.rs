// bimbatch: Parallel DGN/DWG to iModel Batch Conversion Driver
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Entry point.
//!
//! ```text
//! cli::parse() --> Config --> Logging --> Command Dispatch
//!   Convert | Scan | Options | Configs | Version
//! ```

use std::process::ExitCode;

use bimbatch::cli::global::GlobalOptions;
use bimbatch::cli::{self, Command};
use bimbatch::cmd::config::{run_configs_command, run_options_command};
use bimbatch::cmd::convert::run_convert_command;
use bimbatch::cmd::scan::run_scan_command;
use bimbatch::config::Config;
use bimbatch::config::loader::ConfigLoader;
use bimbatch::logging::init_logging;
use bimbatch::logging::{LogConfig, LogLevel};

use mimalloc::MiMalloc;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = cli::parse();

    if matches!(cli.command, Some(Command::Version)) {
        handle_version_command();
        return ExitCode::SUCCESS;
    }
    if matches!(cli.command, Some(Command::Configs)) {
        let loader = build_config_loader(&cli.global);
        run_configs_command(&loader.describe_sources());
        return ExitCode::SUCCESS;
    }

    let Some(config) = load_config(&cli.global) else {
        return ExitCode::FAILURE;
    };

    let log_config = build_log_config(&cli, &config);
    let _log_guard = match init_logging(&log_config) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {e:#}");
            return ExitCode::FAILURE;
        }
    };

    dispatch_command(&cli, &config).await
}

fn build_log_config(cli: &cli::Cli, config: &Config) -> LogConfig {
    let global = &cli.global;
    let console_level = global
        .log_level
        .and_then(LogLevel::from_u8)
        .unwrap_or(config.log.console_level);

    let file_level = global
        .file_log_level
        .and_then(LogLevel::from_u8)
        .or_else(|| global.log_level.and_then(LogLevel::from_u8))
        .unwrap_or(config.log.file_level);

    // convert always leaves a diagnostic log next to its report
    let log_file = global.log_file.clone().or_else(|| match &cli.command {
        Some(Command::Convert(args)) => Some(args.output.join(&config.report.diagnostic_log)),
        _ => None,
    });

    LogConfig::builder()
        .with_console_level(console_level)
        .with_file_level(file_level)
        .maybe_with_log_file(log_file)
        .with_format(config.log.format)
        .build()
}

async fn dispatch_command(cli: &cli::Cli, config: &Config) -> ExitCode {
    let result = match &cli.command {
        Some(Command::Options) => {
            run_options_command(config);
            Ok(())
        }
        Some(Command::Convert(args)) => run_convert_command(args, config).await,
        Some(Command::Scan(args)) => run_scan_command(args, config),
        Some(Command::Version | Command::Configs) => Ok(()),
        None => {
            eprintln!("No command specified. Use --help for usage information.");
            Err(anyhow::anyhow!("No command specified"))
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %format!("{e:#}"), "run failed");
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn handle_version_command() {
    println!("{}", env!("CARGO_PKG_VERSION"));
}

fn build_config_loader(global: &GlobalOptions) -> ConfigLoader {
    ConfigLoader::standard(&global.configs, !global.no_default_config)
}

fn load_config(global: &GlobalOptions) -> Option<Config> {
    let loaded = global
        .to_config_overrides()
        .and_then(|overrides| build_config_loader(global).with_overrides(&overrides))
        .and_then(ConfigLoader::build);

    match loaded {
        Ok(config) => Some(config),
        Err(e) => {
            eprintln!("Failed to load config: {e:#}");
            None
        }
    }
}
