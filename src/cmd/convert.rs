// bimbatch: Parallel DGN/DWG to iModel Batch Conversion Driver
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! The `convert` command.
//!
//! ```text
//! validate      config, input dir, converter, --ibim-flag vs profile
//!    |
//! plan          custom file --> discover --> filter --> ConversionTask[]
//!    |
//! supervise     Supervisor::run() + progress bar + Ctrl+C
//!    |
//! summarize     Output_summary.json, stdout summary
//! ```
//!
//! Per-file failures never make this fail; systemic problems do.

use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::cli::convert::ConvertArgs;
use crate::config::Config;
use crate::config::custom::CustomFile;
use crate::convert::discovery::{DiscoveryOptions, discover};
use crate::convert::filter::RunFilter;
use crate::convert::profile::{CommandTemplate, ConverterArgs, ConverterProfile};
use crate::convert::report::{Journal, ReportWriter, RunSummary};
use crate::convert::supervisor::Supervisor;
use crate::convert::ConversionTask;
use crate::core::process::builder::ProcessBuilder;
use crate::error::{ConfigError, FsError, Result, bail_out};

/// Files selected for one run.
#[derive(Debug, Default)]
pub struct Plan {
    pub tasks: Vec<ConversionTask>,
    /// Candidate inputs found, excluded ones included.
    pub discovered: usize,
    pub excluded: usize,
    /// Filter names that matched no discovered file.
    pub not_found: Vec<String>,
}

/// Loads the custom file, or an empty one when none was given.
///
/// # Errors
///
/// Returns an error if the file is missing or malformed.
pub fn load_custom(path: Option<&Path>) -> Result<CustomFile> {
    path.map_or_else(|| Ok(CustomFile::default()), CustomFile::load)
}

/// Discovers and filters inputs, and turns them into tasks.
///
/// # Errors
///
/// Returns an error if the input root is unusable, an exclude glob is
/// invalid or the filter CSV cannot be read.
pub fn build_plan(input: &Path, output: &Path, custom: &CustomFile) -> Result<Plan> {
    let options = DiscoveryOptions::builder()
        .with_exclude(custom.exclude.clone())
        .build();
    let discovery = discover(input, &options)?;
    let excluded = discovery.excluded();
    let discovered = discovery.files().len() + excluded;
    if discovery.error_count() > 0 {
        warn!(errors = discovery.error_count(), "some directories could not be read");
    }

    let mut files = discovery.into_files();
    let mut not_found = Vec::new();
    if let Some(csv) = &custom.filter_csv {
        let mut filter = RunFilter::from_csv(csv)?;
        files = filter.retain(files);
        not_found = filter.remaining();
        info!(selected = files.len(), not_found = not_found.len(), "applied run filter");
    }

    let tasks = files
        .iter()
        .map(|file| {
            let name = file
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let overrides = custom
                .flags_for(&name)
                .map(ConverterArgs::from_table)
                .unwrap_or_default();
            ConversionTask::new(file, input, output, overrides)
        })
        .collect();

    Ok(Plan {
        tasks,
        discovered,
        excluded,
        not_found,
    })
}

/// Global converter flags: `[converter.args]`, then the custom file's `[args]`.
#[must_use]
pub fn global_args(config: &Config, custom: &CustomFile) -> ConverterArgs {
    let mut args = ConverterArgs::from_table(&config.converter.args);
    args.extend_from_table(&custom.args);
    args
}

/// Checks that `input` is an existing directory.
///
/// # Errors
///
/// Returns `FsError::NotFound` or `FsError::NotADirectory`.
pub fn require_dir(input: &Path) -> Result<()> {
    if !input.exists() {
        return Err(FsError::NotFound(input.display().to_string()).into());
    }
    if !input.is_dir() {
        return Err(FsError::NotADirectory(input.display().to_string()).into());
    }
    Ok(())
}

fn bar_style() -> ProgressStyle {
    static STYLE: OnceLock<ProgressStyle> = OnceLock::new();
    STYLE
        .get_or_init(|| {
            ProgressStyle::with_template(
                "{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} files ({eta})",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-")
        })
        .clone()
}

/// Cancels `token` on Ctrl+C.
fn spawn_interrupt_handler(token: CancellationToken) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, stopping converters");
            token.cancel();
        }
    })
}

/// Runs a whole batch and writes the summary file.
///
/// # Errors
///
/// Returns an error for invalid arguments or configuration, an unusable
/// input/output directory or converter, or when a run artifact cannot be
/// written.
pub async fn convert(
    args: &ConvertArgs,
    config: &Config,
    token: CancellationToken,
) -> Result<RunSummary> {
    let started = Instant::now();

    let mut config = config.clone();
    args.apply_to(&mut config);
    config.validate()?;

    require_dir(&args.input)?;
    std::fs::create_dir_all(&args.output).map_err(|source| FsError::IoError {
        path: args.output.display().to_string(),
        source,
    })?;

    let converter = ProcessBuilder::resolve_executable(&args.converter)?;
    let profile = ConverterProfile::resolve(config.converter.profile, &converter);
    if args.ibim_flag.is_some() && profile != ConverterProfile::Importer {
        return Err(ConfigError::InvalidValue {
            section: "cli".to_string(),
            key: "ibim-flag".to_string(),
            message: format!(
                "only supported by the importer profile, '{}' uses '{}'",
                converter.display(),
                profile.as_str()
            ),
        }
        .into());
    }
    let compress = args.ibim_flag.is_some_and(|flag| flag.is_yes());

    let custom = load_custom(args.custom.as_deref())?;
    let plan = build_plan(&args.input, &args.output, &custom)?;

    let worker_budget = config.run.host_worker_budget();
    info!(
        converter = %converter.display(),
        profile = profile.as_str(),
        files = plan.tasks.len(),
        worker_budget,
        timeout_secs = config.run.timeout_secs,
        "starting batch"
    );

    let template = CommandTemplate::new(
        converter.clone(),
        profile,
        global_args(&config, &custom),
        compress,
        config.run.timeout(),
    );
    let journal = Journal::create(&args.output.join(&config.report.journal_file)).await?;
    let report_path = args.output.join(&config.report.report_file);
    let report = ReportWriter::create(&report_path).await?;

    let dispatchable = plan.tasks.len();
    let mut supervisor = Supervisor::new(template, Arc::new(journal), Arc::new(report), worker_budget)
        .with_cancel_token(token.clone());
    let progress = if args.no_progress {
        None
    } else {
        let bar = ProgressBar::new(u64::try_from(dispatchable).unwrap_or(u64::MAX));
        bar.set_style(bar_style());
        supervisor = supervisor.with_progress(bar.clone());
        Some(bar)
    };

    let interrupt = spawn_interrupt_handler(token);
    let outcome = supervisor.run(plan.tasks).await;
    interrupt.abort();
    if let Some(bar) = progress {
        bar.finish_and_clear();
    }
    let outcome = outcome?;

    let summary = RunSummary {
        converter: converter.display().to_string(),
        profile: profile.as_str().to_string(),
        input: args.input.clone(),
        output: args.output.clone(),
        discovered: plan.discovered,
        excluded: plan.excluded,
        dispatched: outcome.dispatched,
        counters: outcome.counters,
        skipped: outcome.skipped,
        not_found: plan.not_found,
        worker_budget,
        peak_concurrency: outcome.peak_concurrency,
        interrupted: outcome.interrupted,
        elapsed_secs: started.elapsed().as_secs_f64(),
    };
    summary.write(&args.output.join(&config.report.summary_file))?;

    info!(
        succeeded = summary.counters.succeeded,
        failed = summary.counters.failed,
        crashed = summary.counters.crashed,
        skipped = summary.skipped,
        report = %report_path.display(),
        "batch finished"
    );
    Ok(summary)
}

/// Renders the end-of-run summary for the terminal.
#[must_use]
pub fn format_summary(summary: &RunSummary, report_path: &Path) -> Vec<String> {
    let mut lines = vec![
        format!(
            "Discovered: {} ({} excluded), dispatched: {}, skipped: {}",
            summary.discovered, summary.excluded, summary.dispatched, summary.skipped
        ),
        format!(
            "Succeeded: {}, failed: {}, crashed: {}",
            summary.counters.succeeded, summary.counters.failed, summary.counters.crashed
        ),
        format!(
            "Worker budget: {}, peak concurrency: {}",
            summary.worker_budget, summary.peak_concurrency
        ),
    ];
    if !summary.not_found.is_empty() {
        lines.push(format!("Not found: {}", summary.not_found.join(", ")));
    }
    lines.push(format!("Report: {}", report_path.display()));
    lines
}

/// Run the convert command.
///
/// # Errors
///
/// Returns an error if the batch could not run, if it was interrupted, or
/// with `--fail-on-error` when any file failed.
pub async fn run_convert_command(args: &ConvertArgs, config: &Config) -> Result<()> {
    let summary = convert(args, config, CancellationToken::new()).await?;

    let report_path: PathBuf = args.output.join(&config.report.report_file);
    for line in format_summary(&summary, &report_path) {
        println!("{line}");
    }

    if summary.interrupted {
        return Err(bail_out(format!(
            "interrupted, {} file(s) not converted",
            summary.skipped
        ))
        .into());
    }
    if args.fail_on_error && summary.counters.failed > 0 {
        return Err(bail_out(format!(
            "{} of {} file(s) failed to convert",
            summary.counters.failed,
            summary.counters.total()
        ))
        .into());
    }
    Ok(())
}
