// bimbatch: Parallel DGN/DWG to iModel Batch Conversion Driver
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Process supervisor.
//!
//! ```text
//! Supervisor::new(template, journal, report, worker_budget)
//!   .with_cancel_token()  .with_progress()
//!   .run(tasks).await
//!
//! per task:  Pending --permit--> Running --+--> Completed
//!               |                          +--> TimedOut     (killed, reaped)
//!               |                          +--> Interrupted  (Ctrl+C)
//!               +--cancelled--> Skipped
//! ```
//!
//! Admission is a `Semaphore` with `worker_budget` permits; a worker holds
//! its permit until its report row is written. Every transition is
//! journaled and traced. Results come back through a `JoinSet` and are
//! tallied here, never in shared counters. A worker that panics still gets
//! a `Crash` row. A journal or report write failure cancels the run.

use indicatif::ProgressBar;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::{Id, JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::classify::{Classification, artifact_size, classify, read_issues};
use super::profile::CommandTemplate;
use super::report::{Journal, ReportWriter, now};
use super::{ConversionResult, ConversionTask, FailureCategory, RunCounters, Status};
use crate::core::process::builder::Termination;
use crate::error::{ReportError, Result};

/// States a task moves through, as written to the journal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Pending,
    Running,
    Completed,
    TimedOut,
    Interrupted,
    /// Never admitted because the run was cancelled.
    Skipped,
    /// The converter could not be started.
    SpawnFailed,
}

impl TaskState {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::TimedOut => "timed-out",
            Self::Interrupted => "interrupted",
            Self::Skipped => "skipped",
            Self::SpawnFailed => "spawn-failed",
        }
    }

    const fn from_termination(termination: Termination) -> Self {
        match termination {
            Termination::Exited => Self::Completed,
            Termination::TimedOut => Self::TimedOut,
            Termination::Interrupted => Self::Interrupted,
        }
    }
}

/// What a supervisor run produced.
#[derive(Debug, Clone, Default)]
pub struct SupervisorOutcome {
    pub counters: RunCounters,
    pub dispatched: usize,
    pub skipped: usize,
    /// Highest number of converters running at the same time.
    pub peak_concurrency: usize,
    pub interrupted: bool,
    /// Results in completion order.
    pub results: Vec<ConversionResult>,
}

/// Tracks running children and the high-water mark.
#[derive(Debug, Default)]
struct Occupancy {
    running: AtomicUsize,
    peak: AtomicUsize,
}

impl Occupancy {
    fn enter(&self) {
        let now_running = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now_running, Ordering::SeqCst);
    }

    fn leave(&self) {
        self.running.fetch_sub(1, Ordering::SeqCst);
    }

    fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

/// State shared by every worker.
#[derive(Debug)]
struct WorkerContext {
    template: CommandTemplate,
    journal: Arc<Journal>,
    report: Arc<ReportWriter>,
    occupancy: Occupancy,
    cancel_token: CancellationToken,
    progress: Option<ProgressBar>,
}

/// Runs conversion tasks with bounded parallelism.
pub struct Supervisor {
    template: CommandTemplate,
    journal: Arc<Journal>,
    report: Arc<ReportWriter>,
    semaphore: Arc<Semaphore>,
    worker_budget: usize,
    cancel_token: CancellationToken,
    progress: Option<ProgressBar>,
}

impl Supervisor {
    /// Creates a supervisor admitting at most `worker_budget` converters at once.
    #[must_use]
    pub fn new(
        template: CommandTemplate,
        journal: Arc<Journal>,
        report: Arc<ReportWriter>,
        worker_budget: usize,
    ) -> Self {
        let worker_budget = worker_budget.max(1);
        Self {
            template,
            journal,
            report,
            semaphore: Arc::new(Semaphore::new(worker_budget)),
            worker_budget,
            cancel_token: CancellationToken::new(),
            progress: None,
        }
    }

    /// Uses `token` to interrupt the run.
    #[must_use]
    pub fn with_cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel_token = token;
        self
    }

    /// Advances `progress` once per finished task.
    #[must_use]
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = Some(progress);
        self
    }

    #[must_use]
    pub const fn worker_budget(&self) -> usize {
        self.worker_budget
    }

    /// Returns the cancellation token for sharing with signal handlers.
    #[must_use]
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    fn context(&self) -> Arc<WorkerContext> {
        Arc::new(WorkerContext {
            template: self.template.clone(),
            journal: Arc::clone(&self.journal),
            report: Arc::clone(&self.report),
            occupancy: Occupancy::default(),
            cancel_token: self.cancel_token.clone(),
            progress: self.progress.clone(),
        })
    }

    /// Converts every task and writes one report row per dispatched task.
    ///
    /// # Errors
    ///
    /// Returns an error if the journal or report cannot be written. The
    /// run is cancelled first so no converter is left running.
    pub async fn run(&self, tasks: Vec<ConversionTask>) -> Result<SupervisorOutcome> {
        let token = &self.cancel_token;
        let ctx = self.context();
        let mut tally = Tally::default();

        for task in &tasks {
            if let Err(e) = self
                .journal
                .record(&task.file_name(), TaskState::Pending, "")
                .await
            {
                tally.abort(e, token);
                return tally.finish(&ctx);
            }
        }

        let mut set = JoinSet::new();
        let mut queue = tasks.into_iter();

        while let Some(task) = queue.next() {
            let permit = tokio::select! {
                biased;
                () = token.cancelled() => None,
                permit = Arc::clone(&self.semaphore).acquire_owned() => permit.ok(),
            };
            let Some(permit) = permit else {
                for task in std::iter::once(task).chain(queue.by_ref()) {
                    tally.outcome.skipped += 1;
                    if let Err(e) = self
                        .journal
                        .record(&task.file_name(), TaskState::Skipped, "")
                        .await
                    {
                        tally.first_error.get_or_insert(e);
                    }
                }
                break;
            };

            tally.outcome.dispatched += 1;
            let name = task.file_name();
            let handle = set.spawn(run_task(Arc::clone(&ctx), task, permit));
            tally.in_flight.insert(handle.id(), name);

            while let Some(joined) = set.try_join_next_with_id() {
                tally.collect(joined, &ctx).await;
            }
        }

        while let Some(joined) = set.join_next_with_id().await {
            tally.collect(joined, &ctx).await;
        }

        if tally.outcome.skipped > 0 {
            warn!(skipped = tally.outcome.skipped, "run interrupted, tasks not started");
        }
        tally.finish(&ctx)
    }
}

type WorkerResult = std::result::Result<ConversionResult, ReportError>;
type Joined = std::result::Result<(Id, WorkerResult), JoinError>;

/// Folds finished workers into the outcome.
#[derive(Debug, Default)]
struct Tally {
    outcome: SupervisorOutcome,
    first_error: Option<ReportError>,
    /// File name of every worker not collected yet.
    in_flight: HashMap<Id, String>,
}

impl Tally {
    async fn collect(&mut self, joined: Joined, ctx: &WorkerContext) {
        match joined {
            Ok((id, Ok(result))) => {
                self.in_flight.remove(&id);
                self.record(result);
            }
            Ok((id, Err(e))) => {
                self.in_flight.remove(&id);
                self.abort(e, &ctx.cancel_token);
            }
            Err(e) => {
                let name = self.in_flight.remove(&e.id()).unwrap_or_default();
                error!(file = %name, error = %e, "conversion worker panicked");
                match report_panicked(ctx, name).await {
                    Ok(result) => self.record(result),
                    Err(e) => self.abort(e, &ctx.cancel_token),
                }
            }
        }
    }

    fn record(&mut self, result: ConversionResult) {
        self.outcome.counters.record(&result);
        self.outcome.results.push(result);
    }

    fn abort(&mut self, e: ReportError, token: &CancellationToken) {
        error!(error = %e, "cannot write run artifacts, stopping");
        token.cancel();
        self.first_error.get_or_insert(e);
    }

    fn finish(self, ctx: &WorkerContext) -> Result<SupervisorOutcome> {
        let mut outcome = self.outcome;
        outcome.peak_concurrency = ctx.occupancy.peak();
        outcome.interrupted = ctx.cancel_token.is_cancelled();
        match self.first_error {
            Some(e) => Err(e.into()),
            None => Ok(outcome),
        }
    }
}

/// Writes the row for a worker that died before producing one.
async fn report_panicked(ctx: &WorkerContext, name: String) -> WorkerResult {
    ctx.journal
        .record(&name, TaskState::Interrupted, "worker panicked")
        .await?;
    let result = ConversionResult {
        timestamp: now(),
        file_name: name,
        status: Status::Fail,
        category: FailureCategory::Crash,
        notes: "Crash: worker panicked".to_string(),
        output_size: -1,
        elapsed: Duration::ZERO,
    };
    ctx.report.append(&result).await?;
    if let Some(progress) = &ctx.progress {
        progress.inc(1);
    }
    Ok(result)
}

/// Runs one task to completion, holding `_permit` throughout.
async fn run_task(
    ctx: Arc<WorkerContext>,
    task: ConversionTask,
    _permit: OwnedSemaphorePermit,
) -> WorkerResult {
    let name = task.file_name();
    let builder = ctx.template.process(&task);
    let command_line = builder.command_line();

    let prepared = tokio::fs::create_dir_all(task.output_dir()).await;
    let spawned = prepared
        .map_err(|e| Box::new(e) as Box<dyn std::error::Error + Send + Sync>)
        .and_then(|()| builder.spawn().map_err(Into::into));

    let (classification, elapsed) = match spawned {
        Err(e) => {
            warn!(file = %name, error = %e, "converter failed to start");
            ctx.journal
                .record(&name, TaskState::SpawnFailed, &e.to_string())
                .await?;
            (Classification::spawn_failed(e.as_ref()), Duration::ZERO)
        }
        Ok(running) => {
            let pid = running.pid().map_or_else(|| "?".to_string(), |p| p.to_string());
            ctx.journal
                .record(&name, TaskState::Running, &format!("pid={pid} cmd={command_line}"))
                .await?;
            debug!(file = %name, pid = %pid, "converter running");

            ctx.occupancy.enter();
            let waited = running.wait(&ctx.cancel_token).await;
            ctx.occupancy.leave();

            match waited {
                Ok(output) => {
                    let state = TaskState::from_termination(output.termination());
                    let detail = format!(
                        "exit={} elapsed={:.1}s",
                        output.exit_code(),
                        output.elapsed().as_secs_f64()
                    );
                    ctx.journal.record(&name, state, &detail).await?;

                    let issues = read_issues(&task);
                    (classify(&output, issues.as_deref()), output.elapsed())
                }
                Err(e) => {
                    warn!(file = %name, error = %e, "lost track of converter");
                    ctx.journal
                        .record(&name, TaskState::Interrupted, &e.to_string())
                        .await?;
                    (Classification::wait_failed(&e), Duration::ZERO)
                }
            }
        }
    };

    let result = ConversionResult {
        timestamp: now(),
        file_name: name,
        status: classification.status,
        category: classification.category,
        notes: classification.notes,
        output_size: artifact_size(task.output_path()),
        elapsed,
    };
    ctx.report.append(&result).await?;

    info!(
        file = %result.file_name,
        status = result.status.as_str(),
        category = result.category.as_str(),
        elapsed_ms = result.elapsed.as_millis(),
        "converted"
    );
    if let Some(progress) = &ctx.progress {
        progress.inc(1);
    }

    Ok(result)
}

#[cfg(test)]
mod tests;
