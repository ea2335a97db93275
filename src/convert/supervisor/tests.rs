// bimbatch: Parallel DGN/DWG to iModel Batch Conversion Driver
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

use super::TaskState;

#[test]
fn test_task_state_names() {
    let names: Vec<&str> = [
        TaskState::Pending,
        TaskState::Running,
        TaskState::Completed,
        TaskState::TimedOut,
        TaskState::Interrupted,
        TaskState::Skipped,
        TaskState::SpawnFailed,
    ]
    .iter()
    .map(TaskState::as_str)
    .collect();
    insta::assert_debug_snapshot!(names, @r#"
    [
        "pending",
        "running",
        "completed",
        "timed-out",
        "interrupted",
        "skipped",
        "spawn-failed",
    ]
    "#);
}

#[cfg(unix)]
mod unix {
    use super::super::{Supervisor, SupervisorOutcome, Tally, WorkerResult, run_task};
    use crate::convert::profile::{CommandTemplate, ConverterArgs, ConverterProfile};
    use crate::convert::report::{Journal, ReportWriter};
    use crate::convert::{ConversionTask, FailureCategory, RunCounters, Status};
    use crate::error::ReportError;
    use std::os::unix::fs::PermissionsExt;
    use std::path::{Path, PathBuf};
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;
    use tokio::sync::Semaphore;
    use tokio::task::JoinSet;
    use tokio_util::sync::CancellationToken;

    /// Behaves according to the input file name prefix.
    const FAKE_CONVERTER: &str = r#"#!/bin/sh
for a in "$@"; do
  case "$a" in
    --input=*) in="${a#--input=}" ;;
    --output=*) out="${a#--output=}" ;;
  esac
done
name=$(basename "$in")
case "$name" in
  pass*) echo bim > "$out"; exit 0 ;;
  crash*) exit 137 ;;
  schema*) printf 'Info: start\nFailed to import ECSchema, line 4\n' > "$out-issues"; exit 3 ;;
  busy*) sleep 0.3; echo bim > "$out"; exit 0 ;;
  slow*) exec sleep 30 ;;
  *) echo "Error: unknown input" >&2; exit 1 ;;
esac
"#;

    struct Fixture {
        temp: TempDir,
        converter: PathBuf,
    }

    impl Fixture {
        fn new() -> Self {
            let temp = tempfile::tempdir().unwrap();
            let converter = temp.path().join("DgnV8Converter");
            std::fs::write(&converter, FAKE_CONVERTER).unwrap();
            std::fs::set_permissions(&converter, std::fs::Permissions::from_mode(0o755)).unwrap();
            std::fs::create_dir_all(temp.path().join("out")).unwrap();
            Self { temp, converter }
        }

        fn input_root(&self) -> PathBuf {
            self.temp.path().join("in")
        }

        fn output_root(&self) -> PathBuf {
            self.temp.path().join("out")
        }

        fn tasks(&self, names: &[&str]) -> Vec<ConversionTask> {
            names
                .iter()
                .map(|name| {
                    ConversionTask::new(
                        &self.input_root().join(name),
                        &self.input_root(),
                        &self.output_root(),
                        ConverterArgs::new(),
                    )
                })
                .collect()
        }

        async fn supervisor(&self, budget: usize, timeout: Duration) -> Supervisor {
            let template = CommandTemplate::new(
                self.converter.clone(),
                ConverterProfile::DgnV8,
                ConverterArgs::new(),
                false,
                timeout,
            );
            let journal = Journal::create(&self.output_root().join("log_file_2.txt"))
                .await
                .unwrap();
            let report = ReportWriter::create(&self.output_root().join("Output_report.csv"))
                .await
                .unwrap();
            Supervisor::new(template, Arc::new(journal), Arc::new(report), budget)
        }

        fn read(&self, name: &str) -> String {
            std::fs::read_to_string(self.output_root().join(name)).unwrap()
        }
    }

    fn result_for<'a>(outcome: &'a SupervisorOutcome, name: &str) -> &'a crate::convert::ConversionResult {
        outcome
            .results
            .iter()
            .find(|r| r.file_name == name)
            .unwrap()
    }

    #[tokio::test]
    async fn test_mixed_outcomes_are_classified() {
        let fixture = Fixture::new();
        let supervisor = fixture.supervisor(3, Duration::from_secs(60)).await;

        let outcome = supervisor
            .run(fixture.tasks(&["pass.dgn", "crash.dgn", "schema.dgn"]))
            .await
            .unwrap();

        assert_eq!(
            outcome.counters,
            RunCounters {
                succeeded: 1,
                failed: 2,
                crashed: 1
            }
        );
        assert_eq!(outcome.dispatched, 3);
        assert_eq!(outcome.skipped, 0);

        let pass = result_for(&outcome, "pass.dgn");
        assert_eq!(pass.status, Status::Pass);
        assert_eq!(pass.output_size, 4);

        let crash = result_for(&outcome, "crash.dgn");
        assert_eq!(crash.category, FailureCategory::Crash);
        assert_eq!(crash.output_size, -1);

        let schema = result_for(&outcome, "schema.dgn");
        assert_eq!(schema.category, FailureCategory::SchemaImportFailure);
        assert_eq!(
            schema.notes,
            "Schema import failure: Failed to import ECSchema, line 4"
        );

        let report = fixture.read("Output_report.csv");
        assert_eq!(report.lines().count(), 4);

        let journal = fixture.read("log_file_2.txt");
        assert_eq!(journal.lines().filter(|l| l.contains(" pending ")).count(), 3);
        assert_eq!(journal.lines().filter(|l| l.contains(" running ")).count(), 3);
        assert_eq!(journal.lines().filter(|l| l.contains(" completed ")).count(), 3);
    }

    #[tokio::test]
    async fn test_general_error_uses_stderr() {
        let fixture = Fixture::new();
        let supervisor = fixture.supervisor(1, Duration::from_secs(60)).await;

        let outcome = supervisor.run(fixture.tasks(&["other.dwg"])).await.unwrap();
        let result = result_for(&outcome, "other.dwg");
        assert_eq!(result.category, FailureCategory::GeneralError);
        assert_eq!(result.notes, "Error: unknown input");
    }

    #[tokio::test]
    async fn test_peak_concurrency_within_budget() {
        let fixture = Fixture::new();
        let supervisor = fixture.supervisor(2, Duration::from_secs(60)).await;

        let names = ["busy1.dgn", "busy2.dgn", "busy3.dgn", "busy4.dgn", "busy5.dgn"];
        let outcome = supervisor.run(fixture.tasks(&names)).await.unwrap();

        assert_eq!(outcome.counters.succeeded, 5);
        assert!(outcome.peak_concurrency >= 1);
        assert!(outcome.peak_concurrency <= 2, "peak {}", outcome.peak_concurrency);
    }

    #[tokio::test]
    async fn test_timeout_is_crash() {
        let fixture = Fixture::new();
        let supervisor = fixture.supervisor(1, Duration::from_millis(300)).await;

        let outcome = supervisor.run(fixture.tasks(&["slow.dgn"])).await.unwrap();
        let result = result_for(&outcome, "slow.dgn");
        assert_eq!(result.status, Status::Fail);
        assert_eq!(result.category, FailureCategory::Crash);
        assert!(result.notes.starts_with("Crash: timed out after"));
        assert_eq!(outcome.counters.crashed, 1);

        assert!(fixture.read("log_file_2.txt").contains(" timed-out "));
    }

    #[tokio::test]
    async fn test_cancellation_skips_pending_tasks() {
        let fixture = Fixture::new();
        let token = CancellationToken::new();
        let supervisor = fixture
            .supervisor(1, Duration::from_secs(60))
            .await
            .with_cancel_token(token.clone());

        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(300)).await;
            canceller.cancel();
        });

        let outcome = supervisor
            .run(fixture.tasks(&["slow1.dgn", "slow2.dgn", "slow3.dgn"]))
            .await
            .unwrap();

        assert!(outcome.interrupted);
        assert_eq!(outcome.dispatched, 1);
        assert_eq!(outcome.skipped, 2);
        assert_eq!(result_for(&outcome, "slow1.dgn").notes, "Crash: interrupted");
        assert_eq!(fixture.read("Output_report.csv").lines().count(), 2);
    }

    #[tokio::test]
    async fn test_missing_converter_yields_row() {
        let fixture = Fixture::new();
        let template = CommandTemplate::new(
            Path::new("/no/such/converter").to_path_buf(),
            ConverterProfile::DgnV8,
            ConverterArgs::new(),
            false,
            Duration::from_secs(5),
        );
        let journal = Journal::create(&fixture.output_root().join("log_file_2.txt"))
            .await
            .unwrap();
        let report = ReportWriter::create(&fixture.output_root().join("Output_report.csv"))
            .await
            .unwrap();
        let supervisor = Supervisor::new(template, Arc::new(journal), Arc::new(report), 1);

        let outcome = supervisor.run(fixture.tasks(&["a.dgn"])).await.unwrap();
        let result = result_for(&outcome, "a.dgn");
        assert_eq!(result.category, FailureCategory::GeneralError);
        assert!(result.notes.starts_with("failed to start converter"));
        assert!(fixture.read("log_file_2.txt").contains(" spawn-failed "));
    }

    async fn failing_worker() -> WorkerResult {
        Err(ReportError::WriteFailed {
            path: "Output_report.csv".to_string(),
            source: std::io::Error::other("no space left on device"),
        })
    }

    async fn panicking_worker() -> WorkerResult {
        panic!("worker bug")
    }

    #[tokio::test]
    async fn test_write_failure_stops_running_converters() {
        let fixture = Fixture::new();
        let supervisor = fixture.supervisor(2, Duration::from_secs(60)).await;
        let ctx = supervisor.context();
        let permit = Arc::new(Semaphore::new(1)).acquire_owned().await.unwrap();

        let mut tally = Tally::default();
        let mut set: JoinSet<WorkerResult> = JoinSet::new();
        let task = fixture.tasks(&["slow.dgn"]).remove(0);
        let slow = set.spawn(run_task(Arc::clone(&ctx), task, permit));
        tally.in_flight.insert(slow.id(), "slow.dgn".to_string());
        let failing = set.spawn(failing_worker());
        tally.in_flight.insert(failing.id(), "broken.dgn".to_string());

        while let Some(joined) = set.join_next_with_id().await {
            tally.collect(joined, &ctx).await;
        }

        assert!(supervisor.cancel_token().is_cancelled());
        assert!(tally.in_flight.is_empty());
        assert_eq!(tally.outcome.results.len(), 1);
        assert_eq!(tally.outcome.results[0].notes, "Crash: interrupted");
        assert!(fixture.read("log_file_2.txt").contains(" interrupted "));

        let err = tally.finish(&ctx).unwrap_err();
        assert!(err.to_string().contains("no space left on device"), "{err}");
    }

    #[tokio::test]
    async fn test_panicked_worker_gets_crash_row() {
        let fixture = Fixture::new();
        let supervisor = fixture.supervisor(1, Duration::from_secs(60)).await;
        let ctx = supervisor.context();

        let mut tally = Tally::default();
        let mut set: JoinSet<WorkerResult> = JoinSet::new();
        let handle = set.spawn(panicking_worker());
        tally.in_flight.insert(handle.id(), "odd.dgn".to_string());

        let joined = set.join_next_with_id().await.unwrap();
        tally.collect(joined, &ctx).await;

        assert_eq!(
            tally.outcome.counters,
            RunCounters {
                succeeded: 0,
                failed: 1,
                crashed: 1
            }
        );
        let report = fixture.read("Output_report.csv");
        assert_eq!(report.lines().count(), 2);
        assert!(report.contains(",odd.dgn,Fail,Crash: worker panicked,-1"), "{report}");
        assert!(!supervisor.cancel_token().is_cancelled());
        assert!(tally.finish(&ctx).is_ok());
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_unwritable_journal_fails_run() {
        let fixture = Fixture::new();
        let template = CommandTemplate::new(
            fixture.converter.clone(),
            ConverterProfile::DgnV8,
            ConverterArgs::new(),
            false,
            Duration::from_secs(60),
        );
        let journal = Journal::create(Path::new("/dev/full")).await.unwrap();
        let report = ReportWriter::create(&fixture.output_root().join("Output_report.csv"))
            .await
            .unwrap();
        let token = CancellationToken::new();
        let supervisor = Supervisor::new(template, Arc::new(journal), Arc::new(report), 2)
            .with_cancel_token(token.clone());

        let result = supervisor
            .run(fixture.tasks(&["slow1.dgn", "slow2.dgn"]))
            .await;

        assert!(result.is_err());
        assert!(token.is_cancelled());
        assert_eq!(fixture.read("Output_report.csv").lines().count(), 1);
    }
}
