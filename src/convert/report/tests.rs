// bimbatch: Parallel DGN/DWG to iModel Batch Conversion Driver
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

use super::journal::format_line;
use super::{
    Journal, REPORT_HEADER, ReportWriter, RunSummary, format_row, format_timestamp, quote_field,
    split_record,
};
use crate::convert::supervisor::TaskState;
use crate::convert::{ConversionResult, FailureCategory, RunCounters, Status};
use std::time::Duration;
use time::macros::datetime;

fn result(name: &str, status: Status, category: FailureCategory, notes: &str) -> ConversionResult {
    ConversionResult {
        timestamp: datetime!(2026-10-17 09:14:02 UTC),
        file_name: name.to_string(),
        status,
        category,
        notes: notes.to_string(),
        output_size: if status == Status::Pass { 2048 } else { -1 },
        elapsed: Duration::from_secs(5),
    }
}

#[test]
fn test_format_timestamp() {
    assert_eq!(
        format_timestamp(datetime!(2026-01-02 03:04:05 +2)),
        "2026-01-02 03:04:05"
    );
}

#[test]
fn test_quote_field() {
    assert_eq!(quote_field("plain.dgn"), "plain.dgn");
    assert_eq!(quote_field("a,b.dgn"), "\"a,b.dgn\"");
    assert_eq!(quote_field("say \"hi\""), "\"say \"\"hi\"\"\"");
    assert_eq!(quote_field("two\nlines"), "\"two\nlines\"");
}

#[test]
fn test_split_record_handles_quotes() {
    assert_eq!(split_record("a,b,,c"), vec!["a", "b", "", "c"]);
    assert_eq!(
        split_record("\"x,y.dgn\",\"say \"\"hi\"\"\",z"),
        vec!["x,y.dgn", "say \"hi\"", "z"]
    );
}

#[test]
fn test_format_rows() {
    let rows = [
        format_row(&result("a.dgn", Status::Pass, FailureCategory::None, "")),
        format_row(&result(
            "b.dgn",
            Status::Fail,
            FailureCategory::SchemaImportFailure,
            "Schema import failure: Failed to import ECSchema, line 4",
        )),
        format_row(&result("c.dgn", Status::Fail, FailureCategory::Crash, "Crash")),
    ];
    insta::assert_snapshot!(rows.join("\n"), @r#"
    2026-10-17 09:14:02,a.dgn,Pass,,2048
    2026-10-17 09:14:02,b.dgn,Fail,"Schema import failure: Failed to import ECSchema, line 4",-1
    2026-10-17 09:14:02,c.dgn,Fail,Crash,-1
    "#);
}

#[tokio::test]
async fn test_report_writer_header_and_rows() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("Output_report.csv");

    let writer = ReportWriter::create(&path).await.unwrap();
    writer
        .append(&result("a.dgn", Status::Pass, FailureCategory::None, ""))
        .await
        .unwrap();
    writer
        .append(&result("b.dwg", Status::Fail, FailureCategory::GeneralError, "exit code 2"))
        .await
        .unwrap();

    let content = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0], REPORT_HEADER);
    assert_eq!(split_record(lines[2])[1], "b.dwg");
    assert_eq!(split_record(lines[2])[3], "exit code 2");
}

#[tokio::test]
async fn test_report_writer_create_failure() {
    let err = ReportWriter::create(std::path::Path::new("/no/such/dir/report.csv"))
        .await
        .unwrap_err();
    assert!(err.to_string().starts_with("failed to create"));
}

#[test]
fn test_journal_line_format() {
    let line = format_line(
        "2026-10-17 09:14:02",
        TaskState::Running,
        "site/a.dgn",
        "pid=4121",
    );
    insta::assert_snapshot!(line, @"2026-10-17 09:14:02 running     site/a.dgn pid=4121");
    assert_eq!(
        format_line("t", TaskState::Pending, "a.dgn", ""),
        "t pending     a.dgn"
    );
}

#[tokio::test]
async fn test_journal_appends_lines() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("log_file_2.txt");

    let journal = Journal::create(&path).await.unwrap();
    journal.record("a.dgn", TaskState::Pending, "").await.unwrap();
    journal
        .record("a.dgn", TaskState::Completed, "exit=0")
        .await
        .unwrap();

    let content = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].ends_with("pending     a.dgn"));
    assert!(lines[1].ends_with("completed   a.dgn exit=0"));
}

#[test]
fn test_summary_written_as_json() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("Output_summary.json");

    let summary = RunSummary {
        dispatched: 3,
        counters: RunCounters {
            succeeded: 1,
            failed: 2,
            crashed: 1,
        },
        not_found: vec!["gone.dgn".to_string()],
        worker_budget: 4,
        peak_concurrency: 3,
        ..RunSummary::default()
    };
    summary.write(&path).unwrap();

    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(json["succeeded"], 1);
    assert_eq!(json["failed"], 2);
    assert_eq!(json["crashed"], 1);
    assert_eq!(json["not_found"][0], "gone.dgn");
    assert_eq!(json["peak_concurrency"], 3);
}
