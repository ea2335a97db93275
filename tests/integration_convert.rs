// bimbatch: Parallel DGN/DWG to iModel Batch Conversion Driver
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! End-to-end batch runs against a scripted converter.

#![cfg(unix)]

use bimbatch::cli::convert::{ConvertArgs, ScanArgs, YesNo};
use bimbatch::cmd::convert::{convert, format_summary};
use bimbatch::cmd::scan::scan;
use bimbatch::config::Config;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

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
  crash*) exit 139 ;;
  schema*) echo 'Failed to transform element 12' > "$out-issues"; exit 2 ;;
  *) echo "Fatal: bad file" >&2; exit 1 ;;
esac
"#;

struct Workspace {
    temp: TempDir,
}

impl Workspace {
    fn new(inputs: &[&str]) -> Self {
        let temp = tempfile::tempdir().unwrap();
        let converter = temp.path().join("DgnV8Converter");
        fs::write(&converter, FAKE_CONVERTER).unwrap();
        fs::set_permissions(&converter, fs::Permissions::from_mode(0o755)).unwrap();
        for input in inputs {
            let path = temp.path().join("in").join(input);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, b"design").unwrap();
        }
        Self { temp }
    }

    fn path(&self, rel: &str) -> PathBuf {
        self.temp.path().join(rel)
    }

    fn args(&self) -> ConvertArgs {
        ConvertArgs {
            converter: self.path("DgnV8Converter"),
            input: self.path("in"),
            output: self.path("out"),
            custom: None,
            ibim_flag: None,
            profile: None,
            jobs: Some(2),
            timeout: Some(60),
            fail_on_error: false,
            no_progress: true,
        }
    }

    fn read_output(&self, name: &str) -> String {
        fs::read_to_string(self.path("out").join(name)).unwrap()
    }
}

fn report_rows(report: &str) -> Vec<(String, String, String)> {
    let mut rows: Vec<(String, String, String)> = report
        .lines()
        .skip(1)
        .map(|line| {
            let fields: Vec<&str> = line.splitn(5, ',').collect();
            (
                fields[1].to_string(),
                fields[2].to_string(),
                fields[4].to_string(),
            )
        })
        .collect();
    rows.sort();
    rows
}

#[tokio::test]
async fn test_mixed_batch_writes_report_and_summary() {
    let ws = Workspace::new(&["pass.dgn", "nested/crash.dwg", "schema.DGN", "notes.txt"]);

    let summary = convert(&ws.args(), &Config::default(), CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.discovered, 3);
    assert_eq!(summary.dispatched, 3);
    assert_eq!(summary.counters.succeeded, 1);
    assert_eq!(summary.counters.failed, 2);
    assert_eq!(summary.counters.crashed, 1);
    assert!(summary.peak_concurrency <= 2);
    assert!(!summary.interrupted);

    let report = ws.read_output("Output_report.csv");
    assert_eq!(report.lines().next(), Some("Date,Name,Result,Notes,bim_size"));
    insta::assert_debug_snapshot!(report_rows(&report), @r#"
    [
        (
            "crash.dwg",
            "Fail",
            "-1",
        ),
        (
            "pass.dgn",
            "Pass",
            "4",
        ),
        (
            "schema.DGN",
            "Fail",
            "-1",
        ),
    ]
    "#);
    assert!(report.contains("Schema import failure: Failed to transform element 12"));

    assert!(ws.path("out/pass.bim").is_file());
    assert!(ws.path("out/nested").is_dir());

    let json: serde_json::Value =
        serde_json::from_str(&ws.read_output("Output_summary.json")).unwrap();
    assert_eq!(json["succeeded"], 1);
    assert_eq!(json["failed"], 2);
    assert_eq!(json["crashed"], 1);
    assert_eq!(json["profile"], "dgnv8");

    let journal = ws.read_output("log_file_2.txt");
    assert_eq!(journal.lines().filter(|l| l.contains(" completed ")).count(), 3);
}

#[tokio::test]
async fn test_general_error_notes_from_stderr() {
    let ws = Workspace::new(&["broken.dgn"]);

    let summary = convert(&ws.args(), &Config::default(), CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(summary.counters.failed, 1);
    assert_eq!(summary.counters.crashed, 0);
    assert!(ws.read_output("Output_report.csv").contains("Fatal: bad file"));
}

#[tokio::test]
async fn test_filter_csv_selects_and_reports_missing() {
    let ws = Workspace::new(&["pass.dgn", "pass2.dgn", "crash.dgn"]);
    fs::write(
        ws.path("previous.csv"),
        "Date,Name,Result,Notes,bim_size\n\
         2026-01-01 00:00:00,crash.dgn,Fail,Crash,-1\n\
         2026-01-01 00:00:00,gone.dgn,Fail,Crash,-1\n",
    )
    .unwrap();
    fs::write(
        ws.path("custom.toml"),
        "filter_csv = \"previous.csv\"\n\n[args]\nverbose = \"\"\n",
    )
    .unwrap();

    let mut args = ws.args();
    args.custom = Some(ws.path("custom.toml"));
    let summary = convert(&args, &Config::default(), CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.discovered, 3);
    assert_eq!(summary.dispatched, 1);
    assert_eq!(summary.not_found, vec!["gone.dgn".to_string()]);
    assert_eq!(summary.counters.crashed, 1);

    let lines = format_summary(&summary, Path::new("out/Output_report.csv"));
    assert!(lines.contains(&"Not found: gone.dgn".to_string()));
}

#[tokio::test]
async fn test_ibim_flag_rejected_for_dgnv8() {
    let ws = Workspace::new(&["pass.dgn"]);
    let mut args = ws.args();
    args.ibim_flag = Some(YesNo::Yes);

    let err = convert(&args, &Config::default(), CancellationToken::new())
        .await
        .unwrap_err();
    assert!(err.to_string().contains("ibim-flag"), "{err}");
    assert!(!ws.path("out/Output_report.csv").exists());
}

#[tokio::test]
async fn test_missing_input_dir_fails() {
    let ws = Workspace::new(&[]);
    let mut args = ws.args();
    args.input = ws.path("nowhere");

    let err = convert(&args, &Config::default(), CancellationToken::new())
        .await
        .unwrap_err();
    assert!(err.to_string().contains("path not found"), "{err}");
}

#[tokio::test]
async fn test_empty_input_dir_writes_header_only() {
    let ws = Workspace::new(&["readme.txt"]);

    let summary = convert(&ws.args(), &Config::default(), CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(summary.dispatched, 0);
    assert_eq!(summary.counters.total(), 0);
    assert_eq!(ws.read_output("Output_report.csv").lines().count(), 1);
}

#[test]
fn test_scan_lists_command_lines() {
    let ws = Workspace::new(&["a.dgn", "sub/b.dwg", "skip/c.dgn"]);
    fs::write(ws.path("custom.toml"), "exclude = [\"skip/**\"]\n").unwrap();

    let args = ScanArgs {
        input: ws.path("in"),
        custom: Some(ws.path("custom.toml")),
        converter: Some(ws.path("DgnV8Converter")),
        output: ws.path("out"),
        profile: None,
    };
    let lines = scan(&args, &Config::default()).unwrap();

    assert_eq!(lines.len(), 3);
    assert!(lines[0].contains("--input="));
    assert!(lines[0].contains("a.dgn"));
    assert!(lines[1].contains("b.dwg"));
    assert_eq!(lines[2], "2 file(s) to convert (3 discovered, 1 excluded)");
}
