// bimbatch: Parallel DGN/DWG to iModel Batch Conversion Driver
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

use super::custom::CustomFile;
use super::types::{DEFAULT_TIMEOUT_SECS, ProfileSetting, RunConfig};
use super::loader::ConfigSource;
use super::{Config, ConfigLoader};
use crate::logging::LogLevel;
use std::path::{Path, PathBuf};

#[test]
fn test_default_config() {
    let config = Config::default();
    assert_eq!(config.run.timeout_secs, DEFAULT_TIMEOUT_SECS);
    assert_eq!(config.run.reserved_cpus, 2);
    assert_eq!(config.converter.profile, ProfileSetting::Auto);
    assert_eq!(config.report.report_file, "Output_report.csv");
    assert_eq!(config.report.diagnostic_log, "log_file_1.txt");
    assert_eq!(config.report.journal_file, "log_file_2.txt");
    assert!(config.validate().is_ok());
}

#[test]
fn test_parse_sections() {
    let config = Config::parse(
        r#"
        [run]
        timeout_secs = 600
        max_workers = 3

        [converter]
        profile = "dgnv8"

        [converter.args]
        verbose = ""
        "memory-limit" = "4096"

        [log]
        console_level = 4
        "#,
    )
    .unwrap();

    assert_eq!(config.run.timeout_secs, 600);
    assert_eq!(config.run.max_workers, Some(3));
    assert_eq!(config.converter.profile, ProfileSetting::Dgnv8);
    assert_eq!(config.converter.args.get("verbose").map(String::as_str), Some(""));
    assert_eq!(
        config.converter.args.get("memory-limit").map(String::as_str),
        Some("4096")
    );
    assert_eq!(config.log.console_level, LogLevel::DEBUG);
}

#[test]
fn test_unknown_field_rejected() {
    assert!(Config::parse("[run]\nretries = 3\n").is_err());
}

#[test]
fn test_zero_timeout_rejected() {
    let err = Config::parse("[run]\ntimeout_secs = 0\n").unwrap_err();
    assert!(format!("{err:#}").contains("timeout_secs"));
}

#[test]
fn test_loader_overrides_win() {
    let config = ConfigLoader::new()
        .with_toml_str("[run]\nmax_workers = 8\n")
        .with_overrides(&[("run.max_workers", "2")])
        .unwrap()
        .build()
        .unwrap();
    assert_eq!(config.run.max_workers, Some(2));
}

#[test]
fn test_loader_missing_required_file() {
    let result = ConfigLoader::new()
        .with_file("/definitely/not/here/bimbatch.toml")
        .build();
    assert!(result.is_err());
}

#[test]
fn test_loader_tracks_files() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("bimbatch.toml");
    std::fs::write(&path, "[run]\nreserved_cpus = 1\n").unwrap();

    let loader = ConfigLoader::new()
        .with_default_file(temp.path().join("absent.toml"))
        .with_file(&path);
    assert_eq!(loader.sources(), [ConfigSource::File(path.clone())]);
    assert_eq!(
        loader.describe_sources(),
        vec![format!("1. {}", path.display())]
    );

    let config = loader.build().unwrap();
    assert_eq!(config.run.reserved_cpus, 1);
}

#[test]
fn test_worker_budget() {
    let run = RunConfig::default();
    let budgets: Vec<_> = [1, 2, 3, 8, 18, 34, 66]
        .into_iter()
        .map(|cpus| (cpus, run.worker_budget(cpus)))
        .collect();
    insta::assert_debug_snapshot!(budgets, @r"
    [
        (
            1,
            1,
        ),
        (
            2,
            1,
        ),
        (
            3,
            1,
        ),
        (
            8,
            6,
        ),
        (
            18,
            16,
        ),
        (
            34,
            24,
        ),
        (
            66,
            40,
        ),
    ]
    ");
}

#[test]
fn test_worker_budget_fixed() {
    let run = RunConfig {
        max_workers: Some(5),
        ..RunConfig::default()
    };
    assert_eq!(run.worker_budget(64), 5);
    assert_eq!(run.worker_budget(1), 5);
}

#[test]
fn test_profile_setting_parse() {
    assert_eq!("Importer".parse::<ProfileSetting>().unwrap(), ProfileSetting::Importer);
    assert_eq!("DGNV8".parse::<ProfileSetting>().unwrap(), ProfileSetting::Dgnv8);
    assert!("bridge".parse::<ProfileSetting>().is_err());
}

#[test]
fn test_format_options() {
    let config = Config::parse("[converter.args]\nverbose = \"\"\n").unwrap();
    let options = config.format_options();
    assert!(options.iter().any(|l| l.starts_with("converter.args.verbose")));
    assert!(options.iter().any(|l| l.starts_with("run.timeout_secs") && l.ends_with("= 7200")));
    let mut sorted = options.clone();
    sorted.sort();
    assert_eq!(options, sorted);
}

#[test]
fn test_custom_file_parse() {
    let custom = CustomFile::parse(
        r#"
        filter_csv = "prior/Output_report.csv"
        exclude = ["**/backup/**"]

        [args]
        "no-assert-dialogs" = ""

        [files."Plant Model.DGN"]
        "memory-limit" = "8192"
        "#,
        Path::new("/runs/custom"),
    )
    .unwrap();

    assert_eq!(
        custom.filter_csv,
        Some(PathBuf::from("/runs/custom/prior/Output_report.csv"))
    );
    assert_eq!(custom.exclude, vec!["**/backup/**".to_string()]);
    assert!(custom.args.contains_key("no-assert-dialogs"));
    let flags = custom.flags_for("Plant Model.DGN").unwrap();
    assert_eq!(flags.get("memory-limit").map(String::as_str), Some("8192"));
    assert!(custom.flags_for("plant model.dgn").is_none());
}

#[test]
fn test_custom_file_absolute_filter_kept() {
    let custom = CustomFile::parse("filter_csv = \"/abs/report.csv\"\n", Path::new("/x")).unwrap();
    assert_eq!(custom.filter_csv, Some(PathBuf::from("/abs/report.csv")));
}

#[test]
fn test_custom_file_load_errors() {
    let temp = tempfile::tempdir().unwrap();
    assert!(CustomFile::load(&temp.path().join("missing.toml")).is_err());

    let bad = temp.path().join("bad.toml");
    std::fs::write(&bad, "unexpected = 1\n").unwrap();
    let err = CustomFile::load(&bad).unwrap_err();
    assert!(format!("{err:#}").contains("failed to parse config file"));
}

#[test]
fn test_standard_layering_reads_working_dir_file_first() {
    let temp = tempfile::tempdir().unwrap();
    let default_file = temp.path().join("bimbatch.toml");
    let site = temp.path().join("site.toml");
    std::fs::write(&default_file, "[run]\ntimeout_secs = 100\nreserved_cpus = 3\n").unwrap();
    std::fs::write(&site, "[run]\ntimeout_secs = 200\n").unwrap();

    let config = ConfigLoader::new()
        .with_default_file(&default_file)
        .with_file(&site)
        .build()
        .unwrap();
    assert_eq!(config.run.timeout_secs, 200);
    assert_eq!(config.run.reserved_cpus, 3);
}

#[test]
fn test_standard_without_default_file() {
    let loader = ConfigLoader::standard(&[PathBuf::from("/etc/bimbatch/site.toml")], false);
    assert!(matches!(loader.sources().first(), Some(ConfigSource::File(_))));
}

#[test]
fn test_source_display() {
    assert_eq!(ConfigSource::Environment(2).to_string(), "BIMBATCH_* environment (2 set)");
    assert_eq!(
        ConfigSource::WorkingDir(PathBuf::from("bimbatch.toml")).to_string(),
        "bimbatch.toml (working directory)"
    );
}
