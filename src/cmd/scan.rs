// bimbatch: Parallel DGN/DWG to iModel Batch Conversion Driver
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! The `scan` command: discovery and filtering without running anything.

use crate::cli::convert::ScanArgs;
use crate::cmd::convert::{Plan, build_plan, global_args, load_custom, require_dir};
use crate::config::Config;
use crate::convert::profile::{CommandTemplate, ConverterProfile};
use crate::error::Result;

/// Lines printed by `scan`: one per file, with its command line when a
/// converter is known, then a count and any unmatched filter names.
///
/// # Errors
///
/// Returns an error if the input directory or custom file is unusable.
pub fn scan(args: &ScanArgs, config: &Config) -> Result<Vec<String>> {
    require_dir(&args.input)?;
    let custom = load_custom(args.custom.as_deref())?;
    let Plan {
        tasks,
        discovered,
        excluded,
        not_found,
    } = build_plan(&args.input, &args.output, &custom)?;

    let template = args.converter.as_ref().map(|converter| {
        let setting = args.profile.unwrap_or(config.converter.profile);
        CommandTemplate::new(
            converter.clone(),
            ConverterProfile::resolve(setting, converter),
            global_args(config, &custom),
            false,
            config.run.timeout(),
        )
    });

    let mut lines: Vec<String> = tasks
        .iter()
        .map(|task| match &template {
            Some(template) => template.process(task).command_line(),
            None => task.input().display().to_string(),
        })
        .collect();

    lines.push(format!(
        "{} file(s) to convert ({discovered} discovered, {excluded} excluded)",
        tasks.len()
    ));
    for name in not_found {
        lines.push(format!("not found: {name}"));
    }
    Ok(lines)
}

/// Run the scan command.
///
/// # Errors
///
/// See [`scan`].
pub fn run_scan_command(args: &ScanArgs, config: &Config) -> Result<()> {
    for line in scan(args, config)? {
        println!("{line}");
    }
    Ok(())
}
