// bimbatch: Parallel DGN/DWG to iModel Batch Conversion Driver
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Async process spawning and supervision.
//!
//! ```text
//! ProcessBuilder::new(converter)
//!   .args() .cwd() .timeout() .capture_output()
//!   .spawn()  --> RunningProcess { pid }
//!   .wait(&token)
//!       --> tokio::process::Command
//!           stream stdout/stderr (tail kept)
//!           timeout / cancellation: kill + reap
//!       --> ProcessOutput { exit_code, stdout, stderr, termination, elapsed }
//! ```

pub mod builder;
mod io;
pub mod runner;
