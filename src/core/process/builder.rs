// bimbatch: Parallel DGN/DWG to iModel Batch Conversion Driver
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Process builder with configuration options.
//!
//! ```text
//! ProcessBuilder
//!  • new / resolve_executable
//!  • arg/args/cwd/timeout/name
//!  • capture_output, quiet, stdout_flags/stderr_flags
//!
//! StreamFlags: FORWARD_TO_LOG (default), BIT_BUCKET, KEEP_IN_STRING
//! Termination: Exited | TimedOut | Interrupted
//! ```

use bitflags::bitflags;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ProcessError;

/// Lines of captured output kept per stream; older lines are dropped.
pub const CAPTURE_TAIL_LINES: usize = 200;

bitflags! {
    /// Flags controlling stream handling for stdout/stderr.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct StreamFlags: u32 {
        /// Forward output to tracing logs
        const FORWARD_TO_LOG = 0x01;
        /// Discard output (send to /dev/null)
        const BIT_BUCKET = 0x02;
        /// Keep the tail of the output for later retrieval
        const KEEP_IN_STRING = 0x04;
    }
}

impl Default for StreamFlags {
    fn default() -> Self {
        Self::FORWARD_TO_LOG
    }
}

/// How a supervised process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Termination {
    /// The process exited on its own.
    #[default]
    Exited,
    /// The timeout elapsed and the process was killed.
    TimedOut,
    /// Cancellation was requested and the process was killed.
    Interrupted,
}

impl Termination {
    /// Returns the journal name of this termination.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Exited => "completed",
            Self::TimedOut => "timed-out",
            Self::Interrupted => "interrupted",
        }
    }
}

/// Output from a finished process.
#[derive(Debug, Clone, Default)]
pub struct ProcessOutput {
    exit_code: i32,
    stdout: String,
    stderr: String,
    termination: Termination,
    elapsed: Duration,
}

impl ProcessOutput {
    /// Creates a new `ProcessOutput`.
    #[must_use]
    pub const fn new(
        exit_code: i32,
        stdout: String,
        stderr: String,
        termination: Termination,
        elapsed: Duration,
    ) -> Self {
        Self {
            exit_code,
            stdout,
            stderr,
            termination,
            elapsed,
        }
    }

    /// Returns the exit code; a process killed by signal N reports `-N`.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        self.exit_code
    }

    /// Returns the captured stdout tail (if `KEEP_IN_STRING` was set).
    #[must_use]
    pub fn stdout(&self) -> &str {
        &self.stdout
    }

    /// Returns the captured stderr tail (if `KEEP_IN_STRING` was set).
    #[must_use]
    pub fn stderr(&self) -> &str {
        &self.stderr
    }

    /// Returns how the process ended.
    #[must_use]
    pub const fn termination(&self) -> Termination {
        self.termination
    }

    /// Returns the wall-clock run time.
    #[must_use]
    pub const fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Returns true if the process exited on its own with code 0.
    #[must_use]
    pub const fn success(&self) -> bool {
        self.exit_code == 0 && matches!(self.termination, Termination::Exited)
    }
}

/// Builder for configuring and running a process.
#[derive(Debug, Clone)]
pub struct ProcessBuilder {
    /// Path to the executable
    program: PathBuf,
    /// Command-line arguments
    args: Vec<String>,
    /// Working directory
    cwd: Option<PathBuf>,
    /// Stdout handling
    stdout: StreamFlags,
    /// Stderr handling
    stderr: StreamFlags,
    /// Display name for logging
    name: Option<String>,
    /// Wall-clock limit
    timeout: Option<Duration>,
}

impl ProcessBuilder {
    /// Creates a new `ProcessBuilder` for the given program.
    pub fn new(program: impl AsRef<Path>) -> Self {
        Self {
            program: program.as_ref().to_path_buf(),
            args: Vec::new(),
            cwd: None,
            stdout: StreamFlags::default(),
            stderr: StreamFlags::default(),
            name: None,
            timeout: None,
        }
    }

    /// Resolves a program given as a path or a bare name.
    ///
    /// Anything containing a path separator must exist as a file; a bare name
    /// is looked up in `PATH` with the `which` crate.
    ///
    /// # Errors
    ///
    /// Returns `ProcessError::ExecutableNotFound` if a bare name is not in
    /// `PATH`, and `ProcessError::NotExecutable` if the path is missing, is not
    /// a regular file, or (on Unix) has no execute bit.
    pub fn resolve_executable(program: &Path) -> Result<PathBuf, ProcessError> {
        let is_bare = program.components().count() == 1 && !program.exists();
        let path = if is_bare {
            which::which(program).map_err(|_| ProcessError::ExecutableNotFound {
                name: program.display().to_string(),
            })?
        } else {
            program.to_path_buf()
        };

        let not_executable = || ProcessError::NotExecutable {
            path: path.display().to_string(),
        };
        let meta = std::fs::metadata(&path).map_err(|_| not_executable())?;
        if !meta.is_file() {
            return Err(not_executable());
        }
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if meta.permissions().mode() & 0o111 == 0 {
                return Err(not_executable());
            }
        }
        Ok(path)
    }

    /// Adds an argument to the command.
    #[must_use]
    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_string_lossy().into_owned());
        self
    }

    /// Adds multiple arguments to the command.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        for arg in args {
            self.args.push(arg.as_ref().to_string_lossy().into_owned());
        }
        self
    }

    /// Sets the working directory for the process.
    #[must_use]
    pub fn cwd(mut self, dir: impl AsRef<Path>) -> Self {
        self.cwd = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Configures stdout handling.
    #[must_use]
    pub const fn stdout_flags(mut self, flags: StreamFlags) -> Self {
        self.stdout = flags;
        self
    }

    /// Configures stderr handling.
    #[must_use]
    pub const fn stderr_flags(mut self, flags: StreamFlags) -> Self {
        self.stderr = flags;
        self
    }

    /// Convenience: log and keep the tail of both streams.
    #[must_use]
    pub const fn capture_output(self) -> Self {
        let flags = StreamFlags::FORWARD_TO_LOG.union(StreamFlags::KEEP_IN_STRING);
        self.stdout_flags(flags).stderr_flags(flags)
    }

    /// Convenience: discard all output.
    #[must_use]
    pub const fn quiet(self) -> Self {
        self.stdout_flags(StreamFlags::BIT_BUCKET)
            .stderr_flags(StreamFlags::BIT_BUCKET)
    }

    /// Sets a display name for logging.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets a timeout for the process.
    #[must_use]
    pub const fn timeout(mut self, duration: Duration) -> Self {
        self.timeout = Some(duration);
        self
    }

    /// Returns a reference to the program path.
    #[must_use]
    pub const fn program(&self) -> &PathBuf {
        &self.program
    }

    /// Returns the arguments.
    #[must_use]
    pub fn args_slice(&self) -> &[String] {
        &self.args
    }

    /// Returns the display name for this process.
    #[must_use]
    pub fn display_name(&self) -> String {
        self.name.clone().unwrap_or_else(|| {
            self.program.file_stem().map_or_else(
                || "process".to_string(),
                |s| s.to_string_lossy().into_owned(),
            )
        })
    }

    /// Returns the full command line as one shell-style string.
    #[must_use]
    pub fn command_line(&self) -> String {
        use std::fmt::Write as _;
        let mut cmd = quote_arg(&self.program.display().to_string());
        for arg in &self.args {
            let _ = write!(cmd, " {}", quote_arg(arg));
        }
        cmd
    }

    pub(super) const fn working_dir(&self) -> Option<&PathBuf> {
        self.cwd.as_ref()
    }

    pub(super) const fn stdout_config(&self) -> StreamFlags {
        self.stdout
    }

    pub(super) const fn stderr_config(&self) -> StreamFlags {
        self.stderr
    }

    pub(super) const fn timeout_duration(&self) -> Option<Duration> {
        self.timeout
    }
}

/// Quotes an argument that contains whitespace or is empty.
fn quote_arg(arg: &str) -> String {
    if arg.is_empty() || arg.contains(char::is_whitespace) {
        format!("\"{}\"", arg.replace('"', "\\\""))
    } else {
        arg.to_string()
    }
}
