// bimbatch: Parallel DGN/DWG to iModel Batch Conversion Driver
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Process spawning and lifecycle management.
//!
//! ```text
//! ProcessBuilder::spawn()
//!     build_command()  args, cwd, stdio, kill_on_drop
//!          |
//!          v
//!     RunningProcess { pid }        <-- caller journals "running"
//!          |
//!          v
//!     wait(&token)
//!       child exits       --> Exited
//!       timeout elapses   --> kill + reap --> TimedOut
//!       token cancelled   --> kill + reap --> Interrupted
//!          |
//!          v
//!     ProcessOutput { exit_code, stdout, stderr, termination, elapsed }
//! ```
//!
//! A non-zero exit code is not an error here; callers classify it.

use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};
use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use super::builder::{ProcessBuilder, ProcessOutput, StreamFlags, Termination};
use super::io::StreamReaders;
use crate::error::ProcessError;

/// How long output readers may drain after a natural exit.
const DRAIN_GRACE: Duration = Duration::from_secs(30);

/// How long output readers may drain after a kill.
const KILL_GRACE: Duration = Duration::from_secs(2);

/// A spawned child that has not been waited on yet.
#[derive(Debug)]
pub struct RunningProcess {
    builder: ProcessBuilder,
    name: String,
    child: Child,
    pid: Option<u32>,
    started: Instant,
    readers: StreamReaders,
}

impl ProcessBuilder {
    /// Spawns the process without waiting for it.
    ///
    /// # Errors
    ///
    /// Returns `ProcessError::SpawnFailed` if the OS refuses to start it.
    pub fn spawn(self) -> Result<RunningProcess, ProcessError> {
        let name = self.display_name();
        let cmd_line = self.command_line();

        if let Some(cwd) = self.working_dir() {
            debug!(cwd = %cwd.display(), "cd");
        }
        debug!(cmd = %cmd_line, "exec");

        let mut child = self
            .build_command()
            .spawn()
            .map_err(|source| ProcessError::SpawnFailed {
                command: cmd_line,
                source,
            })?;

        let pid = child.id();
        trace!(process = %name, pid = ?pid, "spawned");

        let readers = StreamReaders::spawn(
            &name,
            child.stdout.take(),
            self.stdout_config(),
            child.stderr.take(),
            self.stderr_config(),
        );

        Ok(RunningProcess {
            builder: self,
            name,
            child,
            pid,
            started: Instant::now(),
            readers,
        })
    }

    /// Builds the tokio Command from this builder's configuration.
    fn build_command(&self) -> Command {
        let mut command = Command::new(self.program());
        command.args(self.args_slice());

        if let Some(cwd) = self.working_dir() {
            command.current_dir(cwd);
        }

        command.stdin(Stdio::null());
        command.stdout(Self::stdio_from_flags(self.stdout_config()));
        command.stderr(Self::stdio_from_flags(self.stderr_config()));

        // Runaway converters must not outlive the driver.
        command.kill_on_drop(true);

        command
    }

    /// Converts `StreamFlags` to Stdio configuration.
    fn stdio_from_flags(flags: StreamFlags) -> Stdio {
        if flags.contains(StreamFlags::BIT_BUCKET) {
            Stdio::null()
        } else {
            Stdio::piped()
        }
    }
}

impl RunningProcess {
    /// OS process id, if the child is still known to the OS.
    #[must_use]
    pub const fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Waits for the child, enforcing the builder's timeout and `token`.
    ///
    /// When the timeout elapses or the token is cancelled the child is killed
    /// and reaped before this returns, so it is never left running.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if waiting on or killing the child fails.
    pub async fn wait(mut self, token: &CancellationToken) -> std::io::Result<ProcessOutput> {
        let timeout = self.builder.timeout_duration();
        let sleep = async {
            match timeout {
                Some(duration) => tokio::time::sleep(duration).await,
                None => std::future::pending::<()>().await,
            }
        };

        let (status, termination) = tokio::select! {
            status = self.child.wait() => (status?, Termination::Exited),
            () = sleep => {
                warn!(process = %self.name, timeout = ?timeout, "process timed out, killing");
                (self.kill_and_reap().await?, Termination::TimedOut)
            }
            () = token.cancelled() => {
                warn!(process = %self.name, "cancellation requested, killing");
                (self.kill_and_reap().await?, Termination::Interrupted)
            }
        };

        let elapsed = self.started.elapsed();
        let grace = match termination {
            Termination::Exited => DRAIN_GRACE,
            Termination::TimedOut | Termination::Interrupted => KILL_GRACE,
        };
        let (stdout, stderr) = self.readers.finish(grace).await;
        let exit_code = exit_code_of(status);

        trace!(
            process = %self.name,
            exit_code,
            termination = termination.as_str(),
            elapsed_ms = elapsed.as_millis(),
            "finished"
        );

        Ok(ProcessOutput::new(
            exit_code,
            stdout,
            stderr,
            termination,
            elapsed,
        ))
    }

    async fn kill_and_reap(&mut self) -> std::io::Result<ExitStatus> {
        // kill() already waits, but a racing natural exit makes it fail with
        // InvalidInput; wait() then returns the real status.
        if let Err(e) = self.child.kill().await {
            debug!(process = %self.name, error = %e, "kill failed, child already gone");
        }
        self.child.wait().await
    }
}

/// Exit code of a finished child; signal deaths map to `-signal`.
fn exit_code_of(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return -signal;
        }
    }
    -1
}
