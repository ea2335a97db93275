// bimbatch: Parallel DGN/DWG to iModel Batch Conversion Driver
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Output streaming and tail capture for child processes.
//!
//! ```text
//! StreamReaders::spawn()
//!   stdout reader task --+
//!   stderr reader task --+--> lines: trace!() and/or bounded tail
//!
//! finish(grace).await --> (stdout_tail, stderr_tail)
//! ```
//!
//! Converter output is not guaranteed to be UTF-8; lines are decoded lossily.

use std::collections::VecDeque;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{ChildStderr, ChildStdout};
use tokio::task::JoinHandle;
use tracing::{trace, warn};

use super::builder::{CAPTURE_TAIL_LINES, StreamFlags};

/// Reader tasks for one child's stdout and stderr.
#[derive(Debug)]
pub(super) struct StreamReaders {
    stdout: Option<JoinHandle<String>>,
    stderr: Option<JoinHandle<String>>,
}

impl StreamReaders {
    /// Starts one reader task per piped stream that needs reading.
    pub(super) fn spawn(
        process_name: &str,
        stdout: Option<ChildStdout>,
        stdout_flags: StreamFlags,
        stderr: Option<ChildStderr>,
        stderr_flags: StreamFlags,
    ) -> Self {
        Self {
            stdout: stdout.and_then(|s| spawn_reader(s, stdout_flags, process_name, "stdout")),
            stderr: stderr.and_then(|s| spawn_reader(s, stderr_flags, process_name, "stderr")),
        }
    }

    /// Waits for both readers to hit EOF and returns the captured tails.
    ///
    /// Readers still running after `grace` are aborted: a killed child may
    /// leave grandchildren holding the pipes open.
    pub(super) async fn finish(self, grace: Duration) -> (String, String) {
        (
            join(self.stdout, grace).await,
            join(self.stderr, grace).await,
        )
    }
}

async fn join(handle: Option<JoinHandle<String>>, grace: Duration) -> String {
    let Some(mut handle) = handle else {
        return String::new();
    };
    match tokio::time::timeout(grace, &mut handle).await {
        Ok(joined) => joined.unwrap_or_default(),
        Err(_) => {
            handle.abort();
            String::new()
        }
    }
}

fn spawn_reader<R>(
    reader: R,
    flags: StreamFlags,
    process_name: &str,
    stream_name: &'static str,
) -> Option<JoinHandle<String>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    if !flags.intersects(StreamFlags::FORWARD_TO_LOG | StreamFlags::KEEP_IN_STRING) {
        return None;
    }
    let process_name = process_name.to_string();
    Some(tokio::spawn(async move {
        read_stream(reader, flags, &process_name, stream_name).await
    }))
}

/// Reads a stream line by line, forwarding and/or keeping the tail.
async fn read_stream<R>(reader: R, flags: StreamFlags, process_name: &str, stream_name: &str) -> String
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut tail: VecDeque<String> = VecDeque::new();
    let mut buf = Vec::new();

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf)
                    .trim_end_matches(['\r', '\n'])
                    .to_string();
                if flags.contains(StreamFlags::FORWARD_TO_LOG) {
                    trace!(process = %process_name, stream = %stream_name, line = %line, "output");
                }
                if flags.contains(StreamFlags::KEEP_IN_STRING) {
                    if tail.len() == CAPTURE_TAIL_LINES {
                        tail.pop_front();
                    }
                    tail.push_back(line);
                }
            }
            Err(e) => {
                warn!(
                    process = %process_name,
                    stream = %stream_name,
                    error = %e,
                    "error reading stream"
                );
                break;
            }
        }
    }

    Vec::from(tail).join("\n")
}
