//! Background readers for the subprocess transport
//!
//! One task drains stdout line-by-line into the message queue; one task
//! drains stderr into a small ring buffer used only for diagnostics.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::Ordering;

use parking_lot::Mutex;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::process::ChildStderr;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::{AcpError, Result};

use super::config::{MAX_LINE_BYTES, STDERR_RING_CAPACITY};
use super::transport::SubprocessTransport;

impl SubprocessTransport {
    /// Spawn the stdout reader task and return its message queue
    ///
    /// Each well-formed line yields one JSON value. Non-JSON and oversized
    /// lines are logged and skipped - a single corrupted line must never
    /// wedge a long-running call. The ready flag drops when the pipe ends so
    /// waiters can classify the closure as a process exit.
    pub(super) fn read_messages_impl(
        &mut self,
    ) -> mpsc::UnboundedReceiver<Result<serde_json::Value>> {
        let (tx, rx) = mpsc::unbounded_channel();

        let stdout = self.stdout.take();
        let ready = self.ready.clone();

        let task = tokio::spawn(async move {
            let Some(mut stdout) = stdout else {
                let _ = tx.send(Err(AcpError::pipe_closed(
                    "not connected - stdout not available",
                    Vec::new(),
                )));
                return;
            };

            let mut buf = Vec::new();
            loop {
                match read_line_capped(&mut stdout, &mut buf).await {
                    Ok(LineRead::Eof) => break,
                    Ok(LineRead::Oversized(len)) => {
                        log::warn!("protocol anomaly: line of {len} bytes exceeds limit, skipped");
                    }
                    Ok(LineRead::Line) => {
                        let Ok(text) = std::str::from_utf8(&buf) else {
                            log::warn!("protocol anomaly: non-UTF-8 line skipped");
                            continue;
                        };
                        let trimmed = text.trim();
                        if trimmed.is_empty() {
                            continue;
                        }
                        match serde_json::from_str::<serde_json::Value>(trimmed) {
                            Ok(value) => {
                                if tx.send(Ok(value)).is_err() {
                                    // Receiver dropped, stop reading.
                                    break;
                                }
                            }
                            Err(e) => {
                                log::warn!("protocol anomaly: non-JSON line skipped: {e}");
                            }
                        }
                    }
                    Err(e) => {
                        let _ = tx.send(Err(AcpError::Io(e)));
                        break;
                    }
                }
            }

            ready.store(false, Ordering::SeqCst);
        });

        self.reader_task = Some(task);

        rx
    }

    /// Spawn the stderr reader task feeding the diagnostic ring buffer
    ///
    /// Stderr lines are short diagnostics, not protocol frames, so plain
    /// `read_line` is enough here.
    pub(super) fn spawn_stderr_reader(
        stderr: ChildStderr,
        ring: Arc<Mutex<VecDeque<String>>>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut reader = BufReader::new(stderr);
            let mut line = String::new();
            loop {
                line.clear();
                match reader.read_line(&mut line).await {
                    Ok(0) | Err(_) => break,
                    Ok(_) => {
                        let trimmed = line.trim_end();
                        if trimmed.is_empty() {
                            continue;
                        }
                        let mut ring = ring.lock();
                        if ring.len() >= STDERR_RING_CAPACITY {
                            ring.pop_front();
                        }
                        ring.push_back(trimmed.to_string());
                    }
                }
            }
        })
    }
}

/// Outcome of one capped line read
#[derive(Debug, PartialEq, Eq)]
enum LineRead {
    /// The stream ended with no more data
    Eof,
    /// One line is in the buffer (trailing newline stripped)
    Line,
    /// The line exceeded [`MAX_LINE_BYTES`]; carries the full length
    Oversized(usize),
}

/// Read one newline-delimited line, buffering at most [`MAX_LINE_BYTES`]
///
/// Bytes past the cap are consumed and dropped as they stream in, so an
/// un-delimited giant line costs bounded memory instead of growing the
/// buffer until the delimiter shows up. A final line without a trailing
/// newline still counts as a line.
async fn read_line_capped<R>(reader: &mut R, buf: &mut Vec<u8>) -> std::io::Result<LineRead>
where
    R: AsyncBufRead + Unpin,
{
    buf.clear();
    let mut total = 0usize;
    loop {
        let chunk = reader.fill_buf().await?;
        if chunk.is_empty() {
            if total > MAX_LINE_BYTES {
                return Ok(LineRead::Oversized(total));
            }
            return Ok(if buf.is_empty() {
                LineRead::Eof
            } else {
                LineRead::Line
            });
        }

        let (segment, delimited) = match chunk.iter().position(|&b| b == b'\n') {
            Some(pos) => (pos, true),
            None => (chunk.len(), false),
        };
        total += segment;
        if total <= MAX_LINE_BYTES {
            buf.extend_from_slice(&chunk[..segment]);
        } else {
            buf.clear();
        }
        reader.consume(if delimited { segment + 1 } else { segment });

        if delimited {
            if total > MAX_LINE_BYTES {
                return Ok(LineRead::Oversized(total));
            }
            return Ok(LineRead::Line);
        }
    }
}
