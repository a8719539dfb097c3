//! Subprocess transport over the provider's stdio pipes

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::Transport;
use crate::config::ClientConfig;
use crate::error::{AcpError, Result};

/// Transport that owns one provider child process and its two pipes
pub struct SubprocessTransport {
    pub(super) config: ClientConfig,
    pub(super) process: Option<Child>,
    pub(super) stdin: Option<ChildStdin>,
    pub(super) stdout: Option<BufReader<ChildStdout>>,
    pub(super) ready: Arc<AtomicBool>,
    pub(super) stderr_ring: Arc<Mutex<VecDeque<String>>>,
    pub(super) reader_task: Option<JoinHandle<()>>,
    pub(super) stderr_task: Option<JoinHandle<()>>,
}

impl SubprocessTransport {
    /// Create a transport for the given provider configuration
    ///
    /// The process is not spawned until [`Transport::connect`] is called.
    #[must_use]
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            process: None,
            stdin: None,
            stdout: None,
            ready: Arc::new(AtomicBool::new(false)),
            stderr_ring: Arc::new(Mutex::new(VecDeque::new())),
            reader_task: None,
            stderr_task: None,
        }
    }

    /// The configuration this transport was built from
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }
}

impl Transport for SubprocessTransport {
    async fn connect(&mut self) -> Result<()> {
        self.connect_impl().await
    }

    async fn write(&mut self, data: &str) -> Result<()> {
        if !self.is_ready() {
            return Err(AcpError::pipe_closed(
                "transport is not ready for writing",
                self.stderr_tail(),
            ));
        }

        let stdin = self.stdin.as_mut().ok_or_else(|| {
            AcpError::pipe_closed("stdin not available", Vec::new())
        })?;

        stdin
            .write_all(data.as_bytes())
            .await
            .map_err(|e| AcpError::pipe_closed(format!("failed to write to stdin: {e}"), Vec::new()))?;

        stdin
            .flush()
            .await
            .map_err(|e| AcpError::pipe_closed(format!("failed to flush stdin: {e}"), Vec::new()))?;

        Ok(())
    }

    fn read_messages(&mut self) -> mpsc::UnboundedReceiver<Result<serde_json::Value>> {
        self.read_messages_impl()
    }

    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    fn stderr_tail(&self) -> Vec<String> {
        self.stderr_ring.lock().iter().cloned().collect()
    }

    async fn close(&mut self) -> Result<()> {
        self.close_impl().await
    }
}

impl Drop for SubprocessTransport {
    fn drop(&mut self) {
        self.drop_impl();
    }
}
