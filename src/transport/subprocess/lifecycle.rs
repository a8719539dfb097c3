//! Lifecycle management for the subprocess transport (connect, close)

use std::process::Stdio;
use std::sync::atomic::Ordering;
use std::time::Duration;

use crate::error::{AcpError, Result};

use super::command::build_command;
use super::config::GRACEFUL_EXIT_SECS;
use super::transport::SubprocessTransport;

impl SubprocessTransport {
    /// Spawn the provider process and set up the stdio pipes
    ///
    /// Idempotent if the process is already running.
    ///
    /// # Errors
    /// Returns error if spawning fails or a pipe handle cannot be obtained
    pub(super) async fn connect_impl(&mut self) -> Result<()> {
        if self.process.is_some() {
            return Ok(());
        }

        let mut cmd = build_command(&self.config)?;

        // Piped stderr keeps the child away from the parent terminal and
        // feeds the diagnostic ring buffer.
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = cmd.spawn().map_err(|e| {
            AcpError::process_exit(
                format!(
                    "failed to start provider {}: {e}",
                    self.config.executable.display()
                ),
                Vec::new(),
            )
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| AcpError::pipe_closed("failed to get stdin handle", Vec::new()))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| AcpError::pipe_closed("failed to get stdout handle", Vec::new()))?;

        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| AcpError::pipe_closed("failed to get stderr handle", Vec::new()))?;

        self.stderr_task = Some(Self::spawn_stderr_reader(stderr, self.stderr_ring.clone()));

        self.stdin = Some(stdin);
        self.stdout = Some(tokio::io::BufReader::new(stdout));
        self.process = Some(child);
        self.ready.store(true, Ordering::SeqCst);

        log::debug!(
            "provider {} started: {}",
            self.config.provider_id,
            self.config.executable.display()
        );

        Ok(())
    }

    /// Close the transport and clean up resources
    ///
    /// Politely: close stdin, wait briefly for a voluntary exit, then kill.
    /// Idempotent.
    ///
    /// # Errors
    /// Returns error if waiting on the process fails
    pub(super) async fn close_impl(&mut self) -> Result<()> {
        self.ready.store(false, Ordering::SeqCst);

        // Closing stdin signals the provider to exit gracefully.
        if let Some(mut stdin) = self.stdin.take() {
            use tokio::io::AsyncWriteExt;
            let _ = stdin.shutdown().await;
        }

        if let Some(mut child) = self.process.take() {
            let grace = Duration::from_secs(GRACEFUL_EXIT_SECS);
            match tokio::time::timeout(grace, child.wait()).await {
                Ok(Ok(status)) => {
                    log::debug!("provider {} exited: {status}", self.config.provider_id);
                }
                Ok(Err(e)) => {
                    return Err(AcpError::Io(e));
                }
                Err(_) => {
                    let _ = child.kill().await;
                    let _ = child.wait().await;
                    log::debug!("provider {} killed after grace period", self.config.provider_id);
                }
            }
        }

        // The reader exits on its own at EOF; join it with a bounded wait.
        if let Some(task) = self.reader_task.take() {
            if tokio::time::timeout(Duration::from_millis(250), task)
                .await
                .is_err()
            {
                log::warn!("stdout reader did not stop in time");
            }
        }
        if let Some(task) = self.stderr_task.take() {
            let _ = tokio::time::timeout(Duration::from_millis(250), task).await;
        }

        self.stdout = None;

        Ok(())
    }

    /// Handle Drop cleanup without an async context
    pub(super) fn drop_impl(&mut self) {
        self.ready.store(false, Ordering::SeqCst);

        if let Some(stdin) = self.stdin.take() {
            drop(stdin);
        }

        if let Some(task) = self.reader_task.take() {
            task.abort();
        }

        if let Some(task) = self.stderr_task.take() {
            task.abort();
        }

        if let Some(mut child) = self.process.take() {
            let _ = child.start_kill();
        }
    }
}
