//! Extractor subprocess supervision.
//!
//! One extractor process runs per job. The runner owns the child; control
//! operations (pause, cancel) only see an `ExtractorHandle`, a cancellation
//! token that asks the runner to kill the process. That keeps the child out
//! of the shared registry and makes termination safe to request from any
//! task.

use std::io;
use std::process::{ExitStatus, Stdio};

use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::events::{ExtractorEvent, LineBuffer, LineParser};
use crate::jobs::Mode;

/// Errors from launching or waiting on the extractor process.
#[derive(Debug, Error)]
pub enum ExtractorError {
    #[error("Failed to launch extractor: {0}")]
    Spawn(#[source] io::Error),

    #[error("Extractor I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Shared handle to a running extractor process.
///
/// Cloneable and cheap; `terminate` may be called from any task and is
/// idempotent.
#[derive(Debug, Clone)]
pub struct ExtractorHandle {
    token: CancellationToken,
    pid: Option<u32>,
}

impl ExtractorHandle {
    /// Ask the runner to kill the process.
    pub fn terminate(&self) {
        self.token.cancel();
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }
}

/// A spawned extractor process, ready to be driven to completion.
pub struct RunningExtractor {
    child: Child,
    token: CancellationToken,
}

impl RunningExtractor {
    /// Handle for control operations on this process.
    pub fn handle(&self) -> ExtractorHandle {
        ExtractorHandle {
            token: self.token.clone(),
            pid: self.child.id(),
        }
    }

    /// Stream stdout through the line parser, delivering events to
    /// `on_event`, until the process exits or termination is requested.
    ///
    /// Stderr is logged but never drives job state.
    pub async fn drive<F>(mut self, mode: Mode, mut on_event: F) -> Result<ExitStatus, ExtractorError>
    where
        F: FnMut(ExtractorEvent),
    {
        let stdout = self.child.stdout.take();
        let stderr = self.child.stderr.take();

        let stderr_task = stderr.map(|stream| {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stream).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(target: "extractor", "stderr: {}", line);
                }
            })
        });

        let mut parser = LineParser::new(mode);
        let mut buffer = LineBuffer::new();

        if let Some(mut stream) = stdout {
            let mut chunk = [0u8; 4096];
            loop {
                tokio::select! {
                    read = stream.read(&mut chunk) => {
                        match read {
                            Ok(0) => break,
                            Ok(n) => {
                                let text = String::from_utf8_lossy(&chunk[..n]).into_owned();
                                for line in buffer.push(&text) {
                                    debug!(target: "extractor", "stdout: {}", line);
                                    for event in parser.parse(&line) {
                                        on_event(event);
                                    }
                                }
                            }
                            Err(e) => {
                                let _ = self.child.start_kill();
                                let _ = self.child.wait().await;
                                return Err(ExtractorError::Io(e));
                            }
                        }
                    }
                    _ = self.token.cancelled() => {
                        break;
                    }
                }
            }
            if let Some(line) = buffer.finish() {
                for event in parser.parse(&line) {
                    on_event(event);
                }
            }
        }

        if self.token.is_cancelled() {
            let _ = self.child.start_kill();
        }

        let status = self.child.wait().await?;

        if let Some(task) = stderr_task {
            let _ = task.await;
        }

        Ok(status)
    }
}

/// Spawn the extractor with piped stdio.
pub fn spawn_extractor(bin: &str, args: &[String]) -> Result<RunningExtractor, ExtractorError> {
    let child = Command::new(bin)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(ExtractorError::Spawn)?;

    Ok(RunningExtractor {
        child,
        token: CancellationToken::new(),
    })
}

/// Run the extractor to completion and collect its stdout.
///
/// Used for the short-lived invocations (size probe, metadata fetch,
/// version check) where streaming does not matter.
pub async fn run_collecting(bin: &str, args: &[String]) -> Result<String, ExtractorError> {
    let output = Command::new(bin)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(ExtractorError::Spawn)?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        debug!(target: "extractor", "non-zero probe exit: {}", stderr.trim());
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Query the extractor's version string.
pub async fn extractor_version(bin: &str) -> Result<String, ExtractorError> {
    let stdout = run_collecting(bin, &["--version".to_string()]).await?;
    Ok(stdout.trim().to_string())
}
