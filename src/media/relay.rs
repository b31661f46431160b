//! Streams one rendition from the extraction tool's stdout into a response body.
//!
//! A relay owns the child process. It reads the first chunk before the HTTP
//! response is built: until then a failing tool can still be reported as a
//! JSON error. Once a chunk has been handed out the status line is gone, so a
//! later failure can only cut the transfer short.
//!
//! Dropping the relay (client went away) kills the tool.

use super::error::RelayError;
use super::tool::ExtractionTool;
use super::types::RelayRequest;
use crate::utils::human_size;
use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use std::io;
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdout};
use tokio::task::JoinHandle;
use tokio_util::io::ReaderStream;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayPhase {
    /// Headers not sent yet; failures are still reportable.
    Preparing,
    /// At least one chunk left the relay.
    Streaming,
    Complete,
    FailedBeforeStream,
    FailedAfterStream,
}

impl RelayPhase {
    pub fn on_first_chunk(self) -> Self {
        match self {
            RelayPhase::Preparing => RelayPhase::Streaming,
            other => other,
        }
    }

    /// Outcome of the tool exiting (or being killed when `success` is false).
    pub fn on_exit(self, success: bool) -> Self {
        match self {
            RelayPhase::Preparing | RelayPhase::Streaming if success => RelayPhase::Complete,
            RelayPhase::Preparing => RelayPhase::FailedBeforeStream,
            RelayPhase::Streaming => RelayPhase::FailedAfterStream,
            terminal => terminal,
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, RelayPhase::Preparing | RelayPhase::Streaming)
    }
}

struct Relay {
    phase: RelayPhase,
    rendition_id: String,
    child: Child,
    stdout: ReaderStream<ChildStdout>,
    diagnostics: Option<JoinHandle<Option<String>>>,
    stall_timeout: Duration,
    bytes_sent: u64,
    started: Instant,
}

/// A relay whose headers may now be committed.
pub struct RelayStream {
    relay: Relay,
    pending: Option<Bytes>,
}

/// Spawns the tool and waits for its first chunk or its exit.
///
/// Returns `Err` only while the failure is still reportable to the client.
pub async fn start(
    tool: &dyn ExtractionTool,
    request: &RelayRequest,
    stall_timeout: Duration,
) -> Result<RelayStream, RelayError> {
    let mut command = tool.stream_command(&request.source_url, &request.rendition_id);
    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = command.spawn().map_err(RelayError::Spawn)?;
    let stdout = child.stdout.take().ok_or(RelayError::NotPiped)?;
    let stderr = child.stderr.take().ok_or(RelayError::NotPiped)?;

    info!(
        "Relaying rendition {} of {} via {} (pid {:?})",
        request.rendition_id,
        request.source_url,
        tool.name(),
        child.id()
    );

    let diagnostics = tokio::spawn(drain_diagnostics(stderr, request.rendition_id.clone()));
    let mut relay = Relay {
        phase: RelayPhase::Preparing,
        rendition_id: request.rendition_id.clone(),
        child,
        stdout: ReaderStream::new(stdout),
        diagnostics: Some(diagnostics),
        stall_timeout,
        bytes_sent: 0,
        started: Instant::now(),
    };

    match relay.next_chunk().await {
        Ok(Some(chunk)) => {
            relay.phase = relay.phase.on_first_chunk();
            debug!("First chunk of {} bytes, committing headers", chunk.len());
            Ok(RelayStream {
                relay,
                pending: Some(chunk),
            })
        }
        Ok(None) => {
            let status = relay.finish().await?;
            if relay.phase == RelayPhase::Complete {
                Ok(RelayStream {
                    relay,
                    pending: None,
                })
            } else {
                Err(RelayError::Preflight(status))
            }
        }
        Err(e) => {
            relay.abort(&e).await;
            Err(e)
        }
    }
}

impl RelayStream {
    pub fn phase(&self) -> RelayPhase {
        self.relay.phase
    }

    /// Body stream. Ends with an `Err` when the tool fails after data went out,
    /// which makes the server abort the transfer instead of finishing it cleanly.
    pub fn into_body(self) -> impl Stream<Item = io::Result<Bytes>> + Send + 'static {
        futures_util::stream::unfold(Some(self), |state| async move {
            let mut this = state?;

            if let Some(chunk) = this.pending.take() {
                this.relay.bytes_sent += chunk.len() as u64;
                return Some((Ok(chunk), Some(this)));
            }

            if this.relay.phase.is_terminal() {
                return None;
            }

            match this.relay.next_chunk().await {
                Ok(Some(chunk)) => {
                    this.relay.bytes_sent += chunk.len() as u64;
                    Some((Ok(chunk), Some(this)))
                }
                Ok(None) => match this.relay.finish().await {
                    Ok(_) if this.relay.phase == RelayPhase::Complete => None,
                    Ok(status) => Some((Err(io::Error::other(RelayError::MidStream(status))), None)),
                    Err(e) => Some((Err(io::Error::other(e)), None)),
                },
                Err(e) => {
                    this.relay.abort(&e).await;
                    Some((Err(io::Error::other(e)), None))
                }
            }
        })
    }
}

impl Relay {
    async fn next_chunk(&mut self) -> Result<Option<Bytes>, RelayError> {
        match tokio::time::timeout(self.stall_timeout, self.stdout.next()).await {
            Err(_) => Err(RelayError::Stalled(self.stall_timeout)),
            Ok(None) => Ok(None),
            Ok(Some(Err(e))) => Err(RelayError::Read(e)),
            Ok(Some(Ok(chunk))) => Ok(Some(chunk)),
        }
    }

    /// Stdout is at EOF: waits for the exit status and the end of stderr.
    async fn finish(&mut self) -> Result<ExitStatus, RelayError> {
        let status = match tokio::time::timeout(self.stall_timeout, self.child.wait()).await {
            Ok(Ok(status)) => status,
            Ok(Err(e)) => {
                let e = RelayError::Wait(e);
                self.abort(&e).await;
                return Err(e);
            }
            Err(_) => {
                let e = RelayError::Stalled(self.stall_timeout);
                self.abort(&e).await;
                return Err(e);
            }
        };

        let diagnostic = self.join_diagnostics().await;
        self.conclude(status.success(), &status.to_string(), diagnostic);
        Ok(status)
    }

    /// Kills the tool after a stall or read failure.
    async fn abort(&mut self, reason: &RelayError) {
        if let Err(e) = self.child.kill().await {
            debug!("Failed to kill extraction tool: {}", e);
        }
        let diagnostic = self.join_diagnostics().await;
        self.conclude(false, &reason.to_string(), diagnostic);
    }

    async fn join_diagnostics(&mut self) -> Option<String> {
        let handle = self.diagnostics.take()?;
        match tokio::time::timeout(self.stall_timeout, handle).await {
            Ok(Ok(last_line)) => last_line,
            Ok(Err(e)) => {
                debug!("Diagnostics task failed: {}", e);
                None
            }
            Err(_) => {
                debug!("Extraction tool kept stderr open after exit");
                None
            }
        }
    }

    fn conclude(&mut self, success: bool, exit: &str, diagnostic: Option<String>) {
        self.phase = self.phase.on_exit(success);
        let elapsed = self.started.elapsed();
        let diagnostic = diagnostic.unwrap_or_default();

        match self.phase {
            RelayPhase::Complete => info!(
                "Relay of {} complete: {} in {:.1?}",
                self.rendition_id,
                human_size(self.bytes_sent),
                elapsed
            ),
            RelayPhase::FailedBeforeStream => error!(
                "Relay of {} failed before streaming ({}): {}",
                self.rendition_id, exit, diagnostic
            ),
            RelayPhase::FailedAfterStream => error!(
                "Relay of {} failed after {} were sent, client receives a truncated file ({}): {}",
                self.rendition_id,
                human_size(self.bytes_sent),
                exit,
                diagnostic
            ),
            RelayPhase::Preparing | RelayPhase::Streaming => {}
        }
    }
}

impl Drop for Relay {
    fn drop(&mut self) {
        if self.phase.is_terminal() {
            return;
        }

        warn!(
            "Client went away during relay of {} after {}, terminating extraction tool",
            self.rendition_id,
            human_size(self.bytes_sent)
        );
        if let Err(e) = self.child.start_kill() {
            debug!("Failed to kill extraction tool: {}", e);
        }
        if let Some(handle) = self.diagnostics.take() {
            handle.abort();
        }
    }
}

/// Logs the tool's stderr line by line and keeps the last line for failure reports.
async fn drain_diagnostics(stderr: ChildStderr, rendition_id: String) -> Option<String> {
    let mut segments = BufReader::new(stderr).split(b'\n');
    let mut last_line = None;

    loop {
        match segments.next_segment().await {
            Ok(Some(segment)) => {
                let text = String::from_utf8_lossy(&segment);
                let line = text.trim();
                if line.is_empty() {
                    continue;
                }
                if line.starts_with("ERROR") || line.starts_with("WARNING") {
                    warn!("[{}] {}", rendition_id, line);
                } else {
                    debug!("[{}] {}", rendition_id, line);
                }
                last_line = Some(line.to_string());
            }
            Ok(None) => break,
            Err(e) => {
                debug!("Stopped reading extraction tool stderr: {}", e);
                break;
            }
        }
    }

    last_line
}
