use std::io;
use std::process::ExitStatus;
use std::time::Duration;

/// Why a describe invocation produced no descriptor. Details stay server-side.
#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    #[error("failed to run extraction tool: {0}")]
    Spawn(#[source] io::Error),
    #[error("extraction tool timed out after {0:?}")]
    TimedOut(Duration),
    #[error("extraction tool exited with {status}: {diagnostic}")]
    Failed {
        status: ExitStatus,
        diagnostic: String,
    },
    #[error("extraction tool returned malformed output: {0}")]
    Malformed(#[source] serde_json::Error),
}

/// Failures of a relay. Only those raised before the first byte reach the client.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("failed to spawn extraction tool: {0}")]
    Spawn(#[source] io::Error),
    #[error("extraction tool output was not piped")]
    NotPiped,
    #[error("extraction tool exited with {0} before sending any data")]
    Preflight(ExitStatus),
    #[error("extraction tool exited with {0} after streaming started")]
    MidStream(ExitStatus),
    #[error("extraction tool produced no data for {0:?}")]
    Stalled(Duration),
    #[error("failed to read extraction tool output: {0}")]
    Read(#[source] io::Error),
    #[error("failed to wait for extraction tool: {0}")]
    Wait(#[source] io::Error),
}
