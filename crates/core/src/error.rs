use std::path::PathBuf;
use std::time::Duration;

use crate::types::{BoxError, Signal};

/// Errors produced by the coordinator itself.
///
/// Hook and callback failures are forwarded to the error handler as-is;
/// the variants below cover startup and the conditions the coordinator
/// detects on its own.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("shutdown manager `{manager}` failed to start: {source}")]
    ManagerStart {
        manager: String,
        #[source]
        source: BoxError,
    },
    #[error("shutdown callback #{index} panicked")]
    CallbackPanicked { index: usize },
    #[error("{pending} shutdown callback(s) still running after {timeout:?}, aborted")]
    CallbackTimeout { pending: usize, timeout: Duration },
    #[error("no tokio runtime to host the signal listener")]
    NoRuntime,
    #[error("failed to install handler for {signal}: {source}")]
    SignalRegistration {
        signal: Signal,
        #[source]
        source: std::io::Error,
    },
    #[error("{0} is not supported on this platform")]
    UnsupportedSignal(Signal),
    #[error("invalid signal `{0}`")]
    InvalidSignal(String),
    #[error("failed to read config {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
