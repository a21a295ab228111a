use std::process::ExitStatus;
use std::time::Duration;
use thiserror::Error;

/// Failures of the media player collaborators (query or transport control)
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} did not finish within {timeout:?}")]
    Timeout { program: String, timeout: Duration },

    #[error("{program} exited with {status}: {stderr}")]
    CommandFailed {
        program: String,
        status: ExitStatus,
        stderr: String,
    },

    #[error("unexpected player reply: {0}")]
    Parse(String),

    #[error("media session error: {0}")]
    Platform(String),
}

impl From<serde_json::Error> for BackendError {
    fn from(value: serde_json::Error) -> Self {
        Self::Parse(value.to_string())
    }
}

/// Failures of the serial channel
#[derive(Debug, Error)]
pub enum LinkError {
    #[error("failed to open serial port {port}: {source}")]
    Open {
        port: String,
        #[source]
        source: serialport::Error,
    },

    #[error("failed to write to serial port: {0}")]
    Write(#[source] std::io::Error),

    #[error("failed to read from serial port: {0}")]
    Read(#[source] std::io::Error),

    #[error("failed to enumerate serial ports: {0}")]
    Enumerate(#[source] serialport::Error),
}
