use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised by a `CaptureDevice` or its open handle.
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceError {
    /// The platform cannot satisfy the requested rate/channels/encoding.
    #[error("unsupported configuration: {0}")]
    Unsupported(String),

    #[error("microphone permission denied")]
    PermissionDenied,

    #[error("device already started")]
    AlreadyStarted,

    #[error("device handle is not open")]
    NotOpen,

    /// The hardware or platform session became invalid mid-capture.
    #[error("device lost: {0}")]
    DeviceLost(String),
}

/// Errors raised by a `FrameSink`.
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SinkError {
    #[error("sink I/O error: {0}")]
    Io(String),

    #[error("sink already closed")]
    Closed,
}

impl From<std::io::Error> for SinkError {
    fn from(err: std::io::Error) -> Self {
        SinkError::Io(err.to_string())
    }
}

/// Errors surfaced by `CaptureSession` and `CaptureService` to their caller.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CaptureError {
    #[error("microphone permission denied")]
    PermissionDenied,

    #[error(transparent)]
    Device(#[from] DeviceError),

    #[error(transparent)]
    Sink(#[from] SinkError),

    #[error("invalid capture configuration: {0}")]
    InvalidConfig(String),

    #[error("a capture session is already active")]
    AlreadyRecording,

    #[error("failed to spawn capture worker: {0}")]
    WorkerSpawn(String),

    #[error("configuration file error: {0}")]
    Config(String),
}

impl CaptureError {
    /// True for errors that leave the session able to start again
    /// without any host intervention.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CaptureError::Device(DeviceError::DeviceLost(_))
                | CaptureError::Sink(_)
                | CaptureError::WorkerSpawn(_)
        )
    }
}
