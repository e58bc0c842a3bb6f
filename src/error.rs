use std::path::PathBuf;

/// Errors raised by the capture, finalization, and upload pipeline.
#[derive(Debug, thiserror::Error)]
pub enum RecorderError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to open sample sink {path:?}: {source}")]
    SinkOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Format mismatch: {0}")]
    FormatMismatch(String),

    #[error("Invalid audio source: {0}")]
    Source(String),

    #[error("Capture task failed: {0}")]
    CaptureTask(String),

    #[error("Invalid WAV header: {0}")]
    InvalidHeader(String),

    #[error("PCM data too large for a WAV header: {0} bytes")]
    DataTooLarge(u64),

    #[error("Upload error: {0}")]
    Upload(String),
}

impl From<reqwest::Error> for RecorderError {
    fn from(e: reqwest::Error) -> Self {
        RecorderError::Upload(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, RecorderError>;
