use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;

use crate::audio::{CaptureReport, NormalizeOutcome, WavHeader};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordingPhase {
    Idle,
    Recording,
    Finalizing,
    Ready,
    Failed,
}

impl RecordingPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordingPhase::Idle => "idle",
            RecordingPhase::Recording => "recording",
            RecordingPhase::Finalizing => "finalizing",
            RecordingPhase::Ready => "ready",
            RecordingPhase::Failed => "failed",
        }
    }

    /// Whether a new session may be started from this phase
    pub fn can_start(&self) -> bool {
        matches!(
            self,
            RecordingPhase::Idle | RecordingPhase::Ready | RecordingPhase::Failed
        )
    }
}

/// A finalized recording, ready for (or already handed to) upload
#[derive(Debug, Clone, Serialize)]
pub struct FinishedRecording {
    pub session_id: String,
    pub path: PathBuf,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub header: WavHeader,
    pub duration_secs: f64,
    pub normalize: NormalizeOutcome,
    pub capture: CaptureReport,
    /// Frames were lost to write failures while recording
    pub degraded: bool,
}

impl FinishedRecording {
    pub fn data_len(&self) -> u64 {
        u64::from(self.header.data_len)
    }
}

/// Snapshot of a recorder for status queries
#[derive(Debug, Clone, Serialize)]
pub struct RecordingStatus {
    pub phase: RecordingPhase,
    pub session_id: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub last_recording: Option<FinishedRecording>,
}
