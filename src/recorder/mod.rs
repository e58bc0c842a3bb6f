//! Recording lifecycle
//!
//! `Recorder` drives one session at a time through
//! idle → recording → finalizing → ready, then hands the finished WAV file
//! to an `Uploader` and returns to idle. Finalization failures leave it in
//! the failed phase and nothing is uploaded.

mod recorder;
mod status;

pub use recorder::{finalize_recording, Recorder, RecorderOptions, StopOutcome};
pub use status::{FinishedRecording, RecordingPhase, RecordingStatus};
