pub mod audio;
pub mod config;
pub mod error;
pub mod http;
pub mod recorder;
pub mod upload;

pub use audio::{
    open_source, AudioFile, AudioSource, CaptureConfig, CaptureHandle, CaptureReport,
    MemorySource, NormalizeOutcome, PcmFileSource, PcmFormat, SampleSink, ToneSource,
    WavFileSource, WavHeader,
};
pub use config::Config;
pub use error::{RecorderError, Result};
pub use http::{create_router, AppState, SourceFactory};
pub use recorder::{
    finalize_recording, FinishedRecording, Recorder, RecorderOptions, RecordingPhase,
    RecordingStatus, StopOutcome,
};
pub use upload::{HttpUploader, NoopUploader, UploadHandle, UploadReceipt, Uploader};
