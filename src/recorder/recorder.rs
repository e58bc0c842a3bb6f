use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::status::{FinishedRecording, RecordingPhase, RecordingStatus};
use crate::audio::{
    file_sink_opener, normalize_file, prepend_header, AudioSource, CaptureConfig, CaptureHandle,
    NormalizeOutcome, PcmFormat, SinkOpener, WavHeader,
};
use crate::config::RecorderConfig;
use crate::error::{RecorderError, Result};
use crate::upload::{UploadHandle, Uploader};

/// Where and how a recorder captures
#[derive(Debug, Clone)]
pub struct RecorderOptions {
    pub output_dir: PathBuf,
    pub format: PcmFormat,
    pub capture: CaptureConfig,
}

impl From<&RecorderConfig> for RecorderOptions {
    fn from(config: &RecorderConfig) -> Self {
        Self {
            output_dir: config.output_dir.clone(),
            format: config.format(),
            capture: config.capture(),
        }
    }
}

/// Result of `Recorder::stop`
pub enum StopOutcome {
    /// No session was recording; nothing happened
    NotRecording,
    /// The session was finalized and its upload started
    Finished {
        recording: FinishedRecording,
        upload: UploadHandle,
    },
}

/// The session currently capturing
struct ActiveSession {
    id: String,
    started_at: DateTime<Utc>,
    capture: CaptureHandle,
}

/// A session whose capture loop was told to stop and is being finalized
///
/// The join, finalization, and upload handoff run on their own task, so a
/// caller that abandons `stop` does not abandon the recording.
struct StoppingSession {
    id: String,
    task: JoinHandle<Result<(FinishedRecording, UploadHandle)>>,
}

/// Single-session recording state machine
pub struct Recorder {
    options: RecorderOptions,
    uploader: Arc<dyn Uploader>,
    open_sink: SinkOpener,
    phase: RecordingPhase,
    active: Option<ActiveSession>,
    stopping: Option<StoppingSession>,
    last_error: Option<String>,
    last_recording: Option<FinishedRecording>,
}

impl Recorder {
    pub fn new(options: RecorderOptions, uploader: Arc<dyn Uploader>) -> Self {
        info!(
            "Recorder initialized: {} ({}Hz mono, upload via {})",
            options.output_dir.display(),
            options.format.sample_rate,
            uploader.name()
        );

        Self {
            options,
            uploader,
            open_sink: file_sink_opener(),
            phase: RecordingPhase::Idle,
            active: None,
            stopping: None,
            last_error: None,
            last_recording: None,
        }
    }

    /// Capture into sinks from `open_sink` instead of plain files
    pub fn with_sink_opener(mut self, open_sink: SinkOpener) -> Self {
        self.open_sink = open_sink;
        self
    }

    pub fn phase(&self) -> RecordingPhase {
        self.phase
    }

    pub fn is_recording(&self) -> bool {
        self.active.is_some()
    }

    pub fn status(&self) -> RecordingStatus {
        let session_id = match (&self.active, &self.stopping) {
            (Some(active), _) => Some(active.id.clone()),
            (None, Some(stopping)) => Some(stopping.id.clone()),
            (None, None) => None,
        };

        RecordingStatus {
            phase: self.phase,
            session_id,
            started_at: self.active.as_ref().map(|s| s.started_at),
            last_error: self.last_error.clone(),
            last_recording: self.last_recording.clone(),
        }
    }

    /// Start capturing `source` into a fresh file; returns the session id
    pub async fn start(&mut self, source: Box<dyn AudioSource>) -> Result<String> {
        if !self.phase.can_start() || self.active.is_some() || self.stopping.is_some() {
            return Err(RecorderError::InvalidState(format!(
                "cannot start recording while {}",
                self.phase.as_str()
            )));
        }

        let source_format = source.format();
        if source_format != self.options.format {
            return Err(RecorderError::FormatMismatch(format!(
                "source {} produces {}Hz, recorder expects {}Hz",
                source.name(),
                source_format.sample_rate,
                self.options.format.sample_rate
            )));
        }

        let id = format!("recording-{}", uuid::Uuid::new_v4());
        let path = self.options.output_dir.join(format!("{id}.wav"));
        info!("Starting recording session {} -> {}", id, path.display());

        let capture = CaptureHandle::spawn_with(
            source,
            &path,
            self.options.capture.clone(),
            Arc::clone(&self.open_sink),
        )
        .await?;

        self.active = Some(ActiveSession {
            id: id.clone(),
            started_at: Utc::now(),
            capture,
        });
        self.phase = RecordingPhase::Recording;
        self.last_error = None;

        Ok(id)
    }

    /// Stop capturing, finalize the file, and hand it to the uploader
    ///
    /// Waits for the capture loop to exit before touching the file. The
    /// upload runs in the background; `stop` never waits for it. If this
    /// future is dropped early, finalization carries on and the next `stop`
    /// call picks up its result.
    pub async fn stop(&mut self) -> Result<StopOutcome> {
        if let Some(session) = self.active.take() {
            info!("Stopping recording session {}", session.id);
            self.phase = RecordingPhase::Finalizing;
            self.stopping = Some(StoppingSession {
                id: session.id.clone(),
                task: tokio::spawn(finish_session(
                    session,
                    self.options.format,
                    Arc::clone(&self.uploader),
                )),
            });
        }

        let Some(stopping) = self.stopping.as_mut() else {
            debug!("Stop requested with no active session");
            return Ok(StopOutcome::NotRecording);
        };
        let session_id = stopping.id.clone();
        let joined = (&mut stopping.task).await;
        self.stopping = None;

        let finished = joined
            .map_err(|e| RecorderError::CaptureTask(e.to_string()))
            .and_then(|result| result);

        match finished {
            Ok((recording, upload)) => {
                self.last_recording = Some(recording.clone());
                self.phase = RecordingPhase::Idle;
                Ok(StopOutcome::Finished { recording, upload })
            }
            Err(e) => Err(self.fail(&session_id, e)),
        }
    }

    fn fail(&mut self, session_id: &str, e: RecorderError) -> RecorderError {
        error!("Recording session {} failed: {}", session_id, e);
        self.phase = RecordingPhase::Failed;
        self.last_error = Some(e.to_string());
        e
    }
}

/// Join the capture loop, finalize its file off the async workers, and start
/// the upload
async fn finish_session(
    session: ActiveSession,
    format: PcmFormat,
    uploader: Arc<dyn Uploader>,
) -> Result<(FinishedRecording, UploadHandle)> {
    let path = session.capture.path().to_path_buf();
    let report = session.capture.stop().await?;

    let (normalize, header) = {
        let path = path.clone();
        tokio::task::spawn_blocking(move || finalize_recording(&path, &format))
            .await
            .map_err(|e| RecorderError::CaptureTask(e.to_string()))??
    };

    let degraded = report.is_degraded();
    if degraded {
        warn!(
            "Session {} lost {} frames to write failures",
            session.id, report.write_failures
        );
    }

    let recording = FinishedRecording {
        session_id: session.id,
        path: path.clone(),
        started_at: session.started_at,
        finished_at: Utc::now(),
        duration_secs: format
            .duration_of(u64::from(header.data_len))
            .as_secs_f64(),
        header,
        normalize,
        capture: report,
        degraded,
    };

    info!(
        "Recording {} ready: {} ({:.1}s)",
        recording.session_id,
        path.display(),
        recording.duration_secs
    );

    let upload = UploadHandle::spawn(uploader, path);
    Ok((recording, upload))
}

/// Normalize a headerless PCM file in place, then prepend its WAV header
///
/// Normalization failure aborts before the header is written.
pub fn finalize_recording(
    path: impl AsRef<Path>,
    format: &PcmFormat,
) -> Result<(NormalizeOutcome, WavHeader)> {
    let path = path.as_ref();
    let normalize = normalize_file(path)?;
    let header = prepend_header(path, format)?;
    Ok((normalize, header))
}
