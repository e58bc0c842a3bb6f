use serde::Serialize;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::format::{PcmFormat, BYTES_PER_SAMPLE};
use super::sink::{file_sink_opener, PcmSink, SinkOpener};
use super::source::AudioSource;
use crate::error::{RecorderError, Result};

/// Capture loop tuning
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Maximum bytes pulled from the source per read
    pub buffer_size: usize,
    /// Pause after a read that produced nothing
    pub idle_backoff: Duration,
}

impl CaptureConfig {
    pub fn for_format(format: &PcmFormat, buffer_duration: Duration) -> Self {
        Self {
            buffer_size: format.bytes_for(buffer_duration).max(BYTES_PER_SAMPLE),
            ..Self::default()
        }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            buffer_size: 3200, // 100ms at 16kHz mono
            idle_backoff: Duration::from_millis(5),
        }
    }
}

/// What the capture loop did, returned when it is joined
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CaptureReport {
    pub bytes_written: u64,
    pub frames_written: u64,
    /// Frames lost to sink write errors
    pub write_failures: u64,
    pub read_failures: u64,
    /// Bytes discarded at stop because they did not form a whole sample
    pub dropped_bytes: u64,
}

impl CaptureReport {
    /// Frames were lost while recording; the file is usable but incomplete
    pub fn is_degraded(&self) -> bool {
        self.write_failures > 0
    }
}

/// Pull frames from `source` into `sink` while `recording` stays true
///
/// The flag is only checked at the top of each iteration, so a frame already
/// being read when stop is requested may be dropped. An odd trailing byte is
/// carried into the next frame so the sink only ever receives whole samples.
pub fn run_capture_loop(
    source: &mut dyn AudioSource,
    sink: &mut dyn PcmSink,
    recording: &AtomicBool,
    config: &CaptureConfig,
) -> CaptureReport {
    let mut report = CaptureReport::default();
    let mut buf = vec![0u8; config.buffer_size.max(BYTES_PER_SAMPLE) + 1];
    let mut carry: Option<u8> = None;

    while recording.load(Ordering::SeqCst) {
        let offset = match carry.take() {
            Some(byte) => {
                buf[0] = byte;
                1
            }
            None => 0,
        };
        let limit = offset + config.buffer_size.max(BYTES_PER_SAMPLE);

        let read = match source.read(&mut buf[offset..limit]) {
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {
                carry = (offset == 1).then_some(buf[0]);
                continue;
            }
            Err(e) => {
                warn!("Audio source {} read failed: {}", source.name(), e);
                report.read_failures += 1;
                carry = (offset == 1).then_some(buf[0]);
                std::thread::sleep(config.idle_backoff);
                continue;
            }
        };

        if read == 0 {
            carry = (offset == 1).then_some(buf[0]);
            if !config.idle_backoff.is_zero() {
                std::thread::sleep(config.idle_backoff);
            }
            continue;
        }

        let total = offset + read;
        let whole = total - total % BYTES_PER_SAMPLE;
        if whole < total {
            carry = Some(buf[whole]);
        }
        if whole == 0 {
            continue;
        }

        match sink.append(&buf[..whole]) {
            Ok(n) => {
                report.bytes_written += n as u64;
                report.frames_written += 1;
            }
            Err(e) => {
                // Frame is lost; keep recording
                error!("Failed to write audio frame to {}: {}", sink.path().display(), e);
                report.write_failures += 1;
            }
        }
    }

    if carry.is_some() {
        report.dropped_bytes += 1;
    }

    report
}

/// Handle to a capture loop running on a dedicated blocking worker
pub struct CaptureHandle {
    path: PathBuf,
    recording: Arc<AtomicBool>,
    task: Option<JoinHandle<Result<CaptureReport>>>,
}

impl CaptureHandle {
    /// Open a fresh sink file at `path` and start capturing from `source`
    ///
    /// Returns once the sink is open. If it cannot be opened the worker exits
    /// without reading and the open error is returned here from the join.
    pub async fn spawn(
        source: Box<dyn AudioSource>,
        path: impl AsRef<Path>,
        config: CaptureConfig,
    ) -> Result<Self> {
        Self::spawn_with(source, path, config, file_sink_opener()).await
    }

    /// Like `spawn`, with the sink opened by `open_sink` on the worker
    pub async fn spawn_with(
        mut source: Box<dyn AudioSource>,
        path: impl AsRef<Path>,
        config: CaptureConfig,
        open_sink: SinkOpener,
    ) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let recording = Arc::new(AtomicBool::new(true));
        let (ready_tx, ready_rx) = oneshot::channel::<bool>();

        let task = {
            let path = path.clone();
            let recording = Arc::clone(&recording);
            tokio::task::spawn_blocking(move || {
                let mut sink = match open_sink(path.as_path()) {
                    Ok(sink) => sink,
                    Err(e) => {
                        error!("Capture loop could not open sink: {}", e);
                        let _ = ready_tx.send(false);
                        return Err(e);
                    }
                };
                let _ = ready_tx.send(true);

                info!(
                    "Capture loop started: {} -> {} ({} byte frames)",
                    source.name(),
                    path.display(),
                    config.buffer_size
                );

                let report = run_capture_loop(source.as_mut(), sink.as_mut(), &recording, &config);
                sink.close()?;

                info!(
                    "Capture loop stopped: {} bytes in {} frames ({} write failures)",
                    report.bytes_written, report.frames_written, report.write_failures
                );

                Ok(report)
            })
        };

        let opened = ready_rx.await.unwrap_or(false);
        let handle = Self {
            path,
            recording,
            task: Some(task),
        };

        if !opened {
            handle.recording.store(false, Ordering::SeqCst);
            return match handle.join().await {
                Err(e) => Err(e),
                Ok(_) => Err(RecorderError::CaptureTask(
                    "capture loop exited before opening its sink".to_string(),
                )),
            };
        }

        Ok(handle)
    }

    /// Sink file the loop is writing
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Ask the loop to exit, then wait until it has. No byte is written to
    /// the sink after this returns.
    pub async fn stop(self) -> Result<CaptureReport> {
        debug!("Signalling capture loop to stop");
        self.recording.store(false, Ordering::SeqCst);
        self.join().await
    }

    async fn join(mut self) -> Result<CaptureReport> {
        let task = self
            .task
            .take()
            .ok_or_else(|| RecorderError::CaptureTask("capture loop already joined".to_string()))?;

        task.await
            .map_err(|e| RecorderError::CaptureTask(e.to_string()))?
    }
}

impl Drop for CaptureHandle {
    fn drop(&mut self) {
        // An abandoned loop must not keep the worker thread alive
        if self.task.is_some() {
            warn!("Capture handle dropped while recording, stopping loop");
            self.recording.store(false, Ordering::SeqCst);
        }
    }
}
