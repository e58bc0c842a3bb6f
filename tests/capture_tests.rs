// Integration tests for the capture loop
//
// These tests drive the loop with scripted sources and verify that frames
// land in the sink in order, in whole samples, and that failures are
// counted rather than ending the loop.

use anyhow::Result;
use mic_recorder::audio::{
    run_capture_loop, AudioSource, CaptureConfig, CaptureHandle, MemorySource, PcmFormat,
    SampleSink,
};
use mic_recorder::RecorderError;
use std::collections::VecDeque;
use std::fs;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// Scripted read results; clears `recording` once the script runs out
struct ScriptedSource {
    reads: VecDeque<io::Result<Vec<u8>>>,
    recording: Arc<AtomicBool>,
}

impl ScriptedSource {
    fn new(reads: Vec<io::Result<Vec<u8>>>, recording: Arc<AtomicBool>) -> Self {
        Self {
            reads: reads.into(),
            recording,
        }
    }
}

impl AudioSource for ScriptedSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.reads.pop_front() {
            Some(Ok(bytes)) => {
                buf[..bytes.len()].copy_from_slice(&bytes);
                Ok(bytes.len())
            }
            Some(Err(e)) => Err(e),
            None => {
                self.recording.store(false, Ordering::SeqCst);
                Ok(0)
            }
        }
    }

    fn format(&self) -> PcmFormat {
        PcmFormat::default()
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Wraps a source and raises `drained` once it starts returning 0
struct DrainingSource {
    inner: MemorySource,
    drained: Arc<AtomicBool>,
}

impl AudioSource for DrainingSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        if n == 0 {
            self.drained.store(true, Ordering::SeqCst);
        }
        Ok(n)
    }

    fn format(&self) -> PcmFormat {
        self.inner.format()
    }

    fn name(&self) -> &str {
        "draining"
    }
}

fn fast_config() -> CaptureConfig {
    CaptureConfig {
        buffer_size: 3200,
        idle_backoff: Duration::from_millis(1),
    }
}

async fn wait_for(flag: &AtomicBool) {
    while !flag.load(Ordering::SeqCst) {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
}

#[test]
fn test_capture_loop_writes_frames_in_order() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let path = temp_dir.path().join("capture.pcm");
    let recording = Arc::new(AtomicBool::new(true));

    let mut source = ScriptedSource::new(
        vec![Ok(vec![1, 2, 3, 4]), Ok(vec![5, 6])],
        Arc::clone(&recording),
    );
    let mut sink = SampleSink::open(&path)?;

    let report = run_capture_loop(&mut source, &mut sink, &recording, &fast_config());
    sink.close()?;

    assert_eq!(fs::read(&path)?, vec![1, 2, 3, 4, 5, 6]);
    assert_eq!(report.bytes_written, 6);
    assert_eq!(report.frames_written, 2);
    assert!(!report.is_degraded());

    Ok(())
}

#[test]
fn test_capture_loop_carries_odd_bytes_between_frames() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let path = temp_dir.path().join("capture.pcm");
    let recording = Arc::new(AtomicBool::new(true));

    let mut source = ScriptedSource::new(
        vec![Ok(vec![1, 2, 3]), Ok(vec![4]), Ok(vec![5, 6, 7])],
        Arc::clone(&recording),
    );
    let mut sink = SampleSink::open(&path)?;

    let report = run_capture_loop(&mut source, &mut sink, &recording, &fast_config());
    sink.close()?;

    // Byte 7 never completed a sample
    assert_eq!(fs::read(&path)?, vec![1, 2, 3, 4, 5, 6]);
    assert_eq!(report.bytes_written % 2, 0);
    assert_eq!(report.dropped_bytes, 1);

    Ok(())
}

#[test]
fn test_capture_loop_zero_reads_are_not_end_of_stream() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let path = temp_dir.path().join("capture.pcm");
    let recording = Arc::new(AtomicBool::new(true));

    let mut source = ScriptedSource::new(
        vec![Ok(vec![]), Ok(vec![]), Ok(vec![10, 20]), Ok(vec![]), Ok(vec![30, 40])],
        Arc::clone(&recording),
    );
    let mut sink = SampleSink::open(&path)?;

    let report = run_capture_loop(&mut source, &mut sink, &recording, &fast_config());
    sink.close()?;

    assert_eq!(fs::read(&path)?, vec![10, 20, 30, 40]);
    assert_eq!(report.frames_written, 2);

    Ok(())
}

#[test]
fn test_capture_loop_counts_write_failures_and_continues() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let recording = Arc::new(AtomicBool::new(true));

    let mut source = ScriptedSource::new(
        vec![Ok(vec![1, 2]), Ok(vec![3, 4]), Ok(vec![5, 6])],
        Arc::clone(&recording),
    );
    let mut sink = SampleSink::open(temp_dir.path().join("capture.pcm"))?;
    // Every append now fails
    sink.close()?;

    let report = run_capture_loop(&mut source, &mut sink, &recording, &fast_config());

    assert_eq!(report.write_failures, 3);
    assert_eq!(report.bytes_written, 0);
    assert!(report.is_degraded());

    Ok(())
}

#[test]
fn test_capture_loop_survives_read_errors() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let path = temp_dir.path().join("capture.pcm");
    let recording = Arc::new(AtomicBool::new(true));

    let mut source = ScriptedSource::new(
        vec![
            Err(io::Error::new(io::ErrorKind::Other, "device hiccup")),
            Ok(vec![1, 2]),
        ],
        Arc::clone(&recording),
    );
    let mut sink = SampleSink::open(&path)?;

    let report = run_capture_loop(&mut source, &mut sink, &recording, &fast_config());
    sink.close()?;

    assert_eq!(report.read_failures, 1);
    assert_eq!(fs::read(&path)?, vec![1, 2]);
    assert!(!report.is_degraded());

    Ok(())
}

#[test]
fn test_capture_loop_does_not_read_when_already_stopped() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let recording = AtomicBool::new(false);

    let mut source = MemorySource::new(PcmFormat::default(), vec![vec![1, 2]]);
    let mut sink = SampleSink::open(temp_dir.path().join("capture.pcm"))?;

    let report = run_capture_loop(&mut source, &mut sink, &recording, &fast_config());

    assert_eq!(source.remaining_frames(), 1);
    assert_eq!(report.frames_written, 0);

    Ok(())
}

#[tokio::test]
async fn test_capture_handle_records_until_stopped() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let path = temp_dir.path().join("capture.pcm");
    let drained = Arc::new(AtomicBool::new(false));

    let samples: Vec<i16> = (0..1600).map(|i| (i % 200) as i16).collect();
    let source = DrainingSource {
        inner: MemorySource::from_samples(PcmFormat::default(), &samples, 640),
        drained: Arc::clone(&drained),
    };

    let handle = CaptureHandle::spawn(Box::new(source), &path, fast_config()).await?;
    assert_eq!(handle.path(), path.as_path());

    wait_for(&drained).await;
    let report = handle.stop().await?;

    assert_eq!(report.bytes_written, 3200);
    assert_eq!(report.frames_written, 5);
    assert_eq!(fs::metadata(&path)?.len(), 3200);

    let bytes = fs::read(&path)?;
    assert_eq!(i16::from_le_bytes([bytes[2], bytes[3]]), 1);

    Ok(())
}

#[tokio::test]
async fn test_capture_handle_stop_with_no_audio() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let path = temp_dir.path().join("capture.pcm");

    let source = MemorySource::new(PcmFormat::default(), Vec::<Vec<u8>>::new());
    let handle = CaptureHandle::spawn(Box::new(source), &path, fast_config()).await?;
    let report = handle.stop().await?;

    assert_eq!(report.bytes_written, 0);
    assert!(path.exists());
    assert_eq!(fs::metadata(&path)?.len(), 0);

    Ok(())
}

#[tokio::test]
async fn test_capture_handle_reports_sink_open_failure() -> Result<()> {
    let temp_dir = TempDir::new()?;

    let source = MemorySource::new(PcmFormat::default(), vec![vec![1, 2]]);
    // The temp directory itself cannot be opened as a file
    let result = CaptureHandle::spawn(Box::new(source), temp_dir.path(), fast_config()).await;

    assert!(matches!(result, Err(RecorderError::SinkOpen { .. })));

    Ok(())
}
