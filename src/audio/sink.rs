use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::{RecorderError, Result};

/// Destination the capture loop appends whole PCM samples to
pub trait PcmSink: Send {
    /// Append `bytes`, returning how many were stored
    fn append(&mut self, bytes: &[u8]) -> Result<usize>;

    /// Make every appended byte durable and release the destination
    fn close(&mut self) -> Result<()>;

    fn path(&self) -> &Path;
}

/// Opens the sink for a new session; runs on the capture worker
pub type SinkOpener = Arc<dyn Fn(&Path) -> Result<Box<dyn PcmSink>> + Send + Sync>;

/// Opener writing each session to a `SampleSink` file
pub fn file_sink_opener() -> SinkOpener {
    Arc::new(|path| Ok(Box::new(SampleSink::open(path)?) as Box<dyn PcmSink>))
}

/// Append-only byte store for captured PCM
///
/// Backed by a single file. Bytes appended before `close()` are durable and
/// readable once it returns.
pub struct SampleSink {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
    bytes_written: u64,
}

impl SampleSink {
    /// Create (or truncate) the sink file at `path`
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| RecorderError::SinkOpen {
                path: path.clone(),
                source,
            })?;
        }

        let file = File::create(&path).map_err(|source| RecorderError::SinkOpen {
            path: path.clone(),
            source,
        })?;

        debug!("Opened sample sink: {}", path.display());

        Ok(Self {
            path,
            writer: Some(BufWriter::new(file)),
            bytes_written: 0,
        })
    }

    /// Append `bytes` at the write cursor
    ///
    /// A failed write is not rolled back; whatever reached the buffer stays.
    pub fn append(&mut self, bytes: &[u8]) -> Result<usize> {
        let writer = self.writer.as_mut().ok_or_else(|| {
            RecorderError::InvalidState(format!("sample sink {:?} is closed", self.path))
        })?;

        writer.write_all(bytes)?;
        self.bytes_written += bytes.len() as u64;

        Ok(bytes.len())
    }

    /// Flush and release the file handle. Calling it again is a no-op.
    pub fn close(&mut self) -> Result<()> {
        if let Some(writer) = self.writer.take() {
            let file = writer.into_inner().map_err(|e| e.into_error())?;
            file.sync_all()?;
            debug!(
                "Closed sample sink {} ({} bytes)",
                self.path.display(),
                self.bytes_written
            );
        }

        Ok(())
    }

    pub fn is_open(&self) -> bool {
        self.writer.is_some()
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PcmSink for SampleSink {
    fn append(&mut self, bytes: &[u8]) -> Result<usize> {
        SampleSink::append(self, bytes)
    }

    fn close(&mut self) -> Result<()> {
        SampleSink::close(self)
    }

    fn path(&self) -> &Path {
        SampleSink::path(self)
    }
}

impl Drop for SampleSink {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!("Failed to close sample sink on drop: {}", e);
        }
    }
}
