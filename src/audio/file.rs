use hound::WavReader;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::info;

use super::header::{WavHeader, HEADER_LEN};
use super::normalize::peak_of;
use crate::error::{RecorderError, Result};

/// A finished recording loaded back from disk
pub struct AudioFile {
    pub path: String,
    pub header: WavHeader,
    pub duration_seconds: f64,
    pub samples: Vec<i16>,
}

impl AudioFile {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening audio file: {}", path.display());

        let mut prefix = [0u8; HEADER_LEN];
        File::open(path)?.read_exact(&mut prefix)?;
        let header = WavHeader::parse(&prefix)?;

        let reader = WavReader::open(path)
            .map_err(|e| RecorderError::InvalidHeader(format!("{}: {}", path.display(), e)))?;
        let samples: Vec<i16> = reader
            .into_samples::<i16>()
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| RecorderError::InvalidHeader(format!("{}: {}", path.display(), e)))?;

        let duration_seconds =
            samples.len() as f64 / (header.sample_rate as f64 * header.channels as f64);

        info!(
            "Audio file loaded: {:.1}s, {}Hz, {} channels, {} samples",
            duration_seconds,
            header.sample_rate,
            header.channels,
            samples.len()
        );

        Ok(Self {
            path: path.display().to_string(),
            header,
            duration_seconds,
            samples,
        })
    }

    /// Largest absolute sample value
    pub fn peak(&self) -> u32 {
        peak_of(&self.samples)
    }
}
