// Audio sources feeding the capture loop
//
// A source behaves like a microphone driver: each `read` fills part of the
// caller's buffer with little-endian 16-bit mono PCM and returns how many
// bytes it produced. Returning 0 means "nothing this tick", never end of
// stream, so the capture loop keeps polling until it is told to stop.

use std::collections::VecDeque;
use std::f64::consts::TAU;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use std::time::Duration;
use tracing::info;

use super::format::{PcmFormat, BITS_PER_SAMPLE, BYTES_PER_SAMPLE, CHANNELS};
use crate::error::{RecorderError, Result};

/// Blocking PCM producer polled by the capture loop
pub trait AudioSource: Send {
    /// Read up to `buf.len()` bytes of PCM, returning the number produced
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Format of the PCM this source yields
    fn format(&self) -> PcmFormat;

    /// Source name for logging
    fn name(&self) -> &str;
}

/// Synthetic sine tone, useful for demos and for exercising the pipeline
/// without a microphone
pub struct ToneSource {
    format: PcmFormat,
    frequency_hz: f64,
    amplitude: i16,
    phase: u64,
    /// Sleep for the produced audio's duration after each read
    paced: bool,
}

impl ToneSource {
    pub fn new(format: PcmFormat, frequency_hz: f64, amplitude: i16) -> Self {
        Self {
            format,
            frequency_hz,
            amplitude,
            phase: 0,
            paced: false,
        }
    }

    /// Produce audio no faster than real time
    pub fn paced(mut self) -> Self {
        self.paced = true;
        self
    }

    fn next_sample(&mut self) -> i16 {
        let t = self.phase as f64 / self.format.sample_rate as f64;
        self.phase += 1;
        (f64::from(self.amplitude) * (TAU * self.frequency_hz * t).sin()).round() as i16
    }
}

impl AudioSource for ToneSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let samples = buf.len() / BYTES_PER_SAMPLE;
        for chunk in buf.chunks_exact_mut(BYTES_PER_SAMPLE) {
            let sample = self.next_sample();
            chunk.copy_from_slice(&sample.to_le_bytes());
        }

        let produced = samples * BYTES_PER_SAMPLE;
        if self.paced && produced > 0 {
            std::thread::sleep(self.format.duration_of(produced as u64));
        }

        Ok(produced)
    }

    fn format(&self) -> PcmFormat {
        self.format
    }

    fn name(&self) -> &str {
        "tone"
    }
}

/// Raw headerless PCM file, read front to back
///
/// Once the file is exhausted every read returns 0.
pub struct PcmFileSource {
    file: File,
    format: PcmFormat,
}

impl PcmFileSource {
    pub fn open(path: impl AsRef<Path>, format: PcmFormat) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        info!("Opened raw PCM source: {}", path.display());
        Ok(Self { file, format })
    }
}

impl AudioSource for PcmFileSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf)
    }

    fn format(&self) -> PcmFormat {
        self.format
    }

    fn name(&self) -> &str {
        "pcm-file"
    }
}

/// In-memory source that hands out pre-recorded frames, one per read
///
/// A frame larger than the caller's buffer is split across reads. Once all
/// frames are consumed every read returns 0.
pub struct MemorySource {
    frames: VecDeque<Vec<u8>>,
    format: PcmFormat,
}

impl MemorySource {
    pub fn new(format: PcmFormat, frames: impl IntoIterator<Item = Vec<u8>>) -> Self {
        Self {
            frames: frames.into_iter().collect(),
            format,
        }
    }

    /// Encode `samples` as little-endian PCM split into frames of `frame_bytes`
    pub fn from_samples(format: PcmFormat, samples: &[i16], frame_bytes: usize) -> Self {
        let bytes: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
        let frames = bytes
            .chunks(frame_bytes.max(1))
            .map(<[u8]>::to_vec)
            .collect::<Vec<_>>();
        Self::new(format, frames)
    }

    pub fn remaining_frames(&self) -> usize {
        self.frames.len()
    }
}

impl AudioSource for MemorySource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let Some(frame) = self.frames.front_mut() else {
            return Ok(0);
        };

        let n = frame.len().min(buf.len());
        buf[..n].copy_from_slice(&frame[..n]);

        if n == frame.len() {
            self.frames.pop_front();
        } else {
            *frame = frame.split_off(n);
        }

        Ok(n)
    }

    fn format(&self) -> PcmFormat {
        self.format
    }

    fn name(&self) -> &str {
        "memory"
    }
}

/// Replays the samples of a 16-bit mono WAV file
pub struct WavFileSource {
    inner: MemorySource,
}

impl WavFileSource {
    pub fn open(path: impl AsRef<Path>, frame_duration: Duration) -> Result<Self> {
        let path = path.as_ref();
        let reader = hound::WavReader::open(path).map_err(|e| wav_error(path, e))?;

        let spec = reader.spec();
        if spec.channels != CHANNELS
            || spec.bits_per_sample != BITS_PER_SAMPLE
            || spec.sample_format != hound::SampleFormat::Int
        {
            return Err(RecorderError::InvalidHeader(format!(
                "{}: expected 16-bit mono PCM, got {}-bit {}ch {:?}",
                path.display(),
                spec.bits_per_sample,
                spec.channels,
                spec.sample_format
            )));
        }

        let samples = reader
            .into_samples::<i16>()
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| wav_error(path, e))?;

        let format = PcmFormat::new(spec.sample_rate);
        info!(
            "Opened WAV source: {} ({} samples at {}Hz)",
            path.display(),
            samples.len(),
            spec.sample_rate
        );

        Ok(Self {
            inner: MemorySource::from_samples(format, &samples, format.bytes_for(frame_duration)),
        })
    }
}

impl AudioSource for WavFileSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }

    fn format(&self) -> PcmFormat {
        self.inner.format()
    }

    fn name(&self) -> &str {
        "wav-file"
    }
}

fn wav_error(path: &Path, e: hound::Error) -> RecorderError {
    match e {
        hound::Error::IoError(e) => RecorderError::Io(e),
        e => RecorderError::InvalidHeader(format!("{}: {}", path.display(), e)),
    }
}

/// Build a source from `tone[:HZ]`, `pcm:PATH`, or `wav:PATH`
///
/// Tones are paced to real time; file sources replay their contents in
/// `frame_duration` reads.
pub fn open_source(
    description: &str,
    format: PcmFormat,
    frame_duration: Duration,
) -> Result<Box<dyn AudioSource>> {
    let (kind, arg) = description.split_once(':').unwrap_or((description, ""));

    let source: Box<dyn AudioSource> = match kind {
        "tone" => {
            let frequency = if arg.is_empty() {
                440.0
            } else {
                arg.parse::<f64>().map_err(|_| {
                    RecorderError::Source(format!("invalid tone frequency '{}'", arg))
                })?
            };
            Box::new(ToneSource::new(format, frequency, 8000).paced())
        }
        "pcm" if !arg.is_empty() => Box::new(PcmFileSource::open(arg, format)?),
        "wav" if !arg.is_empty() => Box::new(WavFileSource::open(arg, frame_duration)?),
        _ => {
            return Err(RecorderError::Source(format!(
                "unknown source '{}', expected tone[:HZ], pcm:PATH, or wav:PATH",
                description
            )))
        }
    };

    Ok(source)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_source_splits_large_frames() {
        let mut source = MemorySource::new(PcmFormat::default(), vec![vec![1, 2, 3, 4, 5]]);
        let mut buf = [0u8; 2];

        assert_eq!(source.read(&mut buf).unwrap(), 2);
        assert_eq!(buf, [1, 2]);
        assert_eq!(source.read(&mut buf).unwrap(), 2);
        assert_eq!(buf, [3, 4]);
        assert_eq!(source.read(&mut buf).unwrap(), 1);
        assert_eq!(buf[0], 5);
        assert_eq!(source.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn memory_source_returns_zero_when_exhausted() {
        let mut source = MemorySource::new(PcmFormat::default(), Vec::<Vec<u8>>::new());
        let mut buf = [0u8; 16];
        assert_eq!(source.read(&mut buf).unwrap(), 0);
        assert_eq!(source.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn tone_source_fills_whole_samples_only() {
        let mut source = ToneSource::new(PcmFormat::default(), 440.0, 1000);
        let mut buf = [0u8; 7];
        assert_eq!(source.read(&mut buf).unwrap(), 6);
    }

    #[test]
    fn tone_source_stays_within_amplitude() {
        let mut source = ToneSource::new(PcmFormat::default(), 440.0, 1000);
        let mut buf = vec![0u8; 3200];
        source.read(&mut buf).unwrap();

        let peak = buf
            .chunks_exact(2)
            .map(|c| i16::from_le_bytes([c[0], c[1]]).unsigned_abs())
            .max()
            .unwrap();
        assert!(peak <= 1000);
        assert!(peak > 900);
    }

    #[test]
    fn open_source_keeps_the_underlying_error_kind() {
        let format = PcmFormat::default();
        let frame = Duration::from_millis(100);

        assert!(matches!(
            open_source("mic", format, frame),
            Err(RecorderError::Source(_))
        ));
        assert!(matches!(
            open_source("tone:loud", format, frame),
            Err(RecorderError::Source(_))
        ));
        assert!(matches!(
            open_source("pcm:/nonexistent/take.pcm", format, frame),
            Err(RecorderError::Io(_))
        ));
        assert!(matches!(
            open_source("wav:/nonexistent/take.wav", format, frame),
            Err(RecorderError::Io(_))
        ));

        let dir = tempfile::TempDir::new().unwrap();
        let bogus = dir.path().join("bogus.wav");
        std::fs::write(&bogus, b"not a wav file at all").unwrap();
        assert!(matches!(
            open_source(&format!("wav:{}", bogus.display()), format, frame),
            Err(RecorderError::InvalidHeader(_))
        ));

        let tone = open_source("tone:220", format, frame).unwrap();
        assert_eq!(tone.format(), format);
    }
}
