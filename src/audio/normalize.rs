use serde::Serialize;
use std::fs::OpenOptions;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use tracing::{debug, info, warn};

use super::format::BYTES_PER_SAMPLE;
use crate::error::Result;

/// Peak magnitude after normalization
pub const TARGET_PEAK: i16 = i16::MAX;

/// Bytes processed per read/write round trip (must stay sample-aligned)
const BLOCK_BYTES: usize = 64 * 1024;

/// Result of peak normalization
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NormalizeOutcome {
    /// Every sample was zero (or there were none); nothing was rescaled
    Silent { samples: u64 },
    /// Samples were multiplied by `gain` so that `peak` maps to full scale
    Scaled { samples: u64, peak: u32, gain: f64 },
}

impl NormalizeOutcome {
    pub fn samples(&self) -> u64 {
        match self {
            NormalizeOutcome::Silent { samples } | NormalizeOutcome::Scaled { samples, .. } => {
                *samples
            }
        }
    }

    pub fn is_silent(&self) -> bool {
        matches!(self, NormalizeOutcome::Silent { .. })
    }
}

/// Largest absolute sample value, widened so |-32768| does not wrap
pub fn peak_of(samples: &[i16]) -> u32 {
    samples
        .iter()
        .map(|s| u32::from(s.unsigned_abs()))
        .max()
        .unwrap_or(0)
}

/// Gain that maps `peak` to full scale
pub fn gain_for(peak: u32) -> f64 {
    f64::from(TARGET_PEAK) / f64::from(peak)
}

/// Multiply and round, clamping to the i16 range
pub fn scale_sample(sample: i16, gain: f64) -> i16 {
    (f64::from(sample) * gain)
        .round()
        .clamp(f64::from(i16::MIN), f64::from(i16::MAX)) as i16
}

/// Peak-normalize samples held in memory
pub fn normalize_samples(samples: &mut [i16]) -> NormalizeOutcome {
    let count = samples.len() as u64;
    let peak = peak_of(samples);
    if peak == 0 {
        return NormalizeOutcome::Silent { samples: count };
    }

    let gain = gain_for(peak);
    for sample in samples.iter_mut() {
        *sample = scale_sample(*sample, gain);
    }

    NormalizeOutcome::Scaled {
        samples: count,
        peak,
        gain,
    }
}

/// Peak-normalize a headerless PCM file in place
pub fn normalize_file(path: impl AsRef<Path>) -> Result<NormalizeOutcome> {
    let path = path.as_ref();
    let mut file = OpenOptions::new().read(true).write(true).open(path)?;
    let len = file.metadata()?.len();

    let outcome = normalize_region(&mut file, 0, len)?;

    match outcome {
        NormalizeOutcome::Silent { samples } => {
            warn!(
                "Silent audio in {} ({} samples), skipping normalization",
                path.display(),
                samples
            );
        }
        NormalizeOutcome::Scaled {
            samples,
            peak,
            gain,
        } => {
            file.sync_all()?;
            info!(
                "Normalized {} ({} samples, peak {} -> {}, gain {:.3})",
                path.display(),
                samples,
                peak,
                TARGET_PEAK,
                gain
            );
        }
    }

    Ok(outcome)
}

/// Peak-normalize the PCM bytes in `[offset, offset + len)` of `store`
///
/// Two passes: the first finds the peak, the second rewrites each block at
/// the same position. A trailing odd byte is left untouched.
pub fn normalize_region<S>(store: &mut S, offset: u64, len: u64) -> Result<NormalizeOutcome>
where
    S: Read + Write + Seek,
{
    let usable = len - len % BYTES_PER_SAMPLE as u64;
    let samples = usable / BYTES_PER_SAMPLE as u64;
    let mut block = vec![0u8; BLOCK_BYTES];

    // Pass 1: peak
    let mut peak = 0u32;
    store.seek(SeekFrom::Start(offset))?;
    let mut remaining = usable;
    while remaining > 0 {
        let n = remaining.min(BLOCK_BYTES as u64) as usize;
        store.read_exact(&mut block[..n])?;
        peak = peak.max(
            block[..n]
                .chunks_exact(BYTES_PER_SAMPLE)
                .map(|c| u32::from(i16::from_le_bytes([c[0], c[1]]).unsigned_abs()))
                .max()
                .unwrap_or(0),
        );
        remaining -= n as u64;
    }

    if peak == 0 {
        return Ok(NormalizeOutcome::Silent { samples });
    }

    let gain = gain_for(peak);
    debug!("Peak {} over {} samples, gain {:.4}", peak, samples, gain);

    // Pass 2: rescale in place
    let mut pos = offset;
    let end = offset + usable;
    while pos < end {
        let n = (end - pos).min(BLOCK_BYTES as u64) as usize;
        store.seek(SeekFrom::Start(pos))?;
        store.read_exact(&mut block[..n])?;

        for chunk in block[..n].chunks_exact_mut(BYTES_PER_SAMPLE) {
            let scaled = scale_sample(i16::from_le_bytes([chunk[0], chunk[1]]), gain);
            chunk.copy_from_slice(&scaled.to_le_bytes());
        }

        store.seek(SeekFrom::Start(pos))?;
        store.write_all(&block[..n])?;
        pos += n as u64;
    }
    store.flush()?;

    Ok(NormalizeOutcome::Scaled {
        samples,
        peak,
        gain,
    })
}
