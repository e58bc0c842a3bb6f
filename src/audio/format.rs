use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default capture rate (16kHz mono, what speech-to-text services expect)
pub const DEFAULT_SAMPLE_RATE: u32 = 16000;

/// Only mono capture is supported
pub const CHANNELS: u16 = 1;

/// Only 16-bit signed PCM is supported
pub const BITS_PER_SAMPLE: u16 = 16;

/// Bytes occupied by a single sample on the wire
pub const BYTES_PER_SAMPLE: usize = 2;

/// Highest sample rate accepted from configuration
pub const MAX_SAMPLE_RATE: u32 = 384_000;

/// Format of the captured PCM stream
///
/// Channel count and sample width are fixed; only the sample rate is configurable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PcmFormat {
    pub sample_rate: u32,
}

impl PcmFormat {
    pub fn new(sample_rate: u32) -> Self {
        Self { sample_rate }
    }

    pub fn channels(&self) -> u16 {
        CHANNELS
    }

    pub fn bits_per_sample(&self) -> u16 {
        BITS_PER_SAMPLE
    }

    /// Bytes per sample frame across all channels
    pub fn block_align(&self) -> u16 {
        CHANNELS * BITS_PER_SAMPLE / 8
    }

    pub fn byte_rate(&self) -> u32 {
        self.sample_rate
            .saturating_mul(u32::from(CHANNELS) * u32::from(BITS_PER_SAMPLE) / 8)
    }

    /// Number of bytes covering `duration` of audio, rounded down to whole samples
    pub fn bytes_for(&self, duration: Duration) -> usize {
        let bytes = (self.byte_rate() as u128 * duration.as_millis() / 1000) as usize;
        bytes - bytes % self.block_align() as usize
    }

    /// Playback duration of `data_len` bytes of PCM
    pub fn duration_of(&self, data_len: u64) -> Duration {
        if self.byte_rate() == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(data_len as f64 / self.byte_rate() as f64)
    }
}

impl Default for PcmFormat {
    fn default() -> Self {
        Self::new(DEFAULT_SAMPLE_RATE)
    }
}
