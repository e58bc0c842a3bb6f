use serde::Serialize;
use std::fs::OpenOptions;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use tracing::info;

use super::format::PcmFormat;
use crate::error::{RecorderError, Result};

/// Size of the canonical RIFF/WAVE header
pub const HEADER_LEN: usize = 44;

/// Bytes of header that follow the RIFF chunk-size field
const RIFF_OVERHEAD: u32 = 36;

const FMT_CHUNK_LEN: u32 = 16;
const FORMAT_PCM: u16 = 1;

/// Bytes moved per read/write round trip while shifting PCM
const SHIFT_BLOCK_BYTES: u64 = 64 * 1024;

/// Canonical 44-byte PCM WAV header
///
/// Derived purely from the format and the data length; always rebuild it
/// rather than patching a stale one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WavHeader {
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
    pub data_len: u32,
}

impl WavHeader {
    /// Header for `data_len` bytes of PCM in `format`
    pub fn for_data(format: &PcmFormat, data_len: u64) -> Result<Self> {
        let data_len = u32::try_from(data_len)
            .ok()
            .filter(|len| len.checked_add(RIFF_OVERHEAD).is_some())
            .ok_or(RecorderError::DataTooLarge(data_len))?;

        Ok(Self {
            sample_rate: format.sample_rate,
            channels: format.channels(),
            bits_per_sample: format.bits_per_sample(),
            data_len,
        })
    }

    // Parsed headers carry arbitrary field values, so these saturate; a
    // saturated value never matches the stored one and fails validation.
    pub fn block_align(&self) -> u16 {
        self.channels.saturating_mul(self.bits_per_sample) / 8
    }

    pub fn byte_rate(&self) -> u32 {
        let bytes_per_frame = u32::from(self.channels) * u32::from(self.bits_per_sample) / 8;
        self.sample_rate.saturating_mul(bytes_per_frame)
    }

    /// Value of the RIFF chunk-size field
    pub fn riff_len(&self) -> u32 {
        self.data_len.saturating_add(RIFF_OVERHEAD)
    }

    pub fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let mut buf = [0u8; HEADER_LEN];

        buf[0..4].copy_from_slice(b"RIFF");
        buf[4..8].copy_from_slice(&self.riff_len().to_le_bytes());
        buf[8..12].copy_from_slice(b"WAVE");

        buf[12..16].copy_from_slice(b"fmt ");
        buf[16..20].copy_from_slice(&FMT_CHUNK_LEN.to_le_bytes());
        buf[20..22].copy_from_slice(&FORMAT_PCM.to_le_bytes());
        buf[22..24].copy_from_slice(&self.channels.to_le_bytes());
        buf[24..28].copy_from_slice(&self.sample_rate.to_le_bytes());
        buf[28..32].copy_from_slice(&self.byte_rate().to_le_bytes());
        buf[32..34].copy_from_slice(&self.block_align().to_le_bytes());
        buf[34..36].copy_from_slice(&self.bits_per_sample.to_le_bytes());

        buf[36..40].copy_from_slice(b"data");
        buf[40..44].copy_from_slice(&self.data_len.to_le_bytes());

        buf
    }

    /// Parse a canonical header from the first 44 bytes of `bytes`
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_LEN {
            return Err(RecorderError::InvalidHeader(format!(
                "need {} bytes, got {}",
                HEADER_LEN,
                bytes.len()
            )));
        }

        let tag = |at: usize| &bytes[at..at + 4];
        let u16_at = |at: usize| u16::from_le_bytes([bytes[at], bytes[at + 1]]);
        let u32_at = |at: usize| {
            u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
        };

        for (at, expected) in [(0, b"RIFF"), (8, b"WAVE"), (12, b"fmt "), (36, b"data")] {
            if tag(at) != expected {
                return Err(RecorderError::InvalidHeader(format!(
                    "expected {:?} at offset {}, found {:?}",
                    String::from_utf8_lossy(expected),
                    at,
                    String::from_utf8_lossy(tag(at))
                )));
            }
        }

        if u32_at(16) != FMT_CHUNK_LEN {
            return Err(RecorderError::InvalidHeader(format!(
                "unexpected fmt chunk size {}",
                u32_at(16)
            )));
        }
        if u16_at(20) != FORMAT_PCM {
            return Err(RecorderError::InvalidHeader(format!(
                "unsupported audio format {}",
                u16_at(20)
            )));
        }

        let header = Self {
            channels: u16_at(22),
            sample_rate: u32_at(24),
            bits_per_sample: u16_at(34),
            data_len: u32_at(40),
        };

        if u32_at(4) != header.riff_len()
            || u32_at(28) != header.byte_rate()
            || u16_at(32) != header.block_align()
        {
            return Err(RecorderError::InvalidHeader(
                "size fields are inconsistent with the format".to_string(),
            ));
        }

        Ok(header)
    }

    pub fn format(&self) -> PcmFormat {
        PcmFormat::new(self.sample_rate)
    }
}

/// Prepend a WAV header to the headerless PCM file at `path`
///
/// The data length is taken from the file size before anything is written.
pub fn prepend_header(path: impl AsRef<Path>, format: &PcmFormat) -> Result<WavHeader> {
    let path = path.as_ref();
    let mut file = OpenOptions::new().read(true).write(true).open(path)?;

    let data_len = file.metadata()?.len();
    let header = WavHeader::for_data(format, data_len)?;

    write_header_prefix(&mut file, &header)?;
    file.sync_all()?;

    info!(
        "Wrote WAV header to {} ({}Hz, {} data bytes)",
        path.display(),
        header.sample_rate,
        header.data_len
    );

    Ok(header)
}

/// Shift the first `header.data_len` bytes of `store` forward by the header
/// length, then write the header at offset 0
///
/// Blocks are moved tail first so no byte is overwritten before it is copied.
pub fn write_header_prefix<S>(store: &mut S, header: &WavHeader) -> Result<()>
where
    S: Read + Write + Seek,
{
    let mut block = vec![0u8; SHIFT_BLOCK_BYTES as usize];
    let mut remaining = u64::from(header.data_len);

    while remaining > 0 {
        let n = remaining.min(SHIFT_BLOCK_BYTES);
        let src = remaining - n;
        let buf = &mut block[..n as usize];

        store.seek(SeekFrom::Start(src))?;
        store.read_exact(buf)?;
        store.seek(SeekFrom::Start(src + HEADER_LEN as u64))?;
        store.write_all(buf)?;

        remaining = src;
    }

    store.seek(SeekFrom::Start(0))?;
    store.write_all(&header.to_bytes())?;
    store.flush()?;

    Ok(())
}
