use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::audio::{CaptureConfig, PcmFormat, DEFAULT_SAMPLE_RATE, MAX_SAMPLE_RATE};

/// Environment variable prefix, e.g. `MIC_RECORDER__UPLOAD__URL`
pub const ENV_PREFIX: &str = "MIC_RECORDER";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub recorder: RecorderConfig,
    pub upload: UploadConfig,
    pub http: HttpConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RecorderConfig {
    /// Directory finished recordings are written to
    pub output_dir: PathBuf,
    pub sample_rate: u32,
    /// Audio pulled from the source per read
    pub buffer_duration_ms: u64,
    /// Pause after a read that produced no audio
    pub idle_backoff_ms: u64,
}

impl RecorderConfig {
    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 || self.sample_rate > MAX_SAMPLE_RATE {
            bail!(
                "recorder.sample_rate must be between 1 and {}, got {}",
                MAX_SAMPLE_RATE,
                self.sample_rate
            );
        }
        if self.buffer_duration_ms == 0 {
            bail!("recorder.buffer_duration_ms must be greater than 0");
        }
        Ok(())
    }

    pub fn format(&self) -> PcmFormat {
        PcmFormat::new(self.sample_rate)
    }

    pub fn capture(&self) -> CaptureConfig {
        CaptureConfig {
            idle_backoff: Duration::from_millis(self.idle_backoff_ms),
            ..CaptureConfig::for_format(
                &self.format(),
                Duration::from_millis(self.buffer_duration_ms),
            )
        }
    }
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            output_dir: std::env::temp_dir().join("mic-recorder"),
            sample_rate: DEFAULT_SAMPLE_RATE,
            buffer_duration_ms: 100,
            idle_backoff_ms: 5,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    pub enabled: bool,
    pub url: String,
    /// Multipart form field carrying the file
    pub field_name: String,
    /// File name announced in the multipart part
    pub file_name: String,
    pub timeout_secs: u64,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            url: "http://127.0.0.1:3000/api/stt".to_string(),
            field_name: "audio".to_string(),
            file_name: "audio.wav".to_string(),
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: 8090,
        }
    }
}

impl Config {
    /// Load `path` (any format the config crate understands, extension
    /// optional) with `MIC_RECORDER__*` environment overrides on top.
    /// A missing file falls back to defaults.
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .with_context(|| format!("Failed to load config from {}", path))?;

        let config: Self = settings
            .try_deserialize()
            .context("Failed to parse configuration")?;
        config.recorder.validate()?;

        Ok(config)
    }
}
