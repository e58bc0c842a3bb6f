use reqwest::multipart;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::config::UploadConfig;
use crate::error::{RecorderError, Result};

/// Content type of every finished recording
pub const WAV_CONTENT_TYPE: &str = "audio/wav";

/// Server response to a successful upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadReceipt {
    pub status: u16,
    pub body: String,
}

/// Receives finished recordings
#[async_trait::async_trait]
pub trait Uploader: Send + Sync {
    /// Upload the immutable file at `path`
    async fn upload(&self, path: &Path, content_type: &str) -> Result<UploadReceipt>;

    /// Uploader name for logging
    fn name(&self) -> &str;
}

/// Posts recordings as a multipart form to an HTTP endpoint
pub struct HttpUploader {
    client: reqwest::Client,
    url: String,
    field_name: String,
    file_name: String,
}

impl HttpUploader {
    pub fn new(config: &UploadConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        info!("HTTP uploader targeting {}", config.url);

        Ok(Self {
            client,
            url: config.url.clone(),
            field_name: config.field_name.clone(),
            file_name: config.file_name.clone(),
        })
    }
}

#[async_trait::async_trait]
impl Uploader for HttpUploader {
    async fn upload(&self, path: &Path, content_type: &str) -> Result<UploadReceipt> {
        let data = tokio::fs::read(path).await?;
        let size = data.len();

        let part = multipart::Part::bytes(data)
            .file_name(self.file_name.clone())
            .mime_str(content_type)?;
        let form = multipart::Form::new().part(self.field_name.clone(), part);

        let response = self.client.post(&self.url).multipart(form).send().await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(RecorderError::Upload(format!(
                "{} responded {}: {}",
                self.url, status, body
            )));
        }

        info!(
            "Uploaded {} ({} bytes) to {} (status={})",
            path.display(),
            size,
            self.url,
            status.as_u16()
        );

        Ok(UploadReceipt {
            status: status.as_u16(),
            body,
        })
    }

    fn name(&self) -> &str {
        "http"
    }
}

/// Accepts every recording without sending it anywhere
pub struct NoopUploader;

#[async_trait::async_trait]
impl Uploader for NoopUploader {
    async fn upload(&self, path: &Path, _content_type: &str) -> Result<UploadReceipt> {
        info!("Upload disabled, keeping {}", path.display());
        Ok(UploadReceipt {
            status: 0,
            body: String::new(),
        })
    }

    fn name(&self) -> &str {
        "noop"
    }
}

/// One-shot background upload of a finished recording
///
/// Dropping the handle does not cancel the upload.
pub struct UploadHandle {
    path: PathBuf,
    task: JoinHandle<Result<UploadReceipt>>,
}

impl UploadHandle {
    /// Start uploading `path` on the runtime and return immediately
    pub fn spawn(uploader: Arc<dyn Uploader>, path: PathBuf) -> Self {
        let task = {
            let path = path.clone();
            tokio::spawn(async move {
                let result = uploader.upload(&path, WAV_CONTENT_TYPE).await;
                match &result {
                    Ok(receipt) => info!(
                        "Upload via {} finished for {} (status={})",
                        uploader.name(),
                        path.display(),
                        receipt.status
                    ),
                    Err(e) => error!(
                        "Upload via {} failed for {}: {}",
                        uploader.name(),
                        path.display(),
                        e
                    ),
                }
                result
            })
        };

        Self { path, task }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the upload result
    pub async fn wait(self) -> Result<UploadReceipt> {
        self.task
            .await
            .map_err(|e| RecorderError::Upload(format!("upload task failed: {e}")))?
    }
}
