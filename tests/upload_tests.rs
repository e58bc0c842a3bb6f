// Integration tests for the HTTP uploader
//
// A local axum server stands in for the speech-to-text endpoint and records
// what it receives.

use anyhow::Result;
use axum::body::Bytes;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::Router;
use mic_recorder::config::UploadConfig;
use mic_recorder::upload::{HttpUploader, UploadHandle, Uploader, WAV_CONTENT_TYPE};
use mic_recorder::RecorderError;
use std::sync::Arc;
use tempfile::TempDir;
use tokio::sync::mpsc;

/// Spawn a server on an ephemeral port; returns its base URL
async fn spawn_server(app: Router) -> Result<String> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });
    Ok(format!("http://{}", addr))
}

fn upload_config(url: String) -> UploadConfig {
    UploadConfig {
        url,
        timeout_secs: 5,
        ..UploadConfig::default()
    }
}

fn write_wav(dir: &TempDir) -> Result<std::path::PathBuf> {
    let path = dir.path().join("recording.wav");
    let mut bytes = b"RIFF".to_vec();
    bytes.extend_from_slice(&[0u8; 40]);
    bytes.extend_from_slice(&[1, 2, 3, 4]);
    std::fs::write(&path, bytes)?;
    Ok(path)
}

#[tokio::test]
async fn test_http_upload_sends_multipart_wav() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let path = write_wav(&temp_dir)?;

    let (tx, mut rx) = mpsc::channel::<(String, Bytes)>(1);
    let app = Router::new().route(
        "/api/stt",
        post(move |headers: HeaderMap, body: Bytes| {
            let tx = tx.clone();
            async move {
                let content_type = headers
                    .get("content-type")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default()
                    .to_string();
                tx.send((content_type, body)).await.ok();
                (StatusCode::OK, "Audio received")
            }
        }),
    );
    let base = spawn_server(app).await?;

    let uploader = HttpUploader::new(&upload_config(format!("{}/api/stt", base)))?;
    let receipt = uploader.upload(&path, WAV_CONTENT_TYPE).await?;

    assert_eq!(receipt.status, 200);
    assert_eq!(receipt.body, "Audio received");

    let (content_type, body) = rx.recv().await.unwrap();
    let body = String::from_utf8_lossy(&body);
    assert!(content_type.starts_with("multipart/form-data"));
    assert!(body.contains("name=\"audio\""));
    assert!(body.contains("filename=\"audio.wav\""));
    assert!(body.contains("audio/wav"));
    assert!(body.contains("RIFF"));

    Ok(())
}

#[tokio::test]
async fn test_http_upload_error_status_fails() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let path = write_wav(&temp_dir)?;

    let app = Router::new().route(
        "/api/stt",
        post(|| async { (StatusCode::BAD_REQUEST, "No audio file received") }),
    );
    let base = spawn_server(app).await?;

    let uploader = HttpUploader::new(&upload_config(format!("{}/api/stt", base)))?;
    let result = uploader.upload(&path, WAV_CONTENT_TYPE).await;

    match result {
        Err(RecorderError::Upload(message)) => assert!(message.contains("400")),
        other => panic!("expected upload error, got {:?}", other),
    }

    Ok(())
}

#[tokio::test]
async fn test_http_upload_missing_file_fails() -> Result<()> {
    let uploader = HttpUploader::new(&upload_config("http://127.0.0.1:9/api/stt".to_string()))?;
    let result = uploader
        .upload(std::path::Path::new("/nonexistent/recording.wav"), WAV_CONTENT_TYPE)
        .await;

    assert!(matches!(result, Err(RecorderError::Io(_))));

    Ok(())
}

#[tokio::test]
async fn test_upload_handle_reports_result() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let path = write_wav(&temp_dir)?;

    let app = Router::new().route("/api/stt", post(|| async { "ok" }));
    let base = spawn_server(app).await?;

    let uploader: Arc<dyn Uploader> =
        Arc::new(HttpUploader::new(&upload_config(format!("{}/api/stt", base)))?);
    let handle = UploadHandle::spawn(uploader, path.clone());

    assert_eq!(handle.path(), path.as_path());
    let receipt = handle.wait().await?;
    assert_eq!(receipt.body, "ok");

    Ok(())
}
