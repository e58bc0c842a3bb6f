use super::state::AppState;
use crate::error::RecorderError;
use crate::recorder::{FinishedRecording, StopOutcome};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use tracing::{error, info};

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct StartRecordingResponse {
    pub session_id: String,
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct StopRecordingResponse {
    pub status: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recording: Option<FinishedRecording>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn error_response(status: StatusCode, error: String) -> Response {
    (status, Json(ErrorResponse { error })).into_response()
}

fn status_for(e: &RecorderError) -> StatusCode {
    match e {
        RecorderError::InvalidState(_) => StatusCode::CONFLICT,
        RecorderError::FormatMismatch(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /recording/start
pub async fn start_recording(State(state): State<AppState>) -> impl IntoResponse {
    let mut recorder = state.recorder.lock().await;

    if recorder.is_recording() {
        return error_response(
            StatusCode::CONFLICT,
            "A recording is already in progress".to_string(),
        );
    }

    let source = match (state.sources)() {
        Ok(source) => source,
        Err(e) => {
            error!("Failed to create audio source: {}", e);
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to create audio source: {}", e),
            );
        }
    };

    match recorder.start(source).await {
        Ok(session_id) => {
            info!("Recording started: {}", session_id);
            (
                StatusCode::OK,
                Json(StartRecordingResponse {
                    session_id,
                    status: "recording".to_string(),
                }),
            )
                .into_response()
        }
        Err(e) => {
            error!("Failed to start recording: {}", e);
            error_response(status_for(&e), format!("Failed to start recording: {}", e))
        }
    }
}

/// POST /recording/stop
///
/// The upload continues in the background after the response is sent.
pub async fn stop_recording(State(state): State<AppState>) -> impl IntoResponse {
    let mut recorder = state.recorder.lock().await;

    match recorder.stop().await {
        Ok(StopOutcome::NotRecording) => (
            StatusCode::OK,
            Json(StopRecordingResponse {
                status: "idle".to_string(),
                message: "No recording in progress".to_string(),
                recording: None,
            }),
        )
            .into_response(),
        Ok(StopOutcome::Finished { recording, upload }) => {
            info!(
                "Recording stopped: {} (upload pending for {})",
                recording.session_id,
                upload.path().display()
            );
            (
                StatusCode::OK,
                Json(StopRecordingResponse {
                    status: "ready".to_string(),
                    message: "Recording finalized, upload started".to_string(),
                    recording: Some(recording),
                }),
            )
                .into_response()
        }
        Err(e) => {
            error!("Failed to stop recording: {}", e);
            error_response(status_for(&e), format!("Failed to stop recording: {}", e))
        }
    }
}

/// GET /recording/status
pub async fn get_status(State(state): State<AppState>) -> impl IntoResponse {
    let recorder = state.recorder.lock().await;
    (StatusCode::OK, Json(recorder.status()))
}

/// GET /health
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
