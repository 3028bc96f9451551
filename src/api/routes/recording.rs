//! Recording control endpoints.
//!
//! Provides HTTP endpoints for:
//! - Starting a recording session (POST /recording/start)
//! - Stopping the live session (POST /recording/stop)
//! - Getting session status (GET /recording/status)
//!
//! Commands flow over an mpsc channel into the service loop, which owns
//! the live session; handlers report the status snapshot after a short
//! grace period.

use crate::recorder::{SessionPhase, SessionStatusHandle};
use axum::{
    extract::State,
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tracing::{error, info};

/// Commands the API sends to the service loop.
#[derive(Debug, Clone)]
pub enum ApiCommand {
    /// Start recording against an in-progress meeting.
    StartRecording { meeting_id: i64 },
    /// Stop the live session (or abandon a pending access request).
    StopRecording,
}

/// Request body for the start endpoint.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct StartRecordingRequest {
    pub meeting_id: i64,
}

#[derive(Clone)]
pub struct RecordingState {
    pub tx: mpsc::Sender<ApiCommand>,
    pub status: SessionStatusHandle,
}

pub fn router(state: RecordingState) -> Router {
    Router::new()
        .route("/recording/start", post(start_recording))
        .route("/recording/stop", post(stop_recording))
        .route("/recording/status", get(recording_status))
        .with_state(state)
}

async fn start_recording(
    State(state): State<RecordingState>,
    Json(req): Json<StartRecordingRequest>,
) -> Result<Json<Value>, StatusCode> {
    info!(meeting = req.meeting_id, "recording start requested via API");

    match state
        .tx
        .send(ApiCommand::StartRecording {
            meeting_id: req.meeting_id,
        })
        .await
    {
        Ok(_) => {
            // Small delay to allow the session to be created
            tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;

            let status = state.status.get().await;
            Ok(Json(json!({
                "success": true,
                "meeting_id": status.meeting_id,
                "session_id": status.session_id.map(|id| id.to_string()),
                "phase": status.phase.as_str(),
            })))
        }
        Err(e) => {
            error!("Failed to send recording start command: {}", e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

async fn stop_recording(
    State(state): State<RecordingState>,
) -> Result<Json<Value>, StatusCode> {
    info!("recording stop requested via API");

    match state.tx.send(ApiCommand::StopRecording).await {
        Ok(_) => {
            // Small delay to allow the session to wind down
            tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;

            let status = state.status.get().await;
            Ok(Json(json!({
                "success": true,
                "meeting_id": status.meeting_id,
                "phase": status.phase.as_str(),
                "chunks_delivered": status.chunks_delivered,
                "duration_seconds": status.duration_seconds(),
                "last_error": status.last_error,
            })))
        }
        Err(e) => {
            error!("Failed to send recording stop command: {}", e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

async fn recording_status(State(state): State<RecordingState>) -> Json<Value> {
    let status = state.status.get().await;

    Json(json!({
        "recording": status.phase == SessionPhase::Recording,
        "phase": status.phase.as_str(),
        "session_id": status.session_id.map(|id| id.to_string()),
        "meeting_id": status.meeting_id,
        "chunks_delivered": status.chunks_delivered,
        "duration_seconds": status.duration_seconds(),
        "last_error": status.last_error,
    }))
}
