//! Folder endpoints.
//!
//! Provides HTTP endpoints for:
//! - Getting a folder (GET /folders/:id)
//! - Listing a folder's meetings (GET /folders/:id/meetings)
//! - Creating a meeting in a folder (POST /folders/:id/meetings)

use axum::{
    extract::{Path, State},
    response::Json,
    routing::get,
    Router,
};
use serde_json::{json, Value};
use tracing::info;

use crate::api::error::{ApiError, ApiResult};

use super::StoreState;

#[derive(Debug, Default, serde::Deserialize)]
pub struct CreateMeetingRequest {
    pub title: Option<String>,
}

pub fn router(state: StoreState) -> Router {
    Router::new()
        .route("/folders/:id", get(get_folder))
        .route(
            "/folders/:id/meetings",
            get(list_meetings).post(create_meeting),
        )
        .with_state(state)
}

async fn get_folder(
    Path(id): Path<i64>,
    State(state): State<StoreState>,
) -> ApiResult<Json<Value>> {
    match state.store.folder(id).await? {
        Some(folder) => Ok(Json(json!({ "folder": folder }))),
        None => Err(ApiError::not_found(format!("Folder {} not found", id))),
    }
}

async fn list_meetings(
    Path(id): Path<i64>,
    State(state): State<StoreState>,
) -> ApiResult<Json<Value>> {
    if state.store.folder(id).await?.is_none() {
        return Err(ApiError::not_found(format!("Folder {} not found", id)));
    }

    let meetings = state.store.meetings_by_folder(id).await?;
    Ok(Json(json!({ "meetings": meetings })))
}

async fn create_meeting(
    Path(id): Path<i64>,
    State(state): State<StoreState>,
    body: Option<Json<CreateMeetingRequest>>,
) -> ApiResult<Json<Value>> {
    let title = body
        .and_then(|Json(req)| req.title)
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| format!("Meeting {}", chrono::Local::now().format("%Y-%m-%d")));

    let meeting = state.store.create_meeting(id, title.trim()).await?;

    info!(folder = id, meeting = meeting.id, "meeting created");
    Ok(Json(json!({ "meeting": meeting })))
}
