//! Meeting endpoints.
//!
//! Provides HTTP endpoints for:
//! - Getting a meeting (GET /meetings/:id)
//! - Listing a meeting's transcripts (GET /meetings/:id/transcripts)

use axum::{
    extract::{Path, State},
    response::Json,
    routing::get,
    Router,
};
use serde_json::{json, Value};

use crate::api::error::{ApiError, ApiResult};

use super::StoreState;

pub fn router(state: StoreState) -> Router {
    Router::new()
        .route("/meetings/:id", get(get_meeting))
        .route("/meetings/:id/transcripts", get(list_transcripts))
        .with_state(state)
}

async fn get_meeting(
    Path(id): Path<i64>,
    State(state): State<StoreState>,
) -> ApiResult<Json<Value>> {
    match state.store.meeting(id).await? {
        Some(meeting) => Ok(Json(json!({ "meeting": meeting }))),
        None => Err(ApiError::not_found(format!("Meeting {} not found", id))),
    }
}

async fn list_transcripts(
    Path(id): Path<i64>,
    State(state): State<StoreState>,
) -> ApiResult<Json<Value>> {
    if state.store.meeting(id).await?.is_none() {
        return Err(ApiError::not_found(format!("Meeting {} not found", id)));
    }

    let transcripts = state.store.transcripts(id).await?;
    Ok(Json(json!({ "transcripts": transcripts })))
}
