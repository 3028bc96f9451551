//! Workspace endpoints.
//!
//! Provides HTTP endpoints for:
//! - Listing workspaces (GET /workspaces)
//! - Creating a workspace (POST /workspaces)
//! - Getting a workspace (GET /workspaces/:id)
//! - Listing a workspace's folders (GET /workspaces/:id/folders)
//! - Creating a folder in a workspace (POST /workspaces/:id/folders)

use axum::{
    extract::{Path, State},
    response::Json,
    routing::{get, post},
    Router,
};
use serde_json::{json, Value};
use tracing::info;

use crate::api::error::{ApiError, ApiResult};

use super::StoreState;

#[derive(Debug, serde::Deserialize)]
pub struct CreateWorkspaceRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, serde::Deserialize)]
pub struct CreateFolderRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

pub fn router(state: StoreState) -> Router {
    Router::new()
        .route("/workspaces", get(list_workspaces).post(create_workspace))
        .route("/workspaces/:id", get(get_workspace))
        .route(
            "/workspaces/:id/folders",
            get(list_folders).post(create_folder),
        )
        .with_state(state)
}

async fn list_workspaces(State(state): State<StoreState>) -> ApiResult<Json<Value>> {
    let workspaces = state.store.workspaces().await?;
    Ok(Json(json!({ "workspaces": workspaces })))
}

async fn create_workspace(
    State(state): State<StoreState>,
    Json(req): Json<CreateWorkspaceRequest>,
) -> ApiResult<Json<Value>> {
    if req.name.trim().is_empty() {
        return Err(ApiError::bad_request("Workspace name is required"));
    }

    let workspace = state
        .store
        .create_workspace(req.name.trim(), req.description.as_deref())
        .await?;

    info!(workspace = workspace.id, "workspace created");
    Ok(Json(json!({ "workspace": workspace })))
}

async fn get_workspace(
    Path(id): Path<i64>,
    State(state): State<StoreState>,
) -> ApiResult<Json<Value>> {
    match state.store.workspace(id).await? {
        Some(workspace) => Ok(Json(json!({ "workspace": workspace }))),
        None => Err(ApiError::not_found(format!("Workspace {} not found", id))),
    }
}

async fn list_folders(
    Path(id): Path<i64>,
    State(state): State<StoreState>,
) -> ApiResult<Json<Value>> {
    if state.store.workspace(id).await?.is_none() {
        return Err(ApiError::not_found(format!("Workspace {} not found", id)));
    }

    let folders = state.store.folders_by_workspace(id).await?;
    Ok(Json(json!({ "folders": folders })))
}

async fn create_folder(
    Path(id): Path<i64>,
    State(state): State<StoreState>,
    Json(req): Json<CreateFolderRequest>,
) -> ApiResult<Json<Value>> {
    if req.name.trim().is_empty() {
        return Err(ApiError::bad_request("Folder name is required"));
    }

    let folder = state
        .store
        .create_folder(id, req.name.trim(), req.description.as_deref())
        .await?;

    info!(workspace = id, folder = folder.id, "folder created");
    Ok(Json(json!({ "folder": folder })))
}
