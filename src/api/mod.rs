//! REST API server for Synca.
//!
//! Provides HTTP endpoints for:
//! - Recording control (start, stop, status)
//! - Workspace, folder and meeting reads and creation
//! - Meeting transcripts

pub mod error;
pub mod routes;

use crate::config::Config;
use crate::recorder::SessionStatusHandle;
use crate::store::MeetingStore;
use anyhow::Result;
use axum::{response::Json, routing::get, Router};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceBuilder;
use tracing::info;

pub use routes::recording::{ApiCommand, RecordingState, StartRecordingRequest};
pub use routes::StoreState;

pub struct ApiServer {
    port: u16,
    recording_state: RecordingState,
    store_state: StoreState,
}

impl ApiServer {
    pub fn new(
        tx: tokio::sync::mpsc::Sender<ApiCommand>,
        status: SessionStatusHandle,
        store: Arc<dyn MeetingStore>,
        config: &Config,
    ) -> Self {
        Self {
            port: config.api.port,
            recording_state: RecordingState { tx, status },
            store_state: StoreState { store },
        }
    }

    pub async fn start(self) -> Result<()> {
        let app = Router::new()
            // Root and version endpoints
            .route("/", get(status))
            .route("/version", get(version))
            // Recording control endpoints
            .merge(routes::recording::router(self.recording_state))
            // Store-backed resources
            .merge(routes::workspaces::router(self.store_state.clone()))
            .merge(routes::folders::router(self.store_state.clone()))
            .merge(routes::meetings::router(self.store_state))
            .layer(ServiceBuilder::new());

        let listener = tokio::net::TcpListener::bind(&format!("127.0.0.1:{}", self.port)).await?;

        info!("API server listening on http://127.0.0.1:{}", self.port);
        info!("Endpoints:");
        info!("  GET  /                        - Service info");
        info!("  GET  /version                 - Version info");
        info!("  POST /recording/start         - Start recording a meeting");
        info!("  POST /recording/stop          - Stop the live recording");
        info!("  GET  /recording/status        - Recording session status");
        info!("  GET  /workspaces              - List workspaces");
        info!("  POST /workspaces              - Create workspace");
        info!("  GET  /workspaces/:id/folders  - List folders");
        info!("  POST /workspaces/:id/folders  - Create folder");
        info!("  GET  /folders/:id/meetings    - List meetings");
        info!("  POST /folders/:id/meetings    - Create meeting");
        info!("  GET  /meetings/:id            - Meeting details");
        info!("  GET  /meetings/:id/transcripts - Meeting transcripts");

        axum::serve(listener, app).await?;

        Ok(())
    }
}

async fn status() -> Json<Value> {
    Json(json!({
        "service": "synca",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running"
    }))
}

async fn version() -> Json<Value> {
    Json(json!({
        "version": env!("CARGO_PKG_VERSION"),
        "name": "synca"
    }))
}
