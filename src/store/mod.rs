//! Meeting store: the workspace → folder → meeting hierarchy and its
//! transcripts.
//!
//! The recording pipeline only ever performs one mutation against the
//! store, captured by [`StatusSync`]. Everything the views and CLI need
//! sits on the wider [`MeetingStore`] trait. Two backends: a local
//! sqlite database and the hosted HTTP backend.

pub mod remote;
pub mod sqlite;
pub mod types;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::Connection;

pub use remote::RemoteMeetingStore;
pub use sqlite::{
    migrate, open_connection, FolderRepository, MeetingRepository, SqliteMeetingStore,
    TranscriptRepository, WorkspaceRepository,
};
pub use types::{Folder, Meeting, MeetingStatus, Transcript, Workspace};

/// The one store mutation the recording pipeline performs: persisting the
/// final outcome of a recording to the meeting record.
#[async_trait]
pub trait StatusSync: Send + Sync {
    async fn update_meeting_status(
        &self,
        id: i64,
        status: MeetingStatus,
        ended_at: DateTime<Utc>,
    ) -> Result<()>;
}

/// Full store surface used by the API and CLI.
#[async_trait]
pub trait MeetingStore: StatusSync {
    async fn workspaces(&self) -> Result<Vec<Workspace>>;
    async fn workspace(&self, id: i64) -> Result<Option<Workspace>>;
    async fn create_workspace(&self, name: &str, description: Option<&str>) -> Result<Workspace>;

    async fn folders_by_workspace(&self, workspace_id: i64) -> Result<Vec<Folder>>;
    async fn folder(&self, id: i64) -> Result<Option<Folder>>;
    async fn create_folder(
        &self,
        workspace_id: i64,
        name: &str,
        description: Option<&str>,
    ) -> Result<Folder>;

    async fn meetings_by_folder(&self, folder_id: i64) -> Result<Vec<Meeting>>;
    async fn meeting(&self, id: i64) -> Result<Option<Meeting>>;
    async fn create_meeting(&self, folder_id: i64, title: &str) -> Result<Meeting>;

    async fn transcripts(&self, meeting_id: i64) -> Result<Vec<Transcript>>;
}

/// Open the default local database, creating directories and running
/// migrations as needed.
pub fn init_db() -> Result<Connection> {
    let db_path = crate::global::db_file()?;
    open_connection(&db_path)
}
