//! Local meeting store backed by rusqlite.
//!
//! Repository structs operate on a borrowed `Connection` with raw SQL, no
//! ORM. `SqliteMeetingStore` adapts them to the async [`MeetingStore`]
//! trait by opening a connection per call on the blocking pool.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use std::path::{Path, PathBuf};
use tokio::task;

use super::types::{Folder, Meeting, MeetingStatus, Transcript, Workspace};
use super::{MeetingStore, StatusSync};

const DEFAULT_LIST_LIMIT: usize = 100;

pub fn open_connection(db_path: &Path) -> Result<Connection> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent).context("Failed to create database directory")?;
    }

    let conn = Connection::open(db_path).context("Failed to open database connection")?;
    migrate(&conn)?;
    Ok(conn)
}

pub fn migrate(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS workspaces (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            description TEXT,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )
    .context("Failed to create workspaces table")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS folders (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            workspace_id INTEGER NOT NULL,
            name TEXT NOT NULL,
            description TEXT,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )
    .context("Failed to create folders table")?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_folders_workspace ON folders(workspace_id)",
        [],
    )
    .context("Failed to create folders workspace index")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS meetings (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            folder_id INTEGER NOT NULL,
            title TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'in_progress',
            summary TEXT,
            started_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            ended_at TIMESTAMP,
            duration_seconds INTEGER,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )
    .context("Failed to create meetings table")?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_meetings_folder ON meetings(folder_id)",
        [],
    )
    .context("Failed to create meetings folder index")?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_meetings_started_at ON meetings(started_at DESC)",
        [],
    )
    .context("Failed to create meetings started_at index")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS transcripts (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            meeting_id INTEGER NOT NULL,
            speaker TEXT,
            text TEXT NOT NULL,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )
    .context("Failed to create transcripts table")?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_transcripts_meeting \
         ON transcripts(meeting_id, created_at)",
        [],
    )
    .context("Failed to create transcripts meeting index")?;

    Ok(())
}

pub struct WorkspaceRepository;

impl WorkspaceRepository {
    pub fn insert(conn: &Connection, name: &str, description: Option<&str>) -> Result<i64> {
        conn.execute(
            "INSERT INTO workspaces (name, description) VALUES (?1, ?2)",
            params![name, description],
        )
        .context("Failed to insert workspace")?;

        Ok(conn.last_insert_rowid())
    }

    pub fn get(conn: &Connection, id: i64) -> Result<Option<Workspace>> {
        let mut stmt = conn
            .prepare("SELECT id, name, description, created_at FROM workspaces WHERE id = ?1")
            .context("Failed to prepare workspace query")?;

        let mut rows = stmt
            .query_map(params![id], workspace_from_row)
            .context("Failed to query workspace")?;

        match rows.next() {
            Some(Ok(record)) => Ok(Some(record)),
            Some(Err(e)) => Err(e.into()),
            None => Ok(None),
        }
    }

    /// List workspaces, newest first.
    pub fn list(conn: &Connection, limit: usize) -> Result<Vec<Workspace>> {
        let mut stmt = conn
            .prepare(
                "SELECT id, name, description, created_at FROM workspaces \
                 ORDER BY created_at DESC, id DESC LIMIT ?1",
            )
            .context("Failed to prepare workspaces list query")?;

        let rows = stmt
            .query_map(params![limit as i64], workspace_from_row)
            .context("Failed to list workspaces")?;

        let mut workspaces = Vec::new();
        for row in rows {
            workspaces.push(row?);
        }

        Ok(workspaces)
    }
}

pub struct FolderRepository;

impl FolderRepository {
    pub fn insert(
        conn: &Connection,
        workspace_id: i64,
        name: &str,
        description: Option<&str>,
    ) -> Result<i64> {
        conn.execute(
            "INSERT INTO folders (workspace_id, name, description) VALUES (?1, ?2, ?3)",
            params![workspace_id, name, description],
        )
        .context("Failed to insert folder")?;

        Ok(conn.last_insert_rowid())
    }

    pub fn get(conn: &Connection, id: i64) -> Result<Option<Folder>> {
        let mut stmt = conn
            .prepare(
                "SELECT id, workspace_id, name, description, created_at \
                 FROM folders WHERE id = ?1",
            )
            .context("Failed to prepare folder query")?;

        let mut rows = stmt
            .query_map(params![id], folder_from_row)
            .context("Failed to query folder")?;

        match rows.next() {
            Some(Ok(record)) => Ok(Some(record)),
            Some(Err(e)) => Err(e.into()),
            None => Ok(None),
        }
    }

    /// List the folders of a workspace, newest first.
    pub fn list_by_workspace(conn: &Connection, workspace_id: i64) -> Result<Vec<Folder>> {
        let mut stmt = conn
            .prepare(
                "SELECT id, workspace_id, name, description, created_at \
                 FROM folders WHERE workspace_id = ?1 \
                 ORDER BY created_at DESC, id DESC",
            )
            .context("Failed to prepare folders list query")?;

        let rows = stmt
            .query_map(params![workspace_id], folder_from_row)
            .context("Failed to list folders")?;

        let mut folders = Vec::new();
        for row in rows {
            folders.push(row?);
        }

        Ok(folders)
    }
}

pub struct MeetingRepository;

impl MeetingRepository {
    /// Insert a new meeting record (status = in_progress).
    /// Returns the new meeting ID.
    pub fn insert(conn: &Connection, folder_id: i64, title: &str) -> Result<i64> {
        conn.execute(
            "INSERT INTO meetings (folder_id, title, status) VALUES (?1, ?2, ?3)",
            params![folder_id, title, MeetingStatus::InProgress.as_str()],
        )
        .context("Failed to insert meeting")?;

        Ok(conn.last_insert_rowid())
    }

    pub fn get(conn: &Connection, id: i64) -> Result<Option<Meeting>> {
        let mut stmt = conn
            .prepare(
                "SELECT id, folder_id, title, status, summary, started_at, ended_at, \
                 duration_seconds, created_at FROM meetings WHERE id = ?1",
            )
            .context("Failed to prepare meeting query")?;

        let mut rows = stmt
            .query_map(params![id], meeting_from_row)
            .context("Failed to query meeting")?;

        match rows.next() {
            Some(Ok(record)) => Ok(Some(record)),
            Some(Err(e)) => Err(e.into()),
            None => Ok(None),
        }
    }

    /// List the meetings of a folder, newest first.
    pub fn list_by_folder(conn: &Connection, folder_id: i64) -> Result<Vec<Meeting>> {
        let mut stmt = conn
            .prepare(
                "SELECT id, folder_id, title, status, summary, started_at, ended_at, \
                 duration_seconds, created_at FROM meetings WHERE folder_id = ?1 \
                 ORDER BY started_at DESC, id DESC",
            )
            .context("Failed to prepare meetings list query")?;

        let rows = stmt
            .query_map(params![folder_id], meeting_from_row)
            .context("Failed to list meetings")?;

        let mut meetings = Vec::new();
        for row in rows {
            meetings.push(row?);
        }

        Ok(meetings)
    }

    /// Update the meeting status. Completing a meeting also records
    /// `ended_at` and derives `duration_seconds` from `started_at`.
    pub fn set_status(
        conn: &Connection,
        id: i64,
        status: MeetingStatus,
        ended_at: Option<&str>,
    ) -> Result<()> {
        let updated = match (status, ended_at) {
            (MeetingStatus::Completed, Some(ended)) => conn
                .execute(
                    "UPDATE meetings SET status = ?1, ended_at = ?2, \
                     duration_seconds = CAST(strftime('%s', ?2) - strftime('%s', started_at) AS INTEGER) \
                     WHERE id = ?3",
                    params![MeetingStatus::Completed.as_str(), ended, id],
                )
                .context("Failed to complete meeting")?,
            _ => conn
                .execute(
                    "UPDATE meetings SET status = ?1 WHERE id = ?2",
                    params![status.as_str(), id],
                )
                .context("Failed to update meeting status")?,
        };

        if updated == 0 {
            bail!("Meeting {} not found", id);
        }
        Ok(())
    }
}

pub struct TranscriptRepository;

impl TranscriptRepository {
    pub fn insert(
        conn: &Connection,
        meeting_id: i64,
        speaker: Option<&str>,
        text: &str,
    ) -> Result<i64> {
        conn.execute(
            "INSERT INTO transcripts (meeting_id, speaker, text) VALUES (?1, ?2, ?3)",
            params![meeting_id, speaker, text],
        )
        .context("Failed to insert transcript")?;

        Ok(conn.last_insert_rowid())
    }

    /// List a meeting's transcripts in the order they were produced.
    pub fn list_by_meeting(conn: &Connection, meeting_id: i64) -> Result<Vec<Transcript>> {
        let mut stmt = conn
            .prepare(
                "SELECT id, meeting_id, speaker, text, created_at \
                 FROM transcripts WHERE meeting_id = ?1 \
                 ORDER BY created_at ASC, id ASC",
            )
            .context("Failed to prepare transcripts query")?;

        let rows = stmt
            .query_map(params![meeting_id], transcript_from_row)
            .context("Failed to list transcripts")?;

        let mut transcripts = Vec::new();
        for row in rows {
            transcripts.push(row?);
        }

        Ok(transcripts)
    }
}

fn workspace_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Workspace> {
    Ok(Workspace {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        created_at: row.get(3)?,
    })
}

fn folder_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Folder> {
    Ok(Folder {
        id: row.get(0)?,
        workspace_id: row.get(1)?,
        name: row.get(2)?,
        description: row.get(3)?,
        created_at: row.get(4)?,
    })
}

fn meeting_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Meeting> {
    Ok(Meeting {
        id: row.get(0)?,
        folder_id: row.get(1)?,
        title: row.get(2)?,
        status: row.get(3)?,
        summary: row.get(4)?,
        started_at: row.get(5)?,
        ended_at: row.get(6)?,
        duration_seconds: row.get(7)?,
        created_at: row.get(8)?,
    })
}

fn transcript_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Transcript> {
    Ok(Transcript {
        id: row.get(0)?,
        meeting_id: row.get(1)?,
        speaker: row.get(2)?,
        text: row.get(3)?,
        created_at: row.get(4)?,
    })
}

/// Async store over a local sqlite database file.
#[derive(Debug, Clone)]
pub struct SqliteMeetingStore {
    db_path: PathBuf,
}

impl SqliteMeetingStore {
    pub fn new(db_path: PathBuf) -> Self {
        Self { db_path }
    }

    async fn with_conn<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    {
        let path = self.db_path.clone();
        task::spawn_blocking(move || {
            let conn = open_connection(&path)?;
            op(&conn)
        })
        .await
        .context("Meeting store task panicked")?
    }
}

#[async_trait]
impl StatusSync for SqliteMeetingStore {
    async fn update_meeting_status(
        &self,
        id: i64,
        status: MeetingStatus,
        ended_at: DateTime<Utc>,
    ) -> Result<()> {
        let ended = ended_at.format("%Y-%m-%d %H:%M:%S").to_string();
        self.with_conn(move |conn| {
            MeetingRepository::set_status(conn, id, status, Some(&ended))
        })
        .await
    }
}

#[async_trait]
impl MeetingStore for SqliteMeetingStore {
    async fn workspaces(&self) -> Result<Vec<Workspace>> {
        self.with_conn(|conn| WorkspaceRepository::list(conn, DEFAULT_LIST_LIMIT))
            .await
    }

    async fn workspace(&self, id: i64) -> Result<Option<Workspace>> {
        self.with_conn(move |conn| WorkspaceRepository::get(conn, id))
            .await
    }

    async fn create_workspace(&self, name: &str, description: Option<&str>) -> Result<Workspace> {
        let name = name.to_string();
        let description = description.map(str::to_string);
        self.with_conn(move |conn| {
            let id = WorkspaceRepository::insert(conn, &name, description.as_deref())?;
            WorkspaceRepository::get(conn, id)?
                .context("Workspace missing right after insert")
        })
        .await
    }

    async fn folders_by_workspace(&self, workspace_id: i64) -> Result<Vec<Folder>> {
        self.with_conn(move |conn| FolderRepository::list_by_workspace(conn, workspace_id))
            .await
    }

    async fn folder(&self, id: i64) -> Result<Option<Folder>> {
        self.with_conn(move |conn| FolderRepository::get(conn, id))
            .await
    }

    async fn create_folder(
        &self,
        workspace_id: i64,
        name: &str,
        description: Option<&str>,
    ) -> Result<Folder> {
        let name = name.to_string();
        let description = description.map(str::to_string);
        self.with_conn(move |conn| {
            if WorkspaceRepository::get(conn, workspace_id)?.is_none() {
                bail!("Workspace {} not found", workspace_id);
            }
            let id = FolderRepository::insert(conn, workspace_id, &name, description.as_deref())?;
            FolderRepository::get(conn, id)?.context("Folder missing right after insert")
        })
        .await
    }

    async fn meetings_by_folder(&self, folder_id: i64) -> Result<Vec<Meeting>> {
        self.with_conn(move |conn| MeetingRepository::list_by_folder(conn, folder_id))
            .await
    }

    async fn meeting(&self, id: i64) -> Result<Option<Meeting>> {
        self.with_conn(move |conn| MeetingRepository::get(conn, id))
            .await
    }

    async fn create_meeting(&self, folder_id: i64, title: &str) -> Result<Meeting> {
        let title = title.to_string();
        self.with_conn(move |conn| {
            if FolderRepository::get(conn, folder_id)?.is_none() {
                bail!("Folder {} not found", folder_id);
            }
            let id = MeetingRepository::insert(conn, folder_id, &title)?;
            MeetingRepository::get(conn, id)?.context("Meeting missing right after insert")
        })
        .await
    }

    async fn transcripts(&self, meeting_id: i64) -> Result<Vec<Transcript>> {
        self.with_conn(move |conn| TranscriptRepository::list_by_meeting(conn, meeting_id))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        conn
    }

    fn seed_meeting(conn: &Connection) -> i64 {
        let ws = WorkspaceRepository::insert(conn, "Acme", None).unwrap();
        let folder = FolderRepository::insert(conn, ws, "Weekly", None).unwrap();
        MeetingRepository::insert(conn, folder, "Standup").unwrap()
    }

    #[test]
    fn test_insert_and_get_workspace() {
        let conn = setup_db();
        let id = WorkspaceRepository::insert(&conn, "Acme", Some("Company space")).unwrap();
        assert!(id > 0);

        let ws = WorkspaceRepository::get(&conn, id).unwrap().unwrap();
        assert_eq!(ws.name, "Acme");
        assert_eq!(ws.description, Some("Company space".to_string()));
    }

    #[test]
    fn test_get_nonexistent_workspace() {
        let conn = setup_db();
        assert!(WorkspaceRepository::get(&conn, 9999).unwrap().is_none());
    }

    #[test]
    fn test_list_workspaces_limit() {
        let conn = setup_db();
        WorkspaceRepository::insert(&conn, "One", None).unwrap();
        WorkspaceRepository::insert(&conn, "Two", None).unwrap();
        WorkspaceRepository::insert(&conn, "Three", None).unwrap();

        let workspaces = WorkspaceRepository::list(&conn, 2).unwrap();
        assert_eq!(workspaces.len(), 2);
        // Newest first
        assert_eq!(workspaces[0].name, "Three");
    }

    #[test]
    fn test_folders_scoped_to_workspace() {
        let conn = setup_db();
        let a = WorkspaceRepository::insert(&conn, "A", None).unwrap();
        let b = WorkspaceRepository::insert(&conn, "B", None).unwrap();
        FolderRepository::insert(&conn, a, "Planning", None).unwrap();
        FolderRepository::insert(&conn, a, "Retros", None).unwrap();
        FolderRepository::insert(&conn, b, "Other", None).unwrap();

        let folders = FolderRepository::list_by_workspace(&conn, a).unwrap();
        assert_eq!(folders.len(), 2);
        assert!(folders.iter().all(|f| f.workspace_id == a));
    }

    #[test]
    fn test_new_meeting_is_in_progress() {
        let conn = setup_db();
        let id = seed_meeting(&conn);

        let meeting = MeetingRepository::get(&conn, id).unwrap().unwrap();
        assert_eq!(meeting.status, "in_progress");
        assert_eq!(meeting.title, "Standup");
        assert!(meeting.ended_at.is_none());
        assert!(meeting.duration_seconds.is_none());
    }

    #[test]
    fn test_complete_meeting_derives_duration() {
        let conn = setup_db();
        let id = seed_meeting(&conn);

        conn.execute(
            "UPDATE meetings SET started_at = '2026-01-01 10:00:00' WHERE id = ?1",
            params![id],
        )
        .unwrap();

        MeetingRepository::set_status(
            &conn,
            id,
            MeetingStatus::Completed,
            Some("2026-01-01 10:30:00"),
        )
        .unwrap();

        let meeting = MeetingRepository::get(&conn, id).unwrap().unwrap();
        assert_eq!(meeting.status, "completed");
        assert_eq!(meeting.ended_at, Some("2026-01-01 10:30:00".to_string()));
        assert_eq!(meeting.duration_seconds, Some(1800));
    }

    #[test]
    fn test_set_status_missing_meeting() {
        let conn = setup_db();
        let result = MeetingRepository::set_status(
            &conn,
            4242,
            MeetingStatus::Completed,
            Some("2026-01-01 10:30:00"),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_transcripts_ordered_oldest_first() {
        let conn = setup_db();
        let id = seed_meeting(&conn);

        TranscriptRepository::insert(&conn, id, Some("Ana"), "Hello everyone").unwrap();
        TranscriptRepository::insert(&conn, id, None, "Let's get started").unwrap();

        let transcripts = TranscriptRepository::list_by_meeting(&conn, id).unwrap();
        assert_eq!(transcripts.len(), 2);
        assert_eq!(transcripts[0].text, "Hello everyone");
        assert_eq!(transcripts[0].speaker, Some("Ana".to_string()));
        assert_eq!(transcripts[1].text, "Let's get started");
    }

    #[tokio::test]
    async fn test_async_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteMeetingStore::new(dir.path().join("synca.db"));

        let ws = store.create_workspace("Acme", None).await.unwrap();
        let folder = store.create_folder(ws.id, "Weekly", None).await.unwrap();
        let meeting = store.create_meeting(folder.id, "Standup").await.unwrap();
        assert_eq!(meeting.status, "in_progress");

        store
            .update_meeting_status(meeting.id, MeetingStatus::Completed, Utc::now())
            .await
            .unwrap();

        let reloaded = store.meeting(meeting.id).await.unwrap().unwrap();
        assert_eq!(reloaded.status, "completed");
        assert!(reloaded.ended_at.is_some());

        let listed = store.meetings_by_folder(folder.id).await.unwrap();
        assert_eq!(listed.len(), 1);
    }

    #[tokio::test]
    async fn test_create_meeting_requires_folder() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteMeetingStore::new(dir.path().join("synca.db"));
        assert!(store.create_meeting(77, "Orphan").await.is_err());
    }
}
