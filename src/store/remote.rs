//! HTTP meeting store for a hosted Synca backend.
//!
//! Speaks plain JSON REST against the backend's workspace/folder/meeting
//! resources. Row-level authorization lives server-side; this client only
//! attaches the configured bearer token.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::json;

use super::types::{Folder, Meeting, MeetingStatus, Transcript, Workspace};
use super::{MeetingStore, StatusSync};

pub struct RemoteMeetingStore {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl RemoteMeetingStore {
    pub fn new(base_url: &str, api_key: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let mut builder = self
            .client
            .request(method, format!("{}{}", self.base_url, path));
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }
        builder
    }

    async fn fetch<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self
            .request(Method::GET, path)
            .send()
            .await
            .with_context(|| format!("Failed to reach backend at {}", path))?;

        let status = response.status();
        if !status.is_success() {
            bail!("Backend returned {} for {}", status, path);
        }

        response
            .json::<T>()
            .await
            .with_context(|| format!("Failed to decode backend response from {}", path))
    }

    /// GET that maps a 404 to `None` instead of an error.
    async fn fetch_optional<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>> {
        let response = self
            .request(Method::GET, path)
            .send()
            .await
            .with_context(|| format!("Failed to reach backend at {}", path))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let status = response.status();
        if !status.is_success() {
            bail!("Backend returned {} for {}", status, path);
        }

        let value = response
            .json::<T>()
            .await
            .with_context(|| format!("Failed to decode backend response from {}", path))?;
        Ok(Some(value))
    }

    async fn post<T: DeserializeOwned>(&self, path: &str, body: serde_json::Value) -> Result<T> {
        let response = self
            .request(Method::POST, path)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("Failed to reach backend at {}", path))?;

        let status = response.status();
        if !status.is_success() {
            bail!("Backend returned {} for {}", status, path);
        }

        response
            .json::<T>()
            .await
            .with_context(|| format!("Failed to decode backend response from {}", path))
    }
}

#[async_trait]
impl StatusSync for RemoteMeetingStore {
    async fn update_meeting_status(
        &self,
        id: i64,
        status: MeetingStatus,
        ended_at: DateTime<Utc>,
    ) -> Result<()> {
        let path = format!("/meetings/{}", id);
        let body = json!({
            "status": status.as_str(),
            "ended_at": ended_at.to_rfc3339(),
        });

        let response = self
            .request(Method::PATCH, &path)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("Failed to reach backend at {}", path))?;

        let code = response.status();
        if !code.is_success() {
            bail!("Backend rejected meeting status update: {}", code);
        }
        Ok(())
    }
}

#[async_trait]
impl MeetingStore for RemoteMeetingStore {
    async fn workspaces(&self) -> Result<Vec<Workspace>> {
        self.fetch("/workspaces").await
    }

    async fn workspace(&self, id: i64) -> Result<Option<Workspace>> {
        self.fetch_optional(&format!("/workspaces/{}", id)).await
    }

    async fn create_workspace(&self, name: &str, description: Option<&str>) -> Result<Workspace> {
        self.post(
            "/workspaces",
            json!({ "name": name, "description": description }),
        )
        .await
    }

    async fn folders_by_workspace(&self, workspace_id: i64) -> Result<Vec<Folder>> {
        self.fetch(&format!("/workspaces/{}/folders", workspace_id))
            .await
    }

    async fn folder(&self, id: i64) -> Result<Option<Folder>> {
        self.fetch_optional(&format!("/folders/{}", id)).await
    }

    async fn create_folder(
        &self,
        workspace_id: i64,
        name: &str,
        description: Option<&str>,
    ) -> Result<Folder> {
        self.post(
            &format!("/workspaces/{}/folders", workspace_id),
            json!({ "name": name, "description": description }),
        )
        .await
    }

    async fn meetings_by_folder(&self, folder_id: i64) -> Result<Vec<Meeting>> {
        self.fetch(&format!("/folders/{}/meetings", folder_id)).await
    }

    async fn meeting(&self, id: i64) -> Result<Option<Meeting>> {
        self.fetch_optional(&format!("/meetings/{}", id)).await
    }

    async fn create_meeting(&self, folder_id: i64, title: &str) -> Result<Meeting> {
        self.post(
            &format!("/folders/{}/meetings", folder_id),
            json!({ "title": title }),
        )
        .await
    }

    async fn transcripts(&self, meeting_id: i64) -> Result<Vec<Transcript>> {
        self.fetch(&format!("/meetings/{}/transcripts", meeting_id))
            .await
    }
}
