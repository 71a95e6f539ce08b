//! TickTick HTTP client.
//!
//! `RemoteTask` is the wire representation owned by the remote service —
//! numeric status/priority codes, camelCase fields, tags as `{name}` objects.
//! The engine never assumes the remote retains the embedded ICE block
//! verbatim between round-trips; it always re-extracts on pull.

use anyhow::anyhow;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::SyncError;

/// Request timeout for TickTick API calls.
const HTTP_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteTag {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteTask {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub content: String,
    pub status: i64,
    pub priority: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(default)]
    pub tags: Vec<RemoteTag>,
}

/// Remote operations consumed by the sync engine.
///
/// `list_all` materializes the full listing before returning; `update_one`
/// is keyed by the task's external id.
#[async_trait]
pub trait RemoteTaskClient: Send + Sync {
    async fn list_all(&self) -> Result<Vec<RemoteTask>, SyncError>;
    async fn update_one(&self, external_id: &str, task: &RemoteTask) -> Result<(), SyncError>;
}

// ─── HTTP implementation ──────────────────────────────────────────────────────

pub struct HttpRemoteClient {
    client: reqwest::Client,
    base_url: String,
    access_token: String,
}

impl HttpRemoteClient {
    pub fn new(base_url: impl Into<String>, access_token: impl Into<String>) -> Result<Self, SyncError> {
        let client = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| SyncError::RemoteCall(e.into()))?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            access_token: access_token.into(),
        })
    }
}

#[async_trait]
impl RemoteTaskClient for HttpRemoteClient {
    async fn list_all(&self) -> Result<Vec<RemoteTask>, SyncError> {
        let url = format!("{}/task/all", self.base_url);
        let tasks = self
            .client
            .get(&url)
            .bearer_auth(&self.access_token)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(tasks)
    }

    async fn update_one(&self, external_id: &str, task: &RemoteTask) -> Result<(), SyncError> {
        let url = format!("{}/task/{}", self.base_url, external_id);
        let resp = self
            .client
            .put(&url)
            .bearer_auth(&self.access_token)
            .json(task)
            .send()
            .await?;
        // Surface the response body on failure — TickTick puts the useful
        // detail there, not in the status line.
        if let Err(e) = resp.error_for_status_ref() {
            let body = resp.text().await.unwrap_or_default();
            return Err(SyncError::RemoteCall(anyhow!("{e}: {body}")));
        }
        Ok(())
    }
}
