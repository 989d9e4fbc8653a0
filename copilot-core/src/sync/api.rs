//! Cloud sync service interface and wire types.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::{Outcome, Platform};

/// Message-free view of a local session used for filtering and previews.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionIndexEntry {
    pub id: String,
    pub source: Platform,
    pub project_name: String,
    pub start_time: DateTime<Utc>,
    pub last_activity_time: DateTime<Utc>,
    pub prompt_count: usize,
}

impl SessionIndexEntry {
    pub fn duration_secs(&self) -> i64 {
        (self.last_activity_time - self.start_time).num_seconds().max(0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SanitizedPrompt {
    pub timestamp: DateTime<Utc>,
    pub text: String,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SanitizedResponse {
    pub timestamp: DateTime<Utc>,
    pub text: String,
    pub outcome: Outcome,
    pub files_modified: Vec<String>,
    pub tool_calls: Vec<String>,
}

/// On-the-wire form of a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SanitizedSession {
    pub id: String,
    pub source: Platform,
    pub project_name: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub goal: Option<String>,
    pub average_score: f64,
    pub prompts: Vec<SanitizedPrompt>,
    pub responses: Vec<SanitizedResponse>,
}

/// What the server knows about this user's uploads.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerSyncState {
    #[serde(default)]
    pub last_synced_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub synced_sessions: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResult {
    pub accepted: usize,
    #[serde(default)]
    pub rejected: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloudUser {
    pub login: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Device-style login handshake.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginStart {
    pub verification_url: String,
    pub device_code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_code: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginPoll {
    Pending,
    Complete { token: String },
    Expired,
}

#[async_trait]
pub trait CloudApi: Send + Sync {
    async fn sync_state(&self, token: &str) -> Result<ServerSyncState>;

    /// Upload one batch. The server deduplicates by session id.
    async fn upload_batch(&self, token: &str, sessions: &[SanitizedSession]) -> Result<UploadResult>;

    /// `None` when the token is no longer accepted.
    async fn validate_token(&self, token: &str) -> Result<Option<CloudUser>>;

    async fn start_login(&self) -> Result<LoginStart>;

    async fn poll_login(&self, device_code: &str) -> Result<LoginPoll>;
}
