//! In-process cloud service and session source for tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::Notify;

use super::api::{
    CloudApi, CloudUser, LoginPoll, LoginStart, SanitizedSession, ServerSyncState, SessionIndexEntry,
    UploadResult,
};
use super::source::{SessionRecord, SessionSource};
use crate::error::{Error, Result};
use crate::lock::lock;
use crate::types::{Platform, Session};

pub const VALID_TOKEN: &str = "valid-token";

/// Holds the first upload until [`UploadGate::release`] is notified.
#[derive(Clone, Default)]
pub struct UploadGate {
    pub started: Arc<Notify>,
    pub release: Arc<Notify>,
}

/// Cloud service that accepts [`VALID_TOKEN`] and records uploaded ids.
#[derive(Default)]
pub struct FakeCloud {
    state: Mutex<ServerSyncState>,
    batches: Mutex<Vec<Vec<String>>>,
    gate: Option<UploadGate>,
    /// Zero-based upload call that answers with a server error
    failing_upload: Option<usize>,
    upload_calls: AtomicUsize,
}

impl FakeCloud {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state(self, state: ServerSyncState) -> Self {
        *lock(&self.state, "cloud state") = state;
        self
    }

    pub fn with_gate(mut self, gate: UploadGate) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn with_failing_upload(mut self, call: usize) -> Self {
        self.failing_upload = Some(call);
        self
    }

    /// Ids of each uploaded batch, in upload order.
    pub fn batches(&self) -> Vec<Vec<String>> {
        lock(&self.batches, "cloud batches").clone()
    }

    fn check(token: &str) -> Result<()> {
        if token == VALID_TOKEN {
            Ok(())
        } else {
            Err(Error::Cloud("API error (401 Unauthorized)".to_string()))
        }
    }
}

#[async_trait]
impl CloudApi for FakeCloud {
    async fn sync_state(&self, token: &str) -> Result<ServerSyncState> {
        Self::check(token)?;
        Ok(lock(&self.state, "cloud state").clone())
    }

    async fn upload_batch(&self, token: &str, sessions: &[SanitizedSession]) -> Result<UploadResult> {
        Self::check(token)?;
        let call = self.upload_calls.fetch_add(1, Ordering::SeqCst);
        if let (0, Some(gate)) = (call, &self.gate) {
            gate.started.notify_one();
            gate.release.notified().await;
        }
        if self.failing_upload == Some(call) {
            return Err(Error::Cloud("API error (500 Internal Server Error)".to_string()));
        }
        lock(&self.batches, "cloud batches").push(sessions.iter().map(|s| s.id.clone()).collect());
        {
            let mut state = lock(&self.state, "cloud state");
            state.synced_sessions += sessions.len();
            state.last_synced_at = Some(Utc::now());
        }
        Ok(UploadResult {
            accepted: sessions.len(),
            rejected: 0,
        })
    }

    async fn validate_token(&self, token: &str) -> Result<Option<CloudUser>> {
        Ok((token == VALID_TOKEN).then(|| CloudUser {
            login: "tester".to_string(),
            name: None,
        }))
    }

    async fn start_login(&self) -> Result<LoginStart> {
        Ok(LoginStart {
            verification_url: "https://sync.invalid/device".to_string(),
            device_code: "device".to_string(),
            user_code: None,
        })
    }

    async fn poll_login(&self, _device_code: &str) -> Result<LoginPoll> {
        Ok(LoginPoll::Complete {
            token: VALID_TOKEN.to_string(),
        })
    }
}

/// Fixed list of sessions.
#[derive(Default)]
pub struct StaticSessionSource {
    records: Vec<SessionRecord>,
}

impl StaticSessionSource {
    pub fn new(records: Vec<SessionRecord>) -> Self {
        Self { records }
    }

    /// `count` sessions of `duration_secs`, the newest ending at `end`.
    pub fn uniform(count: usize, platform: Platform, duration_secs: i64, end: DateTime<Utc>) -> Self {
        Self::new(
            (0..count)
                .map(|i| record(&format!("s{}", i), platform, duration_secs, end - Duration::minutes(i as i64)))
                .collect(),
        )
    }
}

pub fn record(id: &str, platform: Platform, duration_secs: i64, end: DateTime<Utc>) -> SessionRecord {
    let mut session = Session::new(id, "project", platform, end - Duration::seconds(duration_secs));
    session.last_activity_time = end;
    SessionRecord {
        project_name: "acme/app".to_string(),
        session,
    }
}

#[async_trait]
impl SessionSource for StaticSessionSource {
    async fn index(&self) -> Result<Vec<SessionIndexEntry>> {
        Ok(self
            .records
            .iter()
            .map(|r| SessionIndexEntry {
                id: r.session.id.clone(),
                source: r.session.platform,
                project_name: r.project_name.clone(),
                start_time: r.session.start_time,
                last_activity_time: r.session.last_activity_time,
                prompt_count: r.session.prompt_count,
            })
            .collect())
    }

    async fn fetch(&self, ids: &[String]) -> Result<Vec<SessionRecord>> {
        Ok(self
            .records
            .iter()
            .filter(|r| ids.contains(&r.session.id))
            .cloned()
            .collect())
    }
}
