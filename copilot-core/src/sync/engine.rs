//! Sync preview, upload pipeline and status
//!
//! A sync runs `preparing → sanitizing → uploading (per batch) → complete`,
//! or ends `cancelled` / `error`. One cancellation token is scoped to the
//! running sync and is checked at every phase boundary and before each
//! batch; an in-flight batch is never interrupted.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio_util::sync::CancellationToken;

use super::api::{ServerSyncState, SessionIndexEntry};
use super::auth::CloudAuthService;
use super::cache::{SyncStatus, SyncStatusCache};
use super::source::{Sanitizer, SessionSource};
use crate::config::SyncConfig;
use crate::error::{Error, Result};
use crate::lock::lock;
use crate::host::Telemetry;
use crate::summary::period::local_midnight;
use crate::types::Platform;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FilterType {
    /// Everything newer than the server's last upload
    #[default]
    Recent,
    DateRange,
    All,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncFilter {
    #[serde(default)]
    pub filter_type: FilterType,
    /// `YYYY-MM-DD` or RFC 3339
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
    #[serde(default)]
    pub limit: Option<usize>,
}

fn parse_day(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .or_else(|_| DateTime::parse_from_rfc3339(value).map(|dt| dt.date_naive()))
        .map_err(|_| Error::InvalidInput(format!("invalid date: {}", value)))
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceCounts {
    pub cursor: usize,
    pub claude_code: usize,
    pub total: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Payload of `syncPreview`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncPreview {
    pub total_sessions: usize,
    #[serde(rename = "estimatedSizeKB")]
    pub estimated_size_kb: u64,
    pub date_range: Option<DateRange>,
    pub filtered_out_short: usize,
    pub sessions_by_source: SourceCounts,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_last_synced_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncPhase {
    Preparing,
    Sanitizing,
    Uploading,
    Complete,
    Cancelled,
    Error,
}

/// Payload of `syncProgress`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncProgress {
    pub phase: SyncPhase,
    pub current: usize,
    pub total: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_batch: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_batches: Option<usize>,
    #[serde(rename = "sizeKB", skip_serializing_if = "Option::is_none")]
    pub size_kb: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl SyncProgress {
    fn at(phase: SyncPhase, current: usize, total: usize) -> Self {
        Self {
            phase,
            current,
            total,
            current_batch: None,
            total_batches: None,
            size_kb: None,
            message: None,
        }
    }
}

/// Why a sync could not authenticate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthProblem {
    NotLoggedIn,
    Expired,
}

impl AuthProblem {
    pub fn message(&self) -> &'static str {
        match self {
            AuthProblem::NotLoggedIn => "Please login to sync your sessions.",
            AuthProblem::Expired => "Your session expired. Please login again.",
        }
    }
}

/// Payload of `syncComplete`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncOutcome {
    pub success: bool,
    pub sessions_uploaded: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip)]
    pub auth: Option<AuthProblem>,
    #[serde(skip)]
    pub cancelled: bool,
}

impl SyncOutcome {
    fn succeeded(sessions_uploaded: usize) -> Self {
        Self {
            success: true,
            sessions_uploaded,
            error: None,
            auth: None,
            cancelled: false,
        }
    }

    fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            sessions_uploaded: 0,
            error: Some(error.into()),
            auth: None,
            cancelled: false,
        }
    }

    fn unauthenticated(problem: AuthProblem) -> Self {
        Self {
            auth: Some(problem),
            ..Self::failed(problem.message())
        }
    }
}

struct Selection {
    /// Newest first
    eligible: Vec<SessionIndexEntry>,
    filtered_out_short: usize,
}

pub type ProgressFn<'a> = &'a (dyn Fn(SyncProgress) + Send + Sync);

pub struct SyncEngine {
    source: Arc<dyn SessionSource>,
    sanitizer: Arc<dyn Sanitizer>,
    auth: Arc<CloudAuthService>,
    cache: Arc<SyncStatusCache>,
    telemetry: Arc<dyn Telemetry>,
    config: SyncConfig,
    active: Mutex<Option<CancellationToken>>,
}

impl SyncEngine {
    pub fn new(
        source: Arc<dyn SessionSource>,
        sanitizer: Arc<dyn Sanitizer>,
        auth: Arc<CloudAuthService>,
        cache: Arc<SyncStatusCache>,
        telemetry: Arc<dyn Telemetry>,
        config: SyncConfig,
    ) -> Self {
        Self {
            source,
            sanitizer,
            auth,
            cache,
            telemetry,
            config,
            active: Mutex::new(None),
        }
    }

    pub fn auth(&self) -> &Arc<CloudAuthService> {
        &self.auth
    }

    pub fn cache(&self) -> &Arc<SyncStatusCache> {
        &self.cache
    }

    pub fn is_syncing(&self) -> bool {
        lock(&self.active, "active sync").is_some()
    }

    /// Trip the running sync's token. Returns false when nothing is running.
    pub fn cancel(&self) -> bool {
        match lock(&self.active, "active sync").as_ref() {
            Some(token) => {
                tracing::info!("Sync cancellation requested");
                token.cancel();
                true
            }
            None => false,
        }
    }

    fn begin(&self) -> Option<CancellationToken> {
        let mut active = lock(&self.active, "active sync");
        if active.is_some() {
            return None;
        }
        let token = CancellationToken::new();
        *active = Some(token.clone());
        Some(token)
    }

    fn finish(&self) {
        *lock(&self.active, "active sync") = None;
    }

    async fn server_state(&self) -> Option<ServerSyncState> {
        let token = match self.auth.token().await {
            Ok(Some(token)) => token,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read cloud token");
                return None;
            }
        };
        match self.auth.api().sync_state(&token).await {
            Ok(state) => Some(state),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to fetch server sync state");
                None
            }
        }
    }

    fn select(
        &self,
        index: Vec<SessionIndexEntry>,
        filter: &SyncFilter,
        server_last: Option<DateTime<Utc>>,
    ) -> Result<Selection> {
        let start = filter
            .start_date
            .as_deref()
            .map(parse_day)
            .transpose()?
            .map(local_midnight)
            .transpose()?;
        let end = filter
            .end_date
            .as_deref()
            .map(parse_day)
            .transpose()?
            .map(|day| local_midnight(day + chrono::Duration::days(1)))
            .transpose()?;

        let in_window = |ts: DateTime<Utc>| match filter.filter_type {
            FilterType::Recent => server_last.map_or(true, |last| ts > last),
            FilterType::DateRange => start.map_or(true, |s| ts >= s) && end.map_or(true, |e| ts < e),
            FilterType::All => true,
        };

        let mut filtered_out_short = 0;
        let mut eligible: Vec<SessionIndexEntry> = index
            .into_iter()
            .filter(|entry| in_window(entry.last_activity_time))
            .filter(|entry| {
                let long_enough = entry.duration_secs() >= self.config.min_duration_secs;
                if !long_enough {
                    filtered_out_short += 1;
                }
                long_enough
            })
            .collect();
        eligible.sort_by(|a, b| b.last_activity_time.cmp(&a.last_activity_time));
        if let (FilterType::Recent, Some(limit)) = (filter.filter_type, filter.limit) {
            eligible.truncate(limit);
        }
        Ok(Selection {
            eligible,
            filtered_out_short,
        })
    }

    pub async fn preview(&self, filter: &SyncFilter) -> Result<SyncPreview> {
        let server_last = if filter.filter_type == FilterType::Recent {
            self.server_state().await.and_then(|s| s.last_synced_at)
        } else {
            None
        };
        let selection = self.select(self.source.index().await?, filter, server_last)?;

        let mut by_source = SourceCounts::default();
        for entry in &selection.eligible {
            match entry.source {
                Platform::Cursor => by_source.cursor += 1,
                Platform::ClaudeCode => by_source.claude_code += 1,
            }
        }
        by_source.total = selection.eligible.len();

        let date_range = match (
            selection.eligible.iter().map(|e| e.start_time).min(),
            selection.eligible.iter().map(|e| e.last_activity_time).max(),
        ) {
            (Some(start), Some(end)) => Some(DateRange { start, end }),
            _ => None,
        };

        Ok(SyncPreview {
            total_sessions: selection.eligible.len(),
            estimated_size_kb: selection.eligible.len() as u64 * self.config.estimated_kb_per_session,
            date_range,
            filtered_out_short: selection.filtered_out_short,
            sessions_by_source: by_source,
            server_last_synced_at: server_last,
        })
    }

    /// Upload the sessions selected by `filter`. Always resolves; failures are
    /// reported in the outcome.
    pub async fn sync_with_filters(&self, filter: &SyncFilter, progress: ProgressFn<'_>) -> SyncOutcome {
        let Some(cancel) = self.begin() else {
            return SyncOutcome::failed("A sync is already in progress");
        };
        self.cache.invalidate();

        let result = self.run(filter, &cancel, progress).await;

        self.finish();
        self.cache.invalidate();

        match result {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(error = %e, "Sync failed");
                progress(SyncProgress {
                    message: Some(e.to_string()),
                    ..SyncProgress::at(SyncPhase::Error, 0, 0)
                });
                SyncOutcome::failed(e.to_string())
            }
        }
    }

    fn cancelled(&self, uploaded: usize, total: usize, progress: ProgressFn<'_>) -> SyncOutcome {
        tracing::info!(uploaded, total, "Sync cancelled");
        progress(SyncProgress::at(SyncPhase::Cancelled, uploaded, uploaded));
        let success = uploaded > 0 || total == 0;
        SyncOutcome {
            success,
            sessions_uploaded: uploaded,
            error: (!success).then(|| "Sync cancelled".to_string()),
            auth: None,
            cancelled: true,
        }
    }

    /// Earlier batches are already on the server, so the count reflects them.
    fn upload_failed(&self, error: &Error, uploaded: usize, total: usize, progress: ProgressFn<'_>) -> SyncOutcome {
        tracing::error!(error = %error, uploaded, total, "Batch upload failed");
        progress(SyncProgress {
            message: Some(error.to_string()),
            ..SyncProgress::at(SyncPhase::Error, uploaded, total)
        });
        SyncOutcome {
            sessions_uploaded: uploaded,
            ..SyncOutcome::failed(error.to_string())
        }
    }

    async fn run(&self, filter: &SyncFilter, cancel: &CancellationToken, progress: ProgressFn<'_>) -> Result<SyncOutcome> {
        progress(SyncProgress::at(SyncPhase::Preparing, 0, 0));

        let Some(token) = self.auth.token().await? else {
            return Ok(SyncOutcome::unauthenticated(AuthProblem::NotLoggedIn));
        };
        let api = self.auth.api().clone();
        if api.validate_token(&token).await?.is_none() {
            return Ok(SyncOutcome::unauthenticated(AuthProblem::Expired));
        }
        if cancel.is_cancelled() {
            return Ok(self.cancelled(0, 0, progress));
        }

        let server_last = if filter.filter_type == FilterType::Recent {
            api.sync_state(&token).await?.last_synced_at
        } else {
            None
        };
        let selection = self.select(self.source.index().await?, filter, server_last)?;
        let total = selection.eligible.len();
        tracing::info!(total, filtered_out_short = selection.filtered_out_short, "Sync selection ready");
        if total == 0 {
            progress(SyncProgress::at(SyncPhase::Complete, 0, 0));
            return Ok(SyncOutcome::succeeded(0));
        }
        if cancel.is_cancelled() {
            return Ok(self.cancelled(0, total, progress));
        }

        let ids: Vec<String> = selection.eligible.iter().map(|e| e.id.clone()).collect();
        let records = self.source.fetch(&ids).await?;
        if cancel.is_cancelled() {
            return Ok(self.cancelled(0, total, progress));
        }

        progress(SyncProgress::at(SyncPhase::Sanitizing, 0, total));
        let sanitized: Vec<_> = records.iter().map(|r| self.sanitizer.sanitize(r)).collect();
        if cancel.is_cancelled() {
            return Ok(self.cancelled(0, total, progress));
        }

        let total = sanitized.len();
        let batch_size = self.config.batch_size.clamp(1, 100);
        let total_batches = total.div_ceil(batch_size);
        let mut uploaded = 0;
        for (i, batch) in sanitized.chunks(batch_size).enumerate() {
            if cancel.is_cancelled() {
                return Ok(self.cancelled(uploaded, total, progress));
            }
            progress(SyncProgress {
                current_batch: Some(i + 1),
                total_batches: Some(total_batches),
                size_kb: Some(batch.len() as u64 * self.config.estimated_kb_per_session),
                ..SyncProgress::at(SyncPhase::Uploading, uploaded, total)
            });
            let result = match api.upload_batch(&token, batch).await {
                Ok(result) => result,
                Err(e) => return Ok(self.upload_failed(&e, uploaded, total, progress)),
            };
            if result.rejected > 0 {
                tracing::debug!(rejected = result.rejected, "Server rejected part of a batch");
            }
            uploaded += batch.len();
        }

        progress(SyncProgress::at(SyncPhase::Complete, uploaded, total));
        self.telemetry.track("sessions-synced", json!({ "count": uploaded }));
        tracing::info!(uploaded, "Sync complete");
        Ok(SyncOutcome::succeeded(uploaded))
    }

    /// Cached status, recomputed when stale.
    pub async fn status(&self) -> Result<SyncStatus> {
        if let Some(status) = self.cache.get() {
            return Ok(status);
        }
        let eligible: Vec<SessionIndexEntry> = self
            .source
            .index()
            .await?
            .into_iter()
            .filter(|e| e.duration_secs() >= self.config.min_duration_secs)
            .collect();
        let server = self.server_state().await.unwrap_or_default();
        let last = server.last_synced_at;
        let status = SyncStatus {
            local_sessions: eligible.len(),
            synced_sessions: server.synced_sessions,
            pending_uploads: eligible
                .iter()
                .filter(|e| last.map_or(true, |l| e.last_activity_time > l))
                .count(),
            last_synced: last,
        };
        self.cache.put(status.clone());
        Ok(status)
    }

    /// Warm the status cache once, shortly after startup.
    pub fn spawn_precache(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let engine = self.clone();
        let delay = Duration::from_secs(self.config.precache_delay_secs);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Err(e) = engine.status().await {
                tracing::debug!(error = %e, "Sync status pre-cache failed");
            }
        })
    }
}
