//! TTL-bounded sync-status cache.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::lock::lock;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatus {
    pub local_sessions: usize,
    pub synced_sessions: usize,
    pub pending_uploads: usize,
    pub last_synced: Option<DateTime<Utc>>,
}

pub struct SyncStatusCache {
    ttl: Duration,
    entry: Mutex<Option<(Instant, SyncStatus)>>,
}

impl SyncStatusCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entry: Mutex::new(None),
        }
    }

    /// The cached status if it is younger than the TTL.
    pub fn get(&self) -> Option<SyncStatus> {
        let entry = lock(&self.entry, "sync status cache");
        match entry.as_ref() {
            Some((at, status)) if at.elapsed() < self.ttl => Some(status.clone()),
            _ => None,
        }
    }

    pub fn put(&self, status: SyncStatus) {
        *lock(&self.entry, "sync status cache") = Some((Instant::now(), status));
    }

    pub fn invalidate(&self) {
        if lock(&self.entry, "sync status cache").take().is_some() {
            tracing::debug!("Sync status cache invalidated");
        }
    }
}
