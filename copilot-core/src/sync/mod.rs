//! Cloud sync: login, preview, filtered batch upload and status.

pub mod api;
pub mod auth;
pub mod cache;
pub mod client;
pub mod engine;
pub mod source;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use api::{CloudApi, CloudUser, SanitizedSession, ServerSyncState, SessionIndexEntry};
pub use auth::{CloudAuthService, CloudStatus, CLOUD_TOKEN_KEY};
pub use cache::{SyncStatus, SyncStatusCache};
pub use client::HttpCloudClient;
pub use engine::{
    AuthProblem, FilterType, SyncEngine, SyncFilter, SyncOutcome, SyncPhase, SyncPreview, SyncProgress,
};
pub use source::{DefaultSanitizer, Sanitizer, SessionRecord, SessionSource, StoreSessionSource};
