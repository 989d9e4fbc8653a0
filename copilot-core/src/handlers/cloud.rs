//! Cloud login, sync runs and sync status.

use std::sync::Arc;

use async_trait::async_trait;

use super::{HostContext, MessageHandler};
use crate::error::Result;
use crate::protocol::{InboundMessage, OutboundMessage, PushSender};
use crate::sync::{CloudStatus, SyncFilter, SyncProgress};

const TYPES: &[&str] = &[
    "getCloudStatus",
    "loginWithGithub",
    "logout",
    "syncNow",
    "previewSync",
    "syncWithFilters",
    "cancelSync",
    "getSyncStatus",
];

pub struct CloudHandler {
    ctx: Arc<HostContext>,
}

impl CloudHandler {
    pub fn new(ctx: Arc<HostContext>) -> Self {
        Self { ctx }
    }

    async fn push_cloud_status(&self, push: &PushSender) -> Result<()> {
        let status = self.ctx.cloud()?.status().await?;
        push.send(OutboundMessage::CloudStatus(status));
        Ok(())
    }

    /// `syncComplete` always ends a run. Status refreshes go out before it,
    /// except after a cancel, where the cancelled progress must come last.
    async fn run_sync(&self, filter: &SyncFilter, push: &PushSender) -> Result<()> {
        let engine = self.ctx.sync()?;
        let progress = |p: SyncProgress| push.send(OutboundMessage::SyncProgress(p));
        let outcome = engine.sync_with_filters(filter, &progress).await;

        if outcome.auth.is_some() {
            if let Err(e) = self.push_cloud_status(push).await {
                tracing::warn!(error = %e, "Could not refresh cloud status after auth failure");
            }
        } else if outcome.sessions_uploaded > 0 && !outcome.cancelled {
            if let Err(e) = self.refresh_after_upload(push).await {
                tracing::warn!(error = %e, "Could not refresh sync status after upload");
            }
        }
        push.send(OutboundMessage::SyncComplete(outcome));
        Ok(())
    }

    async fn refresh_after_upload(&self, push: &PushSender) -> Result<()> {
        self.push_cloud_status(push).await?;
        push.send(OutboundMessage::SyncStatus(self.ctx.sync()?.status().await?));
        Ok(())
    }
}

#[async_trait]
impl MessageHandler for CloudHandler {
    fn name(&self) -> &'static str {
        "cloud"
    }

    fn handled_types(&self) -> &'static [&'static str] {
        TYPES
    }

    async fn handle(&self, message: &InboundMessage, push: &PushSender) -> Result<bool> {
        match message {
            InboundMessage::GetCloudStatus(_) => self.push_cloud_status(push).await?,
            InboundMessage::LoginWithGithub(_) => {
                let status = self.ctx.cloud()?.login().await?;
                push.send(OutboundMessage::CloudStatus(status));
            }
            InboundMessage::Logout(_) => {
                self.ctx.cloud()?.logout().await?;
                push.send(OutboundMessage::CloudStatus(CloudStatus::default()));
            }
            InboundMessage::SyncNow(_) => self.run_sync(&SyncFilter::default(), push).await?,
            InboundMessage::SyncWithFilters(filter) => self.run_sync(filter, push).await?,
            InboundMessage::PreviewSync(filter) => {
                let preview = self.ctx.sync()?.preview(filter).await?;
                push.send(OutboundMessage::SyncPreview(preview));
            }
            InboundMessage::CancelSync(_) => {
                let was_running = self.ctx.sync()?.cancel();
                push.send(OutboundMessage::SyncCancelled { was_running });
            }
            InboundMessage::GetSyncStatus(_) => {
                push.send(OutboundMessage::SyncStatus(self.ctx.sync()?.status().await?));
            }
            _ => return Ok(false),
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::config::Config;
    use crate::error::Error;
    use crate::handlers::testing::{context, drain, kinds, push};
    use crate::host::HostCapabilities;
    use crate::protocol::inbound::Empty;
    use crate::sync::testing::{FakeCloud, StaticSessionSource, VALID_TOKEN};
    use crate::sync::CLOUD_TOKEN_KEY;
    use crate::types::Platform;

    async fn cloud_context(token: Option<&str>, sessions: usize) -> Arc<HostContext> {
        let host = HostCapabilities::in_memory();
        if let Some(token) = token {
            host.secrets.store(CLOUD_TOKEN_KEY, token).await.unwrap();
        }
        let ctx = HostContext::builder(host, Config::default())
            .cloud_api(Arc::new(FakeCloud::new()))
            .session_source(Arc::new(StaticSessionSource::uniform(
                sessions,
                Platform::Cursor,
                600,
                Utc::now(),
            )))
            .build()
            .await
            .unwrap();
        Arc::new(ctx)
    }

    #[tokio::test]
    async fn test_sync_now_reports_progress_and_status() {
        let handler = CloudHandler::new(cloud_context(Some(VALID_TOKEN), 3).await);
        let (push, mut rx) = push();

        handler.handle(&InboundMessage::SyncNow(Empty {}), &push).await.unwrap();
        let out = drain(&mut rx);
        let kinds = kinds(&out);
        assert!(kinds.iter().any(|k| k == "syncProgress"));
        assert_eq!(&kinds[kinds.len() - 3..], &["cloudStatus", "syncStatus", "syncComplete"]);
        match out.last().unwrap() {
            OutboundMessage::SyncComplete(outcome) => {
                assert!(outcome.success);
                assert_eq!(outcome.sessions_uploaded, 3);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_sync_requires_login() {
        let handler = CloudHandler::new(cloud_context(None, 3).await);
        let (push, mut rx) = push();

        handler.handle(&InboundMessage::SyncNow(Empty {}), &push).await.unwrap();
        let out = drain(&mut rx);
        assert_eq!(kinds(&out), vec!["syncProgress", "cloudStatus", "syncComplete"]);
        match &out[2] {
            OutboundMessage::SyncComplete(outcome) => {
                assert!(!outcome.success);
                assert_eq!(outcome.error.as_deref(), Some("Please login to sync your sessions."));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_cancel_when_idle() {
        let handler = CloudHandler::new(cloud_context(Some(VALID_TOKEN), 0).await);
        let (push, mut rx) = push();
        handler.handle(&InboundMessage::CancelSync(Empty {}), &push).await.unwrap();
        assert_eq!(
            drain(&mut rx),
            vec![OutboundMessage::SyncCancelled { was_running: false }]
        );
    }

    #[tokio::test]
    async fn test_without_cloud_service() {
        let handler = CloudHandler::new(context(HostCapabilities::in_memory(), None).await);
        let (push, _rx) = push();
        let err = handler
            .handle(&InboundMessage::GetSyncStatus(Empty {}), &push)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Unavailable("Cloud sync")));
    }
}
