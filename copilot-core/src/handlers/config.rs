//! User preferences, onboarding, local-data reset and editor detection.

use std::sync::Arc;

use async_trait::async_trait;

use super::sessions::session_list;
use super::{HostContext, MessageHandler};
use crate::error::Result;
use crate::protocol::outbound::ConfigView;
use crate::protocol::{InboundMessage, OutboundMessage, PushSender};

const TYPES: &[&str] = &[
    "getConfig",
    "completeOnboarding",
    "setAutoAnalyze",
    "setResponseAnalysis",
    "setSidebarWidth",
    "clearLocalData",
    "detectEditor",
];

pub struct ConfigHandler {
    ctx: Arc<HostContext>,
}

impl ConfigHandler {
    pub fn new(ctx: Arc<HostContext>) -> Self {
        Self { ctx }
    }

    pub async fn view(&self) -> Result<ConfigView> {
        let settings = &self.ctx.settings;
        Ok(ConfigView {
            auto_analyze: settings.auto_analyze().await?,
            response_analysis: settings.response_analysis().await?,
            onboarding_completed: settings.onboarding_completed().await?,
            use_hooks: settings.use_hooks().await?,
            sidebar_width: self.ctx.persistence.sidebar_width().await,
            editor: self.ctx.host.workspace.app_name(),
        })
    }

    /// Forget every session, cached progress and analyzed prompt.
    async fn clear_local_data(&self) -> Result<()> {
        let sessions = &self.ctx.sessions;
        sessions.store.reset().await;
        self.ctx.persistence.clear_all().await?;
        sessions.goal_cache.clear();
        self.ctx.history.clear().await?;
        self.ctx.sync_cache.invalidate();
        tracing::info!("Local data cleared");
        Ok(())
    }
}

#[async_trait]
impl MessageHandler for ConfigHandler {
    fn name(&self) -> &'static str {
        "config"
    }

    fn handled_types(&self) -> &'static [&'static str] {
        TYPES
    }

    async fn handle(&self, message: &InboundMessage, push: &PushSender) -> Result<bool> {
        let settings = &self.ctx.settings;
        match message {
            InboundMessage::GetConfig(_) => {}
            InboundMessage::CompleteOnboarding(_) => settings.set_onboarding_completed(true).await?,
            InboundMessage::SetAutoAnalyze(req) => settings.set_auto_analyze(req.enabled).await?,
            InboundMessage::SetResponseAnalysis(req) => settings.set_response_analysis(req.enabled).await?,
            InboundMessage::SetSidebarWidth(req) => {
                self.ctx.persistence.save_sidebar_width(req.width).await;
            }
            InboundMessage::ClearLocalData(_) => {
                self.clear_local_data().await?;
                push.send(OutboundMessage::LocalDataCleared);
                let state = self.ctx.sessions.store.snapshot().await;
                push.send(OutboundMessage::V2SessionList(session_list(
                    state,
                    &self.ctx.sessions.goal_cache,
                )));
                return Ok(true);
            }
            InboundMessage::DetectEditor(_) => {
                push.send(OutboundMessage::EditorDetected {
                    editor: self.ctx.host.workspace.app_name(),
                    platform: self.ctx.platform(),
                });
                return Ok(true);
            }
            _ => return Ok(false),
        }
        push.send(OutboundMessage::Config(self.view().await?));
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::testing::{context, drain, kinds, push};
    use crate::host::memory::StaticWorkspace;
    use crate::host::HostCapabilities;
    use crate::persistence::{DEFAULT_SIDEBAR_WIDTH, SESSION_STATE_KEY};
    use crate::protocol::inbound::{Empty, SidebarWidth, Toggle};
    use crate::types::Platform;

    #[tokio::test]
    async fn test_config_defaults_and_updates() {
        let ctx = context(HostCapabilities::in_memory(), None).await;
        let handler = ConfigHandler::new(ctx);
        let view = handler.view().await.unwrap();
        assert!(!view.auto_analyze);
        assert!(view.response_analysis);
        assert!(!view.onboarding_completed);
        assert_eq!(view.sidebar_width, DEFAULT_SIDEBAR_WIDTH);

        let (push, mut rx) = push();
        handler
            .handle(&InboundMessage::SetAutoAnalyze(Toggle { enabled: true }), &push)
            .await
            .unwrap();
        handler
            .handle(&InboundMessage::SetSidebarWidth(SidebarWidth { width: 320 }), &push)
            .await
            .unwrap();
        handler
            .handle(&InboundMessage::CompleteOnboarding(Empty {}), &push)
            .await
            .unwrap();
        match drain(&mut rx).pop() {
            Some(OutboundMessage::Config(view)) => {
                assert!(view.auto_analyze);
                assert!(view.onboarding_completed);
                assert_eq!(view.sidebar_width, 320);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_clear_local_data() {
        let host = HostCapabilities::in_memory();
        let ctx = context(host.clone(), None).await;
        let project = ctx.sessions.projects.current_or_default().await.unwrap();
        ctx.sessions
            .lifecycle
            .get_or_create_session(&project.id, Platform::ClaudeCode, None)
            .await
            .unwrap();
        assert!(host.kv.get(SESSION_STATE_KEY).await.unwrap().is_some());

        let handler = ConfigHandler::new(ctx.clone());
        let (push, mut rx) = push();
        handler
            .handle(&InboundMessage::ClearLocalData(Empty {}), &push)
            .await
            .unwrap();

        assert_eq!(kinds(&drain(&mut rx)), vec!["localDataCleared", "v2SessionList"]);
        assert!(ctx.sessions.store.snapshot().await.projects.is_empty());
        assert!(host.kv.get(SESSION_STATE_KEY).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_detect_editor() {
        let mut host = HostCapabilities::in_memory();
        host.workspace = Arc::new(StaticWorkspace::new(Vec::new(), "Cursor"));
        let handler = ConfigHandler::new(context(host, None).await);
        let (push, mut rx) = push();
        handler
            .handle(&InboundMessage::DetectEditor(Empty {}), &push)
            .await
            .unwrap();
        assert_eq!(
            drain(&mut rx),
            vec![OutboundMessage::EditorDetected {
                editor: "Cursor".to_string(),
                platform: Platform::Cursor,
            }]
        );
    }
}
