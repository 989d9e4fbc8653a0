//! Editor hook scripts.

use std::sync::Arc;

use async_trait::async_trait;

use super::{HostContext, MessageHandler};
use crate::error::Result;
use crate::protocol::{InboundMessage, OutboundMessage, PushSender};

const TYPES: &[&str] = &["installHooks", "uninstallHooks", "getHooksStatus"];

pub struct HooksHandler {
    ctx: Arc<HostContext>,
}

impl HooksHandler {
    pub fn new(ctx: Arc<HostContext>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl MessageHandler for HooksHandler {
    fn name(&self) -> &'static str {
        "hooks"
    }

    fn handled_types(&self) -> &'static [&'static str] {
        TYPES
    }

    async fn handle(&self, message: &InboundMessage, push: &PushSender) -> Result<bool> {
        let hooks = &self.ctx.host.hooks;
        let status = match message {
            InboundMessage::InstallHooks(_) => {
                let status = hooks.install().await?;
                self.ctx.settings.set_use_hooks(status.installed).await?;
                tracing::info!(cursor = status.cursor, claude_code = status.claude_code, "Hooks installed");
                status
            }
            InboundMessage::UninstallHooks(_) => {
                let status = hooks.uninstall().await?;
                self.ctx.settings.set_use_hooks(false).await?;
                tracing::info!("Hooks uninstalled");
                status
            }
            InboundMessage::GetHooksStatus(_) => hooks.status().await?,
            _ => return Ok(false),
        };
        push.send(OutboundMessage::HooksStatus(status));
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::testing::{context, drain, push};
    use crate::host::{HooksInstaller, HooksStatus, HostCapabilities};
    use crate::protocol::inbound::Empty;

    struct FakeInstaller;

    #[async_trait]
    impl HooksInstaller for FakeInstaller {
        async fn install(&self) -> Result<HooksStatus> {
            Ok(HooksStatus {
                installed: true,
                cursor: true,
                claude_code: true,
                message: None,
            })
        }

        async fn uninstall(&self) -> Result<HooksStatus> {
            Ok(HooksStatus::default())
        }

        async fn status(&self) -> Result<HooksStatus> {
            Ok(HooksStatus::default())
        }
    }

    #[tokio::test]
    async fn test_install_turns_on_use_hooks() {
        let mut host = HostCapabilities::in_memory();
        host.hooks = Arc::new(FakeInstaller);
        let ctx = context(host, None).await;
        let handler = HooksHandler::new(ctx.clone());
        let (push, mut rx) = push();

        handler.handle(&InboundMessage::InstallHooks(Empty {}), &push).await.unwrap();
        assert!(ctx.settings.use_hooks().await.unwrap());
        assert!(matches!(
            drain(&mut rx).as_slice(),
            [OutboundMessage::HooksStatus(HooksStatus { installed: true, .. })]
        ));

        handler.handle(&InboundMessage::UninstallHooks(Empty {}), &push).await.unwrap();
        assert!(!ctx.settings.use_hooks().await.unwrap());
    }

    #[tokio::test]
    async fn test_install_failure_leaves_setting() {
        let ctx = context(HostCapabilities::in_memory(), None).await;
        let handler = HooksHandler::new(ctx.clone());
        let (push, mut rx) = push();

        assert!(handler.handle(&InboundMessage::InstallHooks(Empty {}), &push).await.is_err());
        assert!(!ctx.settings.use_hooks().await.unwrap());
        assert!(drain(&mut rx).is_empty());
    }
}
