//! Hand improved prompts and coaching suggestions to the chat panel.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use super::{HostContext, MessageHandler};
use crate::error::Result;
use crate::host::{ChatTarget, NotifyLevel};
use crate::protocol::inbound::UseText;
use crate::protocol::{InboundMessage, OutboundMessage, PushSender};
use crate::types::Platform;

const TYPES: &[&str] = &["useImprovedPrompt", "useCoachingSuggestion"];

pub struct CoachingHandler {
    ctx: Arc<HostContext>,
}

impl CoachingHandler {
    pub fn new(ctx: Arc<HostContext>) -> Self {
        Self { ctx }
    }

    fn default_target(&self) -> ChatTarget {
        match self.ctx.platform() {
            Platform::Cursor => ChatTarget::Cursor,
            Platform::ClaudeCode => ChatTarget::ClaudeCode,
        }
    }

    /// Inject into the chat panel, falling back to the clipboard.
    async fn apply(&self, req: &UseText, source: &str, push: &PushSender) -> Result<()> {
        let target = req.target.unwrap_or_else(|| self.default_target());
        let host = &self.ctx.host;

        let injected = match host.chat.inject(target, &req.text).await {
            Ok(()) => true,
            Err(e) => {
                tracing::info!(?target, error = %e, "Chat injection unavailable, using clipboard");
                false
            }
        };
        let copied = if injected {
            false
        } else {
            host.clipboard.write_text(&req.text).await?;
            host.notifier
                .notify(NotifyLevel::Info, "Copied to clipboard. Paste it into your chat.");
            true
        };

        host.telemetry.track(
            "suggestion-used",
            json!({ "source": source, "injected": injected }),
        );
        push.send(OutboundMessage::SuggestionApplied {
            target: Some(target),
            injected,
            copied_to_clipboard: copied,
        });
        Ok(())
    }
}

#[async_trait]
impl MessageHandler for CoachingHandler {
    fn name(&self) -> &'static str {
        "coaching"
    }

    fn handled_types(&self) -> &'static [&'static str] {
        TYPES
    }

    async fn handle(&self, message: &InboundMessage, push: &PushSender) -> Result<bool> {
        match message {
            InboundMessage::UseImprovedPrompt(req) => self.apply(req, "improved-prompt", push).await?,
            InboundMessage::UseCoachingSuggestion(req) => self.apply(req, "coaching", push).await?,
            _ => return Ok(false),
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::testing::{context, drain, push};
    use crate::host::memory::{MemoryClipboard, RecordingNotifier, StaticWorkspace};
    use crate::host::HostCapabilities;

    #[tokio::test]
    async fn test_falls_back_to_clipboard() {
        let clipboard = Arc::new(MemoryClipboard::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let mut host = HostCapabilities::in_memory();
        host.clipboard = clipboard.clone();
        host.notifier = notifier.clone();
        host.workspace = Arc::new(StaticWorkspace::new(Vec::new(), "Cursor"));

        let handler = CoachingHandler::new(context(host, None).await);
        let (push, mut rx) = push();
        let msg = InboundMessage::UseImprovedPrompt(UseText {
            text: "Add tests for the parser".to_string(),
            target: None,
        });
        assert!(handler.handle(&msg, &push).await.unwrap());

        assert_eq!(clipboard.contents().as_deref(), Some("Add tests for the parser"));
        assert_eq!(notifier.messages().len(), 1);
        assert_eq!(
            drain(&mut rx),
            vec![OutboundMessage::SuggestionApplied {
                target: Some(ChatTarget::Cursor),
                injected: false,
                copied_to_clipboard: true,
            }]
        );
    }
}
