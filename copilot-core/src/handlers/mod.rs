//! Message handlers
//!
//! Each handler owns one slice of the inbound protocol. The router asks
//! handlers in registration order; the first one that claims a message
//! handles it. Handlers push results through the [`PushSender`] and return
//! `Ok(false)` only for messages they do not own.

pub mod cloud;
pub mod coaching;
pub mod config;
pub mod context;
pub mod goals;
pub mod hooks;
pub mod prompts;
pub mod providers;
pub mod sessions;
pub mod summaries;

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::protocol::{InboundMessage, PushSender};

pub use context::{HostContext, HostContextBuilder};

#[async_trait]
pub trait MessageHandler: Send + Sync {
    fn name(&self) -> &'static str;

    /// Wire names this handler claims.
    fn handled_types(&self) -> &'static [&'static str];

    fn can_handle(&self, message: &InboundMessage) -> bool {
        self.handled_types().contains(&message.kind())
    }

    /// Handle `message`. `Ok(false)` means "not mine".
    async fn handle(&self, message: &InboundMessage, push: &PushSender) -> Result<bool>;
}

/// Every built-in handler, in dispatch order.
pub fn default_handlers(ctx: Arc<HostContext>) -> Vec<Arc<dyn MessageHandler>> {
    vec![
        Arc::new(sessions::SessionHandler::new(ctx.clone())),
        Arc::new(goals::GoalHandler::new(ctx.clone())),
        Arc::new(coaching::CoachingHandler::new(ctx.clone())),
        Arc::new(prompts::PromptHandler::new(ctx.clone())),
        Arc::new(summaries::SummaryHandler::new(ctx.clone())),
        Arc::new(providers::ProviderHandler::new(ctx.clone())),
        Arc::new(cloud::CloudHandler::new(ctx.clone())),
        Arc::new(hooks::HooksHandler::new(ctx.clone())),
        Arc::new(config::ConfigHandler::new(ctx)),
    ]
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Arc;

    use tokio::sync::mpsc;

    use super::HostContext;
    use crate::config::Config;
    use crate::host::HostCapabilities;
    use crate::llm::testing::{StubFactory, StubProvider};
    use crate::llm::{ProviderConfig, ProviderId};
    use crate::protocol::{ChannelWebview, OutboundMessage, PushSender};
    use crate::settings::{ProviderMap, Settings};

    /// Context over `host`, with ollama backed by `stub` when given.
    pub async fn context(host: HostCapabilities, stub: Option<StubProvider>) -> Arc<HostContext> {
        let mut builder = HostContext::builder(host.clone(), Config::default());
        if let Some(stub) = stub {
            let settings = Settings::new(host.configuration.clone());
            let mut providers = ProviderMap::new();
            providers.insert(
                ProviderId::Ollama.as_str().to_string(),
                ProviderConfig {
                    enabled: Some(true),
                    ..Default::default()
                },
            );
            settings.set_providers(&providers).await.unwrap();
            builder = builder.provider_factory(Arc::new(StubFactory::sharing(stub)));
        }
        Arc::new(builder.build().await.unwrap())
    }

    pub fn push() -> (PushSender, mpsc::UnboundedReceiver<OutboundMessage>) {
        let (webview, rx) = ChannelWebview::new();
        (PushSender::new(Arc::new(webview)), rx)
    }

    /// Everything pushed so far.
    pub fn drain(rx: &mut mpsc::UnboundedReceiver<OutboundMessage>) -> Vec<OutboundMessage> {
        let mut out = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            out.push(msg);
        }
        out
    }

    pub fn kinds(messages: &[OutboundMessage]) -> Vec<String> {
        messages.iter().map(OutboundMessage::kind).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::HostCapabilities;
    use crate::protocol::InboundMessage;

    #[tokio::test]
    async fn test_every_inbound_type_has_exactly_one_owner() {
        let ctx = testing::context(HostCapabilities::in_memory(), None).await;
        let handlers = default_handlers(ctx);
        for kind in InboundMessage::TYPES {
            let owners: Vec<_> = handlers
                .iter()
                .filter(|h| h.handled_types().contains(kind))
                .map(|h| h.name())
                .collect();
            assert_eq!(owners.len(), 1, "{} is owned by {:?}", kind, owners);
        }
    }
}
