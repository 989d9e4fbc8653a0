//! LLM provider selection, API keys, models and per-feature overrides.

use std::sync::Arc;

use async_trait::async_trait;

use super::{HostContext, MessageHandler};
use crate::error::Result;
use crate::llm::ProviderId;
use crate::protocol::{InboundMessage, OutboundMessage, PushSender};

const TYPES: &[&str] = &[
    "getProviders",
    "switchProvider",
    "verifyApiKey",
    "setOllamaModel",
    "setOpenRouterModel",
    "detectProviders",
    "getAvailableModels",
    "getFeatureModels",
    "setFeatureModel",
    "setFeatureModelsEnabled",
    "resetFeatureModels",
];

pub struct ProviderHandler {
    ctx: Arc<HostContext>,
}

impl ProviderHandler {
    pub fn new(ctx: Arc<HostContext>) -> Self {
        Self { ctx }
    }

    async fn push_providers(&self, push: &PushSender) -> Result<()> {
        push.send(OutboundMessage::ProvidersUpdate(
            self.ctx.providers.get_providers().await?,
        ));
        Ok(())
    }

    async fn push_feature_models(&self, push: &PushSender) -> Result<()> {
        push.send(OutboundMessage::FeatureModels(
            self.ctx.providers.feature_models().await?,
        ));
        Ok(())
    }
}

#[async_trait]
impl MessageHandler for ProviderHandler {
    fn name(&self) -> &'static str {
        "providers"
    }

    fn handled_types(&self) -> &'static [&'static str] {
        TYPES
    }

    async fn handle(&self, message: &InboundMessage, push: &PushSender) -> Result<bool> {
        let registry = &self.ctx.providers;
        match message {
            InboundMessage::GetProviders(_) => self.push_providers(push).await?,
            InboundMessage::SwitchProvider(req) => {
                registry
                    .switch_provider(req.provider_id, req.model.as_deref())
                    .await?;
                self.push_providers(push).await?;
            }
            InboundMessage::VerifyApiKey(req) => {
                let result = registry
                    .verify_api_key(req.provider_id, &req.api_key, req.model.as_deref())
                    .await?;
                let verified = result.success;
                push.send(OutboundMessage::VerifyApiKeyResult(result));
                if verified {
                    self.push_providers(push).await?;
                }
            }
            InboundMessage::SetOllamaModel(req) => {
                registry.set_model(ProviderId::Ollama, &req.model).await?;
                self.push_providers(push).await?;
            }
            InboundMessage::SetOpenRouterModel(req) => {
                registry.set_model(ProviderId::OpenRouter, &req.model).await?;
                self.push_providers(push).await?;
            }
            InboundMessage::DetectProviders(_) => push.send(OutboundMessage::ProvidersDetected {
                providers: registry.detect_providers().await?,
            }),
            InboundMessage::GetAvailableModels(_) => push.send(OutboundMessage::AvailableModels {
                models: registry.available_models().await?,
            }),
            InboundMessage::GetFeatureModels(_) => self.push_feature_models(push).await?,
            InboundMessage::SetFeatureModel(req) => {
                registry
                    .set_feature_model(req.feature, req.model.as_deref())
                    .await?;
                self.push_feature_models(push).await?;
            }
            InboundMessage::SetFeatureModelsEnabled(req) => {
                registry.set_feature_models_enabled(req.enabled).await?;
                self.push_feature_models(push).await?;
            }
            InboundMessage::ResetFeatureModels(_) => {
                registry.reset_feature_models().await?;
                self.push_feature_models(push).await?;
            }
            _ => return Ok(false),
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::testing::{context, drain, kinds, push};
    use crate::host::HostCapabilities;
    use crate::llm::testing::StubProvider;
    use crate::protocol::inbound::{SwitchProvider, VerifyApiKey};

    #[tokio::test]
    async fn test_verify_key_does_not_enable_provider() {
        let stub = StubProvider::new(ProviderId::Ollama, "m", "ok");
        let host = HostCapabilities::in_memory();
        let ctx = context(host.clone(), Some(stub)).await;
        let handler = ProviderHandler::new(ctx);
        let (push, mut rx) = push();

        let msg = InboundMessage::VerifyApiKey(VerifyApiKey {
            provider_id: ProviderId::OpenRouter,
            api_key: " sk-test ".to_string(),
            model: Some("anthropic/claude-3.5-sonnet".to_string()),
        });
        handler.handle(&msg, &push).await.unwrap();

        let out = drain(&mut rx);
        assert_eq!(kinds(&out), vec!["verifyApiKeyResult", "providersUpdate"]);
        match &out[1] {
            OutboundMessage::ProvidersUpdate(view) => {
                let openrouter = view
                    .providers
                    .iter()
                    .find(|p| p.id == ProviderId::OpenRouter)
                    .unwrap();
                assert!(!openrouter.enabled);
                assert!(openrouter.has_api_key);
                assert_eq!(openrouter.model.as_deref(), Some("anthropic/claude-3.5-sonnet"));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(host.secrets.get("openrouter").await.unwrap().as_deref(), Some("sk-test"));
    }

    #[tokio::test]
    async fn test_empty_key_is_rejected_without_side_effects() {
        let ctx = context(HostCapabilities::in_memory(), None).await;
        let handler = ProviderHandler::new(ctx);
        let (push, mut rx) = push();

        let msg = InboundMessage::VerifyApiKey(VerifyApiKey {
            provider_id: ProviderId::OpenRouter,
            api_key: String::new(),
            model: None,
        });
        handler.handle(&msg, &push).await.unwrap();
        match drain(&mut rx).as_slice() {
            [OutboundMessage::VerifyApiKeyResult(result)] => {
                assert!(!result.success);
                assert_eq!(result.error.as_deref(), Some("API key is required"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_switch_leaves_one_enabled() {
        let stub = StubProvider::new(ProviderId::Ollama, "m", "ok");
        let ctx = context(HostCapabilities::in_memory(), Some(stub)).await;
        let handler = ProviderHandler::new(ctx);
        let (push, mut rx) = push();

        let msg = InboundMessage::SwitchProvider(SwitchProvider {
            provider_id: ProviderId::CursorCli,
            model: None,
        });
        handler.handle(&msg, &push).await.unwrap();
        match drain(&mut rx).as_slice() {
            [OutboundMessage::ProvidersUpdate(view)] => {
                let enabled: Vec<_> = view.providers.iter().filter(|p| p.enabled).map(|p| p.id).collect();
                assert_eq!(enabled, vec![ProviderId::CursorCli]);
                assert_eq!(view.active_provider, Some(ProviderId::CursorCli));
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
