//! Active-provider holder with feature-model overrides.

use std::sync::Arc;

use tokio::sync::RwLock;

use super::provider::{LlmProvider, ProviderFactory};
use super::types::{
    CompletionRequest, CompletionResponse, Feature, LlmError, ModelOverride, ProviderId,
};
use crate::error::{Error, Result};
use crate::host::SecretStore;
use crate::settings::Settings;

/// Holds the provider built from the current settings.
///
/// Services resolve a provider per call through [`LlmManager::provider_for`],
/// so a provider switch followed by [`LlmManager::reinitialize`] is picked up
/// by every caller without rebuilding them.
pub struct LlmManager {
    settings: Arc<Settings>,
    secrets: Arc<dyn SecretStore>,
    factory: Arc<dyn ProviderFactory>,
    default_timeout_secs: u64,
    active: RwLock<Option<Arc<dyn LlmProvider>>>,
}

impl LlmManager {
    pub fn new(
        settings: Arc<Settings>,
        secrets: Arc<dyn SecretStore>,
        factory: Arc<dyn ProviderFactory>,
        default_timeout_secs: u64,
    ) -> Self {
        Self {
            settings,
            secrets,
            factory,
            default_timeout_secs,
            active: RwLock::new(None),
        }
    }

    pub fn factory(&self) -> Arc<dyn ProviderFactory> {
        self.factory.clone()
    }

    pub async fn timeout_secs(&self) -> u64 {
        match self.settings.timeout_secs().await {
            Ok(Some(secs)) if secs > 0 => secs,
            _ => self.default_timeout_secs,
        }
    }

    /// Rebuild the active provider from settings and the secret store.
    ///
    /// Leaves no active provider when nothing is enabled or construction
    /// fails; the failure is logged, not returned.
    pub async fn reinitialize(&self) -> Result<()> {
        let provider = match self.enabled_provider_id().await? {
            Some(id) => match self.build(id, None).await {
                Ok(provider) => {
                    tracing::info!(provider = %id, model = provider.model(), "LLM provider initialized");
                    Some(provider)
                }
                Err(e) => {
                    tracing::warn!(provider = %id, error = %e, "Failed to initialize LLM provider");
                    None
                }
            },
            None => {
                tracing::info!("No LLM provider enabled");
                None
            }
        };
        *self.active.write().await = provider;
        Ok(())
    }

    /// `llm.activeProvider`, else the first provider with `enabled: true`.
    async fn enabled_provider_id(&self) -> Result<Option<ProviderId>> {
        if let Some(id) = self.settings.active_provider().await? {
            return Ok(Some(id));
        }
        let providers = self.settings.providers().await?;
        Ok(providers
            .iter()
            .find(|(_, config)| config.is_enabled())
            .and_then(|(id, _)| id.parse().ok()))
    }

    /// Build a provider for `id`, optionally forcing a model.
    pub async fn build(
        &self,
        id: ProviderId,
        model: Option<&str>,
    ) -> Result<Arc<dyn LlmProvider>> {
        let mut config = self.settings.provider(id).await?;
        if let Some(model) = model {
            config.model = Some(model.to_string());
        }
        let api_key = self.secrets.get(id.as_str()).await?;
        let timeout = self.timeout_secs().await;
        Ok(self.factory.create(id, &config, api_key, timeout)?)
    }

    pub async fn active(&self) -> Option<Arc<dyn LlmProvider>> {
        self.active.read().await.clone()
    }

    pub async fn is_available(&self) -> bool {
        self.active.read().await.is_some()
    }

    /// Provider for a feature, honouring `llm.featureModels` overrides.
    pub async fn provider_for(&self, feature: Feature) -> Option<Arc<dyn LlmProvider>> {
        let active = self.active().await;
        let models = match self.settings.feature_models().await {
            Ok(models) if models.enabled => models,
            _ => return active,
        };
        let Some(value) = models.get(feature) else {
            return active;
        };

        let choice = ModelOverride::parse(value);
        let provider_id = match (choice.provider, active.as_ref()) {
            (Some(id), _) => id,
            (None, Some(active)) => active.id(),
            (None, None) => return None,
        };

        match self.build(provider_id, Some(&choice.model)).await {
            Ok(provider) => Some(provider),
            Err(e) => {
                tracing::warn!(
                    feature = feature.as_str(),
                    provider = %provider_id,
                    error = %e,
                    "Feature model override unusable, using active provider"
                );
                active
            }
        }
    }

    /// Complete against the provider for `feature`.
    pub async fn complete(
        &self,
        feature: Feature,
        request: CompletionRequest,
    ) -> Result<CompletionResponse> {
        let provider = self
            .provider_for(feature)
            .await
            .ok_or_else(|| Error::Llm(LlmError::NotAvailable("no LLM provider configured".to_string())))?;
        Ok(provider.complete(request).await?)
    }

    /// Complete against the active provider, ignoring feature overrides.
    pub async fn complete_active(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        let provider = self
            .active()
            .await
            .ok_or_else(|| Error::Llm(LlmError::NotAvailable("no LLM provider configured".to_string())))?;
        Ok(provider.complete(request).await?)
    }
}
