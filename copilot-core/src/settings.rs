//! Typed editor settings
//!
//! Settings live in the host's configuration store under namespaced keys.
//! [`Settings`] maps each key to a runtime type and publishes the changed
//! key on a broadcast channel after every successful write.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::broadcast;

use crate::error::Result;
use crate::host::ConfigurationStore;
use crate::llm::{Feature, FeatureModels, ProviderConfig, ProviderId};

/// Every setting the core reads or writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettingKey {
    LlmProviders,
    LlmActiveProvider,
    LlmTimeout,
    FeatureModelsEnabled,
    FeatureModelsSummaries,
    FeatureModelsPromptScoring,
    FeatureModelsPromptImprovement,
    OnboardingCompleted,
    AutoAnalyzeEnabled,
    ResponseAnalysisEnabled,
    DetectionUseHooks,
}

impl SettingKey {
    pub const ALL: [SettingKey; 11] = [
        SettingKey::LlmProviders,
        SettingKey::LlmActiveProvider,
        SettingKey::LlmTimeout,
        SettingKey::FeatureModelsEnabled,
        SettingKey::FeatureModelsSummaries,
        SettingKey::FeatureModelsPromptScoring,
        SettingKey::FeatureModelsPromptImprovement,
        SettingKey::OnboardingCompleted,
        SettingKey::AutoAnalyzeEnabled,
        SettingKey::ResponseAnalysisEnabled,
        SettingKey::DetectionUseHooks,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SettingKey::LlmProviders => "llm.providers",
            SettingKey::LlmActiveProvider => "llm.activeProvider",
            SettingKey::LlmTimeout => "llm.timeout",
            SettingKey::FeatureModelsEnabled => "llm.featureModels.enabled",
            SettingKey::FeatureModelsSummaries => "llm.featureModels.summaries",
            SettingKey::FeatureModelsPromptScoring => "llm.featureModels.promptScoring",
            SettingKey::FeatureModelsPromptImprovement => "llm.featureModels.promptImprovement",
            SettingKey::OnboardingCompleted => "onboarding.completed",
            SettingKey::AutoAnalyzeEnabled => "autoAnalyze.enabled",
            SettingKey::ResponseAnalysisEnabled => "responseAnalysis.enabled",
            SettingKey::DetectionUseHooks => "detection.useHooks",
        }
    }

    pub fn for_feature(feature: Feature) -> Self {
        match feature {
            Feature::Summaries => SettingKey::FeatureModelsSummaries,
            Feature::PromptScoring => SettingKey::FeatureModelsPromptScoring,
            Feature::PromptImprovement => SettingKey::FeatureModelsPromptImprovement,
        }
    }
}

/// Provider id -> config, as stored under `llm.providers`.
pub type ProviderMap = BTreeMap<String, ProviderConfig>;

/// Typed facade over the host configuration store.
pub struct Settings {
    store: Arc<dyn ConfigurationStore>,
    changes: broadcast::Sender<SettingKey>,
}

impl Settings {
    pub fn new(store: Arc<dyn ConfigurationStore>) -> Self {
        let (changes, _) = broadcast::channel(64);
        Self { store, changes }
    }

    /// Receive the key of every setting written from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<SettingKey> {
        self.changes.subscribe()
    }

    async fn get<T: DeserializeOwned>(&self, key: SettingKey) -> Result<Option<T>> {
        match self.store.get(key.as_str()).await? {
            None | Some(Value::Null) => Ok(None),
            Some(value) => match serde_json::from_value(value) {
                Ok(v) => Ok(Some(v)),
                Err(e) => {
                    tracing::warn!(key = key.as_str(), error = %e, "Ignoring malformed setting");
                    Ok(None)
                }
            },
        }
    }

    async fn set<T: Serialize>(&self, key: SettingKey, value: &T) -> Result<()> {
        let value = serde_json::to_value(value)?;
        self.store.set(key.as_str(), value).await?;
        let _ = self.changes.send(key);
        Ok(())
    }

    /// Clear a setting back to its default.
    pub async fn reset(&self, key: SettingKey) -> Result<()> {
        self.store.set(key.as_str(), Value::Null).await?;
        let _ = self.changes.send(key);
        Ok(())
    }

    // ============================================
    // LLM
    // ============================================

    /// Provider map with any stray `apiKey` entries removed.
    pub async fn providers(&self) -> Result<ProviderMap> {
        let mut providers: ProviderMap = self.get(SettingKey::LlmProviders).await?.unwrap_or_default();
        for config in providers.values_mut() {
            config.extra.remove("apiKey");
        }
        Ok(providers)
    }

    /// Raw provider map, including legacy inline keys.
    pub async fn providers_raw(&self) -> Result<ProviderMap> {
        Ok(self.get(SettingKey::LlmProviders).await?.unwrap_or_default())
    }

    pub async fn set_providers(&self, providers: &ProviderMap) -> Result<()> {
        self.set(SettingKey::LlmProviders, providers).await
    }

    pub async fn provider(&self, id: ProviderId) -> Result<ProviderConfig> {
        Ok(self
            .providers()
            .await?
            .remove(id.as_str())
            .unwrap_or_default())
    }

    pub async fn active_provider(&self) -> Result<Option<ProviderId>> {
        let raw: Option<String> = self.get(SettingKey::LlmActiveProvider).await?;
        Ok(raw.and_then(|s| s.parse().ok()))
    }

    pub async fn set_active_provider(&self, id: Option<ProviderId>) -> Result<()> {
        match id {
            Some(id) => self.set(SettingKey::LlmActiveProvider, &id.as_str()).await,
            None => self.reset(SettingKey::LlmActiveProvider).await,
        }
    }

    pub async fn timeout_secs(&self) -> Result<Option<u64>> {
        self.get(SettingKey::LlmTimeout).await
    }

    pub async fn feature_models(&self) -> Result<FeatureModels> {
        Ok(FeatureModels {
            enabled: self
                .get(SettingKey::FeatureModelsEnabled)
                .await?
                .unwrap_or(false),
            summaries: self.get(SettingKey::FeatureModelsSummaries).await?,
            prompt_scoring: self.get(SettingKey::FeatureModelsPromptScoring).await?,
            prompt_improvement: self.get(SettingKey::FeatureModelsPromptImprovement).await?,
        })
    }

    pub async fn set_feature_models_enabled(&self, enabled: bool) -> Result<()> {
        self.set(SettingKey::FeatureModelsEnabled, &enabled).await
    }

    pub async fn set_feature_model(&self, feature: Feature, model: Option<&str>) -> Result<()> {
        let key = SettingKey::for_feature(feature);
        match model.filter(|m| !m.is_empty()) {
            Some(model) => self.set(key, &model).await,
            None => self.reset(key).await,
        }
    }

    // ============================================
    // Flags
    // ============================================

    pub async fn onboarding_completed(&self) -> Result<bool> {
        Ok(self
            .get(SettingKey::OnboardingCompleted)
            .await?
            .unwrap_or(false))
    }

    pub async fn set_onboarding_completed(&self, done: bool) -> Result<()> {
        self.set(SettingKey::OnboardingCompleted, &done).await
    }

    pub async fn auto_analyze(&self) -> Result<bool> {
        Ok(self
            .get(SettingKey::AutoAnalyzeEnabled)
            .await?
            .unwrap_or(false))
    }

    pub async fn set_auto_analyze(&self, enabled: bool) -> Result<()> {
        self.set(SettingKey::AutoAnalyzeEnabled, &enabled).await
    }

    pub async fn response_analysis(&self) -> Result<bool> {
        Ok(self
            .get(SettingKey::ResponseAnalysisEnabled)
            .await?
            .unwrap_or(true))
    }

    pub async fn set_response_analysis(&self, enabled: bool) -> Result<()> {
        self.set(SettingKey::ResponseAnalysisEnabled, &enabled).await
    }

    pub async fn use_hooks(&self) -> Result<bool> {
        Ok(self
            .get(SettingKey::DetectionUseHooks)
            .await?
            .unwrap_or(false))
    }

    pub async fn set_use_hooks(&self, enabled: bool) -> Result<()> {
        self.set(SettingKey::DetectionUseHooks, &enabled).await
    }
}
