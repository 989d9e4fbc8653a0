//! Provider registry
//!
//! Owns the `llm.providers` setting. At most one provider is enabled at a
//! time; API keys live only in the secret store, keyed by provider id.

use std::sync::{Arc, Mutex};

use serde::Serialize;

use super::manager::LlmManager;
use super::types::{Feature, FeatureModels, ModelInfo, ProviderConfig, ProviderId};
use crate::error::{Error, Result};
use crate::host::{CommandProbe, SecretStore};
use crate::lock::lock;
use crate::settings::{SettingKey, Settings};

/// Provider row shown in the settings UI. Never carries the key itself.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderInfo {
    pub id: ProviderId,
    pub name: String,
    pub enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    pub has_api_key: bool,
    pub requires_api_key: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvidersView {
    pub providers: Vec<ProviderInfo>,
    pub active_provider: Option<ProviderId>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectedProvider {
    pub id: ProviderId,
    pub available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResult {
    pub provider_id: ProviderId,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

type SwitchListener = Arc<dyn Fn(ProviderId) + Send + Sync>;

pub struct ProviderRegistry {
    settings: Arc<Settings>,
    secrets: Arc<dyn SecretStore>,
    manager: Arc<LlmManager>,
    probe: Arc<dyn CommandProbe>,
    detection: tokio::sync::Mutex<Option<Vec<DetectedProvider>>>,
    /// Held across every read-modify-write of `llm.providers`.
    writes: tokio::sync::Mutex<()>,
    listeners: Mutex<Vec<SwitchListener>>,
}

impl ProviderRegistry {
    pub fn new(
        settings: Arc<Settings>,
        secrets: Arc<dyn SecretStore>,
        manager: Arc<LlmManager>,
        probe: Arc<dyn CommandProbe>,
    ) -> Self {
        Self {
            settings,
            secrets,
            manager,
            probe,
            detection: tokio::sync::Mutex::new(None),
            writes: tokio::sync::Mutex::new(()),
            listeners: Mutex::new(Vec::new()),
        }
    }

    /// Run `listener` after every provider switch, once the manager has
    /// been reinitialized.
    pub fn on_switch(&self, listener: impl Fn(ProviderId) + Send + Sync + 'static) {
        lock(&self.listeners, "switch listeners").push(Arc::new(listener));
    }

    pub async fn get_providers(&self) -> Result<ProvidersView> {
        let configured = self.settings.providers().await?;
        let active = self.settings.active_provider().await?;
        let mut providers = Vec::with_capacity(ProviderId::ALL.len());
        for id in ProviderId::ALL {
            let config = configured.get(id.as_str()).cloned().unwrap_or_default();
            let has_api_key = self
                .secrets
                .get(id.as_str())
                .await?
                .map_or(false, |k| !k.is_empty());
            providers.push(ProviderInfo {
                id,
                name: id.display_name().to_string(),
                enabled: config.is_enabled(),
                model: config.model,
                endpoint: config.endpoint,
                has_api_key,
                requires_api_key: id.requires_api_key(),
            });
        }
        Ok(ProvidersView {
            providers,
            active_provider: active,
        })
    }

    /// Make `id` the only enabled provider.
    pub async fn switch_provider(&self, id: ProviderId, model: Option<&str>) -> Result<()> {
        tracing::info!(provider = %id, ?model, "Switching LLM provider");
        let _writes = self.writes.lock().await;

        let mut providers = self.settings.providers().await?;
        for known in ProviderId::ALL {
            providers.entry(known.as_str().to_string()).or_default();
        }
        for config in providers.values_mut() {
            config.enabled = Some(false);
        }
        let target = providers.entry(id.as_str().to_string()).or_default();
        target.enabled = Some(true);
        if let Some(model) = model.filter(|m| !m.is_empty()) {
            target.model = Some(model.to_string());
        }

        self.settings.set_providers(&providers).await?;
        self.settings.set_active_provider(Some(id)).await?;
        self.manager.reinitialize().await?;

        let listeners: Vec<SwitchListener> = lock(&self.listeners, "switch listeners").clone();
        for listener in listeners {
            listener(id);
        }

        self.clear_detection_cache().await;
        Ok(())
    }

    /// Test a key and store it. Does not enable the provider.
    pub async fn verify_api_key(
        &self,
        id: ProviderId,
        api_key: &str,
        model: Option<&str>,
    ) -> Result<VerifyResult> {
        let api_key = api_key.trim();
        if api_key.is_empty() {
            return Ok(VerifyResult {
                provider_id: id,
                success: false,
                error: Some("API key is required".to_string()),
            });
        }

        let mut config = self.settings.provider(id).await?;
        if let Some(model) = model.filter(|m| !m.is_empty()) {
            config.model = Some(model.to_string());
        }

        let timeout = self.manager.timeout_secs().await;
        let check = match self
            .manager
            .factory()
            .create(id, &config, Some(api_key.to_string()), timeout)
        {
            Ok(provider) => provider.health_check().await,
            Err(e) => Err(e),
        };
        if let Err(e) = check {
            tracing::info!(provider = %id, error = %e, "API key verification failed");
            return Ok(VerifyResult {
                provider_id: id,
                success: false,
                error: Some(e.to_string()),
            });
        }

        let _writes = self.writes.lock().await;
        self.secrets.store(id.as_str(), api_key).await?;

        if let Some(model) = model.filter(|m| !m.is_empty()) {
            let mut providers = self.settings.providers().await?;
            providers
                .entry(id.as_str().to_string())
                .or_default()
                .model = Some(model.to_string());
            self.settings.set_providers(&providers).await?;
        }

        if self.manager.active().await.map(|p| p.id()) == Some(id) {
            self.manager.reinitialize().await?;
        }
        self.clear_detection_cache().await;

        tracing::info!(provider = %id, "API key verified and stored");
        Ok(VerifyResult {
            provider_id: id,
            success: true,
            error: None,
        })
    }

    /// Persist the model for a provider, reinitializing if it is active.
    pub async fn set_model(&self, id: ProviderId, model: &str) -> Result<()> {
        if model.trim().is_empty() {
            return Err(Error::InvalidInput("model must not be empty".to_string()));
        }
        let _writes = self.writes.lock().await;
        let mut providers = self.settings.providers().await?;
        providers
            .entry(id.as_str().to_string())
            .or_default()
            .model = Some(model.trim().to_string());
        self.settings.set_providers(&providers).await?;

        if self.settings.active_provider().await? == Some(id) {
            self.manager.reinitialize().await?;
        }
        Ok(())
    }

    /// Move inline `apiKey` entries out of settings into the secret store.
    pub async fn migrate_legacy_keys(&self) -> Result<usize> {
        let _writes = self.writes.lock().await;
        let mut providers = self.settings.providers_raw().await?;
        let mut moved = 0;
        for (id, config) in providers.iter_mut() {
            let Some(value) = config.extra.remove("apiKey") else {
                continue;
            };
            if let Some(key) = value.as_str().filter(|k| !k.is_empty()) {
                if self.secrets.get(id).await?.is_none() {
                    self.secrets.store(id, key).await?;
                }
            }
            moved += 1;
        }
        if moved > 0 {
            tracing::info!(count = moved, "Moved inline API keys into the secret store");
            self.settings.set_providers(&providers).await?;
        }
        Ok(moved)
    }

    // ============================================
    // Models
    // ============================================

    /// Models from every configured provider; failing providers are skipped.
    pub async fn available_models(&self) -> Result<Vec<ModelInfo>> {
        let configured = self.settings.providers().await?;
        let active = self.settings.active_provider().await?;
        let ids: Vec<ProviderId> = ProviderId::ALL
            .into_iter()
            .filter(|id| configured.contains_key(id.as_str()) || Some(*id) == active)
            .collect();

        let mut models = Vec::new();
        for id in ids {
            let provider = match self.manager.build(id, None).await {
                Ok(p) => p,
                Err(e) => {
                    tracing::debug!(provider = %id, error = %e, "Skipping provider for model list");
                    continue;
                }
            };
            match provider.list_models().await {
                Ok(list) => models.extend(list),
                Err(e) => {
                    tracing::debug!(provider = %id, error = %e, "list_models failed, skipping");
                }
            }
        }
        Ok(models)
    }

    pub async fn feature_models(&self) -> Result<FeatureModels> {
        self.settings.feature_models().await
    }

    pub async fn set_feature_model(&self, feature: Feature, model: Option<&str>) -> Result<()> {
        self.settings.set_feature_model(feature, model).await
    }

    pub async fn set_feature_models_enabled(&self, enabled: bool) -> Result<()> {
        self.settings.set_feature_models_enabled(enabled).await
    }

    pub async fn reset_feature_models(&self) -> Result<()> {
        self.settings.reset(SettingKey::FeatureModelsEnabled).await?;
        for feature in Feature::ALL {
            self.settings.set_feature_model(feature, None).await?;
        }
        Ok(())
    }

    // ============================================
    // Detection
    // ============================================

    /// Which providers can run on this machine; cached until the next switch.
    pub async fn detect_providers(&self) -> Result<Vec<DetectedProvider>> {
        let mut cache = self.detection.lock().await;
        if let Some(cached) = cache.as_ref() {
            return Ok(cached.clone());
        }

        let mut detected = Vec::with_capacity(ProviderId::ALL.len());
        for id in ProviderId::ALL {
            detected.push(self.detect_one(id).await);
        }
        *cache = Some(detected.clone());
        Ok(detected)
    }

    async fn detect_one(&self, id: ProviderId) -> DetectedProvider {
        if let Some(command) = id.cli_command() {
            return match self.probe.which(command).await {
                Some(path) => DetectedProvider {
                    id,
                    available: true,
                    path: Some(path.display().to_string()),
                    reason: None,
                },
                None => DetectedProvider {
                    id,
                    available: false,
                    path: None,
                    reason: Some(format!("`{}` not found on PATH", command)),
                },
            };
        }

        let result = match self.manager.build(id, None).await {
            Ok(provider) => provider.health_check().await.map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        };
        DetectedProvider {
            id,
            available: result.is_ok(),
            path: None,
            reason: result.err(),
        }
    }

    pub async fn clear_detection_cache(&self) {
        *self.detection.lock().await = None;
    }

    /// Default config entry for a provider, used by onboarding.
    pub async fn provider_config(&self, id: ProviderId) -> Result<ProviderConfig> {
        self.settings.provider(id).await
    }
}
