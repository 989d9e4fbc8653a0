//! Scripted providers for tests and offline hosts.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::provider::{LlmProvider, ProviderFactory};
use super::types::{
    CompletionRequest, CompletionResponse, LlmError, ModelInfo, ProviderConfig, ProviderId,
};
use crate::lock::lock;

type Responder = dyn Fn(&CompletionRequest) -> Result<String, LlmError> + Send + Sync;

/// Provider whose replies come from a closure.
#[derive(Clone)]
pub struct StubProvider {
    id: ProviderId,
    model: String,
    responder: Arc<Responder>,
    healthy: bool,
    models: Vec<String>,
    calls: Arc<AtomicUsize>,
    prompts: Arc<Mutex<Vec<String>>>,
}

impl StubProvider {
    /// Always replies with `reply`.
    pub fn new(id: ProviderId, model: &str, reply: &str) -> Self {
        let reply = reply.to_string();
        Self::with_responder(id, model, move |_| Ok(reply.clone()))
    }

    pub fn with_responder<F>(id: ProviderId, model: &str, responder: F) -> Self
    where
        F: Fn(&CompletionRequest) -> Result<String, LlmError> + Send + Sync + 'static,
    {
        Self {
            id,
            model: model.to_string(),
            responder: Arc::new(responder),
            healthy: true,
            models: vec![model.to_string()],
            calls: Arc::new(AtomicUsize::new(0)),
            prompts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Every call fails.
    pub fn failing(id: ProviderId, model: &str) -> Self {
        let mut provider = Self::with_responder(id, model, |_| {
            Err(LlmError::CliError("stub failure".to_string()))
        });
        provider.healthy = false;
        provider
    }

    pub fn with_models(mut self, models: &[&str]) -> Self {
        self.models = models.iter().map(|m| m.to_string()).collect();
        self
    }

    /// Number of completions requested so far (shared across clones).
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// User prompts received so far (shared across clones).
    pub fn prompts(&self) -> Vec<String> {
        lock(&self.prompts, "stub prompts").clone()
    }
}

#[async_trait]
impl LlmProvider for StubProvider {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        lock(&self.prompts, "stub prompts").push(request.user_prompt.clone());
        let content = (self.responder)(&request)?;
        Ok(CompletionResponse {
            content,
            model: Some(self.model.clone()),
            latency_ms: 0,
        })
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>, LlmError> {
        if !self.healthy {
            return Err(LlmError::NotAvailable(self.id.as_str().to_string()));
        }
        Ok(self
            .models
            .iter()
            .map(|m| ModelInfo {
                id: m.clone(),
                name: m.clone(),
                provider: self.id.as_str().to_string(),
            })
            .collect())
    }

    async fn health_check(&self) -> Result<(), LlmError> {
        if self.healthy {
            Ok(())
        } else {
            Err(LlmError::NotAvailable(self.id.as_str().to_string()))
        }
    }

    fn id(&self) -> ProviderId {
        self.id
    }

    fn model(&self) -> &str {
        &self.model
    }
}

type Builder =
    dyn Fn(ProviderId, &ProviderConfig, Option<&str>) -> Result<StubProvider, LlmError> + Send + Sync;

/// Factory producing [`StubProvider`]s.
pub struct StubFactory {
    build: Box<Builder>,
}

impl StubFactory {
    pub fn new<F>(build: F) -> Self
    where
        F: Fn(ProviderId, &ProviderConfig, Option<&str>) -> Result<StubProvider, LlmError>
            + Send
            + Sync
            + 'static,
    {
        Self {
            build: Box::new(build),
        }
    }

    /// Every provider is a clone of `provider` re-labelled with the requested id and model.
    pub fn sharing(provider: StubProvider) -> Self {
        Self::new(move |id, config, _| {
            let mut p = provider.clone();
            p.id = id;
            if let Some(model) = &config.model {
                p.model = model.clone();
            }
            Ok(p)
        })
    }
}

impl ProviderFactory for StubFactory {
    fn create(
        &self,
        id: ProviderId,
        config: &ProviderConfig,
        api_key: Option<String>,
        _timeout_secs: u64,
    ) -> Result<Arc<dyn LlmProvider>, LlmError> {
        let provider = (self.build)(id, config, api_key.as_deref())?;
        Ok(Arc::new(provider))
    }
}

/// Manager whose only enabled provider (ollama) is `stub`.
pub async fn manager_with(stub: StubProvider) -> crate::error::Result<Arc<super::LlmManager>> {
    use crate::host::memory::{MemoryConfigurationStore, MemorySecretStore};
    use crate::settings::{ProviderMap, Settings};

    let settings = Arc::new(Settings::new(Arc::new(MemoryConfigurationStore::default())));
    let mut providers = ProviderMap::new();
    providers.insert(
        ProviderId::Ollama.as_str().to_string(),
        ProviderConfig {
            enabled: Some(true),
            ..Default::default()
        },
    );
    settings.set_providers(&providers).await?;
    let manager = Arc::new(super::LlmManager::new(
        settings,
        Arc::new(MemorySecretStore::default()),
        Arc::new(StubFactory::sharing(stub)),
        60,
    ));
    manager.reinitialize().await?;
    Ok(manager)
}

/// Manager with no provider configured.
pub fn unconfigured_manager() -> Arc<super::LlmManager> {
    use crate::host::memory::{MemoryConfigurationStore, MemorySecretStore};
    use crate::settings::Settings;

    Arc::new(super::LlmManager::new(
        Arc::new(Settings::new(Arc::new(MemoryConfigurationStore::default()))),
        Arc::new(MemorySecretStore::default()),
        Arc::new(StubFactory::new(|id, _, _| Err(LlmError::NotAvailable(id.as_str().to_string())))),
        60,
    ))
}
