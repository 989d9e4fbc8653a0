//! Shared service graph handed to every handler.

use std::sync::Arc;
use std::time::Duration;

use crate::analysis::{AnalysisPipeline, PromptEnhancer, PromptHistoryStore, PromptScorer, StatusBarAggregator};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::goals::{GoalCoordinator, GoalInferenceService, GoalProgressAnalyzer, GoalPromptCooldown};
use crate::host::HostCapabilities;
use crate::llm::{DefaultProviderFactory, LlmManager, ProviderFactory, ProviderRegistry};
use crate::persistence::Persistence;
use crate::session::{EventBus, GoalProgressCache, SessionServices, SessionStore};
use crate::settings::Settings;
use crate::summary::SummaryService;
use crate::sync::{
    CloudApi, CloudAuthService, DefaultSanitizer, HttpCloudClient, SessionSource, StoreSessionSource,
    SyncEngine, SyncStatusCache,
};
use crate::types::Platform;

/// Every service a handler may reach, wired once at startup.
pub struct HostContext {
    pub host: HostCapabilities,
    pub config: Config,
    pub settings: Arc<Settings>,
    pub persistence: Arc<Persistence>,
    pub sessions: Arc<SessionServices>,
    pub llm: Arc<LlmManager>,
    pub providers: Arc<ProviderRegistry>,
    pub goals: GoalCoordinator,
    pub analysis: Arc<AnalysisPipeline>,
    /// Separate pipeline so prompt-lab regenerations never touch the main cache
    pub prompt_lab: Arc<AnalysisPipeline>,
    pub history: Arc<PromptHistoryStore>,
    pub status_bar: Arc<StatusBarAggregator>,
    pub summaries: Arc<SummaryService>,
    pub sync_cache: Arc<SyncStatusCache>,
    /// `None` when no cloud service is configured
    pub cloud: Option<Arc<CloudAuthService>>,
    pub sync: Option<Arc<SyncEngine>>,
}

impl HostContext {
    pub fn builder(host: HostCapabilities, config: Config) -> HostContextBuilder {
        HostContextBuilder::new(host, config)
    }

    pub fn cloud(&self) -> Result<&Arc<CloudAuthService>> {
        self.cloud.as_ref().ok_or(Error::Unavailable("Cloud sync"))
    }

    pub fn sync(&self) -> Result<&Arc<SyncEngine>> {
        self.sync.as_ref().ok_or(Error::Unavailable("Cloud sync"))
    }

    /// Editor platform guessed from the host application name.
    pub fn platform(&self) -> Platform {
        platform_for_app(&self.host.workspace.app_name())
    }
}

pub fn platform_for_app(app_name: &str) -> Platform {
    if app_name.to_lowercase().contains("cursor") {
        Platform::Cursor
    } else {
        Platform::ClaudeCode
    }
}

pub struct HostContextBuilder {
    host: HostCapabilities,
    config: Config,
    provider_factory: Option<Arc<dyn ProviderFactory>>,
    cloud_api: Option<Arc<dyn CloudApi>>,
    session_source: Option<Arc<dyn SessionSource>>,
}

impl HostContextBuilder {
    pub fn new(host: HostCapabilities, config: Config) -> Self {
        Self {
            host,
            config,
            provider_factory: None,
            cloud_api: None,
            session_source: None,
        }
    }

    pub fn provider_factory(mut self, factory: Arc<dyn ProviderFactory>) -> Self {
        self.provider_factory = Some(factory);
        self
    }

    /// Cloud service to use instead of the HTTP client built from `[sync]`.
    pub fn cloud_api(mut self, api: Arc<dyn CloudApi>) -> Self {
        self.cloud_api = Some(api);
        self
    }

    /// Sessions offered for upload; defaults to the local session store.
    pub fn session_source(mut self, source: Arc<dyn SessionSource>) -> Self {
        self.session_source = Some(source);
        self
    }

    pub async fn build(self) -> Result<HostContext> {
        let Self {
            host,
            config,
            provider_factory,
            cloud_api,
            session_source,
        } = self;
        config.sync.validate()?;

        let settings = Arc::new(Settings::new(host.configuration.clone()));
        let persistence = Arc::new(Persistence::new(host.kv.clone()));
        let store = Arc::new(SessionStore::load(persistence.clone(), EventBus::default(), config.session.clone()).await);

        let factory = provider_factory.unwrap_or_else(|| Arc::new(DefaultProviderFactory::new()) as Arc<dyn ProviderFactory>);
        let llm = Arc::new(LlmManager::new(
            settings.clone(),
            host.secrets.clone(),
            factory,
            config.llm.timeout_secs,
        ));
        let providers = Arc::new(ProviderRegistry::new(
            settings.clone(),
            host.secrets.clone(),
            llm.clone(),
            host.probe.clone(),
        ));
        if let Err(e) = providers.migrate_legacy_keys().await {
            tracing::warn!(error = %e, "Legacy API key migration failed");
        }
        if let Err(e) = llm.reinitialize().await {
            tracing::warn!(error = %e, "No LLM provider available at startup");
        }

        let inference = Arc::new(GoalInferenceService::new(llm.clone()));
        let goal_cache = Arc::new(GoalProgressCache::new());
        let goals = GoalCoordinator::new(
            store.clone(),
            goal_cache.clone(),
            Arc::new(GoalProgressAnalyzer::new(llm.clone())),
            inference.clone(),
            Arc::new(GoalPromptCooldown::new(host.kv.clone())),
        );
        let sessions = Arc::new(SessionServices::new(
            store.clone(),
            host.workspace.clone(),
            goal_cache,
            Some(Arc::new(goals.clone())),
        ));

        let pipeline = || {
            AnalysisPipeline::new(PromptScorer::new(llm.clone()), PromptEnhancer::new(llm.clone()))
                .with_goal_inference(inference.clone())
        };
        let analysis = Arc::new(pipeline());
        let prompt_lab = Arc::new(pipeline());
        {
            let analysis = analysis.clone();
            let prompt_lab = prompt_lab.clone();
            providers.on_switch(move |id| {
                tracing::debug!(provider = ?id, "Provider switched, dropping cached scores");
                analysis.forget_score();
                prompt_lab.forget_score();
            });
        }

        let sync_cache = Arc::new(SyncStatusCache::new(Duration::from_secs(config.sync.status_ttl_secs)));
        let cloud_api = match cloud_api {
            Some(api) => Some(api),
            None if config.sync.server_url.is_some() => {
                Some(Arc::new(HttpCloudClient::new(&config.sync)?) as Arc<dyn CloudApi>)
            }
            None => None,
        };
        let (cloud, sync) = match cloud_api {
            Some(api) => {
                let auth = Arc::new(CloudAuthService::new(
                    api,
                    host.secrets.clone(),
                    host.urls.clone(),
                    sync_cache.clone(),
                    &config.auth,
                ));
                let source = session_source
                    .unwrap_or_else(|| Arc::new(StoreSessionSource::new(store.clone())) as Arc<dyn SessionSource>);
                let engine = Arc::new(SyncEngine::new(
                    source,
                    Arc::new(DefaultSanitizer),
                    auth.clone(),
                    sync_cache.clone(),
                    host.telemetry.clone(),
                    config.sync.clone(),
                ));
                (Some(auth), Some(engine))
            }
            None => {
                tracing::info!("No cloud service configured; sync disabled");
                (None, None)
            }
        };

        Ok(HostContext {
            history: Arc::new(PromptHistoryStore::new(host.kv.clone())),
            status_bar: Arc::new(StatusBarAggregator::new(host.status_bar.clone())),
            summaries: Arc::new(SummaryService::new(store, llm.clone())),
            host,
            config,
            settings,
            persistence,
            sessions,
            llm,
            providers,
            goals,
            analysis,
            prompt_lab,
            sync_cache,
            cloud,
            sync,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_build_without_cloud() {
        let ctx = HostContext::builder(HostCapabilities::in_memory(), Config::default())
            .build()
            .await
            .unwrap();
        assert!(ctx.sync().is_err());
        assert!(!ctx.llm.is_available().await);
        assert_eq!(ctx.platform(), Platform::ClaudeCode);
        assert_eq!(platform_for_app("Cursor"), Platform::Cursor);
    }
}
