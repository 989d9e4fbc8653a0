//! Provider construction from settings.

use std::sync::Arc;

use super::cli::CliProvider;
use super::provider::{LlmProvider, ProviderFactory};
use super::types::{LlmError, ProviderConfig, ProviderId};

/// Builds the CLI providers itself and hands HTTP providers to the host.
#[derive(Default, Clone)]
pub struct DefaultProviderFactory {
    http: Option<Arc<dyn ProviderFactory>>,
}

impl DefaultProviderFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delegate `ollama` / `openrouter` to a host-supplied factory.
    pub fn with_http_factory(mut self, factory: Arc<dyn ProviderFactory>) -> Self {
        self.http = Some(factory);
        self
    }
}

impl ProviderFactory for DefaultProviderFactory {
    fn create(
        &self,
        id: ProviderId,
        config: &ProviderConfig,
        api_key: Option<String>,
        timeout_secs: u64,
    ) -> Result<Arc<dyn LlmProvider>, LlmError> {
        if id.requires_api_key() && api_key.as_deref().map_or(true, str::is_empty) {
            return Err(LlmError::MissingApiKey(id.as_str().to_string()));
        }

        match id {
            ProviderId::CursorCli | ProviderId::ClaudeAgentSdk => {
                let model = config
                    .model
                    .clone()
                    .unwrap_or_else(|| id.default_model().to_string());
                let provider = CliProvider::new(id, model)?.with_timeout(timeout_secs);
                Ok(Arc::new(provider))
            }
            ProviderId::Ollama | ProviderId::OpenRouter => match &self.http {
                Some(factory) => factory.create(id, config, api_key, timeout_secs),
                None => Err(LlmError::NotAvailable(format!(
                    "{} is not supported by this host",
                    id.display_name()
                ))),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builds_cli_provider_with_default_model() {
        let factory = DefaultProviderFactory::new();
        let provider = factory
            .create(ProviderId::ClaudeAgentSdk, &ProviderConfig::default(), None, 30)
            .unwrap();
        assert_eq!(provider.id(), ProviderId::ClaudeAgentSdk);
        assert_eq!(provider.model(), "haiku");
    }

    #[test]
    fn test_http_provider_without_host_factory() {
        let factory = DefaultProviderFactory::new();
        let result = factory.create(ProviderId::Ollama, &ProviderConfig::default(), None, 30);
        assert!(matches!(result, Err(LlmError::NotAvailable(_))));
    }

    #[test]
    fn test_openrouter_requires_key() {
        let factory = DefaultProviderFactory::new();
        let result = factory.create(
            ProviderId::OpenRouter,
            &ProviderConfig::default(),
            Some(String::new()),
            30,
        );
        assert!(matches!(result, Err(LlmError::MissingApiKey(_))));
    }
}
