//! LlmProvider trait defining the interface for LLM integrations.

use std::sync::Arc;

use async_trait::async_trait;

use super::types::{
    CompletionRequest, CompletionResponse, LlmError, ModelInfo, ProviderConfig, ProviderId,
};

/// Trait for LLM providers.
///
/// Implementations include:
/// - `CliProvider` for `cursor-agent` and `claude` executables
/// - host-supplied HTTP providers (Ollama, OpenRouter) via [`ProviderFactory`]
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Run a general-purpose completion with system + user prompt.
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError>;

    /// Models this provider can serve.
    async fn list_models(&self) -> Result<Vec<ModelInfo>, LlmError>;

    /// Check if the provider is available (CLI installed, API key valid, etc.)
    async fn health_check(&self) -> Result<(), LlmError>;

    fn id(&self) -> ProviderId;

    /// Model identifier (e.g. "haiku", "llama3.2").
    fn model(&self) -> &str;
}

/// Builds provider instances from settings.
pub trait ProviderFactory: Send + Sync {
    fn create(
        &self,
        id: ProviderId,
        config: &ProviderConfig,
        api_key: Option<String>,
        timeout_secs: u64,
    ) -> Result<Arc<dyn LlmProvider>, LlmError>;
}
