//! Request/response/error types for LLM integration.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Request for a general-purpose LLM completion.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub system_prompt: Option<String>,
    pub user_prompt: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub response_format: ResponseFormat,
}

impl CompletionRequest {
    /// JSON-formatted completion with the defaults used by the analyzers.
    pub fn json(system_prompt: impl Into<String>, user_prompt: impl Into<String>) -> Self {
        Self {
            system_prompt: Some(system_prompt.into()),
            user_prompt: user_prompt.into(),
            max_tokens: 1024,
            temperature: 0.2,
            response_format: ResponseFormat::Json,
        }
    }

    pub fn text(system_prompt: impl Into<String>, user_prompt: impl Into<String>) -> Self {
        Self {
            system_prompt: Some(system_prompt.into()),
            user_prompt: user_prompt.into(),
            max_tokens: 1024,
            temperature: 0.4,
            response_format: ResponseFormat::Text,
        }
    }
}

/// Desired response format for a completion request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseFormat {
    Text,
    Json,
}

/// Response from a general-purpose LLM completion.
#[derive(Debug, Clone)]
pub struct CompletionResponse {
    pub content: String,
    pub model: Option<String>,
    pub latency_ms: u64,
}

/// A model offered by a provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelInfo {
    pub id: String,
    pub name: String,
    pub provider: String,
}

/// Errors that can occur during LLM operations.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Failed to spawn LLM process: {0}")]
    SpawnFailed(String),

    #[error("CLI returned error: {0}")]
    CliError(String),

    #[error("Failed to parse response: {0}")]
    ParseFailed(String),

    #[error("Provider not available: {0}")]
    NotAvailable(String),

    #[error("Invalid response format: {0}")]
    InvalidFormat(String),

    #[error("Timeout after {0} seconds")]
    Timeout(u64),

    #[error("API key required for {0}")]
    MissingApiKey(String),
}

// ============================================
// Provider identity and settings
// ============================================

/// Known provider backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ProviderId {
    #[serde(rename = "ollama")]
    Ollama,
    #[serde(rename = "openrouter")]
    OpenRouter,
    #[serde(rename = "cursor-cli")]
    CursorCli,
    #[serde(rename = "claude-agent-sdk")]
    ClaudeAgentSdk,
}

impl ProviderId {
    pub const ALL: [ProviderId; 4] = [
        ProviderId::Ollama,
        ProviderId::OpenRouter,
        ProviderId::CursorCli,
        ProviderId::ClaudeAgentSdk,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::Ollama => "ollama",
            ProviderId::OpenRouter => "openrouter",
            ProviderId::CursorCli => "cursor-cli",
            ProviderId::ClaudeAgentSdk => "claude-agent-sdk",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            ProviderId::Ollama => "Ollama",
            ProviderId::OpenRouter => "OpenRouter",
            ProviderId::CursorCli => "Cursor CLI",
            ProviderId::ClaudeAgentSdk => "Claude Agent SDK",
        }
    }

    /// Providers that cannot run without a key in the secret store.
    pub fn requires_api_key(&self) -> bool {
        matches!(self, ProviderId::OpenRouter)
    }

    /// Executable probed by provider detection, if the provider is a CLI.
    pub fn cli_command(&self) -> Option<&'static str> {
        match self {
            ProviderId::CursorCli => Some("cursor-agent"),
            ProviderId::ClaudeAgentSdk => Some("claude"),
            _ => None,
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            ProviderId::Ollama => "llama3.2",
            ProviderId::OpenRouter => "anthropic/claude-3.5-haiku",
            ProviderId::CursorCli => "auto",
            ProviderId::ClaudeAgentSdk => "haiku",
        }
    }
}

impl std::fmt::Display for ProviderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ProviderId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ProviderId::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| format!("unknown provider: {}", s))
    }
}

/// Per-provider entry of the `llm.providers` setting.
///
/// API keys never live here; they are kept in the secret store keyed by
/// provider id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ProviderConfig {
    pub fn is_enabled(&self) -> bool {
        self.enabled == Some(true)
    }
}

/// Features that may override the active provider/model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Feature {
    Summaries,
    PromptScoring,
    PromptImprovement,
}

impl Feature {
    pub const ALL: [Feature; 3] = [
        Feature::Summaries,
        Feature::PromptScoring,
        Feature::PromptImprovement,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Feature::Summaries => "summaries",
            Feature::PromptScoring => "promptScoring",
            Feature::PromptImprovement => "promptImprovement",
        }
    }
}

impl std::str::FromStr for Feature {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Feature::ALL
            .into_iter()
            .find(|f| f.as_str() == s)
            .ok_or_else(|| format!("unknown feature: {}", s))
    }
}

/// Feature-model override state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureModels {
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summaries: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_scoring: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_improvement: Option<String>,
}

impl FeatureModels {
    pub fn get(&self, feature: Feature) -> Option<&str> {
        match feature {
            Feature::Summaries => self.summaries.as_deref(),
            Feature::PromptScoring => self.prompt_scoring.as_deref(),
            Feature::PromptImprovement => self.prompt_improvement.as_deref(),
        }
        .filter(|s| !s.is_empty())
    }
}

/// Parsed feature-model override: `"<providerId>:<model>"` or a bare model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelOverride {
    pub provider: Option<ProviderId>,
    pub model: String,
}

impl ModelOverride {
    pub fn parse(value: &str) -> Self {
        if let Some((prefix, model)) = value.split_once(':') {
            if let Ok(provider) = prefix.parse::<ProviderId>() {
                return Self {
                    provider: Some(provider),
                    model: model.to_string(),
                };
            }
        }
        // Model names such as "llama3.2:latest" contain colons too.
        Self {
            provider: None,
            model: value.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_llm_error_display() {
        let err = LlmError::Timeout(30);
        assert_eq!(err.to_string(), "Timeout after 30 seconds");

        let err = LlmError::SpawnFailed("command not found".to_string());
        assert_eq!(err.to_string(), "Failed to spawn LLM process: command not found");
    }

    #[test]
    fn test_provider_id_round_trip() {
        for id in ProviderId::ALL {
            assert_eq!(id.as_str().parse::<ProviderId>().unwrap(), id);
            assert_eq!(
                serde_json::to_value(id).unwrap(),
                serde_json::Value::String(id.as_str().to_string())
            );
        }
        assert!("gpt".parse::<ProviderId>().is_err());
    }

    #[test]
    fn test_provider_config_skips_absent_fields() {
        let config = ProviderConfig {
            model: Some("m".to_string()),
            ..Default::default()
        };
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json, serde_json::json!({"model": "m"}));
    }

    #[test]
    fn test_model_override_parse() {
        assert_eq!(
            ModelOverride::parse("openrouter:openai/gpt-4o-mini"),
            ModelOverride {
                provider: Some(ProviderId::OpenRouter),
                model: "openai/gpt-4o-mini".to_string()
            }
        );
        assert_eq!(
            ModelOverride::parse("llama3.2:latest"),
            ModelOverride {
                provider: None,
                model: "llama3.2:latest".to_string()
            }
        );
    }

    #[test]
    fn test_feature_models_ignores_empty() {
        let models = FeatureModels {
            enabled: true,
            summaries: Some(String::new()),
            ..Default::default()
        };
        assert_eq!(models.get(Feature::Summaries), None);
    }
}
