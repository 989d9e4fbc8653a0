//! LLM provider abstraction
//!
//! The core never speaks an LLM wire protocol itself. It calls an
//! [`LlmProvider`], built by a [`ProviderFactory`] from the `llm.providers`
//! setting plus the key held in the secret store.

pub mod cli;
pub mod factory;
pub mod json;
pub mod manager;
pub mod provider;
pub mod registry;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod types;

pub use cli::CliProvider;
pub use factory::DefaultProviderFactory;
pub use json::{extract_as, extract_json};
pub use manager::LlmManager;
pub use provider::{LlmProvider, ProviderFactory};
pub use registry::ProviderRegistry;
pub use types::{
    CompletionRequest, CompletionResponse, Feature, FeatureModels, LlmError, ModelInfo,
    ModelOverride, ProviderConfig, ProviderId, ResponseFormat,
};
