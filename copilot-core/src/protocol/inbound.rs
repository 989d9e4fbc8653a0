//! Webview → host messages
//!
//! Every inbound message is `{type, data}`. The edge parses it into
//! [`InboundMessage`] once; handlers never see raw JSON.

use serde::Deserialize;
use serde_json::Value;

use crate::host::ChatTarget;
use crate::llm::{Feature, ProviderId};
use crate::summary::SummaryRequest;
use crate::sync::SyncFilter;

/// Payload of messages that carry no data.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Empty {}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRef {
    pub session_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionalSessionRef {
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenameSession {
    pub session_id: String,
    #[serde(alias = "newName")]
    pub name: String,
}

fn default_page_size() -> usize {
    20
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptsQuery {
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub offset: usize,
    #[serde(default = "default_page_size")]
    pub limit: usize,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SetGoal {
    pub goal: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzePrompt {
    #[serde(alias = "prompt")]
    pub text: String,
    #[serde(default)]
    pub regenerate: bool,
}

/// Text to hand to the chat panel.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UseText {
    #[serde(alias = "prompt", alias = "suggestion")]
    pub text: String,
    #[serde(default)]
    pub target: Option<ChatTarget>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwitchProvider {
    pub provider_id: ProviderId,
    #[serde(default)]
    pub model: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyApiKey {
    pub provider_id: ProviderId,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub model: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SetModel {
    pub model: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SetFeatureModel {
    pub feature: Feature,
    #[serde(default)]
    pub model: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Toggle {
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SidebarWidth {
    pub width: u32,
}

macro_rules! inbound_messages {
    ($( $wire:literal => $variant:ident($payload:ty) ),* $(,)?) => {
        /// Every message the webview may send.
        #[derive(Debug, Clone, PartialEq)]
        pub enum InboundMessage {
            $( $variant($payload), )*
        }

        impl InboundMessage {
            /// Wire names of all inbound messages.
            pub const TYPES: &'static [&'static str] = &[$( $wire ),*];

            /// Wire name of this message.
            pub fn kind(&self) -> &'static str {
                match self {
                    $( InboundMessage::$variant(_) => $wire, )*
                }
            }

            /// Parse a payload for a known wire name. `Ok(None)` for unknown names.
            pub fn from_parts(kind: &str, data: Value) -> Result<Option<Self>, serde_json::Error> {
                Ok(Some(match kind {
                    $( $wire => InboundMessage::$variant(serde_json::from_value(data)?), )*
                    _ => return Ok(None),
                }))
            }
        }
    };
}

inbound_messages! {
    // sessions
    "v2GetActiveSession" => GetActiveSession(Empty),
    "v2GetSessionList" => GetSessionList(Empty),
    "v2GetPrompts" => GetPrompts(PromptsQuery),
    "switchSession" => SwitchSession(SessionRef),
    "renameSession" => RenameSession(RenameSession),
    "deleteSession" => DeleteSession(SessionRef),
    "markSessionRead" => MarkSessionRead(SessionRef),
    "v2EndSession" => EndSession(Empty),
    "addProjectFolder" => AddProjectFolder(Empty),

    // goals
    "v2GetGoalStatus" => GetGoalStatus(Empty),
    "v2SetGoal" => SetGoal(SetGoal),
    "v2CompleteGoal" => CompleteGoal(Empty),
    "v2ClearGoal" => ClearGoal(Empty),
    "v2InferGoal" => InferGoal(Empty),
    "v2AnalyzeGoalProgress" => AnalyzeGoalProgress(OptionalSessionRef),
    "v2GoalMaybeLater" => GoalMaybeLater(Empty),
    "v2GoalDontAsk" => GoalDontAsk(Empty),

    // coaching and prompts
    "useImprovedPrompt" => UseImprovedPrompt(UseText),
    "useCoachingSuggestion" => UseCoachingSuggestion(UseText),
    "analyzePrompt" => AnalyzePrompt(AnalyzePrompt),
    "promptLabAnalyze" => PromptLabAnalyze(AnalyzePrompt),
    "getPromptHistory" => GetPromptHistory(Empty),
    "v2GetDailyStats" => GetDailyStats(Empty),

    // summaries
    "getSummary" => GetSummary(SummaryRequest),

    // providers
    "getProviders" => GetProviders(Empty),
    "switchProvider" => SwitchProvider(SwitchProvider),
    "verifyApiKey" => VerifyApiKey(VerifyApiKey),
    "setOllamaModel" => SetOllamaModel(SetModel),
    "setOpenRouterModel" => SetOpenRouterModel(SetModel),
    "detectProviders" => DetectProviders(Empty),
    "getAvailableModels" => GetAvailableModels(Empty),
    "getFeatureModels" => GetFeatureModels(Empty),
    "setFeatureModel" => SetFeatureModel(SetFeatureModel),
    "setFeatureModelsEnabled" => SetFeatureModelsEnabled(Toggle),
    "resetFeatureModels" => ResetFeatureModels(Empty),

    // cloud
    "getCloudStatus" => GetCloudStatus(Empty),
    "loginWithGithub" => LoginWithGithub(Empty),
    "logout" => Logout(Empty),
    "syncNow" => SyncNow(Empty),
    "previewSync" => PreviewSync(SyncFilter),
    "syncWithFilters" => SyncWithFilters(SyncFilter),
    "cancelSync" => CancelSync(Empty),
    "getSyncStatus" => GetSyncStatus(Empty),

    // hooks
    "installHooks" => InstallHooks(Empty),
    "uninstallHooks" => UninstallHooks(Empty),
    "getHooksStatus" => GetHooksStatus(Empty),

    // config
    "getConfig" => GetConfig(Empty),
    "completeOnboarding" => CompleteOnboarding(Empty),
    "setAutoAnalyze" => SetAutoAnalyze(Toggle),
    "setResponseAnalysis" => SetResponseAnalysis(Toggle),
    "setSidebarWidth" => SetSidebarWidth(SidebarWidth),
    "clearLocalData" => ClearLocalData(Empty),
    "detectEditor" => DetectEditor(Empty),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::FilterType;
    use serde_json::json;

    #[test]
    fn test_parse_known_types() {
        let msg = InboundMessage::from_parts("switchSession", json!({"sessionId": "s1"}))
            .unwrap()
            .unwrap();
        assert_eq!(
            msg,
            InboundMessage::SwitchSession(SessionRef {
                session_id: "s1".to_string()
            })
        );
        assert_eq!(msg.kind(), "switchSession");

        let msg = InboundMessage::from_parts("previewSync", json!({})).unwrap().unwrap();
        match msg {
            InboundMessage::PreviewSync(filter) => assert_eq!(filter.filter_type, FilterType::Recent),
            other => panic!("unexpected {:?}", other),
        }

        let msg = InboundMessage::from_parts("verifyApiKey", json!({"providerId": "openrouter", "apiKey": "k"}))
            .unwrap()
            .unwrap();
        assert!(matches!(msg, InboundMessage::VerifyApiKey(VerifyApiKey { provider_id: ProviderId::OpenRouter, .. })));
    }

    #[test]
    fn test_unknown_and_malformed() {
        assert!(InboundMessage::from_parts("nope", json!({})).unwrap().is_none());
        assert!(InboundMessage::from_parts("switchSession", json!({})).is_err());
        assert!(InboundMessage::TYPES.contains(&"cancelSync"));
    }
}
