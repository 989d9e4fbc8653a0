//! Host → webview push messages

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::analysis::{AnalysisContext, AnalysisEvent, AnalyzedPrompt, DailyStats, ScoreResult};
use crate::error::{user_facing, Error};
use crate::host::{ChatTarget, HooksStatus};
use crate::llm::registry::{DetectedProvider, ProvidersView, VerifyResult};
use crate::llm::{FeatureModels, ModelInfo};
use crate::session::{PromptPage, StateEvent};
use crate::summary::SummaryData;
use crate::sync::{CloudStatus, SyncOutcome, SyncPreview, SyncProgress, SyncStatus};
use crate::types::{GoalInference, GoalProgress, Platform, Project, Session};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorPayload {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(rename = "errorType", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl ErrorPayload {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            error: None,
            kind: None,
            suggestion: None,
        }
    }

    /// `message` is what the user was trying to do; the error fills the rest.
    pub fn from_error(message: impl Into<String>, error: &Error) -> Self {
        let facing = user_facing(error);
        Self {
            message: message.into(),
            error: Some(facing.message),
            kind: Some(facing.kind),
            suggestion: Some(facing.suggestion),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionList {
    /// Flattened across projects, most recent first
    pub sessions: Vec<Session>,
    pub projects: Vec<Project>,
    pub active_session_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveSession {
    pub session: Option<Session>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalStatus {
    pub session_id: Option<String>,
    pub goal: Option<String>,
    pub goal_set_at: Option<DateTime<Utc>>,
    pub goal_completed_at: Option<DateTime<Utc>>,
    pub progress: Option<u8>,
    /// Whether automatic goal prompts may be shown right now
    pub can_prompt: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalInferencePush {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(flatten)]
    pub inference: GoalInference,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalProgressPush {
    pub session_id: String,
    #[serde(flatten)]
    pub analysis: GoalProgress,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigView {
    pub auto_analyze: bool,
    pub response_analysis: bool,
    pub onboarding_completed: bool,
    pub use_hooks: bool,
    pub sidebar_width: u32,
    pub editor: String,
}

/// Every message the host may push.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum OutboundMessage {
    Error(ErrorPayload),
    SessionEvent(StateEvent),

    V2SessionList(SessionList),
    V2ActiveSession(ActiveSession),
    V2Prompts(PromptPage),

    V2GoalStatus(GoalStatus),
    V2GoalInference(GoalInferencePush),
    V2GoalProgressAnalysis(GoalProgressPush),

    SuggestionApplied {
        #[serde(skip_serializing_if = "Option::is_none")]
        target: Option<ChatTarget>,
        injected: bool,
        copied_to_clipboard: bool,
    },
    ContextReady(AnalysisContext),
    ScoreReceived(ScoreResult),
    EnhancedPromptReady {
        text: String,
    },
    EnhancedScoreReady(ScoreResult),
    EnhancementFailed {
        error: String,
    },
    /// Goal guessed while analyzing a single prompt
    GoalInference(GoalInference),
    AnalysisComplete {
        prompt: AnalyzedPrompt,
        daily_stats: DailyStats,
    },
    PromptLabEvent(AnalysisEvent),
    PromptLabComplete {
        score: ScoreResult,
        #[serde(skip_serializing_if = "Option::is_none")]
        enhanced_text: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        enhanced_score: Option<ScoreResult>,
    },
    PromptHistory {
        entries: Vec<AnalyzedPrompt>,
    },
    V2DailyStats(DailyStats),

    LoadingProgress {
        progress: u8,
        message: String,
    },
    SummaryData(SummaryData),

    ProvidersUpdate(ProvidersView),
    VerifyApiKeyResult(VerifyResult),
    ProvidersDetected {
        providers: Vec<DetectedProvider>,
    },
    AvailableModels {
        models: Vec<ModelInfo>,
    },
    FeatureModels(FeatureModels),

    CloudStatus(CloudStatus),
    SyncStatus(SyncStatus),
    SyncPreview(SyncPreview),
    SyncProgress(SyncProgress),
    SyncComplete(SyncOutcome),
    SyncCancelled {
        was_running: bool,
    },

    HooksStatus(HooksStatus),
    Config(ConfigView),
    EditorDetected {
        editor: String,
        platform: Platform,
    },
    LocalDataCleared,
}

impl OutboundMessage {
    pub fn error(message: impl Into<String>) -> Self {
        OutboundMessage::Error(ErrorPayload::new(message))
    }

    pub fn from_error(message: impl Into<String>, error: &Error) -> Self {
        OutboundMessage::Error(ErrorPayload::from_error(message, error))
    }

    /// Wire form: `{type, data}`.
    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|e| {
            serde_json::json!({
                "type": "error",
                "data": { "message": "Failed to encode message", "error": e.to_string() }
            })
        })
    }

    /// Wire name of this message.
    pub fn kind(&self) -> String {
        self.to_json()
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    }
}

impl From<AnalysisEvent> for OutboundMessage {
    fn from(event: AnalysisEvent) -> Self {
        match event {
            AnalysisEvent::ContextReady { context } => OutboundMessage::ContextReady(context),
            AnalysisEvent::ScoreReceived { score } => OutboundMessage::ScoreReceived(score),
            AnalysisEvent::EnhancedPromptReady { text } => OutboundMessage::EnhancedPromptReady { text },
            AnalysisEvent::EnhancedScoreReady { score } => OutboundMessage::EnhancedScoreReady(score),
            AnalysisEvent::EnhancementFailed { error } => OutboundMessage::EnhancementFailed { error },
            AnalysisEvent::GoalInference { inference } => OutboundMessage::GoalInference(inference),
        }
    }
}
