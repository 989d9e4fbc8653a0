//! Core domain types for the copilot session model
//!
//! These types are the persisted and wire-visible model shared by the host
//! and the webview. Field names serialize in camelCase because the webview
//! and the kv-store both consume them as JSON.
//!
//! ## Terminology
//!
//! | Term | Definition |
//! |------|------------|
//! | **Project** | A workspace root; owns its sessions |
//! | **Session** | A continuous interaction with one AI tool inside a project |
//! | **Prompt** | A single user request within a session |
//! | **Response** | The AI reply linked to a prompt |
//! | **Source session id** | Identity assigned by the adapter that detected the session |
//!
//! Projects are the arena: sessions reference their project by id and are
//! only ever reached through the owning project's `sessions` list.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ============================================
// Enums
// ============================================

/// AI tool a session was captured from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Cursor,
    ClaudeCode,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Cursor => "cursor",
            Platform::ClaudeCode => "claude_code",
        }
    }

    /// Human-readable name
    pub fn display_name(&self) -> &'static str {
        match self {
            Platform::Cursor => "Cursor",
            Platform::ClaudeCode => "Claude Code",
        }
    }
}

impl std::str::FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cursor" => Ok(Platform::Cursor),
            "claude_code" | "claude-code" | "claudeCode" => Ok(Platform::ClaudeCode),
            _ => Err(format!("unknown platform: {}", s)),
        }
    }
}

/// How a response ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    #[default]
    Success,
    Partial,
    Error,
}

impl Outcome {
    /// Map an adapter completion onto an outcome.
    ///
    /// Not-success is an error; a success whose reason or stop reason is
    /// cancelled/aborted is partial; everything else is a success.
    pub fn from_completion(success: bool, reason: Option<&str>, stop_reason: Option<&str>) -> Self {
        if !success {
            return Outcome::Error;
        }
        let interrupted = |r: Option<&str>| {
            r.map(|r| {
                let r = r.to_ascii_lowercase();
                r == "cancelled" || r == "canceled" || r == "aborted"
            })
            .unwrap_or(false)
        };
        if interrupted(reason) || interrupted(stop_reason) {
            Outcome::Partial
        } else {
            Outcome::Success
        }
    }
}

// ============================================
// Scoring
// ============================================

/// One weighted sub-score (0-100).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ScoreDimension {
    pub score: f64,
    pub weight: f64,
}

/// Five weighted dimensions plus the weighted total.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub specificity: ScoreDimension,
    pub context: ScoreDimension,
    pub intent: ScoreDimension,
    pub outcome: ScoreDimension,
    pub constraints: ScoreDimension,
    pub total: f64,
}

impl ScoreBreakdown {
    pub const SPECIFICITY_WEIGHT: f64 = 0.20;
    pub const CONTEXT_WEIGHT: f64 = 0.25;
    pub const INTENT_WEIGHT: f64 = 0.20;
    pub const OUTCOME_WEIGHT: f64 = 0.20;
    pub const CONSTRAINTS_WEIGHT: f64 = 0.15;

    /// Build a breakdown from raw 0-100 sub-scores using the standard weights.
    pub fn from_scores(
        specificity: f64,
        context: f64,
        intent: f64,
        outcome: f64,
        constraints: f64,
    ) -> Self {
        let dim = |score: f64, weight: f64| ScoreDimension {
            score: score.clamp(0.0, 100.0),
            weight,
        };
        let mut breakdown = Self {
            specificity: dim(specificity, Self::SPECIFICITY_WEIGHT),
            context: dim(context, Self::CONTEXT_WEIGHT),
            intent: dim(intent, Self::INTENT_WEIGHT),
            outcome: dim(outcome, Self::OUTCOME_WEIGHT),
            constraints: dim(constraints, Self::CONSTRAINTS_WEIGHT),
            total: 0.0,
        };
        breakdown.total = breakdown.weighted_total();
        breakdown
    }

    pub fn dimensions(&self) -> [(&'static str, ScoreDimension); 5] {
        [
            ("specificity", self.specificity),
            ("context", self.context),
            ("intent", self.intent),
            ("outcome", self.outcome),
            ("constraints", self.constraints),
        ]
    }

    /// Weighted sum of the dimensions, rounded to an integer score.
    pub fn weighted_total(&self) -> f64 {
        let sum: f64 = self
            .dimensions()
            .iter()
            .map(|(_, d)| d.score * d.weight)
            .sum();
        sum.round()
    }
}

// ============================================
// Prompt / Response
// ============================================

/// A user request within a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Prompt {
    pub id: String,
    pub session_id: String,
    pub timestamp: DateTime<Utc>,
    pub text: String,
    pub truncated_text: String,
    #[serde(default)]
    pub score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub breakdown: Option<ScoreBreakdown>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enhanced_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enhanced_score: Option<f64>,
}

/// An AI reply linked to a prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    pub id: String,
    /// Linked prompt id, or empty when nothing could be linked
    #[serde(default)]
    pub prompt_id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub outcome: Outcome,
    #[serde(default)]
    pub files_modified: Vec<String>,
    #[serde(default)]
    pub tool_calls: Vec<String>,
    #[serde(default)]
    pub source: String,
}

/// Response as delivered by an editor adapter, before linking.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapturedResponse {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub prompt_id: Option<String>,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub text: String,
    #[serde(default = "default_true")]
    pub success: bool,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub stop_reason: Option<String>,
    #[serde(default)]
    pub files_modified: Vec<String>,
    /// Tool names from tool-call entries
    #[serde(default)]
    pub tool_calls: Vec<String>,
    /// Tool names from tool-result entries
    #[serde(default)]
    pub tool_results: Vec<String>,
    #[serde(default)]
    pub source: String,
}

fn default_true() -> bool {
    true
}

impl CapturedResponse {
    /// Tool names from both call and result inputs, first occurrence wins.
    pub fn merged_tool_names(&self) -> Vec<String> {
        let mut merged: Vec<String> = Vec::new();
        for name in self.tool_calls.iter().chain(self.tool_results.iter()) {
            if !merged.iter().any(|n| n == name) {
                merged.push(name.clone());
            }
        }
        merged
    }

    pub fn outcome(&self) -> Outcome {
        Outcome::from_completion(
            self.success,
            self.reason.as_deref(),
            self.stop_reason.as_deref(),
        )
    }
}

// ============================================
// Session
// ============================================

/// Adapter-owned identity and passthrough fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_session_id: Option<String>,
    /// Legacy Cursor identity, still matched by source-id lookups
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor_composer_id: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A continuous interaction with a single AI tool inside a project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    pub project_id: String,
    pub platform: Platform,
    pub start_time: DateTime<Utc>,
    pub last_activity_time: DateTime<Utc>,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub prompt_count: usize,
    /// Most recent first
    #[serde(default)]
    pub prompts: Vec<Prompt>,
    /// Most recent first
    #[serde(default)]
    pub responses: Vec<Response>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub goal: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub goal_set_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub goal_completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub goal_progress: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_name: Option<String>,
    #[serde(default)]
    pub average_score: f64,
    #[serde(default)]
    pub has_unread_activity: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub metadata: SessionMetadata,
}

impl Session {
    pub fn new(
        id: impl Into<String>,
        project_id: impl Into<String>,
        platform: Platform,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            project_id: project_id.into(),
            platform,
            start_time: now,
            last_activity_time: now,
            is_active: true,
            prompt_count: 0,
            prompts: Vec::new(),
            responses: Vec::new(),
            goal: None,
            goal_set_at: None,
            goal_completed_at: None,
            goal_progress: None,
            custom_name: None,
            average_score: 0.0,
            has_unread_activity: false,
            ended_at: None,
            metadata: SessionMetadata::default(),
        }
    }

    /// Recompute `averageScore` as the mean prompt score rounded to one decimal.
    pub fn recompute_average_score(&mut self) {
        self.average_score = if self.prompts.is_empty() {
            0.0
        } else {
            let sum: f64 = self.prompts.iter().map(|p| p.score).sum();
            (sum / self.prompts.len() as f64 * 10.0).round() / 10.0
        };
    }

    /// Prepend a prompt, keeping at most `max` entries and the counters in step.
    pub fn push_prompt(&mut self, prompt: Prompt, max: usize) {
        self.prompts.insert(0, prompt);
        self.prompts.truncate(max);
        self.prompt_count = self.prompts.len();
        self.recompute_average_score();
    }

    /// Prepend a response, keeping at most `max` entries.
    pub fn push_response(&mut self, response: Response, max: usize) {
        self.responses.insert(0, response);
        self.responses.truncate(max);
    }

    pub fn duration_secs(&self) -> i64 {
        let end = self.ended_at.unwrap_or(self.last_activity_time);
        (end - self.start_time).num_seconds().max(0)
    }

    /// Session-level source identity, falling back to the legacy Cursor field.
    pub fn source_session_id(&self) -> Option<&str> {
        self.metadata
            .source_session_id
            .as_deref()
            .or(self.metadata.cursor_composer_id.as_deref())
    }

    /// Name shown in lists: custom name, then goal, then first prompt.
    pub fn display_name(&self) -> String {
        if let Some(name) = self.custom_name.as_deref().filter(|n| !n.is_empty()) {
            return name.to_string();
        }
        if let Some(goal) = self.goal.as_deref().filter(|g| !g.is_empty()) {
            return goal.to_string();
        }
        self.prompts
            .last()
            .map(|p| p.truncated_text.clone())
            .unwrap_or_else(|| format!("{} session", self.platform.display_name()))
    }
}

// ============================================
// Project
// ============================================

/// A workspace root and its sessions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub path: Option<String>,
    /// Most recent first
    #[serde(default)]
    pub sessions: Vec<Session>,
    #[serde(default)]
    pub is_expanded: bool,
    #[serde(default)]
    pub total_sessions: usize,
    #[serde(default)]
    pub total_prompts: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_activity_time: Option<DateTime<Utc>>,
}

impl Project {
    pub fn new(id: impl Into<String>, name: impl Into<String>, path: Option<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            path,
            sessions: Vec::new(),
            is_expanded: true,
            total_sessions: 0,
            total_prompts: 0,
            last_activity_time: None,
        }
    }

    /// Max `lastActivityTime` across sessions, absent when empty.
    pub fn recompute_last_activity(&mut self) {
        self.last_activity_time = self.sessions.iter().map(|s| s.last_activity_time).max();
    }

    /// Session and prompt totals over the sessions currently held.
    pub fn recompute_totals(&mut self) {
        self.total_sessions = self.sessions.len();
        self.total_prompts = self.sessions.iter().map(|s| s.prompt_count).sum();
    }

    pub fn session(&self, id: &str) -> Option<&Session> {
        self.sessions.iter().find(|s| s.id == id)
    }

    pub fn session_mut(&mut self, id: &str) -> Option<&mut Session> {
        self.sessions.iter_mut().find(|s| s.id == id)
    }
}

// ============================================
// Persisted State
// ============================================

/// Session-detection settings persisted alongside the state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionConfig {
    #[serde(default = "default_inactivity")]
    pub max_inactivity_minutes: i64,
    #[serde(default)]
    pub use_hooks: bool,
}

fn default_inactivity() -> i64 {
    120
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            max_inactivity_minutes: default_inactivity(),
            use_hooks: false,
        }
    }
}

/// Everything stored under `copilot.v2.sessionState`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    #[serde(default)]
    pub projects: Vec<Project>,
    #[serde(default)]
    pub active_session_id: Option<String>,
    #[serde(default)]
    pub active_project_id: Option<String>,
    #[serde(default)]
    pub config: DetectionConfig,
    pub last_updated: DateTime<Utc>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            projects: Vec::new(),
            active_session_id: None,
            active_project_id: None,
            config: DetectionConfig::default(),
            last_updated: Utc::now(),
        }
    }
}

impl SessionState {
    pub fn project(&self, id: &str) -> Option<&Project> {
        self.projects.iter().find(|p| p.id == id)
    }

    pub fn project_mut(&mut self, id: &str) -> Option<&mut Project> {
        self.projects.iter_mut().find(|p| p.id == id)
    }

    pub fn sessions(&self) -> impl Iterator<Item = &Session> {
        self.projects.iter().flat_map(|p| p.sessions.iter())
    }

    pub fn find_session(&self, id: &str) -> Option<&Session> {
        self.sessions().find(|s| s.id == id)
    }

    pub fn find_session_mut(&mut self, id: &str) -> Option<&mut Session> {
        self.projects
            .iter_mut()
            .flat_map(|p| p.sessions.iter_mut())
            .find(|s| s.id == id)
    }

    pub fn active_session(&self) -> Option<&Session> {
        self.active_session_id
            .as_deref()
            .and_then(|id| self.find_session(id))
    }

    pub fn active_session_mut(&mut self) -> Option<&mut Session> {
        let id = self.active_session_id.clone()?;
        self.find_session_mut(&id)
    }
}

// ============================================
// Goal Analysis
// ============================================

/// Estimated progress toward a session goal.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalProgress {
    /// 0..=100
    pub progress: u8,
    pub reasoning: String,
    #[serde(default)]
    pub session_title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inferred_goal: Option<String>,
    #[serde(default)]
    pub accomplishments: Vec<String>,
    #[serde(default)]
    pub remaining: Vec<String>,
}

impl GoalProgress {
    pub fn no_prompts() -> Self {
        Self {
            reasoning: "no prompts yet".to_string(),
            ..Default::default()
        }
    }

    /// Reply for a failed on-demand analysis; never stored.
    pub fn unable_to_analyze() -> Self {
        Self {
            reasoning: "unable to analyze".to_string(),
            ..Default::default()
        }
    }
}

/// A goal suggested from the session's opening prompts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalInference {
    pub suggested_goal: String,
    /// 0.0..=1.0
    pub confidence: f64,
    #[serde(default)]
    pub detected_theme: String,
}
