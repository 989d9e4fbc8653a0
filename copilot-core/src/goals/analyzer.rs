//! Goal-progress estimation from session history.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::error::Result;
use crate::format::{format_duration_secs, truncate_chars};
use crate::llm::{extract_json, CompletionRequest, LlmManager};
use crate::types::{GoalProgress, Outcome, Prompt, Response, Session};

const MAX_MIDDLE_SAMPLES: usize = 6;
const PROMPT_SAMPLE_CHARS: usize = 500;
const RESPONSE_PREVIEW_CHARS: usize = 300;
const SYSTEM_PROMPT: &str = "You estimate how far an AI coding session has progressed toward its goal. Return strict JSON with keys: progress (integer 0-100), reasoning (string), sessionTitle (short string), inferredGoal (string, only when no goal was given), accomplishments (array of strings), remaining (array of strings).";

/// Evidence in a response that work was shipped, tested or built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionSignal {
    GitPush,
    PrCreated,
    TestsPassed,
    BuildSuccess,
    Committed,
}

impl CompletionSignal {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompletionSignal::GitPush => "git_push",
            CompletionSignal::PrCreated => "pr_created",
            CompletionSignal::TestsPassed => "tests_passed",
            CompletionSignal::BuildSuccess => "build_success",
            CompletionSignal::Committed => "committed",
        }
    }
}

/// One prompt/response pair as shown to the model.
#[derive(Debug, Clone, PartialEq)]
pub struct SampledInteraction {
    pub prompt: String,
    pub response_preview: Option<String>,
    pub files_modified: Vec<String>,
    pub outcome: Option<Outcome>,
    pub signals: Vec<CompletionSignal>,
}

fn is_shell_tool(name: &str) -> bool {
    let name = name.to_ascii_lowercase();
    name.contains("bash") || name.contains("shell") || name.contains("terminal")
}

/// Completion signals in a response. Push and commit need a shell tool call.
pub fn detect_signals(response: &Response) -> Vec<CompletionSignal> {
    let text = response.text.to_lowercase();
    let ran_shell = response.tool_calls.iter().any(|t| is_shell_tool(t));
    let mut signals = Vec::new();

    if ran_shell && (text.contains("git push") || text.contains("pushed to")) {
        signals.push(CompletionSignal::GitPush);
    }
    if text.contains("gh pr create")
        || (text.contains("pull request") && (text.contains("created") || text.contains("opened")))
    {
        signals.push(CompletionSignal::PrCreated);
    }
    if text.contains("tests passed")
        || text.contains("all tests pass")
        || text.contains("test result: ok")
    {
        signals.push(CompletionSignal::TestsPassed);
    }
    if text.contains("build succeeded")
        || text.contains("build successful")
        || text.contains("compiled successfully")
        || text.contains("successfully built")
    {
        signals.push(CompletionSignal::BuildSuccess);
    }
    if ran_shell && (text.contains("git commit") || text.contains("committed")) {
        signals.push(CompletionSignal::Committed);
    }
    signals
}

/// Indices into a chronological list: first, up to six evenly spaced
/// middles, and last.
pub fn sample_indices(len: usize) -> Vec<usize> {
    if len == 0 {
        return Vec::new();
    }
    let mut indices = vec![0];
    if len > 2 {
        let middles = MAX_MIDDLE_SAMPLES.min(len - 2);
        for i in 1..=middles {
            let idx = (i as f64 * (len - 1) as f64 / (middles + 1) as f64).round() as usize;
            indices.push(idx);
        }
    }
    indices.push(len - 1);
    indices.sort_unstable();
    indices.dedup();
    indices
}

/// Sampled interactions, oldest first.
pub fn sample_interactions(session: &Session) -> Vec<SampledInteraction> {
    let chronological: Vec<&Prompt> = session.prompts.iter().rev().collect();
    sample_indices(chronological.len())
        .into_iter()
        .map(|idx| {
            let prompt = chronological[idx];
            let response = session.responses.iter().find(|r| r.prompt_id == prompt.id);
            SampledInteraction {
                prompt: truncate_chars(&prompt.text, PROMPT_SAMPLE_CHARS),
                response_preview: response.map(|r| truncate_chars(&r.text, RESPONSE_PREVIEW_CHARS)),
                files_modified: response.map(|r| r.files_modified.clone()).unwrap_or_default(),
                outcome: response.map(|r| r.outcome),
                signals: response.map(detect_signals).unwrap_or_default(),
            }
        })
        .collect()
}

pub fn build_prompt(session: &Session, interactions: &[SampledInteraction]) -> String {
    let goal = match session.goal.as_deref() {
        Some(goal) => format!("Goal: {}", goal),
        None => "Goal: (none set; infer the most likely goal and return it as inferredGoal)".to_string(),
    };

    let mut transcript = String::new();
    for (n, interaction) in interactions.iter().enumerate() {
        transcript.push_str(&format!("[{}] User: {}\n", n + 1, interaction.prompt.replace('\n', " ")));
        if let Some(preview) = &interaction.response_preview {
            transcript.push_str(&format!("    Assistant: {}\n", preview.replace('\n', " ")));
        }
        if let Some(outcome) = interaction.outcome {
            transcript.push_str(&format!("    Outcome: {:?}\n", outcome));
        }
        if !interaction.files_modified.is_empty() {
            transcript.push_str(&format!("    Files: {}\n", interaction.files_modified.join(", ")));
        }
        if !interaction.signals.is_empty() {
            let names: Vec<&str> = interaction.signals.iter().map(|s| s.as_str()).collect();
            transcript.push_str(&format!("    Signals: {}\n", names.join(", ")));
        }
    }

    format!(
        "{goal}\nPlatform: {}\nDuration: {}\nPrompts: {}\nActive: {}\n\nInteractions:\n{transcript}\nReturn only JSON.",
        session.platform.display_name(),
        format_duration_secs(session.duration_secs()),
        session.prompt_count,
        session.is_active,
    )
}

/// Stable fingerprint of an analysis prompt.
pub fn prompt_fingerprint(prompt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(prompt.as_bytes());
    hex::encode(hasher.finalize())
}

fn string_field(value: &Value, key: &str) -> String {
    value
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .trim()
        .to_string()
}

fn string_list(value: &Value, key: &str) -> Vec<String> {
    value
        .get(key)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Parse a model reply into a [`GoalProgress`]; progress is clamped and rounded.
pub fn parse_progress(raw: &str) -> Result<GoalProgress> {
    let value = extract_json(raw)?;
    let progress = match value.get("progress") {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.trim().trim_end_matches('%').parse().unwrap_or(0.0),
        _ => 0.0,
    };
    let inferred_goal = string_field(&value, "inferredGoal");

    Ok(GoalProgress {
        progress: progress.clamp(0.0, 100.0).round() as u8,
        reasoning: string_field(&value, "reasoning"),
        session_title: string_field(&value, "sessionTitle"),
        inferred_goal: (!inferred_goal.is_empty()).then_some(inferred_goal),
        accomplishments: string_list(&value, "accomplishments"),
        remaining: string_list(&value, "remaining"),
    })
}

pub struct GoalProgressAnalyzer {
    llm: Arc<LlmManager>,
}

impl GoalProgressAnalyzer {
    pub fn new(llm: Arc<LlmManager>) -> Self {
        Self { llm }
    }

    pub async fn is_available(&self) -> bool {
        self.llm.is_available().await
    }

    /// Estimate progress. A session without prompts is answered without a model call.
    pub async fn analyze(&self, session: &Session) -> Result<GoalProgress> {
        if session.prompts.is_empty() {
            return Ok(GoalProgress::no_prompts());
        }
        let interactions = sample_interactions(session);
        let prompt = build_prompt(session, &interactions);
        let response = self
            .llm
            .complete_active(CompletionRequest::json(SYSTEM_PROMPT, prompt))
            .await?;
        let progress = parse_progress(&response.content)?;
        tracing::debug!(
            session_id = %session.id,
            progress = progress.progress,
            latency_ms = response.latency_ms,
            "Goal progress analyzed"
        );
        Ok(progress)
    }
}
