//! Five-dimension prompt scoring.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use super::context::AnalysisContext;
use crate::error::Result;
use crate::llm::{extract_json, CompletionRequest, Feature, LlmError, LlmManager};
use crate::types::ScoreBreakdown;

const SYSTEM_PROMPT: &str = "You grade prompts written to an AI coding assistant. Score each dimension from 0 to 100: specificity (precise about what to change), context (files, errors, environment given), intent (why the change is wanted), outcome (what done looks like), constraints (limits, style, things to avoid). Return strict JSON with keys specificity, context, intent, outcome, constraints (numbers), suggestions (array of short strings, most important first) and feedback (one sentence).";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreResult {
    pub breakdown: ScoreBreakdown,
    /// Weighted total, 0-100
    pub total: f64,
    pub suggestions: Vec<String>,
    pub feedback: String,
}

impl ScoreResult {
    /// Total on the 0-10 scale stored on prompts, one decimal.
    pub fn score_out_of_ten(&self) -> f64 {
        self.total.round() / 10.0
    }
}

fn dimension(value: &Value, key: &str) -> Option<f64> {
    match value.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        Value::Object(o) => o.get("score").and_then(Value::as_f64),
        _ => None,
    }
}

pub fn parse_score(raw: &str) -> Result<ScoreResult> {
    let value = extract_json(raw)?;
    let dims: Vec<Option<f64>> = ["specificity", "context", "intent", "outcome", "constraints"]
        .iter()
        .map(|key| dimension(&value, key))
        .collect();
    if dims.iter().all(Option::is_none) {
        return Err(LlmError::InvalidFormat("score reply has no dimensions".to_string()).into());
    }
    let d = |i: usize| dims[i].unwrap_or(0.0);
    let breakdown = ScoreBreakdown::from_scores(d(0), d(1), d(2), d(3), d(4));

    let suggestions = value
        .get("suggestions")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default();

    Ok(ScoreResult {
        total: breakdown.total,
        breakdown,
        suggestions,
        feedback: value
            .get("feedback")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
    })
}

pub struct PromptScorer {
    llm: Arc<LlmManager>,
}

impl PromptScorer {
    pub fn new(llm: Arc<LlmManager>) -> Self {
        Self { llm }
    }

    pub async fn score(&self, text: &str, context: &AnalysisContext) -> Result<ScoreResult> {
        let user = format!(
            "{}\nPrompt to grade:\n\"\"\"\n{}\n\"\"\"\n\nReturn only JSON.",
            context.describe(),
            text
        );
        let response = self
            .llm
            .complete(Feature::PromptScoring, CompletionRequest::json(SYSTEM_PROMPT, user))
            .await?;
        let result = parse_score(&response.content)?;
        tracing::debug!(total = result.total, latency_ms = response.latency_ms, "Prompt scored");
        Ok(result)
    }
}
