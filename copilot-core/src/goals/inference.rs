//! Goal suggestion from a session's opening prompts.

use std::sync::Arc;

use serde_json::Value;

use crate::error::Result;
use crate::format::truncate_chars;
use crate::llm::{extract_json, CompletionRequest, LlmManager};
use crate::types::{GoalInference, Session};

const MAX_OPENING_PROMPTS: usize = 3;
const SYSTEM_PROMPT: &str = "You infer the goal of an AI coding session from its first prompts. Return strict JSON with keys: suggestedGoal (one short imperative sentence), confidence (number 0.0-1.0), detectedTheme (one or two words such as bugfix, feature, refactor, docs, testing).";

/// Parse a model reply; an empty goal means nothing was inferred.
pub fn parse_inference(raw: &str) -> Result<Option<GoalInference>> {
    let value = extract_json(raw)?;
    let goal = value
        .get("suggestedGoal")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .trim()
        .to_string();
    if goal.is_empty() {
        return Ok(None);
    }
    let confidence = value
        .get("confidence")
        .and_then(Value::as_f64)
        .unwrap_or(0.0)
        .clamp(0.0, 1.0);
    let theme = value
        .get("detectedTheme")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .trim()
        .to_string();

    Ok(Some(GoalInference {
        suggested_goal: goal,
        confidence,
        detected_theme: theme,
    }))
}

pub struct GoalInferenceService {
    llm: Arc<LlmManager>,
}

impl GoalInferenceService {
    pub fn new(llm: Arc<LlmManager>) -> Self {
        Self { llm }
    }

    pub async fn is_available(&self) -> bool {
        self.llm.is_available().await
    }

    /// Suggest a goal from prompt texts, oldest first.
    pub async fn infer(&self, prompts: &[&str]) -> Result<Option<GoalInference>> {
        if prompts.is_empty() {
            return Ok(None);
        }
        let mut user = String::from("Opening prompts:\n");
        for (n, text) in prompts.iter().take(MAX_OPENING_PROMPTS).enumerate() {
            user.push_str(&format!("{}. {}\n", n + 1, truncate_chars(text, 500).replace('\n', " ")));
        }
        user.push_str("\nReturn only JSON.");

        let response = self
            .llm
            .complete_active(CompletionRequest::json(SYSTEM_PROMPT, user))
            .await?;
        parse_inference(&response.content)
    }

    /// Suggest a goal from a session's first prompts.
    pub async fn infer_for_session(&self, session: &Session) -> Result<Option<GoalInference>> {
        let opening: Vec<&str> = session
            .prompts
            .iter()
            .rev()
            .take(MAX_OPENING_PROMPTS)
            .map(|p| p.text.as_str())
            .collect();
        self.infer(&opening).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_inference() {
        let parsed = parse_inference(
            r#"Sure! {"suggestedGoal": "Add OAuth login", "confidence": 1.7, "detectedTheme": "feature"}"#,
        )
        .unwrap()
        .unwrap();
        assert_eq!(parsed.suggested_goal, "Add OAuth login");
        assert_eq!(parsed.confidence, 1.0);
        assert_eq!(parsed.detected_theme, "feature");
    }

    #[test]
    fn test_empty_goal_is_none() {
        assert_eq!(parse_inference(r#"{"suggestedGoal": "  "}"#).unwrap(), None);
        assert!(parse_inference("nothing here").is_err());
    }
}
