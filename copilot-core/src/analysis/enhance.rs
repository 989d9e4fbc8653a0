//! Prompt rewriting.

use std::sync::Arc;

use super::context::AnalysisContext;
use crate::error::Result;
use crate::llm::{CompletionRequest, Feature, LlmError, LlmManager};

const STANDARD_INSTRUCTIONS: &str = "Rewrite the user's prompt for an AI coding assistant so it is specific, gives context, states intent, describes the expected outcome and lists constraints. Keep the user's voice and keep it concise. Reply with the rewritten prompt only.";
const AGGRESSIVE_INSTRUCTIONS: &str = "Rewrite the user's prompt for an AI coding assistant from scratch. Restructure it freely, add the missing context, acceptance criteria and constraints a senior engineer would ask for, and make it markedly stronger than the original. Reply with the rewritten prompt only.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnhanceMode {
    Standard,
    /// Used when the user asks for another attempt.
    Aggressive,
}

/// Strip fences, labels and wrapping quotes models add around a rewrite.
pub fn clean_rewrite(raw: &str) -> String {
    let mut text = raw.trim();
    if let Some(rest) = text.strip_prefix("```") {
        let rest = rest.split_once('\n').map(|(_, body)| body).unwrap_or(rest);
        text = rest.trim_end().strip_suffix("```").unwrap_or(rest).trim();
    }
    for label in ["Improved prompt:", "Rewritten prompt:", "Enhanced prompt:"] {
        if let Some(rest) = text.strip_prefix(label) {
            text = rest.trim();
        }
    }
    if text.len() >= 2 && text.starts_with('"') && text.ends_with('"') {
        text = &text[1..text.len() - 1];
    }
    text.trim().to_string()
}

pub struct PromptEnhancer {
    llm: Arc<LlmManager>,
}

impl PromptEnhancer {
    pub fn new(llm: Arc<LlmManager>) -> Self {
        Self { llm }
    }

    pub async fn enhance(&self, text: &str, context: &AnalysisContext, mode: EnhanceMode) -> Result<String> {
        let instructions = match mode {
            EnhanceMode::Standard => STANDARD_INSTRUCTIONS,
            EnhanceMode::Aggressive => AGGRESSIVE_INSTRUCTIONS,
        };
        let user = format!("{}\nOriginal prompt:\n{}", context.describe(), text);
        let mut request = CompletionRequest::text(instructions, user);
        if mode == EnhanceMode::Aggressive {
            request.temperature = 0.8;
        }

        let response = self.llm.complete(Feature::PromptImprovement, request).await?;
        let rewrite = clean_rewrite(&response.content);
        if rewrite.is_empty() {
            return Err(LlmError::InvalidFormat("empty rewrite".to_string()).into());
        }
        Ok(rewrite)
    }
}
