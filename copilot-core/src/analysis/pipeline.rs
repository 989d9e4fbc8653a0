//! Score / enhance / infer fan-out for a single prompt.
//!
//! Scoring is required, enhancement is degraded on failure, goal inference
//! is silent. Partial results are emitted as soon as each task settles.

use std::sync::{Arc, Mutex};

use serde::Serialize;

use super::context::AnalysisContext;
use super::enhance::{EnhanceMode, PromptEnhancer};
use super::scoring::{PromptScorer, ScoreResult};
use crate::error::Result;
use crate::goals::GoalInferenceService;
use crate::lock::lock;
use crate::types::GoalInference;

/// Partial results streamed while an analysis runs.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum AnalysisEvent {
    ContextReady { context: AnalysisContext },
    ScoreReceived { score: ScoreResult },
    EnhancedPromptReady { text: String },
    EnhancedScoreReady { score: ScoreResult },
    EnhancementFailed { error: String },
    GoalInference { inference: GoalInference },
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisOutcome {
    pub score: ScoreResult,
    pub enhanced_text: Option<String>,
    pub enhanced_score: Option<ScoreResult>,
    pub inference: Option<GoalInference>,
}

pub type EmitFn<'a> = &'a (dyn Fn(AnalysisEvent) + Send + Sync);

pub struct AnalysisPipeline {
    scorer: PromptScorer,
    enhancer: PromptEnhancer,
    goals: Option<Arc<GoalInferenceService>>,
    last_score: Mutex<Option<(String, ScoreResult)>>,
}

impl AnalysisPipeline {
    pub fn new(scorer: PromptScorer, enhancer: PromptEnhancer) -> Self {
        Self {
            scorer,
            enhancer,
            goals: None,
            last_score: Mutex::new(None),
        }
    }

    pub fn with_goal_inference(mut self, goals: Arc<GoalInferenceService>) -> Self {
        self.goals = Some(goals);
        self
    }

    /// Drop the cached score, e.g. after the provider changed.
    pub fn forget_score(&self) {
        *lock(&self.last_score, "last score") = None;
    }

    fn cached_score(&self, text: &str) -> Option<ScoreResult> {
        let cached = lock(&self.last_score, "last score");
        match cached.as_ref() {
            Some((cached_text, score)) if cached_text == text => Some(score.clone()),
            _ => None,
        }
    }

    fn remember(&self, text: &str, score: &ScoreResult) {
        *lock(&self.last_score, "last score") = Some((text.to_string(), score.clone()));
    }

    pub async fn analyze(
        &self,
        text: &str,
        context: AnalysisContext,
        regenerate: bool,
        emit: EmitFn<'_>,
    ) -> Result<AnalysisOutcome> {
        if regenerate {
            return self.regenerate(text, &context, emit).await;
        }

        emit(AnalysisEvent::ContextReady {
            context: context.clone(),
        });

        let score_task = async {
            let result = self.scorer.score(text, &context).await;
            if let Ok(score) = &result {
                emit(AnalysisEvent::ScoreReceived {
                    score: score.clone(),
                });
            }
            result
        };
        let enhance_task = self.enhance_and_score(text, &context, EnhanceMode::Standard, emit);
        let infer_task = async {
            let goals = self.goals.as_ref()?;
            match goals.infer(&[text]).await {
                Ok(Some(inference)) => {
                    emit(AnalysisEvent::GoalInference {
                        inference: inference.clone(),
                    });
                    Some(inference)
                }
                Ok(None) => None,
                Err(e) => {
                    tracing::debug!(error = %e, "Goal inference during analysis failed");
                    None
                }
            }
        };

        let (score, (enhanced_text, enhanced_score), inference) =
            tokio::join!(score_task, enhance_task, infer_task);
        let score = score?;
        self.remember(text, &score);

        Ok(AnalysisOutcome {
            score,
            enhanced_text,
            enhanced_score,
            inference,
        })
    }

    /// Another rewrite of the same prompt, reusing the cached score.
    async fn regenerate(&self, text: &str, context: &AnalysisContext, emit: EmitFn<'_>) -> Result<AnalysisOutcome> {
        let score = match self.cached_score(text) {
            Some(score) => score,
            None => {
                let score = self.scorer.score(text, context).await?;
                self.remember(text, &score);
                score
            }
        };
        let (enhanced_text, enhanced_score) = self
            .enhance_and_score(text, context, EnhanceMode::Aggressive, emit)
            .await;
        Ok(AnalysisOutcome {
            score,
            enhanced_text,
            enhanced_score,
            inference: None,
        })
    }

    async fn enhance_and_score(
        &self,
        text: &str,
        context: &AnalysisContext,
        mode: EnhanceMode,
        emit: EmitFn<'_>,
    ) -> (Option<String>, Option<ScoreResult>) {
        let rewrite = match self.enhancer.enhance(text, context, mode).await {
            Ok(rewrite) => rewrite,
            Err(e) => {
                tracing::warn!(error = %e, "Prompt enhancement failed");
                emit(AnalysisEvent::EnhancementFailed {
                    error: e.to_string(),
                });
                return (None, None);
            }
        };
        emit(AnalysisEvent::EnhancedPromptReady {
            text: rewrite.clone(),
        });

        match self.scorer.score(&rewrite, context).await {
            Ok(score) => {
                emit(AnalysisEvent::EnhancedScoreReady {
                    score: score.clone(),
                });
                (Some(rewrite), Some(score))
            }
            Err(e) => {
                tracing::warn!(error = %e, "Scoring the enhanced prompt failed");
                (Some(rewrite), None)
            }
        }
    }
}
