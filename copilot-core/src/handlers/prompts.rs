//! Prompt analysis, the prompt lab, history and daily counters.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;

use super::{HostContext, MessageHandler};
use crate::analysis::{AnalysisContext, AnalysisEvent, AnalysisOutcome, AnalyzedPrompt};
use crate::error::Result;
use crate::protocol::inbound::AnalyzePrompt;
use crate::protocol::{InboundMessage, OutboundMessage, PushSender};
use crate::session::AddPromptOptions;

const TYPES: &[&str] = &["analyzePrompt", "promptLabAnalyze", "getPromptHistory", "v2GetDailyStats"];

pub struct PromptHandler {
    ctx: Arc<HostContext>,
}

impl PromptHandler {
    pub fn new(ctx: Arc<HostContext>) -> Self {
        Self { ctx }
    }

    async fn context(&self) -> AnalysisContext {
        let workspace = self.ctx.host.workspace.clone();
        self.ctx
            .sessions
            .store
            .read(|state| AnalysisContext::gather(workspace.as_ref(), state))
            .await
    }

    async fn analyze(&self, req: &AnalyzePrompt, push: &PushSender) -> Result<()> {
        let arrived_at = Utc::now();
        let context = self.context().await;
        let emit = |event: AnalysisEvent| push.send(event.into());

        let outcome = match self
            .ctx
            .analysis
            .analyze(&req.text, context, req.regenerate, &emit)
            .await
        {
            Ok(outcome) => outcome,
            Err(e) => {
                push.error("Prompt analysis failed", &e);
                return Ok(());
            }
        };
        if req.regenerate {
            return Ok(());
        }

        if let Err(e) = self.capture(&req.text, arrived_at, &outcome).await {
            tracing::warn!(error = %e, "Analyzed prompt was not added to a session");
        }

        let prompt = AnalyzedPrompt::from_score(
            &req.text,
            arrived_at,
            &outcome.score,
            outcome.enhanced_text.clone(),
            outcome.enhanced_score.as_ref().map(|s| s.score_out_of_ten()),
        );
        self.ctx.history.record(prompt.clone()).await?;
        let daily_stats = self.ctx.history.today().await;
        self.ctx.status_bar.update(&daily_stats);
        push.send(OutboundMessage::AnalysisComplete { prompt, daily_stats });
        Ok(())
    }

    /// Store the prompt on the current project's live session.
    async fn capture(&self, text: &str, arrived_at: chrono::DateTime<Utc>, outcome: &AnalysisOutcome) -> Result<()> {
        let sessions = &self.ctx.sessions;
        let project = sessions.projects.current_or_default().await?;
        sessions
            .lifecycle
            .get_or_create_session(&project.id, self.ctx.platform(), None)
            .await?;
        let options = AddPromptOptions {
            timestamp: Some(arrived_at),
            enhanced_text: outcome.enhanced_text.clone(),
            enhanced_score: outcome.enhanced_score.as_ref().map(|s| s.score_out_of_ten()),
            ..Default::default()
        };
        sessions
            .prompts
            .add_prompt(
                text,
                outcome.score.score_out_of_ten(),
                Some(outcome.score.breakdown.clone()),
                options,
            )
            .await?;
        Ok(())
    }

    /// Scratch analysis: nothing is captured or counted.
    async fn prompt_lab(&self, req: &AnalyzePrompt, push: &PushSender) {
        let context = self.context().await;
        let emit = |event: AnalysisEvent| push.send(OutboundMessage::PromptLabEvent(event));
        match self
            .ctx
            .prompt_lab
            .analyze(&req.text, context, req.regenerate, &emit)
            .await
        {
            Ok(outcome) => push.send(OutboundMessage::PromptLabComplete {
                score: outcome.score,
                enhanced_text: outcome.enhanced_text,
                enhanced_score: outcome.enhanced_score,
            }),
            Err(e) => push.error("Prompt lab analysis failed", &e),
        }
    }
}

#[async_trait]
impl MessageHandler for PromptHandler {
    fn name(&self) -> &'static str {
        "prompts"
    }

    fn handled_types(&self) -> &'static [&'static str] {
        TYPES
    }

    async fn handle(&self, message: &InboundMessage, push: &PushSender) -> Result<bool> {
        match message {
            InboundMessage::AnalyzePrompt(req) => self.analyze(req, push).await?,
            InboundMessage::PromptLabAnalyze(req) => self.prompt_lab(req, push).await,
            InboundMessage::GetPromptHistory(_) => push.send(OutboundMessage::PromptHistory {
                entries: self.ctx.history.list().await,
            }),
            InboundMessage::GetDailyStats(_) => {
                push.send(OutboundMessage::V2DailyStats(self.ctx.history.today().await))
            }
            _ => return Ok(false),
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::testing::{context, drain, kinds, push};
    use crate::host::memory::RecordingStatusBar;
    use crate::host::HostCapabilities;
    use crate::llm::testing::StubProvider;
    use crate::llm::{CompletionRequest, LlmError, ProviderId};

    const SCORE: &str = r#"{"specificity": 70, "context": 70, "intent": 70, "outcome": 70, "constraints": 70, "suggestions": ["Name the module"]}"#;

    fn responder(req: &CompletionRequest) -> std::result::Result<String, LlmError> {
        let system = req.system_prompt.as_deref().unwrap_or_default();
        if system.contains("grade") {
            Ok(SCORE.to_string())
        } else if system.contains("infer the goal") {
            Err(LlmError::Timeout(1))
        } else {
            Ok("Refactor the session store to use a write lock".to_string())
        }
    }

    fn analyze(text: &str) -> InboundMessage {
        InboundMessage::AnalyzePrompt(AnalyzePrompt {
            text: text.to_string(),
            regenerate: false,
        })
    }

    #[tokio::test]
    async fn test_analyze_records_history_and_session() {
        let bar = Arc::new(RecordingStatusBar::default());
        let mut host = HostCapabilities::in_memory();
        host.status_bar = bar.clone();
        let stub = StubProvider::with_responder(ProviderId::Ollama, "m", responder);
        let ctx = context(host, Some(stub)).await;
        let handler = PromptHandler::new(ctx.clone());
        let (push, mut rx) = push();

        assert!(handler.handle(&analyze("refactor store"), &push).await.unwrap());

        let out = drain(&mut rx);
        let kinds = kinds(&out);
        assert_eq!(kinds.first().map(String::as_str), Some("contextReady"));
        assert_eq!(kinds.last().map(String::as_str), Some("analysisComplete"));
        assert!(kinds.iter().any(|k| k == "scoreReceived"));
        assert!(kinds.iter().any(|k| k == "enhancedPromptReady"));

        match out.last() {
            Some(OutboundMessage::AnalysisComplete { prompt, daily_stats }) => {
                assert_eq!(prompt.score, 7.0);
                assert_eq!(daily_stats.prompts_analyzed, 1);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(ctx.history.list().await.len(), 1);
        assert!(bar.text().is_some());

        let session = ctx.sessions.lifecycle.active_session().await.unwrap();
        assert_eq!(session.prompt_count, 1);
        assert_eq!(session.prompts[0].score, 7.0);
    }

    #[tokio::test]
    async fn test_analyze_without_provider_reports_failure() {
        let ctx = context(HostCapabilities::in_memory(), None).await;
        let handler = PromptHandler::new(ctx.clone());
        let (push, mut rx) = push();

        assert!(handler.handle(&analyze("anything"), &push).await.unwrap());
        let out = drain(&mut rx);
        assert!(matches!(out.last(), Some(OutboundMessage::Error(e)) if e.message == "Prompt analysis failed"));
        assert!(ctx.history.list().await.is_empty());
        assert!(ctx.sessions.lifecycle.active_session().await.is_none());
    }

    #[tokio::test]
    async fn test_prompt_lab_leaves_no_trace() {
        let stub = StubProvider::with_responder(ProviderId::Ollama, "m", responder);
        let ctx = context(HostCapabilities::in_memory(), Some(stub)).await;
        let handler = PromptHandler::new(ctx.clone());
        let (push, mut rx) = push();

        let msg = InboundMessage::PromptLabAnalyze(AnalyzePrompt {
            text: "draft".to_string(),
            regenerate: false,
        });
        handler.handle(&msg, &push).await.unwrap();
        let out = drain(&mut rx);
        assert!(matches!(out.last(), Some(OutboundMessage::PromptLabComplete { .. })));
        assert!(out[..out.len() - 1]
            .iter()
            .all(|m| matches!(m, OutboundMessage::PromptLabEvent(_))));
        assert!(ctx.history.list().await.is_empty());
    }
}
