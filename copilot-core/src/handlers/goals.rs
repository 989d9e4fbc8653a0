//! Goal set / complete / clear, on-demand inference and progress analysis.
//!
//! Inference and progress results reach the webview through the state-event
//! forwarder, the same path background analyses use.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;

use super::{HostContext, MessageHandler};
use crate::error::{Error, Result};
use crate::protocol::outbound::GoalStatus;
use crate::protocol::{InboundMessage, OutboundMessage, PushSender};

const TYPES: &[&str] = &[
    "v2GetGoalStatus",
    "v2SetGoal",
    "v2CompleteGoal",
    "v2ClearGoal",
    "v2InferGoal",
    "v2AnalyzeGoalProgress",
    "v2GoalMaybeLater",
    "v2GoalDontAsk",
];

pub struct GoalHandler {
    ctx: Arc<HostContext>,
}

impl GoalHandler {
    pub fn new(ctx: Arc<HostContext>) -> Self {
        Self { ctx }
    }

    pub async fn status(&self) -> GoalStatus {
        let Some(mut session) = self.ctx.sessions.lifecycle.active_session().await else {
            return GoalStatus::default();
        };
        self.ctx.sessions.goal_cache.apply(&mut session);
        let can_prompt = self.ctx.goals.cooldown().can_prompt(&session.id, Utc::now()).await;
        GoalStatus {
            session_id: Some(session.id),
            goal: session.goal,
            goal_set_at: session.goal_set_at,
            goal_completed_at: session.goal_completed_at,
            progress: session.goal_progress,
            can_prompt,
        }
    }

    async fn push_status(&self, push: &PushSender) {
        push.send(OutboundMessage::V2GoalStatus(self.status().await));
    }
}

#[async_trait]
impl MessageHandler for GoalHandler {
    fn name(&self) -> &'static str {
        "goals"
    }

    fn handled_types(&self) -> &'static [&'static str] {
        TYPES
    }

    async fn handle(&self, message: &InboundMessage, push: &PushSender) -> Result<bool> {
        let lifecycle = &self.ctx.sessions.lifecycle;
        match message {
            InboundMessage::GetGoalStatus(_) => {}
            InboundMessage::SetGoal(req) => {
                lifecycle.set_goal(&req.goal).await?;
            }
            InboundMessage::CompleteGoal(_) => {
                lifecycle.complete_goal().await?;
            }
            InboundMessage::ClearGoal(_) => {
                lifecycle.clear_goal().await?;
            }
            InboundMessage::InferGoal(_) => {
                if self.ctx.goals.infer_now().await?.is_none() {
                    tracing::debug!("No goal could be inferred");
                }
            }
            InboundMessage::AnalyzeGoalProgress(req) => {
                let progress = self.ctx.goals.analyze_now(req.session_id.as_deref()).await?;
                tracing::debug!(progress = progress.progress, "Goal progress analyzed on request");
            }
            InboundMessage::GoalMaybeLater(_) => {
                self.ctx.goals.cooldown().maybe_later(Utc::now()).await?;
            }
            InboundMessage::GoalDontAsk(_) => {
                let session = lifecycle.active_session().await.ok_or(Error::NoActiveSession)?;
                self.ctx.goals.cooldown().dont_ask(&session.id).await?;
            }
            _ => return Ok(false),
        }
        self.push_status(push).await;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::testing::{context, drain, push};
    use crate::host::HostCapabilities;
    use crate::protocol::inbound::{Empty, SetGoal};
    use crate::session::project::DEFAULT_PROJECT_ID;
    use crate::types::Platform;

    async fn with_active_session() -> Arc<HostContext> {
        let ctx = context(HostCapabilities::in_memory(), None).await;
        let project = ctx.sessions.projects.current_or_default().await.unwrap();
        assert_eq!(project.id, DEFAULT_PROJECT_ID);
        ctx.sessions
            .lifecycle
            .get_or_create_session(&project.id, Platform::ClaudeCode, None)
            .await
            .unwrap();
        ctx
    }

    fn last_status(rx: &mut tokio::sync::mpsc::UnboundedReceiver<OutboundMessage>) -> GoalStatus {
        match drain(rx).pop() {
            Some(OutboundMessage::V2GoalStatus(status)) => status,
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_goal_lifecycle_pushes_status() {
        let ctx = with_active_session().await;
        let handler = GoalHandler::new(ctx);
        let (push, mut rx) = push();

        let set = InboundMessage::SetGoal(SetGoal {
            goal: "  Add OAuth login ".to_string(),
        });
        handler.handle(&set, &push).await.unwrap();
        let status = last_status(&mut rx);
        assert_eq!(status.goal.as_deref(), Some("Add OAuth login"));
        assert!(status.goal_set_at.is_some());
        assert!(status.can_prompt);

        handler.handle(&InboundMessage::CompleteGoal(Empty {}), &push).await.unwrap();
        assert!(last_status(&mut rx).goal_completed_at.is_some());

        handler.handle(&InboundMessage::ClearGoal(Empty {}), &push).await.unwrap();
        assert!(last_status(&mut rx).goal.is_none());
    }

    #[tokio::test]
    async fn test_dont_ask_blocks_prompts() {
        let ctx = with_active_session().await;
        let handler = GoalHandler::new(ctx);
        let (push, mut rx) = push();
        handler.handle(&InboundMessage::GoalDontAsk(Empty {}), &push).await.unwrap();
        assert!(!last_status(&mut rx).can_prompt);
    }

    #[tokio::test]
    async fn test_infer_without_provider_fails() {
        let ctx = with_active_session().await;
        let handler = GoalHandler::new(ctx);
        let (push, _rx) = push();
        let err = handler
            .handle(&InboundMessage::InferGoal(Empty {}), &push)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Unavailable(_)));
    }

    #[tokio::test]
    async fn test_status_without_session_is_empty() {
        let ctx = context(HostCapabilities::in_memory(), None).await;
        let handler = GoalHandler::new(ctx);
        assert_eq!(handler.status().await, GoalStatus::default());
    }
}
