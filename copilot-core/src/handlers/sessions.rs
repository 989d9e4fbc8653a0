//! Session list, focus and per-session edits.

use std::sync::Arc;

use async_trait::async_trait;

use super::{HostContext, MessageHandler};
use crate::error::Result;
use crate::protocol::outbound::{ActiveSession, SessionList};
use crate::protocol::{InboundMessage, OutboundMessage, PushSender};
use crate::session::{GoalProgressCache, SessionUpdate};
use crate::types::{Session, SessionState};

const TYPES: &[&str] = &[
    "v2GetActiveSession",
    "v2GetSessionList",
    "v2GetPrompts",
    "switchSession",
    "renameSession",
    "deleteSession",
    "markSessionRead",
    "v2EndSession",
    "addProjectFolder",
];

/// Build the list view: empty sessions are hidden everywhere, project totals
/// count only what remains, and cached goal progress is merged on.
pub fn session_list(state: SessionState, cache: &GoalProgressCache) -> SessionList {
    let mut projects = state.projects;
    for project in &mut projects {
        project.sessions.retain(|s| s.prompt_count > 0);
        project.recompute_totals();
        for session in &mut project.sessions {
            cache.record(session);
            cache.apply(session);
        }
    }

    let mut sessions: Vec<Session> = projects
        .iter()
        .flat_map(|p| p.sessions.iter().cloned())
        .collect();
    sessions.sort_by(|a, b| b.last_activity_time.cmp(&a.last_activity_time));

    SessionList {
        sessions,
        projects,
        active_session_id: state.active_session_id,
    }
}

pub struct SessionHandler {
    ctx: Arc<HostContext>,
}

impl SessionHandler {
    pub fn new(ctx: Arc<HostContext>) -> Self {
        Self { ctx }
    }

    async fn push_list(&self, push: &PushSender) {
        let state = self.ctx.sessions.store.snapshot().await;
        push.send(OutboundMessage::V2SessionList(session_list(
            state,
            &self.ctx.sessions.goal_cache,
        )));
    }

    async fn push_active(&self, push: &PushSender) {
        let mut view = self
            .ctx
            .sessions
            .store
            .read(|state| {
                let session = state.active_session().cloned();
                let project_name = session
                    .as_ref()
                    .and_then(|s| state.project(&s.project_id))
                    .map(|p| p.name.clone());
                ActiveSession { session, project_name }
            })
            .await;
        if let Some(session) = view.session.as_mut() {
            self.ctx.sessions.goal_cache.apply(session);
        }
        push.send(OutboundMessage::V2ActiveSession(view));
    }
}

#[async_trait]
impl MessageHandler for SessionHandler {
    fn name(&self) -> &'static str {
        "sessions"
    }

    fn handled_types(&self) -> &'static [&'static str] {
        TYPES
    }

    async fn handle(&self, message: &InboundMessage, push: &PushSender) -> Result<bool> {
        let sessions = &self.ctx.sessions;
        match message {
            InboundMessage::GetActiveSession(_) => self.push_active(push).await,
            InboundMessage::GetSessionList(_) => self.push_list(push).await,
            InboundMessage::GetPrompts(query) => {
                let page = sessions
                    .prompts
                    .get_prompts(query.session_id.as_deref(), query.offset, query.limit)
                    .await;
                push.send(OutboundMessage::V2Prompts(page));
            }
            InboundMessage::SwitchSession(req) => {
                if sessions.lifecycle.switch_session(&req.session_id).await?.is_none() {
                    tracing::debug!(session_id = %req.session_id, "Switch to unknown session ignored");
                }
                self.push_active(push).await;
                self.push_list(push).await;
            }
            InboundMessage::RenameSession(req) => {
                let name = req.name.trim();
                let update = SessionUpdate {
                    custom_name: Some(name.to_string()),
                    ..Default::default()
                };
                sessions.lifecycle.update_session(&req.session_id, update).await?;
                self.push_list(push).await;
            }
            InboundMessage::DeleteSession(req) => {
                if sessions.lifecycle.delete_session(&req.session_id).await? {
                    self.ctx.goals.forget(&req.session_id).await;
                }
                self.push_active(push).await;
                self.push_list(push).await;
            }
            InboundMessage::MarkSessionRead(req) => {
                sessions.lifecycle.mark_read(&req.session_id).await?;
                self.push_list(push).await;
            }
            InboundMessage::EndSession(_) => {
                sessions.lifecycle.end_session().await?;
                self.push_active(push).await;
                self.push_list(push).await;
            }
            InboundMessage::AddProjectFolder(_) => {
                let picked = self
                    .ctx
                    .host
                    .file_picker
                    .pick_folder("Select project folder")
                    .await?;
                let Some(path) = picked else {
                    return Ok(true);
                };
                let project = sessions.projects.project_for_path(&path).await?;
                tracing::info!(project_id = %project.id, path = %path.display(), "Project folder added");
                self.push_list(push).await;
            }
            _ => return Ok(false),
        }
        Ok(true)
    }
}
