//! Response capture and prompt/response pairing

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use super::events::StateEvent;
use super::store::SessionStore;
use crate::error::{Error, Result};
use crate::format::truncate_chars;
use crate::types::{CapturedResponse, Prompt, Response};

/// Stored response text is cut to this many characters.
pub const MAX_RESPONSE_CHARS: usize = 2000;

/// A prompt and its reply, if one was captured.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Interaction {
    pub prompt: Prompt,
    pub response: Option<Response>,
}

pub struct ResponseManagementService {
    store: Arc<SessionStore>,
}

impl ResponseManagementService {
    pub fn new(store: Arc<SessionStore>) -> Self {
        Self { store }
    }

    /// Attach a captured reply to the active session.
    ///
    /// Linking prefers `prompt_id`, then the adapter's own prompt id, then
    /// the most recent prompt, then the empty string.
    pub async fn add_response(&self, captured: CapturedResponse, prompt_id: Option<&str>) -> Result<Response> {
        let max_responses = self.store.limits().max_responses;
        self.store
            .mutate(|state, events| {
                let session = state.active_session_mut().ok_or(Error::NoActiveSession)?;

                let link = prompt_id
                    .map(str::to_string)
                    .or_else(|| captured.prompt_id.clone())
                    .or_else(|| session.prompts.first().map(|p| p.id.clone()))
                    .unwrap_or_default();

                let timestamp = captured.timestamp.unwrap_or_else(Utc::now);
                let response = Response {
                    id: captured
                        .id
                        .clone()
                        .unwrap_or_else(|| format!("response-{}", Uuid::new_v4())),
                    prompt_id: link,
                    timestamp,
                    text: truncate_chars(&captured.text, MAX_RESPONSE_CHARS),
                    outcome: captured.outcome(),
                    files_modified: captured.files_modified.clone(),
                    tool_calls: captured.merged_tool_names(),
                    source: captured.source.clone(),
                };

                session.push_response(response.clone(), max_responses);
                session.last_activity_time = session.last_activity_time.max(timestamp);
                let session_id = session.id.clone();
                let project_id = session.project_id.clone();
                if let Some(project) = state.project_mut(&project_id) {
                    project.recompute_last_activity();
                }

                events.push(StateEvent::ResponseAdded {
                    session_id,
                    response_id: response.id.clone(),
                });
                Ok(response)
            })
            .await
    }

    /// The last `n` prompts of the active session with their replies.
    pub async fn get_last_interactions(&self, n: usize) -> Vec<Interaction> {
        self.store
            .read(|state| {
                let Some(session) = state.active_session() else {
                    return Vec::new();
                };
                session
                    .prompts
                    .iter()
                    .take(n)
                    .map(|prompt| Interaction {
                        prompt: prompt.clone(),
                        response: session
                            .responses
                            .iter()
                            .find(|r| r.prompt_id == prompt.id)
                            .cloned(),
                    })
                    .collect()
            })
            .await
    }
}
