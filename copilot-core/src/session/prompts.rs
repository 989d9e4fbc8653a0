//! Prompt capture and scoring updates

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::events::StateEvent;
use super::store::SessionStore;
use crate::error::{Error, Result};
use crate::format::truncate_display;
use crate::types::{Prompt, ScoreBreakdown, Session};

/// Notified after every prompt insert. Must not block.
pub trait GoalProgressTrigger: Send + Sync {
    fn prompt_added(&self, session: Session);
}

#[derive(Debug, Clone, Default)]
pub struct AddPromptOptions {
    pub id: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
    pub enhanced_text: Option<String>,
    pub enhanced_score: Option<f64>,
}

#[derive(Debug, Clone, Default)]
pub struct PromptScoreUpdate {
    pub score: f64,
    pub breakdown: Option<ScoreBreakdown>,
    pub enhanced_text: Option<String>,
    pub enhanced_score: Option<f64>,
}

/// One page of a session's prompts, most recent first.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptPage {
    pub prompts: Vec<Prompt>,
    pub total: usize,
    pub has_more: bool,
    pub offset: usize,
    pub limit: usize,
}

pub struct PromptManagementService {
    store: Arc<SessionStore>,
    trigger: Option<Arc<dyn GoalProgressTrigger>>,
}

impl PromptManagementService {
    pub fn new(store: Arc<SessionStore>) -> Self {
        Self { store, trigger: None }
    }

    pub fn with_trigger(mut self, trigger: Arc<dyn GoalProgressTrigger>) -> Self {
        self.trigger = Some(trigger);
        self
    }

    pub async fn add_prompt(
        &self,
        text: &str,
        score: f64,
        breakdown: Option<ScoreBreakdown>,
        options: AddPromptOptions,
    ) -> Result<Prompt> {
        let limits = self.store.limits().clone();
        let (prompt, session) = self
            .store
            .mutate(|state, events| {
                let active_id = state.active_session_id.clone().ok_or(Error::NoActiveSession)?;
                let project = state
                    .projects
                    .iter_mut()
                    .find(|p| p.sessions.iter().any(|s| s.id == active_id))
                    .ok_or(Error::NoActiveSession)?;

                let timestamp = options.timestamp.unwrap_or_else(Utc::now);
                let prompt = Prompt {
                    id: options
                        .id
                        .unwrap_or_else(|| format!("prompt-{}", Uuid::new_v4())),
                    session_id: active_id.clone(),
                    timestamp,
                    text: text.to_string(),
                    truncated_text: truncate_display(text, limits.truncate_chars),
                    score,
                    breakdown,
                    enhanced_text: options.enhanced_text,
                    enhanced_score: options.enhanced_score,
                };

                let session = project
                    .session_mut(&active_id)
                    .ok_or(Error::NoActiveSession)?;
                let before = session.prompt_count;
                session.push_prompt(prompt.clone(), limits.max_prompts);
                session.last_activity_time = session.last_activity_time.max(timestamp);
                let session = session.clone();

                // Counters follow the bounded list, so a full session adds nothing.
                project.total_prompts += session.prompt_count.saturating_sub(before);
                project.recompute_last_activity();

                events.push(StateEvent::PromptAdded {
                    session_id: session.id.clone(),
                    prompt_id: prompt.id.clone(),
                });
                Ok((prompt, session))
            })
            .await?;

        tracing::debug!(session_id = %session.id, prompt_id = %prompt.id, score, "Prompt added");
        if let Some(trigger) = &self.trigger {
            trigger.prompt_added(session);
        }
        Ok(prompt)
    }

    /// Update a prompt's score wherever it lives.
    pub async fn update_prompt_score(&self, prompt_id: &str, update: PromptScoreUpdate) -> Result<Prompt> {
        self.store
            .mutate(|state, events| {
                let session = state
                    .projects
                    .iter_mut()
                    .flat_map(|p| p.sessions.iter_mut())
                    .find(|s| s.prompts.iter().any(|p| p.id == prompt_id))
                    .ok_or_else(|| Error::not_found("prompt", prompt_id))?;

                let prompt = session
                    .prompts
                    .iter_mut()
                    .find(|p| p.id == prompt_id)
                    .ok_or_else(|| Error::not_found("prompt", prompt_id))?;
                prompt.score = update.score;
                if update.breakdown.is_some() {
                    prompt.breakdown = update.breakdown;
                }
                if update.enhanced_text.is_some() {
                    prompt.enhanced_text = update.enhanced_text;
                }
                if update.enhanced_score.is_some() {
                    prompt.enhanced_score = update.enhanced_score;
                }
                let prompt = prompt.clone();

                session.recompute_average_score();
                events.push(StateEvent::PromptUpdated {
                    session_id: session.id.clone(),
                    prompt_id: prompt.id.clone(),
                });
                Ok(prompt)
            })
            .await
    }

    /// Page through a session's prompts. `None` means the active session;
    /// unknown sessions yield an empty page.
    pub async fn get_prompts(&self, session_id: Option<&str>, offset: usize, limit: usize) -> PromptPage {
        self.store
            .read(|state| {
                let session = match session_id {
                    Some(id) => state.find_session(id),
                    None => state.active_session(),
                };
                let prompts = session.map(|s| s.prompts.as_slice()).unwrap_or_default();
                let page: Vec<Prompt> = prompts.iter().skip(offset).take(limit).cloned().collect();
                PromptPage {
                    has_more: offset + page.len() < prompts.len(),
                    total: prompts.len(),
                    prompts: page,
                    offset,
                    limit,
                }
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionConfig;
    use crate::host::memory::MemoryKvStore;
    use crate::persistence::Persistence;
    use crate::session::events::EventBus;
    use crate::types::{Platform, Project, SessionState};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingTrigger {
        seen: Mutex<Vec<usize>>,
    }

    impl GoalProgressTrigger for RecordingTrigger {
        fn prompt_added(&self, session: Session) {
            self.seen.lock().unwrap().push(session.prompt_count);
        }
    }

    async fn store_with_session(limits: SessionConfig) -> Arc<SessionStore> {
        let store = Arc::new(SessionStore::new(
            SessionState::default(),
            Arc::new(Persistence::new(Arc::new(MemoryKvStore::default()))),
            EventBus::default(),
            limits,
        ));
        store
            .mutate(|state, _| {
                let mut project = Project::new("p1", "one", None);
                project
                    .sessions
                    .push(Session::new("s1", "p1", Platform::Cursor, Utc::now()));
                project.total_sessions = 1;
                state.projects.push(project);
                state.active_session_id = Some("s1".to_string());
                Ok(())
            })
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn test_add_prompt_requires_active_session() {
        let store = Arc::new(SessionStore::new(
            SessionState::default(),
            Arc::new(Persistence::new(Arc::new(MemoryKvStore::default()))),
            EventBus::default(),
            SessionConfig::default(),
        ));
        let service = PromptManagementService::new(store);
        let err = service
            .add_prompt("hi", 5.0, None, AddPromptOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NoActiveSession));
    }

    #[tokio::test]
    async fn test_add_prompt_updates_counters_and_fires_trigger() {
        let store = store_with_session(SessionConfig::default()).await;
        let trigger = Arc::new(RecordingTrigger::default());
        let service = PromptManagementService::new(store.clone()).with_trigger(trigger.clone());

        service
            .add_prompt("first", 6.0, None, AddPromptOptions::default())
            .await
            .unwrap();
        let second = service
            .add_prompt(
                &"x".repeat(150),
                7.5,
                None,
                AddPromptOptions {
                    id: Some("custom".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(second.id, "custom");
        assert_eq!(second.truncated_text.chars().count(), 103);

        let state = store.snapshot().await;
        let session = state.find_session("s1").unwrap();
        assert_eq!(session.prompts[0].id, "custom");
        assert_eq!(session.prompt_count, 2);
        assert_eq!(session.average_score, 6.8);
        assert_eq!(state.project("p1").unwrap().total_prompts, 2);
        assert_eq!(*trigger.seen.lock().unwrap(), vec![1, 2]);
    }

    #[tokio::test]
    async fn test_prompt_list_is_bounded() {
        let limits = SessionConfig {
            max_prompts: 3,
            ..SessionConfig::default()
        };
        let store = store_with_session(limits).await;
        let service = PromptManagementService::new(store.clone());
        for i in 0..5 {
            service
                .add_prompt(&format!("p{}", i), i as f64, None, AddPromptOptions::default())
                .await
                .unwrap();
        }
        let state = store.snapshot().await;
        let session = state.find_session("s1").unwrap();
        let texts: Vec<&str> = session.prompts.iter().map(|p| p.text.as_str()).collect();
        assert_eq!(texts, vec!["p4", "p3", "p2"]);
        assert_eq!(session.prompt_count, 3);
        assert_eq!(session.average_score, 3.0);
        assert_eq!(state.project("p1").unwrap().total_prompts, 3);
    }

    #[tokio::test]
    async fn test_update_prompt_score_recomputes_average() {
        let store = store_with_session(SessionConfig::default()).await;
        let service = PromptManagementService::new(store.clone());
        let a = service
            .add_prompt("a", 4.0, None, AddPromptOptions::default())
            .await
            .unwrap();
        service
            .add_prompt("b", 6.0, None, AddPromptOptions::default())
            .await
            .unwrap();

        let mut rx = store.events().subscribe();
        let updated = service
            .update_prompt_score(
                &a.id,
                PromptScoreUpdate {
                    score: 9.0,
                    enhanced_text: Some("better".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.enhanced_text.as_deref(), Some("better"));
        assert!(matches!(
            rx.recv().await.unwrap(),
            StateEvent::PromptUpdated { .. }
        ));
        let state = store.snapshot().await;
        assert_eq!(state.find_session("s1").unwrap().average_score, 7.5);

        assert!(service
            .update_prompt_score("missing", PromptScoreUpdate::default())
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_get_prompts_paging() {
        let store = store_with_session(SessionConfig::default()).await;
        let service = PromptManagementService::new(store);
        for i in 0..5 {
            service
                .add_prompt(&format!("p{}", i), 5.0, None, AddPromptOptions::default())
                .await
                .unwrap();
        }

        let page = service.get_prompts(Some("s1"), 1, 2).await;
        assert_eq!(page.total, 5);
        assert!(page.has_more);
        assert_eq!(page.prompts[0].text, "p3");

        let tail = service.get_prompts(None, 4, 2).await;
        assert_eq!(tail.prompts.len(), 1);
        assert!(!tail.has_more);

        let unknown = service.get_prompts(Some("nope"), 0, 10).await;
        assert_eq!(unknown.total, 0);
        assert!(unknown.prompts.is_empty());
    }
}
