//! Session lifecycle: creation, switching, goals, updates and deletion

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use uuid::Uuid;

use super::events::StateEvent;
use super::store::SessionStore;
use crate::error::{Error, Result};
use crate::types::{Platform, Session, SessionState};

/// True iff the session saw activity within the inactivity window.
pub fn is_session_still_active(session: &Session, max_inactivity_minutes: i64, now: DateTime<Utc>) -> bool {
    now - session.last_activity_time <= Duration::minutes(max_inactivity_minutes)
}

/// Fields a caller may change through [`SessionLifecycleService::update_session`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionUpdate {
    #[serde(default)]
    pub custom_name: Option<String>,
    #[serde(default)]
    pub goal: Option<String>,
    #[serde(default)]
    pub goal_progress: Option<u8>,
    #[serde(default)]
    pub has_unread_activity: Option<bool>,
}

impl SessionUpdate {
    /// Whether the update only touches display hints.
    fn is_display_only(&self) -> bool {
        self.goal.is_none() && self.goal_progress.is_none()
    }
}

pub struct SessionLifecycleService {
    store: Arc<SessionStore>,
}

impl SessionLifecycleService {
    pub fn new(store: Arc<SessionStore>) -> Self {
        Self { store }
    }

    fn max_inactivity(&self) -> i64 {
        self.store.limits().max_inactivity_minutes
    }

    pub fn is_still_active(&self, session: &Session) -> bool {
        is_session_still_active(session, self.max_inactivity(), Utc::now())
    }

    /// Reuse the live session for `(project, platform, source id)` or start one.
    pub async fn get_or_create_session(
        &self,
        project_id: &str,
        platform: Platform,
        source_session_id: Option<&str>,
    ) -> Result<Session> {
        let max_inactivity = self.max_inactivity();
        self.store
            .mutate(|state, events| {
                let now = Utc::now();
                let project = state
                    .project_mut(project_id)
                    .ok_or_else(|| Error::not_found("project", project_id))?;

                let live = project.sessions.iter().find(|s| {
                    s.platform == platform
                        && s.is_active
                        && is_session_still_active(s, max_inactivity, now)
                        && source_session_id.map_or(true, |src| s.source_session_id() == Some(src))
                });
                if let Some(session) = live {
                    let session = session.clone();
                    state.active_session_id = Some(session.id.clone());
                    state.active_project_id = Some(project_id.to_string());
                    return Ok(session);
                }

                for stale in project.sessions.iter_mut().filter(|s| {
                    s.platform == platform
                        && s.is_active
                        && !is_session_still_active(s, max_inactivity, now)
                }) {
                    stale.is_active = false;
                    stale.ended_at = Some(stale.last_activity_time);
                    events.push(StateEvent::SessionEnded {
                        session_id: stale.id.clone(),
                    });
                }

                let mut session = Session::new(
                    format!("{}-{}", platform.as_str(), Uuid::new_v4()),
                    project_id,
                    platform,
                    now,
                );
                session.metadata.source_session_id = source_session_id.map(str::to_string);

                project.sessions.insert(0, session.clone());
                project.total_sessions += 1;
                project.recompute_last_activity();

                state.active_session_id = Some(session.id.clone());
                state.active_project_id = Some(project_id.to_string());
                events.push(StateEvent::SessionCreated {
                    session_id: session.id.clone(),
                    project_id: project_id.to_string(),
                });
                tracing::info!(session_id = %session.id, project_id, platform = %platform.as_str(), "Session created");
                Ok(session)
            })
            .await
    }

    pub async fn find_session_by_source_id(&self, source_session_id: &str) -> Option<Session> {
        self.store
            .read(|state| {
                state
                    .sessions()
                    .find(|s| {
                        s.metadata.source_session_id.as_deref() == Some(source_session_id)
                            || s.metadata.cursor_composer_id.as_deref() == Some(source_session_id)
                    })
                    .cloned()
            })
            .await
    }

    pub async fn active_session(&self) -> Option<Session> {
        self.store.read(|state| state.active_session().cloned()).await
    }

    pub async fn session(&self, id: &str) -> Option<Session> {
        self.store.read(|state| state.find_session(id).cloned()).await
    }

    /// Focus a session. Unknown ids are a no-op returning `None`.
    pub async fn switch_session(&self, id: &str) -> Result<Option<Session>> {
        if self.session(id).await.is_none() {
            return Ok(None);
        }
        self.store
            .mutate(|state, events| {
                let Some(session) = state.find_session_mut(id) else {
                    return Ok(None);
                };
                session.has_unread_activity = false;
                let session = session.clone();
                state.active_session_id = Some(session.id.clone());
                state.active_project_id = Some(session.project_id.clone());
                events.push(StateEvent::SessionSwitched {
                    session_id: session.id.clone(),
                });
                Ok(Some(session))
            })
            .await
    }

    pub async fn set_goal(&self, goal: &str) -> Result<Session> {
        let goal = goal.trim();
        if goal.is_empty() {
            return Err(Error::InvalidInput("goal must not be empty".to_string()));
        }
        self.store
            .mutate(|state, events| {
                let session = active_open_session(state)?;
                session.goal = Some(goal.to_string());
                session.goal_set_at = Some(Utc::now());
                session.goal_completed_at = None;
                events.push(StateEvent::GoalSet {
                    session_id: session.id.clone(),
                    goal: goal.to_string(),
                });
                Ok(session.clone())
            })
            .await
    }

    pub async fn complete_goal(&self) -> Result<Session> {
        self.store
            .mutate(|state, events| {
                let session = active_open_session(state)?;
                if session.goal.is_none() {
                    return Err(Error::InvalidInput("session has no goal to complete".to_string()));
                }
                session.goal_completed_at = Some(Utc::now());
                session.goal_progress = Some(100);
                events.push(StateEvent::GoalCompleted {
                    session_id: session.id.clone(),
                });
                Ok(session.clone())
            })
            .await
    }

    pub async fn clear_goal(&self) -> Result<Session> {
        self.store
            .mutate(|state, events| {
                let session = active_open_session(state)?;
                session.goal = None;
                session.goal_set_at = None;
                session.goal_completed_at = None;
                session.goal_progress = None;
                events.push(StateEvent::GoalCleared {
                    session_id: session.id.clone(),
                });
                Ok(session.clone())
            })
            .await
    }

    /// Merge whitelisted fields. Closed sessions only accept display hints.
    pub async fn update_session(&self, id: &str, update: SessionUpdate) -> Result<Session> {
        self.store
            .mutate(|state, events| {
                let session = state
                    .find_session_mut(id)
                    .ok_or_else(|| Error::not_found("session", id))?;
                if !session.is_active && session.ended_at.is_some() && !update.is_display_only() {
                    return Err(Error::InvalidInput(format!("session {} is closed", id)));
                }

                if let Some(name) = update.custom_name {
                    let name = name.trim().to_string();
                    session.custom_name = (!name.is_empty()).then_some(name);
                }
                if let Some(goal) = update.goal {
                    session.goal = Some(goal);
                    session.goal_set_at.get_or_insert_with(Utc::now);
                }
                if let Some(progress) = update.goal_progress {
                    session.goal_progress = Some(progress.min(100));
                }
                if let Some(unread) = update.has_unread_activity {
                    session.has_unread_activity = unread;
                }
                events.push(StateEvent::SessionUpdated {
                    session_id: session.id.clone(),
                });
                Ok(session.clone())
            })
            .await
    }

    pub async fn mark_read(&self, id: &str) -> Result<Session> {
        self.update_session(
            id,
            SessionUpdate {
                has_unread_activity: Some(false),
                ..Default::default()
            },
        )
        .await
    }

    /// Close the active session.
    pub async fn end_session(&self) -> Result<Session> {
        self.store
            .mutate(|state, events| {
                let session = state.active_session_mut().ok_or(Error::NoActiveSession)?;
                session.is_active = false;
                session.ended_at = Some(Utc::now().max(session.last_activity_time));
                let session = session.clone();
                state.active_session_id = None;
                events.push(StateEvent::SessionEnded {
                    session_id: session.id.clone(),
                });
                Ok(session)
            })
            .await
    }

    /// Remove a session. Returns false when it did not exist.
    pub async fn delete_session(&self, id: &str) -> Result<bool> {
        self.store
            .mutate(|state, events| {
                let Some(project) = state
                    .projects
                    .iter_mut()
                    .find(|p| p.sessions.iter().any(|s| s.id == id))
                else {
                    return Ok(false);
                };

                let Some(idx) = project.sessions.iter().position(|s| s.id == id) else {
                    return Ok(false);
                };
                let removed = project.sessions.remove(idx);
                project.total_sessions = project.total_sessions.saturating_sub(1);
                project.total_prompts = project.total_prompts.saturating_sub(removed.prompt_count);
                project.recompute_last_activity();
                let project_id = project.id.clone();
                let replacement = project.sessions.first().map(|s| s.id.clone());

                if state.active_session_id.as_deref() == Some(id) {
                    state.active_project_id = replacement.as_ref().map(|_| project_id.clone());
                    state.active_session_id = replacement;
                }
                events.push(StateEvent::SessionDeleted {
                    session_id: removed.id,
                    project_id,
                });
                Ok(true)
            })
            .await
    }
}

fn active_open_session(state: &mut SessionState) -> Result<&mut Session> {
    match state.active_session_mut() {
        Some(session) if session.ended_at.is_none() => Ok(session),
        _ => Err(Error::NoActiveSession),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionConfig;
    use crate::host::memory::MemoryKvStore;
    use crate::persistence::Persistence;
    use crate::session::events::EventBus;
    use crate::types::Project;

    async fn setup() -> (Arc<SessionStore>, SessionLifecycleService) {
        let store = Arc::new(SessionStore::new(
            SessionState::default(),
            Arc::new(Persistence::new(Arc::new(MemoryKvStore::default()))),
            EventBus::default(),
            SessionConfig::default(),
        ));
        store
            .mutate(|state, _| {
                state.projects.push(Project::new("p1", "one", Some("/one".to_string())));
                Ok(())
            })
            .await
            .unwrap();
        let service = SessionLifecycleService::new(store.clone());
        (store, service)
    }

    #[test]
    fn test_still_active_window() {
        let now = Utc::now();
        let mut session = Session::new("s", "p", Platform::Cursor, now - Duration::minutes(200));
        session.last_activity_time = now - Duration::minutes(120);
        assert!(is_session_still_active(&session, 120, now));
        session.last_activity_time = now - Duration::minutes(121);
        assert!(!is_session_still_active(&session, 120, now));
    }

    #[tokio::test]
    async fn test_get_or_create_reuses_live_session() {
        let (store, service) = setup().await;
        let first = service
            .get_or_create_session("p1", Platform::Cursor, None)
            .await
            .unwrap();
        let again = service
            .get_or_create_session("p1", Platform::Cursor, None)
            .await
            .unwrap();
        assert_eq!(first.id, again.id);

        let other = service
            .get_or_create_session("p1", Platform::ClaudeCode, None)
            .await
            .unwrap();
        assert_ne!(first.id, other.id);

        let state = store.snapshot().await;
        assert_eq!(state.project("p1").unwrap().total_sessions, 2);
        assert_eq!(state.active_session_id.as_deref(), Some(other.id.as_str()));
    }

    #[tokio::test]
    async fn test_get_or_create_closes_stale() {
        let (store, service) = setup().await;
        let mut rx = store.events().subscribe();
        store
            .mutate(|state, _| {
                let mut old = Session::new(
                    "old",
                    "p1",
                    Platform::Cursor,
                    Utc::now() - Duration::hours(5),
                );
                old.last_activity_time = Utc::now() - Duration::hours(4);
                state.project_mut("p1").unwrap().sessions.push(old);
                Ok(())
            })
            .await
            .unwrap();

        let fresh = service
            .get_or_create_session("p1", Platform::Cursor, None)
            .await
            .unwrap();
        assert_ne!(fresh.id, "old");

        assert_eq!(
            rx.recv().await.unwrap(),
            StateEvent::SessionEnded {
                session_id: "old".to_string()
            }
        );
        assert!(matches!(
            rx.recv().await.unwrap(),
            StateEvent::SessionCreated { .. }
        ));

        let state = store.snapshot().await;
        let old = state.find_session("old").unwrap();
        assert!(!old.is_active);
        assert_eq!(state.project("p1").unwrap().sessions[0].id, fresh.id);
    }

    #[tokio::test]
    async fn test_source_ids_are_separate_tuples() {
        let (_, service) = setup().await;
        let a = service
            .get_or_create_session("p1", Platform::ClaudeCode, Some("UUID-A"))
            .await
            .unwrap();
        let b = service
            .get_or_create_session("p1", Platform::ClaudeCode, Some("UUID-B"))
            .await
            .unwrap();
        assert_ne!(a.id, b.id);

        let found = service.find_session_by_source_id("UUID-A").await.unwrap();
        assert_eq!(found.id, a.id);
        assert!(service.find_session_by_source_id("missing").await.is_none());
    }

    #[tokio::test]
    async fn test_unknown_project_fails() {
        let (_, service) = setup().await;
        let err = service
            .get_or_create_session("nope", Platform::Cursor, None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound { kind: "project", .. }));
    }

    #[tokio::test]
    async fn test_switch_session() {
        let (store, service) = setup().await;
        let a = service
            .get_or_create_session("p1", Platform::Cursor, None)
            .await
            .unwrap();
        service
            .get_or_create_session("p1", Platform::ClaudeCode, None)
            .await
            .unwrap();
        store
            .mutate(|state, _| {
                state.find_session_mut(&a.id).unwrap().has_unread_activity = true;
                Ok(())
            })
            .await
            .unwrap();

        let switched = service.switch_session(&a.id).await.unwrap().unwrap();
        assert!(!switched.has_unread_activity);
        assert_eq!(
            store.snapshot().await.active_session_id.as_deref(),
            Some(a.id.as_str())
        );

        assert!(service.switch_session("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_goal_transitions() {
        let (_, service) = setup().await;
        assert!(matches!(
            service.set_goal("Ship it").await.unwrap_err(),
            Error::NoActiveSession
        ));

        service
            .get_or_create_session("p1", Platform::Cursor, None)
            .await
            .unwrap();
        assert!(matches!(
            service.complete_goal().await.unwrap_err(),
            Error::InvalidInput(_)
        ));

        let session = service.set_goal("  Ship it ").await.unwrap();
        assert_eq!(session.goal.as_deref(), Some("Ship it"));
        assert!(session.goal_set_at.is_some());

        let session = service.complete_goal().await.unwrap();
        assert!(session.goal_completed_at.is_some());
        assert_eq!(session.goal_progress, Some(100));

        let session = service.clear_goal().await.unwrap();
        assert_eq!(session.goal, None);
        assert_eq!(session.goal_completed_at, None);
    }

    #[tokio::test]
    async fn test_update_session_whitelist() {
        let (_, service) = setup().await;
        let session = service
            .get_or_create_session("p1", Platform::Cursor, None)
            .await
            .unwrap();
        let update: SessionUpdate = serde_json::from_value(serde_json::json!({
            "customName": "Auth refactor",
            "id": "hijack",
            "projectId": "other",
            "prompts": []
        }))
        .unwrap();
        let updated = service.update_session(&session.id, update).await.unwrap();
        assert_eq!(updated.id, session.id);
        assert_eq!(updated.project_id, "p1");
        assert_eq!(updated.custom_name.as_deref(), Some("Auth refactor"));
    }

    #[tokio::test]
    async fn test_closed_session_rejects_content_changes() {
        let (_, service) = setup().await;
        let session = service
            .get_or_create_session("p1", Platform::Cursor, None)
            .await
            .unwrap();
        service.end_session().await.unwrap();

        let err = service
            .update_session(
                &session.id,
                SessionUpdate {
                    goal: Some("late".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));

        let renamed = service
            .update_session(
                &session.id,
                SessionUpdate {
                    custom_name: Some("Renamed".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(renamed.custom_name.as_deref(), Some("Renamed"));
    }

    #[tokio::test]
    async fn test_delete_session_picks_new_active() {
        let (store, service) = setup().await;
        let older = service
            .get_or_create_session("p1", Platform::Cursor, None)
            .await
            .unwrap();
        let newer = service
            .get_or_create_session("p1", Platform::ClaudeCode, None)
            .await
            .unwrap();

        assert!(service.delete_session(&newer.id).await.unwrap());
        let state = store.snapshot().await;
        assert_eq!(state.active_session_id.as_deref(), Some(older.id.as_str()));
        assert_eq!(state.active_project_id.as_deref(), Some("p1"));
        assert_eq!(state.project("p1").unwrap().total_sessions, 1);

        assert!(service.delete_session(&older.id).await.unwrap());
        let state = store.snapshot().await;
        assert_eq!(state.active_session_id, None);
        assert_eq!(state.project("p1").unwrap().total_sessions, 0);
        assert_eq!(state.project("p1").unwrap().last_activity_time, None);

        assert!(!service.delete_session("missing").await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_last_session_clears_active_project() {
        let (store, service) = setup().await;
        let only = service
            .get_or_create_session("p1", Platform::Cursor, None)
            .await
            .unwrap();
        assert_eq!(store.snapshot().await.active_project_id.as_deref(), Some("p1"));

        assert!(service.delete_session(&only.id).await.unwrap());
        let state = store.snapshot().await;
        assert_eq!(state.active_session_id, None);
        assert_eq!(state.active_project_id, None);
        assert!(state.project("p1").is_some());
    }

    #[tokio::test]
    async fn test_delete_never_underflows_counters() {
        let (store, service) = setup().await;
        store
            .mutate(|state, _| {
                let project = state.project_mut("p1").unwrap();
                let mut session = Session::new("s", "p1", Platform::Cursor, Utc::now());
                session.prompt_count = 3;
                project.sessions.push(session);
                project.total_sessions = 0;
                project.total_prompts = 1;
                Ok(())
            })
            .await
            .unwrap();

        service.delete_session("s").await.unwrap();
        let state = store.snapshot().await;
        let project = state.project("p1").unwrap();
        assert_eq!(project.total_sessions, 0);
        assert_eq!(project.total_prompts, 0);
    }
}
