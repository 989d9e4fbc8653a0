//! Process-wide session state
//!
//! Mutations run under the write lock as straight-line code; the lock is
//! released before events are emitted and before the persist await starts.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;

use super::events::{EventBus, StateEvent};
use crate::config::SessionConfig;
use crate::error::Result;
use crate::persistence::Persistence;
use crate::types::SessionState;

pub struct SessionStore {
    state: RwLock<SessionState>,
    persistence: Arc<Persistence>,
    events: EventBus,
    limits: SessionConfig,
}

impl SessionStore {
    pub fn new(
        mut state: SessionState,
        persistence: Arc<Persistence>,
        events: EventBus,
        limits: SessionConfig,
    ) -> Self {
        state.config.max_inactivity_minutes = limits.max_inactivity_minutes;
        Self {
            state: RwLock::new(state),
            persistence,
            events,
            limits,
        }
    }

    /// Load persisted state.
    pub async fn load(persistence: Arc<Persistence>, events: EventBus, limits: SessionConfig) -> Self {
        let state = persistence.load().await;
        tracing::info!(
            projects = state.projects.len(),
            sessions = state.sessions().count(),
            "Session state loaded"
        );
        Self::new(state, persistence, events, limits)
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn limits(&self) -> &SessionConfig {
        &self.limits
    }

    pub async fn snapshot(&self) -> SessionState {
        self.state.read().await.clone()
    }

    pub async fn read<T>(&self, f: impl FnOnce(&SessionState) -> T) -> T {
        let state = self.state.read().await;
        f(&state)
    }

    /// Apply a mutation, then emit its events and persist.
    ///
    /// Nothing is emitted or persisted when `f` returns an error.
    pub async fn mutate<T>(
        &self,
        f: impl FnOnce(&mut SessionState, &mut Vec<StateEvent>) -> Result<T>,
    ) -> Result<T> {
        let mut events = Vec::new();
        let (result, snapshot) = {
            let mut state = self.state.write().await;
            let result = f(&mut state, &mut events)?;
            state.last_updated = Utc::now();
            (result, state.clone())
        };

        for event in events {
            self.events.emit(event);
        }
        self.persistence.save(&snapshot).await;
        Ok(result)
    }

    /// Replace everything with an empty model.
    pub async fn reset(&self) {
        self.mutate(|state, events| {
            let config = state.config.clone();
            *state = SessionState {
                config,
                ..SessionState::default()
            };
            events.push(StateEvent::StateCleared);
            Ok(())
        })
        .await
        .ok();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::host::memory::MemoryKvStore;
    use crate::host::KvStore;
    use crate::persistence::SESSION_STATE_KEY;
    use crate::types::Project;

    #[tokio::test]
    async fn test_mutate_persists_and_emits() {
        let kv = Arc::new(MemoryKvStore::default());
        let store = SessionStore::new(
            SessionState::default(),
            Arc::new(Persistence::new(kv.clone())),
            EventBus::default(),
            SessionConfig::default(),
        );
        let mut rx = store.events().subscribe();

        store
            .mutate(|state, events| {
                state.projects.push(Project::new("p1", "one", None));
                events.push(StateEvent::ProjectCreated {
                    project_id: "p1".to_string(),
                });
                Ok(())
            })
            .await
            .unwrap();

        assert!(matches!(
            rx.recv().await.unwrap(),
            StateEvent::ProjectCreated { .. }
        ));
        let stored = kv.get(SESSION_STATE_KEY).await.unwrap().unwrap();
        assert_eq!(stored["projects"][0]["id"], "p1");
    }

    #[tokio::test]
    async fn test_failed_mutation_not_persisted() {
        let kv = Arc::new(MemoryKvStore::default());
        let store = SessionStore::new(
            SessionState::default(),
            Arc::new(Persistence::new(kv.clone())),
            EventBus::default(),
            SessionConfig::default(),
        );
        let result: Result<()> = store
            .mutate(|_, _| Err(Error::NoActiveSession))
            .await;
        assert!(result.is_err());
        assert_eq!(kv.get(SESSION_STATE_KEY).await.unwrap(), None);
    }
}
