//! Typed state events
//!
//! Every mutating session-model operation emits one of these on the
//! [`EventBus`]. Subscribers see events in emission order.

use serde::Serialize;
use tokio::sync::broadcast;

use crate::types::{GoalInference, GoalProgress};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum StateEvent {
    ProjectCreated {
        project_id: String,
    },
    SessionCreated {
        session_id: String,
        project_id: String,
    },
    SessionEnded {
        session_id: String,
    },
    SessionUpdated {
        session_id: String,
    },
    SessionDeleted {
        session_id: String,
        project_id: String,
    },
    SessionSwitched {
        session_id: String,
    },
    PromptAdded {
        session_id: String,
        prompt_id: String,
    },
    PromptUpdated {
        session_id: String,
        prompt_id: String,
    },
    ResponseAdded {
        session_id: String,
        response_id: String,
    },
    GoalSet {
        session_id: String,
        goal: String,
    },
    GoalCompleted {
        session_id: String,
    },
    GoalCleared {
        session_id: String,
    },
    GoalProgressAnalyzed {
        session_id: String,
        analysis: GoalProgress,
    },
    GoalInferred {
        session_id: String,
        inference: GoalInference,
    },
    StateCleared,
}

impl StateEvent {
    /// Events that change how many sessions exist locally.
    pub fn changes_session_count(&self) -> bool {
        matches!(
            self,
            StateEvent::SessionCreated { .. }
                | StateEvent::SessionDeleted { .. }
                | StateEvent::SessionEnded { .. }
                | StateEvent::StateCleared
        )
    }
}

/// In-process broadcast of [`StateEvent`]s.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<StateEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn emit(&self, event: StateEvent) {
        tracing::trace!(?event, "state event");
        // No subscribers is fine.
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StateEvent> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_wire_shape() {
        let event = StateEvent::PromptAdded {
            session_id: "s1".to_string(),
            prompt_id: "p1".to_string(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "prompt_added");
        assert_eq!(json["sessionId"], "s1");
        assert_eq!(json["promptId"], "p1");
    }

    #[tokio::test]
    async fn test_bus_preserves_order() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();
        bus.emit(StateEvent::SessionSwitched {
            session_id: "a".to_string(),
        });
        bus.emit(StateEvent::StateCleared);
        assert!(matches!(rx.recv().await.unwrap(), StateEvent::SessionSwitched { .. }));
        assert_eq!(rx.recv().await.unwrap(), StateEvent::StateCleared);
    }
}
