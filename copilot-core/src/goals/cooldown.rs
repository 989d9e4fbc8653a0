//! "Maybe later" / "don't ask" state for automatic goal prompts.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::host::KvStore;

pub const GOAL_PROMPTS_KEY: &str = "copilot.v2.goalPrompts";
pub const MAYBE_LATER_MINUTES: i64 = 30;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CooldownState {
    #[serde(default)]
    maybe_later_until: Option<DateTime<Utc>>,
    #[serde(default)]
    dont_ask_sessions: Vec<String>,
}

pub struct GoalPromptCooldown {
    kv: Arc<dyn KvStore>,
}

impl GoalPromptCooldown {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self { kv }
    }

    async fn load(&self) -> CooldownState {
        match self.kv.get(GOAL_PROMPTS_KEY).await {
            Ok(Some(value)) => serde_json::from_value(value).unwrap_or_default(),
            Ok(None) => CooldownState::default(),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read goal prompt cooldown");
                CooldownState::default()
            }
        }
    }

    async fn save(&self, state: &CooldownState) -> Result<()> {
        self.kv
            .set(GOAL_PROMPTS_KEY, serde_json::to_value(state)?)
            .await
    }

    /// Snooze automatic goal prompts for [`MAYBE_LATER_MINUTES`].
    pub async fn maybe_later(&self, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
        let mut state = self.load().await;
        let until = now + Duration::minutes(MAYBE_LATER_MINUTES);
        state.maybe_later_until = Some(until);
        self.save(&state).await?;
        Ok(until)
    }

    /// Never prompt for this session again.
    pub async fn dont_ask(&self, session_id: &str) -> Result<()> {
        let mut state = self.load().await;
        if !state.dont_ask_sessions.iter().any(|s| s == session_id) {
            state.dont_ask_sessions.push(session_id.to_string());
        }
        self.save(&state).await
    }

    /// Drop the "don't ask" mark of a session that ended or was deleted.
    pub async fn forget(&self, session_id: &str) -> Result<()> {
        let mut state = self.load().await;
        let before = state.dont_ask_sessions.len();
        state.dont_ask_sessions.retain(|s| s != session_id);
        if state.dont_ask_sessions.len() == before {
            return Ok(());
        }
        self.save(&state).await
    }

    pub async fn can_prompt(&self, session_id: &str, now: DateTime<Utc>) -> bool {
        let state = self.load().await;
        if state.dont_ask_sessions.iter().any(|s| s == session_id) {
            return false;
        }
        state.maybe_later_until.map_or(true, |until| now >= until)
    }
}
