//! Background goal work triggered by prompt inserts.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::Utc;

use super::analyzer::{build_prompt, prompt_fingerprint, sample_interactions, GoalProgressAnalyzer};
use super::cooldown::GoalPromptCooldown;
use super::inference::GoalInferenceService;
use crate::error::{Error, Result};
use crate::lock::lock;
use crate::session::{GoalProgressCache, GoalProgressTrigger, SessionStore, StateEvent};
use crate::types::{GoalInference, GoalProgress, Session};

/// Runs goal inference and progress analysis off the caller's path.
///
/// Cheap to clone; clones share every service.
#[derive(Clone)]
pub struct GoalCoordinator {
    store: Arc<SessionStore>,
    cache: Arc<GoalProgressCache>,
    analyzer: Arc<GoalProgressAnalyzer>,
    inference: Arc<GoalInferenceService>,
    cooldown: Arc<GoalPromptCooldown>,
    fingerprints: Arc<Mutex<HashMap<String, String>>>,
}

impl GoalCoordinator {
    pub fn new(
        store: Arc<SessionStore>,
        cache: Arc<GoalProgressCache>,
        analyzer: Arc<GoalProgressAnalyzer>,
        inference: Arc<GoalInferenceService>,
        cooldown: Arc<GoalPromptCooldown>,
    ) -> Self {
        Self {
            store,
            cache,
            analyzer,
            inference,
            cooldown,
            fingerprints: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn inference(&self) -> &GoalInferenceService {
        &self.inference
    }

    pub fn cooldown(&self) -> &GoalPromptCooldown {
        &self.cooldown
    }

    async fn on_prompt(&self, session: Session) {
        if session.prompt_count == 1 && session.goal.is_none() {
            if let Err(e) = self.auto_infer(&session).await {
                tracing::debug!(session_id = %session.id, error = %e, "Automatic goal inference skipped");
            }
        }

        if !self.analyzer.is_available().await {
            return;
        }
        // Skip when the sampled history has not changed since the last run.
        let fingerprint = prompt_fingerprint(&build_prompt(&session, &sample_interactions(&session)));
        let unchanged = lock(&self.fingerprints, "progress fingerprints").get(&session.id) == Some(&fingerprint);
        if unchanged {
            return;
        }

        // A failed run leaves the last known progress in place and is retried on the next prompt.
        let progress = match self.analyzer.analyze(&session).await {
            Ok(progress) => progress,
            Err(e) => {
                tracing::warn!(session_id = %session.id, error = %e, "Goal progress analysis failed");
                return;
            }
        };
        lock(&self.fingerprints, "progress fingerprints").insert(session.id.clone(), fingerprint);
        if let Err(e) = self.apply_progress(&session.id, progress).await {
            tracing::warn!(session_id = %session.id, error = %e, "Failed to record goal progress");
        }
    }

    async fn auto_infer(&self, session: &Session) -> Result<()> {
        if !self.cooldown.can_prompt(&session.id, Utc::now()).await {
            return Ok(());
        }
        if !self.inference.is_available().await {
            return Ok(());
        }
        if let Some(inference) = self.inference.infer_for_session(session).await? {
            self.publish_inference(&session.id, inference);
        }
        Ok(())
    }

    fn publish_inference(&self, session_id: &str, inference: GoalInference) {
        tracing::info!(session_id, goal = %inference.suggested_goal, "Goal inferred");
        self.store.events().emit(StateEvent::GoalInferred {
            session_id: session_id.to_string(),
            inference,
        });
    }

    /// Store progress on the session and in the cache, then announce it.
    async fn apply_progress(&self, session_id: &str, progress: GoalProgress) -> Result<GoalProgress> {
        let cache = self.cache.clone();
        self.store
            .mutate(|state, events| {
                let session = state
                    .find_session_mut(session_id)
                    .ok_or_else(|| Error::not_found("session", session_id))?;
                session.goal_progress = Some(progress.progress);
                let title = (!progress.session_title.is_empty()).then(|| progress.session_title.clone());
                cache.record_progress(session, progress.progress, progress.inferred_goal.clone(), title);
                events.push(StateEvent::GoalProgressAnalyzed {
                    session_id: session.id.clone(),
                    analysis: progress.clone(),
                });
                Ok(progress)
            })
            .await
    }

    /// Analyze a session now (active session when `session_id` is `None`).
    ///
    /// A failed analysis answers "unable to analyze" and leaves stored progress alone.
    pub async fn analyze_now(&self, session_id: Option<&str>) -> Result<GoalProgress> {
        let session = self
            .store
            .read(|state| match session_id {
                Some(id) => state.find_session(id).cloned(),
                None => state.active_session().cloned(),
            })
            .await
            .ok_or(Error::NoActiveSession)?;
        match self.analyzer.analyze(&session).await {
            Ok(progress) => self.apply_progress(&session.id, progress).await,
            Err(e) => {
                tracing::warn!(session_id = %session.id, error = %e, "Goal progress analysis failed");
                Ok(GoalProgress::unable_to_analyze())
            }
        }
    }

    /// Infer a goal for the active session on request; ignores cooldowns.
    pub async fn infer_now(&self) -> Result<Option<GoalInference>> {
        let session = self
            .store
            .read(|state| state.active_session().cloned())
            .await
            .ok_or(Error::NoActiveSession)?;
        if !self.inference.is_available().await {
            return Err(Error::Unavailable("LLM provider"));
        }
        let inference = self.inference.infer_for_session(&session).await?;
        if let Some(inference) = &inference {
            self.publish_inference(&session.id, inference.clone());
        }
        Ok(inference)
    }

    /// Drop per-session state once a session has ended. Cached progress stays for the list view.
    pub async fn session_closed(&self, session_id: &str) {
        lock(&self.fingerprints, "progress fingerprints").remove(session_id);
        if let Err(e) = self.cooldown.forget(session_id).await {
            tracing::warn!(session_id, error = %e, "Failed to prune goal prompt cooldown");
        }
    }

    /// Drop everything held for a deleted session.
    pub async fn forget(&self, session_id: &str) {
        self.cache.remove(session_id);
        self.session_closed(session_id).await;
    }
}

impl GoalProgressTrigger for GoalCoordinator {
    fn prompt_added(&self, session: Session) {
        let this = self.clone();
        tokio::spawn(async move {
            this.on_prompt(session).await;
        });
    }
}
