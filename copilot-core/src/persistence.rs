//! Session-state persistence
//!
//! State lives in two kv-store slots: `copilot.v2.sessionState` and
//! `copilot.v2.sidebarWidth`. Loading never fails: unreadable state becomes
//! an empty model, and unreadable entries are skipped one level at a time
//! (project, then session, then prompt/response). Saves are best-effort.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::error::Result;
use crate::host::KvStore;
use crate::types::{DetectionConfig, Project, Prompt, Response, Session, SessionState};

pub const SESSION_STATE_KEY: &str = "copilot.v2.sessionState";
pub const SIDEBAR_WIDTH_KEY: &str = "copilot.v2.sidebarWidth";
pub const DEFAULT_SIDEBAR_WIDTH: u32 = 240;

/// Pre-v2 keys, removed by "clear local data".
pub const LEGACY_KEYS: [&str; 3] = ["copilot.sessions", "copilot.settings", "copilot.lastCleanup"];

/// Lower-case, forward slashes, no trailing slash.
pub fn normalize_path(path: &str) -> String {
    let normalized = path.replace('\\', "/").to_lowercase();
    let trimmed = normalized.trim_end_matches('/');
    if trimmed.is_empty() && !normalized.is_empty() {
        "/".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Stable project id: a function of the normalized path only.
pub fn project_id_for_path(path: &str) -> String {
    let digest = Sha256::digest(normalize_path(path).as_bytes());
    format!("proj_{}", &hex::encode(digest)[..16])
}

pub struct Persistence {
    kv: Arc<dyn KvStore>,
}

impl Persistence {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self { kv }
    }

    /// Load and deduplicate the stored state. Never fails.
    pub async fn load(&self) -> SessionState {
        match self.kv.get(SESSION_STATE_KEY).await {
            Ok(Some(value)) => {
                let mut state = deserialize_state(value);
                let merged = dedupe_projects(&mut state.projects);
                if merged > 0 {
                    tracing::info!(merged, "Merged duplicate projects on load");
                }
                state
            }
            Ok(None) => SessionState::default(),
            Err(e) => {
                tracing::error!(error = %e, "Failed to read session state, starting empty");
                SessionState::default()
            }
        }
    }

    /// Write the state; failures are logged and swallowed.
    pub async fn save(&self, state: &SessionState) {
        if let Err(e) = self.try_save(state).await {
            tracing::error!(error = %e, "Failed to persist session state");
        }
    }

    pub async fn try_save(&self, state: &SessionState) -> Result<()> {
        let value = serde_json::to_value(state)?;
        self.kv.set(SESSION_STATE_KEY, value).await
    }

    pub async fn sidebar_width(&self) -> u32 {
        match self.kv.get(SIDEBAR_WIDTH_KEY).await {
            Ok(Some(value)) => value
                .as_u64()
                .and_then(|w| u32::try_from(w).ok())
                .unwrap_or(DEFAULT_SIDEBAR_WIDTH),
            Ok(None) => DEFAULT_SIDEBAR_WIDTH,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read sidebar width");
                DEFAULT_SIDEBAR_WIDTH
            }
        }
    }

    pub async fn save_sidebar_width(&self, width: u32) {
        if let Err(e) = self.kv.set(SIDEBAR_WIDTH_KEY, Value::from(width)).await {
            tracing::error!(error = %e, "Failed to persist sidebar width");
        }
    }

    /// Remove session state, sidebar width and every legacy key.
    pub async fn clear_all(&self) -> Result<()> {
        self.kv.delete(SESSION_STATE_KEY).await?;
        self.kv.delete(SIDEBAR_WIDTH_KEY).await?;
        for key in LEGACY_KEYS {
            self.kv.delete(key).await?;
        }
        Ok(())
    }
}

// ============================================
// Lenient deserialization
// ============================================

fn parse_or_skip<T: DeserializeOwned>(value: Value, what: &str) -> Option<T> {
    match serde_json::from_value(value) {
        Ok(v) => Some(v),
        Err(e) => {
            tracing::warn!(error = %e, "Skipping unreadable {}", what);
            None
        }
    }
}

/// Rebuild state from a stored value, dropping what cannot be read.
pub fn deserialize_state(value: Value) -> SessionState {
    let Value::Object(mut root) = value else {
        tracing::warn!("Stored session state is not an object, starting empty");
        return SessionState::default();
    };

    let projects = match root.remove("projects") {
        Some(Value::Array(items)) => items.into_iter().filter_map(deserialize_project).collect(),
        _ => Vec::new(),
    };

    let string_field = |root: &Map<String, Value>, key: &str| {
        root.get(key).and_then(|v| v.as_str()).map(str::to_string)
    };

    SessionState {
        projects,
        active_session_id: string_field(&root, "activeSessionId"),
        active_project_id: string_field(&root, "activeProjectId"),
        config: root
            .remove("config")
            .and_then(|c| parse_or_skip::<DetectionConfig>(c, "detection config"))
            .unwrap_or_default(),
        last_updated: root
            .get("lastUpdated")
            .and_then(|v| v.as_str())
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|d| d.with_timezone(&Utc))
            .unwrap_or_else(Utc::now),
    }
}

fn deserialize_project(value: Value) -> Option<Project> {
    let Value::Object(mut object) = value else {
        return None;
    };
    let sessions = take_array(&mut object, "sessions");
    let mut project: Project = parse_or_skip(Value::Object(object), "project")?;
    project.sessions = sessions
        .into_iter()
        .filter_map(deserialize_session)
        .collect();
    Some(project)
}

fn deserialize_session(value: Value) -> Option<Session> {
    let Value::Object(mut object) = value else {
        return None;
    };
    let prompts = take_array(&mut object, "prompts");
    let responses = take_array(&mut object, "responses");
    let mut session: Session = parse_or_skip(Value::Object(object), "session")?;
    session.prompts = prompts
        .into_iter()
        .filter_map(|p| parse_or_skip::<Prompt>(p, "prompt"))
        .collect();
    session.responses = responses
        .into_iter()
        .filter_map(|r| parse_or_skip::<Response>(r, "response"))
        .collect();
    session.prompt_count = session.prompts.len();
    Some(session)
}

fn take_array(object: &mut Map<String, Value>, key: &str) -> Vec<Value> {
    match object.remove(key) {
        Some(Value::Array(items)) => items,
        _ => Vec::new(),
    }
}

// ============================================
// Deduplication
// ============================================

/// Merge projects whose paths normalize equally. Returns how many were merged.
///
/// The first-seen project survives; the loser's sessions are appended with
/// their `projectId` rewritten, counters are summed and `lastActivityTime`
/// becomes the max. Projects without a path are never merged.
pub fn dedupe_projects(projects: &mut Vec<Project>) -> usize {
    let mut survivors: Vec<Project> = Vec::with_capacity(projects.len());
    let mut merged = 0;

    for mut project in projects.drain(..) {
        let key = project.path.as_deref().map(normalize_path);
        let existing = key.as_ref().and_then(|key| {
            survivors
                .iter()
                .position(|s| s.path.as_deref().map(normalize_path).as_ref() == Some(key))
        });

        match existing {
            Some(idx) => {
                let survivor = &mut survivors[idx];
                for session in project.sessions.iter_mut() {
                    session.project_id = survivor.id.clone();
                }
                survivor.sessions.append(&mut project.sessions);
                survivor.total_sessions += project.total_sessions;
                survivor.total_prompts += project.total_prompts;
                survivor.last_activity_time = survivor
                    .last_activity_time
                    .max(project.last_activity_time);
                merged += 1;
            }
            None => survivors.push(project),
        }
    }

    *projects = survivors;
    merged
}
