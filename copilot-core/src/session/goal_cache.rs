//! Goal-progress cache shared across session sources
//!
//! Entries are keyed by session id, by `metadata.sourceSessionId`, and by
//! the trailing segment of the url-decoded session id, so progress cached
//! under one representation is found again under another.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::lock::lock;
use crate::types::Session;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GoalProgressEntry {
    pub progress: Option<u8>,
    pub goal: Option<String>,
    pub custom_name: Option<String>,
}

#[derive(Default)]
pub struct GoalProgressCache {
    entries: Mutex<HashMap<String, GoalProgressEntry>>,
}

/// Last path component of the decoded id, when the id has more than one.
pub fn trailing_segment(id: &str) -> Option<String> {
    let decoded = urlencoding::decode(id)
        .map(|d| d.into_owned())
        .unwrap_or_else(|_| id.to_string());
    let segment = decoded.trim_end_matches('/').rsplit('/').next()?;
    (!segment.is_empty() && segment != id).then(|| segment.to_string())
}

fn keys_for(session: &Session) -> Vec<String> {
    let mut keys = vec![session.id.clone()];
    if let Some(src) = session.source_session_id() {
        keys.push(src.to_string());
    }
    if let Some(segment) = trailing_segment(&session.id) {
        keys.push(segment);
    }
    keys.dedup();
    keys
}

impl GoalProgressCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remember whatever progress-related fields the session carries.
    pub fn record(&self, session: &Session) {
        if session.goal_progress.is_none() {
            return;
        }
        let entry = GoalProgressEntry {
            progress: session.goal_progress,
            goal: session.goal.clone(),
            custom_name: session.custom_name.clone(),
        };
        self.insert(keys_for(session), entry);
    }

    /// Store a fresh analysis result for a session.
    pub fn record_progress(&self, session: &Session, progress: u8, goal: Option<String>, custom_name: Option<String>) {
        let entry = GoalProgressEntry {
            progress: Some(progress),
            goal: goal.or_else(|| session.goal.clone()),
            custom_name: custom_name.or_else(|| session.custom_name.clone()),
        };
        self.insert(keys_for(session), entry);
    }

    fn insert(&self, keys: Vec<String>, entry: GoalProgressEntry) {
        let mut entries = lock(&self.entries, "goal progress cache");
        for key in keys {
            entries.insert(key, entry.clone());
        }
    }

    pub fn lookup(&self, session: &Session) -> Option<GoalProgressEntry> {
        let keys = keys_for(session);
        let entries = lock(&self.entries, "goal progress cache");
        let found = keys.iter().find_map(|key| entries.get(key).cloned());
        found
    }

    /// Merge the cached entry onto a session view.
    ///
    /// Cached progress always wins; goal and custom name only fill gaps.
    pub fn apply(&self, session: &mut Session) {
        let Some(entry) = self.lookup(session) else {
            return;
        };
        if entry.progress.is_some() {
            session.goal_progress = entry.progress;
        }
        if session.goal.is_none() {
            session.goal = entry.goal;
        }
        if session.custom_name.is_none() {
            session.custom_name = entry.custom_name;
        }
    }

    /// Drop the entry stored under this session id only.
    pub fn remove(&self, session_id: &str) {
        lock(&self.entries, "goal progress cache").remove(session_id);
    }

    pub fn clear(&self) {
        lock(&self.entries, "goal progress cache").clear();
    }

    pub fn len(&self) -> usize {
        lock(&self.entries, "goal progress cache").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Platform;
    use chrono::Utc;

    fn session(id: &str) -> Session {
        Session::new(id, "p1", Platform::ClaudeCode, Utc::now())
    }

    #[test]
    fn test_trailing_segment() {
        assert_eq!(
            trailing_segment("claude-encoded/path/UUID-A").as_deref(),
            Some("UUID-A")
        );
        assert_eq!(
            trailing_segment("claude%2Fpath%2FUUID-B").as_deref(),
            Some("UUID-B")
        );
        assert_eq!(trailing_segment("hook-1"), None);
    }

    #[test]
    fn test_cross_source_apply() {
        let cache = GoalProgressCache::new();
        let mut hook = session("hook-1");
        hook.goal_progress = Some(80);
        hook.goal = Some("Refactor".to_string());
        hook.metadata.source_session_id = Some("UUID-A".to_string());
        cache.record(&hook);

        let mut other = session("claude-encoded/path/UUID-A");
        cache.apply(&mut other);
        assert_eq!(other.goal_progress, Some(80));
        assert_eq!(other.goal.as_deref(), Some("Refactor"));
    }

    #[test]
    fn test_poisoned_cache_keeps_recording() {
        let cache = std::sync::Arc::new(GoalProgressCache::new());
        let held = cache.clone();
        let _ = std::thread::spawn(move || {
            let _guard = held.entries.lock().unwrap();
            panic!("writer panicked");
        })
        .join();

        let s = session("s1");
        cache.record_progress(&s, 40, None, None);
        assert_eq!(cache.lookup(&s).unwrap().progress, Some(40));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_progress_wins_goal_fills_only() {
        let cache = GoalProgressCache::new();
        let mut cached = session("s1");
        cached.goal_progress = Some(40);
        cached.goal = Some("Old goal".to_string());
        cached.custom_name = Some("Cached name".to_string());
        cache.record(&cached);

        let mut current = session("s1");
        current.goal_progress = Some(10);
        current.goal = Some("New goal".to_string());
        cache.apply(&mut current);
        assert_eq!(current.goal_progress, Some(40));
        assert_eq!(current.goal.as_deref(), Some("New goal"));
        assert_eq!(current.custom_name.as_deref(), Some("Cached name"));
    }

    #[test]
    fn test_sessions_without_progress_not_recorded() {
        let cache = GoalProgressCache::new();
        cache.record(&session("s1"));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_remove_only_own_key() {
        let cache = GoalProgressCache::new();
        let mut s = session("s1");
        s.metadata.source_session_id = Some("UUID-X".to_string());
        cache.record_progress(&s, 55, None, None);
        assert_eq!(cache.len(), 2);

        cache.remove("s1");
        assert_eq!(cache.len(), 1);
        let mut relinked = session("other/UUID-X");
        cache.apply(&mut relinked);
        assert_eq!(relinked.goal_progress, Some(55));
    }
}
