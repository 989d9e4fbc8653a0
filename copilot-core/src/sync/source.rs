//! Where sync reads sessions from, and how they are scrubbed before upload.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;

use super::api::{SanitizedPrompt, SanitizedResponse, SanitizedSession, SessionIndexEntry};
use crate::error::Result;
use crate::session::SessionStore;
use crate::types::Session;

/// A full local session together with its project's display name.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionRecord {
    pub project_name: String,
    pub session: Session,
}

#[async_trait]
pub trait SessionSource: Send + Sync {
    /// Cheap listing without prompt or response bodies.
    async fn index(&self) -> Result<Vec<SessionIndexEntry>>;

    /// Full bodies for `ids`; unknown ids are skipped.
    async fn fetch(&self, ids: &[String]) -> Result<Vec<SessionRecord>>;
}

pub trait Sanitizer: Send + Sync {
    fn sanitize(&self, record: &SessionRecord) -> SanitizedSession;
}

/// Reads from the in-process session model.
pub struct StoreSessionSource {
    store: Arc<SessionStore>,
}

impl StoreSessionSource {
    pub fn new(store: Arc<SessionStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl SessionSource for StoreSessionSource {
    async fn index(&self) -> Result<Vec<SessionIndexEntry>> {
        Ok(self
            .store
            .read(|state| {
                state
                    .projects
                    .iter()
                    .flat_map(|project| {
                        project.sessions.iter().map(move |s| SessionIndexEntry {
                            id: s.id.clone(),
                            source: s.platform,
                            project_name: project.name.clone(),
                            start_time: s.start_time,
                            last_activity_time: s.ended_at.unwrap_or(s.last_activity_time),
                            prompt_count: s.prompt_count,
                        })
                    })
                    .collect()
            })
            .await)
    }

    async fn fetch(&self, ids: &[String]) -> Result<Vec<SessionRecord>> {
        let wanted: HashSet<&str> = ids.iter().map(String::as_str).collect();
        Ok(self
            .store
            .read(|state| {
                state
                    .projects
                    .iter()
                    .flat_map(|project| {
                        project
                            .sessions
                            .iter()
                            .filter(|s| wanted.contains(s.id.as_str()))
                            .map(move |s| SessionRecord {
                                project_name: project.name.clone(),
                                session: s.clone(),
                            })
                    })
                    .collect()
            })
            .await)
    }
}

const SECRET_PREFIXES: [&str; 7] = ["sk-", "sk_live_", "ghp_", "gho_", "github_pat_", "xox", "AKIA"];
const REDACTED: &str = "[REDACTED]";

fn is_secret_like(word: &str) -> bool {
    let word = word.trim_matches(|c: char| !c.is_alphanumeric() && c != '-' && c != '_');
    if SECRET_PREFIXES.iter().any(|p| word.starts_with(p) && word.len() >= p.len() + 8) {
        return true;
    }
    // email address
    match word.split_once('@') {
        Some((user, domain)) => !user.is_empty() && domain.contains('.') && !domain.ends_with('.'),
        None => false,
    }
}

/// Replace credential-looking tokens and email addresses.
pub fn redact(text: &str) -> String {
    text.split_inclusive(char::is_whitespace)
        .map(|chunk| {
            let word = chunk.trim_end();
            if is_secret_like(word) {
                format!("{}{}", REDACTED, &chunk[word.len()..])
            } else {
                chunk.to_string()
            }
        })
        .collect()
}

/// Keep only the file name of absolute paths.
fn relative_path(path: &str) -> String {
    let absolute = path.starts_with('/') || path.chars().nth(1) == Some(':');
    if absolute {
        path.rsplit(['/', '\\']).next().unwrap_or(path).to_string()
    } else {
        path.to_string()
    }
}

/// Redacts secrets and emails in text and strips absolute paths.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultSanitizer;

impl Sanitizer for DefaultSanitizer {
    fn sanitize(&self, record: &SessionRecord) -> SanitizedSession {
        let s = &record.session;
        SanitizedSession {
            id: s.id.clone(),
            source: s.platform,
            project_name: record.project_name.clone(),
            start_time: s.start_time,
            end_time: s.ended_at.unwrap_or(s.last_activity_time),
            goal: s.goal.as_deref().map(redact),
            average_score: s.average_score,
            prompts: s
                .prompts
                .iter()
                .map(|p| SanitizedPrompt {
                    timestamp: p.timestamp,
                    text: redact(&p.text),
                    score: p.score,
                })
                .collect(),
            responses: s
                .responses
                .iter()
                .map(|r| SanitizedResponse {
                    timestamp: r.timestamp,
                    text: redact(&r.text),
                    outcome: r.outcome,
                    files_modified: r.files_modified.iter().map(|f| relative_path(f)).collect(),
                    tool_calls: r.tool_calls.clone(),
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::*;
    use crate::config::SessionConfig;
    use crate::host::memory::MemoryKvStore;
    use crate::persistence::Persistence;
    use crate::session::EventBus;
    use crate::types::{Outcome, Platform, Project, Response, SessionState};

    #[test]
    fn test_redact() {
        assert_eq!(
            redact("use sk-abcdefghijklmnop and mail bob@example.com\nthanks"),
            "use [REDACTED] and mail [REDACTED]\nthanks"
        );
        assert_eq!(redact("keep sk-short and @handle"), "keep sk-short and @handle");
    }

    #[test]
    fn test_relative_path() {
        assert_eq!(relative_path("/home/me/src/app.rs"), "app.rs");
        assert_eq!(relative_path("C:\\work\\main.ts"), "main.ts");
        assert_eq!(relative_path("src/lib.rs"), "src/lib.rs");
    }

    #[tokio::test]
    async fn test_store_source_index_and_fetch() {
        let now = Utc::now();
        let mut session = Session::new("s1", "p1", Platform::ClaudeCode, now - Duration::minutes(10));
        session.last_activity_time = now;
        session.responses.push(Response {
            id: "r1".to_string(),
            prompt_id: String::new(),
            timestamp: now,
            text: "done".to_string(),
            outcome: Outcome::Success,
            files_modified: vec!["/abs/path/main.rs".to_string()],
            tool_calls: vec!["Edit".to_string()],
            source: "hook".to_string(),
        });
        let mut project = Project::new("p1", "acme/api", None);
        project.sessions.push(session);
        let store = Arc::new(SessionStore::new(
            SessionState {
                projects: vec![project],
                ..Default::default()
            },
            Arc::new(Persistence::new(Arc::new(MemoryKvStore::default()))),
            EventBus::default(),
            SessionConfig::default(),
        ));

        let source = StoreSessionSource::new(store);
        let index = source.index().await.unwrap();
        assert_eq!(index.len(), 1);
        assert_eq!(index[0].duration_secs(), 600);
        assert_eq!(index[0].project_name, "acme/api");

        let records = source
            .fetch(&["s1".to_string(), "missing".to_string()])
            .await
            .unwrap();
        assert_eq!(records.len(), 1);
        let sanitized = DefaultSanitizer.sanitize(&records[0]);
        assert_eq!(sanitized.responses[0].files_modified, vec!["main.rs"]);
        assert_eq!(sanitized.source, Platform::ClaudeCode);
    }
}
