//! Activity summaries
//!
//! Collects the sessions and prompts inside a [`SummaryWindow`], then asks
//! the summaries model for a narrative. Without a provider, or when the
//! provider fails, the structured summary is returned with a templated
//! narrative instead.

pub mod period;

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{is_file_lock_message, Error, Result};
use crate::format::truncate_display;
use crate::llm::{CompletionRequest, Feature, LlmManager};
use crate::session::SessionStore;
use crate::types::SessionState;

pub use period::{SummaryKind, SummaryWindow};

const MAX_PROMPTS_IN_REQUEST: usize = 40;
const PROMPT_EXCERPT_CHARS: usize = 120;
const MAX_HIGHLIGHTS: usize = 5;
const SYSTEM_PROMPT: &str = "You write concise work summaries for a software developer from their AI coding sessions. Use short paragraphs or bullet points, mention projects by name, call out completed goals, and do not invent work that is not in the input.";

/// `loadingProgress` milestones.
pub const PROGRESS_COLLECTING: u8 = 20;
pub const PROGRESS_AGGREGATING: u8 = 40;
pub const PROGRESS_WRITING: u8 = 60;
pub const PROGRESS_FORMATTING: u8 = 80;
pub const PROGRESS_DONE: u8 = 100;

pub type ProgressFn<'a> = &'a (dyn Fn(u8, &str) + Send + Sync);

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryRequest {
    #[serde(default, alias = "type")]
    pub kind: SummaryKind,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectActivity {
    pub name: String,
    pub sessions: usize,
    pub prompts: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryData {
    pub kind: SummaryKind,
    pub period: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub total_sessions: usize,
    pub total_prompts: usize,
    /// Mean prompt score (0-10) inside the window
    pub average_score: f64,
    pub projects: Vec<ProjectActivity>,
    /// Session count per platform
    pub platforms: BTreeMap<String, usize>,
    pub goals_completed: Vec<String>,
    pub highlights: Vec<String>,
    pub narrative: String,
    pub ai_generated: bool,
}

/// Structured, non-LLM summary of the activity inside `window`.
pub fn collect(state: &SessionState, kind: SummaryKind, window: SummaryWindow) -> SummaryData {
    let mut projects = Vec::new();
    let mut platforms: BTreeMap<String, usize> = BTreeMap::new();
    let mut goals_completed = Vec::new();
    let mut scores = Vec::new();
    let mut total_sessions = 0;

    for project in &state.projects {
        let mut activity = ProjectActivity {
            name: project.name.clone(),
            sessions: 0,
            prompts: 0,
        };
        for session in &project.sessions {
            let prompts: Vec<f64> = session
                .prompts
                .iter()
                .filter(|p| window.contains(p.timestamp))
                .map(|p| p.score)
                .collect();
            let completed_here = session.goal_completed_at.map_or(false, |at| window.contains(at));
            if prompts.is_empty() && !window.contains(session.last_activity_time) && !completed_here {
                continue;
            }
            total_sessions += 1;
            activity.sessions += 1;
            activity.prompts += prompts.len();
            *platforms.entry(session.platform.as_str().to_string()).or_default() += 1;
            if completed_here {
                if let Some(goal) = &session.goal {
                    goals_completed.push(goal.clone());
                }
            }
            scores.extend(prompts);
        }
        if activity.sessions > 0 {
            projects.push(activity);
        }
    }
    projects.sort_by(|a, b| b.prompts.cmp(&a.prompts).then_with(|| a.name.cmp(&b.name)));

    let total_prompts = scores.len();
    let average_score = if scores.is_empty() {
        0.0
    } else {
        (scores.iter().sum::<f64>() / total_prompts as f64 * 10.0).round() / 10.0
    };

    let mut data = SummaryData {
        kind,
        period: window.label(kind),
        start: window.start,
        end: window.end,
        total_sessions,
        total_prompts,
        average_score,
        projects,
        platforms,
        goals_completed,
        highlights: Vec::new(),
        narrative: String::new(),
        ai_generated: false,
    };
    data.highlights = highlights(&data);
    data.narrative = fallback_narrative(&data);
    data
}

fn highlights(data: &SummaryData) -> Vec<String> {
    let mut out: Vec<String> = data
        .goals_completed
        .iter()
        .map(|goal| format!("Completed: {}", goal))
        .collect();
    out.extend(
        data.projects
            .iter()
            .map(|p| format!("{}: {} prompts in {} sessions", p.name, p.prompts, p.sessions)),
    );
    out.truncate(MAX_HIGHLIGHTS);
    out
}

/// Templated narrative used when no model is available.
pub fn fallback_narrative(data: &SummaryData) -> String {
    if data.total_sessions == 0 {
        return format!("No AI coding activity recorded for {}.", data.period);
    }
    let mut text = format!(
        "{}: {} {} across {} {}, {} {}",
        data.period,
        data.total_sessions,
        plural(data.total_sessions, "session", "sessions"),
        data.projects.len(),
        plural(data.projects.len(), "project", "projects"),
        data.total_prompts,
        plural(data.total_prompts, "prompt", "prompts"),
    );
    if data.total_prompts > 0 {
        text.push_str(&format!(" (average score {:.1}/10)", data.average_score));
    }
    text.push('.');
    if !data.goals_completed.is_empty() {
        text.push_str(&format!(" Goals completed: {}.", data.goals_completed.join("; ")));
    }
    text
}

fn plural<'a>(n: usize, one: &'a str, many: &'a str) -> &'a str {
    if n == 1 {
        one
    } else {
        many
    }
}

fn build_prompt(data: &SummaryData, state: &SessionState, window: SummaryWindow) -> String {
    let mut prompt = format!(
        "Write a {} summary for {}.\nSessions: {}, prompts: {}, average prompt score: {:.1}/10\n",
        data.kind.as_str(),
        data.period,
        data.total_sessions,
        data.total_prompts,
        data.average_score
    );
    if !data.goals_completed.is_empty() {
        prompt.push_str(&format!("Goals completed: {}\n", data.goals_completed.join("; ")));
    }

    let mut excerpts: Vec<(DateTime<Utc>, String)> = Vec::new();
    for project in &state.projects {
        for session in &project.sessions {
            for p in session.prompts.iter().filter(|p| window.contains(p.timestamp)) {
                excerpts.push((
                    p.timestamp,
                    format!("[{}] {}", project.name, truncate_display(&p.text, PROMPT_EXCERPT_CHARS)),
                ));
            }
        }
    }
    excerpts.sort_by_key(|(ts, _)| *ts);
    let skip = excerpts.len().saturating_sub(MAX_PROMPTS_IN_REQUEST);
    prompt.push_str("\nPrompts, oldest first:\n");
    for (_, line) in excerpts.into_iter().skip(skip) {
        prompt.push_str("- ");
        prompt.push_str(&line);
        prompt.push('\n');
    }
    prompt
}

pub struct SummaryService {
    store: Arc<SessionStore>,
    llm: Arc<LlmManager>,
}

impl SummaryService {
    pub fn new(store: Arc<SessionStore>, llm: Arc<LlmManager>) -> Self {
        Self { store, llm }
    }

    /// Build a summary, reporting progress at fixed milestones.
    ///
    /// Provider failures fall back to the templated narrative, except for
    /// host file-lock failures which are returned as [`Error::FileLocked`].
    pub async fn generate(&self, request: &SummaryRequest, progress: ProgressFn<'_>) -> Result<SummaryData> {
        progress(PROGRESS_COLLECTING, "Collecting sessions");
        let window = SummaryWindow::resolve(request.kind, request.start_date, request.end_date, Utc::now())?;
        let state = self.store.snapshot().await;

        progress(PROGRESS_AGGREGATING, "Aggregating activity");
        let mut data = collect(&state, request.kind, window);

        progress(PROGRESS_WRITING, "Writing summary");
        if data.total_sessions > 0 && self.llm.provider_for(Feature::Summaries).await.is_some() {
            let request = CompletionRequest::text(SYSTEM_PROMPT, build_prompt(&data, &state, window));
            match self.llm.complete(Feature::Summaries, request).await {
                Ok(response) if !response.content.trim().is_empty() => {
                    data.narrative = response.content.trim().to_string();
                    data.ai_generated = true;
                }
                Ok(_) => tracing::warn!("Summary model returned an empty reply, using template"),
                Err(e) if is_file_lock_message(&e.to_string()) => {
                    return Err(Error::FileLocked(e.to_string()));
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Summary generation failed, using template");
                }
            }
        }

        progress(PROGRESS_FORMATTING, "Formatting");
        tracing::info!(
            kind = data.kind.as_str(),
            sessions = data.total_sessions,
            ai = data.ai_generated,
            "Summary generated"
        );
        progress(PROGRESS_DONE, "Done");
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use chrono::Duration;

    use super::*;
    use crate::config::SessionConfig;
    use crate::host::memory::MemoryKvStore;
    use crate::llm::testing::{manager_with, unconfigured_manager, StubProvider};
    use crate::llm::{LlmError, ProviderId};
    use crate::persistence::Persistence;
    use crate::session::EventBus;
    use crate::types::{Platform, Project, Prompt, Session};

    fn prompt(session_id: &str, at: DateTime<Utc>, score: f64) -> Prompt {
        Prompt {
            id: format!("p-{}", at.timestamp_nanos_opt().unwrap_or_default()),
            session_id: session_id.to_string(),
            timestamp: at,
            text: "Fix the login form".to_string(),
            truncated_text: "Fix the login form".to_string(),
            score,
            breakdown: None,
            enhanced_text: None,
            enhanced_score: None,
        }
    }

    fn state() -> SessionState {
        let now = Utc::now();
        let mut today = Session::new("s1", "p1", Platform::Cursor, now - Duration::minutes(30));
        today.push_prompt(prompt("s1", now - Duration::minutes(20), 6.0), 100);
        today.push_prompt(prompt("s1", now - Duration::minutes(10), 8.0), 100);
        today.last_activity_time = now - Duration::minutes(10);
        today.goal = Some("Ship login".to_string());
        today.goal_completed_at = Some(now - Duration::minutes(5));

        let old_start = now - Duration::days(40);
        let mut old = Session::new("s2", "p2", Platform::ClaudeCode, old_start);
        old.push_prompt(prompt("s2", old_start, 3.0), 100);

        let mut web = Project::new("p1", "acme/web", None);
        web.sessions.push(today);
        let mut api = Project::new("p2", "acme/api", None);
        api.sessions.push(old);

        SessionState {
            projects: vec![web, api],
            ..Default::default()
        }
    }

    fn standup() -> SummaryRequest {
        SummaryRequest {
            kind: SummaryKind::Standup,
            ..Default::default()
        }
    }

    async fn store() -> Arc<SessionStore> {
        Arc::new(SessionStore::new(
            state(),
            Arc::new(Persistence::new(Arc::new(MemoryKvStore::default()))),
            EventBus::default(),
            SessionConfig::default(),
        ))
    }

    #[test]
    fn test_collect_standup() {
        let window = SummaryWindow::resolve(SummaryKind::Standup, None, None, Utc::now()).unwrap();
        let data = collect(&state(), SummaryKind::Standup, window);
        assert_eq!(data.total_sessions, 1);
        assert_eq!(data.total_prompts, 2);
        assert_eq!(data.average_score, 7.0);
        assert_eq!(data.projects.len(), 1);
        assert_eq!(data.projects[0].name, "acme/web");
        assert_eq!(data.platforms.get("cursor"), Some(&1));
        assert_eq!(data.goals_completed, vec!["Ship login"]);
        assert!(data.narrative.contains("1 session across 1 project, 2 prompts"));
        assert!(data.narrative.contains("Goals completed: Ship login."));
    }

    #[test]
    fn test_empty_window_narrative() {
        let window = SummaryWindow::resolve(SummaryKind::Daily, None, None, Utc::now()).unwrap();
        let data = collect(&SessionState::default(), SummaryKind::Daily, window);
        assert_eq!(data.total_sessions, 0);
        assert!(data.narrative.starts_with("No AI coding activity"));
    }

    #[tokio::test]
    async fn test_progress_milestones_and_fallback() {
        let service = SummaryService::new(store().await, unconfigured_manager());
        let seen = Mutex::new(Vec::new());
        let data = service
            .generate(&standup(), &|pct, _| seen.lock().unwrap().push(pct))
            .await
            .unwrap();
        assert!(!data.ai_generated);
        assert_eq!(*seen.lock().unwrap(), vec![20, 40, 60, 80, 100]);
    }

    #[tokio::test]
    async fn test_llm_narrative() {
        let stub = StubProvider::new(ProviderId::Ollama, "m", "  You shipped the login form.  ");
        let service = SummaryService::new(store().await, manager_with(stub.clone()).await.unwrap());
        let data = service
            .generate(&standup(), &|_, _| {})
            .await
            .unwrap();
        assert!(data.ai_generated);
        assert_eq!(data.narrative, "You shipped the login form.");
        assert!(stub.prompts()[0].contains("[acme/web] Fix the login form"));
    }

    #[tokio::test]
    async fn test_file_lock_is_surfaced() {
        let stub = StubProvider::with_responder(ProviderId::Ollama, "m", |_| {
            Err(LlmError::CliError("EBUSY: resource busy or locked".to_string()))
        });
        let service = SummaryService::new(store().await, manager_with(stub).await.unwrap());
        let err = service
            .generate(&standup(), &|_, _| {})
            .await
            .unwrap_err();
        assert!(matches!(err, Error::FileLocked(_)));
    }

    #[tokio::test]
    async fn test_provider_failure_falls_back() {
        let stub = StubProvider::with_responder(ProviderId::Ollama, "m", |_| Err(LlmError::Timeout(60)));
        let service = SummaryService::new(store().await, manager_with(stub).await.unwrap());
        let data = service
            .generate(&standup(), &|_, _| {})
            .await
            .unwrap();
        assert!(!data.ai_generated);
        assert!(data.narrative.contains("2 prompts"));
    }
}
