//! Lightweight context gathered before a prompt is scored.

use std::path::Path;

use serde::Serialize;

use crate::format::truncate_chars;
use crate::host::WorkspaceProvider;
use crate::types::SessionState;

const MAX_RECENT_TOPICS: usize = 3;
const MAX_SNIPPET_CHARS: usize = 500;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisContext {
    pub tech_stack: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub goal: Option<String>,
    pub recent_topics: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code_snippet: Option<String>,
}

impl AnalysisContext {
    pub fn gather(workspace: &dyn WorkspaceProvider, state: &SessionState) -> Self {
        let tech_stack = workspace
            .folders()
            .first()
            .map(|root| detect_tech_stack(root))
            .unwrap_or_default();
        let session = state.active_session();

        Self {
            tech_stack,
            goal: session.and_then(|s| s.goal.clone()),
            recent_topics: session
                .map(|s| {
                    s.prompts
                        .iter()
                        .take(MAX_RECENT_TOPICS)
                        .map(|p| p.truncated_text.clone())
                        .collect()
                })
                .unwrap_or_default(),
            code_snippet: workspace
                .active_selection()
                .filter(|s| !s.trim().is_empty())
                .map(|s| truncate_chars(&s, MAX_SNIPPET_CHARS)),
        }
    }

    /// Context block appended to analysis prompts.
    pub fn describe(&self) -> String {
        let mut out = String::new();
        if !self.tech_stack.is_empty() {
            out.push_str(&format!("Tech stack: {}\n", self.tech_stack.join(", ")));
        }
        if let Some(goal) = &self.goal {
            out.push_str(&format!("Session goal: {}\n", goal));
        }
        if !self.recent_topics.is_empty() {
            out.push_str(&format!("Recent prompts: {}\n", self.recent_topics.join(" | ")));
        }
        if let Some(snippet) = &self.code_snippet {
            out.push_str(&format!("Selected code:\n{}\n", snippet));
        }
        out
    }
}

/// Languages and frameworks inferred from manifest files at the root.
pub fn detect_tech_stack(root: &Path) -> Vec<String> {
    let mut stack = Vec::new();

    if root.join("Cargo.toml").exists() {
        stack.push("Rust".to_string());
    }
    if let Ok(raw) = std::fs::read_to_string(root.join("package.json")) {
        let deps = package_dependencies(&raw);
        stack.push(if deps.iter().any(|d| d == "typescript") || root.join("tsconfig.json").exists() {
            "TypeScript".to_string()
        } else {
            "JavaScript".to_string()
        });
        for (dep, label) in [
            ("react", "React"),
            ("next", "Next.js"),
            ("vue", "Vue"),
            ("svelte", "Svelte"),
            ("express", "Express"),
        ] {
            if deps.iter().any(|d| d == dep) {
                stack.push(label.to_string());
            }
        }
    }
    if root.join("pyproject.toml").exists() || root.join("requirements.txt").exists() {
        stack.push("Python".to_string());
    }
    if root.join("go.mod").exists() {
        stack.push("Go".to_string());
    }
    stack
}

fn package_dependencies(raw: &str) -> Vec<String> {
    let Ok(value) = serde_json::from_str::<serde_json::Value>(raw) else {
        return Vec::new();
    };
    ["dependencies", "devDependencies"]
        .iter()
        .filter_map(|key| value.get(key).and_then(|v| v.as_object()))
        .flat_map(|deps| deps.keys().cloned())
        .collect()
}
