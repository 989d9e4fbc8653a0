//! Project detection from the host workspace

use std::path::Path;
use std::sync::Arc;

use super::events::StateEvent;
use super::store::SessionStore;
use crate::error::Result;
use crate::host::WorkspaceProvider;
use crate::persistence::{normalize_path, project_id_for_path};
use crate::types::Project;

pub const DEFAULT_PROJECT_ID: &str = "default-project";
pub const DEFAULT_PROJECT_NAME: &str = "Default Project";

pub struct ProjectDetectionService {
    store: Arc<SessionStore>,
    workspace: Arc<dyn WorkspaceProvider>,
}

impl ProjectDetectionService {
    pub fn new(store: Arc<SessionStore>, workspace: Arc<dyn WorkspaceProvider>) -> Self {
        Self { store, workspace }
    }

    /// Project for the first workspace folder, created on first sight.
    ///
    /// Returns `None` when no folder is open.
    pub async fn detect_current_project(&self) -> Result<Option<Project>> {
        let folders = self.workspace.folders();
        let Some(root) = folders.first() else {
            return Ok(None);
        };
        self.project_for_path(root).await.map(Some)
    }

    /// Existing project whose path normalizes like `root`, or a new one.
    pub async fn project_for_path(&self, root: &Path) -> Result<Project> {
        let path = root.to_string_lossy().to_string();
        let id = project_id_for_path(&path);
        let normalized = normalize_path(&path);

        let existing = self
            .store
            .read(|state| find_project(&state.projects, &id, &normalized).cloned())
            .await;
        if let Some(project) = existing {
            return Ok(project);
        }

        let name = git_repo_name(root).unwrap_or_else(|| folder_name(root));
        let project = self
            .store
            .mutate(|state, events| {
                // Another caller may have inserted it while we read git config.
                if let Some(project) = find_project(&state.projects, &id, &normalized) {
                    return Ok(project.clone());
                }
                let project = Project::new(id.clone(), name, Some(path.clone()));
                state.projects.push(project.clone());
                if state.active_project_id.is_none() {
                    state.active_project_id = Some(project.id.clone());
                }
                events.push(StateEvent::ProjectCreated {
                    project_id: project.id.clone(),
                });
                Ok(project)
            })
            .await?;

        tracing::info!(project_id = %project.id, name = %project.name, "Detected project");
        Ok(project)
    }

    /// Current project, falling back to the active or first known project,
    /// then to a synthetic default project.
    pub async fn current_or_default(&self) -> Result<Project> {
        if let Some(project) = self.detect_current_project().await? {
            return Ok(project);
        }

        self.store
            .mutate(|state, events| {
                let known = state
                    .active_project_id
                    .as_deref()
                    .and_then(|id| state.project(id))
                    .or_else(|| state.projects.first())
                    .cloned();
                if let Some(project) = known {
                    return Ok(project);
                }

                let project = Project::new(DEFAULT_PROJECT_ID, DEFAULT_PROJECT_NAME, None);
                state.projects.push(project.clone());
                state.active_project_id = Some(project.id.clone());
                events.push(StateEvent::ProjectCreated {
                    project_id: project.id.clone(),
                });
                Ok(project)
            })
            .await
    }
}

fn find_project<'a>(projects: &'a [Project], id: &str, normalized: &str) -> Option<&'a Project> {
    projects.iter().find(|p| {
        p.id == id
            || p
                .path
                .as_deref()
                .is_some_and(|path| normalize_path(path) == normalized)
    })
}

fn folder_name(root: &Path) -> String {
    root.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| root.to_string_lossy().to_string())
}

/// `owner/repo` from the origin remote in `.git/config`, if any.
pub fn git_repo_name(root: &Path) -> Option<String> {
    let config = std::fs::read_to_string(root.join(".git").join("config")).ok()?;
    let url = origin_url(&config)?;
    parse_git_remote(&url)
}

fn origin_url(config: &str) -> Option<String> {
    let mut in_origin = false;
    for line in config.lines() {
        let line = line.trim();
        if line.starts_with('[') {
            in_origin = line == r#"[remote "origin"]"#;
            continue;
        }
        if !in_origin {
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            if key.trim() == "url" {
                return Some(value.trim().to_string());
            }
        }
    }
    None
}

/// Parse `git@host:owner/repo(.git)` or `https://host/owner/repo(.git)`.
pub fn parse_git_remote(url: &str) -> Option<String> {
    let url = url.trim();
    let path = if let Some(rest) = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
    {
        rest.split_once('/')?.1
    } else if url.contains('@') && url.contains(':') && !url.contains("://") {
        url.split_once(':')?.1
    } else {
        return None;
    };

    let path = path.trim_end_matches('/');
    let path = path.strip_suffix(".git").unwrap_or(path);
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    match segments.as_slice() {
        [.., owner, repo] => Some(format!("{}/{}", owner, repo)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionConfig;
    use crate::host::memory::{MemoryKvStore, StaticWorkspace};
    use crate::persistence::Persistence;
    use crate::session::events::EventBus;
    use crate::types::SessionState;
    use std::path::PathBuf;

    fn store() -> Arc<SessionStore> {
        Arc::new(SessionStore::new(
            SessionState::default(),
            Arc::new(Persistence::new(Arc::new(MemoryKvStore::default()))),
            EventBus::default(),
            SessionConfig::default(),
        ))
    }

    #[test]
    fn test_parse_git_remote() {
        assert_eq!(
            parse_git_remote("git@github.com:acme/widgets.git").as_deref(),
            Some("acme/widgets")
        );
        assert_eq!(
            parse_git_remote("https://github.com/acme/widgets").as_deref(),
            Some("acme/widgets")
        );
        assert_eq!(
            parse_git_remote("https://gitlab.com/group/sub/widgets.git/").as_deref(),
            Some("sub/widgets")
        );
        assert_eq!(parse_git_remote("/srv/git/widgets"), None);
    }

    #[test]
    fn test_origin_url_only_reads_origin() {
        let config = r#"
[core]
    bare = false
[remote "upstream"]
    url = git@github.com:upstream/widgets.git
[remote "origin"]
    url = git@github.com:me/widgets.git
"#;
        assert_eq!(
            origin_url(config).as_deref(),
            Some("git@github.com:me/widgets.git")
        );
    }

    #[tokio::test]
    async fn test_detects_and_reuses_project() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join(".git")).unwrap();
        std::fs::write(
            dir.path().join(".git").join("config"),
            "[remote \"origin\"]\n\turl = https://github.com/acme/widgets.git\n",
        )
        .unwrap();

        let store = store();
        let mut rx = store.events().subscribe();
        let workspace = Arc::new(StaticWorkspace::new(vec![dir.path().to_path_buf()], "Cursor"));
        let service = ProjectDetectionService::new(store.clone(), workspace);

        let first = service.detect_current_project().await.unwrap().unwrap();
        assert_eq!(first.name, "acme/widgets");
        assert!(matches!(
            rx.recv().await.unwrap(),
            StateEvent::ProjectCreated { .. }
        ));

        let second = service.detect_current_project().await.unwrap().unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(store.snapshot().await.projects.len(), 1);
    }

    #[tokio::test]
    async fn test_matches_existing_by_normalized_path() {
        let store = store();
        store
            .mutate(|state, _| {
                state
                    .projects
                    .push(Project::new("proj_old", "legacy", Some("/Work/Repo/".to_string())));
                Ok(())
            })
            .await
            .unwrap();
        let workspace = Arc::new(StaticWorkspace::new(vec![PathBuf::from("/work/repo")], "Cursor"));
        let service = ProjectDetectionService::new(store.clone(), workspace);

        let project = service.detect_current_project().await.unwrap().unwrap();
        assert_eq!(project.id, "proj_old");
    }

    #[tokio::test]
    async fn test_default_project_without_workspace() {
        let store = store();
        let service =
            ProjectDetectionService::new(store.clone(), Arc::new(StaticWorkspace::default()));
        assert!(service.detect_current_project().await.unwrap().is_none());

        let project = service.current_or_default().await.unwrap();
        assert_eq!(project.id, DEFAULT_PROJECT_ID);
        assert_eq!(project.name, DEFAULT_PROJECT_NAME);
        assert_eq!(project.path, None);

        // Second call reuses it.
        service.current_or_default().await.unwrap();
        assert_eq!(store.snapshot().await.projects.len(), 1);
    }

    #[tokio::test]
    async fn test_folder_name_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("my-app");
        std::fs::create_dir(&root).unwrap();
        let store = store();
        let service = ProjectDetectionService::new(
            store,
            Arc::new(StaticWorkspace::new(vec![root], "Visual Studio Code")),
        );
        let project = service.detect_current_project().await.unwrap().unwrap();
        assert_eq!(project.name, "my-app");
    }
}
