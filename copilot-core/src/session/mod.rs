//! Session model: projects, sessions, prompts and responses
//!
//! All mutation goes through [`SessionStore::mutate`], which emits
//! [`StateEvent`]s and persists the resulting snapshot.

pub mod events;
pub mod goal_cache;
pub mod lifecycle;
pub mod project;
pub mod prompts;
pub mod responses;
pub mod store;

use std::sync::Arc;

pub use events::{EventBus, StateEvent};
pub use goal_cache::{GoalProgressCache, GoalProgressEntry};
pub use lifecycle::{is_session_still_active, SessionLifecycleService, SessionUpdate};
pub use project::ProjectDetectionService;
pub use prompts::{
    AddPromptOptions, GoalProgressTrigger, PromptManagementService, PromptPage, PromptScoreUpdate,
};
pub use responses::{Interaction, ResponseManagementService};
pub use store::SessionStore;

use crate::host::WorkspaceProvider;

/// The session-model services over one shared store.
pub struct SessionServices {
    pub store: Arc<SessionStore>,
    pub projects: ProjectDetectionService,
    pub lifecycle: SessionLifecycleService,
    pub prompts: PromptManagementService,
    pub responses: ResponseManagementService,
    pub goal_cache: Arc<GoalProgressCache>,
}

impl SessionServices {
    pub fn new(
        store: Arc<SessionStore>,
        workspace: Arc<dyn WorkspaceProvider>,
        goal_cache: Arc<GoalProgressCache>,
        trigger: Option<Arc<dyn GoalProgressTrigger>>,
    ) -> Self {
        let mut prompts = PromptManagementService::new(store.clone());
        if let Some(trigger) = trigger {
            prompts = prompts.with_trigger(trigger);
        }
        Self {
            projects: ProjectDetectionService::new(store.clone(), workspace),
            lifecycle: SessionLifecycleService::new(store.clone()),
            prompts,
            responses: ResponseManagementService::new(store.clone()),
            goal_cache,
            store,
        }
    }

    pub fn events(&self) -> &EventBus {
        self.store.events()
    }
}
