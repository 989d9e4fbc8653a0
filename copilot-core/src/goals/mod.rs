//! Goal inference and goal-progress analysis

pub mod analyzer;
pub mod cooldown;
pub mod coordinator;
pub mod inference;

pub use analyzer::{CompletionSignal, GoalProgressAnalyzer};
pub use cooldown::GoalPromptCooldown;
pub use coordinator::GoalCoordinator;
pub use inference::GoalInferenceService;
