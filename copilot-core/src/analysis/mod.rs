//! Prompt analysis: scoring, rewriting, history and the daily counters.

pub mod context;
pub mod enhance;
pub mod history;
pub mod pipeline;
pub mod scoring;
pub mod status_bar;

pub use context::{detect_tech_stack, AnalysisContext};
pub use enhance::{EnhanceMode, PromptEnhancer};
pub use history::{AnalyzedPrompt, DailyStats, PromptHistoryStore, PROMPT_HISTORY_KEY};
pub use pipeline::{AnalysisEvent, AnalysisOutcome, AnalysisPipeline};
pub use scoring::{parse_score, PromptScorer, ScoreResult};
pub use status_bar::StatusBarAggregator;
