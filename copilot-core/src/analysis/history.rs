//! Analyzed-prompt history and daily counters.

use std::sync::Arc;

use chrono::{DateTime, Local, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::scoring::ScoreResult;
use crate::error::Result;
use crate::format::truncate_display;
use crate::host::KvStore;

pub const PROMPT_HISTORY_KEY: &str = "copilot.v2.promptHistory";
pub const MAX_HISTORY: usize = 100;
const HISTORY_TEXT_CHARS: usize = 50;
const MAX_QUICK_WINS: usize = 3;
const QUICK_WIN_CHARS: usize = 60;

/// Sub-scores on a 0-10 scale.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryScores {
    pub specificity: f64,
    pub context: f64,
    pub intent: f64,
    pub outcome: f64,
    pub constraints: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzedPrompt {
    /// Arrival time in epoch milliseconds
    pub id: String,
    pub text: String,
    /// 0-10
    pub score: f64,
    pub timestamp: DateTime<Utc>,
    pub category_scores: CategoryScores,
    #[serde(default)]
    pub quick_wins: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub improved_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub improved_score: Option<f64>,
}

/// 0-100 to 0-10, one decimal.
fn tenths(score: f64) -> f64 {
    score.round() / 10.0
}

impl AnalyzedPrompt {
    pub fn from_score(
        text: &str,
        arrived_at: DateTime<Utc>,
        score: &ScoreResult,
        improved_version: Option<String>,
        improved_score: Option<f64>,
    ) -> Self {
        let b = &score.breakdown;
        Self {
            id: arrived_at.timestamp_millis().to_string(),
            text: truncate_display(text, HISTORY_TEXT_CHARS),
            score: score.score_out_of_ten(),
            timestamp: arrived_at,
            category_scores: CategoryScores {
                specificity: tenths(b.specificity.score),
                context: tenths(b.context.score),
                intent: tenths(b.intent.score),
                outcome: tenths(b.outcome.score),
                constraints: tenths(b.constraints.score),
            },
            quick_wins: score
                .suggestions
                .iter()
                .take(MAX_QUICK_WINS)
                .map(|s| truncate_display(s, QUICK_WIN_CHARS))
                .collect(),
            improved_version,
            improved_score,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyStats {
    pub date: String,
    pub prompts_analyzed: usize,
    pub average_score: f64,
    pub best_score: f64,
}

impl DailyStats {
    pub fn for_day(history: &[AnalyzedPrompt], day: NaiveDate) -> Self {
        let todays: Vec<f64> = history
            .iter()
            .filter(|p| p.timestamp.with_timezone(&Local).date_naive() == day)
            .map(|p| p.score)
            .collect();
        let average = if todays.is_empty() {
            0.0
        } else {
            (todays.iter().sum::<f64>() / todays.len() as f64 * 10.0).round() / 10.0
        };
        Self {
            date: day.to_string(),
            prompts_analyzed: todays.len(),
            average_score: average,
            best_score: todays.iter().copied().fold(0.0, f64::max),
        }
    }
}

pub struct PromptHistoryStore {
    kv: Arc<dyn KvStore>,
}

impl PromptHistoryStore {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self { kv }
    }

    /// Newest first. Unreadable history is treated as empty.
    pub async fn list(&self) -> Vec<AnalyzedPrompt> {
        match self.kv.get(PROMPT_HISTORY_KEY).await {
            Ok(Some(value)) => serde_json::from_value(value).unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Discarding unreadable prompt history");
                Vec::new()
            }),
            Ok(None) => Vec::new(),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read prompt history");
                Vec::new()
            }
        }
    }

    pub async fn record(&self, prompt: AnalyzedPrompt) -> Result<Vec<AnalyzedPrompt>> {
        let mut history = self.list().await;
        history.insert(0, prompt);
        history.truncate(MAX_HISTORY);
        self.kv
            .set(PROMPT_HISTORY_KEY, serde_json::to_value(&history)?)
            .await?;
        Ok(history)
    }

    pub async fn today(&self) -> DailyStats {
        DailyStats::for_day(&self.list().await, Local::now().date_naive())
    }

    pub async fn clear(&self) -> Result<()> {
        self.kv.delete(PROMPT_HISTORY_KEY).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::memory::MemoryKvStore;
    use crate::types::ScoreBreakdown;

    fn score(total_inputs: f64, suggestions: &[&str]) -> ScoreResult {
        let breakdown = ScoreBreakdown::from_scores(
            total_inputs,
            total_inputs,
            total_inputs,
            total_inputs,
            total_inputs,
        );
        ScoreResult {
            total: breakdown.total,
            breakdown,
            suggestions: suggestions.iter().map(|s| s.to_string()).collect(),
            feedback: String::new(),
        }
    }

    #[test]
    fn test_from_score_rescales() {
        let arrived = Utc::now();
        let entry = AnalyzedPrompt::from_score(
            &"z".repeat(80),
            arrived,
            &score(72.0, &["a", "b", "c", "d"]),
            None,
            None,
        );
        assert_eq!(entry.id, arrived.timestamp_millis().to_string());
        assert_eq!(entry.text.chars().count(), 53);
        assert_eq!(entry.score, 7.2);
        assert_eq!(entry.category_scores.context, 7.2);
        assert_eq!(entry.quick_wins, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_history_is_capped_newest_first() {
        let store = PromptHistoryStore::new(Arc::new(MemoryKvStore::default()));
        for i in 0..(MAX_HISTORY + 5) {
            let entry = AnalyzedPrompt::from_score(
                &format!("prompt {}", i),
                Utc::now(),
                &score(50.0, &[]),
                None,
                None,
            );
            store.record(entry).await.unwrap();
        }
        let history = store.list().await;
        assert_eq!(history.len(), MAX_HISTORY);
        assert_eq!(history[0].text, format!("prompt {}", MAX_HISTORY + 4));
    }

    #[tokio::test]
    async fn test_today_stats() {
        let store = PromptHistoryStore::new(Arc::new(MemoryKvStore::default()));
        let now = Utc::now();
        for (total, at) in [(60.0, now), (80.0, now), (100.0, now - chrono::Duration::days(3))] {
            store
                .record(AnalyzedPrompt::from_score("p", at, &score(total, &[]), None, None))
                .await
                .unwrap();
        }
        let stats = store.today().await;
        assert_eq!(stats.prompts_analyzed, 2);
        assert_eq!(stats.average_score, 7.0);
        assert_eq!(stats.best_score, 8.0);
    }
}
