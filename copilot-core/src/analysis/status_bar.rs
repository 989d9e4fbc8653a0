//! Today's analysis counters on the status-bar widget.

use std::sync::Arc;

use super::history::DailyStats;
use crate::host::StatusBar;

pub struct StatusBarAggregator {
    bar: Arc<dyn StatusBar>,
}

pub fn render(stats: &DailyStats) -> (String, String) {
    if stats.prompts_analyzed == 0 {
        return (
            "Copilot: no prompts today".to_string(),
            "Analyze a prompt to start tracking today's score".to_string(),
        );
    }
    let noun = if stats.prompts_analyzed == 1 { "prompt" } else { "prompts" };
    (
        format!("Copilot: {} {} · avg {:.1}", stats.prompts_analyzed, noun, stats.average_score),
        format!(
            "{} analyzed on {}; best score {:.1}/10",
            stats.prompts_analyzed, stats.date, stats.best_score
        ),
    )
}

impl StatusBarAggregator {
    pub fn new(bar: Arc<dyn StatusBar>) -> Self {
        Self { bar }
    }

    pub fn update(&self, stats: &DailyStats) {
        let (text, tooltip) = render(stats);
        self.bar.update(&text, &tooltip);
    }
}
