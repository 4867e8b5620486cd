//! Plain-text summary report of logged emotions.

use crate::stats::EmotionCounts;
use crate::types::{EmotionEvent, TIMESTAMP_FORMAT};
use chrono::NaiveDateTime;
use serde::Serialize;
use std::path::Path;

pub const REPORT_TITLE: &str = "Emotion Detection Report";

/// Aggregated counts ready to be rendered into a document.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub generated_at: NaiveDateTime,
    pub counts: EmotionCounts,
}

impl Report {
    /// Build a report, or `None` when there is nothing to report.
    pub fn build(events: &[EmotionEvent], generated_at: NaiveDateTime) -> Option<Self> {
        if events.is_empty() {
            return None;
        }
        Some(Self {
            generated_at,
            counts: EmotionCounts::from_events(events),
        })
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str(REPORT_TITLE);
        out.push('\n');
        out.push_str(&format!(
            "Generated: {}\n\n",
            self.generated_at.format(TIMESTAMP_FORMAT)
        ));
        for c in self.counts.iter() {
            out.push_str(&format!("{}: {}\n", c.emotion, c.count));
        }
        out
    }

    pub fn write_to(&self, path: &Path) -> std::io::Result<()> {
        std::fs::write(path, self.render())?;
        tracing::info!(path = %path.display(), emotions = self.counts.len(), "report written");
        Ok(())
    }
}
