//! Aggregations over the event log for the dashboard and reports.

use crate::types::EmotionEvent;
use chrono::NaiveDateTime;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Occurrences of a single label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmotionCount {
    pub emotion: String,
    pub count: usize,
}

/// Label → occurrence count, most frequent first (ties broken by label).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct EmotionCounts {
    counts: Vec<EmotionCount>,
}

impl EmotionCounts {
    pub fn from_events(events: &[EmotionEvent]) -> Self {
        let mut tally: BTreeMap<&str, usize> = BTreeMap::new();
        for event in events {
            *tally.entry(event.emotion.as_str()).or_default() += 1;
        }

        let mut counts: Vec<EmotionCount> = tally
            .into_iter()
            .map(|(emotion, count)| EmotionCount {
                emotion: emotion.to_string(),
                count,
            })
            .collect();
        // BTreeMap already yields labels in order; a stable sort keeps that for ties.
        counts.sort_by(|a, b| b.count.cmp(&a.count));

        Self { counts }
    }

    pub fn iter(&self) -> impl Iterator<Item = &EmotionCount> {
        self.counts.iter()
    }

    /// Count for `emotion`, zero if never seen.
    pub fn get(&self, emotion: &str) -> usize {
        self.counts
            .iter()
            .find(|c| c.emotion == emotion)
            .map_or(0, |c| c.count)
    }

    pub fn total(&self) -> usize {
        self.counts.iter().map(|c| c.count).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    /// Highest count, used to scale bar charts.
    pub fn max_count(&self) -> usize {
        self.counts.first().map_or(0, |c| c.count)
    }

    /// Percentage share of each label (pie chart slices), summing to 100.
    pub fn shares(&self) -> Vec<(&str, f32)> {
        let total = self.total();
        if total == 0 {
            return Vec::new();
        }
        self.counts
            .iter()
            .map(|c| (c.emotion.as_str(), c.count as f32 * 100.0 / total as f32))
            .collect()
    }
}

/// One timeline row: counts per label at a single timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimelineRow {
    pub timestamp: NaiveDateTime,
    /// Same order as [`Timeline::emotions`]; zero where the label was absent.
    pub counts: Vec<usize>,
}

/// Events grouped by (timestamp, emotion), one column per label.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Timeline {
    /// Column labels in lexical order.
    pub emotions: Vec<String>,
    /// Rows in ascending timestamp order.
    pub rows: Vec<TimelineRow>,
}

impl Timeline {
    pub fn from_events(events: &[EmotionEvent]) -> Self {
        let emotions: Vec<String> = events
            .iter()
            .map(|e| e.emotion.as_str())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .map(str::to_string)
            .collect();

        let mut grouped: BTreeMap<NaiveDateTime, Vec<usize>> = BTreeMap::new();
        for event in events {
            let Ok(col) = emotions.binary_search(&event.emotion) else {
                continue;
            };
            grouped
                .entry(event.timestamp)
                .or_insert_with(|| vec![0; emotions.len()])[col] += 1;
        }

        let rows = grouped
            .into_iter()
            .map(|(timestamp, counts)| TimelineRow { timestamp, counts })
            .collect();

        Self { emotions, rows }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
