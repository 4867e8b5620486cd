//! Terminal rendering of event log statistics.

use moodlog_core::stats::{EmotionCounts, Timeline};
use moodlog_core::types::TIMESTAMP_FORMAT;
use std::fmt::Write;

const BAR_WIDTH: usize = 40;

/// Horizontal bar chart of counts, longest bar = `BAR_WIDTH` cells.
pub fn render_bars(counts: &EmotionCounts) -> String {
    let label_width = counts.iter().map(|c| c.emotion.chars().count()).max().unwrap_or(0);
    let max = counts.max_count().max(1);

    let mut out = String::new();
    for c in counts.iter() {
        let cells = (c.count * BAR_WIDTH).div_ceil(max);
        let _ = writeln!(
            out,
            "{:<label_width$}  {} {}",
            c.emotion,
            "█".repeat(cells),
            c.count
        );
    }
    out
}

/// Percentage share per label, one decimal place.
pub fn render_shares(counts: &EmotionCounts) -> String {
    let mut out = String::new();
    for (emotion, pct) in counts.shares() {
        let _ = writeln!(out, "{emotion}: {pct:.1}%");
    }
    out
}

/// Counts per (timestamp, emotion) as a table.
pub fn render_timeline(timeline: &Timeline) -> String {
    let widths: Vec<usize> = timeline
        .emotions
        .iter()
        .map(|e| e.chars().count().max(1))
        .collect();

    let mut out = String::from("timestamp          ");
    for (emotion, w) in timeline.emotions.iter().zip(&widths) {
        let _ = write!(out, "  {emotion:>w$}");
    }
    out.push('\n');

    for row in &timeline.rows {
        let _ = write!(out, "{}", row.timestamp.format(TIMESTAMP_FORMAT));
        for (count, w) in row.counts.iter().zip(&widths) {
            let _ = write!(out, "  {count:>w$}");
        }
        out.push('\n');
    }
    out
}
