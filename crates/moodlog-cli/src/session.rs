//! Capture loop: read frame, classify, append on success.

use moodlog_core::{EmotionClassifier, EventLog, FrameOutcome, SkipReason};
use moodlog_hw::{Frame, FrameSource};
use std::sync::atomic::{AtomicBool, Ordering};

/// Fraction of near-black pixels above which a frame is not classified.
const DARK_FRAME_THRESHOLD: f32 = 0.95;

#[derive(Debug, Clone, Default)]
pub struct SessionOptions {
    pub skip_dark_frames: bool,
    /// Stop after this many frames have been read.
    pub max_frames: Option<usize>,
}

/// Why the capture loop ended.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEnd {
    Stopped,
    FrameLimit,
    FrameReadFailure(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionSummary {
    pub frames: usize,
    pub logged: usize,
    pub skipped: usize,
    pub write_failures: usize,
    pub end: SessionEnd,
}

/// Run the classifier over one frame.
pub fn classify_frame<C: EmotionClassifier>(
    classifier: &mut C,
    frame: &Frame,
    skip_dark_frames: bool,
) -> FrameOutcome {
    if skip_dark_frames && frame.is_dark(DARK_FRAME_THRESHOLD) {
        return FrameOutcome::Skipped(SkipReason::DarkFrame);
    }
    match classifier.classify(&frame.data, frame.width, frame.height) {
        Ok(c) if c.label.trim().is_empty() => FrameOutcome::Skipped(SkipReason::NoLabel),
        Ok(c) => FrameOutcome::Labeled(c),
        Err(e) => FrameOutcome::Skipped(SkipReason::ClassifierFailed(e.to_string())),
    }
}

/// Capture until stopped, the frame limit is hit, or a frame cannot be read.
///
/// Takes ownership of `source`, so the device is released on every return
/// path. `stop` is polled once per iteration, before the next frame is read.
pub fn run<S: FrameSource, C: EmotionClassifier>(
    mut source: S,
    classifier: &mut C,
    log: &EventLog,
    stop: &AtomicBool,
    opts: &SessionOptions,
) -> SessionSummary {
    let mut summary = SessionSummary {
        frames: 0,
        logged: 0,
        skipped: 0,
        write_failures: 0,
        end: SessionEnd::Stopped,
    };

    loop {
        if stop.load(Ordering::Relaxed) {
            summary.end = SessionEnd::Stopped;
            break;
        }
        if opts.max_frames.is_some_and(|max| summary.frames >= max) {
            summary.end = SessionEnd::FrameLimit;
            break;
        }

        let frame = match source.next_frame() {
            Ok(f) => f,
            Err(e) => {
                tracing::warn!(error = %e, "could not read from camera; ending session");
                summary.end = SessionEnd::FrameReadFailure(e.to_string());
                break;
            }
        };
        summary.frames += 1;

        match classify_frame(classifier, &frame, opts.skip_dark_frames) {
            FrameOutcome::Labeled(c) => {
                tracing::info!(
                    seq = frame.sequence,
                    emotion = %c.label,
                    confidence = c.confidence,
                    "frame classified"
                );
                match log.append(&c.label) {
                    Ok(()) => summary.logged += 1,
                    Err(e) => {
                        tracing::warn!(error = %e, "failed to log emotion; continuing");
                        summary.write_failures += 1;
                    }
                }
            }
            FrameOutcome::Skipped(reason) => {
                tracing::warn!(seq = frame.sequence, %reason, "detection skipped frame");
                summary.skipped += 1;
            }
        }
    }

    tracing::info!(
        frames = summary.frames,
        logged = summary.logged,
        skipped = summary.skipped,
        write_failures = summary.write_failures,
        end = ?summary.end,
        "capture session ended"
    );
    summary
}
