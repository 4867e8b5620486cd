use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Timestamp layout used in the event log (`YYYY-MM-DD HH:MM:SS`, local clock).
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One logged emotion observation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmotionEvent {
    /// Local wall-clock time, truncated to whole seconds.
    pub timestamp: NaiveDateTime,
    /// Classifier-defined label. Not validated against any fixed set.
    pub emotion: String,
}

/// A detected face in frame pixel coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    /// Detector confidence in [0, 1].
    pub score: f32,
}

impl FaceBox {
    pub fn center(&self) -> (f32, f32) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    pub fn area(&self) -> f32 {
        self.width.max(0.0) * self.height.max(0.0)
    }
}

/// Dominant emotion for a single frame, with the full score distribution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Classification {
    pub label: String,
    /// Probability of `label` after softmax, in [0, 1].
    pub confidence: f32,
    /// (label, probability) for every class the model emits, in model order.
    pub scores: Vec<(String, f32)>,
}

/// Why a frame produced no event.
#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    /// Frame was almost entirely black (lens covered, lights off).
    DarkFrame,
    /// The classifier raised an error for this frame.
    ClassifierFailed(String),
    /// The classifier ran but yielded no usable label.
    NoLabel,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DarkFrame => write!(f, "dark frame"),
            Self::ClassifierFailed(e) => write!(f, "classifier failed: {e}"),
            Self::NoLabel => write!(f, "no usable label"),
        }
    }
}

/// Per-frame result of the detection pipeline.
///
/// The capture loop appends an event for `Labeled` and only logs a warning
/// for `Skipped`.
#[derive(Debug, Clone)]
pub enum FrameOutcome {
    Labeled(Classification),
    Skipped(SkipReason),
}

impl FrameOutcome {
    /// Label to append, if any.
    pub fn label(&self) -> Option<&str> {
        match self {
            Self::Labeled(c) => Some(c.label.as_str()),
            Self::Skipped(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_face_box_geometry() {
        let face = FaceBox {
            x: 10.0,
            y: 20.0,
            width: 30.0,
            height: 40.0,
            score: 0.9,
        };
        assert_eq!(face.center(), (25.0, 40.0));
        assert_eq!(face.area(), 1200.0);
    }

    #[test]
    fn test_outcome_label() {
        let labeled = FrameOutcome::Labeled(Classification {
            label: "sad".into(),
            confidence: 0.8,
            scores: vec![("sad".into(), 0.8), ("happy".into(), 0.2)],
        });
        assert_eq!(labeled.label(), Some("sad"));

        let skipped = FrameOutcome::Skipped(SkipReason::DarkFrame);
        assert_eq!(skipped.label(), None);
    }

    #[test]
    fn test_skip_reason_display() {
        let reason = SkipReason::ClassifierFailed("boom".into());
        assert_eq!(reason.to_string(), "classifier failed: boom");
    }
}
