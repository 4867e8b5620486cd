//! moodlog-core — Emotion event log, classification and aggregation.
//!
//! The event log is an append-only CSV file and the single source of truth
//! for every view. Classification runs the FER+ model via ONNX Runtime on
//! the face found by the SCRFD detector.

pub mod analyzer;
pub mod classifier;
pub mod detector;
pub mod report;
pub mod stats;
pub mod store;
pub mod types;

pub use analyzer::{select_crop, CropRegion, FaceEmotionAnalyzer};
pub use classifier::{ClassifierError, EmotionClassifier, FerPlusClassifier};
pub use detector::{DetectorError, FaceDetector};
pub use report::Report;
pub use stats::{EmotionCounts, Timeline};
pub use store::{EventLog, StoreError, StoreState};
pub use types::{Classification, EmotionEvent, FaceBox, FrameOutcome, SkipReason};

use std::path::PathBuf;

/// `$XDG_DATA_HOME/moodlog`, falling back to `~/.local/share/moodlog`.
pub fn default_data_dir() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".local/share")
        })
        .join("moodlog")
}

/// Directory searched for ONNX model files.
pub fn default_model_dir() -> PathBuf {
    default_data_dir().join("models")
}
