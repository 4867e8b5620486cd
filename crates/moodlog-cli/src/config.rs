use std::path::PathBuf;

/// Runtime configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Event log CSV file.
    pub log_path: PathBuf,
    /// V4L2 device path (default: /dev/video0).
    pub camera_device: String,
    /// Directory containing ONNX model files.
    pub model_dir: PathBuf,
    /// Frames discarded after opening the camera (auto-exposure settling).
    pub warmup_frames: usize,
    /// Skip classification of near-black frames.
    pub skip_dark_frames: bool,
}

impl Config {
    /// Load configuration from `MOODLOG_*` environment variables with defaults.
    pub fn from_env() -> Self {
        let log_path = std::env::var("MOODLOG_LOG_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| moodlog_core::default_data_dir().join("emotion_data.csv"));

        let model_dir = std::env::var("MOODLOG_MODEL_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| moodlog_core::default_model_dir());

        Self {
            log_path,
            camera_device: std::env::var("MOODLOG_CAMERA_DEVICE")
                .unwrap_or_else(|_| "/dev/video0".to_string()),
            model_dir,
            warmup_frames: env_usize("MOODLOG_WARMUP_FRAMES", 4),
            skip_dark_frames: env_flag("MOODLOG_SKIP_DARK_FRAMES", true),
        }
    }

    /// Path to the FER+ emotion model.
    pub fn classifier_model_path(&self) -> String {
        self.model_dir
            .join(moodlog_core::classifier::FERPLUS_MODEL_FILE)
            .to_string_lossy()
            .into_owned()
    }

    /// Path to the SCRFD face detector model.
    pub fn detector_model_path(&self) -> String {
        self.model_dir
            .join(moodlog_core::detector::SCRFD_MODEL_FILE)
            .to_string_lossy()
            .into_owned()
    }
}

fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_flag(key: &str, default: bool) -> bool {
    std::env::var(key).map(|v| v != "0").unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_usize_parses_and_defaults() {
        std::env::set_var("MOODLOG_TEST_USIZE_OK", "12");
        std::env::set_var("MOODLOG_TEST_USIZE_BAD", "twelve");
        assert_eq!(env_usize("MOODLOG_TEST_USIZE_OK", 4), 12);
        assert_eq!(env_usize("MOODLOG_TEST_USIZE_BAD", 4), 4);
        assert_eq!(env_usize("MOODLOG_TEST_USIZE_UNSET", 4), 4);
    }

    #[test]
    fn test_env_flag() {
        std::env::set_var("MOODLOG_TEST_FLAG_OFF", "0");
        std::env::set_var("MOODLOG_TEST_FLAG_ON", "1");
        assert!(!env_flag("MOODLOG_TEST_FLAG_OFF", true));
        assert!(env_flag("MOODLOG_TEST_FLAG_ON", false));
        assert!(env_flag("MOODLOG_TEST_FLAG_UNSET", true));
    }

    #[test]
    fn test_model_path_uses_model_dir() {
        let config = Config {
            log_path: PathBuf::from("/tmp/log.csv"),
            camera_device: "/dev/video0".into(),
            model_dir: PathBuf::from("/opt/models"),
            warmup_frames: 0,
            skip_dark_frames: true,
        };
        assert_eq!(config.classifier_model_path(), "/opt/models/emotion-ferplus-8.onnx");
        assert_eq!(config.detector_model_path(), "/opt/models/det_10g.onnx");
    }
}
