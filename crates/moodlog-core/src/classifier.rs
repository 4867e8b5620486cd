//! FER+ facial emotion classifier via ONNX Runtime.
//!
//! Takes a square region of a grayscale frame (a face crop, or the frame
//! centre when no face is known), resizes it to the 64x64 model input and
//! returns the dominant emotion with its softmax probability.

use crate::analyzer::CropRegion;
use crate::detector::DetectorError;
use crate::types::Classification;
use image::imageops::{self, FilterType};
use image::GrayImage;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;
use thiserror::Error;

const FERPLUS_INPUT_SIZE: u32 = 64;
/// FER+ output order. Labels follow the short adjective form used in the log.
pub const FERPLUS_LABELS: [&str; 8] = [
    "neutral", "happy", "surprise", "sad", "angry", "disgust", "fear", "contempt",
];
pub const FERPLUS_MODEL_FILE: &str = "emotion-ferplus-8.onnx";

#[derive(Error, Debug)]
pub enum ClassifierError {
    #[error("model file not found: {0} — download emotion-ferplus-8.onnx from the ONNX model zoo")]
    ModelNotFound(String),
    #[error("invalid frame: {0}")]
    InvalidFrame(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("face detection failed: {0}")]
    Detector(#[from] DetectorError),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// Anything that can name the dominant emotion in a grayscale frame.
pub trait EmotionClassifier {
    fn classify(
        &mut self,
        gray: &[u8],
        width: u32,
        height: u32,
    ) -> Result<Classification, ClassifierError>;
}

/// FER+ (emotion-ferplus-8) classifier.
pub struct FerPlusClassifier {
    session: Session,
}

impl FerPlusClassifier {
    /// Load the FER+ ONNX model from the given path.
    pub fn load(model_path: &str) -> Result<Self, ClassifierError> {
        if !Path::new(model_path).exists() {
            return Err(ClassifierError::ModelNotFound(model_path.to_string()));
        }

        let session = Session::builder()?
            .with_intra_threads(2)?
            .commit_from_file(model_path)?;

        tracing::info!(
            path = model_path,
            inputs = ?session.inputs().iter().map(|i| (i.name(), i.dtype())).collect::<Vec<_>>(),
            outputs = ?session.outputs().iter().map(|o| o.name()).collect::<Vec<_>>(),
            "loaded FER+ model"
        );

        Ok(Self { session })
    }

    /// Classify one square region of the frame.
    pub fn classify_region(
        &mut self,
        gray: &[u8],
        width: u32,
        height: u32,
        region: CropRegion,
    ) -> Result<Classification, ClassifierError> {
        let input = Self::preprocess(gray, width, height, region)?;

        let outputs = self.session.run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let (_, logits) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| ClassifierError::InferenceFailed(format!("score extraction: {e}")))?;

        if logits.len() != FERPLUS_LABELS.len() {
            return Err(ClassifierError::InferenceFailed(format!(
                "expected {} scores, got {}",
                FERPLUS_LABELS.len(),
                logits.len()
            )));
        }

        dominant(&FERPLUS_LABELS, &softmax(logits))
            .ok_or_else(|| ClassifierError::InferenceFailed("scores are not finite".into()))
    }

    /// Crop `region` and resize it into a 1x1x64x64 tensor.
    ///
    /// FER+ expects raw 0–255 intensities, so no normalization is applied.
    fn preprocess(
        gray: &[u8],
        width: u32,
        height: u32,
        region: CropRegion,
    ) -> Result<Array4<f32>, ClassifierError> {
        let expected = width as usize * height as usize;
        if width == 0 || height == 0 || gray.len() < expected {
            return Err(ClassifierError::InvalidFrame(format!(
                "{width}x{height} frame needs {expected} bytes, got {}",
                gray.len()
            )));
        }

        let img = GrayImage::from_raw(width, height, gray[..expected].to_vec()).ok_or_else(|| {
            ClassifierError::InvalidFrame(format!("cannot wrap {width}x{height} buffer"))
        })?;

        if region.side == 0 || region.x + region.side > width || region.y + region.side > height {
            return Err(ClassifierError::InvalidFrame(format!(
                "crop {region:?} outside {width}x{height} frame"
            )));
        }
        let square = imageops::crop_imm(&img, region.x, region.y, region.side, region.side)
            .to_image();
        let resized = imageops::resize(
            &square,
            FERPLUS_INPUT_SIZE,
            FERPLUS_INPUT_SIZE,
            FilterType::Triangle,
        );

        let size = FERPLUS_INPUT_SIZE as usize;
        let mut tensor = Array4::<f32>::zeros((1, 1, size, size));
        for (x, y, pixel) in resized.enumerate_pixels() {
            tensor[[0, 0, y as usize, x as usize]] = pixel.0[0] as f32;
        }

        Ok(tensor)
    }
}

impl EmotionClassifier for FerPlusClassifier {
    fn classify(
        &mut self,
        gray: &[u8],
        width: u32,
        height: u32,
    ) -> Result<Classification, ClassifierError> {
        self.classify_region(gray, width, height, CropRegion::centered(width, height))
    }
}

/// Numerically stable softmax.
pub fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|&v| (v - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    if sum > 0.0 {
        exps.iter().map(|v| v / sum).collect()
    } else {
        exps
    }
}

/// Pick the highest-probability label. `None` if no probability is finite.
pub fn dominant(labels: &[&str], probs: &[f32]) -> Option<Classification> {
    let (idx, &confidence) = probs
        .iter()
        .enumerate()
        .filter(|(_, p)| p.is_finite())
        .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))?;

    Some(Classification {
        label: labels.get(idx)?.to_string(),
        confidence,
        scores: labels
            .iter()
            .zip(probs)
            .map(|(l, &p)| (l.to_string(), p))
            .collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_softmax_sums_to_one() {
        let probs = softmax(&[1.0, 2.0, 3.0, -4.0]);
        let sum: f32 = probs.iter().sum();
        assert!((sum - 1.0).abs() < 1e-6);
        assert!(probs[2] > probs[1] && probs[1] > probs[0]);
    }

    #[test]
    fn test_softmax_large_logits_stable() {
        let probs = softmax(&[1000.0, 1000.0]);
        assert!((probs[0] - 0.5).abs() < 1e-6);
        assert!(probs.iter().all(|p| p.is_finite()));
    }

    #[test]
    fn test_dominant_picks_max() {
        let probs = [0.05, 0.7, 0.05, 0.05, 0.05, 0.04, 0.03, 0.03];
        let c = dominant(&FERPLUS_LABELS, &probs).unwrap();
        assert_eq!(c.label, "happy");
        assert!((c.confidence - 0.7).abs() < 1e-6);
        assert_eq!(c.scores.len(), FERPLUS_LABELS.len());
        assert_eq!(c.scores[3].0, "sad");
    }

    #[test]
    fn test_dominant_rejects_non_finite() {
        assert!(dominant(&["a", "b"], &[f32::NAN, f32::NAN]).is_none());
        assert!(dominant(&["a"], &[]).is_none());
    }

    #[test]
    fn test_preprocess_output_shape() {
        let gray = vec![128u8; 640 * 360];
        let region = CropRegion::centered(640, 360);
        let tensor = FerPlusClassifier::preprocess(&gray, 640, 360, region).unwrap();
        assert_eq!(tensor.shape(), &[1, 1, 64, 64]);
    }

    #[test]
    fn test_preprocess_keeps_raw_intensity() {
        let gray = vec![200u8; 100 * 80];
        let region = CropRegion::centered(100, 80);
        let tensor = FerPlusClassifier::preprocess(&gray, 100, 80, region).unwrap();
        assert!(tensor.iter().all(|&v| (v - 200.0).abs() < 1e-3));
    }

    #[test]
    fn test_preprocess_rejects_short_buffer() {
        let gray = vec![0u8; 10];
        let region = CropRegion::centered(64, 64);
        let err = FerPlusClassifier::preprocess(&gray, 64, 64, region).unwrap_err();
        assert!(matches!(err, ClassifierError::InvalidFrame(_)));
    }

    #[test]
    fn test_preprocess_uses_region_pixels() {
        // Left half dark, right half bright; a crop inside the right half
        // must see only bright pixels.
        let (w, h) = (100u32, 40u32);
        let gray: Vec<u8> = (0..w * h).map(|i| if i % w < 50 { 10 } else { 240 }).collect();
        let region = CropRegion { x: 55, y: 0, side: 40 };
        let tensor = FerPlusClassifier::preprocess(&gray, w, h, region).unwrap();
        assert!(tensor.iter().all(|&v| (v - 240.0).abs() < 1e-3));
    }

    #[test]
    fn test_preprocess_rejects_region_outside_frame() {
        let gray = vec![0u8; 100 * 40];
        let region = CropRegion { x: 80, y: 0, side: 40 };
        let err = FerPlusClassifier::preprocess(&gray, 100, 40, region).unwrap_err();
        assert!(matches!(err, ClassifierError::InvalidFrame(_)));
    }
}
