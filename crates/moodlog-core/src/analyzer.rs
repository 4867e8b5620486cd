//! Face-aware emotion analysis: detect, crop the best face, classify.
//!
//! Frames with no detectable face are still classified, using the centre
//! square of the frame.

use crate::classifier::{ClassifierError, EmotionClassifier, FerPlusClassifier};
use crate::detector::FaceDetector;
use crate::types::{Classification, FaceBox};

/// Crop side relative to the longer edge of the face box.
const FACE_MARGIN: f32 = 1.2;

/// Square region of a frame, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRegion {
    pub x: u32,
    pub y: u32,
    pub side: u32,
}

impl CropRegion {
    /// Largest centred square.
    pub fn centered(width: u32, height: u32) -> Self {
        let side = width.min(height);
        Self {
            x: (width - side) / 2,
            y: (height - side) / 2,
            side,
        }
    }

    /// Square around `face`, enlarged by `FACE_MARGIN` and shifted to lie
    /// inside the frame. `None` if the box is degenerate or its centre is
    /// off-frame.
    pub fn around_face(face: &FaceBox, width: u32, height: u32) -> Option<Self> {
        let limit = width.min(height);
        let (cx, cy) = face.center();
        if limit == 0
            || !(face.width > 0.0 && face.height > 0.0)
            || !(cx >= 0.0 && cx < width as f32)
            || !(cy >= 0.0 && cy < height as f32)
        {
            return None;
        }

        let side = ((face.width.max(face.height) * FACE_MARGIN).round() as u32).clamp(1, limit);
        let half = side as f32 / 2.0;
        let x = ((cx - half).round().max(0.0) as u32).min(width - side);
        let y = ((cy - half).round().max(0.0) as u32).min(height - side);
        Some(Self { x, y, side })
    }
}

/// Crop around the highest-scoring usable face, else the frame centre.
pub fn select_crop(faces: &[FaceBox], width: u32, height: u32) -> CropRegion {
    faces
        .iter()
        .filter_map(|f| CropRegion::around_face(f, width, height).map(|r| (f.score, r)))
        .max_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(_, region)| region)
        .unwrap_or_else(|| CropRegion::centered(width, height))
}

/// FER+ classification of the most prominent face in each frame.
///
/// Without a detector every frame uses the centre crop.
pub struct FaceEmotionAnalyzer {
    detector: Option<FaceDetector>,
    classifier: FerPlusClassifier,
}

impl FaceEmotionAnalyzer {
    pub fn new(detector: Option<FaceDetector>, classifier: FerPlusClassifier) -> Self {
        Self {
            detector,
            classifier,
        }
    }

    pub fn has_detector(&self) -> bool {
        self.detector.is_some()
    }
}

impl EmotionClassifier for FaceEmotionAnalyzer {
    fn classify(
        &mut self,
        gray: &[u8],
        width: u32,
        height: u32,
    ) -> Result<Classification, ClassifierError> {
        let region = match self.detector.as_mut() {
            Some(detector) => {
                let faces = detector.detect(gray, width, height)?;
                if faces.is_empty() {
                    tracing::debug!("no face found, classifying frame centre");
                }
                select_crop(&faces, width, height)
            }
            None => CropRegion::centered(width, height),
        };
        tracing::trace!(?region, "crop selected");
        self.classifier.classify_region(gray, width, height, region)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn face(x: f32, y: f32, w: f32, h: f32, score: f32) -> FaceBox {
        FaceBox {
            x,
            y,
            width: w,
            height: h,
            score,
        }
    }

    #[test]
    fn test_centered_landscape_and_portrait() {
        assert_eq!(CropRegion::centered(640, 480), CropRegion { x: 80, y: 0, side: 480 });
        assert_eq!(CropRegion::centered(300, 500), CropRegion { x: 0, y: 100, side: 300 });
    }

    #[test]
    fn test_crop_around_face_adds_margin() {
        let f = face(270.0, 190.0, 100.0, 100.0, 0.9);
        let region = CropRegion::around_face(&f, 640, 480).unwrap();
        assert_eq!(region, CropRegion { x: 260, y: 180, side: 120 });
    }

    #[test]
    fn test_crop_clamped_at_frame_corner() {
        let f = face(600.0, 400.0, 60.0, 60.0, 0.9);
        let region = CropRegion::around_face(&f, 640, 480).unwrap();
        assert_eq!(region, CropRegion { x: 568, y: 394, side: 72 });
        assert!(region.x + region.side <= 640 && region.y + region.side <= 480);
    }

    #[test]
    fn test_crop_never_exceeds_frame() {
        let f = face(-100.0, -100.0, 900.0, 700.0, 0.9);
        let region = CropRegion::around_face(&f, 640, 480).unwrap();
        assert_eq!(region.side, 480);
        assert!(region.x + region.side <= 640 && region.y + region.side <= 480);
    }

    #[test]
    fn test_crop_rejects_degenerate_boxes() {
        assert!(CropRegion::around_face(&face(10.0, 10.0, 0.0, 50.0, 0.9), 640, 480).is_none());
        assert!(CropRegion::around_face(&face(f32::NAN, 0.0, 50.0, 50.0, 0.9), 640, 480).is_none());
        assert!(CropRegion::around_face(&face(700.0, 10.0, 50.0, 50.0, 0.9), 640, 480).is_none());
    }

    #[test]
    fn test_select_crop_prefers_highest_score() {
        let faces = vec![
            face(20.0, 100.0, 100.0, 100.0, 0.6),
            face(500.0, 100.0, 100.0, 100.0, 0.95),
            face(300.0, 300.0, 50.0, 50.0, 0.7),
        ];
        let region = select_crop(&faces, 640, 480);
        assert_eq!(region, CropRegion::around_face(&faces[1], 640, 480).unwrap());
    }

    #[test]
    fn test_select_crop_skips_unusable_best() {
        let faces = vec![
            face(700.0, 100.0, 100.0, 100.0, 0.99),
            face(20.0, 100.0, 100.0, 100.0, 0.6),
        ];
        let region = select_crop(&faces, 640, 480);
        assert_eq!(region, CropRegion::around_face(&faces[1], 640, 480).unwrap());
    }

    #[test]
    fn test_select_crop_without_faces_uses_centre() {
        assert_eq!(select_crop(&[], 640, 480), CropRegion::centered(640, 480));
    }
}
