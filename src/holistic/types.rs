use anyhow::Result;
use image::RgbImage;

/// Predicted keypoint
///
/// Image-space landmarks are normalized to the frame: `x` and `y` in [0, 1],
/// `z` on roughly the same scale as `x`. World-space pose landmarks are in
/// meters with the origin between the hips.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub visibility: f32,
}

/// Landmarks for one body part, `None` when nothing was detected
pub type LandmarkSet = Option<Vec<Landmark>>;

/// Foreground probability per pixel (0.0 = background, 1.0 = subject)
/// Dimensions match the input frame, row-major
pub type SegmentationMask = Vec<f32>;

/// Everything a holistic estimator reports for one frame
#[derive(Debug, Clone, Default)]
pub struct HolisticResult {
    pub face_landmarks: LandmarkSet,
    pub pose_landmarks: LandmarkSet,
    pub pose_world_landmarks: LandmarkSet,
    pub left_hand_landmarks: LandmarkSet,
    pub right_hand_landmarks: LandmarkSet,
    pub segmentation_mask: Option<SegmentationMask>,
}

/// Thresholds and switches for holistic inference
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HolisticOptions {
    /// Minimum presence score for a fresh detection
    pub min_detection_confidence: f32,
    /// Minimum presence score to keep tracking from the previous frame
    pub min_tracking_confidence: f32,
    pub enable_segmentation: bool,
}

impl Default for HolisticOptions {
    fn default() -> Self {
        Self {
            min_detection_confidence: 0.5,
            min_tracking_confidence: 0.5,
            enable_segmentation: true,
        }
    }
}

/// Trait for holistic landmark estimators
/// Allows swapping the ONNX pipeline for other backends (or fakes in tests)
pub trait HolisticModel: Send {
    /// Process an RGB frame
    fn process(&mut self, frame: &RgbImage) -> Result<HolisticResult>;

    /// Reset tracking state
    ///
    /// Call this when starting a new video session.
    fn reset_state(&mut self) {
        // Default implementation: no-op for stateless models
    }
}
