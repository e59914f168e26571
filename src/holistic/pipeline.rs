use super::pose::{self, PoseLandmarker};
use super::preprocess::Preprocessor;
use super::region::{RegionKind, RegionLandmarker};
use super::roi::{pixel_points, Roi};
use super::types::{HolisticModel, HolisticOptions, HolisticResult, Landmark, LandmarkSet};
use anyhow::Result;
use image::RgbImage;
use std::path::PathBuf;

const FACE_ROI_SCALE: f32 = 1.8;
const HAND_ROI_SCALE: f32 = 2.7;
const MIN_REGION_SIDE: f32 = 16.0;

/// Model files for the holistic pipeline; face and hands are optional
#[derive(Debug, Clone, Default)]
pub struct HolisticModelPaths {
    pub pose: PathBuf,
    pub face: Option<PathBuf>,
    pub hand: Option<PathBuf>,
}

/// Pose-driven holistic estimator
///
/// The pose model runs on the letterboxed frame (or on the region tracked
/// from the previous frame). Face and hand crops are derived from the pose
/// landmarks, the way MediaPipe Holistic chains its sub-graphs.
pub struct OnnxHolistic {
    options: HolisticOptions,
    pose: PoseLandmarker,
    face: Option<RegionLandmarker>,
    hand: Option<RegionLandmarker>,

    // Region to search in the next frame while the pose is tracked
    tracked_roi: Option<Roi>,
}

impl OnnxHolistic {
    pub fn new(paths: &HolisticModelPaths, options: HolisticOptions) -> Result<Self> {
        let face = paths
            .face
            .as_ref()
            .map(|p| RegionLandmarker::new(RegionKind::Face, p))
            .transpose()?;
        let hand = paths
            .hand
            .as_ref()
            .map(|p| RegionLandmarker::new(RegionKind::Hand, p))
            .transpose()?;

        if face.is_none() {
            tracing::info!("No face model configured; face landmarks will be empty");
        }
        if hand.is_none() {
            tracing::info!("No hand model configured; hand landmarks will be empty");
        }

        Ok(Self {
            options,
            pose: PoseLandmarker::new(&paths.pose)?,
            face,
            hand,
            tracked_roi: None,
        })
    }

    fn detect_region(
        model: Option<&mut RegionLandmarker>,
        frame: &RgbImage,
        roi: Option<Roi>,
        threshold: f32,
    ) -> Result<LandmarkSet> {
        let (Some(model), Some(roi)) = (model, roi) else {
            return Ok(None);
        };
        let detection = model.detect(frame, roi)?;
        Ok((detection.score >= threshold).then_some(detection.landmarks))
    }
}

impl HolisticModel for OnnxHolistic {
    fn process(&mut self, frame: &RgbImage) -> Result<HolisticResult> {
        let _span = tracing::debug_span!("holistic").entered();
        let (width, height) = frame.dimensions();

        let (roi, threshold) = match self.tracked_roi {
            Some(roi) => (roi, self.options.min_tracking_confidence),
            None => (Roi::full_frame(width, height), self.options.min_detection_confidence),
        };

        let detection = self.pose.detect(frame, roi)?;
        if detection.score < threshold {
            if self.tracked_roi.take().is_some() {
                tracing::debug!("Lost pose track (score {:.2})", detection.score);
            }
            return Ok(HolisticResult::default());
        }
        self.tracked_roi = pose::tracking_roi(&detection.landmarks, width, height);

        let face_roi = Roi::around(
            pixel_points(&detection.landmarks, &pose::FACE_POINTS, width, height),
            FACE_ROI_SCALE,
            MIN_REGION_SIDE,
            width,
            height,
        );
        let min_conf = self.options.min_detection_confidence;
        let face_landmarks = Self::detect_region(self.face.as_mut(), frame, face_roi, min_conf)?;

        let left_roi = hand_roi(
            &detection.landmarks,
            [pose::LEFT_WRIST, pose::LEFT_PINKY, pose::LEFT_INDEX],
            min_conf,
            width,
            height,
        );
        let right_roi = hand_roi(
            &detection.landmarks,
            [pose::RIGHT_WRIST, pose::RIGHT_PINKY, pose::RIGHT_INDEX],
            min_conf,
            width,
            height,
        );
        let left_hand_landmarks = Self::detect_region(self.hand.as_mut(), frame, left_roi, min_conf)?;
        let right_hand_landmarks = Self::detect_region(self.hand.as_mut(), frame, right_roi, min_conf)?;

        let segmentation_mask = if self.options.enable_segmentation {
            detection.mask.as_ref().map(|mask| {
                Preprocessor::project_mask(mask, pose::INPUT_SIZE, &detection.roi, width, height)
            })
        } else {
            None
        };

        Ok(HolisticResult {
            face_landmarks,
            pose_landmarks: Some(detection.landmarks),
            pose_world_landmarks: Some(detection.world_landmarks),
            left_hand_landmarks,
            right_hand_landmarks,
            segmentation_mask,
        })
    }

    fn reset_state(&mut self) {
        tracing::info!("Resetting holistic tracking state");
        self.tracked_roi = None;
    }
}

/// Hand crop from the wrist, pinky and index pose landmarks, if the wrist is visible
fn hand_roi(
    landmarks: &[Landmark],
    indices: [usize; 3],
    min_visibility: f32,
    width: u32,
    height: u32,
) -> Option<Roi> {
    let wrist = landmarks.get(indices[0])?;
    if wrist.visibility < min_visibility {
        return None;
    }
    Roi::around(
        pixel_points(landmarks, &indices, width, height),
        HAND_ROI_SCALE,
        MIN_REGION_SIDE,
        width,
        height,
    )
}
