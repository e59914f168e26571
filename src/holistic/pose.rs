use super::onnx::{output_with_len, OnnxModel};
use super::preprocess::{sigmoid, Preprocessor};
use super::roi::{pixel_points, Roi};
use super::types::Landmark;
use anyhow::{Context, Result};
use image::RgbImage;
use std::path::Path;

/// Number of body landmarks reported (the model also predicts 6 auxiliary points)
pub const POSE_LANDMARKS: usize = 33;
const MODEL_LANDMARKS: usize = 39;
pub const INPUT_SIZE: u32 = 256;

pub const LEFT_WRIST: usize = 15;
pub const RIGHT_WRIST: usize = 16;
pub const LEFT_PINKY: usize = 17;
pub const RIGHT_PINKY: usize = 18;
pub const LEFT_INDEX: usize = 19;
pub const RIGHT_INDEX: usize = 20;
/// Nose, eyes, ears and mouth corners
pub const FACE_POINTS: [usize; 11] = [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10];

const TRACKING_ROI_SCALE: f32 = 1.25;

/// Pose landmarks for one region
#[derive(Debug, Clone)]
pub struct PoseDetection {
    pub score: f32,
    pub landmarks: Vec<Landmark>,
    pub world_landmarks: Vec<Landmark>,
    /// Foreground probability at model resolution, covering the region
    pub mask: Option<Vec<f32>>,
    pub roi: Roi,
}

/// BlazePose landmark model (256x256 full-body variant)
///
/// Expected outputs, in order: landmarks [1, 195], presence [1, 1],
/// segmentation logits [1, 256, 256, 1], heatmap, world landmarks [1, 117].
pub struct PoseLandmarker {
    model: OnnxModel,
    preprocessor: Preprocessor,
}

impl PoseLandmarker {
    pub fn new<P: AsRef<Path>>(model_path: P) -> Result<Self> {
        Ok(Self {
            model: OnnxModel::load("pose", model_path)?,
            preprocessor: Preprocessor::new(INPUT_SIZE),
        })
    }

    pub fn detect(&mut self, frame: &RgbImage, roi: Roi) -> Result<PoseDetection> {
        let _span = tracing::debug_span!("pose").entered();

        let crop = roi.crop(frame, INPUT_SIZE);
        let outputs = self.model.run(self.preprocessor.preprocess(&crop))?;

        let raw = output_with_len(&outputs, MODEL_LANDMARKS * 5)
            .context("pose model has no landmark output")?;
        let score = output_with_len(&outputs, 1)
            .and_then(|o| o.first().copied())
            .context("pose model has no presence output")?;
        let world = output_with_len(&outputs, MODEL_LANDMARKS * 3)
            .context("pose model has no world landmark output")?;
        let mask = output_with_len(&outputs, (INPUT_SIZE * INPUT_SIZE) as usize)
            .map(|logits| logits.iter().map(|&v| sigmoid(v)).collect());

        let (landmarks, world_landmarks) = decode_landmarks(raw, world, &roi, frame.width(), frame.height());
        Ok(PoseDetection {
            score,
            landmarks,
            world_landmarks,
            mask,
            roi,
        })
    }
}

/// Convert raw model output to frame-normalized and world landmarks
fn decode_landmarks(
    raw: &[f32],
    world: &[f32],
    roi: &Roi,
    frame_width: u32,
    frame_height: u32,
) -> (Vec<Landmark>, Vec<Landmark>) {
    let size = INPUT_SIZE as f32;
    let depth_scale = roi.depth_scale(frame_width);

    let mut landmarks = Vec::with_capacity(POSE_LANDMARKS);
    let mut world_landmarks = Vec::with_capacity(POSE_LANDMARKS);
    for i in 0..POSE_LANDMARKS {
        let p = &raw[i * 5..i * 5 + 5];
        let visibility = sigmoid(p[3]);
        let (x, y) = roi.to_frame(p[0] / size, p[1] / size, frame_width, frame_height);
        landmarks.push(Landmark {
            x,
            y,
            z: p[2] / size * depth_scale,
            visibility,
        });

        let w = &world[i * 3..i * 3 + 3];
        world_landmarks.push(Landmark {
            x: w[0],
            y: w[1],
            z: w[2],
            visibility,
        });
    }
    (landmarks, world_landmarks)
}

/// Region to search in the next frame, from the visible landmarks of this one
pub fn tracking_roi(landmarks: &[Landmark], frame_width: u32, frame_height: u32) -> Option<Roi> {
    let visible: Vec<usize> = landmarks
        .iter()
        .enumerate()
        .filter(|(_, lm)| lm.visibility > 0.5)
        .map(|(i, _)| i)
        .collect();
    Roi::around(
        pixel_points(landmarks, &visible, frame_width, frame_height),
        TRACKING_ROI_SCALE,
        INPUT_SIZE as f32 / 4.0,
        frame_width,
        frame_height,
    )
}
