use super::onnx::{output_with_len, OnnxModel};
use super::preprocess::{sigmoid, Preprocessor};
use super::roi::Roi;
use super::types::Landmark;
use anyhow::{Context, Result};
use image::RgbImage;
use std::path::Path;

/// Landmark models that run on a crop derived from the pose
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionKind {
    /// Face mesh: 192x192 input, 468 points, presence as a logit
    Face,
    /// Hand landmarks: 224x224 input, 21 points, presence as a probability
    Hand,
}

impl RegionKind {
    fn name(self) -> &'static str {
        match self {
            RegionKind::Face => "face",
            RegionKind::Hand => "hand",
        }
    }

    fn input_size(self) -> u32 {
        match self {
            RegionKind::Face => 192,
            RegionKind::Hand => 224,
        }
    }

    pub fn landmark_count(self) -> usize {
        match self {
            RegionKind::Face => 468,
            RegionKind::Hand => 21,
        }
    }

    fn presence(self, raw: f32) -> f32 {
        match self {
            RegionKind::Face => sigmoid(raw),
            RegionKind::Hand => raw,
        }
    }
}

/// Landmarks plus the presence score they were accepted with
#[derive(Debug, Clone)]
pub struct RegionDetection {
    pub score: f32,
    pub landmarks: Vec<Landmark>,
}

pub struct RegionLandmarker {
    kind: RegionKind,
    model: OnnxModel,
    preprocessor: Preprocessor,
}

impl RegionLandmarker {
    pub fn new<P: AsRef<Path>>(kind: RegionKind, model_path: P) -> Result<Self> {
        Ok(Self {
            kind,
            model: OnnxModel::load(kind.name(), model_path)?,
            preprocessor: Preprocessor::new(kind.input_size()),
        })
    }

    pub fn detect(&mut self, frame: &RgbImage, roi: Roi) -> Result<RegionDetection> {
        let _span = tracing::debug_span!("region", kind = self.kind.name()).entered();

        let size = self.preprocessor.target_size();
        let crop = roi.crop(frame, size);
        let outputs = self.model.run(self.preprocessor.preprocess(&crop))?;

        let count = self.kind.landmark_count();
        let raw = output_with_len(&outputs, count * 3)
            .with_context(|| format!("{} model has no landmark output", self.kind.name()))?;
        let score = output_with_len(&outputs, 1)
            .and_then(|o| o.first().copied())
            .map(|v| self.kind.presence(v))
            .with_context(|| format!("{} model has no presence output", self.kind.name()))?;

        Ok(RegionDetection {
            score,
            landmarks: decode_points(raw, count, size, &roi, frame.width(), frame.height()),
        })
    }
}

fn decode_points(
    raw: &[f32],
    count: usize,
    input_size: u32,
    roi: &Roi,
    frame_width: u32,
    frame_height: u32,
) -> Vec<Landmark> {
    let size = input_size as f32;
    let depth_scale = roi.depth_scale(frame_width);
    raw.chunks_exact(3)
        .take(count)
        .map(|p| {
            let (x, y) = roi.to_frame(p[0] / size, p[1] / size, frame_width, frame_height);
            Landmark {
                x,
                y,
                z: p[2] / size * depth_scale,
                visibility: 0.0,
            }
        })
        .collect()
}
