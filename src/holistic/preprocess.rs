use super::roi::Roi;
use super::types::SegmentationMask;
use image::{imageops, RgbImage};
use ndarray::Array4;

/// Preprocessor for converting RGB crops to model input tensors
pub struct Preprocessor {
    target_size: u32,
}

impl Preprocessor {
    pub fn new(target_size: u32) -> Self {
        Self { target_size }
    }

    pub fn target_size(&self) -> u32 {
        self.target_size
    }

    /// Preprocess an RGB image into a normalized NHWC tensor
    ///
    /// Steps:
    /// 1. Resize to the square target size
    /// 2. Convert to float and normalize to [0, 1]
    ///
    /// Returns: Array4<f32> with shape [1, size, size, 3]
    pub fn preprocess(&self, image: &RgbImage) -> Array4<f32> {
        let _span = tracing::debug_span!("preprocess").entered();

        let size = self.target_size;
        let resized;
        let image = if image.dimensions() != (size, size) {
            resized = imageops::resize(image, size, size, imageops::FilterType::Triangle);
            &resized
        } else {
            image
        };

        let mut tensor = Array4::<f32>::zeros((1, size as usize, size as usize, 3));
        for (x, y, pixel) in image.enumerate_pixels() {
            for c in 0..3 {
                tensor[[0, y as usize, x as usize, c]] = pixel[c] as f32 / 255.0;
            }
        }
        tensor
    }

    /// Project a square model-resolution mask from `roi` back onto the frame
    ///
    /// Pixels outside the region are background. Values are sampled bilinearly.
    pub fn project_mask(
        mask: &[f32],
        mask_size: u32,
        roi: &Roi,
        frame_width: u32,
        frame_height: u32,
    ) -> SegmentationMask {
        let _span = tracing::debug_span!("project_mask").entered();

        let n = mask_size as usize;
        let scale = mask_size as f32 / roi.side;
        let sample = |u: f32, v: f32| -> f32 {
            let u = u.clamp(0.0, (n - 1) as f32);
            let v = v.clamp(0.0, (n - 1) as f32);
            let (u0, v0) = (u.floor() as usize, v.floor() as usize);
            let (u1, v1) = ((u0 + 1).min(n - 1), (v0 + 1).min(n - 1));
            let (fu, fv) = (u - u0 as f32, v - v0 as f32);
            let at = |x: usize, y: usize| mask.get(y * n + x).copied().unwrap_or(0.0);
            let top = at(u0, v0) * (1.0 - fu) + at(u1, v0) * fu;
            let bottom = at(u0, v1) * (1.0 - fu) + at(u1, v1) * fu;
            top * (1.0 - fv) + bottom * fv
        };

        let mut out = Vec::with_capacity(frame_width as usize * frame_height as usize);
        for y in 0..frame_height {
            for x in 0..frame_width {
                let rx = x as f32 + 0.5 - roi.left;
                let ry = y as f32 + 0.5 - roi.top;
                if rx < 0.0 || ry < 0.0 || rx >= roi.side || ry >= roi.side {
                    out.push(0.0);
                    continue;
                }
                out.push(sample(rx * scale - 0.5, ry * scale - 0.5));
            }
        }
        out
    }
}

pub fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}
