#[cfg(feature = "opencv")]
mod opencv_photo;
#[cfg(not(feature = "opencv"))]
mod telea;

use anyhow::Result;
use image::{GrayImage, RgbImage};

/// Remove the masked pixels from `image` with Telea's fast marching method
///
/// Nonzero mask pixels are reconstructed from known pixels within `radius`.
/// Built with the `opencv` feature this calls `cv::inpaint`; otherwise the
/// pure Rust solver runs.
pub fn inpaint(image: &mut RgbImage, mask: &GrayImage, radius: f32) -> Result<()> {
    #[cfg(feature = "opencv")]
    {
        opencv_photo::inpaint_telea(image, mask, radius)
    }

    #[cfg(not(feature = "opencv"))]
    {
        telea::inpaint_telea(image, mask, radius);
        Ok(())
    }
}

/// Binarize a foreground probability map into an 8-bit inpainting mask
///
/// Pixels with probability at or above `threshold` become 255, the rest 0.
pub fn mask_from_probabilities(probabilities: &[f32], width: u32, height: u32, threshold: f32) -> GrayImage {
    GrayImage::from_fn(width, height, |x, y| {
        let idx = (y * width + x) as usize;
        let value = probabilities.get(idx).copied().unwrap_or(0.0);
        image::Luma([if value >= threshold { 255 } else { 0 }])
    })
}
