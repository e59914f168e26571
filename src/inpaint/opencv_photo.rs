use anyhow::{ensure, Context, Result};
use image::{GrayImage, RgbImage};
use opencv::core::{Mat, VecN};
use opencv::photo;
use opencv::prelude::*;

/// `cv::inpaint` with `INPAINT_TELEA`
///
/// Channel order does not matter here, so the RGB buffer goes in as is.
pub fn inpaint_telea(image: &mut RgbImage, mask: &GrayImage, radius: f32) -> Result<()> {
    let _span = tracing::debug_span!("inpaint_opencv").entered();

    ensure!(
        image.dimensions() == mask.dimensions(),
        "inpainting mask must match the frame"
    );
    if mask.as_raw().iter().all(|&v| v == 0) {
        return Ok(());
    }

    let rows = image.height() as i32;
    let cols = image.width() as i32;
    let pixels: Vec<VecN<u8, 3>> = image.pixels().map(|p| VecN(p.0)).collect();

    let src = Mat::new_rows_cols_with_data(rows, cols, &pixels)
        .context("Failed to wrap frame for OpenCV")?
        .try_clone()?;
    let mask = Mat::new_rows_cols_with_data(rows, cols, mask.as_raw().as_slice())
        .context("Failed to wrap mask for OpenCV")?
        .try_clone()?;

    let mut dst = Mat::default();
    photo::inpaint(&src, &mask, &mut dst, radius as f64, photo::INPAINT_TELEA)
        .context("cv::inpaint failed")?;

    let filled = dst.data_bytes().context("Inpainted frame is not contiguous")?;
    ensure!(
        filled.len() == image.as_raw().len(),
        "cv::inpaint returned {} bytes for a {}x{} frame",
        filled.len(),
        cols,
        rows
    );
    image.copy_from_slice(filled);
    Ok(())
}
