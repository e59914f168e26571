//! Alpha-mask compositing of a rendered overlay onto the retained frame.

use image::{imageops, Rgb, RgbImage, Rgba, RgbaImage};

/// Pad an RGB frame with a fully opaque alpha channel
pub fn pad_opaque(frame: &RgbImage) -> RgbaImage {
    RgbaImage::from_fn(frame.width(), frame.height(), |x, y| {
        let Rgb([r, g, b]) = *frame.get_pixel(x, y);
        Rgba([r, g, b, 255])
    })
}

/// Select per pixel: the padded frame where the overlay is fully transparent, the overlay otherwise
///
/// Both images must have the same dimensions.
pub fn composite_rgba(frame: &RgbImage, overlay: &RgbaImage) -> RgbaImage {
    assert_eq!(
        frame.dimensions(),
        overlay.dimensions(),
        "overlay must be resized to the frame before compositing"
    );

    let mut out = pad_opaque(frame);
    for (dst, src) in out.pixels_mut().zip(overlay.pixels()) {
        if src[3] != 0 {
            *dst = *src;
        }
    }
    out
}

/// Resize the overlay to the frame, composite, and drop the alpha channel
pub fn composite(frame: &RgbImage, overlay: &RgbaImage) -> RgbImage {
    let _span = tracing::debug_span!("composite").entered();

    let (width, height) = frame.dimensions();
    let resized;
    let overlay = if overlay.dimensions() != (width, height) {
        tracing::debug!(
            "Resizing overlay {}x{} -> {}x{}",
            overlay.width(),
            overlay.height(),
            width,
            height
        );
        resized = imageops::resize(overlay, width, height, imageops::FilterType::Triangle);
        &resized
    } else {
        overlay
    };

    let rgba = composite_rgba(frame, overlay);
    RgbImage::from_fn(width, height, |x, y| {
        let Rgba([r, g, b, _]) = *rgba.get_pixel(x, y);
        Rgb([r, g, b])
    })
}
