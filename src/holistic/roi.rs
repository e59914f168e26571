use super::types::Landmark;
use image::{imageops, RgbImage};

// Upper bound on a region's side, relative to the frame's long side
const MAX_SIDE_FACTOR: f32 = 2.0;

/// Axis-aligned square region of interest in frame pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Roi {
    pub left: f32,
    pub top: f32,
    pub side: f32,
}

impl Roi {
    /// Square covering the whole frame, letterboxed around its center
    pub fn full_frame(width: u32, height: u32) -> Self {
        let side = width.max(height) as f32;
        Self::centered(width as f32 / 2.0, height as f32 / 2.0, side)
    }

    pub fn centered(cx: f32, cy: f32, side: f32) -> Self {
        let side = side.round().max(1.0);
        Self {
            left: (cx - side / 2.0).round(),
            top: (cy - side / 2.0).round(),
            side,
        }
    }

    /// Square around the bounding box of `points` (frame pixels), scaled by `scale`
    ///
    /// The side is at least `min_side` and at most twice the long side of the
    /// frame. Non-finite points are skipped.
    pub fn around<I>(points: I, scale: f32, min_side: f32, frame_width: u32, frame_height: u32) -> Option<Self>
    where
        I: IntoIterator<Item = (f32, f32)>,
    {
        let mut min = (f32::INFINITY, f32::INFINITY);
        let mut max = (f32::NEG_INFINITY, f32::NEG_INFINITY);
        let mut count = 0;
        for (x, y) in points.into_iter().filter(|(x, y)| x.is_finite() && y.is_finite()) {
            min = (min.0.min(x), min.1.min(y));
            max = (max.0.max(x), max.1.max(y));
            count += 1;
        }
        if count == 0 {
            return None;
        }

        let max_side = (MAX_SIDE_FACTOR * frame_width.max(frame_height) as f32).max(min_side);
        let side = ((max.0 - min.0).max(max.1 - min.1) * scale).clamp(min_side, max_side);
        Some(Self::centered(
            (min.0 + max.0) / 2.0,
            (min.1 + max.1) / 2.0,
            side,
        ))
    }

    /// Crop the region (zero padded outside the frame) and resize it to `size`x`size`
    pub fn crop(&self, frame: &RgbImage, size: u32) -> RgbImage {
        let side = self.side as u32;
        let (left, top) = (self.left as i64, self.top as i64);
        let (width, height) = (frame.width() as i64, frame.height() as i64);

        let x0 = left.max(0);
        let y0 = top.max(0);
        let x1 = (left + side as i64).min(width);
        let y1 = (top + side as i64).min(height);

        let mut canvas = RgbImage::new(side, side);
        if x1 > x0 && y1 > y0 {
            let visible = imageops::crop_imm(
                frame,
                x0 as u32,
                y0 as u32,
                (x1 - x0) as u32,
                (y1 - y0) as u32,
            )
            .to_image();
            imageops::replace(&mut canvas, &visible, x0 - left, y0 - top);
        }

        if side == size {
            canvas
        } else {
            imageops::resize(&canvas, size, size, imageops::FilterType::Triangle)
        }
    }

    /// Map a point normalized to the region into frame-normalized coordinates
    pub fn to_frame(&self, u: f32, v: f32, frame_width: u32, frame_height: u32) -> (f32, f32) {
        (
            (self.left + u * self.side) / frame_width as f32,
            (self.top + v * self.side) / frame_height as f32,
        )
    }

    /// Scale factor from region-normalized depth to frame-normalized depth
    pub fn depth_scale(&self, frame_width: u32) -> f32 {
        self.side / frame_width as f32
    }
}

/// Frame-pixel positions of the selected landmarks
pub fn pixel_points<'a>(
    landmarks: &'a [Landmark],
    indices: &'a [usize],
    frame_width: u32,
    frame_height: u32,
) -> impl Iterator<Item = (f32, f32)> + 'a {
    indices.iter().filter_map(move |&i| {
        landmarks
            .get(i)
            .map(|lm| (lm.x * frame_width as f32, lm.y * frame_height as f32))
    })
}
