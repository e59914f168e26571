mod ffmpeg_capture;
mod probe;

pub use ffmpeg_capture::VideoFileCapture;
pub use probe::{probe_video, VideoInfo};

use anyhow::Result;
use image::RgbImage;

/// Trait for frame sources
pub trait CaptureSource: Send {
    /// Decode the next frame
    ///
    /// Returns `Ok(None)` once the stream is exhausted.
    fn capture_frame(&mut self) -> Result<Option<RgbImage>>;

    /// Geometry and rate of the decoded stream
    fn info(&self) -> VideoInfo;

    /// Get the resolution of decoded frames
    fn resolution(&self) -> (u32, u32) {
        let info = self.info();
        (info.width, info.height)
    }
}
