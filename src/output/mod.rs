mod encoder;

pub use encoder::VideoFileEncoder;

use anyhow::Result;
use image::RgbImage;

/// Trait for output destinations
pub trait OutputSink: Send {
    /// Append a frame to the output
    fn write_frame(&mut self, frame: &RgbImage) -> Result<()>;

    /// Flush and close the output
    ///
    /// Further writes must fail. Calling `finish` twice is a no-op.
    fn finish(&mut self) -> Result<()>;

    /// Whether `finish` has already run
    fn is_finished(&self) -> bool;

    /// Get the expected output resolution
    fn resolution(&self) -> (u32, u32);
}
