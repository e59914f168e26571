use super::{probe_video, CaptureSource, VideoInfo};
use anyhow::{bail, Context, Result};
use image::RgbImage;
use std::io::{ErrorKind, Read};
use std::path::Path;
use std::process::{Child, ChildStdout, Command, ExitStatus, Stdio};
use std::thread::JoinHandle;

/// Decodes a video file to packed RGB24 frames through an ffmpeg child process
pub struct VideoFileCapture {
    child: Child,
    stdout: ChildStdout,
    // Decoder stderr, drained on its own thread
    stderr: Option<JoinHandle<String>>,
    info: VideoInfo,
    frames_read: u64,
}

impl VideoFileCapture {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let info = probe_video(path)?;

        tracing::info!(
            "Opening {} ({}x{} @ {:.2} fps)",
            path.display(),
            info.width,
            info.height,
            info.fps
        );

        let ffmpeg = which::which("ffmpeg").context("ffmpeg not found in PATH")?;
        let mut child = Command::new(ffmpeg)
            .args(["-hide_banner", "-loglevel", "error", "-nostdin", "-i"])
            .arg(path)
            .args([
                "-map",
                "0:v:0",
                "-f",
                "rawvideo",
                "-pix_fmt",
                "rgb24",
                "-",
            ])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("Failed to start decoder for {}", path.display()))?;

        let stdout = child
            .stdout
            .take()
            .context("Decoder stdout was not captured")?;
        let mut stderr_pipe = child
            .stderr
            .take()
            .context("Decoder stderr was not captured")?;
        let stderr = std::thread::spawn(move || {
            let mut log = String::new();
            let _ = stderr_pipe.read_to_string(&mut log);
            log
        });

        Ok(Self {
            child,
            stdout,
            stderr: Some(stderr),
            info,
            frames_read: 0,
        })
    }
}

impl VideoFileCapture {
    /// Reap the decoder once its output closes; a failed exit is a decode error
    fn check_exit(&mut self) -> Result<()> {
        let status = self.child.wait().context("Failed to wait for decoder")?;
        let stderr = self
            .stderr
            .take()
            .and_then(|handle| handle.join().ok())
            .unwrap_or_default();
        decoder_exit(status, &stderr, self.frames_read)
    }
}

impl CaptureSource for VideoFileCapture {
    fn capture_frame(&mut self) -> Result<Option<RgbImage>> {
        let mut buf = vec![0u8; self.info.frame_len()];
        match read_frame(&mut self.stdout, &mut buf)? {
            FrameRead::Complete => {}
            FrameRead::Eof => {
                self.check_exit()?;
                tracing::debug!("Decoder reached end of stream after {} frames", self.frames_read);
                return Ok(None);
            }
        }
        self.frames_read += 1;

        let frame = RgbImage::from_raw(self.info.width, self.info.height, buf)
            .context("Decoded frame has the wrong size")?;
        Ok(Some(frame))
    }

    fn info(&self) -> VideoInfo {
        self.info
    }
}

impl Drop for VideoFileCapture {
    fn drop(&mut self) {
        // The decoder may still be running if the caller stopped early
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

fn decoder_exit(status: ExitStatus, stderr: &str, frames_read: u64) -> Result<()> {
    if status.success() {
        return Ok(());
    }
    let detail = stderr.trim();
    if detail.is_empty() {
        bail!("Decoder exited with {status} after {frames_read} frames");
    }
    bail!("Decoder exited with {status} after {frames_read} frames: {detail}");
}

enum FrameRead {
    Complete,
    Eof,
}

/// Fill `buf` with exactly one frame
///
/// A clean EOF before the first byte ends the stream. A truncated trailing
/// frame is also treated as end of stream, matching what players do.
fn read_frame<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<FrameRead> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => {
                if filled > 0 {
                    tracing::warn!(
                        "Discarding truncated frame ({} of {} bytes)",
                        filled,
                        buf.len()
                    );
                }
                return Ok(FrameRead::Eof);
            }
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => bail!("Failed to read decoded frame: {e}"),
        }
    }
    Ok(FrameRead::Complete)
}
