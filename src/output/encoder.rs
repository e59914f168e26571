use super::OutputSink;
use crate::capture::VideoInfo;
use anyhow::{bail, Context, Result};
use image::RgbImage;
use std::ffi::OsString;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};

/// Encodes RGB24 frames into an MP4 file (MPEG-4 Part 2, `mp4v` tag)
pub struct VideoFileEncoder {
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    path: PathBuf,
    width: u32,
    height: u32,
    frames_written: u64,
}

impl VideoFileEncoder {
    pub fn new<P: AsRef<Path>>(path: P, info: VideoInfo) -> Result<Self> {
        let path = path.as_ref();
        tracing::info!(
            "Opening encoder at {} ({}x{} @ {:.2} fps)",
            path.display(),
            info.width,
            info.height,
            info.fps
        );

        let ffmpeg = which::which("ffmpeg").context("ffmpeg not found in PATH")?;
        let mut child = Command::new(ffmpeg)
            .args(encoder_args(path, info))
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .with_context(|| format!("Failed to start encoder for {}", path.display()))?;

        let stdin = child.stdin.take().context("Encoder stdin was not captured")?;

        Ok(Self {
            child: Some(child),
            stdin: Some(stdin),
            path: path.to_path_buf(),
            width: info.width,
            height: info.height,
            frames_written: 0,
        })
    }
}

fn encoder_args(path: &Path, info: VideoInfo) -> Vec<OsString> {
    let mut args: Vec<OsString> = [
        "-y",
        "-hide_banner",
        "-loglevel",
        "error",
        "-f",
        "rawvideo",
        "-pix_fmt",
        "rgb24",
    ]
    .iter()
    .map(OsString::from)
    .collect();

    args.push("-s".into());
    args.push(format!("{}x{}", info.width, info.height).into());
    args.push("-r".into());
    args.push(format!("{}", info.fps).into());
    for arg in ["-i", "-", "-c:v", "mpeg4", "-tag:v", "mp4v", "-q:v", "2"] {
        args.push(arg.into());
    }
    args.push(path.as_os_str().to_owned());
    args
}

impl OutputSink for VideoFileEncoder {
    fn write_frame(&mut self, frame: &RgbImage) -> Result<()> {
        let Some(stdin) = self.stdin.as_mut() else {
            bail!("Encoder for {} is already finalized", self.path.display());
        };

        // Resize frame if needed
        let resized;
        let frame = if frame.dimensions() != (self.width, self.height) {
            tracing::warn!(
                "Frame is {}x{}, encoder expects {}x{}; resizing",
                frame.width(),
                frame.height(),
                self.width,
                self.height
            );
            resized = image::imageops::resize(
                frame,
                self.width,
                self.height,
                image::imageops::FilterType::Triangle,
            );
            &resized
        } else {
            frame
        };

        stdin
            .write_all(frame.as_raw())
            .context("Failed to write frame to encoder")?;
        self.frames_written += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        // Closing stdin lets ffmpeg write the trailer
        drop(self.stdin.take());

        let Some(mut child) = self.child.take() else {
            return Ok(());
        };
        let status = child.wait().context("Failed to wait for encoder")?;
        if !status.success() {
            bail!("Encoder exited with {status} for {}", self.path.display());
        }

        tracing::info!(
            "Finalized {} ({} frames)",
            self.path.display(),
            self.frames_written
        );
        Ok(())
    }

    fn is_finished(&self) -> bool {
        self.child.is_none()
    }

    fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

impl Drop for VideoFileEncoder {
    fn drop(&mut self) {
        if let Err(e) = self.finish() {
            tracing::error!("{e:#}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encoder_args_match_input_geometry() {
        let info = VideoInfo {
            width: 640,
            height: 360,
            fps: 29.97,
        };
        let args: Vec<String> = encoder_args(Path::new("/tmp/out.mp4"), info)
            .into_iter()
            .map(|a| a.into_string().unwrap())
            .collect();

        let after = |flag: &str| {
            let idx = args.iter().position(|a| a == flag).unwrap();
            args[idx + 1].clone()
        };
        assert_eq!(after("-s"), "640x360");
        assert_eq!(after("-r"), "29.97");
        assert_eq!(after("-pix_fmt"), "rgb24");
        assert_eq!(after("-c:v"), "mpeg4");
        assert_eq!(after("-tag:v"), "mp4v");
        assert_eq!(args.last().unwrap(), "/tmp/out.mp4");
    }
}
