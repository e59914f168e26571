//! Caller-driven frame session: decode, infer, inpaint, hand out, composite, encode.

use crate::capture::{CaptureSource, VideoFileCapture, VideoInfo};
use crate::codec::{decode_png_data_uri, encode_png_data_uri, DataUriError};
use crate::composite::composite;
use crate::holistic::{HolisticModel, HolisticResult, Landmark};
use crate::inpaint::{inpaint, mask_from_probabilities};
use crate::output::{OutputSink, VideoFileEncoder};
use anyhow::{Context, Result};
use image::RgbImage;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Opens decoders and encoders for a session
pub trait MediaBackend: Send {
    fn open_source(&self, path: &Path) -> Result<Box<dyn CaptureSource>>;
    fn open_sink(&self, path: &Path, info: VideoInfo) -> Result<Box<dyn OutputSink>>;
}

/// ffmpeg-backed decoding and encoding
pub struct FfmpegBackend;

impl MediaBackend for FfmpegBackend {
    fn open_source(&self, path: &Path) -> Result<Box<dyn CaptureSource>> {
        Ok(Box::new(VideoFileCapture::open(path)?))
    }

    fn open_sink(&self, path: &Path, info: VideoInfo) -> Result<Box<dyn OutputSink>> {
        Ok(Box::new(VideoFileEncoder::new(path, info)?))
    }
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub output_path: PathBuf,
    /// Write composited frames to `output_path`; off gives a landmarks-only session
    pub export_video: bool,
    /// Remove the segmented subject from each frame
    pub inpaint: bool,
    pub inpaint_radius: f32,
    pub mask_threshold: f32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            output_path: PathBuf::from("output.mp4"),
            export_video: true,
            inpaint: true,
            inpaint_radius: 5.0,
            mask_threshold: 0.5,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("no video is open")]
    NotReady,
    #[error("no processed frame is waiting to be written")]
    NoCurrentFrame,
    #[error("output video is already finalized")]
    Finalized,
    #[error("invalid overlay: {0}")]
    Overlay(#[from] DataUriError),
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

/// One landmark as sent to the front end
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LandmarkRecord {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visibility: Option<f32>,
}

/// Flatten a landmark set into exchange records, preserving order
///
/// `None` (and an empty set) stays `None`, so "not detected" is never `[]`.
pub fn flatten_landmarks(set: Option<&[Landmark]>, with_visibility: bool) -> Option<Vec<LandmarkRecord>> {
    let set = set.filter(|s| !s.is_empty())?;
    Some(
        set.iter()
            .map(|lm| LandmarkRecord {
                x: lm.x,
                y: lm.y,
                z: lm.z,
                visibility: with_visibility.then_some(lm.visibility),
            })
            .collect(),
    )
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrameResult {
    pub image_uri: String,
    pub face_landmarks: Option<Vec<LandmarkRecord>>,
    pub pose_world_landmarks: Option<Vec<LandmarkRecord>>,
    pub pose_landmarks: Option<Vec<LandmarkRecord>>,
    pub left_hand_landmarks: Option<Vec<LandmarkRecord>>,
    pub right_hand_landmarks: Option<Vec<LandmarkRecord>>,
}

impl FrameResult {
    fn new(image_uri: String, result: &HolisticResult) -> Self {
        Self {
            image_uri,
            face_landmarks: flatten_landmarks(result.face_landmarks.as_deref(), false),
            pose_world_landmarks: flatten_landmarks(result.pose_world_landmarks.as_deref(), true),
            pose_landmarks: flatten_landmarks(result.pose_landmarks.as_deref(), true),
            left_hand_landmarks: flatten_landmarks(result.left_hand_landmarks.as_deref(), false),
            right_hand_landmarks: flatten_landmarks(result.right_hand_landmarks.as_deref(), false),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FrameOutcome {
    Frame(FrameResult),
    EndOfStream,
    NotReady,
}

struct ActiveVideo {
    source: Box<dyn CaptureSource>,
    sink: Option<Box<dyn OutputSink>>,
}

enum Stage {
    Idle,
    Playing(ActiveVideo),
    Exhausted,
}

#[derive(Default)]
struct PipelineStats {
    frames: u64,
    infer: Duration,
    inpaint: Duration,
    encode: Duration,
}

impl PipelineStats {
    fn record(&mut self, infer: Duration, inpaint: Duration, encode: Duration) {
        self.frames += 1;
        self.infer += infer;
        self.inpaint += inpaint;
        self.encode += encode;

        // Log stats every 30 frames
        if self.frames % 30 == 0 {
            let avg = |d: Duration| d.as_secs_f64() * 1000.0 / self.frames as f64;
            tracing::info!(
                "Frame {}: infer={:.1}ms, inpaint={:.1}ms, encode={:.1}ms",
                self.frames,
                avg(self.infer),
                avg(self.inpaint),
                avg(self.encode)
            );
        }
    }
}

/// Owns the decoder, encoder, estimator and the single retained frame
pub struct FrameSession {
    config: SessionConfig,
    backend: Box<dyn MediaBackend>,
    model: Option<Box<dyn HolisticModel>>,
    stage: Stage,
    current_frame: Option<RgbImage>,
    stats: PipelineStats,
}

impl FrameSession {
    /// `model: None` runs in passthrough mode: no landmarks, no inpainting
    pub fn new(
        config: SessionConfig,
        backend: Box<dyn MediaBackend>,
        model: Option<Box<dyn HolisticModel>>,
    ) -> Self {
        Self {
            config,
            backend,
            model,
            stage: Stage::Idle,
            current_frame: None,
            stats: PipelineStats::default(),
        }
    }

    /// Open a video for decoding and, when exporting, an encoder matching it
    ///
    /// Any previously open video is closed (and its output finalized) first.
    pub fn open(&mut self, path: &Path) -> Result<(u32, u32), SessionError> {
        self.close()?;

        let source = self.backend.open_source(path)?;
        let info = source.info();
        let (width, height) = source.resolution();
        tracing::debug!("Decoding {}x{} from {}", width, height, path.display());

        let sink = if self.config.export_video {
            let sink = self.backend.open_sink(&self.config.output_path, info)?;
            let (out_width, out_height) = sink.resolution();
            tracing::info!(
                "Encoding {}x{} to {}",
                out_width,
                out_height,
                self.config.output_path.display()
            );
            Some(sink)
        } else {
            tracing::info!("Video export disabled; only landmarks will be produced");
            None
        };

        if let Some(model) = self.model.as_mut() {
            model.reset_state();
        }
        self.stats = PipelineStats::default();
        self.stage = Stage::Playing(ActiveVideo { source, sink });

        Ok((width, height))
    }

    /// Decode and analyze the next frame
    ///
    /// Reaching the end of the input finalizes the output; from then on the
    /// session reports `EndOfStream` until a new video is opened.
    pub fn next_frame(&mut self) -> Result<FrameOutcome, SessionError> {
        let video = match &mut self.stage {
            Stage::Idle => return Ok(FrameOutcome::NotReady),
            Stage::Exhausted => return Ok(FrameOutcome::EndOfStream),
            Stage::Playing(video) => video,
        };

        let mut frame = match video.source.capture_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                tracing::info!("End of input after {} frames", self.stats.frames);
                self.finish_stream()?;
                return Ok(FrameOutcome::EndOfStream);
            }
            Err(e) => {
                if let Err(finish_err) = self.finish_stream() {
                    tracing::error!("Failed to finalize output: {finish_err:#}");
                }
                return Err(e.context("Failed to decode frame").into());
            }
        };

        let infer_start = Instant::now();
        let result = match self.model.as_mut() {
            Some(model) => model.process(&frame).context("Holistic inference failed")?,
            None => HolisticResult::default(),
        };
        let infer_time = infer_start.elapsed();

        let inpaint_start = Instant::now();
        if self.config.inpaint {
            if let Some(probabilities) = result.segmentation_mask.as_deref() {
                let (width, height) = frame.dimensions();
                let mask = mask_from_probabilities(probabilities, width, height, self.config.mask_threshold);
                inpaint(&mut frame, &mask, self.config.inpaint_radius).context("Inpainting failed")?;
            }
        }
        let inpaint_time = inpaint_start.elapsed();

        let encode_start = Instant::now();
        let image_uri = encode_png_data_uri(&frame).context("Failed to encode frame")?;
        let encode_time = encode_start.elapsed();

        self.stats.record(infer_time, inpaint_time, encode_time);
        self.current_frame = Some(frame);

        Ok(FrameOutcome::Frame(FrameResult::new(image_uri, &result)))
    }

    /// Composite the rendered overlay onto the retained frame and append it to the output
    ///
    /// `None` writes the retained frame unchanged. Without export this is a no-op.
    pub fn combine_result(&mut self, overlay: Option<&str>) -> Result<(), SessionError> {
        let video = match &mut self.stage {
            Stage::Idle => return Err(SessionError::NotReady),
            Stage::Exhausted => return Err(SessionError::Finalized),
            Stage::Playing(video) => video,
        };
        let Some(sink) = video.sink.as_mut() else {
            self.current_frame = None;
            return Ok(());
        };
        if self.current_frame.is_none() {
            return Err(SessionError::NoCurrentFrame);
        }

        let overlay = overlay.map(decode_png_data_uri).transpose()?;
        let Some(frame) = self.current_frame.take() else {
            return Err(SessionError::NoCurrentFrame);
        };

        let _span = tracing::debug_span!("combine").entered();
        let output = match overlay {
            Some(overlay) => composite(&frame, &overlay),
            None => frame,
        };
        sink.write_frame(&output)?;
        Ok(())
    }

    /// Release the decoder and finalize the output, returning to the idle state
    pub fn close(&mut self) -> Result<(), SessionError> {
        self.current_frame = None;
        if let Stage::Playing(video) = std::mem::replace(&mut self.stage, Stage::Idle) {
            Self::finalize(video)?;
        }
        Ok(())
    }

    fn finish_stream(&mut self) -> Result<()> {
        self.current_frame = None;
        match std::mem::replace(&mut self.stage, Stage::Exhausted) {
            Stage::Playing(video) => Self::finalize(video),
            _ => Ok(()),
        }
    }

    fn finalize(video: ActiveVideo) -> Result<()> {
        let ActiveVideo { source, sink } = video;
        drop(source);
        if let Some(mut sink) = sink {
            if !sink.is_finished() {
                sink.finish()?;
            }
        }
        Ok(())
    }
}

impl Drop for FrameSession {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::error!("Failed to close session: {e:#}");
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::codec::PNG_DATA_URI_PREFIX;
    use anyhow::bail;
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use image::{Rgb, Rgba, RgbaImage};
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    pub struct SinkLog {
        pub frames: Vec<RgbImage>,
        pub finished: bool,
        pub opened: usize,
    }

    struct FakeSource {
        frames: VecDeque<RgbImage>,
        info: VideoInfo,
        fail_at_end: bool,
    }

    impl CaptureSource for FakeSource {
        fn capture_frame(&mut self) -> Result<Option<RgbImage>> {
            match self.frames.pop_front() {
                Some(frame) => Ok(Some(frame)),
                None if self.fail_at_end => bail!("corrupt packet"),
                None => Ok(None),
            }
        }

        fn info(&self) -> VideoInfo {
            self.info
        }
    }

    struct FakeSink {
        log: Arc<Mutex<SinkLog>>,
        resolution: (u32, u32),
    }

    impl OutputSink for FakeSink {
        fn write_frame(&mut self, frame: &RgbImage) -> Result<()> {
            let mut log = self.log.lock().unwrap();
            if log.finished {
                bail!("finalized");
            }
            log.frames.push(frame.clone());
            Ok(())
        }

        fn finish(&mut self) -> Result<()> {
            self.log.lock().unwrap().finished = true;
            Ok(())
        }

        fn is_finished(&self) -> bool {
            self.log.lock().unwrap().finished
        }

        fn resolution(&self) -> (u32, u32) {
            self.resolution
        }
    }

    pub struct FakeBackend {
        pub frames: Vec<RgbImage>,
        pub log: Arc<Mutex<SinkLog>>,
        pub fail_at_end: bool,
    }

    impl FakeBackend {
        pub fn new(frames: Vec<RgbImage>) -> (Self, Arc<Mutex<SinkLog>>) {
            let log = Arc::new(Mutex::new(SinkLog::default()));
            let backend = Self {
                frames,
                log: log.clone(),
                fail_at_end: false,
            };
            (backend, log)
        }
    }

    impl MediaBackend for FakeBackend {
        fn open_source(&self, _path: &Path) -> Result<Box<dyn CaptureSource>> {
            let (width, height) = self.frames.first().map(|f| f.dimensions()).unwrap_or((1, 1));
            Ok(Box::new(FakeSource {
                frames: self.frames.iter().cloned().collect(),
                info: VideoInfo {
                    width,
                    height,
                    fps: 30.0,
                },
                fail_at_end: self.fail_at_end,
            }))
        }

        fn open_sink(&self, _path: &Path, info: VideoInfo) -> Result<Box<dyn OutputSink>> {
            // A fresh log per encoder, reusing the shared handle
            {
                let mut log = self.log.lock().unwrap();
                log.finished = false;
                log.opened += 1;
            }
            Ok(Box::new(FakeSink {
                log: self.log.clone(),
                resolution: (info.width, info.height),
            }))
        }
    }

    /// Reports a pose and a square foreground mask covering (2..6, 2..6)
    struct FakeModel {
        resets: Arc<Mutex<usize>>,
    }

    impl HolisticModel for FakeModel {
        fn process(&mut self, frame: &RgbImage) -> Result<HolisticResult> {
            let (width, height) = frame.dimensions();
            let mask = (0..height)
                .flat_map(|y| (0..width).map(move |x| (x, y)))
                .map(|(x, y)| if (2..6).contains(&x) && (2..6).contains(&y) { 0.9 } else { 0.1 })
                .collect();
            let pose = vec![
                Landmark {
                    x: 0.1,
                    y: 0.2,
                    z: 0.3,
                    visibility: 0.9,
                },
                Landmark {
                    x: 0.4,
                    y: 0.5,
                    z: 0.6,
                    visibility: 0.8,
                },
            ];
            Ok(HolisticResult {
                face_landmarks: None,
                pose_landmarks: Some(pose.clone()),
                pose_world_landmarks: Some(pose),
                left_hand_landmarks: Some(Vec::new()),
                right_hand_landmarks: None,
                segmentation_mask: Some(mask),
            })
        }

        fn reset_state(&mut self) {
            *self.resets.lock().unwrap() += 1;
        }
    }

    pub fn test_frame(seed: u8) -> RgbImage {
        RgbImage::from_fn(8, 8, |x, y| Rgb([seed, x as u8 * 10, y as u8 * 10]))
    }

    fn passthrough(frames: Vec<RgbImage>) -> (FrameSession, Arc<Mutex<SinkLog>>) {
        let (backend, log) = FakeBackend::new(frames);
        let session = FrameSession::new(SessionConfig::default(), Box::new(backend), None);
        (session, log)
    }

    fn expect_frame(outcome: FrameOutcome) -> FrameResult {
        match outcome {
            FrameOutcome::Frame(result) => result,
            other => panic!("expected a frame, got {other:?}"),
        }
    }

    fn overlay_uri(overlay: &RgbaImage) -> String {
        let mut png = Vec::new();
        overlay
            .write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
            .unwrap();
        format!("{PNG_DATA_URI_PREFIX}{}", STANDARD.encode(&png))
    }

    #[test]
    fn three_frame_video_ends_with_finalized_output() {
        let (mut session, log) = passthrough(vec![test_frame(1), test_frame(2), test_frame(3)]);
        assert_eq!(session.open(Path::new("in.mp4")).unwrap(), (8, 8));

        for _ in 0..3 {
            let result = expect_frame(session.next_frame().unwrap());
            assert!(result.image_uri.starts_with(PNG_DATA_URI_PREFIX));
            session.combine_result(None).unwrap();
        }
        assert_eq!(session.next_frame().unwrap(), FrameOutcome::EndOfStream);
        assert_eq!(session.next_frame().unwrap(), FrameOutcome::EndOfStream);

        let log = log.lock().unwrap();
        assert!(log.finished);
        assert_eq!(log.frames.len(), 3);
        drop(log);

        assert!(matches!(session.combine_result(None), Err(SessionError::Finalized)));
    }

    #[test]
    fn calls_before_open_are_not_ready() {
        let (mut session, _log) = passthrough(vec![test_frame(1)]);
        assert_eq!(session.next_frame().unwrap(), FrameOutcome::NotReady);
        assert!(matches!(session.combine_result(None), Err(SessionError::NotReady)));
    }

    #[test]
    fn combine_without_overlay_writes_the_retained_frame() {
        let (mut session, log) = passthrough(vec![test_frame(7)]);
        session.open(Path::new("in.mp4")).unwrap();
        let result = expect_frame(session.next_frame().unwrap());
        session.combine_result(None).unwrap();

        let log = log.lock().unwrap();
        assert_eq!(log.frames, vec![test_frame(7)]);
        // Passthrough: the handed-out image is the decoded frame
        let decoded = decode_png_data_uri(&result.image_uri).unwrap();
        assert_eq!(decoded.get_pixel(3, 4), &Rgba([7, 30, 40, 255]));
    }

    #[test]
    fn retained_frame_is_consumed_by_combine() {
        let (mut session, _log) = passthrough(vec![test_frame(1), test_frame(2)]);
        session.open(Path::new("in.mp4")).unwrap();
        session.next_frame().unwrap();
        session.combine_result(None).unwrap();
        assert!(matches!(
            session.combine_result(None),
            Err(SessionError::NoCurrentFrame)
        ));
    }

    #[test]
    fn overlay_of_another_size_is_resized_and_composited() {
        let (mut session, log) = passthrough(vec![test_frame(5)]);
        session.open(Path::new("in.mp4")).unwrap();
        session.next_frame().unwrap();

        // Left half transparent, right half opaque white, at a quarter of the size
        let overlay = RgbaImage::from_fn(4, 4, |x, _| {
            if x < 2 {
                Rgba([0, 0, 0, 0])
            } else {
                Rgba([255, 255, 255, 255])
            }
        });
        session.combine_result(Some(&overlay_uri(&overlay))).unwrap();

        let log = log.lock().unwrap();
        let written = &log.frames[0];
        assert_eq!(written.dimensions(), (8, 8));
        assert_eq!(written.get_pixel(0, 3), test_frame(5).get_pixel(0, 3));
        assert_eq!(written.get_pixel(7, 3), &Rgb([255, 255, 255]));
    }

    #[test]
    fn invalid_overlay_keeps_the_retained_frame() {
        let (mut session, log) = passthrough(vec![test_frame(5)]);
        session.open(Path::new("in.mp4")).unwrap();
        session.next_frame().unwrap();

        assert!(matches!(
            session.combine_result(Some("data:text/plain,hi")),
            Err(SessionError::Overlay(DataUriError::MissingPrefix))
        ));
        session.combine_result(None).unwrap();
        assert_eq!(log.lock().unwrap().frames.len(), 1);
    }

    #[test]
    fn undetected_sets_serialize_as_null() {
        let (mut session, _log) = passthrough(vec![test_frame(1)]);
        session.open(Path::new("in.mp4")).unwrap();
        let json = serde_json::to_value(session.next_frame().unwrap()).unwrap();

        assert_eq!(json["status"], "frame");
        for key in [
            "face_landmarks",
            "pose_world_landmarks",
            "pose_landmarks",
            "left_hand_landmarks",
            "right_hand_landmarks",
        ] {
            assert!(json[key].is_null(), "{key} should be null");
        }
        assert_eq!(
            serde_json::to_value(FrameOutcome::EndOfStream).unwrap(),
            serde_json::json!({"status": "end_of_stream"})
        );
    }

    #[test]
    fn model_landmarks_and_mask_flow_through() {
        let resets = Arc::new(Mutex::new(0));
        let (backend, log) = FakeBackend::new(vec![RgbImage::from_fn(8, 8, |x, y| {
            if (2..6).contains(&x) && (2..6).contains(&y) {
                Rgb([255, 0, 0])
            } else {
                Rgb([0, 80, 160])
            }
        })]);
        let model = FakeModel {
            resets: resets.clone(),
        };
        let mut session = FrameSession::new(
            SessionConfig::default(),
            Box::new(backend),
            Some(Box::new(model)),
        );
        session.open(Path::new("in.mp4")).unwrap();
        assert_eq!(*resets.lock().unwrap(), 1);

        let result = expect_frame(session.next_frame().unwrap());

        let pose = result.pose_landmarks.unwrap();
        assert_eq!(pose.len(), 2);
        assert_eq!(pose[1].visibility, Some(0.8));
        assert_eq!(result.pose_world_landmarks.unwrap()[0].visibility, Some(0.9));
        assert!(result.face_landmarks.is_none());
        assert!(result.left_hand_landmarks.is_none());

        // The subject square was inpainted from the uniform background
        let image = decode_png_data_uri(&result.image_uri).unwrap();
        assert!(image.pixels().all(|p| *p == Rgba([0, 80, 160, 255])));

        // Without an overlay the inpainted frame is what gets encoded
        session.combine_result(None).unwrap();
        let log = log.lock().unwrap();
        assert_eq!(log.frames, vec![RgbImage::from_pixel(8, 8, Rgb([0, 80, 160]))]);
    }

    #[test]
    fn inpainting_can_be_disabled() {
        let (backend, _log) = FakeBackend::new(vec![test_frame(9)]);
        let config = SessionConfig {
            inpaint: false,
            ..SessionConfig::default()
        };
        let model = FakeModel {
            resets: Arc::new(Mutex::new(0)),
        };
        let mut session = FrameSession::new(config, Box::new(backend), Some(Box::new(model)));
        session.open(Path::new("in.mp4")).unwrap();
        let result = expect_frame(session.next_frame().unwrap());
        let image = decode_png_data_uri(&result.image_uri).unwrap();
        assert_eq!(image.get_pixel(3, 3), &Rgba([9, 30, 30, 255]));
    }

    #[test]
    fn landmarks_only_session_never_opens_an_encoder() {
        let (backend, log) = FakeBackend::new(vec![test_frame(1)]);
        let config = SessionConfig {
            export_video: false,
            ..SessionConfig::default()
        };
        let mut session = FrameSession::new(config, Box::new(backend), None);
        session.open(Path::new("in.mp4")).unwrap();
        expect_frame(session.next_frame().unwrap());
        session.combine_result(None).unwrap();
        assert_eq!(session.next_frame().unwrap(), FrameOutcome::EndOfStream);

        let log = log.lock().unwrap();
        assert_eq!(log.opened, 0);
        assert!(log.frames.is_empty());
    }

    #[test]
    fn reopening_finalizes_the_previous_output() {
        let (mut session, log) = passthrough(vec![test_frame(1), test_frame(2)]);
        session.open(Path::new("a.mp4")).unwrap();
        session.next_frame().unwrap();
        session.combine_result(None).unwrap();

        session.open(Path::new("b.mp4")).unwrap();
        let log = log.lock().unwrap();
        assert_eq!(log.opened, 2);
        // The second encoder reset the flag; the first was finished before it opened
        assert!(!log.finished);
        assert_eq!(log.frames.len(), 1);
    }

    #[test]
    fn dropping_an_unfinished_session_finalizes_output() {
        let (mut session, log) = passthrough(vec![test_frame(1), test_frame(2)]);
        session.open(Path::new("in.mp4")).unwrap();
        session.next_frame().unwrap();
        drop(session);
        assert!(log.lock().unwrap().finished);
    }

    #[test]
    fn decode_error_finalizes_and_surfaces() {
        let (mut backend, log) = FakeBackend::new(vec![test_frame(1)]);
        backend.fail_at_end = true;
        let mut session = FrameSession::new(SessionConfig::default(), Box::new(backend), None);
        session.open(Path::new("in.mp4")).unwrap();
        expect_frame(session.next_frame().unwrap());

        assert!(matches!(session.next_frame(), Err(SessionError::Backend(_))));
        assert!(log.lock().unwrap().finished);
        assert_eq!(session.next_frame().unwrap(), FrameOutcome::EndOfStream);
    }

    #[test]
    fn flatten_is_order_preserving_and_pure() {
        let set = vec![
            Landmark {
                x: 0.3,
                y: 0.2,
                z: 0.1,
                visibility: 0.7,
            },
            Landmark {
                x: 0.6,
                y: 0.5,
                z: 0.4,
                visibility: 0.2,
            },
        ];
        let first = flatten_landmarks(Some(&set), true);
        assert_eq!(first, flatten_landmarks(Some(&set), true));

        let records = first.unwrap();
        assert_eq!((records[0].x, records[1].x), (0.3, 0.6));
        assert_eq!(records[1].visibility, Some(0.2));

        let plain = flatten_landmarks(Some(&set), false).unwrap();
        assert!(plain.iter().all(|r| r.visibility.is_none()));
        let json = serde_json::to_value(plain[0]).unwrap();
        let keys: Vec<&String> = json.as_object().unwrap().keys().collect();
        assert_eq!(keys, vec!["x", "y", "z"]);

        assert!(flatten_landmarks(None, true).is_none());
        assert!(flatten_landmarks(Some(&[]), false).is_none());
    }

    #[test]
    fn mask_threshold_controls_the_inpainted_region() {
        // With the threshold above every mask value nothing is inpainted
        let (backend, _log) = FakeBackend::new(vec![test_frame(4)]);
        let config = SessionConfig {
            mask_threshold: 0.95,
            ..SessionConfig::default()
        };
        let model = FakeModel {
            resets: Arc::new(Mutex::new(0)),
        };
        let mut session = FrameSession::new(config, Box::new(backend), Some(Box::new(model)));
        session.open(Path::new("in.mp4")).unwrap();
        let result = expect_frame(session.next_frame().unwrap());
        let image = decode_png_data_uri(&result.image_uri).unwrap();
        let expected = image::DynamicImage::ImageRgb8(test_frame(4)).to_rgba8();
        assert_eq!(image, expected);
    }
}
