mod bridge;
mod capture;
mod codec;
mod composite;
mod holistic;
mod inpaint;
mod output;
mod session;

use anyhow::{Context, Result};
use bridge::{BridgeState, NativeFilePicker};
use clap::Parser;
use holistic::{HolisticModel, HolisticModelPaths, HolisticOptions};
use session::{FfmpegBackend, FrameSession, SessionConfig};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path of the composited output video
    #[arg(short, long, default_value = "output.mp4")]
    output: PathBuf,

    /// Port for the local web front end
    #[arg(short, long, default_value_t = 8765)]
    port: u16,

    /// Path to the pose landmark model (ONNX file)
    /// If not provided, runs in passthrough mode without landmarks
    #[arg(long)]
    pose_model: Option<PathBuf>,

    /// Path to the face mesh model (ONNX file)
    #[arg(long)]
    face_model: Option<PathBuf>,

    /// Path to the hand landmark model (ONNX file)
    #[arg(long)]
    hand_model: Option<PathBuf>,

    /// Minimum confidence to accept a fresh detection
    #[arg(long, default_value_t = 0.5)]
    min_detection_confidence: f32,

    /// Minimum confidence to keep tracking from the previous frame
    #[arg(long, default_value_t = 0.5)]
    min_tracking_confidence: f32,

    /// Skip the segmentation mask (also disables inpainting)
    #[arg(long)]
    no_segmentation: bool,

    /// Inpainting neighbourhood radius in pixels
    #[arg(long, default_value_t = 5.0)]
    inpaint_radius: f32,

    /// Foreground probability above which a pixel is inpainted
    #[arg(long, default_value_t = 0.5)]
    mask_threshold: f32,

    /// Keep the subject in the frame instead of inpainting it away
    #[arg(long)]
    no_inpaint: bool,

    /// Only produce landmarks; do not write an output video
    #[arg(long)]
    no_export: bool,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .init();

    tracing::info!("Avaverse starting");
    if args.no_export {
        tracing::info!("Output: disabled (landmarks only)");
    } else {
        tracing::info!("Output: {}", args.output.display());
    }

    let model = load_model(&args)?;

    let config = SessionConfig {
        output_path: args.output.clone(),
        export_video: !args.no_export,
        inpaint: !args.no_inpaint,
        inpaint_radius: args.inpaint_radius,
        mask_threshold: args.mask_threshold,
    };
    if config.inpaint && (args.no_segmentation || model.is_none()) {
        tracing::info!("No segmentation mask available; frames will not be inpainted");
    }

    let session = FrameSession::new(config, Box::new(FfmpegBackend), model);
    let state = BridgeState::new(session, Arc::new(NativeFilePicker));

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;
    runtime
        .block_on(bridge::run_server(args.port, state))
        .with_context(|| format!("Failed to serve on port {}", args.port))?;

    Ok(())
}

fn load_model(args: &Args) -> Result<Option<Box<dyn HolisticModel>>> {
    let Some(pose) = &args.pose_model else {
        tracing::info!("Running in passthrough mode (no holistic model)");
        return Ok(None);
    };

    tracing::info!("Loading pose model from {}", pose.display());
    let paths = HolisticModelPaths {
        pose: pose.clone(),
        face: args.face_model.clone(),
        hand: args.hand_model.clone(),
    };
    let options = HolisticOptions {
        min_detection_confidence: args.min_detection_confidence,
        min_tracking_confidence: args.min_tracking_confidence,
        enable_segmentation: !args.no_segmentation,
    };
    let model = holistic::create_default_model(&paths, options)
        .context("Failed to load holistic model")?;
    tracing::info!("Holistic model loaded successfully");
    Ok(Some(model))
}
