mod onnx;
mod pipeline;
mod pose;
mod preprocess;
mod region;
mod roi;
mod types;

pub use pipeline::{HolisticModelPaths, OnnxHolistic};
pub use types::{HolisticModel, HolisticOptions, HolisticResult, Landmark};

use anyhow::Result;

/// Create the default holistic model (ONNX MediaPipe graphs)
pub fn create_default_model(
    paths: &HolisticModelPaths,
    options: HolisticOptions,
) -> Result<Box<dyn HolisticModel>> {
    let model = OnnxHolistic::new(paths, options)?;
    Ok(Box::new(model))
}
