use anyhow::{anyhow, Context, Result};
use ndarray::Array4;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Tensor;
use std::path::Path;

/// ONNX Runtime session with a single image input
pub struct OnnxModel {
    name: &'static str,
    session: Session,
    output_names: Vec<String>,
}

impl OnnxModel {
    pub fn load<P: AsRef<Path>>(name: &'static str, model_path: P) -> Result<Self> {
        let path = model_path.as_ref();

        tracing::info!("Loading {} model from {}", name, path.display());

        let session = Session::builder()
            .map_err(|e| anyhow!("ORT session builder: {e}"))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| anyhow!("ORT optimization level: {e}"))?
            .with_intra_threads(4)
            .map_err(|e| anyhow!("ORT intra threads: {e}"))?
            .commit_from_file(path)
            .map_err(|e| anyhow!("Failed to load model from {}: {e}", path.display()))?;

        let output_names: Vec<String> = session.outputs.iter().map(|o| o.name.clone()).collect();
        tracing::debug!("{} model outputs: {:?}", name, output_names);

        Ok(Self {
            name,
            session,
            output_names,
        })
    }

    /// Run inference and return every output flattened, in declaration order
    pub fn run(&mut self, input: Array4<f32>) -> Result<Vec<Vec<f32>>> {
        let _span = tracing::debug_span!("inference", model = self.name).entered();

        let shape = input.shape().to_vec();
        let tensor = Tensor::from_array((shape, input.into_raw_vec().into_boxed_slice()))
            .map_err(|e| anyhow!("ORT tensor: {e}"))?;

        let outputs = self
            .session
            .run(ort::inputs![tensor])
            .map_err(|e| anyhow!("{} inference failed: {e}", self.name))?;

        let mut flat = Vec::with_capacity(self.output_names.len());
        for output_name in &self.output_names {
            let value = outputs
                .get(output_name.as_str())
                .with_context(|| format!("{} model returned no {output_name} output", self.name))?;
            let (_, data) = value
                .try_extract_tensor::<f32>()
                .map_err(|e| anyhow!("{} output {output_name}: {e}", self.name))?;
            flat.push(data.to_vec());
        }
        Ok(flat)
    }
}

/// First output holding exactly `len` values
///
/// The converted MediaPipe graphs keep stable output order but not stable
/// names, so outputs are told apart by size.
pub fn output_with_len(outputs: &[Vec<f32>], len: usize) -> Option<&[f32]> {
    outputs.iter().find(|o| o.len() == len).map(Vec::as_slice)
}
