//! ONNX Runtime session construction shared by both models.

use std::path::Path;

use ort::session::{builder::GraphOptimizationLevel, Session};
use tracing::debug;

use super::InferenceError;
use crate::config::RuntimeConfig;

/// Device type for inference
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Device {
    Cpu,
    Cuda,
}

impl std::fmt::Display for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cpu => write!(f, "CPU"),
            Self::Cuda => write!(f, "CUDA"),
        }
    }
}

/// Options applied to every session
#[derive(Debug, Clone, Copy)]
pub struct SessionOptions {
    pub use_cuda: bool,
    pub intra_threads: usize,
}

impl SessionOptions {
    pub fn device(&self) -> Device {
        if self.use_cuda {
            Device::Cuda
        } else {
            Device::Cpu
        }
    }
}

impl From<&RuntimeConfig> for SessionOptions {
    fn from(config: &RuntimeConfig) -> Self {
        Self {
            use_cuda: config.enable_cuda,
            intra_threads: config.intra_threads.max(1),
        }
    }
}

pub(crate) fn create_session(
    model_path: &Path,
    options: &SessionOptions,
) -> Result<Session, InferenceError> {
    let mut builder = Session::builder().map_err(|e| InferenceError::Onnx(e.to_string()))?;

    builder = builder
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .map_err(|e| InferenceError::Onnx(e.to_string()))?;

    builder = builder
        .with_intra_threads(options.intra_threads)
        .map_err(|e| InferenceError::Onnx(e.to_string()))?;

    if options.use_cuda {
        #[cfg(feature = "cuda")]
        {
            use ort::execution_providers::CUDAExecutionProvider;
            builder = builder
                .with_execution_providers([CUDAExecutionProvider::default().build()])
                .map_err(|e| InferenceError::Onnx(e.to_string()))?;
        }
        #[cfg(not(feature = "cuda"))]
        {
            tracing::warn!("CUDA requested but not compiled with cuda feature, using CPU");
        }
    }

    let session = builder.commit_from_file(model_path).map_err(|e| {
        InferenceError::Onnx(format!(
            "Failed to load model {}: {e}",
            model_path.display()
        ))
    })?;

    debug!(
        model = %model_path.display(),
        inputs = ?session.inputs.iter().map(|i| &i.name).collect::<Vec<_>>(),
        outputs = ?session.outputs.iter().map(|o| &o.name).collect::<Vec<_>>(),
        "ONNX session ready"
    );

    Ok(session)
}

/// Whether the session declares an input with this name
pub(crate) fn has_input(session: &Session, name: &str) -> bool {
    session.inputs.iter().any(|i| i.name == name)
}

/// Name of the output called `preferred`, or the first output otherwise
pub(crate) fn output_name(session: &Session, preferred: &str) -> Result<String, InferenceError> {
    session
        .outputs
        .iter()
        .find(|o| o.name == preferred)
        .or_else(|| session.outputs.first())
        .map(|o| o.name.clone())
        .ok_or_else(|| InferenceError::InvalidModel("model declares no outputs".to_string()))
}
