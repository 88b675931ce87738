use std::path::Path;

use ort::{
    execution_providers::{CUDAExecutionProvider, ExecutionProvider, TensorRTExecutionProvider},
    session::{builder::SessionBuilder, Session},
};

use crate::errors::{RestoreError, Result};

pub mod gfpgan;
pub mod realesrgan;
pub mod retinaface;

pub use gfpgan::Gfpgan;
pub use realesrgan::{RealEsrgan, TilingConfig};
pub use retinaface::RetinaFace;

/// Per-session ONNX Runtime settings shared by every model of a worker.
#[derive(Debug, Clone, Copy)]
pub struct SessionOptions {
    pub device_id: i32,
    pub intra_threads: usize,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            device_id: 0,
            intra_threads: 1,
        }
    }
}

fn session_error<E>(operation: String) -> impl FnOnce(E) -> RestoreError
where
    E: std::error::Error + Send + Sync + 'static,
{
    move |e| RestoreError::Model {
        operation,
        source: Box::new(e),
    }
}

/// TensorRT first, then CUDA, with ONNX Runtime's CPU provider as the
/// implicit fallback.
pub fn build_session(model_path: &Path, options: &SessionOptions) -> Result<Session> {
    SessionBuilder::new()
        .map_err(session_error("session builder initialisation".to_string()))?
        .with_execution_providers([
            TensorRTExecutionProvider::default()
                .with_device_id(options.device_id)
                .build(),
            CUDAExecutionProvider::default()
                .with_device_id(options.device_id)
                .build(),
        ])
        .map_err(session_error("execution provider registration".to_string()))?
        .with_intra_threads(options.intra_threads)
        .map_err(session_error("intra-op thread configuration".to_string()))?
        .with_memory_pattern(true)
        .map_err(session_error("memory pattern configuration".to_string()))?
        .commit_from_file(model_path)
        .map_err(session_error(format!(
            "model loading: {}",
            model_path.display()
        )))
}

/// Whether a CUDA device can back the sessions.
pub fn gpu_available() -> bool {
    CUDAExecutionProvider::default()
        .is_available()
        .unwrap_or(false)
}

/// Spatial size `(height, width)` of the first input when the model fixes it.
pub(crate) fn fixed_input_size(session: &Session) -> Option<(u32, u32)> {
    let shape = session.inputs.first()?.input_type.tensor_shape()?;
    match (shape.get(2).copied(), shape.get(3).copied()) {
        (Some(h), Some(w)) if h > 0 && w > 0 => Some((h as u32, w as u32)),
        _ => None,
    }
}

pub(crate) fn input_names(session: &Session) -> Vec<String> {
    session.inputs.iter().map(|input| input.name.clone()).collect()
}
