use std::path::PathBuf;
use thiserror::Error;

/// Structured error types for the face restoration pipeline.
///
/// Each variant carries the context of its domain (filesystem, image
/// processing, model inference) so callers can report what failed and where
/// without parsing error strings.
#[derive(Error, Debug)]
pub enum RestoreError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Filesystem error: {operation} failed for {path:?}")]
    FileSystem {
        path: PathBuf,
        operation: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Image processing error: {operation} failed (file: {path})")]
    ImageProcessing {
        path: String,
        operation: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Model error: {operation} failed")]
    Model {
        operation: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Model {name} not found (searched: {searched:?}); download the weights from {url} and export them to ONNX")]
    ModelNotFound {
        name: String,
        url: String,
        searched: Vec<PathBuf>,
    },

    #[error("Validation error: {field} {reason}")]
    Validation { field: String, reason: String },
}

pub type Result<T> = std::result::Result<T, RestoreError>;

impl RestoreError {
    pub(crate) fn model(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        let reason: String = reason.into();
        Self::Model {
            operation: operation.into(),
            source: reason.into(),
        }
    }

    pub(crate) fn image(
        path: impl Into<String>,
        operation: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::ImageProcessing {
            path: path.into(),
            operation: operation.into(),
            source: source.into(),
        }
    }
}

/// Fallback for I/O errors raised without path context. Code that knows the
/// path builds `RestoreError::FileSystem` directly.
impl From<std::io::Error> for RestoreError {
    fn from(err: std::io::Error) -> Self {
        Self::FileSystem {
            path: PathBuf::from("unknown"),
            operation: "unknown".to_string(),
            source: err,
        }
    }
}

impl From<image::ImageError> for RestoreError {
    fn from(err: image::ImageError) -> Self {
        Self::ImageProcessing {
            path: "unknown".to_string(),
            operation: "image processing".to_string(),
            source: Box::new(err),
        }
    }
}

impl From<ort::Error> for RestoreError {
    fn from(err: ort::Error) -> Self {
        Self::Model {
            operation: "ort operation".to_string(),
            source: Box::new(err),
        }
    }
}

/// Shape errors come out of tensor plumbing around inference, so they are
/// reported as model errors.
impl From<ndarray::ShapeError> for RestoreError {
    fn from(err: ndarray::ShapeError) -> Self {
        Self::Model {
            operation: "tensor shape conversion".to_string(),
            source: Box::new(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_not_found_lists_searched_paths() {
        let err = RestoreError::ModelNotFound {
            name: "GFPGANv1.3".to_string(),
            url: "https://example.invalid/GFPGANv1.3.pth".to_string(),
            searched: vec![PathBuf::from("gfpgan/weights/GFPGANv1.3.onnx")],
        };
        let message = err.to_string();
        assert!(message.contains("GFPGANv1.3"));
        assert!(message.contains("gfpgan/weights/GFPGANv1.3.onnx"));
        assert!(message.contains("https://example.invalid/GFPGANv1.3.pth"));
    }

    #[test]
    fn test_io_error_conversion() {
        let err: RestoreError = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        assert!(matches!(err, RestoreError::FileSystem { .. }));
    }
}
