//! Frame to embedding conversion.

mod onnx;

use ndarray::Array1;
use ort::Error as OrtError;
use thiserror::Error;

use crate::Frame;

pub use onnx::OnnxFeatureExtractor;

/// Fixed-length feature vector summarising one frame.
pub type Embedding = Array1<f32>;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ExtractionError {
    /// The capture session has not produced a frame yet
    #[error("No frame available")]
    NoFrame,
    /// The frame buffer does not match its declared dimensions
    #[error("Malformed frame: {0}")]
    MalformedFrame(String),
    /// Error occurred while loading the model
    #[error("Build error: {0}")]
    BuildError(String),
    /// Error occurred while running the model
    #[error("Model error: {0}")]
    ModelError(String),
}

impl From<OrtError> for ExtractionError {
    fn from(err: OrtError) -> Self {
        ExtractionError::BuildError(err.to_string())
    }
}

/// Turns a video frame into an embedding.
///
/// Implementations must be pure functions of the frame content: the same
/// frame always yields the same embedding and nothing is retained between
/// calls.
pub trait FeatureExtractor: Send + Sync + 'static {
    fn extract(&self, frame: &Frame) -> Result<Embedding, ExtractionError>;

    /// Length of the embeddings produced, when known up front.
    fn embedding_size(&self) -> Option<usize> {
        None
    }
}
