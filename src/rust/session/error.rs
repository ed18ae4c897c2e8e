use thiserror::Error;

use super::mode::Mode;
use crate::{CaptureError, ClassifierError, ExtractionError, Label};

/// Everything that can go wrong while setting up, training or predicting.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SessionError {
    /// The camera stream was denied, failed, or ended before the first frame
    #[error("Camera unavailable: {0}")]
    CameraUnavailable(String),
    /// No embedding could be computed for the current frame
    #[error("Feature extraction failed: {0}")]
    ExtractionFailure(#[from] ExtractionError),
    /// The classifier rejected a sample or a query
    #[error("Classifier error: {0}")]
    Classifier(#[from] ClassifierError),
    /// The extractor or the classifier has not finished initializing
    #[error("Classifier is not ready")]
    ClassifierNotReady,
    #[error("Unknown gesture label '{0}'")]
    UnknownLabel(Label),
    #[error("Cannot {action} while {mode}")]
    InvalidMode { action: &'static str, mode: Mode },
    /// A controller kept running after the mode it was started for ended
    #[error("Controller token is no longer valid")]
    StaleController,
    #[error("Prediction loop is already running")]
    PredictionAlreadyRunning,
    #[error("Operation was cancelled")]
    Cancelled,
}

impl From<CaptureError> for SessionError {
    fn from(err: CaptureError) -> Self {
        match err {
            CaptureError::Cancelled => SessionError::Cancelled,
            CaptureError::Unavailable(msg) => SessionError::CameraUnavailable(msg),
            other => SessionError::CameraUnavailable(other.to_string()),
        }
    }
}
