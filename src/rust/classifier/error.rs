use thiserror::Error;

/// Represents the different types of errors that can occur in the gesture classifier.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ClassifierError {
    /// Error occurred during the build phase
    #[error("Build error: {0}")]
    BuildError(String),
    /// Error occurred while making predictions
    #[error("Prediction error: {0}")]
    PredictionError(String),
    /// Error occurred due to invalid input parameters
    #[error("Validation error: {0}")]
    ValidationError(String),
    /// A query arrived before any example was stored
    #[error("Classifier has no examples yet")]
    NoExamples,
}
