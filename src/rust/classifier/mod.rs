mod builder;
mod error;
mod knn;
mod utils;

use std::collections::HashMap;

use crate::{Embedding, Label};

pub use builder::KnnClassifierBuilder;
pub use error::ClassifierError;
pub use knn::KnnClassifier;
pub(crate) use utils::normalize_vector;

/// Result of classifying one embedding.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    /// The label with the highest score.
    pub label: Label,
    /// Score per known label, 0.0 to 1.0.
    pub confidences: HashMap<Label, f32>,
}

impl Prediction {
    /// Score of the predicted label.
    pub fn confidence(&self) -> f32 {
        self.confidences.get(&self.label).copied().unwrap_or(0.0)
    }
}

/// A classifier that accepts labelled embeddings one at a time and can be
/// queried at any point, without a separate training phase.
pub trait IncrementalClassifier: Send + 'static {
    /// Stores one labelled example.
    fn add_example(&mut self, embedding: Embedding, label: &Label) -> Result<(), ClassifierError>;

    /// Returns the nearest label and a score for every known label.
    fn predict(&self, embedding: &Embedding) -> Result<Prediction, ClassifierError>;

    /// Number of examples stored so far.
    fn example_count(&self) -> usize;

    /// Whether `add_example` would take examples for `label`.
    fn accepts(&self, label: &Label) -> bool;
}

/// Information about the current state of a classifier
#[derive(Debug, Clone)]
pub struct ClassifierInfo {
    pub k: usize,
    pub num_classes: usize,
    pub examples_per_class: HashMap<Label, usize>,
    pub embedding_size: Option<usize>,
}
