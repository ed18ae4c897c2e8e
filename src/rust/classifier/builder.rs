use log::info;

use super::error::ClassifierError;
use super::knn::KnnClassifier;
use crate::LabelSet;

/// A builder for constructing a KnnClassifier with a fluent interface.
#[derive(Debug)]
pub struct KnnClassifierBuilder {
    k: usize,
    labels: Option<LabelSet>,
    embedding_size: Option<usize>,
}

impl Default for KnnClassifierBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl KnnClassifierBuilder {
    /// Neighbours consulted per query unless configured otherwise.
    pub const DEFAULT_K: usize = 3;

    /// Creates a new empty builder instance with default configuration
    ///
    /// # Example
    /// ```
    /// use handsign::KnnClassifierBuilder;
    ///
    /// let builder = KnnClassifierBuilder::new();
    /// ```
    pub fn new() -> Self {
        Self {
            k: Self::DEFAULT_K,
            labels: None,
            embedding_size: None,
        }
    }

    /// Sets how many nearest neighbours vote on each prediction
    pub fn with_k(mut self, k: usize) -> Self {
        self.k = k;
        self
    }

    /// Sets the gestures the classifier can learn and report
    pub fn with_labels(mut self, labels: LabelSet) -> Self {
        self.labels = Some(labels);
        self
    }

    /// Fixes the embedding dimensionality up front. Without it the first
    /// stored example decides.
    pub fn with_embedding_size(mut self, embedding_size: usize) -> Self {
        self.embedding_size = Some(embedding_size);
        self
    }

    /// Builds and returns the final classifier instance
    ///
    /// # Returns
    /// * `Result<KnnClassifier, ClassifierError>` - The constructed classifier if successful, or an error if:
    ///   - No label set was provided
    ///   - `k` is zero or larger than the supported maximum
    ///   - The fixed embedding size is zero
    ///
    /// # Example
    /// ```
    /// # fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// use handsign::{KnnClassifierBuilder, LabelSet};
    ///
    /// let classifier = KnnClassifierBuilder::new()
    ///     .with_labels(LabelSet::default())
    ///     .with_k(5)
    ///     .build()?;
    /// assert_eq!(classifier.info().k, 5);
    /// # Ok(())
    /// # }
    /// ```
    pub fn build(self) -> Result<KnnClassifier, ClassifierError> {
        const MAX_K: usize = 100;

        let labels = self
            .labels
            .ok_or_else(|| ClassifierError::BuildError("A label set must be provided".to_string()))?;
        if self.k == 0 {
            return Err(ClassifierError::ValidationError("k must be at least 1".into()));
        }
        if self.k > MAX_K {
            return Err(ClassifierError::ValidationError(format!(
                "k is too large ({}, max is {})",
                self.k, MAX_K
            )));
        }
        if self.embedding_size == Some(0) {
            return Err(ClassifierError::ValidationError("Embedding size cannot be zero".into()));
        }

        info!("Building k-NN classifier (k = {}, {} classes)", self.k, labels.len());
        let examples = vec![Vec::new(); labels.len()];
        Ok(KnnClassifier {
            k: self.k,
            labels,
            embedding_size: self.embedding_size,
            examples,
        })
    }
}
