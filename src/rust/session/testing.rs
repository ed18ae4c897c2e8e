use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::{
    ClassifierError, Embedding, ExtractionError, FeatureExtractor, Frame, IncrementalClassifier,
    Label, Prediction,
};

/// Counts calls and returns the same embedding for every frame.
#[derive(Default)]
pub(super) struct CountingExtractor {
    pub(super) calls: Arc<AtomicUsize>,
}

impl FeatureExtractor for CountingExtractor {
    fn extract(&self, _frame: &Frame) -> Result<Embedding, ExtractionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Embedding::from(vec![1.0, 0.0]))
    }
}

/// Accepts every label and never has anything to predict from.
pub(super) struct NullClassifier;

impl IncrementalClassifier for NullClassifier {
    fn add_example(&mut self, _embedding: Embedding, _label: &Label) -> Result<(), ClassifierError> {
        Ok(())
    }

    fn predict(&self, _embedding: &Embedding) -> Result<Prediction, ClassifierError> {
        Err(ClassifierError::NoExamples)
    }

    fn example_count(&self) -> usize {
        0
    }

    fn accepts(&self, _label: &Label) -> bool {
        true
    }
}
