use std::cmp::Ordering;
use std::collections::HashMap;

use ndarray::Array1;

use super::error::ClassifierError;
use super::utils::{cosine_similarity, normalize_vector};
use super::{ClassifierInfo, IncrementalClassifier, Prediction};
use crate::{Embedding, Label, LabelSet};

/// An incremental k-nearest-neighbour classifier over cosine similarity.
///
/// Examples are normalized on insertion, so a query costs one dot product per
/// stored example. Confidences are the share of the `k` nearest neighbours
/// that carry each label.
///
/// ```rust
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// use handsign::{IncrementalClassifier, KnnClassifier, Label, LabelSet};
/// use ndarray::array;
///
/// let labels = LabelSet::from_pairs([("none", ""), ("thumbs_up", "👍")])?;
/// let mut classifier = KnnClassifier::builder().with_labels(labels).with_k(1).build()?;
/// classifier.add_example(array![1.0, 0.0], &Label::from("none"))?;
/// classifier.add_example(array![0.0, 1.0], &Label::from("thumbs_up"))?;
///
/// let prediction = classifier.predict(&array![0.1, 0.9])?;
/// assert_eq!(prediction.label, Label::from("thumbs_up"));
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct KnnClassifier {
    pub(super) k: usize,
    pub(super) labels: LabelSet,
    pub(super) embedding_size: Option<usize>,
    /// Stored examples, indexed by the label's position in `labels`.
    pub(super) examples: Vec<Vec<Array1<f32>>>,
}

impl KnnClassifier {
    /// Creates a new KnnClassifierBuilder for fluent construction
    pub fn builder() -> super::builder::KnnClassifierBuilder {
        super::builder::KnnClassifierBuilder::new()
    }

    /// Returns information about the classifier's current state
    pub fn info(&self) -> ClassifierInfo {
        ClassifierInfo {
            k: self.k,
            num_classes: self.labels.len(),
            examples_per_class: self
                .labels
                .labels()
                .cloned()
                .zip(self.examples.iter().map(Vec::len))
                .collect(),
            embedding_size: self.embedding_size,
        }
    }

    pub fn labels(&self) -> &LabelSet {
        &self.labels
    }

    fn check_dimensions(&self, embedding: &Embedding) -> Result<(), ClassifierError> {
        if embedding.is_empty() {
            return Err(ClassifierError::ValidationError("Embedding cannot be empty".into()));
        }
        match self.embedding_size {
            Some(size) if size != embedding.len() => Err(ClassifierError::ValidationError(format!(
                "Embedding has {} dimensions, expected {}",
                embedding.len(),
                size
            ))),
            _ => Ok(()),
        }
    }
}

impl IncrementalClassifier for KnnClassifier {
    fn add_example(&mut self, embedding: Embedding, label: &Label) -> Result<(), ClassifierError> {
        let index = self.labels.position(label).ok_or_else(|| {
            ClassifierError::ValidationError(format!("Unknown label '{}'", label))
        })?;
        self.check_dimensions(&embedding)?;
        // The first example fixes the dimensionality for the rest of the session.
        self.embedding_size.get_or_insert(embedding.len());
        self.examples[index].push(normalize_vector(&embedding));
        Ok(())
    }

    fn predict(&self, embedding: &Embedding) -> Result<Prediction, ClassifierError> {
        if self.example_count() == 0 {
            return Err(ClassifierError::NoExamples);
        }
        self.check_dimensions(embedding)?;
        let query = normalize_vector(embedding);

        let mut neighbours: Vec<(usize, f32)> = self
            .examples
            .iter()
            .enumerate()
            .flat_map(|(index, examples)| {
                examples
                    .iter()
                    .map(move |example| (index, example))
            })
            .map(|(index, example)| (index, cosine_similarity(&query, example)))
            .collect();
        neighbours.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
        neighbours.truncate(self.k);

        let mut votes = vec![0usize; self.labels.len()];
        for (index, _) in &neighbours {
            votes[*index] += 1;
        }

        // Ties go to the label that comes first in the label set.
        let best = votes
            .iter()
            .enumerate()
            .fold(0, |best, (i, &v)| if v > votes[best] { i } else { best });

        let total = neighbours.len() as f32;
        let confidences = self
            .labels
            .labels()
            .cloned()
            .zip(votes.iter().map(|&v| v as f32 / total))
            .collect::<HashMap<_, _>>();
        let label = self
            .labels
            .labels()
            .nth(best)
            .cloned()
            .ok_or_else(|| ClassifierError::PredictionError("No label for best vote".into()))?;

        Ok(Prediction { label, confidences })
    }

    fn example_count(&self) -> usize {
        self.examples.iter().map(Vec::len).sum()
    }

    fn accepts(&self, label: &Label) -> bool {
        self.labels.contains(label)
    }
}
