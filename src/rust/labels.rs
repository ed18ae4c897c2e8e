use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A gesture category identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Label(String);

impl Label {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Label {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for Label {
    fn from(name: String) -> Self {
        Self(name)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LabelSetError {
    #[error("Gesture label cannot be empty")]
    EmptyLabel,
    #[error("Gesture label '{0}' is defined more than once")]
    Duplicate(String),
    #[error("At least one gesture must be defined")]
    NoGestures,
}

/// One entry of the icon table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Gesture {
    pub label: Label,
    /// Display token, empty when the gesture has no icon.
    #[serde(default)]
    pub icon: String,
}

impl Gesture {
    pub fn new(label: impl Into<Label>, icon: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            icon: icon.into(),
        }
    }
}

/// The fixed, ordered set of gestures known at startup together with their
/// display tokens.
///
/// The length of the set is what training completion is measured against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelSet {
    gestures: Vec<Gesture>,
}

impl LabelSet {
    pub fn new(gestures: Vec<Gesture>) -> Result<Self, LabelSetError> {
        if gestures.is_empty() {
            return Err(LabelSetError::NoGestures);
        }
        for (i, gesture) in gestures.iter().enumerate() {
            if gesture.label.as_str().is_empty() {
                return Err(LabelSetError::EmptyLabel);
            }
            if gestures[..i].iter().any(|g| g.label == gesture.label) {
                return Err(LabelSetError::Duplicate(gesture.label.to_string()));
            }
        }
        Ok(Self { gestures })
    }

    /// Builds a set from `(label, icon)` pairs.
    pub fn from_pairs<L, I>(pairs: impl IntoIterator<Item = (L, I)>) -> Result<Self, LabelSetError>
    where
        L: Into<Label>,
        I: Into<String>,
    {
        Self::new(pairs.into_iter().map(|(l, i)| Gesture::new(l, i)).collect())
    }

    pub fn len(&self) -> usize {
        self.gestures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.gestures.is_empty()
    }

    pub fn contains(&self, label: &Label) -> bool {
        self.position(label).is_some()
    }

    /// Index of `label` in startup order.
    pub fn position(&self, label: &Label) -> Option<usize> {
        self.gestures.iter().position(|g| &g.label == label)
    }

    pub fn labels(&self) -> impl Iterator<Item = &Label> {
        self.gestures.iter().map(|g| &g.label)
    }

    pub fn gestures(&self) -> &[Gesture] {
        &self.gestures
    }

    /// Display token for `label`. Known labels without an icon and unknown
    /// labels both map to the empty token.
    pub fn icon(&self, label: &Label) -> &str {
        self.gestures
            .iter()
            .find(|g| &g.label == label)
            .map(|g| g.icon.as_str())
            .unwrap_or("")
    }
}

impl Default for LabelSet {
    fn default() -> Self {
        Self {
            gestures: vec![
                Gesture::new("none", ""),
                Gesture::new("point_right", "👉"),
                Gesture::new("point_left", "👈"),
                Gesture::new("thumbs_up", "👍"),
                Gesture::new("thumbs_down", "👎"),
                Gesture::new("victory", "✌️"),
                Gesture::new("ok", "👌"),
                Gesture::new("heart", "❤️"),
            ],
        }
    }
}
