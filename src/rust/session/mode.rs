use std::collections::HashSet;
use std::fmt;

use super::error::SessionError;
use crate::{Label, LabelSet};

/// The current phase of a gesture session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    SettingUp,
    Ready,
    Training(Label),
    Predicting,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::SettingUp => f.write_str("setting up"),
            Mode::Ready => f.write_str("ready"),
            Mode::Training(label) => write!(f, "training '{}'", label),
            Mode::Predicting => f.write_str("predicting"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerKind {
    Training,
    Prediction,
}

/// Proof that a controller was started for the current mode.
///
/// Issued by [`ModeMachine`] on entry to training or prediction; every
/// extractor and classifier call made by a controller is checked against the
/// token that is active right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerToken {
    generation: u64,
    kind: ControllerKind,
}

impl ControllerToken {
    pub fn kind(&self) -> ControllerKind {
        self.kind
    }
}

/// Outcome of a completed `train` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainingCompletion {
    pub label: Label,
    pub trained_count: usize,
    pub total: usize,
    /// True for the single call that filled the trained-label set.
    pub entered_predicting: bool,
}

/// Owns the mode, the trained-label set and the active controller token.
#[derive(Debug)]
pub struct ModeMachine {
    mode: Mode,
    labels: LabelSet,
    trained: HashSet<Label>,
    generation: u64,
    active: Option<ControllerToken>,
}

impl ModeMachine {
    pub fn new(labels: LabelSet) -> Self {
        Self {
            mode: Mode::SettingUp,
            labels,
            trained: HashSet::new(),
            generation: 0,
            active: None,
        }
    }

    pub fn mode(&self) -> &Mode {
        &self.mode
    }

    pub fn labels(&self) -> &LabelSet {
        &self.labels
    }

    /// Trained labels in label-set order.
    pub fn trained_labels(&self) -> Vec<Label> {
        self.labels
            .labels()
            .filter(|label| self.trained.contains(*label))
            .cloned()
            .collect()
    }

    pub fn is_trained(&self, label: &Label) -> bool {
        self.trained.contains(label)
    }

    pub fn is_complete(&self) -> bool {
        self.trained.len() == self.labels.len()
    }

    fn invalid(&self, action: &'static str) -> SessionError {
        SessionError::InvalidMode {
            action,
            mode: self.mode.clone(),
        }
    }

    fn issue(&mut self, kind: ControllerKind) -> ControllerToken {
        self.generation += 1;
        let token = ControllerToken {
            generation: self.generation,
            kind,
        };
        self.active = Some(token);
        token
    }

    /// `SettingUp → Ready`, once the camera and the models are up.
    pub fn mark_ready(&mut self) -> Result<(), SessionError> {
        if self.mode != Mode::SettingUp {
            return Err(self.invalid("finish setup"));
        }
        self.mode = Mode::Ready;
        Ok(())
    }

    /// `Ready → Training(label)`.
    pub fn begin_training(&mut self, label: &Label) -> Result<ControllerToken, SessionError> {
        if !self.labels.contains(label) {
            return Err(SessionError::UnknownLabel(label.clone()));
        }
        if self.mode != Mode::Ready {
            return Err(self.invalid("start training"));
        }
        self.mode = Mode::Training(label.clone());
        Ok(self.issue(ControllerKind::Training))
    }

    /// Fails unless `token` is the active one.
    pub fn validate(&self, token: &ControllerToken) -> Result<(), SessionError> {
        match self.active {
            Some(active) if active == *token => Ok(()),
            _ => Err(SessionError::StaleController),
        }
    }

    /// `Training(label) → Ready`, or `→ Predicting` when this label fills the
    /// trained-label set.
    pub fn finish_training(&mut self, token: &ControllerToken) -> Result<TrainingCompletion, SessionError> {
        self.validate(token)?;
        let label = match &self.mode {
            Mode::Training(label) => label.clone(),
            _ => return Err(self.invalid("finish training")),
        };
        self.active = None;
        self.trained.insert(label.clone());

        let entered_predicting = self.is_complete();
        self.mode = if entered_predicting {
            Mode::Predicting
        } else {
            Mode::Ready
        };
        Ok(TrainingCompletion {
            label,
            trained_count: self.trained.len(),
            total: self.labels.len(),
            entered_predicting,
        })
    }

    /// `Training(label) → Ready` after a failed sampling loop; the label stays
    /// untrained unless an earlier run already completed it.
    pub fn abort_training(&mut self, token: &ControllerToken) -> Result<(), SessionError> {
        self.validate(token)?;
        self.active = None;
        self.mode = Mode::Ready;
        Ok(())
    }

    /// Hands out the prediction token. Only valid in `Predicting`, and only
    /// one prediction controller at a time.
    pub fn begin_prediction(&mut self) -> Result<ControllerToken, SessionError> {
        if self.mode != Mode::Predicting {
            return Err(self.invalid("start prediction"));
        }
        if self.active.is_some() {
            return Err(SessionError::PredictionAlreadyRunning);
        }
        Ok(self.issue(ControllerKind::Prediction))
    }

    /// Releases the prediction token so a new loop may be started.
    pub fn end_prediction(&mut self, token: &ControllerToken) {
        if self.active == Some(*token) {
            self.active = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn machine() -> ModeMachine {
        ModeMachine::new(LabelSet::from_pairs([("none", ""), ("thumbs_up", "👍")]).unwrap())
    }

    fn train(machine: &mut ModeMachine, label: &str) -> TrainingCompletion {
        let token = machine.begin_training(&Label::from(label)).unwrap();
        machine.finish_training(&token).unwrap()
    }

    #[test]
    fn test_starts_setting_up() {
        let machine = machine();
        assert_eq!(machine.mode(), &Mode::SettingUp);
        assert!(machine.trained_labels().is_empty());
    }

    #[test]
    fn test_training_requires_ready() {
        let mut machine = machine();
        let result = machine.begin_training(&Label::from("none"));
        assert!(matches!(result, Err(SessionError::InvalidMode { .. })));
        assert_eq!(machine.mode(), &Mode::SettingUp);
    }

    #[test]
    fn test_unknown_label() {
        let mut machine = machine();
        machine.mark_ready().unwrap();
        let result = machine.begin_training(&Label::from("wave"));
        assert_eq!(result, Err(SessionError::UnknownLabel(Label::from("wave"))));
        assert_eq!(machine.mode(), &Mode::Ready);
    }

    #[test]
    fn test_setup_happens_once() {
        let mut machine = machine();
        machine.mark_ready().unwrap();
        assert!(machine.mark_ready().is_err());
    }

    #[test]
    fn test_full_cycle_enters_predicting_once() {
        let mut machine = machine();
        machine.mark_ready().unwrap();

        let first = train(&mut machine, "none");
        assert!(!first.entered_predicting);
        assert_eq!(machine.mode(), &Mode::Ready);

        // Retraining does not grow the set.
        let again = train(&mut machine, "none");
        assert!(!again.entered_predicting);
        assert_eq!(again.trained_count, 1);

        let last = train(&mut machine, "thumbs_up");
        assert!(last.entered_predicting);
        assert_eq!(last.trained_count, 2);
        assert_eq!(machine.mode(), &Mode::Predicting);

        // Predicting is terminal.
        assert!(machine.begin_training(&Label::from("none")).is_err());
    }

    #[test]
    fn test_concurrent_training_rejected() {
        let mut machine = machine();
        machine.mark_ready().unwrap();
        let _token = machine.begin_training(&Label::from("none")).unwrap();
        let second = machine.begin_training(&Label::from("thumbs_up"));
        assert!(matches!(second, Err(SessionError::InvalidMode { .. })));
    }

    #[test]
    fn test_abort_keeps_label_untrained() {
        let mut machine = machine();
        machine.mark_ready().unwrap();
        let token = machine.begin_training(&Label::from("none")).unwrap();
        machine.abort_training(&token).unwrap();
        assert_eq!(machine.mode(), &Mode::Ready);
        assert!(!machine.is_trained(&Label::from("none")));
        assert_eq!(machine.validate(&token), Err(SessionError::StaleController));
    }

    #[test]
    fn test_prediction_token_lifecycle() {
        let mut machine = machine();
        assert!(machine.begin_prediction().is_err());
        machine.mark_ready().unwrap();
        train(&mut machine, "none");
        train(&mut machine, "thumbs_up");

        let token = machine.begin_prediction().unwrap();
        assert_eq!(token.kind(), ControllerKind::Prediction);
        assert_eq!(
            machine.begin_prediction(),
            Err(SessionError::PredictionAlreadyRunning)
        );
        machine.end_prediction(&token);
        let next = machine.begin_prediction().unwrap();
        assert_ne!(next, token);
        assert_eq!(machine.validate(&token), Err(SessionError::StaleController));
    }
}
