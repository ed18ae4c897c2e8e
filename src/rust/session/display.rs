use tokio::sync::{broadcast, watch};

use super::error::SessionError;
use super::mode::Mode;
use crate::Label;

/// How far one `train` call has got.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainingProgress {
    pub label: Label,
    pub completed: usize,
    pub total: usize,
}

impl TrainingProgress {
    pub fn fraction(&self) -> f32 {
        if self.total == 0 {
            return 0.0;
        }
        self.completed as f32 / self.total as f32
    }

    /// Whole percent, rounded down.
    pub fn percent(&self) -> usize {
        if self.total == 0 {
            return 0;
        }
        self.completed * 100 / self.total
    }
}

/// The short-lived icon shown for each prediction.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct IconPulse {
    pub visible: bool,
    pub icon: String,
    pub label: Option<Label>,
    pub confidence: f32,
    /// Incremented on every show; a hide only applies to its own generation.
    pub generation: u64,
}

/// Snapshot of everything a display surface renders.
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayState {
    pub mode: Mode,
    pub trained: Vec<Label>,
    pub progress: Option<TrainingProgress>,
    pub icon: IconPulse,
    /// The setup/training title, hidden once prediction takes over.
    pub show_title: bool,
    pub last_error: Option<String>,
}

impl Default for DisplayState {
    fn default() -> Self {
        Self {
            mode: Mode::SettingUp,
            trained: Vec::new(),
            progress: None,
            icon: IconPulse::default(),
            show_title: true,
            last_error: None,
        }
    }
}

/// Discrete changes, in the order they happened.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    ModeChanged(Mode),
    Progress(TrainingProgress),
    LabelTrained {
        label: Label,
        trained: usize,
        total: usize,
    },
    Prediction {
        label: Label,
        confidence: f32,
        icon: String,
        generation: u64,
    },
    IconHidden {
        generation: u64,
    },
    Error(SessionError),
}

/// Publishes display state and events to any number of observers.
#[derive(Debug)]
pub(crate) struct Display {
    state: watch::Sender<DisplayState>,
    events: broadcast::Sender<SessionEvent>,
}

impl Display {
    pub(crate) fn new(event_capacity: usize) -> Self {
        let (state, _) = watch::channel(DisplayState::default());
        let (events, _) = broadcast::channel(event_capacity.max(1));
        Self { state, events }
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<DisplayState> {
        self.state.subscribe()
    }

    pub(crate) fn events(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub(crate) fn snapshot(&self) -> DisplayState {
        self.state.borrow().clone()
    }

    fn emit(&self, event: SessionEvent) {
        // Nobody listening is fine.
        let _ = self.events.send(event);
    }

    pub(crate) fn set_mode(&self, mode: Mode, trained: Vec<Label>) {
        let changed = self.state.send_if_modified(|state| {
            state.trained = trained;
            if state.mode == mode {
                return false;
            }
            state.mode = mode.clone();
            if mode == Mode::Predicting {
                state.show_title = false;
            }
            true
        });
        if changed {
            self.emit(SessionEvent::ModeChanged(mode));
        }
    }

    pub(crate) fn progress(&self, progress: TrainingProgress) {
        self.state.send_modify(|state| state.progress = Some(progress.clone()));
        self.emit(SessionEvent::Progress(progress));
    }

    pub(crate) fn label_trained(&self, label: Label, trained: usize, total: usize) {
        self.state.send_modify(|state| state.last_error = None);
        self.emit(SessionEvent::LabelTrained {
            label,
            trained,
            total,
        });
    }

    /// Shows `icon` and returns the generation to hide it with.
    pub(crate) fn show_icon(&self, label: Label, confidence: f32, icon: String) -> u64 {
        let mut generation = 0;
        self.state.send_modify(|state| {
            generation = state.icon.generation + 1;
            state.icon = IconPulse {
                visible: true,
                icon: icon.clone(),
                label: Some(label.clone()),
                confidence,
                generation,
            };
        });
        self.emit(SessionEvent::Prediction {
            label,
            confidence,
            icon,
            generation,
        });
        generation
    }

    /// Hides the icon if it is still the one shown by `generation`.
    pub(crate) fn hide_icon(&self, generation: u64) -> bool {
        let hidden = self.state.send_if_modified(|state| {
            if state.icon.generation != generation || !state.icon.visible {
                return false;
            }
            state.icon.visible = false;
            true
        });
        if hidden {
            self.emit(SessionEvent::IconHidden { generation });
        }
        hidden
    }

    pub(crate) fn error(&self, error: &SessionError) {
        self.state
            .send_modify(|state| state.last_error = Some(error.to_string()));
        self.emit(SessionEvent::Error(error.clone()));
    }
}
