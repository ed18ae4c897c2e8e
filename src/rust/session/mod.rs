//! Training and prediction orchestration.
//!
//! A [`GestureSession`] ties the capture session, the feature extractor and
//! the incremental classifier together and walks through
//! `SettingUp → Ready → Training(label) → … → Predicting`.
//!
//! Observers follow along through [`GestureSession::subscribe`] (latest
//! [`DisplayState`]) and [`GestureSession::events`] (every [`SessionEvent`]).

mod display;
mod error;
mod mode;
mod predictor;
#[cfg(test)]
mod testing;
mod trainer;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use log::{error, info};
use tokio::sync::{broadcast, watch};

use crate::{
    CancelToken, CaptureDevice, CaptureSession, ClassifierError, ConfigError, ExtractionError,
    FeatureExtractor, Frame, IncrementalClassifier, Label, LabelSet, SessionConfig,
};

pub use display::{DisplayState, IconPulse, SessionEvent, TrainingProgress};
pub use error::SessionError;
pub use mode::{ControllerKind, ControllerToken, Mode, ModeMachine, TrainingCompletion};
pub use predictor::{PredictionHandle, PredictionOutcome};

use display::Display;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A fresh classifier must be empty and able to learn every gesture, or the
/// trained-label set could never fill up.
fn check_classifier<C: IncrementalClassifier>(classifier: &C, labels: &LabelSet) -> Result<(), ClassifierError> {
    if classifier.example_count() > 0 {
        return Err(ClassifierError::ValidationError(
            "Classifier must start without examples".into(),
        ));
    }
    if let Some(label) = labels.labels().find(|label| !classifier.accepts(label)) {
        return Err(ClassifierError::ValidationError(format!(
            "Classifier cannot learn gesture '{}'",
            label
        )));
    }
    Ok(())
}

/// One end-to-end gesture recognition session.
///
/// Shared between tasks as `Arc<GestureSession<_, _>>`. Locks guarding the
/// mode machine and the classifier are only held for the duration of a
/// single synchronous call, never across an `.await`.
pub struct GestureSession<E: FeatureExtractor, C: IncrementalClassifier> {
    config: SessionConfig,
    machine: Mutex<ModeMachine>,
    capture: Mutex<Option<Arc<CaptureSession>>>,
    extractor: RwLock<Option<Arc<E>>>,
    classifier: Mutex<Option<C>>,
    display: Display,
    shutdown: CancelToken,
}

impl<E: FeatureExtractor, C: IncrementalClassifier> GestureSession<E, C> {
    /// Creates a session in `SettingUp`.
    ///
    /// # Errors
    /// - `Invalid` if `config` asks for zero samples per label or a zero-sized
    ///   event buffer
    pub fn new(labels: LabelSet, config: SessionConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let display = Display::new(config.event_capacity);
        Ok(Self {
            config,
            machine: Mutex::new(ModeMachine::new(labels)),
            capture: Mutex::new(None),
            extractor: RwLock::new(None),
            classifier: Mutex::new(None),
            display,
            shutdown: CancelToken::new(),
        })
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn mode(&self) -> Mode {
        lock(&self.machine).mode().clone()
    }

    pub fn labels(&self) -> LabelSet {
        lock(&self.machine).labels().clone()
    }

    pub fn trained_labels(&self) -> Vec<Label> {
        lock(&self.machine).trained_labels()
    }

    /// Latest display state, updated on every change.
    pub fn subscribe(&self) -> watch::Receiver<DisplayState> {
        self.display.subscribe()
    }

    /// Every event from now on, in order.
    pub fn events(&self) -> broadcast::Receiver<SessionEvent> {
        self.display.events()
    }

    pub fn display_state(&self) -> DisplayState {
        self.display.snapshot()
    }

    /// Most recent camera frame, if the camera is up.
    pub fn current_frame(&self) -> Option<Arc<Frame>> {
        lock(&self.capture).as_ref().and_then(|capture| capture.current_frame())
    }

    /// Number of samples the classifier holds.
    pub fn example_count(&self) -> usize {
        lock(&self.classifier)
            .as_ref()
            .map(|classifier| classifier.example_count())
            .unwrap_or(0)
    }

    /// Runs `f` against the classifier, if it is initialized.
    pub fn with_classifier<R>(&self, f: impl FnOnce(&C) -> R) -> Option<R> {
        lock(&self.classifier).as_ref().map(f)
    }

    /// Whether both the extractor and the classifier are initialized.
    pub fn models_ready(&self) -> bool {
        let extractor_ready = self
            .extractor
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some();
        extractor_ready && lock(&self.classifier).is_some()
    }

    /// Cancels setup, training and prediction, and stops the camera.
    pub fn shutdown(&self) {
        info!("Shutting down gesture session");
        self.shutdown.cancel();
        if let Some(capture) = lock(&self.capture).as_ref() {
            capture.stop();
        }
    }

    /// Brings the session from `SettingUp` to `Ready`: opens the camera,
    /// loads the extractor on the blocking pool and installs the classifier.
    ///
    /// On failure the session stays in `SettingUp`, the error is published,
    /// and `setup` may be called again.
    pub async fn setup<F>(
        &self,
        device: Arc<dyn CaptureDevice>,
        load_extractor: F,
        classifier: C,
    ) -> Result<(), SessionError>
    where
        F: FnOnce() -> Result<E, ExtractionError> + Send + 'static,
    {
        let result = self.try_setup(device, load_extractor, classifier).await;
        match &result {
            Ok(()) => {
                info!("Setup complete, ready to train");
                self.publish_mode();
            }
            Err(e) => {
                error!("Setup failed: {}", e);
                self.display.error(e);
            }
        }
        result
    }

    async fn try_setup<F>(
        &self,
        device: Arc<dyn CaptureDevice>,
        load_extractor: F,
        classifier: C,
    ) -> Result<(), SessionError>
    where
        F: FnOnce() -> Result<E, ExtractionError> + Send + 'static,
    {
        {
            let machine = lock(&self.machine);
            if machine.mode() != &Mode::SettingUp {
                return Err(SessionError::InvalidMode {
                    action: "set up",
                    mode: machine.mode().clone(),
                });
            }
            check_classifier(&classifier, machine.labels())?;
        }

        info!("Setting up camera");
        let capture = CaptureSession::acquire(device, self.shutdown.clone()).await?;

        info!("Loading feature extractor");
        let extractor = tokio::task::spawn_blocking(load_extractor)
            .await
            .map_err(|e| ExtractionError::BuildError(format!("Extractor task failed: {}", e)))??;

        let mut machine = lock(&self.machine);
        machine.mark_ready()?;
        *lock(&self.capture) = Some(Arc::new(capture));
        *self.extractor.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(extractor));
        *lock(&self.classifier) = Some(classifier);
        Ok(())
    }

    fn publish_mode(&self) {
        let (mode, trained) = {
            let machine = lock(&self.machine);
            (machine.mode().clone(), machine.trained_labels())
        };
        self.display.set_mode(mode, trained);
    }

    fn validate(&self, token: &ControllerToken) -> Result<(), SessionError> {
        lock(&self.machine).validate(token)
    }

    fn extractor(&self) -> Option<Arc<E>> {
        self.extractor
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Embeds the current frame on the blocking pool.
    async fn extract_current(&self, token: &ControllerToken) -> Result<crate::Embedding, SessionError> {
        self.validate(token)?;
        let extractor = self.extractor().ok_or(SessionError::ClassifierNotReady)?;
        let frame = self.current_frame().ok_or(ExtractionError::NoFrame)?;
        let embedding = tokio::task::spawn_blocking(move || extractor.extract(&frame))
            .await
            .map_err(|e| ExtractionError::ModelError(format!("Extraction task failed: {}", e)))??;
        Ok(embedding)
    }
}
