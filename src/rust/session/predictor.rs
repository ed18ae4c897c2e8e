use std::collections::HashMap;
use std::sync::{Arc, Weak};

use log::{debug, info, warn};
use tokio::task::JoinHandle;
use tokio::time;

use super::{lock, ControllerToken, GestureSession, SessionError};
use crate::{CancelToken, FeatureExtractor, IncrementalClassifier, Label};

/// One classified frame.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionOutcome {
    pub label: Label,
    pub confidence: f32,
    pub confidences: HashMap<Label, f32>,
    /// Display token for `label`, empty when it has none.
    pub icon: String,
}

/// Controls a running prediction loop.
#[derive(Debug)]
pub struct PredictionHandle {
    cancel: CancelToken,
    task: JoinHandle<()>,
}

impl PredictionHandle {
    /// Asks the loop to stop at its next check.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Cancels the loop and waits for it to wind down.
    pub async fn stop(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            warn!("Prediction loop ended abnormally: {}", e);
        }
    }
}

enum Cycle {
    Shown,
    Skipped,
}

impl<E: FeatureExtractor, C: IncrementalClassifier> GestureSession<E, C> {
    /// Starts the prediction loop on the tokio scheduler.
    ///
    /// Every cycle classifies the current frame, shows the matching icon for
    /// `prediction_interval`, hides it, and only then moves on to the next
    /// cycle. The loop runs until the handle is cancelled or the session is
    /// shut down or dropped. A failed cycle is published and skipped.
    ///
    /// # Errors
    /// - `InvalidMode` unless every gesture has been trained
    /// - `PredictionAlreadyRunning` if a loop is already active
    pub fn run_prediction(self: &Arc<Self>) -> Result<PredictionHandle, SessionError> {
        let token = match lock(&self.machine).begin_prediction() {
            Ok(token) => token,
            Err(e) => {
                warn!("Cannot start prediction: {}", e);
                self.display.error(&e);
                return Err(e);
            }
        };
        info!("Starting prediction loop");

        let cancel = CancelToken::new();
        let session = Arc::downgrade(self);
        let loop_cancel = cancel.clone();
        let task = tokio::spawn(Self::prediction_loop(session, token, loop_cancel));
        Ok(PredictionHandle { cancel, task })
    }

    /// Holds the session weakly between cycles so dropping it ends the loop.
    async fn prediction_loop(session: Weak<Self>, token: ControllerToken, cancel: CancelToken) {
        while let Some(this) = session.upgrade() {
            if !this.step(&token, &cancel).await {
                lock(&this.machine).end_prediction(&token);
                break;
            }
        }
        info!("Prediction loop stopped");
    }

    /// Runs one cycle. False once the loop should stop.
    async fn step(&self, token: &ControllerToken, cancel: &CancelToken) -> bool {
        if cancel.is_cancelled() || self.shutdown.is_cancelled() {
            return false;
        }
        match self.prediction_cycle(token, cancel).await {
            Ok(Cycle::Shown) | Ok(Cycle::Skipped) => true,
            Err(SessionError::Cancelled) | Err(SessionError::StaleController) => false,
            Err(e) => {
                warn!("Prediction cycle failed: {}", e);
                self.display.error(&e);
                self.pause(cancel).await
            }
        }
    }

    async fn prediction_cycle(&self, token: &ControllerToken, cancel: &CancelToken) -> Result<Cycle, SessionError> {
        if !self.models_ready() {
            debug!("Models not ready, skipping prediction cycle");
            return if self.pause(cancel).await {
                Ok(Cycle::Skipped)
            } else {
                Err(SessionError::Cancelled)
            };
        }

        let outcome = self.classify_current(token).await?;
        debug!("Label: {} Confidence: {:.2}", outcome.label, outcome.confidence);

        let generation = self
            .display
            .show_icon(outcome.label, outcome.confidence, outcome.icon);
        let completed = self.pause(cancel).await;
        // Hide before the next cycle is scheduled; a stale generation is a no-op.
        self.display.hide_icon(generation);

        if completed {
            Ok(Cycle::Shown)
        } else {
            Err(SessionError::Cancelled)
        }
    }

    /// Classifies the current frame without touching the display.
    async fn classify_current(&self, token: &ControllerToken) -> Result<PredictionOutcome, SessionError> {
        let embedding = self.extract_current(token).await?;
        self.validate(token)?;
        let prediction = {
            let guard = lock(&self.classifier);
            let classifier = guard.as_ref().ok_or(SessionError::ClassifierNotReady)?;
            classifier.predict(&embedding)?
        };
        let icon = self.labels().icon(&prediction.label).to_string();
        Ok(PredictionOutcome {
            confidence: prediction.confidence(),
            label: prediction.label,
            confidences: prediction.confidences,
            icon,
        })
    }

    /// Waits one prediction interval. False if cancelled first.
    async fn pause(&self, cancel: &CancelToken) -> bool {
        tokio::select! {
            _ = time::sleep(self.config.prediction_interval) => true,
            _ = cancel.cancelled() => false,
            _ = self.shutdown.cancelled() => false,
        }
    }
}
