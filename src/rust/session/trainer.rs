use log::{debug, info, warn};
use tokio::time;

use super::{lock, ControllerToken, GestureSession, SessionError, TrainingCompletion, TrainingProgress};
use crate::{Embedding, FeatureExtractor, IncrementalClassifier, Label};

impl<E: FeatureExtractor, C: IncrementalClassifier> GestureSession<E, C> {
    /// Samples the live feed `samples_per_label` times for `label`.
    ///
    /// Each iteration embeds the current frame, hands the embedding to the
    /// classifier, reports `i / N` progress and then pauses for
    /// `sample_interval` so the next frame differs. When the last iteration
    /// completes the label joins the trained set; if that completes the set
    /// the session switches to `Predicting`.
    ///
    /// Any failure aborts the whole call: the session returns to `Ready`, the
    /// label is not marked trained, and the error is published.
    ///
    /// # Errors
    /// - `UnknownLabel` if `label` is not in the label set
    /// - `InvalidMode` unless the session is `Ready`
    /// - `ExtractionFailure` / `Classifier` if an iteration fails
    /// - `Cancelled` if the session is shut down mid-run
    pub async fn train(&self, label: impl Into<Label>) -> Result<TrainingCompletion, SessionError> {
        let label = label.into();
        let token = match lock(&self.machine).begin_training(&label) {
            Ok(token) => token,
            Err(e) => {
                warn!("Cannot train '{}': {}", label, e);
                self.display.error(&e);
                return Err(e);
            }
        };
        self.publish_mode();
        info!("Training for {}", label);

        self.sample_label(&label, &token)
            .await
            .and_then(|()| self.complete_training(&token))
            .map_err(|e| self.fail_training(&label, &token, e))
    }

    fn complete_training(&self, token: &ControllerToken) -> Result<TrainingCompletion, SessionError> {
        let completion = lock(&self.machine).finish_training(token)?;
        self.display
            .label_trained(completion.label.clone(), completion.trained_count, completion.total);
        self.publish_mode();
        info!(
            "Trained '{}' ({}/{} labels)",
            completion.label, completion.trained_count, completion.total
        );
        if completion.entered_predicting {
            info!("All gestures trained, switching to prediction");
        }
        Ok(completion)
    }

    /// Publishes `error` and hands the mode back to `Ready` if `token` still
    /// owns it.
    fn fail_training(&self, label: &Label, token: &ControllerToken, error: SessionError) -> SessionError {
        warn!("Training for '{}' failed: {}", label, error);
        // The token may already be gone if the session was shut down.
        let _ = lock(&self.machine).abort_training(token);
        self.display.error(&error);
        self.publish_mode();
        error
    }

    async fn sample_label(&self, label: &Label, token: &ControllerToken) -> Result<(), SessionError> {
        let total = self.config.samples_per_label;
        for completed in 1..=total {
            if self.shutdown.is_cancelled() {
                return Err(SessionError::Cancelled);
            }
            let embedding = self.extract_current(token).await?;
            self.submit_sample(token, embedding, label)?;

            debug!("Progress: {}%", completed * 100 / total);
            self.display.progress(TrainingProgress {
                label: label.clone(),
                completed,
                total,
            });

            tokio::select! {
                _ = time::sleep(self.config.sample_interval) => {}
                _ = self.shutdown.cancelled() => return Err(SessionError::Cancelled),
            }
        }
        Ok(())
    }

    fn submit_sample(
        &self,
        token: &ControllerToken,
        embedding: Embedding,
        label: &Label,
    ) -> Result<(), SessionError> {
        self.validate(token)?;
        let mut guard = lock(&self.classifier);
        let classifier = guard.as_mut().ok_or(SessionError::ClassifierNotReady)?;
        classifier.add_example(embedding, label)?;
        Ok(())
    }
}
