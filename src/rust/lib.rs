//! Train-then-predict hand gesture recognition over a live video feed.
//!
//! A [`GestureSession`] opens a camera, embeds frames with a pretrained
//! image model and feeds the embeddings to an incremental classifier. Once
//! every gesture in the [`LabelSet`] has been trained the session switches to
//! prediction and shows the icon of the recognised gesture for a short while
//! on every cycle.
//!
//! # Basic Usage
//!
//! ```no_run
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! use std::sync::Arc;
//! use handsign::{
//!     BuiltinModel, DirectoryDevice, GestureSession, KnnClassifier, LabelSet,
//!     OnnxFeatureExtractor, RuntimeConfig, SessionConfig,
//! };
//!
//! let labels = LabelSet::default();
//! let session = Arc::new(GestureSession::new(labels.clone(), SessionConfig::default())?);
//!
//! let classifier = KnnClassifier::builder().with_labels(labels.clone()).build()?;
//! session
//!     .setup(
//!         Arc::new(DirectoryDevice::new("frames")),
//!         || OnnxFeatureExtractor::with_model(BuiltinModel::MobileNetV2, &RuntimeConfig::default()),
//!         classifier,
//!     )
//!     .await?;
//!
//! for label in labels.labels() {
//!     session.train(label.clone()).await?;
//! }
//!
//! let handle = session.run_prediction()?;
//! let mut events = session.events();
//! while let Ok(event) = events.recv().await {
//!     println!("{:?}", event);
//! }
//! handle.stop().await;
//! # Ok(())
//! # }
//! ```
//!
//! # Observing a session
//!
//! Display surfaces either watch the latest [`DisplayState`] through
//! [`GestureSession::subscribe`] or consume every [`SessionEvent`] in order
//! through [`GestureSession::events`].

mod cancel;
pub mod capture;
pub mod classifier;
pub mod config;
pub mod extractor;
pub mod labels;
pub mod model_manager;
pub mod models;
mod runtime;
pub mod session;

pub use cancel::CancelToken;
pub use capture::{
    CaptureDevice, CaptureError, CaptureSession, DirectoryDevice, Frame, StreamRequest, VideoStream,
};
pub use classifier::{
    ClassifierError, ClassifierInfo, IncrementalClassifier, KnnClassifier, KnnClassifierBuilder,
    Prediction,
};
pub use config::{AppConfig, ConfigError, SessionConfig};
pub use extractor::{Embedding, ExtractionError, FeatureExtractor, OnnxFeatureExtractor};
pub use labels::{Gesture, Label, LabelSet, LabelSetError};
pub use model_manager::{ModelError, ModelManager};
pub use models::{BuiltinModel, ModelCharacteristics, ModelInfo};
pub use runtime::{create_session_builder, RuntimeConfig};
pub use session::{
    ControllerKind, ControllerToken, DisplayState, GestureSession, IconPulse, Mode, ModeMachine,
    PredictionHandle, PredictionOutcome, SessionError, SessionEvent, TrainingCompletion,
    TrainingProgress,
};

pub fn init_logger() {
    env_logger::init();
}
