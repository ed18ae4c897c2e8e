use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::labels::{Gesture, LabelSet, LabelSetError};
use crate::runtime::RuntimeConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error reading config: {0}")]
    Io(#[from] io::Error),
    #[error("Invalid config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid gesture table: {0}")]
    Labels(#[from] LabelSetError),
    #[error("Invalid config value: {0}")]
    Invalid(String),
}

/// Timing and sizing of the training and prediction loops.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Samples collected per `train` call.
    pub samples_per_label: usize,
    /// Pause after each training sample so the frame can change.
    pub sample_interval: Duration,
    /// How long each predicted icon stays visible.
    pub prediction_interval: Duration,
    /// Buffered events per subscriber before slow readers start lagging.
    pub event_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            samples_per_label: 50,
            sample_interval: Duration::from_millis(100),
            prediction_interval: Duration::from_millis(200),
            event_capacity: 256,
        }
    }
}

impl SessionConfig {
    pub fn with_samples_per_label(mut self, samples: usize) -> Self {
        self.samples_per_label = samples;
        self
    }

    pub fn with_sample_interval(mut self, interval: Duration) -> Self {
        self.sample_interval = interval;
        self
    }

    pub fn with_prediction_interval(mut self, interval: Duration) -> Self {
        self.prediction_interval = interval;
        self
    }

    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.samples_per_label == 0 {
            return Err(ConfigError::Invalid("samples_per_label must be at least 1".into()));
        }
        if self.event_capacity == 0 {
            return Err(ConfigError::Invalid("event_capacity must be at least 1".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionSection {
    pub samples_per_label: usize,
    pub sample_interval_ms: u64,
    pub prediction_interval_ms: u64,
}

impl Default for SessionSection {
    fn default() -> Self {
        let defaults = SessionConfig::default();
        Self {
            samples_per_label: defaults.samples_per_label,
            sample_interval_ms: defaults.sample_interval.as_millis() as u64,
            prediction_interval_ms: defaults.prediction_interval.as_millis() as u64,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClassifierSection {
    pub k: usize,
}

impl Default for ClassifierSection {
    fn default() -> Self {
        Self {
            k: crate::KnnClassifierBuilder::DEFAULT_K,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CaptureSection {
    /// Folder replayed as the camera feed.
    pub frames_dir: PathBuf,
    pub fps: f32,
}

impl Default for CaptureSection {
    fn default() -> Self {
        Self {
            frames_dir: PathBuf::from("frames"),
            fps: crate::DirectoryDevice::DEFAULT_FPS,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuntimeSection {
    pub inter_threads: usize,
    pub intra_threads: usize,
    /// 0 disables graph optimization, 1 to 3 select increasing levels.
    pub optimization: Option<u8>,
}

/// Contents of `handsign.toml`.
///
/// Every section is optional; missing values fall back to defaults and a
/// missing `[[gestures]]` list means the built-in gesture table.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub session: SessionSection,
    pub classifier: ClassifierSection,
    pub capture: CaptureSection,
    pub runtime: RuntimeSection,
    pub gestures: Vec<Gesture>,
}

impl AppConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(text)?;
        config.session_config().validate()?;
        config.label_set()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&text)
    }

    /// Loads `path` when given and present, otherwise returns the defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) if path.exists() => Self::load(path),
            Some(path) => {
                log::warn!("Config file {:?} not found, using defaults", path);
                Ok(Self::default())
            }
            None => Ok(Self::default()),
        }
    }

    pub fn label_set(&self) -> Result<LabelSet, ConfigError> {
        if self.gestures.is_empty() {
            return Ok(LabelSet::default());
        }
        Ok(LabelSet::new(self.gestures.clone())?)
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig::default()
            .with_samples_per_label(self.session.samples_per_label)
            .with_sample_interval(Duration::from_millis(self.session.sample_interval_ms))
            .with_prediction_interval(Duration::from_millis(self.session.prediction_interval_ms))
    }

    pub fn runtime_config(&self) -> RuntimeConfig {
        let mut config = RuntimeConfig {
            inter_threads: self.runtime.inter_threads,
            intra_threads: self.runtime.intra_threads,
            ..RuntimeConfig::default()
        };
        if let Some(level) = self.runtime.optimization {
            config = config.with_optimization(level);
        }
        config
    }
}
