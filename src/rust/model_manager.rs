use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use sha2::{Digest, Sha256};
use tokio::sync::Mutex;

use crate::models::{BuiltinModel, ModelInfo};

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("Model not downloaded: {0}")]
    NotDownloaded(String),
    #[error("Download error: {0}")]
    DownloadError(#[from] reqwest::Error),
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
    #[error("Model verification failed")]
    VerificationFailed,
    #[error("Hash mismatch: expected {expected}, got {actual} for {file_type} file")]
    HashMismatch {
        file_type: String,
        expected: String,
        actual: String,
    },
}

/// Downloads, caches and verifies embedding models.
///
/// Built-in models without a pinned hash are trusted on first download: the
/// hash of the downloaded file is written next to it as `model.onnx.sha256`
/// and later verifications compare against that record.
#[derive(Clone, Debug)]
pub struct ModelManager {
    models_dir: PathBuf,
    download_lock: Arc<Mutex<()>>,
}

impl ModelManager {
    /// Creates a new ModelManager with the default models directory
    pub fn new_default() -> io::Result<Self> {
        Self::new(Self::get_default_models_dir())
    }

    /// Returns the default models directory path
    pub fn get_default_models_dir() -> PathBuf {
        // 1. Check environment variable
        if let Ok(path) = env::var("HANDSIGN_CACHE") {
            return PathBuf::from(path).join("models");
        }

        // 2. Use platform-specific cache directory
        if let Some(cache_dir) = dirs::cache_dir() {
            return cache_dir.join("handsign").join("models");
        }

        // 3. Fallback to user's home directory
        if let Some(home_dir) = dirs::home_dir() {
            return home_dir.join(".cache").join("handsign").join("models");
        }

        // 4. If all else fails, use system temp directory (platform agnostic)
        env::temp_dir().join("handsign").join("models")
    }

    pub fn new<P: AsRef<Path>>(models_dir: P) -> io::Result<Self> {
        let models_dir = models_dir.as_ref().to_path_buf();
        fs::create_dir_all(&models_dir)?;
        Ok(Self {
            models_dir,
            download_lock: Arc::new(Mutex::new(())),
        })
    }

    pub fn get_model_path(&self, model: BuiltinModel) -> PathBuf {
        let info = model.get_model_info();
        self.models_dir.join(info.name).join("model.onnx")
    }

    fn get_hash_record_path(&self, model: BuiltinModel) -> PathBuf {
        self.get_model_path(model).with_extension("onnx.sha256")
    }

    pub fn is_model_downloaded(&self, model: BuiltinModel) -> bool {
        let model_path = self.get_model_path(model);
        log::debug!("Model path: {:?} (exists: {})", model_path, model_path.exists());
        model_path.exists()
    }

    /// The hash a model file must match: the pinned one, else the recorded one.
    fn expected_hash(&self, model: BuiltinModel, info: &ModelInfo) -> Result<Option<String>, ModelError> {
        if let Some(hash) = &info.model_hash {
            return Ok(Some(hash.clone()));
        }
        let record = self.get_hash_record_path(model);
        if !record.exists() {
            return Ok(None);
        }
        Ok(Some(fs::read_to_string(record)?.trim().to_string()))
    }

    pub async fn download_model(&self, model: BuiltinModel) -> Result<(), ModelError> {
        let info = model.get_model_info();
        let _lock = self.download_lock.lock().await;

        let model_dir = self.models_dir.join(&info.name);
        log::info!("Creating model directory at {:?}", model_dir);
        fs::create_dir_all(&model_dir)?;

        let model_path = self.get_model_path(model);
        let result = if model_path.exists() && self.verify_model(model)? {
            log::info!("Existing model file verified successfully");
            Ok(())
        } else {
            if model_path.exists() {
                log::warn!("Model file verification failed, redownloading");
            } else {
                log::info!("Model file does not exist, downloading...");
            }
            self.download_and_verify_file(&info, model, &model_path).await
        };

        match result {
            Ok(()) => {
                log::info!("Model ready to use");
                Ok(())
            }
            Err(e) => {
                log::error!("Failed to setup model file: {}", e);
                // Cleanup on failure
                let _ = self.remove_download(model);
                Err(e)
            }
        }
    }

    fn hash_file(path: &Path) -> Result<String, ModelError> {
        let bytes = fs::read(path)?;
        log::debug!("Read {} bytes from {:?}", bytes.len(), path);
        Ok(Self::hash_bytes(&bytes))
    }

    fn hash_bytes(bytes: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        format!("{:x}", hasher.finalize())
    }

    /// Checks the downloaded model against its expected hash.
    ///
    /// Returns `Ok(false)` when the file is missing, empty, or does not match.
    pub fn verify_model(&self, model: BuiltinModel) -> Result<bool, ModelError> {
        let info = model.get_model_info();
        let model_path = self.get_model_path(model);
        log::info!("Verifying model file {:?}", model_path);

        if !model_path.exists() {
            log::info!("Model file does not exist");
            return Ok(false);
        }
        if fs::metadata(&model_path)?.len() == 0 {
            log::warn!("Model file is empty");
            return Ok(false);
        }

        let actual = Self::hash_file(&model_path)?;
        match self.expected_hash(model, &info)? {
            Some(expected) => {
                log::info!("Calculated hash: {}", actual);
                log::info!("Expected hash:   {}", expected);
                Ok(actual == expected)
            }
            None => {
                log::warn!("No hash on record for {}, accepting file as is", info.name);
                Ok(true)
            }
        }
    }

    async fn download_and_verify_file(
        &self,
        info: &ModelInfo,
        model: BuiltinModel,
        path: &Path,
    ) -> Result<(), ModelError> {
        log::info!("Downloading model file from {} to {:?}", info.model_url, path);
        let response = reqwest::get(&info.model_url).await?.error_for_status()?;
        log::info!("Download response status: {}", response.status());
        let bytes = response.bytes().await?;
        log::info!("Downloaded {} bytes", bytes.len());

        let hash = Self::hash_bytes(&bytes);
        log::info!("Calculated hash: {}", hash);
        if let Some(expected) = &info.model_hash {
            if &hash != expected {
                log::error!("model hash mismatch: expected {}, got {}", expected, hash);
                return Err(ModelError::HashMismatch {
                    file_type: "model".to_string(),
                    expected: expected.clone(),
                    actual: hash,
                });
            }
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        log::info!("Writing {} bytes to {:?}", bytes.len(), path);
        fs::write(path, &bytes)?;
        if info.model_hash.is_none() {
            fs::write(self.get_hash_record_path(model), &hash)?;
        }

        if !self.verify_model(model)? {
            return Err(ModelError::VerificationFailed);
        }
        log::info!("model file downloaded and verified successfully");
        Ok(())
    }

    pub fn remove_download(&self, model: BuiltinModel) -> Result<(), ModelError> {
        let model_path = self.get_model_path(model);
        let record_path = self.get_hash_record_path(model);

        if model_path.exists() {
            fs::remove_file(&model_path)?;
        }
        if record_path.exists() {
            fs::remove_file(&record_path)?;
        }
        Ok(())
    }

    /// Ensures that a model is downloaded and verified.
    /// If the model doesn't exist, it will be downloaded.
    /// If verification fails, it will be re-downloaded.
    pub async fn ensure_model_downloaded(&self, model: BuiltinModel) -> Result<(), ModelError> {
        log::info!("Checking if model {:?} is downloaded...", model);
        if !self.is_model_downloaded(model) {
            log::info!("Model not found, downloading...");
            self.download_model(model).await?;
        } else if !self.verify_model(model)? {
            log::info!("Model verification failed, re-downloading...");
            self.remove_download(model)?;
            self.download_model(model).await?;
        } else {
            log::info!("Model verification successful");
        }
        Ok(())
    }

    /// Fails with `NotDownloaded` unless the model is present and verified.
    pub fn require_model(&self, model: BuiltinModel) -> Result<PathBuf, ModelError> {
        if !self.verify_model(model)? {
            return Err(ModelError::NotDownloaded(format!("{:?}", model)));
        }
        Ok(self.get_model_path(model))
    }
}
