use std::collections::HashMap;

use image::imageops::{self, FilterType};
use image::RgbImage;
use log::{error, info};
use ndarray::{Array1, Array4};
use ort::session::Session;
use ort::value::Tensor;

use super::{Embedding, ExtractionError, FeatureExtractor};
use crate::classifier::normalize_vector;
use crate::runtime::{create_session_builder, RuntimeConfig};
use crate::{BuiltinModel, Frame, ModelCharacteristics, ModelManager};

/// ImageNet channel statistics the built-in models were trained with.
const MEAN: [f32; 3] = [0.485, 0.456, 0.406];
const STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Feature extractor backed by an ONNX image model.
///
/// The model is expected to:
/// - Accept one float input of shape [1, 3, size, size] (NCHW, ImageNet-normalized RGB)
/// - Produce at least one output; the named embedding output, or else the
///   first output, is flattened into the embedding
///
/// ```no_run
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// use handsign::{BuiltinModel, OnnxFeatureExtractor, RuntimeConfig};
///
/// let extractor = OnnxFeatureExtractor::with_model(BuiltinModel::MobileNetV2, &RuntimeConfig::default())?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct OnnxFeatureExtractor {
    pub model_path: String,
    session: Session,
    input_name: String,
    output_name: String,
    model_characteristics: ModelCharacteristics,
}

impl OnnxFeatureExtractor {
    /// Loads a built-in model from the default model cache.
    ///
    /// # Errors
    /// - `BuildError` if the model is not downloaded, cannot be loaded or has
    ///   an unexpected structure
    pub fn with_model(model: BuiltinModel, config: &RuntimeConfig) -> Result<Self, ExtractionError> {
        let manager = ModelManager::new_default()
            .map_err(|e| ExtractionError::BuildError(format!("Failed to create model manager: {}", e)))?;

        let model_path = manager.require_model(model).map_err(|e| {
            ExtractionError::BuildError(format!(
                "Model '{:?}' is not ready ({}). Please download it first using ModelManager::download_model()",
                model, e
            ))
        })?;

        let session = create_session_builder(config)?
            .commit_from_file(&model_path)
            .map_err(|e| {
                error!("Failed to load model {:?}: {}", model_path, e);
                ExtractionError::BuildError(format!("Failed to load model: {}", e))
            })?;
        let wanted = model.get_model_info().embedding_output;
        let (input_name, output_name) = Self::validate_model(&session, wanted.as_deref())?;
        info!("Model structure validated successfully");

        Ok(Self {
            model_path: model_path.to_string_lossy().to_string(),
            session,
            input_name,
            output_name,
            model_characteristics: model.characteristics(),
        })
    }

    /// Loads a custom ONNX image model.
    ///
    /// # Arguments
    /// * `model_path` - Path to the ONNX model file
    /// * `input_size` - Side length of the square input the model expects
    /// * `embedding_output` - Output to read embeddings from, the first one if `None`
    ///
    /// The embedding size is inferred by running a blank frame through the model.
    pub fn with_custom_model(
        model_path: &str,
        input_size: u32,
        embedding_output: Option<&str>,
        config: &RuntimeConfig,
    ) -> Result<Self, ExtractionError> {
        if model_path.is_empty() {
            return Err(ExtractionError::BuildError("Model path cannot be empty".to_string()));
        }
        if input_size == 0 {
            return Err(ExtractionError::BuildError("Input size cannot be zero".to_string()));
        }
        if !std::path::Path::new(model_path).exists() {
            return Err(ExtractionError::BuildError(format!("Model file not found: {}", model_path)));
        }

        let session = create_session_builder(config)?.commit_from_file(model_path)?;
        let (input_name, output_name) = Self::validate_model(&session, embedding_output)?;
        info!("Model structure validated successfully");

        let mut extractor = Self {
            model_path: model_path.to_string(),
            session,
            input_name,
            output_name,
            model_characteristics: ModelCharacteristics {
                embedding_size: 0,
                input_size,
                model_size_mb: 0, // Not critical for functionality
            },
        };

        let probe = Frame {
            id: 0,
            timestamp: 0.0,
            width: input_size,
            height: input_size,
            rgb: vec![0; input_size as usize * input_size as usize * 3],
        };
        let embedding_size = extractor.extract(&probe)?.len();
        info!("Inferred embedding size from model: {}", embedding_size);
        extractor.model_characteristics.embedding_size = embedding_size;

        Ok(extractor)
    }

    pub fn characteristics(&self) -> &ModelCharacteristics {
        &self.model_characteristics
    }

    /// Resizes and normalizes a frame into the model's NCHW input layout.
    fn preprocess(&self, frame: &Frame) -> Result<Array4<f32>, ExtractionError> {
        if !frame.is_well_formed() {
            return Err(ExtractionError::MalformedFrame(format!(
                "frame {} has {} bytes for {}x{} pixels",
                frame.id,
                frame.rgb.len(),
                frame.width,
                frame.height
            )));
        }
        let image = RgbImage::from_raw(frame.width, frame.height, frame.rgb.clone())
            .ok_or_else(|| ExtractionError::MalformedFrame(format!("frame {} could not be decoded", frame.id)))?;

        let size = self.model_characteristics.input_size;
        let resized = imageops::resize(&image, size, size, FilterType::Triangle);

        let mut input = Array4::<f32>::zeros((1, 3, size as usize, size as usize));
        for (x, y, pixel) in resized.enumerate_pixels() {
            for c in 0..3 {
                input[[0, c, y as usize, x as usize]] = (pixel[c] as f32 / 255.0 - MEAN[c]) / STD[c];
            }
        }
        Ok(input)
    }

    /// Checks the model has an input to feed and an output to read, and
    /// returns the names of both.
    fn validate_model(session: &Session, wanted: Option<&str>) -> Result<(String, String), ExtractionError> {
        let input = session.inputs.first().ok_or_else(|| {
            ExtractionError::ModelError("Model must have at least 1 image input".to_string())
        })?;
        let outputs: Vec<&str> = session.outputs.iter().map(|o| o.name.as_str()).collect();
        let output = select_output(&outputs, wanted)?;
        Ok((input.name.clone(), output.to_string()))
    }
}

/// Picks `wanted` among the model outputs, or the first output.
fn select_output<'a>(outputs: &[&'a str], wanted: Option<&str>) -> Result<&'a str, ExtractionError> {
    match wanted {
        Some(name) => outputs.iter().copied().find(|o| *o == name).ok_or_else(|| {
            ExtractionError::ModelError(format!(
                "Model has no output named '{}' (outputs: {})",
                name,
                outputs.join(", ")
            ))
        }),
        None => outputs.first().copied().ok_or_else(|| {
            ExtractionError::ModelError("Model must have at least 1 output for embeddings".to_string())
        }),
    }
}

impl FeatureExtractor for OnnxFeatureExtractor {
    fn extract(&self, frame: &Frame) -> Result<Embedding, ExtractionError> {
        let input_array = self.preprocess(frame)?;
        let input_dyn = input_array.into_dyn();
        let pixels = input_dyn.as_standard_layout();

        let mut input_tensors = HashMap::new();
        input_tensors.insert(
            self.input_name.as_str(),
            Tensor::from_array(&pixels)
                .map_err(|e| ExtractionError::ModelError(format!("Failed to create input tensor: {}", e)))?,
        );

        let outputs = self
            .session
            .run(input_tensors)
            .map_err(|e| ExtractionError::ModelError(format!("Failed to run model: {}", e)))?;
        let output_tensor = outputs[self.output_name.as_str()]
            .try_extract_tensor::<f32>()
            .map_err(|e| ExtractionError::ModelError(format!("Failed to extract output tensor: {}", e)))?;

        let embedding = Array1::from_iter(output_tensor.iter().cloned());
        if embedding.is_empty() {
            return Err(ExtractionError::ModelError("Model produced an empty output".into()));
        }
        Ok(normalize_vector(&embedding))
    }

    fn embedding_size(&self) -> Option<usize> {
        match self.model_characteristics.embedding_size {
            0 => None,
            size => Some(size),
        }
    }
}
