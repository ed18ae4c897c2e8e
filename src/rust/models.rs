/// Represents the available built-in embedding models in the library
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinModel {
    /// Small image model based on the MobileNetV2 architecture
    ///
    /// Characteristics:
    /// - Embedding size: 1000
    /// - Input: 224x224 RGB
    /// - Size: ~14MB
    ///
    /// The published `mobilenetv2-12` graph only exposes its final layer, so
    /// the embedding is the vector of 1000 ImageNet class scores rather than
    /// the pooled features before it. Nearest-neighbour matching works on
    /// either, but the pooled features separate unseen gestures better; use
    /// `OnnxFeatureExtractor::with_custom_model` with a named feature output
    /// to get them from a model that exports that layer.
    MobileNetV2,
}

/// Characteristics of a model including its capabilities and requirements
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelCharacteristics {
    /// Size of the embedding vectors produced by the model
    pub embedding_size: usize,
    /// Side length of the square input image the model expects
    pub input_size: u32,
    /// Approximate size of the model in memory
    pub model_size_mb: usize,
}

/// Where a model comes from and how to check it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelInfo {
    pub name: String,
    pub model_url: String,
    /// Pinned SHA-256 of the model file. When absent the hash recorded at
    /// first download is used instead.
    pub model_hash: Option<String>,
    /// Output the embedding is read from. `None` reads the first output.
    pub embedding_output: Option<String>,
}

impl BuiltinModel {
    /// Get the characteristics of the model
    pub fn characteristics(&self) -> ModelCharacteristics {
        match self {
            Self::MobileNetV2 => ModelCharacteristics {
                embedding_size: 1000,
                input_size: 224,
                model_size_mb: 14,
            },
        }
    }

    pub fn get_model_info(&self) -> ModelInfo {
        match self {
            Self::MobileNetV2 => ModelInfo {
                name: "mobilenetv2".to_string(),
                model_url: "https://github.com/onnx/models/raw/main/validated/vision/classification/mobilenet/model/mobilenetv2-12.onnx".to_string(),
                model_hash: None,
                embedding_output: None,
            },
        }
    }
}
