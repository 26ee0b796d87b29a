//! CLIP embedding generation.
//!
//! Images and text prompts are encoded into a shared space by two ONNX
//! models running locally via ONNX Runtime. Both encoders return
//! L2-normalized vectors, so a dot product is a cosine similarity.
//!
//! # Usage
//!
//! ```rust,ignore
//! use pathoscope_core::embedding::{ClipModel, ImageEncoder, TextEncoder};
//! use pathoscope_core::Config;
//!
//! let config = Config::default();
//! let model = ClipModel::load(&config.model_path(), &config.model)?;
//! let image_embedding = model.vision.encode_image(&decoded_image)?;
//! let text_embeddings = model.text.encode_texts(&["a photo of a rash".to_string()])?;
//! ```

pub(crate) mod preprocess;
mod session;
pub mod text;
pub mod vision;

use std::path::Path;

use image::DynamicImage;

use crate::config::ModelConfig;
use crate::error::{ClassificationError, ModelError};

pub use preprocess::preprocess;
pub use text::ClipTextEncoder;
pub use vision::ClipVisionEncoder;

/// Encodes a decoded image into the shared embedding space.
pub trait ImageEncoder: Send + Sync {
    /// Return an L2-normalized embedding for one image.
    fn encode_image(&self, image: &DynamicImage) -> Result<Vec<f32>, ClassificationError>;
}

/// Encodes a batch of text prompts into the shared embedding space.
pub trait TextEncoder: Send + Sync {
    /// Return one L2-normalized embedding per prompt, in input order.
    fn encode_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ClassificationError>;
}

/// The loaded pair of CLIP encoders.
pub struct ClipModel {
    pub vision: ClipVisionEncoder,
    pub text: ClipTextEncoder,
}

impl ClipModel {
    /// Load both encoders from `model_dir`.
    ///
    /// Any failure here is fatal for the service.
    pub fn load(model_dir: &Path, config: &ModelConfig) -> Result<Self, ModelError> {
        tracing::info!(
            "Loading CLIP model {:?} (device: {})",
            config.model,
            config.device
        );
        let vision = ClipVisionEncoder::load(model_dir, config)?;
        let text = ClipTextEncoder::load(model_dir, config)?;
        tracing::info!("CLIP model loaded successfully");
        Ok(Self { vision, text })
    }

    /// Check whether every model file exists on disk.
    pub fn files_exist(model_dir: &Path) -> bool {
        [
            vision::VISION_MODEL_FILENAME,
            text::TEXT_MODEL_FILENAME,
            text::TOKENIZER_FILENAME,
        ]
        .iter()
        .all(|name| model_dir.join(name).exists())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_files_exist_requires_all_three() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!ClipModel::files_exist(dir.path()));

        std::fs::write(dir.path().join(vision::VISION_MODEL_FILENAME), b"x").unwrap();
        std::fs::write(dir.path().join(text::TEXT_MODEL_FILENAME), b"x").unwrap();
        assert!(!ClipModel::files_exist(dir.path()));

        std::fs::write(dir.path().join(text::TOKENIZER_FILENAME), b"{}").unwrap();
        assert!(ClipModel::files_exist(dir.path()));
    }

    #[test]
    fn test_load_reports_missing_vision_model() {
        let dir = tempfile::tempdir().unwrap();
        let err = ClipModel::load(dir.path(), &ModelConfig::default())
            .err()
            .unwrap();
        assert!(matches!(err, ModelError::NotFound { ref path } if path.ends_with("vision_model.onnx")));
    }
}
