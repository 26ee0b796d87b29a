//! CLIP vision encoder session and inference.
//!
//! Loads the CLIP vision tower exported to ONNX and produces projected,
//! L2-normalized image embeddings (512 floats for ViT-B/32).

use std::path::Path;
use std::sync::Mutex;

use image::DynamicImage;
use ort::session::Session;
use ort::value::Value;

use crate::config::ModelConfig;
use crate::error::{ClassificationError, EncodeStage, ModelError};

use super::preprocess::preprocess;
use super::session::load_session;
use super::ImageEncoder;

/// Vision model filename inside the model directory.
pub const VISION_MODEL_FILENAME: &str = "vision_model.onnx";

/// Output holding the projected image embedding. `last_hidden_state` is
/// not in the shared space and must not be used.
const IMAGE_EMBEDS_OUTPUT: &str = "image_embeds";

/// Wraps an ONNX Runtime session for CLIP image embedding.
///
/// Uses a `Mutex` because `Session::run` requires `&mut self`.
pub struct ClipVisionEncoder {
    session: Mutex<Session>,
    /// Name of the input tensor (detected from model metadata).
    input_name: String,
    image_size: u32,
}

impl ClipVisionEncoder {
    /// Load the vision encoder from `{model_dir}/vision_model.onnx`.
    pub fn load(model_dir: &Path, config: &ModelConfig) -> Result<Self, ModelError> {
        let model_path = model_dir.join(VISION_MODEL_FILENAME);
        tracing::info!("Loading CLIP vision encoder from {:?}", model_path);
        let session = load_session(&model_path, config.device)?;

        let input_name = session
            .inputs()
            .first()
            .map(|i| i.name().to_string())
            .unwrap_or_else(|| "pixel_values".to_string());

        tracing::debug!(
            "Loaded CLIP vision encoder (input: {:?}, outputs: {:?})",
            input_name,
            session
                .outputs()
                .iter()
                .map(|o| o.name())
                .collect::<Vec<_>>()
        );

        Ok(Self {
            session: Mutex::new(session),
            input_name,
            image_size: config.image_size,
        })
    }

    /// Run inference on an already-preprocessed `[1, 3, H, W]` tensor.
    fn run(&self, tensor: &ndarray::Array4<f32>) -> Result<Vec<f32>, ClassificationError> {
        let shape: Vec<i64> = tensor.shape().iter().map(|&d| d as i64).collect();
        let flat_data: Vec<f32> = tensor.iter().copied().collect();

        let input_value = Value::from_array((shape, flat_data)).map_err(|e| {
            ClassificationError::encode(
                EncodeStage::Image,
                format!("Failed to create input tensor: {e}"),
            )
        })?;

        let mut session = self.session.lock().map_err(|e| {
            ClassificationError::encode(EncodeStage::Image, format!("Session lock poisoned: {e}"))
        })?;

        let outputs = session
            .run(ort::inputs![self.input_name.as_str() => input_value])
            .map_err(|e| {
                ClassificationError::encode(
                    EncodeStage::Image,
                    format!("ONNX inference failed: {e}"),
                )
            })?;

        let image_embeds = outputs
            .iter()
            .find(|(name, _)| *name == IMAGE_EMBEDS_OUTPUT)
            .ok_or_else(|| {
                ClassificationError::encode(
                    EncodeStage::Image,
                    format!("Model did not produce {IMAGE_EMBEDS_OUTPUT}"),
                )
            })?;

        let (shape, data) = image_embeds.1.try_extract_tensor::<f32>().map_err(|e| {
            ClassificationError::encode(
                EncodeStage::Image,
                format!("Failed to extract {IMAGE_EMBEDS_OUTPUT}: {e}"),
            )
        })?;

        // image_embeds is [1, D]; take the single row.
        let mut embedding = match shape.len() {
            1 => data.to_vec(),
            2 => {
                let dim = shape[1] as usize;
                data[..dim].to_vec()
            }
            _ => {
                return Err(ClassificationError::encode(
                    EncodeStage::Image,
                    format!("Unexpected {IMAGE_EMBEDS_OUTPUT} shape: {:?}", shape),
                ));
            }
        };

        crate::math::l2_normalize_in_place(&mut embedding);
        Ok(embedding)
    }
}

impl ImageEncoder for ClipVisionEncoder {
    fn encode_image(&self, image: &DynamicImage) -> Result<Vec<f32>, ClassificationError> {
        let tensor = preprocess(image, self.image_size);
        self.run(&tensor)
    }
}
