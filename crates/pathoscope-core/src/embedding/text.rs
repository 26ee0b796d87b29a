//! CLIP text encoder for generating prompt embeddings.
//!
//! Loads the CLIP text ONNX model and its tokenizer, encoding prompts into
//! vectors aligned with the vision encoder's space.

use std::path::Path;
use std::sync::Mutex;

use ort::session::Session;
use ort::value::Value;

use crate::config::ModelConfig;
use crate::error::{ClassificationError, EncodeStage, ModelError};

use super::session::load_session;
use super::TextEncoder;

/// Text model filename inside the model directory.
pub const TEXT_MODEL_FILENAME: &str = "text_model.onnx";

/// Tokenizer filename inside the model directory.
pub const TOKENIZER_FILENAME: &str = "tokenizer.json";

/// Output holding the projected text embedding.
const TEXT_EMBEDS_OUTPUT: &str = "text_embeds";

/// CLIP text encoder wrapper.
///
/// Uses the same `Mutex<Session>` pattern as the vision encoder.
pub struct ClipTextEncoder {
    session: Mutex<Session>,
    tokenizer: tokenizers::Tokenizer,
    context_length: usize,
    /// Whether the exported graph declares an `attention_mask` input.
    uses_attention_mask: bool,
}

impl ClipTextEncoder {
    /// Load the text encoder and tokenizer from the model directory.
    pub fn load(model_dir: &Path, config: &ModelConfig) -> Result<Self, ModelError> {
        let text_model_path = model_dir.join(TEXT_MODEL_FILENAME);
        let tokenizer_path = model_dir.join(TOKENIZER_FILENAME);

        if !tokenizer_path.exists() {
            return Err(ModelError::NotFound {
                path: tokenizer_path,
            });
        }

        tracing::info!("Loading CLIP text encoder from {:?}", text_model_path);
        let session = load_session(&text_model_path, config.device)?;

        let tokenizer =
            tokenizers::Tokenizer::from_file(&tokenizer_path).map_err(|e| ModelError::Load {
                path: tokenizer_path.clone(),
                message: format!("Failed to load tokenizer: {e}"),
            })?;

        let uses_attention_mask = session
            .inputs()
            .iter()
            .any(|i| i.name() == "attention_mask");

        tracing::debug!(
            "Loaded CLIP text encoder (inputs: {:?}, outputs: {:?})",
            session
                .inputs()
                .iter()
                .map(|i| i.name())
                .collect::<Vec<_>>(),
            session
                .outputs()
                .iter()
                .map(|o| o.name())
                .collect::<Vec<_>>()
        );

        Ok(Self {
            session: Mutex::new(session),
            tokenizer,
            context_length: config.context_length,
            uses_attention_mask,
        })
    }
}

impl TextEncoder for ClipTextEncoder {
    fn encode_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ClassificationError> {
        let batch_size = texts.len();
        if batch_size == 0 {
            return Ok(vec![]);
        }

        let encodings = self
            .tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| {
                ClassificationError::encode(EncodeStage::Text, format!("Tokenization failed: {e}"))
            })?;

        let token_ids: Vec<&[u32]> = encodings.iter().map(|e| e.get_ids()).collect();
        let (input_ids, attention_mask) = pack_token_ids(&token_ids, self.context_length);
        let shape = vec![batch_size as i64, self.context_length as i64];

        let tensor_error = |e: ort::Error| {
            ClassificationError::encode(
                EncodeStage::Text,
                format!("Failed to create input tensor: {e}"),
            )
        };
        let input_ids_value = Value::from_array((shape.clone(), input_ids)).map_err(tensor_error)?;

        let mut session = self.session.lock().map_err(|e| {
            ClassificationError::encode(
                EncodeStage::Text,
                format!("Text encoder lock poisoned: {e}"),
            )
        })?;

        let outputs = if self.uses_attention_mask {
            let mask_value = Value::from_array((shape, attention_mask)).map_err(tensor_error)?;
            session.run(ort::inputs![
                "input_ids" => input_ids_value,
                "attention_mask" => mask_value
            ])
        } else {
            session.run(ort::inputs!["input_ids" => input_ids_value])
        }
        .map_err(|e| {
            ClassificationError::encode(
                EncodeStage::Text,
                format!("Text encoder inference failed: {e}"),
            )
        })?;

        let text_embeds = outputs
            .iter()
            .find(|(name, _)| *name == TEXT_EMBEDS_OUTPUT)
            .ok_or_else(|| {
                ClassificationError::encode(
                    EncodeStage::Text,
                    format!("Text encoder did not produce {TEXT_EMBEDS_OUTPUT}"),
                )
            })?;

        let (shape, data) = text_embeds.1.try_extract_tensor::<f32>().map_err(|e| {
            ClassificationError::encode(
                EncodeStage::Text,
                format!("Failed to extract {TEXT_EMBEDS_OUTPUT}: {e}"),
            )
        })?;

        if shape.len() != 2 || shape[0] as usize != batch_size {
            return Err(ClassificationError::encode(
                EncodeStage::Text,
                format!(
                    "Unexpected {TEXT_EMBEDS_OUTPUT} shape {:?} for batch of {}",
                    shape, batch_size
                ),
            ));
        }
        let embedding_dim = shape[1] as usize;

        // Split flat output into per-prompt embeddings and L2-normalize.
        Ok(data
            .chunks(embedding_dim)
            .map(crate::math::l2_normalize)
            .collect())
    }
}

/// Pack token id sequences into fixed-length `input_ids` / `attention_mask` rows.
///
/// Rows shorter than `context_length` are zero-padded with a zero mask.
/// Longer rows are truncated, keeping the sequence's final token (end-of-text)
/// in the last slot so the pooled position still exists.
pub(crate) fn pack_token_ids(sequences: &[&[u32]], context_length: usize) -> (Vec<i64>, Vec<i64>) {
    let mut input_ids = vec![0i64; sequences.len() * context_length];
    let mut attention_mask = vec![0i64; sequences.len() * context_length];

    for (i, ids) in sequences.iter().enumerate() {
        let row = i * context_length;
        if ids.len() <= context_length {
            for (j, &id) in ids.iter().enumerate() {
                input_ids[row + j] = id as i64;
                attention_mask[row + j] = 1;
            }
        } else {
            for (j, &id) in ids.iter().take(context_length - 1).enumerate() {
                input_ids[row + j] = id as i64;
            }
            if let Some(&last) = ids.last() {
                input_ids[row + context_length - 1] = last as i64;
            }
            attention_mask[row..row + context_length].fill(1);
        }
    }

    (input_ids, attention_mask)
}
