//! Softmax ranking of an image embedding against the text bank.
//!
//! Both sides are L2-normalized, so the matrix-vector product gives cosine
//! similarities. These are scaled by CLIP's logit scale and turned into a
//! probability distribution over the whole catalogue before the top k are kept.

use ndarray::ArrayView1;

use crate::error::{ClassificationError, EncodeStage};
use crate::math::softmax;

use super::text_bank::TextBank;

/// Temperature applied to cosine similarities before softmax.
pub const LOGIT_SCALE: f32 = 100.0;

/// Prompt template prefix. Each description becomes `"a photo of {description}"`.
pub const PROMPT_PREFIX: &str = "a photo of ";

/// Build the text prompt for a catalogue description.
pub fn prompt_for(description: &str) -> String {
    format!("{PROMPT_PREFIX}{description}")
}

/// Probability as a percentage rounded to 2 decimals.
///
/// Rounds half away from zero (`f64::round` on hundredths of a percent).
pub fn to_percentage(probability: f64) -> f64 {
    (probability * 10_000.0).round() / 100.0
}

/// A catalogue entry with its softmax probability.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ranked {
    /// Catalogue index
    pub index: usize,
    /// Probability in [0, 1]
    pub probability: f64,
}

/// Ranks catalogue entries for one image.
#[derive(Debug, Clone)]
pub struct DiseaseScorer {
    top_k: usize,
}

impl DiseaseScorer {
    pub fn new(top_k: usize) -> Self {
        Self { top_k }
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// Full probability distribution over the bank, in catalogue order.
    pub fn distribution(
        &self,
        image_embedding: &[f32],
        bank: &TextBank,
    ) -> Result<Vec<f64>, ClassificationError> {
        if image_embedding.len() != bank.embedding_dim() {
            return Err(ClassificationError::encode(
                EncodeStage::Image,
                format!(
                    "Image embedding has {} dims but text embeddings have {}",
                    image_embedding.len(),
                    bank.embedding_dim()
                ),
            ));
        }

        if image_embedding.iter().any(|v| !v.is_finite()) {
            return Err(ClassificationError::encode(
                EncodeStage::Image,
                "Image embedding contains non-finite values",
            ));
        }

        let image = ArrayView1::from(image_embedding);
        let logits: Vec<f32> = bank
            .matrix()
            .dot(&image)
            .iter()
            .map(|cosine| LOGIT_SCALE * cosine)
            .collect();

        Ok(softmax(&logits))
    }

    /// Top-k entries by probability, highest first.
    pub fn rank(
        &self,
        image_embedding: &[f32],
        bank: &TextBank,
    ) -> Result<Vec<Ranked>, ClassificationError> {
        let probabilities = self.distribution(image_embedding, bank)?;
        Ok(top_k(&probabilities, self.top_k))
    }
}

/// Select the `k` highest probabilities.
///
/// Ties keep catalogue order (lowest index first): the sort is stable over
/// indices that start in ascending order.
pub fn top_k(probabilities: &[f64], k: usize) -> Vec<Ranked> {
    let mut indices: Vec<usize> = (0..probabilities.len()).collect();
    indices.sort_by(|&a, &b| probabilities[b].total_cmp(&probabilities[a]));
    indices
        .into_iter()
        .take(k)
        .map(|index| Ranked {
            index,
            probability: probabilities[index],
        })
        .collect()
}
