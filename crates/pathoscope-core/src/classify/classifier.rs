//! Zero-shot disease classifier.

use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use image::DynamicImage;

use crate::catalogue::Catalogue;
use crate::config::Config;
use crate::embedding::{ImageEncoder, TextEncoder};
use crate::error::{ClassificationError, ClassifyResult};
use crate::types::{ClassificationResult, Prediction};

use super::decode::decode_image;
use super::scorer::{to_percentage, DiseaseScorer};
use super::text_bank::TextBank;

/// Extension of persisted text bank files.
const TEXT_BANK_EXTENSION: &str = "textbank";

/// Runtime options for [`Classifier`].
#[derive(Debug, Clone)]
pub struct ClassifierOptions {
    /// Number of predictions per image
    pub top_k: usize,
    /// Reuse text embeddings while the catalogue fingerprint is unchanged
    pub cache_text_embeddings: bool,
    /// Where to persist text embeddings (only used when caching)
    pub cache_dir: Option<PathBuf>,
    /// Model name, recorded alongside persisted embeddings
    pub model: String,
    /// Largest accepted image width or height
    pub max_image_dimension: u32,
}

impl Default for ClassifierOptions {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl ClassifierOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            top_k: config.classifier.top_k,
            cache_text_embeddings: config.classifier.cache_text_embeddings,
            cache_dir: config.cache_dir(),
            model: config.model.model.clone(),
            max_image_dimension: config.limits.max_image_dimension,
        }
    }
}

/// Ranks catalogue diseases for an image.
///
/// The catalogue and encoders are read-only after construction. The only
/// interior state is the text bank cache, written once per catalogue
/// fingerprint.
pub struct Classifier {
    catalogue: Arc<Catalogue>,
    image_encoder: Box<dyn ImageEncoder>,
    text_encoder: Box<dyn TextEncoder>,
    scorer: DiseaseScorer,
    options: ClassifierOptions,
    text_bank: RwLock<Option<Arc<TextBank>>>,
}

impl Classifier {
    pub fn new(
        catalogue: Arc<Catalogue>,
        image_encoder: Box<dyn ImageEncoder>,
        text_encoder: Box<dyn TextEncoder>,
        options: ClassifierOptions,
    ) -> Self {
        Self {
            catalogue,
            image_encoder,
            text_encoder,
            scorer: DiseaseScorer::new(options.top_k),
            options,
            text_bank: RwLock::new(None),
        }
    }

    /// The catalogue this classifier ranks against.
    pub fn catalogue(&self) -> &Catalogue {
        &self.catalogue
    }

    /// Disease names in catalogue order.
    pub fn disease_names(&self) -> &[String] {
        self.catalogue.names()
    }

    /// Build (or load) the cached text embeddings ahead of the first request.
    ///
    /// A no-op when the catalogue is empty or caching is disabled.
    pub fn warm_up(&self) -> ClassifyResult<()> {
        if self.catalogue.is_empty() || !self.options.cache_text_embeddings {
            return Ok(());
        }
        self.text_bank().map(|_| ())
    }

    /// Classify the image at `image_path`.
    ///
    /// Returns `min(top_k, |catalogue|)` predictions, best first.
    pub fn classify(&self, image_path: &Path) -> ClassifyResult<ClassificationResult> {
        if self.catalogue.is_empty() {
            return Err(ClassificationError::EmptyCatalogue);
        }

        let image = decode_image(image_path, self.options.max_image_dimension)?;
        self.classify_image(&image)
    }

    /// Classify an already-decoded image.
    pub fn classify_image(&self, image: &DynamicImage) -> ClassifyResult<ClassificationResult> {
        if self.catalogue.is_empty() {
            return Err(ClassificationError::EmptyCatalogue);
        }

        let image_embedding = self.image_encoder.encode_image(image)?;
        let bank = self.text_bank()?;
        let ranked = self.scorer.rank(&image_embedding, &bank)?;

        let predictions = ranked
            .into_iter()
            .filter_map(|r| {
                self.catalogue
                    .get(r.index)
                    .map(|record| Prediction::from_record(record, to_percentage(r.probability)))
            })
            .collect();

        Ok(ClassificationResult { predictions })
    }

    /// Full probability distribution over the catalogue for an image, in
    /// catalogue order. Useful for inspecting more than the top k.
    pub fn distribution(&self, image: &DynamicImage) -> ClassifyResult<Vec<f64>> {
        if self.catalogue.is_empty() {
            return Err(ClassificationError::EmptyCatalogue);
        }
        let image_embedding = self.image_encoder.encode_image(image)?;
        let bank = self.text_bank()?;
        self.scorer.distribution(&image_embedding, &bank)
    }

    /// Text embeddings for the current catalogue.
    ///
    /// With caching disabled every call re-encodes the catalogue. Otherwise
    /// the bank is reused while its fingerprint matches, loaded from disk if
    /// a valid persisted copy exists, and encoded once if not.
    fn text_bank(&self) -> ClassifyResult<Arc<TextBank>> {
        if !self.options.cache_text_embeddings {
            return TextBank::encode(&self.catalogue, self.text_encoder.as_ref()).map(Arc::new);
        }

        if let Some(bank) = self.cached_bank() {
            return Ok(bank);
        }

        let mut slot = self
            .text_bank
            .write()
            .map_err(|e| ClassificationError::Worker(format!("Text bank lock poisoned: {e}")))?;

        // Another caller may have filled the slot while we waited.
        if let Some(bank) = slot.as_ref().filter(|b| b.matches(&self.catalogue)) {
            return Ok(Arc::clone(bank));
        }

        let bank = Arc::new(self.load_or_encode_bank()?);
        *slot = Some(Arc::clone(&bank));
        Ok(bank)
    }

    fn cached_bank(&self) -> Option<Arc<TextBank>> {
        let slot = self.text_bank.read().ok()?;
        slot.as_ref()
            .filter(|b| b.matches(&self.catalogue))
            .map(Arc::clone)
    }

    fn load_or_encode_bank(&self) -> ClassifyResult<TextBank> {
        let fingerprint = self.catalogue.fingerprint();
        let cache_path = self.cache_path();

        if let Some(path) = &cache_path {
            if TextBank::cache_valid(path, fingerprint, &self.options.model) {
                match TextBank::load(path) {
                    Ok(bank) if bank.matches(&self.catalogue) => return Ok(bank),
                    Ok(_) => tracing::warn!("Cached text bank {:?} is stale, rebuilding", path),
                    Err(e) => tracing::warn!("Failed to load text bank {:?}: {e}", path),
                }
            }
        }

        tracing::info!(
            "Encoding text embeddings for {} diseases",
            self.catalogue.len()
        );
        let bank = TextBank::encode(&self.catalogue, self.text_encoder.as_ref())?;

        if let Some(path) = &cache_path {
            if let Err(e) = bank.save(path, &self.options.model) {
                tracing::warn!("Failed to persist text bank to {:?}: {e}", path);
            }
        }

        Ok(bank)
    }

    fn cache_path(&self) -> Option<PathBuf> {
        self.options.cache_dir.as_ref().map(|dir| {
            dir.join(&self.options.model)
                .with_extension(TEXT_BANK_EXTENSION)
        })
    }
}
