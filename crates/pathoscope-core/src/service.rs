//! Long-lived classification service.
//!
//! [`Pathoscope`] owns the catalogue and the loaded model for the lifetime of
//! the process. Requests run the blocking classifier on tokio's blocking pool,
//! bounded by a semaphore and a per-call timeout.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::time::timeout;

use crate::catalogue::Catalogue;
use crate::classify::{Classifier, ClassifierOptions};
use crate::config::{Config, LimitsConfig};
use crate::embedding::ClipModel;
use crate::error::{ClassificationError, ClassifyResult, ModelError};
use crate::types::{ClassificationResponse, ClassificationResult};

/// The classification service.
pub struct Pathoscope {
    classifier: Arc<Classifier>,
    permits: Arc<Semaphore>,
    timeout_ms: u64,
}

impl Pathoscope {
    /// Load the catalogue and model described by `config`.
    ///
    /// A missing or malformed catalogue is not fatal: the service starts with
    /// an empty catalogue and every request reports it. A model that cannot be
    /// loaded is fatal.
    pub fn new(config: &Config) -> Result<Self, ModelError> {
        let catalogue_path = config.catalogue_path();
        let (catalogue, error) = Catalogue::load_configured(catalogue_path.as_deref());
        if let Some(e) = error {
            tracing::warn!("{e}; classification will return an empty-catalogue error");
        }

        let model = ClipModel::load(&config.model_path(), &config.model)?;
        let classifier = Classifier::new(
            Arc::new(catalogue),
            Box::new(model.vision),
            Box::new(model.text),
            ClassifierOptions::from_config(config),
        );

        if let Err(e) = classifier.warm_up() {
            tracing::warn!("Text embedding warm-up failed, will retry on first request: {e}");
        }

        Ok(Self::from_parts(classifier, &config.limits))
    }

    /// Wrap an already-built classifier.
    pub fn from_parts(classifier: Classifier, limits: &LimitsConfig) -> Self {
        Self {
            classifier: Arc::new(classifier),
            permits: Arc::new(Semaphore::new(limits.max_concurrent_classifications)),
            timeout_ms: limits.classify_timeout_ms,
        }
    }

    /// Disease names in catalogue order. Empty if the catalogue failed to load.
    pub fn disease_names(&self) -> &[String] {
        self.classifier.disease_names()
    }

    pub fn catalogue(&self) -> &Catalogue {
        self.classifier.catalogue()
    }

    /// Classify the image at `image_path`.
    ///
    /// Waits for a free slot, then runs the classifier off the async runtime.
    /// The timeout covers only the classification itself, not the wait.
    /// On timeout the blocking work runs to completion in the background.
    pub async fn classify(&self, image_path: &Path) -> ClassifyResult<ClassificationResult> {
        if self.classifier.catalogue().is_empty() {
            return Err(ClassificationError::EmptyCatalogue);
        }

        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|e| ClassificationError::Worker(format!("Classifier unavailable: {e}")))?;

        // The permit moves into the blocking task, so a timed-out call keeps
        // its slot until the device work actually finishes.
        let classifier = Arc::clone(&self.classifier);
        let path = image_path.to_path_buf();
        let task = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            classifier.classify(&path)
        });

        match timeout(Duration::from_millis(self.timeout_ms), task).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => Err(ClassificationError::Worker(format!("Task join error: {e}"))),
            Err(_) => Err(ClassificationError::Timeout {
                path: image_path.to_path_buf(),
                timeout_ms: self.timeout_ms,
            }),
        }
    }

    /// Classify and fold the outcome into the caller-facing payload.
    pub async fn classify_response(&self, image_path: &Path) -> ClassificationResponse {
        let result = self.classify(image_path).await;
        match &result {
            Ok(r) => tracing::debug!(
                "Classified {:?}: {} predictions",
                image_path,
                r.predictions.len()
            ),
            Err(e @ ClassificationError::EmptyCatalogue) => tracing::warn!("{e}"),
            Err(e) => tracing::error!("Classification failed for {:?}: {e}", image_path),
        }
        result.into()
    }
}
