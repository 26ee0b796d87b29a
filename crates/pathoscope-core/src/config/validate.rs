//! Configuration validation with range checks.

use crate::error::ConfigError;

use super::Config;

impl Config {
    /// Validate configuration values are within acceptable ranges.
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.model.image_size == 0 {
            return Err(ConfigError::ValidationError(
                "model.image_size must be > 0".into(),
            ));
        }
        if self.model.context_length < 2 {
            return Err(ConfigError::ValidationError(
                "model.context_length must be >= 2".into(),
            ));
        }
        if self.classifier.top_k == 0 {
            return Err(ConfigError::ValidationError(
                "classifier.top_k must be > 0".into(),
            ));
        }
        if self.limits.max_file_size_mb == 0 {
            return Err(ConfigError::ValidationError(
                "limits.max_file_size_mb must be > 0".into(),
            ));
        }
        if self.limits.max_image_dimension == 0 {
            return Err(ConfigError::ValidationError(
                "limits.max_image_dimension must be > 0".into(),
            ));
        }
        if self.limits.classify_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "limits.classify_timeout_ms must be > 0".into(),
            ));
        }
        if self.limits.max_concurrent_classifications == 0 {
            return Err(ConfigError::ValidationError(
                "limits.max_concurrent_classifications must be > 0".into(),
            ));
        }
        if self.upload.allowed_extensions.is_empty() {
            return Err(ConfigError::ValidationError(
                "upload.allowed_extensions must not be empty".into(),
            ));
        }
        if !matches!(self.logging.format.as_str(), "pretty" | "json") {
            return Err(ConfigError::ValidationError(format!(
                "logging.format must be \"pretty\" or \"json\", got {:?}",
                self.logging.format
            )));
        }
        Ok(())
    }
}
