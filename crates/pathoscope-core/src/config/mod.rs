//! Configuration management for Pathoscope.
//!
//! Configuration is loaded from the platform config directory with sensible
//! defaults. Every section implements `Default`, so a partial TOML file is valid.

mod types;
mod validate;

pub use types::*;

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Root configuration structure for Pathoscope.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Embedding model settings
    pub model: ModelConfig,

    /// Classifier settings
    pub classifier: ClassifierConfig,

    /// Resource limits
    pub limits: LimitsConfig,

    /// Upload boundary settings
    pub upload: UploadConfig,

    /// Logging settings
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from the default location.
    ///
    /// Returns default configuration if the file doesn't exist.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific file path.
    ///
    /// A relative `general.catalogue_path` is taken relative to the config
    /// file, so the result does not depend on the working directory.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config = Self::from_toml(&content)?;
        if let Some(catalogue) = config.catalogue_path() {
            if catalogue.is_relative() {
                let base = path.parent().unwrap_or_else(|| Path::new(""));
                config.general.catalogue_path = Some(base.join(catalogue));
            }
        }
        Ok(config)
    }

    /// Parse and validate configuration from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default config file path.
    ///
    /// Uses platform-appropriate directories:
    /// - macOS: ~/Library/Application Support/com.pathoscope.pathoscope/config.toml
    /// - Linux: ~/.config/pathoscope/config.toml
    /// - Windows: C:\Users\<User>\AppData\Roaming\pathoscope\config\config.toml
    ///
    /// Falls back to ~/.pathoscope/config.toml if directory detection fails.
    pub fn default_path() -> PathBuf {
        directories::ProjectDirs::from("com", "pathoscope", "pathoscope")
            .map(|dirs| dirs.config_dir().to_path_buf().join("config.toml"))
            .unwrap_or_else(|| {
                let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
                PathBuf::from(home).join(".pathoscope").join("config.toml")
            })
    }

    /// Get the resolved model directory path (with ~ expansion).
    pub fn model_dir(&self) -> PathBuf {
        expand(&self.general.model_dir)
    }

    /// Directory holding the files of the configured model.
    pub fn model_path(&self) -> PathBuf {
        self.model_dir().join(&self.model.model)
    }

    /// Get the resolved catalogue path (with ~ expansion).
    ///
    /// `None` means the bundled catalogue.
    pub fn catalogue_path(&self) -> Option<PathBuf> {
        self.general.catalogue_path.as_deref().map(expand)
    }

    /// Get the resolved text embedding cache directory, if persistence is enabled.
    pub fn cache_dir(&self) -> Option<PathBuf> {
        self.classifier.cache_dir.as_deref().map(expand)
    }

    /// Serialize the config to a pretty TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::ValidationError(e.to_string()))
    }
}

fn expand(path: &Path) -> PathBuf {
    let path_str = path.to_string_lossy();
    let expanded = shellexpand::tilde(&path_str);
    PathBuf::from(expanded.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.classifier.top_k, 5);
        assert_eq!(config.limits.max_file_size_mb, 16);
        assert_eq!(config.limits.max_concurrent_classifications, 1);
        assert_eq!(config.model.context_length, 77);
        assert_eq!(config.model.device, Device::Auto);
    }

    #[test]
    fn test_config_to_toml() {
        let config = Config::default();
        let toml = config.to_toml().unwrap();
        assert!(toml.contains("[general]"));
        assert!(toml.contains("[classifier]"));
        assert!(toml.contains("device = \"auto\""));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = Config::from_toml(
            r#"
            [classifier]
            top_k = 3

            [model]
            device = "cpu"
            "#,
        )
        .unwrap();
        assert_eq!(config.classifier.top_k, 3);
        assert!(config.classifier.cache_text_embeddings);
        assert_eq!(config.model.device, Device::Cpu);
        assert_eq!(config.upload.allowed_extensions.len(), 5);
    }

    #[test]
    fn test_from_toml_rejects_invalid_values() {
        let err = Config::from_toml("[classifier]\ntop_k = 0\n").unwrap_err();
        assert!(err.to_string().contains("top_k"));
    }

    #[test]
    fn test_model_path_joins_model_name() {
        let mut config = Config::default();
        config.general.model_dir = PathBuf::from("/opt/models");
        assert_eq!(
            config.model_path(),
            PathBuf::from("/opt/models/clip-vit-base-patch32")
        );
    }

    #[test]
    fn test_catalogue_defaults_to_bundled() {
        let config = Config::default();
        assert!(config.catalogue_path().is_none());
        assert!(!config.to_toml().unwrap().contains("catalogue_path"));
    }

    #[test]
    fn test_relative_catalogue_resolves_against_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[general]\ncatalogue_path = \"data/diseases.json\"\n",
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(
            config.catalogue_path(),
            Some(dir.path().join("data").join("diseases.json"))
        );
    }

    #[test]
    fn test_absolute_catalogue_kept_as_is() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[general]\ncatalogue_path = \"/srv/pathoscope/diseases.json\"\n",
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(
            config.catalogue_path(),
            Some(PathBuf::from("/srv/pathoscope/diseases.json"))
        );
    }

    #[test]
    fn test_cache_dir_disabled_by_default() {
        assert!(Config::default().cache_dir().is_none());
    }
}
