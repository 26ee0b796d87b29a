//! Sub-configuration structs with their defaults.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// General settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Directory where models are stored
    pub model_dir: PathBuf,

    /// JSON file mapping disease names to their records. Unset uses the
    /// catalogue bundled with the binary. A relative path in a config file is
    /// resolved against that file's directory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub catalogue_path: Option<PathBuf>,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            model_dir: PathBuf::from("~/.pathoscope/models"),
            catalogue_path: None,
        }
    }
}

/// Execution device for ONNX Runtime sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Device {
    /// Use CUDA when compiled in and available, otherwise CPU
    #[default]
    Auto,
    /// Always run on CPU
    Cpu,
    /// Request CUDA; falls back to CPU with a warning
    Cuda,
}

impl std::fmt::Display for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Device::Auto => write!(f, "auto"),
            Device::Cpu => write!(f, "cpu"),
            Device::Cuda => write!(f, "cuda"),
        }
    }
}

/// Embedding model settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Model directory name under `general.model_dir`
    pub model: String,

    /// Square input size expected by the vision encoder
    pub image_size: u32,

    /// Token context length expected by the text encoder
    pub context_length: usize,

    /// Execution device
    pub device: Device,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model: "clip-vit-base-patch32".to_string(),
            image_size: 224,
            context_length: 77,
            device: Device::Auto,
        }
    }
}

/// Classifier settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Number of ranked predictions returned per image
    pub top_k: usize,

    /// Reuse text embeddings across calls while the catalogue is unchanged.
    /// When false, every call re-embeds the whole catalogue.
    pub cache_text_embeddings: bool,

    /// Directory for persisted text embeddings. `None` keeps the cache in memory only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_dir: Option<PathBuf>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            cache_text_embeddings: true,
            cache_dir: None,
        }
    }
}

/// Resource limits for the upload boundary and per-call work.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum upload size in megabytes
    pub max_file_size_mb: u64,

    /// Maximum image dimension (width or height)
    pub max_image_dimension: u32,

    /// Per-classification timeout in milliseconds
    pub classify_timeout_ms: u64,

    /// Classifications allowed in flight at once (per device)
    pub max_concurrent_classifications: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_file_size_mb: 16,
            max_image_dimension: 10000,
            classify_timeout_ms: 30000,
            max_concurrent_classifications: 1,
        }
    }
}

/// Upload settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    /// Accepted file extensions (lowercase, without the dot)
    pub allowed_extensions: Vec<String>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            allowed_extensions: ["png", "jpg", "jpeg", "bmp", "tiff"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: error, warn, info, debug, trace
    pub level: String,

    /// Log format: "pretty" or "json"
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}
