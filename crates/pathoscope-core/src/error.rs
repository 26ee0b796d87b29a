//! Error types for Pathoscope.
//!
//! Errors are split by lifecycle: startup errors (configuration, catalogue,
//! model loading) and per-call errors (intake, classification). Each carries
//! the path or stage involved so the caller can log something actionable.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for Pathoscope operations.
#[derive(Error, Debug)]
pub enum PathoscopeError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Catalogue could not be read or parsed
    #[error("Catalogue error: {0}")]
    Catalogue(#[from] CatalogueError),

    /// Model loading failed (fatal at startup)
    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    /// Classification failed
    #[error("Classification error: {0}")]
    Classification(#[from] ClassificationError),

    /// Upload validation failed
    #[error("Intake error: {0}")]
    Intake(#[from] IntakeError),

    /// General I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the config file from disk
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse TOML configuration
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Configuration values are invalid
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Catalogue loading errors.
///
/// Never fatal: the service degrades to an empty catalogue and logs these.
#[derive(Error, Debug)]
pub enum CatalogueError {
    /// The catalogue file could not be read
    #[error("Failed to read catalogue {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The catalogue file is not valid JSON
    #[error("Failed to parse catalogue {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The top level of the catalogue is not a name -> record mapping
    #[error("Catalogue {path} must be a JSON object mapping disease names to records")]
    NotAMapping { path: PathBuf },

    /// A record is missing required fields or has the wrong shape
    #[error("Invalid catalogue entry {name:?}: {message}")]
    InvalidEntry { name: String, message: String },
}

/// Model loading errors. Fatal: classification is meaningless without a model.
#[derive(Error, Debug)]
pub enum ModelError {
    /// A required model file is absent
    #[error("Model file not found: {path}. Run `pathoscope models download` first.")]
    NotFound { path: PathBuf },

    /// ONNX Runtime or the tokenizer rejected a model file
    #[error("Failed to load {path}: {message}")]
    Load { path: PathBuf, message: String },
}

/// Encoder stage that produced an [`ClassificationError::Encode`] failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodeStage {
    Image,
    Text,
}

impl std::fmt::Display for EncodeStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EncodeStage::Image => write!(f, "image"),
            EncodeStage::Text => write!(f, "text"),
        }
    }
}

/// Per-call classification errors.
#[derive(Error, Debug)]
pub enum ClassificationError {
    /// The catalogue is empty, so there is nothing to rank against
    #[error("Disease database not loaded")]
    EmptyCatalogue,

    /// The image could not be opened or decoded
    #[error("Failed to decode image {path}: {source}")]
    ImageDecode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// The image decoded but exceeds the configured dimension limit
    #[error("Image too large: {path} ({width}x{height} > {max_dim})")]
    ImageTooLarge {
        path: PathBuf,
        width: u32,
        height: u32,
        max_dim: u32,
    },

    /// An encoder failed to produce embeddings
    #[error("{stage} encoder failed: {message}")]
    Encode { stage: EncodeStage, message: String },

    /// Classification did not finish within the configured limit
    #[error("Classification of {path} timed out after {timeout_ms}ms")]
    Timeout { path: PathBuf, timeout_ms: u64 },

    /// The worker running the classification stopped unexpectedly
    #[error("Classification worker failed: {0}")]
    Worker(String),
}

impl ClassificationError {
    pub(crate) fn encode(stage: EncodeStage, message: impl Into<String>) -> Self {
        Self::Encode {
            stage,
            message: message.into(),
        }
    }
}

/// Caller-side upload validation errors.
#[derive(Error, Debug)]
pub enum IntakeError {
    /// File not found
    #[error("File not found: {0}")]
    NotFound(PathBuf),

    /// Extension not in the allow-list
    #[error("Invalid file type for {path}. Please upload an image file ({allowed})")]
    UnsupportedExtension { path: PathBuf, allowed: String },

    /// File exceeds size limit
    #[error("File too large: {path} ({size_bytes} bytes > {max_mb}MB)")]
    TooLarge {
        path: PathBuf,
        size_bytes: u64,
        max_mb: u64,
    },

    /// Content does not start with a recognized image signature
    #[error("Unrecognized image content in {0} (invalid magic bytes)")]
    UnrecognizedContent(PathBuf),

    /// Metadata or header could not be read
    #[error("Cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Convenience type alias for Pathoscope results.
pub type Result<T> = std::result::Result<T, PathoscopeError>;

/// Convenience type alias for per-call classification results.
pub type ClassifyResult<T> = std::result::Result<T, ClassificationError>;
