//! Pathoscope Core - zero-shot disease classification with CLIP.
//!
//! Pathoscope ranks the entries of a disease catalogue against an image.
//! Every catalogue description is embedded as the text prompt
//! `"a photo of {description}"`; the image is embedded with the matching CLIP
//! vision model, and the softmax over scaled cosine similarities gives a
//! confidence for each disease.
//!
//! # Architecture
//!
//! ```text
//! Catalogue JSON → Prompts → Text encoder → TextBank (cached)
//!                                               │
//! Image → Intake → Decode → Vision encoder → Cosine ×100 → Softmax → Top 5
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use pathoscope_core::{Config, Pathoscope};
//!
//! #[tokio::main]
//! async fn main() -> pathoscope_core::Result<()> {
//!     let config = Config::load()?;
//!     let service = Pathoscope::new(&config)?;
//!
//!     let response = service.classify_response("./lesion.jpg".as_ref()).await;
//!     println!("{}", serde_json::to_string_pretty(&response)?);
//!     Ok(())
//! }
//! ```

// Module declarations
pub mod catalogue;
pub mod classify;
pub mod config;
pub mod embedding;
pub mod error;
pub mod hash;
pub mod intake;
pub mod math;
pub mod service;
pub mod types;

// Re-exports for convenient access
pub use catalogue::{Catalogue, DiseaseRecord};
pub use classify::{Classifier, ClassifierOptions};
pub use config::Config;
pub use embedding::{ClipModel, ImageEncoder, TextEncoder};
pub use error::{
    CatalogueError, ClassificationError, ClassifyResult, ConfigError, IntakeError, ModelError,
    PathoscopeError, Result,
};
pub use intake::Intake;
pub use service::Pathoscope;
pub use types::{ClassificationResponse, ClassificationResult, Prediction};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
