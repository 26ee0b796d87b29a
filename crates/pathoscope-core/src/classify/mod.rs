//! Zero-shot disease classification.
//!
//! Each catalogue description is turned into the prompt
//! `"a photo of {description}"` and encoded once into a text bank. An image
//! is encoded, compared against every row by cosine similarity, scaled by
//! [`LOGIT_SCALE`] and softmaxed over the whole catalogue. The top k entries
//! come back as predictions with their confidence as a percentage.
//!
//! ```text
//! Image → Decode → Encode → Cosine vs TextBank → ×100 → Softmax → Top k
//! ```

mod classifier;
mod decode;
pub mod scorer;
mod text_bank;

pub use classifier::{Classifier, ClassifierOptions};
pub use decode::decode_image;
pub use scorer::{prompt_for, DiseaseScorer, Ranked, LOGIT_SCALE, PROMPT_PREFIX};
pub use text_bank::TextBank;
