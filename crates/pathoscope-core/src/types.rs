//! Result types returned to callers of the classifier.

use serde::{Deserialize, Serialize};

use crate::catalogue::DiseaseRecord;
use crate::error::ClassificationError;

/// One ranked match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// Disease name (catalogue key)
    pub disease: String,

    /// Probability as a percentage, rounded to 2 decimals
    pub confidence: f64,

    pub description: String,
    pub symptoms: String,
    pub treatment: String,
    pub prevalence: String,
}

impl Prediction {
    /// Build a prediction from a catalogue record and its rounded confidence.
    pub fn from_record(record: &DiseaseRecord, confidence: f64) -> Self {
        Self {
            disease: record.name.clone(),
            confidence,
            description: record.description.clone(),
            symptoms: record.symptoms.clone(),
            treatment: record.treatment.clone(),
            prevalence: record.prevalence.clone(),
        }
    }
}

/// Ranked predictions for one image, best match first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub predictions: Vec<Prediction>,
}

impl ClassificationResult {
    /// The highest-ranked prediction, if any.
    pub fn top(&self) -> Option<&Prediction> {
        self.predictions.first()
    }
}

/// Caller-facing payload: `{"predictions": [...]}` on success,
/// `{"error": "...", "predictions": []}` on failure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    pub predictions: Vec<Prediction>,
}

impl ClassificationResponse {
    /// Whether the response carries an error.
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

impl From<ClassificationResult> for ClassificationResponse {
    fn from(result: ClassificationResult) -> Self {
        Self {
            error: None,
            predictions: result.predictions,
        }
    }
}

impl From<&ClassificationError> for ClassificationResponse {
    fn from(err: &ClassificationError) -> Self {
        Self {
            error: Some(err.to_string()),
            predictions: vec![],
        }
    }
}

impl From<Result<ClassificationResult, ClassificationError>> for ClassificationResponse {
    fn from(result: Result<ClassificationResult, ClassificationError>) -> Self {
        match result {
            Ok(result) => result.into(),
            Err(e) => (&e).into(),
        }
    }
}
