//! Disease catalogue loading.
//!
//! The catalogue is a JSON object mapping disease names to records:
//!
//! ```json
//! {
//!   "Psoriasis": {
//!     "description": "red, scaly plaques on the elbows and knees",
//!     "symptoms": "itching, flaking",
//!     "treatment": "topical corticosteroids",
//!     "prevalence": "Common"
//!   }
//! }
//! ```
//!
//! Declaration order is preserved and defines the index used for ranking:
//! `names()[i]` and `descriptions()[i]` always refer to the same record.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::CatalogueError;

/// Value used for optional record fields absent from the source.
pub const UNKNOWN: &str = "Unknown";

/// Catalogue compiled into the binary, used when no path is configured.
pub const BUNDLED_CATALOGUE: &str = include_str!("../../../data/disease_descriptions.json");

/// A single disease entry. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiseaseRecord {
    pub name: String,
    pub description: String,
    pub symptoms: String,
    pub treatment: String,
    pub prevalence: String,
}

/// Shape of a record as it appears in the source file (name is the key).
#[derive(Deserialize)]
struct RawRecord {
    description: String,
    #[serde(default)]
    symptoms: Option<String>,
    #[serde(default)]
    treatment: Option<String>,
    #[serde(default)]
    prevalence: Option<String>,
}

impl RawRecord {
    fn into_record(self, name: String) -> DiseaseRecord {
        if self.symptoms.is_none() || self.treatment.is_none() {
            tracing::debug!("Catalogue entry {:?} is missing symptoms or treatment", name);
        }
        DiseaseRecord {
            name,
            description: self.description,
            symptoms: self.symptoms.unwrap_or_else(|| UNKNOWN.to_string()),
            treatment: self.treatment.unwrap_or_else(|| UNKNOWN.to_string()),
            prevalence: self.prevalence.unwrap_or_else(|| UNKNOWN.to_string()),
        }
    }
}

/// Ordered, read-only collection of disease records.
#[derive(Debug, Clone)]
pub struct Catalogue {
    records: Vec<DiseaseRecord>,
    names: Vec<String>,
    descriptions: Vec<String>,
    by_name: HashMap<String, usize>,
    fingerprint: String,
}

impl Default for Catalogue {
    fn default() -> Self {
        Self::empty()
    }
}

impl Catalogue {
    /// A catalogue with no entries. Classification against it always fails
    /// with an empty-catalogue error.
    pub fn empty() -> Self {
        Self::build(Vec::new())
    }

    /// Load a catalogue from a JSON file.
    pub fn load(path: &Path) -> Result<Self, CatalogueError> {
        let content = std::fs::read_to_string(path).map_err(|e| CatalogueError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;
        let catalogue = Self::parse(&content, path)?;
        tracing::info!("Loaded {} diseases from {:?}", catalogue.len(), path);
        Ok(catalogue)
    }

    /// Load a catalogue, degrading to an empty one on failure.
    ///
    /// The error is handed back alongside the empty catalogue so the caller
    /// decides how loudly to report it.
    pub fn load_or_empty(path: &Path) -> (Self, Option<CatalogueError>) {
        match Self::load(path) {
            Ok(catalogue) => (catalogue, None),
            Err(e) => (Self::empty(), Some(e)),
        }
    }

    /// The catalogue shipped with the binary.
    pub fn bundled() -> Result<Self, CatalogueError> {
        Self::parse(BUNDLED_CATALOGUE, Path::new("<bundled>"))
    }

    /// Load the catalogue at `path`, or the bundled one when `path` is `None`.
    ///
    /// Degrades to an empty catalogue like [`Catalogue::load_or_empty`].
    pub fn load_configured(path: Option<&Path>) -> (Self, Option<CatalogueError>) {
        match path {
            Some(path) => Self::load_or_empty(path),
            None => match Self::bundled() {
                Ok(catalogue) => {
                    tracing::info!("Using bundled catalogue ({} diseases)", catalogue.len());
                    (catalogue, None)
                }
                Err(e) => (Self::empty(), Some(e)),
            },
        }
    }

    /// Parse a catalogue from an in-memory JSON string.
    pub fn from_json_str(content: &str) -> Result<Self, CatalogueError> {
        Self::parse(content, Path::new("<inline>"))
    }

    /// Build a catalogue from records, in iteration order.
    ///
    /// Rejects duplicate names, since the name is the record's key.
    pub fn from_records(
        records: impl IntoIterator<Item = DiseaseRecord>,
    ) -> Result<Self, CatalogueError> {
        let mut seen = HashSet::new();
        let mut ordered = Vec::new();
        for record in records {
            if !seen.insert(record.name.clone()) {
                return Err(CatalogueError::InvalidEntry {
                    name: record.name,
                    message: "duplicate disease name".to_string(),
                });
            }
            ordered.push(record);
        }
        Ok(Self::build(ordered))
    }

    fn parse(content: &str, path: &Path) -> Result<Self, CatalogueError> {
        let value: serde_json::Value =
            serde_json::from_str(content).map_err(|e| CatalogueError::Parse {
                path: path.to_path_buf(),
                source: e,
            })?;

        // serde_json is built with `preserve_order`, so iteration follows
        // declaration order. A repeated key keeps its first position.
        let serde_json::Value::Object(map) = value else {
            return Err(CatalogueError::NotAMapping {
                path: PathBuf::from(path),
            });
        };

        let mut records = Vec::with_capacity(map.len());
        for (name, entry) in map {
            let raw: RawRecord =
                serde_json::from_value(entry).map_err(|e| CatalogueError::InvalidEntry {
                    name: name.clone(),
                    message: e.to_string(),
                })?;
            records.push(raw.into_record(name));
        }

        Ok(Self::build(records))
    }

    fn build(records: Vec<DiseaseRecord>) -> Self {
        let names: Vec<String> = records.iter().map(|r| r.name.clone()).collect();
        let descriptions: Vec<String> = records.iter().map(|r| r.description.clone()).collect();
        let by_name = names
            .iter()
            .enumerate()
            .map(|(i, n)| (n.clone(), i))
            .collect();
        let fingerprint = fingerprint(&names, &descriptions);

        Self {
            records,
            names,
            descriptions,
            by_name,
            fingerprint,
        }
    }

    /// Number of diseases.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the catalogue has no entries.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Disease names in catalogue order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Descriptions in catalogue order, parallel to [`Catalogue::names`].
    pub fn descriptions(&self) -> &[String] {
        &self.descriptions
    }

    /// Record at a catalogue index.
    pub fn get(&self, index: usize) -> Option<&DiseaseRecord> {
        self.records.get(index)
    }

    /// Record by disease name.
    pub fn get_by_name(&self, name: &str) -> Option<&DiseaseRecord> {
        self.by_name.get(name).map(|&i| &self.records[i])
    }

    /// Iterate records in catalogue order.
    pub fn iter(&self) -> impl Iterator<Item = &DiseaseRecord> {
        self.records.iter()
    }

    /// BLAKE3 digest of the ordered names and descriptions.
    ///
    /// Changes whenever anything that feeds the text encoder changes.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }
}

fn fingerprint(names: &[String], descriptions: &[String]) -> String {
    let mut hasher = blake3::Hasher::new();
    for (name, description) in names.iter().zip(descriptions) {
        hasher.update(name.as_bytes());
        hasher.update(&[0x1f]);
        hasher.update(description.as_bytes());
        hasher.update(&[0x1e]);
    }
    hasher.finalize().to_hex().to_string()
}
