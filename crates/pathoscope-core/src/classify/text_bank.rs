//! Pre-computed prompt embeddings for the catalogue.
//!
//! The text bank stores an N×D matrix of text embeddings (one row per
//! catalogue entry, in catalogue order) tagged with the catalogue fingerprint
//! it was built from. It can be persisted as raw f32 with a `.meta` sidecar so
//! a restart with an unchanged catalogue skips the text encoder entirely.

use std::io::{Error, ErrorKind};
use std::path::Path;

use ndarray::Array2;

use crate::catalogue::Catalogue;
use crate::embedding::TextEncoder;
use crate::error::{ClassificationError, EncodeStage};

use super::scorer::prompt_for;

/// Text embeddings for every catalogue entry.
#[derive(Debug, Clone)]
pub struct TextBank {
    /// N × D, row-major, row i = catalogue entry i.
    matrix: Array2<f32>,
    fingerprint: String,
}

impl TextBank {
    /// Encode every catalogue description as one batch.
    pub fn encode(
        catalogue: &Catalogue,
        encoder: &dyn TextEncoder,
    ) -> Result<Self, ClassificationError> {
        let prompts: Vec<String> = catalogue
            .descriptions()
            .iter()
            .map(|d| prompt_for(d))
            .collect();

        tracing::debug!("Encoding {} catalogue prompts", prompts.len());
        let rows = encoder.encode_texts(&prompts)?;

        if rows.len() != prompts.len() {
            return Err(ClassificationError::encode(
                EncodeStage::Text,
                format!(
                    "Text encoder returned {} embeddings for {} prompts",
                    rows.len(),
                    prompts.len()
                ),
            ));
        }

        Self::from_rows(rows, catalogue.fingerprint())
    }

    /// Build a bank from already-normalized rows.
    pub fn from_rows(rows: Vec<Vec<f32>>, fingerprint: &str) -> Result<Self, ClassificationError> {
        let entries = rows.len();
        let embedding_dim = rows.first().map_or(0, Vec::len);

        if rows.iter().any(|r| r.len() != embedding_dim) {
            return Err(ClassificationError::encode(
                EncodeStage::Text,
                "Text embeddings have inconsistent dimensions",
            ));
        }

        if rows.iter().flatten().any(|v| !v.is_finite()) {
            return Err(ClassificationError::encode(
                EncodeStage::Text,
                "Text embeddings contain non-finite values",
            ));
        }

        let flat: Vec<f32> = rows.into_iter().flatten().collect();
        let matrix = Array2::from_shape_vec((entries, embedding_dim), flat).map_err(|e| {
            ClassificationError::encode(EncodeStage::Text, format!("Invalid text bank shape: {e}"))
        })?;

        Ok(Self {
            matrix,
            fingerprint: fingerprint.to_string(),
        })
    }

    /// The embedding matrix.
    pub fn matrix(&self) -> &Array2<f32> {
        &self.matrix
    }

    /// Number of rows (catalogue entries).
    pub fn entries(&self) -> usize {
        self.matrix.nrows()
    }

    /// Embedding dimension.
    pub fn embedding_dim(&self) -> usize {
        self.matrix.ncols()
    }

    /// Fingerprint of the catalogue this bank was built from.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Whether this bank still matches `catalogue`.
    pub fn matches(&self, catalogue: &Catalogue) -> bool {
        self.fingerprint == catalogue.fingerprint() && self.entries() == catalogue.len()
    }

    /// Save the bank to disk as raw little-endian f32.
    ///
    /// Also writes a `.meta` sidecar with the fingerprint and model name for
    /// cache invalidation.
    pub fn save(&self, path: &Path, model: &str) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let bytes: Vec<u8> = self.matrix.iter().flat_map(|f| f.to_le_bytes()).collect();
        std::fs::write(path, &bytes)?;

        let meta = format!(
            "fingerprint={}\nmodel={}\nentries={}\nembedding_dim={}\n",
            self.fingerprint,
            model,
            self.entries(),
            self.embedding_dim()
        );
        std::fs::write(path.with_extension("meta"), meta)?;

        tracing::info!(
            "Saved text bank to {:?} ({} entries x {} dims)",
            path,
            self.entries(),
            self.embedding_dim()
        );
        Ok(())
    }

    /// Load a bank saved by [`TextBank::save`].
    pub fn load(path: &Path) -> std::io::Result<Self> {
        let meta = BankMeta::read(&path.with_extension("meta"))?;
        let bytes = std::fs::read(path)?;

        let expected_len = meta.entries * meta.embedding_dim * 4;
        if bytes.len() != expected_len {
            return Err(Error::new(
                ErrorKind::InvalidData,
                format!(
                    "Text bank size mismatch: expected {} bytes ({} entries), got {} bytes",
                    expected_len,
                    meta.entries,
                    bytes.len()
                ),
            ));
        }

        let flat: Vec<f32> = bytes
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();
        if flat.iter().any(|v| !v.is_finite()) {
            return Err(Error::new(
                ErrorKind::InvalidData,
                format!("Text bank {:?} contains non-finite values", path),
            ));
        }
        let matrix = Array2::from_shape_vec((meta.entries, meta.embedding_dim), flat)
            .map_err(|e| Error::new(ErrorKind::InvalidData, e.to_string()))?;

        tracing::info!("Loaded text bank: {} entries from {:?}", meta.entries, path);
        Ok(Self {
            matrix,
            fingerprint: meta.fingerprint,
        })
    }

    /// Whether a saved bank exists for this fingerprint and model.
    pub fn cache_valid(path: &Path, fingerprint: &str, model: &str) -> bool {
        if !path.exists() {
            return false;
        }
        match BankMeta::read(&path.with_extension("meta")) {
            Ok(meta) => meta.fingerprint == fingerprint && meta.model == model,
            Err(_) => false,
        }
    }
}

/// Parsed `.meta` sidecar.
struct BankMeta {
    fingerprint: String,
    model: String,
    entries: usize,
    embedding_dim: usize,
}

impl BankMeta {
    fn read(path: &Path) -> std::io::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let field = |key: &str| {
            content
                .lines()
                .find_map(|line| line.strip_prefix(key)?.strip_prefix('='))
                .map(str::to_string)
                .ok_or_else(|| {
                    Error::new(
                        ErrorKind::InvalidData,
                        format!("Missing {key} in {:?}", path),
                    )
                })
        };
        let number = |key: &str| -> std::io::Result<usize> {
            field(key)?
                .parse()
                .map_err(|_| Error::new(ErrorKind::InvalidData, format!("Invalid {key}")))
        };

        Ok(Self {
            fingerprint: field("fingerprint")?,
            model: field("model")?,
            entries: number("entries")?,
            embedding_dim: number("embedding_dim")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingEncoder {
        calls: AtomicUsize,
    }

    impl TextEncoder for CountingEncoder {
        fn encode_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ClassificationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(texts
                .iter()
                .map(|t| vec![t.len() as f32, 1.0])
                .collect())
        }
    }

    fn catalogue() -> Catalogue {
        Catalogue::from_json_str(
            r#"{"A": {"description": "desc A"}, "B": {"description": "longer desc B"}}"#,
        )
        .unwrap()
    }

    #[test]
    fn test_encode_uses_prompt_template_in_catalogue_order() {
        let encoder = CountingEncoder {
            calls: AtomicUsize::new(0),
        };
        let bank = TextBank::encode(&catalogue(), &encoder).unwrap();

        assert_eq!(encoder.calls.load(Ordering::SeqCst), 1);
        assert_eq!(bank.entries(), 2);
        assert_eq!(bank.embedding_dim(), 2);
        assert_eq!(bank.matrix()[[0, 0]], "a photo of desc A".len() as f32);
        assert_eq!(bank.matrix()[[1, 0]], "a photo of longer desc B".len() as f32);
    }

    #[test]
    fn test_encode_rejects_short_output() {
        struct Dropping;
        impl TextEncoder for Dropping {
            fn encode_texts(&self, _: &[String]) -> Result<Vec<Vec<f32>>, ClassificationError> {
                Ok(vec![vec![1.0, 0.0]])
            }
        }
        let err = TextBank::encode(&catalogue(), &Dropping).unwrap_err();
        assert!(err.to_string().contains("1 embeddings for 2 prompts"));
    }

    #[test]
    fn test_from_rows_rejects_ragged_rows() {
        let err = TextBank::from_rows(vec![vec![1.0, 0.0], vec![1.0]], "fp").unwrap_err();
        assert!(matches!(err, ClassificationError::Encode { .. }));
    }

    #[test]
    fn test_from_rows_rejects_non_finite_values() {
        let err = TextBank::from_rows(vec![vec![f32::NAN, 0.0], vec![0.0, 1.0]], "fp").unwrap_err();
        assert!(matches!(
            err,
            ClassificationError::Encode {
                stage: EncodeStage::Text,
                ..
            }
        ));
    }

    #[test]
    fn test_load_rejects_non_finite_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.textbank");
        TextBank::from_rows(vec![vec![1.0, 0.0]], "abc")
            .unwrap()
            .save(&path, "m")
            .unwrap();
        // Same length as a valid bank, but the first value is NaN.
        let mut bytes = f32::NAN.to_le_bytes().to_vec();
        bytes.extend_from_slice(&0.0f32.to_le_bytes());
        std::fs::write(&path, bytes).unwrap();

        let err = TextBank::load(&path).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidData);
    }

    #[test]
    fn test_matches_tracks_fingerprint() {
        let catalogue = catalogue();
        let bank = TextBank::from_rows(vec![vec![1.0], vec![0.0]], catalogue.fingerprint()).unwrap();
        assert!(bank.matches(&catalogue));

        let stale = TextBank::from_rows(vec![vec![1.0], vec![0.0]], "other").unwrap();
        assert!(!stale.matches(&catalogue));
    }

    #[test]
    fn test_save_load_preserves_matrix() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache").join("clip.textbank");
        let bank = TextBank::from_rows(
            vec![vec![0.6, 0.8, 0.0], vec![0.0, -1.0, 0.0]],
            "abc123",
        )
        .unwrap();

        bank.save(&path, "clip-vit-base-patch32").unwrap();
        assert!(TextBank::cache_valid(&path, "abc123", "clip-vit-base-patch32"));

        let loaded = TextBank::load(&path).unwrap();
        assert_eq!(loaded.matrix(), bank.matrix());
        assert_eq!(loaded.fingerprint(), "abc123");
    }

    #[test]
    fn test_cache_invalid_on_fingerprint_or_model_change() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.textbank");
        TextBank::from_rows(vec![vec![1.0]], "abc123")
            .unwrap()
            .save(&path, "clip-vit-base-patch32")
            .unwrap();

        assert!(!TextBank::cache_valid(&path, "def456", "clip-vit-base-patch32"));
        assert!(!TextBank::cache_valid(&path, "abc123", "clip-vit-large-patch14"));
        assert!(!TextBank::cache_valid(&dir.path().join("missing.textbank"), "abc123", "clip-vit-base-patch32"));
    }

    #[test]
    fn test_load_rejects_truncated_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.textbank");
        TextBank::from_rows(vec![vec![1.0, 2.0]], "abc")
            .unwrap()
            .save(&path, "m")
            .unwrap();
        std::fs::write(&path, [0u8; 4]).unwrap();

        let err = TextBank::load(&path).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidData);
    }
}
