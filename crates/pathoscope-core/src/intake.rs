//! Upload validation before classification.
//!
//! The classifier trusts the path it is given. These checks belong to the
//! caller side of that boundary: extension allow-list, size ceiling, and a
//! magic-byte sniff so obviously wrong content is rejected before decode.

use std::io::Read;
use std::path::Path;

use crate::config::{LimitsConfig, UploadConfig};
use crate::error::IntakeError;

/// Validates uploaded files before they reach the classifier.
pub struct Intake {
    allowed_extensions: Vec<String>,
    max_file_size_mb: u64,
}

impl Intake {
    /// Create a validator from the upload and limits configuration.
    pub fn new(upload: &UploadConfig, limits: &LimitsConfig) -> Self {
        Self {
            allowed_extensions: upload
                .allowed_extensions
                .iter()
                .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
                .collect(),
            max_file_size_mb: limits.max_file_size_mb,
        }
    }

    /// Check an uploaded file.
    ///
    /// Checks, in order:
    /// - Extension is in the allow-list (case-insensitive)
    /// - File exists
    /// - File size is within the ceiling
    /// - File starts with a PNG, JPEG, BMP or TIFF signature
    pub fn validate(&self, path: &Path) -> Result<(), IntakeError> {
        if !self.extension_allowed(path) {
            return Err(IntakeError::UnsupportedExtension {
                path: path.to_path_buf(),
                allowed: self.allowed_extensions.join(", ").to_uppercase(),
            });
        }

        if !path.exists() {
            return Err(IntakeError::NotFound(path.to_path_buf()));
        }

        let metadata = std::fs::metadata(path).map_err(|e| IntakeError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        let max_bytes = self.max_file_size_mb.saturating_mul(1024 * 1024);
        if metadata.len() > max_bytes {
            return Err(IntakeError::TooLarge {
                path: path.to_path_buf(),
                size_bytes: metadata.len(),
                max_mb: self.max_file_size_mb,
            });
        }

        self.check_magic_bytes(path)
    }

    /// Whether the path's extension is in the allow-list.
    pub fn extension_allowed(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .is_some_and(|e| self.allowed_extensions.iter().any(|a| *a == e))
    }

    fn check_magic_bytes(&self, path: &Path) -> Result<(), IntakeError> {
        let mut file = std::fs::File::open(path).map_err(|e| IntakeError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        let mut header = [0u8; 8];
        let bytes_read = file.read(&mut header).map_err(|e| IntakeError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        if !is_image_header(&header[..bytes_read]) {
            return Err(IntakeError::UnrecognizedContent(path.to_path_buf()));
        }
        Ok(())
    }
}

/// Check if the header bytes match one of the accepted upload formats.
fn is_image_header(header: &[u8]) -> bool {
    match header {
        // PNG: 89 50 4E 47
        [0x89, b'P', b'N', b'G', ..] => true,
        // JPEG: FF D8 FF
        [0xFF, 0xD8, 0xFF, ..] => true,
        // BMP: BM
        [b'B', b'M', ..] => true,
        // TIFF: II*\0 (little-endian) or MM\0* (big-endian)
        [b'I', b'I', 0x2A, 0x00, ..] | [b'M', b'M', 0x00, 0x2A, ..] => true,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn intake() -> Intake {
        Intake::new(&UploadConfig::default(), &LimitsConfig::default())
    }

    fn write(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, bytes).unwrap();
        path
    }

    #[test]
    fn test_magic_bytes() {
        assert!(is_image_header(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A]));
        assert!(is_image_header(&[0xFF, 0xD8, 0xFF, 0xE0]));
        assert!(is_image_header(b"BM\0\0"));
        assert!(is_image_header(&[b'I', b'I', 0x2A, 0x00]));
        assert!(is_image_header(&[b'M', b'M', 0x00, 0x2A]));
        assert!(!is_image_header(&[b'I', b'I', 0x00, 0x00]));
        assert!(!is_image_header(b"GIF89a"));
        assert!(!is_image_header(&[]));
    }

    #[test]
    fn test_extension_allow_list_is_case_insensitive() {
        let intake = intake();
        assert!(intake.extension_allowed(Path::new("rash.JPG")));
        assert!(intake.extension_allowed(Path::new("scan.tiff")));
        assert!(!intake.extension_allowed(Path::new("scan.gif")));
        assert!(!intake.extension_allowed(Path::new("no_extension")));
    }

    #[test]
    fn test_rejects_extension_before_touching_disk() {
        let err = intake()
            .validate(Path::new("/nonexistent/photo.webp"))
            .unwrap_err();
        assert!(matches!(err, IntakeError::UnsupportedExtension { .. }));
        assert!(err.to_string().contains("PNG"));
    }

    #[test]
    fn test_rejects_missing_file() {
        let err = intake()
            .validate(Path::new("/nonexistent/photo.png"))
            .unwrap_err();
        assert!(matches!(err, IntakeError::NotFound(_)));
    }

    #[test]
    fn test_rejects_oversized_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut bytes = vec![0x89, b'P', b'N', b'G'];
        bytes.resize(1024 * 1024 + 1, 0);
        let path = write(dir.path(), "big.png", &bytes);

        let limits = LimitsConfig {
            max_file_size_mb: 1,
            ..LimitsConfig::default()
        };
        let err = Intake::new(&UploadConfig::default(), &limits)
            .validate(&path)
            .unwrap_err();
        assert!(matches!(err, IntakeError::TooLarge { max_mb: 1, .. }));
    }

    #[test]
    fn test_rejects_mislabelled_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "notes.jpg", b"just some text");
        let err = intake().validate(&path).unwrap_err();
        assert!(matches!(err, IntakeError::UnrecognizedContent(_)));
    }

    #[test]
    fn test_accepts_real_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lesion.png");
        image::RgbImage::from_pixel(4, 4, image::Rgb([200, 40, 40]))
            .save(&path)
            .unwrap();
        assert!(intake().validate(&path).is_ok());
    }

    #[test]
    fn test_huge_size_ceiling_does_not_overflow() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lesion.png");
        image::RgbImage::new(4, 4).save(&path).unwrap();

        let limits = LimitsConfig {
            max_file_size_mb: u64::MAX,
            ..LimitsConfig::default()
        };
        assert!(Intake::new(&UploadConfig::default(), &limits)
            .validate(&path)
            .is_ok());
    }
}
