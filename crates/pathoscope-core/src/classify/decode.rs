//! Image decoding with content-based format detection.

use std::path::Path;

use image::{DynamicImage, ImageError, ImageReader};

use crate::error::ClassificationError;

/// Decode the image at `path`, rejecting anything larger than `max_dimension`
/// on either side.
///
/// The format is sniffed from the content first; the extension is only a
/// fallback, so a PNG saved as `.jpg` still decodes.
pub fn decode_image(path: &Path, max_dimension: u32) -> Result<DynamicImage, ClassificationError> {
    let decode_error = |source: ImageError| ClassificationError::ImageDecode {
        path: path.to_path_buf(),
        source,
    };

    let open = || {
        ImageReader::open(path)
            .and_then(|reader| reader.with_guessed_format())
            .map_err(|e| decode_error(ImageError::IoError(e)))
    };

    // Header dimensions are checked before any pixel data is allocated.
    let (width, height) = open()?.into_dimensions().map_err(decode_error)?;
    if width > max_dimension || height > max_dimension {
        return Err(ClassificationError::ImageTooLarge {
            path: path.to_path_buf(),
            width,
            height,
            max_dim: max_dimension,
        });
    }

    let image = open()?.decode().map_err(decode_error)?;

    tracing::trace!("Decoded {:?} ({}x{})", path, width, height);
    Ok(image)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GenericImageView, Rgb, RgbImage};

    #[test]
    fn test_decode_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lesion.png");
        RgbImage::from_pixel(12, 8, Rgb([10, 20, 30]))
            .save(&path)
            .unwrap();

        let image = decode_image(&path, 10_000).unwrap();
        assert_eq!(image.dimensions(), (12, 8));
    }

    #[test]
    fn test_format_detected_by_content() {
        let dir = tempfile::tempdir().unwrap();
        let png = dir.path().join("real.png");
        RgbImage::new(4, 4).save(&png).unwrap();
        let misnamed = dir.path().join("misnamed.jpg");
        std::fs::copy(&png, &misnamed).unwrap();

        assert!(decode_image(&misnamed, 10_000).is_ok());
    }

    #[test]
    fn test_corrupt_file_is_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("corrupt.png");
        std::fs::write(&path, [0x89, b'P', b'N', b'G', 0, 1, 2, 3]).unwrap();

        let err = decode_image(&path, 10_000).unwrap_err();
        assert!(matches!(err, ClassificationError::ImageDecode { .. }));
    }

    #[test]
    fn test_missing_file_is_decode_error() {
        let err = decode_image(Path::new("/nonexistent/lesion.png"), 10_000).unwrap_err();
        assert!(matches!(
            err,
            ClassificationError::ImageDecode {
                source: ImageError::IoError(_),
                ..
            }
        ));
    }

    #[test]
    fn test_rejects_oversized_dimensions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wide.png");
        RgbImage::new(64, 8).save(&path).unwrap();

        let err = decode_image(&path, 32).unwrap_err();
        assert!(matches!(
            err,
            ClassificationError::ImageTooLarge {
                width: 64,
                height: 8,
                max_dim: 32,
                ..
            }
        ));
    }

    #[test]
    fn test_oversized_rejected_from_header_alone() {
        let dir = tempfile::tempdir().unwrap();
        let full = dir.path().join("full.png");
        RgbImage::new(64, 8).save(&full).unwrap();

        // Keep the header chunks but drop the pixel data.
        let bytes = std::fs::read(&full).unwrap();
        let idat = bytes.windows(4).position(|w| w == b"IDAT").unwrap();
        let path = dir.path().join("header_only.png");
        std::fs::write(&path, &bytes[..idat + 4]).unwrap();

        assert!(matches!(
            decode_image(&path, 10_000).unwrap_err(),
            ClassificationError::ImageDecode { .. }
        ));
        assert!(matches!(
            decode_image(&path, 32).unwrap_err(),
            ClassificationError::ImageTooLarge {
                width: 64,
                height: 8,
                ..
            }
        ));
    }
}
