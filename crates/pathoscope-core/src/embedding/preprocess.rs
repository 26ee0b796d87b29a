//! Image preprocessing for CLIP embedding generation.
//!
//! CLIP ViT-B/32 expects:
//! - Shortest side resized to 224 with bicubic filtering, then a 224×224 center crop
//! - Channel order: RGB
//! - Pixels scaled to [0, 1], then normalized with CLIP's per-channel mean/std
//! - Tensor layout: NCHW [batch, channels, height, width]

use image::DynamicImage;
use ndarray::Array4;

/// Number of color channels (RGB).
const CHANNELS: usize = 3;

/// CLIP normalization mean (per-channel, RGB).
const NORM_MEAN: [f32; CHANNELS] = [0.481_454_66, 0.457_827_5, 0.408_210_73];

/// CLIP normalization std (per-channel, RGB).
const NORM_STD: [f32; CHANNELS] = [0.268_629_54, 0.261_302_58, 0.275_777_11];

/// Preprocess an image for CLIP inference.
///
/// Resizes and center-crops to `image_size × image_size`, converts to RGB,
/// normalizes, and returns a `[1, 3, image_size, image_size]` tensor.
pub fn preprocess(image: &DynamicImage, image_size: u32) -> Array4<f32> {
    let cropped = image.resize_to_fill(
        image_size,
        image_size,
        image::imageops::FilterType::CatmullRom,
    );
    let rgb = cropped.to_rgb8();

    let size = image_size as usize;
    let plane = size * size;
    let mut data = vec![0f32; CHANNELS * plane];

    // Walk the raw RGB bytes once, scattering into channel planes.
    for (i, pixel) in rgb.as_raw().chunks_exact(CHANNELS).enumerate() {
        for (c, &val) in pixel.iter().enumerate() {
            data[c * plane + i] = (val as f32 / 255.0 - NORM_MEAN[c]) / NORM_STD[c];
        }
    }

    Array4::from_shape_vec((1, CHANNELS, size, size), data)
        .unwrap_or_else(|_| Array4::zeros((1, CHANNELS, size, size)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, Rgb, RgbImage};

    #[test]
    fn test_preprocess_shape_224() {
        let img = DynamicImage::ImageRgb8(RgbImage::new(640, 480));
        let tensor = preprocess(&img, 224);
        assert_eq!(tensor.shape(), &[1, 3, 224, 224]);
    }

    #[test]
    fn test_preprocess_portrait_input() {
        let img = DynamicImage::ImageRgb8(RgbImage::new(100, 900));
        let tensor = preprocess(&img, 224);
        assert_eq!(tensor.shape(), &[1, 3, 224, 224]);
    }

    #[test]
    fn test_preprocess_normalization() {
        // White -> (1 - mean) / std per channel
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(10, 10, Rgb([255, 255, 255])));
        let tensor = preprocess(&img, 32);
        for c in 0..CHANNELS {
            let expected = (1.0 - NORM_MEAN[c]) / NORM_STD[c];
            assert!((tensor[[0, c, 5, 5]] - expected).abs() < 1e-4);
        }

        // Black -> -mean / std per channel
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(10, 10, Rgb([0, 0, 0])));
        let tensor = preprocess(&img, 32);
        for c in 0..CHANNELS {
            let expected = -NORM_MEAN[c] / NORM_STD[c];
            assert!((tensor[[0, c, 0, 0]] - expected).abs() < 1e-4);
        }
    }

    #[test]
    fn test_preprocess_channel_planes() {
        // Pure red: channel 0 high, channels 1 and 2 at their minimum
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(8, 8, Rgb([255, 0, 0])));
        let tensor = preprocess(&img, 8);
        assert!(tensor[[0, 0, 3, 3]] > 1.5);
        assert!(tensor[[0, 1, 3, 3]] < -1.5);
        assert!(tensor[[0, 2, 3, 3]] < -1.4);
    }

    #[test]
    fn test_preprocess_center_crop_keeps_middle() {
        // Wide image: left third red, middle third green, right third blue.
        let mut img = RgbImage::new(300, 100);
        for (x, _, p) in img.enumerate_pixels_mut() {
            *p = match x {
                0..=99 => Rgb([255, 0, 0]),
                100..=199 => Rgb([0, 255, 0]),
                _ => Rgb([0, 0, 255]),
            };
        }
        let tensor = preprocess(&DynamicImage::ImageRgb8(img), 30);
        // Center of the crop is green
        assert!(tensor[[0, 1, 15, 15]] > 1.5);
        assert!(tensor[[0, 0, 15, 15]] < -1.5);
    }
}
