//! Image preprocessing: decode bytes, convert to RGB, resize to 64×64 and
//! scale pixels to [0, 1].
//!
//! Resizing ignores the source aspect ratio (no letterboxing), matching how
//! the classifier was trained.

use std::path::Path;

use image::imageops::FilterType;
use image::DynamicImage;

use crate::error::DecodeError;

pub const TARGET_WIDTH: u32 = 64;
pub const TARGET_HEIGHT: u32 = 64;
pub const CHANNELS: usize = 3;
/// Length of the flattened network input.
pub const FEATURE_COUNT: usize = TARGET_WIDTH as usize * TARGET_HEIGHT as usize * CHANNELS;

/// A preprocessed image: shape (1, 64, 64, 3), RGB, values in [0, 1].
///
/// `data` is laid out batch-major, then row, column and channel, so it can
/// be fed directly to the network as a flat input row.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageTensor {
    data: Vec<f64>,
}

impl ImageTensor {
    pub const SHAPE: [usize; 4] = [1, TARGET_HEIGHT as usize, TARGET_WIDTH as usize, CHANNELS];

    pub fn shape(&self) -> [usize; 4] {
        Self::SHAPE
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    pub fn into_vec(self) -> Vec<f64> {
        self.data
    }

    /// Value at batch 0, row `y`, column `x`, channel `c`.
    pub fn at(&self, y: usize, x: usize, c: usize) -> f64 {
        self.data[(y * TARGET_WIDTH as usize + x) * CHANNELS + c]
    }
}

/// Decodes image bytes (PNG/JPEG/BMP/GIF) into an [`ImageTensor`].
pub fn preprocess_image_bytes(bytes: &[u8]) -> Result<ImageTensor, DecodeError> {
    let img = image::load_from_memory(bytes)?;
    Ok(tensor_from_image(img))
}

/// Reads and decodes an image file into an [`ImageTensor`].
pub fn preprocess_image_path(path: &Path) -> Result<ImageTensor, DecodeError> {
    let bytes = std::fs::read(path).map_err(|source| DecodeError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    preprocess_image_bytes(&bytes)
}

fn tensor_from_image(img: DynamicImage) -> ImageTensor {
    // Grayscale, RGBA and palette sources all become plain RGB first.
    let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
    let resized = rgb.resize_exact(TARGET_WIDTH, TARGET_HEIGHT, FilterType::CatmullRom);
    let data = resized
        .to_rgb8()
        .pixels()
        .flat_map(|p| p.0.into_iter().map(|c| c as f64 / 255.0))
        .collect();
    ImageTensor { data }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, ImageOutputFormat, Luma, Rgb, RgbImage, Rgba, RgbaImage};
    use std::io::Cursor;

    fn encode(img: DynamicImage) -> Vec<u8> {
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, ImageOutputFormat::Png).unwrap();
        buf.into_inner()
    }

    fn assert_valid(tensor: &ImageTensor) {
        assert_eq!(tensor.shape(), [1, 64, 64, 3]);
        assert_eq!(tensor.as_slice().len(), FEATURE_COUNT);
        assert!(tensor.as_slice().iter().all(|v| (0.0..=1.0).contains(v)));
    }

    #[test]
    fn rgb_image_is_scaled_to_unit_range() {
        let img = RgbImage::from_pixel(64, 64, Rgb([255, 0, 51]));
        let tensor = preprocess_image_bytes(&encode(DynamicImage::ImageRgb8(img))).unwrap();
        assert_valid(&tensor);
        // Resampling may shift a flat colour by one quantisation step.
        assert!((tensor.at(10, 20, 0) - 1.0).abs() < 0.01);
        assert!(tensor.at(10, 20, 1) < 0.01);
        assert!((tensor.at(10, 20, 2) - 0.2).abs() < 0.01);
    }

    #[test]
    fn grayscale_and_rgba_become_rgb() {
        let gray = GrayImage::from_pixel(30, 30, Luma([128]));
        let tensor = preprocess_image_bytes(&encode(DynamicImage::ImageLuma8(gray))).unwrap();
        assert_valid(&tensor);
        assert_eq!(tensor.at(0, 0, 0), tensor.at(0, 0, 2));

        let rgba = RgbaImage::from_pixel(100, 10, Rgba([10, 200, 30, 0]));
        let tensor = preprocess_image_bytes(&encode(DynamicImage::ImageRgba8(rgba))).unwrap();
        assert_valid(&tensor);
        // Alpha is dropped, not blended.
        assert!((tensor.at(5, 5, 1) - 200.0 / 255.0).abs() < 0.01);
    }

    #[test]
    fn non_square_sources_are_stretched_to_target() {
        let img = RgbImage::from_pixel(200, 17, Rgb([1, 2, 3]));
        let tensor = preprocess_image_bytes(&encode(DynamicImage::ImageRgb8(img))).unwrap();
        assert_valid(&tensor);
    }

    #[test]
    fn garbage_bytes_fail_with_decode_error() {
        let err = preprocess_image_bytes(b"definitely not an image").unwrap_err();
        assert!(matches!(err, DecodeError::Image(_)));
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let err = preprocess_image_path(Path::new("/nonexistent/tile.png")).unwrap_err();
        assert!(matches!(err, DecodeError::Read { .. }));
    }
}
