//! Image Preprocessing Module
//!
//! Turns raw upload bytes into the fixed-shape input the network was trained on:
//! decode → RGB → 128×128 bicubic resize → MobileNetV2 scaling into [-1, 1] → batch of one.
//! The output is channels-last (NHWC), matching the layout the model was exported with.

use std::io::Cursor;

use image::{imageops::FilterType, DynamicImage, ImageReader};

use crate::utils::error::{ClassifierError, Result};
use crate::{IMAGE_SIZE, NUM_CHANNELS};

/// Per-channel affine transform of MobileNetV2: `x / 127.5 - 1.0`
const PIXEL_SCALE: f32 = 127.5;
const PIXEL_OFFSET: f32 = 1.0;

/// Resampling filter used for the resize step (bicubic)
const RESIZE_FILTER: FilterType = FilterType::CatmullRom;

/// A normalized input batch in NHWC layout
#[derive(Debug, Clone, PartialEq)]
pub struct ImageTensor {
    data: Vec<f32>,
    shape: [usize; 4],
}

impl ImageTensor {
    /// Shape every tensor produced here has: `[1, 128, 128, 3]`
    pub const SHAPE: [usize; 4] = [1, IMAGE_SIZE, IMAGE_SIZE, NUM_CHANNELS];

    /// Wrap raw NHWC data, checking the element count against `SHAPE`
    pub fn from_vec(data: Vec<f32>) -> Result<Self> {
        let expected: usize = Self::SHAPE.iter().product();
        if data.len() != expected {
            return Err(ClassifierError::Inference(format!(
                "expected {} tensor elements for shape {:?}, got {}",
                expected,
                Self::SHAPE,
                data.len()
            )));
        }
        Ok(Self {
            data,
            shape: Self::SHAPE,
        })
    }

    /// An all-zero (mid-gray after scaling) input
    pub fn zeros() -> Self {
        Self {
            data: vec![0.0; Self::SHAPE.iter().product()],
            shape: Self::SHAPE,
        }
    }

    pub fn shape(&self) -> [usize; 4] {
        self.shape
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }
}

/// Decode image bytes, sniffing the format from the content itself
pub fn decode_image(bytes: &[u8]) -> Result<DynamicImage> {
    if bytes.is_empty() {
        return Err(ClassifierError::Decode("empty upload".to_string()));
    }

    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| ClassifierError::Decode(e.to_string()))?;

    if reader.format().is_none() {
        return Err(ClassifierError::Decode(
            "unrecognized image format".to_string(),
        ));
    }

    Ok(reader.decode()?)
}

/// Resize and scale a decoded image into the network input
pub fn preprocess_image(image: &DynamicImage) -> ImageTensor {
    let rgb = image.to_rgb8();
    let resized = image::imageops::resize(
        &rgb,
        IMAGE_SIZE as u32,
        IMAGE_SIZE as u32,
        RESIZE_FILTER,
    );

    // Row-major pixels with interleaved channels is already HWC
    let data: Vec<f32> = resized
        .as_raw()
        .iter()
        .map(|&v| v as f32 / PIXEL_SCALE - PIXEL_OFFSET)
        .collect();

    ImageTensor {
        data,
        shape: ImageTensor::SHAPE,
    }
}

/// Decode and preprocess in one step
pub fn preprocess_bytes(bytes: &[u8]) -> Result<ImageTensor> {
    let image = decode_image(bytes)?;
    Ok(preprocess_image(&image))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use image::{GrayImage, ImageBuffer, ImageFormat, Luma, Rgb, RgbImage, Rgba, RgbaImage};

    /// Encode an image into the given container format
    pub(crate) fn encode(image: DynamicImage, format: ImageFormat) -> Vec<u8> {
        let mut bytes = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut bytes), format)
            .unwrap();
        bytes
    }

    pub(crate) fn gradient_rgb(width: u32, height: u32) -> RgbImage {
        ImageBuffer::from_fn(width, height, |x, y| {
            Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
        })
    }

    #[test]
    fn test_rgb_jpeg_has_fixed_shape() {
        let bytes = encode(DynamicImage::ImageRgb8(gradient_rgb(300, 200)), ImageFormat::Jpeg);
        let tensor = preprocess_bytes(&bytes).unwrap();

        assert_eq!(tensor.shape(), [1, 128, 128, 3]);
        assert_eq!(tensor.as_slice().len(), 128 * 128 * 3);
    }

    #[test]
    fn test_rgba_png_drops_alpha() {
        let img: RgbaImage = ImageBuffer::from_fn(64, 40, |_, _| Rgba([255u8, 0, 0, 10]));
        let bytes = encode(DynamicImage::ImageRgba8(img), ImageFormat::Png);
        let tensor = preprocess_bytes(&bytes).unwrap();

        assert_eq!(tensor.shape(), ImageTensor::SHAPE);
        let first = &tensor.as_slice()[..3];
        assert!((first[0] - 1.0).abs() < 1e-6);
        assert!((first[1] + 1.0).abs() < 1e-6);
        assert!((first[2] + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_grayscale_expands_to_three_channels() {
        let img: GrayImage = ImageBuffer::from_fn(17, 300, |_, _| Luma([255u8]));
        let bytes = encode(DynamicImage::ImageLuma8(img), ImageFormat::Png);
        let tensor = preprocess_bytes(&bytes).unwrap();

        assert_eq!(tensor.shape(), ImageTensor::SHAPE);
        assert!(tensor.as_slice().iter().all(|&v| (v - 1.0).abs() < 1e-6));
    }

    #[test]
    fn test_scaling_stays_in_unit_range() {
        let bytes = encode(DynamicImage::ImageRgb8(gradient_rgb(256, 256)), ImageFormat::Png);
        let tensor = preprocess_bytes(&bytes).unwrap();

        assert!(tensor.as_slice().iter().all(|&v| (-1.0..=1.0).contains(&v)));
    }

    #[test]
    fn test_black_pixels_map_to_minus_one() {
        let img = DynamicImage::new_rgb8(5, 5);
        let tensor = preprocess_image(&img);
        assert!(tensor.as_slice().iter().all(|&v| (v + 1.0).abs() < 1e-6));
    }

    #[test]
    fn test_preprocessing_is_deterministic() {
        let bytes = encode(DynamicImage::ImageRgb8(gradient_rgb(90, 33)), ImageFormat::Jpeg);
        assert_eq!(preprocess_bytes(&bytes).unwrap(), preprocess_bytes(&bytes).unwrap());
    }

    #[test]
    fn test_empty_bytes_fail_to_decode() {
        assert!(matches!(
            preprocess_bytes(&[]),
            Err(ClassifierError::Decode(_))
        ));
    }

    #[test]
    fn test_text_bytes_fail_to_decode() {
        let result = preprocess_bytes(b"this is a plain text file, not an image\n");
        assert!(matches!(result, Err(ClassifierError::Decode(_))));
    }

    #[test]
    fn test_truncated_png_fails_to_decode() {
        // PNG signature followed by two garbage bytes: 10 bytes total
        let bytes = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x01];
        assert!(matches!(
            preprocess_bytes(&bytes),
            Err(ClassifierError::Decode(_))
        ));
    }

    #[test]
    fn test_from_vec_checks_length() {
        assert!(ImageTensor::from_vec(vec![0.0; 10]).is_err());
        let tensor = ImageTensor::from_vec(vec![0.5; 128 * 128 * 3]).unwrap();
        assert_eq!(tensor.as_slice().len(), 49152);
    }
}
