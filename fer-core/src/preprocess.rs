//! Preprocessing utilities for preparing face images for the emotion model.
//!
//! Images are converted to grayscale, resized to the model resolution and laid
//! out as a `[1, 1, H, W]` `f32` tensor. The grayscale and resize sub-steps are
//! timed individually.

use std::{borrow::Cow, path::Path, time::Duration};

use anyhow::Result;
use fer_utils::{
    config::{InputDimensions, ResizeFilter},
    gray_to_plane, load_image, measure, resize_gray, timing_guard, to_grayscale,
};
use image::{DynamicImage, GenericImageView, GrayImage};
use log::Level;
use tract_onnx::prelude::Tensor;

/// Model input resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputSize {
    pub width: u32,
    pub height: u32,
}

impl InputSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Tensor shape `[1, 1, height, width]` for this size.
    pub fn tensor_shape(&self) -> [usize; 4] {
        [1, 1, self.height as usize, self.width as usize]
    }
}

impl Default for InputSize {
    fn default() -> Self {
        Self::new(64, 64)
    }
}

/// Configuration for preprocessing an image before inference.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PreprocessConfig {
    /// The target input size for the model.
    pub input_size: InputSize,
    /// Interpolation used for the resize step.
    pub resize_filter: ResizeFilter,
    /// Divide intensities by 255; off by default so the model sees raw 0-255 values.
    pub scale_to_unit: bool,
}

/// Output of preprocessing: the model tensor plus sub-step timings.
#[derive(Debug)]
pub struct PreprocessOutput {
    /// `[1, 1, H, W]` grayscale tensor.
    pub tensor: Tensor,
    /// Time spent converting to grayscale.
    pub grayscale: Duration,
    /// Time spent resizing.
    pub resize: Duration,
    /// Dimensions of the decoded source image.
    pub original_size: (u32, u32),
}

impl From<InputDimensions> for InputSize {
    fn from(dimensions: InputDimensions) -> Self {
        InputSize::new(dimensions.width, dimensions.height)
    }
}

impl From<InputDimensions> for PreprocessConfig {
    fn from(dimensions: InputDimensions) -> Self {
        let InputDimensions {
            width,
            height,
            resize_filter,
            scale_to_unit,
        } = dimensions;
        PreprocessConfig {
            input_size: InputSize::new(width, height),
            resize_filter,
            scale_to_unit,
        }
    }
}

impl From<&InputDimensions> for PreprocessConfig {
    fn from(dimensions: &InputDimensions) -> Self {
        (*dimensions).into()
    }
}

/// Abstraction over preprocessing backends.
pub trait Preprocessor: Send + Sync + std::fmt::Debug {
    /// Convert a decoded image into a model-ready tensor.
    fn preprocess(&self, image: &DynamicImage, config: &PreprocessConfig)
    -> Result<PreprocessOutput>;
}

/// Default CPU implementation backed by `image` + `ndarray`.
#[derive(Debug, Default, Clone, Copy)]
pub struct CpuPreprocessor;

impl Preprocessor for CpuPreprocessor {
    fn preprocess(
        &self,
        image: &DynamicImage,
        config: &PreprocessConfig,
    ) -> Result<PreprocessOutput> {
        cpu_preprocess(image, config)
    }
}

/// Decode an image file from disk.
///
/// Kept separate from [`Preprocessor::preprocess`] so callers can tell decode
/// failures apart from everything that follows.
pub fn decode_image<P: AsRef<Path>>(path: P) -> Result<DynamicImage> {
    let path_ref = path.as_ref();
    anyhow::ensure!(
        path_ref.is_file(),
        "input image does not exist: {}",
        path_ref.display()
    );
    let image = load_image(path_ref)?;
    let (width, height) = image.dimensions();
    anyhow::ensure!(
        width > 0 && height > 0,
        "image {} has zero dimensions",
        path_ref.display()
    );
    Ok(image)
}

/// Decode and preprocess an image file with the CPU preprocessor.
pub fn preprocess_image<P: AsRef<Path>>(
    path: P,
    config: &PreprocessConfig,
) -> Result<PreprocessOutput> {
    let _guard = timing_guard("fer_core::preprocess_image", Level::Debug);
    let image = decode_image(path)?;
    CpuPreprocessor.preprocess(&image, config)
}

/// Preprocess an in-memory image with the CPU preprocessor.
pub fn preprocess_dynamic_image(
    image: &DynamicImage,
    config: &PreprocessConfig,
) -> Result<PreprocessOutput> {
    CpuPreprocessor.preprocess(image, config)
}

fn cpu_preprocess(image: &DynamicImage, config: &PreprocessConfig) -> Result<PreprocessOutput> {
    let InputSize { width, height } = config.input_size;
    anyhow::ensure!(
        width > 0 && height > 0,
        "input dimensions must be greater than zero"
    );

    let original_size = image.dimensions();
    anyhow::ensure!(
        original_size.0 > 0 && original_size.1 > 0,
        "source image dimensions must be greater than zero"
    );

    let (gray, grayscale) = measure("fer_core::grayscale", Level::Trace, || to_grayscale(image));

    let (resized, resize): (Cow<'_, GrayImage>, Duration) =
        measure("fer_core::resize", Level::Trace, || {
            if gray.dimensions() == (width, height) {
                Cow::Borrowed(&gray)
            } else {
                Cow::Owned(resize_gray(&gray, width, height, config.resize_filter))
            }
        });

    let plane = gray_to_plane(&resized, config.scale_to_unit);
    let (data, offset) = plane.into_raw_vec_and_offset();
    debug_assert_eq!(offset.unwrap_or(0), 0, "expected contiguous array");
    let tensor = Tensor::from_shape(&config.input_size.tensor_shape(), &data)
        .map_err(|e| anyhow::anyhow!("failed to build tensor: {e}"))?;

    Ok(PreprocessOutput {
        tensor,
        grayscale,
        resize,
        original_size,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Luma, Rgb, RgbImage};
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn gradient(width: u32, height: u32) -> DynamicImage {
        let img = ImageBuffer::from_fn(width, height, |x, y| {
            let v = ((x + y) % 256) as u8;
            Rgb([v, v / 2, 255 - v])
        });
        DynamicImage::ImageRgb8(img)
    }

    #[test]
    fn output_shape_is_fixed_for_any_resolution() {
        let config = PreprocessConfig::default();
        for (w, h) in [(32, 32), (1024, 768), (64, 64), (7, 300)] {
            let out = preprocess_dynamic_image(&gradient(w, h), &config).expect("preprocess");
            assert_eq!(out.tensor.shape(), &[1, 1, 64, 64], "{w}x{h}");
            assert_eq!(out.original_size, (w, h));
        }
    }

    #[test]
    fn values_stay_in_raw_pixel_range() {
        let out = preprocess_dynamic_image(&gradient(200, 150), &PreprocessConfig::default())
            .expect("preprocess");
        let data = out.tensor.as_slice::<f32>().unwrap();
        assert!(data.iter().all(|v| (0.0..=255.0).contains(v)));
        assert!(data.iter().any(|v| *v > 1.0));
    }

    #[test]
    fn unit_scaling_is_opt_in() {
        let img = DynamicImage::ImageLuma8(GrayImage::from_pixel(64, 64, Luma([255])));
        let config = PreprocessConfig {
            scale_to_unit: true,
            ..Default::default()
        };
        let out = preprocess_dynamic_image(&img, &config).expect("preprocess");
        let data = out.tensor.as_slice::<f32>().unwrap();
        assert!(data.iter().all(|v| (v - 1.0).abs() < 1e-6));
    }

    #[test]
    fn grayscale_matches_luma_weights() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(64, 64, Rgb([255, 0, 0])));
        let out = preprocess_dynamic_image(&img, &PreprocessConfig::default()).expect("preprocess");
        let data = out.tensor.as_slice::<f32>().unwrap();
        assert!(data.iter().all(|v| *v == 76.0));
    }

    #[test]
    fn custom_input_size_is_honoured() {
        let config = PreprocessConfig {
            input_size: InputSize::new(48, 40),
            ..Default::default()
        };
        let out = preprocess_dynamic_image(&gradient(100, 100), &config).expect("preprocess");
        assert_eq!(out.tensor.shape(), &[1, 1, 40, 48]);
    }

    #[test]
    fn missing_file_fails_to_decode() {
        let err = preprocess_image("definitely/missing.png", &PreprocessConfig::default())
            .expect_err("missing image");
        assert!(format!("{err}").contains("does not exist"));
    }

    #[test]
    fn corrupt_file_fails_to_decode() {
        let mut temp = NamedTempFile::with_suffix(".png").expect("temp file");
        temp.write_all(b"not an image at all").expect("write");
        assert!(decode_image(temp.path()).is_err());
    }

    #[test]
    fn converts_dimensions_into_configs() {
        let dims = InputDimensions {
            width: 32,
            height: 48,
            resize_filter: ResizeFilter::Nearest,
            scale_to_unit: true,
        };
        let size: InputSize = dims.into();
        assert_eq!(size, InputSize::new(32, 48));

        let config: PreprocessConfig = (&dims).into();
        assert_eq!(config.input_size, size);
        assert_eq!(config.resize_filter, ResizeFilter::Nearest);
        assert!(config.scale_to_unit);
    }
}
