use image::{DynamicImage, GrayImage, ImageFormat};
use imageproc::filter::gaussian_blur_f32;
use tracing::debug;

use crate::config::Config;
use crate::errors::{FootSizerError, Result};
use crate::image_io::decode_bytes;
use crate::image_utils::{capped_dimensions, resize_gray};

/// Parameters for turning a decoded photo into a working grayscale image
#[derive(Debug, Clone, PartialEq)]
pub struct PreprocessParams {
    pub max_dimension: u32,
    pub blur_sigma: f32,
    pub contrast: f32,
    pub brightness: i32,
}

impl PreprocessParams {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_dimension: config.max_dimension,
            blur_sigma: config.blur_sigma,
            contrast: config.contrast,
            brightness: config.brightness,
        }
    }
}

impl Default for PreprocessParams {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Grayscale working image plus the factor that maps its pixels back onto
/// the original photo (`original = processed * scale`).
#[derive(Debug, Clone)]
pub struct Preprocessed {
    pub gray: GrayImage,
    pub scale: f64,
    pub original_dimensions: (u32, u32),
}

/// Preprocess raw bytes with a declared (or sniffed) format
pub fn preprocess_bytes(
    bytes: &[u8],
    format: Option<ImageFormat>,
    params: &PreprocessParams,
) -> Result<Preprocessed> {
    let image = decode_bytes(bytes, format)?;
    preprocess_image(&image, params)
}

/// Grayscale, cap the size, blur, then stretch contrast so a bright sheet
/// separates from a darker floor.
pub fn preprocess_image(image: &DynamicImage, params: &PreprocessParams) -> Result<Preprocessed> {
    let (width, height) = (image.width(), image.height());
    if width == 0 || height == 0 {
        return Err(FootSizerError::Input("Image has no pixels".to_string()));
    }

    let gray = image.to_luma8();

    let (gray, scale) = match capped_dimensions(width, height, params.max_dimension) {
        Some(dimensions) => {
            let resized = resize_gray(&gray, dimensions);
            let scale = width as f64 / resized.width() as f64;
            debug!(
                from_width = width,
                from_height = height,
                to_width = resized.width(),
                to_height = resized.height(),
                scale,
                "Downscaled input"
            );
            (resized, scale)
        }
        None => (gray, 1.0),
    };

    let gray = if params.blur_sigma > 0.0 {
        gaussian_blur_f32(&gray, params.blur_sigma)
    } else {
        gray
    };

    let gray = adjust_contrast(&gray, params.contrast, params.brightness);

    Ok(Preprocessed {
        gray,
        scale,
        original_dimensions: (width, height),
    })
}

/// Contrast in percent (positive increases), brightness as an additive offset
pub fn adjust_contrast(image: &GrayImage, contrast: f32, brightness: i32) -> GrayImage {
    let adjusted = if contrast != 0.0 {
        image::imageops::contrast(image, contrast)
    } else {
        image.clone()
    };

    if brightness != 0 {
        image::imageops::brighten(&adjusted, brightness)
    } else {
        adjusted
    }
}
