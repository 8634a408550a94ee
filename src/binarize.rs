use image::GrayImage;
use imageproc::contrast::stretch_contrast;
#[cfg(feature = "edge-backend")]
use imageproc::gradients::{horizontal_sobel, vertical_sobel};
use tracing::debug;

use crate::config::Config;
#[cfg(feature = "threshold-backend")]
use crate::image_utils::subsample;

/// Two-valued object/background grid. `true` marks an object pixel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryMask {
    width: u32,
    height: u32,
    data: Vec<bool>,
}

impl BinaryMask {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![false; width as usize * height as usize],
        }
    }

    pub fn from_fn<F>(width: u32, height: u32, mut f: F) -> Self
    where
        F: FnMut(u32, u32) -> bool,
    {
        let mut data = Vec::with_capacity(width as usize * height as usize);
        for y in 0..height {
            for x in 0..width {
                data.push(f(x, y));
            }
        }
        Self { width, height, data }
    }

    /// Parse rows of `#` (object) and `.` (background); handy for fixtures
    pub fn from_ascii(rows: &[&str]) -> Self {
        let height = rows.len() as u32;
        let width = rows.first().map_or(0, |row| row.len() as u32);
        Self::from_fn(width, height, |x, y| {
            rows[y as usize].as_bytes().get(x as usize) == Some(&b'#')
        })
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }

    #[inline]
    pub fn get(&self, x: u32, y: u32) -> bool {
        self.data[self.index(x, y)]
    }

    #[inline]
    pub fn set(&mut self, x: u32, y: u32, value: bool) {
        let idx = self.index(x, y);
        self.data[idx] = value;
    }

    /// Fill an inclusive rectangle, clipped to the mask
    pub fn fill_rect(&mut self, min_x: u32, min_y: u32, max_x: u32, max_y: u32, value: bool) {
        for y in min_y..=max_y.min(self.height.saturating_sub(1)) {
            for x in min_x..=max_x.min(self.width.saturating_sub(1)) {
                self.set(x, y, value);
            }
        }
    }

    pub fn count_set(&self) -> usize {
        self.data.iter().filter(|&&v| v).count()
    }
}

/// A mask together with the downsampling the binarizer applied to build it
#[derive(Debug, Clone)]
pub struct Binarized {
    pub mask: BinaryMask,
    pub local_factor: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EdgeParams {
    pub magnitude_threshold: f32,
}

impl EdgeParams {
    pub fn from_config(config: &Config) -> Self {
        Self {
            magnitude_threshold: config.edge_threshold,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdParams {
    pub offset: u32,
    pub floor: u32,
    pub samples_per_row: u32,
    pub downsample: u32,
}

impl ThresholdParams {
    pub fn from_config(config: &Config) -> Self {
        Self {
            offset: config.threshold_offset,
            floor: config.threshold_floor,
            samples_per_row: config.threshold_samples_per_row,
            downsample: config.threshold_downsample,
        }
    }
}

/// Stretch the intensity range to 0..=255 so gradient magnitudes are
/// comparable across exposures.
pub fn enhance_edges(image: &GrayImage) -> GrayImage {
    let (min, max) = image
        .pixels()
        .fold((u8::MAX, u8::MIN), |(lo, hi), p| (lo.min(p[0]), hi.max(p[0])));

    if min >= max {
        return image.clone();
    }

    stretch_contrast(image, min, max)
}

/// Sobel edge mask. Pixels without a full 3x3 neighbourhood stay background.
#[cfg(feature = "edge-backend")]
pub fn edge_mask(image: &GrayImage, params: &EdgeParams) -> Binarized {
    let enhanced = enhance_edges(image);
    let gx = horizontal_sobel(&enhanced);
    let gy = vertical_sobel(&enhanced);
    let (width, height) = enhanced.dimensions();

    let mask = BinaryMask::from_fn(width, height, |x, y| {
        if x == 0 || y == 0 || x + 1 >= width || y + 1 >= height {
            return false;
        }
        let dx = gx.get_pixel(x, y)[0] as f32;
        let dy = gy.get_pixel(x, y)[0] as f32;
        (dx * dx + dy * dy).sqrt() > params.magnitude_threshold
    });

    debug!(width, height, edge_pixels = mask.count_set(), "Edge mask built");

    Binarized { mask, local_factor: 1 }
}

/// Average brightness from a sparse grid of samples
pub fn sampled_mean(image: &GrayImage, samples_per_row: u32) -> f64 {
    let (width, height) = image.dimensions();
    let stride = (width / samples_per_row.max(1)).max(1);

    let mut total = 0u64;
    let mut count = 0u64;
    for y in (0..height).step_by(stride as usize) {
        for x in (0..width).step_by(stride as usize) {
            total += image.get_pixel(x, y)[0] as u64;
            count += 1;
        }
    }

    if count == 0 {
        0.0
    } else {
        total as f64 / count as f64
    }
}

/// Brightness cut-off for the threshold binarizer: `max(avg + offset, floor)`
pub fn brightness_threshold(image: &GrayImage, params: &ThresholdParams) -> f64 {
    let avg = sampled_mean(image, params.samples_per_row);
    (avg + params.offset as f64).max(params.floor as f64)
}

/// Adaptive brightness threshold on an optionally subsampled grid
#[cfg(feature = "threshold-backend")]
pub fn threshold_mask(image: &GrayImage, params: &ThresholdParams) -> Binarized {
    let factor = params.downsample.max(1);
    let grid = subsample(image, factor);
    let threshold = brightness_threshold(&grid, params);

    let mask = BinaryMask::from_fn(grid.width(), grid.height(), |x, y| {
        grid.get_pixel(x, y)[0] as f64 > threshold
    });

    debug!(
        width = grid.width(),
        height = grid.height(),
        threshold,
        object_pixels = mask.count_set(),
        "Threshold mask built"
    );

    Binarized { mask, local_factor: factor }
}
