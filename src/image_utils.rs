use image::{GrayImage, Luma, Rgba, RgbaImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;

use crate::binarize::BinaryMask;
use crate::components::Region;

/// Overlay colours for debug images
pub const SHEET_COLOR: [u8; 3] = [0, 200, 0];
pub const FOOT_COLOR: [u8; 3] = [255, 0, 0];

/// Resize a grayscale image to the specified dimensions
pub fn resize_gray(image: &GrayImage, dimensions: [u32; 2]) -> GrayImage {
    let (width, height) = (dimensions[0], dimensions[1]);
    image::imageops::resize(
        image,
        width,
        height,
        image::imageops::FilterType::Triangle,
    )
}

/// Dimensions that fit within `max_dimension` on both axes, keeping the
/// aspect ratio. `None` when the image already fits.
pub fn capped_dimensions(width: u32, height: u32, max_dimension: u32) -> Option<[u32; 2]> {
    let longest = width.max(height);
    if longest <= max_dimension || max_dimension == 0 {
        return None;
    }

    let ratio = max_dimension as f64 / longest as f64;
    let new_width = ((width as f64 * ratio).round() as u32).max(1);
    let new_height = ((height as f64 * ratio).round() as u32).max(1);
    Some([new_width, new_height])
}

/// Keep every `factor`-th pixel on both axes
pub fn subsample(image: &GrayImage, factor: u32) -> GrayImage {
    if factor <= 1 {
        return image.clone();
    }

    let (width, height) = image.dimensions();
    let new_width = (width / factor).max(1);
    let new_height = (height / factor).max(1);
    GrayImage::from_fn(new_width, new_height, |x, y| {
        *image.get_pixel(x * factor, y * factor)
    })
}

/// Check if a point is inside the image bounds
#[inline]
pub fn in_bounds(x: i64, y: i64, width: u32, height: u32) -> bool {
    x >= 0 && y >= 0 && (x as u64) < width as u64 && (y as u64) < height as u64
}

/// Render a mask as a black/white image
pub fn mask_to_image(mask: &BinaryMask) -> GrayImage {
    GrayImage::from_fn(mask.width(), mask.height(), |x, y| {
        if mask.get(x, y) { Luma([255]) } else { Luma([0]) }
    })
}

/// Draw a region's bounding box onto an RGBA image. Regions are in mask
/// coordinates, `scale` maps them onto the image.
pub fn draw_region(image: &mut RgbaImage, region: &Region, scale: f64, color: [u8; 3]) {
    let x = (region.min_x as f64 * scale).round() as i32;
    let y = (region.min_y as f64 * scale).round() as i32;
    let width = ((region.width() as f64 * scale).round() as u32).max(1);
    let height = ((region.height() as f64 * scale).round() as u32).max(1);

    // Three pixel wide outline so it survives viewer downscaling
    for inset in 0..3u32 {
        if width <= 2 * inset || height <= 2 * inset {
            break;
        }
        let rect = Rect::at(x + inset as i32, y + inset as i32)
            .of_size(width - 2 * inset, height - 2 * inset);
        draw_hollow_rect_mut(image, rect, Rgba([color[0], color[1], color[2], 255]));
    }
}

/// Create a debug image with the sheet and foot boxes marked
pub fn create_debug_image(
    image: &RgbaImage,
    sheet: &Region,
    foot: &Region,
    scale: f64,
) -> RgbaImage {
    let mut debug_image = image.clone();
    draw_region(&mut debug_image, sheet, scale, SHEET_COLOR);
    draw_region(&mut debug_image, foot, scale, FOOT_COLOR);
    debug_image
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capped_dimensions_keep_aspect_ratio() {
        assert_eq!(capped_dimensions(1600, 1200, 800), Some([800, 600]));
        assert_eq!(capped_dimensions(1000, 3000, 800), Some([267, 800]));
        assert_eq!(capped_dimensions(800, 600, 800), None);
    }

    #[test]
    fn subsample_takes_every_other_pixel() {
        let img = GrayImage::from_fn(4, 4, |x, y| Luma([(y * 4 + x) as u8]));
        let small = subsample(&img, 2);
        assert_eq!(small.dimensions(), (2, 2));
        assert_eq!(small.get_pixel(1, 1)[0], 10);
    }

    #[test]
    fn in_bounds_rejects_negatives() {
        assert!(in_bounds(0, 0, 1, 1));
        assert!(!in_bounds(-1, 0, 1, 1));
        assert!(!in_bounds(1, 0, 1, 1));
    }

    #[test]
    fn debug_image_marks_boxes() {
        let base = RgbaImage::from_pixel(40, 40, Rgba([0, 0, 0, 255]));
        let sheet = Region { min_x: 2, max_x: 30, min_y: 2, max_y: 30, area: 100 };
        let foot = Region { min_x: 10, max_x: 15, min_y: 8, max_y: 25, area: 50 };
        let out = create_debug_image(&base, &sheet, &foot, 1.0);
        assert_eq!(out.get_pixel(2, 2), &Rgba([0, 200, 0, 255]));
        assert_eq!(out.get_pixel(10, 8), &Rgba([255, 0, 0, 255]));
        assert_eq!(out.get_pixel(20, 20), &Rgba([0, 0, 0, 255]));
    }
}
