use serde::Serialize;
use tracing::{debug, warn};

use crate::binarize::BinaryMask;
use crate::config::Config;
use crate::errors::{FootSizerError, Result};
use crate::image_utils::in_bounds;

/// Bounding box and pixel count of one 4-connected set of object pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Region {
    pub min_x: u32,
    pub max_x: u32,
    pub min_y: u32,
    pub max_y: u32,
    pub area: u32,
}

impl Region {
    fn seed(x: u32, y: u32) -> Self {
        Self { min_x: x, max_x: x, min_y: y, max_y: y, area: 0 }
    }

    #[inline]
    fn include(&mut self, x: u32, y: u32) {
        self.min_x = self.min_x.min(x);
        self.max_x = self.max_x.max(x);
        self.min_y = self.min_y.min(y);
        self.max_y = self.max_y.max(y);
        self.area += 1;
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.max_x - self.min_x + 1
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.max_y - self.min_y + 1
    }

    pub fn shorter_side(&self) -> u32 {
        self.width().min(self.height())
    }

    pub fn longer_side(&self) -> u32 {
        self.width().max(self.height())
    }

    /// width / height
    pub fn aspect_ratio(&self) -> f64 {
        self.width() as f64 / self.height() as f64
    }

    /// longer side / shorter side, always >= 1
    pub fn elongation(&self) -> f64 {
        self.longer_side() as f64 / self.shorter_side() as f64
    }

    pub fn center(&self) -> (f64, f64) {
        (
            (self.min_x as f64 + self.max_x as f64) / 2.0,
            (self.min_y as f64 + self.max_y as f64) / 2.0,
        )
    }

    /// Whether a point lies in the box grown by `margin` on every side
    pub fn contains_with_margin(&self, point: (f64, f64), margin: f64) -> bool {
        let (x, y) = point;
        x >= self.min_x as f64 - margin
            && x <= self.max_x as f64 + margin
            && y >= self.min_y as f64 - margin
            && y <= self.max_y as f64 + margin
    }
}

/// Limits for region extraction, all in mask pixels
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractorParams {
    /// Regions must be strictly larger than this
    pub min_area: u32,
    pub max_fill_steps: usize,
    pub max_regions: usize,
}

impl ExtractorParams {
    /// `min_region_area` is given in preprocessed pixels; a mask subsampled
    /// by `local_factor` holds `local_factor²` fewer pixels per object.
    pub fn from_config(config: &Config, local_factor: u32) -> Self {
        let factor = local_factor.max(1);
        Self {
            min_area: (config.min_region_area / (factor * factor)).max(1),
            max_fill_steps: config.max_fill_steps,
            max_regions: config.max_regions,
        }
    }
}

/// Right, left, down, up
const NEIGHBOURS: [(i64, i64); 4] = [(1, 0), (-1, 0), (0, 1), (0, -1)];

/// Explicit-stack flood fill from `seed` over unvisited object pixels.
///
/// Pixels are marked in `visited` when pushed, so each is filled at most
/// once. The fill stops after `max_steps` pops and returns the bounds seen
/// so far; pixels still on the stack are unmarked again so they can seed
/// later fills. `on_fill` sees every pixel counted in the region.
pub fn flood_fill_with<F>(
    mask: &BinaryMask,
    visited: &mut [bool],
    seed: (u32, u32),
    max_steps: usize,
    mut on_fill: F,
) -> Region
where
    F: FnMut(u32, u32),
{
    let mut region = Region::seed(seed.0, seed.1);
    let mut stack = vec![seed];
    visited[mask.index(seed.0, seed.1)] = true;

    let mut steps = 0usize;
    while let Some((x, y)) = stack.pop() {
        if steps >= max_steps {
            stack.push((x, y));
            break;
        }
        steps += 1;

        region.include(x, y);
        on_fill(x, y);

        for (dx, dy) in NEIGHBOURS {
            let nx = x as i64 + dx;
            let ny = y as i64 + dy;
            if !in_bounds(nx, ny, mask.width(), mask.height()) {
                continue;
            }
            let (nx, ny) = (nx as u32, ny as u32);
            let idx = mask.index(nx, ny);
            if !visited[idx] && mask.get(nx, ny) {
                visited[idx] = true;
                stack.push((nx, ny));
            }
        }
    }

    if !stack.is_empty() {
        warn!(
            max_steps,
            pending = stack.len(),
            seed_x = seed.0,
            seed_y = seed.1,
            "Flood fill hit its step cap, returning partial bounds"
        );
        for (x, y) in stack {
            visited[mask.index(x, y)] = false;
        }
    }

    region
}

/// Flood fill without a per-pixel callback
pub fn flood_fill(
    mask: &BinaryMask,
    visited: &mut [bool],
    seed: (u32, u32),
    max_steps: usize,
) -> Region {
    flood_fill_with(mask, visited, seed, max_steps, |_, _| {})
}

/// All 4-connected regions larger than `min_area`, in raster discovery
/// order, stopping once `max_regions` have been found.
pub fn find_regions(mask: &BinaryMask, params: &ExtractorParams) -> Vec<Region> {
    let (width, height) = (mask.width(), mask.height());
    let mut visited = vec![false; width as usize * height as usize];
    let mut regions = Vec::new();
    let mut discarded = 0usize;

    'scan: for y in 0..height {
        for x in 0..width {
            let idx = mask.index(x, y);
            if visited[idx] || !mask.get(x, y) {
                continue;
            }

            let region = flood_fill(mask, &mut visited, (x, y), params.max_fill_steps);
            if region.area > params.min_area {
                regions.push(region);
                if regions.len() >= params.max_regions {
                    debug!(max_regions = params.max_regions, "Region cap reached");
                    break 'scan;
                }
            } else {
                discarded += 1;
            }
        }
    }

    debug!(found = regions.len(), discarded, min_area = params.min_area, "Regions extracted");
    regions
}

/// Like `find_regions`, but at least a sheet and a foot must survive
pub fn extract_regions(mask: &BinaryMask, params: &ExtractorParams) -> Result<Vec<Region>> {
    let regions = find_regions(mask, params);
    if regions.len() < 2 {
        return Err(FootSizerError::ObjectDetection(format!(
            "Not enough objects detected in image ({} found). Ensure foot is on A4 paper.",
            regions.len()
        )));
    }
    Ok(regions)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(min_area: u32) -> ExtractorParams {
        ExtractorParams { min_area, max_fill_steps: 500_000, max_regions: 30 }
    }

    #[test]
    fn region_geometry() {
        let region = Region { min_x: 10, max_x: 109, min_y: 20, max_y: 279, area: 26_000 };
        assert_eq!(region.width(), 100);
        assert_eq!(region.height(), 260);
        assert_eq!(region.shorter_side(), 100);
        assert_eq!(region.longer_side(), 260);
        assert!((region.elongation() - 2.6).abs() < 1e-9);
        assert_eq!(region.center(), (59.5, 149.5));
        assert!(region.contains_with_margin((5.0, 300.0), 50.0));
        assert!(!region.contains_with_margin((200.0, 100.0), 50.0));
    }

    #[test]
    fn finds_separate_blobs_in_raster_order() {
        let mask = BinaryMask::from_ascii(&[
            "##....",
            "##..##",
            "....##",
            "#.....",
        ]);
        let regions = find_regions(&mask, &params(0));
        assert_eq!(regions.len(), 3);
        assert_eq!(regions[0], Region { min_x: 0, max_x: 1, min_y: 0, max_y: 1, area: 4 });
        assert_eq!(regions[1], Region { min_x: 4, max_x: 5, min_y: 1, max_y: 2, area: 4 });
        assert_eq!(regions[2], Region { min_x: 0, max_x: 0, min_y: 3, max_y: 3, area: 1 });
    }

    #[test]
    fn diagonal_pixels_are_not_connected() {
        let mask = BinaryMask::from_ascii(&["#.", ".#"]);
        assert_eq!(find_regions(&mask, &params(0)).len(), 2);
    }

    #[test]
    fn concave_shape_is_one_region() {
        let mask = BinaryMask::from_ascii(&[
            "#...#",
            "#...#",
            "#####",
        ]);
        let regions = find_regions(&mask, &params(0));
        assert_eq!(regions, vec![Region { min_x: 0, max_x: 4, min_y: 0, max_y: 2, area: 9 }]);
    }

    #[test]
    fn area_filter_is_strict() {
        let mask = BinaryMask::from_ascii(&["##..#", "##..#"]);
        let regions = find_regions(&mask, &params(2));
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].area, 4);

        assert!(find_regions(&mask, &params(4)).is_empty());
    }

    #[test]
    fn region_cap_stops_discovery() {
        let mask = BinaryMask::from_ascii(&["#.#.#.#.#"]);
        let capped = ExtractorParams { min_area: 0, max_fill_steps: 100, max_regions: 3 };
        let regions = find_regions(&mask, &capped);
        assert_eq!(regions.len(), 3);
        assert_eq!(regions[2].min_x, 4);
    }

    #[test]
    fn capped_fill_returns_partial_bounds() {
        let mask = BinaryMask::from_ascii(&["##########"]);
        let mut visited = vec![false; 10];
        let region = flood_fill(&mask, &mut visited, (0, 0), 4);
        assert_eq!(region.area, 4);
        assert_eq!((region.min_x, region.max_x), (0, 3));
        // Nothing beyond the partial fill stays marked
        assert_eq!(visited.iter().filter(|&&v| v).count(), 4);
    }

    #[test]
    fn capped_fill_leftovers_become_new_regions() {
        let mask = BinaryMask::from_ascii(&["##########"]);
        let capped = ExtractorParams { min_area: 0, max_fill_steps: 4, max_regions: 30 };
        let regions = find_regions(&mask, &capped);
        let total: u32 = regions.iter().map(|r| r.area).sum();
        assert_eq!(total, 10);
        assert_eq!(regions.len(), 3);
    }

    #[test]
    fn single_region_is_a_detection_error() {
        let mut mask = BinaryMask::new(60, 60);
        mask.fill_rect(5, 5, 50, 50, true);
        let err = extract_regions(&mask, &params(100)).unwrap_err();
        assert!(matches!(err, FootSizerError::ObjectDetection(_)));
    }

    #[test]
    fn min_area_scales_with_local_factor() {
        let config = Config::default();
        assert_eq!(ExtractorParams::from_config(&config, 1).min_area, 1000);
        assert_eq!(ExtractorParams::from_config(&config, 2).min_area, 250);
    }
}
