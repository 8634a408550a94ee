use serde::Serialize;
use tracing::debug;

use crate::components::Region;
use crate::config::Config;
use crate::errors::{FootSizerError, Result};

/// How the sheet and the foot are told apart
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ClassifierPolicy {
    /// The two largest regions; the wider one is the sheet
    TwoLargest,
    /// A4 aspect ratio for the sheet, elongation and locality for the foot
    Shape,
}

/// Shape heuristics. Defaults are empirical, not derived.
#[derive(Debug, Clone, PartialEq)]
pub struct ShapeParams {
    pub top_k: usize,
    pub portrait_ratio: f64,
    pub portrait_tolerance: f64,
    pub landscape_ratio: f64,
    pub landscape_tolerance: f64,
    pub square_tolerance: f64,
    pub min_foot_elongation: f64,
    pub max_foot_area_ratio: f64,
    /// In mask pixels
    pub foot_margin: f64,
}

impl ShapeParams {
    /// `foot_margin_px` is given in preprocessed pixels
    pub fn from_config(config: &Config, local_factor: u32) -> Self {
        Self {
            top_k: config.classifier_top_k,
            portrait_ratio: config.portrait_ratio,
            portrait_tolerance: config.portrait_tolerance,
            landscape_ratio: config.landscape_ratio,
            landscape_tolerance: config.landscape_tolerance,
            square_tolerance: config.square_tolerance,
            min_foot_elongation: config.min_foot_elongation,
            max_foot_area_ratio: config.max_foot_area_ratio,
            foot_margin: config.foot_margin_px as f64 / local_factor.max(1) as f64,
        }
    }

    pub fn is_near_square(&self, region: &Region) -> bool {
        (region.aspect_ratio() - 1.0).abs() < self.square_tolerance
    }

    pub fn is_sheet_shaped(&self, region: &Region) -> bool {
        let ratio = region.aspect_ratio();
        let portrait = (ratio - self.portrait_ratio).abs() <= self.portrait_tolerance;
        let landscape = (ratio - self.landscape_ratio).abs() <= self.landscape_tolerance;
        (portrait || landscape) && !self.is_near_square(region)
    }

    pub fn is_foot_candidate(&self, region: &Region, sheet: &Region) -> bool {
        region.elongation() > self.min_foot_elongation
            && region.area as f64 <= self.max_foot_area_ratio * sheet.area as f64
            && sheet.contains_with_margin(region.center(), self.foot_margin)
    }
}

impl Default for ShapeParams {
    fn default() -> Self {
        Self::from_config(&Config::default(), 1)
    }
}

/// The two regions the measurement is built from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Classification {
    pub sheet: Region,
    pub foot: Region,
}

/// Largest first; the stable sort keeps discovery order among equal areas
pub fn sort_by_area(regions: &[Region]) -> Vec<Region> {
    let mut sorted = regions.to_vec();
    sorted.sort_by(|a, b| b.area.cmp(&a.area));
    sorted
}

pub fn classify(regions: &[Region], policy: ClassifierPolicy, params: &ShapeParams) -> Result<Classification> {
    let sorted = sort_by_area(regions);
    if sorted.len() < 2 {
        return Err(FootSizerError::ObjectDetection(format!(
            "Need a sheet and a foot, found {} region(s)",
            sorted.len()
        )));
    }

    let classification = match policy {
        ClassifierPolicy::TwoLargest => classify_two_largest(&sorted),
        ClassifierPolicy::Shape => classify_by_shape(&sorted, params),
    };

    debug!(
        ?policy,
        sheet_width = classification.sheet.width(),
        sheet_height = classification.sheet.height(),
        sheet_area = classification.sheet.area,
        foot_width = classification.foot.width(),
        foot_height = classification.foot.height(),
        foot_area = classification.foot.area,
        "Regions classified"
    );

    Ok(classification)
}

/// Expects at least two regions sorted by area
fn classify_two_largest(sorted: &[Region]) -> Classification {
    let (first, second) = (sorted[0], sorted[1]);
    if first.width() >= second.width() {
        Classification { sheet: first, foot: second }
    } else {
        Classification { sheet: second, foot: first }
    }
}

/// Expects at least two regions sorted by area
fn classify_by_shape(sorted: &[Region], params: &ShapeParams) -> Classification {
    let top = &sorted[..sorted.len().min(params.top_k.max(2))];

    let sheet_index = top
        .iter()
        .position(|r| params.is_sheet_shaped(r))
        .or_else(|| {
            debug!("No A4-shaped region, falling back to largest non-square region");
            top.iter().position(|r| !params.is_near_square(r))
        })
        .unwrap_or_else(|| {
            debug!("Only near-square regions, falling back to largest region");
            0
        });
    let sheet = top[sheet_index];

    let foot = top
        .iter()
        .enumerate()
        .find(|&(i, r)| i != sheet_index && params.is_foot_candidate(r, &sheet))
        .map(|(_, r)| *r)
        .unwrap_or_else(|| {
            debug!("No elongated region near the sheet, falling back to second-largest region");
            if sheet_index == 1 { sorted[0] } else { sorted[1] }
        });

    Classification { sheet, foot }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect(min_x: u32, min_y: u32, width: u32, height: u32) -> Region {
        Region {
            min_x,
            max_x: min_x + width - 1,
            min_y,
            max_y: min_y + height - 1,
            area: width * height,
        }
    }

    #[test]
    fn sorting_is_stable_for_equal_areas() {
        let a = rect(0, 0, 10, 10);
        let b = rect(50, 0, 20, 5);
        let c = rect(0, 50, 30, 30);
        let sorted = sort_by_area(&[a, b, c]);
        assert_eq!(sorted, vec![c, a, b]);
    }

    #[test]
    fn two_largest_picks_wider_as_sheet() {
        let foot = rect(0, 0, 100, 260);
        let sheet = rect(0, 300, 400, 60);
        let noise = rect(500, 500, 5, 5);
        let result = classify(&[foot, sheet, noise], ClassifierPolicy::TwoLargest, &ShapeParams::default()).unwrap();
        assert_eq!(result.sheet, sheet);
        assert_eq!(result.foot, foot);
    }

    #[test]
    fn shape_policy_finds_portrait_sheet_and_foot_inside() {
        let sheet = rect(0, 0, 400, 566);
        let foot = rect(150, 150, 100, 260);
        let shadow = rect(600, 0, 300, 300);
        let params = ShapeParams::default();
        assert!(params.is_sheet_shaped(&sheet));
        assert!(params.is_near_square(&shadow));

        let result = classify(&[shadow, foot, sheet], ClassifierPolicy::Shape, &params).unwrap();
        assert_eq!(result.sheet, sheet);
        assert_eq!(result.foot, foot);
    }

    #[test]
    fn shape_policy_skips_far_away_elongated_regions() {
        let sheet = rect(0, 0, 420, 297);
        // Larger than the foot, so it is considered first
        let far_pole = rect(1000, 0, 60, 400);
        let foot = rect(100, 20, 80, 250);
        let params = ShapeParams::default();

        let result = classify(&[sheet, far_pole, foot], ClassifierPolicy::Shape, &params).unwrap();
        assert_eq!(result.sheet, sheet);
        assert_eq!(result.foot, foot);
    }

    #[test]
    fn shape_policy_accepts_foot_within_margin() {
        let sheet = rect(0, 0, 400, 566);
        // Centre sits 40px right of the sheet edge
        let foot = rect(400, 100, 80, 250);
        let result = classify(&[sheet, foot], ClassifierPolicy::Shape, &ShapeParams::default()).unwrap();
        assert_eq!(result.foot, foot);
    }

    #[test]
    fn near_square_regions_fall_back_to_largest() {
        let big = rect(0, 0, 300, 290);
        let small = rect(400, 0, 100, 110);
        let params = ShapeParams::default();
        assert!(params.is_near_square(&big));
        assert!(params.is_near_square(&small));

        let result = classify(&[small, big], ClassifierPolicy::Shape, &params).unwrap();
        assert_eq!(result.sheet, big);
        assert_eq!(result.foot, small);
    }

    #[test]
    fn non_square_fallback_when_no_a4_ratio() {
        // Ratio 3.0 is neither portrait nor landscape A4
        let square = rect(0, 0, 300, 300);
        let strip = rect(0, 400, 450, 150);
        let params = ShapeParams::default();

        let result = classify(&[square, strip], ClassifierPolicy::Shape, &params).unwrap();
        assert_eq!(result.sheet, strip);
        assert_eq!(result.foot, square);
    }

    #[test]
    fn oversized_foot_candidate_is_rejected() {
        let sheet = rect(0, 0, 400, 566);
        // Elongated and central, but more than 80% of the sheet area
        let plank = rect(0, 0, 300, 700);
        let small = rect(10, 10, 20, 20);
        let params = ShapeParams::default();
        assert!(!params.is_foot_candidate(&plank, &sheet));

        let result = classify(&[plank, sheet, small], ClassifierPolicy::Shape, &params).unwrap();
        assert_eq!(result.sheet, sheet);
        // Fallback is the largest region that is not the sheet
        assert_eq!(result.foot, plank);
    }

    #[test]
    fn single_region_is_rejected() {
        let err = classify(&[rect(0, 0, 10, 10)], ClassifierPolicy::Shape, &ShapeParams::default()).unwrap_err();
        assert!(matches!(err, FootSizerError::ObjectDetection(_)));
    }

    #[test]
    fn margin_scales_with_local_factor() {
        let params = ShapeParams::from_config(&Config::default(), 2);
        assert_eq!(params.foot_margin, 25.0);
    }
}
