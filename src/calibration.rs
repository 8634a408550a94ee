use tracing::debug;

use crate::classify::Classification;
use crate::components::Region;
use crate::config::Config;
use crate::errors::{FootSizerError, Result};

/// Short edge of an A4 sheet
pub const A4_WIDTH_CM: f64 = 21.0;

#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationParams {
    pub reference_width_cm: f64,
    pub min_foot_size_cm: f64,
    pub max_foot_size_cm: f64,
}

impl CalibrationParams {
    pub fn from_config(config: &Config) -> Self {
        Self {
            reference_width_cm: config.reference_width_cm,
            min_foot_size_cm: config.min_foot_size_cm,
            max_foot_size_cm: config.max_foot_size_cm,
        }
    }
}

impl Default for CalibrationParams {
    fn default() -> Self {
        Self {
            reference_width_cm: A4_WIDTH_CM,
            min_foot_size_cm: 5.0,
            max_foot_size_cm: 50.0,
        }
    }
}

/// Pixels per centimeter in original-image units
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Calibration {
    pub pixels_per_cm: f64,
}

impl Calibration {
    /// The reference width always matches the sheet's shorter side, whatever
    /// its orientation. `scale` maps mask pixels to original pixels.
    pub fn from_sheet(sheet: &Region, scale: f64, reference_width_cm: f64) -> Result<Self> {
        let sheet_px = sheet.shorter_side() as f64 * scale;
        Self::from_pixel_width(sheet_px, reference_width_cm)
    }

    pub fn from_pixel_width(sheet_px: f64, reference_width_cm: f64) -> Result<Self> {
        if !(sheet_px > 0.0) || !(reference_width_cm > 0.0) {
            return Err(FootSizerError::ObjectDetection(format!(
                "Cannot calibrate from a {:.1}px wide sheet", sheet_px
            )));
        }
        Ok(Self { pixels_per_cm: sheet_px / reference_width_cm })
    }

    pub fn to_cm(&self, pixels: f64) -> f64 {
        pixels / self.pixels_per_cm
    }
}

/// One decimal place; exact ties go to the even digit
pub fn round_to_tenth(value: f64) -> f64 {
    (value * 10.0).round_ties_even() / 10.0
}

/// Reject lengths outside the inclusive plausibility range
pub fn check_plausible(foot_size_cm: f64, params: &CalibrationParams) -> Result<f64> {
    if foot_size_cm < params.min_foot_size_cm || foot_size_cm > params.max_foot_size_cm || foot_size_cm.is_nan() {
        return Err(FootSizerError::ImplausibleResult {
            foot_size_cm,
            min_cm: params.min_foot_size_cm,
            max_cm: params.max_foot_size_cm,
        });
    }
    Ok(foot_size_cm)
}

/// Calibrated foot length, before any engine bookkeeping
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FootLength {
    pub foot_size_cm: f64,
    pub pixels_per_cm: f64,
}

/// Convert the foot's longer side to centimeters using the sheet as scale
pub fn measure_foot(
    classification: &Classification,
    scale: f64,
    params: &CalibrationParams,
) -> Result<FootLength> {
    let calibration = Calibration::from_sheet(&classification.sheet, scale, params.reference_width_cm)?;
    let foot_px = classification.foot.longer_side() as f64 * scale;
    let foot_size_cm = round_to_tenth(calibration.to_cm(foot_px));

    debug!(
        sheet_px = classification.sheet.shorter_side() as f64 * scale,
        pixels_per_cm = calibration.pixels_per_cm,
        foot_px,
        foot_size_cm,
        "Foot measured"
    );

    let foot_size_cm = check_plausible(foot_size_cm, params)?;

    Ok(FootLength {
        foot_size_cm,
        pixels_per_cm: calibration.pixels_per_cm,
    })
}
