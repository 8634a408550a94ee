use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::errors::{FootSizerError, Result};

/// Configuration for FootSizer
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Config {
    #[serde(default = "default_input_path")]
    pub input_path: String,
    #[serde(default = "default_output_base_dir")]
    pub output_base_dir: String,
    #[serde(default = "default_parallel")]
    pub use_parallel: bool,

    // Calibration
    #[serde(default = "default_reference_width_cm")]
    pub reference_width_cm: f64,
    #[serde(default = "default_min_foot_size_cm")]
    pub min_foot_size_cm: f64,
    #[serde(default = "default_max_foot_size_cm")]
    pub max_foot_size_cm: f64,

    // Preprocessing
    #[serde(default = "default_max_dimension")]
    pub max_dimension: u32,
    #[serde(default = "default_blur_sigma")]
    pub blur_sigma: f32,
    #[serde(default = "default_contrast")]
    pub contrast: f32,
    #[serde(default = "default_brightness")]
    pub brightness: i32,

    // Edge binarizer
    #[serde(default = "default_edge_threshold")]
    pub edge_threshold: f32,

    // Threshold binarizer
    #[serde(default = "default_threshold_offset")]
    pub threshold_offset: u32,
    #[serde(default = "default_threshold_floor")]
    pub threshold_floor: u32,
    #[serde(default = "default_threshold_samples_per_row")]
    pub threshold_samples_per_row: u32,
    #[serde(default = "default_threshold_downsample")]
    pub threshold_downsample: u32,

    // Connected components
    #[serde(default = "default_min_region_area")]
    pub min_region_area: u32,
    #[serde(default = "default_max_fill_steps")]
    pub max_fill_steps: usize,
    #[serde(default = "default_max_regions")]
    pub max_regions: usize,

    // Shape classifier
    #[serde(default = "default_classifier_top_k")]
    pub classifier_top_k: usize,
    #[serde(default = "default_portrait_ratio")]
    pub portrait_ratio: f64,
    #[serde(default = "default_portrait_tolerance")]
    pub portrait_tolerance: f64,
    #[serde(default = "default_landscape_ratio")]
    pub landscape_ratio: f64,
    #[serde(default = "default_landscape_tolerance")]
    pub landscape_tolerance: f64,
    #[serde(default = "default_square_tolerance")]
    pub square_tolerance: f64,
    #[serde(default = "default_min_foot_elongation")]
    pub min_foot_elongation: f64,
    #[serde(default = "default_max_foot_area_ratio")]
    pub max_foot_area_ratio: f64,
    #[serde(default = "default_foot_margin_px")]
    pub foot_margin_px: u32,

    // Backend switches, intersected with what the build provides
    #[serde(default = "default_enable_backend")]
    pub enable_threshold_backend: bool,
    #[serde(default = "default_enable_backend")]
    pub enable_edge_backend: bool,
}

fn default_input_path() -> String {
    "./input".to_string()
}

fn default_output_base_dir() -> String {
    "./output".to_string()
}

fn default_parallel() -> bool {
    true
}

fn default_reference_width_cm() -> f64 {
    21.0 // A4 short edge
}

fn default_min_foot_size_cm() -> f64 {
    5.0
}

fn default_max_foot_size_cm() -> f64 {
    50.0
}

fn default_max_dimension() -> u32 {
    800
}

fn default_blur_sigma() -> f32 {
    1.0
}

fn default_contrast() -> f32 {
    20.0
}

fn default_brightness() -> i32 {
    0
}

fn default_edge_threshold() -> f32 {
    100.0
}

fn default_threshold_offset() -> u32 {
    35
}

fn default_threshold_floor() -> u32 {
    120
}

fn default_threshold_samples_per_row() -> u32 {
    40
}

fn default_threshold_downsample() -> u32 {
    2
}

fn default_min_region_area() -> u32 {
    1000
}

fn default_max_fill_steps() -> usize {
    500_000
}

fn default_max_regions() -> usize {
    30
}

fn default_classifier_top_k() -> usize {
    10
}

fn default_portrait_ratio() -> f64 {
    0.707 // 21.0 / 29.7
}

fn default_portrait_tolerance() -> f64 {
    0.15
}

fn default_landscape_ratio() -> f64 {
    1.414 // 29.7 / 21.0
}

fn default_landscape_tolerance() -> f64 {
    0.25
}

fn default_square_tolerance() -> f64 {
    0.2
}

fn default_min_foot_elongation() -> f64 {
    2.0
}

fn default_max_foot_area_ratio() -> f64 {
    0.8
}

fn default_foot_margin_px() -> u32 {
    50
}

fn default_enable_backend() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            input_path: default_input_path(),
            output_base_dir: default_output_base_dir(),
            use_parallel: default_parallel(),
            reference_width_cm: default_reference_width_cm(),
            min_foot_size_cm: default_min_foot_size_cm(),
            max_foot_size_cm: default_max_foot_size_cm(),
            max_dimension: default_max_dimension(),
            blur_sigma: default_blur_sigma(),
            contrast: default_contrast(),
            brightness: default_brightness(),
            edge_threshold: default_edge_threshold(),
            threshold_offset: default_threshold_offset(),
            threshold_floor: default_threshold_floor(),
            threshold_samples_per_row: default_threshold_samples_per_row(),
            threshold_downsample: default_threshold_downsample(),
            min_region_area: default_min_region_area(),
            max_fill_steps: default_max_fill_steps(),
            max_regions: default_max_regions(),
            classifier_top_k: default_classifier_top_k(),
            portrait_ratio: default_portrait_ratio(),
            portrait_tolerance: default_portrait_tolerance(),
            landscape_ratio: default_landscape_ratio(),
            landscape_tolerance: default_landscape_tolerance(),
            square_tolerance: default_square_tolerance(),
            min_foot_elongation: default_min_foot_elongation(),
            max_foot_area_ratio: default_max_foot_area_ratio(),
            foot_margin_px: default_foot_margin_px(),
            enable_threshold_backend: default_enable_backend(),
            enable_edge_backend: default_enable_backend(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            FootSizerError::Config(format!("Failed to read config file '{}': {}", path.display(), e))
        })?;

        Self::from_toml_str(&content).map_err(|e| match e {
            FootSizerError::Config(msg) => {
                FootSizerError::Config(format!("Failed to parse config file '{}': {}", path.display(), msg))
            }
            other => other,
        })
    }

    /// Parse configuration from TOML text; missing keys take their defaults
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| FootSizerError::Config(e.to_string()))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if !(self.reference_width_cm > 0.0) {
            return Err(FootSizerError::Config(
                "reference_width_cm must be > 0.0".to_string(),
            ));
        }

        if self.min_foot_size_cm < 0.0 || self.min_foot_size_cm >= self.max_foot_size_cm {
            return Err(FootSizerError::Config(
                "min_foot_size_cm must be >= 0.0 and < max_foot_size_cm".to_string(),
            ));
        }

        if self.max_dimension < 16 {
            return Err(FootSizerError::Config(
                "max_dimension must be >= 16".to_string(),
            ));
        }

        if self.blur_sigma < 0.0 {
            return Err(FootSizerError::Config(
                "blur_sigma must be >= 0.0".to_string(),
            ));
        }

        if self.edge_threshold <= 0.0 {
            return Err(FootSizerError::Config(
                "edge_threshold must be > 0.0".to_string(),
            ));
        }

        if self.threshold_floor > 255 {
            return Err(FootSizerError::Config(
                "threshold_floor must be <= 255".to_string(),
            ));
        }

        if self.threshold_samples_per_row == 0 {
            return Err(FootSizerError::Config(
                "threshold_samples_per_row must be > 0".to_string(),
            ));
        }

        if self.threshold_downsample == 0 || self.threshold_downsample > 8 {
            return Err(FootSizerError::Config(
                "threshold_downsample must be between 1 and 8".to_string(),
            ));
        }

        if self.max_fill_steps == 0 {
            return Err(FootSizerError::Config(
                "max_fill_steps must be > 0".to_string(),
            ));
        }

        if self.max_regions < 2 {
            return Err(FootSizerError::Config(
                "max_regions must be >= 2".to_string(),
            ));
        }

        if self.classifier_top_k < 2 {
            return Err(FootSizerError::Config(
                "classifier_top_k must be >= 2".to_string(),
            ));
        }

        for (name, value) in [
            ("portrait_ratio", self.portrait_ratio),
            ("landscape_ratio", self.landscape_ratio),
            ("portrait_tolerance", self.portrait_tolerance),
            ("landscape_tolerance", self.landscape_tolerance),
        ] {
            if !(value > 0.0) {
                return Err(FootSizerError::Config(format!("{} must be > 0.0", name)));
            }
        }

        if self.square_tolerance < 0.0 || self.square_tolerance >= 1.0 {
            return Err(FootSizerError::Config(
                "square_tolerance must be between 0.0 and 1.0".to_string(),
            ));
        }

        if self.min_foot_elongation < 1.0 {
            return Err(FootSizerError::Config(
                "min_foot_elongation must be >= 1.0".to_string(),
            ));
        }

        if self.max_foot_area_ratio <= 0.0 || self.max_foot_area_ratio > 1.0 {
            return Err(FootSizerError::Config(
                "max_foot_area_ratio must be between 0.0 and 1.0".to_string(),
            ));
        }

        Ok(())
    }
}
