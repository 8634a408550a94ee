// src/lib.rs - Library interface for FootSizer

pub mod binarize;
pub mod calibration;
pub mod classify;
pub mod components;
pub mod config;
pub mod engine;
pub mod errors;
pub mod image_io;
pub mod image_utils;
pub mod output;
pub mod pipeline;
pub mod preprocess;

// Re-export commonly used types and functions
pub use errors::{ErrorKind, FootSizerError, Result};
pub use config::Config;
pub use engine::{Backend, Capabilities, Engine, MeasurementDetails, MeasurementResult};
pub use image_io::{InputImage, load_image, save_image};
pub use pipeline::{MeasurementRecord, process_image, process_path, process_paths};

// Re-export the measurement stages
pub use binarize::{BinaryMask, Binarized};
#[cfg(feature = "edge-backend")]
pub use binarize::edge_mask;
#[cfg(feature = "threshold-backend")]
pub use binarize::threshold_mask;
pub use calibration::{A4_WIDTH_CM, Calibration, measure_foot, round_to_tenth};
pub use classify::{Classification, ClassifierPolicy, ShapeParams, classify};
pub use components::{ExtractorParams, Region, extract_regions, find_regions, flood_fill};
pub use preprocess::{Preprocessed, PreprocessParams, preprocess_bytes, preprocess_image};

// Re-export output helpers
pub use output::{shoe_size, write_summary_csv};
