use std::path::{Path, PathBuf};

use rayon::prelude::*;
use tracing::{error, info};

use crate::engine::{Engine, MeasurementResult};
use crate::errors::{FootSizerError, Result};
use crate::image_io::{load_image, save_image, InputImage};
use crate::image_utils::{create_debug_image, mask_to_image};

/// Outcome of measuring one file
#[derive(Debug)]
pub struct MeasurementRecord {
    pub filename: String,
    pub path: PathBuf,
    pub outcome: Result<MeasurementResult>,
}

/// Measure one decoded image. With `debug_dir` set, the binary mask and
/// an overlay of the chosen sheet and foot boxes are saved there.
pub fn process_image(
    input_image: InputImage,
    engine: &Engine,
    debug_dir: Option<&Path>,
) -> MeasurementRecord {
    let InputImage { image, path, filename } = input_image;

    let outcome = engine.measure_image_detailed(&image).and_then(|details| {
        if let Some(debug_dir) = debug_dir {
            std::fs::create_dir_all(debug_dir).map_err(|source| FootSizerError::Output {
                path: debug_dir.to_path_buf(),
                source,
            })?;

            let mask_path = debug_dir.join(format!("{}_{}_mask.png", filename, details.result.backend));
            mask_to_image(&details.binarized.mask)
                .save_with_format(&mask_path, image::ImageFormat::Png)
                .map_err(|e| debug_output_error(&mask_path, e))?;

            // Boxes are in mask pixels, the overlay is drawn on the original
            let overlay = create_debug_image(
                &image.to_rgba8(),
                &details.classification.sheet,
                &details.classification.foot,
                details.scale,
            );
            let overlay_path = debug_dir.join(format!("{}_overlay.png", filename));
            save_image(&overlay, &overlay_path).map_err(|e| debug_output_error(&overlay_path, e))?;
        }
        Ok(details.result)
    });

    match &outcome {
        Ok(result) => info!(file = %filename, foot_size_cm = result.foot_size_cm, backend = %result.backend, "Processed"),
        Err(err) => error!(file = %filename, kind = %err.kind(), error = %err, "Processing failed"),
    }

    MeasurementRecord { filename, path, outcome }
}

fn debug_output_error<E: std::fmt::Display>(path: &Path, err: E) -> FootSizerError {
    FootSizerError::Output {
        path: path.to_path_buf(),
        source: std::io::Error::new(std::io::ErrorKind::Other, err.to_string()),
    }
}

/// Load and measure one file; load failures become failed records
pub fn process_path(path: &Path, engine: &Engine, debug_dir: Option<&Path>) -> MeasurementRecord {
    match load_image(path) {
        Ok(input_image) => process_image(input_image, engine, debug_dir),
        Err(err) => {
            error!(path = %path.display(), kind = %err.kind(), error = %err, "Could not load image");
            MeasurementRecord {
                filename: path
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .unwrap_or_default()
                    .to_string(),
                path: path.to_path_buf(),
                outcome: Err(err),
            }
        }
    }
}

/// Measure a batch of files, in parallel when `parallel` is set. Records
/// come back in input order.
pub fn process_paths(
    paths: &[PathBuf],
    engine: &Engine,
    debug_dir: Option<&Path>,
    parallel: bool,
) -> Vec<MeasurementRecord> {
    if parallel {
        paths
            .par_iter()
            .map(|path| process_path(path, engine, debug_dir))
            .collect()
    } else {
        paths
            .iter()
            .map(|path| process_path(path, engine, debug_dir))
            .collect()
    }
}
