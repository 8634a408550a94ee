use std::fs;
use std::path::{Path, PathBuf};
use csv::Writer;

use crate::errors::{FootSizerError, Result};
use crate::pipeline::MeasurementRecord;

/// Name of the batch summary written into the output directory
pub const SUMMARY_FILENAME: &str = "foot_sizes.csv";

/// Nigerian shoe size for a foot length, as used by the sizing programme
pub fn shoe_size(foot_size_cm: f64) -> u32 {
    (foot_size_cm * 1.5 + 1.5).round() as u32
}

/// Write one row per processed image
pub fn write_summary_csv<P: AsRef<Path>>(records: &[MeasurementRecord], output_dir: P) -> Result<PathBuf> {
    let output_path = output_dir.as_ref().join(SUMMARY_FILENAME);

    if let Some(parent) = output_path.parent() {
        fs::create_dir_all(parent).map_err(|source| FootSizerError::Output {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    let mut writer = Writer::from_path(&output_path)?;

    writer.write_record([
        "Filename",
        "Foot_Size_cm",
        "Shoe_Size",
        "Backend",
        "Pixels_Per_cm",
        "Error_Kind",
        "Error",
    ])?;

    for record in records {
        let row = match &record.outcome {
            Ok(result) => [
                record.filename.clone(),
                format!("{:.1}", result.foot_size_cm),
                shoe_size(result.foot_size_cm).to_string(),
                result.backend.to_string(),
                format!("{:.4}", result.pixels_per_cm),
                String::new(),
                String::new(),
            ],
            Err(err) => [
                record.filename.clone(),
                String::new(),
                String::new(),
                String::new(),
                String::new(),
                err.kind().to_string(),
                err.to_string(),
            ],
        };
        writer.write_record(&row)?;
    }

    writer.flush().map_err(|e| FootSizerError::CsvOutput(csv::Error::from(e)))?;

    Ok(output_path)
}
