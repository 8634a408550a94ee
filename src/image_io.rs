use std::fs;
use std::path::{Path, PathBuf};
use image::{DynamicImage, ImageFormat, RgbaImage};

use crate::errors::{FootSizerError, Result};

/// Formats accepted from callers
pub const SUPPORTED_FORMATS: [ImageFormat; 3] = [ImageFormat::Jpeg, ImageFormat::Png, ImageFormat::WebP];

/// Represents an input image with its metadata
#[derive(Debug)]
pub struct InputImage {
    pub image: DynamicImage,
    pub path: PathBuf,
    pub filename: String,
}

/// Check whether a format is one we decode
pub fn is_supported_format(format: ImageFormat) -> bool {
    SUPPORTED_FORMATS.contains(&format)
}

/// Declared format of a path, taken from its extension
pub fn declared_format<P: AsRef<Path>>(path: P) -> Result<ImageFormat> {
    let path = path.as_ref();
    let format = ImageFormat::from_path(path).map_err(|_| {
        FootSizerError::Input(format!("Invalid image format: {}", path.display()))
    })?;

    if !is_supported_format(format) {
        return Err(FootSizerError::Input(format!(
            "Unsupported image format {:?}: {}", format, path.display()
        )));
    }

    Ok(format)
}

/// Get all supported image files from a directory (recursively)
pub fn get_image_files_in_dir<P: AsRef<Path>>(dir_path: P) -> Result<Vec<PathBuf>> {
    let dir_path = dir_path.as_ref();

    if !dir_path.exists() {
        return Err(FootSizerError::InvalidPath(dir_path.to_path_buf()));
    }

    if !dir_path.is_dir() {
        return Err(FootSizerError::Input(format!(
            "{} is not a directory", dir_path.display()
        )));
    }

    let mut image_files = Vec::new();
    find_image_files_recursive(dir_path, &mut image_files)?;

    // read_dir order is platform dependent
    image_files.sort();

    Ok(image_files)
}

fn find_image_files_recursive(dir_path: &Path, result: &mut Vec<PathBuf>) -> Result<()> {
    for entry in fs::read_dir(dir_path)? {
        let path = entry?.path();

        if path.is_dir() {
            find_image_files_recursive(&path, result)?;
        } else if path.is_file() && declared_format(&path).is_ok() {
            result.push(path);
        }
    }

    Ok(())
}

/// Decode an in-memory image. When no format is declared it is sniffed
/// from the magic bytes; either way it must be JPEG, PNG or WebP.
pub fn decode_bytes(bytes: &[u8], format: Option<ImageFormat>) -> Result<DynamicImage> {
    if bytes.is_empty() {
        return Err(FootSizerError::Input("Empty image buffer".to_string()));
    }

    let format = match format {
        Some(format) => format,
        None => image::guess_format(bytes)?,
    };

    if !is_supported_format(format) {
        return Err(FootSizerError::Input(format!(
            "Unsupported image format: {:?}", format
        )));
    }

    Ok(image::load_from_memory_with_format(bytes, format)?)
}

/// Load an image from disk, checking the declared format first
pub fn load_image<P: AsRef<Path>>(path: P) -> Result<InputImage> {
    let path = path.as_ref();

    if !path.is_file() {
        return Err(FootSizerError::InvalidPath(path.to_path_buf()));
    }

    let filename = path.file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| FootSizerError::InvalidPath(path.to_path_buf()))?
        .to_string();

    let format = declared_format(path)?;
    let bytes = fs::read(path)?;
    let image = decode_bytes(&bytes, Some(format))?;

    Ok(InputImage {
        image,
        path: path.to_path_buf(),
        filename,
    })
}

/// Save an RGBA image as PNG
pub fn save_image<P: AsRef<Path>>(image: &RgbaImage, path: P) -> Result<()> {
    image.save_with_format(path, ImageFormat::Png)?;
    Ok(())
}
