use std::fmt;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Custom error types for FootSizer
#[derive(Error, Debug)]
pub enum FootSizerError {
    #[error("Input error: {0}")]
    Input(String),

    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid input path: {0}")]
    InvalidPath(PathBuf),

    #[error("No image processing backend available: {0}")]
    BackendUnavailable(String),

    #[error("Object detection failed: {0}")]
    ObjectDetection(String),

    #[error("Calculated foot size ({foot_size_cm} cm) is unrealistic (expected {min_cm}-{max_cm} cm). Please retake photo.")]
    ImplausibleResult {
        foot_size_cm: f64,
        min_cm: f64,
        max_cm: f64,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("CSV output error: {0}")]
    CsvOutput(#[from] csv::Error),

    #[error("Failed to write output '{}': {source}", .path.display())]
    Output {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Coarse classification of a failure, kept for diagnostics after the
/// caller has collapsed the error into a user-facing message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Input,
    BackendUnavailable,
    ObjectDetection,
    ImplausibleResult,
    Other,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Input => "InputError",
            ErrorKind::BackendUnavailable => "BackendUnavailableError",
            ErrorKind::ObjectDetection => "ObjectDetectionError",
            ErrorKind::ImplausibleResult => "ImplausibleResultError",
            ErrorKind::Other => "OtherError",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FootSizerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            FootSizerError::Input(_)
            | FootSizerError::Image(_)
            | FootSizerError::Io(_)
            | FootSizerError::InvalidPath(_) => ErrorKind::Input,
            FootSizerError::BackendUnavailable(_) => ErrorKind::BackendUnavailable,
            FootSizerError::ObjectDetection(_) => ErrorKind::ObjectDetection,
            FootSizerError::ImplausibleResult { .. } => ErrorKind::ImplausibleResult,
            FootSizerError::Config(_)
            | FootSizerError::CsvOutput(_)
            | FootSizerError::Output { .. } => ErrorKind::Other,
        }
    }

    /// Whether the engine may retry the same image with another backend.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::BackendUnavailable | ErrorKind::ObjectDetection | ErrorKind::ImplausibleResult
        )
    }
}

/// Type alias for Result with our custom error type
pub type Result<T> = std::result::Result<T, FootSizerError>;
