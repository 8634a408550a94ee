use std::fmt;
use std::path::Path;
use std::sync::OnceLock;

use image::{DynamicImage, ImageFormat};
use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::binarize::Binarized;
#[cfg(feature = "edge-backend")]
use crate::binarize::{edge_mask, EdgeParams};
#[cfg(feature = "threshold-backend")]
use crate::binarize::{threshold_mask, ThresholdParams};
use crate::calibration::{measure_foot, CalibrationParams};
use crate::classify::{classify, Classification, ClassifierPolicy, ShapeParams};
use crate::components::{extract_regions, ExtractorParams};
use crate::config::Config;
use crate::errors::{FootSizerError, Result};
use crate::image_io::{decode_bytes, load_image};
use crate::preprocess::{preprocess_image, Preprocessed, PreprocessParams};

/// A binarization strategy paired with its classifier policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Adaptive brightness threshold + shape classifier (high quality)
    Threshold,
    /// Sobel edges + two-largest classifier (simple)
    Edge,
}

impl Backend {
    /// Tried in this order
    pub const PREFERENCE: [Backend; 2] = [Backend::Threshold, Backend::Edge];

    pub fn policy(&self) -> ClassifierPolicy {
        match self {
            Backend::Threshold => ClassifierPolicy::Shape,
            Backend::Edge => ClassifierPolicy::TwoLargest,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Backend::Threshold => "threshold",
            Backend::Edge => "edge",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which backends this process can run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub threshold: bool,
    pub edge: bool,
}

static DETECTED: OnceLock<Capabilities> = OnceLock::new();

impl Capabilities {
    /// Backends compiled into this build, queried once per process
    pub fn detect() -> Self {
        *DETECTED.get_or_init(|| {
            let detected = Capabilities {
                threshold: cfg!(feature = "threshold-backend"),
                edge: cfg!(feature = "edge-backend"),
            };
            info!(threshold = detected.threshold, edge = detected.edge, "Backend capabilities detected");
            detected
        })
    }

    pub fn none() -> Self {
        Self { threshold: false, edge: false }
    }

    pub fn supports(&self, backend: Backend) -> bool {
        match backend {
            Backend::Threshold => self.threshold,
            Backend::Edge => self.edge,
        }
    }

    /// Drop backends the configuration switched off
    pub fn restrict(self, config: &Config) -> Self {
        Self {
            threshold: self.threshold && config.enable_threshold_backend,
            edge: self.edge && config.enable_edge_backend,
        }
    }

    pub fn only(backend: Backend) -> Self {
        Self {
            threshold: backend == Backend::Threshold,
            edge: backend == Backend::Edge,
        }
    }
}

/// Foot length returned to callers
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MeasurementResult {
    pub foot_size_cm: f64,
    pub backend: Backend,
    pub pixels_per_cm: f64,
}

/// A measurement plus the intermediates that produced it
#[derive(Debug, Clone)]
pub struct MeasurementDetails {
    pub result: MeasurementResult,
    pub binarized: Binarized,
    pub classification: Classification,
    /// Mask pixels to original-image pixels
    pub scale: f64,
}

/// Measures feet, trying the high-quality backend before the simple one.
/// Holds only read-only configuration, so one engine can serve many threads.
#[derive(Debug, Clone)]
pub struct Engine {
    config: Config,
    capabilities: Capabilities,
}

impl Engine {
    pub fn new(config: Config) -> Result<Self> {
        let capabilities = Capabilities::detect().restrict(&config);
        Self::with_capabilities(config, capabilities)
    }

    pub fn with_capabilities(config: Config, capabilities: Capabilities) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, capabilities })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    /// Measure an image file
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn measure_path<P: AsRef<Path>>(&self, path: P) -> Result<MeasurementResult> {
        let input = load_image(path)?;
        self.measure_image(&input.image)
    }

    /// Measure an encoded image; the format is sniffed when not declared
    #[instrument(skip(self, bytes), fields(len = bytes.len()))]
    pub fn measure_bytes(&self, bytes: &[u8], format: Option<ImageFormat>) -> Result<MeasurementResult> {
        let image = decode_bytes(bytes, format)?;
        self.measure_image(&image)
    }

    pub fn measure_image(&self, image: &DynamicImage) -> Result<MeasurementResult> {
        self.measure_image_detailed(image).map(|details| details.result)
    }

    #[instrument(skip_all, fields(width = image.width(), height = image.height()))]
    pub fn measure_image_detailed(&self, image: &DynamicImage) -> Result<MeasurementDetails> {
        let preprocessed = preprocess_image(image, &PreprocessParams::from_config(&self.config))?;
        self.measure_preprocessed(&preprocessed)
    }

    /// Run the available backends in preference order. Recoverable
    /// failures move on to the next backend; the last failure is returned.
    pub fn measure_preprocessed(&self, preprocessed: &Preprocessed) -> Result<MeasurementDetails> {
        let mut last_error = None;

        for backend in Backend::PREFERENCE {
            if !self.capabilities.supports(backend) {
                continue;
            }

            match self.run_backend(backend, preprocessed) {
                Ok(details) => {
                    info!(
                        %backend,
                        foot_size_cm = details.result.foot_size_cm,
                        pixels_per_cm = details.result.pixels_per_cm,
                        "Foot measured"
                    );
                    return Ok(details);
                }
                Err(err) if err.is_recoverable() => {
                    warn!(%backend, kind = %err.kind(), error = %err, "Backend failed, trying next");
                    last_error = Some(err);
                }
                Err(err) => return Err(err),
            }
        }

        Err(last_error.unwrap_or_else(|| {
            FootSizerError::BackendUnavailable(
                "Neither the threshold nor the edge backend is enabled".to_string(),
            )
        }))
    }

    /// Binarize, extract, classify and calibrate with one backend
    pub fn run_backend(&self, backend: Backend, preprocessed: &Preprocessed) -> Result<MeasurementDetails> {
        if !self.capabilities.supports(backend) {
            return Err(FootSizerError::BackendUnavailable(format!(
                "The {} backend is not available", backend
            )));
        }

        let binarized: Binarized = match backend {
            #[cfg(feature = "threshold-backend")]
            Backend::Threshold => threshold_mask(&preprocessed.gray, &ThresholdParams::from_config(&self.config)),
            #[cfg(feature = "edge-backend")]
            Backend::Edge => edge_mask(&preprocessed.gray, &EdgeParams::from_config(&self.config)),
            #[allow(unreachable_patterns)]
            _ => {
                return Err(FootSizerError::BackendUnavailable(format!(
                    "The {} backend is not compiled into this build", backend
                )))
            }
        };
        let local_factor = binarized.local_factor;
        let scale = preprocessed.scale * local_factor as f64;

        let regions = extract_regions(&binarized.mask, &ExtractorParams::from_config(&self.config, local_factor))?;
        let classification = classify(
            &regions,
            backend.policy(),
            &ShapeParams::from_config(&self.config, local_factor),
        )?;
        let length = measure_foot(&classification, scale, &CalibrationParams::from_config(&self.config))?;

        Ok(MeasurementDetails {
            result: MeasurementResult {
                foot_size_cm: length.foot_size_cm,
                backend,
                pixels_per_cm: length.pixels_per_cm,
            },
            binarized,
            classification,
            scale,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};

    fn plain_config() -> Config {
        Config {
            blur_sigma: 0.0,
            contrast: 0.0,
            min_region_area: 100,
            ..Config::default()
        }
    }

    /// Bright portrait sheet with a dark foot standing on it. The foot is
    /// darker than the floor, so the threshold backend sees the sheet with
    /// a hole and the edge backend sees two outlines.
    fn sheet_with_foot() -> GrayImage {
        GrayImage::from_fn(300, 400, |x, y| {
            let on_sheet = (20..220).contains(&x) && (40..323).contains(&y);
            let on_foot = (90..140).contains(&x) && (90..220).contains(&y);
            if on_foot {
                Luma([15])
            } else if on_sheet {
                Luma([235])
            } else {
                Luma([70])
            }
        })
    }

    /// The same scene plus a small bright scrap of paper beside the sheet.
    /// The threshold backend takes the scrap for the foot (4.2cm), the edge
    /// backend still sees the dark foot outline.
    fn sheet_with_foot_and_scrap() -> GrayImage {
        let mut image = sheet_with_foot();
        for y in 100..140 {
            for x in 240..252 {
                image.put_pixel(x, y, Luma([235]));
            }
        }
        image
    }

    #[test]
    fn backend_preference_is_threshold_first() {
        assert_eq!(Backend::PREFERENCE[0], Backend::Threshold);
        assert_eq!(Backend::Threshold.policy(), ClassifierPolicy::Shape);
        assert_eq!(Backend::Edge.policy(), ClassifierPolicy::TwoLargest);
    }

    #[test]
    fn detection_is_stable() {
        assert_eq!(Capabilities::detect(), Capabilities::detect());
    }

    #[test]
    fn detection_follows_compiled_features() {
        let detected = Capabilities::detect();
        assert_eq!(detected.threshold, cfg!(feature = "threshold-backend"));
        assert_eq!(detected.edge, cfg!(feature = "edge-backend"));
    }

    #[test]
    #[cfg(not(feature = "threshold-backend"))]
    fn compiled_out_backend_cannot_be_forced() {
        let engine = Engine::with_capabilities(plain_config(), Capabilities::only(Backend::Threshold)).unwrap();
        let pre = preprocess_image(
            &DynamicImage::ImageLuma8(sheet_with_foot()),
            &PreprocessParams::from_config(engine.config()),
        )
        .unwrap();
        let err = engine.run_backend(Backend::Threshold, &pre).unwrap_err();
        assert!(matches!(err, FootSizerError::BackendUnavailable(_)));
    }

    #[test]
    fn config_switches_restrict_capabilities() {
        let config = Config { enable_edge_backend: false, ..Config::default() };
        let caps = Capabilities { threshold: true, edge: true }.restrict(&config);
        assert!(caps.threshold);
        assert!(!caps.edge);
    }

    #[test]
    fn no_backends_is_unavailable() {
        let engine = Engine::with_capabilities(plain_config(), Capabilities::none()).unwrap();
        let image = DynamicImage::ImageLuma8(sheet_with_foot());
        let err = engine.measure_image(&image).unwrap_err();
        assert!(matches!(err, FootSizerError::BackendUnavailable(_)));
    }

    #[test]
    #[cfg(feature = "edge-backend")]
    fn unavailable_backend_refuses_to_run() {
        let engine = Engine::with_capabilities(plain_config(), Capabilities::only(Backend::Edge)).unwrap();
        let pre = preprocess_image(
            &DynamicImage::ImageLuma8(sheet_with_foot()),
            &PreprocessParams::from_config(engine.config()),
        )
        .unwrap();
        let err = engine.run_backend(Backend::Threshold, &pre).unwrap_err();
        assert!(matches!(err, FootSizerError::BackendUnavailable(_)));
    }

    #[test]
    #[cfg(feature = "edge-backend")]
    fn edge_backend_measures_synthetic_photo() {
        let engine = Engine::with_capabilities(plain_config(), Capabilities::only(Backend::Edge)).unwrap();
        let image = DynamicImage::ImageLuma8(sheet_with_foot());
        let result = engine.measure_image(&image).unwrap();
        assert_eq!(result.backend, Backend::Edge);
        // Outlines are a pixel wider than the objects on each side
        assert!((result.foot_size_cm - 13.65).abs() < 0.5, "got {}", result.foot_size_cm);
    }

    #[test]
    #[cfg(all(feature = "threshold-backend", feature = "edge-backend"))]
    fn falls_back_when_threshold_backend_finds_one_region() {
        // The threshold backend only sees the sheet (the foot is a hole),
        // so it fails and the edge backend takes over
        let engine = Engine::with_capabilities(plain_config(), Capabilities { threshold: true, edge: true }).unwrap();
        let image = DynamicImage::ImageLuma8(sheet_with_foot());
        let result = engine.measure_image(&image).unwrap();
        assert_eq!(result.backend, Backend::Edge);
    }

    #[test]
    #[cfg(all(feature = "threshold-backend", feature = "edge-backend"))]
    fn falls_back_when_threshold_backend_is_implausible() {
        let engine = Engine::with_capabilities(plain_config(), Capabilities { threshold: true, edge: true }).unwrap();
        let image = DynamicImage::ImageLuma8(sheet_with_foot_and_scrap());
        let pre = preprocess_image(&image, &PreprocessParams::from_config(engine.config())).unwrap();

        let err = engine.run_backend(Backend::Threshold, &pre).unwrap_err();
        assert!(
            matches!(err, FootSizerError::ImplausibleResult { foot_size_cm, .. } if foot_size_cm == 4.2),
            "got {err}"
        );

        let result = engine.measure_image(&image).unwrap();
        assert_eq!(result.backend, Backend::Edge);
        assert!((result.foot_size_cm - 13.65).abs() < 0.5, "got {}", result.foot_size_cm);
    }

    #[test]
    #[cfg(all(feature = "threshold-backend", feature = "edge-backend"))]
    fn last_error_surfaces_when_every_backend_fails() {
        let engine = Engine::with_capabilities(plain_config(), Capabilities { threshold: true, edge: true }).unwrap();
        let blank = DynamicImage::ImageLuma8(GrayImage::from_pixel(200, 200, Luma([128])));
        let err = engine.measure_image(&blank).unwrap_err();
        assert!(matches!(err, FootSizerError::ObjectDetection(_)));
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = Config { reference_width_cm: 0.0, ..Config::default() };
        assert!(Engine::new(config).is_err());
    }

    #[test]
    fn result_serializes_like_the_service_response() {
        let result = MeasurementResult { foot_size_cm: 13.6, backend: Backend::Threshold, pixels_per_cm: 19.05 };
        let json = serde_json::to_value(result).unwrap();
        assert_eq!(json["foot_size_cm"], 13.6);
        assert_eq!(json["backend"], "threshold");
    }
}
