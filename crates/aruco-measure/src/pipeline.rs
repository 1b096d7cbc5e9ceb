//! Per-image measurement pipeline: detect, calibrate, segment, convert, annotate.

use crate::calibrate::{calibrate_with, MarkerSelection, ScaleFactor};
use crate::convert::{convert, MeasurementSet, DEFAULT_MIN_OBJECT_AREA_PX};
use crate::segment::ObjectSegmenter;
use crate::Annotator;
use aruco_measure_core::{Contour, PixelRect};
use aruco_measure_marker::{MarkerDetectError, MarkerDetection, MarkerDetector, MarkerDetectorParams};
use image::RgbImage;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Marker boxes are grown by this fraction of their side before excluding
/// segmented regions that fall inside them.
const MARKER_EXCLUSION_MARGIN_RATE: f64 = 0.05;

#[derive(thiserror::Error, Debug)]
pub enum MeasureError {
    #[error("cannot read image {path}: {source}")]
    UnreadableImage {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("marker size must be a positive number of meters (got {0})")]
    InvalidMarkerSize(f64),
    #[error("minimum object area must be a finite, non-negative number of pixels (got {0})")]
    InvalidMinArea(f64),
    #[error(transparent)]
    Detector(#[from] MarkerDetectError),
}

fn default_min_object_area_px() -> f64 {
    DEFAULT_MIN_OBJECT_AREA_PX
}

fn default_exclude_markers() -> bool {
    true
}

/// Parameters of one measurement run.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MeasureParams {
    /// Printed side length of the reference marker, in meters.
    pub marker_size_m: f64,
    /// Regions with contour area at or below this are ignored.
    #[serde(default = "default_min_object_area_px")]
    pub min_object_area_px: f64,
    #[serde(default)]
    pub marker_selection: MarkerSelection,
    /// Drop segmented regions that are the markers themselves.
    #[serde(default = "default_exclude_markers")]
    pub exclude_markers: bool,
    #[serde(default)]
    pub detector: MarkerDetectorParams,
}

impl MeasureParams {
    pub fn new(marker_size_m: f64) -> Self {
        Self {
            marker_size_m,
            min_object_area_px: DEFAULT_MIN_OBJECT_AREA_PX,
            marker_selection: MarkerSelection::default(),
            exclude_markers: true,
            detector: MarkerDetectorParams::default(),
        }
    }

    pub fn validate(&self) -> Result<(), MeasureError> {
        if !(self.marker_size_m.is_finite() && self.marker_size_m > 0.0) {
            return Err(MeasureError::InvalidMarkerSize(self.marker_size_m));
        }
        if !(self.min_object_area_px.is_finite() && self.min_object_area_px >= 0.0) {
            return Err(MeasureError::InvalidMinArea(self.min_object_area_px));
        }
        Ok(())
    }
}

/// Result of measuring one image.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MeasureOutcome {
    /// No marker was found, so nothing can be measured.
    NoMarkerDetected,
    /// Markers were found but the selection policy refused to pick one.
    AmbiguousMarkers { markers: Vec<MarkerDetection> },
    Measured {
        scale: ScaleFactor,
        markers: Vec<MarkerDetection>,
        measurements: MeasurementSet,
    },
}

impl MeasureOutcome {
    /// Dimension labels in measurement order; `None` when no scale could be established.
    pub fn dimension_labels(&self) -> Option<Vec<String>> {
        match self {
            MeasureOutcome::Measured { measurements, .. } => {
                Some(measurements.iter().map(|m| m.label()).collect())
            }
            _ => None,
        }
    }

    pub fn markers(&self) -> &[MarkerDetection] {
        match self {
            MeasureOutcome::NoMarkerDetected => &[],
            MeasureOutcome::AmbiguousMarkers { markers }
            | MeasureOutcome::Measured { markers, .. } => markers,
        }
    }
}

/// Outcome plus what happened to the annotated image.
#[derive(Clone, Debug, Serialize)]
pub struct MeasureReport {
    pub outcome: MeasureOutcome,
    /// Where the annotated image was written, if it was.
    pub annotated_path: Option<PathBuf>,
    /// Why annotation failed, if it did. Measurements are kept regardless.
    pub annotation_error: Option<String>,
}

/// Measures objects against a reference marker. Immutable after construction.
pub struct ObjectMeasurer {
    params: MeasureParams,
    detector: MarkerDetector,
    segmenter: ObjectSegmenter,
}

impl ObjectMeasurer {
    pub fn new(params: MeasureParams) -> Result<Self, MeasureError> {
        params.validate()?;
        let detector = MarkerDetector::new(params.detector.clone())?;
        Ok(Self {
            params,
            detector,
            segmenter: ObjectSegmenter::new(),
        })
    }

    pub fn params(&self) -> &MeasureParams {
        &self.params
    }

    #[cfg_attr(
        feature = "tracing",
        instrument(level = "info", skip(self, image), fields(width = image.width(), height = image.height()))
    )]
    pub fn measure(&self, image: &RgbImage) -> MeasureOutcome {
        let gray = image::imageops::grayscale(image);
        let markers = self.detector.detect(&gray);
        if markers.is_empty() {
            log::info!("no markers detected");
            return MeasureOutcome::NoMarkerDetected;
        }

        let Some(scale) =
            calibrate_with(&markers, self.params.marker_size_m, self.params.marker_selection)
        else {
            return MeasureOutcome::AmbiguousMarkers { markers };
        };

        let mut contours = self.segmenter.segment(&gray);
        if self.params.exclude_markers {
            contours = exclude_marker_regions(contours, &markers);
        }
        let measurements = convert(&contours, scale, self.params.min_object_area_px);
        log::info!(
            "{} markers, {:.1} px/m, {} objects measured",
            markers.len(),
            scale.pixels_per_meter(),
            measurements.len()
        );

        MeasureOutcome::Measured {
            scale,
            markers,
            measurements,
        }
    }

    pub fn measure_path(&self, path: impl AsRef<Path>) -> Result<MeasureOutcome, MeasureError> {
        let image = load_rgb(path.as_ref())?;
        Ok(self.measure(&image))
    }

    /// Measure and, when markers were found and `out_path` is given, write an
    /// annotated copy. Annotation failures are logged and reported, never fatal.
    pub fn measure_and_annotate(
        &self,
        path: impl AsRef<Path>,
        annotator: &Annotator,
        out_path: Option<&Path>,
    ) -> Result<MeasureReport, MeasureError> {
        let image = load_rgb(path.as_ref())?;
        let outcome = self.measure(&image);

        let mut report = MeasureReport {
            outcome,
            annotated_path: None,
            annotation_error: None,
        };
        let Some(out_path) = out_path else {
            return Ok(report);
        };
        if report.outcome.markers().is_empty() {
            return Ok(report);
        }

        let measurements = match &report.outcome {
            MeasureOutcome::Measured { measurements, .. } => measurements.as_slice(),
            _ => &[],
        };
        let annotated = annotator.annotate(&image, report.outcome.markers(), measurements);
        match annotator.save(&annotated, out_path) {
            Ok(()) => report.annotated_path = Some(out_path.to_path_buf()),
            Err(err) => {
                log::warn!("annotation skipped: {err}");
                report.annotation_error = Some(err.to_string());
            }
        }
        Ok(report)
    }
}

fn load_rgb(path: &Path) -> Result<RgbImage, MeasureError> {
    let image = image::open(path).map_err(|source| MeasureError::UnreadableImage {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(image.to_rgb8())
}

/// Drop contours whose bounding box sits inside a (slightly grown) marker box.
pub fn exclude_marker_regions(contours: Vec<Contour>, markers: &[MarkerDetection]) -> Vec<Contour> {
    let zones: Vec<PixelRect> = markers
        .iter()
        .map(|m| {
            let margin = (m.side_length_px() * MARKER_EXCLUSION_MARGIN_RATE).ceil().max(2.0);
            m.bounding_rect().grown(margin as i32)
        })
        .collect();

    contours
        .into_iter()
        .filter(|c| match c.bounding_rect() {
            Some(bbox) => !zones.iter().any(|z| z.contains_rect(&bbox)),
            None => false,
        })
        .collect()
}
