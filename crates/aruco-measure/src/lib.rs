//! Measure objects in a photo using a printed ArUco marker as the metric reference.
//!
//! The pipeline is:
//! 1. detect `DICT_6X6_250` markers ([`marker`]),
//! 2. derive pixels per meter from one marker of known side length ([`calibrate`]),
//! 3. segment dark regions with an Otsu threshold ([`ObjectSegmenter`]),
//! 4. convert region bounding boxes into centimeters ([`convert()`]),
//! 5. optionally draw the results onto a copy of the image ([`Annotator`]).
//!
//! ## Quickstart
//!
//! ```no_run
//! use aruco_measure::{MeasureParams, ObjectMeasurer};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let measurer = ObjectMeasurer::new(MeasureParams::new(0.10))?;
//! match measurer.measure_path("photo.jpg")?.dimension_labels() {
//!     Some(labels) => labels.iter().for_each(|l| println!("{l}")),
//!     None => println!("no markers detected"),
//! }
//! # Ok(())
//! # }
//! ```
//!
//! Produce classification is a separate concern: see [`classify`].
//!
//! ## API map
//! - `aruco_measure::core`: image views, thresholds, contours, homographies, logger.
//! - `aruco_measure::marker`: marker detection and rendering.
//! - `aruco_measure::config`: JSON configuration files.

pub use aruco_measure_core as core;
pub use aruco_measure_marker as marker;

pub mod annotate;
pub mod calibrate;
pub mod classify;
pub mod config;
pub mod convert;
pub mod pipeline;
pub mod segment;

pub use annotate::{AnnotateError, AnnotationStyle, Annotator};
pub use calibrate::{calibrate, calibrate_with, MarkerSelection, ScaleFactor};
pub use classify::{Classifier, ClassifyError, EnsembleClassifier, ProbabilityModel, Produce};
pub use config::{ConfigError, MeasureConfig};
pub use convert::{convert, Measurement, MeasurementSet, DEFAULT_MIN_OBJECT_AREA_PX};
pub use pipeline::{MeasureError, MeasureOutcome, MeasureParams, MeasureReport, ObjectMeasurer};
pub use segment::ObjectSegmenter;

pub use aruco_measure_core::{Contour, PixelRect};
pub use aruco_measure_marker::{MarkerDetection, MarkerDetector, MarkerDetectorParams};

/// Route `log` records into a `tracing` subscriber filtered by `RUST_LOG`.
#[cfg(feature = "tracing")]
pub fn init_tracing(json: bool) {
    let _ = tracing_log::LogTracer::init();
    aruco_measure_core::init_tracing(json);
}
