//! ArUco marker detection for metric reference markers.
//!
//! This crate covers:
//! - quad candidate search (inverse Otsu / local-mean binarization, outer
//!   contours, polygon approximation),
//! - per-quad bit sampling through a 4-point homography,
//! - matching against one fixed embedded dictionary (`DICT_6X6_250` by default),
//! - rendering printable markers.
//!
//! Dictionaries and code matching come from `calib-targets-aruco`.

mod candidates;
mod decode;
mod detector;
mod error;
mod render;

pub use calib_targets_aruco::{builtins, Dictionary, Match, Matcher};
pub use decode::DecodeConfig;
pub use detector::{
    MarkerDetection, MarkerDetector, MarkerDetectorParams, ThresholdMode, DEFAULT_DICTIONARY,
};
pub use error::MarkerDetectError;
pub use render::render_marker;
