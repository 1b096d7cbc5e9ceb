//! Core types and utilities for marker-referenced measurement.
//!
//! This crate is intentionally small: borrowed grayscale views, a 4-point
//! homography, global and local thresholding, contour tracing with the
//! polygon helpers the detectors need, and a minimal logger. It knows nothing
//! about marker dictionaries or physical units.

mod contour;
mod homography;
mod image;
mod logger;
mod threshold;

pub use contour::{
    approximate_polygon, find_contours, is_convex_quad, polygon_area, Contour, ContourMode,
    PixelRect,
};
pub use homography::{homography_from_4pt, Homography};
pub use image::{sample_bilinear, GrayImageView};
pub use threshold::{
    adaptive_threshold_inv, otsu_threshold, otsu_threshold_from_samples, threshold_binary_inv,
};

#[cfg(feature = "tracing")]
pub use logger::init_tracing;

pub use logger::init_with_level;
