//! Pixel bounding boxes to physical dimensions.

use crate::ScaleFactor;
use aruco_measure_core::{Contour, PixelRect};
use serde::Serialize;

/// Default minimum contour area, in square pixels, for a region to count as an object.
pub const DEFAULT_MIN_OBJECT_AREA_PX: f64 = 500.0;

/// Physical size of one object's axis-aligned bounding box.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Measurement {
    pub bbox: PixelRect,
    pub width_m: f64,
    pub height_m: f64,
}

impl Measurement {
    /// `"<W>cm x <H>cm"` with one fractional digit each.
    pub fn label(&self) -> String {
        format!(
            "{:.1}cm x {:.1}cm",
            self.width_m * 100.0,
            self.height_m * 100.0
        )
    }
}

/// Measurements in contour discovery order.
pub type MeasurementSet = Vec<Measurement>;

/// Measure every contour whose area exceeds `min_area_px`.
///
/// Output order follows `contours`. Contours at or below the area limit are
/// dropped, as are empty ones.
pub fn convert(contours: &[Contour], scale: ScaleFactor, min_area_px: f64) -> MeasurementSet {
    contours
        .iter()
        .filter(|c| c.area() > min_area_px)
        .filter_map(Contour::bounding_rect)
        .map(|bbox| measure_rect(bbox, scale))
        .collect()
}

/// Physical size of a pixel rectangle under `scale`.
pub fn measure_rect(bbox: PixelRect, scale: ScaleFactor) -> Measurement {
    Measurement {
        bbox,
        width_m: scale.to_meters(bbox.width as f64),
        height_m: scale.to_meters(bbox.height as f64),
    }
}
