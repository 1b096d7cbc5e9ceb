//! Pixel-to-meter scale from a detected marker of known size.

use aruco_measure_marker::MarkerDetection;
use serde::{Deserialize, Serialize};

/// Image scale in pixels per meter. Always finite and strictly positive.
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct ScaleFactor(f64);

impl ScaleFactor {
    /// Returns `None` for zero, negative or non-finite values.
    pub fn new(pixels_per_meter: f64) -> Option<Self> {
        (pixels_per_meter.is_finite() && pixels_per_meter > 0.0).then_some(Self(pixels_per_meter))
    }

    #[inline]
    pub fn pixels_per_meter(self) -> f64 {
        self.0
    }

    /// Convert a pixel length into meters.
    #[inline]
    pub fn to_meters(self, pixels: f64) -> f64 {
        pixels / self.0
    }
}

/// Which detected marker drives the scale when several are visible.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkerSelection {
    /// The first marker in detection order.
    First,
    /// The marker with the largest image area.
    #[default]
    Largest,
    /// Only calibrate when exactly one marker is visible.
    RejectAmbiguous,
}

/// Scale from the first detected marker: its top edge length divided by
/// `real_size_m`.
///
/// Returns `None` when `markers` is empty or `real_size_m` is not a positive
/// finite number.
pub fn calibrate(markers: &[MarkerDetection], real_size_m: f64) -> Option<ScaleFactor> {
    calibrate_with(markers, real_size_m, MarkerSelection::First)
}

/// Like [`calibrate`], picking the reference marker with `selection`.
pub fn calibrate_with(
    markers: &[MarkerDetection],
    real_size_m: f64,
    selection: MarkerSelection,
) -> Option<ScaleFactor> {
    if !(real_size_m.is_finite() && real_size_m > 0.0) {
        return None;
    }
    let marker = select_marker(markers, selection)?;
    let scale = ScaleFactor::new(marker.side_length_px() / real_size_m);
    if let Some(s) = scale {
        log::debug!(
            "marker {} side {:.2}px -> {:.1} px/m",
            marker.id,
            marker.side_length_px(),
            s.pixels_per_meter()
        );
    }
    scale
}

/// Reference marker under `selection`, if any.
pub fn select_marker(
    markers: &[MarkerDetection],
    selection: MarkerSelection,
) -> Option<&MarkerDetection> {
    match selection {
        MarkerSelection::First => markers.first(),
        MarkerSelection::Largest => markers
            .iter()
            .reduce(|best, m| if m.area_px() > best.area_px() { m } else { best }),
        MarkerSelection::RejectAmbiguous => match markers {
            [only] => Some(only),
            _ => {
                if markers.len() > 1 {
                    log::warn!("{} markers visible, refusing to pick one", markers.len());
                }
                None
            }
        },
    }
}
