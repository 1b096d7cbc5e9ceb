use crate::candidates::find_quad_candidates;
use crate::decode::{DecodeConfig, QuadDecoder};
use crate::{builtins, Dictionary, MarkerDetectError, Matcher};
use aruco_measure_core::{polygon_area, GrayImageView, PixelRect};
use image::{GrayImage, RgbImage};
use nalgebra::Point2;
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Dictionary used when none is configured.
pub const DEFAULT_DICTIONARY: &str = "DICT_6X6_250";

/// Binarization used to expose dark marker borders.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ThresholdMode {
    /// Global inverse threshold chosen by Otsu's method.
    Otsu,
    /// Inverse threshold against the local box mean minus `offset`.
    Adaptive { window: u32, offset: i16 },
}

/// Marker detector configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkerDetectorParams {
    /// Name of the embedded dictionary, e.g. `DICT_6X6_250`.
    pub dictionary: String,
    /// Maximum Hamming distance for a match. `None` uses
    /// `min(dictionary.max_correction_bits, 2)`.
    pub max_hamming: Option<u8>,
    /// Binarizations to search for candidates, in order.
    pub threshold_modes: Vec<ThresholdMode>,
    /// Minimum contour perimeter relative to the longer image side.
    pub min_perimeter_rate: f64,
    /// Maximum contour perimeter relative to the longer image side.
    pub max_perimeter_rate: f64,
    /// Douglas–Peucker tolerance relative to the contour perimeter.
    pub polygon_epsilon_rate: f64,
    /// Shortest accepted quad side, in pixels.
    pub min_side_px: f32,
    /// Quads with a corner closer than this to the image edge are dropped.
    pub min_border_distance_px: f32,
    /// Outward corner shift from pixel centers to pixel edges.
    pub edge_offset_px: f32,
    /// Bit sampling parameters.
    pub decode: DecodeConfig,
}

impl Default for MarkerDetectorParams {
    fn default() -> Self {
        Self {
            dictionary: DEFAULT_DICTIONARY.to_string(),
            max_hamming: None,
            threshold_modes: vec![
                ThresholdMode::Otsu,
                ThresholdMode::Adaptive {
                    window: 23,
                    offset: 7,
                },
            ],
            min_perimeter_rate: 0.03,
            max_perimeter_rate: 4.0,
            polygon_epsilon_rate: 0.03,
            min_side_px: 10.0,
            min_border_distance_px: 3.0,
            edge_offset_px: 0.5,
            decode: DecodeConfig::default(),
        }
    }
}

/// One decoded marker in image coordinates.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MarkerDetection {
    pub id: u32,
    /// Marker corners TL, TR, BR, BL in the marker's own frame, clockwise in the image.
    pub corners: [Point2<f32>; 4],
    /// Rotation `0..=3` of the observed code relative to the dictionary code.
    pub rotation: u8,
    pub hamming: u8,
    pub border_score: f32,
    pub score: f32,
    /// Read as white-on-black (only with `decode.allow_inverted`).
    #[serde(default)]
    pub inverted: bool,
}

impl MarkerDetection {
    /// Distance between the first two corners (the marker's top edge).
    pub fn side_length_px(&self) -> f64 {
        let d = self.corners[1] - self.corners[0];
        (d.x as f64).hypot(d.y as f64)
    }

    pub fn area_px(&self) -> f64 {
        polygon_area(&self.corners)
    }

    pub fn center(&self) -> Point2<f32> {
        let c = &self.corners;
        Point2::from((c[0].coords + c[1].coords + c[2].coords + c[3].coords) / 4.0)
    }

    /// Pixel rectangle covering the marker outline.
    pub fn bounding_rect(&self) -> PixelRect {
        let (mut min_x, mut min_y) = (f32::INFINITY, f32::INFINITY);
        let (mut max_x, mut max_y) = (f32::NEG_INFINITY, f32::NEG_INFINITY);
        for p in &self.corners {
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }
        let (x0, y0) = (min_x.floor() as i32, min_y.floor() as i32);
        PixelRect {
            x: x0,
            y: y0,
            width: (max_x.ceil() as i32 - x0).max(0) as u32,
            height: (max_y.ceil() as i32 - y0).max(0) as u32,
        }
    }
}

/// ArUco detector for one fixed dictionary.
pub struct MarkerDetector {
    params: MarkerDetectorParams,
    matcher: Matcher,
    decoder: QuadDecoder,
}

impl MarkerDetector {
    /// Build a detector, resolving the dictionary by name.
    pub fn new(params: MarkerDetectorParams) -> Result<Self, MarkerDetectError> {
        let dict = builtins::builtin_dictionary(&params.dictionary)
            .ok_or_else(|| MarkerDetectError::UnknownDictionary(params.dictionary.clone()))?;
        Self::with_dictionary(dict, params)
    }

    /// Build a detector for an explicit dictionary (`params.dictionary` is ignored).
    pub fn with_dictionary(
        dict: Dictionary,
        params: MarkerDetectorParams,
    ) -> Result<Self, MarkerDetectError> {
        let unsupported = || MarkerDetectError::UnsupportedDictionary {
            name: dict.name.to_string(),
            bits: dict.bit_count(),
        };
        if dict.bit_count() > 64 {
            return Err(unsupported());
        }
        let decoder = QuadDecoder::new(&params.decode, dict.marker_size).ok_or_else(unsupported)?;

        let max_hamming = params
            .max_hamming
            .unwrap_or(2)
            .min(dict.max_correction_bits);
        let matcher = Matcher::new(dict, max_hamming);

        Ok(Self {
            params,
            matcher,
            decoder,
        })
    }

    #[inline]
    pub fn params(&self) -> &MarkerDetectorParams {
        &self.params
    }

    #[inline]
    pub fn dictionary(&self) -> Dictionary {
        self.matcher.dictionary()
    }

    /// Detect markers in a color image (converted to luma first).
    pub fn detect_rgb(&self, image: &RgbImage) -> Vec<MarkerDetection> {
        let gray = image::imageops::grayscale(image);
        self.detect(&gray)
    }

    /// Detect markers in a grayscale image.
    ///
    /// Detections are in discovery order. An empty result means no marker is
    /// visible; it is not an error.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "info", skip(self, image), fields(width = image.width(), height = image.height()))
    )]
    pub fn detect(&self, image: &GrayImage) -> Vec<MarkerDetection> {
        let view = GrayImageView::from_luma(image);
        let quads = find_quad_candidates(&view, &self.params);

        let bits = self.dictionary().bit_count().max(1) as f32;
        let mut out: Vec<MarkerDetection> = Vec::new();
        for quad in quads {
            let Some(obs) = self.decoder.decode(&view, &quad) else {
                continue;
            };
            let Some(m) = self.matcher.match_code(obs.code) else {
                continue;
            };

            // dictionary corner k shows up at observed corner (k + rotation) % 4
            let r = m.rotation as usize;
            let corners = std::array::from_fn(|k| quad[(k + r) % 4]);
            let score = (obs.border_score * (1.0 - m.hamming as f32 / bits)).clamp(0.0, 1.0);

            merge_detection(
                &mut out,
                MarkerDetection {
                    id: m.id,
                    corners,
                    rotation: m.rotation,
                    hamming: m.hamming,
                    border_score: obs.border_score,
                    score,
                    inverted: obs.inverted,
                },
            );
        }

        log::debug!("decoded {} markers", out.len());
        out
    }
}

/// Keep one detection per physical marker: same id with centers closer than
/// half a side replaces the earlier entry only if it scores higher.
fn merge_detection(out: &mut Vec<MarkerDetection>, det: MarkerDetection) {
    let c = det.center();
    let existing = out.iter_mut().find(|d| {
        d.id == det.id && (d.center() - c).norm() < 0.5 * d.side_length_px() as f32
    });
    match existing {
        Some(prev) => {
            if det.score > prev.score {
                *prev = det;
            }
        }
        None => out.push(det),
    }
}
