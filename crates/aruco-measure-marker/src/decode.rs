//! Bit sampling of one marker quad.

use aruco_measure_core::{
    homography_from_4pt, otsu_threshold_from_samples, sample_bilinear, GrayImageView,
};
use nalgebra::Point2;
use serde::{Deserialize, Serialize};

/// Sampling configuration for reading marker bits from an image quad.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct DecodeConfig {
    /// Marker border width in cells (OpenCV uses 1).
    pub border_bits: usize,
    /// Fraction of each cell side ignored near the cell edges.
    pub cell_margin: f32,
    /// Sub-samples per cell side; the cell value is their mean.
    pub samples_per_cell: usize,
    /// Require border-black ratio >= this.
    pub min_border_score: f32,
    /// Also try white-on-black markers.
    pub allow_inverted: bool,
}

impl Default for DecodeConfig {
    fn default() -> Self {
        Self {
            border_bits: 1,
            cell_margin: 0.2,
            samples_per_cell: 3,
            min_border_score: 0.85,
            allow_inverted: false,
        }
    }
}

/// Minimum intensity spread inside a quad for it to carry any bits.
const MIN_CONTRAST: u8 = 20;

#[derive(Clone, Copy, Debug)]
pub(crate) struct MarkerObservation {
    /// Observed inner bits (row-major, black=1).
    pub code: u64,
    pub border_score: f32,
    pub inverted: bool,
}

/// Precomputed sampling layout in canonical marker units (one unit per cell).
pub(crate) struct QuadDecoder {
    cfg: DecodeConfig,
    bits: usize,
    cells: usize,
    canonical: [Point2<f32>; 4],
    /// `cells * cells` groups of `samples_per_cell^2` points, row-major by cell.
    points: Vec<Point2<f32>>,
}

impl QuadDecoder {
    pub fn new(cfg: &DecodeConfig, bits: usize) -> Option<Self> {
        if bits == 0 || bits * bits > 64 {
            return None;
        }
        let cells = bits + 2 * cfg.border_bits;
        let k = cfg.samples_per_cell.max(1);
        let margin = cfg.cell_margin.clamp(0.0, 0.45);
        let span = 1.0 - 2.0 * margin;

        let mut points = Vec::with_capacity(cells * cells * k * k);
        for cy in 0..cells {
            for cx in 0..cells {
                for sy in 0..k {
                    for sx in 0..k {
                        points.push(Point2::new(
                            cx as f32 + margin + (sx as f32 + 0.5) * span / k as f32,
                            cy as f32 + margin + (sy as f32 + 0.5) * span / k as f32,
                        ));
                    }
                }
            }
        }

        let c = cells as f32;
        Some(Self {
            cfg: cfg.clone(),
            bits,
            cells,
            canonical: [
                Point2::new(0.0, 0.0),
                Point2::new(c, 0.0),
                Point2::new(c, c),
                Point2::new(0.0, c),
            ],
            points,
        })
    }

    /// Read the bits of a quad whose corners are ordered clockwise in image space.
    ///
    /// `corners[0]` becomes the origin of the observed code; the caller resolves
    /// the marker rotation against the dictionary.
    pub fn decode(
        &self,
        img: &GrayImageView<'_>,
        corners: &[Point2<f32>; 4],
    ) -> Option<MarkerObservation> {
        let h = homography_from_4pt(&self.canonical, corners)?;

        let per_cell = self.points.len() / (self.cells * self.cells);
        let mut raw = Vec::with_capacity(self.points.len());
        for p in &self.points {
            let q = h.apply(*p);
            if !q.x.is_finite() || !q.y.is_finite() || !img.contains(q.x, q.y) {
                return None;
            }
            raw.push(sample_bilinear(img, q.x, q.y).clamp(0.0, 255.0) as u8);
        }

        let samples: Vec<u8> = raw
            .chunks(per_cell)
            .map(|c| (c.iter().map(|&v| v as u32).sum::<u32>() / c.len() as u32) as u8)
            .collect();

        decode_samples(
            &samples,
            &raw,
            self.cells,
            self.bits,
            self.cfg.border_bits,
            self.cfg.min_border_score,
            self.cfg.allow_inverted,
        )
    }
}

fn decode_samples(
    samples: &[u8],
    thr_samples: &[u8],
    cells: usize,
    bits: usize,
    border: usize,
    min_border_score: f32,
    allow_inverted: bool,
) -> Option<MarkerObservation> {
    if samples.len() != cells * cells {
        return None;
    }

    let source = if thr_samples.is_empty() {
        samples
    } else {
        thr_samples
    };
    let lo = source.iter().copied().min().unwrap_or(0);
    let hi = source.iter().copied().max().unwrap_or(0);
    if hi.saturating_sub(lo) < MIN_CONTRAST {
        return None;
    }

    let thr = otsu_threshold_from_samples(source);

    let polarities: &[bool] = if allow_inverted {
        &[false, true]
    } else {
        &[false]
    };

    let mut best: Option<MarkerObservation> = None;

    for &inverted in polarities {
        let mut border_ok = 0u32;
        let mut border_total = 0u32;
        let mut code: u64 = 0;
        let use_border = border > 0;

        for cy in 0..cells {
            for cx in 0..cells {
                let mut is_black = samples[cy * cells + cx] <= thr;
                if inverted {
                    is_black = !is_black;
                }

                let is_border = use_border
                    && (cx < border || cy < border || cx + border >= cells || cy + border >= cells);
                if is_border {
                    border_total += 1;
                    if is_black {
                        border_ok += 1;
                    }
                } else if is_black {
                    let idx = (cy - border) * bits + (cx - border); // row-major
                    code |= 1u64 << idx;
                }
            }
        }

        let border_score = if use_border {
            border_ok as f32 / border_total.max(1) as f32
        } else {
            1.0
        };
        if border_score < min_border_score {
            continue;
        }

        if best
            .as_ref()
            .map(|b| border_score > b.border_score)
            .unwrap_or(true)
        {
            best = Some(MarkerObservation {
                code,
                border_score,
                inverted,
            });
        }
    }

    best
}
