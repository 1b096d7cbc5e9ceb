//! Quad candidate search.

use crate::{MarkerDetectorParams, ThresholdMode};
use aruco_measure_core::{
    adaptive_threshold_inv, approximate_polygon, find_contours, is_convex_quad, otsu_threshold,
    polygon_area, threshold_binary_inv, ContourMode, GrayImageView,
};
use nalgebra::Point2;

/// Find convex quadrilaterals that may be marker outlines.
///
/// Corners are clockwise in image coordinates (y down) and sit on the outer
/// pixel edge of the dark border.
pub(crate) fn find_quad_candidates(
    view: &GrayImageView<'_>,
    params: &MarkerDetectorParams,
) -> Vec<[Point2<f32>; 4]> {
    let max_dim = view.width.max(view.height) as f64;
    let min_perimeter = params.min_perimeter_rate * max_dim;
    let max_perimeter = params.max_perimeter_rate * max_dim;

    let mut out: Vec<[Point2<f32>; 4]> = Vec::new();

    for mode in &params.threshold_modes {
        let binary = match *mode {
            ThresholdMode::Otsu => threshold_binary_inv(view, otsu_threshold(view)),
            ThresholdMode::Adaptive { window, offset } => {
                adaptive_threshold_inv(view, window, offset)
            }
        };

        let contours = find_contours(&binary, ContourMode::AllOuter);
        log::debug!("{mode:?}: {} outer contours", contours.len());

        for contour in contours {
            let perimeter = contour.perimeter();
            if perimeter < min_perimeter || perimeter > max_perimeter {
                continue;
            }

            let poly = approximate_polygon(&contour.points, params.polygon_epsilon_rate * perimeter);
            let Ok(poly) = <[Point2<i32>; 4]>::try_from(poly) else {
                continue;
            };
            let quad = poly.map(|p| Point2::new(p.x as f32, p.y as f32));
            if !is_convex_quad(&quad) || shortest_side(&quad) < params.min_side_px {
                continue;
            }
            if touches_border(&quad, view, params.min_border_distance_px) {
                continue;
            }

            let quad = expand_to_pixel_edges(order_clockwise(quad), params.edge_offset_px);
            if out.iter().any(|q| same_quad(q, &quad)) {
                continue;
            }
            out.push(quad);
        }
    }

    out
}

fn shortest_side(q: &[Point2<f32>; 4]) -> f32 {
    (0..4)
        .map(|i| (q[(i + 1) % 4] - q[i]).norm())
        .fold(f32::INFINITY, f32::min)
}

fn touches_border(q: &[Point2<f32>; 4], view: &GrayImageView<'_>, margin: f32) -> bool {
    let (w, h) = (view.width as f32 - 1.0, view.height as f32 - 1.0);
    q.iter()
        .any(|p| p.x < margin || p.y < margin || p.x > w - margin || p.y > h - margin)
}

/// Clockwise with image y pointing down, i.e. TL -> TR -> BR -> BL for an upright square.
fn order_clockwise(q: [Point2<f32>; 4]) -> [Point2<f32>; 4] {
    let d1 = q[1] - q[0];
    let d2 = q[2] - q[1];
    if d1.x * d2.y - d1.y * d2.x > 0.0 {
        q
    } else {
        [q[0], q[3], q[2], q[1]]
    }
}

/// Contour points are centers of the outermost dark pixels; push corners
/// outward along the diagonals so that the quad covers whole pixels.
fn expand_to_pixel_edges(q: [Point2<f32>; 4], offset: f32) -> [Point2<f32>; 4] {
    if offset <= 0.0 {
        return q;
    }
    let center = Point2::from((q[0].coords + q[1].coords + q[2].coords + q[3].coords) / 4.0);
    q.map(|p| {
        let d = p - center;
        let n = d.norm();
        if n < 1e-6 {
            p
        } else {
            p + d * (offset * std::f32::consts::SQRT_2 / n)
        }
    })
}

fn quad_center(q: &[Point2<f32>; 4]) -> Point2<f32> {
    Point2::from((q[0].coords + q[1].coords + q[2].coords + q[3].coords) / 4.0)
}

fn same_quad(a: &[Point2<f32>; 4], b: &[Point2<f32>; 4]) -> bool {
    let area_a = polygon_area(a);
    let area_b = polygon_area(b);
    if area_a <= 0.0 || area_b <= 0.0 {
        return false;
    }
    let tol = (0.05 * area_a.sqrt()).max(1.0) as f32;
    (quad_center(a) - quad_center(b)).norm() < tol && (area_a / area_b - 1.0).abs() < 0.1
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};

    fn dark_square(w: u32, h: u32, x0: u32, y0: u32, side: u32) -> GrayImage {
        let mut img = GrayImage::from_pixel(w, h, Luma([230]));
        for y in y0..y0 + side {
            for x in x0..x0 + side {
                img.put_pixel(x, y, Luma([15]));
            }
        }
        img
    }

    #[test]
    fn square_becomes_one_clockwise_candidate_on_pixel_edges() {
        let img = dark_square(200, 160, 40, 30, 80);
        let view = GrayImageView::from_luma(&img);
        let params = MarkerDetectorParams::default();

        let quads = find_quad_candidates(&view, &params);
        assert_eq!(quads.len(), 1, "{quads:?}");
        let q = quads[0];

        let d1 = q[1] - q[0];
        let d2 = q[2] - q[1];
        assert!(d1.x * d2.y - d1.y * d2.x > 0.0);

        for i in 0..4 {
            let side = (q[(i + 1) % 4] - q[i]).norm();
            assert!((side - 80.0).abs() < 1e-3, "side {side}");
        }
        let c = quad_center(&q);
        assert!((c.x - 79.5).abs() < 1e-3 && (c.y - 69.5).abs() < 1e-3);
    }

    #[test]
    fn small_and_border_touching_blobs_are_ignored() {
        let mut img = dark_square(200, 200, 0, 0, 60);
        for y in 150..153 {
            for x in 150..153 {
                img.put_pixel(x, y, Luma([15]));
            }
        }
        let view = GrayImageView::from_luma(&img);
        assert!(find_quad_candidates(&view, &MarkerDetectorParams::default()).is_empty());
    }

    #[test]
    fn winding_is_normalized() {
        let ccw = [
            Point2::new(0.0_f32, 0.0),
            Point2::new(0.0, 10.0),
            Point2::new(10.0, 10.0),
            Point2::new(10.0, 0.0),
        ];
        let cw = order_clockwise(ccw);
        assert_eq!(cw[1], Point2::new(10.0, 0.0));
        assert_eq!(cw[3], Point2::new(0.0, 10.0));
    }
}
