//! Contour extraction and the polygon helpers built on top of it.

use image::GrayImage;
use imageproc::contours::BorderType;
use nalgebra::Point2;
use serde::{Deserialize, Serialize};

/// Which traced borders to keep.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContourMode {
    /// Outer borders that are not nested inside any other region.
    External,
    /// Every outer border, including regions sitting inside holes.
    AllOuter,
}

/// Axis-aligned pixel rectangle; `width`/`height` count pixels inclusively.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelRect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl PixelRect {
    #[inline]
    pub fn right(&self) -> i32 {
        self.x + self.width as i32
    }

    #[inline]
    pub fn bottom(&self) -> i32 {
        self.y + self.height as i32
    }

    /// Grow the rectangle by `margin` pixels on every side.
    pub fn grown(&self, margin: i32) -> PixelRect {
        PixelRect {
            x: self.x - margin,
            y: self.y - margin,
            width: (self.width as i32 + 2 * margin).max(0) as u32,
            height: (self.height as i32 + 2 * margin).max(0) as u32,
        }
    }

    /// Whether `other` lies entirely inside `self`.
    pub fn contains_rect(&self, other: &PixelRect) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.right() <= self.right()
            && other.bottom() <= self.bottom()
    }

    /// Smallest rectangle covering all points (pixel-inclusive, like OpenCV `boundingRect`).
    pub fn covering(points: impl IntoIterator<Item = Point2<i32>>) -> Option<PixelRect> {
        let mut it = points.into_iter();
        let first = it.next()?;
        let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.x, first.y, first.x, first.y);
        for p in it {
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }
        Some(PixelRect {
            x: min_x,
            y: min_y,
            width: (max_x - min_x + 1) as u32,
            height: (max_y - min_y + 1) as u32,
        })
    }
}

/// Boundary of one connected foreground region, in tracing order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contour {
    pub points: Vec<Point2<i32>>,
}

impl Contour {
    pub fn new(points: Vec<Point2<i32>>) -> Self {
        Self { points }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Area enclosed by the boundary polygon (shoelace over pixel centers).
    ///
    /// Matches OpenCV `contourArea`: a filled `w x h` rectangle has area
    /// `(w - 1) * (h - 1)`.
    pub fn area(&self) -> f64 {
        let n = self.points.len();
        if n < 3 {
            return 0.0;
        }
        let mut twice = 0i64;
        for i in 0..n {
            let a = self.points[i];
            let b = self.points[(i + 1) % n];
            twice += a.x as i64 * b.y as i64 - b.x as i64 * a.y as i64;
        }
        (twice as f64).abs() * 0.5
    }

    /// Length of the closed boundary polygon.
    pub fn perimeter(&self) -> f64 {
        let n = self.points.len();
        if n < 2 {
            return 0.0;
        }
        (0..n)
            .map(|i| {
                let a = self.points[i];
                let b = self.points[(i + 1) % n];
                ((b.x - a.x) as f64).hypot((b.y - a.y) as f64)
            })
            .sum()
    }

    pub fn bounding_rect(&self) -> Option<PixelRect> {
        PixelRect::covering(self.points.iter().copied())
    }
}

/// Trace borders of the non-zero regions of a binary image.
///
/// Order follows the tracer's raster scan: a region is reported when its
/// top-most, left-most pixel is reached. Regions touching the image border
/// are reported like any other; points stay in `binary` coordinates.
pub fn find_contours(binary: &GrayImage, mode: ContourMode) -> Vec<Contour> {
    // The tracer only starts an outer border after a background pixel on the
    // left, so column 0 needs a zero frame around it.
    let mut padded = GrayImage::new(binary.width() + 2, binary.height() + 2);
    image::imageops::replace(&mut padded, binary, 1, 1);

    imageproc::contours::find_contours::<i32>(&padded)
        .into_iter()
        .filter(|c| c.border_type == BorderType::Outer)
        .filter(|c| mode == ContourMode::AllOuter || c.parent.is_none())
        .map(|c| {
            Contour::new(
                c.points
                    .iter()
                    .map(|p| Point2::new(p.x - 1, p.y - 1))
                    .collect(),
            )
        })
        .collect()
}

/// Absolute area of a closed polygon.
pub fn polygon_area(points: &[Point2<f32>]) -> f64 {
    let n = points.len();
    if n < 3 {
        return 0.0;
    }
    let twice: f64 = (0..n)
        .map(|i| {
            let a = points[i];
            let b = points[(i + 1) % n];
            a.x as f64 * b.y as f64 - b.x as f64 * a.y as f64
        })
        .sum();
    twice.abs() * 0.5
}

/// Whether the quad is strictly convex (either winding).
pub fn is_convex_quad(q: &[Point2<f32>; 4]) -> bool {
    let mut sign = 0.0f32;
    for i in 0..4 {
        let a = q[i];
        let b = q[(i + 1) % 4];
        let c = q[(i + 2) % 4];
        let cross = (b.x - a.x) * (c.y - b.y) - (b.y - a.y) * (c.x - b.x);
        if cross.abs() < 1e-6 {
            return false;
        }
        if sign == 0.0 {
            sign = cross.signum();
        } else if cross.signum() != sign {
            return false;
        }
    }
    true
}

/// Douglas–Peucker simplification of a closed curve.
///
/// The curve is split at its first point and the point farthest from it, and
/// each half is simplified independently. Returned vertices keep the input
/// traversal order and never repeat the starting point.
pub fn approximate_polygon(curve: &[Point2<i32>], epsilon: f64) -> Vec<Point2<i32>> {
    if curve.len() < 3 {
        return curve.to_vec();
    }

    let origin = curve[0];
    let far = curve
        .iter()
        .enumerate()
        .max_by_key(|(_, p)| {
            let dx = (p.x - origin.x) as i64;
            let dy = (p.y - origin.y) as i64;
            dx * dx + dy * dy
        })
        .map(|(i, _)| i)
        .unwrap_or(0);
    if far == 0 {
        return vec![origin];
    }

    let mut out = Vec::new();
    simplify_open(&curve[..=far], epsilon, &mut out);

    let mut back: Vec<Point2<i32>> = curve[far..].to_vec();
    back.push(origin);
    simplify_open(&back, epsilon, &mut out);

    out
}

/// Pushes the kept vertices of `seg` except its last point.
fn simplify_open(seg: &[Point2<i32>], epsilon: f64, out: &mut Vec<Point2<i32>>) {
    let last = seg.len() - 1;
    if last < 2 {
        out.push(seg[0]);
        return;
    }

    let (a, b) = (seg[0], seg[last]);
    let mut best = (0usize, -1.0f64);
    for (i, p) in seg.iter().enumerate().take(last).skip(1) {
        let d = point_segment_distance(*p, a, b);
        if d > best.1 {
            best = (i, d);
        }
    }

    if best.1 > epsilon {
        simplify_open(&seg[..=best.0], epsilon, out);
        simplify_open(&seg[best.0..], epsilon, out);
    } else {
        out.push(a);
    }
}

fn point_segment_distance(p: Point2<i32>, a: Point2<i32>, b: Point2<i32>) -> f64 {
    let (px, py) = (p.x as f64, p.y as f64);
    let (ax, ay) = (a.x as f64, a.y as f64);
    let (bx, by) = (b.x as f64, b.y as f64);
    let len = (bx - ax).hypot(by - ay);
    if len < 1e-12 {
        return (px - ax).hypot(py - ay);
    }
    ((bx - ax) * (ay - py) - (ax - px) * (by - ay)).abs() / len
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn filled_rect(img: &mut GrayImage, x: u32, y: u32, w: u32, h: u32) {
        for yy in y..y + h {
            for xx in x..x + w {
                img.put_pixel(xx, yy, Luma([255]));
            }
        }
    }

    #[test]
    fn rectangle_contour_matches_opencv_conventions() {
        let mut img = GrayImage::new(64, 48);
        filled_rect(&mut img, 10, 5, 30, 20);

        let contours = find_contours(&img, ContourMode::External);
        assert_eq!(contours.len(), 1);
        let c = &contours[0];
        assert_eq!(
            c.bounding_rect(),
            Some(PixelRect {
                x: 10,
                y: 5,
                width: 30,
                height: 20
            })
        );
        assert!((c.area() - 29.0 * 19.0).abs() < 1e-9);
    }

    #[test]
    fn regions_touching_the_image_border_are_traced() {
        let mut img = GrayImage::new(80, 60);
        filled_rect(&mut img, 0, 10, 20, 15);
        filled_rect(&mut img, 60, 0, 20, 60);

        let rects: Vec<_> = find_contours(&img, ContourMode::External)
            .iter()
            .filter_map(Contour::bounding_rect)
            .collect();
        assert_eq!(
            rects,
            vec![
                PixelRect {
                    x: 60,
                    y: 0,
                    width: 20,
                    height: 60
                },
                PixelRect {
                    x: 0,
                    y: 10,
                    width: 20,
                    height: 15
                },
            ]
        );

        let full = GrayImage::from_pixel(8, 6, Luma([255]));
        let contours = find_contours(&full, ContourMode::External);
        assert_eq!(contours.len(), 1);
        assert_eq!(contours[0].area(), 7.0 * 5.0);
    }

    #[test]
    fn external_mode_skips_regions_inside_holes() {
        let mut img = GrayImage::new(60, 60);
        filled_rect(&mut img, 5, 5, 50, 50);
        // carve a hole and put an island inside it
        for y in 15..45 {
            for x in 15..45 {
                img.put_pixel(x, y, Luma([0]));
            }
        }
        filled_rect(&mut img, 25, 25, 10, 10);

        assert_eq!(find_contours(&img, ContourMode::External).len(), 1);
        assert_eq!(find_contours(&img, ContourMode::AllOuter).len(), 2);
    }

    #[test]
    fn douglas_peucker_keeps_square_corners() {
        let mut img = GrayImage::new(40, 40);
        filled_rect(&mut img, 8, 8, 20, 20);
        let contours = find_contours(&img, ContourMode::External);
        let c = &contours[0];

        let poly = approximate_polygon(&c.points, 0.03 * c.perimeter());
        assert_eq!(poly.len(), 4);
        for corner in [
            Point2::new(8, 8),
            Point2::new(27, 8),
            Point2::new(27, 27),
            Point2::new(8, 27),
        ] {
            assert!(poly.contains(&corner), "missing corner {corner:?} in {poly:?}");
        }
    }

    #[test]
    fn convexity_and_area_of_quads() {
        let square = [
            Point2::new(0.0_f32, 0.0),
            Point2::new(10.0, 0.0),
            Point2::new(10.0, 10.0),
            Point2::new(0.0, 10.0),
        ];
        assert!(is_convex_quad(&square));
        assert!((polygon_area(&square) - 100.0).abs() < 1e-9);

        let dart = [
            Point2::new(0.0_f32, 0.0),
            Point2::new(10.0, 0.0),
            Point2::new(3.0, 3.0),
            Point2::new(0.0, 10.0),
        ];
        assert!(!is_convex_quad(&dart));
    }

    #[test]
    fn rect_containment_with_margin() {
        let outer = PixelRect {
            x: 10,
            y: 10,
            width: 20,
            height: 20,
        };
        let edge = PixelRect {
            x: 9,
            y: 10,
            width: 21,
            height: 20,
        };
        assert!(!outer.contains_rect(&edge));
        assert!(outer.grown(2).contains_rect(&edge));
    }
}
