//! Foreground object segmentation.

use aruco_measure_core::{
    find_contours, otsu_threshold, threshold_binary_inv, Contour, ContourMode, GrayImageView,
};
use image::{GrayImage, RgbImage};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Splits an image into dark foreground regions on a lighter background.
///
/// The threshold is chosen per image with Otsu's method; pixels at or below it
/// are foreground. Only outermost borders are returned, so holes and anything
/// nested inside an object are ignored. Regions touching the image border are
/// included. A uniform image has no foreground unless it is pure black, which
/// is then a single full-frame region. No size filtering happens here.
#[derive(Clone, Copy, Debug, Default)]
pub struct ObjectSegmenter;

impl ObjectSegmenter {
    pub fn new() -> Self {
        Self
    }

    #[cfg_attr(
        feature = "tracing",
        instrument(level = "debug", skip(self, image), fields(width = image.width(), height = image.height()))
    )]
    pub fn segment(&self, image: &GrayImage) -> Vec<Contour> {
        let view = GrayImageView::from_luma(image);
        let threshold = otsu_threshold(&view);
        let binary = threshold_binary_inv(&view, threshold);
        let contours = find_contours(&binary, ContourMode::External);
        log::debug!(
            "otsu threshold {threshold}, {} external contours",
            contours.len()
        );
        contours
    }

    pub fn segment_rgb(&self, image: &RgbImage) -> Vec<Contour> {
        self.segment(&image::imageops::grayscale(image))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aruco_measure_core::PixelRect;
    use image::Luma;

    fn fill(img: &mut GrayImage, x0: u32, y0: u32, w: u32, h: u32, v: u8) {
        for y in y0..y0 + h {
            for x in x0..x0 + w {
                img.put_pixel(x, y, Luma([v]));
            }
        }
    }

    #[test]
    fn finds_dark_objects_in_raster_order() {
        let mut img = GrayImage::from_pixel(200, 120, Luma([235]));
        fill(&mut img, 120, 10, 40, 30, 30);
        fill(&mut img, 20, 60, 60, 40, 40);

        let contours = ObjectSegmenter::new().segment(&img);
        assert_eq!(contours.len(), 2);
        assert_eq!(
            contours[0].bounding_rect(),
            Some(PixelRect {
                x: 120,
                y: 10,
                width: 40,
                height: 30
            })
        );
        assert_eq!(contours[0].area(), 39.0 * 29.0);
        assert_eq!(contours[1].bounding_rect().map(|r| (r.x, r.y)), Some((20, 60)));
    }

    #[test]
    fn nested_regions_are_not_reported() {
        let mut img = GrayImage::from_pixel(120, 120, Luma([240]));
        fill(&mut img, 10, 10, 100, 100, 20);
        fill(&mut img, 30, 30, 60, 60, 240);
        fill(&mut img, 50, 50, 20, 20, 20);

        let contours = ObjectSegmenter::new().segment(&img);
        assert_eq!(contours.len(), 1);
        assert_eq!(contours[0].bounding_rect().map(|r| r.width), Some(100));
    }

    #[test]
    fn objects_on_the_left_edge_are_found() {
        let mut img = GrayImage::from_pixel(300, 200, Luma([230]));
        fill(&mut img, 0, 50, 100, 60, 25);

        let contours = ObjectSegmenter::new().segment(&img);
        assert_eq!(contours.len(), 1);
        assert_eq!(
            contours[0].bounding_rect(),
            Some(PixelRect {
                x: 0,
                y: 50,
                width: 100,
                height: 60
            })
        );
    }

    #[test]
    fn flat_light_image_has_no_foreground() {
        let img = GrayImage::from_pixel(50, 40, Luma([200]));
        assert!(ObjectSegmenter::new().segment(&img).is_empty());
    }

    #[test]
    fn flat_black_image_is_one_full_frame_region() {
        let img = GrayImage::from_pixel(50, 40, Luma([0]));
        let contours = ObjectSegmenter::new().segment(&img);
        assert_eq!(contours.len(), 1);
        assert_eq!(
            contours[0].bounding_rect(),
            Some(PixelRect {
                x: 0,
                y: 0,
                width: 50,
                height: 40
            })
        );
    }
}
