//! Visual overlay of markers and measurements.

use crate::Measurement;
use ab_glyph::{FontVec, PxScale};
use aruco_measure_marker::MarkerDetection;
use image::{Rgb, RgbImage};
use imageproc::drawing::{
    draw_filled_circle_mut, draw_hollow_rect_mut, draw_line_segment_mut, draw_text_mut,
};
use imageproc::rect::Rect;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(thiserror::Error, Debug)]
pub enum AnnotateError {
    #[error("failed to prepare {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("invalid font file {0}")]
    Font(PathBuf),
}

/// Colors and sizes of the overlay.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnotationStyle {
    pub box_color: [u8; 3],
    pub marker_color: [u8; 3],
    pub corner_color: [u8; 3],
    /// Outline thickness in pixels.
    pub thickness: u32,
    /// Label text height in pixels.
    pub text_px: f32,
}

impl Default for AnnotationStyle {
    fn default() -> Self {
        Self {
            box_color: [0, 255, 0],
            marker_color: [0, 255, 0],
            corner_color: [255, 0, 0],
            thickness: 2,
            text_px: 16.0,
        }
    }
}

/// Draws detection results onto a copy of the source image.
///
/// Text (marker ids, dimension labels) needs a TrueType font; without one only
/// the geometry is drawn.
pub struct Annotator {
    style: AnnotationStyle,
    font: Option<FontVec>,
}

impl Default for Annotator {
    fn default() -> Self {
        Self::new(AnnotationStyle::default())
    }
}

impl Annotator {
    pub fn new(style: AnnotationStyle) -> Self {
        Self { style, font: None }
    }

    /// Load a TTF/OTF font for labels.
    pub fn with_font_file(mut self, path: impl AsRef<Path>) -> Result<Self, AnnotateError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|source| AnnotateError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let font = FontVec::try_from_vec(bytes).map_err(|_| AnnotateError::Font(path.into()))?;
        self.font = Some(font);
        Ok(self)
    }

    pub fn style(&self) -> &AnnotationStyle {
        &self.style
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    /// Draw marker outlines (first corner highlighted) and object boxes with labels.
    pub fn annotate(
        &self,
        image: &RgbImage,
        markers: &[MarkerDetection],
        measurements: &[Measurement],
    ) -> RgbImage {
        let mut canvas = image.clone();
        for m in markers {
            self.draw_marker(&mut canvas, m);
        }
        for m in measurements {
            self.draw_measurement(&mut canvas, m);
        }
        canvas
    }

    /// Write `image` to `path`, creating parent directories. The format
    /// follows the file extension.
    pub fn save(&self, image: &RgbImage, path: impl AsRef<Path>) -> Result<(), AnnotateError> {
        let path = path.as_ref();
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).map_err(|source| AnnotateError::Io {
                path: dir.to_path_buf(),
                source,
            })?;
        }
        image.save(path).map_err(|source| AnnotateError::Image {
            path: path.to_path_buf(),
            source,
        })?;
        log::info!("annotated image written to {}", path.display());
        Ok(())
    }

    fn draw_marker(&self, canvas: &mut RgbImage, m: &MarkerDetection) {
        let color = Rgb(self.style.marker_color);
        let t = self.style.thickness.max(1) as i32;
        for i in 0..4 {
            let a = m.corners[i];
            let b = m.corners[(i + 1) % 4];
            for d in -(t / 2)..=(t - 1) / 2 {
                let d = d as f32;
                draw_line_segment_mut(canvas, (a.x + d, a.y), (b.x + d, b.y), color);
                draw_line_segment_mut(canvas, (a.x, a.y + d), (b.x, b.y + d), color);
            }
        }
        let c0 = m.corners[0];
        draw_filled_circle_mut(
            canvas,
            (c0.x.round() as i32, c0.y.round() as i32),
            t + 1,
            Rgb(self.style.corner_color),
        );

        let center = m.center();
        self.draw_label(
            canvas,
            center.x as i32,
            center.y as i32,
            &format!("id={}", m.id),
            Rgb(self.style.corner_color),
        );
    }

    fn draw_measurement(&self, canvas: &mut RgbImage, m: &Measurement) {
        let color = Rgb(self.style.box_color);
        let b = m.bbox;
        for i in 0..self.style.thickness.max(1) {
            let (w, h) = (b.width + 2 * i, b.height + 2 * i);
            if w == 0 || h == 0 {
                continue;
            }
            draw_hollow_rect_mut(
                canvas,
                Rect::at(b.x - i as i32, b.y - i as i32).of_size(w, h),
                color,
            );
        }
        let text_y = b.y - 10 - self.style.text_px as i32;
        self.draw_label(canvas, b.x, text_y.max(0), &m.label(), color);
    }

    fn draw_label(&self, canvas: &mut RgbImage, x: i32, y: i32, text: &str, color: Rgb<u8>) {
        if let Some(font) = &self.font {
            draw_text_mut(canvas, color, x, y, PxScale::from(self.style.text_px), font, text);
        }
    }
}
