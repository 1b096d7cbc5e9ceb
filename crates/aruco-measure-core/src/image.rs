/// Borrowed row-major 8-bit grayscale buffer.
#[derive(Clone, Copy, Debug)]
pub struct GrayImageView<'a> {
    pub width: usize,
    pub height: usize,
    pub data: &'a [u8], // row-major, len = w*h
}

impl<'a> GrayImageView<'a> {
    /// Borrow an `image::GrayImage` without copying.
    pub fn from_luma(img: &'a ::image::GrayImage) -> Self {
        Self {
            width: img.width() as usize,
            height: img.height() as usize,
            data: img.as_raw(),
        }
    }

    #[inline]
    pub fn get(&self, x: i32, y: i32) -> u8 {
        if x < 0 || y < 0 || x >= self.width as i32 || y >= self.height as i32 {
            return 0;
        }
        self.data[y as usize * self.width + x as usize]
    }

    #[inline]
    pub fn contains(&self, x: f32, y: f32) -> bool {
        x >= 0.0
            && y >= 0.0
            && x <= self.width.saturating_sub(1) as f32
            && y <= self.height.saturating_sub(1) as f32
    }
}

#[inline]
pub fn sample_bilinear(src: &GrayImageView<'_>, x: f32, y: f32) -> f32 {
    let x0 = x.floor() as i32;
    let y0 = y.floor() as i32;
    let fx = x - x0 as f32;
    let fy = y - y0 as f32;

    let p00 = src.get(x0, y0) as f32;
    let p10 = src.get(x0 + 1, y0) as f32;
    let p01 = src.get(x0, y0 + 1) as f32;
    let p11 = src.get(x0 + 1, y0 + 1) as f32;

    let a = p00 + fx * (p10 - p00);
    let b = p01 + fx * (p11 - p01);
    a + fy * (b - a)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bilinear_interpolates_between_pixels() {
        let img = ::image::GrayImage::from_raw(2, 1, vec![0, 200]).expect("buffer");
        let view = GrayImageView::from_luma(&img);
        assert_eq!(sample_bilinear(&view, 0.0, 0.0), 0.0);
        assert!((sample_bilinear(&view, 0.5, 0.0) - 100.0).abs() < 1e-4);
        assert!(view.contains(1.0, 0.0));
        assert!(!view.contains(1.5, 0.0));
    }
}
