//! Global (Otsu) and local (box-mean) thresholding.
//!
//! Both binarizations are *inverse*: dark pixels become foreground (255), which
//! is what marker borders and objects on a light background look like.

use crate::GrayImageView;
use image::{GrayImage, Luma};

/// Compute Otsu threshold from a set of sample intensities.
///
/// Pixels `<= threshold` form the dark class. A uniform sample set has no
/// split and yields `0`, as OpenCV does, so only pure black stays dark.
pub fn otsu_threshold_from_samples(samples: &[u8]) -> u8 {
    if samples.is_empty() {
        return 127;
    }

    let mut min_v = 255u8;
    let mut max_v = 0u8;
    for &v in samples {
        min_v = min_v.min(v);
        max_v = max_v.max(v);
    }
    if min_v == max_v {
        return 0;
    }

    let mut hist = [0u32; 256];
    for &v in samples {
        hist[v as usize] += 1;
    }
    let nonzero_bins = hist.iter().filter(|&&h| h > 0).count();
    if nonzero_bins <= 2 {
        return ((min_v as u16 + max_v as u16) / 2) as u8;
    }

    let total: f64 = samples.len() as f64;
    let sum_total: f64 = hist
        .iter()
        .enumerate()
        .map(|(i, &h)| (i as f64) * (h as f64))
        .sum();

    let mut sum_b = 0f64;
    let mut w_b = 0f64;
    let mut best_var = -1f64;
    let mut best_t = 127u8;

    for (t, &h) in hist.iter().enumerate() {
        w_b += h as f64;
        if w_b < 1.0 {
            continue;
        }
        let w_f = total - w_b;
        if w_f < 1.0 {
            break;
        }

        sum_b += (t as f64) * (h as f64);
        let m_b = sum_b / w_b;
        let m_f = (sum_total - sum_b) / w_f;

        let var_between = w_b * w_f * (m_b - m_f) * (m_b - m_f);
        if var_between > best_var {
            best_var = var_between;
            best_t = t as u8;
        }
    }

    best_t
}

/// Otsu threshold over every pixel of the image.
pub fn otsu_threshold(img: &GrayImageView<'_>) -> u8 {
    otsu_threshold_from_samples(img.data)
}

/// Inverse binary threshold: `255` where `v <= threshold`, `0` elsewhere.
pub fn threshold_binary_inv(img: &GrayImageView<'_>, threshold: u8) -> GrayImage {
    let data = img
        .data
        .iter()
        .map(|&v| if v <= threshold { 255 } else { 0 })
        .collect();
    GrayImage::from_raw(img.width as u32, img.height as u32, data)
        .unwrap_or_else(|| GrayImage::new(img.width as u32, img.height as u32))
}

/// Inverse local-mean threshold: `255` where `v <= mean(window) - offset`.
///
/// `window` is the side of the square averaging box (forced odd, at least 3).
/// The box is clipped at the image border.
pub fn adaptive_threshold_inv(img: &GrayImageView<'_>, window: u32, offset: i16) -> GrayImage {
    let (w, h) = (img.width, img.height);
    let mut out = GrayImage::new(w as u32, h as u32);
    if w == 0 || h == 0 {
        return out;
    }

    let radius = (window.max(3) / 2) as usize;

    // integral[(y) * (w+1) + x] = sum of pixels in [0, x) x [0, y)
    let stride = w + 1;
    let mut integral = vec![0u64; stride * (h + 1)];
    for y in 0..h {
        let mut row = 0u64;
        for x in 0..w {
            row += img.data[y * w + x] as u64;
            integral[(y + 1) * stride + x + 1] = integral[y * stride + x + 1] + row;
        }
    }

    for y in 0..h {
        let y0 = y.saturating_sub(radius);
        let y1 = (y + radius + 1).min(h);
        for x in 0..w {
            let x0 = x.saturating_sub(radius);
            let x1 = (x + radius + 1).min(w);
            let sum = integral[y1 * stride + x1] + integral[y0 * stride + x0]
                - integral[y0 * stride + x1]
                - integral[y1 * stride + x0];
            let count = ((y1 - y0) * (x1 - x0)) as f32;
            let t = sum as f32 / count - offset as f32;
            if (img.data[y * w + x] as f32) <= t {
                out.put_pixel(x as u32, y as u32, Luma([255]));
            }
        }
    }

    out
}
