//! Printable marker rendering.

use crate::Dictionary;
use image::{GrayImage, Luma};

/// Render marker `id` as a `side_px` square (black border of one cell) framed
/// by `quiet_zone_px` of white on every side.
///
/// Returns `None` when `id` is outside the dictionary or `side_px` is too small
/// to give every cell at least one pixel.
pub fn render_marker(
    dict: &Dictionary,
    id: u32,
    side_px: u32,
    quiet_zone_px: u32,
) -> Option<GrayImage> {
    let code = *dict.codes.get(id as usize)?;
    let bits = dict.marker_size;
    let cells = bits + 2;
    if (side_px as usize) < cells {
        return None;
    }

    let full = side_px + 2 * quiet_zone_px;
    let mut img = GrayImage::from_pixel(full, full, Luma([255]));

    for py in 0..side_px {
        let cy = py as usize * cells / side_px as usize;
        for px in 0..side_px {
            let cx = px as usize * cells / side_px as usize;
            let is_border = cx == 0 || cy == 0 || cx + 1 == cells || cy + 1 == cells;
            let is_black = is_border || (code >> ((cy - 1) * bits + (cx - 1))) & 1 == 1;
            if is_black {
                img.put_pixel(px + quiet_zone_px, py + quiet_zone_px, Luma([0]));
            }
        }
    }

    Some(img)
}
