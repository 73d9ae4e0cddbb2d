//! Pixel-wise image operations.

use crate::image::Image;
use crate::util::{KeyMatchError, KeyMatchResult};

/// Converts a 1-, 3- or 4-channel image to single-channel luminance.
///
/// Color images use `0.299 R + 0.587 G + 0.114 B`; an alpha channel is ignored.
pub fn grayscale(img: &Image) -> KeyMatchResult<Image> {
    match img.channels() {
        1 => Ok(img.clone()),
        3 | 4 => {
            let ch = img.channels();
            let data = img
                .data()
                .chunks_exact(ch)
                .map(|px| 0.299 * px[0] + 0.587 * px[1] + 0.114 * px[2])
                .collect();
            Image::from_vec(data, img.height(), img.width(), 1)
        }
        got => Err(KeyMatchError::InvalidChannels { expected: 3, got }),
    }
}

/// Returns the `(min, max)` sample values.
pub fn min_max(img: &Image) -> (f32, f32) {
    img.data()
        .iter()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        })
}

/// Linearly rescales samples to `[0, 1]`; a flat image maps to zero.
pub fn normalize_min_max(img: &Image) -> Image {
    let (lo, hi) = min_max(img);
    let range = hi - lo;
    if !(range > f32::EPSILON) {
        return img.map(|_| 0.0);
    }
    img.map(|v| (v - lo) / range)
}

/// Pixel-wise `a - b`.
pub fn subtract(a: &Image, b: &Image) -> KeyMatchResult<Image> {
    a.zip_map(b, |x, y| x - y)
}

/// Quantizes a `[0, 1]` image to 8 bits with rounding and saturation.
pub fn to_u8(img: &Image) -> Vec<u8> {
    img.data()
        .iter()
        .map(|&v| (v * 255.0).round().clamp(0.0, 255.0) as u8)
        .collect()
}
