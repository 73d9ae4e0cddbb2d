//! Scalar reference convolution and distance kernels.

use crate::image::{Border, Image};
use crate::kernel::Kernel2d;
use crate::util::KeyMatchResult;

/// Correlates one output row with horizontal taps.
pub(crate) fn row_pass(img: &Image, taps: &[f32], border: Border, y: usize, out: &mut [f32]) {
    let width = img.width();
    let half = taps.len() / 2;
    let src = &img.data()[y * width..(y + 1) * width];
    for (x, dst) in out.iter_mut().enumerate() {
        let interior = x >= half && x + half < width;
        let mut acc = 0.0f32;
        if interior {
            let window = &src[x - half..=x + half];
            for (&t, &v) in taps.iter().zip(window) {
                acc += t * v;
            }
        } else {
            for (k, &t) in taps.iter().enumerate() {
                let col = x as isize + k as isize - half as isize;
                acc += t * border.sample(img, y as isize, col);
            }
        }
        *dst = acc;
    }
}

/// Correlates one output row with vertical taps.
pub(crate) fn col_pass(img: &Image, taps: &[f32], border: Border, y: usize, out: &mut [f32]) {
    let width = img.width();
    let half = taps.len() / 2;
    out.iter_mut().for_each(|v| *v = 0.0);
    for (k, &t) in taps.iter().enumerate() {
        let row = y as isize + k as isize - half as isize;
        if let Some(r) = border.resolve(row, img.height()) {
            let src = &img.data()[r * width..(r + 1) * width];
            for (dst, &v) in out.iter_mut().zip(src) {
                *dst += t * v;
            }
        }
    }
}

/// Correlates one output row with a dense kernel.
pub(crate) fn dense_pass(img: &Image, kernel: &Kernel2d, border: Border, y: usize, out: &mut [f32]) {
    let kh = kernel.height() / 2;
    let kw = kernel.width() / 2;
    for (x, dst) in out.iter_mut().enumerate() {
        let mut acc = 0.0f32;
        for ky in 0..kernel.height() {
            let row = y as isize + ky as isize - kh as isize;
            let taps = &kernel.data()[ky * kernel.width()..(ky + 1) * kernel.width()];
            for (kx, &t) in taps.iter().enumerate() {
                let col = x as isize + kx as isize - kw as isize;
                acc += t * border.sample(img, row, col);
            }
        }
        *dst = acc;
    }
}

fn run_rows<F>(img: &Image, pass: F) -> KeyMatchResult<Image>
where
    F: Fn(usize, &mut [f32]),
{
    let mut out = Image::new(img.height(), img.width(), 1)?;
    let width = img.width();
    for (y, row) in out.data_mut().chunks_exact_mut(width).enumerate() {
        pass(y, row);
    }
    Ok(out)
}

/// Horizontal correlation of a single-channel image.
pub fn correlate_rows(img: &Image, taps: &[f32], border: Border) -> KeyMatchResult<Image> {
    img.ensure_gray()?;
    run_rows(img, |y, row| row_pass(img, taps, border, y, row))
}

/// Vertical correlation of a single-channel image.
pub fn correlate_cols(img: &Image, taps: &[f32], border: Border) -> KeyMatchResult<Image> {
    img.ensure_gray()?;
    run_rows(img, |y, row| col_pass(img, taps, border, y, row))
}

/// Dense 2D correlation of a single-channel image.
pub fn correlate_2d(img: &Image, kernel: &Kernel2d, border: Border) -> KeyMatchResult<Image> {
    img.ensure_gray()?;
    run_rows(img, |y, row| dense_pass(img, kernel, border, y, row))
}

/// Squared Euclidean distance between equal-length slices.
#[inline]
pub fn squared_distance(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());
    a.iter()
        .zip(b)
        .map(|(&x, &y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

/// Dot product between equal-length slices.
#[inline]
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());
    a.iter().zip(b).map(|(&x, &y)| x * y).sum()
}

#[cfg(test)]
mod tests {
    use super::{correlate_cols, correlate_rows, squared_distance};
    use crate::image::{Border, Image};

    #[test]
    fn derivative_taps_follow_correlation_sign() {
        let img = Image::from_fn(3, 5, |_, c| c as f32).unwrap();
        let dx = correlate_rows(&img, &[-1.0, 0.0, 1.0], Border::Replicate).unwrap();
        assert_eq!(dx.at(1, 2), 2.0);
        assert_eq!(dx.at(1, 0), 1.0);
    }

    #[test]
    fn constant_border_pads_with_zero() {
        let img = Image::from_vec(vec![1.0; 9], 3, 3, 1).unwrap();
        let sum = correlate_cols(&img, &[1.0, 1.0, 1.0], Border::Constant).unwrap();
        assert_eq!(sum.at(0, 1), 2.0);
        assert_eq!(sum.at(1, 1), 3.0);
    }

    #[test]
    fn squared_distance_sums_components() {
        assert_eq!(squared_distance(&[1.0, 2.0, 3.0], &[1.0, 0.0, 0.0]), 13.0);
    }
}
