//! Rayon-parallel convolution (feature-gated).
//!
//! Output rows are written through disjoint chunks, so the result is
//! identical to the scalar path regardless of scheduling.

use crate::image::{Border, Image};
use crate::kernel::scalar::{col_pass, dense_pass, row_pass};
use crate::kernel::Kernel2d;
use crate::util::KeyMatchResult;
use rayon::prelude::*;

fn run_rows_par<F>(img: &Image, pass: F) -> KeyMatchResult<Image>
where
    F: Fn(usize, &mut [f32]) + Sync,
{
    let mut out = Image::new(img.height(), img.width(), 1)?;
    let width = img.width();
    out.data_mut()
        .par_chunks_exact_mut(width)
        .enumerate()
        .for_each(|(y, row)| pass(y, row));
    Ok(out)
}

/// Row-parallel horizontal correlation.
pub fn correlate_rows_par(img: &Image, taps: &[f32], border: Border) -> KeyMatchResult<Image> {
    img.ensure_gray()?;
    run_rows_par(img, |y, row| row_pass(img, taps, border, y, row))
}

/// Row-parallel vertical correlation.
pub fn correlate_cols_par(img: &Image, taps: &[f32], border: Border) -> KeyMatchResult<Image> {
    img.ensure_gray()?;
    run_rows_par(img, |y, row| col_pass(img, taps, border, y, row))
}

/// Row-parallel dense correlation.
pub fn correlate_2d_par(img: &Image, kernel: &Kernel2d, border: Border) -> KeyMatchResult<Image> {
    img.ensure_gray()?;
    run_rows_par(img, |y, row| dense_pass(img, kernel, border, y, row))
}

#[cfg(test)]
mod tests {
    use super::correlate_rows_par;
    use crate::image::{Border, Image};
    use crate::kernel::scalar::correlate_rows;

    #[test]
    fn parallel_rows_match_scalar() {
        let img = Image::from_fn(17, 23, |r, c| ((r * 7 + c * 13) % 19) as f32).unwrap();
        let taps = [0.25, 0.5, 0.25];
        let a = correlate_rows(&img, &taps, Border::Reflect).unwrap();
        let b = correlate_rows_par(&img, &taps, Border::Reflect).unwrap();
        assert_eq!(a, b);
    }
}
