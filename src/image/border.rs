//! Out-of-bounds sampling policies.

use crate::image::Image;

/// Strategy for reading pixels outside the image domain.
///
/// Every policy is total: `sample` accepts any signed coordinate and never
/// indexes out of bounds.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Border {
    /// Zero outside the image.
    Constant,
    /// Clamp to the nearest edge pixel.
    Replicate,
    /// Mirror around the edge pixel without repeating it (`dcb|abcd|cba`).
    #[default]
    Reflect,
    /// Periodic continuation.
    Wrap,
}

impl Border {
    /// Maps a signed index onto `[0, len)`, or `None` for constant padding.
    #[inline]
    pub fn resolve(self, idx: isize, len: usize) -> Option<usize> {
        debug_assert!(len > 0);
        let n = len as isize;
        if (0..n).contains(&idx) {
            return Some(idx as usize);
        }
        match self {
            Border::Constant => None,
            Border::Replicate => Some(idx.clamp(0, n - 1) as usize),
            Border::Reflect => {
                if n == 1 {
                    return Some(0);
                }
                let period = 2 * (n - 1);
                let m = idx.rem_euclid(period);
                Some(if m < n { m } else { period - m } as usize)
            }
            Border::Wrap => Some(idx.rem_euclid(n) as usize),
        }
    }

    /// Reads the first channel at `(row, col)` under this policy.
    #[inline]
    pub fn sample(self, img: &Image, row: isize, col: isize) -> f32 {
        match (
            self.resolve(row, img.height()),
            self.resolve(col, img.width()),
        ) {
            (Some(r), Some(c)) => img.at(r, c),
            _ => 0.0,
        }
    }

    /// Bilinear interpolation at a fractional `(row, col)`.
    pub fn sample_bilinear(self, img: &Image, row: f32, col: f32) -> f32 {
        let r0 = row.floor();
        let c0 = col.floor();
        let fr = row - r0;
        let fc = col - c0;
        let (r0, c0) = (r0 as isize, c0 as isize);
        let a = self.sample(img, r0, c0);
        let b = self.sample(img, r0, c0 + 1);
        let c = self.sample(img, r0 + 1, c0);
        let d = self.sample(img, r0 + 1, c0 + 1);
        let top = a + (b - a) * fc;
        let bottom = c + (d - c) * fc;
        top + (bottom - top) * fr
    }
}

#[cfg(test)]
mod tests {
    use super::Border;
    use crate::image::Image;

    fn ramp() -> Image {
        Image::from_fn(3, 4, |r, c| (r * 10 + c) as f32).unwrap()
    }

    #[test]
    fn reflect_skips_edge_pixel() {
        assert_eq!(Border::Reflect.resolve(-1, 4), Some(1));
        assert_eq!(Border::Reflect.resolve(4, 4), Some(2));
        assert_eq!(Border::Reflect.resolve(-7, 4), Some(1));
        assert_eq!(Border::Reflect.resolve(9, 1), Some(0));
    }

    #[test]
    fn policies_match_their_contract() {
        let img = ramp();
        assert_eq!(Border::Constant.sample(&img, -1, 0), 0.0);
        assert_eq!(Border::Replicate.sample(&img, -5, 7), 3.0);
        assert_eq!(Border::Reflect.sample(&img, 0, -2), 2.0);
        assert_eq!(Border::Wrap.sample(&img, 3, -1), 3.0);
    }

    #[test]
    fn extreme_offsets_stay_finite() {
        let img = ramp();
        for border in [
            Border::Constant,
            Border::Replicate,
            Border::Reflect,
            Border::Wrap,
        ] {
            for &(r, c) in &[(isize::MIN / 2, 0), (0, isize::MAX / 2), (-123_457, 98_765)] {
                assert!(border.sample(&img, r, c).is_finite());
            }
        }
    }

    #[test]
    fn bilinear_interpolates_ramp() {
        let img = ramp();
        let v = Border::Replicate.sample_bilinear(&img, 0.5, 1.25);
        assert!((v - 6.25).abs() < 1e-5);
    }
}
