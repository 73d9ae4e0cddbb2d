//! 2x2 area downsampling.
//!
//! Each output pixel is the mean of a 2x2 input block; odd trailing rows and
//! columns are dropped. This is the resampling step between octaves of the
//! scale space.

use crate::image::Image;
use crate::util::{KeyMatchError, KeyMatchResult};

/// Halves both dimensions of a single-channel image by block averaging.
pub fn downsample2x(src: &Image) -> KeyMatchResult<Image> {
    src.ensure_gray()?;
    if src.width() < 2 || src.height() < 2 {
        return Err(KeyMatchError::InvalidDimensions {
            width: src.width() / 2,
            height: src.height() / 2,
        });
    }

    let dst_width = src.width() / 2;
    let dst_height = src.height() / 2;
    let mut dst = Vec::with_capacity(dst_width * dst_height);

    for y in 0..dst_height {
        let row0 = src.row(y * 2).ok_or(KeyMatchError::IndexOutOfBounds {
            index: y * 2,
            len: src.height(),
            context: "row",
        })?;
        let row1 = src.row(y * 2 + 1).ok_or(KeyMatchError::IndexOutOfBounds {
            index: y * 2 + 1,
            len: src.height(),
            context: "row",
        })?;

        for x in 0..dst_width {
            let sum = row0[2 * x] + row0[2 * x + 1] + row1[2 * x] + row1[2 * x + 1];
            dst.push(0.25 * sum);
        }
    }

    Image::from_vec(dst, dst_height, dst_width, 1)
}

#[cfg(test)]
mod tests {
    use super::downsample2x;
    use crate::image::Image;

    #[test]
    fn averages_blocks_and_drops_odd_edge() {
        let img = Image::from_fn(3, 5, |r, c| (r * 5 + c) as f32).unwrap();
        let half = downsample2x(&img).unwrap();
        assert_eq!(half.dims(), (1, 2));
        assert_eq!(half.data(), &[3.0, 5.0]);
    }

    #[test]
    fn rejects_single_pixel_axis() {
        let img = Image::new(1, 8, 1).unwrap();
        assert!(downsample2x(&img).is_err());
    }
}
