//! Image warping by a planar transform.

use super::Transform2d;
use crate::image::{Border, Image};
use crate::util::{KeyMatchError, KeyMatchResult};

/// Resamples `img` into a `height × width` canvas so that
/// `out(transform(p)) = img(p)`.
///
/// Each output pixel is mapped back through the inverse transform and
/// sampled bilinearly through `border`. Pixels whose preimage lies at
/// infinity are 0.
pub fn warp_perspective(
    img: &Image,
    transform: &Transform2d,
    height: usize,
    width: usize,
    border: Border,
) -> KeyMatchResult<Image> {
    img.ensure_gray()?;
    let inverse = transform.inverse().ok_or(KeyMatchError::DegenerateFit {
        reason: "transform is not invertible",
    })?;
    Image::from_fn(height, width, |r, c| {
        match inverse.apply(c as f64, r as f64) {
            Some((x, y)) => border.sample_bilinear(img, y as f32, x as f32),
            None => 0.0,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::warp_perspective;
    use crate::geometry::Transform2d;
    use crate::image::{Border, Image};

    #[test]
    fn translation_shifts_content() {
        let img = Image::from_fn(8, 8, |r, c| (r * 8 + c) as f32).unwrap();
        let t = Transform2d::similarity(0.0, 1.0, 2.0, 1.0);
        let out = warp_perspective(&img, &t, 8, 8, Border::Constant).unwrap();
        assert!((out.at(3, 4) - img.at(2, 2)).abs() < 1e-4);
        assert_eq!(out.at(0, 0), 0.0);
    }

    #[test]
    fn quarter_turn_moves_columns_to_rows() {
        let img = Image::from_fn(4, 4, |r, c| (r * 4 + c) as f32).unwrap();
        // (x, y) -> (3 - y, x)
        let t = Transform2d::new([[0.0, -1.0, 3.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]]);
        let out = warp_perspective(&img, &t, 4, 4, Border::Constant).unwrap();
        for r in 0..4 {
            for c in 0..4 {
                let (x, y) = (c as f64, r as f64);
                let (u, v) = t.apply(x, y).unwrap();
                assert!((out.at(v as usize, u as usize) - img.at(r, c)).abs() < 1e-4);
            }
        }
    }

    #[test]
    fn singular_transform_is_rejected() {
        let img = Image::new(4, 4, 1).unwrap();
        let t = Transform2d::new([[0.0; 3], [0.0; 3], [0.0, 0.0, 1.0]]);
        assert!(warp_perspective(&img, &t, 4, 4, Border::Reflect).is_err());
    }
}
