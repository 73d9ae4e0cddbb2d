//! Geometric verification of descriptor matches.
//!
//! Points follow image convention: `x` is the column, `y` the row. Matches
//! are read as object (query) → scene (train) correspondences, and every
//! fitted [`Transform2d`] maps object coordinates into the scene.

pub mod dlt;
pub mod hough;
pub mod ransac;
pub mod warp;

pub use dlt::{fit_affine, fit_homography};
pub use hough::{hough_hypotheses, hough_pose, HoughConfig};
pub use ransac::{ransac_homography, RansacConfig};
pub use warp::warp_perspective;

use crate::keypoint::Keypoint;
use crate::search::Match;
use nalgebra::Matrix3;

/// Point pair `(source, destination)` as `[x, y]`.
pub type Correspondence = ([f64; 2], [f64; 2]);

/// 3×3 row-major planar transform.
///
/// Projective transforms are scaled so that `m[2][2] = 1`; affine ones keep
/// the last row at `(0, 0, 1)`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform2d {
    pub m: [[f64; 3]; 3],
}

impl Default for Transform2d {
    fn default() -> Self {
        Self::identity()
    }
}

impl Transform2d {
    pub fn new(m: [[f64; 3]; 3]) -> Self {
        Self { m }
    }

    pub fn identity() -> Self {
        Self::new([[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]])
    }

    /// Rotation by `angle` (radians, x toward y), uniform `scale`, then
    /// translation.
    pub fn similarity(angle: f64, scale: f64, tx: f64, ty: f64) -> Self {
        let (s, c) = angle.sin_cos();
        Self::new([
            [scale * c, -scale * s, tx],
            [scale * s, scale * c, ty],
            [0.0, 0.0, 1.0],
        ])
    }

    /// Maps `(x, y)`; `None` when the point lands at infinity.
    pub fn apply(&self, x: f64, y: f64) -> Option<(f64, f64)> {
        let m = &self.m;
        let w = m[2][0] * x + m[2][1] * y + m[2][2];
        if w.abs() < f64::EPSILON {
            return None;
        }
        let u = (m[0][0] * x + m[0][1] * y + m[0][2]) / w;
        let v = (m[1][0] * x + m[1][1] * y + m[1][2]) / w;
        (u.is_finite() && v.is_finite()).then_some((u, v))
    }

    /// `self ∘ other`: applies `other` first.
    ///
    /// The product is rescaled to `m[2][2] = 1` when that entry is non-zero.
    pub fn compose(&self, other: &Self) -> Self {
        let product = self.to_matrix() * other.to_matrix();
        Self::from_matrix(&product).unwrap_or_else(|| Self::from_raw(&product))
    }

    /// Inverse transform, `None` when singular.
    pub fn inverse(&self) -> Option<Self> {
        let inv = self.to_matrix().try_inverse()?;
        Self::from_matrix(&inv)
    }

    /// Rotation angle and uniform scale of the linear part.
    ///
    /// The scale is `sqrt(|det|)` of the upper-left 2×2 block; the angle is
    /// that of its first column, in `(-π, π]`.
    pub fn rotation_scale(&self) -> (f64, f64) {
        let m = &self.m;
        let det = m[0][0] * m[1][1] - m[0][1] * m[1][0];
        (m[1][0].atan2(m[0][0]), det.abs().sqrt())
    }

    /// True when the last row is `(0, 0, 1)`.
    pub fn is_affine(&self) -> bool {
        self.m[2][0] == 0.0 && self.m[2][1] == 0.0 && self.m[2][2] == 1.0
    }

    pub(crate) fn to_matrix(self) -> Matrix3<f64> {
        let m = &self.m;
        Matrix3::new(
            m[0][0], m[0][1], m[0][2], m[1][0], m[1][1], m[1][2], m[2][0], m[2][1], m[2][2],
        )
    }

    fn from_raw(h: &Matrix3<f64>) -> Self {
        let mut m = [[0.0; 3]; 3];
        for (r, row) in m.iter_mut().enumerate() {
            for (c, v) in row.iter_mut().enumerate() {
                *v = h[(r, c)];
            }
        }
        Self { m }
    }

    /// Converts and rescales so that the bottom-right entry is 1.
    pub(crate) fn from_matrix(h: &Matrix3<f64>) -> Option<Self> {
        let w = h[(2, 2)];
        if !w.is_finite() || w.abs() < 1e-12 {
            return None;
        }
        let Self { mut m } = Self::from_raw(h);
        m.iter_mut().flatten().for_each(|v| *v /= w);
        m.iter().flatten().all(|v| v.is_finite()).then_some(Self { m })
    }

    /// Reprojection distance of a correspondence; infinite when the source
    /// point does not project.
    pub fn reprojection_error(&self, pair: &Correspondence) -> f64 {
        let ([x, y], [u, v]) = *pair;
        match self.apply(x, y) {
            Some((px, py)) => (px - u).hypot(py - v),
            None => f64::INFINITY,
        }
    }
}

/// Transform with the matches that support it.
#[derive(Clone, Debug, PartialEq)]
pub struct Hypothesis<K> {
    pub transform: Transform2d,
    pub support: Vec<Match<K>>,
}

impl<K> Hypothesis<K> {
    /// Fraction of `total` matches that support the hypothesis.
    pub fn confidence(&self, total: usize) -> f64 {
        if total == 0 {
            0.0
        } else {
            self.support.len() as f64 / total as f64
        }
    }
}

/// Object → scene point pairs of a match set, using sub-pixel positions.
pub fn correspondences<K: Keypoint>(matches: &[Match<K>]) -> Vec<Correspondence> {
    matches
        .iter()
        .map(|m| {
            (
                [f64::from(m.query.x()), f64::from(m.query.y())],
                [f64::from(m.train.x()), f64::from(m.train.y())],
            )
        })
        .collect()
}

/// Matches whose reprojection error is strictly below `threshold`.
pub fn inliers<K: Keypoint>(
    transform: &Transform2d,
    matches: &[Match<K>],
    threshold: f64,
) -> Vec<Match<K>> {
    matches
        .iter()
        .zip(correspondences(matches).iter())
        .filter(|(_, pair)| transform.reprojection_error(pair) < threshold)
        .map(|(m, _)| *m)
        .collect()
}

pub(crate) fn inlier_indices(
    transform: &Transform2d,
    pairs: &[Correspondence],
    threshold: f64,
) -> Vec<usize> {
    pairs
        .iter()
        .enumerate()
        .filter(|(_, pair)| transform.reprojection_error(pair) < threshold)
        .map(|(i, _)| i)
        .collect()
}

/// Picks the hypothesis with the largest support ratio.
///
/// Returns `None` when there are no hypotheses or the best one falls below
/// `min_confidence`. Earlier hypotheses win ties.
pub fn verify<K: Clone>(
    hypotheses: &[Hypothesis<K>],
    total_matches: usize,
    min_confidence: f64,
) -> Option<(Hypothesis<K>, f64)> {
    let mut best: Option<(&Hypothesis<K>, f64)> = None;
    for h in hypotheses {
        let confidence = h.confidence(total_matches);
        if best.map_or(true, |(_, c)| confidence > c) {
            best = Some((h, confidence));
        }
    }
    let (h, confidence) = best?;
    (confidence >= min_confidence).then(|| (h.clone(), confidence))
}
