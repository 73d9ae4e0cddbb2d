//! Second-moment corner responses.
//!
//! The structure tensor `M = Σ w·[dx², dx·dy; dx·dy, dy²]` is built from Sobel
//! derivatives with a normalized Gaussian window. Harris scores
//! `det(M) − k·tr(M)²`; Shi-Tomasi scores the smaller eigenvalue
//! `(tr − sqrt((a − c)² + 4b²)) / 2`.
//!
//! The responses serve two roles: dense 2D detectors over a whole image and
//! a re-scoring filter for scale-space blobs.

use crate::candidate::{anms, nms_points, TopK};
use crate::filter::{gaussian_kernel, Gradients};
use crate::image::{Border, Image};
use crate::kernel::Kernel;
use crate::keypoint::{Point, ScalePoint};
use crate::refine::quad2d::refine_peak_2d;
use crate::scale::DogPyramid;
use crate::trace::{trace_event, trace_span};
use crate::util::math::gaussian_weight;
use crate::util::{KeyMatchError, KeyMatchResult};
use std::collections::hash_map::Entry;
use std::collections::HashMap;

/// Corner response function.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CornerKind {
    /// `det(M) − k·tr(M)²`.
    Harris,
    /// Smallest eigenvalue of `M`.
    #[default]
    ShiTomasi,
}

/// Corner response parameters.
#[derive(Clone, Debug, PartialEq)]
pub struct CornerConfig {
    pub kind: CornerKind,
    /// Harris sensitivity `k`.
    pub harris_k: f32,
    /// Minimum response for a point to be kept.
    pub threshold: f32,
    /// Window sigma for dense detection; blob filtering uses the blob sigma.
    pub window_sigma: f32,
    /// Chebyshev NMS radius for dense detection.
    pub nms_radius: f32,
    /// Maximum number of dense detections; 0 keeps all.
    pub max_points: usize,
    /// Border policy for derivatives.
    pub border: Border,
}

impl Default for CornerConfig {
    fn default() -> Self {
        Self {
            kind: CornerKind::ShiTomasi,
            harris_k: 0.04,
            threshold: 25e-5,
            window_sigma: 1.5,
            nms_radius: 3.0,
            max_points: 0,
            border: Border::Reflect,
        }
    }
}

impl CornerConfig {
    /// Checks parameter ranges.
    pub fn validate(&self) -> KeyMatchResult<()> {
        if !(self.window_sigma > 0.0) {
            return Err(KeyMatchError::InvalidConfig {
                reason: "window_sigma must be > 0",
            });
        }
        if !(self.harris_k >= 0.0) {
            return Err(KeyMatchError::InvalidConfig {
                reason: "harris_k must be >= 0",
            });
        }
        if self.threshold.is_nan() {
            return Err(KeyMatchError::InvalidConfig {
                reason: "threshold must not be NaN",
            });
        }
        Ok(())
    }

    /// Scores a structure tensor `(a, b, c) = (Σdx², Σdxdy, Σdy²)`.
    pub fn response(&self, a: f32, b: f32, c: f32) -> f32 {
        match self.kind {
            CornerKind::Harris => harris_score(a, b, c, self.harris_k),
            CornerKind::ShiTomasi => shi_tomasi_score(a, b, c),
        }
    }
}

/// Harris score of a structure tensor.
#[inline]
pub fn harris_score(a: f32, b: f32, c: f32, k: f32) -> f32 {
    let det = a * c - b * b;
    let trace = a + c;
    det - k * trace * trace
}

/// Smaller eigenvalue of a structure tensor.
#[inline]
pub fn shi_tomasi_score(a: f32, b: f32, c: f32) -> f32 {
    let trace = a + c;
    let disc = ((a - c) * (a - c) + 4.0 * b * b).sqrt();
    0.5 * (trace - disc)
}

/// Gaussian-weighted structure tensor around an integer pixel.
///
/// The window radius is `ceil(3σ)` and the weights are normalized to sum 1.
pub fn structure_tensor(
    grad: &Gradients,
    row: isize,
    col: isize,
    sigma: f32,
    border: Border,
) -> (f32, f32, f32) {
    let radius = (3.0 * sigma).ceil().max(1.0) as isize;
    let (mut a, mut b, mut c, mut wsum) = (0.0f32, 0.0f32, 0.0f32, 0.0f32);
    for dr in -radius..=radius {
        for dc in -radius..=radius {
            let w = gaussian_weight((dr * dr + dc * dc) as f32, sigma);
            let gx = border.sample(grad.dx(), row + dr, col + dc);
            let gy = border.sample(grad.dy(), row + dr, col + dc);
            a += w * gx * gx;
            b += w * gx * gy;
            c += w * gy * gy;
            wsum += w;
        }
    }
    (a / wsum, b / wsum, c / wsum)
}

/// Dense response image from Gaussian-windowed gradient products.
pub fn corner_response(img: &Image, cfg: &CornerConfig) -> KeyMatchResult<Image> {
    cfg.validate()?;
    let grad = Gradients::compute(img, cfg.border)?;
    let window = gaussian_kernel(cfg.window_sigma)?;
    let sxx = window.apply(&grad.dx().map(|v| v * v), cfg.border)?;
    let sxy = window.apply(&grad.dx().zip_map(grad.dy(), |x, y| x * y)?, cfg.border)?;
    let syy = window.apply(&grad.dy().map(|v| v * v), cfg.border)?;

    let data = sxx
        .data()
        .iter()
        .zip(sxy.data())
        .zip(syy.data())
        .map(|((&a, &b), &c)| cfg.response(a, b, c))
        .collect();
    Image::from_vec(data, img.height(), img.width(), 1)
}

/// Dense corner detection: threshold, 3x3 local maxima, sub-pixel fit, NMS.
pub fn detect_corners(img: &Image, cfg: &CornerConfig) -> KeyMatchResult<Vec<Point>> {
    let _span = trace_span!("detect_corners").entered();
    let response = corner_response(img, cfg)?;
    let (height, width) = response.dims();

    let mut candidates = Vec::new();
    for row in 1..height.saturating_sub(1) {
        for col in 1..width.saturating_sub(1) {
            let v = response.at(row, col);
            if !(v > cfg.threshold) {
                continue;
            }
            let mut s = [[0.0f32; 3]; 3];
            let mut is_peak = true;
            for (i, r) in (row - 1..=row + 1).enumerate() {
                for (j, c) in (col - 1..=col + 1).enumerate() {
                    s[i][j] = response.at(r, c);
                    // Plateaus resolve toward the upper-left sample.
                    let earlier = (r, c) < (row, col);
                    if (earlier && s[i][j] >= v) || (!earlier && s[i][j] > v) {
                        is_peak = false;
                    }
                }
            }
            if is_peak {
                let (r, c) = refine_peak_2d(row, col, s);
                candidates.push(Point::new(r, c, v));
            }
        }
    }

    let kept = nms_points(&candidates, cfg.nms_radius);
    let kept = if cfg.max_points > 0 {
        let mut top = TopK::new(cfg.max_points);
        top.extend(kept);
        top.into_sorted_desc()
    } else {
        kept
    };
    trace_event!("corners_detected", count = kept.len());
    Ok(kept)
}

/// Dense Harris detector.
pub fn harris(img: &Image, cfg: &CornerConfig) -> KeyMatchResult<Vec<Point>> {
    detect_corners(
        img,
        &CornerConfig {
            kind: CornerKind::Harris,
            ..cfg.clone()
        },
    )
}

/// Dense Shi-Tomasi detector.
pub fn shi_tomasi(img: &Image, cfg: &CornerConfig) -> KeyMatchResult<Vec<Point>> {
    detect_corners(
        img,
        &CornerConfig {
            kind: CornerKind::ShiTomasi,
            ..cfg.clone()
        },
    )
}

/// Re-scores blobs with the corner response of their DoG layer.
///
/// A blob is kept iff its response exceeds the threshold; its `value` is
/// replaced by that response. The window sigma is the blob's local sigma.
pub fn filter_blobs(
    blobs: &[ScalePoint],
    dog: &DogPyramid,
    cfg: &CornerConfig,
) -> KeyMatchResult<Vec<ScalePoint>> {
    cfg.validate()?;
    let _span = trace_span!("filter_blobs", blobs = blobs.len()).entered();
    let mut gradients: HashMap<(usize, usize), Gradients> = HashMap::new();
    let mut kept = Vec::with_capacity(blobs.len());

    for blob in blobs {
        let grad = match gradients.entry((blob.octave, blob.layer)) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let layer = dog
                    .octave(blob.octave)
                    .and_then(|octave| octave.layer(blob.layer))
                    .ok_or(KeyMatchError::IndexOutOfBounds {
                        index: blob.layer,
                        len: dog.layers_per_octave(),
                        context: "dog layer",
                    })?;
                entry.insert(Gradients::compute(layer.image(), cfg.border)?)
            }
        };
        let (a, b, c) = structure_tensor(
            grad,
            blob.local_row.round() as isize,
            blob.local_col.round() as isize,
            blob.sigma,
            cfg.border,
        );
        let response = cfg.response(a, b, c);
        if response > cfg.threshold {
            kept.push(ScalePoint {
                value: response,
                ..*blob
            });
        }
    }

    trace_event!("blobs_filtered", kept = kept.len());
    Ok(kept)
}

/// Moravec detector parameters.
#[derive(Clone, Debug, PartialEq)]
pub struct MoravecConfig {
    /// Patch half-size `p`; patches are `(2p + 1)²`.
    pub patch_radius: usize,
    /// Minimum response.
    pub threshold: f32,
    /// Points kept by adaptive NMS; 0 keeps every local maximum.
    pub max_points: usize,
    /// ANMS robustness factor.
    pub c_robust: f32,
}

impl Default for MoravecConfig {
    fn default() -> Self {
        Self {
            patch_radius: 1,
            threshold: 0.05,
            max_points: 500,
            c_robust: 0.9,
        }
    }
}

const SHIFTS: [(isize, isize); 8] = [
    (-1, -1),
    (-1, 0),
    (-1, 1),
    (0, -1),
    (0, 1),
    (1, -1),
    (1, 0),
    (1, 1),
];

/// Moravec response: minimum patch SSD over the 8 unit shifts.
pub fn moravec_response(img: &Image, patch_radius: usize) -> KeyMatchResult<Image> {
    img.ensure_gray()?;
    let (height, width) = img.dims();
    let p = patch_radius as isize;
    let reach = patch_radius + 1;
    let mut out = Image::new(height, width, 1)?;
    if height <= 2 * reach || width <= 2 * reach {
        return Ok(out);
    }
    for row in reach..height - reach {
        for col in reach..width - reach {
            let mut best = f32::INFINITY;
            for &(sr, sc) in &SHIFTS {
                let mut ssd = 0.0f32;
                for dr in -p..=p {
                    for dc in -p..=p {
                        let r = (row as isize + dr) as usize;
                        let c = (col as isize + dc) as usize;
                        let rs = (row as isize + dr + sr) as usize;
                        let cs = (col as isize + dc + sc) as usize;
                        let d = img.at(rs, cs) - img.at(r, c);
                        ssd += d * d;
                    }
                }
                best = best.min(ssd);
            }
            out.set(row, col, best);
        }
    }
    Ok(out)
}

/// Moravec detector with 3x3 local-maximum test and adaptive NMS.
pub fn moravec(img: &Image, cfg: &MoravecConfig) -> KeyMatchResult<Vec<Point>> {
    let response = moravec_response(img, cfg.patch_radius)?;
    let (height, width) = response.dims();
    let mut points = Vec::new();
    for row in 1..height.saturating_sub(1) {
        for col in 1..width.saturating_sub(1) {
            let v = response.at(row, col);
            if !(v > cfg.threshold) {
                continue;
            }
            let dominates = SHIFTS.iter().all(|&(dr, dc)| {
                let n = response.at((row as isize + dr) as usize, (col as isize + dc) as usize);
                if (dr, dc) < (0, 0) {
                    v > n
                } else {
                    v >= n
                }
            });
            if dominates {
                points.push(Point::new(row as f32, col as f32, v));
            }
        }
    }
    if cfg.max_points == 0 {
        return Ok(nms_points(&points, 0.0));
    }
    Ok(anms(&points, cfg.max_points, cfg.c_robust))
}

#[cfg(test)]
mod tests {
    use super::{harris, moravec, shi_tomasi, shi_tomasi_score, CornerConfig, MoravecConfig};
    use crate::image::Image;
    use crate::keypoint::Point;

    fn square(size: usize, lo: usize, hi: usize) -> Image {
        Image::from_fn(size, size, |r, c| {
            if (lo..hi).contains(&r) && (lo..hi).contains(&c) {
                1.0
            } else {
                0.0
            }
        })
        .unwrap()
    }

    fn near(points: &[Point], row: f32, col: f32, tol: f32) -> bool {
        points
            .iter()
            .any(|p| (p.row - row).abs() <= tol && (p.col - col).abs() <= tol)
    }

    #[test]
    fn eigenvalue_closed_form() {
        assert!((shi_tomasi_score(3.0, 0.0, 1.0) - 1.0).abs() < 1e-6);
        assert!(shi_tomasi_score(1.0, 1.0, 1.0).abs() < 1e-6);
    }

    #[test]
    fn dense_detectors_find_square_corners() {
        let img = square(40, 12, 28);
        let cfg = CornerConfig {
            threshold: 1e-2,
            ..CornerConfig::default()
        };
        for points in [harris(&img, &cfg).unwrap(), shi_tomasi(&img, &cfg).unwrap()] {
            assert_eq!(points.len(), 4, "{points:?}");
            for (r, c) in [(11.5, 11.5), (11.5, 27.5), (27.5, 11.5), (27.5, 27.5)] {
                assert!(near(&points, r, c, 2.0), "{points:?}");
            }
        }
    }

    #[test]
    fn flat_image_has_no_corners() {
        let img = Image::new(24, 24, 1).unwrap();
        assert!(harris(&img, &CornerConfig::default()).unwrap().is_empty());
        assert!(moravec(&img, &MoravecConfig::default()).unwrap().is_empty());
    }

    #[test]
    fn moravec_ignores_straight_edges() {
        let img = Image::from_fn(20, 20, |_, c| if c >= 10 { 1.0 } else { 0.0 }).unwrap();
        assert!(moravec(&img, &MoravecConfig::default()).unwrap().is_empty());
        let corners = moravec(&square(30, 10, 20), &MoravecConfig::default()).unwrap();
        assert!(near(&corners, 10.0, 10.0, 1.0));
    }
}
