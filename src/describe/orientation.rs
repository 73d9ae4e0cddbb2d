//! Dominant gradient orientation.
//!
//! A circular, Gaussian-weighted neighborhood votes into a 36-bin histogram;
//! every sample is split linearly between the two bins whose centers enclose
//! its angle. The global maximum and at most one further local maximum above
//! `peak_ratio · max` are refined with a parabolic fit.

use crate::filter::Gradients;
use crate::image::Border;
use crate::refine::quad1d::peak_offset_clamped;
use crate::util::math::{gaussian_weight, wrap_tau};
use crate::util::{AngleBins, KeyMatchError, KeyMatchResult};

/// Orientation estimator parameters.
#[derive(Clone, Debug, PartialEq)]
pub struct OrientationConfig {
    /// Histogram bins over `[0, 2π)`.
    pub bins: usize,
    /// Window sigma relative to the keypoint sigma.
    pub sigma_c: f32,
    /// Secondary peaks must reach this fraction of the maximum.
    pub peak_ratio: f32,
    /// Maximum orientations per keypoint.
    pub max_peaks: usize,
}

impl Default for OrientationConfig {
    fn default() -> Self {
        Self {
            bins: 36,
            sigma_c: 1.5,
            peak_ratio: 0.8,
            max_peaks: 2,
        }
    }
}

impl OrientationConfig {
    /// Checks parameter ranges.
    pub fn validate(&self) -> KeyMatchResult<()> {
        if self.bins < 3 {
            return Err(KeyMatchError::InvalidConfig {
                reason: "orientation bins must be >= 3",
            });
        }
        if !(self.sigma_c > 0.0) {
            return Err(KeyMatchError::InvalidConfig {
                reason: "orientation sigma_c must be > 0",
            });
        }
        if !(self.peak_ratio > 0.0 && self.peak_ratio <= 1.0) {
            return Err(KeyMatchError::InvalidConfig {
                reason: "peak_ratio must be in (0, 1]",
            });
        }
        if self.max_peaks == 0 {
            return Err(KeyMatchError::InvalidConfig {
                reason: "max_peaks must be >= 1",
            });
        }
        Ok(())
    }
}

/// Builds the orientation histogram around a sub-pixel position.
///
/// `row`, `col` and `sigma` are in the pixel units of `grad`.
pub fn orientation_histogram(
    grad: &Gradients,
    row: f32,
    col: f32,
    sigma: f32,
    cfg: &OrientationConfig,
    border: Border,
) -> KeyMatchResult<Vec<f32>> {
    let bins = AngleBins::new(cfg.bins)?;
    let mut hist = vec![0.0f32; cfg.bins];
    let window = cfg.sigma_c * sigma;
    let radius = (3.0 * window).round().max(1.0) as isize;
    let (r0, c0) = (row.round() as isize, col.round() as isize);

    for dr in -radius..=radius {
        for dc in -radius..=radius {
            if dr * dr + dc * dc > radius * radius {
                continue;
            }
            let (r, c) = (r0 + dr, c0 + dc);
            let gx = border.sample(grad.dx(), r, c);
            let gy = border.sample(grad.dy(), r, c);
            let magnitude = gx.hypot(gy);
            if magnitude == 0.0 {
                continue;
            }
            let dy = r as f32 - row;
            let dx = c as f32 - col;
            let weight = gaussian_weight(dx * dx + dy * dy, window) * magnitude;
            let (lower, upper, frac) = bins.split(gy.atan2(gx));
            hist[lower] += weight * (1.0 - frac);
            hist[upper] += weight * frac;
        }
    }
    Ok(hist)
}

/// Extracts up to `max_peaks` refined orientations from a circular histogram.
///
/// The global maximum comes first; further peaks are local maxima reaching
/// `peak_ratio · max`, taken in bin order. An all-zero histogram yields none.
pub fn histogram_peaks(hist: &[f32], cfg: &OrientationConfig) -> Vec<f32> {
    let n = hist.len();
    let Some((max_idx, &max)) = hist
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(b.1).then_with(|| b.0.cmp(&a.0)))
    else {
        return Vec::new();
    };
    if !(max > 0.0) || n < 3 {
        return Vec::new();
    }

    let width = std::f32::consts::TAU / n as f32;
    let refine = |idx: usize| -> f32 {
        let fm = hist[(idx + n - 1) % n];
        let fp = hist[(idx + 1) % n];
        let offset = peak_offset_clamped(fm, hist[idx], fp);
        wrap_tau((idx as f32 + 0.5 + offset) * width)
    };

    let mut peaks = vec![refine(max_idx)];
    for idx in 0..n {
        if peaks.len() >= cfg.max_peaks {
            break;
        }
        if idx == max_idx {
            continue;
        }
        let v = hist[idx];
        let is_local_max = v > hist[(idx + n - 1) % n] && v > hist[(idx + 1) % n];
        if is_local_max && v >= cfg.peak_ratio * max {
            peaks.push(refine(idx));
        }
    }
    peaks
}

/// Dominant orientations of a keypoint, in radians `[0, 2π)`.
pub fn dominant_orientations(
    grad: &Gradients,
    row: f32,
    col: f32,
    sigma: f32,
    cfg: &OrientationConfig,
    border: Border,
) -> KeyMatchResult<Vec<f32>> {
    let hist = orientation_histogram(grad, row, col, sigma, cfg, border)?;
    Ok(histogram_peaks(&hist, cfg))
}

#[cfg(test)]
mod tests {
    use super::{dominant_orientations, histogram_peaks, OrientationConfig};
    use crate::filter::Gradients;
    use crate::image::{Border, Image};
    use crate::util::math::wrap_pi;
    use std::f32::consts::{FRAC_PI_2, TAU};

    #[test]
    fn single_bin_peak_sits_on_bin_center() {
        let mut hist = vec![0.0f32; 36];
        hist[9] = 1.0;
        let peaks = histogram_peaks(&hist, &OrientationConfig::default());
        assert_eq!(peaks.len(), 1);
        assert!((peaks[0] - 9.5 * TAU / 36.0).abs() < 1e-5);
    }

    #[test]
    fn secondary_peak_requires_ratio() {
        let mut hist = vec![0.0f32; 36];
        hist[3] = 1.0;
        hist[20] = 0.85;
        hist[30] = 0.5;
        let peaks = histogram_peaks(&hist, &OrientationConfig::default());
        assert_eq!(peaks.len(), 2);
        assert!((peaks[1] - 20.5 * TAU / 36.0).abs() < 1e-5);
    }

    #[test]
    fn empty_histogram_has_no_peaks() {
        let hist = vec![0.0f32; 36];
        assert!(histogram_peaks(&hist, &OrientationConfig::default()).is_empty());
    }

    #[test]
    fn vertical_ramp_points_down() {
        let img = Image::from_fn(21, 21, |r, _| r as f32 * 0.1).unwrap();
        let grad = Gradients::compute(&img, Border::Replicate).unwrap();
        let angles =
            dominant_orientations(&grad, 10.0, 10.0, 1.6, &OrientationConfig::default(), Border::Replicate)
                .unwrap();
        assert!(!angles.is_empty());
        assert!(wrap_pi(angles[0] - FRAC_PI_2).abs() < 0.1);
    }
}
