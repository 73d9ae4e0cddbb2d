//! Quadratic 1D fitting for histogram peak refinement.

/// Estimates the sub-sample peak offset for a quadratic fit.
///
/// Given samples at `x = -1, 0, +1` (`fm`, `f0`, `fp`), this returns the peak
/// offset `dx` in `[-1, 1]` when the fitted parabola is concave and stable.
///
/// The fitted parabola is assumed to be locally smooth and unimodal; if the
/// curvature is non-negative or ill-conditioned, `None` is returned.
pub fn quad_peak_offset_1d(fm: f32, f0: f32, fp: f32) -> Option<f32> {
    if !fm.is_finite() || !f0.is_finite() || !fp.is_finite() {
        return None;
    }

    let denom = fm - 2.0 * f0 + fp;
    let eps = 1e-6f32;
    if denom.abs() < eps || denom >= 0.0 {
        return None;
    }

    let dx = 0.5 * (fm - fp) / denom;
    if dx.is_finite() && dx.abs() <= 1.0 {
        Some(dx)
    } else {
        None
    }
}

/// Parabolic peak offset clamped to `[-0.5, 0.5]`.
///
/// Computes `(fm - fp) / (2 (fm - 2 f0 + fp))`; a flat or non-concave fit
/// yields zero so the peak stays on its bin.
pub fn peak_offset_clamped(fm: f32, f0: f32, fp: f32) -> f32 {
    quad_peak_offset_1d(fm, f0, fp)
        .map(|dx| dx.clamp(-0.5, 0.5))
        .unwrap_or(0.0)
}
