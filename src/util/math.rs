//! Mathematical helpers shared by detectors, descriptors and estimators.

use std::f32::consts::TAU;

/// Wraps an angle in radians to the range [0, 2π).
pub(crate) fn wrap_tau(angle: f32) -> f32 {
    let wrapped = angle.rem_euclid(TAU);
    // rem_euclid can round up to exactly TAU for tiny negative inputs.
    if wrapped >= TAU {
        0.0
    } else {
        wrapped
    }
}

/// Wraps an angle in radians to the range [-π, π).
#[cfg(test)]
pub(crate) fn wrap_pi(angle: f32) -> f32 {
    let shifted = wrap_tau(angle + std::f32::consts::PI);
    shifted - std::f32::consts::PI
}

/// Unnormalized isotropic Gaussian weight for a squared distance.
#[inline]
pub(crate) fn gaussian_weight(dist_sq: f32, sigma: f32) -> f32 {
    (-dist_sq / (2.0 * sigma * sigma)).exp()
}

/// Scale factor between octave-local and base-image coordinates.
#[inline]
pub(crate) fn octave_scale(octave: usize) -> f32 {
    (1u64 << octave.min(63)) as f32
}
