use crate::image::{Border, Image};
use crate::kernel::{Kernel, SeparableKernel};
use crate::util::{KeyMatchError, KeyMatchResult};

/// Normalized 1D Gaussian taps over `[-h, h]` with `h = max(1, ceil(3σ))`.
pub fn gaussian_taps(sigma: f32) -> KeyMatchResult<Vec<f32>> {
    if !(sigma > 0.0) || !sigma.is_finite() {
        return Err(KeyMatchError::InvalidKernel {
            reason: "gaussian sigma must be positive and finite",
        });
    }
    let half = ((3.0 * sigma).ceil() as usize).max(1);
    let denom = 2.0 * sigma * sigma;
    let mut taps: Vec<f32> = (0..=2 * half)
        .map(|i| {
            let x = i as f32 - half as f32;
            (-x * x / denom).exp()
        })
        .collect();
    let sum: f32 = taps.iter().sum();
    taps.iter_mut().for_each(|t| *t /= sum);
    Ok(taps)
}

/// Isotropic separable Gaussian kernel.
pub fn gaussian_kernel(sigma: f32) -> KeyMatchResult<SeparableKernel> {
    SeparableKernel::symmetric(gaussian_taps(sigma)?)
}

/// Blurs a single-channel image with an isotropic Gaussian.
pub fn gaussian_blur(img: &Image, sigma: f32, border: Border) -> KeyMatchResult<Image> {
    gaussian_kernel(sigma)?.apply(img, border)
}
