//! Gaussian smoothing and Sobel gradients built from separable kernels.

mod gaussian;
mod sobel;

pub use gaussian::{gaussian_blur, gaussian_kernel, gaussian_taps};
pub use sobel::{sobel_x, sobel_y, Gradients};
