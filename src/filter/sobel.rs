use crate::image::{Border, Image};
use crate::kernel::{Kernel, SeparableKernel};
use crate::util::KeyMatchResult;

/// Horizontal Sobel: `[-1, 0, 1]` along x, `[1, 2, 1]` along y.
pub fn sobel_x() -> KeyMatchResult<SeparableKernel> {
    SeparableKernel::new(vec![-1.0, 0.0, 1.0], vec![1.0, 2.0, 1.0])
}

/// Vertical Sobel: `[1, 2, 1]` along x, `[-1, 0, 1]` along y.
pub fn sobel_y() -> KeyMatchResult<SeparableKernel> {
    SeparableKernel::new(vec![1.0, 2.0, 1.0], vec![-1.0, 0.0, 1.0])
}

/// Image derivatives of one single-channel image.
#[derive(Clone, Debug)]
pub struct Gradients {
    dx: Image,
    dy: Image,
}

impl Gradients {
    /// Computes Sobel derivatives with the given border policy.
    pub fn compute(img: &Image, border: Border) -> KeyMatchResult<Self> {
        Ok(Self {
            dx: sobel_x()?.apply(img, border)?,
            dy: sobel_y()?.apply(img, border)?,
        })
    }

    /// Returns the x derivative (increasing column).
    pub fn dx(&self) -> &Image {
        &self.dx
    }

    /// Returns the y derivative (increasing row).
    pub fn dy(&self) -> &Image {
        &self.dy
    }

    /// Returns `(height, width)` of the derivative images.
    pub fn dims(&self) -> (usize, usize) {
        self.dx.dims()
    }

    /// Gradient magnitude at an in-bounds pixel.
    #[inline]
    pub fn magnitude(&self, row: usize, col: usize) -> f32 {
        self.dx.at(row, col).hypot(self.dy.at(row, col))
    }

    /// Gradient direction `atan2(dy, dx)` at an in-bounds pixel.
    #[inline]
    pub fn phase(&self, row: usize, col: usize) -> f32 {
        self.dy.at(row, col).atan2(self.dx.at(row, col))
    }

    /// Derivatives at a fractional position via bilinear sampling.
    #[inline]
    pub fn sample(&self, row: f32, col: f32, border: Border) -> (f32, f32) {
        (
            border.sample_bilinear(&self.dx, row, col),
            border.sample_bilinear(&self.dy, row, col),
        )
    }

    /// Dense magnitude image.
    pub fn magnitude_image(&self) -> KeyMatchResult<Image> {
        self.dx.zip_map(&self.dy, f32::hypot)
    }

    /// Dense phase image in radians, range `(-π, π]`.
    pub fn phase_image(&self) -> KeyMatchResult<Image> {
        self.dy.zip_map(&self.dx, f32::atan2)
    }
}
