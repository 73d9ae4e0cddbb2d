//! Convolution kernels.
//!
//! Kernels are applied as correlation centered on the kernel midpoint, so a
//! derivative kernel `[-1, 0, 1]` responds positively to intensity rising
//! along the axis. Samples outside the image come from a [`Border`] policy.
//! The `scalar` module is the reference path; `rayon` parallelizes output
//! rows and `simd` provides vectorized dot/distance helpers.

use crate::image::{Border, Image};
use crate::util::{KeyMatchError, KeyMatchResult};

/// Image filter applied through a border policy.
pub trait Kernel {
    /// Correlates a single-channel image with the kernel.
    fn apply(&self, img: &Image, border: Border) -> KeyMatchResult<Image>;
}

/// Dense 2D kernel with odd dimensions.
#[derive(Clone, Debug, PartialEq)]
pub struct Kernel2d {
    height: usize,
    width: usize,
    data: Vec<f32>,
}

impl Kernel2d {
    /// Creates a kernel from row-major taps.
    pub fn new(height: usize, width: usize, data: Vec<f32>) -> KeyMatchResult<Self> {
        check_odd(height)?;
        check_odd(width)?;
        if data.len() != height * width {
            return Err(KeyMatchError::InvalidKernel {
                reason: "tap count does not match kernel size",
            });
        }
        Ok(Self {
            height,
            width,
            data,
        })
    }

    /// Builds the outer product `col ⊗ row` of a separable kernel.
    pub fn from_separable(kernel: &SeparableKernel) -> Self {
        let mut data = Vec::with_capacity(kernel.col.len() * kernel.row.len());
        for &c in &kernel.col {
            data.extend(kernel.row.iter().map(|&r| r * c));
        }
        Self {
            height: kernel.col.len(),
            width: kernel.row.len(),
            data,
        }
    }

    /// Returns the kernel height.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Returns the kernel width.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Returns the row-major taps.
    pub fn data(&self) -> &[f32] {
        &self.data
    }
}

impl Kernel for Kernel2d {
    fn apply(&self, img: &Image, border: Border) -> KeyMatchResult<Image> {
        img.ensure_gray()?;
        #[cfg(feature = "rayon")]
        {
            self::rayon::correlate_2d_par(img, self, border)
        }
        #[cfg(not(feature = "rayon"))]
        {
            scalar::correlate_2d(img, self, border)
        }
    }
}

/// Separable kernel: `row` taps run along x, `col` taps along y.
#[derive(Clone, Debug, PartialEq)]
pub struct SeparableKernel {
    row: Vec<f32>,
    col: Vec<f32>,
}

impl SeparableKernel {
    /// Creates a separable kernel from its horizontal and vertical taps.
    pub fn new(row: Vec<f32>, col: Vec<f32>) -> KeyMatchResult<Self> {
        check_odd(row.len())?;
        check_odd(col.len())?;
        Ok(Self { row, col })
    }

    /// Uses the same taps along both axes.
    pub fn symmetric(taps: Vec<f32>) -> KeyMatchResult<Self> {
        Self::new(taps.clone(), taps)
    }

    /// Returns the horizontal taps.
    pub fn row(&self) -> &[f32] {
        &self.row
    }

    /// Returns the vertical taps.
    pub fn col(&self) -> &[f32] {
        &self.col
    }
}

impl Kernel for SeparableKernel {
    fn apply(&self, img: &Image, border: Border) -> KeyMatchResult<Image> {
        img.ensure_gray()?;
        #[cfg(feature = "rayon")]
        {
            let tmp = self::rayon::correlate_rows_par(img, &self.row, border)?;
            self::rayon::correlate_cols_par(&tmp, &self.col, border)
        }
        #[cfg(not(feature = "rayon"))]
        {
            let tmp = scalar::correlate_rows(img, &self.row, border)?;
            scalar::correlate_cols(&tmp, &self.col, border)
        }
    }
}

fn check_odd(len: usize) -> KeyMatchResult<()> {
    if len == 0 || len % 2 == 0 {
        return Err(KeyMatchError::InvalidKernel {
            reason: "kernel size must be odd and non-zero",
        });
    }
    Ok(())
}

pub mod scalar;

#[cfg(feature = "simd")]
pub mod simd;

#[cfg(feature = "rayon")]
pub mod rayon;
