//! Error types for keymatch.

use thiserror::Error;

/// Result alias for keymatch operations.
pub type KeyMatchResult<T> = std::result::Result<T, KeyMatchError>;

/// Errors that can occur when running keymatch algorithms.
///
/// Every variant is a precondition violation. Degenerate numeric cases found
/// while scanning (singular Hessians, zero-length descriptors) drop the
/// affected candidate instead of surfacing here, and empty results are
/// returned as empty collections.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum KeyMatchError {
    /// Width or height is zero, or their product overflows.
    #[error("invalid dimensions: {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },
    /// The backing buffer is shorter than the dimensions require.
    #[error("buffer too small: needed {needed}, got {got}")]
    BufferTooSmall { needed: usize, got: usize },
    /// The row stride is shorter than the row width.
    #[error("invalid stride: width {width}, stride {stride}")]
    InvalidStride { width: usize, stride: usize },
    /// The operation requires a different channel count.
    #[error("invalid channel count: expected {expected}, got {got}")]
    InvalidChannels { expected: usize, got: usize },
    /// Kernel sizes must be odd and non-zero.
    #[error("invalid kernel: {reason}")]
    InvalidKernel { reason: &'static str },
    /// A configuration parameter is outside its valid range.
    #[error("invalid config: {reason}")]
    InvalidConfig { reason: &'static str },
    /// An index is outside the valid range.
    #[error("{context} index {index} out of bounds (len {len})")]
    IndexOutOfBounds {
        index: usize,
        len: usize,
        context: &'static str,
    },
    /// Two descriptors with different lengths were compared.
    #[error("descriptor size mismatch: {left} vs {right}")]
    DescriptorSizeMismatch { left: usize, right: usize },
    /// A model fit received fewer correspondences than it needs.
    #[error("not enough correspondences: needed {needed}, got {got}")]
    NotEnoughCorrespondences { needed: usize, got: usize },
    /// A model fit produced a singular or non-finite solution.
    #[error("degenerate fit: {reason}")]
    DegenerateFit { reason: &'static str },
    /// Image decoding or encoding failed.
    #[error("image io error: {reason}")]
    ImageIo { reason: String },
}
