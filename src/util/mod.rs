//! Shared utility helpers.

pub mod angles;
pub mod error;
pub(crate) mod math;

pub use angles::AngleBins;
pub use error::{KeyMatchError, KeyMatchResult};
