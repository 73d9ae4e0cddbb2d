//! Low-level building blocks for custom detection pipelines.
//!
//! These re-exports expose candidate pruning, peak refinement and the raw
//! convolution kernels for use cases beyond [`crate::Extractor`]. Most users
//! should prefer the top-level pipeline types.

pub use crate::candidate::{anms, nms_points, TopK};
pub use crate::describe::{describe_oriented, describe_points, describe_scaled, histogrid};
pub use crate::detect::{corner_response, detect_blobs, filter_blobs, harris, moravec, shi_tomasi};
pub use crate::kernel::scalar::{correlate_2d, correlate_cols, correlate_rows};
pub use crate::refine::newton::{passes_edge_test, NewtonStep, ScaleStack};
pub use crate::refine::quad1d::{peak_offset_clamped, quad_peak_offset_1d};
pub use crate::refine::quad2d::refine_peak_2d;
