//! Candidate selection and pruning for dense detectors.
//!
//! Includes Top-K collection, spatial non-maximum suppression and adaptive
//! non-maximum suppression. All orderings break ties by `(row, col)` so the
//! output does not depend on the input order.

pub mod anms;
pub mod nms;
pub mod topk;

pub use anms::anms;
pub use nms::nms_points;
pub use topk::TopK;
