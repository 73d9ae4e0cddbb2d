//! Keypoint detectors.
//!
//! `blob` finds scale-space extrema of a DoG pyramid; `corner` provides dense
//! Harris/Shi-Tomasi/Moravec detectors and the corner-quality filter applied
//! to blobs.

pub mod blob;
pub mod corner;

pub use blob::{detect_blobs, BlobConfig};
pub use corner::{
    corner_response, filter_blobs, harris, moravec, shi_tomasi, CornerConfig, CornerKind,
    MoravecConfig,
};
