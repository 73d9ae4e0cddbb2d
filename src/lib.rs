//! KeyMatch is a CPU-first keypoint detection and matching library.
//!
//! The pipeline builds a Gaussian scale space, finds difference-of-Gaussian
//! blobs with sub-pixel refinement, assigns dominant orientations, encodes
//! histogram-grid descriptors and matches them with the ratio test. Matches
//! are verified with a RANSAC homography or generalized Hough pose
//! clustering. Optional features add `rayon` parallelism, `simd` distance
//! kernels, `image-io` loading and `tracing` instrumentation.

pub mod describe;
pub mod detect;
pub mod filter;
pub mod geometry;
pub mod image;
pub mod kernel;
pub mod keypoint;
pub mod lowlevel;
pub mod pipeline;
pub mod scale;
pub mod search;
pub mod util;

mod candidate;
mod refine;
mod trace;

pub use describe::{Descriptor, DescriptorConfig, HistogridParams, OrientationConfig};
pub use detect::{BlobConfig, CornerConfig, CornerKind, MoravecConfig};
pub use geometry::{HoughConfig, Hypothesis, RansacConfig, Transform2d};
pub use image::{Border, Image, ImageView};
pub use kernel::{Kernel, Kernel2d, SeparableKernel};
pub use keypoint::{Keypoint, Oriented, OrientedPoint, Point, ScalePoint, Scaled};
pub use pipeline::{estimate_homography, estimate_pose, Estimate, ExtractConfig, Extractor};
pub use scale::{DogPyramid, GaussianPyramid, PyramidConfig};
pub use search::{match_descriptors, Match, MatchConfig};
pub use util::{KeyMatchError, KeyMatchResult};
