//! Keypoint types.
//!
//! Three flat structs share accessors through traits: [`Point`] for dense
//! detectors, [`OrientedPoint`] when an orientation is assigned and
//! [`ScalePoint`] for scale-space blobs. Descriptors and matches are generic
//! over the keypoint type.
//!
//! `row`/`col` are always expressed in base-image pixels. For scale-space
//! points they hold the rounded position; [`Keypoint::x`] and
//! [`Keypoint::y`] return the sub-pixel position used for geometry.

use std::fmt::Debug;

/// Shared accessors of every keypoint type.
pub trait Keypoint: Copy + Debug + PartialEq + Send + Sync {
    /// Row in base-image pixels.
    fn row(&self) -> f32;
    /// Column in base-image pixels.
    fn col(&self) -> f32;
    /// Detector response.
    fn value(&self) -> f32;
    /// Returns a copy with a different response.
    fn with_value(self, value: f32) -> Self;

    /// Sub-pixel x (column) in base-image pixels.
    fn x(&self) -> f32 {
        self.col()
    }

    /// Sub-pixel y (row) in base-image pixels.
    fn y(&self) -> f32 {
        self.row()
    }

    /// True when both keypoints mark the same detection, ignoring orientation.
    fn same_location(&self, other: &Self) -> bool {
        self.row() == other.row() && self.col() == other.col()
    }
}

/// Keypoints carrying a dominant orientation.
pub trait Oriented: Keypoint {
    /// Orientation in radians, `[0, 2π)`.
    fn angle(&self) -> f32;
    /// Returns a copy with a different orientation.
    fn with_angle(self, angle: f32) -> Self;
}

/// Keypoints located in a scale-space pyramid.
pub trait Scaled: Oriented {
    /// Sub-pixel row inside the source octave.
    fn local_row(&self) -> f32;
    /// Sub-pixel column inside the source octave.
    fn local_col(&self) -> f32;
    /// Source octave index.
    fn octave(&self) -> usize;
    /// Source DoG layer index.
    fn layer(&self) -> usize;
    /// Blur in octave-local pixels.
    fn sigma(&self) -> f32;
    /// Blur in base-image pixels.
    fn sigma_global(&self) -> f32;
}

/// Plain 2D detection.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Point {
    pub row: f32,
    pub col: f32,
    pub value: f32,
}

impl Point {
    pub fn new(row: f32, col: f32, value: f32) -> Self {
        Self { row, col, value }
    }
}

impl Keypoint for Point {
    fn row(&self) -> f32 {
        self.row
    }
    fn col(&self) -> f32 {
        self.col
    }
    fn value(&self) -> f32 {
        self.value
    }
    fn with_value(self, value: f32) -> Self {
        Self { value, ..self }
    }
}

/// 2D detection with an orientation.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct OrientedPoint {
    pub row: f32,
    pub col: f32,
    pub value: f32,
    pub angle: f32,
}

impl OrientedPoint {
    /// Attaches an orientation to a plain point.
    pub fn from_point(point: Point, angle: f32) -> Self {
        Self {
            row: point.row,
            col: point.col,
            value: point.value,
            angle,
        }
    }
}

impl Keypoint for OrientedPoint {
    fn row(&self) -> f32 {
        self.row
    }
    fn col(&self) -> f32 {
        self.col
    }
    fn value(&self) -> f32 {
        self.value
    }
    fn with_value(self, value: f32) -> Self {
        Self { value, ..self }
    }
}

impl Oriented for OrientedPoint {
    fn angle(&self) -> f32 {
        self.angle
    }
    fn with_angle(self, angle: f32) -> Self {
        Self { angle, ..self }
    }
}

/// Scale-space blob.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ScalePoint {
    /// `round(local_row · 2^octave)`.
    pub row: f32,
    /// `round(local_col · 2^octave)`.
    pub col: f32,
    /// Interpolated DoG response, or a corner response after re-scoring.
    pub value: f32,
    pub angle: f32,
    pub local_row: f32,
    pub local_col: f32,
    pub octave: usize,
    pub layer: usize,
    pub sigma: f32,
    pub sigma_global: f32,
    /// Final Newton offset in (row, col, scale); each component is at most 0.5 in magnitude.
    pub offset: [f32; 3],
}

impl ScalePoint {
    /// Scale factor from octave-local to base-image pixels.
    pub fn octave_scale(&self) -> f32 {
        crate::util::math::octave_scale(self.octave)
    }
}

impl Keypoint for ScalePoint {
    fn row(&self) -> f32 {
        self.row
    }
    fn col(&self) -> f32 {
        self.col
    }
    fn value(&self) -> f32 {
        self.value
    }
    fn with_value(self, value: f32) -> Self {
        Self { value, ..self }
    }
    fn x(&self) -> f32 {
        self.local_col * self.octave_scale()
    }
    fn y(&self) -> f32 {
        self.local_row * self.octave_scale()
    }
    fn same_location(&self, other: &Self) -> bool {
        self.octave == other.octave
            && self.layer == other.layer
            && self.local_row == other.local_row
            && self.local_col == other.local_col
    }
}

impl Oriented for ScalePoint {
    fn angle(&self) -> f32 {
        self.angle
    }
    fn with_angle(self, angle: f32) -> Self {
        Self { angle, ..self }
    }
}

impl Scaled for ScalePoint {
    fn local_row(&self) -> f32 {
        self.local_row
    }
    fn local_col(&self) -> f32 {
        self.local_col
    }
    fn octave(&self) -> usize {
        self.octave
    }
    fn layer(&self) -> usize {
        self.layer
    }
    fn sigma(&self) -> f32 {
        self.sigma
    }
    fn sigma_global(&self) -> f32 {
        self.sigma_global
    }
}
