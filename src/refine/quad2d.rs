//! Quadratic 2D fitting for dense response maps.

use crate::refine::quad1d::quad_peak_offset_1d;

/// Refines a response maximum using separable 1D quadratic fits.
///
/// `s` is the 3x3 neighborhood indexed `[row][col]` and centered at `s[1][1]`.
/// Returns the sub-pixel `(row, col)`; an ill-conditioned axis keeps its
/// integer coordinate.
pub fn refine_peak_2d(row: usize, col: usize, s: [[f32; 3]; 3]) -> (f32, f32) {
    let dc = quad_peak_offset_1d(s[1][0], s[1][1], s[1][2]).unwrap_or(0.0);
    let dr = quad_peak_offset_1d(s[0][1], s[1][1], s[2][1]).unwrap_or(0.0);

    (row as f32 + dr, col as f32 + dc)
}
