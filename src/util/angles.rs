//! Circular angle binning over [0, 2π).

use crate::util::math::wrap_tau;
use crate::util::{KeyMatchError, KeyMatchResult};
use std::f32::consts::TAU;

/// Discrete, circular partition of [0, 2π) into equal-width bins.
///
/// Bin `i` covers `[i·w, (i+1)·w)` and is centered at `(i + 0.5)·w`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AngleBins {
    len: usize,
    width: f32,
}

impl AngleBins {
    /// Creates a partition with `len` bins.
    pub fn new(len: usize) -> KeyMatchResult<Self> {
        if len == 0 {
            return Err(KeyMatchError::InvalidConfig {
                reason: "angle bin count must be > 0",
            });
        }
        Ok(Self {
            len,
            width: TAU / len as f32,
        })
    }

    /// Returns the number of bins.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns true if the partition has no bins.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the bin width in radians.
    pub fn width(&self) -> f32 {
        self.width
    }

    /// Returns the center angle of bin `idx`.
    pub fn center(&self, idx: usize) -> f32 {
        debug_assert!(idx < self.len);
        (idx as f32 + 0.5) * self.width
    }

    /// Returns the bin containing `angle`.
    pub fn index_of(&self, angle: f32) -> usize {
        let pos = wrap_tau(angle) / self.width;
        (pos.floor() as usize).min(self.len - 1)
    }

    /// Splits `angle` between the two bins whose centers enclose it.
    ///
    /// Returns `(lower, upper, frac)` where `lower` receives `1 - frac` and
    /// `upper = lower + 1 (mod len)` receives `frac`.
    pub fn split(&self, angle: f32) -> (usize, usize, f32) {
        let pos = wrap_tau(angle) / self.width - 0.5;
        let floor = pos.floor();
        let frac = pos - floor;
        let lower = (floor as isize).rem_euclid(self.len as isize) as usize;
        (lower, (lower + 1) % self.len, frac)
    }

    /// Returns the bin containing `angle` and the adjacent bin on the side
    /// of the nearer bin edge.
    pub fn with_nearest_neighbor(&self, angle: f32) -> (usize, usize) {
        let pos = wrap_tau(angle) / self.width;
        let idx = (pos.floor() as usize).min(self.len - 1);
        let frac = pos - idx as f32;
        let neighbor = if frac >= 0.5 {
            (idx + 1) % self.len
        } else {
            (idx + self.len - 1) % self.len
        };
        (idx, neighbor)
    }

    /// Wraps a possibly negative or overflowing bin index.
    pub fn wrap_index(&self, idx: isize) -> usize {
        idx.rem_euclid(self.len as isize) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::AngleBins;
    use std::f32::consts::TAU;

    #[test]
    fn rejects_empty_partition() {
        assert!(AngleBins::new(0).is_err());
    }

    #[test]
    fn split_at_center_goes_to_one_bin() {
        let bins = AngleBins::new(36).unwrap();
        let (lower, upper, frac) = bins.split(bins.center(5));
        assert_eq!(lower, 5);
        assert_eq!(upper, 6);
        assert!(frac.abs() < 1e-4);
    }

    #[test]
    fn split_wraps_below_first_center() {
        let bins = AngleBins::new(8).unwrap();
        let (lower, upper, frac) = bins.split(0.0);
        assert_eq!((lower, upper), (7, 0));
        assert!((frac - 0.5).abs() < 1e-5);
    }

    #[test]
    fn nearest_neighbor_follows_closer_edge() {
        let bins = AngleBins::new(12).unwrap();
        let w = TAU / 12.0;
        assert_eq!(bins.with_nearest_neighbor(0.2 * w), (0, 11));
        assert_eq!(bins.with_nearest_neighbor(3.8 * w), (3, 4));
    }
}
