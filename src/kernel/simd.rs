//! SIMD distance helpers using the `wide` crate.
//!
//! The inner loop processes 8 lanes at a time with `f32x8` and finishes the
//! remainder with scalar code.

use wide::f32x8;

const LANES: usize = 8;

/// Load 8 f32 values into f32x8.
#[inline]
fn load_f32x8(slice: &[f32]) -> f32x8 {
    f32x8::from([
        slice[0], slice[1], slice[2], slice[3], slice[4], slice[5], slice[6], slice[7],
    ])
}

/// Horizontal sum of f32x8.
#[inline]
fn hsum(v: f32x8) -> f32 {
    let arr = v.to_array();
    arr[0] + arr[1] + arr[2] + arr[3] + arr[4] + arr[5] + arr[6] + arr[7]
}

/// SIMD squared Euclidean distance between equal-length slices.
#[inline]
pub fn squared_distance(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());
    let len = a.len().min(b.len());
    let simd_end = len / LANES * LANES;

    let mut acc = f32x8::ZERO;
    let mut i = 0;
    while i < simd_end {
        let d = load_f32x8(&a[i..]) - load_f32x8(&b[i..]);
        acc += d * d;
        i += LANES;
    }

    let mut tail = 0.0f32;
    while i < len {
        let d = a[i] - b[i];
        tail += d * d;
        i += 1;
    }
    hsum(acc) + tail
}

/// SIMD dot product between equal-length slices.
#[inline]
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());
    let len = a.len().min(b.len());
    let simd_end = len / LANES * LANES;

    let mut acc = f32x8::ZERO;
    let mut i = 0;
    while i < simd_end {
        acc += load_f32x8(&a[i..]) * load_f32x8(&b[i..]);
        i += LANES;
    }

    let mut tail = 0.0f32;
    while i < len {
        tail += a[i] * b[i];
        i += 1;
    }
    hsum(acc) + tail
}

#[cfg(test)]
mod tests {
    use super::{dot, squared_distance};
    use crate::kernel::scalar;

    #[test]
    fn matches_scalar_distance() {
        let a: Vec<f32> = (0..131).map(|i| (i as f32 * 0.37).sin()).collect();
        let b: Vec<f32> = (0..131).map(|i| (i as f32 * 0.11).cos()).collect();
        let fast = squared_distance(&a, &b);
        let slow = scalar::squared_distance(&a, &b);
        assert!((fast - slow).abs() < 1e-3);
    }

    #[test]
    fn dot_handles_remainder() {
        let a = vec![1.0f32; 11];
        assert_eq!(dot(&a, &a), 11.0);
    }
}
