//! Two-nearest-neighbor scan for one query descriptor.

use crate::describe::Descriptor;
use crate::keypoint::Keypoint;

#[cfg(not(feature = "simd"))]
use crate::kernel::scalar::squared_distance;
#[cfg(feature = "simd")]
use crate::kernel::simd::squared_distance;

/// Nearest and second-nearest Euclidean distances.
#[derive(Clone, Copy, Debug)]
pub(crate) struct NearestTwo {
    pub index: usize,
    pub first: f32,
    /// `f32::INFINITY` when there is no admissible second neighbor.
    pub second: f32,
}

impl NearestTwo {
    pub fn ratio(&self) -> f32 {
        if self.second.is_infinite() {
            0.0
        } else {
            self.first / self.second
        }
    }
}

/// Scans `train` for the two nearest neighbors of `query`.
///
/// With `exclude_same_keypoint` the second neighbor is searched among
/// descriptors whose keypoint differs from the nearest one's. Lower indices
/// win distance ties.
pub(crate) fn nearest_two<K: Keypoint>(
    query: &Descriptor<K>,
    train: &[Descriptor<K>],
    exclude_same_keypoint: bool,
) -> Option<NearestTwo> {
    let distances: Vec<f32> = train
        .iter()
        .map(|t| squared_distance(&query.data, &t.data))
        .collect();
    let (index, &best) = distances
        .iter()
        .enumerate()
        .min_by(|a, b| a.1.total_cmp(b.1).then_with(|| a.0.cmp(&b.0)))?;
    let anchor = train[index].keypoint;

    let second = distances
        .iter()
        .enumerate()
        .filter(|&(i, _)| i != index)
        .filter(|&(i, _)| !(exclude_same_keypoint && train[i].keypoint.same_location(&anchor)))
        .map(|(_, &d)| d)
        .fold(f32::INFINITY, f32::min);

    Some(NearestTwo {
        index,
        first: best.sqrt(),
        second: second.sqrt(),
    })
}
