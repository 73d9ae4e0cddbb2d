//! Descriptor matching with the nearest-neighbor ratio test.
//!
//! Every query descriptor is compared with every train descriptor; the
//! nearest neighbor is accepted when it is clearly closer than the second
//! nearest. Matches keep the query order; a train descriptor may be the
//! target of several queries.

mod ratio;

use crate::describe::Descriptor;
use crate::keypoint::Keypoint;
use crate::trace::{trace_event, trace_span};
use crate::util::{KeyMatchError, KeyMatchResult};

/// Matcher parameters.
#[derive(Clone, Debug, PartialEq)]
pub struct MatchConfig {
    /// Maximum `d1 / d2` for an accepted match.
    pub ratio: f32,
    /// Skip train descriptors at the nearest neighbor's keypoint when looking
    /// for the second nearest.
    pub exclude_same_keypoint: bool,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            ratio: 0.7,
            exclude_same_keypoint: false,
        }
    }
}

impl MatchConfig {
    /// Checks parameter ranges.
    pub fn validate(&self) -> KeyMatchResult<()> {
        if !(self.ratio > 0.0 && self.ratio <= 1.0) {
            return Err(KeyMatchError::InvalidConfig {
                reason: "ratio must be in (0, 1]",
            });
        }
        Ok(())
    }
}

/// Accepted correspondence between a query and a train descriptor.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Match<K> {
    pub query_idx: usize,
    pub train_idx: usize,
    pub query: K,
    pub train: K,
    /// Euclidean distance to the nearest neighbor.
    pub distance: f32,
    /// `d1 / d2`; 0 when there is no second neighbor.
    pub ratio: f32,
}

/// Matches `query` against `train` with the ratio test.
///
/// Empty inputs yield no matches. Descriptors of different lengths are
/// rejected with [`KeyMatchError::DescriptorSizeMismatch`].
pub fn match_descriptors<K: Keypoint>(
    query: &[Descriptor<K>],
    train: &[Descriptor<K>],
    cfg: &MatchConfig,
) -> KeyMatchResult<Vec<Match<K>>> {
    cfg.validate()?;
    if query.is_empty() || train.is_empty() {
        return Ok(Vec::new());
    }
    let size = query[0].size();
    for d in query.iter().chain(train.iter()) {
        if d.size() != size {
            return Err(KeyMatchError::DescriptorSizeMismatch {
                left: size,
                right: d.size(),
            });
        }
    }
    let _span = trace_span!("match", query = query.len(), train = train.len()).entered();

    let accept = |(query_idx, q): (usize, &Descriptor<K>)| -> Option<Match<K>> {
        let best = ratio::nearest_two(q, train, cfg.exclude_same_keypoint)?;
        let ratio = best.ratio();
        if !(best.second > 0.0) || ratio > cfg.ratio {
            return None;
        }
        Some(Match {
            query_idx,
            train_idx: best.index,
            query: q.keypoint,
            train: train[best.index].keypoint,
            distance: best.first,
            ratio,
        })
    };

    #[cfg(feature = "rayon")]
    let matches: Vec<Match<K>> = {
        use rayon::prelude::*;
        query.par_iter().enumerate().filter_map(accept).collect()
    };
    #[cfg(not(feature = "rayon"))]
    let matches: Vec<Match<K>> = query.iter().enumerate().filter_map(accept).collect();

    trace_event!("matches", count = matches.len());
    Ok(matches)
}

#[cfg(test)]
mod tests {
    use super::{match_descriptors, MatchConfig};
    use crate::describe::Descriptor;
    use crate::keypoint::{OrientedPoint, Point};
    use crate::util::KeyMatchError;

    fn desc(row: f32, data: &[f32]) -> Descriptor<Point> {
        Descriptor::new(Point::new(row, 0.0, 1.0), data.to_vec())
    }

    #[test]
    fn accepts_distinct_nearest_neighbor() {
        let query = [desc(0.0, &[1.0, 0.0]), desc(1.0, &[0.5, 0.5])];
        let train = [
            desc(10.0, &[0.0, 1.0]),
            desc(11.0, &[1.0, 0.05]),
            desc(12.0, &[0.55, 0.5]),
        ];
        let matches = match_descriptors(&query, &train, &MatchConfig::default()).unwrap();
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].query_idx, 0);
        assert_eq!(matches[0].train_idx, 1);
        assert_eq!(matches[0].train.row, 11.0);
        assert_eq!(matches[1].train_idx, 2);
        for m in &matches {
            assert!(m.ratio <= 0.7);
        }
    }

    #[test]
    fn ambiguous_neighbors_are_rejected() {
        let query = [desc(0.0, &[1.0, 0.0])];
        let train = [desc(1.0, &[0.9, 0.1]), desc(2.0, &[0.9, -0.1])];
        let matches = match_descriptors(&query, &train, &MatchConfig::default()).unwrap();
        assert!(matches.is_empty());
    }

    #[test]
    fn single_train_descriptor_has_zero_ratio() {
        let query = [desc(0.0, &[1.0, 0.0])];
        let train = [desc(1.0, &[0.0, 1.0])];
        let matches = match_descriptors(&query, &train, &MatchConfig::default()).unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].ratio, 0.0);
    }

    #[test]
    fn identical_second_neighbor_is_rejected() {
        let query = [desc(0.0, &[1.0, 0.0])];
        let train = [desc(1.0, &[1.0, 0.0]), desc(2.0, &[1.0, 0.0])];
        let matches = match_descriptors(&query, &train, &MatchConfig::default()).unwrap();
        assert!(matches.is_empty());
    }

    #[test]
    fn exclude_same_keypoint_skips_sibling_orientations() {
        let kp = |row: f32, angle: f32| OrientedPoint {
            row,
            col: 0.0,
            value: 1.0,
            angle,
        };
        let query = [Descriptor::new(kp(0.0, 0.0), vec![1.0, 0.0])];
        let train = [
            Descriptor::new(kp(5.0, 0.0), vec![0.9, 0.0]),
            Descriptor::new(kp(5.0, 1.0), vec![0.9, 0.05]),
            Descriptor::new(kp(9.0, 0.0), vec![0.0, 1.0]),
        ];
        let strict = match_descriptors(&query, &train, &MatchConfig::default()).unwrap();
        assert!(strict.is_empty());

        let cfg = MatchConfig {
            exclude_same_keypoint: true,
            ..MatchConfig::default()
        };
        let relaxed = match_descriptors(&query, &train, &cfg).unwrap();
        assert_eq!(relaxed.len(), 1);
        assert_eq!(relaxed[0].train_idx, 0);
    }

    #[test]
    fn mismatched_sizes_are_rejected() {
        let query = [desc(0.0, &[1.0, 0.0])];
        let train = [desc(1.0, &[1.0, 0.0, 0.0])];
        let err = match_descriptors(&query, &train, &MatchConfig::default()).unwrap_err();
        assert!(matches!(
            err,
            KeyMatchError::DescriptorSizeMismatch { left: 2, right: 3 }
        ));
    }

    #[test]
    fn empty_inputs_yield_no_matches() {
        let query: [Descriptor<Point>; 0] = [];
        let train = [desc(1.0, &[1.0, 0.0])];
        assert!(match_descriptors(&query, &train, &MatchConfig::default())
            .unwrap()
            .is_empty());
    }
}
