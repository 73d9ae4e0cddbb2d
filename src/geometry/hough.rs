//! Generalized Hough pose clustering.
//!
//! Every match between oriented, scaled keypoints predicts where the object
//! center lands in the scene, together with a rotation and a scale. Votes
//! are accumulated in a 4-D grid `(x, y, angle, scale)`; each vote also goes
//! to the nearer neighbor bin along every axis. Well-supported bins are
//! turned into affine hypotheses and verified against all matches.

use super::{
    correspondences, fit_affine, inlier_indices, Correspondence, Hypothesis, Transform2d,
};
use crate::keypoint::Scaled;
use crate::search::Match;
use crate::trace::{trace_event, trace_span};
use crate::util::math::wrap_tau;
use crate::util::{KeyMatchError, KeyMatchResult};
use std::collections::{BTreeMap, BTreeSet};
use std::f64::consts::TAU;

/// Hough accumulator parameters.
#[derive(Clone, Debug, PartialEq)]
pub struct HoughConfig {
    /// Location bin width as a fraction of the larger object side.
    pub location_coeff: f64,
    /// Orientation bins over `[0, 2π)`.
    pub orientation_bins: usize,
    /// Lower edge of the first scale bin.
    pub scale_min: f64,
    /// Ratio between consecutive scale bin edges.
    pub scale_factor: f64,
    pub scale_bins: usize,
    /// Votes a bin needs before a transform is fitted to it.
    pub min_votes: usize,
}

impl Default for HoughConfig {
    fn default() -> Self {
        Self {
            location_coeff: 0.25,
            orientation_bins: 12,
            scale_min: 0.25,
            scale_factor: 2.0,
            scale_bins: 12,
            min_votes: 3,
        }
    }
}

impl HoughConfig {
    /// Checks parameter ranges.
    pub fn validate(&self) -> KeyMatchResult<()> {
        if !(self.location_coeff > 0.0) {
            return Err(KeyMatchError::InvalidConfig {
                reason: "location_coeff must be > 0",
            });
        }
        if self.orientation_bins == 0 || self.scale_bins == 0 {
            return Err(KeyMatchError::InvalidConfig {
                reason: "hough bin counts must be >= 1",
            });
        }
        if !(self.scale_min > 0.0) || !(self.scale_factor > 1.0) {
            return Err(KeyMatchError::InvalidConfig {
                reason: "scale_min must be > 0 and scale_factor > 1",
            });
        }
        if self.min_votes < 3 {
            return Err(KeyMatchError::InvalidConfig {
                reason: "min_votes must be >= 3",
            });
        }
        Ok(())
    }
}

/// Accumulator cell `(x, y, angle, scale)`.
type BinKey = (usize, usize, usize, usize);

/// Base bin and nearer neighbor along one axis.
fn axis_bins(pos: f64) -> (isize, isize) {
    let base = pos.floor();
    let neighbor = if pos - base >= 0.5 { 1 } else { -1 };
    (base as isize, base as isize + neighbor)
}

struct Grid {
    loc_bw: f64,
    x_bins: usize,
    y_bins: usize,
    center: [f64; 2],
    cfg: HoughConfig,
}

impl Grid {
    fn votes<K: Scaled>(&self, m: &Match<K>) -> Vec<BinKey> {
        let (obj, scene) = (&m.query, &m.train);
        let angle = f64::from(wrap_tau(scene.angle() - obj.angle()));
        let scale = f64::from(scene.sigma_global()) / f64::from(obj.sigma_global());
        if !(scale > 0.0 && scale.is_finite()) {
            return Vec::new();
        }
        let (s, c) = angle.sin_cos();
        let ox = f64::from(obj.x()) - self.center[0];
        let oy = f64::from(obj.y()) - self.center[1];
        let x = f64::from(scene.x()) - scale * (c * ox - s * oy);
        let y = f64::from(scene.y()) - scale * (s * ox + c * oy);

        let a_bins = self.cfg.orientation_bins;
        let s_pos = (scale / self.cfg.scale_min).ln() / self.cfg.scale_factor.ln();
        let axes = [
            axis_bins(x / self.loc_bw),
            axis_bins(y / self.loc_bw),
            axis_bins(angle / (TAU / a_bins as f64)),
            axis_bins(s_pos),
        ];
        let scale_base = axes[3].0;
        if scale_base < 0 || scale_base >= self.cfg.scale_bins as isize {
            return Vec::new();
        }

        let in_range =
            |v: isize, len: usize| (v >= 0 && v < len as isize).then_some(v as usize);
        let mut out = Vec::with_capacity(16);
        for &bx in &[axes[0].0, axes[0].1] {
            let Some(bx) = in_range(bx, self.x_bins) else { continue };
            for &by in &[axes[1].0, axes[1].1] {
                let Some(by) = in_range(by, self.y_bins) else { continue };
                for &ba in &[axes[2].0, axes[2].1] {
                    let ba = ba.rem_euclid(a_bins as isize) as usize;
                    for &bs in &[axes[3].0, axes[3].1] {
                        let Some(bs) = in_range(bs, self.cfg.scale_bins) else { continue };
                        out.push((bx, by, ba, bs));
                    }
                }
            }
        }
        out.sort_unstable();
        out.dedup();
        out
    }
}

fn check_size(size: (usize, usize)) -> KeyMatchResult<()> {
    let (height, width) = size;
    if height == 0 || width == 0 {
        return Err(KeyMatchError::InvalidDimensions { width, height });
    }
    Ok(())
}

/// Clusters matches into affine pose hypotheses.
///
/// `scene_size` and `object_size` are `(height, width)`. Hypotheses are
/// sorted by support, largest first; bins that end up with the same inlier
/// set produce a single hypothesis. Fewer than three matches yield none.
pub fn hough_hypotheses<K: Scaled>(
    scene_size: (usize, usize),
    object_size: (usize, usize),
    matches: &[Match<K>],
    cfg: &HoughConfig,
) -> KeyMatchResult<Vec<Hypothesis<K>>> {
    cfg.validate()?;
    check_size(scene_size)?;
    check_size(object_size)?;
    if matches.len() < 3 {
        return Ok(Vec::new());
    }
    let _span = trace_span!("hough", matches = matches.len()).entered();

    let loc_bw = object_size.0.max(object_size.1) as f64 * cfg.location_coeff;
    let grid = Grid {
        loc_bw,
        x_bins: (scene_size.1 as f64 / loc_bw).ceil() as usize,
        y_bins: (scene_size.0 as f64 / loc_bw).ceil() as usize,
        center: [object_size.1 as f64 * 0.5, object_size.0 as f64 * 0.5],
        cfg: cfg.clone(),
    };

    #[cfg(feature = "rayon")]
    let votes: Vec<Vec<BinKey>> = {
        use rayon::prelude::*;
        matches.par_iter().map(|m| grid.votes(m)).collect()
    };
    #[cfg(not(feature = "rayon"))]
    let votes: Vec<Vec<BinKey>> = matches.iter().map(|m| grid.votes(m)).collect();

    let mut bins: BTreeMap<BinKey, Vec<usize>> = BTreeMap::new();
    for (idx, keys) in votes.into_iter().enumerate() {
        for key in keys {
            bins.entry(key).or_default().push(idx);
        }
    }

    let pairs = correspondences(matches);
    let threshold = loc_bw / 4.0;
    let mut seen: BTreeSet<Vec<usize>> = BTreeSet::new();
    let mut hypotheses = Vec::new();
    for voters in bins.values().filter(|v| v.len() >= cfg.min_votes) {
        let Some((transform, support)) = fit_bin(&pairs, voters, threshold) else {
            continue;
        };
        if support.len() < 3 || !seen.insert(support.clone()) {
            continue;
        }
        hypotheses.push(Hypothesis {
            transform,
            support: support.into_iter().map(|i| matches[i]).collect(),
        });
    }
    hypotheses.sort_by(|a, b| b.support.len().cmp(&a.support.len()));

    trace_event!(
        "hough_hypotheses",
        bins = bins.len(),
        hypotheses = hypotheses.len()
    );
    Ok(hypotheses)
}

/// Fits the voters of one bin, then refits on all matches it explains.
fn fit_bin(
    pairs: &[Correspondence],
    voters: &[usize],
    threshold: f64,
) -> Option<(Transform2d, Vec<usize>)> {
    let subset: Vec<Correspondence> = voters.iter().map(|&i| pairs[i]).collect();
    let initial = fit_affine(&subset).ok()?;
    let inliers = inlier_indices(&initial, pairs, threshold);
    if inliers.len() < 3 {
        return None;
    }
    let subset: Vec<Correspondence> = inliers.iter().map(|&i| pairs[i]).collect();
    if let Ok(refit) = fit_affine(&subset) {
        let refit_inliers = inlier_indices(&refit, pairs, threshold);
        if refit_inliers.len() >= inliers.len() {
            return Some((refit, refit_inliers));
        }
    }
    Some((initial, inliers))
}

/// Best-supported Hough hypothesis, if any.
pub fn hough_pose<K: Scaled>(
    scene_size: (usize, usize),
    object_size: (usize, usize),
    matches: &[Match<K>],
    cfg: &HoughConfig,
) -> KeyMatchResult<Option<Hypothesis<K>>> {
    Ok(hough_hypotheses(scene_size, object_size, matches, cfg)?
        .into_iter()
        .next())
}

#[cfg(test)]
mod tests {
    use super::{axis_bins, hough_hypotheses, HoughConfig};
    use crate::keypoint::ScalePoint;
    use crate::search::Match;

    #[test]
    fn neighbor_follows_nearer_edge() {
        assert_eq!(axis_bins(2.7), (2, 3));
        assert_eq!(axis_bins(2.2), (2, 1));
        assert_eq!(axis_bins(-0.2), (-1, 0));
    }

    #[test]
    fn too_few_matches_yield_nothing() {
        let kp = ScalePoint {
            sigma_global: 1.0,
            ..ScalePoint::default()
        };
        let m = Match {
            query_idx: 0,
            train_idx: 0,
            query: kp,
            train: kp,
            distance: 0.0,
            ratio: 0.0,
        };
        let out = hough_hypotheses((64, 64), (32, 32), &[m, m], &HoughConfig::default()).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn zero_sized_object_is_rejected() {
        let out = hough_hypotheses::<ScalePoint>((64, 64), (0, 32), &[], &HoughConfig::default());
        assert!(out.is_err());
    }
}
