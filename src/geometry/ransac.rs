//! RANSAC homography estimation.
//!
//! Each trial owns an RNG seeded from `(seed, trial)`, so the result is the
//! same whether trials run sequentially or in parallel.

use super::{
    correspondences, fit_homography, inlier_indices, Correspondence, Hypothesis, Transform2d,
};
use crate::keypoint::Keypoint;
use crate::search::Match;
use crate::trace::{trace_event, trace_span};
use crate::util::{KeyMatchError, KeyMatchResult};
use rand::rngs::StdRng;
use rand::SeedableRng;

const SAMPLE_SIZE: usize = 4;

/// RANSAC parameters.
#[derive(Clone, Debug, PartialEq)]
pub struct RansacConfig {
    /// Number of minimal-sample trials.
    pub iterations: usize,
    /// Reprojection distance in pixels below which a match is an inlier.
    pub threshold: f64,
    /// Base seed for the per-trial generators.
    pub seed: u64,
}

impl Default for RansacConfig {
    fn default() -> Self {
        Self {
            iterations: 1200,
            threshold: 4.5,
            seed: 0,
        }
    }
}

impl RansacConfig {
    /// Checks parameter ranges.
    pub fn validate(&self) -> KeyMatchResult<()> {
        if self.iterations == 0 {
            return Err(KeyMatchError::InvalidConfig {
                reason: "iterations must be >= 1",
            });
        }
        if !(self.threshold > 0.0) {
            return Err(KeyMatchError::InvalidConfig {
                reason: "threshold must be > 0",
            });
        }
        Ok(())
    }
}

fn trial_seed(seed: u64, trial: usize) -> u64 {
    seed ^ (trial as u64 + 1).wrapping_mul(0x9E37_79B9_7F4A_7C15)
}

fn cross(o: [f64; 2], a: [f64; 2], b: [f64; 2]) -> f64 {
    (a[0] - o[0]) * (b[1] - o[1]) - (a[1] - o[1]) * (b[0] - o[0])
}

/// True when three of the sampled points are (nearly) collinear on either
/// side of the correspondence.
fn is_degenerate_sample(sample: &[Correspondence]) -> bool {
    let sides: [fn(&Correspondence) -> [f64; 2]; 2] = [|p| p.0, |p| p.1];
    for side in sides {
        let pts: Vec<[f64; 2]> = sample.iter().map(side).collect();
        for i in 0..pts.len() {
            for j in i + 1..pts.len() {
                for k in j + 1..pts.len() {
                    if cross(pts[i], pts[j], pts[k]).abs() < 1e-6 {
                        return true;
                    }
                }
            }
        }
    }
    false
}

struct Trial {
    index: usize,
    inliers: Vec<usize>,
    transform: Transform2d,
}

fn run_trial(pairs: &[Correspondence], cfg: &RansacConfig, index: usize) -> Option<Trial> {
    let mut rng = StdRng::seed_from_u64(trial_seed(cfg.seed, index));
    let picked = rand::seq::index::sample(&mut rng, pairs.len(), SAMPLE_SIZE);
    let sample: Vec<Correspondence> = picked.iter().map(|i| pairs[i]).collect();
    if is_degenerate_sample(&sample) {
        return None;
    }
    let transform = fit_homography(&sample).ok()?;
    Some(Trial {
        index,
        inliers: inlier_indices(&transform, pairs, cfg.threshold),
        transform,
    })
}

/// Estimates an object → scene homography from matches.
///
/// Returns `Ok(None)` with fewer than four matches or when no trial produced
/// a usable model. The largest consensus set wins, the earliest trial on
/// ties, and the model is refit on all of its inliers.
pub fn ransac_homography<K: Keypoint>(
    matches: &[Match<K>],
    cfg: &RansacConfig,
) -> KeyMatchResult<Option<Hypothesis<K>>> {
    cfg.validate()?;
    if matches.len() < SAMPLE_SIZE {
        return Ok(None);
    }
    let _span = trace_span!("ransac", matches = matches.len(), iterations = cfg.iterations)
        .entered();
    let pairs = correspondences(matches);

    #[cfg(feature = "rayon")]
    let trials: Vec<Option<Trial>> = {
        use rayon::prelude::*;
        (0..cfg.iterations)
            .into_par_iter()
            .map(|i| run_trial(&pairs, cfg, i))
            .collect()
    };
    #[cfg(not(feature = "rayon"))]
    let trials: Vec<Option<Trial>> = (0..cfg.iterations)
        .map(|i| run_trial(&pairs, cfg, i))
        .collect();

    let mut best: Option<Trial> = None;
    for trial in trials.into_iter().flatten() {
        let better = best.as_ref().map_or(true, |b| {
            trial.inliers.len() > b.inliers.len()
                || (trial.inliers.len() == b.inliers.len() && trial.index < b.index)
        });
        if better {
            best = Some(trial);
        }
    }
    let Some(best) = best else {
        return Ok(None);
    };

    let mut transform = best.transform;
    let mut inliers = best.inliers;
    if inliers.len() > SAMPLE_SIZE {
        let subset: Vec<Correspondence> = inliers.iter().map(|&i| pairs[i]).collect();
        if let Ok(refit) = fit_homography(&subset) {
            let refit_inliers = inlier_indices(&refit, &pairs, cfg.threshold);
            if refit_inliers.len() >= inliers.len() {
                transform = refit;
                inliers = refit_inliers;
            }
        }
    }

    trace_event!("ransac_inliers", count = inliers.len(), trial = best.index);
    Ok(Some(Hypothesis {
        transform,
        support: inliers.into_iter().map(|i| matches[i]).collect(),
    }))
}

#[cfg(test)]
mod tests {
    use super::{ransac_homography, RansacConfig};
    use crate::geometry::Transform2d;
    use crate::keypoint::Point;
    use crate::search::Match;

    fn matched(src: (f32, f32), dst: (f32, f32)) -> Match<Point> {
        Match {
            query_idx: 0,
            train_idx: 0,
            query: Point::new(src.1, src.0, 1.0),
            train: Point::new(dst.1, dst.0, 1.0),
            distance: 0.0,
            ratio: 0.0,
        }
    }

    #[test]
    fn too_few_matches_yield_none() {
        let m = matched((0.0, 0.0), (1.0, 1.0));
        assert!(ransac_homography(&[m, m, m], &RansacConfig::default())
            .unwrap()
            .is_none());
    }

    #[test]
    fn same_seed_gives_same_result() {
        let t = Transform2d::similarity(0.4, 1.3, 10.0, 5.0);
        let mut matches = Vec::new();
        for i in 0..20 {
            let (x, y) = ((i * 37 % 50) as f64, (i * 11 % 40) as f64);
            let (u, v) = t.apply(x, y).unwrap();
            matches.push(matched((x as f32, y as f32), (u as f32, v as f32)));
        }
        matches.push(matched((3.0, 3.0), (90.0, -40.0)));
        let cfg = RansacConfig {
            iterations: 50,
            ..RansacConfig::default()
        };
        let a = ransac_homography(&matches, &cfg).unwrap().unwrap();
        let b = ransac_homography(&matches, &cfg).unwrap().unwrap();
        assert_eq!(a, b);
        assert_eq!(a.support.len(), 20);
    }

    #[test]
    fn rejects_invalid_threshold() {
        let cfg = RansacConfig {
            threshold: 0.0,
            ..RansacConfig::default()
        };
        assert!(ransac_homography::<Point>(&[], &cfg).is_err());
    }
}
