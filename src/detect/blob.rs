//! Scale-space blob detection on a DoG pyramid.

use crate::image::{Border, Image};
use crate::keypoint::{Keypoint, ScalePoint};
use crate::refine::newton::{passes_edge_test, ScaleStack};
use crate::scale::{DogPyramid, Octave};
use crate::trace::{trace_debug, trace_event, trace_span};
use crate::util::math::octave_scale;
use crate::util::{KeyMatchError, KeyMatchResult};

/// Blob detector parameters.
#[derive(Clone, Debug, PartialEq)]
pub struct BlobConfig {
    /// Contrast threshold `t`; candidates below `0.5·t` are skipped and
    /// refined responses below `t / l_size` are rejected.
    pub threshold: f32,
    /// Edge-response ratio `r`.
    pub edge_ratio: f32,
    /// Newton iteration budget.
    pub max_iterations: usize,
    /// Tolerance of the 26-neighbor extremum test.
    pub epsilon: f32,
    /// Pixels closer than this to the octave border are never tested.
    pub border_margin: usize,
    /// Border policy for neighbor sampling.
    pub border: Border,
}

impl Default for BlobConfig {
    fn default() -> Self {
        Self {
            threshold: 0.04,
            edge_ratio: 10.0,
            max_iterations: 5,
            epsilon: 0.0,
            border_margin: 1,
            border: Border::Reflect,
        }
    }
}

impl BlobConfig {
    /// Checks parameter ranges.
    pub fn validate(&self) -> KeyMatchResult<()> {
        if !(self.threshold >= 0.0) {
            return Err(KeyMatchError::InvalidConfig {
                reason: "threshold must be >= 0",
            });
        }
        if !(self.edge_ratio > 0.0) {
            return Err(KeyMatchError::InvalidConfig {
                reason: "edge_ratio must be > 0",
            });
        }
        if self.max_iterations == 0 {
            return Err(KeyMatchError::InvalidConfig {
                reason: "max_iterations must be >= 1",
            });
        }
        if !(self.epsilon >= 0.0) {
            return Err(KeyMatchError::InvalidConfig {
                reason: "epsilon must be >= 0",
            });
        }
        Ok(())
    }
}

/// Finds refined DoG extrema in every octave.
///
/// Output is sorted by `(octave, layer, local_row, local_col)`.
pub fn detect_blobs(dog: &DogPyramid, cfg: &BlobConfig) -> KeyMatchResult<Vec<ScalePoint>> {
    cfg.validate()?;
    let _span = trace_span!("detect_blobs", octaves = dog.num_octaves()).entered();

    let scanner = OctaveScanner {
        cfg,
        layers: dog.config().layers as f32,
        sigma_zero: dog.config().sigma_zero,
    };

    #[cfg(feature = "rayon")]
    let per_octave: Vec<Vec<ScalePoint>> = {
        use rayon::prelude::*;
        dog.octaves()
            .par_iter()
            .enumerate()
            .map(|(idx, octave)| scanner.scan(idx, octave))
            .collect()
    };
    #[cfg(not(feature = "rayon"))]
    let per_octave: Vec<Vec<ScalePoint>> = dog
        .octaves()
        .iter()
        .enumerate()
        .map(|(idx, octave)| scanner.scan(idx, octave))
        .collect();

    let mut blobs: Vec<ScalePoint> = per_octave.into_iter().flatten().collect();
    blobs.sort_by(|a, b| {
        a.octave
            .cmp(&b.octave)
            .then_with(|| a.layer.cmp(&b.layer))
            .then_with(|| a.local_row.total_cmp(&b.local_row))
            .then_with(|| a.local_col.total_cmp(&b.local_col))
    });
    // Distinct seeds can converge onto the same refined extremum.
    blobs.dedup_by(|a, b| a.same_location(b));

    trace_event!("blobs_detected", count = blobs.len());
    Ok(blobs)
}

struct OctaveScanner<'a> {
    cfg: &'a BlobConfig,
    layers: f32,
    sigma_zero: f32,
}

impl OctaveScanner<'_> {
    fn scan(&self, octave_idx: usize, octave: &Octave) -> Vec<ScalePoint> {
        let _span = trace_span!("blob_octave", octave = octave_idx).entered();
        let mut found = Vec::new();
        let num_layers = octave.len();
        if num_layers < 3 {
            return found;
        }
        let (height, width) = octave.dims();
        let margin = self.cfg.border_margin;
        if height <= 2 * margin || width <= 2 * margin {
            return found;
        }
        let pre_threshold = 0.5 * self.cfg.threshold;

        for layer in 1..num_layers - 1 {
            let img = octave.layers()[layer].image();
            for row in margin..height - margin {
                for col in margin..width - margin {
                    let v = img.at(row, col);
                    if v.abs() < pre_threshold {
                        continue;
                    }
                    if !self.is_extremum(octave, layer, row, col, v) {
                        continue;
                    }
                    if let Some(point) = self.refine(octave_idx, octave, layer, row, col) {
                        found.push(point);
                    }
                }
            }
        }
        found
    }

    /// 26-neighbor test for a strict maximum or a strict minimum.
    ///
    /// A neighbor that comes earlier in `(layer, row, col)` scan order and
    /// ties with `v` does not disqualify it, so a flat plateau of equal
    /// samples yields exactly one candidate: its last sample.
    fn is_extremum(&self, octave: &Octave, layer: usize, row: usize, col: usize, v: f32) -> bool {
        let eps = self.cfg.epsilon;
        let border = self.cfg.border;
        let (mut is_max, mut is_min) = (true, true);
        for dl in -1isize..=1 {
            let img = octave.layers()[(layer as isize + dl) as usize].image();
            for dr in -1isize..=1 {
                for dc in -1isize..=1 {
                    if (dl, dr, dc) == (0, 0, 0) {
                        continue;
                    }
                    let n = border.sample(img, row as isize + dr, col as isize + dc);
                    if (dl, dr, dc) < (0, 0, 0) {
                        is_max &= v >= n + eps;
                        is_min &= v <= n - eps;
                    } else {
                        is_max &= v > n + eps;
                        is_min &= v < n - eps;
                    }
                    if !is_max && !is_min {
                        return false;
                    }
                }
            }
        }
        true
    }

    fn stack<'o>(&self, octave: &'o Octave, layer: usize) -> ScaleStack<'o> {
        let image = |idx: usize| -> &'o Image { octave.layers()[idx].image() };
        ScaleStack {
            below: image(layer - 1),
            center: image(layer),
            above: image(layer + 1),
            border: self.cfg.border,
        }
    }

    fn refine(
        &self,
        octave_idx: usize,
        octave: &Octave,
        layer: usize,
        row: usize,
        col: usize,
    ) -> Option<ScalePoint> {
        let (height, width) = octave.dims();
        let margin = self.cfg.border_margin as isize;
        let num_layers = octave.len() as isize;
        let (mut r, mut c, mut l) = (row as isize, col as isize, layer as isize);

        let mut converged = None;
        let mut visited: Vec<(isize, isize, isize)> = Vec::with_capacity(self.cfg.max_iterations);
        for _ in 0..self.cfg.max_iterations {
            let stack = self.stack(octave, l as usize);
            let step = stack.newton_step(r as usize, c as usize)?;
            if step.converged() {
                converged = Some(step);
                break;
            }
            visited.push((r, c, l));
            let next = (
                r + step.offset[0].round() as isize,
                c + step.offset[1].round() as isize,
                l + step.offset[2].round() as isize,
            );
            if visited.contains(&next) {
                // Newton cycles between samples: the extremum sits on the
                // boundary of their cells.
                converged = Some(step.clamped());
                break;
            }
            (r, c, l) = next;
            if r < margin
                || c < margin
                || r >= height as isize - margin
                || c >= width as isize - margin
                || l < 1
                || l > num_layers - 2
            {
                trace_debug!("blob_left_bounds", row = r, col = c, layer = l);
                return None;
            }
        }
        let step = converged?;
        let (r, c, l) = (r as usize, c as usize, l as usize);

        let l_size = (octave.len() - 2) as f32;
        let response = step.interpolated_value();
        if response.abs() < self.cfg.threshold / l_size {
            return None;
        }

        let (drr, dcc, drc) = self.stack(octave, l).spatial_hessian(r, c);
        if !passes_edge_test(drr, dcc, drc, self.cfg.edge_ratio) {
            return None;
        }

        let local_row = r as f32 + step.offset[0];
        let local_col = c as f32 + step.offset[1];
        let scale_pos = (l as f32 + step.offset[2]) / self.layers;
        let factor = octave_scale(octave_idx);
        Some(ScalePoint {
            row: (local_row * factor).round(),
            col: (local_col * factor).round(),
            value: response,
            angle: 0.0,
            local_row,
            local_col,
            octave: octave_idx,
            layer: l,
            sigma: self.sigma_zero * 2f32.powf(scale_pos),
            sigma_global: self.sigma_zero * 2f32.powf(octave_idx as f32 + scale_pos),
            offset: step.offset,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{detect_blobs, BlobConfig, OctaveScanner};
    use crate::image::Image;
    use crate::keypoint::ScalePoint;
    use crate::scale::{GaussianPyramid, Layer, Octave, PyramidConfig};

    /// DoG octave sampled from `f(layer, row, col)`.
    fn synthetic_octave(layers: usize, size: usize, f: impl Fn(f32, f32, f32) -> f32) -> Octave {
        Octave::new(
            (0..layers)
                .map(|l| {
                    let img = Image::from_fn(size, size, |r, c| f(l as f32, r as f32, c as f32))
                        .unwrap();
                    Layer::new(img, 1.6, 1.6)
                })
                .collect(),
        )
    }

    fn scan(octave: &Octave) -> Vec<ScalePoint> {
        let cfg = BlobConfig::default();
        let scanner = OctaveScanner {
            cfg: &cfg,
            layers: 3.0,
            sigma_zero: 1.6,
        };
        scanner.scan(0, octave)
    }

    /// Paraboloid bump centered at `(7, 7)` on layer 1 with peak `base`.
    fn bump(base: f32, sign: f32) -> Octave {
        synthetic_octave(3, 15, move |l, r, c| {
            let d = (r - 7.0).powi(2) + (c - 7.0).powi(2);
            base - sign * (0.01 * d + 0.02 * (l - 1.0).powi(2))
        })
    }

    fn gaussian_spot(size: usize, row: f32, col: f32, sigma: f32) -> Image {
        Image::from_fn(size, size, |r, c| {
            let dr = r as f32 - row;
            let dc = c as f32 - col;
            (-(dr * dr + dc * dc) / (2.0 * sigma * sigma)).exp()
        })
        .unwrap()
    }

    fn blobs_of(img: &Image) -> Vec<ScalePoint> {
        let pyr = GaussianPyramid::build(img, &PyramidConfig::default()).unwrap();
        detect_blobs(&pyr.dog().unwrap(), &BlobConfig::default()).unwrap()
    }

    #[test]
    fn empty_image_has_no_blobs() {
        assert!(blobs_of(&Image::new(64, 64, 1).unwrap()).is_empty());
    }

    #[test]
    fn finds_isolated_spot_with_bounded_offset() {
        let img = gaussian_spot(64, 30.4, 33.3, 3.0);
        let blobs = blobs_of(&img);
        assert!(!blobs.is_empty());
        let best = blobs
            .iter()
            .max_by(|a, b| a.value.abs().total_cmp(&b.value.abs()))
            .unwrap();
        assert!((best.row - 30.4).abs() <= 2.0, "{best:?}");
        assert!((best.col - 33.3).abs() <= 2.0, "{best:?}");
        for blob in &blobs {
            assert!(blob.offset.iter().all(|o| o.abs() <= 0.5));
            assert!(blob.layer >= 1);
        }
    }

    #[test]
    fn rejects_invalid_config() {
        let img = gaussian_spot(32, 16.0, 16.0, 2.0);
        let pyr = GaussianPyramid::build(&img, &PyramidConfig::default()).unwrap();
        let cfg = BlobConfig {
            max_iterations: 0,
            ..BlobConfig::default()
        };
        assert!(detect_blobs(&pyr.dog().unwrap(), &cfg).is_err());
    }

    #[test]
    fn extremum_sign_does_not_depend_on_response_sign() {
        for (base, sign) in [(-1.0, 1.0), (1.0, -1.0), (3.0, 1.0), (-3.0, -1.0)] {
            let found = scan(&bump(base, sign));
            assert_eq!(found.len(), 1, "base {base} sign {sign}");
            assert!((found[0].local_row - 7.0).abs() < 1e-3);
            assert!((found[0].local_col - 7.0).abs() < 1e-3);
            assert!((found[0].value - base).abs() < 1e-3);
        }
    }

    #[test]
    fn tied_plateau_between_samples_yields_one_blob() {
        // Eight samples tie around the half-pixel, half-layer minimum.
        let octave = synthetic_octave(4, 15, |l, r, c| {
            let d = (r - 7.5).powi(2) + (c - 7.5).powi(2);
            -1.0 + 0.01 * d + 0.02 * (l - 1.5).powi(2)
        });
        let found = scan(&octave);
        assert_eq!(found.len(), 1, "{found:?}");
        let blob = found[0];
        assert!((blob.local_row - 7.5).abs() < 1e-3, "{blob:?}");
        assert!((blob.local_col - 7.5).abs() < 1e-3, "{blob:?}");
        assert!(blob.offset.iter().all(|o| o.abs() <= 0.5));
        let scale_pos = blob.layer as f32 + blob.offset[2];
        assert!((scale_pos - 1.5).abs() < 1e-3, "{blob:?}");
    }

    #[test]
    fn sigma_tags_follow_gaussian_layers_for_any_padding() {
        let img = gaussian_spot(64, 30.4, 33.3, 3.0);
        let detect = |add_layers: usize| {
            let cfg = PyramidConfig {
                add_layers,
                ..PyramidConfig::default()
            };
            let pyr = GaussianPyramid::build(&img, &cfg).unwrap();
            let blobs = detect_blobs(&pyr.dog().unwrap(), &BlobConfig::default()).unwrap();
            let best = *blobs
                .iter()
                .max_by(|a, b| a.value.abs().total_cmp(&b.value.abs()))
                .unwrap();
            (pyr, best)
        };
        let (pyr, padded) = detect(5);
        let (_, default) = detect(3);

        assert_eq!((padded.octave, padded.layer), (default.octave, default.layer));
        assert!((padded.sigma - default.sigma).abs() < 1e-5);
        assert!((padded.sigma_global - default.sigma_global).abs() < 1e-5);

        // Interpolated between the Gaussian layer sigmas, in steps of 2^(1/L).
        let layer_sigma = pyr.octave(padded.octave).unwrap().layers()[padded.layer].sigma();
        let expected = layer_sigma * 2f32.powf(padded.offset[2] / 3.0);
        assert!((padded.sigma - expected).abs() < 1e-4, "{padded:?}");
    }
}
