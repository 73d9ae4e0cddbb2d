//! Spatial/orientation histogram grids.
//!
//! A square patch of side `histo_size · histo_nums` is sampled on a unit grid
//! around the keypoint, rotated by the keypoint orientation, and every sample
//! votes into a `histo_nums × histo_nums × bins` histogram. The flattened
//! layout is `[cell_row][cell_col][bin]`.

use crate::filter::Gradients;
use crate::image::Border;
use crate::util::math::{gaussian_weight, wrap_tau};
use crate::util::{AngleBins, KeyMatchError, KeyMatchResult};

/// Histogram grid layout.
#[derive(Clone, Debug, PartialEq)]
pub struct HistogridParams {
    /// Cell side in samples.
    pub histo_size: usize,
    /// Cells per patch side.
    pub histo_nums: usize,
    /// Orientation bins per cell.
    pub bins: usize,
    /// Gaussian window sigma relative to the patch side.
    pub magnitude_sigma_c: f32,
    /// Spread samples bilinearly over neighboring cells.
    pub interpolate: bool,
}

impl Default for HistogridParams {
    fn default() -> Self {
        Self {
            histo_size: 4,
            histo_nums: 4,
            bins: 8,
            magnitude_sigma_c: 0.5,
            interpolate: true,
        }
    }
}

impl HistogridParams {
    /// Checks parameter ranges.
    pub fn validate(&self) -> KeyMatchResult<()> {
        if self.histo_size == 0 || self.histo_nums == 0 || self.bins == 0 {
            return Err(KeyMatchError::InvalidConfig {
                reason: "histogrid sizes must be >= 1",
            });
        }
        if !(self.magnitude_sigma_c > 0.0) {
            return Err(KeyMatchError::InvalidConfig {
                reason: "magnitude_sigma_c must be > 0",
            });
        }
        Ok(())
    }

    /// Patch side in samples.
    pub fn side(&self) -> usize {
        self.histo_size * self.histo_nums
    }

    /// Flattened histogram length `histo_nums² · bins`.
    pub fn len(&self) -> usize {
        self.histo_nums * self.histo_nums * self.bins
    }

    /// Returns true if the layout has no cells.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Builds the histogram grid around `(row, col)` oriented at `angle`.
///
/// Positions are in the pixel units of `grad`; gradients are sampled
/// bilinearly through `border`. Sample angles are measured relative to
/// `angle`, so rotating the image and the angle together leaves the result
/// unchanged up to resampling.
pub fn histogrid(
    grad: &Gradients,
    row: f32,
    col: f32,
    angle: f32,
    params: &HistogridParams,
    border: Border,
) -> KeyMatchResult<Vec<f32>> {
    params.validate()?;
    let bins = AngleBins::new(params.bins)?;
    let n = params.histo_nums;
    let cell = params.histo_size as f32;
    let side = params.side();
    let half = side as f32 * 0.5;
    let sigma = params.magnitude_sigma_c * side as f32;
    let (sin, cos) = angle.sin_cos();
    let mut hist = vec![0.0f32; params.len()];

    for i in 0..side {
        // Patch frame: u along the orientation, v perpendicular to it.
        let v = i as f32 + 0.5 - half;
        for j in 0..side {
            let u = j as f32 + 0.5 - half;
            let x = col + cos * u - sin * v;
            let y = row + sin * u + cos * v;
            let (gx, gy) = grad.sample(y, x, border);
            let magnitude = gx.hypot(gy);
            if magnitude == 0.0 {
                continue;
            }
            let weight = gaussian_weight(u * u + v * v, sigma) * magnitude;
            let (lower, upper, frac) = bins.split(wrap_tau(gy.atan2(gx) - angle));

            let mut add = |cr: usize, cc: usize, w: f32| {
                let base = (cr * n + cc) * params.bins;
                hist[base + lower] += w * (1.0 - frac);
                hist[base + upper] += w * frac;
            };

            if params.interpolate {
                let fr = (v + half) / cell - 0.5;
                let fc = (u + half) / cell - 0.5;
                let (r0, c0) = (fr.floor(), fc.floor());
                let (wr, wc) = (fr - r0, fc - c0);
                for (dr, wrow) in [(0isize, 1.0 - wr), (1, wr)] {
                    for (dc, wcol) in [(0isize, 1.0 - wc), (1, wc)] {
                        let cr = r0 as isize + dr;
                        let cc = c0 as isize + dc;
                        if cr < 0 || cc < 0 || cr >= n as isize || cc >= n as isize {
                            continue;
                        }
                        let w = weight * wrow * wcol;
                        if w > 0.0 {
                            add(cr as usize, cc as usize, w);
                        }
                    }
                }
            } else {
                add(i / params.histo_size, j / params.histo_size, weight);
            }
        }
    }
    Ok(hist)
}

#[cfg(test)]
mod tests {
    use super::{histogrid, HistogridParams};
    use crate::filter::Gradients;
    use crate::image::{Border, Image};

    fn ramp_gradients() -> Gradients {
        let img = Image::from_fn(40, 40, |_, c| c as f32 * 0.05).unwrap();
        Gradients::compute(&img, Border::Replicate).unwrap()
    }

    #[test]
    fn output_length_matches_layout() {
        let hist = histogrid(
            &ramp_gradients(),
            20.0,
            20.0,
            0.0,
            &HistogridParams::default(),
            Border::Reflect,
        )
        .unwrap();
        assert_eq!(hist.len(), 4 * 4 * 8);
        assert!(hist.iter().all(|v| v.is_finite() && *v >= 0.0));
    }

    #[test]
    fn uniform_gradient_fills_one_bin_pair_per_cell() {
        let params = HistogridParams {
            interpolate: false,
            ..HistogridParams::default()
        };
        let hist = histogrid(&ramp_gradients(), 20.0, 20.0, 0.0, &params, Border::Reflect).unwrap();
        for cell in hist.chunks_exact(8) {
            // Angle 0 falls between the centers of the last and first bins.
            assert!((cell[0] - cell[7]).abs() < 1e-3 * cell[0].max(1.0));
            assert!(cell[0] > 0.0);
            assert!(cell[1..7].iter().all(|&v| v == 0.0));
        }
    }

    #[test]
    fn relative_angle_shifts_bins() {
        let params = HistogridParams {
            histo_nums: 1,
            histo_size: 8,
            interpolate: false,
            ..HistogridParams::default()
        };
        let width = std::f32::consts::TAU / 8.0;
        // Orientation one bin above the gradient: samples land half a bin
        // below bin 0's center, split between bins 6 and 7.
        let hist = histogrid(&ramp_gradients(), 20.0, 20.0, width, &params, Border::Reflect).unwrap();
        assert!(hist[6] > 0.0 && hist[7] > 0.0);
        assert!(hist[0..6].iter().all(|&v| v == 0.0));
    }

    #[test]
    fn rejects_empty_layout() {
        let params = HistogridParams {
            bins: 0,
            ..HistogridParams::default()
        };
        assert!(histogrid(&ramp_gradients(), 5.0, 5.0, 0.0, &params, Border::Reflect).is_err());
    }
}
