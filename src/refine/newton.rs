//! Newton refinement of scale-space extrema.
//!
//! The DoG response around an integer sample is modelled as
//! `D(x) ≈ D + ∇ᵀx + ½ xᵀHx` in `(row, col, scale)` with central differences
//! over three adjacent layers; the stationary point is `x = −H⁻¹∇`.

use crate::image::{Border, Image};
use nalgebra::{Matrix3, Vector3};

/// Three adjacent DoG layers of one octave: below, center, above.
#[derive(Clone, Copy)]
pub struct ScaleStack<'a> {
    pub below: &'a Image,
    pub center: &'a Image,
    pub above: &'a Image,
    pub border: Border,
}

/// Local quadratic model at an integer sample.
#[derive(Clone, Copy, Debug)]
pub struct NewtonStep {
    /// Response at the integer sample.
    pub value: f32,
    /// Gradient in `(row, col, scale)`.
    pub gradient: [f32; 3],
    /// Stationary-point offset `−H⁻¹∇`.
    pub offset: [f32; 3],
}

impl NewtonStep {
    /// Response extrapolated to the stationary point.
    pub fn interpolated_value(&self) -> f32 {
        let dot: f32 = self
            .gradient
            .iter()
            .zip(self.offset.iter())
            .map(|(g, o)| g * o)
            .sum();
        self.value + 0.5 * dot
    }

    /// True when every offset component is below half a sample.
    pub fn converged(&self) -> bool {
        self.offset.iter().all(|o| o.abs() < 0.5)
    }

    /// Same model with the offset limited to the half-sample cell.
    pub fn clamped(self) -> Self {
        Self {
            offset: self.offset.map(|o| o.clamp(-0.5, 0.5)),
            ..self
        }
    }
}

impl<'a> ScaleStack<'a> {
    #[inline]
    fn at(&self, img: &Image, row: isize, col: isize) -> f64 {
        f64::from(self.border.sample(img, row, col))
    }

    /// Central-difference gradient and Hessian, solved for the offset.
    ///
    /// Returns `None` when the Hessian is singular or the solution is not
    /// finite.
    pub fn newton_step(&self, row: usize, col: usize) -> Option<NewtonStep> {
        let (r, c) = (row as isize, col as isize);
        let (p, m, n) = (self.below, self.center, self.above);
        let v = self.at(m, r, c);

        let dr = 0.5 * (self.at(m, r + 1, c) - self.at(m, r - 1, c));
        let dc = 0.5 * (self.at(m, r, c + 1) - self.at(m, r, c - 1));
        let ds = 0.5 * (self.at(n, r, c) - self.at(p, r, c));

        let drr = self.at(m, r + 1, c) + self.at(m, r - 1, c) - 2.0 * v;
        let dcc = self.at(m, r, c + 1) + self.at(m, r, c - 1) - 2.0 * v;
        let dss = self.at(n, r, c) + self.at(p, r, c) - 2.0 * v;
        let drc = 0.25
            * (self.at(m, r + 1, c + 1) - self.at(m, r + 1, c - 1) - self.at(m, r - 1, c + 1)
                + self.at(m, r - 1, c - 1));
        let drs = 0.25
            * (self.at(n, r + 1, c) - self.at(n, r - 1, c) - self.at(p, r + 1, c)
                + self.at(p, r - 1, c));
        let dcs = 0.25
            * (self.at(n, r, c + 1) - self.at(n, r, c - 1) - self.at(p, r, c + 1)
                + self.at(p, r, c - 1));

        let hessian = Matrix3::new(drr, drc, drs, drc, dcc, dcs, drs, dcs, dss);
        let gradient = Vector3::new(dr, dc, ds);
        let offset = -(hessian.lu().solve(&gradient)?);
        if !offset.iter().all(|v| v.is_finite()) {
            return None;
        }

        Some(NewtonStep {
            value: v as f32,
            gradient: [dr as f32, dc as f32, ds as f32],
            offset: [offset[0] as f32, offset[1] as f32, offset[2] as f32],
        })
    }

    /// Spatial Hessian `(drr, dcc, drc)` of the center layer.
    pub fn spatial_hessian(&self, row: usize, col: usize) -> (f32, f32, f32) {
        let (r, c) = (row as isize, col as isize);
        let m = self.center;
        let v = self.at(m, r, c);
        let drr = self.at(m, r + 1, c) + self.at(m, r - 1, c) - 2.0 * v;
        let dcc = self.at(m, r, c + 1) + self.at(m, r, c - 1) - 2.0 * v;
        let drc = 0.25
            * (self.at(m, r + 1, c + 1) - self.at(m, r + 1, c - 1) - self.at(m, r - 1, c + 1)
                + self.at(m, r - 1, c - 1));
        (drr as f32, dcc as f32, drc as f32)
    }
}

/// True when the spatial Hessian passes the edge-response ratio test.
///
/// Rejects saddles (`det ≤ 0`) and elongated responses with
/// `tr² / det > (r + 1)² / r`.
pub fn passes_edge_test(drr: f32, dcc: f32, drc: f32, edge_ratio: f32) -> bool {
    let trace = drr + dcc;
    let det = drr * dcc - drc * drc;
    if !(det > 0.0) {
        return false;
    }
    trace * trace / det <= (edge_ratio + 1.0).powi(2) / edge_ratio
}

#[cfg(test)]
mod tests {
    use super::{passes_edge_test, ScaleStack};
    use crate::image::{Border, Image};

    fn quadratic_layer(s: f32, r0: f32, c0: f32, s0: f32) -> Image {
        Image::from_fn(9, 9, |r, c| {
            let dr = r as f32 - r0;
            let dc = c as f32 - c0;
            let ds = s - s0;
            1.0 - 0.05 * dr * dr - 0.08 * dc * dc - 0.1 * ds * ds
        })
        .unwrap()
    }

    #[test]
    fn recovers_quadratic_extremum() {
        let (r0, c0, s0) = (4.3, 3.8, 0.2);
        let below = quadratic_layer(-1.0, r0, c0, s0);
        let center = quadratic_layer(0.0, r0, c0, s0);
        let above = quadratic_layer(1.0, r0, c0, s0);
        let stack = ScaleStack {
            below: &below,
            center: &center,
            above: &above,
            border: Border::Reflect,
        };
        let step = stack.newton_step(4, 4).unwrap();
        assert!((step.offset[0] - 0.3).abs() < 1e-3);
        assert!((step.offset[1] + 0.2).abs() < 1e-3);
        assert!((step.offset[2] - 0.2).abs() < 1e-3);
        assert!(step.converged());
        assert!((step.interpolated_value() - 1.0).abs() < 1e-3);
    }

    #[test]
    fn clamping_limits_offset_to_the_cell() {
        let (r0, c0, s0) = (4.9, 3.2, 0.0);
        let below = quadratic_layer(-1.0, r0, c0, s0);
        let center = quadratic_layer(0.0, r0, c0, s0);
        let above = quadratic_layer(1.0, r0, c0, s0);
        let stack = ScaleStack {
            below: &below,
            center: &center,
            above: &above,
            border: Border::Reflect,
        };
        let step = stack.newton_step(4, 4).unwrap();
        assert!(!step.converged());
        let clamped = step.clamped();
        assert_eq!(clamped.offset[0], 0.5);
        assert_eq!(clamped.offset[1], -0.5);
        assert!(clamped.offset[2].abs() < 1e-3);
        assert_eq!(clamped.value, step.value);
    }

    #[test]
    fn flat_stack_is_singular() {
        let flat = Image::new(5, 5, 1).unwrap();
        let stack = ScaleStack {
            below: &flat,
            center: &flat,
            above: &flat,
            border: Border::Reflect,
        };
        assert!(stack.newton_step(2, 2).is_none());
    }

    #[test]
    fn edge_test_rejects_ridges_and_saddles() {
        assert!(passes_edge_test(-1.0, -1.0, 0.0, 10.0));
        assert!(!passes_edge_test(-1.0, -0.01, 0.0, 10.0));
        assert!(!passes_edge_test(-1.0, 1.0, 0.0, 10.0));
    }
}
