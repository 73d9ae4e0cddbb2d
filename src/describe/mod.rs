//! Keypoint descriptors.
//!
//! Three families share the histogram-grid builder:
//! - [`describe_points`]: axis-aligned patches around [`Point`]s,
//! - [`describe_oriented`]: patches rotated to each dominant orientation of a
//!   [`Point`], one descriptor per orientation,
//! - [`describe_scaled`]: scale-space blobs described on their own Gaussian
//!   layer in octave-local coordinates.
//!
//! Every descriptor is normalized with [`normalize_descriptor`]; patches with
//! no gradient energy are dropped.

pub mod histogrid;
pub mod orientation;

pub use histogrid::{histogrid, HistogridParams};
pub use orientation::{dominant_orientations, histogram_peaks, OrientationConfig};

use crate::filter::Gradients;
use crate::image::{Border, Image};
#[cfg(not(feature = "simd"))]
use crate::kernel::scalar::dot;
#[cfg(feature = "simd")]
use crate::kernel::simd::dot;
use crate::keypoint::{Keypoint, Oriented, OrientedPoint, Point, ScalePoint};
use crate::scale::GaussianPyramid;
use crate::trace::{trace_event, trace_span};
use crate::util::{KeyMatchError, KeyMatchResult};
use std::collections::BTreeMap;

/// Keypoint with its appearance vector.
#[derive(Clone, Debug, PartialEq)]
pub struct Descriptor<K> {
    pub keypoint: K,
    pub data: Vec<f32>,
}

impl<K: Keypoint> Descriptor<K> {
    pub fn new(keypoint: K, data: Vec<f32>) -> Self {
        Self { keypoint, data }
    }

    /// Descriptor length.
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Normalizes in place and returns the descriptor, or `None` for a zero
    /// vector.
    pub fn normalized(mut self, clip: f32) -> Option<Self> {
        normalize_descriptor(&mut self.data, clip).then_some(self)
    }
}

/// L2-normalizes, clips every component at `clip` and normalizes again.
///
/// Returns `false` when the vector has no finite, non-zero norm; the data is
/// left untouched in that case.
pub fn normalize_descriptor(data: &mut [f32], clip: f32) -> bool {
    if !scale_to_unit(data) {
        return false;
    }
    for v in data.iter_mut() {
        *v = v.min(clip);
    }
    scale_to_unit(data)
}

fn scale_to_unit(data: &mut [f32]) -> bool {
    let norm = dot(data, data).sqrt();
    if !(norm > 0.0 && norm.is_finite()) {
        return false;
    }
    let inv = norm.recip();
    data.iter_mut().for_each(|v| *v *= inv);
    true
}

/// Descriptor extraction parameters.
#[derive(Clone, Debug, PartialEq)]
pub struct DescriptorConfig {
    pub histogrid: HistogridParams,
    pub orientation: OrientationConfig,
    /// Ceiling applied between the two normalizations.
    pub clip: f32,
    /// Border policy for gradients and patch sampling.
    pub border: Border,
}

impl Default for DescriptorConfig {
    fn default() -> Self {
        Self {
            histogrid: HistogridParams::default(),
            orientation: OrientationConfig::default(),
            clip: 0.2,
            border: Border::Reflect,
        }
    }
}

impl DescriptorConfig {
    /// Checks parameter ranges.
    pub fn validate(&self) -> KeyMatchResult<()> {
        self.histogrid.validate()?;
        self.orientation.validate()?;
        if !(self.clip > 0.0) {
            return Err(KeyMatchError::InvalidConfig {
                reason: "descriptor clip must be > 0",
            });
        }
        Ok(())
    }

    fn hard_binned(&self) -> HistogridParams {
        HistogridParams {
            interpolate: false,
            ..self.histogrid.clone()
        }
    }

    /// Single-cell grid covering the descriptor patch, for orientation voting.
    fn orientation_grid(&self) -> HistogridParams {
        HistogridParams {
            histo_size: self.histogrid.side(),
            histo_nums: 1,
            bins: self.orientation.bins,
            magnitude_sigma_c: self.histogrid.magnitude_sigma_c,
            interpolate: false,
        }
    }
}

/// Axis-aligned descriptors for plain points.
pub fn describe_points(
    img: &Image,
    points: &[Point],
    cfg: &DescriptorConfig,
) -> KeyMatchResult<Vec<Descriptor<Point>>> {
    cfg.validate()?;
    let _span = trace_span!("describe_points", points = points.len()).entered();
    let grad = Gradients::compute(img, cfg.border)?;
    let params = cfg.hard_binned();

    let mut out = Vec::with_capacity(points.len());
    for &point in points {
        let data = histogrid(&grad, point.row, point.col, 0.0, &params, cfg.border)?;
        out.extend(Descriptor::new(point, data).normalized(cfg.clip));
    }
    trace_event!("descriptors", count = out.len());
    Ok(out)
}

/// Rotation-invariant descriptors, one per dominant orientation.
///
/// Orientations come from a single-cell histogram over the descriptor patch.
pub fn describe_oriented(
    img: &Image,
    points: &[Point],
    cfg: &DescriptorConfig,
) -> KeyMatchResult<Vec<Descriptor<OrientedPoint>>> {
    cfg.validate()?;
    let _span = trace_span!("describe_oriented", points = points.len()).entered();
    let grad = Gradients::compute(img, cfg.border)?;
    let params = cfg.hard_binned();
    let voting = cfg.orientation_grid();

    let mut out = Vec::with_capacity(points.len());
    for &point in points {
        let hist = histogrid(&grad, point.row, point.col, 0.0, &voting, cfg.border)?;
        for angle in histogram_peaks(&hist, &cfg.orientation) {
            let data = histogrid(&grad, point.row, point.col, angle, &params, cfg.border)?;
            let keypoint = OrientedPoint::from_point(point, angle);
            out.extend(Descriptor::new(keypoint, data).normalized(cfg.clip));
        }
    }
    trace_event!("descriptors", count = out.len());
    Ok(out)
}

/// Scale- and rotation-invariant descriptors for pyramid blobs.
///
/// Each blob is described on the Gaussian layer matching its DoG layer, at
/// its octave-local position; the orientation window follows the blob sigma.
/// Output keeps blob order, with one descriptor per orientation.
pub fn describe_scaled(
    pyramid: &GaussianPyramid,
    blobs: &[ScalePoint],
    cfg: &DescriptorConfig,
) -> KeyMatchResult<Vec<Descriptor<ScalePoint>>> {
    cfg.validate()?;
    let _span = trace_span!("describe_scaled", blobs = blobs.len()).entered();

    let mut gradients: BTreeMap<(usize, usize), Gradients> = BTreeMap::new();
    for blob in blobs {
        let key = (blob.octave, blob.layer);
        if gradients.contains_key(&key) {
            continue;
        }
        let layer = pyramid
            .octave(blob.octave)
            .ok_or(KeyMatchError::IndexOutOfBounds {
                index: blob.octave,
                len: pyramid.num_octaves(),
                context: "octave",
            })?
            .layers()
            .get(blob.layer)
            .ok_or(KeyMatchError::IndexOutOfBounds {
                index: blob.layer,
                len: pyramid.config().layers_per_octave(),
                context: "layer",
            })?;
        gradients.insert(key, Gradients::compute(layer.image(), cfg.border)?);
    }

    let describe = |blob: &ScalePoint| -> KeyMatchResult<Vec<Descriptor<ScalePoint>>> {
        let Some(grad) = gradients.get(&(blob.octave, blob.layer)) else {
            return Ok(Vec::new());
        };
        let angles = dominant_orientations(
            grad,
            blob.local_row,
            blob.local_col,
            blob.sigma,
            &cfg.orientation,
            cfg.border,
        )?;
        let mut out = Vec::with_capacity(angles.len());
        for angle in angles {
            let data = histogrid(
                grad,
                blob.local_row,
                blob.local_col,
                angle,
                &cfg.histogrid,
                cfg.border,
            )?;
            out.extend(Descriptor::new(blob.with_angle(angle), data).normalized(cfg.clip));
        }
        Ok(out)
    };

    #[cfg(feature = "rayon")]
    let per_blob: Vec<Vec<Descriptor<ScalePoint>>> = {
        use rayon::prelude::*;
        blobs
            .par_iter()
            .map(describe)
            .collect::<KeyMatchResult<_>>()?
    };
    #[cfg(not(feature = "rayon"))]
    let per_blob: Vec<Vec<Descriptor<ScalePoint>>> = blobs
        .iter()
        .map(describe)
        .collect::<KeyMatchResult<_>>()?;

    let out: Vec<Descriptor<ScalePoint>> = per_blob.into_iter().flatten().collect();
    trace_event!("descriptors", count = out.len());
    Ok(out)
}
