//! Gaussian scale space and difference-of-Gaussian pyramids.
//!
//! A pyramid is a sequence of octaves at halving resolution. Every octave
//! holds `layers + add_layers` progressively blurred images whose local sigma
//! grows by the constant factor `2^(1/layers)`. Octave `o + 1` is seeded by
//! 2x2 area downsampling of layer `layers` of octave `o`, which has exactly
//! twice the blur of the octave's first layer.
//!
//! `sigma` is measured in octave-local pixels; `sigma_global` is the
//! cumulative blur expressed in base-image pixels.

mod dog;

pub use dog::DogPyramid;

use crate::filter::gaussian_blur;
use crate::image::pyramid::downsample2x;
use crate::image::{Border, Image};
use crate::trace::{trace_event, trace_span};
use crate::util::{KeyMatchError, KeyMatchResult};

/// Scale-space construction parameters.
#[derive(Clone, Debug, PartialEq)]
pub struct PyramidConfig {
    /// Number of sigma doublings per octave (`L`).
    pub layers: usize,
    /// Extra layers per octave beyond `layers`.
    pub add_layers: usize,
    /// Base blur of the first layer of every octave.
    pub sigma_zero: f32,
    /// Nominal blur already present in the input image.
    pub sigma_start: f32,
    /// Octave count is derived from `log2(min(h, w) / min_size)`.
    pub min_size: usize,
    /// Border policy used by the Gaussian blurs.
    pub border: Border,
}

impl Default for PyramidConfig {
    fn default() -> Self {
        Self {
            layers: 3,
            add_layers: 3,
            sigma_zero: 1.6,
            sigma_start: 0.5,
            min_size: 16,
            border: Border::Reflect,
        }
    }
}

impl PyramidConfig {
    /// Checks parameter ranges.
    pub fn validate(&self) -> KeyMatchResult<()> {
        if self.layers == 0 {
            return Err(KeyMatchError::InvalidConfig {
                reason: "layers must be >= 1",
            });
        }
        if self.layers + self.add_layers < 2 {
            return Err(KeyMatchError::InvalidConfig {
                reason: "an octave needs at least two layers",
            });
        }
        if !(self.sigma_start >= 0.0) || !(self.sigma_zero > self.sigma_start) {
            return Err(KeyMatchError::InvalidConfig {
                reason: "sigma_zero must exceed sigma_start >= 0",
            });
        }
        if self.min_size < 2 {
            return Err(KeyMatchError::InvalidConfig {
                reason: "min_size must be >= 2",
            });
        }
        Ok(())
    }

    /// Layers held by each octave.
    pub fn layers_per_octave(&self) -> usize {
        self.layers + self.add_layers
    }

    /// Geometric sigma step between consecutive layers.
    pub fn step(&self) -> f32 {
        2f32.powf(1.0 / self.layers as f32)
    }

    /// Number of octaves for an image of the given size.
    pub fn num_octaves(&self, height: usize, width: usize) -> usize {
        let min_dim = height.min(width) as f64;
        let count = (min_dim / self.min_size as f64).log2().round() + 1.0;
        if count.is_finite() && count > 1.0 {
            count as usize
        } else {
            1
        }
    }
}

/// One blurred image with its scale tags.
#[derive(Clone, Debug)]
pub struct Layer {
    image: Image,
    sigma: f32,
    sigma_global: f32,
}

impl Layer {
    pub(crate) fn new(image: Image, sigma: f32, sigma_global: f32) -> Self {
        Self {
            image,
            sigma,
            sigma_global,
        }
    }

    /// Returns the layer image.
    pub fn image(&self) -> &Image {
        &self.image
    }

    /// Blur in octave-local pixels.
    pub fn sigma(&self) -> f32 {
        self.sigma
    }

    /// Cumulative blur in base-image pixels.
    pub fn sigma_global(&self) -> f32 {
        self.sigma_global
    }
}

/// Layers sharing one spatial resolution.
#[derive(Clone, Debug)]
pub struct Octave {
    layers: Vec<Layer>,
}

impl Octave {
    pub(crate) fn new(layers: Vec<Layer>) -> Self {
        Self { layers }
    }

    /// Returns all layers in increasing blur order.
    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    /// Returns layer `idx`.
    pub fn layer(&self, idx: usize) -> Option<&Layer> {
        self.layers.get(idx)
    }

    /// Number of layers.
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    /// Returns true if the octave holds no layers.
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Returns `(height, width)` shared by the layers.
    pub fn dims(&self) -> (usize, usize) {
        self.layers
            .first()
            .map(|layer| layer.image.dims())
            .unwrap_or((0, 0))
    }
}

/// Gaussian scale-space pyramid.
#[derive(Clone, Debug)]
pub struct GaussianPyramid {
    octaves: Vec<Octave>,
    config: PyramidConfig,
}

impl GaussianPyramid {
    /// Builds the pyramid from a single-channel image.
    pub fn build(img: &Image, config: &PyramidConfig) -> KeyMatchResult<Self> {
        config.validate()?;
        img.ensure_gray()?;
        let _span = trace_span!("build_pyramid", width = img.width(), height = img.height())
            .entered();

        let num_octaves = config.num_octaves(img.height(), img.width());
        let per_octave = config.layers_per_octave();
        let step = config.step();
        let border = config.border;

        let base_delta = (config.sigma_zero.powi(2) - config.sigma_start.powi(2)).sqrt();
        let mut seed = Layer::new(
            gaussian_blur(img, base_delta, border)?,
            config.sigma_zero,
            config.sigma_zero,
        );

        let mut octaves: Vec<Octave> = Vec::with_capacity(num_octaves);
        for octave_idx in 0..num_octaves {
            let base_global = seed.sigma_global;
            let mut layers = Vec::with_capacity(per_octave);
            layers.push(seed);
            for i in 1..per_octave {
                let prev = &layers[i - 1];
                let sigma = config.sigma_zero * step.powi(i as i32);
                let delta = (sigma * sigma - prev.sigma * prev.sigma).sqrt();
                let image = gaussian_blur(&prev.image, delta, border)?;
                layers.push(Layer::new(image, sigma, base_global * step.powi(i as i32)));
            }

            let octave = Octave::new(layers);
            let next_seed = if octave_idx + 1 < num_octaves {
                Self::next_seed(&octave, config, step)?
            } else {
                None
            };
            octaves.push(octave);
            match next_seed {
                Some(layer) => seed = layer,
                None => break,
            }
        }

        trace_event!("pyramid_built", octaves = octaves.len());
        Ok(Self {
            octaves,
            config: config.clone(),
        })
    }

    fn next_seed(
        octave: &Octave,
        config: &PyramidConfig,
        step: f32,
    ) -> KeyMatchResult<Option<Layer>> {
        let (height, width) = octave.dims();
        if height < 4 || width < 4 {
            return Ok(None);
        }
        let (source, sigma_global) = if config.add_layers == 0 {
            let last = octave.len() - 1;
            (&octave.layers[last], octave.layers[last].sigma_global * step)
        } else {
            let layer = &octave.layers[config.layers];
            (layer, layer.sigma_global)
        };
        let image = downsample2x(&source.image)?;
        Ok(Some(Layer::new(image, config.sigma_zero, sigma_global)))
    }

    /// Returns the octaves, finest first.
    pub fn octaves(&self) -> &[Octave] {
        &self.octaves
    }

    /// Returns octave `idx`.
    pub fn octave(&self, idx: usize) -> Option<&Octave> {
        self.octaves.get(idx)
    }

    /// Number of octaves.
    pub fn num_octaves(&self) -> usize {
        self.octaves.len()
    }

    /// Returns the configuration used to build the pyramid.
    pub fn config(&self) -> &PyramidConfig {
        &self.config
    }

    /// Lazy iterator over `(octave, layer, &Layer)`; each call restarts.
    pub fn layers(&self) -> Layers<'_> {
        Layers::new(&self.octaves)
    }

    /// Builds the difference-of-Gaussian pyramid.
    pub fn dog(&self) -> KeyMatchResult<DogPyramid> {
        DogPyramid::from_gaussian(self)
    }
}

/// Iterator over all layers of a set of octaves.
#[derive(Clone, Debug)]
pub struct Layers<'a> {
    octaves: &'a [Octave],
    octave: usize,
    layer: usize,
}

impl<'a> Layers<'a> {
    pub(crate) fn new(octaves: &'a [Octave]) -> Self {
        Self {
            octaves,
            octave: 0,
            layer: 0,
        }
    }
}

impl<'a> Iterator for Layers<'a> {
    type Item = (usize, usize, &'a Layer);

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(octave) = self.octaves.get(self.octave) {
            if let Some(layer) = octave.layers.get(self.layer) {
                let item = (self.octave, self.layer, layer);
                self.layer += 1;
                return Some(item);
            }
            self.octave += 1;
            self.layer = 0;
        }
        None
    }
}
