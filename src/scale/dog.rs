use crate::image::ops::subtract;
use crate::scale::{GaussianPyramid, Layer, Layers, Octave, PyramidConfig};
use crate::util::KeyMatchResult;

/// Difference-of-Gaussian pyramid.
///
/// DoG layer `i` is `gauss[i + 1] - gauss[i]` and carries the sigma tags of
/// `gauss[i]`.
#[derive(Clone, Debug)]
pub struct DogPyramid {
    octaves: Vec<Octave>,
    config: PyramidConfig,
}

impl DogPyramid {
    /// Subtracts adjacent layers of every octave.
    pub fn from_gaussian(pyramid: &GaussianPyramid) -> KeyMatchResult<Self> {
        let mut octaves = Vec::with_capacity(pyramid.num_octaves());
        for octave in pyramid.octaves() {
            let layers = octave
                .layers()
                .windows(2)
                .map(|pair| {
                    let image = subtract(pair[1].image(), pair[0].image())?;
                    Ok(Layer::new(image, pair[0].sigma(), pair[0].sigma_global()))
                })
                .collect::<KeyMatchResult<Vec<_>>>()?;
            octaves.push(Octave::new(layers));
        }
        Ok(Self {
            octaves,
            config: pyramid.config().clone(),
        })
    }

    /// Returns the DoG octaves, finest first.
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

    /// DoG layers per octave.
    pub fn layers_per_octave(&self) -> usize {
        self.config.layers_per_octave().saturating_sub(1)
    }

    /// Returns the configuration of the source pyramid.
    pub fn config(&self) -> &PyramidConfig {
        &self.config
    }

    /// Lazy iterator over `(octave, layer, &Layer)`.
    pub fn layers(&self) -> Layers<'_> {
        Layers::new(&self.octaves)
    }
}

#[cfg(test)]
mod tests {
    use crate::image::Image;
    use crate::scale::{GaussianPyramid, PyramidConfig};

    #[test]
    fn dog_has_one_fewer_layer_and_lower_tags() {
        let img = Image::from_fn(32, 32, |r, c| ((r * c) % 7) as f32 / 7.0).unwrap();
        let pyr = GaussianPyramid::build(&img, &PyramidConfig::default()).unwrap();
        let dog = pyr.dog().unwrap();
        assert_eq!(dog.num_octaves(), pyr.num_octaves());
        for (g, d) in pyr.octaves().iter().zip(dog.octaves()) {
            assert_eq!(d.len(), g.len() - 1);
            for (i, layer) in d.layers().iter().enumerate() {
                assert_eq!(layer.sigma(), g.layers()[i].sigma());
                let expect = g.layers()[i + 1].image().at(5, 7) - g.layers()[i].image().at(5, 7);
                assert_eq!(layer.image().at(5, 7), expect);
            }
        }
    }

    #[test]
    fn flat_image_gives_zero_dog() {
        let img = Image::new(32, 32, 1).unwrap();
        let dog = GaussianPyramid::build(&img, &PyramidConfig::default())
            .unwrap()
            .dog()
            .unwrap();
        assert!(dog
            .layers()
            .all(|(_, _, layer)| layer.image().data().iter().all(|&v| v == 0.0)));
    }
}
