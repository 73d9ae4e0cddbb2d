//! Python bindings for the keymatch keypoint matching library.
//!
//! This module exposes feature extraction, ratio-test matching and the two
//! geometric verifiers to Python via PyO3.

use numpy::{PyArray1, PyArray2, PyArrayMethods, PyReadonlyArray2, PyUntypedArrayMethods};
use pyo3::exceptions::{PyRuntimeError, PyValueError};
use pyo3::prelude::*;

use keymatch::{
    estimate_homography, estimate_pose, match_descriptors as rust_match_descriptors,
    Descriptor, Estimate as RustEstimate, ExtractConfig, Extractor as RustExtractor,
    HoughConfig, Image, ImageView, KeyMatchError, Keypoint as _, Match as RustMatch,
    MatchConfig, RansacConfig, ScalePoint, Scaled as _,
};

/// Convert a KeyMatchError to a Python exception.
fn to_py_err(err: KeyMatchError) -> PyErr {
    match err {
        KeyMatchError::InvalidConfig { .. } => PyValueError::new_err(err.to_string()),
        _ => PyRuntimeError::new_err(err.to_string()),
    }
}

fn image_from_array(pixels: &PyReadonlyArray2<'_, u8>) -> PyResult<Image> {
    let shape = pixels.shape();
    let height = shape[0];
    let width = shape[1];
    let view = ImageView::from_slice(pixels.as_slice()?, width, height).map_err(to_py_err)?;
    Image::from_view_u8(view).map_err(to_py_err)
}

fn match_config(ratio: f32, exclude_same_keypoint: bool) -> MatchConfig {
    MatchConfig {
        ratio,
        exclude_same_keypoint,
    }
}

/// Scale-space keypoint in base-image pixels.
#[pyclass]
#[derive(Clone)]
pub struct Keypoint {
    /// Sub-pixel column.
    #[pyo3(get)]
    pub x: f32,
    /// Sub-pixel row.
    #[pyo3(get)]
    pub y: f32,
    /// Blur in base-image pixels.
    #[pyo3(get)]
    pub sigma: f32,
    /// Orientation in radians.
    #[pyo3(get)]
    pub angle: f32,
    #[pyo3(get)]
    pub octave: usize,
    #[pyo3(get)]
    pub layer: usize,
    /// Interpolated detector response.
    #[pyo3(get)]
    pub response: f32,
}

#[pymethods]
impl Keypoint {
    fn __repr__(&self) -> String {
        format!(
            "Keypoint(x={:.2}, y={:.2}, sigma={:.2}, angle={:.3}, octave={})",
            self.x, self.y, self.sigma, self.angle, self.octave
        )
    }
}

impl From<ScalePoint> for Keypoint {
    fn from(k: ScalePoint) -> Self {
        Self {
            x: k.x(),
            y: k.y(),
            sigma: k.sigma_global(),
            angle: k.angle,
            octave: k.octave,
            layer: k.layer,
            response: k.value,
        }
    }
}

/// Keypoints with their descriptors.
#[pyclass]
#[derive(Clone)]
pub struct Features {
    inner: Vec<Descriptor<ScalePoint>>,
}

#[pymethods]
impl Features {
    /// Keypoint of every descriptor, in descriptor order.
    fn keypoints(&self) -> Vec<Keypoint> {
        self.inner.iter().map(|d| d.keypoint.into()).collect()
    }

    /// Descriptor matrix of shape `(n, dim)`.
    fn descriptors<'py>(&self, py: Python<'py>) -> PyResult<Bound<'py, PyArray2<f32>>> {
        let dim = self.inner.first().map_or(0, |d| d.size());
        let flat: Vec<f32> = self
            .inner
            .iter()
            .flat_map(|d| d.data.iter().copied())
            .collect();
        PyArray1::from_vec(py, flat).reshape([self.inner.len(), dim])
    }

    fn __len__(&self) -> usize {
        self.inner.len()
    }

    fn __repr__(&self) -> String {
        format!("Features(n={})", self.inner.len())
    }
}

/// Accepted descriptor match.
#[pyclass]
#[derive(Clone)]
pub struct Match {
    #[pyo3(get)]
    pub query_idx: usize,
    #[pyo3(get)]
    pub train_idx: usize,
    /// Euclidean descriptor distance.
    #[pyo3(get)]
    pub distance: f32,
    /// Nearest / second-nearest distance ratio.
    #[pyo3(get)]
    pub ratio: f32,
}

#[pymethods]
impl Match {
    fn __repr__(&self) -> String {
        format!(
            "Match(query_idx={}, train_idx={}, distance={:.4}, ratio={:.3})",
            self.query_idx, self.train_idx, self.distance, self.ratio
        )
    }
}

impl From<RustMatch<ScalePoint>> for Match {
    fn from(m: RustMatch<ScalePoint>) -> Self {
        Self {
            query_idx: m.query_idx,
            train_idx: m.train_idx,
            distance: m.distance,
            ratio: m.ratio,
        }
    }
}

/// Verified object → scene transform.
#[pyclass]
#[derive(Clone)]
pub struct Estimate {
    /// Row-major 3x3 matrix.
    #[pyo3(get)]
    pub transform: [[f64; 3]; 3],
    /// Fraction of matches supporting the transform.
    #[pyo3(get)]
    pub confidence: f64,
    /// Matches supporting the transform.
    #[pyo3(get)]
    pub inliers: Vec<Match>,
    /// Number of ratio-test matches considered.
    #[pyo3(get)]
    pub num_matches: usize,
}

#[pymethods]
impl Estimate {
    fn __repr__(&self) -> String {
        format!(
            "Estimate(confidence={:.3}, inliers={}, matches={})",
            self.confidence,
            self.inliers.len(),
            self.num_matches
        )
    }
}

impl From<RustEstimate<ScalePoint>> for Estimate {
    fn from(e: RustEstimate<ScalePoint>) -> Self {
        Self {
            transform: e.hypothesis.transform.m,
            confidence: e.confidence,
            inliers: e.hypothesis.support.into_iter().map(Match::from).collect(),
            num_matches: e.matches.len(),
        }
    }
}

/// Scale- and rotation-invariant feature extractor.
#[pyclass]
pub struct Extractor {
    inner: RustExtractor,
}

#[pymethods]
impl Extractor {
    /// Create a new Extractor.
    ///
    /// Args:
    ///     layers: Sigma doublings per octave (default: 3)
    ///     sigma_zero: Base blur of every octave (default: 1.6)
    ///     threshold: DoG contrast threshold (default: 0.04)
    ///     edge_ratio: Edge-response ratio (default: 10.0)
    ///     max_peaks: Orientations per keypoint (default: 2)
    #[new]
    #[pyo3(signature = (layers = 3, sigma_zero = 1.6, threshold = 0.04, edge_ratio = 10.0, max_peaks = 2))]
    fn new(
        layers: usize,
        sigma_zero: f32,
        threshold: f32,
        edge_ratio: f32,
        max_peaks: usize,
    ) -> PyResult<Self> {
        let mut config = ExtractConfig::default();
        config.pyramid.layers = layers;
        config.pyramid.sigma_zero = sigma_zero;
        config.blob.threshold = threshold;
        config.blob.edge_ratio = edge_ratio;
        config.descriptor.orientation.max_peaks = max_peaks;
        let inner = RustExtractor::new(config).map_err(to_py_err)?;
        Ok(Self { inner })
    }

    /// Detect keypoints without describing them.
    ///
    /// Args:
    ///     image: 2D uint8 numpy array (height x width)
    fn detect(&self, image: PyReadonlyArray2<'_, u8>) -> PyResult<Vec<Keypoint>> {
        let img = image_from_array(&image)?;
        let blobs = self.inner.detect(&img).map_err(to_py_err)?;
        Ok(blobs.into_iter().map(Keypoint::from).collect())
    }

    /// Detect keypoints and compute one descriptor per orientation.
    ///
    /// Args:
    ///     image: 2D uint8 numpy array (height x width)
    fn detect_and_compute(&self, image: PyReadonlyArray2<'_, u8>) -> PyResult<Features> {
        let img = image_from_array(&image)?;
        let inner = self.inner.detect_and_compute(&img).map_err(to_py_err)?;
        Ok(Features { inner })
    }

    /// Load an image file and compute its features.
    ///
    /// Args:
    ///     path: Path to a grayscale or RGB image file
    fn detect_and_compute_file(&self, path: &str) -> PyResult<Features> {
        let img = keymatch::image::io::load_image(path).map_err(to_py_err)?;
        let inner = self.inner.detect_and_compute(&img).map_err(to_py_err)?;
        Ok(Features { inner })
    }

    fn __repr__(&self) -> String {
        let cfg = self.inner.config();
        format!(
            "Extractor(layers={}, sigma_zero={}, threshold={})",
            cfg.pyramid.layers, cfg.pyramid.sigma_zero, cfg.blob.threshold
        )
    }
}

/// Extract features with the default configuration.
///
/// Args:
///     image: 2D uint8 numpy array (height x width)
#[pyfunction]
fn detect_and_compute(image: PyReadonlyArray2<'_, u8>) -> PyResult<Features> {
    let extractor = RustExtractor::new(ExtractConfig::default()).map_err(to_py_err)?;
    let img = image_from_array(&image)?;
    let inner = extractor.detect_and_compute(&img).map_err(to_py_err)?;
    Ok(Features { inner })
}

/// Match two feature sets with the ratio test.
///
/// Args:
///     query: Features of the object
///     train: Features of the scene
///     ratio: Maximum nearest / second-nearest ratio (default: 0.7)
///     exclude_same_keypoint: Ignore other orientations of the nearest keypoint
///         when looking for the second nearest (default: False)
#[pyfunction]
#[pyo3(signature = (query, train, ratio = 0.7, exclude_same_keypoint = false))]
fn match_descriptors(
    query: &Features,
    train: &Features,
    ratio: f32,
    exclude_same_keypoint: bool,
) -> PyResult<Vec<Match>> {
    let cfg = match_config(ratio, exclude_same_keypoint);
    let matches = rust_match_descriptors(&query.inner, &train.inner, &cfg).map_err(to_py_err)?;
    Ok(matches.into_iter().map(Match::from).collect())
}

/// Match object against scene features and fit a RANSAC homography.
///
/// Returns None when no transform reaches `min_confidence`.
#[pyfunction]
#[pyo3(signature = (
    object,
    scene,
    ratio = 0.7,
    iterations = 1200,
    threshold = 4.5,
    seed = 0,
    min_confidence = 0.0
))]
fn find_homography(
    object: &Features,
    scene: &Features,
    ratio: f32,
    iterations: usize,
    threshold: f64,
    seed: u64,
    min_confidence: f64,
) -> PyResult<Option<Estimate>> {
    let ransac = RansacConfig {
        iterations,
        threshold,
        seed,
    };
    let estimate = estimate_homography(
        &object.inner,
        &scene.inner,
        &match_config(ratio, false),
        &ransac,
        min_confidence,
    )
    .map_err(to_py_err)?;
    Ok(estimate.map(Estimate::from))
}

/// Match object against scene features and cluster poses with the Hough
/// transform.
///
/// Args:
///     object_shape: (height, width) of the object image
///     scene_shape: (height, width) of the scene image
#[pyfunction]
#[pyo3(signature = (object, scene, object_shape, scene_shape, ratio = 0.7, min_confidence = 0.0))]
fn find_pose(
    object: &Features,
    scene: &Features,
    object_shape: (usize, usize),
    scene_shape: (usize, usize),
    ratio: f32,
    min_confidence: f64,
) -> PyResult<Option<Estimate>> {
    let estimate = estimate_pose(
        &object.inner,
        &scene.inner,
        object_shape,
        scene_shape,
        &match_config(ratio, false),
        &HoughConfig::default(),
        min_confidence,
    )
    .map_err(to_py_err)?;
    Ok(estimate.map(Estimate::from))
}

/// Python module for keymatch keypoint matching.
#[pymodule]
fn _keymatch(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<Keypoint>()?;
    m.add_class::<Features>()?;
    m.add_class::<Match>()?;
    m.add_class::<Estimate>()?;
    m.add_class::<Extractor>()?;
    m.add_function(wrap_pyfunction!(detect_and_compute, m)?)?;
    m.add_function(wrap_pyfunction!(match_descriptors, m)?)?;
    m.add_function(wrap_pyfunction!(find_homography, m)?)?;
    m.add_function(wrap_pyfunction!(find_pose, m)?)?;

    m.add("__version__", env!("CARGO_PKG_VERSION"))?;

    Ok(())
}
