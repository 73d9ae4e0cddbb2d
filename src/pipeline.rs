//! High-level extraction and estimation.
//!
//! [`Extractor`] chains pyramid construction, blob detection, the optional
//! corner-quality filter and descriptor extraction. The `estimate_*` helpers
//! match two descriptor sets and verify the result geometrically.

use crate::describe::{describe_scaled, Descriptor, DescriptorConfig};
use crate::detect::{detect_blobs, filter_blobs, BlobConfig, CornerConfig};
use crate::geometry::{
    hough_hypotheses, ransac_homography, verify, HoughConfig, Hypothesis, RansacConfig,
};
use crate::image::ops::grayscale;
use crate::image::Image;
use crate::keypoint::{Keypoint, ScalePoint};
use crate::scale::{GaussianPyramid, PyramidConfig};
use crate::search::{match_descriptors, Match, MatchConfig};
use crate::trace::{trace_event, trace_span};
use crate::util::{KeyMatchError, KeyMatchResult};

/// Extraction parameters.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ExtractConfig {
    pub pyramid: PyramidConfig,
    pub blob: BlobConfig,
    /// Re-score blobs by corner quality and drop weak ones.
    pub corner_filter: Option<CornerConfig>,
    pub descriptor: DescriptorConfig,
}

impl ExtractConfig {
    /// Checks every stage configuration.
    pub fn validate(&self) -> KeyMatchResult<()> {
        self.pyramid.validate()?;
        self.blob.validate()?;
        if let Some(corner) = &self.corner_filter {
            corner.validate()?;
        }
        self.descriptor.validate()
    }
}

/// Scale- and rotation-invariant feature extractor.
#[derive(Clone, Debug)]
pub struct Extractor {
    config: ExtractConfig,
}

impl Extractor {
    /// Validates the configuration and creates an extractor.
    pub fn new(config: ExtractConfig) -> KeyMatchResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ExtractConfig {
        &self.config
    }

    /// Builds the Gaussian pyramid, converting color input to grayscale.
    pub fn pyramid(&self, img: &Image) -> KeyMatchResult<GaussianPyramid> {
        if img.channels() == 1 {
            GaussianPyramid::build(img, &self.config.pyramid)
        } else {
            GaussianPyramid::build(&grayscale(img)?, &self.config.pyramid)
        }
    }

    fn blobs(&self, pyramid: &GaussianPyramid) -> KeyMatchResult<Vec<ScalePoint>> {
        let dog = pyramid.dog()?;
        let blobs = detect_blobs(&dog, &self.config.blob)?;
        match &self.config.corner_filter {
            Some(corner) => filter_blobs(&blobs, &dog, corner),
            None => Ok(blobs),
        }
    }

    /// Detects scale-space keypoints without describing them.
    pub fn detect(&self, img: &Image) -> KeyMatchResult<Vec<ScalePoint>> {
        let pyramid = self.pyramid(img)?;
        self.blobs(&pyramid)
    }

    /// Detects keypoints and builds one descriptor per orientation.
    pub fn detect_and_compute(&self, img: &Image) -> KeyMatchResult<Vec<Descriptor<ScalePoint>>> {
        let _span = trace_span!("detect_and_compute", width = img.width(), height = img.height())
            .entered();
        let pyramid = self.pyramid(img)?;
        let blobs = self.blobs(&pyramid)?;
        let descriptors = describe_scaled(&pyramid, &blobs, &self.config.descriptor)?;
        trace_event!(
            "features",
            blobs = blobs.len(),
            descriptors = descriptors.len()
        );
        Ok(descriptors)
    }
}

/// Verified hypothesis with its support ratio.
#[derive(Clone, Debug, PartialEq)]
pub struct Estimate<K> {
    pub hypothesis: Hypothesis<K>,
    /// `support / matches`.
    pub confidence: f64,
    /// All ratio-test matches the hypothesis was selected from.
    pub matches: Vec<Match<K>>,
}

fn check_confidence(min_confidence: f64) -> KeyMatchResult<()> {
    if !(0.0..=1.0).contains(&min_confidence) {
        return Err(KeyMatchError::InvalidConfig {
            reason: "min_confidence must be in [0, 1]",
        });
    }
    Ok(())
}

/// Matches object against scene descriptors and fits a RANSAC homography.
///
/// Returns `None` when there are too few matches or the support ratio is
/// below `min_confidence`.
pub fn estimate_homography<K: Keypoint>(
    object: &[Descriptor<K>],
    scene: &[Descriptor<K>],
    match_cfg: &MatchConfig,
    ransac_cfg: &RansacConfig,
    min_confidence: f64,
) -> KeyMatchResult<Option<Estimate<K>>> {
    check_confidence(min_confidence)?;
    let matches = match_descriptors(object, scene, match_cfg)?;
    let Some(hypothesis) = ransac_homography(&matches, ransac_cfg)? else {
        return Ok(None);
    };
    Ok(verify(&[hypothesis], matches.len(), min_confidence).map(|(hypothesis, confidence)| {
        Estimate {
            hypothesis,
            confidence,
            matches,
        }
    }))
}

/// Matches object against scene descriptors and clusters poses with the
/// Hough transform.
///
/// Sizes are `(height, width)` in base-image pixels.
pub fn estimate_pose(
    object: &[Descriptor<ScalePoint>],
    scene: &[Descriptor<ScalePoint>],
    object_size: (usize, usize),
    scene_size: (usize, usize),
    match_cfg: &MatchConfig,
    hough_cfg: &HoughConfig,
    min_confidence: f64,
) -> KeyMatchResult<Option<Estimate<ScalePoint>>> {
    check_confidence(min_confidence)?;
    let matches = match_descriptors(object, scene, match_cfg)?;
    let hypotheses = hough_hypotheses(scene_size, object_size, &matches, hough_cfg)?;
    Ok(verify(&hypotheses, matches.len(), min_confidence).map(|(hypothesis, confidence)| {
        Estimate {
            hypothesis,
            confidence,
            matches,
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::{estimate_homography, ExtractConfig, Extractor};
    use crate::geometry::RansacConfig;
    use crate::image::Image;
    use crate::search::MatchConfig;

    #[test]
    fn flat_image_has_no_features() {
        let extractor = Extractor::new(ExtractConfig::default()).unwrap();
        let img = Image::new(48, 48, 1).unwrap();
        assert!(extractor.detect(&img).unwrap().is_empty());
        let descs = extractor.detect_and_compute(&img).unwrap();
        assert!(descs.is_empty());
        let estimate = estimate_homography(
            &descs,
            &descs,
            &MatchConfig::default(),
            &RansacConfig::default(),
            0.0,
        )
        .unwrap();
        assert!(estimate.is_none());
    }

    #[test]
    fn color_input_is_converted() {
        let extractor = Extractor::new(ExtractConfig::default()).unwrap();
        let img = Image::new(32, 32, 3).unwrap();
        assert!(extractor.detect(&img).unwrap().is_empty());
    }

    #[test]
    fn invalid_stage_config_is_rejected() {
        let mut cfg = ExtractConfig::default();
        cfg.descriptor.clip = 0.0;
        assert!(Extractor::new(cfg).is_err());
    }
}
