//! SURF (Speeded-Up Robust Features) on integral images.
//!
//! Keypoints are maxima of a box-filter approximated Hessian determinant.
//! Orientation comes from Haar wavelet responses in a disc around the
//! keypoint, and the descriptor sums oriented wavelet responses over a 4x4
//! grid of cells.

pub mod descriptor;
pub mod hessian;

use image::{GrayImage, Luma};
use kpdesc_core::mask::{check_mask, retain_in_mask};
use kpdesc_core::{
    check_image, DescriptorComputer, DescriptorKind, Descriptors, Feature2D, FeatureError, FeatureResult,
    KeyPoint, KeypointDetector,
};
use rayon::prelude::*;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

pub use descriptor::SurfSampler;
pub use hessian::{fast_hessian_detector, integral, Integral, ResponseLayer};

/// SURF settings
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SurfParams {
    /// Minimum Hessian determinant of a keypoint.
    pub hessian_threshold: f32,
    pub n_octaves: usize,
    pub n_octave_layers: usize,
    /// 128-element descriptors instead of 64.
    pub extended: bool,
    /// Skip orientation assignment.
    pub upright: bool,
}

impl Default for SurfParams {
    fn default() -> Self {
        Self {
            hessian_threshold: 100.0,
            n_octaves: 4,
            n_octave_layers: 3,
            extended: false,
            upright: false,
        }
    }
}

impl SurfParams {
    pub fn validate(&self) -> FeatureResult<()> {
        if !self.hessian_threshold.is_finite() || self.hessian_threshold < 0.0 {
            return Err(FeatureError::invalid_parameter(
                "hessian_threshold",
                format!("{} (must be >= 0)", self.hessian_threshold),
            ));
        }
        if self.n_octaves == 0 {
            return Err(FeatureError::invalid_parameter("n_octaves", "must be > 0"));
        }
        if self.n_octave_layers == 0 {
            return Err(FeatureError::invalid_parameter("n_octave_layers", "must be > 0"));
        }
        Ok(())
    }

    pub fn with_hessian_threshold(mut self, hessian_threshold: f32) -> Self {
        self.hessian_threshold = hessian_threshold;
        self
    }

    pub fn with_n_octaves(mut self, n_octaves: usize) -> Self {
        self.n_octaves = n_octaves;
        self
    }

    pub fn with_n_octave_layers(mut self, n_octave_layers: usize) -> Self {
        self.n_octave_layers = n_octave_layers;
        self
    }

    pub fn with_extended(mut self, extended: bool) -> Self {
        self.extended = extended;
        self
    }

    pub fn with_upright(mut self, upright: bool) -> Self {
        self.upright = upright;
        self
    }

    pub fn descriptor_size(&self) -> usize {
        if self.extended {
            128
        } else {
            64
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Surf {
    params: SurfParams,
    sampler: SurfSampler,
}

impl Surf {
    pub fn new(params: SurfParams) -> FeatureResult<Self> {
        params.validate()?;
        Ok(Self {
            params,
            sampler: SurfSampler::new(),
        })
    }

    pub fn params(&self) -> &SurfParams {
        &self.params
    }

    /// Assigns orientations, dropping keypoints with no valid sample.
    fn orient(&self, sum: &Integral, keypoints: &mut Vec<KeyPoint>) {
        if self.params.upright {
            keypoints.iter_mut().for_each(|kp| kp.angle = 0.0);
            return;
        }
        let angles: Vec<Option<f32>> = keypoints
            .par_iter()
            .map(|kp| self.sampler.orientation(sum, kp))
            .collect();
        let mut angles = angles.into_iter();
        keypoints.retain_mut(|kp| match angles.next().flatten() {
            Some(angle) => {
                kp.angle = angle;
                true
            }
            None => false,
        });
    }

    fn detect_in(&self, image: &GrayImage, sum: &Integral, mask: Option<&GrayImage>) -> Vec<KeyPoint> {
        let mask_sum = mask.map(|m| {
            let binary = GrayImage::from_fn(m.width(), m.height(), |x, y| Luma([m.get_pixel(x, y)[0].min(1)]));
            integral(&binary)
        });
        let mut keypoints = fast_hessian_detector(
            sum,
            mask_sum.as_ref(),
            self.params.n_octaves,
            self.params.n_octave_layers,
            self.params.hessian_threshold,
        );
        retain_in_mask(&mut keypoints, mask);
        self.orient(sum, &mut keypoints);
        log::debug!(
            "SURF detected {} keypoints in {}x{}",
            keypoints.len(),
            image.width(),
            image.height()
        );
        keypoints
    }

    fn describe(&self, image: &GrayImage, keypoints: &[KeyPoint]) -> Vec<Vec<f32>> {
        keypoints
            .par_iter()
            .map(|kp| self.sampler.describe(image, kp, kp.angle.max(0.0), self.params.extended))
            .collect()
    }
}

impl KeypointDetector for Surf {
    fn detect(&self, image: &GrayImage, mask: Option<&GrayImage>) -> FeatureResult<Vec<KeyPoint>> {
        check_image(image)?;
        check_mask(image, mask)?;
        let sum = integral(image);
        Ok(self.detect_in(image, &sum, mask))
    }
}

impl DescriptorComputer for Surf {
    fn descriptor_size(&self) -> usize {
        self.params.descriptor_size()
    }

    fn descriptor_kind(&self) -> DescriptorKind {
        DescriptorKind::Float
    }

    /// Recomputes orientations, then describes.
    fn compute(
        &self,
        image: &GrayImage,
        keypoints: &mut Vec<KeyPoint>,
    ) -> FeatureResult<Option<Descriptors>> {
        check_image(image)?;
        if keypoints.is_empty() {
            return Ok(None);
        }
        let sum = integral(image);
        self.orient(&sum, keypoints);
        Descriptors::from_float_rows(self.describe(image, keypoints), self.descriptor_size())
    }
}

impl Feature2D for Surf {
    fn detect_and_compute(
        &self,
        image: &GrayImage,
        mask: Option<&GrayImage>,
    ) -> FeatureResult<(Vec<KeyPoint>, Option<Descriptors>)> {
        check_image(image)?;
        check_mask(image, mask)?;
        let sum = integral(image);
        let keypoints = self.detect_in(image, &sum, mask);
        let descriptors = Descriptors::from_float_rows(self.describe(image, &keypoints), self.descriptor_size())?;
        Ok((keypoints, descriptors))
    }
}
