//! BRISK (Binary Robust Invariant Scalable Keypoints).
//!
//! Keypoints are FAST corners that beat their neighbours across a scale space
//! of octaves and intra-octaves. The descriptor compares smoothed intensities
//! of point pairs on a ring pattern scaled to the keypoint and rotated by the
//! orientation estimated from the long-distance pairs.

pub mod pattern;
pub mod scale_space;

use image::GrayImage;
use imageproc::integral_image::integral_image;
use kpdesc_core::mask::{check_mask, retain_in_mask};
use kpdesc_core::{
    check_image, DescriptorComputer, DescriptorKind, Descriptors, Feature2D, FeatureError, FeatureResult,
    KeyPoint, KeypointDetector,
};
use rayon::prelude::*;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

pub use pattern::{BriskPattern, DESCRIPTOR_SIZE};
pub use scale_space::BriskScaleSpace;

use pattern::{pattern_magnification, smoothed_intensity, Integral};

/// BRISK settings
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BriskParams {
    /// FAST threshold on every layer.
    pub threshold: u8,
    /// Octaves of the scale space; 0 detects on the input image only.
    pub n_octaves: usize,
    /// Magnification of the sampling pattern.
    pub pattern_scale: f32,
}

impl Default for BriskParams {
    fn default() -> Self {
        Self {
            threshold: 30,
            n_octaves: 3,
            pattern_scale: 1.0,
        }
    }
}

impl BriskParams {
    pub fn validate(&self) -> FeatureResult<()> {
        if self.threshold == u8::MAX {
            return Err(FeatureError::invalid_parameter("threshold", "must be < 255"));
        }
        if !self.pattern_scale.is_finite() || self.pattern_scale <= 0.0 {
            return Err(FeatureError::invalid_parameter(
                "pattern_scale",
                format!("{} (must be > 0)", self.pattern_scale),
            ));
        }
        Ok(())
    }

    pub fn with_threshold(mut self, threshold: u8) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_n_octaves(mut self, n_octaves: usize) -> Self {
        self.n_octaves = n_octaves;
        self
    }

    pub fn with_pattern_scale(mut self, pattern_scale: f32) -> Self {
        self.pattern_scale = pattern_scale;
        self
    }
}

#[derive(Debug, Clone)]
pub struct Brisk {
    params: BriskParams,
    pattern: BriskPattern,
}

impl Default for Brisk {
    fn default() -> Self {
        let params = BriskParams::default();
        let pattern = BriskPattern::new(params.pattern_scale);
        Self { params, pattern }
    }
}

impl Brisk {
    pub fn new(params: BriskParams) -> FeatureResult<Self> {
        params.validate()?;
        let pattern = BriskPattern::new(params.pattern_scale);
        Ok(Self { params, pattern })
    }

    pub fn params(&self) -> &BriskParams {
        &self.params
    }

    pub fn pattern(&self) -> &BriskPattern {
        &self.pattern
    }

    /// Smoothed intensities of every pattern point around `kp`, the pattern
    /// magnified by `t` and rotated by `theta` radians.
    fn sample(&self, sum: &Integral, img: &GrayImage, kp: &KeyPoint, t: f32, theta: f32) -> Vec<f32> {
        let (sin_t, cos_t) = theta.sin_cos();
        self.pattern
            .points()
            .iter()
            .map(|p| {
                let x = kp.x + t * (p.x * cos_t - p.y * sin_t);
                let y = kp.y + t * (p.x * sin_t + p.y * cos_t);
                smoothed_intensity(sum, img, x, y, t * p.sigma)
            })
            .collect()
    }

    /// Orientation in degrees from the long pairs. Points against the
    /// intensity gradient.
    fn orientation(&self, values: &[f32], t: f32) -> f32 {
        let points = self.pattern.points();
        let (mut gx, mut gy) = (0f32, 0f32);
        for pair in self.pattern.long_pairs() {
            let (pi, pj) = (points[pair.i], points[pair.j]);
            let (dx, dy) = (t * (pj.x - pi.x), t * (pj.y - pi.y));
            let weight = (values[pair.i] - values[pair.j]) / (dx * dx + dy * dy);
            gx += weight * dx;
            gy += weight * dy;
        }
        let angle = gy.atan2(gx).to_degrees();
        if angle < 0.0 {
            (angle + 360.0) % 360.0
        } else {
            angle
        }
    }

    fn describe(&self, sum: &Integral, img: &GrayImage, kp: &mut KeyPoint) -> Vec<u8> {
        let t = pattern_magnification(kp.size);
        let upright = self.sample(sum, img, kp, t, 0.0);
        kp.angle = self.orientation(&upright, t);

        let values = self.sample(sum, img, kp, t, kp.angle.to_radians());
        let mut desc = vec![0u8; DESCRIPTOR_SIZE];
        for (bit, pair) in self.pattern.short_pairs().iter().enumerate() {
            if values[pair.i] > values[pair.j] {
                desc[bit / 8] |= 1 << (bit % 8);
            }
        }
        desc
    }
}

impl KeypointDetector for Brisk {
    fn detect(&self, image: &GrayImage, mask: Option<&GrayImage>) -> FeatureResult<Vec<KeyPoint>> {
        check_image(image)?;
        check_mask(image, mask)?;
        let space = BriskScaleSpace::build(image, self.params.n_octaves);
        let mut keypoints = space.detect(self.params.threshold);
        retain_in_mask(&mut keypoints, mask);
        log::debug!(
            "BRISK detected {} keypoints over {} layers",
            keypoints.len(),
            space.layers().len()
        );
        Ok(keypoints)
    }
}

impl DescriptorComputer for Brisk {
    fn descriptor_size(&self) -> usize {
        DESCRIPTOR_SIZE
    }

    fn descriptor_kind(&self) -> DescriptorKind {
        DescriptorKind::Binary
    }

    /// Drops keypoints whose magnified pattern leaves the image and
    /// overwrites the angle of the rest.
    fn compute(
        &self,
        image: &GrayImage,
        keypoints: &mut Vec<KeyPoint>,
    ) -> FeatureResult<Option<Descriptors>> {
        check_image(image)?;
        let extent = self.pattern.extent();
        let (w, h) = (image.width() as f32, image.height() as f32);
        keypoints.retain(|kp| {
            let border = (pattern_magnification(kp.size) * extent).ceil() + 1.0;
            kp.x >= border && kp.y >= border && kp.x < w - border && kp.y < h - border
        });
        if keypoints.is_empty() {
            return Ok(None);
        }

        let sum: Integral = integral_image::<_, u32>(image);
        let rows: Vec<Vec<u8>> = keypoints
            .par_iter_mut()
            .map(|kp| self.describe(&sum, image, kp))
            .collect();
        Descriptors::from_binary_rows(rows, DESCRIPTOR_SIZE)
    }
}

impl Feature2D for Brisk {}
