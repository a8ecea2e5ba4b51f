//! SIFT (Scale-Invariant Feature Transform) keypoints and descriptors.
//!
//! Keypoints are extrema of a difference-of-Gaussian pyramid built on the
//! doubled input image. Each keypoint carries its pyramid position packed into
//! [`KeyPoint::octave`] so that descriptors can be computed on the same
//! Gaussian layer it was found in.

pub mod descriptor;
pub mod extrema;
pub mod orientation;
pub mod scale_space;

use image::GrayImage;
use kpdesc_core::mask::{check_mask, remove_duplicates, retain_best, retain_in_mask};
use kpdesc_core::{
    check_image, DescriptorComputer, DescriptorKind, Descriptors, Feature2D, FeatureError, FeatureResult,
    KeyPoint, KeypointDetector,
};
use rayon::prelude::*;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

pub use descriptor::{sift_descriptor, DESCRIPTOR_SIZE};
pub use extrema::{pack_octave, unpack_octave};
pub use scale_space::ScaleSpace;

/// SIFT settings
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SiftParams {
    /// Keep only the strongest keypoints; 0 keeps all.
    pub n_features: usize,
    /// Layers per octave in which extrema are searched.
    pub n_octave_layers: usize,
    /// Minimum DoG contrast (image range scaled to 1), divided by the layer count.
    pub contrast_threshold: f32,
    /// Maximum ratio of principal curvatures; larger keeps more edge-like points.
    pub edge_threshold: f32,
    /// Blur of the base layer.
    pub sigma: f32,
}

impl Default for SiftParams {
    fn default() -> Self {
        Self {
            n_features: 0,
            n_octave_layers: 3,
            contrast_threshold: 0.04,
            edge_threshold: 10.0,
            sigma: 1.6,
        }
    }
}

impl SiftParams {
    pub fn validate(&self) -> FeatureResult<()> {
        if self.n_octave_layers == 0 {
            return Err(FeatureError::invalid_parameter("n_octave_layers", "must be > 0"));
        }
        if self.contrast_threshold.is_nan() || self.contrast_threshold < 0.0 {
            return Err(FeatureError::invalid_parameter(
                "contrast_threshold",
                format!("{} (must be >= 0)", self.contrast_threshold),
            ));
        }
        if self.edge_threshold.is_nan() || self.edge_threshold <= 0.0 {
            return Err(FeatureError::invalid_parameter(
                "edge_threshold",
                format!("{} (must be > 0)", self.edge_threshold),
            ));
        }
        if !self.sigma.is_finite() || self.sigma <= 0.0 {
            return Err(FeatureError::invalid_parameter(
                "sigma",
                format!("{} (must be > 0)", self.sigma),
            ));
        }
        Ok(())
    }

    pub fn with_n_features(mut self, n_features: usize) -> Self {
        self.n_features = n_features;
        self
    }

    pub fn with_n_octave_layers(mut self, n_octave_layers: usize) -> Self {
        self.n_octave_layers = n_octave_layers;
        self
    }

    pub fn with_contrast_threshold(mut self, contrast_threshold: f32) -> Self {
        self.contrast_threshold = contrast_threshold;
        self
    }

    pub fn with_edge_threshold(mut self, edge_threshold: f32) -> Self {
        self.edge_threshold = edge_threshold;
        self
    }

    pub fn with_sigma(mut self, sigma: f32) -> Self {
        self.sigma = sigma;
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct Sift {
    params: SiftParams,
}

impl Sift {
    pub fn new(params: SiftParams) -> FeatureResult<Self> {
        params.validate()?;
        Ok(Self { params })
    }

    pub fn params(&self) -> &SiftParams {
        &self.params
    }

    fn build_space(&self, image: &GrayImage, first_octave: i32, n_octaves: Option<usize>) -> ScaleSpace {
        ScaleSpace::build(
            image,
            self.params.n_octave_layers,
            self.params.sigma as f64,
            first_octave,
            n_octaves,
        )
    }

    fn detect_in(&self, space: &ScaleSpace, mask: Option<&GrayImage>) -> Vec<KeyPoint> {
        let mut keypoints = extrema::find_scale_space_extrema(space, &self.params);
        remove_duplicates(&mut keypoints);
        if self.params.n_features > 0 {
            retain_best(&mut keypoints, self.params.n_features);
        }

        let first_octave = space.first_octave();
        if first_octave < 0 {
            let scale = 1.0 / (1u32 << (-first_octave)) as f32;
            for kp in keypoints.iter_mut() {
                let low = (kp.octave & 255) + first_octave;
                kp.octave = (kp.octave & !255) | (low & 255);
                kp.x *= scale;
                kp.y *= scale;
                kp.size *= scale;
            }
        }

        retain_in_mask(&mut keypoints, mask);
        keypoints
    }

    /// Pyramid range needed to describe `keypoints`: `(first_octave, n_octaves)`.
    fn octave_range(&self, keypoints: &[KeyPoint]) -> FeatureResult<(i32, usize)> {
        let mut first_octave = 0i32;
        let mut max_octave = i32::MIN;
        for kp in keypoints {
            let (octave, layer, _) = unpack_octave(kp);
            first_octave = first_octave.min(octave);
            max_octave = max_octave.max(octave);
            if layer > self.params.n_octave_layers + 2 {
                return Err(FeatureError::invalid_parameter(
                    "keypoints",
                    format!("layer {layer} outside the {} layer pyramid", self.params.n_octave_layers),
                ));
            }
        }
        if first_octave < -1 {
            return Err(FeatureError::invalid_parameter(
                "keypoints",
                format!("octave {first_octave} below the doubled base image"),
            ));
        }
        Ok((first_octave, (max_octave - first_octave + 1).max(1) as usize))
    }

    fn describe(&self, space: &ScaleSpace, keypoints: &[KeyPoint]) -> Vec<Vec<f32>> {
        let first_octave = space.first_octave();
        keypoints
            .par_iter()
            .map(|kp| {
                let (octave, layer, scale) = unpack_octave(kp);
                let img = space.gaussian((octave - first_octave) as usize, layer);
                let size = kp.size * scale;
                let mut angle = 360.0 - kp.angle;
                if (angle - 360.0).abs() < f32::EPSILON {
                    angle = 0.0;
                }
                sift_descriptor(img, kp.x * scale, kp.y * scale, angle, size * 0.5)
            })
            .collect()
    }
}

impl KeypointDetector for Sift {
    fn detect(&self, image: &GrayImage, mask: Option<&GrayImage>) -> FeatureResult<Vec<KeyPoint>> {
        check_image(image)?;
        check_mask(image, mask)?;
        let space = self.build_space(image, -1, None);
        let keypoints = self.detect_in(&space, mask);
        log::debug!("SIFT detected {} keypoints", keypoints.len());
        Ok(keypoints)
    }
}

impl DescriptorComputer for Sift {
    fn descriptor_size(&self) -> usize {
        DESCRIPTOR_SIZE
    }

    fn descriptor_kind(&self) -> DescriptorKind {
        DescriptorKind::Float
    }

    fn compute(
        &self,
        image: &GrayImage,
        keypoints: &mut Vec<KeyPoint>,
    ) -> FeatureResult<Option<Descriptors>> {
        check_image(image)?;
        if keypoints.is_empty() {
            return Ok(None);
        }
        let (first_octave, n_octaves) = self.octave_range(keypoints)?;
        let space = self.build_space(image, first_octave, Some(n_octaves));
        Descriptors::from_float_rows(self.describe(&space, keypoints), DESCRIPTOR_SIZE)
    }
}

impl Feature2D for Sift {
    /// Detects and describes on one shared scale space.
    fn detect_and_compute(
        &self,
        image: &GrayImage,
        mask: Option<&GrayImage>,
    ) -> FeatureResult<(Vec<KeyPoint>, Option<Descriptors>)> {
        check_image(image)?;
        check_mask(image, mask)?;
        let space = self.build_space(image, -1, None);
        let keypoints = self.detect_in(&space, mask);
        log::debug!("SIFT detected {} keypoints", keypoints.len());
        let descriptors = Descriptors::from_float_rows(self.describe(&space, &keypoints), DESCRIPTOR_SIZE)?;
        Ok((keypoints, descriptors))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    /// Dark discs of several radii on a bright background.
    fn blobs(size: u32) -> GrayImage {
        let centers = [(40.0, 40.0, 6.0), (100.0, 60.0, 10.0), (70.0, 110.0, 4.0), (120.0, 120.0, 8.0)];
        GrayImage::from_fn(size, size, |x, y| {
            let inside = centers.iter().any(|&(cx, cy, r): &(f32, f32, f32)| {
                let (dx, dy) = (x as f32 - cx, y as f32 - cy);
                dx * dx + dy * dy <= r * r
            });
            if inside {
                Luma([30])
            } else {
                Luma([220])
            }
        })
    }

    #[test]
    fn test_blobs_give_keypoints_and_descriptors() {
        let sift = Sift::default();
        let img = blobs(160);
        let (kps, desc) = sift.detect_and_compute(&img, None).unwrap();
        assert!(!kps.is_empty());
        let desc = desc.unwrap();
        assert_eq!(desc.shape(), (kps.len(), DESCRIPTOR_SIZE));
        assert_eq!(desc.kind(), DescriptorKind::Float);
        for kp in &kps {
            assert!((0.0..360.0).contains(&kp.angle));
            assert!(kp.x >= 0.0 && kp.x < 160.0 && kp.y >= 0.0 && kp.y < 160.0);
            assert!(kp.size > 0.0);
        }
    }

    #[test]
    fn test_compute_matches_detect_and_compute() {
        let sift = Sift::default();
        let img = blobs(160);
        let (kps, joint) = sift.detect_and_compute(&img, None).unwrap();
        let mut again = kps.clone();
        let separate = sift.compute(&img, &mut again).unwrap();
        assert_eq!(again, kps);
        let separate = separate.unwrap();
        let joint = joint.unwrap();
        assert_eq!(separate.shape(), joint.shape());
        // same base octave means the same Gaussian layers
        if kps.iter().any(|kp| unpack_octave(kp).0 == -1) {
            assert_eq!(separate, joint);
        }
    }

    #[test]
    fn test_flat_image_has_no_keypoints() {
        let sift = Sift::default();
        let img = GrayImage::from_pixel(96, 96, Luma([128]));
        let (kps, desc) = sift.detect_and_compute(&img, None).unwrap();
        assert!(kps.is_empty());
        assert!(desc.is_none());
    }

    #[test]
    fn test_mask_and_feature_limit() {
        let img = blobs(160);
        let mask = GrayImage::from_fn(160, 160, |x, _| if x < 80 { Luma([255]) } else { Luma([0]) });
        let sift = Sift::default();
        let kps = sift.detect(&img, Some(&mask)).unwrap();
        assert!(kps.iter().all(|kp| kp.x.round() < 80.0));

        let limited = Sift::new(SiftParams::default().with_n_features(3)).unwrap();
        assert!(limited.detect(&img, None).unwrap().len() <= 3);
    }

    #[test]
    fn test_invalid_params() {
        assert!(Sift::new(SiftParams::default().with_n_octave_layers(0)).is_err());
        assert!(Sift::new(SiftParams::default().with_sigma(0.0)).is_err());
    }
}
