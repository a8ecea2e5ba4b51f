use image::GrayImage;
use kpdesc_core::{
    DescriptorComputer, DescriptorKind, Descriptors, Feature2D, FeatureResult, KeyPoint, KeypointDetector,
};
use kpdesc_fast::{OrbDetector, OrbParams};

use crate::descriptor::BriefGenerator;

/// Oriented FAST keypoints with rotated BRIEF descriptors.
///
/// Detection and description share one [`OrbParams`]. Keypoints found by a
/// differently configured `Orb` can still be described; their `octave` is read
/// against this instance's scale factor.
#[derive(Debug, Clone, Default)]
pub struct Orb {
    detector: OrbDetector,
    descriptor: BriefGenerator,
}

impl Orb {
    pub fn new(params: OrbParams) -> FeatureResult<Self> {
        Ok(Self {
            detector: OrbDetector::new(params.clone())?,
            descriptor: BriefGenerator::new(params)?,
        })
    }

    pub fn params(&self) -> &OrbParams {
        self.detector.params()
    }
}

impl KeypointDetector for Orb {
    fn detect(&self, image: &GrayImage, mask: Option<&GrayImage>) -> FeatureResult<Vec<KeyPoint>> {
        self.detector.detect(image, mask)
    }
}

impl DescriptorComputer for Orb {
    fn descriptor_size(&self) -> usize {
        self.descriptor.descriptor_size()
    }

    fn descriptor_kind(&self) -> DescriptorKind {
        DescriptorKind::Binary
    }

    fn compute(
        &self,
        image: &GrayImage,
        keypoints: &mut Vec<KeyPoint>,
    ) -> FeatureResult<Option<Descriptors>> {
        self.descriptor.compute(image, keypoints)
    }
}

impl Feature2D for Orb {}
