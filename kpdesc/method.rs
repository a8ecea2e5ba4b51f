use std::fmt;
use std::str::FromStr;

use kpdesc_brief::Orb;
use kpdesc_brisk::Brisk;
use kpdesc_core::{DescriptorComputer, DescriptorKind, Descriptors, Feature2D, KeypointDetector};
use kpdesc_daisy::Daisy;
use kpdesc_fast::FastFeatureDetector;
use kpdesc_sift::Sift;
use kpdesc_surf::Surf;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::config::ExtractorConfig;
use crate::error::{DescriptorError, DescriptorResult};
use crate::normalize::root_sift_descriptors;
use crate::preprocess::CanonicalInput;

/// The descriptor algorithms the dispatcher knows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum DescriptorMethod {
    Sift,
    Surf,
    /// SIFT followed by Hellinger normalization.
    RootSift,
    Orb,
    /// FAST corners described with DAISY.
    Daisy,
    Brisk,
}

impl DescriptorMethod {
    pub const ALL: [DescriptorMethod; 6] = [
        DescriptorMethod::Sift,
        DescriptorMethod::Surf,
        DescriptorMethod::RootSift,
        DescriptorMethod::Orb,
        DescriptorMethod::Daisy,
        DescriptorMethod::Brisk,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DescriptorMethod::Sift => "sift",
            DescriptorMethod::Surf => "surf",
            DescriptorMethod::RootSift => "root_sift",
            DescriptorMethod::Orb => "orb",
            DescriptorMethod::Daisy => "daisy",
            DescriptorMethod::Brisk => "brisk",
        }
    }

    pub fn descriptor_kind(&self) -> DescriptorKind {
        match self {
            DescriptorMethod::Orb | DescriptorMethod::Brisk => DescriptorKind::Binary,
            _ => DescriptorKind::Float,
        }
    }

    /// Runs the method on an already canonical input.
    pub fn compute(&self, input: &CanonicalInput, config: &ExtractorConfig) -> DescriptorResult<Option<Descriptors>> {
        let image = &input.image;
        let mask = input.mask.as_ref();

        let descriptors = match self {
            DescriptorMethod::Sift => Sift::new(config.sift.clone())?.detect_and_compute(image, mask)?.1,
            DescriptorMethod::Surf => Surf::new(config.surf.clone())?.detect_and_compute(image, mask)?.1,
            DescriptorMethod::RootSift => {
                return DescriptorMethod::Sift
                    .compute(input, config)?
                    .map(|d| root_sift_descriptors(d, config.root_sift_eps))
                    .transpose();
            }
            DescriptorMethod::Orb => {
                let detector = Orb::new(config.orb_detect.clone())?;
                let extractor = Orb::new(config.orb_compute.clone())?;
                let mut keypoints = detector.detect(image, mask)?;
                extractor.compute(image, &mut keypoints)?
            }
            DescriptorMethod::Daisy => {
                let detector = FastFeatureDetector::new(config.daisy_detector.clone())?;
                let mut keypoints = detector.detect(image, mask)?;
                Daisy::new(config.daisy.clone())?.compute(image, &mut keypoints)?
            }
            DescriptorMethod::Brisk => Brisk::new(config.brisk.clone())?.detect_and_compute(image, mask)?.1,
        };

        log::debug!(
            "{}: {} descriptors on {}x{}{}",
            self,
            descriptors.as_ref().map_or(0, |d| d.rows()),
            image.width(),
            image.height(),
            if mask.is_some() { " (masked)" } else { "" }
        );
        Ok(descriptors)
    }

    /// The retired single-pass ORB: one instance detects and describes
    /// with the mask. Not reachable by name.
    pub fn compute_legacy_orb(input: &CanonicalInput, config: &ExtractorConfig) -> DescriptorResult<Option<Descriptors>> {
        let orb = Orb::new(config.orb_legacy.clone())?;
        let (keypoints, descriptors) = orb.detect_and_compute(&input.image, input.mask.as_ref())?;
        log::debug!("legacy orb: {} keypoints", keypoints.len());
        Ok(descriptors)
    }
}

impl fmt::Display for DescriptorMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DescriptorMethod {
    type Err = DescriptorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DescriptorMethod::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| DescriptorError::InvalidMethod(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_round_trip() {
        for method in DescriptorMethod::ALL {
            assert_eq!(method.as_str().parse::<DescriptorMethod>().unwrap(), method);
            assert_eq!(method.to_string(), method.as_str());
        }
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        for key in ["", "SIFT", "rootsift", "akaze", " orb"] {
            match key.parse::<DescriptorMethod>() {
                Err(DescriptorError::InvalidMethod(k)) => assert_eq!(k, key),
                other => panic!("{key:?} gave {other:?}"),
            }
        }
    }

    #[test]
    fn test_binary_methods() {
        assert_eq!(DescriptorMethod::Orb.descriptor_kind(), DescriptorKind::Binary);
        assert_eq!(DescriptorMethod::Brisk.descriptor_kind(), DescriptorKind::Binary);
        assert_eq!(DescriptorMethod::RootSift.descriptor_kind(), DescriptorKind::Float);
    }
}
