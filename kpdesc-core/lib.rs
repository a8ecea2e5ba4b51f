//! Shared types for the kpdesc detector and descriptor crates.
//!
//! Images are 8-bit single channel [`GrayImage`]s. Detectors produce
//! [`KeyPoint`]s, descriptor computers turn them into a [`Descriptors`] matrix
//! with one row per surviving keypoint.

mod descriptors;
mod error;
mod keypoint;
pub mod filter;
pub mod linalg;
pub mod mask;
pub mod resize;

pub use descriptors::{DescriptorKind, Descriptors};
pub use error::{FeatureError, FeatureResult};
pub use keypoint::KeyPoint;

pub use image::GrayImage;

/// Finds keypoints in a grayscale image, optionally restricted by a mask.
pub trait KeypointDetector {
    /// Detect keypoints. Only pixels where `mask` is nonzero may hold a keypoint.
    fn detect(&self, image: &GrayImage, mask: Option<&GrayImage>) -> FeatureResult<Vec<KeyPoint>>;
}

/// Computes a descriptor row for each keypoint.
pub trait DescriptorComputer {
    /// Number of elements in one descriptor row.
    fn descriptor_size(&self) -> usize;

    fn descriptor_kind(&self) -> DescriptorKind;

    /// Compute descriptors for `keypoints`.
    ///
    /// Keypoints that cannot be described (e.g. too close to the border) are
    /// removed from `keypoints`, so that afterwards `keypoints[i]` matches row `i`.
    /// Returns `None` when no keypoint is left.
    fn compute(
        &self,
        image: &GrayImage,
        keypoints: &mut Vec<KeyPoint>,
    ) -> FeatureResult<Option<Descriptors>>;
}

/// An algorithm that both detects and describes.
pub trait Feature2D: KeypointDetector + DescriptorComputer {
    fn detect_and_compute(
        &self,
        image: &GrayImage,
        mask: Option<&GrayImage>,
    ) -> FeatureResult<(Vec<KeyPoint>, Option<Descriptors>)> {
        let mut keypoints = self.detect(image, mask)?;
        let descriptors = self.compute(image, &mut keypoints)?;
        Ok((keypoints, descriptors))
    }
}

/// Rejects empty images.
pub fn check_image(image: &GrayImage) -> FeatureResult<()> {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Err(FeatureError::InvalidImageSize { width, height });
    }
    Ok(())
}
