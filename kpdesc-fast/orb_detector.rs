use image::GrayImage;
use kpdesc_core::mask::{check_mask, retain_best, retain_in_border, retain_in_mask};
use kpdesc_core::{check_image, FeatureResult, KeyPoint, KeypointDetector};
use rayon::prelude::*;

use crate::config::{OrbParams, OrbScoreType};
use crate::corner_detection::CornerDetector;
use crate::detector::{fast_corners, FAST_KEYPOINT_SIZE};
use crate::pyramid::ImagePyramid;
use crate::refinement::{circular_extent, intensity_centroid_angle};
use crate::types::ScaleLevel;

/// Window of the Harris rescoring.
pub const HARRIS_BLOCK_SIZE: u32 = 7;
/// Harris trace weight.
pub const HARRIS_K: f32 = 0.04;

/// Oriented FAST keypoints over an image pyramid
#[derive(Debug, Clone, Default)]
pub struct OrbDetector {
    params: OrbParams,
}

impl OrbDetector {
    pub fn new(params: OrbParams) -> FeatureResult<Self> {
        params.validate()?;
        Ok(Self { params })
    }

    pub fn params(&self) -> &OrbParams {
        &self.params
    }

    /// Keypoints of one pyramid level, in level coordinates except for the
    /// final rescale to level 0.
    fn detect_level(
        &self,
        scale_level: &ScaleLevel,
        img: &GrayImage,
        mask: Option<&GrayImage>,
        budget: usize,
        umax: &[i32],
    ) -> Vec<KeyPoint> {
        let p = &self.params;
        if budget == 0 {
            return Vec::new();
        }

        let mut keypoints: Vec<KeyPoint> = fast_corners(img, p.fast_threshold, true)
            .into_iter()
            .map(|c| KeyPoint::new(c.x as f32, c.y as f32, FAST_KEYPOINT_SIZE).with_response(c.score as f32))
            .collect();
        retain_in_mask(&mut keypoints, mask);
        retain_in_border(&mut keypoints, img.width(), img.height(), p.edge_threshold as f32);

        match p.score_type {
            OrbScoreType::Harris => {
                retain_best(&mut keypoints, 2 * budget);
                for kp in keypoints.iter_mut() {
                    kp.response = CornerDetector::harris_response(
                        img,
                        kp.x as u32,
                        kp.y as u32,
                        HARRIS_BLOCK_SIZE,
                        HARRIS_K,
                    );
                }
                retain_best(&mut keypoints, budget);
            }
            OrbScoreType::Fast => retain_best(&mut keypoints, budget),
        }

        let half_patch = p.patch_size / 2;
        let scale = scale_level.scale;
        for kp in keypoints.iter_mut() {
            kp.angle = intensity_centroid_angle(img, kp.x, kp.y, half_patch, umax);
            kp.octave = scale_level.level as i32;
            kp.size = p.patch_size as f32 * scale;
            kp.x *= scale;
            kp.y *= scale;
        }

        log::trace!(
            "ORB level {} ({}x{}): {} keypoints of {} budgeted",
            scale_level.level,
            scale_level.width,
            scale_level.height,
            keypoints.len(),
            budget
        );
        keypoints
    }
}

impl KeypointDetector for OrbDetector {
    fn detect(&self, image: &GrayImage, mask: Option<&GrayImage>) -> FeatureResult<Vec<KeyPoint>> {
        check_image(image)?;
        check_mask(image, mask)?;

        let pyramid = ImagePyramid::build(image, self.params.scale_factor, self.params.n_levels);
        let masks = mask.map(|m| pyramid.build_mask(m));
        let budgets = self.params.features_per_level();
        let umax = circular_extent(self.params.patch_size / 2);

        let per_level: Vec<Vec<KeyPoint>> = pyramid
            .iter()
            .enumerate()
            .collect::<Vec<_>>()
            .into_par_iter()
            .map(|(i, (scale_level, level_img))| {
                let level_mask = masks.as_ref().map(|m| &m[i]);
                self.detect_level(scale_level, level_img, level_mask, budgets[i], &umax)
            })
            .collect();

        let keypoints: Vec<KeyPoint> = per_level.into_iter().flatten().collect();
        log::debug!("ORB detected {} keypoints over {} levels", keypoints.len(), pyramid.len());
        Ok(keypoints)
    }
}
