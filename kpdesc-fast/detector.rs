use image::GrayImage;
use kpdesc_core::mask::{check_mask, retain_in_mask};
use kpdesc_core::{check_image, FeatureResult, KeyPoint, KeypointDetector};

use crate::config::FastParams;
use crate::corner_detection::CornerDetector;
use crate::types::Corner;

/// Diameter assigned to FAST keypoints, the size of the Bresenham circle.
pub const FAST_KEYPOINT_SIZE: f32 = 7.0;

/// FAST-9/16 corner detector on a single scale
#[derive(Debug, Clone, Default)]
pub struct FastFeatureDetector {
    params: FastParams,
}

impl FastFeatureDetector {
    pub fn new(params: FastParams) -> FeatureResult<Self> {
        params.validate()?;
        Ok(Self { params })
    }

    pub fn params(&self) -> &FastParams {
        &self.params
    }
}

impl KeypointDetector for FastFeatureDetector {
    fn detect(&self, image: &GrayImage, mask: Option<&GrayImage>) -> FeatureResult<Vec<KeyPoint>> {
        check_image(image)?;
        check_mask(image, mask)?;

        let corners = fast_corners(image, self.params.threshold, self.params.nonmax_suppression);
        let mut keypoints: Vec<KeyPoint> = corners
            .into_iter()
            .map(|c| KeyPoint::new(c.x as f32, c.y as f32, FAST_KEYPOINT_SIZE).with_response(c.score as f32))
            .collect();
        retain_in_mask(&mut keypoints, mask);

        log::trace!("FAST: {} keypoints (threshold {})", keypoints.len(), self.params.threshold);
        Ok(keypoints)
    }
}

/// FAST corners of `img`, optionally thinned to 3x3 local maxima of the score.
pub fn fast_corners(img: &GrayImage, threshold: u8, nonmax_suppression: bool) -> Vec<Corner> {
    let corners = CornerDetector::detect_corners(img, threshold);
    if nonmax_suppression {
        non_maximum_suppression(&corners, img.width(), img.height())
    } else {
        corners
    }
}

/// Keeps corners whose score is strictly greater than every 8-neighbour's.
///
/// Pixels that are not corners count as score below any corner.
pub fn non_maximum_suppression(corners: &[Corner], width: u32, height: u32) -> Vec<Corner> {
    if corners.is_empty() {
        return Vec::new();
    }

    // score + 1 so that 0 marks "no corner"
    let mut score_map = vec![0u16; width as usize * height as usize];
    for c in corners {
        score_map[c.y as usize * width as usize + c.x as usize] = c.score as u16 + 1;
    }

    corners
        .iter()
        .copied()
        .filter(|c| {
            let own = c.score as u16 + 1;
            for dy in -1i64..=1 {
                for dx in -1i64..=1 {
                    if dx == 0 && dy == 0 {
                        continue;
                    }
                    let nx = c.x as i64 + dx;
                    let ny = c.y as i64 + dy;
                    if nx < 0 || ny < 0 || nx >= width as i64 || ny >= height as i64 {
                        continue;
                    }
                    if score_map[ny as usize * width as usize + nx as usize] >= own {
                        return false;
                    }
                }
            }
            true
        })
        .collect()
}
