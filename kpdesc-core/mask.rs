//! Keypoint filtering helpers shared by the detectors.

use std::cmp::Ordering;

use image::GrayImage;

use crate::error::{FeatureError, FeatureResult};
use crate::keypoint::KeyPoint;

/// Fails with [`FeatureError::MaskSizeMismatch`] unless `mask` matches `image`.
pub fn check_mask(image: &GrayImage, mask: Option<&GrayImage>) -> FeatureResult<()> {
    if let Some(mask) = mask {
        if mask.dimensions() != image.dimensions() {
            return Err(FeatureError::MaskSizeMismatch {
                width: image.width(),
                height: image.height(),
                mask_width: mask.width(),
                mask_height: mask.height(),
            });
        }
    }
    Ok(())
}

/// True if the pixel nearest to `(x, y)` is selected. No mask selects everything.
pub fn mask_allows(mask: Option<&GrayImage>, x: f32, y: f32) -> bool {
    let Some(mask) = mask else {
        return true;
    };
    let (px, py) = (x.round(), y.round());
    if px < 0.0 || py < 0.0 || px >= mask.width() as f32 || py >= mask.height() as f32 {
        return false;
    }
    mask.get_pixel(px as u32, py as u32)[0] != 0
}

/// Drops keypoints whose pixel is not selected by `mask`.
pub fn retain_in_mask(keypoints: &mut Vec<KeyPoint>, mask: Option<&GrayImage>) {
    if mask.is_some() {
        keypoints.retain(|kp| mask_allows(mask, kp.x, kp.y));
    }
}

/// Drops keypoints closer than `border` pixels to any image edge.
pub fn retain_in_border(keypoints: &mut Vec<KeyPoint>, width: u32, height: u32, border: f32) {
    let (w, h) = (width as f32, height as f32);
    keypoints.retain(|kp| {
        kp.x >= border && kp.y >= border && kp.x < w - border && kp.y < h - border
    });
}

/// Keeps the `n` strongest keypoints by response, strongest first.
pub fn retain_best(keypoints: &mut Vec<KeyPoint>, n: usize) {
    if keypoints.len() <= n {
        return;
    }
    keypoints.sort_by(|a, b| b.response.total_cmp(&a.response));
    keypoints.truncate(n);
}

/// Sorts keypoints by position, size and angle and removes exact duplicates.
pub fn remove_duplicates(keypoints: &mut Vec<KeyPoint>) {
    keypoints.sort_by(|a, b| compare_geometry(a, b));
    keypoints.dedup_by(|a, b| compare_geometry(a, b) == Ordering::Equal);
}

fn compare_geometry(a: &KeyPoint, b: &KeyPoint) -> Ordering {
    a.x.total_cmp(&b.x)
        .then(a.y.total_cmp(&b.y))
        .then(b.size.total_cmp(&a.size))
        .then(a.angle.total_cmp(&b.angle))
}
