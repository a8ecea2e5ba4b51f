use image::GrayImage;
use imageproc::filter::gaussian_blur_f32;
use kpdesc_core::mask::retain_in_border;
use kpdesc_core::{
    check_image, DescriptorComputer, DescriptorKind, Descriptors, FeatureError, FeatureResult, KeyPoint,
};
use kpdesc_fast::{ImagePyramid, OrbParams};
use rayon::prelude::*;

use crate::pattern::{generate_pattern, PointPair, PATTERN_PAIRS};

pub const DESCRIPTOR_SIZE: usize = PATTERN_PAIRS / 8;

/// Smoothing applied to every pyramid level before the binary tests.
pub const BLUR_SIGMA: f32 = 2.0;

/// rBRIEF descriptors for keypoints laid out on an ORB pyramid.
///
/// Each keypoint is described on the pyramid level named by its `octave`,
/// with the pyramid rebuilt from this generator's own scale factor.
#[derive(Debug, Clone)]
pub struct BriefGenerator {
    params: OrbParams,
    pattern: Vec<PointPair>,
}

impl Default for BriefGenerator {
    fn default() -> Self {
        let params = OrbParams::default();
        let pattern = generate_pattern(params.patch_size, PATTERN_PAIRS);
        Self { params, pattern }
    }
}

impl BriefGenerator {
    pub fn new(params: OrbParams) -> FeatureResult<Self> {
        params.validate()?;
        if params.patch_size > 255 {
            return Err(FeatureError::invalid_parameter(
                "patch_size",
                format!("{} (rBRIEF supports at most 255)", params.patch_size),
            ));
        }
        let pattern = generate_pattern(params.patch_size, PATTERN_PAIRS);
        Ok(Self { params, pattern })
    }

    pub fn params(&self) -> &OrbParams {
        &self.params
    }

    pub fn pattern(&self) -> &[PointPair] {
        &self.pattern
    }

    /// Binary tests for one keypoint on its (blurred) level image.
    fn describe(&self, level: &GrayImage, x: f32, y: f32, angle_deg: f32) -> [u8; DESCRIPTOR_SIZE] {
        let angle = if angle_deg < 0.0 { 0.0 } else { angle_deg.to_radians() };
        let (sin_a, cos_a) = angle.sin_cos();
        let (kc, kr) = (x.round() as i64, y.round() as i64);
        let (width, height) = (level.width() as i64, level.height() as i64);

        let value = |px: i8, py: i8| -> u8 {
            let (px, py) = (px as f32, py as f32);
            let dr = (px * sin_a + py * cos_a).round() as i64;
            let dc = (px * cos_a - py * sin_a).round() as i64;
            let r = (kr + dr).clamp(0, height - 1) as u32;
            let c = (kc + dc).clamp(0, width - 1) as u32;
            level.get_pixel(c, r)[0]
        };

        let mut d = [0u8; DESCRIPTOR_SIZE];
        for (i, &[x0, y0, x1, y1]) in self.pattern.iter().enumerate() {
            let bit = (value(x0, y0) < value(x1, y1)) as u8;
            d[i / 8] |= bit << (i % 8);
        }
        d
    }
}

impl DescriptorComputer for BriefGenerator {
    fn descriptor_size(&self) -> usize {
        DESCRIPTOR_SIZE
    }

    fn descriptor_kind(&self) -> DescriptorKind {
        DescriptorKind::Binary
    }

    fn compute(
        &self,
        image: &GrayImage,
        keypoints: &mut Vec<KeyPoint>,
    ) -> FeatureResult<Option<Descriptors>> {
        check_image(image)?;
        retain_in_border(keypoints, image.width(), image.height(), self.params.edge_threshold as f32);
        if keypoints.is_empty() {
            return Ok(None);
        }

        let n_levels = keypoints.iter().map(|kp| kp.octave.max(0) as usize).max().unwrap_or(0) + 1;
        let pyramid = ImagePyramid::build(image, self.params.scale_factor, n_levels);
        let blurred: Vec<GrayImage> = pyramid
            .levels()
            .par_iter()
            .map(|level| gaussian_blur_f32(level, BLUR_SIGMA))
            .collect();

        let rows: Vec<Vec<u8>> = keypoints
            .par_iter()
            .map(|kp| {
                let level = kp.octave.max(0) as usize;
                let inv_scale = 1.0 / pyramid.scale_levels()[level].scale;
                self.describe(&blurred[level], kp.x * inv_scale, kp.y * inv_scale, kp.angle)
                    .to_vec()
            })
            .collect();

        log::trace!("rBRIEF: {} descriptors over {} levels", rows.len(), n_levels);
        Descriptors::from_binary_rows(rows, DESCRIPTOR_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn textured(size: u32) -> GrayImage {
        GrayImage::from_fn(size, size, |x, y| {
            Luma([(((x * 13) ^ (y * 29)) % 256) as u8])
        })
    }

    #[test]
    fn test_border_keypoints_removed() {
        let generator = BriefGenerator::default();
        let img = textured(100);
        let mut kps = vec![
            KeyPoint::new(5.0, 50.0, 31.0).with_angle(0.0),
            KeyPoint::new(50.0, 50.0, 31.0).with_angle(0.0),
        ];
        let desc = generator.compute(&img, &mut kps).unwrap().unwrap();
        assert_eq!(kps.len(), 1);
        assert_eq!(desc.shape(), (1, DESCRIPTOR_SIZE));
        assert_eq!(desc.kind(), DescriptorKind::Binary);
    }

    #[test]
    fn test_no_keypoints_gives_none() {
        let generator = BriefGenerator::default();
        let img = textured(64);
        let mut kps = Vec::new();
        assert!(generator.compute(&img, &mut kps).unwrap().is_none());
    }

    #[test]
    fn test_flat_image_gives_zero_bits() {
        let generator = BriefGenerator::default();
        let img = GrayImage::from_pixel(100, 100, Luma([128]));
        let mut kps = vec![KeyPoint::new(50.0, 50.0, 31.0).with_angle(33.0)];
        let desc = generator.compute(&img, &mut kps).unwrap().unwrap();
        assert!(desc.as_binary().unwrap().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_descriptor_depends_on_angle() {
        let generator = BriefGenerator::default();
        let img = textured(120);
        let mut a = vec![KeyPoint::new(60.0, 60.0, 31.0).with_angle(0.0)];
        let mut b = vec![KeyPoint::new(60.0, 60.0, 31.0).with_angle(90.0)];
        let da = generator.compute(&img, &mut a).unwrap().unwrap();
        let db = generator.compute(&img, &mut b).unwrap().unwrap();
        assert_ne!(da, db);
    }

    #[test]
    fn test_octave_selects_level() {
        let generator = BriefGenerator::default();
        let img = textured(200);
        let mut kps = vec![
            KeyPoint::new(100.0, 100.0, 31.0).with_angle(10.0),
            KeyPoint::new(100.0, 100.0, 37.2).with_angle(10.0).with_octave(1),
        ];
        let desc = generator.compute(&img, &mut kps).unwrap().unwrap();
        assert_eq!(desc.rows(), 2);
    }

    #[test]
    fn test_oversized_patch_rejected() {
        assert!(BriefGenerator::new(OrbParams::default().with_patch_size(300)).is_err());
    }
}
