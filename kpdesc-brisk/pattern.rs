//! The BRISK ring sampling pattern and its short and long point pairs.

use std::f32::consts::PI;

use image::{ImageBuffer, Luma};

/// Ring radii before scaling by `0.85 * pattern_scale`.
pub const RING_RADII: [f32; 5] = [0.0, 2.9, 4.9, 7.4, 10.8];
/// Points on each ring.
pub const RING_POINTS: [usize; 5] = [1, 10, 14, 15, 20];
/// Pairs closer than this (times `pattern_scale`) form the descriptor bits.
pub const SHORT_PAIR_MAX: f32 = 5.85;
/// Pairs farther than this (times `pattern_scale`) estimate the orientation.
pub const LONG_PAIR_MIN: f32 = 8.2;
/// Bits in a descriptor.
pub const DESCRIPTOR_BITS: usize = 512;
pub const DESCRIPTOR_SIZE: usize = DESCRIPTOR_BITS / 8;
/// Keypoint size that maps to pattern scale 1.
pub const BASIC_SIZE: f32 = 12.0;
/// Largest pattern magnification relative to the base pattern.
pub const SCALE_RANGE: f32 = 30.0;
const SIGMA_SCALE: f32 = 1.3;

/// Sample location relative to the keypoint, with its smoothing radius.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PatternPoint {
    pub x: f32,
    pub y: f32,
    pub sigma: f32,
}

/// Indices `(i, j)` into the pattern with `i > j`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PointPair {
    pub i: usize,
    pub j: usize,
}

#[derive(Debug, Clone)]
pub struct BriskPattern {
    points: Vec<PatternPoint>,
    short_pairs: Vec<PointPair>,
    long_pairs: Vec<PointPair>,
}

impl BriskPattern {
    pub fn new(pattern_scale: f32) -> Self {
        let f = 0.85 * pattern_scale;
        let mut points = Vec::with_capacity(RING_POINTS.iter().sum());
        for (ring, (&radius, &count)) in RING_RADII.iter().zip(RING_POINTS.iter()).enumerate() {
            let radius = radius * f;
            let sigma = if ring == 0 {
                SIGMA_SCALE * 0.5
            } else {
                SIGMA_SCALE * radius * (PI / count as f32).sin()
            };
            for k in 0..count {
                let alpha = k as f32 * 2.0 * PI / count as f32;
                points.push(PatternPoint {
                    x: radius * alpha.cos(),
                    y: radius * alpha.sin(),
                    sigma,
                });
            }
        }

        let d_max = (SHORT_PAIR_MAX * pattern_scale).powi(2);
        let d_min = (LONG_PAIR_MIN * pattern_scale).powi(2);
        let mut short_pairs = Vec::new();
        let mut long_pairs = Vec::new();
        for i in 1..points.len() {
            for j in 0..i {
                let (dx, dy) = (points[j].x - points[i].x, points[j].y - points[i].y);
                let d = dx * dx + dy * dy;
                if d < d_max {
                    short_pairs.push(PointPair { i, j });
                } else if d > d_min {
                    long_pairs.push(PointPair { i, j });
                }
            }
        }
        short_pairs.truncate(DESCRIPTOR_BITS);

        Self {
            points,
            short_pairs,
            long_pairs,
        }
    }

    pub fn points(&self) -> &[PatternPoint] {
        &self.points
    }

    pub fn short_pairs(&self) -> &[PointPair] {
        &self.short_pairs
    }

    pub fn long_pairs(&self) -> &[PointPair] {
        &self.long_pairs
    }

    /// Outermost radius plus its smoothing, in base pattern units.
    pub fn extent(&self) -> f32 {
        self.points
            .iter()
            .map(|p| (p.x * p.x + p.y * p.y).sqrt() + p.sigma)
            .fold(0.0, f32::max)
    }
}

/// Pattern magnification for a keypoint of `size`, clamped to
/// `[1, SCALE_RANGE]`.
pub fn pattern_magnification(size: f32) -> f32 {
    (size / (BASIC_SIZE * 0.6)).clamp(1.0, SCALE_RANGE)
}

pub type Integral = ImageBuffer<Luma<u32>, Vec<u32>>;

/// Mean intensity around `(x, y)`: a box of half width `sigma` read from the
/// integral image, or a bilinear sample when `sigma < 0.5`. The caller keeps
/// the box inside the image.
pub fn smoothed_intensity(sum: &Integral, img: &image::GrayImage, x: f32, y: f32, sigma: f32) -> f32 {
    if sigma < 0.5 {
        return kpdesc_fast::bilinear_interpolate(img, x, y);
    }
    let (w, h) = (img.width() as i64, img.height() as i64);
    let x0 = ((x - sigma + 0.5).floor() as i64).clamp(0, w - 1);
    let y0 = ((y - sigma + 0.5).floor() as i64).clamp(0, h - 1);
    let x1 = ((x + sigma + 0.5).floor() as i64).clamp(x0 + 1, w);
    let y1 = ((y + sigma + 0.5).floor() as i64).clamp(y0 + 1, h);
    let at = |x: i64, y: i64| sum.get_pixel(x as u32, y as u32)[0] as i64;
    let total = at(x1, y1) - at(x0, y1) - at(x1, y0) + at(x0, y0);
    total as f32 / ((x1 - x0) * (y1 - y0)) as f32
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::GrayImage;
    use imageproc::integral_image::integral_image;

    #[test]
    fn test_default_pattern_layout() {
        let pattern = BriskPattern::new(1.0);
        assert_eq!(pattern.points().len(), 60);
        assert_eq!(pattern.short_pairs().len(), DESCRIPTOR_BITS);
        assert_eq!(pattern.long_pairs().len(), 870);
        assert!(pattern.short_pairs().iter().all(|p| p.i > p.j));
    }

    #[test]
    fn test_pattern_scale_grows_extent() {
        let small = BriskPattern::new(1.0).extent();
        let large = BriskPattern::new(2.0).extent();
        assert!(large > small * 1.9);
    }

    #[test]
    fn test_magnification_is_clamped() {
        assert_eq!(pattern_magnification(1.0), 1.0);
        assert!((pattern_magnification(14.4) - 2.0).abs() < 1e-6);
        assert_eq!(pattern_magnification(1e6), SCALE_RANGE);
    }

    #[test]
    fn test_box_mean() {
        let img = GrayImage::from_fn(10, 10, |x, _| Luma([if x < 5 { 0 } else { 100 }]));
        let sum = integral_image::<_, u32>(&img);
        assert_eq!(smoothed_intensity(&sum, &img, 2.0, 5.0, 1.0), 0.0);
        assert_eq!(smoothed_intensity(&sum, &img, 7.0, 5.0, 1.0), 100.0);
        let edge = smoothed_intensity(&sum, &img, 4.5, 5.0, 1.0);
        assert!(edge > 0.0 && edge < 100.0);
    }
}
