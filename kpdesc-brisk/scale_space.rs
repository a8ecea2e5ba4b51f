//! Octave and intra-octave layers searched for BRISK keypoints.

use image::GrayImage;
use kpdesc_core::resize::resize_area;
use kpdesc_core::KeyPoint;
use kpdesc_fast::{fast_corners, refine_subpixel, CornerDetector};
use rayon::prelude::*;

use crate::pattern::BASIC_SIZE;

/// One layer of the scale space.
#[derive(Debug, Clone)]
pub struct BriskLayer {
    image: GrayImage,
    scale: f32,
    offset: f32,
}

impl BriskLayer {
    fn new(image: GrayImage, scale: f32) -> Self {
        Self {
            image,
            scale,
            offset: 0.5 * scale - 0.5,
        }
    }

    pub fn image(&self) -> &GrayImage {
        &self.image
    }

    /// Size of a layer pixel in input image pixels.
    pub fn scale(&self) -> f32 {
        self.scale
    }

    /// FAST score of the layer pixel, 0 for non-corners and the border.
    pub fn score(&self, x: i64, y: i64) -> f32 {
        let border = CornerDetector::BORDER as i64;
        let (w, h) = (self.image.width() as i64, self.image.height() as i64);
        if x < border || y < border || x >= w - border || y >= h - border {
            return 0.0;
        }
        CornerDetector::corner_score(&self.image, x as u32, y as u32, 0).map_or(0.0, |s| s as f32)
    }

    /// Largest score in the 3x3 neighbourhood of the layer pixel closest to
    /// the input image position `(x, y)`.
    pub fn max_score_near(&self, x: f32, y: f32) -> f32 {
        let lx = ((x - self.offset) / self.scale).round() as i64;
        let ly = ((y - self.offset) / self.scale).round() as i64;
        let mut best = 0f32;
        for dy in -1..=1 {
            for dx in -1..=1 {
                best = best.max(self.score(lx + dx, ly + dy));
            }
        }
        best
    }

    fn to_image(&self, x: f32, y: f32) -> (f32, f32) {
        (x * self.scale + self.offset, y * self.scale + self.offset)
    }
}

/// Vertex of the parabola through three `(x, y)` points, if it opens
/// downwards; clamped to the outer abscissae.
fn parabola_peak(p: [(f32, f32); 3]) -> Option<f32> {
    let [(x0, y0), (x1, y1), (x2, y2)] = p;
    let denom = (x0 - x1) * (x0 - x2) * (x1 - x2);
    if denom.abs() < f32::EPSILON {
        return None;
    }
    let a = (x2 * (y1 - y0) + x1 * (y0 - y2) + x0 * (y2 - y1)) / denom;
    let b = (x2 * x2 * (y0 - y1) + x1 * x1 * (y2 - y0) + x0 * x0 * (y1 - y2)) / denom;
    if a >= 0.0 {
        return None;
    }
    Some((-b / (2.0 * a)).clamp(x0.min(x2), x0.max(x2)))
}

/// Octaves `c_i` (image halved `i` times) interleaved with intra-octaves
/// `d_i` (`c_i` scaled by 2/3).
#[derive(Debug, Clone)]
pub struct BriskScaleSpace {
    layers: Vec<BriskLayer>,
}

impl BriskScaleSpace {
    pub fn build(img: &GrayImage, n_octaves: usize) -> Self {
        let min_side = 2 * CornerDetector::BORDER + 1;
        let mut layers = vec![BriskLayer::new(img.clone(), 1.0)];
        if n_octaves == 0 {
            return Self { layers };
        }

        let (w, h) = img.dimensions();
        let mut intra = resize_area(img, w * 2 / 3, h * 2 / 3);
        let mut scale = 1.0f32;
        for octave in 0..n_octaves {
            if intra.width() < min_side || intra.height() < min_side {
                break;
            }
            let next_intra = resize_area(&intra, intra.width() / 2, intra.height() / 2);
            layers.push(BriskLayer::new(intra, scale * 1.5));
            intra = next_intra;

            if octave + 1 == n_octaves {
                break;
            }
            let prev = &layers[layers.len() - 2].image;
            let next = resize_area(prev, prev.width() / 2, prev.height() / 2);
            if next.width() < min_side || next.height() < min_side {
                break;
            }
            scale *= 2.0;
            layers.push(BriskLayer::new(next, scale));
        }
        Self { layers }
    }

    pub fn layers(&self) -> &[BriskLayer] {
        &self.layers
    }

    /// FAST corners of every layer that are not beaten by the neighbouring
    /// layers, refined in position and scale.
    pub fn detect(&self, threshold: u8) -> Vec<KeyPoint> {
        let per_layer: Vec<Vec<KeyPoint>> = self
            .layers
            .par_iter()
            .enumerate()
            .map(|(i, layer)| self.layer_keypoints(i, layer, threshold))
            .collect();
        for (i, kps) in per_layer.iter().enumerate() {
            log::trace!("BRISK layer {i}: {} keypoints", kps.len());
        }
        per_layer.into_iter().flatten().collect()
    }

    fn layer_keypoints(&self, i: usize, layer: &BriskLayer, threshold: u8) -> Vec<KeyPoint> {
        let below = i.checked_sub(1).and_then(|k| self.layers.get(k));
        let above = self.layers.get(i + 1);

        fast_corners(&layer.image, threshold, true)
            .into_iter()
            .filter_map(|c| {
                let s = c.score as f32;
                let (ix, iy) = layer.to_image(c.x as f32, c.y as f32);
                let s_below = below.map_or(0.0, |l| l.max_score_near(ix, iy));
                let s_above = above.map_or(0.0, |l| l.max_score_near(ix, iy));
                if s < s_below || s < s_above {
                    return None;
                }

                let (x, y) = (c.x as i64, c.y as i64);
                let mut samples = [[0f32; 3]; 3];
                for (r, row) in samples.iter_mut().enumerate() {
                    for (k, v) in row.iter_mut().enumerate() {
                        *v = layer.score(x + k as i64 - 1, y + r as i64 - 1);
                    }
                }
                let (dx, dy) = refine_subpixel(&samples);

                let scale = match (below, above) {
                    (Some(b), Some(a)) => parabola_peak([
                        (b.scale.log2(), s_below),
                        (layer.scale.log2(), s),
                        (a.scale.log2(), s_above),
                    ])
                    .map_or(layer.scale, f32::exp2),
                    _ => layer.scale,
                };

                let (kx, ky) = layer.to_image(c.x as f32 + dx, c.y as f32 + dy);
                Some(
                    KeyPoint::new(kx, ky, BASIC_SIZE * scale)
                        .with_response(s)
                        .with_octave(i as i32),
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn squares(size: u32) -> GrayImage {
        GrayImage::from_fn(size, size, |x, y| {
            let (cx, cy) = (x % 32, y % 32);
            if (8..20).contains(&cx) && (8..20).contains(&cy) {
                Luma([230])
            } else {
                Luma([20])
            }
        })
    }

    #[test]
    fn test_layer_scales() {
        let space = BriskScaleSpace::build(&squares(128), 3);
        let scales: Vec<f32> = space.layers().iter().map(|l| l.scale()).collect();
        assert_eq!(scales, vec![1.0, 1.5, 2.0, 3.0, 4.0, 6.0]);
        assert_eq!(space.layers()[1].image().dimensions(), (85, 85));
        assert_eq!(space.layers()[2].image().dimensions(), (64, 64));
    }

    #[test]
    fn test_zero_octaves_is_single_layer() {
        let space = BriskScaleSpace::build(&squares(64), 0);
        assert_eq!(space.layers().len(), 1);
    }

    #[test]
    fn test_tiny_image_stops_early() {
        let space = BriskScaleSpace::build(&squares(12), 3);
        assert!(space.layers().len() < 6);
    }

    #[test]
    fn test_square_corners_detected() {
        let space = BriskScaleSpace::build(&squares(128), 3);
        let kps = space.detect(30);
        assert!(!kps.is_empty());
        for kp in &kps {
            assert!(kp.size >= BASIC_SIZE);
            assert!(kp.response >= 30.0);
            assert!(kp.x >= 0.0 && kp.x < 128.0 && kp.y >= 0.0 && kp.y < 128.0);
        }
    }

    #[test]
    fn test_parabola_peak() {
        let peak = parabola_peak([(0.0, 1.0), (1.0, 3.0), (2.0, 1.0)]).unwrap();
        assert!((peak - 1.0).abs() < 1e-6);
        assert!(parabola_peak([(0.0, 1.0), (1.0, 0.0), (2.0, 1.0)]).is_none());
    }
}
