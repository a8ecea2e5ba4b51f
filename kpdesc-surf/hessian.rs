//! Fast-Hessian detector on box-filter approximations of the second derivatives.

use image::{GrayImage, ImageBuffer, Luma};
use imageproc::integral_image::integral_image;
use kpdesc_core::linalg::solve3;
use kpdesc_core::KeyPoint;
use rayon::prelude::*;

/// Summed-area table, one pixel larger than its source in each dimension.
pub type Integral = ImageBuffer<Luma<u32>, Vec<u32>>;

/// Side of the smallest box filter, at scale 1.2.
pub const HAAR_SIZE0: u32 = 9;
/// Growth of the box filter between consecutive layers.
pub const HAAR_SIZE_INC: u32 = 6;

/// `[x0, y0, x1, y1, weight]` boxes of the 9x9 second-derivative filters.
const DX: [[i32; 5]; 3] = [[0, 2, 3, 7, 1], [3, 2, 6, 7, -2], [6, 2, 9, 7, 1]];
const DY: [[i32; 5]; 3] = [[2, 0, 7, 3, 1], [2, 3, 7, 6, -2], [2, 6, 7, 9, 1]];
const DXY: [[i32; 5]; 4] = [[1, 1, 4, 4, 1], [5, 1, 8, 4, -1], [1, 5, 4, 8, -1], [5, 5, 8, 8, 1]];
const MEAN: [[i32; 5]; 1] = [[0, 0, 9, 9, 1]];

/// Relative weight of the mixed derivative in the determinant.
const DXY_WEIGHT: f32 = 0.81;

pub fn integral(img: &GrayImage) -> Integral {
    integral_image::<_, u32>(img)
}

/// Box filter scaled to a new size, weights divided by the box area.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HaarBox {
    pub x0: u32,
    pub y0: u32,
    pub x1: u32,
    pub y1: u32,
    pub weight: f32,
}

/// Scales `pattern`, defined on an `old_size` square, to `new_size`.
pub fn resize_haar_pattern(pattern: &[[i32; 5]], old_size: u32, new_size: u32) -> Vec<HaarBox> {
    let ratio = new_size as f32 / old_size as f32;
    pattern
        .iter()
        .map(|&[x0, y0, x1, y1, w]| {
            let scaled = |v: i32| (ratio * v as f32).round() as u32;
            let (x0, y0, x1, y1) = (scaled(x0), scaled(y0), scaled(x1), scaled(y1));
            let area = ((x1 - x0) * (y1 - y0)).max(1) as f32;
            HaarBox {
                x0,
                y0,
                x1,
                y1,
                weight: w as f32 / area,
            }
        })
        .collect()
}

/// Weighted box sums of `boxes` placed with their origin at `(ox, oy)`.
#[inline]
pub fn haar_response(sum: &Integral, ox: u32, oy: u32, boxes: &[HaarBox]) -> f32 {
    boxes
        .iter()
        .map(|b| {
            let at = |x: u32, y: u32| sum.get_pixel(ox + x, oy + y)[0] as i64;
            let s = at(b.x1, b.y1) - at(b.x0, b.y1) - at(b.x1, b.y0) + at(b.x0, b.y0);
            s as f32 * b.weight
        })
        .sum()
}

/// Hessian determinant and trace of one filter size, sampled every `step`
/// pixels. Entries outside the filter's reach are zero.
#[derive(Debug, Clone)]
pub struct ResponseLayer {
    pub size: u32,
    pub step: u32,
    pub rows: usize,
    pub cols: usize,
    det: Vec<f32>,
    trace: Vec<f32>,
}

impl ResponseLayer {
    pub fn compute(sum: &Integral, size: u32, step: u32) -> Self {
        let (width, height) = (sum.width() - 1, sum.height() - 1);
        let rows = (height / step) as usize;
        let cols = (width / step) as usize;
        let mut det = vec![0f32; rows * cols];
        let mut trace = vec![0f32; rows * cols];

        if size <= width && size <= height && cols > 0 {
            let dx = resize_haar_pattern(&DX, HAAR_SIZE0, size);
            let dy = resize_haar_pattern(&DY, HAAR_SIZE0, size);
            let dxy = resize_haar_pattern(&DXY, HAAR_SIZE0, size);
            let samples_i = (1 + (height - size) / step) as usize;
            let samples_j = (1 + (width - size) / step) as usize;
            let margin = ((size / 2) / step) as usize;

            det.par_chunks_mut(cols)
                .zip(trace.par_chunks_mut(cols))
                .enumerate()
                .filter(|(r, _)| *r >= margin && *r - margin < samples_i)
                .for_each(|(r, (det_row, trace_row))| {
                    let oy = (r - margin) as u32 * step;
                    for j in 0..samples_j {
                        let ox = j as u32 * step;
                        let vx = haar_response(sum, ox, oy, &dx);
                        let vy = haar_response(sum, ox, oy, &dy);
                        let vxy = haar_response(sum, ox, oy, &dxy);
                        det_row[j + margin] = vx * vy - DXY_WEIGHT * vxy * vxy;
                        trace_row[j + margin] = vx + vy;
                    }
                });
        }

        Self {
            size,
            step,
            rows,
            cols,
            det,
            trace,
        }
    }

    #[inline]
    pub fn det(&self, row: usize, col: usize) -> f32 {
        self.det[row * self.cols + col]
    }

    #[inline]
    pub fn trace(&self, row: usize, col: usize) -> f32 {
        self.trace[row * self.cols + col]
    }
}

/// Response layers of every octave, `n_octave_layers + 2` per octave.
pub fn build_response_layers(sum: &Integral, n_octaves: usize, n_octave_layers: usize) -> Vec<ResponseLayer> {
    let per_octave = n_octave_layers + 2;
    (0..n_octaves * per_octave)
        .map(|index| {
            let (octave, layer) = (index / per_octave, index % per_octave);
            let size = (HAAR_SIZE0 + HAAR_SIZE_INC * layer as u32) << octave;
            ResponseLayer::compute(sum, size, 1 << octave)
        })
        .collect()
}

/// Fits a 3D quadratic through the neighbourhood of `(row, col)` in `mid` and
/// moves `kp` to its peak. Rejects the point when the offset leaves the cell.
fn interpolate_keypoint(
    prev: &ResponseLayer,
    mid: &ResponseLayer,
    next: &ResponseLayer,
    row: usize,
    col: usize,
    scale_step: f32,
    kp: &mut KeyPoint,
) -> bool {
    let m = |dr: isize, dc: isize| mid.det((row as isize + dr) as usize, (col as isize + dc) as usize) as f64;
    let p = |dr: isize, dc: isize| prev.det((row as isize + dr) as usize, (col as isize + dc) as usize) as f64;
    let n = |dr: isize, dc: isize| next.det((row as isize + dr) as usize, (col as isize + dc) as usize) as f64;

    let b = [
        -(m(0, 1) - m(0, -1)) / 2.0,
        -(m(1, 0) - m(-1, 0)) / 2.0,
        -(n(0, 0) - p(0, 0)) / 2.0,
    ];
    let dxx = m(0, -1) - 2.0 * m(0, 0) + m(0, 1);
    let dyy = m(-1, 0) - 2.0 * m(0, 0) + m(1, 0);
    let dss = p(0, 0) - 2.0 * m(0, 0) + n(0, 0);
    let dxy = (m(1, 1) - m(1, -1) - m(-1, 1) + m(-1, -1)) / 4.0;
    let dxs = (n(0, 1) - n(0, -1) - p(0, 1) + p(0, -1)) / 4.0;
    let dys = (n(1, 0) - n(-1, 0) - p(1, 0) + p(-1, 0)) / 4.0;

    let x = solve3([[dxx, dxy, dxs], [dxy, dyy, dys], [dxs, dys, dss]], b);
    let moved = x.iter().any(|&v| v != 0.0);
    if !moved || x.iter().any(|v| v.abs() > 1.0) {
        return false;
    }

    let step = mid.step as f32;
    kp.x += x[0] as f32 * step;
    kp.y += x[1] as f32 * step;
    kp.size = (kp.size + x[2] as f32 * scale_step).round();
    true
}

/// Local maxima of the determinant above `threshold` in the middle layer
/// `index`, compared strictly against all 26 neighbours.
///
/// When `mask_sum` is given, the filter footprint must be at least half
/// covered by the mask.
pub fn find_maxima(
    layers: &[ResponseLayer],
    index: usize,
    octave: i32,
    threshold: f32,
    mask_sum: Option<&Integral>,
) -> Vec<KeyPoint> {
    let (prev, mid, next) = (&layers[index - 1], &layers[index], &layers[index + 1]);
    let size = mid.size;
    let step = mid.step;
    let margin = ((next.size / 2) / step + 1) as usize;
    if mid.rows <= 2 * margin || mid.cols <= 2 * margin {
        return Vec::new();
    }
    let mean_box = resize_haar_pattern(&MEAN, HAAR_SIZE0, size);
    let half = ((size / 2) / step) as usize;
    let scale_step = (size - prev.size) as f32;

    let mut keypoints = Vec::new();
    for i in margin..mid.rows - margin {
        for j in margin..mid.cols - margin {
            let val0 = mid.det(i, j);
            if val0 <= threshold {
                continue;
            }

            let sum_i = step * (i - half) as u32;
            let sum_j = step * (j - half) as u32;
            if let Some(mask_sum) = mask_sum {
                if haar_response(mask_sum, sum_j, sum_i, &mean_box) < 0.5 {
                    continue;
                }
            }

            let is_max = (-1isize..=1).all(|dr| {
                (-1isize..=1).all(|dc| {
                    let (r, c) = ((i as isize + dr) as usize, (j as isize + dc) as usize);
                    val0 > prev.det(r, c) && val0 > next.det(r, c) && ((dr == 0 && dc == 0) || val0 > mid.det(r, c))
                })
            });
            if !is_max {
                continue;
            }

            let center = |s: u32| s as f32 + (size - 1) as f32 * 0.5;
            let trace = mid.trace(i, j);
            let mut kp = KeyPoint::new(center(sum_j), center(sum_i), size as f32)
                .with_response(val0)
                .with_octave(octave);
            kp.class_id = if trace > 0.0 {
                1
            } else if trace < 0.0 {
                -1
            } else {
                0
            };

            if interpolate_keypoint(prev, mid, next, i, j, scale_step, &mut kp) {
                keypoints.push(kp);
            }
        }
    }
    keypoints
}

/// Runs the detector over all octaves, middle layers in parallel.
pub fn fast_hessian_detector(
    sum: &Integral,
    mask_sum: Option<&Integral>,
    n_octaves: usize,
    n_octave_layers: usize,
    threshold: f32,
) -> Vec<KeyPoint> {
    let layers = build_response_layers(sum, n_octaves, n_octave_layers);
    let per_octave = n_octave_layers + 2;
    let middles: Vec<(usize, usize)> = (0..n_octaves)
        .flat_map(|o| (1..=n_octave_layers).map(move |l| (o, o * per_octave + l)))
        .collect();

    middles
        .par_iter()
        .map(|&(octave, index)| find_maxima(&layers, index, octave as i32, threshold, mask_sum))
        .collect::<Vec<_>>()
        .into_iter()
        .flatten()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resize_pattern_normalizes_weights() {
        let boxes = resize_haar_pattern(&DX, 9, 15);
        assert_eq!(boxes.len(), 3);
        for b in &boxes {
            assert!(b.x1 <= 15 && b.y1 <= 15);
        }
        let area = ((boxes[1].x1 - boxes[1].x0) * (boxes[1].y1 - boxes[1].y0)) as f32;
        assert!((boxes[1].weight + 2.0 / area).abs() < 1e-6);
    }

    #[test]
    fn test_box_sum_matches_pixels() {
        let img = GrayImage::from_fn(12, 12, |x, y| Luma([(x + y) as u8]));
        let sum = integral(&img);
        let mean = resize_haar_pattern(&MEAN, 9, 9);
        let expected: f32 = (2..11).flat_map(|y| (1..10).map(move |x| (x + y) as f32)).sum::<f32>() / 81.0;
        assert!((haar_response(&sum, 1, 2, &mean) - expected).abs() < 1e-4);
    }

    #[test]
    fn test_flat_image_has_zero_response() {
        let img = GrayImage::from_pixel(40, 40, Luma([90]));
        let sum = integral(&img);
        let layer = ResponseLayer::compute(&sum, 9, 1);
        assert_eq!((layer.rows, layer.cols), (40, 40));
        for r in 0..layer.rows {
            for c in 0..layer.cols {
                assert!(layer.det(r, c).abs() < 1e-3);
            }
        }
    }

    #[test]
    fn test_filter_larger_than_image_is_empty() {
        let img = GrayImage::from_pixel(20, 20, Luma([10]));
        let layer = ResponseLayer::compute(&integral(&img), 27, 2);
        assert_eq!((layer.rows, layer.cols), (10, 10));
        assert!((0..10).all(|r| (0..10).all(|c| layer.det(r, c) == 0.0)));
    }

    #[test]
    fn test_dark_blob_is_a_maximum() {
        let img = GrayImage::from_fn(64, 64, |x, y| {
            let (dx, dy) = (x as f32 - 32.0, y as f32 - 32.0);
            if dx * dx + dy * dy <= 16.0 {
                Luma([20])
            } else {
                Luma([230])
            }
        });
        let kps = fast_hessian_detector(&integral(&img), None, 1, 3, 100.0);
        assert!(!kps.is_empty());
        let best = kps
            .iter()
            .max_by(|a, b| a.response.total_cmp(&b.response))
            .copied()
            .unwrap();
        assert!((best.x - 32.0).abs() < 3.0 && (best.y - 32.0).abs() < 3.0, "{best:?}");
        assert_eq!(best.class_id, 1);
    }
}
